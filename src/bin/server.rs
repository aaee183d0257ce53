use std::{fs::OpenOptions, net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    Router,
    extract::{MatchedPath, Request},
    middleware,
};
use axum_server::Handle;
use clap::Parser;
use rusqlite::Connection;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use tracing_subscriber::{Layer, filter, layer::SubscriberExt, util::SubscriberInitExt};

use finance_reports::{
    AppState, Clock, LogDelivery, PaginationConfig, ReportScheduler, SystemClock, build_router,
    graceful_shutdown, logging_middleware,
};

/// The API server for finance_reports.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database.
    #[arg(long)]
    db_path: String,

    /// The port to serve the API from.
    #[arg(short, long, default_value_t = 3000)]
    port: u16,

    /// The canonical name of the timezone report dates are calculated in, e.g. "Pacific/Auckland".
    #[arg(long, default_value = "Etc/UTC")]
    timezone: String,

    /// How often, in seconds, to check for reports that are due.
    #[arg(long, default_value_t = 3600, value_parser = clap::value_parser!(u64).range(1..))]
    report_interval: u64,
}

#[tokio::main]
async fn main() {
    setup_logging();

    let args = Args::parse();

    let addr = SocketAddr::from(([127, 0, 0, 1], args.port));

    let clock: Arc<dyn Clock> = Arc::new(
        SystemClock::new(&args.timezone)
            .unwrap_or_else(|error| panic!("Could not use timezone {}: {error}", args.timezone)),
    );

    let connection = Connection::open(&args.db_path)
        .unwrap_or_else(|error| panic!("Could not open the database at {}: {error}", args.db_path));
    let state = AppState::new(connection, clock.clone(), PaginationConfig::default())
        .expect("Could not initialize the database.");

    let cancellation_token = CancellationToken::new();
    let scheduler = Arc::new(ReportScheduler::new(
        state.db_connection.clone(),
        LogDelivery,
        clock,
    ));
    let scheduler_task = tokio::spawn(scheduler.run(
        Duration::from_secs(args.report_interval),
        cancellation_token.clone(),
    ));

    let handle = Handle::new();
    tokio::spawn(graceful_shutdown(handle.clone(), cancellation_token));

    let router = build_router(state).layer(middleware::from_fn(logging_middleware));
    let router = add_tracing_layer(router);

    tracing::info!("HTTP server listening on {}", addr);
    axum_server::bind(addr)
        .handle(handle)
        .serve(router.into_make_service())
        .await
        .expect("The server stopped unexpectedly.");

    if let Err(error) = scheduler_task.await {
        tracing::error!("The report scheduler did not shut down cleanly: {error}");
    }
}

fn setup_logging() {
    let stdout_log = tracing_subscriber::fmt::layer().pretty();

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open("debug.log")
        .expect("Could not create log file");

    let debug_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_writer(Arc::new(log_file));

    tracing_subscriber::registry()
        .with(
            stdout_log
                .with_filter(filter::LevelFilter::INFO)
                .and_then(debug_log)
                .with_filter(filter::LevelFilter::DEBUG),
        )
        .init();
}

fn add_tracing_layer(router: Router) -> Router {
    let tracing_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request| {
            let method = req.method();
            let uri = req.uri();

            let matched_path = req
                .extensions()
                .get::<MatchedPath>()
                .map(|matched_path| matched_path.as_str());

            tracing::debug_span!("request", %method, %uri, matched_path)
        })
        // Errors are already logged where they are converted to responses.
        .on_failure(());

    router.layer(tracing_layer)
}
