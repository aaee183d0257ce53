use std::error::Error;
use std::path::Path;
use std::process::exit;

use clap::Parser;
use rusqlite::Connection;
use time::Duration;

use finance_reports::{
    Clock, ReportFrequency, ReportSettingPatch, SystemClock, Transaction, create_transactions,
    create_user, initialize_db, update_report_setting,
};

/// A utility for creating a test database for the API server of finance_reports.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to save the SQLite database to.
    #[arg(long, short)]
    output_path: String,

    /// The canonical name of the timezone to schedule reports in, e.g. "Pacific/Auckland".
    #[arg(long, default_value = "Etc/UTC")]
    timezone: String,
}

/// Create and populate a database for manual testing.
fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let clock = SystemClock::new(&args.timezone)?;

    let output_path = Path::new(&args.output_path);

    match output_path.extension() {
        None => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        Some(extension) if extension.is_empty() => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        _ => {}
    }

    if output_path.is_file() {
        eprintln!("File already exists at {output_path:#?}!");
        exit(1);
    }

    println!("Creating database at {output_path:#?}");
    let conn = Connection::open(output_path)?;

    initialize_db(&conn)?;

    println!("Creating test user...");
    let user = create_user("Test", "test@example.com", &conn)?;

    println!("Creating transactions...");
    let now = clock.now();
    let today = now.date();
    let mut transactions = Vec::new();

    for weeks_ago in 0..9 {
        let date = today - Duration::weeks(weeks_ago);

        transactions.push(Transaction::build(-180.0, date, "Supermarket").category(Some("Groceries")));
        transactions.push(Transaction::build(-45.5, date, "Petrol").category(Some("Transport")));

        if weeks_ago % 2 == 0 {
            transactions.push(Transaction::build(2400.0, date, "Salary").category(Some("Income")));
            transactions.push(Transaction::build(-650.0, date, "Rent").category(Some("Housing")));
        }

        if weeks_ago % 3 == 0 {
            transactions.push(Transaction::build(-32.0, date, "Cafe"));
        }
    }

    let transactions = create_transactions(user.id, transactions, &conn)?;
    println!("Created {} transactions.", transactions.len());

    println!("Enabling monthly reports...");
    let setting = update_report_setting(
        user.id,
        ReportSettingPatch {
            is_enabled: Some(true),
            frequency: Some(ReportFrequency::Monthly),
        },
        now,
        clock.timezone(),
        &conn,
    )?;

    if let Some(next_report_date) = setting.next_report_date {
        println!("The first report is due at {next_report_date}.");
    }

    println!("Success!");

    Ok(())
}
