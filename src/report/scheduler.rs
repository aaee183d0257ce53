//! The background task that generates and delivers due reports.

use std::{
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use rusqlite::Connection;
use time::OffsetDateTime;
use time_tz::OffsetDateTimeExt;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::{
    Error,
    clock::Clock,
    report::{
        Report, ReportDelivery, ReportPeriod, ReportSetting, generate::get_report_for_period,
        generate_report, list_due_report_settings, mark_report_sent,
    },
    user::{User, UserId, get_user},
};

/// The result of a tick that ran to completion.
#[derive(Debug, Default, PartialEq)]
pub struct TickSummary {
    /// The number of settings that were due at the start of the tick.
    pub due: usize,
    /// The number of reports delivered.
    pub delivered: usize,
    /// The users whose report could not be generated or delivered, and why.
    pub failures: Vec<(UserId, Error)>,
}

/// What happened when [ReportScheduler::run_tick] was called.
#[derive(Debug, PartialEq)]
pub enum TickOutcome {
    /// The due settings were processed.
    Completed(TickSummary),
    /// Another tick was still running so nothing was done.
    Skipped,
}

/// Periodically finds the users whose report is due, generates each report
/// and hands it to a [ReportDelivery].
///
/// A failure for one user is recorded and the remaining users are still
/// processed. A user whose delivery failed keeps their next report date, so
/// the report is retried on the next tick.
pub struct ReportScheduler<D> {
    db_connection: Arc<Mutex<Connection>>,
    delivery: D,
    clock: Arc<dyn Clock>,
    is_running: AtomicBool,
}

impl<D: ReportDelivery> ReportScheduler<D> {
    /// Create a scheduler that reads and writes through `db_connection`.
    pub fn new(db_connection: Arc<Mutex<Connection>>, delivery: D, clock: Arc<dyn Clock>) -> Self {
        Self {
            db_connection,
            delivery,
            clock,
            is_running: AtomicBool::new(false),
        }
    }

    /// Call [ReportScheduler::run_tick] every `period` until `cancellation_token` is cancelled.
    ///
    /// The first tick runs immediately.
    pub async fn run(self: Arc<Self>, period: Duration, cancellation_token: CancellationToken) {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!("report scheduler started, checking for due reports every {period:?}");

        loop {
            tokio::select! {
                () = cancellation_token.cancelled() => {
                    tracing::info!("report scheduler shutting down");
                    break;
                }
                _ = interval.tick() => {
                    self.run_tick().await;
                }
            }
        }
    }

    /// Generate and deliver every report that is due now.
    ///
    /// Returns [TickOutcome::Skipped] without doing anything if another tick
    /// has not finished yet.
    pub async fn run_tick(&self) -> TickOutcome {
        let Some(_tick_guard) = TickGuard::acquire(&self.is_running) else {
            tracing::warn!("skipping report tick, the previous tick is still running");
            return TickOutcome::Skipped;
        };

        let now = self.clock.now();
        let due_settings = match self.due_settings(now) {
            Ok(settings) => settings,
            Err(error) => {
                tracing::error!("could not get due report settings: {error}");
                return TickOutcome::Completed(TickSummary::default());
            }
        };

        let mut summary = TickSummary {
            due: due_settings.len(),
            ..Default::default()
        };

        for setting in &due_settings {
            match self.process_setting(setting, now).await {
                Ok(()) => summary.delivered += 1,
                Err(error) => {
                    tracing::warn!("could not send report to user {}: {error}", setting.user_id);
                    summary.failures.push((setting.user_id, error));
                }
            }
        }

        if summary.due > 0 {
            tracing::info!(
                "report tick finished: {} due, {} delivered, {} failed",
                summary.due,
                summary.delivered,
                summary.failures.len()
            );
        }

        TickOutcome::Completed(summary)
    }

    async fn process_setting(
        &self,
        setting: &ReportSetting,
        now: OffsetDateTime,
    ) -> Result<(), Error> {
        let (user, report) = self.prepare_report(setting, now)?;

        self.delivery.deliver(&user, &report).await?;

        self.record_delivery(user.id, now)?;
        tracing::info!("delivered report {} to user {}", report.id, user.id);

        Ok(())
    }

    /// Get the report for the period that ended at the scheduled report date,
    /// reusing the report from an earlier failed delivery if there is one.
    ///
    /// The period is taken from the local date of the scheduled report date
    /// rather than from `now`, so a tick that runs late still reports on the
    /// period the report was scheduled for.
    fn prepare_report(
        &self,
        setting: &ReportSetting,
        now: OffsetDateTime,
    ) -> Result<(User, Report), Error> {
        let connection = self.lock_connection()?;
        let user = get_user(setting.user_id, &connection)?;
        let scheduled_date = setting
            .next_report_date
            .unwrap_or(now)
            .to_timezone(self.clock.timezone())
            .date();
        let period = ReportPeriod::preceding(setting.frequency, scheduled_date);

        let report = match get_report_for_period(user.id, period, &connection)? {
            Some(report) => report,
            None => generate_report(user.id, period, now, &connection)?,
        };

        Ok((user, report))
    }

    fn record_delivery(&self, user_id: UserId, now: OffsetDateTime) -> Result<(), Error> {
        let connection = self.lock_connection()?;
        mark_report_sent(user_id, now, self.clock.timezone(), &connection)?;

        Ok(())
    }

    fn due_settings(&self, now: OffsetDateTime) -> Result<Vec<ReportSetting>, Error> {
        let connection = self.lock_connection()?;
        list_due_report_settings(now, &connection)
    }

    fn lock_connection(&self) -> Result<MutexGuard<'_, Connection>, Error> {
        self.db_connection.lock().map_err(|error| {
            tracing::error!("could not acquire database lock: {error}");
            Error::DatabaseLockError
        })
    }
}

/// Sets the running flag for the lifetime of a tick and clears it on drop.
struct TickGuard<'a>(&'a AtomicBool);

impl<'a> TickGuard<'a> {
    fn acquire(is_running: &'a AtomicBool) -> Option<Self> {
        is_running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(is_running))
    }
}

impl Drop for TickGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{Arc, Mutex, atomic::Ordering},
        time::Duration,
    };

    use rusqlite::Connection;
    use time::{
        OffsetDateTime,
        macros::{date, datetime},
    };
    use tokio_util::sync::CancellationToken;

    use crate::{
        Error,
        clock::FixedClock,
        database_id::ReportId,
        report::{
            Report, ReportDelivery, ReportFrequency, ReportSettingPatch, TickOutcome,
            get_report_setting, mark_report_sent, update_report_setting,
        },
        test_utils::{create_test_user, get_test_connection},
        timezone::get_timezone,
        user::{User, UserId},
    };

    use super::ReportScheduler;

    /// Records deliveries and fails for one chosen user.
    #[derive(Default)]
    struct TestDelivery {
        failing_user: Mutex<Option<UserId>>,
        delivered: Mutex<Vec<(UserId, ReportId)>>,
    }

    impl ReportDelivery for TestDelivery {
        async fn deliver(&self, recipient: &User, report: &Report) -> Result<(), Error> {
            if *self.failing_user.lock().unwrap() == Some(recipient.id) {
                return Err(Error::DeliveryFailed("mailbox unavailable".to_owned()));
            }

            self.delivered
                .lock()
                .unwrap()
                .push((recipient.id, report.id));

            Ok(())
        }
    }

    const ENABLED_AT: OffsetDateTime = datetime!(2025-03-15 10:00 UTC);
    const TICK_AT: OffsetDateTime = datetime!(2025-04-01 00:05 UTC);

    fn enable_monthly_reports(user_id: UserId, conn: &Connection) {
        update_report_setting(
            user_id,
            ReportSettingPatch {
                is_enabled: Some(true),
                frequency: Some(ReportFrequency::Monthly),
            },
            ENABLED_AT,
            get_timezone("Etc/UTC").unwrap(),
            conn,
        )
        .unwrap();
    }

    fn new_scheduler(conn: Connection, now: OffsetDateTime) -> ReportScheduler<TestDelivery> {
        ReportScheduler::new(
            Arc::new(Mutex::new(conn)),
            TestDelivery::default(),
            Arc::new(FixedClock::utc(now)),
        )
    }

    fn get_report_period(report_id: ReportId, conn: &Connection) -> (time::Date, time::Date) {
        conn.query_row(
            "SELECT period_start, period_end FROM report WHERE id = ?1",
            [report_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap()
    }

    fn count_reports(user_id: UserId, conn: &Connection) -> i64 {
        conn.query_row(
            "SELECT COUNT(*) FROM report WHERE user_id = ?1",
            [user_id],
            |row| row.get(0),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn failed_delivery_does_not_block_other_users() {
        let conn = get_test_connection();
        let alice = create_test_user("Alice", &conn);
        let bob = create_test_user("Bob", &conn);
        enable_monthly_reports(alice.id, &conn);
        enable_monthly_reports(bob.id, &conn);
        let scheduler = new_scheduler(conn, TICK_AT);
        *scheduler.delivery.failing_user.lock().unwrap() = Some(alice.id);

        let outcome = scheduler.run_tick().await;

        let TickOutcome::Completed(summary) = outcome else {
            panic!("expected the tick to complete, got {outcome:?}");
        };
        assert_eq!(summary.due, 2);
        assert_eq!(summary.delivered, 1);
        assert_eq!(
            summary.failures,
            vec![(
                alice.id,
                Error::DeliveryFailed("mailbox unavailable".to_owned())
            )]
        );

        let delivered = scheduler.delivery.delivered.lock().unwrap().clone();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].0, bob.id);

        let conn = scheduler.db_connection.lock().unwrap();
        let alice_setting = get_report_setting(alice.id, &conn).unwrap();
        assert_eq!(
            alice_setting.next_report_date,
            Some(datetime!(2025-04-01 00:00 UTC))
        );
        assert_eq!(alice_setting.last_sent_date, None);

        let bob_setting = get_report_setting(bob.id, &conn).unwrap();
        assert_eq!(bob_setting.last_sent_date, Some(TICK_AT));
        assert_eq!(
            bob_setting.next_report_date,
            Some(datetime!(2025-05-01 00:00 UTC))
        );
    }

    #[tokio::test]
    async fn retry_reuses_report_from_failed_delivery() {
        let conn = get_test_connection();
        let alice = create_test_user("Alice", &conn);
        enable_monthly_reports(alice.id, &conn);
        let scheduler = new_scheduler(conn, TICK_AT);
        *scheduler.delivery.failing_user.lock().unwrap() = Some(alice.id);
        scheduler.run_tick().await;

        *scheduler.delivery.failing_user.lock().unwrap() = None;
        let outcome = scheduler.run_tick().await;

        let TickOutcome::Completed(summary) = outcome else {
            panic!("expected the tick to complete, got {outcome:?}");
        };
        assert_eq!(summary.delivered, 1);
        let conn = scheduler.db_connection.lock().unwrap();
        assert_eq!(count_reports(alice.id, &conn), 1);
    }

    #[tokio::test]
    async fn delivered_report_covers_previous_month() {
        let conn = get_test_connection();
        let alice = create_test_user("Alice", &conn);
        enable_monthly_reports(alice.id, &conn);
        let scheduler = new_scheduler(conn, TICK_AT);

        scheduler.run_tick().await;

        let (_, report_id) = scheduler.delivery.delivered.lock().unwrap()[0];
        let conn = scheduler.db_connection.lock().unwrap();
        assert_eq!(
            get_report_period(report_id, &conn),
            (date!(2025 - 03 - 01), date!(2025 - 03 - 31))
        );
    }

    #[tokio::test]
    async fn monthly_report_across_end_of_daylight_saving_covers_previous_month() {
        let berlin = get_timezone("Europe/Berlin").unwrap();
        let conn = get_test_connection();
        let alice = create_test_user("Alice", &conn);
        update_report_setting(
            alice.id,
            ReportSettingPatch {
                is_enabled: Some(true),
                frequency: Some(ReportFrequency::Monthly),
            },
            datetime!(2025-09-15 10:00 +02:00),
            berlin,
            &conn,
        )
        .unwrap();
        mark_report_sent(alice.id, datetime!(2025-10-01 00:05 +02:00), berlin, &conn).unwrap();
        let db_connection = Arc::new(Mutex::new(conn));

        let before_midnight = ReportScheduler::new(
            db_connection.clone(),
            TestDelivery::default(),
            Arc::new(FixedClock::in_timezone(
                datetime!(2025-10-31 23:30 +01:00),
                "Europe/Berlin",
            )),
        );
        let after_midnight = ReportScheduler::new(
            db_connection.clone(),
            TestDelivery::default(),
            Arc::new(FixedClock::in_timezone(
                datetime!(2025-11-01 00:30 +01:00),
                "Europe/Berlin",
            )),
        );

        let early = before_midnight.run_tick().await;
        let on_time = after_midnight.run_tick().await;

        assert_eq!(early, TickOutcome::Completed(Default::default()));
        let TickOutcome::Completed(summary) = on_time else {
            panic!("expected the tick to complete, got {on_time:?}");
        };
        assert_eq!(summary.delivered, 1);
        let (_, report_id) = after_midnight.delivery.delivered.lock().unwrap()[0];
        let conn = db_connection.lock().unwrap();
        assert_eq!(
            get_report_period(report_id, &conn),
            (date!(2025 - 10 - 01), date!(2025 - 10 - 31))
        );
        assert_eq!(
            get_report_setting(alice.id, &conn).unwrap().next_report_date,
            Some(datetime!(2025-12-01 00:00 +01:00))
        );
    }

    #[tokio::test]
    async fn failed_generation_does_not_block_other_users() {
        let conn = get_test_connection();
        let alice = create_test_user("Alice", &conn);
        let bob = create_test_user("Bob", &conn);
        enable_monthly_reports(alice.id, &conn);
        enable_monthly_reports(bob.id, &conn);
        // A date that cannot be read back makes summarising Alice's March fail.
        conn.execute(
            "INSERT INTO \"transaction\" (user_id, amount, date, description)
            VALUES (?1, -12.5, '2025-03-1x', 'Corrupt')",
            [alice.id],
        )
        .unwrap();
        let scheduler = new_scheduler(conn, TICK_AT);

        let outcome = scheduler.run_tick().await;

        let TickOutcome::Completed(summary) = outcome else {
            panic!("expected the tick to complete, got {outcome:?}");
        };
        assert_eq!(summary.due, 2);
        assert_eq!(summary.delivered, 1);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].0, alice.id);
        assert!(matches!(summary.failures[0].1, Error::SqlError(_)));

        let delivered = scheduler.delivery.delivered.lock().unwrap().clone();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].0, bob.id);

        let conn = scheduler.db_connection.lock().unwrap();
        let alice_setting = get_report_setting(alice.id, &conn).unwrap();
        assert_eq!(
            alice_setting.next_report_date,
            Some(datetime!(2025-04-01 00:00 UTC))
        );
        assert_eq!(alice_setting.last_sent_date, None);
        assert_eq!(count_reports(alice.id, &conn), 0);
        assert_eq!(
            get_report_setting(bob.id, &conn).unwrap().last_sent_date,
            Some(TICK_AT)
        );
    }

    #[tokio::test]
    async fn settings_not_yet_due_are_ignored() {
        let conn = get_test_connection();
        let alice = create_test_user("Alice", &conn);
        enable_monthly_reports(alice.id, &conn);
        create_test_user("Bob", &conn);
        let scheduler = new_scheduler(conn, datetime!(2025-03-31 23:59 UTC));

        let outcome = scheduler.run_tick().await;

        assert_eq!(outcome, TickOutcome::Completed(Default::default()));
        assert!(scheduler.delivery.delivered.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn overlapping_tick_is_skipped() {
        let conn = get_test_connection();
        let alice = create_test_user("Alice", &conn);
        enable_monthly_reports(alice.id, &conn);
        let scheduler = new_scheduler(conn, TICK_AT);
        scheduler.is_running.store(true, Ordering::Release);

        let outcome = scheduler.run_tick().await;

        assert_eq!(outcome, TickOutcome::Skipped);
        assert!(scheduler.delivery.delivered.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn running_flag_is_cleared_after_tick() {
        let scheduler = new_scheduler(get_test_connection(), TICK_AT);

        scheduler.run_tick().await;

        assert!(!scheduler.is_running.load(Ordering::Acquire));
        assert_ne!(scheduler.run_tick().await, TickOutcome::Skipped);
    }

    #[tokio::test]
    async fn run_stops_when_cancelled() {
        let scheduler = Arc::new(new_scheduler(get_test_connection(), TICK_AT));
        let cancellation_token = CancellationToken::new();
        let task = tokio::spawn(
            scheduler
                .clone()
                .run(Duration::from_secs(3600), cancellation_token.clone()),
        );

        cancellation_token.cancel();

        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("scheduler did not stop after cancellation")
            .unwrap();
    }
}
