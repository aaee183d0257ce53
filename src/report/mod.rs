//! Recurring financial reports.
//!
//! Users opt in to weekly or monthly reports through their [ReportSetting].
//! The [ReportScheduler] periodically generates a [Report] for every user
//! whose report is due and hands it to a [ReportDelivery].

mod delivery;
mod generate;
mod handlers;
mod list;
mod period;
mod schedule;
mod scheduler;
mod setting;
mod summary;

pub use delivery::{LogDelivery, ReportDelivery, ReportEmail, render_report_email};
pub use generate::{Report, create_report_table, generate_report, get_report_for_period};
pub use handlers::{
    get_report_setting_endpoint, get_report_summary, get_reports, update_report_setting_endpoint,
};
pub use list::{ReportPage, list_reports};
pub use period::ReportPeriod;
pub use schedule::{ReportFrequency, calculate_next_report_date};
pub use scheduler::{ReportScheduler, TickOutcome, TickSummary};
pub use setting::{
    ReportSetting, ReportSettingPatch, create_report_setting, create_report_setting_table,
    get_report_setting, list_due_report_settings, mark_report_sent, update_report_setting,
};
pub use summary::{CategoryBreakdown, ReportSummary, summarise};
