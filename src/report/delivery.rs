//! Delivery of generated reports to their owners.

use std::{fmt::Write, future::Future};

use crate::{Error, report::Report, user::User};

/// Sends a report to the user it was generated for, e.g. by email.
pub trait ReportDelivery: Send + Sync {
    /// Deliver `report` to `recipient`.
    ///
    /// # Errors
    /// Returns [Error::DeliveryFailed] if the report could not be sent. The
    /// scheduler will try again on its next tick.
    fn deliver(
        &self,
        recipient: &User,
        report: &Report,
    ) -> impl Future<Output = Result<(), Error>> + Send;
}

/// A report rendered as a plain-text email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEmail {
    /// The recipient's address.
    pub to: String,
    /// The subject line.
    pub subject: String,
    /// The plain-text body.
    pub body: String,
}

/// Render `report` as an email to `recipient`.
pub fn render_report_email(recipient: &User, report: &Report) -> ReportEmail {
    let summary = &report.summary;
    let mut body = String::new();

    // Writing to a String cannot fail.
    let _ = writeln!(body, "Hi {},", recipient.name);
    let _ = writeln!(body);
    let _ = writeln!(
        body,
        "Here is your financial report for {}.",
        summary.period_label
    );
    let _ = writeln!(body);
    let _ = writeln!(body, "Income:            {:.2}", summary.total_income);
    let _ = writeln!(body, "Expenses:          {:.2}", summary.total_expenses);
    let _ = writeln!(body, "Available balance: {:.2}", summary.available_balance);
    let _ = writeln!(body, "Savings rate:      {:.2}%", summary.savings_rate);

    if summary.transaction_count == 0 {
        let _ = writeln!(body);
        let _ = writeln!(body, "There were no transactions in this period.");
    } else if !summary.top_categories.is_empty() {
        let _ = writeln!(body);
        let _ = writeln!(body, "Top spending categories:");
        for category in &summary.top_categories {
            let _ = writeln!(
                body,
                "  {}: {:.2} ({:.2}%)",
                category.name, category.amount, category.percentage
            );
        }
    }

    ReportEmail {
        to: recipient.email.clone(),
        subject: format!("Your financial report for {}", summary.period_label),
        body,
    }
}

/// Delivers reports by writing the rendered email to the application log.
///
/// Used when no mail relay is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogDelivery;

impl ReportDelivery for LogDelivery {
    async fn deliver(&self, recipient: &User, report: &Report) -> Result<(), Error> {
        let email = render_report_email(recipient, report);

        tracing::info!(
            to = %email.to,
            subject = %email.subject,
            "delivering report {}:\n{}",
            report.id,
            email.body
        );

        Ok(())
    }
}
