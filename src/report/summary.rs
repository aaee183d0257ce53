//! Aggregation of a period's transactions into the figures shown in a report.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{report::ReportPeriod, transaction::Transaction};

/// The label used for expenses without a category.
pub const UNCATEGORISED_LABEL: &str = "Other";

/// The number of expense categories listed in a report.
pub const TOP_CATEGORY_COUNT: usize = 5;

/// The spending in one category over a report period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryBreakdown {
    /// The category name, or [UNCATEGORISED_LABEL].
    pub name: String,
    /// The total spent in the category as a positive number.
    pub amount: f64,
    /// The share of the period's total expenses, in percent.
    pub percentage: f64,
}

/// The aggregated figures for a report period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    /// A human readable description of the period, e.g. "March 1 - 31, 2025".
    pub period_label: String,
    /// The number of transactions in the period.
    pub transaction_count: usize,
    /// The sum of all income.
    pub total_income: f64,
    /// The sum of all expenses as a positive number.
    pub total_expenses: f64,
    /// Income minus expenses.
    pub available_balance: f64,
    /// The percentage of income that was not spent, 0 when there was no income.
    pub savings_rate: f64,
    /// The largest expense categories, largest first.
    pub top_categories: Vec<CategoryBreakdown>,
}

/// Summarise the `transactions` of `period`.
///
/// Positive amounts count as income and negative amounts as expenses.
/// Transactions are assumed to already be filtered to the period.
pub fn summarise(period: ReportPeriod, transactions: &[Transaction]) -> ReportSummary {
    let total_income: f64 = transactions
        .iter()
        .filter(|transaction| transaction.amount > 0.0)
        .map(|transaction| transaction.amount)
        .sum();
    let total_expenses: f64 = transactions
        .iter()
        .filter(|transaction| transaction.amount < 0.0)
        .map(|transaction| transaction.amount.abs())
        .sum();

    ReportSummary {
        period_label: period.label(),
        transaction_count: transactions.len(),
        total_income,
        total_expenses,
        available_balance: total_income - total_expenses,
        savings_rate: calculate_savings_rate(total_income, total_expenses),
        top_categories: top_expense_categories(transactions, total_expenses),
    }
}

/// The percentage of `income` left after `expenses`, rounded to two decimal places.
///
/// Negative when more was spent than earned and 0 when there was no income.
fn calculate_savings_rate(income: f64, expenses: f64) -> f64 {
    if income <= 0.0 {
        return 0.0;
    }

    round_to_cents((income - expenses) / income * 100.0)
}

/// Groups expenses by category and returns the [TOP_CATEGORY_COUNT] largest.
///
/// Ties are broken alphabetically so the order is stable.
fn top_expense_categories(
    transactions: &[Transaction],
    total_expenses: f64,
) -> Vec<CategoryBreakdown> {
    let mut totals_by_category: HashMap<&str, f64> = HashMap::new();

    for transaction in transactions.iter().filter(|t| t.amount < 0.0) {
        let category = transaction
            .category
            .as_deref()
            .unwrap_or(UNCATEGORISED_LABEL);
        *totals_by_category.entry(category).or_insert(0.0) += transaction.amount.abs();
    }

    let mut categories: Vec<(&str, f64)> = totals_by_category.into_iter().collect();
    categories.sort_by(|(name_a, amount_a), (name_b, amount_b)| {
        amount_b.total_cmp(amount_a).then_with(|| name_a.cmp(name_b))
    });

    categories
        .into_iter()
        .take(TOP_CATEGORY_COUNT)
        .map(|(name, amount)| CategoryBreakdown {
            name: name.to_owned(),
            amount,
            percentage: if total_expenses > 0.0 {
                round_to_cents(amount / total_expenses * 100.0)
            } else {
                0.0
            },
        })
        .collect()
}

fn round_to_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
