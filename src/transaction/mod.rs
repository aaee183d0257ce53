//! Transactions recorded by users.
//!
//! This module contains the `Transaction` model, the `TransactionBuilder`
//! for creating transactions, the database functions reports are built on and
//! the JSON endpoints for managing transactions.

mod core;
mod handlers;
mod query;

pub use core::{
    Transaction, TransactionBuilder, create_transaction, create_transaction_table,
    create_transactions, delete_transaction, delete_transactions, duplicate_transaction,
    update_transaction,
};
pub use handlers::{
    BulkDeleteForm, BulkDeleteResponse, BulkTransactionForm, TransactionForm, TransactionState,
    bulk_create_transactions_endpoint, bulk_delete_transactions_endpoint,
    create_transaction_endpoint, delete_transaction_endpoint, duplicate_transaction_endpoint,
    get_transaction_endpoint, get_transactions_endpoint, update_transaction_endpoint,
};
pub use query::{TransactionPage, get_transaction, get_transactions_in_range, list_transactions};
