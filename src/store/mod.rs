//! Transaction persistence.
//!
//! The store is the single authority over the transaction state machine.
//! Idempotent creation and first-terminal-write-wins are enforced here with
//! conditional writes, not in the callers, so every code path gets the same
//! guarantees.

pub mod memory;
pub mod postgres;

use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::types::{ProviderName, TransactionStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    /// Engine-issued reference, unique across all transactions.
    pub reference: String,
    pub provider: ProviderName,
    /// Gateway-side identifier, set at most once after acceptance.
    pub provider_transaction_id: Option<String>,
    pub amount: String,
    pub currency: String,
    pub phone: Option<String>,
    pub description: String,
    pub status: TransactionStatus,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new_pending(
        reference: String,
        provider: ProviderName,
        amount: String,
        currency: String,
        phone: Option<String>,
        description: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            reference,
            provider,
            provider_transaction_id: None,
            amount,
            currency,
            phone,
            description,
            status: TransactionStatus::Pending,
            error_code: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Outcome of [`TransactionStore::insert_if_absent`].
#[derive(Debug, Clone)]
pub enum InsertOutcome {
    /// The row was created by this call.
    Created(Transaction),
    /// A transaction with the same reference already existed; the stored
    /// row is returned untouched.
    Existing(Transaction),
}

impl InsertOutcome {
    pub fn transaction(&self) -> &Transaction {
        match self {
            InsertOutcome::Created(tx) | InsertOutcome::Existing(tx) => tx,
        }
    }

    pub fn was_created(&self) -> bool {
        matches!(self, InsertOutcome::Created(_))
    }

    pub fn into_transaction(self) -> Transaction {
        match self {
            InsertOutcome::Created(tx) | InsertOutcome::Existing(tx) => tx,
        }
    }
}

#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Atomically create the transaction unless one with the same reference
    /// already exists. Concurrent calls with the same reference see exactly
    /// one `Created` and the rest `Existing`.
    async fn insert_if_absent(&self, transaction: Transaction) -> PaymentResult<InsertOutcome>;

    async fn find_by_id(&self, id: Uuid) -> PaymentResult<Option<Transaction>>;

    async fn find_by_reference(&self, reference: &str) -> PaymentResult<Option<Transaction>>;

    async fn find_by_provider_transaction_id(
        &self,
        provider: ProviderName,
        provider_transaction_id: &str,
    ) -> PaymentResult<Option<Transaction>>;

    /// Record the gateway identifier if none is set yet. Returns the row as
    /// stored; an already-set identifier is left untouched.
    async fn set_provider_transaction_id(
        &self,
        id: Uuid,
        provider_transaction_id: &str,
    ) -> PaymentResult<Transaction>;

    /// Move a pending transaction to a terminal state. The update is
    /// conditional on the row still being pending; if another writer got
    /// there first this returns `false` and changes nothing.
    async fn finalize_if_pending(
        &self,
        id: Uuid,
        status: TransactionStatus,
        error_code: Option<&str>,
        error_message: Option<&str>,
    ) -> PaymentResult<bool>;
}

pub(crate) fn not_found(id: Uuid) -> PaymentError {
    PaymentError::TransactionNotFound { id: id.to_string() }
}
