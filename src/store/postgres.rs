//! Postgres-backed transaction store.
//!
//! Both invariants live in SQL: `ON CONFLICT (reference) DO NOTHING` makes
//! creation idempotent, and the `status = 'pending'` predicate on the
//! finalize update makes the first terminal write the only one that lands.

use super::{not_found, InsertOutcome, Transaction, TransactionStore};
use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::types::{ProviderName, TransactionStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, FromRow)]
struct TransactionRow {
    id: Uuid,
    reference: String,
    provider: String,
    provider_transaction_id: Option<String>,
    amount: String,
    currency: String,
    phone: Option<String>,
    description: String,
    status: String,
    error_code: Option<String>,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = PaymentError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        let provider =
            ProviderName::from_str(&row.provider).map_err(|_| PaymentError::Store {
                message: format!("unknown provider in row {}: {}", row.id, row.provider),
            })?;
        let status =
            TransactionStatus::from_db_status(&row.status).ok_or_else(|| PaymentError::Store {
                message: format!("unknown status in row {}: {}", row.id, row.status),
            })?;
        Ok(Transaction {
            id: row.id,
            reference: row.reference,
            provider,
            provider_transaction_id: row.provider_transaction_id,
            amount: row.amount,
            currency: row.currency,
            phone: row.phone,
            description: row.description,
            status,
            error_code: row.error_code,
            error_message: row.error_message,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn store_err(e: sqlx::Error) -> PaymentError {
    PaymentError::Store {
        message: format!("database error: {}", e),
    }
}

const SELECT_COLUMNS: &str = "id, reference, provider, provider_transaction_id, amount, \
     currency, phone, description, status, error_code, error_message, created_at, updated_at";

pub struct PgTransactionStore {
    pool: PgPool,
}

impl PgTransactionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_by_reference(&self, reference: &str) -> PaymentResult<Option<Transaction>> {
        let row: Option<TransactionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM transactions WHERE reference = $1",
            SELECT_COLUMNS
        ))
        .bind(reference)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;
        row.map(Transaction::try_from).transpose()
    }
}

#[async_trait]
impl TransactionStore for PgTransactionStore {
    async fn insert_if_absent(&self, transaction: Transaction) -> PaymentResult<InsertOutcome> {
        let inserted: Option<TransactionRow> = sqlx::query_as(&format!(
            "INSERT INTO transactions \
             (id, reference, provider, provider_transaction_id, amount, currency, phone, \
              description, status, error_code, error_message, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             ON CONFLICT (reference) DO NOTHING \
             RETURNING {}",
            SELECT_COLUMNS
        ))
        .bind(transaction.id)
        .bind(&transaction.reference)
        .bind(transaction.provider.as_str())
        .bind(&transaction.provider_transaction_id)
        .bind(&transaction.amount)
        .bind(&transaction.currency)
        .bind(&transaction.phone)
        .bind(&transaction.description)
        .bind(transaction.status.as_str())
        .bind(&transaction.error_code)
        .bind(&transaction.error_message)
        .bind(transaction.created_at)
        .bind(transaction.updated_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        match inserted {
            Some(row) => Ok(InsertOutcome::Created(row.try_into()?)),
            None => {
                // Lost the race (or a retry): the stored row is authoritative.
                let existing = self
                    .fetch_by_reference(&transaction.reference)
                    .await?
                    .ok_or_else(|| PaymentError::Store {
                        message: format!(
                            "reference {} conflicted but is not readable",
                            transaction.reference
                        ),
                    })?;
                Ok(InsertOutcome::Existing(existing))
            }
        }
    }

    async fn find_by_id(&self, id: Uuid) -> PaymentResult<Option<Transaction>> {
        let row: Option<TransactionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM transactions WHERE id = $1",
            SELECT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;
        row.map(Transaction::try_from).transpose()
    }

    async fn find_by_reference(&self, reference: &str) -> PaymentResult<Option<Transaction>> {
        self.fetch_by_reference(reference).await
    }

    async fn find_by_provider_transaction_id(
        &self,
        provider: ProviderName,
        provider_transaction_id: &str,
    ) -> PaymentResult<Option<Transaction>> {
        let row: Option<TransactionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM transactions \
             WHERE provider = $1 AND provider_transaction_id = $2",
            SELECT_COLUMNS
        ))
        .bind(provider.as_str())
        .bind(provider_transaction_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;
        row.map(Transaction::try_from).transpose()
    }

    async fn set_provider_transaction_id(
        &self,
        id: Uuid,
        provider_transaction_id: &str,
    ) -> PaymentResult<Transaction> {
        let row: Option<TransactionRow> = sqlx::query_as(&format!(
            "UPDATE transactions \
             SET provider_transaction_id = $2, updated_at = NOW() \
             WHERE id = $1 AND provider_transaction_id IS NULL \
             RETURNING {}",
            SELECT_COLUMNS
        ))
        .bind(id)
        .bind(provider_transaction_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        match row {
            Some(row) => row.try_into(),
            // Identifier already set; return the row as stored.
            None => self.find_by_id(id).await?.ok_or_else(|| not_found(id)),
        }
    }

    async fn finalize_if_pending(
        &self,
        id: Uuid,
        status: TransactionStatus,
        error_code: Option<&str>,
        error_message: Option<&str>,
    ) -> PaymentResult<bool> {
        if !status.is_terminal() {
            return Err(PaymentError::Store {
                message: format!("refusing to finalize to non-terminal status {}", status),
            });
        }
        let result = sqlx::query(
            "UPDATE transactions \
             SET status = $2, error_code = $3, error_message = $4, updated_at = NOW() \
             WHERE id = $1 AND status = 'pending'",
        )
        .bind(id)
        .bind(status.as_str())
        .bind(error_code)
        .bind(error_message)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(result.rows_affected() == 1)
    }
}
