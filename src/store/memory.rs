//! In-memory store used by tests and local development.

use super::{not_found, InsertOutcome, Transaction, TransactionStore};
use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::types::{ProviderName, TransactionStatus};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
pub struct InMemoryTransactionStore {
    inner: RwLock<HashMap<Uuid, Transaction>>,
}

impl InMemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransactionStore for InMemoryTransactionStore {
    async fn insert_if_absent(&self, transaction: Transaction) -> PaymentResult<InsertOutcome> {
        let mut map = self.inner.write().await;
        if let Some(existing) = map.values().find(|t| t.reference == transaction.reference) {
            return Ok(InsertOutcome::Existing(existing.clone()));
        }
        map.insert(transaction.id, transaction.clone());
        Ok(InsertOutcome::Created(transaction))
    }

    async fn find_by_id(&self, id: Uuid) -> PaymentResult<Option<Transaction>> {
        Ok(self.inner.read().await.get(&id).cloned())
    }

    async fn find_by_reference(&self, reference: &str) -> PaymentResult<Option<Transaction>> {
        Ok(self
            .inner
            .read()
            .await
            .values()
            .find(|t| t.reference == reference)
            .cloned())
    }

    async fn find_by_provider_transaction_id(
        &self,
        provider: ProviderName,
        provider_transaction_id: &str,
    ) -> PaymentResult<Option<Transaction>> {
        Ok(self
            .inner
            .read()
            .await
            .values()
            .find(|t| {
                t.provider == provider
                    && t.provider_transaction_id.as_deref() == Some(provider_transaction_id)
            })
            .cloned())
    }

    async fn set_provider_transaction_id(
        &self,
        id: Uuid,
        provider_transaction_id: &str,
    ) -> PaymentResult<Transaction> {
        let mut map = self.inner.write().await;
        let tx = map.get_mut(&id).ok_or_else(|| not_found(id))?;
        if tx.provider_transaction_id.is_none() {
            tx.provider_transaction_id = Some(provider_transaction_id.to_string());
            tx.updated_at = Utc::now();
        }
        Ok(tx.clone())
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
        let mut map = self.inner.write().await;
        let tx = map.get_mut(&id).ok_or_else(|| not_found(id))?;
        if tx.status != TransactionStatus::Pending {
            return Ok(false);
        }
        tx.status = status;
        tx.error_code = error_code.map(|s| s.to_string());
        tx.error_message = error_message.map(|s| s.to_string());
        tx.updated_at = Utc::now();
        Ok(true)
    }
}
