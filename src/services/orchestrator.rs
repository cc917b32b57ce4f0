//! Payment orchestration.
//!
//! The orchestrator owns the transaction lifecycle: it validates requests,
//! routes them to a gateway adapter, persists state transitions through the
//! store's conditional writes and reconciles asynchronous callbacks.

use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::registry::ProviderRegistry;
use crate::payments::types::{
    BalanceResponse, CallbackEvent, KycRequest, KycResponse, PaymentRequest, ProviderName,
    StatusRequest, TransactionStatus,
};
use crate::payments::utils::generate_reference;
use crate::phone;
use crate::store::{Transaction, TransactionStore};
use std::sync::Arc;
use tracing::{info, warn};

pub struct PaymentOrchestrator {
    store: Arc<dyn TransactionStore>,
    registry: Arc<ProviderRegistry>,
}

impl PaymentOrchestrator {
    pub fn new(store: Arc<dyn TransactionStore>, registry: Arc<ProviderRegistry>) -> Self {
        Self { store, registry }
    }

    fn validate(request: &PaymentRequest) -> PaymentResult<()> {
        request.amount.validate_positive("amount")?;
        if request.description.trim().is_empty() {
            return Err(PaymentError::Validation {
                message: "description is required".to_string(),
                field: Some("description".to_string()),
            });
        }
        if let Some(phone_number) = request.customer.phone.as_deref() {
            let validation = phone::validate(phone_number);
            if !validation.is_possible {
                return Err(PaymentError::InvalidPhoneNumber {
                    number: phone_number.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Initiate a payment. Retrying with the same reference returns the
    /// already-stored transaction without touching the gateway again.
    ///
    /// The pending row is persisted before the gateway call so a crash or
    /// timeout mid-flight can never lose a transaction the gateway may have
    /// accepted.
    pub async fn initiate_payment(
        &self,
        mut request: PaymentRequest,
    ) -> PaymentResult<Transaction> {
        Self::validate(&request)?;

        let provider = self.registry.select(&request)?;
        let adapter = self.registry.get(provider)?;

        let reference = match request.reference.clone() {
            Some(reference) if !reference.trim().is_empty() => reference,
            _ => generate_reference(),
        };
        request.reference = Some(reference.clone());
        request.provider = Some(provider);

        let pending = Transaction::new_pending(
            reference.clone(),
            provider,
            request.amount.amount.clone(),
            request.amount.currency.clone(),
            request.customer.phone.clone(),
            request.description.clone(),
        );
        let outcome = self.store.insert_if_absent(pending).await?;
        if !outcome.was_created() {
            let existing = outcome.into_transaction();
            info!(
                reference = %reference,
                transaction_id = %existing.id,
                status = %existing.status,
                "duplicate initiation, returning stored transaction"
            );
            return Ok(existing);
        }
        let transaction = outcome.into_transaction();

        info!(
            reference = %reference,
            provider = %provider,
            amount = %request.amount.amount,
            currency = %request.amount.currency,
            "initiating payment"
        );

        match adapter.initiate_payment(request).await {
            Ok(response) => {
                if let Some(gateway_id) = response.provider_transaction_id.as_deref() {
                    let updated = self
                        .store
                        .set_provider_transaction_id(transaction.id, gateway_id)
                        .await?;
                    return Ok(updated);
                }
                Ok(transaction)
            }
            Err(err @ PaymentError::ProviderTimeout { .. }) => {
                // The gateway may have accepted the request; the transaction
                // stays pending until a callback or status poll settles it.
                warn!(
                    reference = %reference,
                    provider = %provider,
                    "gateway timed out, transaction left pending"
                );
                Err(err)
            }
            Err(err) => {
                let applied = self
                    .store
                    .finalize_if_pending(
                        transaction.id,
                        TransactionStatus::Failed,
                        Some(err.error_code()),
                        Some(&err.to_string()),
                    )
                    .await?;
                warn!(
                    reference = %reference,
                    provider = %provider,
                    error = %err,
                    finalized = applied,
                    "payment initiation failed"
                );
                Err(err)
            }
        }
    }

    /// Look a transaction up by its engine reference or, failing that, its
    /// transaction id.
    async fn resolve(&self, key: &str) -> PaymentResult<Transaction> {
        if let Some(tx) = self.store.find_by_reference(key).await? {
            return Ok(tx);
        }
        if let Ok(id) = key.parse::<uuid::Uuid>() {
            if let Some(tx) = self.store.find_by_id(id).await? {
                return Ok(tx);
            }
        }
        Err(PaymentError::TransactionNotFound {
            id: key.to_string(),
        })
    }

    /// Poll the gateway for a pending transaction and reconcile the stored
    /// state. Terminal transactions are returned as stored without a
    /// gateway round trip.
    pub async fn check_transaction_status(&self, reference: &str) -> PaymentResult<Transaction> {
        let transaction = self.resolve(reference).await?;

        if transaction.status.is_terminal() {
            return Ok(transaction);
        }

        let adapter = self.registry.get(transaction.provider)?;
        let response = adapter
            .get_payment_status(StatusRequest {
                reference: Some(transaction.reference.clone()),
                provider_transaction_id: transaction.provider_transaction_id.clone(),
            })
            .await?;

        if response.status.is_terminal() {
            let applied = self
                .store
                .finalize_if_pending(transaction.id, response.status, None, response.message.as_deref())
                .await?;
            if !applied {
                info!(
                    reference = %reference,
                    "transaction settled concurrently during status poll"
                );
            }
            return self
                .store
                .find_by_id(transaction.id)
                .await?
                .ok_or_else(|| PaymentError::TransactionNotFound {
                    id: transaction.id.to_string(),
                });
        }

        Ok(transaction)
    }

    /// Cancel a pending transaction. A gateway that refuses (or cannot
    /// cancel) leaves the transaction untouched.
    pub async fn cancel_transaction(&self, reference: &str) -> PaymentResult<Transaction> {
        let transaction = self.resolve(reference).await?;

        if transaction.status != TransactionStatus::Pending {
            return Err(PaymentError::Validation {
                message: format!(
                    "only pending transactions can be cancelled, current status is {}",
                    transaction.status
                ),
                field: Some("status".to_string()),
            });
        }

        let adapter = self.registry.get(transaction.provider)?;
        let cancelled = adapter
            .cancel_payment(StatusRequest {
                reference: Some(transaction.reference.clone()),
                provider_transaction_id: transaction.provider_transaction_id.clone(),
            })
            .await?;

        if !cancelled {
            return Err(PaymentError::ProviderRejected {
                provider: transaction.provider.to_string(),
                code: None,
                message: "gateway declined the cancellation".to_string(),
            });
        }

        self.store
            .finalize_if_pending(transaction.id, TransactionStatus::Cancelled, None, None)
            .await?;
        self.store
            .find_by_id(transaction.id)
            .await?
            .ok_or_else(|| PaymentError::TransactionNotFound {
                id: transaction.id.to_string(),
            })
    }

    /// Apply a verified gateway callback.
    ///
    /// Every event is logged verbatim before any state change. Events that
    /// match no stored transaction, carry no terminal status, or arrive
    /// after another writer settled the transaction are logged and dropped,
    /// never errored: the gateway should not retry them.
    pub async fn apply_callback(&self, event: CallbackEvent) -> PaymentResult<()> {
        info!(
            provider = %event.provider,
            reference = event.reference.as_deref().unwrap_or("-"),
            provider_transaction_id = event.provider_transaction_id.as_deref().unwrap_or("-"),
            raw_status = event.raw_status.as_deref().unwrap_or("-"),
            payload = %event.payload,
            "gateway callback received"
        );

        let transaction = self.resolve_callback_target(&event).await?;
        let Some(transaction) = transaction else {
            warn!(
                provider = %event.provider,
                reference = event.reference.as_deref().unwrap_or("-"),
                provider_transaction_id = event.provider_transaction_id.as_deref().unwrap_or("-"),
                "callback matches no stored transaction, dropped"
            );
            return Ok(());
        };

        if let Some(gateway_id) = event.provider_transaction_id.as_deref() {
            if transaction.provider_transaction_id.is_none() {
                self.store
                    .set_provider_transaction_id(transaction.id, gateway_id)
                    .await?;
            }
        }

        let Some(status) = event.status.filter(|s| s.is_terminal()) else {
            info!(
                reference = %transaction.reference,
                raw_status = event.raw_status.as_deref().unwrap_or("-"),
                "callback carries no terminal status, transaction unchanged"
            );
            return Ok(());
        };

        let applied = self
            .store
            .finalize_if_pending(
                transaction.id,
                status,
                None,
                event.message.as_deref(),
            )
            .await?;

        if applied {
            info!(
                reference = %transaction.reference,
                status = %status,
                "transaction settled by callback"
            );
        } else if transaction.status != status {
            warn!(
                reference = %transaction.reference,
                stored_status = %transaction.status,
                callback_status = %status,
                "late callback disagrees with settled status, dropped"
            );
        }
        Ok(())
    }

    async fn resolve_callback_target(
        &self,
        event: &CallbackEvent,
    ) -> PaymentResult<Option<Transaction>> {
        if let Some(gateway_id) = event.provider_transaction_id.as_deref() {
            if let Some(tx) = self
                .store
                .find_by_provider_transaction_id(event.provider, gateway_id)
                .await?
            {
                return Ok(Some(tx));
            }
        }
        if let Some(reference) = event.reference.as_deref() {
            return self.store.find_by_reference(reference).await;
        }
        Ok(None)
    }

    pub async fn check_balance(&self, provider: ProviderName) -> PaymentResult<BalanceResponse> {
        self.registry.get(provider)?.check_balance().await
    }

    pub async fn perform_kyc(
        &self,
        provider: ProviderName,
        request: KycRequest,
    ) -> PaymentResult<KycResponse> {
        self.registry.get(provider)?.perform_kyc(request).await
    }
}
