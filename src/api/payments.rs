use crate::api::AppState;
use crate::error::AppError;
use crate::payments::types::{
    BalanceResponse, CustomerContact, FeeOwner, KycRequest, KycResponse, Money, PaymentMethod,
    PaymentRequest, ProviderName, TransactionType,
};
use crate::store::Transaction;
use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct InitiatePaymentBody {
    pub amount: String,
    pub currency: String,
    pub description: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub provider: Option<String>,
    pub payment_method: Option<PaymentMethod>,
    pub fee_owner: Option<FeeOwner>,
    pub transaction_type: Option<TransactionType>,
    pub reference: Option<String>,
    pub callback_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    pub success: bool,
    pub data: TransactionView,
}

#[derive(Debug, Serialize)]
pub struct TransactionView {
    pub id: String,
    pub reference: String,
    pub provider: ProviderName,
    pub provider_transaction_id: Option<String>,
    pub amount: String,
    pub currency: String,
    pub status: String,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Transaction> for TransactionView {
    fn from(tx: Transaction) -> Self {
        Self {
            id: tx.id.to_string(),
            reference: tx.reference,
            provider: tx.provider,
            provider_transaction_id: tx.provider_transaction_id,
            amount: tx.amount,
            currency: tx.currency,
            status: tx.status.as_str().to_string(),
            error_code: tx.error_code,
            error_message: tx.error_message,
            created_at: tx.created_at.to_rfc3339(),
            updated_at: tx.updated_at.to_rfc3339(),
        }
    }
}

fn parse_provider(raw: &str) -> Result<ProviderName, AppError> {
    Ok(ProviderName::from_str(raw)?)
}

/// POST /payments
pub async fn initiate_payment(
    State(state): State<Arc<AppState>>,
    Json(body): Json<InitiatePaymentBody>,
) -> Result<Json<TransactionResponse>, AppError> {
    let provider = body.provider.as_deref().map(parse_provider).transpose()?;

    let request = PaymentRequest {
        amount: Money {
            amount: body.amount,
            currency: body.currency,
        },
        description: body.description,
        customer: CustomerContact {
            phone: body.phone,
            email: body.email,
        },
        provider,
        payment_method: body.payment_method,
        fee_owner: body.fee_owner,
        transaction_type: body.transaction_type,
        reference: body.reference,
        callback_url: body.callback_url,
    };

    let transaction = state.orchestrator.initiate_payment(request).await?;
    info!(reference = %transaction.reference, "payment accepted");
    Ok(Json(TransactionResponse {
        success: true,
        data: transaction.into(),
    }))
}

/// GET /payments/:reference
pub async fn get_payment_status(
    State(state): State<Arc<AppState>>,
    Path(reference): Path<String>,
) -> Result<Json<TransactionResponse>, AppError> {
    let transaction = state.orchestrator.check_transaction_status(&reference).await?;
    Ok(Json(TransactionResponse {
        success: true,
        data: transaction.into(),
    }))
}

/// POST /payments/:reference/cancel
pub async fn cancel_payment(
    State(state): State<Arc<AppState>>,
    Path(reference): Path<String>,
) -> Result<Json<TransactionResponse>, AppError> {
    let transaction = state.orchestrator.cancel_transaction(&reference).await?;
    Ok(Json(TransactionResponse {
        success: true,
        data: transaction.into(),
    }))
}

#[derive(Debug, Serialize)]
pub struct BalanceEnvelope {
    pub success: bool,
    pub data: BalanceResponse,
}

/// GET /providers/:provider/balance
pub async fn check_balance(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
) -> Result<Json<BalanceEnvelope>, AppError> {
    let provider = parse_provider(&provider)?;
    let balance = state.orchestrator.check_balance(provider).await?;
    Ok(Json(BalanceEnvelope {
        success: true,
        data: balance,
    }))
}

#[derive(Debug, Deserialize)]
pub struct KycBody {
    pub phone: String,
}

#[derive(Debug, Serialize)]
pub struct KycEnvelope {
    pub success: bool,
    pub data: KycResponse,
}

/// POST /providers/:provider/kyc
pub async fn perform_kyc(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    Json(body): Json<KycBody>,
) -> Result<Json<KycEnvelope>, AppError> {
    let provider = parse_provider(&provider)?;
    let kyc = state
        .orchestrator
        .perform_kyc(provider, KycRequest { phone: body.phone })
        .await?;
    Ok(Json(KycEnvelope {
        success: true,
        data: kyc,
    }))
}
