use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Payment proof row: facility-submitted evidence that an invoice was
/// paid, pending manual organization review. The joined columns are
/// only present on queries that select them.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PaymentProof {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub facility_id: Uuid,
    pub file_path: String,
    pub payment_date: NaiveDate,
    pub payment_method: Option<String>,
    pub reference_number: Option<String>,
    pub notes: Option<String>,
    pub uploaded_at: DateTime<Utc>,
    #[sqlx(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_number: Option<String>,
    #[sqlx(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,
    #[sqlx(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facility_name: Option<String>,
}

/// Input for recording a payment proof.
#[derive(Debug, Clone)]
pub struct CreatePaymentProof {
    pub invoice_id: Uuid,
    pub facility_id: Uuid,
    pub file_path: String,
    pub payment_date: NaiveDate,
    pub payment_method: Option<String>,
    pub reference_number: Option<String>,
    pub notes: Option<String>,
}
