use chrono::NaiveDate;
use uuid::Uuid;

/// Accumulated multipart fields for a payment proof upload. Collected
/// field by field from the form body before validation.
#[derive(Debug, Default)]
pub struct PaymentProofForm {
    pub invoice_id: Option<Uuid>,
    pub payment_date: Option<NaiveDate>,
    pub payment_method: Option<String>,
    pub reference_number: Option<String>,
    pub notes: Option<String>,
}
