use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Invoice status. Stored as text; parsed strictly on every write so
/// arbitrary strings can never reach the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Pending,
    Paid,
    Overdue,
    Disputed,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Disputed => "disputed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(InvoiceStatus::Pending),
            "paid" => Some(InvoiceStatus::Paid),
            "overdue" => Some(InvoiceStatus::Overdue),
            "disputed" => Some(InvoiceStatus::Disputed),
            _ => None,
        }
    }
}

/// Billing cadence attached to facilities and invoices. Descriptive
/// metadata only, never an automation trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingPeriod {
    Monthly,
    Quarterly,
    SemiAnnual,
}

impl BillingPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingPeriod::Monthly => "monthly",
            BillingPeriod::Quarterly => "quarterly",
            BillingPeriod::SemiAnnual => "semi_annual",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "monthly" => Some(BillingPeriod::Monthly),
            "quarterly" => Some(BillingPeriod::Quarterly),
            "semi_annual" => Some(BillingPeriod::SemiAnnual),
            _ => None,
        }
    }
}

/// Invoice row. The joined counterparty columns are only present on
/// queries that select them: `facility_name`/`facility_email` on
/// organization-side reads, `organization_name`/`organization_email`
/// on facility-side reads.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Invoice {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub facility_id: Uuid,
    pub invoice_number: String,
    pub amount: Decimal,
    pub due_date: NaiveDate,
    pub billing_period: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub status: String,
    pub file_path: Option<String>,
    pub generated_pdf_path: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[sqlx(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facility_name: Option<String>,
    #[sqlx(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facility_email: Option<String>,
    #[sqlx(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_name: Option<String>,
    #[sqlx(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_email: Option<String>,
}

/// Input for creating an invoice. Status is always "pending" on create
/// and is not part of the input.
#[derive(Debug, Clone)]
pub struct CreateInvoice {
    pub organization_id: Uuid,
    pub facility_id: Uuid,
    pub invoice_number: String,
    pub amount: Decimal,
    pub due_date: NaiveDate,
    pub billing_period: BillingPeriod,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub file_path: Option<String>,
    pub generated_pdf_path: Option<String>,
    pub notes: Option<String>,
}

/// Organization-wide invoice aggregates.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct InvoiceTotals {
    pub total_invoices: i64,
    pub pending_count: i64,
    pub paid_count: i64,
    pub overdue_count: i64,
    pub disputed_count: i64,
    pub total_amount: Decimal,
    pub pending_amount: Decimal,
    pub paid_amount: Decimal,
}

/// Per-facility breakdown row. Facilities with zero invoices appear
/// with zero counts (outer-join semantics).
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct FacilityInvoiceStats {
    pub id: Uuid,
    pub name: String,
    pub invoice_count: i64,
    pub paid_count: i64,
    pub total_amount: Decimal,
    pub paid_amount: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct InvoiceStats {
    pub overall: InvoiceTotals,
    pub by_facility: Vec<FacilityInvoiceStats>,
}
