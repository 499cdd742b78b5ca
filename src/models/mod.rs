//! Domain models for the invoicing portal.

mod audit_log;
mod invoice;
mod payment_proof;
mod principal;

pub use audit_log::{actions, entities, AuditEntry};
pub use invoice::{
    BillingPeriod, CreateInvoice, FacilityInvoiceStats, Invoice, InvoiceStats, InvoiceStatus,
    InvoiceTotals,
};
pub use payment_proof::{CreatePaymentProof, PaymentProof};
pub use principal::{
    CreateFacility, Facility, FacilityPublic, Organization, Principal, Role, UpdateFacility,
};
