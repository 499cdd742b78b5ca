//! Services module for the invoicing portal.

pub mod audit;
pub mod database;
pub mod document;
pub mod jwt;
pub mod metrics;
pub mod storage;

pub use audit::AuditTrail;
pub use database::Database;
pub use document::{render_invoice_pdf, InvoiceDocument};
pub use jwt::{Claims, JwtService};
pub use storage::{FileStore, StagedUpload, UploadKind};
