//! Request and response shapes for the HTTP surface.

pub mod auth;
pub mod facility;
pub mod invoice;
pub mod payment;

pub use auth::{LoginRequest, LoginResponse};
pub use facility::{CreateFacilityRequest, UpdateFacilityRequest};
pub use invoice::{InvoiceListQuery, UpdateStatusRequest};
pub use payment::PaymentProofForm;
