//! HTTP handlers for the invoicing portal.

pub mod auth;
pub mod facility;
pub mod invoice;
pub mod payment;
pub mod system;
