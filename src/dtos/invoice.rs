use serde::Deserialize;
use uuid::Uuid;

/// Invoice list filters. Both are optional and combinable; the status
/// filter is scoped to the caller's own invoices either way.
#[derive(Debug, Deserialize, Default)]
pub struct InvoiceListQuery {
    pub status: Option<String>,
    pub facility_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: Option<String>,
}
