use serde::Deserialize;

/// Facility creation input. Required fields are optional here so the
/// handler can report missing ones with the portal's validation error.
#[derive(Debug, Deserialize)]
pub struct CreateFacilityRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub billing_period: Option<String>,
}

/// Merge-patch facility update: absent fields keep their stored value.
#[derive(Debug, Deserialize, Default)]
pub struct UpdateFacilityRequest {
    pub name: Option<String>,
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub billing_period: Option<String>,
}
