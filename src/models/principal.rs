use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// The two authenticating principal kinds. Every authorization check in
/// the portal dispatches on this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Organization,
    Facility,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Organization => "organization",
            Role::Facility => "facility",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Organization account row.
#[derive(Debug, Clone, FromRow)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Facility account row. A facility is an independent login principal
/// owned by exactly one organization.
#[derive(Debug, Clone, FromRow)]
pub struct Facility {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub billing_period: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public-safe facility projection. Never carries the password hash.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct FacilityPublic {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub billing_period: String,
    pub created_at: DateTime<Utc>,
}

/// Common identity projection returned by login and profile reads.
#[derive(Debug, Clone, Serialize)]
pub struct Principal {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl Principal {
    pub fn from_organization(org: &Organization) -> Self {
        Self {
            id: org.id,
            name: org.name.clone(),
            email: org.email.clone(),
            role: Role::Organization,
        }
    }

    pub fn from_facility(facility: &Facility) -> Self {
        Self {
            id: facility.id,
            name: facility.name.clone(),
            email: facility.email.clone(),
            role: Role::Facility,
        }
    }
}

/// Input for creating a facility (password already hashed).
#[derive(Debug, Clone)]
pub struct CreateFacility {
    pub organization_id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub billing_period: String,
}

/// Merge-patch update: a missing field leaves the stored value unchanged.
#[derive(Debug, Clone, Default)]
pub struct UpdateFacility {
    pub name: Option<String>,
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub billing_period: Option<String>,
}
