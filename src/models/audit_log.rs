use uuid::Uuid;

use super::Role;

/// Audit action names, one per mutating operation.
pub mod actions {
    pub const LOGIN: &str = "login";
    pub const CREATE_FACILITY: &str = "create_facility";
    pub const UPDATE_FACILITY: &str = "update_facility";
    pub const DELETE_FACILITY: &str = "delete_facility";
    pub const CREATE_INVOICE: &str = "create_invoice";
    pub const UPDATE_INVOICE_STATUS: &str = "update_invoice_status";
    pub const DELETE_INVOICE: &str = "delete_invoice";
    pub const UPLOAD_PAYMENT_PROOF: &str = "upload_payment_proof";
    pub const DELETE_PAYMENT_PROOF: &str = "delete_payment_proof";
}

/// Audited entity types. Login entries use the actor's role as the
/// entity type.
pub mod entities {
    pub const FACILITY: &str = "facility";
    pub const INVOICE: &str = "invoice";
    pub const PAYMENT_PROOF: &str = "payment_proof";
}

/// One append-only audit record.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub user_id: Uuid,
    pub user_role: Role,
    pub action: &'static str,
    pub entity_type: &'static str,
    pub entity_id: Option<Uuid>,
    pub details: Option<serde_json::Value>,
    pub ip_address: Option<String>,
}

impl AuditEntry {
    pub fn new(
        user_id: Uuid,
        user_role: Role,
        action: &'static str,
        entity_type: &'static str,
    ) -> Self {
        Self {
            user_id,
            user_role,
            action,
            entity_type,
            entity_id: None,
            details: None,
            ip_address: None,
        }
    }

    pub fn entity(mut self, id: Uuid) -> Self {
        self.entity_id = Some(id);
        self
    }

    pub fn details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn origin(mut self, ip: String) -> Self {
        self.ip_address = Some(ip);
        self
    }
}
