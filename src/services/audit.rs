use crate::models::AuditEntry;
use crate::services::database::Database;

/// Fire-and-forget audit writer. Recording never fails the calling
/// request; a lost entry is logged and swallowed.
#[derive(Clone)]
pub struct AuditTrail {
    db: Database,
}

impl AuditTrail {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn record(&self, entry: AuditEntry) {
        let action = entry.action;
        if let Err(e) = self.db.insert_audit(&entry).await {
            tracing::warn!(action = action, error = %e, "Failed to write audit entry");
        }
    }
}
