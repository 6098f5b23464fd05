use crate::core::dao::{TableDescriptor, TableRecord};
use crate::core::domain::transaction::ToSql;

pub const AUDIT_LOG_TABLE: TableDescriptor = TableDescriptor {
    name: "audit_log",
    columns: &["actor_id", "action"],
    id_column: "actor_id",
};

/// One row of the audit trail. Written in an independent transaction so it
/// survives a rollback of the business operation that produced it.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub actor_id: i32,
    pub action: String,
}

impl TableRecord for AuditEntry {
    fn values(&self) -> Vec<Box<dyn ToSql>> {
        vec![
            Box::new(self.actor_id) as Box<dyn ToSql>,
            Box::new(self.action.clone()) as Box<dyn ToSql>,
        ]
    }
}
