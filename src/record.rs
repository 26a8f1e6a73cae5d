/// Shared record fields composed into every persisted entity
use crate::datetime::DateTime;

/// Numeric ID plus creation/modification stamps. Entities hold a `Record`
/// by value; no trait machinery is needed since callers always work with
/// the concrete entity types.
#[derive(Debug, Clone, Default)]
pub struct Record {
    pub id: i64,
    pub created: DateTime,
    pub modified: DateTime,
}

impl Record {
    /// A fresh record with created == modified == now. The ID is assigned
    /// by the owning manager.
    pub fn new() -> Self {
        let now = DateTime::now();
        Self {
            id: 0,
            created: now,
            modified: now,
        }
    }
}
