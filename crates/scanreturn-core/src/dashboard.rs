use serde::Serialize;

use crate::record::TagRecord;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub total: usize,
    pub active: usize,
    pub unbound: usize,
}

impl DashboardStats {
    #[must_use]
    pub fn from_records(records: &[TagRecord]) -> Self {
        let active = records.iter().filter(|record| record.is_active()).count();
        Self {
            total: records.len(),
            active,
            unbound: records.len() - active,
        }
    }
}
