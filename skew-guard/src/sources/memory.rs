use super::FeatureSource;
use crate::core::RecordSet;
use crate::prelude::*;
use async_trait::async_trait;

/// A source over a record set that is already in memory.
#[derive(Debug, Clone)]
pub struct MemorySource {
    set: RecordSet,
}

impl MemorySource {
    /// Wraps a record set.
    pub fn new(set: RecordSet) -> Self {
        Self { set }
    }
}

#[async_trait]
impl FeatureSource for MemorySource {
    async fn load(&self) -> Result<RecordSet> {
        Ok(self.set.clone())
    }

    fn description(&self) -> String {
        format!("in-memory records '{}' ({} rows)", self.set.name(), self.set.len())
    }
}
