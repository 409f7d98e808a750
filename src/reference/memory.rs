//! In-memory reference index

use std::collections::HashMap;

use crate::error::Result;

use super::ReferenceIndex;

#[derive(Debug, Default)]
pub struct MemoryReference {
    map: HashMap<String, String>,
}

impl MemoryReference {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReferenceIndex for MemoryReference {
    fn get(&mut self, key: &str) -> Result<Option<String>> {
        Ok(self.map.get(key).cloned())
    }

    fn set(&mut self, key: &str, shard: &str) -> Result<()> {
        self.map.insert(key.to_string(), shard.to_string());
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<()> {
        self.map.remove(key);
        Ok(())
    }

    fn size(&mut self) -> Result<usize> {
        Ok(self.map.len())
    }

    fn clear(&mut self) -> Result<()> {
        self.map.clear();
        Ok(())
    }

    fn persist(&mut self) -> Result<()> {
        Ok(())
    }

    fn is_disk_resident(&self) -> bool {
        false
    }
}
