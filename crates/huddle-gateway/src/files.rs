use std::collections::HashMap;

use huddle_types::models::{FileId, FileRecord};
use huddle_types::store::{FileRepository, StoreError, StoreResult};

/// In-memory catalog of published uploads.
#[derive(Default)]
pub struct FileCatalog {
    records: HashMap<FileId, FileRecord>,
}

impl FileCatalog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FileRepository for FileCatalog {
    fn insert(&mut self, record: FileRecord) -> StoreResult<()> {
        if self.records.contains_key(&record.id) {
            return Err(StoreError::Backend(format!("duplicate file id {}", record.id)));
        }
        self.records.insert(record.id, record);
        Ok(())
    }

    fn get(&self, id: FileId) -> StoreResult<Option<FileRecord>> {
        Ok(self.records.get(&id).cloned())
    }
}
