use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{Mutation, RecordRepository, RepositoryError};
use crate::jobs::{JobRecord, JobSummary};

/// Volatile repository keeping every record in a map.
///
/// All writes take the map's write lock, so `update` is atomic per record.
/// Records vanish when the process exits.
#[derive(Default)]
pub struct MemoryRepository {
    records: RwLock<HashMap<String, JobRecord>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, JobRecord>> {
        match self.records.read() {
            Ok(g) => g,
            Err(poisoned) => {
                log::warn!("Memory repository lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, JobRecord>> {
        match self.records.write() {
            Ok(g) => g,
            Err(poisoned) => {
                log::warn!("Memory repository lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

impl RecordRepository for MemoryRepository {
    fn create(&self, record: &JobRecord) -> Result<(), RepositoryError> {
        let mut records = self.write();
        if records.contains_key(&record.id) {
            return Err(RepositoryError::AlreadyExists(record.id.clone()));
        }
        records.insert(record.id.clone(), record.clone());
        Ok(())
    }

    fn fetch(&self, id: &str) -> Result<Option<JobRecord>, RepositoryError> {
        Ok(self.read().get(id).cloned())
    }

    fn update(&self, id: &str, mutation: Mutation<'_>) -> Result<JobRecord, RepositoryError> {
        let mut records = self.write();
        let stored = records
            .get_mut(id)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;

        // Mutate a copy so a rejected transition leaves the stored record intact.
        let mut candidate = stored.clone();
        mutation(&mut candidate)?;
        *stored = candidate.clone();
        Ok(candidate)
    }

    fn delete(&self, id: &str) -> Result<JobRecord, RepositoryError> {
        self.write()
            .remove(id)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    fn list(&self) -> Result<Vec<JobSummary>, RepositoryError> {
        let mut summaries: Vec<JobSummary> = self.read().values().map(JobRecord::summary).collect();
        summaries.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(summaries)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
