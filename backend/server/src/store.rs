//! # Store
//!
//! Document persistence for tasks and volunteers.
//!
//! Backends are plain document stores: they load, save and index whole
//! documents. Validation, idempotent adds and the hour slot rules live in
//! [`crate::tasks`] and [`crate::volunteers`].
//!
//! - [`MemoryStore`]: process-local maps, used by tests and `SCHEDULER_STORE=memory`
//! - [`crate::database::RedisStore`]: JSON documents in Redis
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::RwLock;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Task, Volunteer};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Malformed document: {0}")]
    Document(#[from] serde_json::Error),
}

/// Window over a creation-ordered collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: usize,
    pub skip: usize,
}

impl Page {
    pub const ALL: Page = Page {
        limit: usize::MAX,
        skip: 0,
    };

    pub fn new(limit: usize, skip: usize) -> Self {
        Self { limit, skip }
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_task(&self, task: &Task) -> Result<(), StoreError>;

    async fn get_task(&self, id: Uuid) -> Result<Option<Task>, StoreError>;

    /// Overwrites the whole document. Last writer wins.
    ///
    /// Returns `false`, writing nothing, when the task no longer exists.
    async fn save_task(&self, task: &Task) -> Result<bool, StoreError>;

    /// Returns `false` when no task had that id.
    async fn delete_task(&self, id: Uuid) -> Result<bool, StoreError>;

    async fn list_tasks(&self, page: Page) -> Result<Vec<Task>, StoreError>;

    async fn insert_volunteer(&self, volunteer: &Volunteer) -> Result<(), StoreError>;

    /// Only the ids that exist come back; unknown ids are skipped.
    async fn get_volunteers(&self, ids: &[Uuid]) -> Result<Vec<Volunteer>, StoreError>;

    /// First volunteer, in creation order, carrying `name`.
    async fn find_volunteer_by_name(&self, name: &str) -> Result<Option<Volunteer>, StoreError>;

    async fn delete_volunteer(&self, id: Uuid) -> Result<bool, StoreError>;

    async fn list_volunteers(&self, page: Page) -> Result<Vec<Volunteer>, StoreError>;
}

#[derive(Default)]
pub struct MemoryStore {
    tasks: RwLock<IndexMap<Uuid, Task>>,
    volunteers: RwLock<IndexMap<Uuid, Volunteer>>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

fn window<T: Clone>(map: &IndexMap<Uuid, T>, page: Page) -> Vec<T> {
    map.values()
        .skip(page.skip)
        .take(page.limit)
        .cloned()
        .collect()
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_task(&self, task: &Task) -> Result<(), StoreError> {
        self.tasks.write().insert(task.id, task.clone());

        Ok(())
    }

    async fn get_task(&self, id: Uuid) -> Result<Option<Task>, StoreError> {
        Ok(self.tasks.read().get(&id).cloned())
    }

    async fn save_task(&self, task: &Task) -> Result<bool, StoreError> {
        let mut tasks = self.tasks.write();
        let Some(stored) = tasks.get_mut(&task.id) else {
            return Ok(false);
        };
        *stored = task.clone();

        Ok(true)
    }

    async fn delete_task(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.tasks.write().shift_remove(&id).is_some())
    }

    async fn list_tasks(&self, page: Page) -> Result<Vec<Task>, StoreError> {
        Ok(window(&self.tasks.read(), page))
    }

    async fn insert_volunteer(&self, volunteer: &Volunteer) -> Result<(), StoreError> {
        self.volunteers
            .write()
            .insert(volunteer.id, volunteer.clone());

        Ok(())
    }

    async fn get_volunteers(&self, ids: &[Uuid]) -> Result<Vec<Volunteer>, StoreError> {
        let volunteers = self.volunteers.read();

        Ok(ids
            .iter()
            .filter_map(|id| volunteers.get(id).cloned())
            .collect())
    }

    async fn find_volunteer_by_name(&self, name: &str) -> Result<Option<Volunteer>, StoreError> {
        Ok(self
            .volunteers
            .read()
            .values()
            .find(|volunteer| volunteer.name == name)
            .cloned())
    }

    async fn delete_volunteer(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.volunteers.write().shift_remove(&id).is_some())
    }

    async fn list_volunteers(&self, page: Page) -> Result<Vec<Volunteer>, StoreError> {
        Ok(window(&self.volunteers.read(), page))
    }
}
