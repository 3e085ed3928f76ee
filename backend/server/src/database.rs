//! # Redis
//!
//! Document database.
//!
//! Core purpose is to hold the task and volunteer documents and keep them in creation order for paging.
//!
//! ## Requirements
//!
//! - Whole-document reads and writes, one task per request
//! - Small dataset, a handful of tasks and at most a few hundred volunteers
//! - Stable ordering so `limit`/`skip` pages do not shuffle between requests
//!
//! ## Implementation
//!
//! - Documents: JSON strings under `{prefix}:task:{id}` and `{prefix}:volunteer:{id}`
//! - Indexes: sorted sets `{prefix}:tasks` and `{prefix}:volunteers`, scored by `INCR {prefix}:seq`
//!   so documents created in the same millisecond still page in insert order
//! - Inserts and deletes touch document + index inside one `MULTI` pipeline
//! - Saves overwrite the document with `SET .. XX`, no version check, last writer wins,
//!   but a deleted task is never written back
//! - Index members whose document is gone are skipped on read
use std::time::Duration;

use async_trait::async_trait;
use redis::{
    AsyncCommands, Client, ExistenceCheck, SetOptions,
    aio::{ConnectionManager, ConnectionManagerConfig},
};
use serde::{Serialize, de::DeserializeOwned};
use tracing::info;
use uuid::Uuid;

use crate::{
    models::{Task, Volunteer},
    store::{Page, Store, StoreError},
};

const TASK: &str = "task";
const TASKS: &str = "tasks";
const VOLUNTEER: &str = "volunteer";
const VOLUNTEERS: &str = "volunteers";
const SEQ: &str = "seq";

pub async fn init_redis(redis_url: &str) -> Result<ConnectionManager, StoreError> {
    let config = ConnectionManagerConfig::new()
        .set_number_of_retries(1)
        .set_connection_timeout(Duration::from_millis(500));

    let client = Client::open(redis_url)?;
    let connection_manager = client.get_connection_manager_with_config(config).await?;

    info!("Connected to Redis");

    Ok(connection_manager)
}

pub struct RedisStore {
    connection: ConnectionManager,
    prefix: String,
}

impl RedisStore {
    pub fn new(connection: ConnectionManager, prefix: impl Into<String>) -> Self {
        Self {
            connection,
            prefix: prefix.into(),
        }
    }

    fn document_key(&self, kind: &str, id: Uuid) -> String {
        format!("{}:{kind}:{id}", self.prefix)
    }

    fn index_key(&self, index: &str) -> String {
        format!("{}:{index}", self.prefix)
    }

    async fn insert<T: Serialize>(
        &self,
        kind: &str,
        index: &str,
        id: Uuid,
        document: &T,
    ) -> Result<(), StoreError> {
        let json = serde_json::to_string(document)?;
        let mut connection = self.connection.clone();
        let score: i64 = connection.incr(self.index_key(SEQ), 1).await?;

        let _: () = redis::pipe()
            .atomic()
            .set(self.document_key(kind, id), json)
            .ignore()
            .zadd(self.index_key(index), id.to_string(), score)
            .ignore()
            .query_async(&mut connection)
            .await?;

        Ok(())
    }

    async fn get<T: DeserializeOwned>(&self, kind: &str, id: Uuid) -> Result<Option<T>, StoreError> {
        let mut connection = self.connection.clone();
        let json: Option<String> = connection.get(self.document_key(kind, id)).await?;

        Ok(json.map(|json| serde_json::from_str(&json)).transpose()?)
    }

    async fn get_many<T: DeserializeOwned>(
        &self,
        kind: &str,
        ids: &[String],
    ) -> Result<Vec<T>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = ids
            .iter()
            .map(|id| format!("{}:{kind}:{id}", self.prefix))
            .collect();

        let mut connection = self.connection.clone();
        let documents: Vec<Option<String>> = connection.mget(keys).await?;

        documents
            .into_iter()
            .flatten()
            .map(|json| serde_json::from_str(&json).map_err(StoreError::from))
            .collect()
    }

    async fn delete(&self, kind: &str, index: &str, id: Uuid) -> Result<bool, StoreError> {
        let mut connection = self.connection.clone();

        let (deleted, _): (i64, i64) = redis::pipe()
            .atomic()
            .del(self.document_key(kind, id))
            .zrem(self.index_key(index), id.to_string())
            .query_async(&mut connection)
            .await?;

        Ok(deleted > 0)
    }

    async fn page_ids(&self, index: &str, page: Page) -> Result<Vec<String>, StoreError> {
        if page.limit == 0 {
            return Ok(Vec::new());
        }

        let start = page.skip.min(isize::MAX as usize) as isize;
        let stop = start.saturating_add(page.limit.min(isize::MAX as usize) as isize - 1);

        let mut connection = self.connection.clone();
        let ids: Vec<String> = connection.zrange(self.index_key(index), start, stop).await?;

        Ok(ids)
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn insert_task(&self, task: &Task) -> Result<(), StoreError> {
        self.insert(TASK, TASKS, task.id, task).await
    }

    async fn get_task(&self, id: Uuid) -> Result<Option<Task>, StoreError> {
        self.get(TASK, id).await
    }

    async fn save_task(&self, task: &Task) -> Result<bool, StoreError> {
        let json = serde_json::to_string(task)?;
        let mut connection = self.connection.clone();
        let only_existing = SetOptions::default().conditional_set(ExistenceCheck::XX);

        let written: Option<String> = connection
            .set_options(self.document_key(TASK, task.id), json, only_existing)
            .await?;

        Ok(written.is_some())
    }

    async fn delete_task(&self, id: Uuid) -> Result<bool, StoreError> {
        self.delete(TASK, TASKS, id).await
    }

    async fn list_tasks(&self, page: Page) -> Result<Vec<Task>, StoreError> {
        let ids = self.page_ids(TASKS, page).await?;

        self.get_many(TASK, &ids).await
    }

    async fn insert_volunteer(&self, volunteer: &Volunteer) -> Result<(), StoreError> {
        self.insert(VOLUNTEER, VOLUNTEERS, volunteer.id, volunteer)
            .await
    }

    async fn get_volunteers(&self, ids: &[Uuid]) -> Result<Vec<Volunteer>, StoreError> {
        let ids: Vec<String> = ids.iter().map(Uuid::to_string).collect();

        self.get_many(VOLUNTEER, &ids).await
    }

    async fn find_volunteer_by_name(&self, name: &str) -> Result<Option<Volunteer>, StoreError> {
        let volunteers = self.list_volunteers(Page::ALL).await?;

        Ok(volunteers
            .into_iter()
            .find(|volunteer| volunteer.name == name))
    }

    async fn delete_volunteer(&self, id: Uuid) -> Result<bool, StoreError> {
        self.delete(VOLUNTEER, VOLUNTEERS, id).await
    }

    async fn list_volunteers(&self, page: Page) -> Result<Vec<Volunteer>, StoreError> {
        let ids = self.page_ids(VOLUNTEERS, page).await?;

        self.get_many(VOLUNTEER, &ids).await
    }
}
