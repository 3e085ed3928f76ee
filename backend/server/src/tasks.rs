//! # Tasks
//!
//! Operations behind `/tasks`.
//!
//! Each mutation is one read-modify-write of a single task document:
//! load, change in memory, save, then resolve volunteer ids for the reply.
//! Nothing is locked between the load and the save, so two edits racing on the
//! same task resolve as last writer wins. A save never recreates a task that was
//! deleted in between; that edit fails with 404 instead.
use std::collections::{HashMap, HashSet};

use tracing::debug;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{Task, TaskView},
    store::{Page, Store},
    utils::{parse_id, validate_name},
};

/// How a PATCH identifies the volunteer to remove from a slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VolunteerLookup {
    Id(Uuid),
    /// Older clients only send the display name.
    Name(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotAction {
    Add,
    Remove,
}

pub async fn create_task(
    store: &dyn Store,
    name: Option<&str>,
    hours: u32,
) -> Result<TaskView, AppError> {
    let name = validate_name(name, "Task")?;
    let task = Task::new(name, hours);

    store.insert_task(&task).await?;
    debug!("Created task {} with {hours} hours", task.id);

    Ok(task.resolve(&HashMap::new()))
}

pub async fn list_tasks(store: &dyn Store, page: Page) -> Result<Vec<TaskView>, AppError> {
    let tasks = store.list_tasks(page).await?;

    resolve(store, tasks).await
}

pub async fn rename_task(
    store: &dyn Store,
    task_id: Uuid,
    name: Option<&str>,
) -> Result<TaskView, AppError> {
    let name = validate_name(name, "Task")?;

    let mut task = load(store, task_id).await?;
    task.name = name;

    save(store, task).await
}

pub async fn delete_task(store: &dyn Store, task_id: Uuid) -> Result<(), AppError> {
    if !store.delete_task(task_id).await? {
        return Err(task_not_found());
    }

    debug!("Deleted task {task_id}");
    Ok(())
}

pub async fn assign_volunteer(
    store: &dyn Store,
    task_id: Uuid,
    hour: u32,
    volunteer: VolunteerLookup,
    action: SlotAction,
) -> Result<TaskView, AppError> {
    let mut task = load(store, task_id).await?;

    let Some(slot) = task.slot_mut(hour) else {
        return Err(AppError::NotFound("Hour slot not found".to_string()));
    };

    let volunteer_id = match (action, volunteer) {
        (_, VolunteerLookup::Id(id)) => id,
        (SlotAction::Add, VolunteerLookup::Name(_)) => {
            return Err(AppError::Validation("Volunteer id is required".to_string()));
        }
        // Names are not unique, so only the slot's own volunteers are candidates.
        (SlotAction::Remove, VolunteerLookup::Name(name)) => store
            .get_volunteers(&slot.volunteers)
            .await?
            .into_iter()
            .find(|volunteer| volunteer.name == name)
            .map(|volunteer| volunteer.id)
            .ok_or_else(not_assigned)?,
    };

    if action == SlotAction::Add && store.get_volunteers(&[volunteer_id]).await?.is_empty() {
        return Err(volunteer_not_found());
    }

    match action {
        SlotAction::Add => {
            if !slot.add(volunteer_id) {
                debug!("Volunteer {volunteer_id} already in hour {hour} of task {task_id}");
            }
        }
        SlotAction::Remove => {
            if !slot.remove(volunteer_id) {
                return Err(not_assigned());
            }
        }
    }

    save(store, task).await
}

pub async fn add_hour(store: &dyn Store, task_id: Uuid, hour: u32) -> Result<TaskView, AppError> {
    let mut task = load(store, task_id).await?;

    if !task.add_hour(hour) {
        debug!("Hour {hour} already exists on task {task_id}");
        return resolve_one(store, task).await;
    }

    save(store, task).await
}

pub async fn remove_hour(
    store: &dyn Store,
    task_id: Uuid,
    hour: u32,
) -> Result<TaskView, AppError> {
    let mut task = load(store, task_id).await?;

    if !task.remove_hour(hour) {
        return resolve_one(store, task).await;
    }

    save(store, task).await
}

/// Parses a raw id from a request, mapping failures to 400.
pub fn task_id(raw: Option<&str>) -> Result<Uuid, AppError> {
    parse_id(raw, "Task")
}

async fn load(store: &dyn Store, task_id: Uuid) -> Result<Task, AppError> {
    store.get_task(task_id).await?.ok_or_else(task_not_found)
}

async fn save(store: &dyn Store, mut task: Task) -> Result<TaskView, AppError> {
    task.touch();
    if !store.save_task(&task).await? {
        return Err(task_not_found());
    }

    resolve_one(store, task).await
}

async fn resolve_one(store: &dyn Store, task: Task) -> Result<TaskView, AppError> {
    let mut resolved = resolve(store, vec![task]).await?;

    resolved
        .pop()
        .ok_or_else(|| AppError::NotFound("Task not found".to_string()))
}

/// Joins volunteer ids to name/color with one lookup for the whole batch.
async fn resolve(store: &dyn Store, tasks: Vec<Task>) -> Result<Vec<TaskView>, AppError> {
    let ids: Vec<Uuid> = tasks
        .iter()
        .flat_map(|task| task.volunteer_ids())
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();

    let lookup: HashMap<_, _> = store
        .get_volunteers(&ids)
        .await?
        .into_iter()
        .map(|volunteer| (volunteer.id, volunteer.view()))
        .collect();

    Ok(tasks.into_iter().map(|task| task.resolve(&lookup)).collect())
}

fn task_not_found() -> AppError {
    AppError::NotFound("Task not found".to_string())
}

fn volunteer_not_found() -> AppError {
    AppError::NotFound("Volunteer not found".to_string())
}

fn not_assigned() -> AppError {
    AppError::NotFound("Volunteer not assigned to this hour".to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{models::Volunteer, store::MemoryStore};

    async fn seeded() -> (Arc<MemoryStore>, TaskView, Volunteer) {
        let store = MemoryStore::new();
        let task = create_task(&*store, Some("Setup"), 10).await.unwrap();
        let ava = Volunteer::new("Ava".to_string(), "#AABBCC".to_string());
        store.insert_volunteer(&ava).await.unwrap();

        (store, task, ava)
    }

    #[tokio::test]
    async fn test_create_rejects_empty_name() {
        let store = MemoryStore::new();

        let err = create_task(&*store, Some(""), 10).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(store.list_tasks(Page::ALL).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_assign_twice_keeps_one() {
        let (store, task, ava) = seeded().await;

        for _ in 0..2 {
            assign_volunteer(
                &*store,
                task.id,
                3,
                VolunteerLookup::Id(ava.id),
                SlotAction::Add,
            )
            .await
            .unwrap();
        }

        let stored = store.get_task(task.id).await.unwrap().unwrap();
        assert_eq!(stored.hour_index[3].volunteers, vec![ava.id]);
    }

    #[tokio::test]
    async fn test_assign_unknown_volunteer() {
        let (store, task, _) = seeded().await;

        let err = assign_volunteer(
            &*store,
            task.id,
            0,
            VolunteerLookup::Id(Uuid::new_v4()),
            SlotAction::Add,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_assign_missing_slot() {
        let (store, task, ava) = seeded().await;

        let err = assign_volunteer(
            &*store,
            task.id,
            99,
            VolunteerLookup::Id(ava.id),
            SlotAction::Add,
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "Hour slot not found");
    }

    #[tokio::test]
    async fn test_remove_by_name() {
        let (store, task, ava) = seeded().await;

        assign_volunteer(
            &*store,
            task.id,
            1,
            VolunteerLookup::Id(ava.id),
            SlotAction::Add,
        )
        .await
        .unwrap();

        let view = assign_volunteer(
            &*store,
            task.id,
            1,
            VolunteerLookup::Name("Ava".to_string()),
            SlotAction::Remove,
        )
        .await
        .unwrap();
        assert!(view.hour_index[1].volunteers.is_empty());
    }

    #[tokio::test]
    async fn test_remove_by_name_matches_slot_member() {
        let (store, task, first) = seeded().await;
        let second = Volunteer::new("Ava".to_string(), "#112233".to_string());
        store.insert_volunteer(&second).await.unwrap();

        for (hour, id) in [(0, second.id), (1, first.id)] {
            assign_volunteer(
                &*store,
                task.id,
                hour,
                VolunteerLookup::Id(id),
                SlotAction::Add,
            )
            .await
            .unwrap();
        }

        let view = assign_volunteer(
            &*store,
            task.id,
            0,
            VolunteerLookup::Name("Ava".to_string()),
            SlotAction::Remove,
        )
        .await
        .unwrap();
        assert!(view.hour_index[0].volunteers.is_empty());

        let stored = store.get_task(task.id).await.unwrap().unwrap();
        assert_eq!(stored.hour_index[1].volunteers, vec![first.id]);
    }

    #[tokio::test]
    async fn test_remove_unknown_name_leaves_slot() {
        let (store, task, ava) = seeded().await;
        assign_volunteer(
            &*store,
            task.id,
            4,
            VolunteerLookup::Id(ava.id),
            SlotAction::Add,
        )
        .await
        .unwrap();
        let before = store.get_task(task.id).await.unwrap().unwrap();

        let err = assign_volunteer(
            &*store,
            task.id,
            4,
            VolunteerLookup::Name("Bea".to_string()),
            SlotAction::Remove,
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "Volunteer not assigned to this hour");

        let after = store.get_task(task.id).await.unwrap().unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_edit_racing_delete_is_not_found() {
        let (store, task, _) = seeded().await;
        let mut loaded = load(&*store, task.id).await.unwrap();

        delete_task(&*store, task.id).await.unwrap();
        loaded.add_hour(10);

        assert!(matches!(
            save(&*store, loaded).await,
            Err(AppError::NotFound(_))
        ));
        assert!(store.get_task(task.id).await.unwrap().is_none());
        assert!(matches!(
            delete_task(&*store, task.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_remove_absent_leaves_slot() {
        let (store, task, ava) = seeded().await;
        let before = store.get_task(task.id).await.unwrap().unwrap();

        let err = assign_volunteer(
            &*store,
            task.id,
            2,
            VolunteerLookup::Id(ava.id),
            SlotAction::Remove,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let after = store.get_task(task.id).await.unwrap().unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_hours_round_trip() {
        let (store, task, _) = seeded().await;

        let added = add_hour(&*store, task.id, 10).await.unwrap();
        assert_eq!(added.hour_index.len(), 11);

        let again = add_hour(&*store, task.id, 10).await.unwrap();
        assert_eq!(again.hour_index.len(), 11);

        let removed = remove_hour(&*store, task.id, 10).await.unwrap();
        assert_eq!(removed.hour_index.len(), 10);
    }

    #[tokio::test]
    async fn test_rename_and_delete() {
        let (store, task, _) = seeded().await;

        let renamed = rename_task(&*store, task.id, Some("Teardown"))
            .await
            .unwrap();
        assert_eq!(renamed.name, "Teardown");
        assert!(renamed.updated_at >= task.updated_at);

        delete_task(&*store, task.id).await.unwrap();
        assert!(matches!(
            delete_task(&*store, task.id).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            rename_task(&*store, task.id, Some("Again")).await,
            Err(AppError::NotFound(_))
        ));
    }
}
