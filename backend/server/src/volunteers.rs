//! # Volunteers
//!
//! Operations behind `/volunteers`. Volunteers are never edited in place:
//! they are created, listed, and deleted by name.
//!
//! Deleting a volunteer also pulls its id out of every task's hour slots, so
//! the grid never keeps a reference the store can no longer resolve.
use tracing::{debug, info};

use crate::{
    error::AppError,
    models::{Volunteer, VolunteerView},
    store::{Page, Store},
    utils::{sanitize, validate_color, validate_name},
};

pub async fn create_volunteer(
    store: &dyn Store,
    name: Option<&str>,
    color: Option<&str>,
) -> Result<VolunteerView, AppError> {
    let name = validate_name(name, "Volunteer")?;
    let color = validate_color(color)?;

    let volunteer = Volunteer::new(name, color);
    store.insert_volunteer(&volunteer).await?;

    info!("Volunteer saved: {} ({})", volunteer.name, volunteer.id);
    Ok(volunteer.view())
}

pub async fn list_volunteers(store: &dyn Store, page: Page) -> Result<Vec<VolunteerView>, AppError> {
    let volunteers = store.list_volunteers(page).await?;

    Ok(volunteers.iter().map(Volunteer::view).collect())
}

pub async fn delete_volunteer(store: &dyn Store, name: Option<&str>) -> Result<(), AppError> {
    let name = name.map(sanitize).unwrap_or_default();
    if name.is_empty() {
        return Err(AppError::Validation("Volunteer name is required".to_string()));
    }

    let volunteer = store
        .find_volunteer_by_name(&name)
        .await?
        .ok_or_else(|| AppError::NotFound("Volunteer not found".to_string()))?;

    if !store.delete_volunteer(volunteer.id).await? {
        return Err(AppError::NotFound("Volunteer not found".to_string()));
    }

    let pulled = pull_from_tasks(store, &volunteer).await?;
    info!(
        "Volunteer deleted: {} ({}), removed from {pulled} tasks",
        volunteer.name, volunteer.id
    );

    Ok(())
}

async fn pull_from_tasks(store: &dyn Store, volunteer: &Volunteer) -> Result<usize, AppError> {
    let mut pulled = 0;

    for mut task in store.list_tasks(Page::ALL).await? {
        if !task.pull_volunteer(volunteer.id) {
            continue;
        }

        task.touch();
        if !store.save_task(&task).await? {
            debug!("Task {} deleted before volunteer {} was pulled", task.id, volunteer.id);
            continue;
        }

        debug!("Pulled volunteer {} from task {}", volunteer.id, task.id);
        pulled += 1;
    }

    Ok(pulled)
}
