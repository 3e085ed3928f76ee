use std::sync::Arc;

use axum::{
    Json,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::{
    config::Config,
    error::AppError,
    state::AppState,
    store::Page,
    tasks::{self, SlotAction, VolunteerLookup},
    utils::{parse_id, sanitize},
    volunteers,
};

#[derive(Deserialize)]
pub struct PageQuery {
    limit: Option<usize>,
    skip: Option<usize>,
}

impl PageQuery {
    fn page(&self, config: &Config) -> Page {
        let limit = self
            .limit
            .unwrap_or(config.page_limit)
            .min(config.max_page_limit);

        Page::new(limit, self.skip.unwrap_or(0))
    }
}

#[derive(Deserialize)]
pub struct IdQuery {
    id: Option<String>,
}

#[derive(Deserialize)]
pub struct NameQuery {
    name: Option<String>,
}

#[derive(Deserialize)]
pub struct NewTask {
    name: Option<String>,
}

#[derive(Deserialize)]
pub struct NewVolunteer {
    name: Option<String>,
    color: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PatchAction {
    Add,
    Remove,
    AddHour,
    RemoveHour,
}

/// Either a bare id or the volunteer object the grid holds.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub enum VolunteerRef {
    Id(String),
    Object {
        #[serde(default, alias = "_id")]
        id: Option<String>,
        #[serde(default)]
        name: Option<String>,
    },
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PatchTask {
    task_id: Option<String>,
    name: Option<String>,
    hour_index: Option<u32>,
    volunteer: Option<VolunteerRef>,
    action: Option<PatchAction>,
}

impl VolunteerRef {
    fn lookup(self) -> Result<VolunteerLookup, AppError> {
        match self {
            VolunteerRef::Id(id) | VolunteerRef::Object { id: Some(id), .. } => {
                parse_id(Some(id.as_str()), "Volunteer").map(VolunteerLookup::Id)
            }
            VolunteerRef::Object {
                id: None,
                name: Some(name),
            } => match sanitize(&name) {
                name if name.is_empty() => Err(volunteer_required()),
                name => Ok(VolunteerLookup::Name(name)),
            },
            VolunteerRef::Object { .. } => Err(volunteer_required()),
        }
    }
}

pub async fn create_task_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NewTask>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;

    let task = tasks::create_task(
        &*state.store,
        payload.name.as_deref(),
        state.config.default_hours,
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Task saved successfully", "task": task })),
    ))
}

pub async fn list_tasks_handler(
    State(state): State<Arc<AppState>>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(query) = query?;

    let tasks = tasks::list_tasks(&*state.store, query.page(&state.config)).await?;

    Ok(Json(tasks))
}

pub async fn delete_task_handler(
    State(state): State<Arc<AppState>>,
    query: Result<Query<IdQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(query) = query?;
    let task_id = tasks::task_id(query.id.as_deref())?;

    tasks::delete_task(&*state.store, task_id).await?;

    Ok(Json(json!({ "message": "Task deleted successfully" })))
}

pub async fn patch_task_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PatchTask>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    debug!("PATCH /tasks payload: {payload:?}");

    let store = &*state.store;
    let task_id = tasks::task_id(payload.task_id.as_deref())?;

    let (task, message) = match payload.action {
        Some(action @ (PatchAction::Add | PatchAction::Remove)) => {
            let hour = require_hour(payload.hour_index)?;
            let volunteer = payload
                .volunteer
                .ok_or_else(|| AppError::Validation("Volunteer is required".to_string()))?
                .lookup()?;
            let action = match action {
                PatchAction::Add => SlotAction::Add,
                _ => SlotAction::Remove,
            };

            let task = tasks::assign_volunteer(store, task_id, hour, volunteer, action).await?;
            (task, "Volunteer assignment updated successfully")
        }
        Some(PatchAction::AddHour) => {
            let hour = require_hour(payload.hour_index)?;

            (tasks::add_hour(store, task_id, hour).await?, "Hour added successfully")
        }
        Some(PatchAction::RemoveHour) => {
            let hour = require_hour(payload.hour_index)?;

            (
                tasks::remove_hour(store, task_id, hour).await?,
                "Hour removed successfully",
            )
        }
        None if payload.name.is_some() => (
            tasks::rename_task(store, task_id, payload.name.as_deref()).await?,
            "Task name updated successfully",
        ),
        None => {
            return Err(AppError::Validation(
                "Either a name or an action is required".to_string(),
            ));
        }
    };

    Ok(Json(json!({ "message": message, "task": task })))
}

pub async fn create_volunteer_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NewVolunteer>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;

    let volunteer = volunteers::create_volunteer(
        &*state.store,
        payload.name.as_deref(),
        payload.color.as_deref(),
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Volunteer saved successfully", "volunteer": volunteer })),
    ))
}

pub async fn list_volunteers_handler(
    State(state): State<Arc<AppState>>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(query) = query?;

    let volunteers =
        volunteers::list_volunteers(&*state.store, query.page(&state.config)).await?;

    Ok(Json(volunteers))
}

pub async fn delete_volunteer_handler(
    State(state): State<Arc<AppState>>,
    query: Result<Query<NameQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(query) = query?;

    volunteers::delete_volunteer(&*state.store, query.name.as_deref()).await?;

    Ok(Json(json!({ "message": "Volunteer deleted successfully" })))
}

fn require_hour(hour: Option<u32>) -> Result<u32, AppError> {
    hour.ok_or_else(|| AppError::Validation("Hour index is required".to_string()))
}

fn volunteer_required() -> AppError {
    AppError::Validation("Volunteer id or name is required".to_string())
}
