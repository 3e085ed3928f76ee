//! # Documents
//!
//! Shapes persisted in the store and returned to the client grid.
//!
//! ## Stored
//! - Task: name, ordered hour slots, timestamps
//! - Hour slot: integer **index** (hour column) + volunteer ids
//! - Volunteer: name, **#RRGGBB** color, timestamps
//!
//! ## Returned
//! - Tasks come back with every volunteer id resolved to `{id, name, color}`
//! - Ids that no longer resolve are dropped, never surfaced as errors
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub name: String,
    pub hour_index: Vec<HourSlot>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct HourSlot {
    pub index: u32,
    pub volunteers: Vec<Uuid>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Volunteer {
    pub id: Uuid,
    pub name: String,
    pub color: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct VolunteerView {
    pub id: Uuid,
    pub name: String,
    pub color: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct HourSlotView {
    pub index: u32,
    pub volunteers: Vec<VolunteerView>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskView {
    pub id: Uuid,
    pub name: String,
    pub hour_index: Vec<HourSlotView>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// New task with `hours` empty slots indexed `0..hours`.
    pub fn new(name: String, hours: u32) -> Self {
        let now = Utc::now();

        Self {
            id: Uuid::new_v4(),
            name,
            hour_index: (0..hours).map(HourSlot::empty).collect(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn slot_mut(&mut self, index: u32) -> Option<&mut HourSlot> {
        self.hour_index.iter_mut().find(|slot| slot.index == index)
    }

    /// Appends an empty slot unless one with `index` already exists.
    pub fn add_hour(&mut self, index: u32) -> bool {
        if self.hour_index.iter().any(|slot| slot.index == index) {
            return false;
        }

        self.hour_index.push(HourSlot::empty(index));
        true
    }

    pub fn remove_hour(&mut self, index: u32) -> bool {
        let before = self.hour_index.len();
        self.hour_index.retain(|slot| slot.index != index);

        self.hour_index.len() != before
    }

    /// Pulls `volunteer` out of every slot, returning whether anything changed.
    pub fn pull_volunteer(&mut self, volunteer: Uuid) -> bool {
        let mut changed = false;
        for slot in &mut self.hour_index {
            changed |= slot.remove(volunteer);
        }

        changed
    }

    pub fn volunteer_ids(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.hour_index
            .iter()
            .flat_map(|slot| slot.volunteers.iter().copied())
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn resolve(self, volunteers: &HashMap<Uuid, VolunteerView>) -> TaskView {
        TaskView {
            id: self.id,
            name: self.name,
            hour_index: self
                .hour_index
                .into_iter()
                .map(|slot| HourSlotView {
                    index: slot.index,
                    volunteers: slot
                        .volunteers
                        .iter()
                        .filter_map(|id| volunteers.get(id).cloned())
                        .collect(),
                })
                .collect(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl HourSlot {
    pub fn empty(index: u32) -> Self {
        Self {
            index,
            volunteers: Vec::new(),
        }
    }

    /// Idempotent: a volunteer already in the slot is not added twice.
    pub fn add(&mut self, volunteer: Uuid) -> bool {
        if self.volunteers.contains(&volunteer) {
            return false;
        }

        self.volunteers.push(volunteer);
        true
    }

    pub fn remove(&mut self, volunteer: Uuid) -> bool {
        let before = self.volunteers.len();
        self.volunteers.retain(|id| *id != volunteer);

        self.volunteers.len() != before
    }
}

impl Volunteer {
    pub fn new(name: String, color: String) -> Self {
        let now = Utc::now();

        Self {
            id: Uuid::new_v4(),
            name,
            color,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn view(&self) -> VolunteerView {
        VolunteerView {
            id: self.id,
            name: self.name.clone(),
            color: self.color.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_new_task_slots() {
        let task = Task::new("Setup".to_string(), 10);

        assert_eq!(task.hour_index.len(), 10);
        assert!(task.hour_index.iter().all(|slot| slot.volunteers.is_empty()));
        assert_eq!(
            task.hour_index.iter().map(|s| s.index).collect::<Vec<_>>(),
            (0..10).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_add_hour_guards_duplicates() {
        let mut task = Task::new("Setup".to_string(), 2);

        assert!(!task.add_hour(1));
        assert!(task.add_hour(7));
        assert_eq!(task.hour_index.len(), 3);
        assert_eq!(task.hour_index.last().map(|s| s.index), Some(7));
    }

    #[test]
    fn test_add_then_remove_hour_restores_count() {
        let mut task = Task::new("Setup".to_string(), 10);

        task.add_hour(10);
        task.remove_hour(10);
        assert_eq!(task.hour_index.len(), 10);
        assert!(!task.remove_hour(42));
    }

    #[test]
    fn test_slot_add_is_idempotent() {
        let mut slot = HourSlot::empty(0);
        let id = Uuid::new_v4();

        assert!(slot.add(id));
        assert!(!slot.add(id));
        assert_eq!(slot.volunteers, vec![id]);
        assert!(slot.remove(id));
        assert!(!slot.remove(id));
    }

    #[test]
    fn test_pull_volunteer_everywhere() {
        let mut task = Task::new("Setup".to_string(), 3);
        let id = Uuid::new_v4();
        let other = Uuid::new_v4();

        for index in 0..3 {
            task.slot_mut(index).unwrap().add(id);
        }
        task.slot_mut(1).unwrap().add(other);

        assert!(task.pull_volunteer(id));
        assert_eq!(task.volunteer_ids().collect::<Vec<_>>(), vec![other]);
        assert!(!task.pull_volunteer(id));
    }

    #[test]
    fn test_resolve_drops_dangling() {
        let mut task = Task::new("Setup".to_string(), 1);
        let ava = Volunteer::new("Ava".to_string(), "#AABBCC".to_string());
        let slot = task.slot_mut(0).unwrap();
        slot.add(ava.id);
        slot.add(Uuid::new_v4());

        let lookup = HashMap::from([(ava.id, ava.view())]);
        let view = task.resolve(&lookup);

        assert_eq!(view.hour_index[0].volunteers, vec![ava.view()]);
    }

    #[test]
    fn test_task_json_shape() {
        let task = Task::new("Setup".to_string(), 1);
        let value = serde_json::to_value(task.resolve(&HashMap::new())).unwrap();

        assert_eq!(value["hourIndex"], json!([{ "index": 0, "volunteers": [] }]));
        assert!(value.get("createdAt").is_some());
        assert!(value.get("updatedAt").is_some());
    }
}
