//! Task records and their persistence.
//!
//! The engine does not interpret tasks. It hands the list to the content
//! surface on request and persists whatever comes back verbatim, order
//! included. Completion logic lives entirely on the surface side; the
//! engine's only notion of "done" is the unlock request it receives.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;
use crate::store::KeyValueStore;

/// Store key the task list lives under.
pub const TASKS_KEY: &str = "tasks";

/// One task record, in the wire shape the content surface uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub text: String,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            completed: false,
            created_at: Utc::now(),
        }
    }
}

/// Starter tasks written on first run so the surface never opens empty.
pub fn seed_tasks() -> Vec<Task> {
    vec![
        Task::new("1", "Review today's priorities"),
        Task::new("2", "Clear your inbox"),
        Task::new("3", "Plan tomorrow"),
    ]
}

/// Task list access over the key-value store.
pub struct TaskBook {
    store: Arc<dyn KeyValueStore>,
}

impl TaskBook {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Load the task list.
    ///
    /// First run seeds the store with [`seed_tasks`] and serves those. An
    /// unreadable or malformed store degrades to an empty list rather
    /// than failing the caller; a locked-in user with no task list is
    /// worse than one with a fresh list.
    pub async fn load(&self) -> Vec<Task> {
        match self.store.get(TASKS_KEY).await {
            Ok(Some(value)) => match serde_json::from_value(value) {
                Ok(tasks) => tasks,
                Err(e) => {
                    warn!(error = %e, "Stored task list is malformed, serving empty list");
                    Vec::new()
                }
            },
            Ok(None) => {
                let seed = seed_tasks();
                if let Err(e) = self.save(&seed).await {
                    warn!(error = %e, "Could not persist seed tasks");
                }
                seed
            }
            Err(e) => {
                warn!(error = %e, "Task store unreadable, serving empty list");
                Vec::new()
            }
        }
    }

    /// Persist the list verbatim, replacing whatever was stored.
    pub async fn save(&self, tasks: &[Task]) -> Result<()> {
        self.store.set(TASKS_KEY, serde_json::to_value(tasks)?).await
    }
}
