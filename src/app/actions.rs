use anyhow::Result;

use crate::model::CategoryColor;
use crate::storage::{CategoryDeleteOutcome, EventDraft, StorageHandle};

pub struct ActionDispatcher<'a> {
    storage: &'a StorageHandle,
}

impl<'a> ActionDispatcher<'a> {
    pub fn new(storage: &'a StorageHandle) -> Self {
        Self { storage }
    }

    pub fn create_event(&self, draft: &EventDraft) -> Result<i64> {
        self.storage.create_event(draft)
    }

    pub fn update_event(&self, event_id: i64, draft: &EventDraft) -> Result<()> {
        self.storage.update_event(event_id, draft)
    }

    pub fn delete_event(&self, event_id: i64) -> Result<()> {
        self.storage.delete_event(event_id)
    }

    pub fn toggle_important(&self, event_id: i64, important: bool) -> Result<()> {
        self.storage.set_event_important(event_id, important)
    }

    pub fn create_category(&self, name: &str, color: CategoryColor) -> Result<i64> {
        self.storage.create_category(name, color, None)
    }

    pub fn update_category(&self, category_id: i64, name: &str, color: CategoryColor) -> Result<()> {
        self.storage.update_category(category_id, name, color)
    }

    pub fn delete_category(&self, category_id: i64) -> Result<CategoryDeleteOutcome> {
        self.storage.delete_category(category_id)
    }
}
