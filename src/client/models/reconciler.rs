//! Merging server-pushed updates into the state a view already holds.
//!
//! Rules shared by every view:
//! * entities are matched by `id`; a match is shallow-merged in place, a miss
//!   is prepended;
//! * nothing is ever removed because of an event;
//! * lifecycle fields (contract and milestone status) never move backwards;
//! * timestamp-ordered lists are re-sorted newest first after each change,
//!   with missing or unparseable timestamps counted as the epoch.
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::common::models::{Contract, Job, Message, Milestone, Review, Thread, Wallet};
use crate::error::ClientError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Inserted,
    Updated,
    Ignored,
}

/// Something a view keeps in a list and can be patched by a push event.
pub trait Entity: Serialize + DeserializeOwned + Clone {
    fn id(&self) -> &str;

    /// Called after a merge with the value it replaced. Undo anything the
    /// merge is not allowed to do.
    fn settle(&mut self, _previous: &Self) {}
}

impl Entity for Milestone {
    fn id(&self) -> &str {
        &self.id
    }

    fn settle(&mut self, previous: &Self) {
        self.status = previous.status.advance(self.status);
    }
}

impl Entity for Contract {
    fn id(&self) -> &str {
        &self.id
    }

    fn settle(&mut self, previous: &Self) {
        self.status = self.status.max(previous.status);
        for milestone in self.milestones.iter_mut() {
            if let Some(old) = previous.milestone(&milestone.id) {
                milestone.settle(old);
            }
        }
        keep_missing(&mut self.milestones, &previous.milestones);
    }
}

impl Entity for Thread {
    fn id(&self) -> &str {
        &self.id
    }

    fn settle(&mut self, previous: &Self) {
        keep_missing(&mut self.messages, &previous.messages);
    }
}

impl Entity for Message {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Entity for Job {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Entity for Review {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Previously known children absent from a replacement are carried over.
fn keep_missing<T: Entity>(current: &mut Vec<T>, previous: &[T]) {
    for old in previous {
        if old.id().is_empty() {
            continue;
        }
        if !current.iter().any(|c| c.id() == old.id()) {
            current.push(old.clone());
        }
    }
}

/// Overwrites the top-level fields of `current` present in `patch`.
pub fn merge_fields<T: Entity>(current: &T, patch: &Map<String, Value>) -> Result<T, ClientError> {
    let mut merged = match serde_json::to_value(current) {
        Ok(Value::Object(map)) => map,
        Ok(_) | Err(_) => return Err(ClientError::PushPayload("entity is not a JSON object".to_string())),
    };
    for (key, value) in patch {
        merged.insert(key.clone(), value.clone());
    }
    let mut next: T = serde_json::from_value(Value::Object(merged))
        .map_err(|e| ClientError::PushPayload(format!("update does not fit: {}", e)))?;
    next.settle(current);
    Ok(next)
}

/// Plain field overwrite for non-entity state such as the wallet or the
/// dashboard counters.
pub fn overlay<T: Serialize + DeserializeOwned>(current: &T, patch: &Map<String, Value>) -> Result<T, ClientError> {
    let mut merged = match serde_json::to_value(current) {
        Ok(Value::Object(map)) => map,
        Ok(_) | Err(_) => return Err(ClientError::PushPayload("state is not a JSON object".to_string())),
    };
    for (key, value) in patch {
        merged.insert(key.clone(), value.clone());
    }
    serde_json::from_value(Value::Object(merged)).map_err(|e| ClientError::PushPayload(format!("update does not fit: {}", e)))
}

/// Upserts a partial entity given as JSON fields. The patch must carry `id`.
pub fn upsert_fields<T: Entity>(items: &mut Vec<T>, patch: &Map<String, Value>) -> Result<Outcome, ClientError> {
    let id = patch
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| ClientError::PushPayload("update without an id".to_string()))?;

    match items.iter().position(|item| item.id() == id) {
        Some(index) => {
            items[index] = merge_fields(&items[index], patch)?;
            Ok(Outcome::Updated)
        }
        None => {
            let item: T = serde_json::from_value(Value::Object(patch.clone()))
                .map_err(|e| ClientError::PushPayload(format!("incomplete new entity: {}", e)))?;
            items.insert(0, item);
            Ok(Outcome::Inserted)
        }
    }
}

/// Upserts a complete, typed entity.
pub fn upsert<T: Entity>(items: &mut Vec<T>, item: T) -> Outcome {
    match items.iter().position(|existing| existing.id() == item.id()) {
        Some(index) => {
            let mut next = item;
            next.settle(&items[index]);
            items[index] = next;
            Outcome::Updated
        }
        None => {
            items.insert(0, item);
            Outcome::Inserted
        }
    }
}

/// Like [`upsert`] but a new entity goes to the end (chronological lists
/// such as the messages of one thread, or milestones of one contract).
pub fn upsert_tail<T: Entity>(items: &mut Vec<T>, item: T) -> Outcome {
    if item.id().is_empty() {
        items.push(item);
        return Outcome::Inserted;
    }
    match items.iter().position(|existing| existing.id() == item.id()) {
        Some(index) => {
            let mut next = item;
            next.settle(&items[index]);
            items[index] = next;
            Outcome::Updated
        }
        None => {
            items.push(item);
            Outcome::Inserted
        }
    }
}

/// Appends a page to an already loaded list, merging duplicates in place.
pub fn append_page<T: Entity>(items: &mut Vec<T>, page: Vec<T>) {
    for item in page {
        match items.iter().position(|existing| existing.id() == item.id()) {
            Some(index) => {
                let mut next = item;
                next.settle(&items[index]);
                items[index] = next;
            }
            None => items.push(item),
        }
    }
}

pub fn effective_timestamp(raw: Option<&str>) -> DateTime<Utc> {
    raw.and_then(|r| DateTime::parse_from_rfc3339(r.trim()).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Stable sort, newest first.
pub fn sort_newest_first<T, F>(items: &mut [T], timestamp: F)
where
    F: Fn(&T) -> Option<&str>,
{
    items.sort_by(|a, b| effective_timestamp(timestamp(b)).cmp(&effective_timestamp(timestamp(a))));
}

pub fn thread_timestamp(thread: &Thread) -> Option<&str> {
    thread.last_message.as_ref().and_then(|m| m.timestamp.as_deref())
}

/// Wallet pushes carry the whole wallet or just the balance.
pub fn merge_wallet(current: &Wallet, patch: &Map<String, Value>) -> Result<Wallet, ClientError> {
    overlay(current, patch)
}
