//! # Conversation State Module
//!
//! Tracks where each user is in a multi-step flow and keeps a per-user
//! scratchpad of transient values (model name, selected model id, prompt
//! text, uploaded photo references). Everything lives in memory; a restart
//! loses all sessions.
//!
//! The state map and the scratch map are guarded by two independent locks.
//! No atomicity is promised across the two: a single user's updates arrive
//! serially from the chat transport, so read-then-write races are not a
//! concern here.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::debug;

/// Scratch keys that survive `reset_state` and a whole-map `clear_data`,
/// so flows that straddle a reset (media-group training, in-place message
/// editing) keep what they need.
pub const PRESERVED_KEYS: &[&str] = &["model_name", "model_type", "chat_id"];

/// Conversation position of a single user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UserState {
    #[default]
    Idle,
    UploadingPhotos,
    EnteringModelName,
    SelectingModelType,
    TrainingModel,
    SelectingModel,
    EnteringPrompt,
    GeneratingImages,
    EnteringModelNameForMediaGroup,
    SelectingModelTypeForMediaGroup,
}

#[derive(Debug)]
struct SessionData {
    values: HashMap<String, Value>,
    last_activity: Instant,
}

impl SessionData {
    fn new() -> Self {
        Self {
            values: HashMap::new(),
            last_activity: Instant::now(),
        }
    }
}

/// In-memory store of conversation states and scratch data, keyed by
/// Telegram user id. Created once at startup and shared by reference.
#[derive(Debug, Default)]
pub struct StateManager {
    states: Mutex<HashMap<i64, UserState>>,
    data: Mutex<HashMap<i64, SessionData>>,
}

impl StateManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state for a user; unseen users are `Idle`.
    pub fn get_state(&self, user_id: i64) -> UserState {
        self.touch(user_id);
        let states = self.states.lock().unwrap();
        states.get(&user_id).copied().unwrap_or_default()
    }

    pub fn set_state(&self, user_id: i64, state: UserState) {
        debug!(user_id, ?state, "Setting user state");
        self.touch(user_id);
        let mut states = self.states.lock().unwrap();
        states.insert(user_id, state);
    }

    /// Back to `Idle` with scratch cleared, keeping the preserved keys.
    pub fn reset_state(&self, user_id: i64) {
        debug!(user_id, "Resetting user state");
        {
            let mut states = self.states.lock().unwrap();
            states.insert(user_id, UserState::Idle);
        }
        self.clear_data(user_id, None);
    }

    /// One scratch value, cloned. Missing users and missing keys are both
    /// `None`, never an error.
    pub fn get_data(&self, user_id: i64, key: &str) -> Option<Value> {
        let mut data = self.data.lock().unwrap();
        let session = data.entry(user_id).or_insert_with(SessionData::new);
        session.last_activity = Instant::now();
        session.values.get(key).cloned()
    }

    /// The entire scratch mapping, cloned. Empty for unseen users.
    pub fn get_all_data(&self, user_id: i64) -> HashMap<String, Value> {
        let mut data = self.data.lock().unwrap();
        let session = data.entry(user_id).or_insert_with(SessionData::new);
        session.last_activity = Instant::now();
        session.values.clone()
    }

    /// Store one scratch value. The store owns its copy; later mutation of
    /// anything the caller kept cannot reach it.
    pub fn set_data(&self, user_id: i64, key: &str, value: Value) {
        debug!(user_id, key, "Setting user data");
        let mut data = self.data.lock().unwrap();
        let session = data.entry(user_id).or_insert_with(SessionData::new);
        session.last_activity = Instant::now();
        session.values.insert(key.to_string(), value);
    }

    /// Bulk-merge a mapping into scratch.
    pub fn update_data(&self, user_id: i64, values: HashMap<String, Value>) {
        debug!(user_id, keys = values.len(), "Updating user data");
        let mut data = self.data.lock().unwrap();
        let session = data.entry(user_id).or_insert_with(SessionData::new);
        session.last_activity = Instant::now();
        session.values.extend(values);
    }

    /// Remove one key, or all keys when `key` is `None`. Clearing everything
    /// keeps the preserved keys; clearing an absent key is a no-op.
    pub fn clear_data(&self, user_id: i64, key: Option<&str>) {
        let mut data = self.data.lock().unwrap();
        let Some(session) = data.get_mut(&user_id) else {
            return;
        };
        session.last_activity = Instant::now();
        match key {
            Some(key) => {
                session.values.remove(key);
                debug!(user_id, key, "Cleared user data key");
            }
            None => {
                session.values.retain(|k, _| PRESERVED_KEYS.contains(&k.as_str()));
                debug!(user_id, "Cleared user data");
            }
        }
    }

    /// Clear scratch keeping an explicit key set — for flow starts that
    /// must drop leftovers the default allow-list would keep.
    pub fn clear_data_except(&self, user_id: i64, keep: &[&str]) {
        let mut data = self.data.lock().unwrap();
        let Some(session) = data.get_mut(&user_id) else {
            return;
        };
        session.last_activity = Instant::now();
        session.values.retain(|k, _| keep.contains(&k.as_str()));
        debug!(user_id, ?keep, "Cleared user data except kept keys");
    }

    /// Append a value to a list-valued key, creating the list on first use.
    pub fn add_to_list(&self, user_id: i64, key: &str, value: Value) {
        let mut data = self.data.lock().unwrap();
        let session = data.entry(user_id).or_insert_with(SessionData::new);
        session.last_activity = Instant::now();
        let entry = session
            .values
            .entry(key.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        match entry {
            Value::Array(items) => items.push(value),
            other => *other = Value::Array(vec![value]),
        }
    }

    /// Read a list-valued key; missing user or key yields an empty list.
    pub fn get_list(&self, user_id: i64, key: &str) -> Vec<Value> {
        match self.get_data(user_id, key) {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        }
    }

    /// `get_list` narrowed to string items (photo references and the like).
    pub fn get_string_list(&self, user_id: i64, key: &str) -> Vec<String> {
        self.get_list(user_id, key)
            .into_iter()
            .filter_map(|v| v.as_str().map(|s| s.to_string()))
            .collect()
    }

    /// Scratch string accessor.
    pub fn get_string(&self, user_id: i64, key: &str) -> Option<String> {
        self.get_data(user_id, key)
            .and_then(|v| v.as_str().map(|s| s.to_string()))
    }

    /// Scratch integer accessor.
    pub fn get_i64(&self, user_id: i64, key: &str) -> Option<i64> {
        self.get_data(user_id, key).and_then(|v| v.as_i64())
    }

    /// Drop every session idle longer than `ttl`. Returns how many were
    /// removed. Invoked periodically by the background sweeper.
    pub fn cleanup_inactive_sessions(&self, ttl: Duration) -> usize {
        let stale: Vec<i64> = {
            let data = self.data.lock().unwrap();
            data.iter()
                .filter(|(_, session)| session.last_activity.elapsed() > ttl)
                .map(|(user_id, _)| *user_id)
                .collect()
        };
        if stale.is_empty() {
            return 0;
        }
        {
            let mut data = self.data.lock().unwrap();
            for user_id in &stale {
                data.remove(user_id);
            }
        }
        {
            let mut states = self.states.lock().unwrap();
            for user_id in &stale {
                states.remove(user_id);
            }
        }
        debug!(count = stale.len(), "Swept inactive sessions");
        stale.len()
    }

    fn touch(&self, user_id: i64) {
        let mut data = self.data.lock().unwrap();
        data.entry(user_id)
            .or_insert_with(SessionData::new)
            .last_activity = Instant::now();
    }
}

/// Validates a model name entered by the user
pub fn validate_model_name(name: &str) -> Result<String, &'static str> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err("empty");
    }

    if trimmed.chars().count() > crate::config::MAX_MODEL_NAME_LEN {
        return Err("too_long");
    }

    Ok(trimmed.to_string())
}

/// Validates a generation prompt entered by the user
pub fn validate_prompt(prompt: &str) -> Result<String, &'static str> {
    let trimmed = prompt.trim();

    if trimmed.is_empty() {
        return Err("empty");
    }

    if trimmed.chars().count() > crate::config::MAX_PROMPT_LEN {
        return Err("too_long");
    }

    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_model_name_validation() {
        assert!(validate_model_name("Summer").is_ok());
        assert!(validate_model_name("  Summer shoot  ").is_ok());

        assert!(validate_model_name("").is_err());
        assert!(validate_model_name("   ").is_err());
        assert!(validate_model_name(&"a".repeat(31)).is_err());
    }

    #[test]
    fn test_model_name_trimming() {
        let result = validate_model_name("  Summer  ");
        assert_eq!(result.unwrap(), "Summer");
    }

    #[test]
    fn test_prompt_validation() {
        assert!(validate_prompt("portrait in a studio").is_ok());
        assert!(validate_prompt(&"p".repeat(500)).is_ok());
        assert!(validate_prompt(&"p".repeat(501)).is_err());
        assert!(validate_prompt("").is_err());
    }

    #[test]
    fn test_list_replaces_non_list_value() {
        let state = StateManager::new();
        state.set_data(1, "photos", json!("not-a-list"));
        state.add_to_list(1, "photos", json!("file-1"));
        assert_eq!(state.get_string_list(1, "photos"), vec!["file-1"]);
    }
}
