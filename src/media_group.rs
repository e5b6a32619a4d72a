//! # Media-Group Aggregation Module
//!
//! Telegram delivers an album as N independent photo messages sharing a
//! `media_group_id`, and never signals that the last one has arrived. This
//! module buffers the burst per group id and detects completion with a
//! debounce: every arrival (re)schedules a finalize task, and the task only
//! declares the batch ready once a quiet period has elapsed since the most
//! recent photo.
//!
//! The buffer map is only touched from dispatcher callbacks and the
//! scheduled finalize tasks, all under one async lock; the `being_processed`
//! flag on top of that makes finalization idempotent.

use std::collections::HashMap;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Delay between the most recent photo and the finalize attempt.
pub const FINALIZE_DELAY: Duration = Duration::from_secs(2);
/// A finalize attempt only completes the batch if nothing arrived within
/// this window. Always satisfied when the attempt ran its full delay; the
/// check guards stale runs.
pub const QUIET_PERIOD: Duration = Duration::from_millis(1500);

/// One in-flight album upload.
#[derive(Debug)]
pub struct MediaGroupBuffer {
    /// Photos from any other user under the same group id are rejected.
    pub owner_user_id: i64,
    pub chat_id: i64,
    /// Ordered photo references, deduplicated by value.
    pub file_paths: Vec<String>,
    pub last_update: Instant,
    /// Set by the first finalize attempt that gets through; later attempts
    /// no-op.
    pub being_processed: bool,
    /// Status message edited in place as photos arrive.
    pub status_message_id: Option<i32>,
    finalize_task: Option<JoinHandle<()>>,
}

impl MediaGroupBuffer {
    fn new(owner_user_id: i64, chat_id: i64) -> Self {
        Self {
            owner_user_id,
            chat_id,
            file_paths: Vec::new(),
            last_update: Instant::now(),
            being_processed: false,
            status_message_id: None,
            finalize_task: None,
        }
    }
}

/// Outcome of registering one photo event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhotoRegistration {
    /// First photo of an unseen group; the caller should create the status
    /// message.
    NewGroup { count: usize },
    /// Photo appended; the caller should update the status message.
    Added {
        count: usize,
        status_message_id: Option<i32>,
    },
    /// Same file reference delivered again; nothing appended but the group
    /// is still alive, so the debounce restarts.
    AlreadyKnown {
        count: usize,
        status_message_id: Option<i32>,
    },
    /// Group id owned by a different user; dropped.
    ForeignUser,
}

/// Snapshot handed to the caller when a batch completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizedBatch {
    pub owner_user_id: i64,
    pub chat_id: i64,
    pub photo_count: usize,
    pub status_message_id: Option<i32>,
}

#[derive(Debug, Default)]
pub struct MediaGroupAggregator {
    groups: Mutex<HashMap<String, MediaGroupBuffer>>,
}

impl MediaGroupAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one photo of a group, creating the buffer on first sight.
    /// Duplicate references (by identifier) are suppressed. Refreshes
    /// `last_update` so an already-scheduled finalize goes stale.
    pub async fn register_photo(
        &self,
        group_id: &str,
        user_id: i64,
        chat_id: i64,
        file_path: String,
    ) -> PhotoRegistration {
        let mut groups = self.groups.lock().await;
        let buffer = groups
            .entry(group_id.to_string())
            .or_insert_with(|| {
                info!(group_id, user_id, "New media group");
                MediaGroupBuffer::new(user_id, chat_id)
            });

        if buffer.owner_user_id != user_id {
            warn!(
                group_id,
                owner = buffer.owner_user_id,
                sender = user_id,
                "Dropping photo from foreign user for media group"
            );
            return PhotoRegistration::ForeignUser;
        }

        let known = buffer.file_paths.contains(&file_path);
        if !known {
            buffer.file_paths.push(file_path);
        }
        buffer.last_update = Instant::now();
        let count = buffer.file_paths.len();
        debug!(group_id, count, duplicate = known, "Registered media group photo");

        if buffer.status_message_id.is_none() && count == 1 && !known {
            PhotoRegistration::NewGroup { count }
        } else if known {
            PhotoRegistration::AlreadyKnown {
                count,
                status_message_id: buffer.status_message_id,
            }
        } else {
            PhotoRegistration::Added {
                count,
                status_message_id: buffer.status_message_id,
            }
        }
    }

    /// Attach the status message created for a new group.
    pub async fn set_status_message(&self, group_id: &str, message_id: i32) {
        let mut groups = self.groups.lock().await;
        if let Some(buffer) = groups.get_mut(group_id) {
            buffer.status_message_id = Some(message_id);
        }
    }

    /// Replace the pending finalize task for a group, cancelling the one
    /// scheduled after the previous photo.
    pub async fn install_finalize_task(&self, group_id: &str, task: JoinHandle<()>) {
        let mut groups = self.groups.lock().await;
        let Some(buffer) = groups.get_mut(group_id) else {
            task.abort();
            return;
        };
        if let Some(previous) = buffer.finalize_task.replace(task) {
            previous.abort();
            debug!(group_id, "Cancelled previous finalize task");
        }
    }

    /// Finalize attempt, run after [`FINALIZE_DELAY`]. Returns the batch
    /// exactly once per group: a missing buffer, a buffer already being
    /// processed, or a buffer that received a photo within [`QUIET_PERIOD`]
    /// all yield `None`. The buffer itself stays in the map — it must
    /// survive until the user confirms or cancels.
    pub async fn try_finalize(&self, group_id: &str) -> Option<FinalizedBatch> {
        let mut groups = self.groups.lock().await;
        let Some(buffer) = groups.get_mut(group_id) else {
            debug!(group_id, "Media group already gone, skipping finalize");
            return None;
        };
        if buffer.being_processed {
            debug!(group_id, "Media group already finalized, skipping");
            return None;
        }
        buffer.being_processed = true;

        if buffer.last_update.elapsed() > QUIET_PERIOD {
            info!(
                group_id,
                photos = buffer.file_paths.len(),
                "Media group complete"
            );
            Some(FinalizedBatch {
                owner_user_id: buffer.owner_user_id,
                chat_id: buffer.chat_id,
                photo_count: buffer.file_paths.len(),
                status_message_id: buffer.status_message_id,
            })
        } else {
            // Stale run: a photo slipped in after this attempt was
            // scheduled. Its replacement task finalizes instead.
            buffer.being_processed = false;
            debug!(group_id, "Finalize attempt superseded by a newer photo");
            None
        }
    }

    /// Photo references of a finalized group, for dispatching to the
    /// training webhook. The buffer stays put until [`remove`].
    ///
    /// [`remove`]: MediaGroupAggregator::remove
    pub async fn file_paths(&self, group_id: &str) -> Option<Vec<String>> {
        let groups = self.groups.lock().await;
        groups.get(group_id).map(|b| b.file_paths.clone())
    }

    pub async fn status_message_id(&self, group_id: &str) -> Option<i32> {
        let groups = self.groups.lock().await;
        groups.get(group_id).and_then(|b| b.status_message_id)
    }

    pub async fn contains(&self, group_id: &str) -> bool {
        let groups = self.groups.lock().await;
        groups.contains_key(group_id)
    }

    /// Delete a buffer once the user confirmed or cancelled, cancelling any
    /// finalize task still pending.
    pub async fn remove(&self, group_id: &str) {
        let mut groups = self.groups.lock().await;
        if let Some(buffer) = groups.remove(group_id) {
            if let Some(task) = buffer.finalize_task {
                task.abort();
            }
            info!(group_id, "Removed media group");
        }
    }

    /// Evict buffers the user walked away from. Shares the session TTL and
    /// the sweeper that enforces it.
    pub async fn sweep_stale(&self, ttl: Duration) -> usize {
        let mut groups = self.groups.lock().await;
        let stale: Vec<String> = groups
            .iter()
            .filter(|(_, buffer)| buffer.last_update.elapsed() > ttl)
            .map(|(group_id, _)| group_id.clone())
            .collect();
        for group_id in &stale {
            if let Some(buffer) = groups.remove(group_id) {
                if let Some(task) = buffer.finalize_task {
                    task.abort();
                }
                info!(%group_id, "Evicted abandoned media group");
            }
        }
        stale.len()
    }
}
