//! Admission control: at most one active recording session per channel-group.
//!
//! The registry is the only piece of state shared across concurrent
//! operations (capture callbacks, stop requests, finalize completion).
//! Every read-modify-write on a group's entry happens under one lock
//! acquisition, so the single-active-session invariant holds under
//! concurrent starts and stops.

use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::ids::{ChannelId, GroupId};

use super::Session;

/// A session already exists for the group.
#[derive(Debug, Error)]
#[error("a recording is already in progress on channel ID {channel_id}")]
pub struct AlreadyActiveError {
    /// Channel the existing session is recording.
    pub channel_id: ChannelId,
}

/// Why a stop request was turned away. Neither case changes registry state.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StopRejection {
    #[error("not recording in this group")]
    NotRecording,
    #[error("not recording on that channel (active recording is on channel ID {active})")]
    WrongChannel { active: ChannelId },
}

#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<GroupId, Arc<Session>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically check absence and insert. The check and the insert happen
    /// under the same lock acquisition: of any number of concurrent calls for
    /// one group, exactly one succeeds.
    pub async fn try_start(&self, session: Arc<Session>) -> Result<(), AlreadyActiveError> {
        let mut sessions = self.sessions.lock().await;
        match sessions.entry(session.group_id) {
            std::collections::hash_map::Entry::Occupied(entry) => Err(AlreadyActiveError {
                channel_id: entry.get().channel_id,
            }),
            std::collections::hash_map::Entry::Vacant(entry) => {
                entry.insert(session);
                Ok(())
            }
        }
    }

    pub async fn get(&self, group: GroupId) -> Option<Arc<Session>> {
        self.sessions.lock().await.get(&group).cloned()
    }

    /// Idempotent removal; an absent key is a no-op.
    pub async fn remove(&self, group: GroupId) {
        self.sessions.lock().await.remove(&group);
    }

    /// Claim the group's session for finalization, checking that it records
    /// the expected channel. Lookup, check and removal happen under one lock
    /// acquisition, so exactly one stop request can ever claim a session.
    pub async fn take_matching(
        &self,
        group: GroupId,
        channel: ChannelId,
    ) -> Result<Arc<Session>, StopRejection> {
        let mut sessions = self.sessions.lock().await;
        let active = sessions.get(&group).ok_or(StopRejection::NotRecording)?;
        if active.channel_id != channel {
            return Err(StopRejection::WrongChannel {
                active: active.channel_id,
            });
        }
        Ok(sessions.remove(&group).expect("entry present under lock"))
    }

    pub async fn active_count(&self) -> usize {
        self.sessions.lock().await.len()
    }
}
