//! Inactivity kick timers
//!
//! One scheduled kick per user, keyed by user id. A timer is never
//! cancelled when the quiz starts; whoever fires it checks whether the user
//! has a pass by then.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

/// A pending inactivity kick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledKick {
    pub id: Uuid,
    pub user_id: u64,
    pub scheduled_at: DateTime<Utc>,
    pub fire_at: DateTime<Utc>,
}

impl ScheduledKick {
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.fire_at <= now
    }
}

/// Store of pending inactivity kicks
#[derive(Debug, Clone, Default)]
pub struct KickScheduler {
    timers: Arc<DashMap<u64, ScheduledKick>>,
}

impl KickScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a kick for `user_id` after `delay`, replacing any pending one
    pub fn schedule(&self, user_id: u64, now: DateTime<Utc>, delay: Duration) -> ScheduledKick {
        let timer = ScheduledKick {
            id: Uuid::new_v4(),
            user_id,
            scheduled_at: now,
            fire_at: now + delay,
        };
        self.timers.insert(user_id, timer.clone());
        timer
    }

    /// Remove and return every timer that is due, earliest first
    pub fn take_due(&self, now: DateTime<Utc>) -> Vec<ScheduledKick> {
        let due: Vec<u64> = self
            .timers
            .iter()
            .filter(|entry| entry.value().is_due(now))
            .map(|entry| *entry.key())
            .collect();

        let mut fired: Vec<ScheduledKick> = due
            .into_iter()
            .filter_map(|user_id| {
                self.timers
                    .remove_if(&user_id, |_, timer| timer.is_due(now))
                    .map(|(_, timer)| timer)
            })
            .collect();
        fired.sort_by_key(|timer| timer.fire_at);
        fired
    }

    #[must_use]
    pub fn pending(&self, user_id: u64) -> Option<ScheduledKick> {
        self.timers.get(&user_id).map(|entry| entry.value().clone())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.timers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}
