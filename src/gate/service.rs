//! Gate event loop
//!
//! A single task owns the `Gatekeeper`. Gateway callbacks only push events
//! into its channel, so events are handled one at a time, in arrival order,
//! and inactivity timers fire through the same path between events.

use crate::gate::controller::Gatekeeper;
use crate::gate::error::{GateError, GateResult};
use crate::gate::event::GateEvent;
use crate::{CONSOLE_TARGET, ERROR_TARGET};
use std::time::Duration;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Capacity of the event channel
const EVENT_BUFFER: usize = 100;

/// Sending side of the event loop
#[derive(Debug, Clone)]
pub struct GateHandle {
    tx: Sender<GateEvent>,
}

impl GateHandle {
    /// Queue an event for the gate
    ///
    /// # Errors
    /// Returns `ChannelClosed` if the event loop has stopped
    pub async fn send(&self, event: GateEvent) -> GateResult<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| GateError::ChannelClosed)
    }

    /// Ask the event loop to stop once the queued events are handled
    ///
    /// # Errors
    /// Returns `ChannelClosed` if the event loop has already stopped
    pub async fn shutdown(&self) -> GateResult<()> {
        self.send(GateEvent::Shutdown).await
    }

    /// A handle whose events land in the returned receiver instead of a gate
    #[cfg(test)]
    pub(crate) fn detached() -> (Self, Receiver<GateEvent>) {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        (Self { tx }, rx)
    }
}

/// Start the event loop; timers are checked every `check_interval`
pub fn spawn(gatekeeper: Gatekeeper, check_interval: Duration) -> (GateHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    let task = tokio::spawn(run(gatekeeper, rx, check_interval));
    (GateHandle { tx }, task)
}

async fn run(gatekeeper: Gatekeeper, mut rx: Receiver<GateEvent>, check_interval: Duration) {
    info!(
        target: CONSOLE_TARGET,
        interval_ms = check_interval.as_millis(),
        "Gate event loop started"
    );
    let mut interval = tokio::time::interval(check_interval);

    loop {
        tokio::select! {
            event = rx.recv() => {
                let Some(event) = event else {
                    info!(target: CONSOLE_TARGET, "Gate event channel closed");
                    break;
                };
                if event == GateEvent::Shutdown {
                    info!(target: CONSOLE_TARGET, "Received shutdown request for the gate");
                    break;
                }

                let kind = event.kind();
                debug!(target: CONSOLE_TARGET, event = kind, "Handling gate event");
                if let Err(e) = gatekeeper.handle(event).await {
                    error!(target: ERROR_TARGET, event = kind, error = %e, "Failed to handle gate event");
                }
            }
            _ = interval.tick() => {
                gatekeeper.fire_due_timers().await;
            }
        }
    }

    info!(target: CONSOLE_TARGET, "Gate event loop shut down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::GateConfig;
    use crate::gate::event::UserRef;
    use crate::gate::platform::{MemberPermissions, MockChatPlatform};
    use crate::questions::QuestionBank;
    use crate::quiz::QuizStore;
    use crate::quiz::model::tests::sample_questions;
    use chrono::Utc;
    use std::sync::Arc;

    async fn gatekeeper(platform: MockChatPlatform, clock: Arc<ManualClock>) -> Gatekeeper {
        let store = QuizStore::in_memory().await.unwrap();
        let bank = QuestionBank::new(sample_questions()).unwrap();
        let config = GateConfig {
            questions_per_quiz: 3,
            correct_answers_required: 2,
            ..GateConfig::default()
        };
        Gatekeeper::new(store, Arc::new(bank), Arc::new(config), Arc::new(platform))
            .with_clock(clock)
    }

    fn joined(user_id: u64) -> GateEvent {
        GateEvent::MemberJoined {
            user: UserRef::new(user_id, "Newcomer"),
            is_bot: false,
            announcement: None,
        }
    }

    #[tokio::test]
    async fn test_events_are_handled_until_shutdown() {
        let (restricted_tx, mut restricted_rx) = mpsc::unbounded_channel();
        let mut platform = MockChatPlatform::new();
        platform
            .expect_restrict_member()
            .times(2)
            .returning(move |user_id, permissions| {
                assert_eq!(permissions, MemberPermissions::Restricted);
                let _ = restricted_tx.send(user_id);
                Ok(())
            });
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let gate = gatekeeper(platform, clock).await;

        let (handle, task) = spawn(gate, Duration::from_secs(60));
        handle.send(joined(1)).await.unwrap();
        handle.send(joined(2)).await.unwrap();
        handle.shutdown().await.unwrap();
        task.await.unwrap();

        assert_eq!(restricted_rx.recv().await, Some(1));
        assert_eq!(restricted_rx.recv().await, Some(2));
        assert!(matches!(
            handle.send(joined(3)).await,
            Err(GateError::ChannelClosed)
        ));
    }

    #[tokio::test]
    async fn test_failed_event_does_not_stop_the_loop() {
        let (restricted_tx, mut restricted_rx) = mpsc::unbounded_channel();
        let mut platform = MockChatPlatform::new();
        let mut calls = 0;
        platform
            .expect_restrict_member()
            .returning(move |user_id, _| {
                calls += 1;
                let _ = restricted_tx.send(user_id);
                if calls == 1 {
                    Err(crate::gate::PlatformError::Other("Missing Access".to_string()))
                } else {
                    Ok(())
                }
            });
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let gate = gatekeeper(platform, clock).await;

        let (handle, task) = spawn(gate, Duration::from_secs(60));
        handle.send(joined(1)).await.unwrap();
        handle.send(joined(2)).await.unwrap();
        handle.shutdown().await.unwrap();
        task.await.unwrap();

        assert_eq!(restricted_rx.recv().await, Some(1));
        assert_eq!(restricted_rx.recv().await, Some(2));
    }

    #[tokio::test]
    async fn test_due_timers_fire_from_the_loop() {
        let (kicked_tx, mut kicked_rx) = mpsc::unbounded_channel();
        let mut platform = MockChatPlatform::new();
        platform
            .expect_restrict_member()
            .returning(|_, _| Ok(()));
        platform.expect_kick_member().times(1).returning(move |user_id| {
            let _ = kicked_tx.send(user_id);
            Ok(())
        });
        platform.expect_unban_member().returning(|_| Ok(()));
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let gate = gatekeeper(platform, clock.clone()).await;

        let timers = gate.timers().clone();

        let (handle, task) = spawn(gate, Duration::from_millis(10));
        handle.send(joined(5)).await.unwrap();
        // The clock may only jump once the kick is scheduled
        while timers.pending(5).is_none() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        clock.advance(chrono::Duration::minutes(16));

        let kicked = tokio::time::timeout(Duration::from_secs(5), kicked_rx.recv())
            .await
            .unwrap();
        assert_eq!(kicked, Some(5));

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }
}
