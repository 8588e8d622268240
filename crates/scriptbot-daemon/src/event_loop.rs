//! Single-consumer event loop around the dispatcher.
//!
//! Transports push [`BotRequest`]s into a bounded channel; one task owns
//! the [`Dispatcher`] and handles them in arrival order, answering each
//! through its oneshot. The loop ends when the shutdown flag flips or
//! every sender is dropped.

use std::time::Instant;

use scriptbot_core::dispatcher::{Dispatcher, InboundEvent};
use scriptbot_core::ui::Reply;
use scriptbot_types::{Result, ScriptbotError};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

/// Channel capacity between transports and the loop.
pub const REQUEST_QUEUE: usize = 64;

/// One event awaiting its replies.
pub struct BotRequest {
    pub event: InboundEvent,
    pub reply: oneshot::Sender<Vec<Reply>>,
}

/// Cloneable sender side used by transports.
#[derive(Clone)]
pub struct BotHandle {
    tx: mpsc::Sender<BotRequest>,
}

impl BotHandle {
    /// Submits `event` and waits for its replies.
    pub async fn submit(&self, event: InboundEvent) -> Result<Vec<Reply>> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(BotRequest { event, reply })
            .await
            .map_err(|_| ScriptbotError::InternalError {
                reason: "event loop is not running".into(),
            })?;
        rx.await.map_err(|_| ScriptbotError::InternalError {
            reason: "event loop dropped the request".into(),
        })
    }
}

/// Starts the loop on the current runtime.
pub fn spawn(dispatcher: Dispatcher, shutdown: watch::Receiver<bool>) -> (BotHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(REQUEST_QUEUE);
    let task = tokio::spawn(run(dispatcher, rx, shutdown));
    (BotHandle { tx }, task)
}

async fn run(
    dispatcher: Dispatcher,
    mut requests: mpsc::Receiver<BotRequest>,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::info!("event loop started");

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    tracing::info!("shutdown signal received");
                    break;
                }
            }
            request = requests.recv() => {
                let Some(BotRequest { event, reply }) = request else {
                    tracing::info!("all transports closed");
                    break;
                };
                let replies = dispatcher.handle(event, Instant::now());
                if reply.send(replies).is_err() {
                    tracing::debug!("transport gone before reply");
                }
            }
        }
    }

    tracing::info!("event loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use scriptbot_core::access::AccessControl;
    use scriptbot_core::action::Command;
    use scriptbot_core::dispatcher::{Caller, EventKind};
    use scriptbot_core::rate_limiter::RateLimiter;
    use scriptbot_storage::authority::AuthorityRecord;
    use scriptbot_storage::codes::RandomCodes;
    use scriptbot_storage::scripts::{ScriptBook, ScriptStore};
    use scriptbot_storage::snapshot::SnapshotStore;
    use scriptbot_types::Identity;

    const OWNER: Identity = Identity::new(5);

    struct Volatile;

    impl SnapshotStore<AuthorityRecord> for Volatile {
        fn load(&self) -> Result<Option<AuthorityRecord>> {
            Ok(None)
        }
        fn save(&self, _: &AuthorityRecord) -> Result<()> {
            Ok(())
        }
    }

    impl SnapshotStore<ScriptBook> for Volatile {
        fn load(&self) -> Result<Option<ScriptBook>> {
            Ok(None)
        }
        fn save(&self, _: &ScriptBook) -> Result<()> {
            Ok(())
        }
    }

    fn dispatcher() -> Dispatcher {
        let access = Arc::new(AccessControl::load(Box::new(Volatile), OWNER));
        let scripts = Arc::new(ScriptStore::open(Box::new(Volatile), Box::new(RandomCodes::new(8)), 8));
        let limiter = RateLimiter::new(5, Duration::from_secs(10), OWNER);
        Dispatcher::new(access, scripts, limiter, "loop_bot")
    }

    fn start(who: u64) -> InboundEvent {
        InboundEvent::new(
            Caller::new(Identity::new(who)),
            EventKind::Command(Command::Start { payload: None }),
        )
    }

    #[tokio::test]
    async fn requests_are_answered() -> Result<()> {
        let (_stop, stop_rx) = watch::channel(false);
        let (handle, _task) = spawn(dispatcher(), stop_rx);

        let replies = handle.submit(start(5)).await?;
        assert_eq!(replies.len(), 1);
        assert!(replies[0].text.contains("Owner"));

        let replies = handle.submit(start(6)).await?;
        assert!(replies[0].text.contains("Links only"));
        Ok(())
    }

    #[tokio::test]
    async fn shutdown_stops_the_loop() {
        let (stop, stop_rx) = watch::channel(false);
        let (handle, task) = spawn(dispatcher(), stop_rx);

        let _ = stop.send(true);
        assert!(task.await.is_ok());

        assert!(matches!(
            handle.submit(start(6)).await,
            Err(ScriptbotError::InternalError { .. })
        ));
    }

    #[tokio::test]
    async fn dropping_all_handles_stops_the_loop() {
        let (_stop, stop_rx) = watch::channel(false);
        let (handle, task) = spawn(dispatcher(), stop_rx);
        drop(handle);
        assert!(task.await.is_ok());
    }
}
