//! app::heartbeat
//!
//! Stall detector for the UI loop (`--dumper`).
//!
//! Every [`HEARTBEAT_INTERVAL`] a ping is posted to the loop. If the loop
//! does not answer within [`HEARTBEAT_TIMEOUT`] an error is logged with the
//! live task summary.

use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::oneshot;

use super::events::UiEvent;
use super::tasks::TaskSet;

pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
pub const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of one ping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Beat {
    Answered,
    Stalled,
    LoopGone,
}

/// Ping the loop once.
pub async fn beat(events: &UnboundedSender<UiEvent>, timeout: Duration) -> Beat {
    let (ack, answer) = oneshot::channel();
    if events.send(UiEvent::Heartbeat(ack)).is_err() {
        return Beat::LoopGone;
    }
    match tokio::time::timeout(timeout, answer).await {
        Ok(Ok(())) => Beat::Answered,
        Ok(Err(_)) => Beat::LoopGone,
        Err(_) => Beat::Stalled,
    }
}

/// Ping forever, logging stalls, until the loop goes away.
pub async fn run(events: UnboundedSender<UiEvent>, tasks: TaskSet) {
    let mut interval = tokio::time::interval(HEARTBEAT_INTERVAL);
    interval.tick().await;
    loop {
        interval.tick().await;
        match beat(&events, HEARTBEAT_TIMEOUT).await {
            Beat::Answered => tracing::trace!("UI loop heartbeat"),
            Beat::Stalled => tracing::error!(
                timeout_secs = HEARTBEAT_TIMEOUT.as_secs(),
                tasks = %tasks.summary(),
                "UI loop is not answering"
            ),
            Beat::LoopGone => return,
        }
    }
}
