//! 检测进度事件

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Progress of a running check, consumed by whatever is watching it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CheckEvent {
    CycleStarted {
        /// Domains with checking enabled.
        domains: usize,
    },
    DomainStarted {
        /// 1-based.
        index: usize,
        total: usize,
        domain: String,
        port: u16,
    },
    ProbingForward {
        index: usize,
        total: usize,
        forward_domain: String,
    },
    /// Relayed from the check backend.
    ProbeAttempt {
        target: String,
        current: u32,
        total: u32,
    },
    CycleFinished,
}

pub type CheckEventSender = mpsc::UnboundedSender<CheckEvent>;
pub type CheckEventReceiver = mpsc::UnboundedReceiver<CheckEvent>;

/// Send if someone is listening; a closed receiver is ignored.
pub(crate) fn emit(events: Option<&CheckEventSender>, event: CheckEvent) {
    if let Some(tx) = events {
        let _ = tx.send(event);
    }
}
