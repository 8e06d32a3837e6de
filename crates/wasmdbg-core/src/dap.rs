//! Debug Adapter Protocol event bodies published to front ends.

use serde::{Deserialize, Serialize};

/// Reason why the debuggee stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StopReason {
    /// A step request completed.
    Step,
    /// A breakpoint was hit.
    Breakpoint,
    /// An exception occurred.
    Exception,
    /// Any other pause.
    Pause,
}

impl StopReason {
    /// Human-readable description for the `stopped` event.
    pub fn description(&self) -> &'static str {
        match self {
            StopReason::Step => "Paused after step",
            StopReason::Breakpoint => "Paused on breakpoint",
            StopReason::Exception => "Paused on exception",
            StopReason::Pause => "Paused",
        }
    }
}

/// Body of the `stopped` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoppedEventBody {
    /// The reason for the stop.
    pub reason: StopReason,
    /// Description of the stop.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Thread that stopped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<i64>,
    /// Whether all threads are stopped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_threads_stopped: Option<bool>,
}

impl StoppedEventBody {
    /// Body for a single-threaded stop.
    pub fn new(reason: StopReason, thread_id: i64) -> Self {
        Self {
            reason,
            description: Some(reason.description().to_string()),
            thread_id: Some(thread_id),
            all_threads_stopped: Some(true),
        }
    }
}
