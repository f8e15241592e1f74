//! Background task progress
//!
//! Long-running API operations (registry rescans) answer with a task id and
//! then stream progress events until a terminal one arrives.

use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

/// Id of a background task started by the API
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskHandle {
    pub task_id: String,
}

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.task_id)
    }
}

/// One event of a task stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TaskEvent {
    Progress { current: u64, total: u64 },
    Done,
    Failed { message: String },
    Cancelled,
}

/// How a task ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskOutcome {
    Done,
    Failed { message: String },
    Cancelled,
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Done)
    }
}

/// Folds task events into the latest progress and the final outcome
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskTracker {
    pub current: u64,
    pub total: u64,
    outcome: Option<TaskOutcome>,
}

impl TaskTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one event; events after the terminal one are ignored
    pub fn apply(&mut self, event: TaskEvent) {
        if self.outcome.is_some() {
            return;
        }
        match event {
            TaskEvent::Progress { current, total } => {
                self.current = current;
                self.total = total;
            }
            TaskEvent::Done => self.outcome = Some(TaskOutcome::Done),
            TaskEvent::Failed { message } => self.outcome = Some(TaskOutcome::Failed { message }),
            TaskEvent::Cancelled => self.outcome = Some(TaskOutcome::Cancelled),
        }
    }

    pub fn outcome(&self) -> Option<&TaskOutcome> {
        self.outcome.as_ref()
    }

    /// Drain `events` until a terminal event
    ///
    /// A stream that ends early counts as a failure.
    pub async fn follow<S>(mut self, handle: &TaskHandle, events: S) -> TaskOutcome
    where
        S: Stream<Item = TaskEvent>,
    {
        futures::pin_mut!(events);
        while let Some(event) = events.next().await {
            self.apply(event);
            if let Some(outcome) = self.outcome.take() {
                if !outcome.is_success() {
                    warn!("Task {} ended with {:?}", handle, outcome);
                }
                return outcome;
            }
            debug!("Task {}: {}/{}", handle, self.current, self.total);
        }
        warn!("Event stream of task {} closed before completion", handle);
        TaskOutcome::Failed {
            message: "event stream closed before the task finished".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> TaskHandle {
        TaskHandle {
            task_id: "t-1".to_string(),
        }
    }

    #[test]
    fn test_tracker_keeps_first_terminal_event() {
        let mut tracker = TaskTracker::new();
        tracker.apply(TaskEvent::Progress { current: 1, total: 3 });
        tracker.apply(TaskEvent::Cancelled);
        tracker.apply(TaskEvent::Done);
        assert_eq!(tracker.outcome(), Some(&TaskOutcome::Cancelled));
        assert_eq!((tracker.current, tracker.total), (1, 3));
    }

    #[test]
    fn test_event_wire_format() {
        let event: TaskEvent = serde_json::from_str(r#"{"event": "progress", "current": 2, "total": 5}"#).unwrap();
        assert_eq!(event, TaskEvent::Progress { current: 2, total: 5 });
        let event: TaskEvent = serde_json::from_str(r#"{"event": "failed", "message": "boom"}"#).unwrap();
        assert_eq!(event, TaskEvent::Failed { message: "boom".to_string() });
    }

    #[tokio::test]
    async fn test_follow_until_done() {
        let events = futures::stream::iter(vec![
            TaskEvent::Progress { current: 1, total: 2 },
            TaskEvent::Progress { current: 2, total: 2 },
            TaskEvent::Done,
        ]);
        let outcome = TaskTracker::new().follow(&handle(), events).await;
        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn test_follow_closed_stream_fails() {
        let events = futures::stream::iter(vec![TaskEvent::Progress { current: 1, total: 2 }]);
        let outcome = TaskTracker::new().follow(&handle(), events).await;
        assert!(matches!(outcome, TaskOutcome::Failed { .. }));
    }
}
