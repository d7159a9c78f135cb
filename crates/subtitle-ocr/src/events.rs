use std::fmt;
use std::path::PathBuf;

use tokio::sync::mpsc;

use crate::task::TaskId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
    Success,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
            LogLevel::Success => "success",
        };
        f.write_str(label)
    }
}

/// Notification sent from the worker thread to the host.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    Progress { task_id: TaskId, percent: u8 },
    Completed { task_id: TaskId, output: PathBuf },
    Failed { task_id: TaskId, message: String },
    Log { level: LogLevel, message: String },
}

pub type EventReceiver = mpsc::UnboundedReceiver<WorkerEvent>;

/// Sending half of the worker's event channel. Sends never block; events are
/// dropped once the host has gone away.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<WorkerEvent>,
}

impl EventSink {
    pub fn channel() -> (Self, EventReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn emit(&self, event: WorkerEvent) {
        match &event {
            WorkerEvent::Progress { task_id, percent } => {
                tracing::debug!(task = %task_id, percent, "task progress");
            }
            WorkerEvent::Completed { task_id, output } => {
                tracing::info!(task = %task_id, output = %output.display(), "task completed");
            }
            WorkerEvent::Failed { task_id, message } => {
                tracing::error!(task = %task_id, %message, "task failed");
            }
            WorkerEvent::Log { level, message } => match level {
                LogLevel::Info | LogLevel::Success => tracing::info!(%level, "{message}"),
                LogLevel::Warning => tracing::warn!("{message}"),
                LogLevel::Error => tracing::error!("{message}"),
            },
        }
        let _ = self.tx.send(event);
    }

    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.emit(WorkerEvent::Log {
            level,
            message: message.into(),
        });
    }

    pub fn progress(&self, task_id: TaskId, percent: u8) {
        self.emit(WorkerEvent::Progress { task_id, percent });
    }

    pub fn completed(&self, task_id: TaskId, output: PathBuf) {
        self.emit(WorkerEvent::Completed { task_id, output });
    }

    pub fn failed(&self, task_id: TaskId, message: impl Into<String>) {
        self.emit(WorkerEvent::Failed {
            task_id,
            message: message.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_arrive_in_order() {
        let (sink, mut rx) = EventSink::channel();
        let task_id = TaskId::next();
        sink.progress(task_id, 10);
        sink.log(LogLevel::Warning, "frame skipped");
        sink.completed(task_id, PathBuf::from("out.srt"));

        assert_eq!(
            rx.try_recv().unwrap(),
            WorkerEvent::Progress { task_id, percent: 10 }
        );
        assert!(matches!(
            rx.try_recv().unwrap(),
            WorkerEvent::Log { level: LogLevel::Warning, .. }
        ));
        assert!(matches!(rx.try_recv().unwrap(), WorkerEvent::Completed { .. }));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn emitting_after_the_host_left_is_harmless() {
        let (sink, rx) = EventSink::channel();
        drop(rx);
        sink.failed(TaskId::next(), "gone");
    }
}
