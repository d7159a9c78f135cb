use std::collections::HashMap;
use std::path::Path;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use crate::events::WorkerEvent;
use crate::task::{Task, TaskId};

const TASK_BAR_TEMPLATE: &str =
    "{prefix:<24} {bar:40.cyan/blue} {percent:>3}% [{elapsed_precise}] {msg}";

pub fn task_bar_style() -> ProgressStyle {
    ProgressStyle::with_template(TASK_BAR_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-")
}

/// One progress bar per submitted task, driven by worker events.
pub struct TaskProgress {
    multi: MultiProgress,
    bars: HashMap<TaskId, ProgressBar>,
}

impl TaskProgress {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            bars: HashMap::new(),
        }
    }

    pub fn add(&mut self, task: &Task) {
        let bar = self.multi.add(ProgressBar::new(100));
        bar.set_style(task_bar_style());
        bar.set_prefix(label(&task.video_path));
        bar.set_message("queued");
        self.bars.insert(task.id, bar);
    }

    /// Applies an event; returns `true` once every bar has finished.
    pub fn apply(&mut self, event: &WorkerEvent) -> bool {
        match event {
            WorkerEvent::Progress { task_id, percent } => {
                if let Some(bar) = self.bars.get(task_id) {
                    bar.set_position(u64::from(*percent));
                    bar.set_message(if *percent >= 85 { "writing" } else { "recognizing" });
                }
            }
            WorkerEvent::Completed { task_id, output } => {
                if let Some(bar) = self.bars.get(task_id) {
                    bar.set_position(100);
                    bar.finish_with_message(format!("wrote {}", output.display()));
                }
            }
            WorkerEvent::Failed { task_id, message } => {
                if let Some(bar) = self.bars.get(task_id) {
                    bar.abandon_with_message(format!("failed: {message}"));
                }
            }
            WorkerEvent::Log { .. } => {}
        }
        self.is_done()
    }

    pub fn is_done(&self) -> bool {
        self.bars.values().all(ProgressBar::is_finished)
    }

    pub fn abandon_all(&self, message: &str) {
        for bar in self.bars.values().filter(|bar| !bar.is_finished()) {
            bar.abandon_with_message(message.to_string());
        }
    }
}

impl Default for TaskProgress {
    fn default() -> Self {
        Self::new()
    }
}

fn label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
