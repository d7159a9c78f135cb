use std::any::Any;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use subtitle_ocr_decoder::VideoSource;
use subtitle_ocr_engine::{EngineFactory, EngineKind, OcrEngine, OcrError};
use tokio::runtime::{Builder as RuntimeBuilder, Runtime};

use crate::error::TaskError;
use crate::events::{EventReceiver, EventSink, LogLevel};
use crate::pipeline::{FramePipeline, run_task};
use crate::task::{Task, TaskId, TaskStatus};

const WORKER_THREAD_NAME: &str = "subtitle-ocr-worker";
const IDLE_WAIT: Duration = Duration::from_millis(100);
const PAUSED_WAIT: Duration = Duration::from_millis(200);

#[derive(Debug, Default)]
struct QueueState {
    queue: VecDeque<Task>,
    paused: bool,
    stopping: bool,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<QueueState>,
    wakeup: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Blocks until a task is available or the worker is stopping.
    fn next_task(&self) -> Option<Task> {
        let mut state = self.lock();
        loop {
            if state.stopping {
                return None;
            }
            if !state.paused {
                if let Some(task) = state.queue.pop_front() {
                    return Some(task);
                }
            }
            let wait = if state.paused { PAUSED_WAIT } else { IDLE_WAIT };
            state = self
                .wakeup
                .wait_timeout(state, wait)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}

/// Background worker that runs subtitle extraction tasks one at a time.
///
/// Tasks are processed in submission order on a dedicated thread. Every
/// outcome is reported through the event channel returned by
/// [`WorkerBuilder::spawn`]; a failing or panicking task never stops the loop.
pub struct TaskQueueWorker {
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl TaskQueueWorker {
    pub fn builder(
        factory: impl EngineFactory + 'static,
        source: impl VideoSource + 'static,
    ) -> WorkerBuilder {
        WorkerBuilder::new(factory, source)
    }

    pub fn submit(&self, mut task: Task) -> TaskId {
        let id = task.id;
        task.status = TaskStatus::Queued;
        tracing::debug!(task = %id, video = %task.video_path.display(), "task queued");
        self.shared.lock().queue.push_back(task);
        self.shared.wakeup.notify_all();
        id
    }

    /// Stops dequeuing and hands every queued task back as `Pending`.
    ///
    /// A task already being processed runs to completion.
    pub fn pause(&self) -> Vec<Task> {
        let drained: Vec<Task> = {
            let mut state = self.shared.lock();
            state.paused = true;
            state.queue.drain(..).collect()
        };
        self.shared.wakeup.notify_all();
        drained
            .into_iter()
            .map(|mut task| {
                task.status = TaskStatus::Pending;
                task
            })
            .collect()
    }

    pub fn resume(&self) {
        self.shared.lock().paused = false;
        self.shared.wakeup.notify_all();
    }

    pub fn is_paused(&self) -> bool {
        self.shared.lock().paused
    }

    pub fn queued(&self) -> usize {
        self.shared.lock().queue.len()
    }

    /// Pauses, waits for the running task to finish and joins the thread.
    /// Returns the tasks that were still queued.
    pub fn stop(mut self) -> Vec<Task> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Vec<Task> {
        let Some(handle) = self.handle.take() else {
            return Vec::new();
        };
        let pending = self.pause();
        self.shared.lock().stopping = true;
        self.shared.wakeup.notify_all();
        if handle.join().is_err() {
            tracing::error!("worker thread terminated abnormally");
        }
        pending
    }
}

impl Drop for TaskQueueWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

pub struct WorkerBuilder {
    factory: Box<dyn EngineFactory>,
    source: Box<dyn VideoSource>,
    pipeline: FramePipeline,
    start_paused: bool,
}

impl WorkerBuilder {
    pub fn new(factory: impl EngineFactory + 'static, source: impl VideoSource + 'static) -> Self {
        Self {
            factory: Box::new(factory),
            source: Box::new(source),
            pipeline: FramePipeline::default(),
            start_paused: false,
        }
    }

    pub fn pipeline(mut self, pipeline: FramePipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn start_paused(mut self, paused: bool) -> Self {
        self.start_paused = paused;
        self
    }

    pub fn spawn(self) -> io::Result<(TaskQueueWorker, EventReceiver)> {
        let runtime = build_runtime()?;
        let shared = Arc::new(Shared::default());
        shared.lock().paused = self.start_paused;
        let (events, receiver) = EventSink::channel();

        let mut worker = WorkerLoop {
            shared: Arc::clone(&shared),
            runtime,
            engines: EngineCache::new(self.factory),
            source: self.source,
            pipeline: self.pipeline,
            events,
        };
        let handle = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || worker.run())?;

        Ok((
            TaskQueueWorker {
                shared,
                handle: Some(handle),
            },
            receiver,
        ))
    }
}

fn build_runtime() -> io::Result<Runtime> {
    RuntimeBuilder::new_current_thread().enable_all().build()
}

/// Engine handles built on first use and reused for later tasks.
struct EngineCache {
    factory: Box<dyn EngineFactory>,
    engines: HashMap<EngineKind, Box<dyn OcrEngine>>,
}

impl EngineCache {
    fn new(factory: Box<dyn EngineFactory>) -> Self {
        Self {
            factory,
            engines: HashMap::new(),
        }
    }

    fn get(&mut self, kind: EngineKind) -> Result<&mut dyn OcrEngine, OcrError> {
        self.factory.ensure_available(kind)?;
        match self.engines.entry(kind) {
            Entry::Occupied(entry) => Ok(entry.into_mut().as_mut()),
            Entry::Vacant(entry) => {
                let mut engine = self.factory.create(kind)?;
                engine.warm_up()?;
                tracing::info!(engine = %kind, "engine ready");
                Ok(entry.insert(engine).as_mut())
            }
        }
    }

    fn evict(&mut self, kind: EngineKind) {
        self.engines.remove(&kind);
    }
}

struct WorkerLoop {
    shared: Arc<Shared>,
    runtime: Runtime,
    engines: EngineCache,
    source: Box<dyn VideoSource>,
    pipeline: FramePipeline,
    events: EventSink,
}

impl WorkerLoop {
    fn run(&mut self) {
        tracing::debug!("worker started");
        while let Some(task) = self.shared.next_task() {
            self.process(task);
        }
        tracing::debug!("worker stopped");
    }

    fn process(&mut self, mut task: Task) {
        task.status = TaskStatus::Processing;
        self.events.log(
            LogLevel::Info,
            format!("processing {}", task.video_path.display()),
        );

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.runtime.block_on(execute(
                &task,
                self.source.as_ref(),
                &mut self.engines,
                &self.pipeline,
                &self.events,
            ))
        }));

        match outcome {
            Ok(Ok(output)) => {
                task.status = TaskStatus::Completed;
                self.events.log(
                    LogLevel::Success,
                    format!("finished {}", task.video_path.display()),
                );
                self.events.completed(task.id, output);
            }
            Ok(Err(err)) => {
                task.status = TaskStatus::Failed;
                self.report_failure(&task, err.to_string());
            }
            Err(payload) => {
                task.status = TaskStatus::Failed;
                self.engines.evict(task.engine);
                if let Ok(runtime) = build_runtime() {
                    self.runtime = runtime;
                }
                let message = format!("task panicked: {}", panic_message(payload.as_ref()));
                self.report_failure(&task, message);
            }
        }
    }

    fn report_failure(&self, task: &Task, message: String) {
        self.events.log(
            LogLevel::Error,
            format!("{}: {message}", task.video_path.display()),
        );
        self.events.failed(task.id, message);
    }
}

async fn execute(
    task: &Task,
    source: &dyn VideoSource,
    engines: &mut EngineCache,
    pipeline: &FramePipeline,
    events: &EventSink,
) -> Result<PathBuf, TaskError> {
    let engine = engines
        .get(task.engine)
        .map_err(|err| TaskError::configuration(err.to_string()))?;
    engine
        .prepare_language(&task.language)
        .map_err(|err| TaskError::configuration(err.to_string()))?;
    let provider = source
        .open(&task.video_path)
        .map_err(|err| TaskError::video_open(&task.video_path, err.to_string()))?;
    run_task(task, provider, engine, pipeline, events).await
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paused_queue_does_not_hand_out_tasks() {
        let shared = Shared::default();
        {
            let mut state = shared.lock();
            state.paused = true;
            state
                .queue
                .push_back(Task::new("a.mp4", EngineKind::Tesseract));
        }
        let waiter = {
            let shared = &shared;
            thread::scope(|scope| {
                let handle = scope.spawn(move || shared.next_task());
                thread::sleep(Duration::from_millis(50));
                shared.lock().stopping = true;
                shared.wakeup.notify_all();
                handle.join().ok().flatten()
            })
        };
        assert!(waiter.is_none());
        assert_eq!(shared.lock().queue.len(), 1);
    }

    #[test]
    fn queue_is_first_in_first_out() {
        let shared = Shared::default();
        let first = Task::new("first.mp4", EngineKind::Tesseract);
        let second = Task::new("second.mp4", EngineKind::Tesseract);
        let (first_id, second_id) = (first.id, second.id);
        {
            let mut state = shared.lock();
            state.queue.push_back(first);
            state.queue.push_back(second);
        }
        assert_eq!(shared.next_task().map(|task| task.id), Some(first_id));
        assert_eq!(shared.next_task().map(|task| task.id), Some(second_id));
    }

    #[test]
    fn panic_messages_are_extracted() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }
}
