//! Burned-in subtitle extraction.
//!
//! A [`worker::TaskQueueWorker`] takes [`task::Task`]s one at a time, samples
//! roughly two frames per second from each video, recognizes the text in the
//! subtitle region and folds the per-frame text into timed segments that are
//! written as SRT or plain text. Hosts observe progress through
//! [`events::WorkerEvent`]s.

pub mod cli;
pub mod error;
pub mod events;
pub mod pipeline;
pub mod preview;
pub mod progress;
pub mod sampler;
pub mod segment;
pub mod settings;
pub mod subtitle;
pub mod task;
pub mod worker;

pub use error::{FrameExtractionError, TaskError};
pub use events::{EventReceiver, EventSink, LogLevel, WorkerEvent};
pub use segment::{SegmentBuilder, fold_segments};
pub use task::{OutputFormat, RegionSelection, Task, TaskId, TaskStatus};
pub use worker::{TaskQueueWorker, WorkerBuilder};
