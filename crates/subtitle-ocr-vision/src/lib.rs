//! Frame-level image processing: locating the subtitle strip and turning a
//! crop into a clean binary image for text recognition.

pub mod contour;
pub mod ops;
mod preprocess;
mod region;

pub use preprocess::{FramePreprocessor, VisionError};
pub use region::RegionDetector;
