pub mod analyzer;
pub mod detection;
pub mod error;
pub mod frame;
pub mod grouper;
pub mod scanner;
pub mod search;

pub use analyzer::{AnalysisReport, RegionReport, VideoAnalyzer};
pub use detection::{BoundingBox, Detection, MockClassifier, SlateClassifier, SlateState};
pub use error::VideoError;
pub use frame::{Frame, FrameSource, ImageSequenceSource, SyntheticSource};
pub use grouper::{group_candidate_frames, Region};
pub use scanner::{partition_chunks, CoarseScanner, FrameVerdicts, ScanOutcome, ScanStats};
pub use search::{SearchConfig, SearchOutcome, SearchReport, SyncpointSearch};
