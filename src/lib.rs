pub mod config;
pub mod engine;
pub mod error;
pub mod interactive;
pub mod naming;
pub mod pipeline;
pub mod progress;
pub mod region;
pub mod session;
pub mod source;

pub use config::Config;
pub use engine::{CodecEngine, FfmpegEngine};
pub use error::{AudioloopError, Result};
pub use pipeline::{run_extract_job, run_loop_job, Artifact, LoopJob, MAX_REPEAT_COUNT};
pub use progress::{ProgressState, ProgressTracker};
pub use region::{Region, RegionModel};
pub use session::Session;
pub use source::AudioSource;
