pub mod ffmpeg;

pub use ffmpeg::FfmpegEngine;

use crate::error::Result;
use async_trait::async_trait;

/// Callback receiving raw 0..1 progress fractions local to one `exec` call.
pub type ProgressFn<'a> = &'a (dyn Fn(f64) + Send + Sync);

/// The external audio processing backend, treated as an opaque command
/// executor over a virtual working area of named files.
///
/// The pipelines drive it through exactly these primitives; tests substitute
/// an in-memory fake. Failures from any primitive are fatal to the current
/// job, and a failed job's working area is not assumed clean - the next job
/// re-stages its input from scratch.
#[async_trait]
pub trait CodecEngine: Send + Sync {
    /// Stage a byte buffer into the working area under the given name,
    /// overwriting any previous file of that name.
    async fn write(&self, name: &str, bytes: &[u8]) -> Result<()>;

    /// Run one codec command. File names in `args` refer to the working
    /// area. Progress ticks may arrive on another execution context and
    /// carry no ordering guarantee.
    async fn exec(&self, args: &[String], progress: ProgressFn<'_>) -> Result<()>;

    /// Read a produced file back out of the working area.
    async fn read(&self, name: &str) -> Result<Vec<u8>>;

    fn name(&self) -> &'static str;
}
