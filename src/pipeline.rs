//! The region-to-artifact pipelines.
//!
//! Both pipelines drive a [`CodecEngine`] through a fixed, strictly ordered
//! sequence of lossless stream-copy operations; each step depends on the
//! previous step's output file, so nothing is reordered or parallelized.
//! Failure at any step aborts the rest and surfaces as
//! [`AudioloopError::EngineFailure`] with the failing step's name.

use std::sync::{Mutex, MutexGuard};

use tracing::{debug, info};

use crate::engine::CodecEngine;
use crate::error::{AudioloopError, Result};
use crate::naming;
use crate::progress::ProgressTracker;
use crate::region::Region;
use crate::source::AudioSource;

/// Upper bound on the repeat count, from the product's 1..=100 range.
pub const MAX_REPEAT_COUNT: u32 = 100;

/// Working-area name of the concat manifest.
const LIST_NAME: &str = "list.txt";

const LOOP_STEPS: usize = 4;
const EXTRACT_STEPS: usize = 3;

/// Transient description of one loop job: a validated region plus how many
/// times to repeat it.
#[derive(Debug, Clone, Copy)]
pub struct LoopJob {
    pub region: Region,
    pub repeat_count: u32,
}

impl LoopJob {
    pub fn new(region: Region, repeat_count: u32) -> Result<Self> {
        if repeat_count < 1 || repeat_count > MAX_REPEAT_COUNT {
            return Err(AudioloopError::InvalidRepeatCount(repeat_count));
        }
        Ok(Self {
            region,
            repeat_count,
        })
    }

    /// Length of the artifact this job will produce, in seconds.
    pub fn projected_duration(&self) -> f64 {
        self.region.duration() * self.repeat_count as f64
    }
}

/// Output of a completed job. Ownership transfers to the caller on return;
/// delivering the bytes (download, file write) is the host's business.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub bytes: Vec<u8>,
    pub suggested_filename: String,
    pub mime_type: String,
}

impl Artifact {
    pub fn size_mb(&self) -> f64 {
        self.bytes.len() as f64 / 1024.0 / 1024.0
    }
}

/// Produce an artifact repeating `job.region` of `source` back-to-back
/// `job.repeat_count` times.
///
/// Four ordered engine steps: stage the raw bytes, trim the region with a
/// stream copy, concatenate the segment per the repeat manifest, read the
/// result back. A repeat count of 1 still runs all four steps, so the
/// artifact is always produced by the same path and is bit-identical to the
/// trimmed segment. Progress is flattened to one monotonic 0-100 percent via
/// [`ProgressTracker`] and forwarded to `on_progress`.
pub async fn run_loop_job<F>(
    engine: &dyn CodecEngine,
    source: &AudioSource,
    job: LoopJob,
    on_progress: F,
) -> Result<Artifact>
where
    F: Fn(u8) + Send + Sync,
{
    let region = job.region;
    validate_region(source, region)?;

    let ext = source.extension();
    let input = format!("input.{ext}");
    let segment = format!("segment.{ext}");
    let output = format!("output.{ext}");

    let tracker = Mutex::new(ProgressTracker::new());
    lock(&tracker).start(LOOP_STEPS);
    on_progress(0);
    let report = |step: usize, fraction: f64| {
        if let Some(percent) = lock(&tracker).update(step, fraction) {
            on_progress(percent);
        }
    };

    // the tracker must go idle on failure as well as success, so the steps
    // run inside a block whose result is inspected after finish()
    let job_result = async {
        info!(
            "Stage 1/4: staging {} ({:.2} MB)",
            source.display_name(),
            source.size_mb()
        );
        engine
            .write(&input, source.bytes())
            .await
            .map_err(|e| step_failure("stage", source.display_name(), e))?;
        report(0, 1.0);

        info!(
            "Stage 2/4: trimming [{:.3}s, {:.3}s) with stream copy",
            region.start, region.end
        );
        engine
            .exec(&trim_args(&input, region, &segment), &|f| report(1, f))
            .await
            .map_err(|e| step_failure("trim", source.display_name(), e))?;
        report(1, 1.0);

        info!(
            "Stage 3/4: concatenating {} segment copies",
            job.repeat_count
        );
        let manifest = concat_manifest(&segment, job.repeat_count);
        engine
            .write(LIST_NAME, manifest.as_bytes())
            .await
            .map_err(|e| step_failure("concat", source.display_name(), e))?;
        engine
            .exec(&concat_args(LIST_NAME, &output), &|f| report(2, f))
            .await
            .map_err(|e| step_failure("concat", source.display_name(), e))?;
        report(2, 1.0);

        info!("Stage 4/4: reading artifact");
        let bytes = engine
            .read(&output)
            .await
            .map_err(|e| step_failure("read", source.display_name(), e))?;
        report(3, 1.0);
        Ok::<_, AudioloopError>(bytes)
    }
    .await;
    lock(&tracker).finish();
    let bytes = job_result?;

    debug!(
        "Loop job complete: {} bytes, {:.1}s projected",
        bytes.len(),
        job.projected_duration()
    );

    Ok(Artifact {
        bytes,
        suggested_filename: naming::loop_name(source.display_name()),
        mime_type: source.mime_type().to_string(),
    })
}

/// Produce an artifact containing `region` of `source` alone.
///
/// Same staging and trim steps as the loop pipeline, minus the concatenate
/// step; the trimmed segment is read back directly.
pub async fn run_extract_job<F>(
    engine: &dyn CodecEngine,
    source: &AudioSource,
    region: Region,
    on_progress: F,
) -> Result<Artifact>
where
    F: Fn(u8) + Send + Sync,
{
    validate_region(source, region)?;

    let ext = source.extension();
    let input = format!("input.{ext}");
    let segment = format!("segment.{ext}");

    let tracker = Mutex::new(ProgressTracker::new());
    lock(&tracker).start(EXTRACT_STEPS);
    on_progress(0);
    let report = |step: usize, fraction: f64| {
        if let Some(percent) = lock(&tracker).update(step, fraction) {
            on_progress(percent);
        }
    };

    let job_result = async {
        info!(
            "Stage 1/3: staging {} ({:.2} MB)",
            source.display_name(),
            source.size_mb()
        );
        engine
            .write(&input, source.bytes())
            .await
            .map_err(|e| step_failure("stage", source.display_name(), e))?;
        report(0, 1.0);

        info!(
            "Stage 2/3: trimming [{:.3}s, {:.3}s) with stream copy",
            region.start, region.end
        );
        engine
            .exec(&trim_args(&input, region, &segment), &|f| report(1, f))
            .await
            .map_err(|e| step_failure("trim", source.display_name(), e))?;
        report(1, 1.0);

        info!("Stage 3/3: reading artifact");
        let bytes = engine
            .read(&segment)
            .await
            .map_err(|e| step_failure("read", source.display_name(), e))?;
        report(2, 1.0);
        Ok::<_, AudioloopError>(bytes)
    }
    .await;
    lock(&tracker).finish();
    let bytes = job_result?;

    debug!("Extract job complete: {} bytes", bytes.len());

    Ok(Artifact {
        bytes,
        suggested_filename: naming::extract_name(source.display_name(), region.duration()),
        mime_type: source.mime_type().to_string(),
    })
}

/// Trim `[region.start, region.end)` of `input` into `output` without
/// re-encoding.
fn trim_args(input: &str, region: Region, output: &str) -> Vec<String> {
    vec![
        "-i".to_string(),
        input.to_string(),
        "-ss".to_string(),
        format!("{:.3}", region.start),
        "-t".to_string(),
        format!("{:.3}", region.duration()),
        "-c".to_string(),
        "copy".to_string(),
        output.to_string(),
    ]
}

/// Concatenate the files listed in `list` into `output` without re-encoding.
fn concat_args(list: &str, output: &str) -> Vec<String> {
    vec![
        "-f".to_string(),
        "concat".to_string(),
        "-safe".to_string(),
        "0".to_string(),
        "-i".to_string(),
        list.to_string(),
        "-c".to_string(),
        "copy".to_string(),
        output.to_string(),
    ]
}

/// Concat demuxer manifest: the segment reference repeated `count` times in
/// order. Order matters; the artifact must be literal sequential repetition.
fn concat_manifest(segment: &str, count: u32) -> String {
    let line = format!("file '{segment}'");
    vec![line; count as usize].join("\n")
}

fn validate_region(source: &AudioSource, region: Region) -> Result<()> {
    // RegionModel guarantees these for regions it handed out; this guards
    // callers constructing a Region by hand.
    if !(region.start >= 0.0 && region.start < region.end) {
        return Err(AudioloopError::InvalidRegion(format!(
            "region [{:.3}, {:.3}) is not a valid interval",
            region.start, region.end
        )));
    }
    if region.end > source.total_duration() + 1e-6 {
        return Err(AudioloopError::InvalidRegion(format!(
            "region end {:.3} exceeds source duration {:.3}",
            region.end,
            source.total_duration()
        )));
    }
    Ok(())
}

fn step_failure(step: &'static str, input: &str, err: AudioloopError) -> AudioloopError {
    let message = match err {
        AudioloopError::EngineFailure { message, .. } => message,
        other => other.to_string(),
    };
    AudioloopError::EngineFailure {
        step,
        input: input.to_string(),
        message,
    }
}

fn lock(tracker: &Mutex<ProgressTracker>) -> MutexGuard<'_, ProgressTracker> {
    tracker.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
