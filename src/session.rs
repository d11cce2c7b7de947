use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info};

use crate::engine::CodecEngine;
use crate::error::{AudioloopError, Result};
use crate::pipeline::{run_extract_job, run_loop_job, Artifact, LoopJob};
use crate::region::{Region, RegionModel};
use crate::source::AudioSource;

/// One editing session: the engine handle, the currently loaded source with
/// its region model, and the single-job-at-a-time guard.
///
/// The source/model pair is single-writer and replaced wholesale when a new
/// file is loaded. The engine is an explicitly owned handle so tests can
/// substitute a fake.
pub struct Session {
    engine: Arc<dyn CodecEngine>,
    source: Option<AudioSource>,
    model: Option<RegionModel>,
    in_flight: AtomicBool,
}

impl Session {
    pub fn new(engine: Arc<dyn CodecEngine>) -> Self {
        debug!("Session using {} engine", engine.name());
        Self {
            engine,
            source: None,
            model: None,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Load a new source, discarding the previous one and its region. The
    /// region model starts at the default window over the new duration.
    pub fn load_source(&mut self, source: AudioSource) -> Result<()> {
        let model = RegionModel::new(source.total_duration())?;
        info!(
            "Loaded {} ({:.2} MB, {:.1}s)",
            source.display_name(),
            source.size_mb(),
            source.total_duration()
        );
        self.source = Some(source);
        self.model = Some(model);
        Ok(())
    }

    pub fn source(&self) -> Option<&AudioSource> {
        self.source.as_ref()
    }

    pub fn region(&self) -> Option<Region> {
        self.model.as_ref().map(|m| m.region())
    }

    pub fn selected_duration(&self) -> Option<f64> {
        self.model.as_ref().map(|m| m.selected_duration())
    }

    /// Validated region update; fails with `InvalidRegion` when the bounds
    /// are bad or no source is loaded.
    pub fn set_region(&mut self, start: f64, end: f64) -> Result<()> {
        let model = self.model.as_mut().ok_or(AudioloopError::NoSource)?;
        model.set_region(start, end)
    }

    /// Region update from the waveform widget boundary: an invalid drag is
    /// dropped and the prior region kept, without surfacing an error.
    pub fn update_region(&mut self, start: f64, end: f64) {
        if let Err(e) = self.set_region(start, end) {
            debug!("Ignoring region update [{start:.3}, {end:.3}): {e}");
        }
    }

    /// Run the loop pipeline over the current region.
    ///
    /// Returns `Busy` without touching the in-flight job if one is already
    /// running.
    pub async fn generate_loop<F>(&self, repeat_count: u32, on_progress: F) -> Result<Artifact>
    where
        F: Fn(u8) + Send + Sync,
    {
        let (source, model) = self.loaded()?;
        let job = LoopJob::new(model.region(), repeat_count)?;
        let _guard = self.acquire_job_slot()?;
        run_loop_job(self.engine.as_ref(), source, job, on_progress).await
    }

    /// Run the extract pipeline over the current region.
    pub async fn extract_region<F>(&self, on_progress: F) -> Result<Artifact>
    where
        F: Fn(u8) + Send + Sync,
    {
        let (source, model) = self.loaded()?;
        let region = model.region();
        let _guard = self.acquire_job_slot()?;
        run_extract_job(self.engine.as_ref(), source, region, on_progress).await
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    fn loaded(&self) -> Result<(&AudioSource, &RegionModel)> {
        match (self.source.as_ref(), self.model.as_ref()) {
            (Some(source), Some(model)) => Ok((source, model)),
            _ => Err(AudioloopError::NoSource),
        }
    }

    fn acquire_job_slot(&self) -> Result<JobSlot<'_>> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(AudioloopError::Busy);
        }
        Ok(JobSlot {
            in_flight: &self.in_flight,
        })
    }
}

/// Releases the in-flight flag when the job finishes, errors, or the future
/// is dropped.
struct JobSlot<'a> {
    in_flight: &'a AtomicBool,
}

impl Drop for JobSlot<'_> {
    fn drop(&mut self) {
        self.in_flight.store(false, Ordering::SeqCst);
    }
}
