use crate::error::{AudioloopError, Result};

/// Fraction of the total duration where the default region starts.
const DEFAULT_START_FRACTION: f64 = 0.2;
/// Fraction of the total duration where the default region ends.
const DEFAULT_END_FRACTION: f64 = 0.8;

/// A validated time interval `[start, end)` within a source, in seconds.
///
/// A `Region` is only ever handed out by [`RegionModel`], so holders can rely
/// on `0 <= start < end <= total_duration` without re-checking.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region {
    pub start: f64,
    pub end: f64,
}

impl Region {
    /// Length of the interval in seconds.
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Single source of truth for the current selection against a known total
/// duration. All mutation goes through validating setters; downstream
/// consumers (preview playback, the pipelines) read the region as-is.
#[derive(Debug, Clone)]
pub struct RegionModel {
    total_duration: f64,
    region: Region,
}

impl RegionModel {
    /// Create a model for a source of the given duration, with the region
    /// initialized to the default 20%-80% window.
    pub fn new(total_duration: f64) -> Result<Self> {
        check_duration(total_duration)?;
        Ok(Self {
            total_duration,
            region: default_region(total_duration),
        })
    }

    /// Reset against a (re)reported total duration.
    ///
    /// The region always snaps back to the default window, including when a
    /// duration is re-reported after the user already moved the region: a
    /// preserved region could fall outside the new duration, so resetting is
    /// the only choice that keeps the invariants intact.
    pub fn set_total_duration(&mut self, total_duration: f64) -> Result<()> {
        check_duration(total_duration)?;
        self.total_duration = total_duration;
        self.region = default_region(total_duration);
        Ok(())
    }

    /// Replace the region, accepting only `0 <= start < end <= total`.
    ///
    /// On rejection the prior region is left untouched; there is no partial
    /// update.
    pub fn set_region(&mut self, start: f64, end: f64) -> Result<()> {
        if !start.is_finite() || !end.is_finite() {
            return Err(AudioloopError::InvalidRegion(format!(
                "region bounds must be finite, got [{start}, {end})"
            )));
        }
        if start < 0.0 {
            return Err(AudioloopError::InvalidRegion(format!(
                "region start {start:.3} is negative"
            )));
        }
        if start >= end {
            return Err(AudioloopError::InvalidRegion(format!(
                "region start {start:.3} is not before end {end:.3}"
            )));
        }
        if end > self.total_duration {
            return Err(AudioloopError::InvalidRegion(format!(
                "region end {end:.3} exceeds total duration {:.3}",
                self.total_duration
            )));
        }
        self.region = Region { start, end };
        Ok(())
    }

    pub fn region(&self) -> Region {
        self.region
    }

    pub fn total_duration(&self) -> f64 {
        self.total_duration
    }

    /// `end - start`; callers use this to project output length
    /// (`selected_duration() * repeat_count`).
    pub fn selected_duration(&self) -> f64 {
        self.region.duration()
    }
}

fn default_region(total_duration: f64) -> Region {
    Region {
        start: total_duration * DEFAULT_START_FRACTION,
        end: total_duration * DEFAULT_END_FRACTION,
    }
}

fn check_duration(total_duration: f64) -> Result<()> {
    if !total_duration.is_finite() || total_duration <= 0.0 {
        return Err(AudioloopError::InvalidRegion(format!(
            "total duration must be positive, got {total_duration}"
        )));
    }
    Ok(())
}
