//! Job-level progress derived from per-step engine callbacks.
//!
//! The engine reports progress on a 0..1 scale local to each step, and that
//! scale restarts on every step of a multi-step job. The tracker therefore
//! takes an explicit step index plus local fraction and combines them with
//! equal step weights, instead of trusting a single running raw value.

/// Observable tracker state: percent is undefined while idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressState {
    Idle,
    Running(u8),
}

#[derive(Debug)]
pub struct ProgressTracker {
    state: ProgressState,
    total_steps: usize,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            state: ProgressState::Idle,
            total_steps: 0,
        }
    }

    /// Begin a job with the given number of equally weighted steps.
    pub fn start(&mut self, total_steps: usize) {
        self.total_steps = total_steps.max(1);
        self.state = ProgressState::Running(0);
    }

    /// Apply a raw engine tick: `step` is the zero-based step index,
    /// `fraction` the step-local 0..1 progress.
    ///
    /// Returns the job-level percent when the tracker is running, `None` for
    /// late ticks arriving after the job went idle (those are dropped, not
    /// applied). The returned percent never decreases within one job even if
    /// the raw fractions do.
    pub fn update(&mut self, step: usize, fraction: f64) -> Option<u8> {
        let ProgressState::Running(current) = self.state else {
            return None;
        };
        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let step = step.min(self.total_steps - 1);
        let overall = (step as f64 + fraction) / self.total_steps as f64;
        let percent = ((overall * 100.0).round() as u8).clamp(0, 100).max(current);
        self.state = ProgressState::Running(percent);
        Some(percent)
    }

    /// End the job (success or failure); subsequent ticks are dropped.
    pub fn finish(&mut self) {
        self.state = ProgressState::Idle;
    }

    pub fn state(&self) -> ProgressState {
        self.state
    }

    pub fn percent(&self) -> Option<u8> {
        match self.state {
            ProgressState::Idle => None,
            ProgressState::Running(p) => Some(p),
        }
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}
