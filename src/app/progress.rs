//! Progress aggregation across acquisition phases
//!
//! The integrator assigns every phase a window on the 0-100 scale. While a
//! phase runs, the engine reports the fraction of that phase that is done
//! and the aggregator maps it linearly into the window before forwarding the
//! absolute percentage to the caller's sink.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::constants::progress as defaults;

/// Receives absolute progress values in 0-100
pub trait ProgressSink: Send + Sync {
    fn report(&self, percent: f64);
}

impl<F> ProgressSink for F
where
    F: Fn(f64) + Send + Sync,
{
    fn report(&self, percent: f64) {
        self(percent)
    }
}

/// Pipeline phases in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    CheckLocal,
    Download,
    Extract,
    Stage,
    Verify,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::CheckLocal => "check_local",
            Phase::Download => "download",
            Phase::Extract => "extract",
            Phase::Stage => "stage",
            Phase::Verify => "verify",
        };
        f.write_str(name)
    }
}

/// Window of a phase on the 0-100 scale
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseBounds {
    pub lower: f64,
    pub upper: f64,
}

impl PhaseBounds {
    pub const fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    const fn from_pair(pair: (f64, f64)) -> Self {
        Self::new(pair.0, pair.1)
    }

    /// Map a completion fraction into the window
    pub fn map(&self, fraction: f64) -> f64 {
        let fraction = fraction.clamp(0.0, 1.0);
        self.lower + (self.upper - self.lower) * fraction
    }
}

/// Phase windows configured by the integrator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressPlan {
    pub check_local: PhaseBounds,
    pub download: PhaseBounds,
    pub extract: PhaseBounds,
    pub stage: PhaseBounds,
    pub verify: PhaseBounds,
}

impl Default for ProgressPlan {
    fn default() -> Self {
        Self {
            check_local: PhaseBounds::from_pair(defaults::CHECK_LOCAL),
            download: PhaseBounds::from_pair(defaults::DOWNLOAD),
            extract: PhaseBounds::from_pair(defaults::EXTRACT),
            stage: PhaseBounds::from_pair(defaults::STAGE),
            verify: PhaseBounds::from_pair(defaults::VERIFY),
        }
    }
}

impl ProgressPlan {
    pub fn bounds(&self, phase: Phase) -> PhaseBounds {
        match phase {
            Phase::CheckLocal => self.check_local,
            Phase::Download => self.download,
            Phase::Extract => self.extract,
            Phase::Stage => self.stage,
            Phase::Verify => self.verify,
        }
    }

    /// Check that every window lies in 0-100 and windows follow each other
    /// without overlapping
    pub fn validate(&self) -> Result<(), String> {
        let phases = [
            Phase::CheckLocal,
            Phase::Download,
            Phase::Extract,
            Phase::Stage,
            Phase::Verify,
        ];

        let mut previous_upper = 0.0;
        for phase in phases {
            let bounds = self.bounds(phase);
            if !(0.0..=100.0).contains(&bounds.lower) || !(0.0..=100.0).contains(&bounds.upper) {
                return Err(format!("progress.{} must lie within 0-100", phase));
            }
            if bounds.lower > bounds.upper {
                return Err(format!("progress.{} has lower > upper", phase));
            }
            if bounds.lower < previous_upper {
                return Err(format!("progress.{} overlaps the previous phase", phase));
            }
            previous_upper = bounds.upper;
        }
        Ok(())
    }
}

#[derive(Debug)]
struct AggregatorState {
    window: PhaseBounds,
    fraction: f64,
    last_reported: Option<f64>,
}

/// Maps per-phase fractions onto one 0-100 scale
///
/// Within a phase the reported value never decreases and never exceeds the
/// phase's upper bound. Shared between the transaction and the blocking
/// transfer tasks, hence the interior lock.
pub struct ProgressAggregator {
    plan: ProgressPlan,
    sink: Arc<dyn ProgressSink>,
    state: Mutex<AggregatorState>,
}

impl fmt::Debug for ProgressAggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressAggregator")
            .field("plan", &self.plan)
            .field("state", &*self.lock())
            .finish()
    }
}

impl ProgressAggregator {
    pub fn new(plan: ProgressPlan, sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            plan,
            sink,
            state: Mutex::new(AggregatorState {
                window: PhaseBounds::new(0.0, 0.0),
                fraction: 0.0,
                last_reported: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, AggregatorState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Start a phase at its lower bound
    pub fn enter(&self, phase: Phase) {
        let window = self.plan.bounds(phase);
        trace!("Progress window for {}: {}-{}", phase, window.lower, window.upper);
        let mut state = self.lock();
        state.window = window;
        state.fraction = 0.0;
        self.emit(&mut state, window.lower);
    }

    /// Report the fraction of the current phase that is complete
    ///
    /// Fractions are clamped to 0-1; a fraction lower than one already
    /// reported is ignored.
    pub fn advance(&self, fraction: f64) {
        if !fraction.is_finite() {
            return;
        }
        let mut state = self.lock();
        let fraction = fraction.clamp(0.0, 1.0);
        if fraction <= state.fraction && state.last_reported.is_some() {
            return;
        }
        state.fraction = fraction;
        let value = state.window.map(fraction);
        self.emit(&mut state, value);
    }

    /// Jump to the end of the current phase
    pub fn complete_phase(&self) {
        self.advance(1.0);
    }

    /// Report 100 regardless of the current window
    pub fn finish(&self) {
        let mut state = self.lock();
        state.window = PhaseBounds::new(100.0, 100.0);
        state.fraction = 1.0;
        self.emit(&mut state, 100.0);
    }

    /// Drop back to 0 after a failure
    pub fn reset(&self) {
        let mut state = self.lock();
        state.window = PhaseBounds::new(0.0, 0.0);
        state.fraction = 0.0;
        self.emit(&mut state, 0.0);
    }

    /// Last value forwarded to the sink
    pub fn current(&self) -> f64 {
        self.lock().last_reported.unwrap_or(0.0)
    }

    fn emit(&self, state: &mut AggregatorState, value: f64) {
        if state
            .last_reported
            .is_some_and(|last| (last - value).abs() < f64::EPSILON)
        {
            return;
        }
        state.last_reported = Some(value);
        self.sink.report(value);
    }
}
