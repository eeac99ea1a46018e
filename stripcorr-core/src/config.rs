//! Correlation window and classifier cutoff configuration.

use crate::error::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Correlation window configuration.
///
/// All time quantities are in hardware clock ticks; energies are in the
/// calibrated units of the hit stream. These are experiment-tuned constants
/// handed in by the caller, not derived here.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CorrelationConfig {
    /// Number of front-side strips (grid width).
    pub front_strips: u16,
    /// Number of back-side strips (grid height).
    pub back_strips: u16,
    /// Maximum |Δt| for a front/back hit pair to match.
    pub time_window: u64,
    /// Maximum front/back energy disagreement for a match.
    pub delta_energy: f64,
    /// Energy above which (or at saturation) the delta-energy gate uses this
    /// sentinel on both sides, so unreliable calibration never rejects a pair.
    pub high_energy_cutoff: f64,
    /// Dead time after an implant during which decays are discarded.
    pub min_implant_separation: u64,
    /// Maximum implant-to-decay time; beyond this the chain is severed.
    pub max_correlation_time: u64,
    /// Gap below which a decay flags its chain as interesting.
    pub fast_decay_time: u64,
    /// Implant-minus-now margin above which a backwards timestamp is read as
    /// a hardware clock reset rather than jitter.
    pub clock_reset_margin: u64,
    /// Upper bound on `now` for the clock-reset reading to apply.
    pub clock_reset_low_time: u64,
    /// First-to-second decay window for the two-slot matrix correlator.
    pub matrix_window: u64,
    /// A neighbor implant within this window of a candidate second decay
    /// vetoes it (cross-talk attribution).
    pub neighbor_veto_window: u64,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            front_strips: 16,
            back_strips: 16,
            time_window: 10,
            delta_energy: 500.0,
            high_energy_cutoff: 15_000.0,
            min_implant_separation: 100,
            max_correlation_time: 100_000_000,
            fast_decay_time: 1_000_000,
            clock_reset_margin: 10_000_000_000,
            clock_reset_low_time: 1_000_000,
            matrix_window: 50_000_000,
            neighbor_veto_window: 1_000,
        }
    }
}

impl CorrelationConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the grid extents.
    #[must_use]
    pub fn with_strips(mut self, front: u16, back: u16) -> Self {
        self.front_strips = front;
        self.back_strips = back;
        self
    }

    /// Sets the front/back matching time window.
    #[must_use]
    pub fn with_time_window(mut self, ticks: u64) -> Self {
        self.time_window = ticks;
        self
    }

    /// Sets the delta-energy matching gate.
    #[must_use]
    pub fn with_delta_energy(mut self, energy: f64) -> Self {
        self.delta_energy = energy;
        self
    }

    /// Sets the implant dead time.
    #[must_use]
    pub fn with_min_implant_separation(mut self, ticks: u64) -> Self {
        self.min_implant_separation = ticks;
        self
    }

    /// Sets the maximum implant-to-decay correlation time.
    #[must_use]
    pub fn with_max_correlation_time(mut self, ticks: u64) -> Self {
        self.max_correlation_time = ticks;
        self
    }

    /// Sets the fast-decay flagging threshold.
    #[must_use]
    pub fn with_fast_decay_time(mut self, ticks: u64) -> Self {
        self.fast_decay_time = ticks;
        self
    }

    /// Sets the delta-energy gate saturation sentinel.
    #[must_use]
    pub fn with_high_energy_cutoff(mut self, energy: f64) -> Self {
        self.high_energy_cutoff = energy;
        self
    }

    /// Sets the clock-reset detection bounds.
    #[must_use]
    pub fn with_clock_reset_bounds(mut self, margin: u64, low_time: u64) -> Self {
        self.clock_reset_margin = margin;
        self.clock_reset_low_time = low_time;
        self
    }

    /// Sets the first-to-second decay window of the matrix correlator.
    #[must_use]
    pub fn with_matrix_window(mut self, ticks: u64) -> Self {
        self.matrix_window = ticks;
        self
    }

    /// Sets the neighbor-implant cross-talk veto window.
    #[must_use]
    pub fn with_neighbor_veto_window(mut self, ticks: u64) -> Self {
        self.neighbor_veto_window = ticks;
        self
    }

    /// Total number of pixels in the grid.
    #[inline]
    pub fn pixel_count(&self) -> usize {
        self.front_strips as usize * self.back_strips as usize
    }

    /// Validates grid extents and window ordering.
    pub fn validate(&self) -> Result<()> {
        if self.front_strips == 0 || self.back_strips == 0 {
            return Err(Error::Config("grid extents must be non-zero".into()));
        }
        if self.min_implant_separation > self.max_correlation_time {
            return Err(Error::Config(
                "min_implant_separation exceeds max_correlation_time".into(),
            ));
        }
        Ok(())
    }
}

/// Classifier energy cutoffs.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ClassifierCutoffs {
    /// Alpha/fission dividing energy for quiet-frame decays.
    pub cutoff_energy: f64,
    /// Minimum energy for a beam+MWPC coincidence to count as a recoil.
    pub recoil_energy_cutoff: f64,
}

impl Default for ClassifierCutoffs {
    fn default() -> Self {
        Self {
            cutoff_energy: 20_000.0,
            recoil_energy_cutoff: 3_000.0,
        }
    }
}
