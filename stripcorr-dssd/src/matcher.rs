//! Greedy nearest-time front/back strip matching.

use crate::pileup::expand_pileup;
use stripcorr_core::{Error, MatchedPair, StripHit};

/// Strip matcher configuration.
#[derive(Debug, Clone)]
pub struct MatcherConfig {
    /// Maximum |Δt| in clock ticks to accept a front/back pair.
    pub time_window: u64,
    /// Maximum front/back energy disagreement for the gate.
    pub delta_energy: f64,
    /// Gate sentinel used in place of saturated or over-range energies.
    pub high_energy_cutoff: f64,
    /// Enables the delta-energy gate (the SHE experiment variant).
    pub energy_gate: bool,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            time_window: 10,
            delta_energy: 500.0,
            high_energy_cutoff: 15_000.0,
            energy_gate: false,
        }
    }
}

impl From<&stripcorr_core::CorrelationConfig> for MatcherConfig {
    fn from(config: &stripcorr_core::CorrelationConfig) -> Self {
        Self {
            time_window: config.time_window,
            delta_energy: config.delta_energy,
            high_energy_cutoff: config.high_energy_cutoff,
            energy_gate: false,
        }
    }
}

/// A hit screened out before matching, with the reason it was rejected.
#[derive(Debug, Clone)]
pub struct RejectedHit {
    /// The offending hit.
    pub hit: StripHit,
    /// Why it was excluded, always [`Error::InvalidHit`].
    pub error: Error,
}

/// Output of matching one acquisition frame.
#[derive(Debug, Clone, Default)]
pub struct MatchResult {
    /// Accepted front/back pairs, in front-hit input order.
    pub pairs: Vec<MatchedPair>,
    /// Front hits with no acceptable back partner.
    pub unmatched_front: Vec<StripHit>,
    /// Back hits left unconsumed after matching.
    pub unmatched_back: Vec<StripHit>,
    /// Highest-energy front hit paired with the highest-energy back hit,
    /// independent of time matching.
    pub extremum: Option<MatchedPair>,
    /// Hits excluded before matching (NaN or negative energy).
    pub invalid: Vec<RejectedHit>,
}

/// Running matcher accounting across frames.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchStatistics {
    /// Frames processed.
    pub frames: usize,
    /// Pairs accepted.
    pub pairs: usize,
    /// Front hits left unmatched.
    pub unmatched_front: usize,
    /// Back hits left unmatched.
    pub unmatched_back: usize,
    /// Hits excluded as invalid.
    pub invalid_hits: usize,
    /// Synthetic hits created by pileup expansion.
    pub pileup_expanded: usize,
}

/// Pairs front and back strip hits of one frame by nearest timestamp.
///
/// Matching is greedy in front-hit input order: each front hit takes the
/// unconsumed back hit minimizing |Δt|, and a consumed back hit is never
/// offered again. The order dependence is an observable contract, not an
/// artifact; downstream accounting relies on it being reproducible.
pub struct StripMatcher {
    config: MatcherConfig,
    stats: MatchStatistics,
}

impl StripMatcher {
    /// Creates a matcher with the given configuration.
    pub fn new(config: MatcherConfig) -> Self {
        Self {
            config,
            stats: MatchStatistics::default(),
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// Accumulated statistics across frames.
    pub fn statistics(&self) -> MatchStatistics {
        self.stats
    }

    /// Energy as seen by the delta-energy gate.
    ///
    /// Saturated or over-range hits read as the sentinel so a pair is never
    /// rejected purely because calibration is unreliable there.
    fn gate_energy(&self, hit: &StripHit) -> f64 {
        if hit.saturated || hit.energy > self.config.high_energy_cutoff {
            self.config.high_energy_cutoff
        } else {
            hit.energy
        }
    }

    fn gate_passes(&self, front: &StripHit, back: &StripHit) -> bool {
        if !self.config.energy_gate {
            return true;
        }
        (self.gate_energy(front) - self.gate_energy(back)).abs() < self.config.delta_energy
    }

    /// Matches one frame's front and back hit collections.
    pub fn match_frame(&mut self, front: &[StripHit], back: &[StripHit]) -> MatchResult {
        let input_len = front.len() + back.len();
        let front = expand_pileup(front);
        let back = expand_pileup(back);
        self.stats.pileup_expanded += (front.len() + back.len()).saturating_sub(input_len);

        let mut result = MatchResult::default();

        let front = Self::screen(front, &mut result.invalid);
        let back = Self::screen(back, &mut result.invalid);

        result.extremum = Self::extremum_pair(&front, &back);

        let mut consumed = vec![false; back.len()];

        for front_hit in front {
            let best = back
                .iter()
                .enumerate()
                .filter(|(idx, _)| !consumed[*idx])
                .min_by_key(|(_, back_hit)| front_hit.time_diff(back_hit));

            match best {
                Some((idx, back_hit))
                    if front_hit.time_diff(back_hit) < self.config.time_window
                        && self.gate_passes(&front_hit, back_hit) =>
                {
                    consumed[idx] = true;
                    result.pairs.push(MatchedPair::new(front_hit, back_hit.clone()));
                }
                _ => result.unmatched_front.push(front_hit),
            }
        }

        result.unmatched_back.extend(
            back.into_iter()
                .zip(&consumed)
                .filter(|(_, used)| !**used)
                .map(|(hit, _)| hit),
        );

        self.stats.frames += 1;
        self.stats.pairs += result.pairs.len();
        self.stats.unmatched_front += result.unmatched_front.len();
        self.stats.unmatched_back += result.unmatched_back.len();
        self.stats.invalid_hits += result.invalid.len();

        result
    }

    /// Splits off hits with unusable fields, keeping the rejection reason.
    fn screen(hits: Vec<StripHit>, invalid: &mut Vec<RejectedHit>) -> Vec<StripHit> {
        let mut kept = Vec::with_capacity(hits.len());
        for hit in hits {
            match hit.validate() {
                Ok(()) => kept.push(hit),
                Err(error) => invalid.push(RejectedHit { hit, error }),
            }
        }
        kept
    }

    /// Cross-check pair: highest-energy front hit with highest-energy back hit.
    fn extremum_pair(front: &[StripHit], back: &[StripHit]) -> Option<MatchedPair> {
        let max_front = front
            .iter()
            .max_by(|a, b| a.energy.total_cmp(&b.energy))?;
        let max_back = back.iter().max_by(|a, b| a.energy.total_cmp(&b.energy))?;
        Some(MatchedPair::new(max_front.clone(), max_back.clone()))
    }
}

impl Default for StripMatcher {
    fn default() -> Self {
        Self::new(MatcherConfig::default())
    }
}
