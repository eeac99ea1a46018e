//! Hit types for double-sided strip detector data.

use crate::error::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Pixel location on the detector, keyed by front and back strip index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PixelLocation {
    /// Front-side strip index.
    pub front: u16,
    /// Back-side strip index.
    pub back: u16,
}

impl PixelLocation {
    /// Creates a new pixel location.
    #[inline]
    pub fn new(front: u16, back: u16) -> Self {
        Self { front, back }
    }

    /// Checks if this location is adjacent to another (8-connectivity).
    #[inline]
    pub fn is_adjacent(&self, other: &Self) -> bool {
        let df = (self.front as i32 - other.front as i32).abs();
        let db = (self.back as i32 - other.back as i32).abs();
        df <= 1 && db <= 1 && (df != 0 || db != 0)
    }

    /// Iterates the up-to-8 neighboring locations within the given grid bounds.
    pub fn neighbors(&self, front_strips: u16, back_strips: u16) -> impl Iterator<Item = Self> {
        let (f, b) = (self.front as i32, self.back as i32);
        let (nf, nb) = (front_strips as i32, back_strips as i32);
        (-1..=1)
            .flat_map(move |df| (-1..=1).map(move |db| (f + df, b + db)))
            .filter(move |&(cf, cb)| {
                (cf, cb) != (f, b) && cf >= 0 && cb >= 0 && cf < nf && cb < nb
            })
            .map(|(cf, cb)| Self::new(cf as u16, cb as u16))
    }
}

/// A secondary pulse extracted from a trace containing multiple pulses.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SubPulse {
    /// Calibrated energy of the secondary pulse.
    pub energy: f64,
    /// Hardware clock timestamp of the secondary pulse.
    pub time: u64,
}

/// One detector-channel firing on a single strip.
///
/// Immutable once produced by the calibration stage; the matcher only reads
/// these and synthesizes fresh hits from sub-pulses.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StripHit {
    /// Calibrated energy.
    pub energy: f64,
    /// Hardware clock timestamp in ticks.
    pub time: u64,
    /// Strip index on its side of the detector.
    pub strip: u16,
    /// ADC saturation flag.
    pub saturated: bool,
    /// True for hits synthesized from a secondary pulse.
    pub pileup: bool,
    /// Secondary pulses riding on the same trace, if any.
    #[cfg_attr(feature = "serde", serde(default))]
    pub subhits: Vec<SubPulse>,
}

impl StripHit {
    /// Creates a new hit with no secondary pulses.
    pub fn new(energy: f64, time: u64, strip: u16) -> Self {
        Self {
            energy,
            time,
            strip,
            saturated: false,
            pileup: false,
            subhits: Vec::new(),
        }
    }

    /// Marks the hit as saturated.
    #[must_use]
    pub fn saturated(mut self) -> Self {
        self.saturated = true;
        self
    }

    /// Attaches a secondary pulse.
    #[must_use]
    pub fn with_subhit(mut self, energy: f64, time: u64) -> Self {
        self.subhits.push(SubPulse { energy, time });
        self
    }

    /// Checks the hit carries a usable energy value.
    ///
    /// NaN or negative energies come from failed fits upstream and must be
    /// excluded from matching rather than aborting the frame.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Screens the hit, naming the offending field on rejection.
    pub fn validate(&self) -> Result<()> {
        if !self.energy.is_finite() {
            return Err(Error::InvalidHit(format!(
                "non-finite energy on strip {}",
                self.strip
            )));
        }
        if self.energy < 0.0 {
            return Err(Error::InvalidHit(format!(
                "negative energy {} on strip {}",
                self.energy, self.strip
            )));
        }
        Ok(())
    }

    /// Absolute time difference to another hit.
    #[inline]
    pub fn time_diff(&self, other: &Self) -> u64 {
        self.time.abs_diff(other.time)
    }
}
