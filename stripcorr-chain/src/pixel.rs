//! Pixel cell state and the fixed-size correlation grid.

use stripcorr_core::{ClassifiedEvent, Error, EventType, PixelLocation, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The implant currently arming a pixel.
#[derive(Debug, Clone, Copy, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ImplantRecord {
    /// Implant energy.
    pub energy: f64,
    /// Implant timestamp in clock ticks.
    pub time: u64,
    /// Time since the previous implant at this pixel, if any.
    pub dtime: u64,
    /// Event type that produced the implant.
    pub event_type: Option<EventType>,
    /// Beam flag at implant time.
    pub beam: bool,
    /// Veto multiplicity at implant time.
    pub veto_multiplicity: u32,
    /// MWPC multiplicity at implant time.
    pub mwpc_multiplicity: u32,
}

/// One decay appended to a pixel's chain.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ChainEntry {
    /// Decay energy.
    pub energy: f64,
    /// Decay timestamp in clock ticks.
    pub time: u64,
    /// Time since the implant.
    pub dtime: u64,
    /// Position in the chain; the implant is generation 0.
    pub generation: u32,
    /// Event type of the decay.
    pub event_type: EventType,
    /// Beam flag at decay time.
    pub beam: bool,
    /// Veto multiplicity at decay time.
    pub veto_multiplicity: u32,
    /// MWPC multiplicity at decay time.
    pub mwpc_multiplicity: u32,
}

impl ChainEntry {
    /// Builds a chain entry from a classified event.
    pub fn from_event(event: &ClassifiedEvent, dtime: u64, generation: u32) -> Self {
        Self {
            energy: event.energy,
            time: event.time,
            dtime,
            generation,
            event_type: event.event_type,
            beam: event.beam,
            veto_multiplicity: event.veto_multiplicity,
            mwpc_multiplicity: event.mwpc_multiplicity,
        }
    }
}

/// Per-pixel correlation state.
///
/// Lives for the duration of an analysis run; cleared, never destroyed.
#[derive(Debug, Clone, Default)]
pub struct PixelCell {
    /// The arming implant.
    pub implant: ImplantRecord,
    /// True once an implant has been recorded.
    pub has_implant: bool,
    /// Decays accumulated since the implant, in arrival order.
    pub chain: Vec<ChainEntry>,
    /// Set when a fast decay marked the chain as interesting.
    pub flagged: bool,
}

impl PixelCell {
    /// Timestamp of the last chain entry, or of the implant if none.
    pub fn last_time(&self) -> u64 {
        self.chain.last().map_or(self.implant.time, |e| e.time)
    }

    /// Generation of the next decay to append.
    pub fn next_generation(&self) -> u32 {
        self.chain.last().map_or(1, |e| e.generation + 1)
    }

    /// Drops the accumulated chain but keeps the pixel armed.
    pub fn clear_chain(&mut self) {
        self.chain.clear();
        self.flagged = false;
    }

    /// Returns the pixel to its empty state.
    pub fn reset(&mut self) {
        self.implant = ImplantRecord::default();
        self.has_implant = false;
        self.clear_chain();
    }

    /// Records a fresh implant, clearing any standing chain.
    pub fn accept_implant(&mut self, event: &ClassifiedEvent, dtime: u64) {
        self.clear_chain();
        self.implant = ImplantRecord {
            energy: event.energy,
            time: event.time,
            dtime,
            event_type: Some(event.event_type),
            beam: event.beam,
            veto_multiplicity: event.veto_multiplicity,
            mwpc_multiplicity: event.mwpc_multiplicity,
        };
        self.has_implant = true;
    }
}

/// Fixed-size 2D grid of pixel cells, indexed by `(front, back)`.
///
/// Created zeroed at correlator construction; the array itself lives for the
/// whole run. Out-of-range locations surface as [`Error::InvalidLocation`]
/// instead of panicking.
#[derive(Debug)]
pub struct PixelGrid {
    cells: Vec<PixelCell>,
    front_strips: u16,
    back_strips: u16,
}

impl PixelGrid {
    /// Allocates an empty grid with the given extents.
    pub fn new(front_strips: u16, back_strips: u16) -> Self {
        let count = front_strips as usize * back_strips as usize;
        Self {
            cells: vec![PixelCell::default(); count],
            front_strips,
            back_strips,
        }
    }

    /// Grid extents as `(front, back)` strip counts.
    pub fn extents(&self) -> (u16, u16) {
        (self.front_strips, self.back_strips)
    }

    fn index(&self, location: PixelLocation) -> Result<usize> {
        if location.front >= self.front_strips || location.back >= self.back_strips {
            return Err(Error::InvalidLocation {
                front: location.front,
                back: location.back,
            });
        }
        Ok(location.front as usize * self.back_strips as usize + location.back as usize)
    }

    /// Borrows the cell at a location.
    pub fn cell(&self, location: PixelLocation) -> Result<&PixelCell> {
        let idx = self.index(location)?;
        Ok(&self.cells[idx])
    }

    /// Mutably borrows the cell at a location.
    pub fn cell_mut(&mut self, location: PixelLocation) -> Result<&mut PixelCell> {
        let idx = self.index(location)?;
        Ok(&mut self.cells[idx])
    }

    /// Iterates all cells with their locations.
    pub fn iter(&self) -> impl Iterator<Item = (PixelLocation, &PixelCell)> {
        let back = self.back_strips as usize;
        self.cells.iter().enumerate().map(move |(idx, cell)| {
            let location = PixelLocation::new((idx / back) as u16, (idx % back) as u16);
            (location, cell)
        })
    }

    /// Iterates all cells mutably with their locations.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (PixelLocation, &mut PixelCell)> {
        let back = self.back_strips as usize;
        self.cells.iter_mut().enumerate().map(move |(idx, cell)| {
            let location = PixelLocation::new((idx / back) as u16, (idx % back) as u16);
            (location, cell)
        })
    }
}
