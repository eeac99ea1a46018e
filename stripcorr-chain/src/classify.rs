//! Event-type classification via a fixed condition-code table.

use stripcorr_core::{ClassifierCutoffs, EventType};

/// Classifies one matched pair's energy against the frame's auxiliary flags.
///
/// A 3-bit condition code is built from the auxiliary detectors
/// (`beam` bit 0, `mwpc_multiplicity > 0` bit 1, `veto` bit 2) and dispatched
/// through a fixed table. Total: every code and any energy yields a value.
///
/// Code 3 (beam + MWPC, no veto) is the only energy-conditioned branch to
/// `HeavyIon`: below the recoil cutoff it falls through to `Unknown`.
pub fn classify(
    energy: f64,
    beam: bool,
    mwpc_multiplicity: u32,
    veto: bool,
    cutoffs: &ClassifierCutoffs,
) -> EventType {
    let code = u8::from(beam) | (u8::from(mwpc_multiplicity > 0) << 1) | (u8::from(veto) << 2);

    match code {
        // Quiet frame: a decay, split alpha/fission by energy.
        0 => {
            if energy < cutoffs.cutoff_energy {
                EventType::Alpha
            } else {
                EventType::Fission
            }
        }
        // Beam alone, nothing seen at the monitor.
        1 => EventType::Unknown,
        // MWPC coincidence without beam, or with veto: incoming ion.
        2 | 4 | 6 => EventType::HeavyIon,
        // Beam + MWPC: a recoil only above the energy cutoff.
        3 => {
            if energy > cutoffs.recoil_energy_cutoff {
                EventType::HeavyIon
            } else {
                EventType::Unknown
            }
        }
        // Beam + veto combinations: punch-through light ion.
        5 | 7 => EventType::LightIon,
        _ => EventType::Unknown,
    }
}
