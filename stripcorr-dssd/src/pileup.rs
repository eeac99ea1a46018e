//! Pileup trace expansion.

use stripcorr_core::StripHit;

/// Expands hits carrying secondary pulses into additional synthetic hits.
///
/// Each sub-pulse becomes a hit on the same strip with its own time and
/// energy, marked `pileup = true`; the parent keeps its primary values.
/// Parent order is preserved and synthetic hits follow their parent, so the
/// matcher's greedy input-order contract stays deterministic.
pub fn expand_pileup(hits: &[StripHit]) -> Vec<StripHit> {
    let extra: usize = hits.iter().map(|h| h.subhits.len()).sum();
    let mut expanded = Vec::with_capacity(hits.len() + extra);

    for hit in hits {
        expanded.push(StripHit {
            subhits: Vec::new(),
            ..hit.clone()
        });
        for sub in &hit.subhits {
            expanded.push(StripHit {
                energy: sub.energy,
                time: sub.time,
                strip: hit.strip,
                saturated: hit.saturated,
                pileup: true,
                subhits: Vec::new(),
            });
        }
    }

    expanded
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_plain_hits_pass_through() {
        let hits = vec![StripHit::new(500.0, 100, 3), StripHit::new(400.0, 200, 4)];
        let expanded = expand_pileup(&hits);
        assert_eq!(expanded.len(), 2);
        assert!(expanded.iter().all(|h| !h.pileup));
    }

    #[test]
    fn test_subhits_become_synthetic_hits() {
        let hits = vec![
            StripHit::new(500.0, 100, 3).with_subhit(120.0, 140),
            StripHit::new(400.0, 200, 4),
        ];
        let expanded = expand_pileup(&hits);
        assert_eq!(expanded.len(), 3);

        // Synthetic hit follows its parent, same strip, pileup set.
        assert!(!expanded[0].pileup);
        assert!(expanded[1].pileup);
        assert_eq!(expanded[1].strip, 3);
        assert_eq!(expanded[1].time, 140);
        assert_relative_eq!(expanded[1].energy, 120.0);
        assert_eq!(expanded[2].strip, 4);
    }

    #[test]
    fn test_expansion_drops_subhit_payload() {
        let hits = vec![StripHit::new(500.0, 100, 3).with_subhit(120.0, 140)];
        let expanded = expand_pileup(&hits);
        assert!(expanded.iter().all(|h| h.subhits.is_empty()));
    }
}
