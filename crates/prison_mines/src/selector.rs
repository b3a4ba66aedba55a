//! # Block Selector
//!
//! Weighted random choice over a mine palette.
//!
//! ## Algorithm
//!
//! 1. Draw a value in `[0, 100)`.
//! 2. Walk the palette in configured order, subtracting each chance until the
//!    draw falls inside an entry. A draw past the last entry is air.
//! 3. If the candidate is not eligible at this level/position, start over
//!    with a fresh draw. After [`MAX_SELECT_ATTEMPTS`] draws, use air.
//!
//! The full redraw is an approximation: with bands active it slightly favors
//! entries that come earlier in the palette. Renormalizing per cell would be
//! exact but costs more over millions of cells.

use rand::Rng;

use crate::block::BlockSpec;

/// Draws per cell before falling back to air.
pub const MAX_SELECT_ATTEMPTS: usize = 10;

/// Result of one selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Selection {
    /// Palette entry at this index.
    Spec(usize),
    /// No entry was chosen.
    Air,
}

/// Picks a palette entry for the cell at `level` (1-based from the top) and
/// scan `position`.
///
/// Pure: counters are the caller's job.
pub fn select_block<R: Rng + ?Sized>(
    palette: &[BlockSpec],
    rng: &mut R,
    level: u64,
    position: usize,
) -> Selection {
    if palette.is_empty() {
        return Selection::Air;
    }

    for _ in 0..MAX_SELECT_ATTEMPTS {
        let mut chance: f64 = rng.gen_range(0.0..100.0);

        let Some(candidate) = palette.iter().position(|spec| {
            if chance < spec.chance {
                return true;
            }
            chance -= spec.chance;
            false
        }) else {
            // Uncovered remainder of the chance range
            return Selection::Air;
        };

        if palette[candidate].is_eligible(level, position) {
            return Selection::Spec(candidate);
        }
    }

    Selection::Air
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_empty_palette_is_air() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert_eq!(select_block(&[], &mut rng, 1, 0), Selection::Air);
    }

    #[test]
    fn test_full_chance_always_picks() {
        let palette = vec![BlockSpec::new("STONE", 100.0)];
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for i in 0..1000 {
            assert_eq!(select_block(&palette, &mut rng, 1, i), Selection::Spec(0));
        }
    }

    #[test]
    fn test_remainder_resolves_to_air() {
        let palette = vec![BlockSpec::new("STONE", 25.0)];
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut air = 0;
        let n = 20_000;
        for i in 0..n {
            if select_block(&palette, &mut rng, 1, i) == Selection::Air {
                air += 1;
            }
        }
        let ratio = f64::from(air) / f64::from(u32::try_from(n).unwrap());
        assert!((ratio - 0.75).abs() < 0.02, "air ratio {ratio}");
    }

    #[test]
    fn test_distribution_follows_weights() {
        let palette = vec![
            BlockSpec::new("STONE", 70.0),
            BlockSpec::new("IRON_ORE", 10.0),
            BlockSpec::new("AIR", 20.0),
        ];
        let mut rng = ChaCha8Rng::seed_from_u64(99);
        let mut counts = [0u32; 3];
        for i in 0..50_000 {
            if let Selection::Spec(s) = select_block(&palette, &mut rng, 1, i) {
                counts[s] += 1;
            }
        }
        let total: u32 = counts.iter().sum();
        assert_eq!(total, 50_000);
        let stone = f64::from(counts[0]) / f64::from(total);
        let iron = f64::from(counts[1]) / f64::from(total);
        assert!((stone - 0.70).abs() < 0.02);
        assert!((iron - 0.10).abs() < 0.02);
    }

    #[test]
    fn test_ineligible_everywhere_falls_back_to_air() {
        let palette = vec![BlockSpec::new("GOLD_ORE", 100.0).excluding_top(5)];
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        assert_eq!(select_block(&palette, &mut rng, 2, 0), Selection::Air);
        assert_eq!(select_block(&palette, &mut rng, 6, 0), Selection::Spec(0));
    }

    #[test]
    fn test_ineligible_candidate_redraws() {
        let palette = vec![
            BlockSpec::new("GOLD_ORE", 50.0).excluding_top(5),
            BlockSpec::new("STONE", 50.0),
        ];
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut stone = 0;
        for i in 0..1000 {
            match select_block(&palette, &mut rng, 1, i) {
                Selection::Spec(1) => stone += 1,
                Selection::Spec(0) => panic!("gold placed inside the excluded band"),
                _ => {}
            }
        }
        // Ten redraws at 50% leave air roughly once in a thousand
        assert!(stone > 990);
    }

    #[test]
    fn test_same_seed_same_choices() {
        let palette = vec![
            BlockSpec::new("STONE", 60.0),
            BlockSpec::new("COAL_ORE", 30.0),
        ];
        let mut a = ChaCha8Rng::seed_from_u64(5);
        let mut b = ChaCha8Rng::seed_from_u64(5);
        for i in 0..500 {
            assert_eq!(
                select_block(&palette, &mut a, 1, i),
                select_block(&palette, &mut b, 1, i)
            );
        }
    }
}
