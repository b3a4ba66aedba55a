//! # Block List Generator
//!
//! Builds the target block registry for a mine without touching the world.
//!
//! The scan runs top-down (y from max to min, then x, then z) so that paging
//! refreshes the top of the mine first. Band markers are recorded as the
//! scan crosses each entry's excluded layers, and a correction pass then
//! tops up entries that fell short of their minimum.
//!
//! Generation is pure and safe to run on a worker thread.

use std::time::Instant;

use rand::Rng;
use tracing::{debug, error};

use crate::block::{BlockSpec, BlockType};
use crate::bounds::Bounds;
use crate::job::ResetType;
use crate::mine::Mine;
use crate::selector::{select_block, Selection};
use crate::target::{TargetBlock, TargetBlockKey, TargetBlockRegistry};

/// A freshly generated block list.
#[derive(Debug, Default)]
pub struct BlockList {
    /// Planned cells in scan order.
    pub targets: TargetBlockRegistry,
    /// Air cells in the list.
    pub air_count: u64,
    /// Air cells as of the end of the scan, kept in step with `air_count`
    /// by the correction pass.
    pub air_count_original: u64,
}

/// What [`generate`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GenerateOutcome {
    /// A new list was installed.
    Generated {
        /// Cells in the list.
        cells: usize,
        /// Air cells in the list.
        air: u64,
        /// Time spent.
        elapsed_ms: u64,
    },
    /// Virtual or deleted mine.
    Skipped,
    /// The mine's world cannot be resolved.
    Disabled,
}

/// Regenerates a mine's block list in place.
///
/// Virtual and deleted mines are left alone. A disabled mine logs an error.
/// Counters and statistics are zeroed first, except the break counter.
pub fn generate<R: Rng + ?Sized>(mine: &mut Mine, rng: &mut R, reset_type: ResetType) -> GenerateOutcome {
    if !prepare_generation(mine) {
        return if mine.is_virtual() || mine.is_deleted() {
            GenerateOutcome::Skipped
        } else {
            GenerateOutcome::Disabled
        };
    }

    let bounds = mine.bounds().clone();
    let mut palette = mine.palette().to_vec();

    let start = Instant::now();
    let list = build_block_list(&bounds, &mut palette, reset_type, rng);
    let elapsed_ms = elapsed_ms(start);

    install_block_list(mine, list, &palette, elapsed_ms)
}

/// Checks the preconditions and zeroes generation counters. Returns false
/// if generation must not run.
pub fn prepare_generation(mine: &mut Mine) -> bool {
    if mine.is_virtual() || mine.is_deleted() {
        return false;
    }
    if !mine.is_enabled() {
        error!(
            mine = %mine.name(),
            "block list generation failed: mine is not enabled, ensure its world exists"
        );
        return false;
    }

    mine.state_mut().reset_for_generation();
    for spec in mine.palette_mut() {
        spec.reset_counters();
    }
    mine.targets_mut().clear();
    true
}

/// Moves a generated list into the mine. Only the generation counters of
/// `generated` are copied, so breaks recorded while the list was built are
/// kept.
pub fn install_block_list(
    mine: &mut Mine,
    list: BlockList,
    generated: &[BlockSpec],
    elapsed_ms: u64,
) -> GenerateOutcome {
    for (live, built) in mine.palette_mut().iter_mut().zip(generated) {
        live.counters.placed = built.counters.placed;
        live.counters.range_low = built.counters.range_low;
        live.counters.range_high = built.counters.range_high;
    }

    let cells = list.targets.len();
    let air = list.air_count;
    {
        let state = mine.state_mut();
        state.air_count = list.air_count;
        state.air_count_original = list.air_count_original;
        state.stats.generation_time_ms = elapsed_ms;
    }
    *mine.targets_mut() = list.targets;

    debug!(mine = %mine.name(), cells, air, elapsed_ms, "block list generated");
    GenerateOutcome::Generated {
        cells,
        air,
        elapsed_ms,
    }
}

/// Scans `bounds` and picks a block for every cell.
///
/// Resets the per-generation counters of `palette` and leaves the new
/// placement counts and band markers in it.
pub fn build_block_list<R: Rng + ?Sized>(
    bounds: &Bounds,
    palette: &mut [BlockSpec],
    reset_type: ResetType,
    rng: &mut R,
) -> BlockList {
    for spec in palette.iter_mut() {
        spec.reset_counters();
    }

    let capacity = usize::try_from(bounds.total_cells()).unwrap_or(0);
    let mut list = BlockList {
        targets: TargetBlockRegistry::with_capacity(capacity),
        ..BlockList::default()
    };

    let air = BlockType::air();
    let total_levels = bounds.height();
    let mut level = 0u64;
    let mut position = 0usize;

    for y in (bounds.min_y()..=bounds.max_y()).rev() {
        level += 1;
        track_band_markers(palette, level, total_levels, position);

        for x in bounds.min_x()..=bounds.max_x() {
            for z in bounds.min_z()..=bounds.max_z() {
                let edge = bounds.is_edge(x, y, z);

                let selection = match reset_type {
                    ResetType::Clear => Selection::Air,
                    ResetType::Normal => select_block(palette, rng, level, position),
                };
                let (block, spec) = match selection {
                    Selection::Spec(i) => {
                        palette[i].counters.placed += 1;
                        (palette[i].block.clone(), Some(i))
                    }
                    Selection::Air => (air.clone(), None),
                };

                if block.is_air() {
                    list.air_count += 1;
                }
                list.targets
                    .push(TargetBlock::new(TargetBlockKey::new(x, y, z), block, spec, edge));
                position += 1;
            }
        }
    }

    // A top band covering every level leaves nothing eligible
    for spec in palette.iter_mut() {
        if spec.exclude_top_layers > 0 && spec.counters.range_low.is_none() {
            spec.counters.range_low = Some(position);
        }
    }

    list.air_count_original = list.air_count;

    if reset_type == ResetType::Normal {
        apply_min_constraints(palette, &mut list, rng);
    }
    list
}

/// Records the scan position where each banded entry's eligible range
/// starts (below the top band) and ends (entering the bottom band).
fn track_band_markers(palette: &mut [BlockSpec], level: u64, total_levels: u64, position: usize) {
    for spec in palette.iter_mut().filter(|s| s.is_banded()) {
        if spec.exclude_top_layers > 0
            && spec.counters.range_low.is_none()
            && level > spec.exclude_top_layers
        {
            spec.counters.range_low = Some(position);
        }
        if spec.exclude_bottom_layers > 0
            && spec.counters.range_high.is_none()
            && level > total_levels.saturating_sub(spec.exclude_bottom_layers)
        {
            spec.counters.range_high = Some(position);
        }
    }
}

/// Tops up entries below their configured minimum.
///
/// For each short entry, up to `3 x deficit` random positions inside its
/// eligible band are tried. A position is replaced only if its current
/// entry has no min/max of its own and is a different block. This is best
/// effort: small or crowded bands can leave an entry short.
///
/// Returns the number of replacements.
pub fn apply_min_constraints<R: Rng + ?Sized>(
    palette: &mut [BlockSpec],
    list: &mut BlockList,
    rng: &mut R,
) -> u64 {
    let len = list.targets.len();
    let mut replaced = 0u64;

    for target_spec in 0..palette.len() {
        let deficit = palette[target_spec].min_deficit();
        if deficit == 0 {
            continue;
        }
        let (low, high) = palette[target_spec].eligible_band(len);
        if low >= high {
            continue;
        }

        let min = palette[target_spec].constraint_min;
        let block = palette[target_spec].block.clone();

        for _ in 0..deficit.saturating_mul(3) {
            if palette[target_spec].counters.placed >= min {
                break;
            }

            let position = rng.gen_range(low..high);
            let Some(target) = list.targets.get_mut(position) else {
                continue;
            };

            let replaceable = target.block() != &block
                && target
                    .spec()
                    .map_or(true, |current| !palette[current].is_count_constrained());
            if !replaceable {
                continue;
            }

            if target.is_air() {
                list.air_count = list.air_count.saturating_sub(1);
                list.air_count_original = list.air_count_original.saturating_sub(1);
            }
            if let Some(current) = target.spec() {
                let counters = &mut palette[current].counters;
                counters.placed = counters.placed.saturating_sub(1);
            }

            target.assign(block.clone(), Some(target_spec));
            palette[target_spec].counters.placed += 1;
            replaced += 1;
        }
    }

    replaced
}

#[inline]
fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MineDefinition;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn scenario_mine() -> Mine {
        let def = MineDefinition::new("scenario", "world", [0, 0, 0], [9, 9, 9])
            .with_block(BlockSpec::new("STONE", 70.0))
            .with_block(BlockSpec::new("IRON_ORE", 10.0).with_min(5))
            .with_block(BlockSpec::new("AIR", 20.0));
        Mine::from_definition(&def).unwrap()
    }

    fn count_of(mine: &Mine, name: &str) -> usize {
        mine.targets()
            .iter()
            .filter(|t| t.block().as_str() == name)
            .count()
    }

    #[test]
    fn test_scenario_stone_iron_air() {
        let mut mine = scenario_mine();
        let mut rng = ChaCha8Rng::seed_from_u64(2024);

        let outcome = generate(&mut mine, &mut rng, ResetType::Normal);
        assert!(matches!(outcome, GenerateOutcome::Generated { cells: 1000, .. }));

        assert_eq!(mine.targets().len(), 1000);
        assert!(count_of(&mine, "IRON_ORE") >= 5);
        assert_eq!(mine.state().air_count_original, mine.state().air_count);
        let air = u64::try_from(count_of(&mine, "AIR")).unwrap();
        assert_eq!(mine.state().air_count, air);

        let placed: u64 = mine.palette().iter().map(|s| s.counters.placed).sum();
        let fallback_air = mine
            .targets()
            .iter()
            .filter(|t| t.spec().is_none())
            .count();
        assert_eq!(placed + u64::try_from(fallback_air).unwrap(), 1000);
    }

    #[test]
    fn test_scan_is_top_down() {
        let mut mine = scenario_mine();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        generate(&mut mine, &mut rng, ResetType::Normal);

        let keys: Vec<TargetBlockKey> = mine.targets().iter().map(TargetBlock::key).collect();
        assert_eq!(keys[0], TargetBlockKey::new(0, 9, 0));
        assert_eq!(keys[1], TargetBlockKey::new(0, 9, 1));
        assert_eq!(keys[10], TargetBlockKey::new(1, 9, 0));
        assert_eq!(keys[100], TargetBlockKey::new(0, 8, 0));
        assert_eq!(keys[999], TargetBlockKey::new(9, 0, 9));
        assert!(keys.windows(2).all(|w| w[0].y >= w[1].y));
        assert_eq!(mine.targets().position_of(&TargetBlockKey::new(0, 8, 0)), Some(100));
    }

    #[test]
    fn test_regeneration_has_same_length() {
        let mut mine = scenario_mine();
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        generate(&mut mine, &mut rng, ResetType::Normal);
        let first = mine.targets().len();
        generate(&mut mine, &mut rng, ResetType::Normal);
        assert_eq!(first, 1000);
        assert_eq!(mine.targets().len(), 1000);
    }

    #[test]
    fn test_fixed_seed_is_deterministic() {
        let mut a = scenario_mine();
        let mut b = scenario_mine();
        generate(&mut a, &mut ChaCha8Rng::seed_from_u64(77), ResetType::Normal);
        generate(&mut b, &mut ChaCha8Rng::seed_from_u64(77), ResetType::Normal);
        let blocks_a: Vec<&str> = a.targets().iter().map(|t| t.block().as_str()).collect();
        let blocks_b: Vec<&str> = b.targets().iter().map(|t| t.block().as_str()).collect();
        assert_eq!(blocks_a, blocks_b);
    }

    #[test]
    fn test_empty_palette_is_all_air() {
        let def = MineDefinition::new("empty", "world", [0, 0, 0], [4, 4, 4]);
        let mut mine = Mine::from_definition(&def).unwrap();
        generate(&mut mine, &mut ChaCha8Rng::seed_from_u64(0), ResetType::Normal);
        assert_eq!(mine.state().air_count, 125);
        assert!(mine.targets().iter().all(TargetBlock::is_air));
    }

    #[test]
    fn test_clear_is_all_air() {
        let mut mine = scenario_mine();
        generate(&mut mine, &mut ChaCha8Rng::seed_from_u64(0), ResetType::Clear);
        assert_eq!(mine.state().air_count, 1000);
        assert!(mine.palette().iter().all(|s| s.counters.placed == 0));
    }

    #[test]
    fn test_virtual_and_disabled_mines() {
        let mut def = MineDefinition::new("v", "world", [0, 0, 0], [1, 1, 1]);
        def.is_virtual = true;
        let mut virtual_mine = Mine::from_definition(&def).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert_eq!(generate(&mut virtual_mine, &mut rng, ResetType::Normal), GenerateOutcome::Skipped);
        assert!(virtual_mine.targets().is_empty());

        let mut disabled = scenario_mine();
        disabled.set_enabled(false);
        assert_eq!(generate(&mut disabled, &mut rng, ResetType::Normal), GenerateOutcome::Disabled);
        assert!(disabled.targets().is_empty());
    }

    #[test]
    fn test_break_count_survives_generation() {
        let mut mine = scenario_mine();
        mine.state_mut().break_count = 123;
        mine.state_mut().bypass_count = 2;
        generate(&mut mine, &mut ChaCha8Rng::seed_from_u64(4), ResetType::Normal);
        assert_eq!(mine.state().break_count, 123);
        assert_eq!(mine.state().bypass_count, 0);
    }

    #[test]
    fn test_top_band_never_used() {
        let def = MineDefinition::new("banded", "world", [0, 0, 0], [9, 9, 9])
            .with_block(BlockSpec::new("GOLD_ORE", 30.0).excluding_top(3))
            .with_block(BlockSpec::new("STONE", 70.0));
        let mut mine = Mine::from_definition(&def).unwrap();
        generate(&mut mine, &mut ChaCha8Rng::seed_from_u64(8), ResetType::Normal);

        assert!(mine
            .targets()
            .iter()
            .filter(|t| t.key().y >= 7)
            .all(|t| t.block().as_str() != "GOLD_ORE"));
        assert_eq!(mine.palette()[0].counters.range_low, Some(300));
        assert!(count_of(&mine, "GOLD_ORE") > 0);
    }

    #[test]
    fn test_bottom_band_never_used() {
        let def = MineDefinition::new("banded", "world", [0, 0, 0], [9, 9, 9])
            .with_block(BlockSpec::new("DIAMOND_ORE", 30.0).excluding_bottom(2).with_min(50))
            .with_block(BlockSpec::new("STONE", 70.0));
        let mut mine = Mine::from_definition(&def).unwrap();
        generate(&mut mine, &mut ChaCha8Rng::seed_from_u64(8), ResetType::Normal);

        assert_eq!(mine.palette()[0].counters.range_high, Some(800));
        assert!(mine
            .targets()
            .iter()
            .filter(|t| t.key().y <= 1)
            .all(|t| t.block().as_str() != "DIAMOND_ORE"));
    }

    #[test]
    fn test_band_covering_whole_mine_is_skipped() {
        let def = MineDefinition::new("tall_band", "world", [0, 0, 0], [2, 2, 2])
            .with_block(BlockSpec::new("GOLD_ORE", 50.0).excluding_top(5).with_min(3))
            .with_block(BlockSpec::new("STONE", 50.0));
        let mut mine = Mine::from_definition(&def).unwrap();
        generate(&mut mine, &mut ChaCha8Rng::seed_from_u64(3), ResetType::Normal);
        assert_eq!(count_of(&mine, "GOLD_ORE"), 0);
        assert_eq!(mine.targets().len(), 27);
    }

    #[test]
    fn test_min_constraint_fills_band() {
        // 1% chance but 40 required inside the lower half
        let def = MineDefinition::new("rare", "world", [0, 0, 0], [9, 9, 9])
            .with_block(BlockSpec::new("EMERALD_ORE", 1.0).with_min(40).excluding_top(5))
            .with_block(BlockSpec::new("STONE", 99.0));
        let mut mine = Mine::from_definition(&def).unwrap();
        generate(&mut mine, &mut ChaCha8Rng::seed_from_u64(12), ResetType::Normal);

        let placed = mine.palette()[0].counters.placed;
        assert!(placed >= 40, "placed {placed}");
        assert_eq!(u64::try_from(count_of(&mine, "EMERALD_ORE")).unwrap(), placed);
        assert!(mine
            .targets()
            .iter()
            .filter(|t| t.key().y >= 5)
            .all(|t| t.block().as_str() != "EMERALD_ORE"));
    }

    #[test]
    fn test_min_pass_leaves_constrained_entries_alone() {
        let bounds = Bounds::new("world", [0, 0, 0], [9, 9, 9]);
        let mut palette = vec![
            BlockSpec::new("STONE", 50.0),
            BlockSpec::new("COAL_ORE", 50.0).with_max(600),
        ];
        let mut rng = ChaCha8Rng::seed_from_u64(21);
        let mut list = build_block_list(&bounds, &mut palette, ResetType::Normal, &mut rng);

        // No entry has a minimum: the pass changes nothing
        let before: Vec<u64> = palette.iter().map(|s| s.counters.placed).collect();
        let air_before = list.air_count;
        assert_eq!(apply_min_constraints(&mut palette, &mut list, &mut rng), 0);
        let after: Vec<u64> = palette.iter().map(|s| s.counters.placed).collect();
        assert_eq!(before, after);
        assert_eq!(list.air_count, air_before);

        // Give stone a minimum it already has and coal a high one: coal is
        // max-constrained, so only unconstrained cells could be replaced
        palette[0].constraint_min = 1;
        palette.push(BlockSpec::new("IRON_ORE", 0.0).with_min(900));
        let coal_before = palette[1].counters.placed;
        let stone_before = palette[0].counters.placed;
        apply_min_constraints(&mut palette, &mut list, &mut rng);
        assert_eq!(palette[1].counters.placed, coal_before);
        assert_eq!(palette[0].counters.placed, stone_before);
    }

    #[test]
    fn test_max_constraint_respected() {
        let def = MineDefinition::new("capped", "world", [0, 0, 0], [9, 9, 9])
            .with_block(BlockSpec::new("GOLD_ORE", 50.0).with_max(20))
            .with_block(BlockSpec::new("STONE", 50.0));
        let mut mine = Mine::from_definition(&def).unwrap();
        generate(&mut mine, &mut ChaCha8Rng::seed_from_u64(6), ResetType::Normal);
        assert_eq!(count_of(&mine, "GOLD_ORE"), 20);
    }
}
