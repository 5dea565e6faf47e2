#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Breadth-first distance fields and the per-agent cache that reuses them.
//!
//! A field is seeded at a single destination with distance 0 and expands over
//! 4-connected walkable tiles. Expansion stops once `max_budget` cells carry a
//! label, so on large maps an agent far from the seed may find itself outside
//! the labeled region or on a truncated frontier; its steps are then only
//! locally good.

use std::collections::{btree_map::Entry, BTreeMap, VecDeque};

use gridsim_core::{AgentId, CellCoord, Direction};
use gridsim_world::TileMap;
use serde::Deserialize;
use tracing::trace;

/// Distance stored for cells the expansion never reached.
pub const UNLABELED: u16 = u16::MAX;

/// Dense hop-count grid seeded from a single destination.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathField {
    width: u32,
    height: u32,
    seed: CellCoord,
    distances: Vec<u16>,
    labeled: usize,
    truncated: bool,
}

impl PathField {
    /// Destination the field was seeded from.
    #[must_use]
    pub const fn seed(&self) -> CellCoord {
        self.seed
    }

    /// Width of the field in cells.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height of the field in cells.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Number of cells that received a distance.
    #[must_use]
    pub const fn labeled(&self) -> usize {
        self.labeled
    }

    /// Whether the budget ran out before the reachable region was exhausted.
    #[must_use]
    pub const fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Raw distances in row-major order, [`UNLABELED`] where unreached.
    #[must_use]
    pub fn cells(&self) -> &[u16] {
        &self.distances
    }

    /// Recorded distance for the cell, or `None` when out of bounds or unreached.
    #[must_use]
    pub fn distance(&self, cell: CellCoord) -> Option<u16> {
        let index = self.index(cell)?;
        self.distances
            .get(index)
            .copied()
            .filter(|distance| *distance != UNLABELED)
    }

    fn index(&self, cell: CellCoord) -> Option<usize> {
        let column = u32::try_from(cell.column()).ok()?;
        let row = u32::try_from(cell.row()).ok()?;
        if column >= self.width || row >= self.height {
            return None;
        }
        let width = usize::try_from(self.width).ok()?;
        usize::try_from(row)
            .ok()?
            .checked_mul(width)?
            .checked_add(usize::try_from(column).ok()?)
    }
}

/// Builds a distance field over the walkable tiles of the map.
///
/// The seed receives distance 0 unless it is solid or out of bounds, in which
/// case nothing is labeled and every query reports no path. A budget of zero
/// labels nothing.
#[must_use]
pub fn compute_field(tiles: &TileMap, seed: CellCoord, max_budget: usize) -> PathField {
    let cell_count = tiles.visual_layer().len();
    let mut field = PathField {
        width: tiles.width(),
        height: tiles.height(),
        seed,
        distances: vec![UNLABELED; cell_count],
        labeled: 0,
        truncated: false,
    };

    if max_budget == 0 || tiles.is_solid(seed) {
        return field;
    }
    let Some(seed_index) = field.index(seed) else {
        return field;
    };

    field.distances[seed_index] = 0;
    field.labeled = 1;
    let mut queue = VecDeque::from([seed]);

    'expand: while let Some(cell) = queue.pop_front() {
        let Some(current) = field.distance(cell) else {
            continue;
        };
        if current >= UNLABELED.saturating_sub(1) {
            continue;
        }

        for direction in Direction::ALL {
            let neighbor = cell.step(direction);
            if tiles.is_solid(neighbor) {
                continue;
            }
            let Some(index) = field.index(neighbor) else {
                continue;
            };
            if field.distances[index] != UNLABELED {
                continue;
            }
            if field.labeled >= max_budget {
                field.truncated = true;
                break 'expand;
            }

            field.distances[index] = current + 1;
            field.labeled += 1;
            queue.push_back(neighbor);
        }
    }

    field
}

/// Outcome of consulting a field from an agent's position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PathStep {
    /// Move one tile in the given direction.
    Step(Direction),
    /// The agent already stands on the seed.
    Arrived,
    /// No neighbor carries a recorded distance.
    NoPath,
}

/// Chooses the neighbor with the smallest recorded distance.
///
/// Ties resolve to the first neighbor in [`Direction::ALL`] order.
#[must_use]
pub fn next_step(field: &PathField, from: CellCoord) -> PathStep {
    if field.distance(from) == Some(0) {
        return PathStep::Arrived;
    }

    let mut best: Option<(u16, Direction)> = None;
    for direction in Direction::ALL {
        let Some(distance) = field.distance(from.step(direction)) else {
            continue;
        };
        if best.map_or(true, |(current, _)| distance < current) {
            best = Some((distance, direction));
        }
    }

    best.map_or(PathStep::NoPath, |(_, direction)| PathStep::Step(direction))
}

/// Chooses the neighbor whose recorded distance most exceeds the current one.
///
/// Returns `None` when the agent stands outside the labeled region or every
/// neighbor is at least as close to the seed.
#[must_use]
pub fn flee_step(field: &PathField, from: CellCoord) -> Option<Direction> {
    let here = field.distance(from)?;
    let mut best: Option<(u16, Direction)> = None;
    for direction in Direction::ALL {
        let Some(distance) = field.distance(from.step(direction)) else {
            continue;
        };
        if distance <= here {
            continue;
        }
        if best.map_or(true, |(current, _)| distance > current) {
            best = Some((distance, direction));
        }
    }
    best.map(|(_, direction)| direction)
}

/// Staleness thresholds and expansion budget for cached fields.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PathfindingConfig {
    /// Maximum number of cells labeled by a single expansion.
    pub budget: usize,
    /// Manhattan distance the destination may drift before recomputation.
    pub drift_threshold: u32,
    /// Ticks after which a cached field is recomputed regardless of drift.
    pub max_age: u64,
}

impl Default for PathfindingConfig {
    fn default() -> Self {
        Self {
            budget: 4096,
            drift_threshold: 2,
            max_age: 10,
        }
    }
}

#[derive(Clone, Debug)]
struct CachedField {
    field: PathField,
    computed_at: u64,
}

/// Per-agent field cache applying the staleness contract.
#[derive(Debug, Default)]
pub struct PathCache {
    config: PathfindingConfig,
    entries: BTreeMap<AgentId, CachedField>,
    computations: u64,
}

impl PathCache {
    /// Creates an empty cache with the provided thresholds.
    #[must_use]
    pub fn new(config: PathfindingConfig) -> Self {
        Self {
            config,
            entries: BTreeMap::new(),
            computations: 0,
        }
    }

    /// Returns the agent's field toward `destination`, recomputing it when it
    /// was never built, the destination drifted past the threshold, or the
    /// field reached its maximum age.
    pub fn field_for(
        &mut self,
        tiles: &TileMap,
        agent: AgentId,
        destination: CellCoord,
        tick: u64,
    ) -> &PathField {
        let stale = self.is_stale(agent, destination, tick);
        if stale {
            trace!(agent = agent.get(), ?destination, tick, "recomputing path field");
            self.computations = self.computations.saturating_add(1);
        }

        let budget = self.config.budget;
        let rebuild = || CachedField {
            field: compute_field(tiles, destination, budget),
            computed_at: tick,
        };
        let entry = match self.entries.entry(agent) {
            Entry::Occupied(slot) => {
                let entry = slot.into_mut();
                if stale {
                    *entry = rebuild();
                }
                entry
            }
            Entry::Vacant(slot) => slot.insert(rebuild()),
        };
        &entry.field
    }

    /// Reports whether `field_for` would recompute the agent's field.
    #[must_use]
    pub fn is_stale(&self, agent: AgentId, destination: CellCoord, tick: u64) -> bool {
        let Some(entry) = self.entries.get(&agent) else {
            return true;
        };
        let drift = entry.field.seed().manhattan_distance(destination);
        let age = tick.saturating_sub(entry.computed_at);
        drift > self.config.drift_threshold || age >= self.config.max_age
    }

    /// Drops the cached field of a single agent.
    pub fn forget(&mut self, agent: AgentId) {
        let _ = self.entries.remove(&agent);
    }

    /// Drops every cached field, typically after the collision layer changed.
    pub fn invalidate_all(&mut self) {
        self.entries.clear();
    }

    /// Number of agents with a cached field.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Reports whether no field is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of field expansions performed by this cache.
    #[must_use]
    pub const fn computations(&self) -> u64 {
        self.computations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(width: u32, height: u32) -> TileMap {
        TileMap::open(width, height).expect("valid map")
    }

    #[test]
    fn solid_seed_labels_nothing() {
        let tiles = TileMap::from_rows(&[".#."]).expect("valid rows");
        let field = compute_field(&tiles, CellCoord::new(1, 0), 100);
        assert_eq!(field.labeled(), 0);
        assert_eq!(next_step(&field, CellCoord::new(0, 0)), PathStep::NoPath);

        let outside = compute_field(&tiles, CellCoord::new(-1, 0), 100);
        assert_eq!(outside.labeled(), 0);
    }

    #[test]
    fn budget_truncates_expansion() {
        let tiles = open(10, 1);
        let field = compute_field(&tiles, CellCoord::new(0, 0), 4);
        assert_eq!(field.labeled(), 4);
        assert!(field.is_truncated());
        assert_eq!(field.distance(CellCoord::new(3, 0)), Some(3));
        assert_eq!(field.distance(CellCoord::new(4, 0)), None);
        assert_eq!(next_step(&field, CellCoord::new(6, 0)), PathStep::NoPath);
        assert_eq!(
            next_step(&field, CellCoord::new(4, 0)),
            PathStep::Step(Direction::West)
        );

        let whole = compute_field(&tiles, CellCoord::new(0, 0), 10);
        assert!(!whole.is_truncated());
        assert_eq!(whole.labeled(), 10);
    }

    #[test]
    fn ties_follow_the_fixed_scan_order() {
        let tiles = open(3, 3);
        let field = compute_field(&tiles, CellCoord::new(0, 0), 100);
        assert_eq!(
            next_step(&field, CellCoord::new(1, 1)),
            PathStep::Step(Direction::North)
        );
        assert_eq!(next_step(&field, CellCoord::new(0, 0)), PathStep::Arrived);
    }

    #[test]
    fn flee_moves_strictly_away() {
        let tiles = open(5, 1);
        let field = compute_field(&tiles, CellCoord::new(1, 0), 100);
        assert_eq!(flee_step(&field, CellCoord::new(2, 0)), Some(Direction::East));
        assert_eq!(flee_step(&field, CellCoord::new(4, 0)), None);
    }

    #[test]
    fn cache_recomputes_on_drift_and_age() {
        let tiles = open(8, 8);
        let agent = AgentId::new(0);
        let mut cache = PathCache::new(PathfindingConfig {
            budget: 64,
            drift_threshold: 2,
            max_age: 5,
        });

        let _ = cache.field_for(&tiles, agent, CellCoord::new(4, 4), 0);
        assert_eq!(cache.computations(), 1);

        let _ = cache.field_for(&tiles, agent, CellCoord::new(5, 5), 1);
        assert_eq!(cache.computations(), 1, "drift of two is tolerated");

        let seed = cache.field_for(&tiles, agent, CellCoord::new(7, 4), 2).seed();
        assert_eq!(cache.computations(), 2);
        assert_eq!(seed, CellCoord::new(7, 4));

        assert!(!cache.is_stale(agent, CellCoord::new(7, 4), 6));
        assert!(cache.is_stale(agent, CellCoord::new(7, 4), 7));

        cache.forget(agent);
        assert!(cache.is_empty());
        assert!(cache.is_stale(agent, CellCoord::new(7, 4), 7));
    }
}
