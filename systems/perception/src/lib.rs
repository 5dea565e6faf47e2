#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Perception system computing occlusion-aware sight and radius hearing.
//!
//! Sight range uses the Euclidean metric compared in squared integer space,
//! so an observer with range `r` sees cells where `dx² + dy² <= r²`. Lines are
//! rasterized with integer Bresenham starting from the lexicographically
//! smaller endpoint, which makes the tested tile set identical in both
//! directions. Neither endpoint participates in the occlusion test.

use gridsim_core::{AgentId, CellCoord, Command};
use gridsim_world::{query, Agent, TileMap, World};
use serde::Deserialize;
use tracing::trace;

/// Tunables for the perception pass.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PerceptionConfig {
    /// Whether observers that newly see a target alert allies within earshot.
    pub alert_allies: bool,
}

impl Default for PerceptionConfig {
    fn default() -> Self {
        Self {
            alert_allies: true,
        }
    }
}

/// Pure system that records what every behavior-driven agent perceives.
#[derive(Debug, Default)]
pub struct Perception {
    config: PerceptionConfig,
}

impl Perception {
    /// Creates the perception system with the provided configuration.
    #[must_use]
    pub fn new(config: PerceptionConfig) -> Self {
        Self { config }
    }

    /// Emits `RecordPerception` for each live behavior-driven agent, followed
    /// by `AlertAgent` commands for allies that heard a fresh sighting.
    ///
    /// Every observation is taken against the same committed world state.
    pub fn handle(&self, world: &World, out: &mut Vec<Command>) {
        let tiles = query::tile_map(world);
        let mut alerts = Vec::new();
        // Any ally that can hear the observer lies within the widest hearing range.
        let widest_hearing = query::live_agents(world)
            .map(Agent::hearing_range)
            .max()
            .unwrap_or(0);

        for observer in query::live_agents(world) {
            if !observer.kind().runs_behavior() {
                continue;
            }

            let sighting = nearest_visible_target(world, tiles, observer);
            let (target, target_cell, visible) = match sighting {
                Some((target, cell)) => (Some(target), Some(cell), true),
                None => (remembered_target(world, observer), None, false),
            };

            out.push(Command::RecordPerception {
                agent: observer.id(),
                target,
                target_cell,
                visible,
            });

            if let Some(cell) = target_cell {
                if self.config.alert_allies && !observer.target_visible() {
                    trace!(observer = observer.id().get(), ?cell, "target newly sighted");
                    collect_alerts(world, observer, cell, widest_hearing, &mut alerts);
                }
            }
        }

        out.extend(alerts);
    }
}

/// Queues an alert for every same-kind ally that can hear the observer.
fn collect_alerts(
    world: &World,
    observer: &Agent,
    target_cell: CellCoord,
    scan_range: u32,
    alerts: &mut Vec<Command>,
) {
    let index = query::spatial_index(world);
    let radius = bucket_radius(scan_range, index.cell_size());

    for id in index.query(observer.cell(), radius) {
        let Some(ally) = query::agent(world, id) else {
            continue;
        };
        if ally.id() == observer.id() || ally.is_dead() || ally.kind() != observer.kind() {
            continue;
        }
        if !can_hear(ally, observer.cell()) {
            continue;
        }
        alerts.push(Command::AlertAgent {
            agent: ally.id(),
            cell: target_cell,
        });
    }
}

/// Reports whether `observer` sees the target cell: within sight range and
/// with no solid tile strictly between them.
#[must_use]
pub fn can_see(tiles: &TileMap, observer: &Agent, target: CellCoord) -> bool {
    within_range(observer.cell(), target, observer.sight_range())
        && has_line_of_sight(tiles, observer.cell(), target)
}

/// Reports whether `observer` hears the target cell. Walls do not muffle sound.
#[must_use]
pub fn can_hear(observer: &Agent, target: CellCoord) -> bool {
    within_range(observer.cell(), target, observer.hearing_range())
}

/// Euclidean range test performed on squared integer distances.
#[must_use]
pub fn within_range(from: CellCoord, to: CellCoord, range: u32) -> bool {
    let range = u64::from(range);
    from.distance_squared(to) <= range * range
}

/// Reports whether no intermediate tile of the rasterized line is solid.
#[must_use]
pub fn has_line_of_sight(tiles: &TileMap, from: CellCoord, to: CellCoord) -> bool {
    let cells = line_cells(from, to);
    let interior = cells.len().saturating_sub(1);
    cells
        .iter()
        .take(interior)
        .skip(1)
        .all(|cell| !tiles.is_solid(*cell))
}

/// Cells visited by the integer line from `from` to `to`, both endpoints included.
///
/// The line is always walked from the smaller endpoint and reversed when
/// needed, so `line_cells(a, b)` is the reverse of `line_cells(b, a)`.
#[must_use]
pub fn line_cells(from: CellCoord, to: CellCoord) -> Vec<CellCoord> {
    let reversed = to < from;
    let (start, end) = if reversed { (to, from) } else { (from, to) };

    let (x1, y1) = (i64::from(end.column()), i64::from(end.row()));
    let (mut x, mut y) = (i64::from(start.column()), i64::from(start.row()));
    let dx = (x1 - x).abs();
    let dy = -(y1 - y).abs();
    let step_x = if x < x1 { 1 } else { -1 };
    let step_y = if y < y1 { 1 } else { -1 };
    let mut error = dx + dy;

    let capacity = usize::try_from(dx.max(-dy)).unwrap_or(0).saturating_add(1);
    let mut cells = Vec::with_capacity(capacity);
    loop {
        // Coordinates stay between the two i32 endpoints.
        let column = i32::try_from(x).unwrap_or(i32::MAX);
        let row = i32::try_from(y).unwrap_or(i32::MAX);
        cells.push(CellCoord::new(column, row));
        if x == x1 && y == y1 {
            break;
        }
        let doubled = 2 * error;
        if doubled >= dy {
            error += dy;
            x += step_x;
        }
        if doubled <= dx {
            error += dx;
            y += step_y;
        }
    }

    if reversed {
        cells.reverse();
    }
    cells
}

fn nearest_visible_target(
    world: &World,
    tiles: &TileMap,
    observer: &Agent,
) -> Option<(AgentId, CellCoord)> {
    let index = query::spatial_index(world);
    let radius = bucket_radius(observer.sight_range(), index.cell_size());

    index
        .query(observer.cell(), radius)
        .into_iter()
        .filter_map(|id| query::agent(world, id))
        .filter(|candidate| !candidate.is_dead())
        .filter(|candidate| observer.kind().is_hostile_to(candidate.kind()))
        .filter(|candidate| can_see(tiles, observer, candidate.cell()))
        .min_by_key(|candidate| (observer.cell().distance_squared(candidate.cell()), candidate.id()))
        .map(|candidate| (candidate.id(), candidate.cell()))
}

fn remembered_target(world: &World, observer: &Agent) -> Option<AgentId> {
    observer
        .target()
        .filter(|id| query::agent(world, *id).is_some_and(|agent| !agent.is_dead()))
}

fn bucket_radius(range: u32, cell_size: u32) -> u32 {
    let cell_size = cell_size.max(1);
    range.saturating_add(cell_size - 1) / cell_size
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_is_identical_in_both_directions() {
        let pairs = [
            (CellCoord::new(0, 0), CellCoord::new(4, 4)),
            (CellCoord::new(1, 5), CellCoord::new(6, 2)),
            (CellCoord::new(3, 0), CellCoord::new(0, 7)),
            (CellCoord::new(-2, 3), CellCoord::new(2, 3)),
        ];
        for (a, b) in pairs {
            let mut forward = line_cells(a, b);
            let backward = line_cells(b, a);
            assert_eq!(forward.first(), Some(&a));
            assert_eq!(forward.last(), Some(&b));
            forward.reverse();
            assert_eq!(forward, backward);
        }
    }

    #[test]
    fn diagonal_line_visits_every_diagonal_cell() {
        let cells = line_cells(CellCoord::new(0, 0), CellCoord::new(3, 3));
        assert_eq!(
            cells,
            vec![
                CellCoord::new(0, 0),
                CellCoord::new(1, 1),
                CellCoord::new(2, 2),
                CellCoord::new(3, 3),
            ]
        );
        assert_eq!(line_cells(CellCoord::new(2, 2), CellCoord::new(2, 2)).len(), 1);
    }

    #[test]
    fn endpoints_do_not_occlude() {
        let tiles = TileMap::from_rows(&["#.#"]).expect("valid rows");
        assert!(has_line_of_sight(
            &tiles,
            CellCoord::new(0, 0),
            CellCoord::new(2, 0)
        ));
        let walled = TileMap::from_rows(&[".#."]).expect("valid rows");
        assert!(!has_line_of_sight(
            &walled,
            CellCoord::new(0, 0),
            CellCoord::new(2, 0)
        ));
    }

    #[test]
    fn range_is_euclidean() {
        let origin = CellCoord::new(0, 0);
        assert!(within_range(origin, CellCoord::new(3, 4), 5));
        assert!(!within_range(origin, CellCoord::new(4, 4), 5));
        assert!(within_range(origin, origin, 0));
    }

    #[test]
    fn bucket_radius_rounds_up() {
        assert_eq!(bucket_radius(8, 1), 8);
        assert_eq!(bucket_radius(8, 3), 3);
        assert_eq!(bucket_radius(0, 4), 0);
        assert_eq!(bucket_radius(5, 0), 5);
    }
}
