//! Pure collision resolution for requested moves.

use std::collections::BTreeMap;

use gridsim_core::{AgentId, AgentKind, CellCoord, CollisionKind, CollisionTile, Direction};
use serde::Deserialize;

use crate::{agents::AgentRegistry, spatial::SpatialIndex, tile_map::TileMap, World};

/// Longest chain of agents a single push may displace.
pub const MAX_PUSH_CHAIN: usize = 4;

/// Response applied when a mover runs into a solid occupant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OccupantResponse {
    /// The move is denied.
    #[default]
    Block,
    /// The occupant is displaced one tile further along the move.
    Push,
    /// Mover and occupant exchange positions.
    Swap,
}

/// Table of occupant responses keyed by `(mover kind, occupant kind)`.
///
/// Unlisted pairs block.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InteractionPolicy {
    rules: BTreeMap<(AgentKind, AgentKind), OccupantResponse>,
}

impl InteractionPolicy {
    /// Creates a policy where every pair blocks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Players push props and swap places with allies.
    #[must_use]
    pub fn standard() -> Self {
        Self::new()
            .with_rule(AgentKind::Player, AgentKind::Prop, OccupantResponse::Push)
            .with_rule(AgentKind::Player, AgentKind::Ally, OccupantResponse::Swap)
    }

    /// Returns the policy extended with a rule for the provided pair.
    #[must_use]
    pub fn with_rule(
        mut self,
        mover: AgentKind,
        occupant: AgentKind,
        response: OccupantResponse,
    ) -> Self {
        self.set_rule(mover, occupant, response);
        self
    }

    /// Inserts or replaces the rule for the provided pair.
    pub fn set_rule(&mut self, mover: AgentKind, occupant: AgentKind, response: OccupantResponse) {
        let _ = self.rules.insert((mover, occupant), response);
    }

    /// Response configured for the pair, defaulting to [`OccupantResponse::Block`].
    #[must_use]
    pub fn response(&self, mover: AgentKind, occupant: AgentKind) -> OccupantResponse {
        self.rules
            .get(&(mover, occupant))
            .copied()
            .unwrap_or_default()
    }
}

/// Agent displacement required to commit an allowed move.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MoveEffect {
    /// Only the mover changes position.
    Step,
    /// The listed agents are displaced to the paired cells, nearest first.
    Push {
        /// Displaced agents and their destinations.
        chain: Vec<(AgentId, CellCoord)>,
    },
    /// The occupant moves onto the mover's cell.
    Swap {
        /// Agent exchanging positions with the mover.
        occupant: AgentId,
    },
}

/// Outcome of resolving a single requested move.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CollisionResult {
    /// Whether the move may be committed.
    pub allowed: bool,
    /// Collision classification of the destination tile.
    pub kind: CollisionKind,
    /// Solid occupant that denied or shaped the move.
    pub blocking_agent: Option<AgentId>,
    /// Collision tile at the destination.
    pub tile: CollisionTile,
    /// Requested destination.
    pub destination: CellCoord,
    /// Displacements to perform on commit; present only when allowed.
    pub effect: Option<MoveEffect>,
}

impl CollisionResult {
    fn denied(destination: CellCoord, tile: CollisionTile, blocking_agent: Option<AgentId>) -> Self {
        Self {
            allowed: false,
            kind: tile.kind(),
            blocking_agent,
            tile,
            destination,
            effect: None,
        }
    }

    fn allowed(
        destination: CellCoord,
        tile: CollisionTile,
        blocking_agent: Option<AgentId>,
        effect: MoveEffect,
    ) -> Self {
        Self {
            allowed: true,
            kind: tile.kind(),
            blocking_agent,
            tile,
            destination,
            effect: Some(effect),
        }
    }
}

/// Decides whether `mover` may enter `destination` against the committed world state.
///
/// Resolution never mutates the world, so repeated calls without an
/// intervening commit return identical results.
#[must_use]
pub fn resolve(world: &World, mover: AgentId, destination: CellCoord) -> CollisionResult {
    Resolver {
        tiles: &world.tiles,
        index: &world.index,
        agents: &world.agents,
        policy: &world.policy,
    }
    .resolve(mover, destination, 0)
}

struct Resolver<'a> {
    tiles: &'a TileMap,
    index: &'a SpatialIndex,
    agents: &'a AgentRegistry,
    policy: &'a InteractionPolicy,
}

impl Resolver<'_> {
    fn resolve(&self, mover: AgentId, destination: CellCoord, depth: usize) -> CollisionResult {
        if !self.tiles.contains(destination) {
            return CollisionResult::denied(destination, CollisionTile::SOLID, None);
        }

        let tile = self.tiles.tile(destination);
        if tile.is_solid() {
            return CollisionResult::denied(destination, tile, None);
        }

        let Some(moving) = self.agents.get(mover).filter(|agent| !agent.is_dead()) else {
            return CollisionResult::denied(destination, tile, None);
        };

        let Some(occupant) = self.solid_occupant(destination, mover) else {
            return CollisionResult::allowed(destination, tile, None, MoveEffect::Step);
        };

        let occupant_kind = self
            .agents
            .get(occupant)
            .map_or(AgentKind::Prop, |agent| agent.kind());

        match self.policy.response(moving.kind(), occupant_kind) {
            OccupantResponse::Block => CollisionResult::denied(destination, tile, Some(occupant)),
            OccupantResponse::Swap => CollisionResult::allowed(
                destination,
                tile,
                Some(occupant),
                MoveEffect::Swap { occupant },
            ),
            OccupantResponse::Push => {
                match self.push_chain(moving.cell(), destination, occupant, depth) {
                    Some(chain) => CollisionResult::allowed(
                        destination,
                        tile,
                        Some(occupant),
                        MoveEffect::Push { chain },
                    ),
                    None => CollisionResult::denied(destination, tile, Some(occupant)),
                }
            }
        }
    }

    fn push_chain(
        &self,
        origin: CellCoord,
        destination: CellCoord,
        occupant: AgentId,
        depth: usize,
    ) -> Option<Vec<(AgentId, CellCoord)>> {
        if depth >= MAX_PUSH_CHAIN {
            return None;
        }

        let direction = Direction::between(origin, destination)?;
        let pushed_to = destination.step(direction);
        let nested = self.resolve(occupant, pushed_to, depth + 1);
        if !nested.allowed {
            return None;
        }

        let mut chain = vec![(occupant, pushed_to)];
        match nested.effect? {
            MoveEffect::Step => {}
            MoveEffect::Push { chain: rest } => chain.extend(rest),
            // A swap would drop the next occupant onto the cell the mover is entering.
            MoveEffect::Swap { .. } => return None,
        }
        Some(chain)
    }

    fn solid_occupant(&self, cell: CellCoord, mover: AgentId) -> Option<AgentId> {
        self.index.occupants(cell).find(|candidate| {
            *candidate != mover
                && self
                    .agents
                    .get(*candidate)
                    .is_some_and(|agent| agent.solid() && !agent.is_dead())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridsim_core::{AgentSpawn, Command, Event};

    fn world_with(rows: &[&str], policy: InteractionPolicy) -> World {
        let tiles = TileMap::from_rows(rows).expect("valid rows");
        World::new(tiles, 4).with_policy(policy)
    }

    fn spawn(world: &mut World, kind: AgentKind, column: i32, row: i32) -> AgentId {
        let mut events = Vec::new();
        crate::apply(
            world,
            Command::SpawnAgent {
                spawn: AgentSpawn::new(kind, CellCoord::new(column, row)),
            },
            &mut events,
        );
        match events.last() {
            Some(Event::AgentSpawned { agent, .. }) => *agent,
            other => panic!("expected spawn event, got {other:?}"),
        }
    }

    #[test]
    fn out_of_bounds_is_denied_as_solid() {
        let mut world = world_with(&["..."], InteractionPolicy::new());
        let mover = spawn(&mut world, AgentKind::Hostile, 0, 0);

        let result = resolve(&world, mover, CellCoord::new(-1, 0));
        assert!(!result.allowed);
        assert_eq!(result.kind, CollisionKind::Solid);
        assert!(result.effect.is_none());
    }

    #[test]
    fn solid_tiles_deny_and_effect_tiles_allow() {
        let mut world = world_with(&[".#x~^"], InteractionPolicy::new());
        let mover = spawn(&mut world, AgentKind::Hostile, 0, 0);

        assert!(!resolve(&world, mover, CellCoord::new(1, 0)).allowed);
        for (column, kind) in [
            (2, CollisionKind::Damage),
            (3, CollisionKind::Slow),
            (4, CollisionKind::Trigger),
        ] {
            let result = resolve(&world, mover, CellCoord::new(column, 0));
            assert!(result.allowed);
            assert_eq!(result.kind, kind);
        }
    }

    #[test]
    fn unlisted_pairs_block() {
        let mut world = world_with(&["..."], InteractionPolicy::new());
        let mover = spawn(&mut world, AgentKind::Hostile, 0, 0);
        let other = spawn(&mut world, AgentKind::Hostile, 1, 0);

        let result = resolve(&world, mover, CellCoord::new(1, 0));
        assert!(!result.allowed);
        assert_eq!(result.blocking_agent, Some(other));
    }

    #[test]
    fn push_displaces_a_chain_of_props() {
        let policy = InteractionPolicy::standard().with_rule(
            AgentKind::Prop,
            AgentKind::Prop,
            OccupantResponse::Push,
        );
        let mut world = world_with(&["....."], policy);
        let player = spawn(&mut world, AgentKind::Player, 0, 0);
        let first = spawn(&mut world, AgentKind::Prop, 1, 0);
        let second = spawn(&mut world, AgentKind::Prop, 2, 0);

        let result = resolve(&world, player, CellCoord::new(1, 0));
        assert!(result.allowed);
        assert_eq!(
            result.effect,
            Some(MoveEffect::Push {
                chain: vec![(first, CellCoord::new(2, 0)), (second, CellCoord::new(3, 0))],
            })
        );
    }

    #[test]
    fn push_into_a_wall_is_denied() {
        let mut world = world_with(&["..#"], InteractionPolicy::standard());
        let player = spawn(&mut world, AgentKind::Player, 0, 0);
        let crate_id = spawn(&mut world, AgentKind::Prop, 1, 0);

        let result = resolve(&world, player, CellCoord::new(1, 0));
        assert!(!result.allowed);
        assert_eq!(result.blocking_agent, Some(crate_id));
    }

    #[test]
    fn swap_exchanges_with_allies() {
        let mut world = world_with(&[".."], InteractionPolicy::standard());
        let player = spawn(&mut world, AgentKind::Player, 0, 0);
        let ally = spawn(&mut world, AgentKind::Ally, 1, 0);

        let result = resolve(&world, player, CellCoord::new(1, 0));
        assert!(result.allowed);
        assert_eq!(result.effect, Some(MoveEffect::Swap { occupant: ally }));
    }

    #[test]
    fn resolution_is_idempotent() {
        let mut world = world_with(&["...", "..."], InteractionPolicy::standard());
        let player = spawn(&mut world, AgentKind::Player, 0, 0);
        let _ = spawn(&mut world, AgentKind::Prop, 1, 0);

        for destination in [CellCoord::new(1, 0), CellCoord::new(0, 1), CellCoord::new(0, -1)] {
            let first = resolve(&world, player, destination);
            let second = resolve(&world, player, destination);
            assert_eq!(first, second);
        }
    }
}
