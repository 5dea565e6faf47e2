#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative world state for the grid simulation.
//!
//! The world owns the tile map, the spatial index and the agent registry.
//! Every mutation arrives as a [`Command`] through [`apply`], and every
//! observable consequence leaves as an [`Event`].

mod agents;
mod collision;
mod spatial;
mod tile_map;

use std::collections::BTreeSet;

use gridsim_core::{
    AgentId, AgentSpawn, BehaviorState, BehaviorTimers, CellCoord, CollisionKind, CollisionTile,
    Command, Event, MovementIntent, SpawnRejection, TileEvent, TileEventKind,
};
use tracing::{debug, error, trace, warn};

pub use agents::Agent;
pub use collision::{
    resolve, CollisionResult, InteractionPolicy, MoveEffect, OccupantResponse, MAX_PUSH_CHAIN,
};
pub use spatial::{BucketKey, SpatialIndex};
pub use tile_map::{legend, TileMap, FLOOR_GLYPH};

use agents::AgentRegistry;

/// Represents the authoritative simulation state.
#[derive(Debug)]
pub struct World {
    tiles: TileMap,
    index: SpatialIndex,
    agents: AgentRegistry,
    policy: InteractionPolicy,
    reservations: ReservationFrame,
    tick_index: u64,
    moved_this_tick: BTreeSet<AgentId>,
    moved_last_tick: BTreeSet<AgentId>,
}

impl World {
    /// Creates a world over the provided map with an empty agent registry.
    ///
    /// `spatial_cell_size` sets how many tiles each spatial index bucket spans.
    #[must_use]
    pub fn new(tiles: TileMap, spatial_cell_size: u32) -> Self {
        Self {
            tiles,
            index: SpatialIndex::new(spatial_cell_size),
            agents: AgentRegistry::default(),
            policy: InteractionPolicy::default(),
            reservations: ReservationFrame::new(),
            tick_index: 0,
            moved_this_tick: BTreeSet::new(),
            moved_last_tick: BTreeSet::new(),
        }
    }

    /// Replaces the interaction policy consulted when movers meet solid occupants.
    #[must_use]
    pub fn with_policy(mut self, policy: InteractionPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn advance_tick(&mut self, out_events: &mut Vec<Event>) {
        self.tick_index = self.tick_index.saturating_add(1);
        self.moved_last_tick = std::mem::take(&mut self.moved_this_tick);

        for agent in self.agents.iter_mut() {
            if agent.is_dead() {
                continue;
            }
            let gained = agent.speed() * agent.speed_modifier;
            agent.move_budget = (agent.move_budget + gained).min(1.0);
            agent.speed_modifier = 1.0;
            agent.alert = None;
        }

        out_events.push(Event::TickStarted {
            tick: self.tick_index,
        });
    }

    fn verify_index(&mut self, out_events: &mut Vec<Event>) {
        let moved = std::mem::take(&mut self.moved_last_tick);
        let mut repaired = 0_usize;

        for id in moved {
            let Some(expected) = self.agents.get(id).map(Agent::cell) else {
                continue;
            };
            let found = self.index.position(id);
            if found == Some(expected) {
                continue;
            }

            error!(
                agent = id.get(),
                ?expected,
                ?found,
                "spatial index disagrees with committed position"
            );
            let _ = self.index.remove(id);
            if let Err(insert_error) = self.index.insert(id, expected) {
                error!(%insert_error, "failed to repair spatial index membership");
            }
            repaired += 1;
            out_events.push(Event::IndexRepaired {
                agent: id,
                expected,
                found,
            });
        }

        debug_assert!(
            repaired == 0,
            "spatial index membership diverged for {repaired} agent(s)"
        );
    }

    fn remove_dead(&mut self, out_events: &mut Vec<Event>) {
        for id in self.agents.dead_ids() {
            let _ = self.index.remove(id);
            let _ = self.agents.remove(id);
            let _ = self.moved_this_tick.remove(&id);
            let _ = self.moved_last_tick.remove(&id);
            debug!(agent = id.get(), "removed dead agent");
            out_events.push(Event::AgentRemoved { agent: id });
        }
    }

    fn spawn_agent(&mut self, spawn: &AgentSpawn, out_events: &mut Vec<Event>) {
        let cell = spawn.cell;
        if self.tiles.is_solid(cell) {
            out_events.push(Event::SpawnRejected {
                cell,
                reason: SpawnRejection::SolidTile,
            });
            return;
        }

        if spawn.solid && self.solid_occupant(cell).is_some() {
            out_events.push(Event::SpawnRejected {
                cell,
                reason: SpawnRejection::Occupied,
            });
            return;
        }

        let Some(id) = self.agents.spawn(spawn) else {
            error!("agent handle space exhausted");
            out_events.push(Event::SpawnRejected {
                cell,
                reason: SpawnRejection::RegistryFull,
            });
            return;
        };
        if let Err(insert_error) = self.index.insert(id, cell) {
            error!(%insert_error, "fresh agent handle already indexed");
        }

        debug!(agent = id.get(), kind = ?spawn.kind, ?cell, "spawned agent");
        out_events.push(Event::AgentSpawned {
            agent: id,
            kind: spawn.kind,
            cell,
        });
    }

    fn resolve_pending_steps(&mut self, out_events: &mut Vec<Event>) {
        let requests = self.reservations.drain_sorted();

        for request in requests {
            let MovementIntent::Step(direction) = request.intent else {
                continue;
            };
            let Some(agent) = self.agents.get(request.agent) else {
                continue;
            };
            if agent.is_dead() || !agent.ready_for_step() {
                continue;
            }

            let destination = agent.cell().step(direction);
            let result = resolve(self, request.agent, destination);
            if !result.allowed {
                trace!(
                    agent = request.agent.get(),
                    ?destination,
                    kind = ?result.kind,
                    "move denied"
                );
                out_events.push(Event::MoveDenied {
                    agent: request.agent,
                    destination,
                    kind: result.kind,
                    blocking: result.blocking_agent,
                });
                continue;
            }

            self.commit(request.agent, &result, out_events);
        }
    }

    fn commit(&mut self, mover: AgentId, result: &CollisionResult, out_events: &mut Vec<Event>) {
        let Some(effect) = result.effect.as_ref() else {
            return;
        };
        let Some(origin) = self.agents.get(mover).map(Agent::cell) else {
            return;
        };

        match effect {
            MoveEffect::Step => {}
            MoveEffect::Push { chain } => {
                for &(pushed, to) in chain.iter().rev() {
                    self.relocate(pushed, to, out_events);
                    out_events.push(Event::AgentPushed {
                        agent: pushed,
                        by: mover,
                    });
                }
            }
            MoveEffect::Swap { occupant } => {
                self.relocate(*occupant, origin, out_events);
                out_events.push(Event::AgentsSwapped {
                    mover,
                    occupant: *occupant,
                });
            }
        }

        self.relocate(mover, result.destination, out_events);
        if let Some(agent) = self.agents.get_mut(mover) {
            agent.move_budget = (agent.move_budget - 1.0).max(0.0);
        }
    }

    fn relocate(&mut self, id: AgentId, to: CellCoord, out_events: &mut Vec<Event>) {
        let Some(agent) = self.agents.get_mut(id) else {
            return;
        };
        let from = agent.cell;
        agent.cell = to;

        if self.index.move_agent(id, to).is_none() {
            warn!(agent = id.get(), "moved agent was missing from the spatial index");
            if let Err(insert_error) = self.index.insert(id, to) {
                error!(%insert_error, "failed to index moved agent");
            }
        }
        let _ = self.moved_this_tick.insert(id);

        debug!(agent = id.get(), ?from, ?to, "committed move");
        out_events.push(Event::AgentMoved { agent: id, from, to });
        self.apply_tile_effects(id, to, out_events);
    }

    fn apply_tile_effects(&mut self, id: AgentId, cell: CellCoord, out_events: &mut Vec<Event>) {
        let tile = self.tiles.tile(cell);
        let magnitude = tile.magnitude().unwrap_or(0);

        match tile.kind() {
            CollisionKind::None | CollisionKind::Solid => {}
            CollisionKind::Trigger => {
                out_events.push(Event::Tile(TileEvent {
                    kind: TileEventKind::Trigger,
                    source: id,
                    cell,
                    magnitude,
                }));
                if tile.consumable() {
                    let _ = self.tiles.set_tile(cell, CollisionTile::OPEN);
                    let _ = self.tiles.set_glyph(cell, FLOOR_GLYPH);
                }
            }
            CollisionKind::Damage => {
                out_events.push(Event::Tile(TileEvent {
                    kind: TileEventKind::Damage,
                    source: id,
                    cell,
                    magnitude,
                }));
                self.damage_agent(id, magnitude, out_events);
            }
            CollisionKind::Slow => {
                if let Some(agent) = self.agents.get_mut(id) {
                    agent.speed_modifier = magnitude as f32 / 100.0;
                }
            }
        }
    }

    fn damage_agent(&mut self, id: AgentId, amount: u32, out_events: &mut Vec<Event>) {
        let Some(agent) = self.agents.get_mut(id).filter(|agent| !agent.is_dead()) else {
            return;
        };
        agent.health = agent.health.damaged(amount);
        debug!(agent = id.get(), amount, remaining = agent.health.current(), "damage applied");
        out_events.push(Event::HealthChanged {
            agent: id,
            health: agent.health,
        });
    }

    fn heal_agent(&mut self, id: AgentId, amount: u32, out_events: &mut Vec<Event>) {
        let Some(agent) = self.agents.get_mut(id).filter(|agent| !agent.is_dead()) else {
            return;
        };
        agent.health = agent.health.healed(amount);
        out_events.push(Event::HealthChanged {
            agent: id,
            health: agent.health,
        });
    }

    fn set_tile(&mut self, cell: CellCoord, tile: CollisionTile) {
        if tile.is_solid() && self.live_occupant(cell).is_some() {
            warn!(?cell, "refusing to make an occupied tile solid");
            return;
        }
        if !self.tiles.set_tile(cell, tile) {
            warn!(?cell, "ignoring tile update outside the map");
        }
    }

    fn record_perception(
        &mut self,
        id: AgentId,
        target: Option<AgentId>,
        target_cell: Option<CellCoord>,
        visible: bool,
    ) {
        let Some(agent) = self.agents.get_mut(id).filter(|agent| !agent.is_dead()) else {
            return;
        };
        agent.target = target;
        agent.target_visible = visible && target.is_some();
        if agent.target_visible {
            if let Some(cell) = target_cell {
                agent.last_known_target = Some(cell);
            }
        }
    }

    fn alert_agent(&mut self, id: AgentId, cell: CellCoord) {
        let Some(agent) = self.agents.get_mut(id).filter(|agent| !agent.is_dead()) else {
            return;
        };
        agent.alert = Some(cell);
        if !agent.target_visible {
            agent.last_known_target = Some(cell);
        }
    }

    fn set_behavior(
        &mut self,
        id: AgentId,
        state: BehaviorState,
        timers: BehaviorTimers,
        out_events: &mut Vec<Event>,
    ) {
        let Some(agent) = self.agents.get_mut(id) else {
            return;
        };
        if agent.is_dead() {
            if state != BehaviorState::Dead {
                warn!(agent = id.get(), ?state, "ignoring transition out of the terminal state");
            }
            return;
        }

        let from = agent.state;
        agent.state = state;
        agent.timers = timers;
        if from == state {
            return;
        }

        debug!(agent = id.get(), ?from, to = ?state, "behavior transition");
        out_events.push(Event::BehaviorChanged {
            agent: id,
            from,
            to: state,
        });
        if state == BehaviorState::Dead {
            out_events.push(Event::AgentDied { agent: id });
        }
    }

    fn solid_occupant(&self, cell: CellCoord) -> Option<AgentId> {
        self.index.occupants(cell).find(|id| {
            self.agents
                .get(*id)
                .is_some_and(|agent| agent.solid() && !agent.is_dead())
        })
    }

    fn live_occupant(&self, cell: CellCoord) -> Option<AgentId> {
        self.index
            .occupants(cell)
            .find(|id| self.agents.get(*id).is_some_and(|agent| !agent.is_dead()))
    }
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::AdvanceTick => world.advance_tick(out_events),
        Command::VerifyIndex => world.verify_index(out_events),
        Command::RemoveDead => world.remove_dead(out_events),
        Command::SpawnAgent { spawn } => world.spawn_agent(&spawn, out_events),
        Command::SubmitIntent { agent, intent } => {
            world
                .reservations
                .queue(world.tick_index, StepRequest { agent, intent });
        }
        Command::ResolveIntents => world.resolve_pending_steps(out_events),
        Command::ApplyDamage { agent, amount } => world.damage_agent(agent, amount, out_events),
        Command::Heal { agent, amount } => world.heal_agent(agent, amount, out_events),
        Command::SetTile { cell, tile } => world.set_tile(cell, tile),
        Command::RecordPerception {
            agent,
            target,
            target_cell,
            visible,
        } => world.record_perception(agent, target, target_cell, visible),
        Command::AlertAgent { agent, cell } => world.alert_agent(agent, cell),
        Command::SetBehavior {
            agent,
            state,
            timers,
        } => world.set_behavior(agent, state, timers, out_events),
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use gridsim_core::{AgentId, AgentView, CellCoord};

    use super::{Agent, InteractionPolicy, SpatialIndex, TileMap, World};

    /// Provides read-only access to the tile map and both of its layers.
    #[must_use]
    pub fn tile_map(world: &World) -> &TileMap {
        &world.tiles
    }

    /// Provides read-only access to the spatial index.
    #[must_use]
    pub fn spatial_index(world: &World) -> &SpatialIndex {
        &world.index
    }

    /// Provides read-only access to the interaction policy.
    #[must_use]
    pub fn policy(world: &World) -> &InteractionPolicy {
        &world.policy
    }

    /// Index of the most recently started tick.
    #[must_use]
    pub fn tick(world: &World) -> u64 {
        world.tick_index
    }

    /// Looks up a registered agent, dead or alive.
    #[must_use]
    pub fn agent(world: &World, id: AgentId) -> Option<&Agent> {
        world.agents.get(id)
    }

    /// Registered agents in ascending handle order, including dead agents
    /// awaiting removal at the next tick boundary.
    pub fn agents(world: &World) -> impl Iterator<Item = &Agent> {
        world.agents.iter()
    }

    /// Agents that have not reached the terminal state, in ascending handle order.
    pub fn live_agents(world: &World) -> impl Iterator<Item = &Agent> {
        world.agents.iter().filter(|agent| !agent.is_dead())
    }

    /// Captures the rendering snapshot of every live agent.
    #[must_use]
    pub fn agent_view(world: &World) -> AgentView {
        AgentView::from_snapshots(live_agents(world).map(Agent::snapshot).collect())
    }

    /// Live solid agent standing on the provided cell, if any.
    #[must_use]
    pub fn solid_occupant(world: &World, cell: CellCoord) -> Option<AgentId> {
        world.solid_occupant(cell)
    }
}

#[derive(Clone, Copy, Debug)]
struct StepRequest {
    agent: AgentId,
    intent: MovementIntent,
}

#[derive(Debug)]
struct ReservationFrame {
    tick_index: u64,
    requests: Vec<StepRequest>,
}

impl ReservationFrame {
    fn new() -> Self {
        Self {
            tick_index: 0,
            requests: Vec::new(),
        }
    }

    fn queue(&mut self, tick_index: u64, request: StepRequest) {
        if self.tick_index != tick_index {
            self.tick_index = tick_index;
            self.requests.clear();
        }
        if let Some(existing) = self
            .requests
            .iter_mut()
            .find(|queued| queued.agent == request.agent)
        {
            *existing = request;
        } else {
            self.requests.push(request);
        }
    }

    fn drain_sorted(&mut self) -> Vec<StepRequest> {
        self.requests.sort_by_key(|request| request.agent);
        self.requests.drain(..).collect()
    }
}
