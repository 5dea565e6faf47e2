#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Tick orchestrator that owns the world and sequences every system.
//!
//! A tick runs in a fixed order: advance the tick counter and remove agents
//! that died during the previous tick, verify spatial index membership for
//! last tick's movers, record perception, run the behavior state machine
//! (player input joins here as ordinary movement intents), resolve and
//! commit movement in ascending handle order, and finally queue the tile
//! events produced by the commits for the combat and quest collaborators.

mod scenario;

use std::collections::{BTreeMap, VecDeque};

use gridsim_core::{
    ActionIntent, AgentId, AgentSpawn, AgentView, CellCoord, CollisionTile, Command, Event,
    MovementIntent, SpawnRejection, TileEvent,
};
use gridsim_system_behavior::{Behavior, BehaviorConfig};
use gridsim_system_pathfinding::{PathCache, PathfindingConfig};
use gridsim_system_perception::{Perception, PerceptionConfig};
use gridsim_world::{self as world, query, InteractionPolicy, TileMap, World};
use serde::Deserialize;
use tracing::{debug, warn};

pub use scenario::{
    AgentEntry, InteractionRule, LoadedScenario, MapLayout, PlayerScript, Scenario, ScenarioError,
};

/// Spatial index tunables.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SpatialConfig {
    /// Tiles per side of a spatial index bucket.
    pub cell_size: u32,
}

impl Default for SpatialConfig {
    fn default() -> Self {
        Self { cell_size: 4 }
    }
}

/// Complete configuration of a simulation run.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Spatial index settings.
    pub spatial: SpatialConfig,
    /// Perception settings.
    pub perception: PerceptionConfig,
    /// Distance field budget and cache staleness thresholds.
    pub pathfinding: PathfindingConfig,
    /// Behavior transition thresholds.
    pub behavior: BehaviorConfig,
    /// Seed of the behavior random stream.
    pub seed: u64,
}

/// Everything observable about a single completed tick.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Index of the tick that ran.
    pub tick: u64,
    /// Events broadcast by the world, in emission order.
    pub events: Vec<Event>,
    /// Attacks declared by the behavior state machine.
    pub actions: Vec<(AgentId, ActionIntent)>,
}

/// Owns the world and every system and advances them one tick at a time.
#[derive(Debug)]
pub struct Simulation {
    world: World,
    perception: Perception,
    behavior: Behavior,
    paths: PathCache,
    player_intents: BTreeMap<AgentId, MovementIntent>,
    tile_events: VecDeque<TileEvent>,
}

impl Simulation {
    /// Creates a simulation over the provided map.
    #[must_use]
    pub fn new(tiles: TileMap, config: &SimulationConfig) -> Self {
        Self {
            world: World::new(tiles, config.spatial.cell_size),
            perception: Perception::new(config.perception.clone()),
            behavior: Behavior::new(config.behavior.clone(), config.seed),
            paths: PathCache::new(config.pathfinding.clone()),
            player_intents: BTreeMap::new(),
            tile_events: VecDeque::new(),
        }
    }

    /// Replaces the interaction policy used by the collision resolver.
    #[must_use]
    pub fn with_policy(self, policy: InteractionPolicy) -> Self {
        Self {
            world: self.world.with_policy(policy),
            ..self
        }
    }

    /// Read-only access to the authoritative world.
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Index of the most recently completed tick.
    #[must_use]
    pub fn tick_index(&self) -> u64 {
        query::tick(&self.world)
    }

    /// Registers a new agent.
    pub fn spawn(&mut self, spawn: AgentSpawn) -> Result<AgentId, SpawnRejection> {
        let mut events = Vec::new();
        world::apply(&mut self.world, Command::SpawnAgent { spawn }, &mut events);
        events
            .into_iter()
            .find_map(|event| match event {
                Event::AgentSpawned { agent, .. } => Some(Ok(agent)),
                Event::SpawnRejected { reason, .. } => Some(Err(reason)),
                _ => None,
            })
            .unwrap_or(Err(SpawnRejection::RegistryFull))
    }

    /// Queues the movement requested by the input collaborator for the next tick.
    ///
    /// A later submission for the same agent replaces the earlier one.
    pub fn submit_player_intent(&mut self, agent: AgentId, intent: MovementIntent) {
        let _ = self.player_intents.insert(agent, intent);
    }

    /// Reduces an agent's health; a depleted agent dies on the next tick.
    pub fn apply_damage(&mut self, agent: AgentId, amount: u32) -> Vec<Event> {
        self.execute_one(Command::ApplyDamage { agent, amount })
    }

    /// Restores an agent's health up to its maximum.
    pub fn heal(&mut self, agent: AgentId, amount: u32) -> Vec<Event> {
        self.execute_one(Command::Heal { agent, amount })
    }

    /// Rewrites a collision tile and discards every cached distance field.
    pub fn set_tile(&mut self, cell: CellCoord, tile: CollisionTile) {
        let _ = self.execute_one(Command::SetTile { cell, tile });
        self.paths.invalidate_all();
    }

    /// Rendering snapshot of every live agent.
    #[must_use]
    pub fn agent_view(&self) -> AgentView {
        query::agent_view(&self.world)
    }

    /// Tile events waiting for the combat and quest collaborators.
    #[must_use]
    pub fn pending_tile_events(&self) -> usize {
        self.tile_events.len()
    }

    /// Hands every queued tile event to the caller in emission order.
    pub fn drain_tile_events(&mut self) -> Vec<TileEvent> {
        self.tile_events.drain(..).collect()
    }

    /// Advances the simulation by exactly one tick.
    pub fn tick(&mut self) -> TickReport {
        let mut events = Vec::new();
        self.execute(Command::AdvanceTick, &mut events);

        let boundary = events.len();
        self.execute(Command::RemoveDead, &mut events);
        for event in &events[boundary..] {
            if let Event::AgentRemoved { agent } = event {
                self.paths.forget(*agent);
                let _ = self.player_intents.remove(agent);
            }
        }

        self.execute(Command::VerifyIndex, &mut events);

        let mut commands = Vec::new();
        self.perception.handle(&self.world, &mut commands);
        self.execute_all(&mut commands, &mut events);

        let mut actions = Vec::new();
        self.behavior
            .handle(&self.world, &mut self.paths, &mut commands, &mut actions);
        for (agent, intent) in std::mem::take(&mut self.player_intents) {
            if query::agent(&self.world, agent).is_none() {
                warn!(agent = agent.get(), "dropping input for an unknown agent");
                continue;
            }
            commands.push(Command::SubmitIntent { agent, intent });
        }
        self.execute_all(&mut commands, &mut events);

        self.execute(Command::ResolveIntents, &mut events);

        self.tile_events
            .extend(events.iter().filter_map(|event| match event {
                Event::Tile(tile_event) => Some(*tile_event),
                _ => None,
            }));

        let tick = query::tick(&self.world);
        debug!(
            tick,
            events = events.len(),
            actions = actions.len(),
            queued_tile_events = self.tile_events.len(),
            "tick complete"
        );

        TickReport {
            tick,
            events,
            actions,
        }
    }

    fn execute(&mut self, command: Command, events: &mut Vec<Event>) {
        world::apply(&mut self.world, command, events);
    }

    fn execute_all(&mut self, commands: &mut Vec<Command>, events: &mut Vec<Event>) {
        for command in commands.drain(..) {
            world::apply(&mut self.world, command, events);
        }
    }

    fn execute_one(&mut self, command: Command) -> Vec<Event> {
        let mut events = Vec::new();
        self.execute(command, &mut events);
        events
    }
}
