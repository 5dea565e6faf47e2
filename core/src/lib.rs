#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the grid simulation engine.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative world, and pure systems. Adapters and the tick orchestrator
//! submit [`Command`] values describing desired mutations, the world executes
//! those commands via its `apply` entry point, and then broadcasts [`Event`]
//! values for systems and collaborators to react to deterministically.
//! Systems consume immutable views and respond exclusively with new commands.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Location of a single grid cell expressed as column and row coordinates.
///
/// Coordinates are signed so that positions beyond the west or north edge
/// remain representable; the world classifies every such cell as solid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellCoord {
    column: i32,
    row: i32,
}

impl CellCoord {
    /// Creates a new grid cell coordinate.
    #[must_use]
    pub const fn new(column: i32, row: i32) -> Self {
        Self { column, row }
    }

    /// Zero-based column index of the cell.
    #[must_use]
    pub const fn column(&self) -> i32 {
        self.column
    }

    /// Zero-based row index of the cell.
    #[must_use]
    pub const fn row(&self) -> i32 {
        self.row
    }

    /// Computes the Manhattan distance between two cell coordinates.
    #[must_use]
    pub fn manhattan_distance(self, other: CellCoord) -> u32 {
        self.column.abs_diff(other.column) + self.row.abs_diff(other.row)
    }

    /// Squared Euclidean distance between two cell coordinates.
    #[must_use]
    pub fn distance_squared(self, other: CellCoord) -> u64 {
        let dx = u64::from(self.column.abs_diff(other.column));
        let dy = u64::from(self.row.abs_diff(other.row));
        dx * dx + dy * dy
    }

    /// Cell reached by moving one step in the provided direction.
    #[must_use]
    pub fn step(self, direction: Direction) -> CellCoord {
        let (dx, dy) = direction.delta();
        self.offset(dx, dy)
    }

    /// Cell displaced by the provided column and row deltas.
    #[must_use]
    pub fn offset(self, dx: i32, dy: i32) -> CellCoord {
        CellCoord::new(
            self.column.saturating_add(dx),
            self.row.saturating_add(dy),
        )
    }
}

/// Cardinal movement directions available to agents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    /// Movement toward decreasing row indices.
    North,
    /// Movement toward increasing column indices.
    East,
    /// Movement toward increasing row indices.
    South,
    /// Movement toward decreasing column indices.
    West,
}

impl Direction {
    /// Fixed neighbor scan order used wherever ties must break deterministically.
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    /// Column and row delta applied by a single step.
    #[must_use]
    pub const fn delta(self) -> (i32, i32) {
        match self {
            Self::North => (0, -1),
            Self::East => (1, 0),
            Self::South => (0, 1),
            Self::West => (-1, 0),
        }
    }

    /// Direction pointing the opposite way.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::North => Self::South,
            Self::East => Self::West,
            Self::South => Self::North,
            Self::West => Self::East,
        }
    }

    /// Direction that moves from `from` to the 4-adjacent cell `to`, if any.
    #[must_use]
    pub fn between(from: CellCoord, to: CellCoord) -> Option<Direction> {
        if from.manhattan_distance(to) != 1 {
            return None;
        }

        if to.column() > from.column() {
            Some(Self::East)
        } else if to.column() < from.column() {
            Some(Self::West)
        } else if to.row() > from.row() {
            Some(Self::South)
        } else {
            Some(Self::North)
        }
    }
}

/// Stable handle assigned to an agent by the registry. Handles are never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(u32);

impl AgentId {
    /// Creates a new agent handle with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the handle.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Broad classification of an agent used for targeting and interaction policies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    /// Agent steered by the input collaborator.
    Player,
    /// AI-controlled agent that hunts players and allies.
    Hostile,
    /// AI-controlled agent fighting alongside the player.
    Ally,
    /// Inert object such as a crate; runs no behavior.
    Prop,
}

impl AgentKind {
    /// Reports whether agents of this kind treat `other` as a target.
    #[must_use]
    pub const fn is_hostile_to(self, other: AgentKind) -> bool {
        matches!(
            (self, other),
            (Self::Hostile, Self::Player)
                | (Self::Hostile, Self::Ally)
                | (Self::Player, Self::Hostile)
                | (Self::Ally, Self::Hostile)
        )
    }

    /// Reports whether agents of this kind are driven by the behavior state machine.
    #[must_use]
    pub const fn runs_behavior(self) -> bool {
        matches!(self, Self::Hostile | Self::Ally)
    }
}

/// Physical or interactive classification of a tile in the collision layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionKind {
    /// Freely walkable.
    None,
    /// Blocks movement and sight.
    Solid,
    /// Walkable; entering it emits a trigger event.
    Trigger,
    /// Walkable; entering it damages the mover.
    Damage,
    /// Walkable; entering it slows the mover's next move.
    Slow,
}

/// Single entry of the collision layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CollisionTile {
    kind: CollisionKind,
    magnitude: Option<u32>,
    consumable: bool,
}

impl CollisionTile {
    /// Walkable tile without side effects.
    pub const OPEN: CollisionTile = CollisionTile {
        kind: CollisionKind::None,
        magnitude: None,
        consumable: false,
    };

    /// Tile that blocks movement and line of sight.
    pub const SOLID: CollisionTile = CollisionTile {
        kind: CollisionKind::Solid,
        magnitude: None,
        consumable: false,
    };

    /// Trigger tile carrying an opaque payload; consumable triggers reset to open once fired.
    #[must_use]
    pub const fn trigger(payload: u32, consumable: bool) -> Self {
        Self {
            kind: CollisionKind::Trigger,
            magnitude: Some(payload),
            consumable,
        }
    }

    /// Damaging tile that removes `amount` health from every agent entering it.
    #[must_use]
    pub const fn damage(amount: u32) -> Self {
        Self {
            kind: CollisionKind::Damage,
            magnitude: Some(amount),
            consumable: false,
        }
    }

    /// Slowing tile scaling the mover's next accumulation to `percent` of its speed.
    #[must_use]
    pub const fn slow(percent: u32) -> Self {
        Self {
            kind: CollisionKind::Slow,
            magnitude: Some(percent),
            consumable: false,
        }
    }

    /// Collision classification of the tile.
    #[must_use]
    pub const fn kind(&self) -> CollisionKind {
        self.kind
    }

    /// Damage amount, slow percentage or trigger payload, depending on the kind.
    #[must_use]
    pub const fn magnitude(&self) -> Option<u32> {
        self.magnitude
    }

    /// Whether the tile rewrites itself to [`CollisionTile::OPEN`] after firing.
    #[must_use]
    pub const fn consumable(&self) -> bool {
        self.consumable
    }

    /// Reports whether the tile blocks movement and sight.
    #[must_use]
    pub const fn is_solid(&self) -> bool {
        matches!(self.kind, CollisionKind::Solid)
    }
}

/// Personality scalars shaping behavior transitions, clamped to `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Personality {
    courage: f32,
    aggression: f32,
}

impl Personality {
    /// Creates a personality, clamping both scalars into `[0, 1]`.
    #[must_use]
    pub fn new(courage: f32, aggression: f32) -> Self {
        Self {
            courage: clamp_unit(courage),
            aggression: clamp_unit(aggression),
        }
    }

    /// Willingness to stand ground when threatened.
    #[must_use]
    pub const fn courage(&self) -> f32 {
        self.courage
    }

    /// Eagerness to pursue visible targets.
    #[must_use]
    pub const fn aggression(&self) -> f32 {
        self.aggression
    }
}

impl Default for Personality {
    fn default() -> Self {
        Self::new(0.5, 0.5)
    }
}

fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Current and maximum hit points of an agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Health {
    current: u32,
    max: u32,
}

impl Health {
    /// Creates a health pool filled to `max`.
    #[must_use]
    pub const fn full(max: u32) -> Self {
        Self { current: max, max }
    }

    /// Creates a health pool with an explicit current value clamped to `max`.
    #[must_use]
    pub fn new(current: u32, max: u32) -> Self {
        Self {
            current: current.min(max),
            max,
        }
    }

    /// Remaining hit points.
    #[must_use]
    pub const fn current(&self) -> u32 {
        self.current
    }

    /// Maximum hit points.
    #[must_use]
    pub const fn max(&self) -> u32 {
        self.max
    }

    /// Health after absorbing `amount` damage; saturates at zero.
    #[must_use]
    pub const fn damaged(self, amount: u32) -> Self {
        Self {
            current: self.current.saturating_sub(amount),
            max: self.max,
        }
    }

    /// Health after restoring `amount`; never exceeds the maximum.
    #[must_use]
    pub fn healed(self, amount: u32) -> Self {
        Self {
            current: self.current.saturating_add(amount).min(self.max),
            max: self.max,
        }
    }

    /// Reports whether the pool is empty.
    #[must_use]
    pub const fn is_depleted(&self) -> bool {
        self.current == 0
    }

    /// Coarse condition tier derived from the remaining fraction.
    #[must_use]
    pub fn status(&self) -> HealthStatus {
        if self.current == 0 {
            return HealthStatus::Dead;
        }
        let percent = u64::from(self.current) * 100 / u64::from(self.max.max(1));
        if percent < 25 {
            HealthStatus::Critical
        } else if percent < 50 {
            HealthStatus::Wounded
        } else if self.current < self.max {
            HealthStatus::Hurt
        } else {
            HealthStatus::Healthy
        }
    }
}

/// Condition tier reported alongside an agent's health.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HealthStatus {
    /// Full health.
    Healthy,
    /// Some damage taken.
    Hurt,
    /// Below half health.
    Wounded,
    /// Below a quarter of health.
    Critical,
    /// No health remaining.
    Dead,
}

/// Decision state of the per-agent behavior state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BehaviorState {
    /// Standing still.
    Idle,
    /// Wandering without a target.
    Patrol,
    /// Pursuing a visible target.
    Chase,
    /// Moving toward the last known target position.
    Search,
    /// Adjacent to the target and striking it.
    Attack,
    /// Moving away from a threatening target.
    Flee,
    /// Terminal state; the agent is removed at the next tick boundary.
    Dead,
}

impl BehaviorState {
    /// Every state, in declaration order.
    pub const ALL: [BehaviorState; 7] = [
        BehaviorState::Idle,
        BehaviorState::Patrol,
        BehaviorState::Chase,
        BehaviorState::Search,
        BehaviorState::Attack,
        BehaviorState::Flee,
        BehaviorState::Dead,
    ];

    /// Reports whether no transition leaves this state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Dead)
    }
}

/// Per-state counters owned by an agent and advanced by the behavior system.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct BehaviorTimers {
    /// Ticks spent in the current state.
    pub state_ticks: u32,
    /// Consecutive ticks spent beyond the flee safety distance.
    pub safe_ticks: u32,
    /// Ticks remaining before another attack may be declared.
    pub attack_cooldown: u32,
    /// Ticks remaining before an unreachable target may be pursued again.
    pub no_path_cooldown: u32,
}

/// Movement requested for an agent in a single tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum MovementIntent {
    /// Remain on the current tile.
    #[default]
    Hold,
    /// Step into the adjacent tile in the given direction.
    Step(Direction),
}

/// Non-movement action requested for an agent in a single tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ActionIntent {
    /// Strike the adjacent target.
    Attack {
        /// Agent being attacked.
        target: AgentId,
    },
}

/// Parameters describing a newly spawned agent.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AgentSpawn {
    /// Classification of the agent.
    pub kind: AgentKind,
    /// Cell the agent should occupy.
    pub cell: CellCoord,
    /// Glyph handed to the rendering collaborator.
    pub glyph: char,
    /// Whether the agent blocks other movers.
    pub solid: bool,
    /// Maximum hit points; the agent spawns at full health.
    pub max_health: u32,
    /// Movement speed in tiles per tick, clamped to `[0, 1]` at spawn.
    pub speed: f32,
    /// Sight range in tiles.
    pub sight_range: u32,
    /// Hearing range in tiles.
    pub hearing_range: u32,
    /// Personality scalars.
    pub personality: Personality,
}

impl AgentSpawn {
    /// Creates spawn parameters with defaults suited to the provided kind.
    #[must_use]
    pub fn new(kind: AgentKind, cell: CellCoord) -> Self {
        let glyph = match kind {
            AgentKind::Player => '@',
            AgentKind::Hostile => 'g',
            AgentKind::Ally => 'a',
            AgentKind::Prop => '0',
        };
        Self {
            kind,
            cell,
            glyph,
            solid: true,
            max_health: 10,
            speed: 1.0,
            sight_range: 8,
            hearing_range: 6,
            personality: Personality::default(),
        }
    }

    /// Overrides the personality scalars.
    #[must_use]
    pub fn with_personality(mut self, courage: f32, aggression: f32) -> Self {
        self.personality = Personality::new(courage, aggression);
        self
    }

    /// Overrides the perception ranges.
    #[must_use]
    pub fn with_ranges(mut self, sight_range: u32, hearing_range: u32) -> Self {
        self.sight_range = sight_range;
        self.hearing_range = hearing_range;
        self
    }

    /// Overrides the maximum health.
    #[must_use]
    pub fn with_max_health(mut self, max_health: u32) -> Self {
        self.max_health = max_health;
        self
    }

    /// Overrides the movement speed.
    #[must_use]
    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    /// Overrides whether the agent blocks other movers.
    #[must_use]
    pub fn with_solid(mut self, solid: bool) -> Self {
        self.solid = solid;
        self
    }
}

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Advances the tick counter and replenishes every agent's movement budget.
    AdvanceTick,
    /// Compares spatial index membership with the committed positions of
    /// agents moved during the previous tick and repairs any mismatch.
    VerifyIndex,
    /// Removes agents marked dead from the spatial index and the registry.
    RemoveDead,
    /// Registers a new agent.
    SpawnAgent {
        /// Parameters of the agent to create.
        spawn: AgentSpawn,
    },
    /// Queues a movement intent for resolution later in the tick.
    SubmitIntent {
        /// Agent requesting the move.
        agent: AgentId,
        /// Requested movement.
        intent: MovementIntent,
    },
    /// Resolves queued intents in ascending handle order and commits allowed moves.
    ResolveIntents,
    /// Reduces the agent's health.
    ApplyDamage {
        /// Agent receiving damage.
        agent: AgentId,
        /// Hit points removed.
        amount: u32,
    },
    /// Restores the agent's health up to its maximum.
    Heal {
        /// Agent being healed.
        agent: AgentId,
        /// Hit points restored.
        amount: u32,
    },
    /// Rewrites a collision tile in place.
    SetTile {
        /// Cell to rewrite.
        cell: CellCoord,
        /// Replacement collision tile.
        tile: CollisionTile,
    },
    /// Stores the outcome of an agent's perception pass.
    RecordPerception {
        /// Observing agent.
        agent: AgentId,
        /// Selected target, if any was discovered.
        target: Option<AgentId>,
        /// Cell of the selected target.
        target_cell: Option<CellCoord>,
        /// Whether the target is currently visible.
        visible: bool,
    },
    /// Informs an agent that an ally reported a target position.
    AlertAgent {
        /// Agent receiving the alert.
        agent: AgentId,
        /// Reported target position.
        cell: CellCoord,
    },
    /// Stores the behavior state and timers chosen for an agent.
    SetBehavior {
        /// Agent being updated.
        agent: AgentId,
        /// New active state.
        state: BehaviorState,
        /// Updated per-state timers.
        timers: BehaviorTimers,
    },
}

/// Reasons a spawn request may be rejected by the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SpawnRejection {
    /// The requested cell is solid or out of bounds.
    SolidTile,
    /// A solid agent already occupies the requested cell.
    Occupied,
    /// The registry ran out of handles.
    RegistryFull,
}

/// Kinds of tile events forwarded to the combat and quest collaborators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TileEventKind {
    /// A trigger tile fired.
    Trigger,
    /// A damaging tile hurt its visitor.
    Damage,
}

/// Queue entry describing a tile side effect produced by a committed move.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TileEvent {
    /// Kind of side effect.
    pub kind: TileEventKind,
    /// Agent whose move produced the effect.
    pub source: AgentId,
    /// Tile that produced the effect.
    pub cell: CellCoord,
    /// Damage amount or trigger payload.
    pub magnitude: u32,
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// Indicates that the tick counter advanced.
    TickStarted {
        /// Index of the tick that began.
        tick: u64,
    },
    /// Confirms that an agent was registered.
    AgentSpawned {
        /// Handle assigned to the agent.
        agent: AgentId,
        /// Kind of the new agent.
        kind: AgentKind,
        /// Cell the agent occupies.
        cell: CellCoord,
    },
    /// Reports that a spawn request was rejected.
    SpawnRejected {
        /// Requested cell.
        cell: CellCoord,
        /// Why the request failed.
        reason: SpawnRejection,
    },
    /// Confirms that an agent's committed position changed.
    AgentMoved {
        /// Agent that moved.
        agent: AgentId,
        /// Cell occupied before the move.
        from: CellCoord,
        /// Cell occupied after the move.
        to: CellCoord,
    },
    /// Annotates that an agent was displaced by another agent's push.
    AgentPushed {
        /// Agent that was pushed.
        agent: AgentId,
        /// Agent whose move caused the push.
        by: AgentId,
    },
    /// Annotates that two agents exchanged positions.
    AgentsSwapped {
        /// Agent that requested the move.
        mover: AgentId,
        /// Agent that was standing on the destination.
        occupant: AgentId,
    },
    /// Reports that a movement intent was denied.
    MoveDenied {
        /// Agent whose intent was denied.
        agent: AgentId,
        /// Requested destination.
        destination: CellCoord,
        /// Collision classification of the destination tile.
        kind: CollisionKind,
        /// Agent that blocked the destination, if any.
        blocking: Option<AgentId>,
    },
    /// Tile side effect destined for the combat and quest collaborators.
    Tile(TileEvent),
    /// Reports a change to an agent's health.
    HealthChanged {
        /// Affected agent.
        agent: AgentId,
        /// Health after the change.
        health: Health,
    },
    /// Reports a behavior state transition.
    BehaviorChanged {
        /// Affected agent.
        agent: AgentId,
        /// State before the transition.
        from: BehaviorState,
        /// State after the transition.
        to: BehaviorState,
    },
    /// Reports that an agent entered the terminal state.
    AgentDied {
        /// Agent that died.
        agent: AgentId,
    },
    /// Confirms that a dead agent was removed from the registry.
    AgentRemoved {
        /// Agent that was removed.
        agent: AgentId,
    },
    /// Reports that spatial index membership disagreed with a committed position.
    IndexRepaired {
        /// Agent whose membership was repaired.
        agent: AgentId,
        /// Committed position of the agent.
        expected: CellCoord,
        /// Position recorded by the index before repair.
        found: Option<CellCoord>,
    },
}

/// Immutable representation of a single agent used for queries and rendering.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AgentSnapshot {
    /// Handle assigned to the agent.
    pub id: AgentId,
    /// Classification of the agent.
    pub kind: AgentKind,
    /// Committed grid position.
    pub cell: CellCoord,
    /// Glyph used by the rendering collaborator.
    pub glyph: char,
    /// Active behavior state.
    pub state: BehaviorState,
    /// Current and maximum health.
    pub health: Health,
    /// Condition tier derived from health.
    pub status: HealthStatus,
}

/// Read-only snapshot describing every live agent.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AgentView {
    snapshots: Vec<AgentSnapshot>,
}

impl AgentView {
    /// Creates a new agent view from the provided snapshots.
    #[must_use]
    pub fn from_snapshots(mut snapshots: Vec<AgentSnapshot>) -> Self {
        snapshots.sort_by_key(|snapshot| snapshot.id);
        Self { snapshots }
    }

    /// Iterator over the captured snapshots in ascending handle order.
    pub fn iter(&self) -> impl Iterator<Item = &AgentSnapshot> {
        self.snapshots.iter()
    }

    /// Looks up the snapshot of a single agent.
    #[must_use]
    pub fn get(&self, agent: AgentId) -> Option<&AgentSnapshot> {
        self.snapshots
            .binary_search_by_key(&agent, |snapshot| snapshot.id)
            .ok()
            .and_then(|index| self.snapshots.get(index))
    }

    /// Number of captured snapshots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Reports whether the view is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Consumes the view, yielding the underlying snapshots.
    #[must_use]
    pub fn into_vec(self) -> Vec<AgentSnapshot> {
        self.snapshots
    }
}

/// Errors raised when tile layers cannot form a valid map.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum MapLoadError {
    /// Either dimension was zero.
    #[error("map dimensions must be non-zero, got {width}x{height}")]
    EmptyDimensions {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },
    /// The cell count cannot be addressed.
    #[error("map dimensions {width}x{height} exceed the addressable range")]
    TooLarge {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },
    /// A layer's length did not match `width * height`.
    #[error("{layer} layer holds {actual} cells but the map needs {expected}")]
    LayerSizeMismatch {
        /// Name of the offending layer.
        layer: &'static str,
        /// Expected number of cells.
        expected: usize,
        /// Number of cells supplied.
        actual: usize,
    },
    /// A textual row was shorter or longer than the first row.
    #[error("row {row} has {actual} columns, expected {expected}")]
    RaggedRow {
        /// Zero-based row index.
        row: usize,
        /// Expected number of columns.
        expected: usize,
        /// Number of columns found.
        actual: usize,
    },
    /// A textual row contained a glyph outside the legend.
    #[error("unknown tile glyph {glyph:?} at column {column}, row {row}")]
    UnknownGlyph {
        /// Offending glyph.
        glyph: char,
        /// Zero-based column index.
        column: usize,
        /// Zero-based row index.
        row: usize,
    },
}

/// Error raised when an agent handle is inserted into the spatial index twice.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("agent {} is already registered in the spatial index", agent.get())]
pub struct DuplicateEntityError {
    /// Handle that was already present.
    pub agent: AgentId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{de::DeserializeOwned, Serialize};

    #[test]
    fn manhattan_distance_matches_expectation() {
        let origin = CellCoord::new(1, 1);
        let destination = CellCoord::new(4, -3);
        assert_eq!(origin.manhattan_distance(destination), 7);
        assert_eq!(destination.manhattan_distance(origin), 7);
    }

    #[test]
    fn distance_squared_uses_both_axes() {
        let origin = CellCoord::new(0, 0);
        assert_eq!(origin.distance_squared(CellCoord::new(4, 4)), 32);
        assert_eq!(origin.distance_squared(CellCoord::new(-3, 0)), 9);
    }

    #[test]
    fn stepping_west_from_the_edge_leaves_the_grid() {
        let cell = CellCoord::new(0, 0).step(Direction::West);
        assert_eq!(cell, CellCoord::new(-1, 0));
    }

    #[test]
    fn direction_between_neighbors() {
        let origin = CellCoord::new(3, 3);
        for direction in Direction::ALL {
            assert_eq!(
                Direction::between(origin, origin.step(direction)),
                Some(direction)
            );
            assert_eq!(direction.opposite().opposite(), direction);
        }
        assert_eq!(Direction::between(origin, origin), None);
        assert_eq!(Direction::between(origin, CellCoord::new(4, 4)), None);
    }

    #[test]
    fn health_saturates_and_clamps() {
        let health = Health::full(10);
        assert_eq!(health.damaged(25).current(), 0);
        assert!(health.damaged(25).is_depleted());
        assert_eq!(health.damaged(4).healed(100).current(), 10);
        assert_eq!(Health::new(50, 10).current(), 10);
    }

    #[test]
    fn health_status_tiers() {
        assert_eq!(Health::full(100).status(), HealthStatus::Healthy);
        assert_eq!(Health::new(75, 100).status(), HealthStatus::Hurt);
        assert_eq!(Health::new(49, 100).status(), HealthStatus::Wounded);
        assert_eq!(Health::new(24, 100).status(), HealthStatus::Critical);
        assert_eq!(Health::new(0, 100).status(), HealthStatus::Dead);
    }

    #[test]
    fn personality_is_clamped() {
        let personality = Personality::new(-1.0, 3.0);
        assert_eq!(personality.courage(), 0.0);
        assert_eq!(personality.aggression(), 1.0);
        assert_eq!(Personality::new(f32::NAN, 0.2).courage(), 0.0);
    }

    #[test]
    fn hostility_is_symmetric_between_factions() {
        assert!(AgentKind::Hostile.is_hostile_to(AgentKind::Player));
        assert!(AgentKind::Player.is_hostile_to(AgentKind::Hostile));
        assert!(!AgentKind::Ally.is_hostile_to(AgentKind::Player));
        assert!(!AgentKind::Prop.is_hostile_to(AgentKind::Hostile));
        assert!(!AgentKind::Hostile.is_hostile_to(AgentKind::Hostile));
    }

    #[test]
    fn agent_view_sorts_and_finds_by_handle() {
        let snapshot = |id: u32| AgentSnapshot {
            id: AgentId::new(id),
            kind: AgentKind::Hostile,
            cell: CellCoord::new(0, 0),
            glyph: 'g',
            state: BehaviorState::Idle,
            health: Health::full(1),
            status: HealthStatus::Healthy,
        };
        let view = AgentView::from_snapshots(vec![snapshot(5), snapshot(1), snapshot(3)]);
        let ids: Vec<u32> = view.iter().map(|s| s.id.get()).collect();
        assert_eq!(ids, vec![1, 3, 5]);
        assert!(view.get(AgentId::new(3)).is_some());
        assert!(view.get(AgentId::new(4)).is_none());
    }

    fn assert_round_trip<T>(value: &T)
    where
        T: Serialize + DeserializeOwned + PartialEq + std::fmt::Debug,
    {
        let bytes = bincode::serialize(value).expect("serialize");
        let restored: T = bincode::deserialize(&bytes).expect("deserialize");
        assert_eq!(&restored, value);
    }

    #[test]
    fn collision_tile_round_trips_through_bincode() {
        assert_round_trip(&CollisionTile::trigger(7, true));
        assert_round_trip(&CellCoord::new(-2, 9));
    }
}
