//! Dense agent registry addressed by stable handles.

use gridsim_core::{
    AgentId, AgentKind, AgentSnapshot, AgentSpawn, BehaviorState, BehaviorTimers, CellCoord,
    Health, Personality,
};

/// Authoritative state of a single simulation participant.
#[derive(Clone, Debug)]
pub struct Agent {
    id: AgentId,
    kind: AgentKind,
    glyph: char,
    solid: bool,
    pub(crate) cell: CellCoord,
    pub(crate) health: Health,
    speed: f32,
    pub(crate) speed_modifier: f32,
    pub(crate) move_budget: f32,
    sight_range: u32,
    hearing_range: u32,
    personality: Personality,
    pub(crate) state: BehaviorState,
    pub(crate) timers: BehaviorTimers,
    pub(crate) target: Option<AgentId>,
    pub(crate) target_visible: bool,
    pub(crate) last_known_target: Option<CellCoord>,
    pub(crate) alert: Option<CellCoord>,
}

impl Agent {
    fn from_spawn(id: AgentId, spawn: &AgentSpawn) -> Self {
        Self {
            id,
            kind: spawn.kind,
            glyph: spawn.glyph,
            solid: spawn.solid,
            cell: spawn.cell,
            health: Health::full(spawn.max_health),
            speed: clamp_speed(spawn.speed),
            speed_modifier: 1.0,
            move_budget: 0.0,
            sight_range: spawn.sight_range,
            hearing_range: spawn.hearing_range,
            personality: spawn.personality,
            state: BehaviorState::Idle,
            timers: BehaviorTimers::default(),
            target: None,
            target_visible: false,
            last_known_target: None,
            alert: None,
        }
    }

    /// Handle assigned by the registry.
    #[must_use]
    pub const fn id(&self) -> AgentId {
        self.id
    }

    /// Classification of the agent.
    #[must_use]
    pub const fn kind(&self) -> AgentKind {
        self.kind
    }

    /// Glyph handed to the rendering collaborator.
    #[must_use]
    pub const fn glyph(&self) -> char {
        self.glyph
    }

    /// Whether the agent blocks other movers.
    #[must_use]
    pub const fn solid(&self) -> bool {
        self.solid
    }

    /// Last committed position.
    #[must_use]
    pub const fn cell(&self) -> CellCoord {
        self.cell
    }

    /// Current and maximum health.
    #[must_use]
    pub const fn health(&self) -> Health {
        self.health
    }

    /// Base movement speed in tiles per tick.
    #[must_use]
    pub const fn speed(&self) -> f32 {
        self.speed
    }

    /// Movement budget accumulated toward the next step.
    #[must_use]
    pub const fn move_budget(&self) -> f32 {
        self.move_budget
    }

    /// Reports whether enough budget accumulated to commit a step.
    #[must_use]
    pub fn ready_for_step(&self) -> bool {
        self.move_budget >= 1.0
    }

    /// Sight range in tiles.
    #[must_use]
    pub const fn sight_range(&self) -> u32 {
        self.sight_range
    }

    /// Hearing range in tiles.
    #[must_use]
    pub const fn hearing_range(&self) -> u32 {
        self.hearing_range
    }

    /// Personality scalars.
    #[must_use]
    pub const fn personality(&self) -> Personality {
        self.personality
    }

    /// Active behavior state.
    #[must_use]
    pub const fn state(&self) -> BehaviorState {
        self.state
    }

    /// Per-state timers.
    #[must_use]
    pub const fn timers(&self) -> BehaviorTimers {
        self.timers
    }

    /// Target selected by the latest perception pass.
    #[must_use]
    pub const fn target(&self) -> Option<AgentId> {
        self.target
    }

    /// Whether the selected target was visible during the latest perception pass.
    #[must_use]
    pub const fn target_visible(&self) -> bool {
        self.target_visible
    }

    /// Position where a target was last seen or reported.
    #[must_use]
    pub const fn last_known_target(&self) -> Option<CellCoord> {
        self.last_known_target
    }

    /// Target position reported by an ally during the current tick.
    #[must_use]
    pub const fn alert(&self) -> Option<CellCoord> {
        self.alert
    }

    /// Reports whether the agent reached the terminal state.
    #[must_use]
    pub fn is_dead(&self) -> bool {
        self.state.is_terminal()
    }

    /// Captures the rendering snapshot of the agent.
    #[must_use]
    pub fn snapshot(&self) -> AgentSnapshot {
        AgentSnapshot {
            id: self.id,
            kind: self.kind,
            cell: self.cell,
            glyph: self.glyph,
            state: self.state,
            health: self.health,
            status: self.health.status(),
        }
    }
}

/// Slot arena owning every agent. Handles index the slots directly and are
/// never reused, so removing an agent leaves other handles valid.
#[derive(Clone, Debug, Default)]
pub(crate) struct AgentRegistry {
    slots: Vec<Option<Agent>>,
}

impl AgentRegistry {
    pub(crate) fn spawn(&mut self, spawn: &AgentSpawn) -> Option<AgentId> {
        let id = AgentId::new(u32::try_from(self.slots.len()).ok()?);
        self.slots.push(Some(Agent::from_spawn(id, spawn)));
        Some(id)
    }

    pub(crate) fn get(&self, id: AgentId) -> Option<&Agent> {
        self.slots.get(slot_index(id)?)?.as_ref()
    }

    pub(crate) fn get_mut(&mut self, id: AgentId) -> Option<&mut Agent> {
        self.slots.get_mut(slot_index(id)?)?.as_mut()
    }

    pub(crate) fn remove(&mut self, id: AgentId) -> Option<Agent> {
        self.slots.get_mut(slot_index(id)?)?.take()
    }

    /// Registered agents in ascending handle order, dead ones included.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &Agent> {
        self.slots.iter().flatten()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Agent> {
        self.slots.iter_mut().flatten()
    }

    pub(crate) fn dead_ids(&self) -> Vec<AgentId> {
        self.iter()
            .filter(|agent| agent.is_dead())
            .map(Agent::id)
            .collect()
    }
}

/// Agents commit at most one step per tick, so speed is a fraction of a tile.
fn clamp_speed(speed: f32) -> f32 {
    if speed.is_nan() {
        0.0
    } else {
        speed.clamp(0.0, 1.0)
    }
}

fn slot_index(id: AgentId) -> Option<usize> {
    usize::try_from(id.get()).ok()
}
