#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Behavior state machine turning perception into movement and attack intents.
//!
//! Transitions are evaluated once per tick for every live agent. The update
//! for the resulting state only proposes intents; positions change later when
//! the world resolves the submitted movement.

use gridsim_core::{
    ActionIntent, AgentId, BehaviorState, BehaviorTimers, CellCoord, Command, Direction,
    MovementIntent, Personality,
};
use gridsim_system_pathfinding::{flee_step, next_step, PathCache, PathStep};
use gridsim_world::{query, Agent, World};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Deserialize;
use tracing::debug;

/// Thresholds of the transition table.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Targets closer than this Manhattan distance may scare timid agents away.
    pub flee_distance: u32,
    /// Agents with courage below this value flee from close targets.
    pub flee_courage: f32,
    /// Agents with aggression above this value chase visible targets.
    pub chase_aggression: f32,
    /// Per-tick probability that an idle agent starts patrolling.
    pub patrol_chance: f64,
    /// Ticks a patrol lasts before the agent idles again.
    pub patrol_ticks: u32,
    /// Ticks a search may last without reacquiring the target.
    pub search_timeout: u32,
    /// Distance beyond which a fleeing agent counts as safe.
    pub flee_safe_distance: u32,
    /// Consecutive safe ticks after which a fleeing agent calms down.
    pub flee_safe_ticks: u32,
    /// Ticks between two attacks of the same agent.
    pub attack_cooldown: u32,
    /// Ticks an agent ignores a target after failing to find a path to it.
    pub no_path_cooldown: u32,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            flee_distance: 5,
            flee_courage: 0.3,
            chase_aggression: 0.7,
            patrol_chance: 0.05,
            patrol_ticks: 8,
            search_timeout: 12,
            flee_safe_distance: 8,
            flee_safe_ticks: 3,
            attack_cooldown: 2,
            no_path_cooldown: 8,
        }
    }
}

/// Facts the transition table reads for one agent during one tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Observation {
    /// Whether the agent's health reached zero.
    pub health_depleted: bool,
    /// Manhattan distance to the selected target while it is visible.
    pub visible_distance: Option<u32>,
    /// Whether an ally reported a target position this tick.
    pub alerted: bool,
    /// Whether a last known target position is remembered.
    pub has_last_known: bool,
}

/// Timers after one more tick in `current`, before any transition.
#[must_use]
pub fn advance_timers(
    current: BehaviorState,
    timers: BehaviorTimers,
    observation: &Observation,
    config: &BehaviorConfig,
) -> BehaviorTimers {
    let safe = observation
        .visible_distance
        .map_or(true, |distance| distance > config.flee_safe_distance);

    BehaviorTimers {
        state_ticks: timers.state_ticks.saturating_add(1),
        safe_ticks: if current == BehaviorState::Flee && safe {
            timers.safe_ticks.saturating_add(1)
        } else {
            0
        },
        attack_cooldown: timers.attack_cooldown.saturating_sub(1),
        no_path_cooldown: timers.no_path_cooldown.saturating_sub(1),
    }
}

/// Evaluates the transition table.
///
/// `timers` must already be advanced for this tick and `patrol_roll` is a
/// uniform sample from `[0, 1)`. `Dead` is returned unchanged for every input.
/// While `no_path_cooldown` runs, idle and patrolling agents neither chase
/// nor answer alerts.
#[must_use]
pub fn next_state(
    current: BehaviorState,
    timers: &BehaviorTimers,
    observation: &Observation,
    personality: Personality,
    config: &BehaviorConfig,
    patrol_roll: f64,
) -> BehaviorState {
    if current.is_terminal() || observation.health_depleted {
        return BehaviorState::Dead;
    }

    match current {
        BehaviorState::Idle | BehaviorState::Patrol => {
            let may_pursue = timers.no_path_cooldown == 0;
            if let Some(distance) = observation.visible_distance {
                if distance < config.flee_distance && personality.courage() < config.flee_courage {
                    return BehaviorState::Flee;
                }
                if may_pursue && personality.aggression() > config.chase_aggression {
                    return BehaviorState::Chase;
                }
            } else if may_pursue && observation.alerted {
                return BehaviorState::Search;
            }

            match current {
                BehaviorState::Idle if patrol_roll < config.patrol_chance => BehaviorState::Patrol,
                BehaviorState::Patrol if timers.state_ticks < config.patrol_ticks => {
                    BehaviorState::Patrol
                }
                _ => BehaviorState::Idle,
            }
        }
        BehaviorState::Chase | BehaviorState::Attack => match observation.visible_distance {
            None => BehaviorState::Search,
            Some(distance) if distance <= 1 => BehaviorState::Attack,
            Some(_) => BehaviorState::Chase,
        },
        BehaviorState::Search => {
            if observation.visible_distance.is_some() {
                BehaviorState::Chase
            } else if !observation.has_last_known || timers.state_ticks >= config.search_timeout {
                BehaviorState::Idle
            } else {
                BehaviorState::Search
            }
        }
        BehaviorState::Flee => {
            if timers.safe_ticks >= config.flee_safe_ticks {
                BehaviorState::Idle
            } else {
                BehaviorState::Flee
            }
        }
        BehaviorState::Dead => BehaviorState::Dead,
    }
}

/// Pure system running the state machine for every live agent.
#[derive(Debug)]
pub struct Behavior {
    config: BehaviorConfig,
    rng: ChaCha8Rng,
}

impl Behavior {
    /// Creates the system with a deterministic random stream.
    #[must_use]
    pub fn new(config: BehaviorConfig, seed: u64) -> Self {
        Self {
            config,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Decides this tick's state and intents for every live agent.
    ///
    /// Emits `SetBehavior` for each decided agent and `SubmitIntent` for each
    /// requested step; attack declarations are appended to `actions`.
    /// Agents without behavior only ever transition to `Dead`.
    pub fn handle(
        &mut self,
        world: &World,
        paths: &mut PathCache,
        out: &mut Vec<Command>,
        actions: &mut Vec<(AgentId, ActionIntent)>,
    ) {
        for agent in query::live_agents(world) {
            if !agent.kind().runs_behavior() {
                if agent.health().is_depleted() {
                    out.push(Command::SetBehavior {
                        agent: agent.id(),
                        state: BehaviorState::Dead,
                        timers: agent.timers(),
                    });
                }
                continue;
            }

            let roll: f64 = self.rng.gen();
            let target_cell = visible_target_cell(world, agent);
            let observation = Observation {
                health_depleted: agent.health().is_depleted(),
                visible_distance: target_cell.map(|cell| agent.cell().manhattan_distance(cell)),
                alerted: agent.alert().is_some(),
                has_last_known: agent.last_known_target().is_some(),
            };

            let current = agent.state();
            let advanced = advance_timers(current, agent.timers(), &observation, &self.config);
            let mut state = next_state(
                current,
                &advanced,
                &observation,
                agent.personality(),
                &self.config,
                roll,
            );

            let plan = self.plan(world, paths, agent, state, target_cell, &advanced);
            let mut timers = advanced;
            let (intent, action) = match plan {
                Plan::Act { intent, action } => (intent, action),
                Plan::Unreachable => {
                    debug!(agent = agent.id().get(), ?state, "no path; falling back to idle");
                    state = BehaviorState::Idle;
                    timers.no_path_cooldown = self.config.no_path_cooldown;
                    (MovementIntent::Hold, None)
                }
            };

            if state != current {
                timers.state_ticks = 0;
                timers.safe_ticks = 0;
            }
            if action.is_some() {
                timers.attack_cooldown = self.config.attack_cooldown;
            }

            out.push(Command::SetBehavior {
                agent: agent.id(),
                state,
                timers,
            });
            if matches!(intent, MovementIntent::Step(_)) {
                out.push(Command::SubmitIntent {
                    agent: agent.id(),
                    intent,
                });
            }
            if let Some(action) = action {
                actions.push((agent.id(), action));
            }
        }
    }

    fn plan(
        &mut self,
        world: &World,
        paths: &mut PathCache,
        agent: &Agent,
        state: BehaviorState,
        target_cell: Option<CellCoord>,
        timers: &BehaviorTimers,
    ) -> Plan {
        let tiles = query::tile_map(world);
        let tick = query::tick(world);

        match state {
            BehaviorState::Idle | BehaviorState::Dead => Plan::hold(),
            BehaviorState::Patrol => {
                let open: Vec<Direction> = Direction::ALL
                    .into_iter()
                    .filter(|direction| !tiles.is_solid(agent.cell().step(*direction)))
                    .collect();
                if open.is_empty() {
                    return Plan::hold();
                }
                let pick = self.rng.gen_range(0..open.len());
                Plan::step(open[pick])
            }
            BehaviorState::Chase | BehaviorState::Search => {
                let destination = match state {
                    BehaviorState::Chase => target_cell,
                    _ => agent.last_known_target(),
                };
                let Some(destination) = destination else {
                    return Plan::Unreachable;
                };
                let field = paths.field_for(tiles, agent.id(), destination, tick);
                match next_step(field, agent.cell()) {
                    PathStep::Step(direction) => Plan::step(direction),
                    PathStep::Arrived => Plan::hold(),
                    PathStep::NoPath => Plan::Unreachable,
                }
            }
            BehaviorState::Attack => {
                let action = agent
                    .target()
                    .filter(|_| timers.attack_cooldown == 0)
                    .map(|target| ActionIntent::Attack { target });
                Plan::Act {
                    intent: MovementIntent::Hold,
                    action,
                }
            }
            BehaviorState::Flee => {
                let Some(threat) = target_cell.or(agent.last_known_target()) else {
                    return Plan::hold();
                };
                let field = paths.field_for(tiles, agent.id(), threat, tick);
                flee_step(field, agent.cell()).map_or_else(Plan::hold, Plan::step)
            }
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum Plan {
    Act {
        intent: MovementIntent,
        action: Option<ActionIntent>,
    },
    Unreachable,
}

impl Plan {
    fn hold() -> Self {
        Self::Act {
            intent: MovementIntent::Hold,
            action: None,
        }
    }

    fn step(direction: Direction) -> Self {
        Self::Act {
            intent: MovementIntent::Step(direction),
            action: None,
        }
    }
}

fn visible_target_cell(world: &World, agent: &Agent) -> Option<CellCoord> {
    if !agent.target_visible() {
        return None;
    }
    agent
        .target()
        .and_then(|target| query::agent(world, target))
        .filter(|target| !target.is_dead())
        .map(Agent::cell)
}
