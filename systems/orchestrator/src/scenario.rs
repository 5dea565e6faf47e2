//! Declarative scenario description used to bootstrap a simulation.

use gridsim_core::{
    AgentId, AgentKind, AgentSpawn, CellCoord, Direction, MapLoadError, MovementIntent,
    SpawnRejection,
};
use gridsim_world::{InteractionPolicy, OccupantResponse, TileMap};
use serde::Deserialize;
use thiserror::Error;

use crate::{Simulation, SimulationConfig};

/// Map, agents and configuration of a single run.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Scenario {
    /// Simulation tunables; every field falls back to its default.
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Tile layout.
    pub map: MapLayout,
    /// Interaction rules; the standard policy applies when omitted.
    #[serde(default)]
    pub interactions: Option<Vec<InteractionRule>>,
    /// Agents spawned in declaration order, which fixes their handles.
    #[serde(default, rename = "agent")]
    pub agents: Vec<AgentEntry>,
}

/// ASCII rows translated through the tile legend.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct MapLayout {
    /// One string per map row, all of equal length.
    pub rows: Vec<String>,
}

/// Single entry of the interaction policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub struct InteractionRule {
    /// Kind of the moving agent.
    pub mover: AgentKind,
    /// Kind of the agent standing on the destination.
    pub occupant: AgentKind,
    /// Response applied to the pair.
    pub response: OccupantResponse,
}

/// Agent declaration; omitted fields take the defaults of the kind.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AgentEntry {
    /// Classification of the agent.
    pub kind: Option<AgentKind>,
    /// Spawn column.
    pub column: i32,
    /// Spawn row.
    pub row: i32,
    /// Rendering glyph.
    pub glyph: Option<char>,
    /// Whether the agent blocks other movers.
    pub solid: Option<bool>,
    /// Maximum hit points.
    pub max_health: Option<u32>,
    /// Tiles per tick.
    pub speed: Option<f32>,
    /// Sight range in tiles.
    pub sight_range: Option<u32>,
    /// Hearing range in tiles.
    pub hearing_range: Option<u32>,
    /// Courage in `[0, 1]`.
    pub courage: Option<f32>,
    /// Aggression in `[0, 1]`.
    pub aggression: Option<f32>,
    /// Input script replayed cyclically: `N`, `E`, `S`, `W` step, `.` holds.
    pub script: Option<String>,
}

impl AgentEntry {
    fn to_spawn(&self) -> AgentSpawn {
        let kind = self.kind.unwrap_or(AgentKind::Hostile);
        let mut spawn = AgentSpawn::new(kind, CellCoord::new(self.column, self.row));
        if let Some(glyph) = self.glyph {
            spawn.glyph = glyph;
        }
        if let Some(solid) = self.solid {
            spawn = spawn.with_solid(solid);
        }
        if let Some(max_health) = self.max_health {
            spawn = spawn.with_max_health(max_health);
        }
        if let Some(speed) = self.speed {
            spawn = spawn.with_speed(speed);
        }
        spawn = spawn.with_ranges(
            self.sight_range.unwrap_or(spawn.sight_range),
            self.hearing_range.unwrap_or(spawn.hearing_range),
        );
        spawn.with_personality(
            self.courage.unwrap_or(spawn.personality.courage()),
            self.aggression.unwrap_or(spawn.personality.aggression()),
        )
    }
}

/// Errors raised while turning a scenario into a running simulation.
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// The map rows do not form a valid tile map.
    #[error("invalid map: {0}")]
    Map(#[from] MapLoadError),
    /// An agent could not be placed.
    #[error("agent #{index} cannot spawn at ({}, {}): {reason:?}", .cell.column(), .cell.row())]
    Spawn {
        /// Position of the agent in the declaration list.
        index: usize,
        /// Requested cell.
        cell: CellCoord,
        /// Rejection reported by the world.
        reason: SpawnRejection,
    },
    /// An input script contained an unknown step.
    #[error("agent #{index} script contains unknown step {step:?}")]
    Script {
        /// Position of the agent in the declaration list.
        index: usize,
        /// Offending character.
        step: char,
    },
}

/// Cyclic input sequence standing in for the input collaborator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlayerScript {
    agent: AgentId,
    steps: Vec<MovementIntent>,
}

impl PlayerScript {
    /// Parses a script of `N`, `E`, `S`, `W` and `.` characters; whitespace is ignored.
    pub fn parse(agent: AgentId, script: &str) -> Result<Self, char> {
        let steps = script
            .chars()
            .filter(|step| !step.is_whitespace())
            .map(|step| match step.to_ascii_uppercase() {
                'N' => Ok(MovementIntent::Step(Direction::North)),
                'E' => Ok(MovementIntent::Step(Direction::East)),
                'S' => Ok(MovementIntent::Step(Direction::South)),
                'W' => Ok(MovementIntent::Step(Direction::West)),
                '.' => Ok(MovementIntent::Hold),
                _ => Err(step),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { agent, steps })
    }

    /// Agent steered by the script.
    #[must_use]
    pub const fn agent(&self) -> AgentId {
        self.agent
    }

    /// Intent for the provided tick; the script wraps around when exhausted.
    #[must_use]
    pub fn intent_at(&self, tick: u64) -> MovementIntent {
        if self.steps.is_empty() {
            return MovementIntent::Hold;
        }
        let len = u64::try_from(self.steps.len()).unwrap_or(u64::MAX);
        usize::try_from(tick % len)
            .ok()
            .and_then(|index| self.steps.get(index))
            .copied()
            .unwrap_or_default()
    }
}

/// Simulation built from a scenario together with its scripted inputs.
#[derive(Debug)]
pub struct LoadedScenario {
    /// Ready-to-run simulation.
    pub simulation: Simulation,
    /// Input scripts in declaration order.
    pub scripts: Vec<PlayerScript>,
}

impl LoadedScenario {
    /// Submits every script's intent for the upcoming tick, then runs it.
    pub fn step(&mut self) -> crate::TickReport {
        let upcoming = self.simulation.tick_index();
        for script in &self.scripts {
            let intent = script.intent_at(upcoming);
            if intent != MovementIntent::Hold {
                self.simulation.submit_player_intent(script.agent, intent);
            }
        }
        self.simulation.tick()
    }
}

impl Scenario {
    /// Interaction policy described by the scenario.
    #[must_use]
    pub fn policy(&self) -> InteractionPolicy {
        match &self.interactions {
            None => InteractionPolicy::standard(),
            Some(rules) => rules
                .iter()
                .fold(InteractionPolicy::new(), |policy, rule| {
                    policy.with_rule(rule.mover, rule.occupant, rule.response)
                }),
        }
    }

    /// Builds the map, spawns every agent and parses the input scripts.
    pub fn build(&self) -> Result<LoadedScenario, ScenarioError> {
        let tiles = TileMap::from_rows(&self.map.rows)?;
        let mut simulation = Simulation::new(tiles, &self.simulation).with_policy(self.policy());
        let mut scripts = Vec::new();

        for (index, entry) in self.agents.iter().enumerate() {
            let spawn = entry.to_spawn();
            let agent = simulation
                .spawn(spawn)
                .map_err(|reason| ScenarioError::Spawn {
                    index,
                    cell: spawn.cell,
                    reason,
                })?;

            if let Some(script) = &entry.script {
                let script = PlayerScript::parse(agent, script)
                    .map_err(|step| ScenarioError::Script { index, step })?;
                scripts.push(script);
            }
        }

        Ok(LoadedScenario {
            simulation,
            scripts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripts_wrap_around() {
        let script = PlayerScript::parse(AgentId::new(0), "E . w").expect("valid script");
        assert_eq!(script.intent_at(0), MovementIntent::Step(Direction::East));
        assert_eq!(script.intent_at(1), MovementIntent::Hold);
        assert_eq!(script.intent_at(2), MovementIntent::Step(Direction::West));
        assert_eq!(script.intent_at(3), MovementIntent::Step(Direction::East));
        assert_eq!(PlayerScript::parse(AgentId::new(0), "NX"), Err('X'));
    }

    #[test]
    fn omitted_fields_fall_back_to_kind_defaults() {
        let entry = AgentEntry {
            kind: Some(AgentKind::Ally),
            column: 2,
            row: 1,
            courage: Some(0.2),
            ..AgentEntry::default()
        };
        let spawn = entry.to_spawn();
        assert_eq!(spawn.glyph, 'a');
        assert_eq!(spawn.cell, CellCoord::new(2, 1));
        assert_eq!(spawn.personality.courage(), 0.2);
        assert_eq!(spawn.personality.aggression(), 0.5);
    }

    #[test]
    fn missing_rules_use_the_standard_policy() {
        let scenario = Scenario {
            simulation: SimulationConfig::default(),
            map: MapLayout {
                rows: vec!["..".to_owned()],
            },
            interactions: None,
            agents: Vec::new(),
        };
        assert_eq!(scenario.policy(), InteractionPolicy::standard());

        let blocking = Scenario {
            interactions: Some(Vec::new()),
            ..scenario
        };
        assert_eq!(blocking.policy(), InteractionPolicy::new());
    }
}
