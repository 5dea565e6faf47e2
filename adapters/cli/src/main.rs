#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that runs a grid simulation scenario headlessly.
//!
//! The adapter plays the part of every outside collaborator: scripted input
//! feeds player intents, declared attacks are applied as fixed damage, queued
//! tile events are drained and logged, and ASCII frames replace rendering.

mod render;

use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use gridsim_core::{ActionIntent, Event, TileEventKind};
use gridsim_system_orchestrator::{Scenario, TickReport};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "gridsim")]
#[command(about = "Runs a tick-based grid agent simulation from a scenario file")]
struct Cli {
    /// Scenario file in TOML describing the map, agents and tunables.
    #[arg(long)]
    scenario: PathBuf,

    /// Number of ticks to simulate.
    #[arg(long, default_value_t = 100)]
    ticks: u64,

    /// Overrides the behavior seed stored in the scenario.
    #[arg(long)]
    seed: Option<u64>,

    /// Prints an ASCII frame every N ticks; 0 prints only the final frame.
    #[arg(long, default_value_t = 0)]
    render_every: u64,

    /// Hit points removed by each declared attack.
    #[arg(long, default_value_t = 1)]
    attack_damage: u32,
}

#[derive(Debug, Default)]
struct RunSummary {
    moves: usize,
    denied: usize,
    attacks: usize,
    triggers: usize,
    deaths: usize,
}

impl RunSummary {
    fn record(&mut self, report: &TickReport) {
        for event in &report.events {
            match event {
                Event::AgentMoved { .. } => self.moves += 1,
                Event::MoveDenied { .. } => self.denied += 1,
                Event::AgentDied { .. } => self.deaths += 1,
                _ => {}
            }
        }
        self.attacks += report.actions.len();
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let source = fs::read_to_string(&cli.scenario)
        .with_context(|| format!("failed to read {}", cli.scenario.display()))?;
    let mut scenario: Scenario = toml::from_str(&source)
        .with_context(|| format!("failed to parse {}", cli.scenario.display()))?;
    if let Some(seed) = cli.seed {
        scenario.simulation.seed = seed;
    }

    let mut loaded = scenario.build().context("failed to build the scenario")?;
    info!(
        agents = scenario.agents.len(),
        scripts = loaded.scripts.len(),
        seed = scenario.simulation.seed,
        ticks = cli.ticks,
        "scenario loaded"
    );

    let mut summary = RunSummary::default();
    for _ in 0..cli.ticks {
        let report = loaded.step();
        summary.record(&report);

        for (attacker, action) in &report.actions {
            match action {
                ActionIntent::Attack { target } => {
                    let events = loaded.simulation.apply_damage(*target, cli.attack_damage);
                    debug!(
                        attacker = attacker.get(),
                        target = target.get(),
                        applied = !events.is_empty(),
                        "attack resolved"
                    );
                }
            }
        }

        for tile_event in loaded.simulation.drain_tile_events() {
            if tile_event.kind == TileEventKind::Trigger {
                summary.triggers += 1;
            }
            info!(
                tick = report.tick,
                kind = ?tile_event.kind,
                agent = tile_event.source.get(),
                column = tile_event.cell.column(),
                row = tile_event.cell.row(),
                magnitude = tile_event.magnitude,
                "tile event"
            );
        }

        if cli.render_every > 0 && report.tick % cli.render_every == 0 {
            println!("tick {}", report.tick);
            print!(
                "{}",
                render::frame(loaded.simulation.world(), &loaded.simulation.agent_view())
            );
        }
    }

    if cli.render_every == 0 {
        println!("tick {}", loaded.simulation.tick_index());
        print!(
            "{}",
            render::frame(loaded.simulation.world(), &loaded.simulation.agent_view())
        );
    }

    println!(
        "ticks={} moves={} denied={} attacks={} triggers={} deaths={} survivors={}",
        loaded.simulation.tick_index(),
        summary.moves,
        summary.denied,
        summary.attacks,
        summary.triggers,
        summary.deaths,
        loaded.simulation.agent_view().len()
    );
    Ok(())
}
