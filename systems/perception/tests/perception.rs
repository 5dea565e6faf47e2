use gridsim_core::{AgentId, AgentKind, AgentSpawn, CellCoord, Command, Event};
use gridsim_system_perception::{can_hear, can_see, Perception, PerceptionConfig};
use gridsim_world::{self as world, query, TileMap, World};

const OPEN_5X5: [&str; 5] = [".....", ".....", ".....", ".....", "....."];

fn world_from(rows: &[&str]) -> World {
    World::new(TileMap::from_rows(rows).expect("valid rows"), 2)
}

fn spawn(world: &mut World, spawn: AgentSpawn) -> AgentId {
    let mut events = Vec::new();
    world::apply(world, Command::SpawnAgent { spawn }, &mut events);
    match events.as_slice() {
        [Event::AgentSpawned { agent, .. }] => *agent,
        other => panic!("unexpected spawn outcome {other:?}"),
    }
}

fn observer_at(column: i32, row: i32, sight: u32) -> AgentSpawn {
    AgentSpawn::new(AgentKind::Hostile, CellCoord::new(column, row)).with_ranges(sight, 6)
}

#[test]
fn open_map_diagonal_is_visible() {
    let mut world = world_from(&OPEN_5X5);
    let observer = spawn(&mut world, observer_at(0, 0, 10));
    let agent = query::agent(&world, observer).expect("observer");

    assert!(can_see(query::tile_map(&world), agent, CellCoord::new(4, 4)));
}

#[test]
fn wall_on_the_diagonal_blocks_sight() {
    let mut world = world_from(&[".....", ".....", "..#..", ".....", "....."]);
    let observer = spawn(&mut world, observer_at(0, 0, 10));
    let agent = query::agent(&world, observer).expect("observer");

    assert!(!can_see(query::tile_map(&world), agent, CellCoord::new(4, 4)));
}

#[test]
fn sight_range_limits_visibility() {
    let mut world = world_from(&OPEN_5X5);
    let observer = spawn(&mut world, observer_at(0, 0, 5));
    let agent = query::agent(&world, observer).expect("observer");

    assert!(can_see(query::tile_map(&world), agent, CellCoord::new(3, 4)));
    assert!(!can_see(query::tile_map(&world), agent, CellCoord::new(4, 4)));
}

#[test]
fn sight_is_symmetric_for_equal_ranges() {
    let rows = [
        "........", //
        "..#.....", //
        ".....#..", //
        "...#....", //
        "........", //
        ".#....#.", //
    ];
    let mut world = world_from(&rows);
    let mut agents = Vec::new();
    for row in 0..6 {
        for column in 0..8 {
            let cell = CellCoord::new(column, row);
            if query::tile_map(&world).is_solid(cell) {
                continue;
            }
            agents.push(spawn(&mut world, observer_at(column, row, 6).with_solid(false)));
        }
    }

    let tiles = query::tile_map(&world);
    for &a in &agents {
        for &b in &agents {
            let first = query::agent(&world, a).expect("agent");
            let second = query::agent(&world, b).expect("agent");
            assert_eq!(
                can_see(tiles, first, second.cell()),
                can_see(tiles, second, first.cell()),
                "asymmetric sight between {:?} and {:?}",
                first.cell(),
                second.cell()
            );
        }
    }
}

#[test]
fn hearing_ignores_walls() {
    let mut world = world_from(&["..#.."]);
    let listener = spawn(
        &mut world,
        AgentSpawn::new(AgentKind::Hostile, CellCoord::new(0, 0)).with_ranges(1, 4),
    );
    let agent = query::agent(&world, listener).expect("listener");

    assert!(can_hear(agent, CellCoord::new(4, 0)));
    assert!(!can_see(query::tile_map(&world), agent, CellCoord::new(4, 0)));
}

#[test]
fn nearest_visible_hostile_is_recorded() {
    let mut world = world_from(&["........"]);
    let observer = spawn(&mut world, observer_at(0, 0, 10));
    let far = spawn(
        &mut world,
        AgentSpawn::new(AgentKind::Player, CellCoord::new(6, 0)),
    );
    let friend = spawn(&mut world, observer_at(2, 0, 10));
    let near = spawn(&mut world, AgentSpawn::new(AgentKind::Ally, CellCoord::new(4, 0)));

    let mut commands = Vec::new();
    Perception::default().handle(&world, &mut commands);

    assert!(commands.contains(&Command::RecordPerception {
        agent: observer,
        target: Some(near),
        target_cell: Some(CellCoord::new(4, 0)),
        visible: true,
    }));
    assert!(commands.contains(&Command::RecordPerception {
        agent: friend,
        target: Some(near),
        target_cell: Some(CellCoord::new(4, 0)),
        visible: true,
    }));
    assert!(
        !commands.iter().any(|command| matches!(
            command,
            Command::RecordPerception { agent, .. } if *agent == far
        )),
        "players record nothing"
    );
}

#[test]
fn fresh_sighting_alerts_allies_within_earshot() {
    let mut world = world_from(&["..........", "####.#####", ".........."]);
    let spotter = spawn(&mut world, observer_at(0, 0, 8));
    let listener = spawn(
        &mut world,
        AgentSpawn::new(AgentKind::Hostile, CellCoord::new(1, 2)).with_ranges(2, 4),
    );
    let deaf = spawn(
        &mut world,
        AgentSpawn::new(AgentKind::Hostile, CellCoord::new(9, 2)).with_ranges(2, 1),
    );
    let _player = spawn(
        &mut world,
        AgentSpawn::new(AgentKind::Player, CellCoord::new(5, 0)),
    );

    let mut commands = Vec::new();
    Perception::default().handle(&world, &mut commands);

    assert!(commands.contains(&Command::AlertAgent {
        agent: listener,
        cell: CellCoord::new(5, 0),
    }));
    assert!(!commands.iter().any(|command| matches!(
        command,
        Command::AlertAgent { agent, .. } if *agent == deaf || *agent == spotter
    )));

    let mut events = Vec::new();
    for command in commands {
        world::apply(&mut world, command, &mut events);
    }
    let heard = query::agent(&world, listener).expect("listener");
    assert_eq!(heard.alert(), Some(CellCoord::new(5, 0)));
    assert_eq!(heard.last_known_target(), Some(CellCoord::new(5, 0)));

    let mut commands = Vec::new();
    Perception::default().handle(&world, &mut commands);
    assert!(
        !commands
            .iter()
            .any(|command| matches!(command, Command::AlertAgent { .. })),
        "an ongoing sighting does not alert again"
    );
}

#[test]
fn alerts_can_be_disabled() {
    let mut world = world_from(&["......"]);
    let _spotter = spawn(&mut world, observer_at(0, 0, 8));
    let _listener = spawn(&mut world, observer_at(1, 0, 8));
    let _player = spawn(
        &mut world,
        AgentSpawn::new(AgentKind::Player, CellCoord::new(5, 0)),
    );
    let perception = Perception::new(PerceptionConfig {
        alert_allies: false,
        ..PerceptionConfig::default()
    });

    let mut commands = Vec::new();
    perception.handle(&world, &mut commands);
    assert!(!commands
        .iter()
        .any(|command| matches!(command, Command::AlertAgent { .. })));
}

#[test]
fn allies_with_wide_hearing_are_alerted_from_afar() {
    let row = ".".repeat(40);
    let mut world = world_from(&[row.as_str()]);
    let _spotter = spawn(&mut world, observer_at(0, 0, 8));
    let listener = spawn(
        &mut world,
        AgentSpawn::new(AgentKind::Hostile, CellCoord::new(30, 0)).with_ranges(2, 35),
    );
    let short_eared = spawn(
        &mut world,
        AgentSpawn::new(AgentKind::Hostile, CellCoord::new(25, 0)).with_ranges(2, 20),
    );
    let _player = spawn(
        &mut world,
        AgentSpawn::new(AgentKind::Player, CellCoord::new(5, 0)),
    );

    let mut commands = Vec::new();
    Perception::default().handle(&world, &mut commands);

    assert!(commands.contains(&Command::AlertAgent {
        agent: listener,
        cell: CellCoord::new(5, 0),
    }));
    assert!(!commands.iter().any(|command| matches!(
        command,
        Command::AlertAgent { agent, .. } if *agent == short_eared
    )));
}
