use gridsim_core::{CellCoord, Direction};
use gridsim_system_pathfinding::{compute_field, next_step, PathStep, UNLABELED};
use gridsim_world::TileMap;

#[test]
fn open_five_by_five_corner_to_corner_distance() {
    let tiles = TileMap::open(5, 5).expect("valid map");
    let field = compute_field(&tiles, CellCoord::new(4, 4), 4096);

    assert_eq!(field.distance(CellCoord::new(4, 4)), Some(0));
    assert_eq!(field.distance(CellCoord::new(0, 0)), Some(8));
}

#[test]
fn distances_never_jump_between_neighbours() {
    let tiles = TileMap::from_rows(&[
        "..........", //
        ".####.###.", //
        ".#......#.", //
        ".#.####.#.", //
        "...#..#...", //
        "####..####", //
    ])
    .expect("valid rows");
    let seed = CellCoord::new(4, 4);
    let field = compute_field(&tiles, seed, 4096);

    assert_eq!(field.distance(seed), Some(0));
    for row in 0..6 {
        for column in 0..10 {
            let cell = CellCoord::new(column, row);
            let Some(here) = field.distance(cell) else {
                continue;
            };
            assert!(!tiles.is_solid(cell));
            if here > 0 {
                let closer = Direction::ALL
                    .into_iter()
                    .filter_map(|direction| field.distance(cell.step(direction)))
                    .any(|neighbor| neighbor + 1 == here);
                assert!(closer, "{cell:?} has no predecessor");
            }
            for direction in Direction::ALL {
                if let Some(neighbor) = field.distance(cell.step(direction)) {
                    assert!(neighbor.abs_diff(here) <= 1, "jump at {cell:?}");
                }
            }
        }
    }
}

#[test]
fn following_next_step_reaches_the_seed() {
    let tiles = TileMap::from_rows(&[
        ".......", //
        ".#####.", //
        ".#...#.", //
        ".#.#.#.", //
        "...#...", //
    ])
    .expect("valid rows");
    let seed = CellCoord::new(2, 2);
    let field = compute_field(&tiles, seed, 4096);

    let mut position = CellCoord::new(6, 4);
    let mut steps = 0;
    loop {
        match next_step(&field, position) {
            PathStep::Arrived => break,
            PathStep::Step(direction) => position = position.step(direction),
            PathStep::NoPath => panic!("lost the path at {position:?}"),
        }
        steps += 1;
        assert!(steps < 64, "path does not converge");
    }
    assert_eq!(position, seed);
    assert_eq!(Some(steps), field.distance(CellCoord::new(6, 4)).map(usize::from));
}

#[test]
fn walled_off_region_reports_no_path() {
    let tiles = TileMap::from_rows(&["..#..", "..#..", "..#.."]).expect("valid rows");
    let field = compute_field(&tiles, CellCoord::new(0, 0), 4096);

    assert_eq!(next_step(&field, CellCoord::new(4, 1)), PathStep::NoPath);
    assert_eq!(field.distance(CellCoord::new(3, 0)), None);
    assert!(field.cells().iter().filter(|value| **value != UNLABELED).count() == 6);
    assert!(!field.is_truncated());
}
