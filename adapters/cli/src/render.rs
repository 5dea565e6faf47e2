//! ASCII frames standing in for the rendering collaborator.

use gridsim_core::{AgentView, CellCoord};
use gridsim_world::{query, World, FLOOR_GLYPH};

/// Draws the visual layer with every live agent overlaid by its glyph.
pub(crate) fn frame(world: &World, view: &AgentView) -> String {
    let tiles = query::tile_map(world);
    let width = i32::try_from(tiles.width()).unwrap_or(i32::MAX);
    let height = i32::try_from(tiles.height()).unwrap_or(i32::MAX);

    let mut rows: Vec<Vec<char>> = (0..height)
        .map(|row| {
            (0..width)
                .map(|column| {
                    tiles
                        .glyph(CellCoord::new(column, row))
                        .unwrap_or(FLOOR_GLYPH)
                })
                .collect()
        })
        .collect();

    for snapshot in view.iter() {
        let (Ok(column), Ok(row)) = (
            usize::try_from(snapshot.cell.column()),
            usize::try_from(snapshot.cell.row()),
        ) else {
            continue;
        };
        if let Some(slot) = rows.get_mut(row).and_then(|line| line.get_mut(column)) {
            *slot = snapshot.glyph;
        }
    }

    let mut out = String::new();
    for line in rows {
        out.extend(line);
        out.push('\n');
    }
    out
}
