//! Fixed-size tile map holding the independent visual and collision layers.

use gridsim_core::{CellCoord, CollisionKind, CollisionTile, MapLoadError};

/// Glyph drawn for walkable floor.
pub const FLOOR_GLYPH: char = '.';

/// Rectangular grid of tiles stored as two flat row-major layers.
///
/// The shape is fixed at construction. Only the collision layer may change
/// afterwards, through [`TileMap::set_tile`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TileMap {
    width: u32,
    height: u32,
    glyphs: Vec<char>,
    collision: Vec<CollisionTile>,
}

impl TileMap {
    /// Builds a map from already-loaded layers, rejecting inconsistent input.
    pub fn from_layers(
        width: u32,
        height: u32,
        glyphs: Vec<char>,
        collision: Vec<CollisionTile>,
    ) -> Result<Self, MapLoadError> {
        let expected = cell_count(width, height)?;

        if glyphs.len() != expected {
            return Err(MapLoadError::LayerSizeMismatch {
                layer: "visual",
                expected,
                actual: glyphs.len(),
            });
        }

        if collision.len() != expected {
            return Err(MapLoadError::LayerSizeMismatch {
                layer: "collision",
                expected,
                actual: collision.len(),
            });
        }

        Ok(Self {
            width,
            height,
            glyphs,
            collision,
        })
    }

    /// Builds a map of the given size with every tile open.
    pub fn open(width: u32, height: u32) -> Result<Self, MapLoadError> {
        let count = cell_count(width, height)?;
        Self::from_layers(
            width,
            height,
            vec![FLOOR_GLYPH; count],
            vec![CollisionTile::OPEN; count],
        )
    }

    /// Builds a map from ASCII rows using the glyph legend of [`legend`].
    ///
    /// Each glyph is copied into the visual layer verbatim and translated into
    /// the collision layer.
    pub fn from_rows<S: AsRef<str>>(rows: &[S]) -> Result<Self, MapLoadError> {
        let expected_columns = rows.first().map_or(0, |row| row.as_ref().chars().count());
        let width = u32::try_from(expected_columns).map_err(|_| MapLoadError::TooLarge {
            width: u32::MAX,
            height: u32::try_from(rows.len()).unwrap_or(u32::MAX),
        })?;
        let height = u32::try_from(rows.len()).map_err(|_| MapLoadError::TooLarge {
            width,
            height: u32::MAX,
        })?;
        let count = cell_count(width, height)?;

        let mut glyphs = Vec::with_capacity(count);
        let mut collision = Vec::with_capacity(count);

        for (row_index, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            let columns = row.chars().count();
            if columns != expected_columns {
                return Err(MapLoadError::RaggedRow {
                    row: row_index,
                    expected: expected_columns,
                    actual: columns,
                });
            }

            for (column_index, glyph) in row.chars().enumerate() {
                let tile = legend(glyph).ok_or(MapLoadError::UnknownGlyph {
                    glyph,
                    column: column_index,
                    row: row_index,
                })?;
                glyphs.push(glyph);
                collision.push(tile);
            }
        }

        Self::from_layers(width, height, glyphs, collision)
    }

    /// Number of tile columns.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Number of tile rows.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Reports whether the cell lies inside the map.
    #[must_use]
    pub fn contains(&self, cell: CellCoord) -> bool {
        self.index(cell).is_some()
    }

    /// Collision classification of a cell; the map edge behaves as a wall.
    #[must_use]
    pub fn classify(&self, cell: CellCoord) -> CollisionKind {
        self.tile(cell).kind()
    }

    /// Collision tile stored for a cell, or [`CollisionTile::SOLID`] when out of bounds.
    #[must_use]
    pub fn tile(&self, cell: CellCoord) -> CollisionTile {
        self.index(cell)
            .and_then(|index| self.collision.get(index).copied())
            .unwrap_or(CollisionTile::SOLID)
    }

    /// Reports whether the cell blocks movement and sight.
    #[must_use]
    pub fn is_solid(&self, cell: CellCoord) -> bool {
        self.classify(cell) == CollisionKind::Solid
    }

    /// Visual glyph stored for a cell.
    #[must_use]
    pub fn glyph(&self, cell: CellCoord) -> Option<char> {
        self.index(cell)
            .and_then(|index| self.glyphs.get(index).copied())
    }

    /// Rewrites the collision tile of a cell in place.
    ///
    /// Returns `false` without touching the map when the cell is out of bounds.
    pub fn set_tile(&mut self, cell: CellCoord, tile: CollisionTile) -> bool {
        let Some(slot) = self
            .index(cell)
            .and_then(|index| self.collision.get_mut(index))
        else {
            return false;
        };
        *slot = tile;
        true
    }

    /// Rewrites the visual glyph of a cell in place.
    ///
    /// Returns `false` without touching the map when the cell is out of bounds.
    pub fn set_glyph(&mut self, cell: CellCoord, glyph: char) -> bool {
        let Some(slot) = self.index(cell).and_then(|index| self.glyphs.get_mut(index)) else {
            return false;
        };
        *slot = glyph;
        true
    }

    /// Visual layer in row-major order.
    #[must_use]
    pub fn visual_layer(&self) -> &[char] {
        &self.glyphs
    }

    /// Collision layer in row-major order.
    #[must_use]
    pub fn collision_layer(&self) -> &[CollisionTile] {
        &self.collision
    }

    pub(crate) fn index(&self, cell: CellCoord) -> Option<usize> {
        let column = u32::try_from(cell.column()).ok()?;
        let row = u32::try_from(cell.row()).ok()?;
        if column >= self.width || row >= self.height {
            return None;
        }
        let width = usize::try_from(self.width).ok()?;
        let row = usize::try_from(row).ok()?;
        let column = usize::try_from(column).ok()?;
        row.checked_mul(width)?.checked_add(column)
    }
}

/// Collision tile associated with an ASCII map glyph.
///
/// | glyph | tile |
/// |---|---|
/// | `.` | open floor |
/// | `#` | solid wall |
/// | `^` | pressure plate (consumable trigger) |
/// | `!` | persistent trigger |
/// | `x` | damage 1 |
/// | `~` | slow to 50% |
#[must_use]
pub fn legend(glyph: char) -> Option<CollisionTile> {
    let tile = match glyph {
        '.' => CollisionTile::OPEN,
        '#' => CollisionTile::SOLID,
        '^' => CollisionTile::trigger(0, true),
        '!' => CollisionTile::trigger(0, false),
        'x' => CollisionTile::damage(1),
        '~' => CollisionTile::slow(50),
        _ => return None,
    };
    Some(tile)
}

fn cell_count(width: u32, height: u32) -> Result<usize, MapLoadError> {
    if width == 0 || height == 0 {
        return Err(MapLoadError::EmptyDimensions { width, height });
    }

    let too_large = MapLoadError::TooLarge { width, height };
    let columns = usize::try_from(width).map_err(|_| too_large.clone())?;
    let rows = usize::try_from(height).map_err(|_| too_large.clone())?;
    let count = columns.checked_mul(rows).ok_or(too_large.clone())?;
    // Cells must stay addressable through signed coordinates.
    if i32::try_from(width).is_err() || i32::try_from(height).is_err() {
        return Err(too_large);
    }
    Ok(count)
}
