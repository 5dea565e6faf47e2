//! Bucketed spatial index mapping grid cells to the agents occupying them.

use std::collections::BTreeMap;

use gridsim_core::{AgentId, CellCoord, DuplicateEntityError};

/// Key of a spatial bucket: the cell coordinate divided by the bucket size.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BucketKey {
    column: i32,
    row: i32,
}

impl BucketKey {
    /// Bucket column index.
    #[must_use]
    pub const fn column(&self) -> i32 {
        self.column
    }

    /// Bucket row index.
    #[must_use]
    pub const fn row(&self) -> i32 {
        self.row
    }
}

/// Incrementally maintained lookup from bucket to the agents inside it.
///
/// Buckets hold handles in ascending order so every query result is
/// deterministic. The index also remembers each agent's recorded cell, which
/// lets `remove` and `move_agent` find the old bucket without a scan.
#[derive(Clone, Debug)]
pub struct SpatialIndex {
    cell_size: u32,
    buckets: BTreeMap<BucketKey, Vec<AgentId>>,
    positions: BTreeMap<AgentId, CellCoord>,
}

impl SpatialIndex {
    /// Creates an empty index whose buckets span `cell_size` tiles per side.
    ///
    /// A size of zero is treated as one.
    #[must_use]
    pub fn new(cell_size: u32) -> Self {
        Self {
            cell_size: cell_size.max(1),
            buckets: BTreeMap::new(),
            positions: BTreeMap::new(),
        }
    }

    /// Number of tiles along each side of a bucket.
    #[must_use]
    pub const fn cell_size(&self) -> u32 {
        self.cell_size
    }

    /// Registers an agent at the provided cell.
    pub fn insert(&mut self, agent: AgentId, cell: CellCoord) -> Result<(), DuplicateEntityError> {
        if self.positions.contains_key(&agent) {
            return Err(DuplicateEntityError { agent });
        }

        let _ = self.positions.insert(agent, cell);
        self.add_to_bucket(agent, self.bucket_of(cell));
        Ok(())
    }

    /// Unregisters an agent, returning the cell it was recorded at.
    pub fn remove(&mut self, agent: AgentId) -> Option<CellCoord> {
        let cell = self.positions.remove(&agent)?;
        self.remove_from_bucket(agent, self.bucket_of(cell));
        Some(cell)
    }

    /// Moves a registered agent to a new cell, returning its previous cell.
    ///
    /// Returns `None` and leaves the index untouched when the agent is unknown.
    pub fn move_agent(&mut self, agent: AgentId, cell: CellCoord) -> Option<CellCoord> {
        let previous = self.positions.get(&agent).copied()?;
        let old_bucket = self.bucket_of(previous);
        let new_bucket = self.bucket_of(cell);

        if old_bucket != new_bucket {
            self.remove_from_bucket(agent, old_bucket);
            self.add_to_bucket(agent, new_bucket);
        }

        let _ = self.positions.insert(agent, cell);
        Some(previous)
    }

    /// Agents recorded in the `(2 * radius + 1)²` buckets centred on the cell's bucket.
    ///
    /// The result is sorted by handle and contains every agent at most once.
    #[must_use]
    pub fn query(&self, cell: CellCoord, radius_in_cells: u32) -> Vec<AgentId> {
        let centre = self.bucket_of(cell);
        let radius = i32::try_from(radius_in_cells).unwrap_or(i32::MAX);
        let column_range = centre.column.saturating_sub(radius)..=centre.column.saturating_add(radius);
        let row_low = centre.row.saturating_sub(radius);
        let row_high = centre.row.saturating_add(radius);

        let mut found = Vec::new();
        let low = BucketKey {
            column: *column_range.start(),
            row: i32::MIN,
        };
        let high = BucketKey {
            column: *column_range.end(),
            row: i32::MAX,
        };
        for (key, agents) in self.buckets.range(low..=high) {
            if key.row < row_low || key.row > row_high {
                continue;
            }
            found.extend(agents.iter().copied());
        }

        found.sort_unstable();
        found
    }

    /// Agents recorded at exactly the provided cell, in ascending handle order.
    pub fn occupants(&self, cell: CellCoord) -> impl Iterator<Item = AgentId> + '_ {
        self.buckets
            .get(&self.bucket_of(cell))
            .into_iter()
            .flatten()
            .copied()
            .filter(move |agent| self.positions.get(agent) == Some(&cell))
    }

    /// Cell recorded for an agent.
    #[must_use]
    pub fn position(&self, agent: AgentId) -> Option<CellCoord> {
        self.positions.get(&agent).copied()
    }

    /// Iterates over every registered agent and its recorded cell in handle order.
    pub fn iter(&self) -> impl Iterator<Item = (AgentId, CellCoord)> + '_ {
        self.positions.iter().map(|(agent, cell)| (*agent, *cell))
    }

    /// Number of registered agents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Reports whether no agent is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Bucket containing the provided cell.
    #[must_use]
    pub fn bucket_of(&self, cell: CellCoord) -> BucketKey {
        let size = i32::try_from(self.cell_size).unwrap_or(i32::MAX);
        BucketKey {
            column: cell.column().div_euclid(size),
            row: cell.row().div_euclid(size),
        }
    }

    fn add_to_bucket(&mut self, agent: AgentId, key: BucketKey) {
        let bucket = self.buckets.entry(key).or_default();
        if let Err(position) = bucket.binary_search(&agent) {
            bucket.insert(position, agent);
        }
    }

    fn remove_from_bucket(&mut self, agent: AgentId, key: BucketKey) {
        let Some(bucket) = self.buckets.get_mut(&key) else {
            return;
        };
        if let Ok(position) = bucket.binary_search(&agent) {
            let _ = bucket.remove(position);
        }
        if bucket.is_empty() {
            let _ = self.buckets.remove(&key);
        }
    }
}
