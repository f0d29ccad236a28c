use std::collections::HashMap;

use glam::DVec2;

use crate::{
    config::{BroadPhaseMode, DEFAULT_GRID_CELL_SIZE, MAX_GRID_CELLS_PER_ENTITY},
    core::entity::{Entity, EntityId},
    utils::allocator::Arena,
};

/// Relative padding on registered bounding squares so rounding in the
/// cell math can never hide a touching pair.
const GRID_SKIN: f64 = 1e-9;

/// Inclusive range of grid cells covered by one bounding square.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CellSpan {
    min: (i64, i64),
    max: (i64, i64),
}

impl CellSpan {
    fn cell_count(&self) -> i64 {
        let width = self.max.0.saturating_sub(self.min.0).saturating_add(1);
        let height = self.max.1.saturating_sub(self.min.1).saturating_add(1);
        width.saturating_mul(height)
    }

    fn cells(self) -> impl Iterator<Item = (i64, i64)> {
        (self.min.0..=self.max.0).flat_map(move |x| (self.min.1..=self.max.1).map(move |y| (x, y)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Registration {
    Absent,
    Cells(CellSpan),
    /// Too large for the grid; paired with every other slot.
    Oversized,
}

/// Uniform grid over entity bounding squares, kept in sync with live positions.
#[derive(Debug, Clone)]
pub struct SpatialGrid {
    cell_size: f64,
    grid: HashMap<(i64, i64), Vec<usize>>,
    slots: Vec<Registration>,
    oversized: Vec<usize>,
}

impl SpatialGrid {
    pub fn new(cell_size: f64) -> Self {
        Self {
            cell_size,
            grid: HashMap::new(),
            slots: Vec::new(),
            oversized: Vec::new(),
        }
    }

    fn world_to_grid(&self, pos: DVec2) -> (i64, i64) {
        (
            (pos.x / self.cell_size).floor() as i64,
            (pos.y / self.cell_size).floor() as i64,
        )
    }

    fn registration(&self, position: DVec2, radius: f64) -> Registration {
        let reach = DVec2::splat(radius + radius.abs().max(self.cell_size) * GRID_SKIN);
        let span = CellSpan {
            min: self.world_to_grid(position - reach),
            max: self.world_to_grid(position + reach),
        };
        if span.cell_count() > MAX_GRID_CELLS_PER_ENTITY {
            Registration::Oversized
        } else {
            Registration::Cells(span)
        }
    }

    pub fn clear(&mut self) {
        self.grid.values_mut().for_each(Vec::clear);
        self.slots.clear();
        self.oversized.clear();
    }

    /// Registers `slot` in every cell its bounding square touches, or in the
    /// overflow list when that would exceed [`MAX_GRID_CELLS_PER_ENTITY`] cells.
    pub fn insert(&mut self, slot: usize, position: DVec2, radius: f64) {
        let registration = self.registration(position, radius);
        self.register(slot, registration);
    }

    /// Moves `slot` to the cells matching its new bounding square.
    pub fn update(&mut self, slot: usize, position: DVec2, radius: f64) {
        let registration = self.registration(position, radius);
        if self.slots.get(slot) == Some(&registration) {
            return;
        }
        self.remove(slot);
        self.register(slot, registration);
    }

    pub fn remove(&mut self, slot: usize) {
        let Some(previous) = self.slots.get_mut(slot) else {
            return;
        };
        match std::mem::replace(previous, Registration::Absent) {
            Registration::Absent => {}
            Registration::Cells(span) => {
                for cell in span.cells() {
                    if let Some(bucket) = self.grid.get_mut(&cell) {
                        bucket.retain(|&other| other != slot);
                    }
                }
            }
            Registration::Oversized => self.oversized.retain(|&other| other != slot),
        }
    }

    fn register(&mut self, slot: usize, registration: Registration) {
        if self.slots.len() <= slot {
            self.slots.resize(slot + 1, Registration::Absent);
        }
        self.slots[slot] = registration;
        match registration {
            Registration::Absent => {}
            Registration::Cells(span) => {
                for cell in span.cells() {
                    self.grid.entry(cell).or_default().push(slot);
                }
            }
            Registration::Oversized => self.oversized.push(slot),
        }
    }

    /// Every slot that may overlap `slot`, sorted and deduplicated.
    pub fn neighbours(&self, slot: usize, out: &mut Vec<usize>) {
        out.clear();
        match self.slots.get(slot).copied().unwrap_or(Registration::Absent) {
            Registration::Absent => return,
            Registration::Oversized => {
                out.extend(
                    self.slots
                        .iter()
                        .enumerate()
                        .filter(|(_, registration)| **registration != Registration::Absent)
                        .map(|(other, _)| other),
                );
            }
            Registration::Cells(span) => {
                for cell in span.cells() {
                    if let Some(bucket) = self.grid.get(&cell) {
                        out.extend_from_slice(bucket);
                    }
                }
                out.extend_from_slice(&self.oversized);
            }
        }
        out.sort_unstable();
        out.dedup();
    }
}

/// Candidate generator for entity-entity contacts.
///
/// Candidates are slots into the caller's order. The grid is refreshed after
/// every correction, so a sweep over ascending candidates visits each touching
/// pair at the same point as the all-pairs sweep would.
#[derive(Debug, Clone)]
pub struct BroadPhase {
    mode: BroadPhaseMode,
    grid: SpatialGrid,
}

impl BroadPhase {
    pub fn new(mode: BroadPhaseMode) -> Self {
        let cell_size = match mode {
            BroadPhaseMode::UniformGrid { cell_size } => cell_size,
            BroadPhaseMode::BruteForce => DEFAULT_GRID_CELL_SIZE,
        };
        Self {
            mode,
            grid: SpatialGrid::new(cell_size),
        }
    }

    pub fn mode(&self) -> BroadPhaseMode {
        self.mode
    }

    pub fn rebuild(&mut self, entities: &Arena<Entity>, order: &[EntityId]) {
        self.grid.clear();
        for (slot, id) in order.iter().enumerate() {
            if let Some(entity) = entities.get(*id) {
                self.grid.insert(slot, entity.position, entity.radius());
            }
        }
    }

    /// Re-registers `slot` after its entity moved.
    pub fn refresh(&mut self, slot: usize, entities: &Arena<Entity>, order: &[EntityId]) {
        match order.get(slot).and_then(|&id| entities.get(id)) {
            Some(entity) => self.grid.update(slot, entity.position, entity.radius()),
            None => self.grid.remove(slot),
        }
    }

    /// Slots that may currently overlap `slot`, in ascending order.
    pub fn candidates(&self, slot: usize, out: &mut Vec<usize>) {
        self.grid.neighbours(slot, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{body::BodyId, entity::EntityDesc};

    fn arena(points: &[(f64, f64)]) -> (Arena<Entity>, Vec<EntityId>) {
        let mut arena = Arena::new();
        let mut order = Vec::new();
        for &(x, radius) in points {
            let desc = EntityDesc::new(DVec2::new(x, 0.0), radius, 1.0, 1.0);
            let entity = Entity::new(format!("e{x}"), BodyId::new(0, 0), &desc).expect("valid");
            order.push(arena.insert(entity));
        }
        (arena, order)
    }

    #[test]
    fn grid_reports_only_nearby_slots_in_ascending_order() {
        let (arena, order) = arena(&[(0.0, 2.0), (5.0, 2.0), (500.0, 2.0), (3.0, 2.0)]);
        let mut broad_phase = BroadPhase::new(BroadPhaseMode::UniformGrid { cell_size: 10.0 });
        broad_phase.rebuild(&arena, &order);

        let mut out = Vec::new();
        broad_phase.candidates(0, &mut out);
        assert_eq!(out, vec![0, 1, 3]);
        broad_phase.candidates(2, &mut out);
        assert_eq!(out, vec![2]);
    }

    #[test]
    fn refresh_follows_moved_entities() {
        let (mut arena, order) = arena(&[(0.0, 2.0), (100.0, 2.0)]);
        let mut broad_phase = BroadPhase::new(BroadPhaseMode::UniformGrid { cell_size: 10.0 });
        broad_phase.rebuild(&arena, &order);

        let mut out = Vec::new();
        broad_phase.candidates(0, &mut out);
        assert_eq!(out, vec![0]);

        arena.get_mut(order[1]).expect("live").position = DVec2::new(3.0, 0.0);
        broad_phase.refresh(1, &arena, &order);
        broad_phase.candidates(0, &mut out);
        assert_eq!(out, vec![0, 1]);

        arena.remove(order[1]);
        broad_phase.refresh(1, &arena, &order);
        broad_phase.candidates(0, &mut out);
        assert_eq!(out, vec![0]);
    }

    #[test]
    fn huge_entities_go_to_the_overflow_list() {
        let (arena, order) = arena(&[(0.0, 1e6), (5_000.0, 1.0), (-9_000.0, 1.0)]);
        let mut grid = SpatialGrid::new(64.0);
        for (slot, id) in order.iter().enumerate() {
            let entity = arena.get(*id).expect("live");
            grid.insert(slot, entity.position, entity.radius());
        }

        assert_eq!(grid.oversized, vec![0]);
        assert!(grid.grid.values().map(Vec::len).sum::<usize>() <= 2 * 4);

        let mut out = Vec::new();
        grid.neighbours(1, &mut out);
        assert_eq!(out, vec![0, 1]);
        grid.neighbours(0, &mut out);
        assert_eq!(out, vec![0, 1, 2]);
    }
}
