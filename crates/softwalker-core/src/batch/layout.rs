use crate::creature::MotionState;
use crate::topology::Topology;
use std::ops::Range;

/// Fixed-stride layout of a batch arena.
///
/// Creature `slot` owns particle records `particle_range(slot)` and muscle
/// records `muscle_range(slot)`; both strides come from the shared topology,
/// so record `k` of every slot is the same topology particle / muscle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatchLayout {
    pub creature_count: usize,
    /// Particle records per creature.
    pub particle_stride: usize,
    /// Muscle records per creature.
    pub muscle_stride: usize,
}

impl BatchLayout {
    pub fn for_topology(topology: &Topology, creature_count: usize) -> Self {
        Self {
            creature_count,
            particle_stride: topology.particle_count(),
            muscle_stride: topology.muscle_count(),
        }
    }

    pub fn particle_range(&self, slot: usize) -> Range<usize> {
        let start = slot * self.particle_stride;
        start..start + self.particle_stride
    }

    pub fn muscle_range(&self, slot: usize) -> Range<usize> {
        let start = slot * self.muscle_stride;
        start..start + self.muscle_stride
    }

    pub fn particle_records(&self) -> usize {
        self.creature_count * self.particle_stride
    }

    pub fn muscle_records(&self) -> usize {
        self.creature_count * self.muscle_stride
    }
}

/// Per-creature metadata record: status, progress and gait counters, plus the
/// slot of the head particle inside the creature's particle region.
#[derive(Clone, Debug, PartialEq)]
pub struct SlotMeta {
    pub motion: MotionState,
    pub head_slot: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_tile_the_arena_without_overlap() {
        let topology = Topology::biped();
        let layout = BatchLayout::for_topology(&topology, 3);
        assert_eq!(layout.particle_stride, 9);
        assert_eq!(layout.muscle_stride, 4);
        assert_eq!(layout.particle_range(0), 0..9);
        assert_eq!(layout.particle_range(2), 18..27);
        assert_eq!(layout.muscle_range(1), 4..8);
        assert_eq!(layout.particle_records(), 27);
        assert_eq!(layout.muscle_records(), 12);
    }
}
