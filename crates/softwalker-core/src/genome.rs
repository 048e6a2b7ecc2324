use crate::body::{ConstraintId, Muscle};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;
use std::time::{SystemTime, UNIX_EPOCH};

pub type GenomeId = u64;

/// Oscillation parameters for one muscle.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MuscleGene {
    pub muscle_id: ConstraintId,
    pub amplitude: f64,
    pub frequency: f64,
    pub phase: f64,
}

/// Legal range of each gene field, shared by seeding, mutation and SBX.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeneBounds {
    pub amplitude: (f64, f64),
    pub frequency: (f64, f64),
    pub phase: (f64, f64),
}

impl GeneBounds {
    pub const LEGAL: GeneBounds = GeneBounds {
        amplitude: (0.05, 0.8),
        frequency: (0.1, 5.0),
        phase: (0.0, TAU),
    };

    /// Ranges sampled when seeding generation zero.
    pub const SEED: GeneBounds = GeneBounds {
        amplitude: (0.1, 0.5),
        frequency: (0.5, 2.0),
        phase: (0.0, TAU),
    };
}

impl MuscleGene {
    pub fn random<R: Rng + ?Sized>(muscle_id: ConstraintId, rng: &mut R) -> Self {
        let s = GeneBounds::SEED;
        Self {
            muscle_id,
            amplitude: rng.random_range(s.amplitude.0..=s.amplitude.1),
            frequency: rng.random_range(s.frequency.0..=s.frequency.1),
            phase: rng.random_range(s.phase.0..=s.phase.1),
        }
        .clamped()
    }

    pub fn clamped(self) -> Self {
        let b = GeneBounds::LEGAL;
        Self {
            muscle_id: self.muscle_id,
            amplitude: self.amplitude.clamp(b.amplitude.0, b.amplitude.1),
            frequency: self.frequency.clamp(b.frequency.0, b.frequency.1),
            phase: self.phase.clamp(b.phase.0, b.phase.1),
        }
    }

    pub fn is_within_bounds(&self) -> bool {
        let b = GeneBounds::LEGAL;
        (b.amplitude.0..=b.amplitude.1).contains(&self.amplitude)
            && (b.frequency.0..=b.frequency.1).contains(&self.frequency)
            && (b.phase.0..=b.phase.1).contains(&self.phase)
    }
}

/// Ordered per-muscle oscillation parameters (one gene per topology muscle).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Genome {
    pub id: GenomeId,
    pub genes: Vec<MuscleGene>,
    pub generation: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parent_ids: Vec<GenomeId>,
    /// Unix milliseconds; informational only.
    #[serde(default)]
    pub created_at: u64,
}

impl Genome {
    pub fn new(id: GenomeId, genes: Vec<MuscleGene>, generation: u32) -> Self {
        Self {
            id,
            genes,
            generation,
            parent_ids: Vec::new(),
            created_at: now_unix_ms(),
        }
    }

    pub fn random<R: Rng + ?Sized>(
        id: GenomeId,
        muscle_ids: impl IntoIterator<Item = ConstraintId>,
        generation: u32,
        rng: &mut R,
    ) -> Self {
        let genes = muscle_ids
            .into_iter()
            .map(|muscle_id| MuscleGene::random(muscle_id, rng))
            .collect();
        Self::new(id, genes, generation)
    }

    /// Perturb each field of a selected gene by a relative delta in
    /// `[-strength, strength]`, then clamp to the legal bounds.
    pub fn mutate<R: Rng + ?Sized>(&mut self, rng: &mut R, params: &MutationParams) {
        for gene in &mut self.genes {
            if rng.random::<f64>() >= params.rate {
                continue;
            }
            let s = params.strength;
            gene.amplitude += gene.amplitude * rng.random_range(-s..=s);
            gene.frequency += gene.frequency * rng.random_range(-s..=s);
            gene.phase += gene.phase * rng.random_range(-s..=s);
            *gene = gene.clamped();
        }
    }

    /// Copy this genome's oscillation parameters onto a body's muscles.
    /// Genes and muscles are matched by position; a gene whose id does not
    /// match its muscle leaves that muscle untouched.
    pub fn apply_to(&self, muscles: &mut [Muscle]) {
        for (muscle, gene) in muscles.iter_mut().zip(&self.genes) {
            if muscle.id() != gene.muscle_id {
                continue;
            }
            muscle.amplitude = gene.amplitude;
            muscle.frequency = gene.frequency;
            muscle.phase = gene.phase;
        }
    }

    /// True when the genes name exactly `muscle_ids`, in that order.
    pub fn drives_muscles<I>(&self, muscle_ids: I) -> bool
    where
        I: IntoIterator<Item = ConstraintId>,
        I::IntoIter: ExactSizeIterator,
    {
        let ids = muscle_ids.into_iter();
        self.genes.len() == ids.len()
            && self.genes.iter().zip(ids).all(|(gene, id)| gene.muscle_id == id)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MutationParams {
    /// Per-gene probability of mutating.
    pub rate: f64,
    /// Maximum relative perturbation per field.
    pub strength: f64,
}

impl Default for MutationParams {
    fn default() -> Self {
        Self {
            rate: 0.1,
            strength: 0.2,
        }
    }
}

pub(crate) fn now_unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
