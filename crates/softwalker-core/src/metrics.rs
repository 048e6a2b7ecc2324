use crate::creature::Creature;
use crate::constants::GENOME_DIVERSITY_MAX_PAIRS;
use crate::genome::{GeneBounds, Genome, GenomeId, MuscleGene};
use crate::rng::derive_generation_rng;
use rand::Rng;
use std::f64::consts::{PI, TAU};

const DIVERSITY_STREAM: u64 = 0xD1_7E55;
use serde::{Deserialize, Serialize};

/// Scores of one finished generation.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct GenerationSummary {
    pub generation: u32,
    pub population_size: usize,
    pub best_fitness: f64,
    pub mean_fitness: f64,
    pub worst_fitness: f64,
    pub fitness_std: f64,
    /// Largest forward travel of any creature.
    pub best_distance: f64,
    pub dead_count: usize,
    pub reached_count: usize,
    pub best_genome_id: GenomeId,
    /// Mean pairwise L2 distance between gene vectors.
    pub genome_diversity: f64,
}

impl GenerationSummary {
    /// Summarise a scored population. Creatures must already carry their fitness.
    pub fn collect(generation: u32, creatures: &[Creature]) -> Self {
        let n = creatures.len();
        if n == 0 {
            return Self {
                generation,
                ..Self::default()
            };
        }
        let totals: Vec<f64> = creatures.iter().map(|c| c.fitness.total).collect();
        let mean = totals.iter().sum::<f64>() / n as f64;
        let variance = totals.iter().map(|t| (t - mean).powi(2)).sum::<f64>() / n as f64;
        let best = creatures
            .iter()
            .max_by(|a, b| a.fitness.total.total_cmp(&b.fitness.total));

        Self {
            generation,
            population_size: n,
            best_fitness: totals.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            mean_fitness: mean,
            worst_fitness: totals.iter().copied().fold(f64::INFINITY, f64::min),
            fitness_std: variance.sqrt(),
            best_distance: creatures
                .iter()
                .map(|c| c.fitness.distance)
                .fold(f64::NEG_INFINITY, f64::max),
            dead_count: creatures.iter().filter(|c| c.is_dead()).count(),
            reached_count: creatures.iter().filter(|c| c.motion.reached_target).count(),
            best_genome_id: best.map_or(0, |c| c.genome.id),
            genome_diversity: compute_genome_diversity(creatures, generation),
        }
    }
}

fn default_schema_version() -> u32 {
    1
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunSummary {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub seed: u64,
    pub generations: Vec<GenerationSummary>,
    /// Fittest genome seen across the whole run, with its score.
    #[serde(default)]
    pub best_genome: Option<Genome>,
    #[serde(default)]
    pub best_fitness: f64,
    /// Generations whose evolution pass fell back to the in-process path.
    #[serde(default)]
    pub evolution_fallbacks: usize,
}

impl RunSummary {
    pub fn new(seed: u64) -> Self {
        Self {
            schema_version: default_schema_version(),
            seed,
            generations: Vec::new(),
            best_genome: None,
            best_fitness: 0.0,
            evolution_fallbacks: 0,
        }
    }

    /// Append a generation and keep the all-time best genome.
    pub fn record(&mut self, summary: GenerationSummary, creatures: &[Creature]) {
        if let Some(best) = creatures
            .iter()
            .max_by(|a, b| a.fitness.total.total_cmp(&b.fitness.total))
        {
            if self.best_genome.is_none() || best.fitness.total > self.best_fitness {
                self.best_fitness = best.fitness.total;
                self.best_genome = Some(best.genome.clone());
            }
        }
        self.generations.push(summary);
    }
}

/// Normalised difference between two gait genomes, in `[0, 1]`.
///
/// Amplitude and frequency differences are scaled by their legal ranges.
/// Phase is compared on the circle, so `0.1` and `TAU - 0.1` are close.
fn gait_distance(a: &[MuscleGene], b: &[MuscleGene]) -> f64 {
    let bounds = GeneBounds::LEGAL;
    let amplitude_span = bounds.amplitude.1 - bounds.amplitude.0;
    let frequency_span = bounds.frequency.1 - bounds.frequency.0;
    let genes = a.len().min(b.len());
    if genes == 0 {
        return 0.0;
    }
    let sum: f64 = a
        .iter()
        .zip(b)
        .map(|(x, y)| {
            let amplitude = (x.amplitude - y.amplitude) / amplitude_span;
            let frequency = (x.frequency - y.frequency) / frequency_span;
            let wrapped = (x.phase - y.phase).rem_euclid(TAU);
            let phase = wrapped.min(TAU - wrapped) / PI;
            (amplitude * amplitude + frequency * frequency + phase * phase) / 3.0
        })
        .sum();
    (sum / genes as f64).sqrt()
}

/// Mean pairwise gait distance. Large populations are sampled with a stream
/// keyed on the generation so summaries stay reproducible.
fn compute_genome_diversity(creatures: &[Creature], generation: u32) -> f64 {
    let n = creatures.len();
    if n < 2 {
        return 0.0;
    }
    let genes = |i: usize| creatures[i].genome.genes.as_slice();
    let max_pairs = GENOME_DIVERSITY_MAX_PAIRS;

    let pairs: Vec<(usize, usize)> = if n * (n - 1) / 2 <= max_pairs {
        (0..n)
            .flat_map(|i| ((i + 1)..n).map(move |j| (i, j)))
            .collect()
    } else {
        let mut rng = derive_generation_rng(DIVERSITY_STREAM, generation);
        (0..max_pairs)
            .map(|_| {
                let i = rng.random_range(0..n);
                let j = (i + rng.random_range(1..n)) % n;
                (i, j)
            })
            .collect()
    };
    pairs
        .iter()
        .map(|&(i, j)| gait_distance(genes(i), genes(j)))
        .sum::<f64>()
        / pairs.len() as f64
}
