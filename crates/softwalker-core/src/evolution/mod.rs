//! Genetic algorithm over muscle genomes: scoring, ranking, selection,
//! crossover, mutation and generation advance.

pub mod crossover;
pub mod fitness;
pub mod selection;

use crate::creature::Creature;
use crate::genome::{Genome, GenomeId, MutationParams};
use crossover::CrossoverKind;
use fitness::FitnessScore;
use rand::Rng;
use selection::{tournament_select, RankedPopulation};
use serde::{Deserialize, Serialize};
use std::{error::Error, fmt};

/// A genome paired with the fitness its creature earned.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoredGenome {
    pub genome: Genome,
    pub fitness: FitnessScore,
}

impl From<&Creature> for ScoredGenome {
    fn from(creature: &Creature) -> Self {
        Self {
            genome: creature.genome.clone(),
            fitness: creature.fitness,
        }
    }
}

/// GA parameters; this is the `config` half of a worker request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionConfig {
    pub population_size: usize,
    /// Genomes copied unchanged into the next generation.
    pub elite_count: usize,
    /// Fraction of the ranked population eligible as parents.
    pub parent_fraction: f64,
    pub tournament_size: usize,
    pub crossover: CrossoverKind,
    pub mutation: MutationParams,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            population_size: 50,
            elite_count: 2,
            parent_fraction: 0.5,
            tournament_size: 3,
            crossover: CrossoverKind::default(),
            mutation: MutationParams::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EvolutionError {
    EmptySelection,
    CrossoverArity {
        left: usize,
        right: usize,
        first_mismatch: Option<usize>,
    },
}

impl fmt::Display for EvolutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvolutionError::EmptySelection => write!(f, "selection on an empty pool"),
            EvolutionError::CrossoverArity {
                left,
                right,
                first_mismatch: Some(index),
            } => write!(
                f,
                "parent genes are misordered at index {index} (lengths {left} and {right})"
            ),
            EvolutionError::CrossoverArity {
                left,
                right,
                first_mismatch: None,
            } => write!(f, "parent gene lists differ in length ({left} vs {right})"),
        }
    }
}

impl Error for EvolutionError {}

/// Seed a generation-zero population, one gene per muscle id.
pub fn seed_population<R: Rng + ?Sized>(
    size: usize,
    muscle_ids: &[crate::body::ConstraintId],
    rng: &mut R,
) -> Vec<Genome> {
    (0..size)
        .map(|i| Genome::random(i as GenomeId, muscle_ids.iter().copied(), 0, rng))
        .collect()
}

/// Build the next generation's genomes: elites first, then tournament-picked
/// parents crossed and mutated until `population_size` is reached.
pub fn evolve<R: Rng + ?Sized>(
    population: Vec<ScoredGenome>,
    config: &EvolutionConfig,
    rng: &mut R,
) -> Result<Vec<Genome>, EvolutionError> {
    if population.is_empty() {
        return Err(EvolutionError::EmptySelection);
    }
    let generation = population
        .iter()
        .map(|s| s.genome.generation)
        .max()
        .unwrap_or(0);
    let mut next_id = population
        .iter()
        .map(|s| s.genome.id)
        .max()
        .map_or(0, |id| id + 1);

    let ranked = RankedPopulation::new(population);
    let mut next: Vec<Genome> = ranked
        .select_elites(config.elite_count.min(config.population_size))
        .iter()
        .map(|s| s.genome.clone())
        .collect();

    let pool = ranked.mating_pool(config.parent_fraction);
    while next.len() < config.population_size {
        let a = tournament_select(pool, config.tournament_size, rng)?;
        let b = tournament_select(pool, config.tournament_size, rng)?;
        let (fitter, other) = if b.fitness.total > a.fitness.total {
            (b, a)
        } else {
            (a, b)
        };
        let genes = crossover::crossover(
            config.crossover,
            &fitter.genome.genes,
            &other.genome.genes,
            rng,
        )?;
        let mut child = Genome::new(next_id, genes, generation + 1);
        child.parent_ids = vec![fitter.genome.id, other.genome.id];
        child.mutate(rng, &config.mutation);
        next.push(child);
        next_id += 1;
    }
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::create_rng;

    fn scored_population(size: usize, seed: u64) -> Vec<ScoredGenome> {
        let mut rng = create_rng(seed);
        seed_population(size, &[0, 1, 2, 3], &mut rng)
            .into_iter()
            .enumerate()
            .map(|(i, genome)| ScoredGenome {
                genome,
                fitness: FitnessScore {
                    total: i as f64 * 10.0,
                    ..FitnessScore::default()
                },
            })
            .collect()
    }

    #[test]
    fn next_generation_has_elites_then_offspring() {
        let population = scored_population(10, 1);
        let best = population[9].genome.clone();
        let config = EvolutionConfig {
            population_size: 10,
            elite_count: 2,
            ..EvolutionConfig::default()
        };
        let next = evolve(population, &config, &mut create_rng(2)).expect("non-empty");
        assert_eq!(next.len(), 10);
        assert_eq!(next[0], best);
        assert_eq!(next[1].id, 8);
        for child in &next[2..] {
            assert_eq!(child.generation, 1);
            assert_eq!(child.parent_ids.len(), 2);
            assert_eq!(child.genes.len(), 4);
            assert!(child.id >= 10);
        }
    }

    #[test]
    fn evolve_is_deterministic_for_fixed_seed() {
        let config = EvolutionConfig {
            population_size: 12,
            ..EvolutionConfig::default()
        };
        let a = evolve(scored_population(12, 4), &config, &mut create_rng(8)).expect("ok");
        let b = evolve(scored_population(12, 4), &config, &mut create_rng(8)).expect("ok");
        let genes = |g: &[Genome]| g.iter().map(|g| g.genes.clone()).collect::<Vec<_>>();
        assert_eq!(genes(&a), genes(&b));
    }

    #[test]
    fn empty_population_is_an_error() {
        let err = evolve(Vec::new(), &EvolutionConfig::default(), &mut create_rng(0)).unwrap_err();
        assert_eq!(err, EvolutionError::EmptySelection);
    }

    #[test]
    fn mixed_lineages_fail_crossover() {
        let mut population = scored_population(4, 3);
        population[3].genome.genes.pop();
        let config = EvolutionConfig {
            population_size: 20,
            elite_count: 0,
            parent_fraction: 1.0,
            ..EvolutionConfig::default()
        };
        let result = evolve(population, &config, &mut create_rng(5));
        assert!(matches!(result, Err(EvolutionError::CrossoverArity { .. })));
    }
}
