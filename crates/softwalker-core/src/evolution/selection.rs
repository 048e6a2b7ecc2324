use super::{EvolutionError, ScoredGenome};
use rand::Rng;

/// Population sorted once, best first, by `fitness.total`.
#[derive(Clone, Debug)]
pub struct RankedPopulation {
    members: Vec<ScoredGenome>,
}

impl RankedPopulation {
    pub fn new(mut members: Vec<ScoredGenome>) -> Self {
        members.sort_by(|a, b| b.fitness.total.total_cmp(&a.fitness.total));
        Self { members }
    }

    /// The top `min(n, len)` members.
    pub fn select_elites(&self, n: usize) -> &[ScoredGenome] {
        &self.members[..n.min(self.members.len())]
    }

    /// Top `fraction` of the population, never fewer than one member when
    /// the population is non-empty.
    pub fn mating_pool(&self, fraction: f64) -> &[ScoredGenome] {
        let len = self.members.len();
        let wanted = (len as f64 * fraction.clamp(0.0, 1.0)).ceil() as usize;
        &self.members[..wanted.clamp(len.min(1), len)]
    }
}

/// Sample `size` members uniformly with replacement and keep the fittest.
pub fn tournament_select<'a, R: Rng + ?Sized>(
    pool: &'a [ScoredGenome],
    size: usize,
    rng: &mut R,
) -> Result<&'a ScoredGenome, EvolutionError> {
    if pool.is_empty() {
        return Err(EvolutionError::EmptySelection);
    }
    let len = pool.len();
    let mut best = &pool[rng.random_range(0..len)];
    for _ in 1..size.max(1) {
        let candidate = &pool[rng.random_range(0..len)];
        if candidate.fitness.total > best.fitness.total {
            best = candidate;
        }
    }
    Ok(best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evolution::fitness::FitnessScore;
    use crate::genome::Genome;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha12Rng;

    fn scored(id: u64, total: f64) -> ScoredGenome {
        ScoredGenome {
            genome: Genome::new(id, Vec::new(), 0),
            fitness: FitnessScore {
                total,
                ..FitnessScore::default()
            },
        }
    }

    fn population(totals: &[f64]) -> Vec<ScoredGenome> {
        totals
            .iter()
            .enumerate()
            .map(|(i, &t)| scored(i as u64, t))
            .collect()
    }

    #[test]
    fn elites_are_top_n_in_descending_order() {
        let ranked = RankedPopulation::new(population(&[3.0, -1.0, 9.0, 4.0, 0.5]));
        let elites = ranked.select_elites(3);
        let totals: Vec<f64> = elites.iter().map(|s| s.fitness.total).collect();
        assert_eq!(totals, vec![9.0, 4.0, 3.0]);
        assert_eq!(ranked.select_elites(10).len(), 5);
        assert!(ranked.select_elites(0).is_empty());
    }

    #[test]
    fn mating_pool_keeps_at_least_one() {
        let ranked = RankedPopulation::new(population(&[1.0, 2.0, 3.0, 4.0]));
        assert_eq!(ranked.mating_pool(0.5).len(), 2);
        assert_eq!(ranked.mating_pool(0.0).len(), 1);
        assert_eq!(ranked.mating_pool(1.0).len(), 4);
        assert!(RankedPopulation::new(Vec::new()).mating_pool(0.5).is_empty());
    }

    #[test]
    fn tournament_on_empty_pool_fails() {
        let mut rng = ChaCha12Rng::seed_from_u64(0);
        assert!(matches!(
            tournament_select(&[], 3, &mut rng),
            Err(EvolutionError::EmptySelection)
        ));
    }

    #[test]
    fn size_one_tournament_is_uniform_pick() {
        let pool = population(&[1.0, 2.0]);
        let mut rng = ChaCha12Rng::seed_from_u64(4);
        let picks: Vec<u64> = (0..64)
            .map(|_| tournament_select(&pool, 1, &mut rng).expect("pool").genome.id)
            .collect();
        assert!(picks.contains(&0) && picks.contains(&1));
    }

    proptest! {
        #[test]
        fn tournament_never_beats_its_sample(
            totals in proptest::collection::vec(-100.0f64..100.0, 1..20),
            size in 1usize..6,
            seed in any::<u64>(),
        ) {
            let pool = population(&totals);
            // Replay the draws to learn which members were sampled.
            let mut replay = ChaCha12Rng::seed_from_u64(seed);
            let sampled: Vec<f64> = (0..size)
                .map(|_| pool[replay.random_range(0..pool.len())].fitness.total)
                .collect();
            let mut rng = ChaCha12Rng::seed_from_u64(seed);
            let winner = tournament_select(&pool, size, &mut rng).expect("non-empty pool");
            let best = sampled.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let worst = sampled.iter().copied().fold(f64::INFINITY, f64::min);
            prop_assert_eq!(winner.fitness.total, best);
            prop_assert!(winner.fitness.total >= worst);
        }
    }
}
