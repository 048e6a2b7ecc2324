use super::EvolutionError;
use crate::genome::{GeneBounds, MuscleGene};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Crossover family used to build offspring genes.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CrossoverKind {
    /// Whole genes copied from either parent; `fitter_bias` is the chance of
    /// taking the first (fitter) parent's gene.
    Uniform { fitter_bias: f64 },
    /// Component-wise `alpha * p1 + (1 - alpha) * p2`.
    Arithmetic { alpha: f64 },
    /// Simulated binary crossover with distribution index `eta`.
    Sbx { eta: f64 },
}

impl Default for CrossoverKind {
    fn default() -> Self {
        CrossoverKind::Sbx { eta: 10.0 }
    }
}

/// Both parents must list the same muscles in the same order.
fn check_arity(p1: &[MuscleGene], p2: &[MuscleGene]) -> Result<(), EvolutionError> {
    let mismatch = p1
        .iter()
        .zip(p2)
        .position(|(a, b)| a.muscle_id != b.muscle_id);
    if p1.len() != p2.len() || mismatch.is_some() {
        return Err(EvolutionError::CrossoverArity {
            left: p1.len(),
            right: p2.len(),
            first_mismatch: mismatch,
        });
    }
    Ok(())
}

pub fn crossover<R: Rng + ?Sized>(
    kind: CrossoverKind,
    p1: &[MuscleGene],
    p2: &[MuscleGene],
    rng: &mut R,
) -> Result<Vec<MuscleGene>, EvolutionError> {
    match kind {
        CrossoverKind::Uniform { fitter_bias } => uniform(p1, p2, fitter_bias, rng),
        CrossoverKind::Arithmetic { alpha } => arithmetic(p1, p2, alpha),
        CrossoverKind::Sbx { eta } => sbx(p1, p2, eta, rng),
    }
}

pub fn uniform<R: Rng + ?Sized>(
    p1: &[MuscleGene],
    p2: &[MuscleGene],
    fitter_bias: f64,
    rng: &mut R,
) -> Result<Vec<MuscleGene>, EvolutionError> {
    check_arity(p1, p2)?;
    Ok(p1
        .iter()
        .zip(p2)
        .map(|(a, b)| if rng.random::<f64>() < fitter_bias { *a } else { *b })
        .collect())
}

pub fn arithmetic(
    p1: &[MuscleGene],
    p2: &[MuscleGene],
    alpha: f64,
) -> Result<Vec<MuscleGene>, EvolutionError> {
    check_arity(p1, p2)?;
    let blend = |x: f64, y: f64| alpha * x + (1.0 - alpha) * y;
    Ok(p1
        .iter()
        .zip(p2)
        .map(|(a, b)| MuscleGene {
            muscle_id: a.muscle_id,
            amplitude: blend(a.amplitude, b.amplitude),
            frequency: blend(a.frequency, b.frequency),
            phase: blend(a.phase, b.phase),
        })
        .collect())
}

pub fn sbx<R: Rng + ?Sized>(
    p1: &[MuscleGene],
    p2: &[MuscleGene],
    eta: f64,
    rng: &mut R,
) -> Result<Vec<MuscleGene>, EvolutionError> {
    check_arity(p1, p2)?;
    let b = GeneBounds::LEGAL;
    Ok(p1
        .iter()
        .zip(p2)
        .map(|(a, c)| MuscleGene {
            muscle_id: a.muscle_id,
            amplitude: sbx_component(a.amplitude, c.amplitude, eta, b.amplitude, rng),
            frequency: sbx_component(a.frequency, c.frequency, eta, b.frequency, rng),
            phase: sbx_component(a.phase, c.phase, eta, b.phase, rng),
        })
        .collect())
}

fn sbx_component<R: Rng + ?Sized>(
    x1: f64,
    x2: f64,
    eta: f64,
    (lo, hi): (f64, f64),
    rng: &mut R,
) -> f64 {
    let u: f64 = rng.random();
    let exponent = 1.0 / (eta + 1.0);
    let beta = if u <= 0.5 {
        (2.0 * u).powf(exponent)
    } else {
        (1.0 / (2.0 * (1.0 - u))).powf(exponent)
    };
    let child = if rng.random_bool(0.5) {
        0.5 * ((1.0 + beta) * x1 + (1.0 - beta) * x2)
    } else {
        0.5 * ((1.0 - beta) * x1 + (1.0 + beta) * x2)
    };
    child.clamp(lo, hi)
}
