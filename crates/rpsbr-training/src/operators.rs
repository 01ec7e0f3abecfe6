//! Strategy operators for the genetic algorithm.
//!
//! These functions create, combine and perturb [`Strategy`] values. They are used by
//! [`GeneticAlgorithm`](crate::genetic::GeneticAlgorithm) to implement initialization,
//! crossover and mutation, and take the random number generator explicitly so that
//! seeded runs are reproducible.
//!
//! # Operations
//!
//! - **Initialization**: [`random`] samples each parameter uniformly from its sampling range
//! - **Crossover**: [`uniform_crossover`] picks every parameter from either parent
//! - **Mutation**: [`gaussian_mutation`] perturbs every parameter with per-parameter σ
//!
//! Every result is clamped back into the legal parameter ranges by the [`Strategy`]
//! constructors.

use rand::Rng;
use rand_distr::StandardNormal;

use crate::strategy::{Param, Strategy};

/// Generates a random, unevaluated strategy.
///
/// Each parameter is sampled independently and uniformly from
/// [`Param::sampling_range`].
pub fn random<R>(rng: &mut R, generation: u32) -> Strategy
where
    R: Rng + ?Sized,
{
    Strategy::from_fn(|p| rng.random_range(p.sampling_range()), generation)
}

/// Produces one child by uniform crossover.
///
/// Each of the six parameters is taken from `p1` or `p2` with equal probability,
/// independently per parameter. The child is unevaluated and tagged with
/// `generation`.
///
/// # Examples
///
/// ```
/// use rpsbr_training::{operators, strategy::{Param, Strategy}};
///
/// let p1 = Strategy::new([0.0, 0.0, 0.0, 0.5, 50.0, 0.0], 0);
/// let p2 = Strategy::new([1.0, 1.0, 1.0, 2.0, 150.0, 1.0], 0);
/// let child = operators::uniform_crossover(&p1, &p2, 1, &mut rand::rng());
/// for p in Param::ALL {
///     assert!(child.param(p) == p1.param(p) || child.param(p) == p2.param(p));
/// }
/// assert_eq!(child.generation(), 1);
/// ```
pub fn uniform_crossover<R>(p1: &Strategy, p2: &Strategy, generation: u32, rng: &mut R) -> Strategy
where
    R: Rng + ?Sized,
{
    Strategy::from_fn(
        |p| {
            if rng.random_bool(0.5) {
                p1.param(p)
            } else {
                p2.param(p)
            }
        },
        generation,
    )
}

/// Applies Gaussian mutation to every parameter.
///
/// For each parameter:
///
/// 1. Sample a perturbation from `N(0, σ)` with σ from [`Param::mutation_sigma`]
/// 2. Add it to the current value
/// 3. Clamp the result into [`Param::legal_range`]
///
/// The generation tag is preserved and the result is unevaluated.
pub fn gaussian_mutation<R>(strategy: &Strategy, rng: &mut R) -> Strategy
where
    R: Rng + ?Sized,
{
    Strategy::from_fn(
        |p| {
            let noise: f64 = rng.sample(StandardNormal);
            strategy.param(p) + noise * p.mutation_sigma()
        },
        strategy.generation(),
    )
}

/// Returns whether every parameter lies inside its legal range.
#[must_use]
pub fn is_within_bounds(strategy: &Strategy) -> bool {
    Param::ALL
        .into_iter()
        .all(|p| p.legal_range().contains(&strategy.param(p)))
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng as _;
    use rand_pcg::Pcg32;

    use super::*;

    #[test]
    fn test_random_within_sampling_range() {
        for seed in 0..20 {
            let mut rng = Pcg32::seed_from_u64(seed);
            let s = random(&mut rng, 2);
            for p in Param::ALL {
                assert!(p.sampling_range().contains(&s.param(p)), "{}", p.name());
            }
            assert_eq!(s.generation(), 2);
            assert!(s.is_unevaluated());
        }
    }

    #[test]
    fn test_mutation_stays_within_bounds() {
        for seed in 0..50 {
            let mut rng = Pcg32::seed_from_u64(seed);
            let mut s = random(&mut rng, 0);
            // repeated mutation drifts toward the edges, clamping keeps it legal
            for _ in 0..200 {
                s = gaussian_mutation(&s, &mut rng);
                assert!(is_within_bounds(&s));
            }
            assert_eq!(s.generation(), 0);
        }
    }

    #[test]
    fn test_mutation_resets_fitness() {
        let mut rng = Pcg32::seed_from_u64(1);
        let s = random(&mut rng, 5).with_fitness(42.0);
        let m = gaussian_mutation(&s, &mut rng);
        assert!(m.is_unevaluated());
        assert_eq!(m.generation(), 5);
    }

    #[test]
    fn test_crossover_mixes_parents() {
        let p1 = Strategy::new([0.0, 0.0, 0.0, 0.5, 50.0, 0.0], 0);
        let p2 = Strategy::new([1.0, 1.0, 1.0, 2.0, 150.0, 1.0], 0);
        let mut rng = Pcg32::seed_from_u64(3);
        let mut took_from_both = false;
        for _ in 0..20 {
            let child = uniform_crossover(&p1, &p2, 1, &mut rng);
            assert!(is_within_bounds(&child));
            let from_p1 = Param::ALL
                .into_iter()
                .filter(|&p| child.param(p) == p1.param(p))
                .count();
            took_from_both |= from_p1 > 0 && from_p1 < Param::LEN;
        }
        assert!(took_from_both);
    }
}
