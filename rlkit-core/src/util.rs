//! Seeding of the random number generators of an experiment.
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Derives independent seeds from a master seed.
///
/// Components such as the replay buffer, the environments and the agent
/// each take a seed from the same [`Seeder`], so that an experiment is
/// reproduced by its master seed alone.
#[derive(Debug, Clone)]
pub struct Seeder {
    rng: StdRng,
}

impl Seeder {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn generate_seed(&mut self) -> u64 {
        self.rng.gen::<u32>() as u64
    }

    pub fn generate_seeds(&mut self, n: usize) -> Vec<u64> {
        (0..n).map(|_| self.generate_seed()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::Seeder;

    #[test]
    fn test_seeds_are_reproducible() {
        let seeds1 = Seeder::new(7).generate_seeds(4);
        let seeds2 = Seeder::new(7).generate_seeds(4);
        assert_eq!(seeds1, seeds2);
        assert_ne!(seeds1, Seeder::new(8).generate_seeds(4));
    }
}
