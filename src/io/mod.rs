//! Randomness abstraction shared by production code and simulation tests.
//!
//! Anything that makes a random decision (run id entropy, fault injection)
//! takes an `Rng` so simulation runs replay exactly from a seed.

pub mod simulation;

pub use simulation::SimulatedRng;

/// Source of randomness
pub trait Rng: Send + 'static {
    fn next_u64(&mut self) -> u64;

    /// Uniform value in `[min, max)`; returns `min` when the range is empty
    fn gen_range(&mut self, min: u64, max: u64) -> u64 {
        if min >= max {
            return min;
        }
        min + (self.next_u64() % (max - min))
    }

    fn gen_bool(&mut self, probability: f64) -> bool {
        let val = self.next_u64() as f64 / u64::MAX as f64;
        val < probability
    }
}

pub mod production {
    use super::Rng;
    use rand::rngs::StdRng;
    use rand::{RngCore, SeedableRng};

    /// OS-seeded RNG for production use
    pub struct ProductionRng {
        inner: StdRng,
    }

    impl ProductionRng {
        pub fn new() -> Self {
            ProductionRng {
                inner: StdRng::from_entropy(),
            }
        }
    }

    impl Default for ProductionRng {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Rng for ProductionRng {
        fn next_u64(&mut self) -> u64 {
            self.inner.next_u64()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::production::ProductionRng;
    use super::*;

    #[test]
    fn test_gen_range_bounds() {
        let mut rng = ProductionRng::new();
        for _ in 0..1000 {
            let v = rng.gen_range(10, 20);
            assert!((10..20).contains(&v));
        }
        assert_eq!(rng.gen_range(5, 5), 5);
        assert_eq!(rng.gen_range(7, 3), 7);
    }

    #[test]
    fn test_gen_bool_extremes() {
        let mut rng = ProductionRng::new();
        assert!((0..100).all(|_| !rng.gen_bool(0.0)));
        assert!((0..100).all(|_| rng.gen_bool(1.01)));
    }
}
