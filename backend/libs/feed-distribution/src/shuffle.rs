//! Shared randomization for queue building and boosting.
//!
//! Every random decision in the crate goes through one [`Shuffler`], so a
//! fixed seed makes a whole distributor deterministic.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

#[derive(Debug)]
pub struct Shuffler {
    rng: Mutex<StdRng>,
}

impl Shuffler {
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn from_seed_option(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::seeded(seed),
            None => Self::from_entropy(),
        }
    }

    /// Uniform in-place permutation
    pub fn shuffle<T>(&self, items: &mut [T]) {
        if items.len() < 2 {
            return;
        }
        let mut rng = self.rng.lock();
        items.shuffle(&mut *rng);
    }
}

impl Default for Shuffler {
    fn default() -> Self {
        Self::from_entropy()
    }
}
