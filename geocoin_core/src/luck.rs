use rand::{Rng, SeedableRng, rngs::StdRng};

/// Deterministic pseudo-random draw in `[0, 1)` for a string seed.
///
/// The seed string is reduced with FNV-1a and fed to a seeded
/// generator, so the same seed yields the same value on every call and
/// across process restarts. Cache inventories derive from this, which
/// is what makes worlds reproducible without storing anything.
pub fn luck(seed: &str) -> f64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in seed.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    StdRng::seed_from_u64(hash).random::<f64>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_value() {
        assert_eq!(luck("cache-7"), luck("cache-7"));
    }

    #[test]
    fn values_stay_in_unit_interval() {
        for label in 0..200 {
            let value = luck(&format!("cache-{label}"));
            assert!((0.0..1.0).contains(&value));
        }
    }

    #[test]
    fn different_seeds_diverge() {
        // Not a hash-quality test; just a guard against the seed being
        // ignored entirely.
        assert_ne!(luck("cache-0"), luck("cache-1"));
    }
}
