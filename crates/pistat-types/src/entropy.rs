//! Small deterministic pseudo-random source.
//!
//! Used for cosmetic jitter only (ping latency, tween durations). A fixed
//! seed makes the sequence reproducible.

/// Knuth multiplicative hash constant.
const HASH_MULT: u32 = 2_654_435_761;

fn hash_step(seed: u32) -> u32 {
    let mut h = seed.wrapping_mul(HASH_MULT);
    h ^= h >> 16;
    h = h.wrapping_mul(0x45d9f3b);
    h ^= h >> 16;
    h
}

/// Counter-mode hash generator.
#[derive(Debug, Clone)]
pub struct Entropy {
    seed: u32,
    counter: u32,
}

impl Entropy {
    pub fn new(seed: u32) -> Self {
        Self { seed, counter: 0 }
    }

    /// Seed from the wall clock.
    pub fn from_clock() -> Self {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.subsec_nanos() ^ d.as_secs() as u32)
            .unwrap_or(0x5EED);
        Self::new(nanos)
    }

    pub fn next_u32(&mut self) -> u32 {
        self.counter = self.counter.wrapping_add(1);
        hash_step(self.seed ^ self.counter.wrapping_mul(HASH_MULT))
    }

    /// Uniform-ish value in `[0.0, 1.0)`.
    pub fn next_f32(&mut self) -> f32 {
        (self.next_u32() >> 8) as f32 / 16_777_216.0
    }

    /// Value in the inclusive range `lo..=hi`. Returns `lo` if `hi < lo`.
    pub fn range(&mut self, lo: u64, hi: u64) -> u64 {
        if hi <= lo {
            return lo;
        }
        let span = (hi - lo).saturating_add(1);
        lo + u64::from(self.next_u32()) % span
    }
}
