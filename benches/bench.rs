mod insert;
mod query;

use criterion::{criterion_group, criterion_main};
use flowspace::Interval;

criterion_main!(benches);
criterion_group!(benches, insert::bench, query::bench);

/// Linear-feedback shift register based PRNG.
///
/// Generates 65,535 unique values before cycling.
#[derive(Debug, Clone)]
pub struct Lfsr(u16);

impl Default for Lfsr {
    fn default() -> Self {
        Self(42)
    }
}

impl Lfsr {
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> u16 {
        let lsb = self.0 & 1;
        self.0 >>= 1;
        if lsb == 1 {
            self.0 ^= 0xD008;
        }
        assert_ne!(self.0, 42, "LFSR rollover");
        self.0
    }

    /// A random, valid interval.
    pub fn next_interval(&mut self) -> Interval<u16> {
        let a = self.next();
        let b = self.next();
        Interval::new(a, b)
    }
}
