/// Linear congruential identifier generators
///
/// A full-period LCG walks the whole 64-bit space without repeating, which
/// makes it a restart-safe unique-ID source: seed it with the persisted
/// per-install value, skip ahead by the number of rows already inserted,
/// and it continues exactly where the previous process stopped.

/// 64-bit generator. The multiplier satisfies the full-period conditions
/// for modulus 2^64 (a ≡ 1 mod 4, c odd), so every value is emitted exactly
/// once per 2^64 steps.
///
/// Not safe for concurrent use; callers serialize access themselves.
#[derive(Debug, Clone)]
pub struct Lcg {
    state: u64,
    a: u64,
    c: u64,
}

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self {
            state: seed,
            a: 6364136223846793005,
            c: 1,
        }
    }

    /// Advance one step and return the new state.
    pub fn next(&mut self) -> u64 {
        self.state = self.a.wrapping_mul(self.state).wrapping_add(self.c);
        self.state
    }

    /// Skip forward (or, for negative n, backward) by exactly n steps in
    /// O(log n).
    ///
    /// The combined multiplier/increment pair for n applications of the
    /// recurrence is computed by binary decomposition and applied once; see
    /// F. Brown, "Random Number Generation with Arbitrary Stride", Trans.
    /// Am. Nucl. Soc. (Nov. 1994). A negative n works out to the same thing
    /// as skipping 2^64 + n steps, which is a rewind within the period.
    pub fn skip(&mut self, n: i64) {
        let mut nskip = n as u64;

        let mut a = self.a;
        let mut c = self.c;

        let mut a_next: u64 = 1;
        let mut c_next: u64 = 0;

        while nskip > 0 {
            if nskip & 1 != 0 {
                a_next = a_next.wrapping_mul(a);
                c_next = c_next.wrapping_mul(a).wrapping_add(c);
            }
            c = a.wrapping_add(1).wrapping_mul(c);
            a = a.wrapping_mul(a);

            nskip >>= 1;
        }

        self.state = a_next.wrapping_mul(self.state).wrapping_add(c_next);
    }
}

const MASK48: u64 = (1 << 48) - 1;

/// 48-bit generator for identifier spaces that must never overflow into
/// unrelated bit ranges. Same contract as [`Lcg`] with all arithmetic
/// masked to 48 bits; the multiplier is the classic 48-bit full-period
/// constant.
#[derive(Debug, Clone)]
pub struct Lcg48 {
    state: u64,
    a: u64,
    c: u64,
}

impl Lcg48 {
    pub fn new(seed: u64) -> Self {
        Self {
            state: seed & MASK48,
            a: 25214903917,
            c: 1,
        }
    }

    pub fn next(&mut self) -> u64 {
        self.state = self.a.wrapping_mul(self.state).wrapping_add(self.c) & MASK48;
        self.state
    }

    pub fn skip(&mut self, n: i64) {
        // Masking up front reduces the stride modulo the 48-bit period;
        // anything beyond it wraps around, so no further bound check is
        // needed inside the loop.
        let mut delta = (n as u64) & MASK48;

        let mut a = self.a;
        let mut c = self.c;

        let mut a_next: u64 = 1;
        let mut c_next: u64 = 0;

        while delta > 0 {
            if delta & 1 != 0 {
                a_next = a_next.wrapping_mul(a) & MASK48;
                c_next = c_next.wrapping_mul(a).wrapping_add(c) & MASK48;
            }
            c = a.wrapping_add(1).wrapping_mul(c) & MASK48;
            a = a.wrapping_mul(a) & MASK48;

            delta >>= 1;
        }

        self.state = a_next.wrapping_mul(self.state).wrapping_add(c_next) & MASK48;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_next_is_unique_over_a_million_steps() {
        let mut lcg = Lcg::new(0xdead_beef_cafe_1234);
        let mut seen = HashSet::with_capacity(1_000_000);

        for _ in 0..1_000_000 {
            assert!(seen.insert(lcg.next()), "generator repeated a value");
        }
    }

    #[test]
    fn test_skip_matches_iteration() {
        for n in [0i64, 1, 2, 7, 63, 64, 1000, 123_456] {
            let mut stepped = Lcg::new(42);
            for _ in 0..n {
                stepped.next();
            }

            let mut skipped = Lcg::new(42);
            skipped.skip(n);

            assert_eq!(stepped.next(), skipped.next(), "mismatch at n={}", n);
        }
    }

    #[test]
    fn test_negative_skip_rewinds() {
        let mut lcg = Lcg::new(987_654_321);
        let first = lcg.next();
        for _ in 0..99 {
            lcg.next();
        }

        lcg.skip(-100);
        assert_eq!(lcg.next(), first);
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = Lcg::new(7);
        let mut b = Lcg::new(7);
        for _ in 0..1000 {
            assert_eq!(a.next(), b.next());
        }
    }

    #[test]
    fn test_48bit_stays_masked() {
        let mut lcg = Lcg48::new(u64::MAX);
        for _ in 0..10_000 {
            assert!(lcg.next() <= MASK48);
        }
    }

    #[test]
    fn test_48bit_skip_matches_iteration() {
        for n in [1i64, 5, 100, 4096] {
            let mut stepped = Lcg48::new(31337);
            for _ in 0..n {
                stepped.next();
            }

            let mut skipped = Lcg48::new(31337);
            skipped.skip(n);

            assert_eq!(stepped.next(), skipped.next(), "mismatch at n={}", n);
        }
    }

    #[test]
    fn test_48bit_skip_wraps_past_the_period() {
        // A stride beyond the 48-bit period reduces modulo the period.
        let mut whole_period_plus_five = Lcg48::new(777);
        whole_period_plus_five.skip((1i64 << 48) + 5);

        let mut five = Lcg48::new(777);
        five.skip(5);

        assert_eq!(whole_period_plus_five.next(), five.next());
    }

    #[test]
    fn test_48bit_negative_skip_rewinds() {
        let mut lcg = Lcg48::new(555);
        let first = lcg.next();
        for _ in 0..9 {
            lcg.next();
        }

        lcg.skip(-10);
        assert_eq!(lcg.next(), first);
    }
}
