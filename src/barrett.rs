//! Barrett and Shoup Reduction for 61-bit Moduli
//!
//! Every residue in the RNS representation lives modulo a word-sized prime. This
//! module provides the modular arithmetic those residues need without ever
//! falling back to hardware division in the hot loops.
//!
//! # Algorithm
//!
//! For a modulus q < 2^61, precompute the 128-bit constant r = ⌊2^128 / q⌋.
//! Any 128-bit product x is then reduced as:
//!
//! 1. qhat = ⌊(x · r) / 2^128⌋  (computed limb by limb, never materialized)
//! 2. t = x − qhat · q          (fits in a single word, t < 2q)
//! 3. if t ≥ q then t − q
//!
//! Multiplications by a fixed operand w (NTT twiddles, key-switching constants)
//! use Shoup's trick instead: precompute w' = ⌊w · 2^64 / q⌋ once and reduce
//! with a single high multiplication.

/// Largest supported modulus bit size.
pub const MAX_MODULUS_BITS: u32 = 61;

/// Barrett reduction context for one word-sized modulus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Modulus {
    /// The modulus q
    q: u64,

    /// ⌊2^128 / q⌋ as [low, high] limbs
    ratio: [u64; 2],
}

impl Modulus {
    /// Create a new reduction context
    ///
    /// # Arguments
    /// * `q` - The modulus, odd and smaller than 2^61
    ///
    /// # Example
    /// ```
    /// use ckks_bootstrapping::barrett::Modulus;
    ///
    /// let m = Modulus::new(65537);
    /// assert_eq!(m.reduce(65539), 2);
    /// assert_eq!(m.mul(65536, 65536), 1);
    /// ```
    pub fn new(q: u64) -> Self {
        debug_assert!(q > 1 && q < (1u64 << MAX_MODULUS_BITS));
        let ratio = u128::MAX / q as u128;
        Self {
            q,
            ratio: [ratio as u64, (ratio >> 64) as u64],
        }
    }

    /// The modulus value.
    #[inline(always)]
    pub fn value(&self) -> u64 {
        self.q
    }

    /// Reduce a 128-bit integer modulo q.
    #[inline(always)]
    pub fn reduce_u128(&self, x: u128) -> u64 {
        let x0 = x as u64;
        let x1 = (x >> 64) as u64;
        let [r0, r1] = self.ratio;

        // Middle limb of x · r, keeping every carry that reaches the top word
        let carry = ((x0 as u128 * r0 as u128) >> 64) as u64;
        let t = x0 as u128 * r1 as u128;
        let (lo, c1) = (t as u64).overflowing_add(carry);
        let t3 = ((t >> 64) as u64).wrapping_add(c1 as u64);

        let t2 = x1 as u128 * r0 as u128;
        let (_, c2) = lo.overflowing_add(t2 as u64);
        let carry = ((t2 >> 64) as u64).wrapping_add(c2 as u64);

        let qhat = x1
            .wrapping_mul(r1)
            .wrapping_add(t3)
            .wrapping_add(carry);

        let r = x0.wrapping_sub(qhat.wrapping_mul(self.q));
        if r >= self.q {
            r - self.q
        } else {
            r
        }
    }

    /// Reduce a 64-bit integer modulo q.
    #[inline(always)]
    pub fn reduce(&self, x: u64) -> u64 {
        if x < self.q {
            x
        } else {
            self.reduce_u128(x as u128)
        }
    }

    /// Reduce a signed integer modulo q into [0, q).
    #[inline(always)]
    pub fn reduce_i64(&self, x: i64) -> u64 {
        let r = self.reduce(x.unsigned_abs());
        if x < 0 {
            self.neg(r)
        } else {
            r
        }
    }

    /// Reduce a signed 128-bit integer modulo q into [0, q).
    #[inline(always)]
    pub fn reduce_i128(&self, x: i128) -> u64 {
        let r = self.reduce_u128(x.unsigned_abs());
        if x < 0 {
            self.neg(r)
        } else {
            r
        }
    }

    /// Map a residue to its centered representative in (−q/2, q/2].
    #[inline(always)]
    pub fn center(&self, x: u64) -> i64 {
        if x > self.q >> 1 {
            x as i64 - self.q as i64
        } else {
            x as i64
        }
    }

    #[inline(always)]
    pub fn add(&self, a: u64, b: u64) -> u64 {
        let s = a + b;
        if s >= self.q {
            s - self.q
        } else {
            s
        }
    }

    #[inline(always)]
    pub fn sub(&self, a: u64, b: u64) -> u64 {
        if a >= b {
            a - b
        } else {
            a + self.q - b
        }
    }

    #[inline(always)]
    pub fn neg(&self, a: u64) -> u64 {
        if a == 0 {
            0
        } else {
            self.q - a
        }
    }

    #[inline(always)]
    pub fn mul(&self, a: u64, b: u64) -> u64 {
        self.reduce_u128(a as u128 * b as u128)
    }

    /// a · b + c mod q
    #[inline(always)]
    pub fn mul_add(&self, a: u64, b: u64, c: u64) -> u64 {
        self.reduce_u128(a as u128 * b as u128 + c as u128)
    }

    /// Modular exponentiation by squaring.
    pub fn pow(&self, mut base: u64, mut exp: u64) -> u64 {
        let mut result = 1u64;
        base = self.reduce(base);
        while exp > 0 {
            if exp & 1 == 1 {
                result = self.mul(result, base);
            }
            base = self.mul(base, base);
            exp >>= 1;
        }
        result
    }

    /// Modular inverse through Fermat's little theorem (q must be prime).
    pub fn inv(&self, a: u64) -> u64 {
        self.pow(a, self.q - 2)
    }

    /// Shoup precomputation w' = ⌊w · 2^64 / q⌋ for a fixed multiplicand w < q.
    #[inline(always)]
    pub fn shoup(&self, w: u64) -> u64 {
        (((w as u128) << 64) / self.q as u128) as u64
    }

    /// x · w mod q using the Shoup constant of w.
    #[inline(always)]
    pub fn mul_shoup(&self, x: u64, w: u64, w_shoup: u64) -> u64 {
        let qhat = ((x as u128 * w_shoup as u128) >> 64) as u64;
        let r = x.wrapping_mul(w).wrapping_sub(qhat.wrapping_mul(self.q));
        if r >= self.q {
            r - self.q
        } else {
            r
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const Q: u64 = (1 << 61) - 1; // Mersenne prime

    #[test]
    fn test_reduce_matches_remainder() {
        let m = Modulus::new(Q);
        let samples: [u128; 6] = [
            0,
            Q as u128,
            (Q as u128) * (Q as u128) - 1,
            u128::MAX,
            0xdead_beef_cafe_babe_0123_4567_89ab_cdef,
            (1u128 << 122) + 12345,
        ];
        for &x in &samples {
            assert_eq!(m.reduce_u128(x), (x % Q as u128) as u64, "x = {x}");
        }
    }

    #[test]
    fn test_signed_reduction_and_center() {
        let m = Modulus::new(97);
        assert_eq!(m.reduce_i64(-1), 96);
        assert_eq!(m.reduce_i64(-194), 0);
        assert_eq!(m.reduce_i128(-98), 96);
        assert_eq!(m.center(96), -1);
        assert_eq!(m.center(48), 48);
        assert_eq!(m.center(49), -48);
    }

    #[test]
    fn test_inverse_and_shoup() {
        let m = Modulus::new(Q);
        let a = 0x0123_4567_89ab_cdef % Q;
        assert_eq!(m.mul(a, m.inv(a)), 1);

        let w = 0x0fed_cba9_8765_4321 % Q;
        let w_shoup = m.shoup(w);
        for x in [0, 1, Q - 1, a, w] {
            assert_eq!(m.mul_shoup(x, w, w_shoup), m.mul(x, w));
        }
    }
}
