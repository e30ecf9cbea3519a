//! Negacyclic Number Theoretic Transform
//!
//! Evaluates a polynomial of Z_q[X]/(X^n + 1) at the n primitive 2n-th roots of
//! unity so that ring multiplication becomes a point-wise product.
//!
//! **Layout:**
//! - Forward transform: Cooley–Tukey butterflies, natural-order input,
//!   bit-reversed output (Longa–Naehrig merged twist)
//! - Inverse transform: Gentleman–Sande butterflies, bit-reversed input,
//!   natural-order output, followed by the n^(-1) scaling
//! - Output slot j holds a(ψ^(2·brv(j)+1)), which is what
//!   [`automorphism_ntt_index`] relies on
//!
//! **References:**
//! - Longa, P. & Naehrig, M. "Speeding up the Number Theoretic Transform" (2016)
//! - Harvey, D. "Faster arithmetic for number-theoretic transforms" (2014)

use crate::barrett::Modulus;

/// Precomputed twiddle factors for one prime and one transform size
#[derive(Debug, Clone)]
pub struct NttTable {
    /// Transform size (power of two)
    pub n: usize,

    /// The prime modulus, q ≡ 1 mod 2n
    pub modulus: Modulus,

    /// ψ^brv(i), ψ a primitive 2n-th root of unity
    psi_rev: Vec<u64>,
    psi_rev_shoup: Vec<u64>,

    /// ψ^(-brv(i))
    psi_inv_rev: Vec<u64>,
    psi_inv_rev_shoup: Vec<u64>,

    n_inv: u64,
    n_inv_shoup: u64,
}

impl NttTable {
    /// Build the table for size `n` and prime `q`.
    ///
    /// Returns `None` when `n` is not a power of two or `q` has no primitive
    /// 2n-th root of unity.
    pub fn new(n: usize, q: u64) -> Option<Self> {
        if !n.is_power_of_two() || n < 2 || (q - 1) % (2 * n as u64) != 0 {
            return None;
        }

        let modulus = Modulus::new(q);
        let psi = primitive_root(n, &modulus)?;
        let psi_inv = modulus.inv(psi);
        let log_n = n.trailing_zeros();

        let mut psi_rev = vec![0u64; n];
        let mut psi_inv_rev = vec![0u64; n];
        let (mut pow, mut pow_inv) = (1u64, 1u64);
        for i in 0..n {
            let r = bit_reverse(i, log_n);
            psi_rev[r] = pow;
            psi_inv_rev[r] = pow_inv;
            pow = modulus.mul(pow, psi);
            pow_inv = modulus.mul(pow_inv, psi_inv);
        }

        let psi_rev_shoup = psi_rev.iter().map(|&w| modulus.shoup(w)).collect();
        let psi_inv_rev_shoup = psi_inv_rev.iter().map(|&w| modulus.shoup(w)).collect();
        let n_inv = modulus.inv(n as u64);

        Some(Self {
            n,
            modulus,
            psi_rev,
            psi_rev_shoup,
            psi_inv_rev,
            psi_inv_rev_shoup,
            n_inv,
            n_inv_shoup: modulus.shoup(n_inv),
        })
    }

    /// In-place forward transform.
    pub fn forward(&self, a: &mut [u64]) {
        debug_assert_eq!(a.len(), self.n);
        let m_ = &self.modulus;
        let mut t = self.n;
        let mut m = 1;
        while m < self.n {
            t >>= 1;
            for i in 0..m {
                let j1 = 2 * i * t;
                let w = self.psi_rev[m + i];
                let w_shoup = self.psi_rev_shoup[m + i];
                for j in j1..j1 + t {
                    let u = a[j];
                    let v = m_.mul_shoup(a[j + t], w, w_shoup);
                    a[j] = m_.add(u, v);
                    a[j + t] = m_.sub(u, v);
                }
            }
            m <<= 1;
        }
    }

    /// In-place inverse transform, including the n^(-1) scaling.
    pub fn inverse(&self, a: &mut [u64]) {
        debug_assert_eq!(a.len(), self.n);
        let m_ = &self.modulus;
        let mut t = 1;
        let mut m = self.n;
        while m > 1 {
            let h = m >> 1;
            let mut j1 = 0;
            for i in 0..h {
                let w = self.psi_inv_rev[h + i];
                let w_shoup = self.psi_inv_rev_shoup[h + i];
                for j in j1..j1 + t {
                    let u = a[j];
                    let v = a[j + t];
                    a[j] = m_.add(u, v);
                    a[j + t] = m_.mul_shoup(m_.sub(u, v), w, w_shoup);
                }
                j1 += 2 * t;
            }
            t <<= 1;
            m = h;
        }
        for x in a.iter_mut() {
            *x = m_.mul_shoup(*x, self.n_inv, self.n_inv_shoup);
        }
    }
}

/// Reverse the low `bits` bits of `x`.
#[inline]
pub fn bit_reverse(x: usize, bits: u32) -> usize {
    if bits == 0 {
        0
    } else {
        x.reverse_bits() >> (usize::BITS - bits)
    }
}

/// Permutation applying X ↦ X^g to a polynomial in NTT form of size `n`.
///
/// `out[i] = in[index[i]]`; `g` must be odd.
pub fn automorphism_ntt_index(n: usize, g: u64) -> Vec<usize> {
    let log_n = n.trailing_zeros();
    let mask = (2 * n as u64) - 1;
    (0..n)
        .map(|i| {
            let e = 2 * bit_reverse(i, log_n) as u64 + 1;
            let t = ((g.wrapping_mul(e)) & mask) >> 1;
            bit_reverse(t as usize, log_n)
        })
        .collect()
}

/// Smallest-generator primitive 2n-th root of unity modulo q.
fn primitive_root(n: usize, modulus: &Modulus) -> Option<u64> {
    let q = modulus.value();
    let exp = (q - 1) / (2 * n as u64);
    (2..q.min(1 << 20))
        .map(|x| modulus.pow(x, exp))
        .find(|&psi| modulus.pow(psi, n as u64) == q - 1)
}
