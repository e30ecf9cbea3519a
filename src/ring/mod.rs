//! RNS polynomial rings
//!
//! A [`Ring`] is a fixed list of NTT-friendly primes over one ring degree. A
//! [`Poly`] stores one residue row per prime; the number of rows it carries is
//! its level plus one, so dropping a level is just truncating the last row.
//!
//! **Ring kinds:**
//! - [`RingKind::Standard`]: Z_q[X]/(X^N + 1), N/2 complex slots
//! - [`RingKind::ConjugateInvariant`]: Z_q[X + X^(-1)]/(X^(2N) + 1) stored with
//!   N coefficients, N real slots. Its NTT is the first half of the size-2N
//!   negacyclic NTT of the unfolded polynomial; the second half mirrors the first.
//!
//! Polynomials are kept in the NTT domain unless a routine says otherwise.

pub mod primes;
pub mod sampling;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::barrett::Modulus;
use crate::error::{Error, Result};
use crate::ntt::{automorphism_ntt_index, NttTable};

/// Plaintext-slot algebra of a ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum RingKind {
    /// Complex slots, NthRoot = 2N.
    #[default]
    Standard,
    /// Real slots, NthRoot = 4N.
    ConjugateInvariant,
}

impl RingKind {
    /// Smallest NthRoot admissible for a ring of degree `n`.
    pub fn min_nth_root(&self, n: usize) -> u64 {
        match self {
            RingKind::Standard => 2 * n as u64,
            RingKind::ConjugateInvariant => 4 * n as u64,
        }
    }
}

/// RNS polynomial: `coeffs[i]` holds the residues modulo the i-th prime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Poly {
    pub coeffs: Vec<Vec<u64>>,
}

impl Poly {
    pub fn zero(n: usize, rows: usize) -> Self {
        Self {
            coeffs: vec![vec![0u64; n]; rows],
        }
    }

    #[inline]
    pub fn n(&self) -> usize {
        self.coeffs.first().map_or(0, |r| r.len())
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.coeffs.len()
    }

    /// Level of the polynomial (rows − 1).
    #[inline]
    pub fn level(&self) -> usize {
        self.coeffs.len().saturating_sub(1)
    }

    /// Keep only the rows of levels `0..=level`.
    pub fn drop_to_level(&mut self, level: usize) {
        self.coeffs.truncate(level + 1);
    }

    /// Copy of the rows of levels `0..=level`.
    pub fn at_level(&self, level: usize) -> Poly {
        Poly {
            coeffs: self.coeffs[..=level].to_vec(),
        }
    }

    pub fn zeroize(&mut self) {
        for row in self.coeffs.iter_mut() {
            row.iter_mut().for_each(|x| *x = 0);
        }
    }
}

/// Polynomial over the extended basis Q ∪ P.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolyQP {
    pub q: Poly,
    pub p: Poly,
}

impl PolyQP {
    pub fn zero(n: usize, rows_q: usize, rows_p: usize) -> Self {
        Self {
            q: Poly::zero(n, rows_q),
            p: Poly::zero(n, rows_p),
        }
    }
}

/// A list of NTT-friendly primes together with their transform tables.
#[derive(Debug, Clone)]
pub struct Ring {
    kind: RingKind,
    n: usize,
    nth_root: u64,
    tables: Vec<NttTable>,
}

impl Ring {
    /// Build a ring of degree `n` over `primes`.
    ///
    /// # Arguments
    /// * `kind` - Slot algebra of the ring
    /// * `n` - Ring degree (number of stored coefficients)
    /// * `nth_root` - Order of the root of unity every prime must support
    /// * `primes` - The RNS basis, in level order
    ///
    /// # Errors
    /// Returns a configuration error if a prime is not ≡ 1 mod `nth_root` or
    /// `nth_root` is below the minimum for `kind`.
    pub fn new(kind: RingKind, n: usize, nth_root: u64, primes: &[u64]) -> Result<Self> {
        if !n.is_power_of_two() || n < 4 {
            return Err(Error::config(format!("ring degree {n} must be a power of two ≥ 4")));
        }
        if nth_root < kind.min_nth_root(n) || !nth_root.is_power_of_two() {
            return Err(Error::config(format!(
                "NthRoot {nth_root} invalid for {kind:?} ring of degree {n}"
            )));
        }
        let size = match kind {
            RingKind::Standard => n,
            RingKind::ConjugateInvariant => 2 * n,
        };
        let tables = primes
            .iter()
            .map(|&q| {
                if q % nth_root != 1 || !primes::is_prime(q) {
                    return Err(Error::config(format!("{q} is not a prime ≡ 1 mod {nth_root}")));
                }
                NttTable::new(size, q).ok_or_else(|| Error::config(format!("no NTT for prime {q}")))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            kind,
            n,
            nth_root,
            tables,
        })
    }

    #[inline]
    pub fn kind(&self) -> RingKind {
        self.kind
    }

    #[inline]
    pub fn n(&self) -> usize {
        self.n
    }

    #[inline]
    pub fn log_n(&self) -> usize {
        self.n.trailing_zeros() as usize
    }

    #[inline]
    pub fn nth_root(&self) -> u64 {
        self.nth_root
    }

    /// Number of primes in the ring.
    #[inline]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    #[inline]
    pub fn max_level(&self) -> usize {
        self.tables.len().saturating_sub(1)
    }

    #[inline]
    pub fn modulus(&self, i: usize) -> &Modulus {
        &self.tables[i].modulus
    }

    pub fn moduli(&self) -> impl Iterator<Item = &Modulus> {
        self.tables.iter().map(|t| &t.modulus)
    }

    pub fn primes(&self) -> Vec<u64> {
        self.moduli().map(|m| m.value()).collect()
    }

    pub fn new_poly(&self, level: usize) -> Poly {
        Poly::zero(self.n, level + 1)
    }

    pub fn new_poly_rows(&self, rows: usize) -> Poly {
        Poly::zero(self.n, rows)
    }

    /// Forward NTT of one residue row.
    pub fn ntt_row(&self, i: usize, row: &mut [u64]) {
        let table = &self.tables[i];
        match self.kind {
            RingKind::Standard => table.forward(row),
            RingKind::ConjugateInvariant => {
                let n = self.n;
                let m = &table.modulus;
                let mut buf = vec![0u64; 2 * n];
                buf[0] = row[0];
                for j in 1..n {
                    buf[j] = row[j];
                    buf[2 * n - j] = m.neg(row[j]);
                }
                table.forward(&mut buf);
                row.copy_from_slice(&buf[..n]);
            }
        }
    }

    /// Inverse NTT of one residue row.
    pub fn intt_row(&self, i: usize, row: &mut [u64]) {
        let table = &self.tables[i];
        match self.kind {
            RingKind::Standard => table.inverse(row),
            RingKind::ConjugateInvariant => {
                let n = self.n;
                let mut buf = vec![0u64; 2 * n];
                for j in 0..n {
                    buf[j] = row[j];
                    buf[2 * n - 1 - j] = row[j];
                }
                table.inverse(&mut buf);
                row.copy_from_slice(&buf[..n]);
            }
        }
    }

    /// Row-parallel forward NTT.
    pub fn ntt(&self, p: &mut Poly) {
        p.coeffs
            .par_iter_mut()
            .enumerate()
            .for_each(|(i, row)| self.ntt_row(i, row));
    }

    /// Row-parallel inverse NTT.
    pub fn intt(&self, p: &mut Poly) {
        p.coeffs
            .par_iter_mut()
            .enumerate()
            .for_each(|(i, row)| self.intt_row(i, row));
    }

    pub fn add_assign(&self, a: &mut Poly, b: &Poly) {
        for (i, (ra, rb)) in a.coeffs.iter_mut().zip(&b.coeffs).enumerate() {
            let m = self.modulus(i);
            ra.iter_mut().zip(rb).for_each(|(x, &y)| *x = m.add(*x, y));
        }
    }

    pub fn sub_assign(&self, a: &mut Poly, b: &Poly) {
        for (i, (ra, rb)) in a.coeffs.iter_mut().zip(&b.coeffs).enumerate() {
            let m = self.modulus(i);
            ra.iter_mut().zip(rb).for_each(|(x, &y)| *x = m.sub(*x, y));
        }
    }

    pub fn neg_assign(&self, a: &mut Poly) {
        for (i, ra) in a.coeffs.iter_mut().enumerate() {
            let m = self.modulus(i);
            ra.iter_mut().for_each(|x| *x = m.neg(*x));
        }
    }

    /// Point-wise product `a ⊙ b` over the rows of `a`.
    pub fn mul_coeffs_assign(&self, a: &mut Poly, b: &Poly) {
        for (i, (ra, rb)) in a.coeffs.iter_mut().zip(&b.coeffs).enumerate() {
            let m = self.modulus(i);
            ra.iter_mut().zip(rb).for_each(|(x, &y)| *x = m.mul(*x, y));
        }
    }

    /// `acc += a ⊙ b` over the rows of `acc`.
    pub fn mul_coeffs_then_add(&self, a: &Poly, b: &Poly, acc: &mut Poly) {
        for (i, racc) in acc.coeffs.iter_mut().enumerate() {
            let m = self.modulus(i);
            let (ra, rb) = (&a.coeffs[i], &b.coeffs[i]);
            for j in 0..racc.len() {
                racc[j] = m.mul_add(ra[j], rb[j], racc[j]);
            }
        }
    }

    /// Multiply every row by the same small scalar.
    pub fn mul_scalar_assign(&self, a: &mut Poly, scalar: u64) {
        for (i, ra) in a.coeffs.iter_mut().enumerate() {
            let m = self.modulus(i);
            let s = m.reduce(scalar);
            let s_shoup = m.shoup(s);
            ra.iter_mut().for_each(|x| *x = m.mul_shoup(*x, s, s_shoup));
        }
    }

    /// Multiply row i by `scalars[i]` (an RNS scalar).
    pub fn mul_rns_scalar_assign(&self, a: &mut Poly, scalars: &[u64]) {
        for (i, ra) in a.coeffs.iter_mut().enumerate() {
            let m = self.modulus(i);
            let s = scalars[i];
            let s_shoup = m.shoup(s);
            ra.iter_mut().for_each(|x| *x = m.mul_shoup(*x, s, s_shoup));
        }
    }

    /// Add the RNS constant `scalars[i]` to every NTT slot of row i, which
    /// adds it to the constant coefficient.
    pub fn add_rns_scalar_assign(&self, a: &mut Poly, scalars: &[u64]) {
        for (i, ra) in a.coeffs.iter_mut().enumerate() {
            let m = self.modulus(i);
            let s = scalars[i];
            ra.iter_mut().for_each(|x| *x = m.add(*x, s));
        }
    }

    /// NTT-domain index map of the automorphism X ↦ X^g.
    pub fn automorphism_index(&self, g: u64) -> Vec<usize> {
        match self.kind {
            RingKind::Standard => automorphism_ntt_index(self.n, g),
            RingKind::ConjugateInvariant => {
                let full = automorphism_ntt_index(2 * self.n, g);
                full[..self.n]
                    .iter()
                    .map(|&k| if k >= self.n { 2 * self.n - 1 - k } else { k })
                    .collect()
            }
        }
    }

    /// Apply a precomputed automorphism index to an NTT-domain polynomial.
    pub fn permute_ntt(&self, a: &Poly, index: &[usize], out: &mut Poly) {
        for (ro, ra) in out.coeffs.iter_mut().zip(&a.coeffs) {
            for (o, &k) in ro.iter_mut().zip(index) {
                *o = ra[k];
            }
        }
    }

    /// Signed coefficient vector to a coefficient-domain polynomial.
    pub fn from_signed(&self, coeffs: &[i64], rows: usize) -> Poly {
        let mut p = self.new_poly_rows(rows);
        for (i, row) in p.coeffs.iter_mut().enumerate() {
            let m = self.modulus(i);
            for (x, &c) in row.iter_mut().zip(coeffs) {
                *x = m.reduce_i64(c);
            }
        }
        p
    }

    /// NTT-domain monomial X^k for any integer k (negative powers included).
    ///
    /// Only standard rings have monomials; conjugate-invariant rings return `None`.
    pub fn monomial(&self, k: i64, level: usize) -> Option<Poly> {
        if self.kind != RingKind::Standard {
            return None;
        }
        let k = k.rem_euclid(2 * self.n as i64) as usize;
        let (deg, negate) = if k >= self.n { (k - self.n, true) } else { (k, false) };
        let mut p = self.new_poly(level);
        for (i, row) in p.coeffs.iter_mut().enumerate() {
            let m = self.modulus(i);
            row[deg] = if negate { m.neg(1) } else { 1 };
        }
        self.ntt(&mut p);
        Some(p)
    }

    /// Reduce the centered residues of `src` (modulo `from`) into `dst` modulo
    /// the i-th prime of this ring.
    pub fn lift_centered_row(&self, i: usize, from: &Modulus, src: &[u64], dst: &mut [u64]) {
        let m = self.modulus(i);
        for (d, &s) in dst.iter_mut().zip(src) {
            *d = m.reduce_i64(from.center(s));
        }
    }
}

/// Coefficient-domain embedding Z[X]/(X^n+1) → Z[Y]/(Y^(n·k)+1), X ↦ Y^k.
pub fn embed_coefficients(src: &[u64], dst: &mut [u64]) {
    let gap = dst.len() / src.len();
    dst.iter_mut().for_each(|x| *x = 0);
    for (i, &c) in src.iter().enumerate() {
        dst[i * gap] = c;
    }
}

/// Coefficient-domain extraction keeping every `gap`-th coefficient.
pub fn extract_coefficients(src: &[u64], dst: &mut [u64]) {
    let gap = src.len() / dst.len();
    for (i, d) in dst.iter_mut().enumerate() {
        *d = src[i * gap];
    }
}

/// Signed conjugate-invariant coefficients to their standard unfolding
/// a_0 + Σ a_i (X^i − X^(2n−i)).
pub fn unfold_signed(coeffs: &[i64]) -> Vec<i64> {
    let n = coeffs.len();
    let mut out = vec![0i64; 2 * n];
    out[0] = coeffs[0];
    for i in 1..n {
        out[i] = coeffs[i];
        out[2 * n - i] = -coeffs[i];
    }
    out
}

/// Signed coefficients of X ↦ X^k (degree multiplied by `k`).
pub fn embed_signed(coeffs: &[i64], k: usize) -> Vec<i64> {
    let mut out = vec![0i64; coeffs.len() * k];
    for (i, &c) in coeffs.iter().enumerate() {
        out[i * k] = c;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_ring(kind: RingKind, n: usize) -> Ring {
        let nth_root = kind.min_nth_root(n);
        let primes = primes::generate_primes(40, nth_root, 2, &[]).unwrap();
        Ring::new(kind, n, nth_root, &primes).unwrap()
    }

    #[test]
    fn test_rejects_prime_with_wrong_congruence() {
        let primes = primes::generate_primes(40, 64, 1, &[]).unwrap();
        let q = primes[0];
        if q % 128 != 1 {
            assert!(Ring::new(RingKind::Standard, 64, 128, &[q]).is_err());
        }
    }

    #[test]
    fn test_conjugate_invariant_ntt_roundtrip_and_product() {
        let ring = test_ring(RingKind::ConjugateInvariant, 16);
        let a: Vec<i64> = (0..16).map(|i| i - 8).collect();
        let b: Vec<i64> = (0..16).map(|i| (i * 3) % 5 - 2).collect();

        let mut pa = ring.from_signed(&a, 2);
        let original = pa.clone();
        ring.ntt(&mut pa);
        let mut back = pa.clone();
        ring.intt(&mut back);
        assert_eq!(back, original);

        // Product in the conjugate-invariant ring equals the product of the
        // unfoldings in the standard ring of twice the degree.
        let std_ring = Ring::new(RingKind::Standard, 32, 64, &ring.primes()).unwrap();
        let mut pb = ring.from_signed(&b, 2);
        ring.ntt(&mut pb);
        ring.mul_coeffs_assign(&mut pa, &pb);
        ring.intt(&mut pa);

        let mut ua = std_ring.from_signed(&unfold_signed(&a), 2);
        let mut ub = std_ring.from_signed(&unfold_signed(&b), 2);
        std_ring.ntt(&mut ua);
        std_ring.ntt(&mut ub);
        std_ring.mul_coeffs_assign(&mut ua, &ub);
        std_ring.intt(&mut ua);
        for i in 0..2 {
            assert_eq!(pa.coeffs[i][..], ua.coeffs[i][..16]);
        }
    }

    #[test]
    fn test_monomial_negative_power() {
        let ring = test_ring(RingKind::Standard, 8);
        let mut x = ring.monomial(1, 1).unwrap();
        let x_inv = ring.monomial(-1, 1).unwrap();
        ring.mul_coeffs_assign(&mut x, &x_inv);
        ring.intt(&mut x);
        for row in &x.coeffs {
            assert_eq!(row[0], 1);
            assert!(row[1..].iter().all(|&c| c == 0));
        }
    }
}
