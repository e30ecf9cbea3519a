//! CKKS parameter sets
//!
//! A [`ParametersLiteral`] is the plain, serializable description of a
//! parameter set: ring degree, either explicit primes or prime bit sizes, ring
//! kind, secret and error distributions, and the default scale. Building it
//! into [`Parameters`] generates the missing primes and the NTT tables once;
//! the result is immutable and cheap to clone.

use std::sync::Arc;

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ring::{primes, Ring, RingKind};

/// Galois generator of the rotation group.
pub const GALOIS_GEN: u64 = 5;

/// Default standard deviation of the error distribution.
pub const DEFAULT_SIGMA: f64 = 3.2;

/// Serializable description of a CKKS parameter set.
///
/// Either `q`/`p` (explicit primes) or `log_q`/`log_p` (bit sizes) must be
/// given for each modulus chain; explicit primes take precedence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParametersLiteral {
    pub log_n: usize,
    pub q: Vec<u64>,
    pub p: Vec<u64>,
    pub log_q: Vec<usize>,
    pub log_p: Vec<usize>,
    pub ring_kind: RingKind,
    /// Hamming weight of the secret; 0 samples a uniform ternary secret.
    pub hamming_weight: usize,
    pub sigma: f64,
    pub log_default_scale: usize,
    /// Prime congruence order; 0 selects the minimum for `ring_kind`.
    pub log_nth_root: usize,
}

impl Default for ParametersLiteral {
    fn default() -> Self {
        Self {
            log_n: 0,
            q: Vec::new(),
            p: Vec::new(),
            log_q: Vec::new(),
            log_p: Vec::new(),
            ring_kind: RingKind::Standard,
            hamming_weight: 0,
            sigma: DEFAULT_SIGMA,
            log_default_scale: 0,
            log_nth_root: 0,
        }
    }
}

/// Immutable CKKS parameter set with its rings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "ParametersLiteral", into = "ParametersLiteral")]
pub struct Parameters {
    literal: ParametersLiteral,
    ring_q: Arc<Ring>,
    ring_p: Arc<Ring>,
}

impl Parameters {
    /// Build a parameter set, generating primes for any chain given by bit sizes.
    ///
    /// # Errors
    /// Configuration errors for invalid degrees, empty chains, primes that are
    /// not NTT-friendly, or a special prime smaller than some Q prime.
    pub fn new(literal: ParametersLiteral) -> Result<Self> {
        let lit = literal;
        if lit.log_n < 3 || lit.log_n > 17 {
            return Err(Error::config(format!("log_n = {} outside [3, 17]", lit.log_n)));
        }
        if !(lit.sigma > 0.0) {
            return Err(Error::config("error standard deviation must be positive"));
        }

        let n = 1usize << lit.log_n;
        let min_root = lit.ring_kind.min_nth_root(n);
        let nth_root = if lit.log_nth_root == 0 {
            min_root
        } else {
            1u64 << lit.log_nth_root
        };
        if nth_root < min_root {
            return Err(Error::config(format!(
                "NthRoot 2^{} below the minimum {min_root} for a {:?} ring of degree {n}",
                lit.log_nth_root, lit.ring_kind
            )));
        }

        let q = if !lit.q.is_empty() {
            lit.q.clone()
        } else {
            gen_chain(&lit.log_q, nth_root, &[])?
        };
        let p = if !lit.p.is_empty() {
            lit.p.clone()
        } else {
            gen_chain(&lit.log_p, nth_root, &q)?
        };

        if q.is_empty() {
            return Err(Error::config("modulus chain Q is empty"));
        }
        if p.len() != 1 {
            return Err(Error::config(format!(
                "exactly one special prime is supported, got {}",
                p.len()
            )));
        }
        let q_max = q.iter().copied().max().unwrap_or(0);
        if p[0] < q_max {
            return Err(Error::config(format!(
                "special prime {} smaller than the largest Q prime {q_max}",
                p[0]
            )));
        }
        if q.contains(&p[0]) {
            return Err(Error::config("special prime repeats a Q prime"));
        }
        if lit.log_default_scale == 0 || lit.log_default_scale > 120 {
            return Err(Error::config("log_default_scale must lie in [1, 120]"));
        }
        if lit.ring_kind == RingKind::Standard && lit.hamming_weight > n {
            return Err(Error::config("secret Hamming weight exceeds the ring degree"));
        }

        let ring_q = Ring::new(lit.ring_kind, n, nth_root, &q)?;
        let ring_p = Ring::new(lit.ring_kind, n, nth_root, &p)?;

        Ok(Self {
            literal: ParametersLiteral {
                q,
                p,
                log_q: Vec::new(),
                log_p: Vec::new(),
                log_nth_root: nth_root.trailing_zeros() as usize,
                ..lit
            },
            ring_q: Arc::new(ring_q),
            ring_p: Arc::new(ring_p),
        })
    }

    /// Resolved literal with explicit primes.
    pub fn literal(&self) -> ParametersLiteral {
        self.literal.clone()
    }

    #[inline]
    pub fn n(&self) -> usize {
        1 << self.literal.log_n
    }

    #[inline]
    pub fn log_n(&self) -> usize {
        self.literal.log_n
    }

    #[inline]
    pub fn ring_kind(&self) -> RingKind {
        self.literal.ring_kind
    }

    #[inline]
    pub fn ring_q(&self) -> &Ring {
        &self.ring_q
    }

    #[inline]
    pub fn ring_p(&self) -> &Ring {
        &self.ring_p
    }

    pub fn q(&self) -> &[u64] {
        &self.literal.q
    }

    pub fn p(&self) -> &[u64] {
        &self.literal.p
    }

    /// The single special prime P.
    #[inline]
    pub fn special_prime(&self) -> u64 {
        self.literal.p[0]
    }

    #[inline]
    pub fn max_level(&self) -> usize {
        self.literal.q.len() - 1
    }

    #[inline]
    pub fn hamming_weight(&self) -> usize {
        self.literal.hamming_weight
    }

    #[inline]
    pub fn sigma(&self) -> f64 {
        self.literal.sigma
    }

    #[inline]
    pub fn log_default_scale(&self) -> usize {
        self.literal.log_default_scale
    }

    #[inline]
    pub fn default_scale(&self) -> f64 {
        (self.literal.log_default_scale as f64).exp2()
    }

    /// Order of the root of unity underlying the slot encoding.
    #[inline]
    pub fn nth_root(&self) -> u64 {
        self.ring_kind().min_nth_root(self.n())
    }

    /// Prime congruence order used to generate the chains.
    #[inline]
    pub fn prime_nth_root(&self) -> u64 {
        1 << self.literal.log_nth_root
    }

    /// Maximum number of slots: N/2 complex or N real.
    #[inline]
    pub fn max_slots(&self) -> usize {
        (self.nth_root() >> 2) as usize
    }

    #[inline]
    pub fn log_max_slots(&self) -> usize {
        self.max_slots().trailing_zeros() as usize
    }

    /// Levels consumed by one rescaling.
    #[inline]
    pub fn levels_consumed_per_rescaling(&self) -> usize {
        1
    }

    /// Q_level = q_0 · … · q_level.
    pub fn modulus_at_level(&self, level: usize) -> BigUint {
        self.literal.q[..=level]
            .iter()
            .fold(BigUint::from(1u8), |acc, &q| acc * q)
    }

    /// Galois element of the slot rotation by `k` positions (negative rotates right).
    pub fn galois_element(&self, k: i64) -> u64 {
        let m = self.nth_root();
        let order = (m >> 2) as i64;
        let mut e = k.rem_euclid(order) as u64;
        let mut base = GALOIS_GEN;
        let mut acc = 1u64;
        while e > 0 {
            if e & 1 == 1 {
                acc = acc * base % m;
            }
            base = base * base % m;
            e >>= 1;
        }
        acc
    }

    /// Galois element of complex conjugation (X ↦ X^(-1)).
    #[inline]
    pub fn galois_element_for_conjugation(&self) -> u64 {
        self.nth_root() - 1
    }

    /// Galois elements required by [`Evaluator::trace`](super::Evaluator::trace)
    /// down to `log_slots` slots.
    pub fn galois_elements_for_trace(&self, log_slots: usize) -> Vec<u64> {
        let mut out: Vec<u64> = (log_slots..self.log_n().saturating_sub(1))
            .map(|i| self.galois_element(1 << i))
            .collect();
        if log_slots == 0 && self.ring_kind() == RingKind::Standard {
            out.push(self.galois_element_for_conjugation());
        }
        out
    }
}

impl PartialEq for Parameters {
    fn eq(&self, other: &Self) -> bool {
        self.literal == other.literal
    }
}

impl TryFrom<ParametersLiteral> for Parameters {
    type Error = Error;

    fn try_from(lit: ParametersLiteral) -> Result<Self> {
        Parameters::new(lit)
    }
}

impl From<Parameters> for ParametersLiteral {
    fn from(p: Parameters) -> Self {
        p.literal
    }
}

fn gen_chain(log_sizes: &[usize], nth_root: u64, exclude: &[u64]) -> Result<Vec<u64>> {
    let mut chain: Vec<u64> = Vec::with_capacity(log_sizes.len());
    for &bits in log_sizes {
        let mut taken = exclude.to_vec();
        taken.extend_from_slice(&chain);
        let prime = primes::generate_primes(bits, nth_root, 1, &taken)?;
        chain.extend(prime);
    }
    Ok(chain)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn literal() -> ParametersLiteral {
        ParametersLiteral {
            log_n: 10,
            log_q: vec![55, 40, 40],
            log_p: vec![61],
            log_default_scale: 40,
            ..Default::default()
        }
    }

    #[test]
    fn test_generates_distinct_chain() {
        let params = Parameters::new(literal()).unwrap();
        assert_eq!(params.max_level(), 2);
        assert_eq!(params.q()[1] % 2048, 1);
        assert_ne!(params.q()[1], params.q()[2]);
        assert!(params.special_prime() > params.q()[0]);
        assert_eq!(params.max_slots(), 512);
    }

    #[test]
    fn test_json_roundtrip_is_exact() {
        let params = Parameters::new(literal()).unwrap();
        let json = serde_json::to_string(&params).unwrap();
        let back: Parameters = serde_json::from_str(&json).unwrap();
        assert_eq!(params, back);
        assert_eq!(params.q(), back.q());
    }

    #[test]
    fn test_rejects_multiple_special_primes() {
        let lit = ParametersLiteral {
            log_p: vec![61, 61],
            ..literal()
        };
        assert!(matches!(Parameters::new(lit), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_galois_elements() {
        let params = Parameters::new(literal()).unwrap();
        assert_eq!(params.galois_element(0), 1);
        assert_eq!(params.galois_element(1), 5);
        let m = params.nth_root();
        // rotating left then right is the identity
        let g = params.galois_element(3);
        let h = params.galois_element(-3);
        assert_eq!(g * h % m, 1);
        assert_eq!(params.galois_element_for_conjugation(), m - 1);
    }
}
