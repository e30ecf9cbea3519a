//! Secret keys, evaluation keys and their generation
//!
//! Every switching key in the crate (relinearization, Galois, ring and domain
//! switching, sparse-secret encapsulation) is an [`EvaluationKey`] from some
//! input secret to some output secret; only the input secret differs.

use std::collections::HashMap;

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use tracing::debug;

use super::params::Parameters;
use crate::error::{Error, Result};
use crate::ring::{sampling, Poly, PolyQP};

/// Ternary secret key.
///
/// The signed coefficients are kept so the same secret can be re-embedded
/// into other rings (ring switching, conjugate-invariant unfolding).
#[derive(Debug, Clone)]
pub struct SecretKey {
    signed: Vec<i64>,
    /// NTT-domain value over every prime of Q and P
    value: PolyQP,
}

impl SecretKey {
    /// Build a secret from signed coefficients in the ring of `params`.
    pub fn from_signed(params: &Parameters, signed: Vec<i64>) -> Result<Self> {
        if signed.len() != params.n() {
            return Err(Error::config(format!(
                "secret of length {} in a ring of degree {}",
                signed.len(),
                params.n()
            )));
        }
        Ok(Self::build(params, signed))
    }

    fn build(params: &Parameters, signed: Vec<i64>) -> Self {
        let ring_q = params.ring_q();
        let ring_p = params.ring_p();
        let mut q = ring_q.from_signed(&signed, ring_q.len());
        let mut p = ring_p.from_signed(&signed, 1);
        ring_q.ntt(&mut q);
        ring_p.ntt(&mut p);
        Self {
            signed,
            value: PolyQP { q, p },
        }
    }

    pub fn coefficients(&self) -> &[i64] {
        &self.signed
    }

    pub fn n(&self) -> usize {
        self.signed.len()
    }

    pub(crate) fn value(&self) -> &PolyQP {
        &self.value
    }

    /// Number of non-zero coefficients.
    pub fn hamming_weight(&self) -> usize {
        self.signed.iter().filter(|&&c| c != 0).count()
    }
}

/// Gadget key switching from one secret to another.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationKey {
    /// One (b_i, a_i) pair per prime of Q up to the key level
    pub digits: Vec<[PolyQP; 2]>,
}

impl EvaluationKey {
    /// Highest ciphertext level the key can switch.
    pub fn level_q(&self) -> usize {
        self.digits.len().saturating_sub(1)
    }

    /// Size of the serialized key: 8 bytes per stored residue plus headers.
    pub fn binary_size(&self) -> usize {
        let coeffs: usize = self
            .digits
            .iter()
            .flat_map(|pair| pair.iter())
            .map(|qp| (qp.q.rows() + qp.p.rows()) * qp.q.n())
            .sum();
        16 + coeffs * 8
    }
}

/// Key from s² to s.
#[derive(Debug, Clone, PartialEq)]
pub struct RelinearizationKey {
    pub key: EvaluationKey,
}

/// Key from σ_g(s) to s for the automorphism X ↦ X^g.
#[derive(Debug, Clone, PartialEq)]
pub struct GaloisKey {
    pub galois_element: u64,
    pub key: EvaluationKey,
}

/// Keys consumed by the generic evaluator.
#[derive(Debug, Clone, Default)]
pub struct EvaluationKeySet {
    pub relinearization_key: Option<RelinearizationKey>,
    pub galois_keys: HashMap<u64, GaloisKey>,
}

impl EvaluationKeySet {
    pub fn new(relinearization_key: Option<RelinearizationKey>, galois_keys: Vec<GaloisKey>) -> Self {
        Self {
            relinearization_key,
            galois_keys: galois_keys.into_iter().map(|k| (k.galois_element, k)).collect(),
        }
    }

    pub fn relinearization_key(&self) -> Result<&EvaluationKey> {
        self.relinearization_key
            .as_ref()
            .map(|k| &k.key)
            .ok_or_else(|| Error::missing_key("relinearization key"))
    }

    pub fn galois_key(&self, galois_element: u64) -> Result<&GaloisKey> {
        self.galois_keys
            .get(&galois_element)
            .ok_or_else(|| Error::missing_key(format!("Galois key for element {galois_element}")))
    }

    /// Galois elements present, sorted.
    pub fn galois_elements(&self) -> Vec<u64> {
        let mut out: Vec<u64> = self.galois_keys.keys().copied().collect();
        out.sort_unstable();
        out
    }

    pub fn binary_size(&self) -> usize {
        let rlk = self.relinearization_key.as_ref().map_or(0, |k| k.key.binary_size());
        let gks: usize = self.galois_keys.values().map(|k| 8 + k.key.binary_size()).sum();
        1 + rlk + gks
    }
}

/// Secret and evaluation key generation.
///
/// Randomness comes from a ChaCha20 stream, seeded from the OS by
/// [`KeyGenerator::new`] or deterministically by [`KeyGenerator::with_seed`].
pub struct KeyGenerator {
    params: Parameters,
    rng: ChaCha20Rng,
}

impl KeyGenerator {
    pub fn new(params: &Parameters) -> Self {
        Self {
            params: params.clone(),
            rng: ChaCha20Rng::from_entropy(),
        }
    }

    pub fn with_seed(params: &Parameters, seed: u64) -> Self {
        Self {
            params: params.clone(),
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    /// Secret with the parameters' Hamming weight (uniform ternary if zero).
    pub fn gen_secret_key(&mut self) -> SecretKey {
        let h = self.params.hamming_weight();
        let n = self.params.n();
        let signed = if h == 0 {
            sampling::ternary(&mut self.rng, n)
        } else {
            sampling::ternary_hamming(&mut self.rng, n, h)
        };
        self.secret_from(signed)
    }

    /// Ternary secret with exactly `h` non-zero coefficients.
    pub fn gen_secret_key_with_hamming_weight(&mut self, h: usize) -> SecretKey {
        let signed = sampling::ternary_hamming(&mut self.rng, self.params.n(), h);
        self.secret_from(signed)
    }

    fn secret_from(&self, signed: Vec<i64>) -> SecretKey {
        SecretKey::build(&self.params, signed)
    }

    pub fn gen_relinearization_key(&mut self, sk: &SecretKey) -> RelinearizationKey {
        let mut s2 = sk.value.q.clone();
        self.params.ring_q().mul_coeffs_assign(&mut s2, &sk.value.q);
        RelinearizationKey {
            key: self.gen_key_from_ntt(&s2, sk, self.params.max_level()),
        }
    }

    pub fn gen_galois_key(&mut self, galois_element: u64, sk: &SecretKey) -> GaloisKey {
        let ring_q = self.params.ring_q();
        let index = ring_q.automorphism_index(galois_element);
        let mut rotated = ring_q.new_poly_rows(ring_q.len());
        ring_q.permute_ntt(&sk.value.q, &index, &mut rotated);
        GaloisKey {
            galois_element,
            key: self.gen_key_from_ntt(&rotated, sk, self.params.max_level()),
        }
    }

    pub fn gen_galois_keys(&mut self, galois_elements: &[u64], sk: &SecretKey) -> Vec<GaloisKey> {
        debug!(count = galois_elements.len(), "generating Galois keys");
        galois_elements.iter().map(|&g| self.gen_galois_key(g, sk)).collect()
    }

    /// Relinearization key plus Galois keys for `galois_elements`.
    pub fn gen_evaluation_key_set(&mut self, sk: &SecretKey, galois_elements: &[u64]) -> EvaluationKeySet {
        let rlk = self.gen_relinearization_key(sk);
        let gks = self.gen_galois_keys(galois_elements, sk);
        EvaluationKeySet::new(Some(rlk), gks)
    }

    /// Key switching ciphertexts under `sk_in` to `sk_out`, at the maximum level.
    pub fn gen_evaluation_key(&mut self, sk_in: &SecretKey, sk_out: &SecretKey) -> Result<EvaluationKey> {
        self.gen_evaluation_key_at_level(sk_in, sk_out, self.params.max_level())
    }

    /// Key switching ciphertexts under `sk_in` to `sk_out`, up to level `level_q`.
    pub fn gen_evaluation_key_at_level(
        &mut self,
        sk_in: &SecretKey,
        sk_out: &SecretKey,
        level_q: usize,
    ) -> Result<EvaluationKey> {
        let n = self.params.n();
        if sk_in.n() != n || sk_out.n() != n {
            return Err(Error::config(format!(
                "secrets of degree {}/{} do not belong to a ring of degree {n}",
                sk_in.n(),
                sk_out.n()
            )));
        }
        if level_q > self.params.max_level() {
            return Err(Error::config(format!("key level {level_q} above {}", self.params.max_level())));
        }
        Ok(self.gen_key_from_ntt(&sk_in.value.q, sk_out, level_q))
    }

    fn gen_key_from_ntt(&mut self, s_in: &Poly, sk_out: &SecretKey, level_q: usize) -> EvaluationKey {
        let ring_q = self.params.ring_q();
        let ring_p = self.params.ring_p();
        let n = self.params.n();
        let p = self.params.special_prime();
        let rows = level_q + 1;

        let s_out_q = sk_out.value.q.at_level(level_q);
        let s_out_p = &sk_out.value.p;

        let digits = (0..rows)
            .map(|i| {
                let a = PolyQP {
                    q: sampling::uniform(&mut self.rng, ring_q, rows),
                    p: sampling::uniform(&mut self.rng, ring_p, 1),
                };

                let e = sampling::gaussian(&mut self.rng, n, self.params.sigma());
                let mut b = PolyQP {
                    q: ring_q.from_signed(&e, rows),
                    p: ring_p.from_signed(&e, 1),
                };
                ring_q.ntt(&mut b.q);
                ring_p.ntt(&mut b.p);

                let mut a_s = a.clone();
                ring_q.mul_coeffs_assign(&mut a_s.q, &s_out_q);
                ring_p.mul_coeffs_assign(&mut a_s.p, s_out_p);
                ring_q.sub_assign(&mut b.q, &a_s.q);
                ring_p.sub_assign(&mut b.p, &a_s.p);

                let m = ring_q.modulus(i);
                let gadget = m.reduce(p);
                let gadget_shoup = m.shoup(gadget);
                for (x, &s) in b.q.coeffs[i].iter_mut().zip(&s_in.coeffs[i]) {
                    *x = m.add(*x, m.mul_shoup(s, gadget, gadget_shoup));
                }

                [b, a]
            })
            .collect();

        EvaluationKey { digits }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ckks::params::ParametersLiteral;

    fn params() -> Parameters {
        Parameters::new(ParametersLiteral {
            log_n: 6,
            log_q: vec![45, 35, 35],
            log_p: vec![50],
            hamming_weight: 16,
            log_default_scale: 35,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_secret_has_requested_weight() {
        let p = params();
        let mut kgen = KeyGenerator::with_seed(&p, 1);
        let sk = kgen.gen_secret_key();
        assert_eq!(sk.hamming_weight(), 16);
        assert_eq!(sk.n(), 64);
    }

    #[test]
    fn test_key_shapes_and_sizes() {
        let p = params();
        let mut kgen = KeyGenerator::with_seed(&p, 2);
        let sk = kgen.gen_secret_key();
        let g = p.galois_element(1);
        let set = kgen.gen_evaluation_key_set(&sk, &[g]);
        let rlk = set.relinearization_key().unwrap();
        assert_eq!(rlk.level_q(), 2);
        assert_eq!(rlk.digits[0][0].q.rows(), 3);
        assert!(set.galois_key(g).is_ok());
        assert!(matches!(set.galois_key(g + 2), Err(Error::KeyMismatch(_))));
        // 3 digits · 2 polys · (3 + 1) rows · 64 coeffs · 8 bytes
        assert_eq!(rlk.binary_size(), 16 + 3 * 2 * 4 * 64 * 8);
        assert!(set.binary_size() > 2 * rlk.binary_size());
    }

    #[test]
    fn test_seeded_generation_is_deterministic() {
        let p = params();
        let sk1 = KeyGenerator::with_seed(&p, 9).gen_secret_key();
        let sk2 = KeyGenerator::with_seed(&p, 9).gen_secret_key();
        assert_eq!(sk1.coefficients(), sk2.coefficients());
    }
}
