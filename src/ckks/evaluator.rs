//! Homomorphic evaluator
//!
//! Leveled CKKS arithmetic over NTT-domain ciphertexts: additions with scale
//! matching, constant and integer products, relinearized multiplication,
//! rescaling, automorphisms (single and hoisted), generic key application and
//! the field trace. Linear transformations and polynomial evaluation extend
//! this type in their own modules.
//!
//! Key-switching scratch space lives in a `RefCell`, so an evaluator is `!Sync`.
//! Use [`Evaluator::shallow_copy`] to obtain one instance per thread; copies
//! share the parameters and keys.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive};
use rayon::prelude::*;
use rustfft::num_complex::Complex64;

use super::ciphertext::Ciphertext;
use super::encoder::Plaintext;
use super::keys::{EvaluationKey, EvaluationKeySet};
use super::keyswitch::{self, KeySwitchBuffers};
use super::params::Parameters;
use crate::error::{Error, Result};
use crate::ring::{Poly, PolyQP, RingKind};

pub struct Evaluator {
    params: Parameters,
    keys: Arc<EvaluationKeySet>,
    buffers: RefCell<KeySwitchBuffers>,
}

impl Evaluator {
    pub fn new(params: &Parameters, keys: Arc<EvaluationKeySet>) -> Self {
        Self {
            params: params.clone(),
            keys,
            buffers: RefCell::new(KeySwitchBuffers::default()),
        }
    }

    /// Evaluator sharing parameters and keys with `self` but owning fresh buffers.
    pub fn shallow_copy(&self) -> Self {
        Self::new(&self.params, Arc::clone(&self.keys))
    }

    /// Evaluator over the same parameters with a different key set.
    pub fn with_keys(&self, keys: Arc<EvaluationKeySet>) -> Self {
        Self::new(&self.params, keys)
    }

    #[inline]
    pub fn params(&self) -> &Parameters {
        &self.params
    }

    #[inline]
    pub fn keys(&self) -> &EvaluationKeySet {
        &self.keys
    }

    fn check_degree(&self, ct: &Ciphertext) -> Result<()> {
        if ct.n() != self.params.n() {
            return Err(Error::arithmetic(format!(
                "ciphertext of degree {} given to an evaluator of degree {}",
                ct.n(),
                self.params.n()
            )));
        }
        Ok(())
    }

    pub fn add(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext> {
        let mut out = a.clone();
        self.add_assign(&mut out, b)?;
        Ok(out)
    }

    pub fn sub(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext> {
        let mut out = a.clone();
        self.sub_assign(&mut out, b)?;
        Ok(out)
    }

    /// a += b at the smaller of the two levels.
    ///
    /// If the scales differ by a factor r ≥ 2, the operand with the smaller
    /// scale is first multiplied by round(r).
    pub fn add_assign(&self, a: &mut Ciphertext, b: &Ciphertext) -> Result<()> {
        self.combine_assign(a, b, false)
    }

    pub fn sub_assign(&self, a: &mut Ciphertext, b: &Ciphertext) -> Result<()> {
        self.combine_assign(a, b, true)
    }

    fn combine_assign(&self, a: &mut Ciphertext, b: &Ciphertext, subtract: bool) -> Result<()> {
        self.check_degree(a)?;
        self.check_degree(b)?;
        let level = a.level().min(b.level());
        a.drop_to_level(level);
        let mut b = b.at_level(level);
        self.match_scales(a, &mut b);

        let ring = self.params.ring_q();
        if subtract {
            ring.sub_assign(&mut a.c0, &b.c0);
            ring.sub_assign(&mut a.c1, &b.c1);
        } else {
            ring.add_assign(&mut a.c0, &b.c0);
            ring.add_assign(&mut a.c1, &b.c1);
        }
        a.log_slots = a.log_slots.max(b.log_slots);
        Ok(())
    }

    fn match_scales(&self, a: &mut Ciphertext, b: &mut Ciphertext) {
        let (hi, lo) = if a.scale >= b.scale { (&*a, &mut *b) } else { (&*b, &mut *a) };
        let ratio = (hi.scale / lo.scale).round();
        let target = hi.scale;
        if ratio >= 2.0 {
            self.mul_integer_assign(lo, ratio as i64);
            lo.scale *= ratio;
        }
        a.scale = target;
    }

    pub fn neg(&self, ct: &Ciphertext) -> Ciphertext {
        let ring = self.params.ring_q();
        let mut out = ct.clone();
        ring.neg_assign(&mut out.c0);
        ring.neg_assign(&mut out.c1);
        out
    }

    /// NTT-domain encoding of the constant `c` scaled by `scale` at `level`.
    pub(crate) fn const_poly(&self, c: Complex64, scale: f64, level: usize) -> Result<Poly> {
        let ring = self.params.ring_q();
        let re = (c.re * scale).round() as i128;
        let im = (c.im * scale).round() as i128;
        if im != 0 && self.params.ring_kind() == RingKind::ConjugateInvariant {
            return Err(Error::arithmetic("complex constant in a conjugate-invariant ring"));
        }
        let half = self.params.n() / 2;
        let mut p = ring.new_poly(level);
        for (j, row) in p.coeffs.iter_mut().enumerate() {
            let m = ring.modulus(j);
            row[0] = m.reduce_i128(re);
            if im != 0 {
                row[half] = m.reduce_i128(im);
            }
        }
        ring.ntt(&mut p);
        Ok(p)
    }

    /// ct + c.
    pub fn add_const(&self, ct: &Ciphertext, c: Complex64) -> Result<Ciphertext> {
        let mut out = ct.clone();
        self.add_const_assign(&mut out, c)?;
        Ok(out)
    }

    pub fn add_const_assign(&self, ct: &mut Ciphertext, c: Complex64) -> Result<()> {
        let p = self.const_poly(c, ct.scale, ct.level())?;
        self.params.ring_q().add_assign(&mut ct.c0, &p);
        Ok(())
    }

    /// ct · c with the constant scaled by q_ℓ, so a following rescale restores
    /// the input scale.
    pub fn mul_const(&self, ct: &Ciphertext, c: Complex64) -> Result<Ciphertext> {
        let q_level = self.params.q()[ct.level()] as f64;
        self.mul_const_with_scale(ct, c, q_level)
    }

    /// ct · c with the constant scaled by `const_scale`; the output scale is
    /// `ct.scale · const_scale`.
    pub fn mul_const_with_scale(&self, ct: &Ciphertext, c: Complex64, const_scale: f64) -> Result<Ciphertext> {
        let p = self.const_poly(c, const_scale, ct.level())?;
        let ring = self.params.ring_q();
        let mut out = ct.clone();
        ring.mul_coeffs_assign(&mut out.c0, &p);
        ring.mul_coeffs_assign(&mut out.c1, &p);
        out.scale *= const_scale;
        Ok(out)
    }

    /// acc += ct · c, scaling the constant so the product lands on `acc.scale`.
    pub fn mul_const_then_add(&self, ct: &Ciphertext, c: Complex64, acc: &mut Ciphertext) -> Result<()> {
        let const_scale = acc.scale / ct.scale;
        if const_scale < 1.0 {
            return Err(Error::arithmetic(format!(
                "accumulator scale {} below operand scale {}",
                acc.scale, ct.scale
            )));
        }
        let level = ct.level().min(acc.level());
        acc.drop_to_level(level);
        let p = self.const_poly(c, const_scale, level)?;
        let ring = self.params.ring_q();
        let src = ct.at_level(level);
        ring.mul_coeffs_then_add(&src.c0, &p, &mut acc.c0);
        ring.mul_coeffs_then_add(&src.c1, &p, &mut acc.c1);
        Ok(())
    }

    /// ct · k for a small signed integer; the scale is unchanged.
    pub fn mul_integer_assign(&self, ct: &mut Ciphertext, k: i64) {
        let ring = self.params.ring_q();
        if k < 0 {
            ring.neg_assign(&mut ct.c0);
            ring.neg_assign(&mut ct.c1);
        }
        ring.mul_scalar_assign(&mut ct.c0, k.unsigned_abs());
        ring.mul_scalar_assign(&mut ct.c1, k.unsigned_abs());
    }

    /// ct · k for an arbitrary integer; the scale is unchanged.
    pub fn mul_bigint_assign(&self, ct: &mut Ciphertext, k: &BigInt) {
        let ring = self.params.ring_q();
        let residues: Vec<u64> = ring
            .moduli()
            .take(ct.level() + 1)
            .map(|m| {
                let q = BigInt::from(m.value());
                let mut r = k % &q;
                if r.is_negative() {
                    r += &q;
                }
                r.to_u64().unwrap_or(0)
            })
            .collect();
        ring.mul_rns_scalar_assign(&mut ct.c0, &residues);
        ring.mul_rns_scalar_assign(&mut ct.c1, &residues);
    }

    /// ct · X^k (standard rings only).
    pub fn mul_monomial_assign(&self, ct: &mut Ciphertext, k: i64) -> Result<()> {
        let mono = self
            .params
            .ring_q()
            .monomial(k, ct.level())
            .ok_or_else(|| Error::arithmetic("monomial product in a conjugate-invariant ring"))?;
        let ring = self.params.ring_q();
        ring.mul_coeffs_assign(&mut ct.c0, &mono);
        ring.mul_coeffs_assign(&mut ct.c1, &mono);
        Ok(())
    }

    /// ct · i, through the monomial X^(N/2).
    pub fn mul_by_i(&self, ct: &Ciphertext) -> Result<Ciphertext> {
        let mut out = ct.clone();
        self.mul_monomial_assign(&mut out, (self.params.n() / 2) as i64)?;
        Ok(out)
    }

    /// ct · (−i).
    pub fn mul_by_neg_i(&self, ct: &Ciphertext) -> Result<Ciphertext> {
        let mut out = ct.clone();
        self.mul_monomial_assign(&mut out, -((self.params.n() / 2) as i64))?;
        Ok(out)
    }

    pub fn mul_plaintext(&self, ct: &Ciphertext, pt: &Plaintext) -> Result<Ciphertext> {
        self.check_degree(ct)?;
        let level = ct.level().min(pt.level());
        let mut out = ct.at_level(level);
        let ring = self.params.ring_q();
        ring.mul_coeffs_assign(&mut out.c0, &pt.poly);
        ring.mul_coeffs_assign(&mut out.c1, &pt.poly);
        out.scale *= pt.scale;
        Ok(out)
    }

    /// Tensor product followed by relinearization; the output is not rescaled.
    pub fn mul_relin(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext> {
        self.check_degree(a)?;
        self.check_degree(b)?;
        let rlk = self.keys.relinearization_key()?;
        let level = a.level().min(b.level());
        let a = a.at_level(level);
        let b = b.at_level(level);
        let ring = self.params.ring_q();

        let mut d0 = a.c0.clone();
        ring.mul_coeffs_assign(&mut d0, &b.c0);
        let mut d1 = a.c0.clone();
        ring.mul_coeffs_assign(&mut d1, &b.c1);
        ring.mul_coeffs_then_add(&a.c1, &b.c0, &mut d1);
        let mut d2 = a.c1.clone();
        ring.mul_coeffs_assign(&mut d2, &b.c1);

        let (k0, k1) = self.gadget_product(&d2, rlk)?;
        ring.add_assign(&mut d0, &k0);
        ring.add_assign(&mut d1, &k1);

        Ok(Ciphertext::new(
            d0,
            d1,
            a.scale * b.scale,
            a.log_slots.max(b.log_slots),
            a.ring_kind,
        ))
    }

    pub fn square(&self, ct: &Ciphertext) -> Result<Ciphertext> {
        self.mul_relin(ct, ct)
    }

    /// mul_relin followed by a rescale.
    pub fn mul_relin_rescale(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext> {
        let mut out = self.mul_relin(a, b)?;
        self.rescale_assign(&mut out)?;
        Ok(out)
    }

    /// Divide by the last prime q_ℓ with rounding; the scale is divided by q_ℓ.
    pub fn rescale(&self, ct: &Ciphertext) -> Result<Ciphertext> {
        let mut out = ct.clone();
        self.rescale_assign(&mut out)?;
        Ok(out)
    }

    pub fn rescale_assign(&self, ct: &mut Ciphertext) -> Result<()> {
        let level = ct.level();
        if level == 0 {
            return Err(Error::arithmetic("cannot rescale a ciphertext at level 0"));
        }
        self.div_round_by_last(&mut ct.c0);
        self.div_round_by_last(&mut ct.c1);
        ct.scale /= self.params.q()[level] as f64;
        Ok(())
    }

    /// Rescale as long as the scale stays above `min_scale / 2` and the level
    /// is positive.
    pub fn rescale_to(&self, ct: &Ciphertext, min_scale: f64) -> Result<Ciphertext> {
        if !(min_scale > 0.0) || !(ct.scale > 0.0) {
            return Err(Error::arithmetic("rescale_to needs positive scales"));
        }
        let mut out = ct.clone();
        let floor = min_scale / 2.0;
        while out.level() > 0 && out.scale / self.params.q()[out.level()] as f64 >= floor {
            self.rescale_assign(&mut out)?;
        }
        Ok(out)
    }

    fn div_round_by_last(&self, p: &mut Poly) {
        let ring = self.params.ring_q();
        let level = p.level();
        let from = *ring.modulus(level);
        let Some(mut last) = p.coeffs.pop() else {
            return;
        };
        ring.intt_row(level, &mut last);
        p.coeffs.par_iter_mut().enumerate().for_each(|(j, row)| {
            let m = ring.modulus(j);
            let mut t = vec![0u64; row.len()];
            ring.lift_centered_row(j, &from, &last, &mut t);
            ring.ntt_row(j, &mut t);
            let inv = m.inv(m.reduce(from.value()));
            let inv_shoup = m.shoup(inv);
            for (x, &y) in row.iter_mut().zip(&t) {
                *x = m.mul_shoup(m.sub(*x, y), inv, inv_shoup);
            }
        });
    }

    pub fn drop_level(&self, ct: &Ciphertext, levels: usize) -> Result<Ciphertext> {
        let mut out = ct.clone();
        self.drop_level_assign(&mut out, levels)?;
        Ok(out)
    }

    pub fn drop_level_assign(&self, ct: &mut Ciphertext, levels: usize) -> Result<()> {
        if levels > ct.level() {
            return Err(Error::arithmetic(format!(
                "cannot drop {levels} levels from a level-{} ciphertext",
                ct.level()
            )));
        }
        let target = ct.level() - levels;
        ct.drop_to_level(target);
        Ok(())
    }

    pub(crate) fn gadget_product(&self, c: &Poly, key: &EvaluationKey) -> Result<(Poly, Poly)> {
        let mut buffers = self.buffers.borrow_mut();
        keyswitch::gadget_product(&self.params, c, key, &mut buffers)
    }

    /// Re-encrypt `ct` under the output secret of `key`.
    pub fn apply_evaluation_key(&self, ct: &Ciphertext, key: &EvaluationKey) -> Result<Ciphertext> {
        self.check_degree(ct)?;
        let (d0, d1) = self.gadget_product(&ct.c1, key)?;
        let mut out = ct.clone();
        self.params.ring_q().add_assign(&mut out.c0, &d0);
        out.c1 = d1;
        Ok(out)
    }

    /// Apply X ↦ X^g and switch back to the original secret.
    pub fn automorphism(&self, ct: &Ciphertext, galois_element: u64) -> Result<Ciphertext> {
        self.check_degree(ct)?;
        if galois_element == 1 {
            return Ok(ct.clone());
        }
        let gk = self.keys.galois_key(galois_element)?;
        let ring = self.params.ring_q();
        let index = ring.automorphism_index(galois_element);

        let mut c0 = ring.new_poly(ct.level());
        let mut c1 = ring.new_poly(ct.level());
        ring.permute_ntt(&ct.c0, &index, &mut c0);
        ring.permute_ntt(&ct.c1, &index, &mut c1);

        let (d0, d1) = self.gadget_product(&c1, &gk.key)?;
        ring.add_assign(&mut c0, &d0);
        Ok(Ciphertext::new(c0, d1, ct.scale, ct.log_slots, ct.ring_kind))
    }

    /// Rotate the slots left by `k` (right for negative `k`).
    pub fn rotate(&self, ct: &Ciphertext, k: i64) -> Result<Ciphertext> {
        self.automorphism(ct, self.params.galois_element(k))
    }

    /// Complex conjugation of every slot.
    pub fn conjugate(&self, ct: &Ciphertext) -> Result<Ciphertext> {
        self.automorphism(ct, self.params.galois_element_for_conjugation())
    }

    /// Decomposition of `ct.c1`, shared by several hoisted automorphisms.
    pub(crate) fn decompose(&self, ct: &Ciphertext) -> Vec<PolyQP> {
        let mut digits = Vec::new();
        keyswitch::decompose_into(&self.params, &ct.c1, &mut digits);
        digits
    }

    /// Automorphism reusing a decomposition of `ct.c1` from [`Evaluator::decompose`].
    pub(crate) fn automorphism_hoisted(
        &self,
        ct: &Ciphertext,
        digits: &[PolyQP],
        galois_element: u64,
    ) -> Result<Ciphertext> {
        if galois_element == 1 {
            return Ok(ct.clone());
        }
        let gk = self.keys.galois_key(galois_element)?;
        let ring = self.params.ring_q();
        let index = ring.automorphism_index(galois_element);
        let [a0, a1] = keyswitch::accumulate(&self.params, digits, &gk.key, Some(&index))?;

        let mut c0 = ring.new_poly(ct.level());
        ring.permute_ntt(&ct.c0, &index, &mut c0);
        ring.add_assign(&mut c0, &keyswitch::mod_down(&self.params, &a0));
        let c1 = keyswitch::mod_down(&self.params, &a1);
        Ok(Ciphertext::new(c0, c1, ct.scale, ct.log_slots, ct.ring_kind))
    }

    /// Several rotations of `ct` sharing one decomposition.
    pub fn rotate_hoisted(&self, ct: &Ciphertext, rotations: &[i64]) -> Result<HashMap<i64, Ciphertext>> {
        self.check_degree(ct)?;
        let digits = self.decompose(ct);
        rotations
            .iter()
            .map(|&k| {
                let g = self.params.galois_element(k);
                Ok((k, self.automorphism_hoisted(ct, &digits, g)?))
            })
            .collect()
    }

    /// Field trace from N/2 down to 2^log_slots slots.
    ///
    /// Coefficients off the 2^log_slots slot grid are annihilated and the
    /// grid coefficients are kept unchanged; the input is pre-multiplied by the
    /// inverse of the number of summed automorphisms.
    pub fn trace(&self, ct: &Ciphertext, log_slots: usize) -> Result<Ciphertext> {
        if self.params.ring_kind() != RingKind::Standard {
            return Err(Error::arithmetic("trace is only defined over standard rings"));
        }
        let log_n = self.params.log_n();
        if log_slots >= log_n - 1 {
            return Ok(ct.clone());
        }
        let mut gap = 1u64 << (log_n - log_slots - 1);
        if log_slots == 0 {
            gap <<= 1;
        }

        let ring = self.params.ring_q();
        let inv: Vec<u64> = ring
            .moduli()
            .take(ct.level() + 1)
            .map(|m| m.inv(m.reduce(gap)))
            .collect();
        let mut out = ct.clone();
        ring.mul_rns_scalar_assign(&mut out.c0, &inv);
        ring.mul_rns_scalar_assign(&mut out.c1, &inv);

        for i in log_slots..log_n - 1 {
            let rotated = self.automorphism(&out, self.params.galois_element(1 << i))?;
            ring.add_assign(&mut out.c0, &rotated.c0);
            ring.add_assign(&mut out.c1, &rotated.c1);
        }
        if log_slots == 0 {
            let conj = self.conjugate(&out)?;
            ring.add_assign(&mut out.c0, &conj.c0);
            ring.add_assign(&mut out.c1, &conj.c1);
        }
        out.log_slots = log_slots;
        Ok(out)
    }
}
