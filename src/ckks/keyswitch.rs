//! Hybrid key switching with a single special prime P
//!
//! A polynomial c at level ℓ is decomposed into ℓ+1 digits: digit i is the
//! centered residue of c modulo q_i lifted to every prime of Q_ℓ ∪ {P}. An
//! evaluation key from s_in to s_out stores, for every digit i,
//!
//! ```text
//! (b_i, a_i)  with  b_i = −a_i·s_out + e_i + [P mod q_i]·s_in  (only on row q_i)
//! ```
//!
//! so Σ digit_i · (b_i, a_i) ≈ P·c·s_in − (Σ digit_i·a_i)·s_out over QP, and a
//! final division by P (`mod_down`) yields the switched pair.

use rayon::prelude::*;

use super::keys::EvaluationKey;
use super::params::Parameters;
use crate::error::{Error, Result};
use crate::ring::{Poly, PolyQP};

/// Scratch space reused across key switches of one evaluator.
#[derive(Debug, Default)]
pub(crate) struct KeySwitchBuffers {
    pub digits: Vec<PolyQP>,
}

/// Decompose the NTT-domain polynomial `c` into NTT-domain digits over Q_ℓ ∪ P.
pub(crate) fn decompose_into(params: &Parameters, c: &Poly, digits: &mut Vec<PolyQP>) {
    let ring_q = params.ring_q();
    let ring_p = params.ring_p();
    let level = c.level();
    let n = params.n();

    let mut coeff = c.clone();
    ring_q.intt(&mut coeff);

    digits.resize_with(level + 1, || PolyQP::zero(n, level + 1, 1));
    digits.par_iter_mut().enumerate().for_each(|(i, digit)| {
        let from = ring_q.modulus(i);
        digit.q.coeffs.resize_with(level + 1, || vec![0u64; n]);
        digit.q.coeffs.truncate(level + 1);
        for (j, row) in digit.q.coeffs.iter_mut().enumerate() {
            if j == i {
                row.copy_from_slice(&c.coeffs[i]);
            } else {
                ring_q.lift_centered_row(j, from, &coeff.coeffs[i], row);
                ring_q.ntt_row(j, row);
            }
        }
        ring_p.lift_centered_row(0, from, &coeff.coeffs[i], &mut digit.p.coeffs[0]);
        ring_p.ntt_row(0, &mut digit.p.coeffs[0]);
    });
}

/// Σ digit_i ⊙ key_i over QP, optionally reading the digits through an NTT
/// automorphism index (hoisted rotations).
pub(crate) fn accumulate(
    params: &Parameters,
    digits: &[PolyQP],
    key: &EvaluationKey,
    index: Option<&[usize]>,
) -> Result<[PolyQP; 2]> {
    let level = digits.len().saturating_sub(1);
    if key.level_q() < level {
        return Err(Error::arithmetic(format!(
            "evaluation key at level {} cannot switch a level-{level} ciphertext",
            key.level_q()
        )));
    }
    let ring_q = params.ring_q();
    let ring_p = params.ring_p();
    let n = params.n();

    let mut acc = [PolyQP::zero(n, level + 1, 1), PolyQP::zero(n, level + 1, 1)];
    let permuted;
    let digits: &[PolyQP] = match index {
        Some(idx) => {
            permuted = digits
                .iter()
                .map(|d| {
                    let mut out = PolyQP::zero(n, d.q.rows(), 1);
                    ring_q.permute_ntt(&d.q, idx, &mut out.q);
                    ring_p.permute_ntt(&d.p, idx, &mut out.p);
                    out
                })
                .collect::<Vec<_>>();
            &permuted
        }
        None => digits,
    };

    for (digit, pair) in digits.iter().zip(&key.digits) {
        for (a, k) in acc.iter_mut().zip(pair) {
            ring_q.mul_coeffs_then_add(&digit.q, &k.q, &mut a.q);
            ring_p.mul_coeffs_then_add(&digit.p, &k.p, &mut a.p);
        }
    }
    Ok(acc)
}

/// Divide a QP polynomial by P with rounding, returning its Q part.
pub(crate) fn mod_down(params: &Parameters, x: &PolyQP) -> Poly {
    let ring_q = params.ring_q();
    let ring_p = params.ring_p();
    let p_mod = ring_p.modulus(0);
    let p = p_mod.value();

    let mut t = x.p.clone();
    ring_p.intt(&mut t);

    let mut out = x.q.clone();
    out.coeffs.par_iter_mut().enumerate().for_each(|(j, row)| {
        let m = ring_q.modulus(j);
        let mut tj = vec![0u64; row.len()];
        ring_q.lift_centered_row(j, p_mod, &t.coeffs[0], &mut tj);
        ring_q.ntt_row(j, &mut tj);
        let p_inv = m.inv(m.reduce(p));
        let p_inv_shoup = m.shoup(p_inv);
        for (v, &y) in row.iter_mut().zip(&tj) {
            *v = m.mul_shoup(m.sub(*v, y), p_inv, p_inv_shoup);
        }
    });
    out
}

/// Key switch `c` (NTT, level ℓ) with `key`, returning (d0, d1) at level ℓ.
pub(crate) fn gadget_product(
    params: &Parameters,
    c: &Poly,
    key: &EvaluationKey,
    buffers: &mut KeySwitchBuffers,
) -> Result<(Poly, Poly)> {
    decompose_into(params, c, &mut buffers.digits);
    let [a0, a1] = accumulate(params, &buffers.digits, key, None)?;
    Ok((mod_down(params, &a0), mod_down(params, &a1)))
}
