//! Homomorphic reduction modulo 1
//!
//! After CoeffsToSlots every slot holds t/K with t = m/q0 + I for a small
//! integer I; this module maps it back to (roughly) q0·(m/q0 mod 1), that is
//! to the message with the q0-multiple removed.
//!
//! **Approximations** of (1/2π)·sin(2πt):
//! - [`Mod1Type::SinContinuous`]: Chebyshev interpolant of sin(2πx) on [−K, K]
//! - [`Mod1Type::CosDiscrete`]: interpolant of cos(2π(x − 1/4)/2^r) that is
//!   only accurate near the integers, followed by r double-angle steps
//! - [`Mod1Type::CosContinuous`]: Chebyshev interpolant of cos(2πx) on
//!   [−K/2^r, K/2^r] followed by r double-angle steps
//!
//! An optional odd monomial polynomial (the arcsine series) can be composed
//! on top to undo the sine distortion for large message ratios.

use std::sync::Arc;

use rustfft::num_complex::Complex64;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::bignum::{self, Fixed};
use crate::ckks::{Basis, Ciphertext, Evaluator, Parameters, Polynomial};
use crate::error::{Error, Result, Stage};

/// 1/(2π)
const INV_TWO_PI: f64 = 0.15915494309189535;

/// Approximation family of the mod-1 function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Mod1Type {
    #[default]
    CosDiscrete,
    SinContinuous,
    CosContinuous,
}

/// Serializable description of the mod-1 step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mod1ParametersLiteral {
    /// Level at which the evaluation starts
    pub level_q: usize,
    /// Log2 of the scale the evaluation runs at
    pub log_scale: usize,
    pub mod1_type: Mod1Type,
    /// Factor applied to the output; 0 is read as 1
    #[serde(default)]
    pub scaling: f64,
    /// Log2 of q0/|m|
    pub log_message_ratio: usize,
    /// Interpolation range [−K, K]
    pub k: usize,
    pub mod1_degree: usize,
    /// Number of double-angle steps (cosine types only)
    pub double_angle: usize,
    /// Degree of the arcsine correction; 0 disables it
    pub mod1_inv_degree: usize,
}

impl Mod1ParametersLiteral {
    /// Levels consumed by the whole mod-1 evaluation.
    pub fn depth(&self) -> usize {
        let mut depth = match self.mod1_type {
            Mod1Type::CosDiscrete => bit_len(self.mod1_degree.max((2 * self.k).saturating_sub(1))),
            _ => bit_len(self.mod1_degree),
        };
        if self.mod1_type != Mod1Type::SinContinuous {
            depth += self.double_angle;
        }
        depth + bit_len(self.mod1_inv_degree)
    }
}

pub(crate) fn bit_len(x: usize) -> usize {
    (usize::BITS - x.leading_zeros()) as usize
}

/// Mod-1 parameters with their interpolating polynomials.
#[derive(Debug, Clone)]
pub struct Mod1Parameters {
    pub level_q: usize,
    pub log_scale: usize,
    pub mod1_type: Mod1Type,
    pub log_message_ratio: usize,
    pub double_angle: usize,
    /// q0 / 2^round(log2 q0)
    pub q_diff: f64,
    /// (q_diff/2π)^(1/2^r), or 1 when the arcsine correction is enabled
    pub sqrt2pi: f64,
    pub mod1_poly: Polynomial,
    pub mod1_inv_poly: Option<Polynomial>,
    /// Unshrunk interpolation bound K
    pub k: f64,
    depth: usize,
}

impl Mod1Parameters {
    /// Build the polynomials of `lit` for the modulus chain of `params`.
    ///
    /// # Errors
    /// A configuration error for a sine approximation with double-angle
    /// steps, a discrete cosine of degree below 2(K − 1), or a level range
    /// that does not fit the chain.
    pub fn new(params: &Parameters, lit: &Mod1ParametersLiteral) -> Result<Self> {
        if lit.k == 0 || lit.mod1_degree == 0 {
            return Err(Error::config("mod1 needs K ≥ 1 and a positive degree"));
        }
        if lit.mod1_type == Mod1Type::SinContinuous && lit.double_angle != 0 {
            return Err(Error::config("double-angle steps only apply to cosine approximations"));
        }
        if lit.mod1_type == Mod1Type::CosDiscrete && lit.mod1_degree < 2 * (lit.k - 1) {
            return Err(Error::config(format!(
                "discrete cosine of degree {} needs at least 2(K − 1) = {}",
                lit.mod1_degree,
                2 * (lit.k - 1)
            )));
        }
        let depth = lit.depth();
        if lit.level_q > params.max_level() || lit.level_q < depth {
            return Err(Error::config(format!(
                "mod1 starts at level {} and consumes {depth} levels, chain has {}",
                lit.level_q,
                params.max_level()
            )));
        }

        let double_angle = match lit.mod1_type {
            Mod1Type::SinContinuous => 0,
            _ => lit.double_angle,
        };
        let sc_fac = (1u64 << double_angle) as f64;
        let k_shrunk = lit.k as f64 / sc_fac;

        let q0 = params.q()[0] as f64;
        let q_diff = q0 / q0.log2().round().exp2();
        let scaling = if lit.scaling == 0.0 { 1.0 } else { lit.scaling };

        let (sqrt2pi, mod1_inv_poly) = if lit.mod1_inv_degree > 0 {
            let mut coeffs = vec![0.0; lit.mod1_inv_degree + 1];
            coeffs[1] = INV_TWO_PI * q_diff * scaling;
            for i in (3..=lit.mod1_inv_degree).step_by(2) {
                let fi = i as f64;
                coeffs[i] = coeffs[i - 2] * (fi * fi - 4.0 * fi + 4.0) / (fi * fi - fi);
            }
            (1.0, Some(Polynomial::from_real(Basis::Monomial, &coeffs)))
        } else {
            ((INV_TWO_PI * q_diff * scaling).powf(1.0 / sc_fac), None)
        };

        let two_pi = bignum::pi().mul_i64(2);
        let mut coeffs = match lit.mod1_type {
            Mod1Type::SinContinuous => {
                let mut c = bignum::chebyshev_approximation(
                    |x: &Fixed| bignum::sin(&(x * &two_pi)),
                    -k_shrunk,
                    k_shrunk,
                    lit.mod1_degree + 1,
                );
                zero_parity(&mut c, 0);
                c
            }
            Mod1Type::CosDiscrete => {
                let dev = (1u64 << lit.log_message_ratio) as f64;
                let mut c = bignum::approximate_cos(lit.k, lit.mod1_degree, dev, double_angle);
                zero_parity(&mut c, 1);
                c
            }
            Mod1Type::CosContinuous => {
                let mut c = bignum::chebyshev_approximation(
                    |x: &Fixed| bignum::cos(&(x * &two_pi)),
                    -k_shrunk,
                    k_shrunk,
                    lit.mod1_degree + 1,
                );
                zero_parity(&mut c, 1);
                c
            }
        };
        coeffs.iter_mut().for_each(|c| *c *= sqrt2pi);
        let mod1_poly = Polynomial::from_real(Basis::Chebyshev, &coeffs).with_interval(-k_shrunk, k_shrunk);

        debug!(
            mod1_type = ?lit.mod1_type,
            degree = mod1_poly.degree(),
            depth,
            q_diff,
            "mod1 polynomial ready"
        );

        Ok(Self {
            level_q: lit.level_q,
            log_scale: lit.log_scale,
            mod1_type: lit.mod1_type,
            log_message_ratio: lit.log_message_ratio,
            double_angle,
            q_diff,
            sqrt2pi,
            mod1_poly,
            mod1_inv_poly,
            k: lit.k as f64,
            depth,
        })
    }

    /// 2^r, the factor by which the interpolation range is shrunk.
    pub fn interval_shrink_factor(&self) -> f64 {
        (1u64 << self.double_angle) as f64
    }

    pub fn k_shrunk(&self) -> f64 {
        self.k / self.interval_shrink_factor()
    }

    /// 2^log_scale
    pub fn scaling_factor(&self) -> f64 {
        (self.log_scale as f64).exp2()
    }

    /// q0/|m|
    pub fn message_ratio(&self) -> f64 {
        (1u64 << self.log_message_ratio) as f64
    }

    /// Levels consumed by [`Mod1Evaluator::evaluate`].
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Level of the output ciphertext.
    pub fn output_level(&self) -> usize {
        self.level_q - self.depth
    }
}

/// Zero every coefficient whose index has the given parity.
fn zero_parity(coeffs: &mut [f64], parity: usize) {
    coeffs.iter_mut().enumerate().filter(|(i, _)| i & 1 == parity).for_each(|(_, c)| *c = 0.0);
}

/// Evaluator of the mod-1 step.
pub struct Mod1Evaluator {
    eval: Evaluator,
    parameters: Arc<Mod1Parameters>,
}

impl Mod1Evaluator {
    pub fn new(eval: Evaluator, parameters: Arc<Mod1Parameters>) -> Self {
        Self { eval, parameters }
    }

    pub fn parameters(&self) -> &Mod1Parameters {
        &self.parameters
    }

    /// Copy with fresh scratch buffers, sharing keys and polynomials.
    pub fn shallow_copy(&self) -> Self {
        Self {
            eval: self.eval.shallow_copy(),
            parameters: Arc::clone(&self.parameters),
        }
    }

    /// x mod 1 on every slot.
    pub fn evaluate(&self, ct: &Ciphertext) -> Result<Ciphertext> {
        self.evaluate_and_scale(ct, Complex64::new(1.0, 0.0))
    }

    /// x mod 1 on every slot, with the output multiplied by `scaling`.
    ///
    /// The input must be at level at least `level_q` (it is dropped to it);
    /// the output is at `level_q − depth` and carries the input scale.
    #[instrument(skip_all, fields(level = ct.level()))]
    pub fn evaluate_and_scale(&self, ct: &Ciphertext, scaling: Complex64) -> Result<Ciphertext> {
        let evm = &*self.parameters;
        let eval = &self.eval;
        let q = eval.params().q();

        if ct.level() < evm.level_q {
            return Err(Error::level(
                Stage::Mod1,
                format!("input at level {} below the mod1 start level {}", ct.level(), evm.level_q),
            ));
        }
        let mut res = ct.at_level(evm.level_q);
        res.scale = evm.scaling_factor();

        let poly_depth = evm.mod1_poly.depth();
        let mut target_scale = res.scale;
        for i in 0..evm.double_angle {
            let qi = q[evm.level_q - poly_depth - evm.double_angle + i + 1] as f64;
            target_scale = (target_scale * qi).sqrt();
        }

        if evm.mod1_type != Mod1Type::SinContinuous {
            let width = (evm.mod1_poly.b - evm.mod1_poly.a) * evm.interval_shrink_factor();
            eval.add_const_assign(&mut res, Complex64::new(-0.5 / width, 0.0))?;
        }

        let mut sqrt2pi = Complex64::new(evm.sqrt2pi, 0.0);
        let mut mod1_poly = evm.mod1_poly.clone();
        if evm.mod1_inv_poly.is_none() {
            let s = scaling.powf(1.0 / evm.interval_shrink_factor());
            mod1_poly.coeffs.iter_mut().for_each(|c| *c *= s);
            sqrt2pi *= s;
        }

        // The Chebyshev variable lives in [−1, 1]: the C2S scaling by 1/K and
        // the offset above already place the slots there.
        res = eval.evaluate_polynomial(&res, &mod1_poly, target_scale)?;

        for _ in 0..evm.double_angle {
            sqrt2pi *= sqrt2pi;
            res = eval.mul_relin(&res, &res)?;
            let doubled = res.clone();
            eval.add_assign(&mut res, &doubled)?;
            eval.add_const_assign(&mut res, -sqrt2pi)?;
            eval.rescale_assign(&mut res)?;
        }

        if let Some(inv) = &evm.mod1_inv_poly {
            let mut inv = inv.clone();
            inv.coeffs.iter_mut().for_each(|c| *c *= scaling);
            res = eval.evaluate_polynomial(&res, &inv, res.scale)?;
        }

        let out_level = evm.output_level();
        if res.level() < out_level {
            return Err(Error::level(
                Stage::Mod1,
                format!("evaluation ended at level {} below {out_level}", res.level()),
            ));
        }
        res.drop_to_level(out_level);
        res.scale = ct.scale;
        Ok(res)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_counts_each_component() {
        let lit = Mod1ParametersLiteral {
            level_q: 12,
            log_scale: 60,
            mod1_type: Mod1Type::CosDiscrete,
            scaling: 0.0,
            log_message_ratio: 8,
            k: 16,
            mod1_degree: 30,
            double_angle: 3,
            mod1_inv_degree: 0,
        };
        // bitlen(max(30, 31)) + 3
        assert_eq!(lit.depth(), 8);

        let sin = Mod1ParametersLiteral {
            mod1_type: Mod1Type::SinContinuous,
            mod1_degree: 127,
            mod1_inv_degree: 7,
            ..lit.clone()
        };
        assert_eq!(sin.depth(), 7 + 3);
    }

    #[test]
    fn test_bit_len() {
        assert_eq!(bit_len(0), 0);
        assert_eq!(bit_len(1), 1);
        assert_eq!(bit_len(30), 5);
        assert_eq!(bit_len(32), 6);
    }

    #[test]
    fn test_zero_parity() {
        let mut c = vec![1.0, 2.0, 3.0, 4.0];
        zero_parity(&mut c, 1);
        assert_eq!(c, vec![1.0, 0.0, 3.0, 0.0]);
    }
}
