//! Iterative refinement of a bootstrapped ciphertext (META-BTS)
//!
//! One bootstrap returns the message with roughly `p` bits of precision.
//! Each iteration bootstraps the amplified error (out − in)·2^p, scales it
//! back down and subtracts it, so the precision grows by the next entry of
//! the schedule. The scaling down is exact in integers when the scales allow
//! it; otherwise it is a constant product followed by a rescale, which
//! consumes the reserved prime kept just above the residual chain.

use num_bigint::BigInt;
use num_traits::FromPrimitive;
use rustfft::num_complex::Complex64;
use tracing::{debug, instrument};

use super::evaluator::Evaluator;
use super::parameters::IterationsParameters;
use crate::ckks::Ciphertext;
use crate::error::{Error, Result, Stage};

fn to_bigint(x: f64) -> Result<BigInt> {
    BigInt::from_f64(x.round())
        .ok_or_else(|| Error::level(Stage::Refinement, format!("{x} is not a finite integer factor")))
}

/// Runs a precision schedule on top of a bootstrapping evaluator.
pub struct IterativeRefiner<'a> {
    eval: &'a Evaluator,
    schedule: &'a IterationsParameters,
}

impl<'a> IterativeRefiner<'a> {
    pub fn new(eval: &'a Evaluator, schedule: &'a IterationsParameters) -> Self {
        Self { eval, schedule }
    }

    /// Bootstrap `ct` and refine the result through every iteration.
    pub fn refine(&self, ct: &Ciphertext) -> Result<Ciphertext> {
        self.refine_with(ct, |_, _| {})
    }

    /// Same as [`IterativeRefiner::refine`], handing every intermediate
    /// result to `observe`: index 0 is the plain bootstrap, index i the
    /// result after the i-th correction.
    ///
    /// # Errors
    /// A [`Stage::Refinement`] level error when an iteration cannot scale the
    /// correction down: round(diff / 2^p) < 1 without a reserved prime, or a
    /// ratio below 1/q_reserved with one.
    #[instrument(skip_all, fields(iterations = self.schedule.bootstrapping_precision.len()))]
    pub fn refine_with(&self, ct: &Ciphertext, mut observe: impl FnMut(usize, &Ciphertext)) -> Result<Ciphertext> {
        let ckks = &self.eval.ckks;
        let params = self.eval.parameters();

        let (mut out, err_scale) = self.eval.bootstrap_once(ct)?;

        // Factor bringing the output back to the input scale.
        let diff_scale = ct.scale / (out.scale * err_scale);
        ckks.mul_bigint_assign(&mut out, &to_bigint(diff_scale)?);
        out.scale = ct.scale;
        observe(0, &out);

        let reserved = (self.schedule.reserved_prime_bit_size != 0)
            .then(|| params.bootstrapping.q()[params.residual.max_level() + 1] as f64);
        let last = self.schedule.bootstrapping_precision.len().saturating_sub(1);

        let mut total_log_prec = 0.0;
        for (i, &log_prec) in self.schedule.bootstrapping_precision.iter().enumerate() {
            total_log_prec += log_prec;
            let mut prec = total_log_prec.exp2().round();

            // Make diff/prec · q_reserved as close to an integer as possible
            // so the last correction loses no precision.
            if let (Some(q_reserved), true) = (reserved, i == last) {
                let rounded = (diff_scale / prec * q_reserved).round();
                if rounded >= 1.0 {
                    prec = (diff_scale * q_reserved / rounded).round();
                }
            }

            let down = (diff_scale / prec).round();
            if down < 1.0 && reserved.is_none() {
                return Err(Error::level(
                    Stage::Refinement,
                    format!(
                        "iteration {}: round(diff / 2^{total_log_prec}) < 1 and no reserved prime",
                        i + 1
                    ),
                ));
            }

            let mut tmp = ckks.sub(&out, ct).map_err(|e| e.at(Stage::Refinement))?;
            ckks.mul_bigint_assign(&mut tmp, &to_bigint(prec)?);
            tmp.scale = out.scale;

            let (mut tmp, err) = self.eval.bootstrap_once(&tmp)?;
            tmp.scale *= err;

            match reserved {
                None => ckks.mul_bigint_assign(&mut tmp, &to_bigint(down)?),
                Some(q_reserved) => {
                    let ratio = diff_scale / prec;
                    if ratio * q_reserved < 1.0 {
                        return Err(Error::level(
                            Stage::Refinement,
                            format!("iteration {}: maximum precision reached", i + 1),
                        ));
                    }
                    tmp = ckks
                        .mul_const(&tmp, Complex64::new(ratio, 0.0))
                        .and_then(|t| ckks.rescale(&t))
                        .map_err(|e| e.at(Stage::Refinement))?;
                }
            }

            tmp.scale = out.scale;
            ckks.sub_assign(&mut out, &tmp).map_err(|e| e.at(Stage::Refinement))?;
            debug!(iteration = i + 1, total_log_prec, level = out.level(), "refinement step");
            observe(i + 1, &out);
        }

        out.drop_to_level(out.level().min(params.residual.max_level()));
        Ok(out)
    }
}
