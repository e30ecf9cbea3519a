//! The bootstrapping circuit
//!
//! ```text
//! residual ring, low level                               residual ring, output level
//!   │ pack (N1) → switch N1→N2 → pack (N2)                 ▲ unpack (N2) → switch N2→N1 → unpack (N1)
//!   ▼                                                      │
//!   ScaleDown → ModUp → CoeffsToSlots → Mod1 → SlotsToCoeffs
//! ```
//!
//! Conjugate-invariant residual rings replace the ring switch by a domain
//! switch and bootstrap two ciphertexts at once, one in the real part and
//! one in the imaginary part.

use std::fmt;
use std::sync::Arc;

use num_bigint::{BigInt, BigUint};
use num_traits::{FromPrimitive, ToPrimitive};
use rayon::prelude::*;
use rustfft::num_complex::Complex64;
use tracing::{debug, info, instrument};

use super::dft::{DftEvaluator, DftMatrix};
use super::iterative::IterativeRefiner;
use super::keys::BootstrappingKeys;
use super::mod1::{Mod1Evaluator, Mod1Parameters};
use super::packing::Packer;
use super::parameters::{BootstrappingParameters, CircuitOrder};
use super::switching::{DomainSwitcher, RingSwitcher};
use crate::ckks::{self, Ciphertext, Encoder};
use crate::error::{Error, Result, Stage, StageExt};
use crate::ring::{Poly, RingKind};

fn to_f64(x: &BigUint) -> f64 {
    x.to_f64().unwrap_or(f64::INFINITY)
}

/// Bootstrapping evaluator.
///
/// Scratch space lives in the embedded CKKS evaluators, so an instance must
/// not be shared between threads; [`Evaluator::shallow_copy`] gives each
/// thread its own, sharing keys and encoded matrices.
pub struct Evaluator {
    /// Evaluator of the bootstrapping ring
    pub ckks: ckks::Evaluator,
    pub dft: DftEvaluator,
    pub mod1: Mod1Evaluator,
    /// Present for conjugate-invariant residual rings
    pub domain_switcher: Option<DomainSwitcher>,
    ring_switcher: Option<RingSwitcher>,
    residual_packer: Option<Packer>,
    packer: Packer,
    coeffs_to_slots: Arc<DftMatrix>,
    slots_to_coeffs: Arc<DftMatrix>,
    params: Arc<BootstrappingParameters>,
    keys: Arc<BootstrappingKeys>,
}

impl fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Evaluator")
            .field("residual_log_n", &self.params.residual.log_n())
            .field("log_n", &self.params.bootstrapping.log_n())
            .field("log_slots", &self.params.log_max_slots())
            .field("circuit_order", &self.params.circuit_order)
            .field("depth", &self.depth())
            .finish_non_exhaustive()
    }
}

impl Evaluator {
    /// Encode the DFT matrices, build the mod-1 polynomials and check the keys.
    ///
    /// # Errors
    /// - a configuration error when the stage levels do not chain for the
    ///   circuit order, or a stage literal does not fit the chain
    /// - a missing-key error when `keys` lacks a key the circuit uses
    pub fn new(params: &BootstrappingParameters, keys: BootstrappingKeys) -> Result<Self> {
        check_chain(params)?;
        keys.check(params)?;
        let btp = &params.bootstrapping;
        let residual = &params.residual;

        let mod1_params = Mod1Parameters::new(btp, &params.mod1)?;

        // Room left by the mod-1 scale for a free division by the message ratio.
        let q0 = btp.q()[0] as f64;
        let q_div = (mod1_params.scaling_factor() / q0.log2().round().exp2()).min(1.0);

        let mut c2s = params.coeffs_to_slots.clone();
        let c2s_scaling = Complex64::new(q_div / (mod1_params.k * mod1_params.q_diff), 0.0);
        c2s.scaling = Some(c2s.scaling.map_or(c2s_scaling, |s| s * c2s_scaling));

        let mut s2c = params.slots_to_coeffs.clone();
        let mut s2c_factor = btp.default_scale() / (mod1_params.scaling_factor() / mod1_params.message_ratio());
        if residual.ring_kind() == RingKind::ConjugateInvariant {
            // Cancels the doubling of the complex to real switch.
            s2c_factor *= 0.5;
        }
        let s2c_scaling = Complex64::new(s2c_factor, 0.0);
        s2c.scaling = Some(s2c.scaling.map_or(s2c_scaling, |s| s * s2c_scaling));

        let encoder = Encoder::new(btp);
        let coeffs_to_slots = Arc::new(DftMatrix::new(btp, &c2s, &encoder)?);
        let slots_to_coeffs = Arc::new(DftMatrix::new(btp, &s2c, &encoder)?);

        let (domain_switcher, ring_switcher, residual_packer) = match residual.ring_kind() {
            RingKind::ConjugateInvariant => {
                let switcher = DomainSwitcher::new(
                    btp,
                    residual,
                    keys.complex_to_real.clone(),
                    keys.real_to_complex.clone(),
                )?;
                (Some(switcher), None, None)
            }
            RingKind::Standard => {
                let switcher = RingSwitcher::new(residual, btp, keys.ring_up.clone(), keys.ring_down.clone())?;
                let packer = Packer::new(residual)?.with_log_max_slots(params.log_max_slots());
                (None, Some(switcher), Some(packer))
            }
        };
        let packer = Packer::new(btp)?.with_log_max_slots(params.log_max_slots());

        let ckks = ckks::Evaluator::new(btp, Arc::clone(&keys.evaluation_keys));
        let dft = DftEvaluator::new(ckks.shallow_copy());
        let mod1 = Mod1Evaluator::new(ckks.shallow_copy(), Arc::new(mod1_params));

        info!(
            residual_log_n = residual.log_n(),
            log_n = btp.log_n(),
            log_slots = params.log_max_slots(),
            depth = btp.max_level() - residual.max_level(),
            key_bytes = keys.binary_size(),
            "bootstrapping evaluator ready"
        );

        Ok(Self {
            ckks,
            dft,
            mod1,
            domain_switcher,
            ring_switcher,
            residual_packer,
            packer,
            coeffs_to_slots,
            slots_to_coeffs,
            params: Arc::new(params.clone()),
            keys: Arc::new(keys),
        })
    }

    /// Evaluator sharing every read-only structure with `self`, with its own
    /// scratch space.
    pub fn shallow_copy(&self) -> Self {
        Self {
            ckks: self.ckks.shallow_copy(),
            dft: self.dft.shallow_copy(),
            mod1: self.mod1.shallow_copy(),
            domain_switcher: self.domain_switcher.clone(),
            ring_switcher: self.ring_switcher.clone(),
            residual_packer: self.residual_packer.clone(),
            packer: self.packer.clone(),
            coeffs_to_slots: Arc::clone(&self.coeffs_to_slots),
            slots_to_coeffs: Arc::clone(&self.slots_to_coeffs),
            params: Arc::clone(&self.params),
            keys: Arc::clone(&self.keys),
        }
    }

    pub fn parameters(&self) -> &BootstrappingParameters {
        &self.params
    }

    pub fn keys(&self) -> &BootstrappingKeys {
        &self.keys
    }

    pub fn coeffs_to_slots_matrix(&self) -> &DftMatrix {
        &self.coeffs_to_slots
    }

    pub fn slots_to_coeffs_matrix(&self) -> &DftMatrix {
        &self.slots_to_coeffs
    }

    /// Lowest level accepted by [`Evaluator::bootstrap`].
    pub fn minimum_input_level(&self) -> usize {
        self.params.bootstrapping.levels_consumed_per_rescaling()
    }

    /// Level of every bootstrapped ciphertext.
    pub fn output_level(&self) -> usize {
        self.params.residual.max_level()
    }

    /// Levels consumed by the circuit in the bootstrapping ring.
    pub fn depth(&self) -> usize {
        self.params.bootstrapping.max_level() - self.params.residual.max_level()
    }

    /// Refresh one ciphertext of the residual ring.
    pub fn bootstrap(&self, ct: &Ciphertext) -> Result<Ciphertext> {
        self.bootstrap_many(vec![ct.clone()])?
            .pop()
            .ok_or_else(|| Error::arithmetic("bootstrapping returned no ciphertext"))
    }

    /// Refresh several ciphertexts of the residual ring.
    ///
    /// Standard residual ciphertexts with sparse slots are packed together
    /// before the circuit and unpacked after it; conjugate-invariant ones
    /// are bootstrapped in pairs. The outputs are in input order, at
    /// [`Evaluator::output_level`], with the residual default scale.
    #[instrument(skip_all, fields(count = cts.len()))]
    pub fn bootstrap_many(&self, cts: Vec<Ciphertext>) -> Result<Vec<Ciphertext>> {
        if cts.is_empty() {
            return Ok(cts);
        }
        let mut out = match self.params.residual.ring_kind() {
            RingKind::ConjugateInvariant => {
                let mut out = Vec::with_capacity(cts.len());
                let mut pending = cts.into_iter();
                while let Some(left) = pending.next() {
                    let right = pending.next();
                    let (l, r) = self.bootstrap_conjugate_invariant(&left, right.as_ref())?;
                    out.push(l);
                    out.extend(r);
                }
                out
            }
            RingKind::Standard => {
                let log_slots = cts[0].log_slots;
                let count = cts.len();
                let packed = self.pack_and_switch_up(cts)?;
                let refreshed = packed.iter().map(|ct| self.evaluate(ct)).collect::<Result<Vec<_>>>()?;
                self.unpack_and_switch_down(refreshed, log_slots, count)?
            }
        };
        let scale = self.params.residual.default_scale();
        out.iter_mut().for_each(|ct| ct.scale = scale);
        Ok(out)
    }

    /// Refresh a pair of conjugate-invariant ciphertexts with one circuit
    /// evaluation: `left` travels in the real part and `right` in the
    /// imaginary part of a standard ciphertext of twice the degree.
    #[instrument(skip_all)]
    pub fn bootstrap_conjugate_invariant(
        &self,
        left: &Ciphertext,
        right: Option<&Ciphertext>,
    ) -> Result<(Ciphertext, Option<Ciphertext>)> {
        let switcher = self
            .domain_switcher
            .as_ref()
            .ok_or_else(|| Error::config("conjugate-invariant bootstrapping needs a conjugate-invariant residual ring"))?;
        let ckks = &self.ckks;

        let mut joined = switcher.real_to_complex(ckks, left).stage(Stage::DomainSwitch)?;
        if let Some(right) = right {
            let right = switcher.real_to_complex(ckks, right).stage(Stage::DomainSwitch)?;
            let right = ckks.mul_by_i(&right).stage(Stage::DomainSwitch)?;
            ckks.add_assign(&mut joined, &right).stage(Stage::DomainSwitch)?;
        }

        let mut refreshed = self.evaluate(&joined)?;
        refreshed.scale *= 0.5;

        let left = switcher.complex_to_real(ckks, &refreshed).stage(Stage::DomainSwitch)?;
        let right = match right {
            Some(_) => {
                let rotated = ckks.mul_by_neg_i(&refreshed).stage(Stage::DomainSwitch)?;
                Some(switcher.complex_to_real(ckks, &rotated).stage(Stage::DomainSwitch)?)
            }
            None => None,
        };
        Ok((left, right))
    }

    /// Refresh a ciphertext of the bootstrapping ring, running the
    /// refinement schedule when one is configured. The output is at
    /// [`Evaluator::output_level`].
    pub fn evaluate(&self, ct: &Ciphertext) -> Result<Ciphertext> {
        let mut out = match &self.params.iterations {
            Some(schedule) => IterativeRefiner::new(self, schedule).refine(ct)?,
            None => self.bootstrap_once(ct)?.0,
        };
        let level = self.output_level();
        if out.level() < level {
            return Err(Error::level(
                Stage::SlotsToCoeffs,
                format!("circuit ended at level {} below the output level {level}", out.level()),
            ));
        }
        out.drop_to_level(level);
        Ok(out)
    }

    /// One pass of the circuit. Also returns the rescaling error of
    /// ScaleDown, the ratio between the scale reached and Q0/message_ratio.
    #[instrument(skip_all, fields(level = ct.level(), log_slots = ct.log_slots))]
    pub(crate) fn bootstrap_once(&self, ct: &Ciphertext) -> Result<(Ciphertext, f64)> {
        let log_slots = ct.log_slots;
        let spread = self.sparse_spread(log_slots);
        let scaling = Complex64::new(spread, 0.0);
        let mut ct = ct.clone();
        ct.scale *= spread;
        let ct = &ct;

        let (mut out, err_scale) = match self.params.circuit_order {
            CircuitOrder::DecodeThenModUp => {
                let decoded = self.slots_to_coeffs(ct, None)?;
                let (scaled, err_scale) = self.scale_down(&decoded)?;
                let raised = self.mod_up(&scaled)?;
                let (real, imag) = self.coeffs_to_slots(&raised)?;
                let mut out = self.eval_mod_and_scale(&real, scaling)?;
                if let Some(imag) = imag {
                    let imag = self.eval_mod_and_scale(&imag, scaling)?;
                    let imag = self.ckks.mul_by_i(&imag).stage(Stage::Mod1)?;
                    self.ckks.add_assign(&mut out, &imag).stage(Stage::Mod1)?;
                }
                (out, err_scale)
            }
            CircuitOrder::ModUpThenEncode | CircuitOrder::Custom => {
                let (scaled, err_scale) = self.scale_down(ct)?;
                let raised = self.mod_up(&scaled)?;
                let (real, imag) = self.coeffs_to_slots(&raised)?;
                let real = self.eval_mod_and_scale(&real, scaling)?;
                let imag = imag.map(|imag| self.eval_mod_and_scale(&imag, scaling)).transpose()?;
                (self.slots_to_coeffs(&real, imag.as_ref())?, err_scale)
            }
        };
        out.log_slots = log_slots;
        debug!(level = out.level(), scale = out.scale, err_scale, spread, "circuit pass done");
        Ok((out, err_scale))
    }

    /// Factor by which a message on 2^log_slots slots is shrunk before
    /// ScaleDown and restored by Mod1.
    ///
    /// A coefficient of a message on n slots is about sqrt(n_max/n) times
    /// larger than one of a message on every slot, and the mod-1 error grows
    /// with its square. Shrinking by that ratio keeps the coefficients, and
    /// the mod-1 error, at the size of a fully packed message.
    pub fn sparse_spread(&self, log_slots: usize) -> f64 {
        let gap = self.params.log_max_slots().saturating_sub(log_slots);
        (gap as f64 / 2.0).exp2()
    }

    /// Bring `ct` to level 0 with scale Q0/message_ratio.
    ///
    /// Levels are dropped while Q_(ℓ−1) still covers scale·message_ratio;
    /// the ciphertext is then multiplied by round(Q_ℓ/(scale·ratio)) and
    /// rescaled down. Returns the residual scale error.
    #[instrument(skip_all, fields(level = ct.level()))]
    pub fn scale_down(&self, ct: &Ciphertext) -> Result<(Ciphertext, f64)> {
        let btp = &self.params.bootstrapping;
        let ratio = self.mod1.parameters().message_ratio();
        if ct.level() < self.minimum_input_level() {
            return Err(Error::level(
                Stage::ScaleDown,
                format!(
                    "input at level {} below the minimum {}",
                    ct.level(),
                    self.minimum_input_level()
                ),
            ));
        }

        let mut out = ct.clone();
        let target = out.scale * ratio;
        while out.level() > 0 && to_f64(&btp.modulus_at_level(out.level() - 1)) >= target {
            out.drop_to_level(out.level() - 1);
        }

        let scale_up = to_f64(&btp.modulus_at_level(out.level())) / target;
        if scale_up < 0.5 {
            return Err(Error::level(
                Stage::ScaleDown,
                format!("Q/scale = {:e} below Q0/(2·ratio)", scale_up * ratio),
            ));
        }
        let factor = BigInt::from_f64(scale_up.round())
            .ok_or_else(|| Error::level(Stage::ScaleDown, "scale-up factor is not finite"))?;
        self.ckks.mul_bigint_assign(&mut out, &factor);
        out.scale *= scale_up.round();

        let q0_ratio = btp.q()[0] as f64 / ratio;
        if out.level() > 0 {
            out = self.ckks.rescale_to(&out, q0_ratio).stage(Stage::ScaleDown)?;
        }
        // Only the residues modulo q0 matter from here on.
        out.drop_to_level(0);
        let err_scale = out.scale / q0_ratio;
        Ok((out, err_scale))
    }

    /// Lift a level-0 ciphertext to the full chain of the bootstrapping ring.
    ///
    /// The coefficients are reduced into every prime from their centered
    /// representative modulo q0, which adds q0·I to the message. The scale
    /// is then raised to the mod-1 scale over the message ratio and, for a
    /// sparse circuit, off-grid coefficients are cleared by a trace.
    #[instrument(skip_all, fields(log_slots = ct.log_slots))]
    pub fn mod_up(&self, ct: &Ciphertext) -> Result<Ciphertext> {
        let btp = &self.params.bootstrapping;
        if ct.log_slots > self.params.log_max_slots() {
            return Err(Error::level(
                Stage::ModUp,
                format!(
                    "{} log-slots exceed the {} the circuit refreshes",
                    ct.log_slots,
                    self.params.log_max_slots()
                ),
            ));
        }
        let mut ct = ct.at_level(0);
        if let Some(key) = &self.keys.dense_to_sparse {
            ct = self.ckks.apply_evaluation_key(&ct, key).stage(Stage::ModUp)?;
        }

        let ring = btp.ring_q();
        let q0 = *ring.modulus(0);
        let lift = |p: &Poly| {
            let mut row0 = p.coeffs[0].clone();
            ring.intt_row(0, &mut row0);
            let mut out = ring.new_poly(btp.max_level());
            out.coeffs.par_iter_mut().enumerate().for_each(|(i, row)| {
                ring.lift_centered_row(i, &q0, &row0, row);
                ring.ntt_row(i, row);
            });
            out
        };
        let mut out = Ciphertext::new(lift(&ct.c0), lift(&ct.c1), ct.scale, ct.log_slots, RingKind::Standard);

        if let Some(key) = &self.keys.sparse_to_dense {
            out = self.ckks.apply_evaluation_key(&out, key).stage(Stage::ModUp)?;
        }

        let mod1 = self.mod1.parameters();
        let factor = (mod1.scaling_factor() / mod1.message_ratio()) / out.scale;
        if factor > 1.0 {
            let k = BigInt::from_f64(factor.round())
                .ok_or_else(|| Error::level(Stage::ModUp, "scale-up factor is not finite"))?;
            self.ckks.mul_bigint_assign(&mut out, &k);
            out.scale *= factor.round();
        }

        // Clears the coefficients the circuit does not decode; the message
        // keeps its own slot count.
        let log_slots = self.params.log_max_slots();
        if log_slots < btp.log_max_slots() {
            let kept = out.log_slots;
            out = self.ckks.trace(&out, log_slots).stage(Stage::ModUp)?;
            out.log_slots = kept;
        }
        Ok(out)
    }

    /// Homomorphic decoding of the lifted coefficients.
    pub fn coeffs_to_slots(&self, ct: &Ciphertext) -> Result<(Ciphertext, Option<Ciphertext>)> {
        self.dft
            .coeffs_to_slots(ct, &self.coeffs_to_slots)
            .stage(Stage::CoeffsToSlots)
    }

    /// Reduce the slots modulo 1; the output carries the default scale of
    /// the bootstrapping ring.
    pub fn eval_mod(&self, ct: &Ciphertext) -> Result<Ciphertext> {
        self.eval_mod_and_scale(ct, Complex64::new(1.0, 0.0))
    }

    /// [`Evaluator::eval_mod`] with the output multiplied by `scaling`.
    pub fn eval_mod_and_scale(&self, ct: &Ciphertext, scaling: Complex64) -> Result<Ciphertext> {
        let mut out = self.mod1.evaluate_and_scale(ct, scaling).stage(Stage::Mod1)?;
        out.scale = self.params.bootstrapping.default_scale();
        Ok(out)
    }

    /// Homomorphic encoding back to coefficients.
    pub fn slots_to_coeffs(&self, real: &Ciphertext, imag: Option<&Ciphertext>) -> Result<Ciphertext> {
        self.dft
            .slots_to_coeffs(real, imag, &self.slots_to_coeffs)
            .stage(Stage::SlotsToCoeffs)
    }

    fn pack_and_switch_up(&self, cts: Vec<Ciphertext>) -> Result<Vec<Ciphertext>> {
        let (Some(switcher), Some(residual_packer)) = (&self.ring_switcher, &self.residual_packer) else {
            return Err(Error::config("ring switching needs a standard residual ring"));
        };
        let mut cts = cts;
        if self.params.residual.n() != self.params.bootstrapping.n() {
            cts = residual_packer.pack(cts).stage(Stage::Pack)?;
            cts = cts
                .iter()
                .map(|ct| switcher.switch_up(&self.ckks, ct))
                .collect::<Result<Vec<_>>>()
                .stage(Stage::RingSwitch)?;
        }
        self.packer.pack(cts).stage(Stage::Pack)
    }

    fn unpack_and_switch_down(&self, cts: Vec<Ciphertext>, log_slots: usize, count: usize) -> Result<Vec<Ciphertext>> {
        let (Some(switcher), Some(residual_packer)) = (&self.ring_switcher, &self.residual_packer) else {
            return Err(Error::config("ring switching needs a standard residual ring"));
        };
        if self.params.residual.n() == self.params.bootstrapping.n() {
            return self.packer.unpack_many(&cts, log_slots, count).stage(Stage::Unpack);
        }

        // Shape of the ciphertexts after the first packing, in the residual ring.
        let block = residual_packer.block_size(log_slots, count);
        let inner_count = count.div_ceil(block);
        let inner_log_slots = log_slots + residual_packer.stages(log_slots, count);

        let switched = self
            .packer
            .unpack_many(&cts, inner_log_slots, inner_count)
            .stage(Stage::Unpack)?
            .iter()
            .map(|ct| switcher.switch_down(&self.ckks, ct))
            .collect::<Result<Vec<_>>>()
            .stage(Stage::RingSwitch)?;
        residual_packer
            .unpack_many(&switched, log_slots, count)
            .stage(Stage::Unpack)
    }
}

/// Check that the stage levels chain for the circuit order.
fn check_chain(params: &BootstrappingParameters) -> Result<()> {
    let c2s = &params.coeffs_to_slots;
    let s2c = &params.slots_to_coeffs;
    let mod1 = &params.mod1;
    match params.circuit_order {
        CircuitOrder::ModUpThenEncode => {
            if c2s.level_q.checked_sub(c2s.depth(true)) != Some(mod1.level_q) {
                return Err(Error::config(format!(
                    "CoeffsToSlots starts at {} and consumes {}, Mod1 starts at {}",
                    c2s.level_q,
                    c2s.depth(true),
                    mod1.level_q
                )));
            }
            if mod1.level_q.checked_sub(mod1.depth()) != Some(s2c.level_q) {
                return Err(Error::config(format!(
                    "Mod1 starts at {} and consumes {}, SlotsToCoeffs starts at {}",
                    mod1.level_q,
                    mod1.depth(),
                    s2c.level_q
                )));
            }
        }
        CircuitOrder::DecodeThenModUp => {
            let top = params.bootstrapping.max_level();
            if top.checked_sub(c2s.depth(true)) != Some(mod1.level_q) {
                return Err(Error::config(format!(
                    "CoeffsToSlots consumes {} from level {top}, Mod1 starts at {}",
                    c2s.depth(true),
                    mod1.level_q
                )));
            }
        }
        CircuitOrder::Custom => {}
    }
    Ok(())
}
