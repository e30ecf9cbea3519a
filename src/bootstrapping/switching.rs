//! Moving ciphertexts in and out of the bootstrapping ring
//!
//! Two switchers sit at the boundary of the circuit:
//!
//! - [`RingSwitcher`]: standard residual ring of degree N1 ↔ standard
//!   bootstrapping ring of degree N2 ≥ N1, through the coefficient embedding
//!   X ↦ Y^(N2/N1) and a key switch.
//! - [`DomainSwitcher`]: conjugate-invariant ring of degree N ↔ standard ring
//!   of degree 2N. A conjugate-invariant polynomial is the first half of the
//!   NTT of its standard unfolding, the second half being its mirror.

use std::sync::Arc;

use tracing::instrument;

use crate::ckks::{Ciphertext, EvaluationKey, Evaluator, Parameters};
use crate::error::{Error, Result, Stage};
use crate::ring::{embed_coefficients, extract_coefficients, Poly, Ring, RingKind};

/// Ring-degree switcher between two standard rings sharing their first primes.
#[derive(Debug, Clone)]
pub struct RingSwitcher {
    residual: Parameters,
    bootstrapping: Parameters,
    up: Option<Arc<EvaluationKey>>,
    down: Option<Arc<EvaluationKey>>,
}

impl RingSwitcher {
    pub fn new(
        residual: &Parameters,
        bootstrapping: &Parameters,
        up: Option<Arc<EvaluationKey>>,
        down: Option<Arc<EvaluationKey>>,
    ) -> Result<Self> {
        if residual.ring_kind() != RingKind::Standard || bootstrapping.ring_kind() != RingKind::Standard {
            return Err(Error::config("ring switching needs two standard rings"));
        }
        if residual.n() > bootstrapping.n() {
            return Err(Error::config(format!(
                "residual degree {} above the bootstrapping degree {}",
                residual.n(),
                bootstrapping.n()
            )));
        }
        if residual.q().iter().zip(bootstrapping.q()).any(|(a, b)| a != b) {
            return Err(Error::config("the bootstrapping chain must extend the residual chain"));
        }
        Ok(Self {
            residual: residual.clone(),
            bootstrapping: bootstrapping.clone(),
            up,
            down,
        })
    }

    fn is_identity(&self) -> bool {
        self.residual.n() == self.bootstrapping.n()
    }

    fn key<'a>(key: &'a Option<Arc<EvaluationKey>>, what: &str) -> Result<&'a EvaluationKey> {
        key.as_deref().ok_or_else(|| Error::missing_key(what.to_string()))
    }

    /// Re-express `ct` from the residual ring in the bootstrapping ring, under
    /// the bootstrapping secret.
    #[instrument(skip_all, fields(level = ct.level()))]
    pub fn switch_up(&self, eval: &Evaluator, ct: &Ciphertext) -> Result<Ciphertext> {
        if ct.n() != self.residual.n() {
            return Err(Error::arithmetic(format!(
                "expected a ciphertext of degree {}, got {}",
                self.residual.n(),
                ct.n()
            )));
        }
        if self.is_identity() {
            return Ok(ct.clone());
        }
        let key = Self::key(&self.up, "ring switching key N1 → N2")?;
        let (from, to) = (self.residual.ring_q(), self.bootstrapping.ring_q());
        let embedded = Ciphertext::new(
            resize(from, to, &ct.c0, embed_coefficients),
            resize(from, to, &ct.c1, embed_coefficients),
            ct.scale,
            ct.log_slots,
            RingKind::Standard,
        );
        eval.apply_evaluation_key(&embedded, key)
    }

    /// Bring `ct` from the bootstrapping ring back to the residual ring, under
    /// the residual secret.
    ///
    /// # Errors
    /// A level error when `ct` sits above the top level of the residual chain.
    #[instrument(skip_all, fields(level = ct.level()))]
    pub fn switch_down(&self, eval: &Evaluator, ct: &Ciphertext) -> Result<Ciphertext> {
        if ct.level() > self.residual.max_level() {
            return Err(Error::level(
                Stage::RingSwitch,
                format!(
                    "ciphertext at level {} above the residual top level {}",
                    ct.level(),
                    self.residual.max_level()
                ),
            ));
        }
        if ct.n() != self.bootstrapping.n() {
            return Err(Error::arithmetic(format!(
                "expected a ciphertext of degree {}, got {}",
                self.bootstrapping.n(),
                ct.n()
            )));
        }
        if self.is_identity() {
            return Ok(ct.clone());
        }
        let key = Self::key(&self.down, "ring switching key N2 → N1")?;
        let switched = eval.apply_evaluation_key(ct, key)?;
        let (from, to) = (self.bootstrapping.ring_q(), self.residual.ring_q());
        Ok(Ciphertext::new(
            resize(from, to, &switched.c0, extract_coefficients),
            resize(from, to, &switched.c1, extract_coefficients),
            ct.scale,
            ct.log_slots,
            RingKind::Standard,
        ))
    }
}

/// Move an NTT-domain polynomial between rings of different degrees by
/// mapping its coefficients row by row.
fn resize(from: &Ring, to: &Ring, p: &Poly, map: fn(&[u64], &mut [u64])) -> Poly {
    let mut out = Poly::zero(to.n(), p.rows());
    for (i, (src, dst)) in p.coeffs.iter().zip(out.coeffs.iter_mut()).enumerate() {
        let mut row = src.clone();
        from.intt_row(i, &mut row);
        map(&row, dst);
        to.ntt_row(i, dst);
    }
    out
}

/// Switcher between a conjugate-invariant ring of degree N and the standard
/// ring of degree 2N.
#[derive(Debug, Clone)]
pub struct DomainSwitcher {
    standard: Parameters,
    conjugate_invariant: Parameters,
    complex_to_real: Arc<EvaluationKey>,
    real_to_complex: Arc<EvaluationKey>,
    conjugation_index: Vec<usize>,
}

impl DomainSwitcher {
    /// # Errors
    /// A configuration error when the ring kinds are not standard and
    /// conjugate-invariant or when the degree ratio is not exactly 2; a
    /// missing-key error when either switching key is absent.
    pub fn new(
        standard: &Parameters,
        conjugate_invariant: &Parameters,
        complex_to_real: Option<Arc<EvaluationKey>>,
        real_to_complex: Option<Arc<EvaluationKey>>,
    ) -> Result<Self> {
        if standard.ring_kind() != RingKind::Standard {
            return Err(Error::config("domain switching needs a standard ring on the complex side"));
        }
        if conjugate_invariant.ring_kind() != RingKind::ConjugateInvariant {
            return Err(Error::config("domain switching needs a conjugate-invariant ring on the real side"));
        }
        if standard.n() != 2 * conjugate_invariant.n() {
            return Err(Error::config(format!(
                "standard degree {} must be twice the conjugate-invariant degree {}",
                standard.n(),
                conjugate_invariant.n()
            )));
        }
        let complex_to_real = complex_to_real.ok_or_else(|| Error::missing_key("complex to real switching key"))?;
        let real_to_complex = real_to_complex.ok_or_else(|| Error::missing_key("real to complex switching key"))?;

        let ring = standard.ring_q();
        let conjugation_index = ring.automorphism_index(2 * ring.n() as u64 - 1);
        Ok(Self {
            standard: standard.clone(),
            conjugate_invariant: conjugate_invariant.clone(),
            complex_to_real,
            real_to_complex,
            conjugation_index,
        })
    }

    /// Map a standard ciphertext to the conjugate-invariant ring.
    ///
    /// The message becomes its real part: m + m̄ is encrypted at twice the
    /// input scale, so the decoded values are Re(m).
    #[instrument(skip_all, fields(level = ct.level()))]
    pub fn complex_to_real(&self, eval: &Evaluator, ct: &Ciphertext) -> Result<Ciphertext> {
        if ct.n() != self.standard.n() || ct.ring_kind != RingKind::Standard {
            return Err(Error::arithmetic(format!(
                "complex to real expects a standard ciphertext of degree {}",
                self.standard.n()
            )));
        }
        let level = ct.level().min(self.conjugate_invariant.max_level());
        let switched = eval.apply_evaluation_key(&ct.at_level(level), &self.complex_to_real)?;

        let n = self.conjugate_invariant.n();
        let fold = |p: &Poly| -> Poly {
            let mut out = Poly::zero(n, p.rows());
            for (i, (src, dst)) in p.coeffs.iter().zip(out.coeffs.iter_mut()).enumerate() {
                let m = self.standard.ring_q().modulus(i);
                for (k, d) in dst.iter_mut().enumerate() {
                    *d = m.add(src[k], src[self.conjugation_index[k]]);
                }
            }
            out
        };

        Ok(Ciphertext::new(
            fold(&switched.c0),
            fold(&switched.c1),
            2.0 * ct.scale,
            ct.log_slots,
            RingKind::ConjugateInvariant,
        ))
    }

    /// Map a conjugate-invariant ciphertext to the standard ring, slot values
    /// unchanged.
    #[instrument(skip_all, fields(level = ct.level()))]
    pub fn real_to_complex(&self, eval: &Evaluator, ct: &Ciphertext) -> Result<Ciphertext> {
        if ct.n() != self.conjugate_invariant.n() || ct.ring_kind != RingKind::ConjugateInvariant {
            return Err(Error::arithmetic(format!(
                "real to complex expects a conjugate-invariant ciphertext of degree {}",
                self.conjugate_invariant.n()
            )));
        }
        let n = ct.n();
        let unfold = |p: &Poly| -> Poly {
            let mut out = Poly::zero(2 * n, p.rows());
            for (src, dst) in p.coeffs.iter().zip(out.coeffs.iter_mut()) {
                let (low, high) = dst.split_at_mut(n);
                low.copy_from_slice(src);
                for (k, h) in high.iter_mut().enumerate() {
                    *h = src[n - 1 - k];
                }
            }
            out
        };
        let unfolded = Ciphertext::new(
            unfold(&ct.c0),
            unfold(&ct.c1),
            ct.scale,
            ct.log_slots,
            RingKind::Standard,
        );
        eval.apply_evaluation_key(&unfolded, &self.real_to_complex)
    }
}
