//! Polynomial evaluation in ⌈log2(d+1)⌉ levels
//!
//! Polynomials are given in the monomial or Chebyshev basis. Evaluation first
//! builds a power basis (all powers below 2^logSplit plus the powers of two
//! above it) and then recursively splits p = q·T_{2^k} + r, so that each
//! giant step costs a single level. Constants are folded into the scaling of
//! the baby steps, which is why the baby steps are computed "pre-rescale": a
//! recursion call at level ℓ returns its result at scale `target·q_ℓ`.
//!
//! Chebyshev polynomials expect the input already mapped into [−1, 1].

use std::collections::BTreeMap;

use rustfft::num_complex::Complex64;

use super::ciphertext::Ciphertext;
use super::evaluator::Evaluator;
use crate::error::{Error, Result};

/// Coefficients with a smaller magnitude are treated as zero.
const NEGLIGIBLE: f64 = 1e-14;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Basis {
    /// x^(a+b) = x^a · x^b
    Monomial,
    /// T_(a+b) = 2·T_a·T_b − T_|a−b|
    Chebyshev,
}

/// Polynomial with complex coefficients.
#[derive(Debug, Clone)]
pub struct Polynomial {
    pub basis: Basis,
    pub coeffs: Vec<Complex64>,
    /// Approximation interval [a, b] of a Chebyshev interpolant
    pub a: f64,
    pub b: f64,
    max_deg: usize,
    lead: bool,
}

impl Polynomial {
    pub fn new(basis: Basis, coeffs: Vec<Complex64>) -> Self {
        let max_deg = coeffs.len().saturating_sub(1);
        Self {
            basis,
            coeffs,
            a: -1.0,
            b: 1.0,
            max_deg,
            lead: true,
        }
    }

    /// Real-coefficient constructor.
    pub fn from_real(basis: Basis, coeffs: &[f64]) -> Self {
        Self::new(basis, coeffs.iter().map(|&c| Complex64::new(c, 0.0)).collect())
    }

    pub fn with_interval(mut self, a: f64, b: f64) -> Self {
        self.a = a;
        self.b = b;
        self
    }

    #[inline]
    pub fn degree(&self) -> usize {
        self.coeffs.len().saturating_sub(1)
    }

    /// Levels consumed by the evaluation.
    pub fn depth(&self) -> usize {
        bit_len(self.degree())
    }

    /// Evaluate at a real point (for reference computations).
    pub fn evaluate_real(&self, x: f64) -> Complex64 {
        match self.basis {
            Basis::Monomial => self
                .coeffs
                .iter()
                .rev()
                .fold(Complex64::new(0.0, 0.0), |acc, &c| acc * x + c),
            Basis::Chebyshev => {
                let t = (2.0 * x - self.a - self.b) / (self.b - self.a);
                let (mut t0, mut t1) = (1.0, t);
                let mut acc = self.coeffs.first().copied().unwrap_or_default();
                for (i, &c) in self.coeffs.iter().enumerate().skip(1) {
                    if i > 1 {
                        let t2 = 2.0 * t * t1 - t0;
                        t0 = t1;
                        t1 = t2;
                    }
                    acc += c * t1;
                }
                acc
            }
        }
    }

    /// Detect odd/even parity and clear the coefficients parity forces to zero.
    fn parity(&mut self) -> (bool, bool) {
        let mut odd = true;
        let mut even = true;
        for (i, c) in self.coeffs.iter().enumerate() {
            let significant = !negligible(*c);
            odd &= !(i & 1 == 0 && significant);
            even &= !(i & 1 == 1 && significant);
            if !odd && !even {
                break;
            }
        }
        if odd || even {
            let start = usize::from(even);
            for c in self.coeffs.iter_mut().skip(start).step_by(2) {
                *c = Complex64::new(0.0, 0.0);
            }
        }
        (odd, even)
    }

    /// Split p = q·X^split + r (T_split for Chebyshev).
    fn split(&self, split: usize) -> (Polynomial, Polynomial) {
        let deg = self.degree();
        let mut r = Polynomial {
            basis: self.basis,
            coeffs: self.coeffs[..split].to_vec(),
            a: self.a,
            b: self.b,
            max_deg: if self.max_deg == deg {
                split - 1
            } else {
                self.max_deg - (deg - split + 1)
            },
            lead: false,
        };
        let mut q = Polynomial {
            basis: self.basis,
            coeffs: vec![Complex64::new(0.0, 0.0); deg - split + 1],
            a: self.a,
            b: self.b,
            max_deg: self.max_deg,
            lead: self.lead,
        };
        q.coeffs[0] = self.coeffs[split];
        match self.basis {
            Basis::Monomial => {
                q.coeffs[1..].copy_from_slice(&self.coeffs[split + 1..]);
            }
            Basis::Chebyshev => {
                for (j, i) in (split + 1..=deg).enumerate() {
                    q.coeffs[i - split] = self.coeffs[i] * 2.0;
                    r.coeffs[split - j - 1] -= self.coeffs[i];
                }
            }
        }
        (q, r)
    }
}

fn negligible(c: Complex64) -> bool {
    c.re.abs() <= NEGLIGIBLE && c.im.abs() <= NEGLIGIBLE
}

fn bit_len(x: usize) -> usize {
    (usize::BITS - x.leading_zeros()) as usize
}

fn optimal_split(log_degree: usize) -> usize {
    let mut log_split = log_degree >> 1;
    let a = (1i64 << log_split) + (1i64 << (log_degree - log_split)) + log_degree as i64 - log_split as i64 - 3;
    let b = (1i64 << (log_split + 1)) + (1i64 << (log_degree - log_split).saturating_sub(1)) + log_degree as i64
        - log_split as i64
        - 4;
    if a > b {
        log_split += 1;
    }
    log_split
}

/// Powers T_1, T_2, … of a ciphertext, generated on demand.
pub struct PowerBasis {
    pub basis: Basis,
    pub values: BTreeMap<usize, Ciphertext>,
}

impl PowerBasis {
    pub fn new(ct: &Ciphertext, basis: Basis) -> Self {
        let mut values = BTreeMap::new();
        values.insert(1, ct.clone());
        Self { basis, values }
    }

    /// Generate T_n (and every power it depends on) if missing.
    pub fn gen_power(&mut self, n: usize, min_scale: f64, eval: &Evaluator) -> Result<()> {
        if n == 0 || self.values.contains_key(&n) {
            return Ok(());
        }
        let (a, b, c) = if n.is_power_of_two() {
            (n / 2, n / 2, 0)
        } else {
            // maximize the number of odd terms
            let k = bit_len(n - 1) - 1;
            let a: usize = (1 << k) - 1;
            let b = n + 1 - (1 << k);
            let c = if self.basis == Basis::Chebyshev { a.abs_diff(b) } else { 0 };
            (a, b, c)
        };
        self.gen_power(a, min_scale, eval)?;
        self.gen_power(b, min_scale, eval)?;

        let prod = eval.mul_relin(&self.values[&a], &self.values[&b])?;
        let mut out = eval.rescale_to(&prod, min_scale)?;

        if self.basis == Basis::Chebyshev {
            let doubled = out.clone();
            eval.add_assign(&mut out, &doubled)?;
            if c == 0 {
                eval.add_const_assign(&mut out, Complex64::new(-1.0, 0.0))?;
            } else {
                self.gen_power(c, min_scale, eval)?;
                eval.sub_assign(&mut out, &self.values[&c])?;
            }
        }
        self.values.insert(n, out);
        Ok(())
    }

    fn power(&mut self, n: usize, min_scale: f64, eval: &Evaluator) -> Result<Ciphertext> {
        self.gen_power(n, min_scale, eval)?;
        Ok(self.values[&n].clone())
    }
}

struct PolynomialEvaluation<'a> {
    eval: &'a Evaluator,
    basis: PowerBasis,
    min_scale: f64,
    even: bool,
}

impl PolynomialEvaluation<'_> {
    fn q(&self, level: usize) -> Result<f64> {
        self.eval
            .params()
            .q()
            .get(level)
            .map(|&q| q as f64)
            .ok_or_else(|| Error::arithmetic(format!("no prime at level {level}")))
    }

    fn recurse(&mut self, log_split: usize, target_level: usize, target_scale: f64, pol: &Polynomial) -> Result<Ciphertext> {
        let deg = pol.degree();

        if deg < (1 << log_split) {
            if pol.lead && log_split > 1 && pol.max_deg % (1 << (log_split + 1)) > (1 << (log_split - 1)) {
                let log_split = bit_len(deg) >> 1;
                return self.recurse(log_split, target_level, target_scale, pol);
            }
            let scale = if pol.lead {
                target_scale * self.q(target_level)?
            } else {
                target_scale
            };
            return self.evaluate_from_basis(scale, target_level, pol);
        }

        let mut next_power = 1usize << log_split;
        while next_power < (deg >> 1) + 1 {
            next_power <<= 1;
        }
        let (coeffs_q, coeffs_r) = pol.split(next_power);
        let x_pow = self.basis.power(next_power, self.min_scale, self.eval)?;

        let current_q = if pol.lead {
            self.q(target_level)?
        } else {
            self.q(target_level + 1)?
        };

        let mut res = self.recurse(
            log_split,
            target_level + 1,
            target_scale * current_q / x_pow.scale,
            &coeffs_q,
        )?;
        self.eval.rescale_assign(&mut res)?;
        let mut res = self.eval.mul_relin(&res, &x_pow)?;

        let tmp = self.recurse(log_split, res.level(), res.scale, &coeffs_r)?;
        self.eval.add_assign(&mut res, &tmp)?;
        Ok(res)
    }

    fn evaluate_from_basis(&mut self, target_scale: f64, level: usize, pol: &Polynomial) -> Result<Ciphertext> {
        let x1 = &self.basis.values[&1];
        let mut res = Ciphertext::zero(x1.n(), level, target_scale, x1.log_slots, x1.ring_kind);

        let c0 = pol.coeffs[0];
        if !negligible(c0) {
            self.eval.add_const_assign(&mut res, c0)?;
        }

        let minimum_degree = if self.even { 1 } else { 0 };
        if pol.degree() <= minimum_degree && self.even {
            return Ok(res);
        }

        for key in (1..=pol.degree()).rev() {
            let c = pol.coeffs[key];
            if negligible(c) {
                continue;
            }
            let x = self.basis.power(key, self.min_scale, self.eval)?;
            self.eval.mul_const_then_add(&x, c, &mut res)?;
        }
        Ok(res)
    }
}

impl Evaluator {
    /// Evaluate `pol` on `ct`, returning a ciphertext at scale `target_scale`
    /// and level `ct.level() − pol.depth()`.
    pub fn evaluate_polynomial(&self, ct: &Ciphertext, pol: &Polynomial, target_scale: f64) -> Result<Ciphertext> {
        let basis = PowerBasis::new(ct, pol.basis);
        self.evaluate_polynomial_with_basis(basis, pol, target_scale)
    }

    /// As [`Evaluator::evaluate_polynomial`], reusing a pre-computed power basis.
    pub fn evaluate_polynomial_with_basis(
        &self,
        basis: PowerBasis,
        pol: &Polynomial,
        target_scale: f64,
    ) -> Result<Ciphertext> {
        let Some(x) = basis.values.get(&1) else {
            return Err(Error::arithmetic("power basis without its degree-one element"));
        };
        if pol.coeffs.is_empty() {
            return Err(Error::arithmetic("empty polynomial"));
        }
        let depth = pol.depth();
        let level = x.level();
        if level < depth {
            return Err(Error::arithmetic(format!(
                "{level} levels < {depth} required to evaluate a degree-{} polynomial",
                pol.degree()
            )));
        }

        let mut pol = pol.clone();
        let (odd, even) = pol.parity();
        let log_degree = bit_len(pol.degree());
        let log_split = optimal_split(log_degree);

        let mut state = PolynomialEvaluation {
            eval: self,
            basis,
            min_scale: target_scale,
            even,
        };

        for i in (2..(1usize << log_split)).rev() {
            if !(even || odd) || (i & 1 == 0 && even) || (i & 1 == 1 && odd) {
                state.basis.gen_power(i, target_scale, self)?;
            }
        }
        for i in log_split..log_degree {
            state.basis.gen_power(1 << i, target_scale, self)?;
        }

        let top_level = (level + 1).saturating_sub(log_degree);
        let mut res = state.recurse(log_split, top_level, target_scale, &pol)?;
        res = self.rescale_to(&res, target_scale)?;
        res.scale = target_scale;
        Ok(res)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chebyshev_split_is_exact() {
        let p = Polynomial::from_real(Basis::Chebyshev, &[0.5, -0.25, 0.125, 1.0, -0.75, 0.3]);
        let (q, r) = p.split(4);
        // T_4·(q0 + q1·T_1) = q0·T_4 + q1/2·(T_5 + T_3)
        for &x in &[-0.9, -0.3, 0.0, 0.4, 0.8] {
            let t4 = (4.0 * (x as f64).acos()).cos();
            let want = p.evaluate_real(x);
            let got = q.evaluate_real(x) * t4 + r.evaluate_real(x);
            assert!((want - got).norm() < 1e-12, "{want} vs {got}");
        }
    }

    #[test]
    fn test_parity_detection() {
        let mut p = Polynomial::from_real(Basis::Chebyshev, &[0.0, 1.0, 1e-16, -0.5, 0.0, 0.2]);
        assert_eq!(p.parity(), (true, false));
        assert_eq!(p.coeffs[2], Complex64::new(0.0, 0.0));
    }

    #[test]
    fn test_chebyshev_power_basis_odd_degrees() {
        use crate::ckks::{Decryptor, Encoder, Encryptor, KeyGenerator, Parameters, ParametersLiteral};
        use std::sync::Arc;

        let params = Parameters::new(ParametersLiteral {
            log_n: 8,
            log_q: vec![55, 40, 40, 40],
            log_p: vec![61],
            log_default_scale: 40,
            ..Default::default()
        })
        .unwrap();
        let mut kgen = KeyGenerator::with_seed(&params, 3);
        let sk = kgen.gen_secret_key();
        let eval = Evaluator::new(&params, Arc::new(kgen.gen_evaluation_key_set(&sk, &[])));
        let encoder = Encoder::new(&params);

        let log_slots = params.log_max_slots();
        let xs: Vec<Complex64> = (0..1usize << log_slots)
            .map(|i| Complex64::new((i as f64 * 0.61).sin() * 0.9, 0.0))
            .collect();
        let pt = encoder
            .encode(&xs, log_slots, params.default_scale(), params.max_level())
            .unwrap();
        let ct = Encryptor::with_seed(&params, &sk, 5).encrypt(&pt).unwrap();

        let mut basis = PowerBasis::new(&ct, Basis::Chebyshev);
        basis.gen_power(5, params.default_scale(), &eval).unwrap();
        let decryptor = Decryptor::new(&params, &sk);
        for n in [3, 5] {
            let have = encoder.decode(&decryptor.decrypt(&basis.values[&n]));
            for (x, y) in xs.iter().zip(&have) {
                let want = (n as f64 * x.re.acos()).cos();
                assert!((y.re - want).abs() < 1e-5, "T_{n}({}) = {want}, got {y}", x.re);
            }
        }
    }

    #[test]
    fn test_optimal_split_and_depth() {
        assert_eq!(optimal_split(5), 3);
        let p = Polynomial::from_real(Basis::Chebyshev, &[1.0; 31]);
        assert_eq!(p.depth(), 5);
    }
}
