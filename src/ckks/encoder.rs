//! Canonical-embedding encoder
//!
//! Maps vectors of complex (or real) slot values to plaintext polynomials and
//! back through the CKKS special FFT.
//!
//! **Slot layout:**
//! - `slots = 2^log_slots` values, `gap = (NthRoot/4) / slots`
//! - Standard rings: real parts at coefficients `i·gap`, imaginary parts at
//!   `N/2 + i·gap`
//! - Conjugate-invariant rings: only the real parts are stored at `i·gap`; the
//!   imaginary half is implied by the X + X^(-1) symmetry
//!
//! Sparse plaintexts (fewer slots than the maximum) therefore only populate
//! coefficients on the `gap` grid, which is what packing and the bootstrapping
//! trace rely on.

use num_bigint::{BigInt, BigUint};
use num_traits::{ToPrimitive, Zero};
use rustfft::num_complex::Complex64;

use super::params::{Parameters, GALOIS_GEN};
use crate::error::{Error, Result};
use crate::ring::{Poly, RingKind};

/// Encoded message with its scaling metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Plaintext {
    /// NTT-domain polynomial
    pub poly: Poly,
    pub scale: f64,
    pub log_slots: usize,
}

impl Plaintext {
    #[inline]
    pub fn level(&self) -> usize {
        self.poly.level()
    }
}

/// Encoder for one parameter set.
#[derive(Debug, Clone)]
pub struct Encoder {
    params: Parameters,
    m: usize,
    rot_group: Vec<usize>,
    roots: Vec<Complex64>,
}

impl Encoder {
    pub fn new(params: &Parameters) -> Self {
        let m = params.nth_root() as usize;
        let mut rot_group = Vec::with_capacity(m >> 2);
        let mut pow = 1usize;
        for _ in 0..m >> 2 {
            rot_group.push(pow);
            pow = (pow * GALOIS_GEN as usize) & (m - 1);
        }
        let roots = (0..=m)
            .map(|k| Complex64::from_polar(1.0, 2.0 * std::f64::consts::PI * k as f64 / m as f64))
            .collect();
        Self {
            params: params.clone(),
            m,
            rot_group,
            roots,
        }
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    /// Special FFT (slots → evaluation of the encoded polynomial), in place.
    pub fn fft(&self, values: &mut [Complex64]) {
        let n = values.len();
        if n < 2 {
            return;
        }
        bit_reverse_in_place(values);
        let log_n = n.trailing_zeros() as usize;
        let log_m = self.m.trailing_zeros() as usize;
        for log_len in 1..=log_n {
            let len = 1 << log_len;
            let lenh = len >> 1;
            let lenq = len << 2;
            let log_gap = log_m - 2 - log_len;
            let mask = lenq - 1;
            for i in (0..n).step_by(len) {
                for j in 0..lenh {
                    let k = i + j;
                    let v = values[k + lenh] * self.roots[(self.rot_group[j] & mask) << log_gap];
                    let u = values[k];
                    values[k] = u + v;
                    values[k + lenh] = u - v;
                }
            }
        }
    }

    /// Inverse special FFT, in place.
    pub fn ifft(&self, values: &mut [Complex64]) {
        let n = values.len();
        if n < 2 {
            return;
        }
        let log_n = n.trailing_zeros() as usize;
        let log_m = self.m.trailing_zeros() as usize;
        for log_len in (1..=log_n).rev() {
            let len = 1 << log_len;
            let lenh = len >> 1;
            let lenq = len << 2;
            let log_gap = log_m - 2 - log_len;
            let mask = lenq - 1;
            for i in (0..n).step_by(len) {
                for j in 0..lenh {
                    let k = i + j;
                    let u = values[k] + values[k + lenh];
                    let v = (values[k] - values[k + lenh])
                        * self.roots[(lenq - (self.rot_group[j] & mask)) << log_gap];
                    values[k] = u;
                    values[k + lenh] = v;
                }
            }
        }
        let inv = 1.0 / n as f64;
        values.iter_mut().for_each(|v| *v *= inv);
        bit_reverse_in_place(values);
    }

    /// Encode complex slot values at `level` with `scale`.
    ///
    /// Conjugate-invariant parameters ignore imaginary parts.
    pub fn encode(&self, values: &[Complex64], log_slots: usize, scale: f64, level: usize) -> Result<Plaintext> {
        let slots = 1usize << log_slots;
        if log_slots > self.params.log_max_slots() || values.len() > slots {
            return Err(Error::arithmetic(format!(
                "cannot encode {} values into 2^{log_slots} slots (max 2^{})",
                values.len(),
                self.params.log_max_slots()
            )));
        }
        if level > self.params.max_level() {
            return Err(Error::arithmetic(format!("level {level} above maximum {}", self.params.max_level())));
        }

        let mut buf = vec![Complex64::new(0.0, 0.0); slots];
        buf[..values.len()].copy_from_slice(values);
        if self.params.ring_kind() == RingKind::ConjugateInvariant {
            buf.iter_mut().for_each(|v| v.im = 0.0);
        }
        self.ifft(&mut buf);

        let n = self.params.n();
        let max_cols = self.m >> 2;
        let gap = max_cols / slots;
        let mut coeffs = vec![0f64; n];
        for (i, v) in buf.iter().enumerate() {
            coeffs[i * gap] = v.re * scale;
            if self.params.ring_kind() == RingKind::Standard {
                coeffs[max_cols + i * gap] = v.im * scale;
            }
        }

        Ok(Plaintext {
            poly: self.float_to_poly(&coeffs, level),
            scale,
            log_slots,
        })
    }

    /// Encode real slot values.
    pub fn encode_real(&self, values: &[f64], log_slots: usize, scale: f64, level: usize) -> Result<Plaintext> {
        let cmplx: Vec<Complex64> = values.iter().map(|&v| Complex64::new(v, 0.0)).collect();
        self.encode(&cmplx, log_slots, scale, level)
    }

    /// Round scaled coefficients to integers and reduce them into an NTT-domain polynomial.
    pub fn float_to_poly(&self, coeffs: &[f64], level: usize) -> Poly {
        let ring = self.params.ring_q();
        let mut poly = ring.new_poly(level);
        for (i, row) in poly.coeffs.iter_mut().enumerate() {
            let m = ring.modulus(i);
            for (x, &c) in row.iter_mut().zip(coeffs) {
                *x = m.reduce_i128(c.round() as i128);
            }
        }
        ring.ntt(&mut poly);
        poly
    }

    /// Decode a plaintext into its complex slot values.
    pub fn decode(&self, pt: &Plaintext) -> Vec<Complex64> {
        let ring = self.params.ring_q();
        let mut poly = pt.poly.clone();
        ring.intt(&mut poly);

        let slots = 1usize << pt.log_slots;
        let max_cols = self.m >> 2;
        let gap = max_cols / slots;
        let crt = CrtReconstructor::new(&self.params, poly.level());

        let mut values: Vec<Complex64> = (0..slots)
            .map(|i| Complex64::new(crt.centered_f64(&poly, i * gap) / pt.scale, 0.0))
            .collect();

        match self.params.ring_kind() {
            RingKind::Standard => {
                for (i, v) in values.iter_mut().enumerate() {
                    v.im = crt.centered_f64(&poly, max_cols + i * gap) / pt.scale;
                }
            }
            RingKind::ConjugateInvariant => {
                let reals: Vec<f64> = values.iter().map(|v| v.re).collect();
                for i in 1..slots {
                    values[i].im = -reals[slots - i];
                }
            }
        }

        self.fft(&mut values);
        values
    }

    /// Decode and keep the real parts.
    pub fn decode_real(&self, pt: &Plaintext) -> Vec<f64> {
        self.decode(pt).into_iter().map(|v| v.re).collect()
    }
}

/// Centered CRT reconstruction of single coefficients at a fixed level.
struct CrtReconstructor<'a> {
    params: &'a Parameters,
    modulus: BigUint,
    half: BigUint,
    /// (Q/q_j) · ((Q/q_j)^(-1) mod q_j)
    basis: Vec<BigUint>,
}

impl<'a> CrtReconstructor<'a> {
    fn new(params: &'a Parameters, level: usize) -> Self {
        let modulus = params.modulus_at_level(level);
        let basis = if level == 0 {
            Vec::new()
        } else {
            (0..=level)
                .map(|j| {
                    let m = params.ring_q().modulus(j);
                    let qj = BigUint::from(m.value());
                    let hat = &modulus / &qj;
                    let hat_mod = (&hat % &qj).to_u64().unwrap_or(0);
                    hat * m.inv(hat_mod)
                })
                .collect()
        };
        let half = &modulus >> 1usize;
        Self {
            params,
            modulus,
            half,
            basis,
        }
    }

    fn centered_f64(&self, poly: &Poly, idx: usize) -> f64 {
        if self.basis.is_empty() {
            let m = self.params.ring_q().modulus(0);
            return m.center(poly.coeffs[0][idx]) as f64;
        }
        let mut acc = BigUint::zero();
        for (row, b) in poly.coeffs.iter().zip(&self.basis) {
            acc += b * row[idx];
        }
        acc %= &self.modulus;
        let signed = if acc > self.half {
            BigInt::from(acc) - BigInt::from(self.modulus.clone())
        } else {
            BigInt::from(acc)
        };
        signed.to_f64().unwrap_or(f64::NAN)
    }
}

fn bit_reverse_in_place<T>(values: &mut [T]) {
    let n = values.len();
    let mut j = 0;
    for i in 1..n {
        let mut bit = n >> 1;
        while j & bit != 0 {
            j ^= bit;
            bit >>= 1;
        }
        j |= bit;
        if i < j {
            values.swap(i, j);
        }
    }
}
