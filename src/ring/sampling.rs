//! Secret, error and uniform samplers.

use rand::distributions::Distribution;
use rand::seq::index;
use rand::Rng;
use rand_distr::Normal;

use super::{Poly, Ring};

/// Errors are clipped at this many standard deviations.
const GAUSSIAN_BOUND_SIGMAS: f64 = 6.0;

/// Uniform ternary vector with coefficients in {-1, 0, 1}.
pub fn ternary<R: Rng + ?Sized>(rng: &mut R, n: usize) -> Vec<i64> {
    (0..n).map(|_| rng.gen_range(-1i64..=1)).collect()
}

/// Ternary vector with exactly `h` non-zero coefficients.
pub fn ternary_hamming<R: Rng + ?Sized>(rng: &mut R, n: usize, h: usize) -> Vec<i64> {
    let mut out = vec![0i64; n];
    for i in index::sample(rng, n, h.min(n)) {
        out[i] = if rng.gen::<bool>() { 1 } else { -1 };
    }
    out
}

/// Rounded Gaussian vector with standard deviation `sigma`.
pub fn gaussian<R: Rng + ?Sized>(rng: &mut R, n: usize, sigma: f64) -> Vec<i64> {
    // sigma is validated positive when parameters are built
    let normal = match Normal::new(0.0, sigma) {
        Ok(d) => d,
        Err(_) => return vec![0; n],
    };
    let bound = GAUSSIAN_BOUND_SIGMAS * sigma;
    (0..n)
        .map(|_| loop {
            let x: f64 = normal.sample(rng);
            if x.abs() <= bound {
                break x.round() as i64;
            }
        })
        .collect()
}

/// Uniformly random polynomial with `rows` residues; valid in either domain.
pub fn uniform<R: Rng + ?Sized>(rng: &mut R, ring: &Ring, rows: usize) -> Poly {
    let mut p = ring.new_poly_rows(rows);
    for (row, m) in p.coeffs.iter_mut().zip(ring.moduli()) {
        let q = m.value();
        for x in row.iter_mut() {
            *x = rng.gen_range(0..q);
        }
    }
    p
}
