//! Precision statistics between reference and decrypted slot values.

use std::fmt;

use rustfft::num_complex::Complex64;

/// Real part, imaginary part and modulus of a per-slot quantity.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Stats {
    pub real: f64,
    pub imag: f64,
    pub l2: f64,
}

impl Stats {
    fn to_precision(self) -> Stats {
        Stats {
            real: bits(self.real),
            imag: bits(self.imag),
            l2: bits(self.l2),
        }
    }
}

/// Log2 precision summary; the precision of a slot is log2(1/|err|).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PrecisionStats {
    pub max_delta: Stats,
    pub min_delta: Stats,
    pub mean_delta: Stats,
    pub median_delta: Stats,
    pub min_precision: Stats,
    pub max_precision: Stats,
    pub mean_precision: Stats,
    pub median_precision: Stats,
}

fn bits(delta: f64) -> f64 {
    (1.0 / delta).log2()
}

fn median(mut v: Vec<f64>) -> f64 {
    if v.is_empty() {
        return 0.0;
    }
    v.sort_by(f64::total_cmp);
    let mid = v.len() / 2;
    if v.len() % 2 == 1 {
        v[mid]
    } else {
        (v[mid - 1] + v[mid]) / 2.0
    }
}

impl PrecisionStats {
    /// Compare `have` to `want` slot by slot (the shorter length wins).
    pub fn new(want: &[Complex64], have: &[Complex64]) -> Self {
        let n = want.len().min(have.len());
        let mut max_delta = Stats::default();
        let mut min_delta = Stats {
            real: f64::INFINITY,
            imag: f64::INFINITY,
            l2: f64::INFINITY,
        };
        let mut mean_delta = Stats::default();
        let mut deltas = (Vec::with_capacity(n), Vec::with_capacity(n), Vec::with_capacity(n));

        for (w, h) in want.iter().zip(have) {
            let dr = (h.re - w.re).abs();
            let di = (h.im - w.im).abs();
            let dl = (dr * dr + di * di).sqrt();

            max_delta.real = max_delta.real.max(dr);
            max_delta.imag = max_delta.imag.max(di);
            max_delta.l2 = max_delta.l2.max(dl);
            min_delta.real = min_delta.real.min(dr);
            min_delta.imag = min_delta.imag.min(di);
            min_delta.l2 = min_delta.l2.min(dl);
            mean_delta.real += dr;
            mean_delta.imag += di;
            mean_delta.l2 += dl;

            deltas.0.push(dr);
            deltas.1.push(di);
            deltas.2.push(dl);
        }
        if n > 0 {
            mean_delta.real /= n as f64;
            mean_delta.imag /= n as f64;
            mean_delta.l2 /= n as f64;
        }
        let median_delta = Stats {
            real: median(deltas.0),
            imag: median(deltas.1),
            l2: median(deltas.2),
        };

        Self {
            max_delta,
            min_delta,
            mean_delta,
            median_delta,
            min_precision: max_delta.to_precision(),
            max_precision: min_delta.to_precision(),
            mean_precision: mean_delta.to_precision(),
            median_precision: median_delta.to_precision(),
        }
    }

    /// Real-valued variant of [`PrecisionStats::new`].
    pub fn from_real(want: &[f64], have: &[f64]) -> Self {
        let lift = |v: &[f64]| v.iter().map(|&x| Complex64::new(x, 0.0)).collect::<Vec<_>>();
        Self::new(&lift(want), &lift(have))
    }
}

impl fmt::Display for PrecisionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  log2     |  REAL  |  IMAG  |   L2")?;
        for (name, s) in [
            ("MIN Prec", self.min_precision),
            ("MAX Prec", self.max_precision),
            ("AVG Prec", self.mean_precision),
            ("MED Prec", self.median_precision),
        ] {
            writeln!(f, "  {name} | {:6.2} | {:6.2} | {:6.2}", s.real, s.imag, s.l2)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precision_of_known_error() {
        let want = vec![Complex64::new(1.0, 0.0); 4];
        let have: Vec<Complex64> = want.iter().map(|w| w + Complex64::new(2f64.powi(-20), 0.0)).collect();
        let stats = PrecisionStats::new(&want, &have);
        assert!((stats.min_precision.real - 20.0).abs() < 1e-9);
        assert!(stats.min_precision.imag.is_infinite());
        assert_eq!(stats.mean_precision.l2, stats.min_precision.l2);
    }
}
