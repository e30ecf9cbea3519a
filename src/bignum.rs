//! 256-bit fixed-point arithmetic for polynomial fitting
//!
//! Interpolating cos(2π(x − 1/4)/2^r) at clustered nodes is numerically
//! unstable in double precision: the divided differences and the Chebyshev
//! system lose most of their significant bits. The fits are therefore carried
//! out on [`Fixed`] values (a `BigInt` scaled by 2^256) and rounded to `f64`
//! only once the coefficients are known.

use std::ops::{Add, Div, Mul, Neg, Sub};
use std::sync::OnceLock;

use num_bigint::BigInt;
use num_traits::{Float, One, Signed, ToPrimitive, Zero};

/// Fractional bits of a [`Fixed`] value.
pub const FRAC_BITS: usize = 256;

/// Guard bits used while computing π.
const GUARD_BITS: usize = 32;

/// Signed fixed-point number with [`FRAC_BITS`] fractional bits.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Fixed(BigInt);

impl Fixed {
    pub fn zero() -> Self {
        Fixed(BigInt::zero())
    }

    pub fn one() -> Self {
        Fixed(BigInt::one() << FRAC_BITS)
    }

    pub fn from_i64(x: i64) -> Self {
        Fixed(BigInt::from(x) << FRAC_BITS)
    }

    /// Exact conversion of a finite double; non-finite inputs map to zero.
    pub fn from_f64(x: f64) -> Self {
        if x == 0.0 || !x.is_finite() {
            return Self::zero();
        }
        let (mantissa, exponent, sign) = Float::integer_decode(x);
        let m = BigInt::from(mantissa);
        let shift = FRAC_BITS as i64 + i64::from(exponent);
        let v = if shift >= 0 {
            m << shift as usize
        } else {
            m >> (-shift) as usize
        };
        Fixed(if sign < 0 { -v } else { v })
    }

    /// Nearest double.
    pub fn to_f64(&self) -> f64 {
        self.0.to_f64().unwrap_or(0.0) * (-(FRAC_BITS as f64)).exp2()
    }

    pub fn abs(&self) -> Self {
        Fixed(self.0.abs())
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn mul_i64(&self, k: i64) -> Self {
        Fixed(&self.0 * k)
    }

    pub fn div_i64(&self, k: i64) -> Self {
        Fixed(&self.0 / k)
    }

    /// Nearest integer, ties rounded up.
    fn round_to_int(&self) -> BigInt {
        let half = BigInt::one() << (FRAC_BITS - 1);
        (&self.0 + half) >> FRAC_BITS
    }
}

impl Add for &Fixed {
    type Output = Fixed;
    fn add(self, rhs: &Fixed) -> Fixed {
        Fixed(&self.0 + &rhs.0)
    }
}

impl Sub for &Fixed {
    type Output = Fixed;
    fn sub(self, rhs: &Fixed) -> Fixed {
        Fixed(&self.0 - &rhs.0)
    }
}

impl Mul for &Fixed {
    type Output = Fixed;
    fn mul(self, rhs: &Fixed) -> Fixed {
        Fixed((&self.0 * &rhs.0) >> FRAC_BITS)
    }
}

impl Div for &Fixed {
    type Output = Fixed;
    fn div(self, rhs: &Fixed) -> Fixed {
        Fixed((&self.0 << FRAC_BITS) / &rhs.0)
    }
}

impl Neg for &Fixed {
    type Output = Fixed;
    fn neg(self) -> Fixed {
        Fixed(-&self.0)
    }
}

impl Add for Fixed {
    type Output = Fixed;
    fn add(self, rhs: Fixed) -> Fixed {
        &self + &rhs
    }
}

impl Sub for Fixed {
    type Output = Fixed;
    fn sub(self, rhs: Fixed) -> Fixed {
        &self - &rhs
    }
}

impl Mul for Fixed {
    type Output = Fixed;
    fn mul(self, rhs: Fixed) -> Fixed {
        &self * &rhs
    }
}

impl Div for Fixed {
    type Output = Fixed;
    fn div(self, rhs: Fixed) -> Fixed {
        &self / &rhs
    }
}

impl Neg for Fixed {
    type Output = Fixed;
    fn neg(self) -> Fixed {
        -&self
    }
}

/// arctan(1/n) scaled by 2^bits.
fn atan_inv(n: i64, bits: usize) -> BigInt {
    let n2 = n * n;
    let mut term = (BigInt::one() << bits) / n;
    let mut sum = term.clone();
    let mut k = 1i64;
    while !term.is_zero() {
        term /= n2;
        let t = &term / (2 * k + 1);
        if k & 1 == 1 {
            sum -= t;
        } else {
            sum += t;
        }
        k += 1;
    }
    sum
}

/// π by Machin's formula: π = 16·atan(1/5) − 4·atan(1/239).
pub fn pi() -> Fixed {
    static PI: OnceLock<Fixed> = OnceLock::new();
    PI.get_or_init(|| {
        let bits = FRAC_BITS + GUARD_BITS;
        let v = atan_inv(5, bits) * 16 - atan_inv(239, bits) * 4;
        Fixed(v >> GUARD_BITS)
    })
    .clone()
}

/// Cosine: reduction modulo 2π followed by the Taylor series.
pub fn cos(x: &Fixed) -> Fixed {
    let two_pi = pi().mul_i64(2);
    let turns = (x / &two_pi).round_to_int();
    let r = x - &Fixed(&two_pi.0 * turns);
    let r2 = &r * &r;

    let mut sum = Fixed::one();
    let mut term = Fixed::one();
    let mut i = 1i64;
    loop {
        term = (-&(&term * &r2)).div_i64((2 * i - 1) * (2 * i));
        if term.is_zero() {
            break;
        }
        sum = &sum + &term;
        i += 1;
    }
    sum
}

/// sin(x) = cos(x − π/2).
pub fn sin(x: &Fixed) -> Fixed {
    cos(&(x - &pi().div_i64(2)))
}

/// Chebyshev interpolant of `f` on [a, b] through `nodes` Chebyshev nodes.
///
/// Returns the coefficients of T_0, …, T_{nodes−1} in the variable
/// (2x − a − b)/(b − a).
pub fn chebyshev_approximation<F>(f: F, a: f64, b: f64, nodes: usize) -> Vec<f64>
where
    F: Fn(&Fixed) -> Fixed,
{
    if nodes == 0 {
        return Vec::new();
    }
    let n = nodes as i64;
    let (fa, fb) = (Fixed::from_f64(a), Fixed::from_f64(b));
    let mid = (&fa + &fb).div_i64(2);
    let half_width = (&fb - &fa).div_i64(2);

    let mut u = Vec::with_capacity(nodes);
    let mut y = Vec::with_capacity(nodes);
    for k in 0..n {
        // (k + 1/2)·π/n
        let angle = pi().mul_i64(2 * k + 1).div_i64(2 * n);
        let uk = cos(&angle);
        let xk = &mid + &(&half_width * &uk);
        y.push(f(&xk));
        u.push(uk);
    }

    let mut coeffs = vec![Fixed::zero(); nodes];
    for (uk, yk) in u.iter().zip(&y) {
        let mut t_prev = Fixed::one();
        let mut t_cur = uk.clone();
        for (j, c) in coeffs.iter_mut().enumerate() {
            let t = match j {
                0 => Fixed::one(),
                1 => uk.clone(),
                _ => {
                    let next = &(&uk.mul_i64(2) * &t_cur) - &t_prev;
                    t_prev = std::mem::replace(&mut t_cur, next);
                    t_cur.clone()
                }
            };
            *c = &*c + &(yk * &t);
        }
    }

    coeffs
        .iter()
        .enumerate()
        .map(|(j, c)| {
            let c = c.mul_i64(2).div_i64(n);
            if j == 0 {
                c.div_i64(2).to_f64()
            } else {
                c.to_f64()
            }
        })
        .collect()
}

/// Chebyshev coefficients of a degree-`degree` approximation of
/// cos(2π(x − 1/4)/2^r) that is accurate on the unions of the intervals
/// [i − 1/dev, i + 1/dev] for the integers |i| < k.
///
/// The node budget is spread over the intervals so as to balance their error
/// bounds; the interpolant is then re-expressed in the Chebyshev basis over
/// [−k/2^r, k/2^r] by solving the sampled system exactly.
pub fn approximate_cos(k: usize, degree: usize, dev: f64, double_angle: usize) -> Vec<f64> {
    let (deg, totdeg) = node_degrees(degree, k, dev);
    let (nodes, y) = interpolation_nodes(&deg, dev, totdeg, k, double_angle);
    solve_chebyshev(totdeg, k, double_angle, &nodes, y)
}

fn log2_two_pi() -> f64 {
    (2.0 * std::f64::consts::PI).log2()
}

fn max_index(v: &[f64]) -> usize {
    let mut best = 0;
    for i in 1..v.len() {
        if v[i] > v[best] {
            best = i;
        }
    }
    best
}

/// Number of nodes per interval [i ± 1/dev], 0 ≤ i < k, and their total.
fn node_degrees(degree: usize, k: usize, dev: f64) -> (Vec<usize>, usize) {
    let degbdd = degree + 1;
    let mut totdeg = 2 * k - 1;
    let err = 1.0 / dev;
    let l2pi = log2_two_pi();

    let mut deg = vec![1usize; k];

    let mut base = -(1..=2 * k - 1).map(|i| (i as f64).log2()).sum::<f64>();
    base += (2 * k - 1) as f64 * l2pi;
    base += err.log2();

    let mut bdd: Vec<f64> = (0..k)
        .map(|i| {
            let mut b = base;
            for j in 1..k - i {
                b += (j as f64 + err).log2();
            }
            for j in 1..k + i {
                b += (j as f64 + err).log2();
            }
            b
        })
        .collect();

    for _ in 0..200 {
        if totdeg >= degbdd {
            break;
        }
        let maxi = max_index(&bdd);
        if maxi != 0 {
            if totdeg + 2 > degbdd {
                break;
            }
            for (i, b) in bdd.iter_mut().enumerate() {
                *b -= ((totdeg + 1) as f64).log2();
                *b -= ((totdeg + 2) as f64).log2();
                *b += 2.0 * l2pi;
                if i != maxi {
                    *b += ((i as f64 - maxi as f64).abs() + err).log2();
                    *b += ((i + maxi) as f64 + err).log2();
                } else {
                    *b += err.log2() - 1.0;
                    *b += (2.0 * i as f64 + err).log2();
                }
            }
            totdeg += 2;
        } else {
            bdd[0] -= ((totdeg + 1) as f64).log2();
            bdd[0] += err.log2() - 1.0;
            bdd[0] += l2pi;
            for (i, b) in bdd.iter_mut().enumerate().skip(1) {
                *b -= ((totdeg + 1) as f64).log2();
                *b += l2pi;
                *b += (i as f64 + err).log2();
            }
            totdeg += 1;
        }
        deg[maxi] += 1;
    }
    (deg, totdeg)
}

/// Interpolation nodes mapped to t = (x − 1/4)/2^r, and cos(2πt) at each.
fn interpolation_nodes(deg: &[usize], dev: f64, totdeg: usize, k: usize, double_angle: usize) -> (Vec<Fixed>, Vec<Fixed>) {
    let width = Fixed::from_f64(1.0 / dev);
    let mut nodes = vec![Fixed::zero(); totdeg];

    let mut cnt = usize::from(deg[0] % 2 != 0);
    let offset = |j: usize, d: usize| {
        let angle = pi().mul_i64(2 * j as i64).div_i64(2 * d as i64);
        &cos(&angle) * &width
    };

    for i in (1..k).rev() {
        let center = Fixed::from_i64(i as i64);
        for j in 0..deg[i] {
            nodes[cnt] = &center + &offset(j, deg[i]);
            nodes[cnt + 1] = -&nodes[cnt];
            cnt += 2;
        }
    }
    for j in 0..deg[0] / 2 {
        nodes[cnt] = offset(j, deg[0]);
        nodes[cnt + 1] = -&nodes[cnt];
        cnt += 2;
    }

    let quarter = Fixed::one().div_i64(4);
    let two_pi = pi().mul_i64(2);
    let scfac = 1i64 << double_angle;
    let y = nodes
        .iter_mut()
        .map(|node| {
            *node = (&*node - &quarter).div_i64(scfac);
            cos(&(&two_pi * node))
        })
        .collect();
    (nodes, y)
}

/// Newton interpolation through (nodes, y), sampled at Chebyshev points and
/// re-solved in the Chebyshev basis over [−k/2^r, k/2^r].
fn solve_chebyshev(totdeg: usize, k: usize, double_angle: usize, nodes: &[Fixed], mut y: Vec<Fixed>) -> Vec<f64> {
    // divided differences: y[i] = f[x_i, …, x_{totdeg−1}]
    for j in 1..totdeg {
        for i in 0..totdeg - j {
            let num = &y[i + 1] - &y[i];
            let den = &nodes[i + j] - &nodes[i];
            y[i] = &num / &den;
        }
    }

    let m = totdeg + 1;
    let bound = Fixed::from_i64(k as i64).div_i64(1i64 << double_angle);

    let x: Vec<Fixed> = (0..m)
        .map(|i| {
            let angle = pi().mul_i64(i as i64).div_i64((m - 1) as i64);
            &bound * &cos(&angle)
        })
        .collect();

    let mut p: Vec<Fixed> = x
        .iter()
        .map(|xi| {
            let mut acc = y[0].clone();
            for j in 1..totdeg {
                acc = &(&acc * &(xi - &nodes[j])) + &y[j];
            }
            acc
        })
        .collect();

    let mut t: Vec<Vec<Fixed>> = x
        .iter()
        .map(|xi| {
            let u = xi / &bound;
            let two_u = u.mul_i64(2);
            let mut row = Vec::with_capacity(m);
            row.push(Fixed::one());
            row.push(u);
            for j in 2..m {
                let next = &(&two_u * &row[j - 1]) - &row[j - 2];
                row.push(next);
            }
            row.truncate(m);
            row
        })
        .collect();

    // Gaussian elimination with partial pivoting
    for i in 0..m {
        let mut pivot_row = i;
        let mut best = t[i][i].abs();
        for j in i + 1..m {
            let v = t[j][i].abs();
            if v > best {
                best = v;
                pivot_row = j;
            }
        }
        if pivot_row != i {
            t.swap(i, pivot_row);
            p.swap(i, pivot_row);
        }
        let pivot = t[i][i].clone();
        if pivot.is_zero() {
            p[i] = Fixed::zero();
            continue;
        }
        for j in i + 1..m {
            let v = &t[i][j] / &pivot;
            t[i][j] = v;
        }
        p[i] = &p[i] / &pivot;
        t[i][i] = Fixed::one();

        for j in i + 1..m {
            let factor = t[j][i].clone();
            if factor.is_zero() {
                continue;
            }
            let v = &p[j] - &(&factor * &p[i]);
            p[j] = v;
            for l in i + 1..m {
                let v = &t[j][l] - &(&factor * &t[i][l]);
                t[j][l] = v;
            }
            t[j][i] = Fixed::zero();
        }
    }

    let mut c = vec![Fixed::zero(); m];
    for i in (0..m).rev() {
        let mut v = p[i].clone();
        for j in i + 1..m {
            v = &v - &(&t[i][j] * &c[j]);
        }
        c[i] = v;
    }

    c.iter().take(totdeg).map(Fixed::to_f64).collect()
}
