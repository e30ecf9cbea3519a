//! NTT-friendly prime generation
//!
//! Primes are searched on both sides of 2^logq in steps of the ring's
//! NthRoot, so that every prime q satisfies q ≡ 1 mod NthRoot and stays within
//! a relative distance of roughly NthRoot·k / 2^logq of the power of two.
//! Keeping the primes that close to 2^logq is what lets scales be tracked as
//! plain f64 values.

use crate::barrett::MAX_MODULUS_BITS;
use crate::error::{Error, Result};

const WITNESSES: [u64; 12] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37];

fn mul_mod(a: u64, b: u64, m: u64) -> u64 {
    ((a as u128 * b as u128) % m as u128) as u64
}

fn pow_mod(mut base: u64, mut exp: u64, m: u64) -> u64 {
    let mut acc = 1u64;
    base %= m;
    while exp > 0 {
        if exp & 1 == 1 {
            acc = mul_mod(acc, base, m);
        }
        base = mul_mod(base, base, m);
        exp >>= 1;
    }
    acc
}

/// Deterministic Miller–Rabin for 64-bit integers.
pub fn is_prime(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    for &p in &WITNESSES {
        if n % p == 0 {
            return n == p;
        }
    }

    let s = (n - 1).trailing_zeros();
    let d = (n - 1) >> s;

    'witness: for &a in &WITNESSES {
        let mut x = pow_mod(a, d, n);
        if x == 1 || x == n - 1 {
            continue;
        }
        for _ in 1..s {
            x = mul_mod(x, x, n);
            if x == n - 1 {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

/// Generate `count` distinct primes of about `log_q` bits with q ≡ 1 mod `nth_root`.
///
/// Candidates alternate above and below 2^log_q; for `log_q` at the 61-bit
/// ceiling only candidates below are considered. Primes listed in `exclude`
/// are skipped.
pub fn generate_primes(log_q: usize, nth_root: u64, count: usize, exclude: &[u64]) -> Result<Vec<u64>> {
    if log_q < 20 || log_q as u32 > MAX_MODULUS_BITS {
        return Err(Error::config(format!(
            "prime bit size {log_q} outside [20, {MAX_MODULUS_BITS}]"
        )));
    }
    if (nth_root as u128) >= (1u128 << (log_q - 1)) {
        return Err(Error::config(format!(
            "prime bit size {log_q} too small for NthRoot {nth_root}"
        )));
    }

    let base = 1u64 << log_q;
    let only_down = log_q as u32 == MAX_MODULUS_BITS;
    let mut primes = Vec::with_capacity(count);

    let mut up = base + 1;
    let mut down = base + 1 - nth_root;
    let mut take_up = !only_down;

    while primes.len() < count {
        let candidate = if take_up {
            let c = up;
            up += nth_root;
            c
        } else {
            if down <= nth_root {
                return Err(Error::config(format!(
                    "exhausted {log_q}-bit primes congruent to 1 mod {nth_root}"
                )));
            }
            let c = down;
            down -= nth_root;
            c
        };
        if !only_down {
            take_up = !take_up;
        }

        if is_prime(candidate) && !exclude.contains(&candidate) && !primes.contains(&candidate) {
            primes.push(candidate);
        }
    }

    Ok(primes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_prime() {
        assert!(is_prime(2));
        assert!(is_prime(998244353));
        assert!(is_prime((1 << 61) - 1));
        assert!(!is_prime(1));
        assert!(!is_prime(561)); // Carmichael
        assert!(!is_prime(998244353u64 * 3));
    }

    #[test]
    fn test_generated_primes_are_ntt_friendly() {
        let nth_root = 1 << 12;
        let primes = generate_primes(40, nth_root, 4, &[]).unwrap();
        assert_eq!(primes.len(), 4);
        for &q in &primes {
            assert!(is_prime(q));
            assert_eq!(q % nth_root, 1);
            let drift = (q as f64 / (1u64 << 40) as f64 - 1.0).abs();
            assert!(drift < 1e-5);
        }
    }

    #[test]
    fn test_excluded_primes_are_skipped() {
        let first = generate_primes(45, 1 << 11, 2, &[]).unwrap();
        let next = generate_primes(45, 1 << 11, 2, &first).unwrap();
        assert!(next.iter().all(|q| !first.contains(q)));
    }

    #[test]
    fn test_top_bit_size_stays_below_ceiling() {
        let primes = generate_primes(61, 1 << 11, 2, &[]).unwrap();
        assert!(primes.iter().all(|&q| q < (1 << 61)));
    }
}
