//! Plaintext matrix × ciphertext vector products in diagonal form
//!
//! A square matrix M over the slots is stored through its non-zero diagonals
//! d_k[i] = M[i][(i + k) mod s], so that M·x = Σ_k d_k ⊙ rot_k(x).
//!
//! **Evaluation strategies:**
//! - Naive (`log_bsgs_ratio < 0`): one hoisted rotation per diagonal
//! - Baby-step giant-step: k = j + i with j a multiple of N1 and i < N1;
//!   M·x = Σ_j rot_j(Σ_i rot_{-j}(d_{j+i}) ⊙ rot_i(x)). The inner rotations are
//!   hoisted and the diagonals are stored pre-rotated by −j.

use std::collections::BTreeMap;

use rustfft::num_complex::Complex64;

use super::ciphertext::Ciphertext;
use super::encoder::{Encoder, Plaintext};
use super::evaluator::Evaluator;
use super::params::Parameters;
use crate::error::{Error, Result};

/// Diagonals of a slot matrix, keyed by diagonal index (negative indexes wrap).
pub type Diagonals = BTreeMap<i64, Vec<Complex64>>;

/// Pre-encoded linear transformation.
#[derive(Debug, Clone)]
pub struct LinearTransformation {
    pub log_slots: usize,
    /// Level at which the diagonals are encoded
    pub level: usize,
    /// Scale of the encoded diagonals
    pub scale: f64,
    pub log_bsgs_ratio: i32,
    /// Baby-step size; 0 means naive evaluation
    pub n1: usize,
    /// Encoded (pre-rotated for BSGS) diagonals, keyed by their index in [0, slots)
    pub plaintexts: BTreeMap<usize, Plaintext>,
}

impl LinearTransformation {
    /// Encode `diagonals` at `level` with plaintext scale `scale`.
    pub fn new(
        encoder: &Encoder,
        diagonals: &Diagonals,
        log_slots: usize,
        level: usize,
        scale: f64,
        log_bsgs_ratio: i32,
    ) -> Result<Self> {
        let slots = 1usize << log_slots;
        let mut normalized: BTreeMap<usize, &Vec<Complex64>> = BTreeMap::new();
        for (&k, v) in diagonals {
            if v.len() != slots {
                return Err(Error::config(format!(
                    "diagonal {k} has {} entries for {slots} slots",
                    v.len()
                )));
            }
            normalized.insert(k.rem_euclid(slots as i64) as usize, v);
        }
        let indexes: Vec<usize> = normalized.keys().copied().collect();

        let mut plaintexts = BTreeMap::new();
        let n1 = if log_bsgs_ratio < 0 {
            for (&k, v) in &normalized {
                plaintexts.insert(k, encoder.encode(v, log_slots, scale, level)?);
            }
            0
        } else {
            let n1 = find_best_bsgs_ratio(&indexes, slots, log_bsgs_ratio as usize);
            let (index, _, _) = bsgs_index(&indexes, slots, n1);
            for (&j, babies) in &index {
                for &i in babies {
                    let k = (i + j) & (slots - 1);
                    let diag = normalized[&k];
                    let rotated: Vec<Complex64> = (0..slots).map(|t| diag[(t + slots - j) % slots]).collect();
                    plaintexts.insert(k, encoder.encode(&rotated, log_slots, scale, level)?);
                }
            }
            n1
        };

        Ok(Self {
            log_slots,
            level,
            scale,
            log_bsgs_ratio,
            n1,
            plaintexts,
        })
    }

    fn indexes(&self) -> Vec<usize> {
        self.plaintexts.keys().copied().collect()
    }

    /// Rotations needed to evaluate the transformation.
    pub fn rotations(&self) -> Vec<i64> {
        required_rotations(&self.indexes(), self.log_slots, self.log_bsgs_ratio)
    }

    /// Galois elements needed to evaluate the transformation.
    pub fn galois_elements(&self, params: &Parameters) -> Vec<u64> {
        let mut out: Vec<u64> = self.rotations().into_iter().map(|r| params.galois_element(r)).collect();
        out.sort_unstable();
        out.dedup();
        out
    }
}

/// Rotations a transformation with the diagonals `diags` (taken modulo the
/// slot count) needs, without encoding it.
pub fn required_rotations(diags: &[usize], log_slots: usize, log_bsgs_ratio: i32) -> Vec<i64> {
    let slots = 1usize << log_slots;
    let mut indexes: Vec<usize> = diags.iter().map(|&k| k & (slots - 1)).collect();
    indexes.sort_unstable();
    indexes.dedup();
    let mut rots: Vec<usize> = if log_bsgs_ratio < 0 {
        indexes
    } else {
        let n1 = find_best_bsgs_ratio(&indexes, slots, log_bsgs_ratio as usize);
        let (_, giant, baby) = bsgs_index(&indexes, slots, n1);
        giant.into_iter().chain(baby).collect()
    };
    rots.sort_unstable();
    rots.dedup();
    rots.into_iter().filter(|&r| r != 0).map(|r| r as i64).collect()
}

/// Split non-zero diagonal indexes into giant steps (multiples of `n1`) and
/// baby steps (< `n1`).
///
/// Returns the baby steps grouped by giant step, the sorted giant steps and
/// the sorted baby steps.
pub fn bsgs_index(diags: &[usize], slots: usize, n1: usize) -> (BTreeMap<usize, Vec<usize>>, Vec<usize>, Vec<usize>) {
    let mut index: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    let mut giant = Vec::new();
    let mut baby = Vec::new();
    for &rot in diags {
        let rot = rot & (slots - 1);
        let j = ((rot / n1) * n1) & (slots - 1);
        let i = rot & (n1 - 1);
        index.entry(j).or_default().push(i);
        giant.push(j);
        baby.push(i);
    }
    for v in index.values_mut() {
        v.sort_unstable();
    }
    giant.sort_unstable();
    giant.dedup();
    baby.sort_unstable();
    baby.dedup();
    (index, giant, baby)
}

/// Largest power-of-two N1 such that #baby/#giant stays within 2^log_max_ratio.
pub fn find_best_bsgs_ratio(diags: &[usize], max_n: usize, log_max_ratio: usize) -> usize {
    let max_ratio = (1u64 << log_max_ratio) as f64;
    let mut n1 = 1;
    while n1 < max_n {
        let (_, giant, baby) = bsgs_index(diags, max_n, n1);
        let ratio = (baby.len() as f64 - 1.0) / (giant.len() as f64 - 1.0);
        if ratio == max_ratio {
            return n1;
        }
        if ratio > max_ratio {
            return (n1 / 2).max(1);
        }
        n1 <<= 1;
    }
    1
}

impl Evaluator {
    /// M·ct without rescaling; the output scale is `ct.scale · lt.scale`.
    pub fn linear_transform(&self, ct: &Ciphertext, lt: &LinearTransformation) -> Result<Ciphertext> {
        let level = ct.level().min(lt.level);
        let ct = ct.at_level(level);
        let ring = self.params().ring_q();
        let digits = self.decompose(&ct);

        let mut acc: Option<Ciphertext> = None;
        let accumulate = |acc: &mut Option<Ciphertext>, term: Ciphertext| {
            match acc {
                Some(a) => {
                    ring.add_assign(&mut a.c0, &term.c0);
                    ring.add_assign(&mut a.c1, &term.c1);
                }
                None => *acc = Some(term),
            }
        };

        if lt.n1 == 0 {
            for (&k, pt) in &lt.plaintexts {
                let rotated = self.automorphism_hoisted(&ct, &digits, self.params().galois_element(k as i64))?;
                accumulate(&mut acc, self.mul_plaintext(&rotated, pt)?);
            }
        } else {
            let slots = 1usize << lt.log_slots;
            let (index, _, baby) = bsgs_index(&lt.indexes(), slots, lt.n1);
            let mut baby_rotated = BTreeMap::new();
            for &i in &baby {
                let g = self.params().galois_element(i as i64);
                baby_rotated.insert(i, self.automorphism_hoisted(&ct, &digits, g)?);
            }
            for (&j, babies) in &index {
                let mut inner: Option<Ciphertext> = None;
                for &i in babies {
                    let k = (i + j) & (slots - 1);
                    let term = self.mul_plaintext(&baby_rotated[&i], &lt.plaintexts[&k])?;
                    accumulate(&mut inner, term);
                }
                if let Some(inner) = inner {
                    let giant = if j == 0 { inner } else { self.rotate(&inner, j as i64)? };
                    accumulate(&mut acc, giant);
                }
            }
        }

        acc.ok_or_else(|| Error::arithmetic("linear transformation without diagonals"))
    }
}
