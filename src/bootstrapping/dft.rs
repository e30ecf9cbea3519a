//! Homomorphic DFT: CoeffsToSlots and SlotsToCoeffs
//!
//! The special FFT of the encoder is factored into log2(slots) butterfly
//! layers, each a matrix with three non-zero diagonals. Consecutive layers are
//! merged according to `levels`, so a group of `levels[i]` matrices shares one
//! rescale: every matrix of the group is encoded with the scale
//! q_ℓ^(1/levels[i]).
//!
//! **Formats:**
//! - `Standard`: the transform alone
//! - `SplitRealAndImag`: CoeffsToSlots returns the real and imaginary parts of
//!   the coefficient vector as two ciphertexts
//! - `RepackImagAsReal`: for sparse slot counts the imaginary part is rotated
//!   next to the real part so a single ciphertext carries both

use std::collections::BTreeSet;
use std::f64::consts::PI;

use rustfft::num_complex::Complex64;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::ckks::{required_rotations, Ciphertext, Diagonals, Encoder, Evaluator, LinearTransformation, Parameters};
use crate::error::{Error, Result, Stage};

/// Direction of the transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DftType {
    /// Inverse special FFT (CoeffsToSlots)
    Encode,
    /// Special FFT (SlotsToCoeffs)
    Decode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DftFormat {
    #[default]
    Standard,
    SplitRealAndImag,
    RepackImagAsReal,
}

/// Serializable description of a homomorphic DFT.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DftMatrixLiteral {
    pub dft_type: DftType,
    pub log_slots: usize,
    /// Level of the input ciphertext
    pub level_q: usize,
    /// Number of merged matrices per consumed level
    pub levels: Vec<usize>,
    #[serde(default)]
    pub format: DftFormat,
    /// Factor folded into the transform; `None` means 1
    #[serde(default, with = "complex_option")]
    pub scaling: Option<Complex64>,
    #[serde(default)]
    pub bit_reversed: bool,
    /// Log2 of the giant/baby step ratio; negative selects naive evaluation
    #[serde(default)]
    pub log_bsgs_ratio: i32,
}

impl DftMatrixLiteral {
    /// Levels consumed (`actual`) or number of matrices.
    pub fn depth(&self, actual: bool) -> usize {
        if actual {
            self.levels.len()
        } else {
            self.levels.iter().sum()
        }
    }

    fn check(&self, params: &Parameters) -> Result<()> {
        let depth = self.depth(false);
        if self.levels.is_empty() || self.levels.contains(&0) {
            return Err(Error::config("DFT levels must be non-empty and positive"));
        }
        if self.log_slots == 0 || self.log_slots > params.log_max_slots() {
            return Err(Error::config(format!(
                "DFT over 2^{} slots, the ring holds at most 2^{}",
                self.log_slots,
                params.log_max_slots()
            )));
        }
        if depth > self.log_slots {
            return Err(Error::config(format!(
                "{depth} DFT matrices for only {} butterfly layers",
                self.log_slots
            )));
        }
        if self.level_q > params.max_level() || self.level_q < self.depth(true) {
            return Err(Error::config(format!(
                "DFT starting at level {} with depth {} does not fit a chain of {} levels",
                self.level_q,
                self.depth(true),
                params.max_level()
            )));
        }
        Ok(())
    }

    fn log_dslots(&self, log_max_slots: usize) -> usize {
        if self.log_slots < log_max_slots && self.format == DftFormat::RepackImagAsReal {
            self.log_slots + 1
        } else {
            self.log_slots
        }
    }

    fn butterfly_rotation(&self, log_l: usize, level: usize) -> usize {
        let forward = matches!(
            (self.dft_type, self.bit_reversed),
            (DftType::Encode, false) | (DftType::Decode, true)
        );
        if forward {
            1 << (level - 1)
        } else {
            1 << (log_l - level)
        }
    }

    /// Number of butterfly layers merged into each matrix.
    fn merge(&self) -> Vec<usize> {
        let max_depth = self.depth(false);
        let mut level = self.log_slots;
        let mut merge = vec![0; max_depth];
        for i in 0..max_depth {
            let depth = level.div_ceil(max_depth - i);
            match self.dft_type {
                DftType::Encode => merge[i] = depth,
                DftType::Decode => merge[max_depth - i - 1] = depth,
            }
            level -= depth;
        }
        merge
    }

    /// Non-zero diagonal indexes of every matrix.
    fn index_maps(&self, log_n: usize) -> Vec<BTreeSet<usize>> {
        let log_slots = self.log_slots;
        let repack = self.format == DftFormat::RepackImagAsReal;
        let merge = self.merge();
        let mut level = log_slots;
        let mut maps = Vec::with_capacity(merge.len());

        for (i, &m) in merge.iter().enumerate() {
            let (mut map, n) = if log_slots < log_n - 1 && self.dft_type == DftType::Decode && i == 0 && repack {
                let map: BTreeSet<usize> = [0, 1 << log_slots].into_iter().collect();
                let n = 2 << log_slots;
                (self.next_index_map(&map, n, level), n)
            } else {
                let rot = self.butterfly_rotation(log_slots, level);
                let map: BTreeSet<usize> = [0, rot, (1 << log_slots) - rot].into_iter().collect();
                (map, 1 << log_slots)
            };
            let mut next = level - 1;
            for _ in 1..m {
                map = self.next_index_map(&map, n, next);
                next -= 1;
            }
            maps.push(map);
            level -= m;
        }
        maps
    }

    fn next_index_map(&self, map: &BTreeSet<usize>, n: usize, level: usize) -> BTreeSet<usize> {
        let rot = self.butterfly_rotation(self.log_slots, level) & (n - 1);
        map.iter()
            .flat_map(|&i| [i, (i + rot) & (n - 1), (i + n - rot) & (n - 1)])
            .collect()
    }

    /// Galois elements needed to evaluate the transform with `params`.
    pub fn galois_elements(&self, params: &Parameters) -> Vec<u64> {
        let log_dslots = self.log_dslots(params.log_max_slots());
        let mut rotations: BTreeSet<i64> = BTreeSet::new();
        if log_dslots != self.log_slots && self.dft_type == DftType::Encode {
            rotations.insert(1 << self.log_slots);
        }
        for map in self.index_maps(params.log_n()) {
            let diags: Vec<usize> = map.into_iter().collect();
            rotations.extend(required_rotations(&diags, log_dslots, self.log_bsgs_ratio));
        }
        let mut out: Vec<u64> = rotations.into_iter().map(|r| params.galois_element(r)).collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Diagonals of every matrix, in evaluation order.
    pub fn gen_matrices(&self, log_n: usize) -> Vec<Diagonals> {
        let log_slots = self.log_slots;
        let slots = 1usize << log_slots;
        let log_dslots = self.log_dslots(log_n - 1);
        let repack = self.format == DftFormat::RepackImagAsReal;

        let roots: Vec<Complex64> = (0..=4 * slots)
            .map(|k| Complex64::from_polar(1.0, 2.0 * PI * k as f64 / (4 * slots) as f64))
            .collect();
        let mut pow5 = vec![1usize; 2 * slots + 1];
        for i in 1..pow5.len() {
            pow5[i] = (pow5[i - 1] * 5) & (4 * slots - 1);
        }

        let mut layers = match self.dft_type {
            DftType::Encode => ifft_layers(log_slots, 1 << log_dslots, &roots, &pow5),
            DftType::Decode => fft_layers(log_slots, 1 << log_dslots, &roots, &pow5),
        };

        let merge = self.merge();
        let mut level = log_slots;
        let mut matrices = Vec::with_capacity(merge.len());
        for (i, &m) in merge.iter().enumerate() {
            let (mut matrix, n) =
                if log_slots != log_dslots && self.dft_type == DftType::Decode && i == 0 && repack {
                    let n = 2 * slots;
                    let layer = &mut layers[log_slots - level];
                    (self.multiply_next(&repack_matrix(log_slots), n, level, layer), n)
                } else {
                    let layer = &mut layers[log_slots - level];
                    (self.butterfly_matrix(level, layer), slots)
                };
            let mut next = level - 1;
            for _ in 1..m {
                let layer = &mut layers[log_slots - next];
                matrix = self.multiply_next(&matrix, n, next, layer);
                next -= 1;
            }
            matrices.push(matrix);
            level -= m;
        }

        if log_slots != log_dslots && self.dft_type == DftType::Encode && repack {
            if let Some(last) = matrices.last_mut() {
                for diag in last.values_mut() {
                    diag[slots..].iter_mut().for_each(|v| *v = Complex64::new(0.0, 0.0));
                }
            }
        }

        let mut scaling = self.scaling.unwrap_or(Complex64::new(1.0, 0.0));
        if self.dft_type == DftType::Encode {
            scaling /= match self.format {
                DftFormat::Standard => slots as f64,
                _ => (2 * slots) as f64,
            };
        }
        let scaling = scaling.powf(1.0 / self.depth(false) as f64);
        for matrix in &mut matrices {
            for diag in matrix.values_mut() {
                diag.iter_mut().for_each(|v| *v *= scaling);
            }
        }
        matrices
    }

    fn butterfly_matrix(&self, level: usize, layer: &mut Layer) -> Diagonals {
        let log_l = self.log_slots;
        let rot = self.butterfly_rotation(log_l, level);
        if self.bit_reversed {
            layer.bit_reverse(1 << log_l);
        }
        let mut out = Diagonals::new();
        add_diagonal(&mut out, 0, &layer.a);
        add_diagonal(&mut out, rot, &layer.b);
        add_diagonal(&mut out, (1 << log_l) - rot, &layer.c);
        out
    }

    /// Left-multiply `matrix` by the butterfly layer of `level`.
    fn multiply_next(&self, matrix: &Diagonals, n: usize, level: usize, layer: &mut Layer) -> Diagonals {
        let rot = self.butterfly_rotation(self.log_slots, level) & (n - 1);
        if self.bit_reversed {
            layer.bit_reverse(1 << self.log_slots);
        }
        let mut out = Diagonals::new();
        for (&i, diag) in matrix {
            let i = i as usize;
            add_diagonal(&mut out, i, &rotate_and_mul(diag, 0, &layer.a));
            add_diagonal(&mut out, (i + rot) & (n - 1), &rotate_and_mul(diag, rot as i64, &layer.b));
            add_diagonal(&mut out, (i + n - rot) & (n - 1), &rotate_and_mul(diag, -(rot as i64), &layer.c));
        }
        out
    }
}

/// One butterfly layer: the diagonals 0, +rot and −rot.
struct Layer {
    a: Vec<Complex64>,
    b: Vec<Complex64>,
    c: Vec<Complex64>,
}

impl Layer {
    fn zeros(len: usize) -> Self {
        let zero = vec![Complex64::new(0.0, 0.0); len];
        Self {
            a: zero.clone(),
            b: zero.clone(),
            c: zero,
        }
    }

    fn bit_reverse(&mut self, n: usize) {
        for v in [&mut self.a, &mut self.b, &mut self.c] {
            bit_reverse_in_place(&mut v[..n]);
            if v.len() > n {
                bit_reverse_in_place(&mut v[n..2 * n]);
            }
        }
    }
}

fn bit_reverse_in_place(v: &mut [Complex64]) {
    let n = v.len();
    let bits = n.trailing_zeros();
    if bits == 0 {
        return;
    }
    for i in 0..n {
        let j = i.reverse_bits() >> (usize::BITS - bits);
        if i < j {
            v.swap(i, j);
        }
    }
}

fn fft_layers(log_l: usize, dslots: usize, roots: &[Complex64], pow5: &[usize]) -> Vec<Layer> {
    let n = 1usize << log_l;
    let size = if 2 * n == dslots { 2 } else { 1 };
    let one = Complex64::new(1.0, 0.0);
    let mut layers = Vec::with_capacity(log_l);

    let mut m = 2;
    while m <= n {
        let mut layer = Layer::zeros(dslots);
        let tt = m >> 1;
        let gap = n / m;
        let mask = (m << 2) - 1;
        for i in (0..n).step_by(m) {
            for j in 0..m >> 1 {
                let k = (pow5[j] & mask) * gap;
                let (idx1, idx2) = (i + j, i + j + tt);
                for u in 0..size {
                    layer.a[idx1 + u * n] = one;
                    layer.a[idx2 + u * n] = -roots[k];
                    layer.b[idx1 + u * n] = roots[k];
                    layer.c[idx2 + u * n] = one;
                }
            }
        }
        layers.push(layer);
        m <<= 1;
    }
    layers
}

fn ifft_layers(log_l: usize, dslots: usize, roots: &[Complex64], pow5: &[usize]) -> Vec<Layer> {
    let n = 1usize << log_l;
    let size = if 2 * n == dslots { 2 } else { 1 };
    let one = Complex64::new(1.0, 0.0);
    let mut layers = Vec::with_capacity(log_l);

    let mut m = n;
    while m >= 2 {
        let mut layer = Layer::zeros(dslots);
        let tt = m >> 1;
        let gap = n / m;
        let mask = (m << 2) - 1;
        for i in (0..n).step_by(m) {
            for j in 0..m >> 1 {
                let k = ((m << 2) - (pow5[j] & mask)) * gap;
                let (idx1, idx2) = (i + j, i + j + tt);
                for u in 0..size {
                    layer.a[idx1 + u * n] = one;
                    layer.a[idx2 + u * n] = -roots[k];
                    layer.b[idx1 + u * n] = one;
                    layer.c[idx2 + u * n] = roots[k];
                }
            }
        }
        layers.push(layer);
        m >>= 1;
    }
    layers
}

/// Maps [z | w] to [z + i·w | z + i·w].
fn repack_matrix(log_l: usize) -> Diagonals {
    let slots = 1usize << log_l;
    let one = Complex64::new(1.0, 0.0);
    let i = Complex64::new(0.0, 1.0);
    let mut a = vec![one; 2 * slots];
    let mut b = vec![i; 2 * slots];
    a[slots..].iter_mut().for_each(|v| *v = i);
    b[slots..].iter_mut().for_each(|v| *v = one);

    let mut out = Diagonals::new();
    add_diagonal(&mut out, 0, &a);
    add_diagonal(&mut out, slots, &b);
    out
}

fn add_diagonal(matrix: &mut Diagonals, index: usize, v: &[Complex64]) {
    match matrix.get_mut(&(index as i64)) {
        Some(d) => d.iter_mut().zip(v).for_each(|(x, y)| *x += y),
        None => {
            matrix.insert(index as i64, v.to_vec());
        }
    }
}

/// c[i] = b[i] · a[(i + k) mod len]
fn rotate_and_mul(a: &[Complex64], k: i64, b: &[Complex64]) -> Vec<Complex64> {
    let len = a.len() as i64;
    b.iter()
        .enumerate()
        .map(|(i, &bi)| bi * a[(i as i64 + k).rem_euclid(len) as usize])
        .collect()
}

/// Pre-encoded homomorphic DFT.
#[derive(Debug, Clone)]
pub struct DftMatrix {
    pub literal: DftMatrixLiteral,
    pub matrices: Vec<LinearTransformation>,
}

impl DftMatrix {
    /// Generate and encode the matrices of `lit` for `params`.
    ///
    /// # Errors
    /// A configuration error when the literal does not fit the parameters.
    pub fn new(params: &Parameters, lit: &DftMatrixLiteral, encoder: &Encoder) -> Result<Self> {
        lit.check(params)?;
        let log_dslots = lit.log_dslots(params.log_max_slots());
        let diagonals = lit.gen_matrices(params.log_n());

        let mut matrices = Vec::with_capacity(diagonals.len());
        let mut diagonals = diagonals.iter();
        let mut level = lit.level_q;
        for &count in &lit.levels {
            let scale = (params.q()[level] as f64).powf(1.0 / count as f64);
            for _ in 0..count {
                let diags = diagonals
                    .next()
                    .ok_or_else(|| Error::config("fewer DFT matrices than declared levels"))?;
                matrices.push(LinearTransformation::new(
                    encoder,
                    diags,
                    log_dslots,
                    level,
                    scale,
                    lit.log_bsgs_ratio,
                )?);
            }
            level -= params.levels_consumed_per_rescaling();
        }

        Ok(Self {
            literal: lit.clone(),
            matrices,
        })
    }

    pub fn level_q(&self) -> usize {
        self.literal.level_q
    }

    pub fn log_slots(&self) -> usize {
        self.literal.log_slots
    }

    /// Level of the output ciphertext.
    pub fn output_level(&self) -> usize {
        self.literal.level_q - self.literal.depth(true)
    }

    /// Galois elements needed by the encoded matrices.
    pub fn galois_elements(&self, params: &Parameters) -> Vec<u64> {
        let mut out: Vec<u64> = self.matrices.iter().flat_map(|m| m.galois_elements(params)).collect();
        let repacked = self.literal.format == DftFormat::RepackImagAsReal
            && self.literal.log_slots < params.log_max_slots();
        if repacked && self.literal.dft_type == DftType::Encode {
            out.push(params.galois_element(1 << self.literal.log_slots));
        }
        out.sort_unstable();
        out.dedup();
        out
    }
}

/// Evaluator of homomorphic DFTs.
pub struct DftEvaluator {
    eval: Evaluator,
}

impl DftEvaluator {
    pub fn new(eval: Evaluator) -> Self {
        Self { eval }
    }

    pub fn shallow_copy(&self) -> Self {
        Self {
            eval: self.eval.shallow_copy(),
        }
    }

    /// Apply the matrix groups in order, rescaling once per group.
    fn dft(&self, ct: &Ciphertext, dft: &DftMatrix) -> Result<Ciphertext> {
        let mut matrices = dft.matrices.iter();
        let mut out = ct.clone();
        for &count in &dft.literal.levels {
            for lt in matrices.by_ref().take(count) {
                out = self.eval.linear_transform(&out, lt)?;
            }
            self.eval.rescale_assign(&mut out)?;
        }
        out.log_slots = dft.log_slots();
        Ok(out)
    }

    fn at_start_level(ct: &Ciphertext, dft: &DftMatrix, stage: Stage) -> Result<Ciphertext> {
        if ct.level() < dft.level_q() {
            return Err(Error::level(
                stage,
                format!("input at level {} below the DFT start level {}", ct.level(), dft.level_q()),
            ));
        }
        Ok(ct.at_level(dft.level_q()))
    }

    /// Homomorphic decoding: the coefficients of `ct` become slot values.
    ///
    /// Returns the real part and, when the format keeps them apart and the
    /// slots are full, the imaginary part.
    #[instrument(skip_all, fields(level = ct.level(), log_slots = dft.log_slots()))]
    pub fn coeffs_to_slots(&self, ct: &Ciphertext, dft: &DftMatrix) -> Result<(Ciphertext, Option<Ciphertext>)> {
        let ct = Self::at_start_level(ct, dft, Stage::CoeffsToSlots)?;
        let eval = &self.eval;

        if dft.literal.format == DftFormat::Standard {
            return Ok((self.dft(&ct, dft)?, None));
        }

        let z = self.dft(&ct, dft)?;
        let conj = eval.conjugate(&z)?;
        let imag = eval.mul_by_neg_i(&eval.sub(&z, &conj)?)?;
        let mut real = eval.add(&conj, &z)?;

        let log_max_slots = eval.params().log_max_slots();
        if dft.literal.format == DftFormat::RepackImagAsReal && dft.log_slots() < log_max_slots {
            let rotated = eval.rotate(&imag, 1 << dft.log_slots())?;
            eval.add_assign(&mut real, &rotated)?;
            return Ok((real, None));
        }
        if dft.log_slots() == log_max_slots || dft.literal.format == DftFormat::SplitRealAndImag {
            return Ok((real, Some(imag)));
        }
        Ok((real, None))
    }

    /// Homomorphic encoding: the slot values become coefficients.
    #[instrument(skip_all, fields(level = real.level(), log_slots = dft.log_slots()))]
    pub fn slots_to_coeffs(&self, real: &Ciphertext, imag: Option<&Ciphertext>, dft: &DftMatrix) -> Result<Ciphertext> {
        let real = Self::at_start_level(real, dft, Stage::SlotsToCoeffs)?;
        match imag {
            Some(imag) => {
                let imag = Self::at_start_level(imag, dft, Stage::SlotsToCoeffs)?;
                let mut ct = self.eval.mul_by_i(&imag)?;
                self.eval.add_assign(&mut ct, &real)?;
                self.dft(&ct, dft)
            }
            None => self.dft(&real, dft),
        }
    }
}

mod complex_option {
    use rustfft::num_complex::Complex64;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(v: &Option<Complex64>, s: S) -> Result<S::Ok, S::Error> {
        v.map(|c| [c.re, c.im]).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Complex64>, D::Error> {
        Ok(Option::<[f64; 2]>::deserialize(d)?.map(|[re, im]| Complex64::new(re, im)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn literal(dft_type: DftType, log_slots: usize, levels: Vec<usize>) -> DftMatrixLiteral {
        DftMatrixLiteral {
            dft_type,
            log_slots,
            level_q: levels.len(),
            levels,
            format: DftFormat::Standard,
            scaling: None,
            bit_reversed: false,
            log_bsgs_ratio: 1,
        }
    }

    /// Apply diagonal matrices to a plain vector.
    fn apply(matrices: &[Diagonals], v: &[Complex64]) -> Vec<Complex64> {
        let n = v.len();
        let mut v = v.to_vec();
        for m in matrices {
            let mut out = vec![Complex64::new(0.0, 0.0); n];
            for (&k, d) in m {
                for i in 0..n {
                    out[i] += d[i] * v[(i + k as usize) % n];
                }
            }
            v = out;
        }
        v
    }

    #[test]
    fn test_merge_spreads_layers() {
        let enc = literal(DftType::Encode, 7, vec![1, 1, 1]);
        assert_eq!(enc.merge(), vec![3, 2, 2]);
        let dec = literal(DftType::Decode, 7, vec![1, 1, 1]);
        assert_eq!(dec.merge(), vec![2, 2, 3]);
    }

    #[test]
    fn test_decode_then_encode_is_identity() {
        let log_slots = 5;
        let slots = 1 << log_slots;
        let dec = literal(DftType::Decode, log_slots, vec![1, 2]);
        let enc = literal(DftType::Encode, log_slots, vec![1, 1, 1]);

        let v: Vec<Complex64> = (0..slots)
            .map(|i| Complex64::new((i as f64 * 0.37).sin(), (i as f64 * 0.11).cos()))
            .collect();
        let log_n = log_slots + 1;
        let there = apply(&dec.gen_matrices(log_n), &v);
        let back = apply(&enc.gen_matrices(log_n), &there);
        // the encoding direction carries the 1/slots normalization
        for (x, y) in v.iter().zip(&back) {
            assert!((x - y).norm() < 1e-9, "{x} vs {y}");
        }
    }

    #[test]
    fn test_index_maps_match_generated_diagonals() {
        for (dft_type, format) in [
            (DftType::Encode, DftFormat::RepackImagAsReal),
            (DftType::Decode, DftFormat::RepackImagAsReal),
            (DftType::Decode, DftFormat::Standard),
        ] {
            let lit = DftMatrixLiteral {
                format,
                ..literal(dft_type, 4, vec![2, 1])
            };
            let log_n = 8;
            let maps = lit.index_maps(log_n);
            let matrices = lit.gen_matrices(log_n);
            for (map, m) in maps.iter().zip(&matrices) {
                let keys: BTreeSet<usize> = m.keys().map(|&k| k as usize).collect();
                assert_eq!(map, &keys);
            }
        }
    }

    #[test]
    fn test_literal_json_round_trip() {
        let lit = DftMatrixLiteral {
            scaling: Some(Complex64::new(0.5, -0.25)),
            bit_reversed: true,
            ..literal(DftType::Encode, 6, vec![2, 2])
        };
        let json = serde_json::to_string(&lit).unwrap();
        let back: DftMatrixLiteral = serde_json::from_str(&json).unwrap();
        assert_eq!(lit, back);
    }

    #[test]
    fn test_bit_reverse() {
        let mut v: Vec<Complex64> = (0..8).map(|i| Complex64::new(i as f64, 0.0)).collect();
        bit_reverse_in_place(&mut v);
        let got: Vec<f64> = v.iter().map(|c| c.re).collect();
        assert_eq!(got, vec![0.0, 4.0, 2.0, 6.0, 1.0, 5.0, 3.0, 7.0]);
    }
}
