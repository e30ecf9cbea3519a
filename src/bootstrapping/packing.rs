//! Packing of sparse ciphertexts
//!
//! A message with 2^s slots only has coefficients on multiples of
//! g = N/2^(s+1). Two such messages a and b are packed as a + X^(g/2)·b,
//! which is a message with 2^(s+1) slots. Stage i of the packing pairs
//! consecutive ciphertexts with the exponent 2^(logGap − i), where
//! logGap = log2(N/2) − s − 1, until one ciphertext remains or the slots are
//! full. Unpacking multiplies a copy of the packed ciphertext by the inverse
//! monomial of each original position; coefficients off the original slot
//! grid then hold the other messages and are ignored by decoding.

use crate::ckks::{Ciphertext, Parameters};
use crate::error::{Error, Result};
use crate::ring::RingKind;

use super::mod1::bit_len;

const SCALE_TOLERANCE: f64 = 1e-12;

#[derive(Debug, Clone)]
pub struct Packer {
    params: Parameters,
    /// Packing stops once this many log-slots are reached
    log_max_slots: usize,
}

impl Packer {
    /// # Errors
    /// A configuration error for conjugate-invariant rings, which have no
    /// monomials.
    pub fn new(params: &Parameters) -> Result<Self> {
        if params.ring_kind() != RingKind::Standard {
            return Err(Error::config("packing needs a standard ring"));
        }
        Ok(Self {
            params: params.clone(),
            log_max_slots: params.log_max_slots(),
        })
    }

    /// Cap the slot count of packed ciphertexts below N/2.
    pub fn with_log_max_slots(mut self, log_max_slots: usize) -> Self {
        self.log_max_slots = log_max_slots.min(self.params.log_max_slots());
        self
    }

    /// Number of packing stages for `count` ciphertexts of 2^`log_slots` slots.
    pub fn stages(&self, log_slots: usize, count: usize) -> usize {
        let free = self.log_max_slots.saturating_sub(log_slots);
        free.min(bit_len(count.saturating_sub(1)))
    }

    /// Number of inputs merged into each packed ciphertext.
    pub fn block_size(&self, log_slots: usize, count: usize) -> usize {
        1 << self.stages(log_slots, count)
    }

    /// Exponent of the monomial that places input `index` of a block.
    fn offset(&self, log_slots: usize, stages: usize, index: usize) -> i64 {
        let log_gap = self.params.log_max_slots().saturating_sub(log_slots + 1);
        (0..stages)
            .filter(|i| index >> i & 1 == 1)
            .map(|i| 1i64 << (log_gap - i))
            .sum()
    }

    /// Merge `cts` into ⌈count / block_size⌉ ciphertexts.
    ///
    /// Input `t` lands in output `t / block_size`. All inputs must share the
    /// ring degree, slot count and scale; each pair is merged at the lower of
    /// the two levels.
    pub fn pack(&self, cts: Vec<Ciphertext>) -> Result<Vec<Ciphertext>> {
        let Some(first) = cts.first() else {
            return Ok(cts);
        };
        let (log_slots, scale) = (first.log_slots, first.scale);
        if log_slots > self.params.log_max_slots() {
            return Err(Error::arithmetic(format!(
                "{log_slots} log-slots exceed the ring maximum {}",
                self.params.log_max_slots()
            )));
        }
        for (i, ct) in cts.iter().enumerate() {
            if ct.n() != self.params.n() || ct.ring_kind != RingKind::Standard {
                return Err(Error::arithmetic(format!(
                    "ciphertext {i} is not a standard ciphertext of degree {}",
                    self.params.n()
                )));
            }
            if ct.log_slots != log_slots {
                return Err(Error::arithmetic(format!(
                    "ciphertext {i} has {} log-slots, expected {log_slots}",
                    ct.log_slots
                )));
            }
            if (ct.scale - scale).abs() > scale * SCALE_TOLERANCE {
                return Err(Error::arithmetic(format!(
                    "ciphertext {i} has scale {}, expected {scale}",
                    ct.scale
                )));
            }
        }

        let ring = self.params.ring_q();
        let stages = self.stages(log_slots, cts.len());
        let log_gap = self.params.log_max_slots().saturating_sub(log_slots + 1);
        let mut cts = cts;
        for i in 0..stages {
            let exponent = 1i64 << (log_gap - i);
            let mut next = Vec::with_capacity(cts.len().div_ceil(2));
            let mut pending = cts.into_iter();
            while let Some(mut even) = pending.next() {
                if let Some(odd) = pending.next() {
                    let level = even.level().min(odd.level());
                    even.drop_to_level(level);
                    let mono = ring
                        .monomial(exponent, level)
                        .ok_or_else(|| Error::arithmetic("monomial in a conjugate-invariant ring"))?;
                    ring.mul_coeffs_then_add(&odd.c0.at_level(level), &mono, &mut even.c0);
                    ring.mul_coeffs_then_add(&odd.c1.at_level(level), &mono, &mut even.c1);
                }
                even.log_slots += 1;
                next.push(even);
            }
            cts = next;
        }
        Ok(cts)
    }

    /// Recover `count` ciphertexts of 2^`log_slots` slots from one packed
    /// ciphertext.
    pub fn unpack(&self, ct: &Ciphertext, log_slots: usize, count: usize) -> Result<Vec<Ciphertext>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let stages = self.stages(log_slots, count);
        if count > 1 << stages {
            return Err(Error::arithmetic(format!(
                "{count} ciphertexts of {log_slots} log-slots do not fit in one packed ciphertext"
            )));
        }
        if ct.log_slots != log_slots + stages {
            return Err(Error::arithmetic(format!(
                "packed ciphertext has {} log-slots, expected {}",
                ct.log_slots,
                log_slots + stages
            )));
        }

        let ring = self.params.ring_q();
        (0..count)
            .map(|t| {
                let mut out = ct.clone();
                let k = self.offset(log_slots, stages, t);
                if k != 0 {
                    let mono = ring
                        .monomial(-k, ct.level())
                        .ok_or_else(|| Error::arithmetic("monomial in a conjugate-invariant ring"))?;
                    ring.mul_coeffs_assign(&mut out.c0, &mono);
                    ring.mul_coeffs_assign(&mut out.c1, &mono);
                }
                out.log_slots = log_slots;
                Ok(out)
            })
            .collect()
    }

    /// Inverse of [`Packer::pack`] for `count` original ciphertexts.
    pub fn unpack_many(&self, packed: &[Ciphertext], log_slots: usize, count: usize) -> Result<Vec<Ciphertext>> {
        let block = self.block_size(log_slots, count);
        if packed.len() != count.div_ceil(block) {
            return Err(Error::arithmetic(format!(
                "{} packed ciphertexts for {count} inputs in blocks of {block}",
                packed.len()
            )));
        }
        let mut out = Vec::with_capacity(count);
        for (j, ct) in packed.iter().enumerate() {
            // A short last block still went through every stage.
            let mut unpacked = self.unpack(ct, log_slots, block)?;
            unpacked.truncate(block.min(count - j * block));
            out.append(&mut unpacked);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ckks::{Decryptor, Encoder, Encryptor, KeyGenerator, ParametersLiteral};
    use rustfft::num_complex::Complex64;

    fn params() -> Parameters {
        Parameters::new(ParametersLiteral {
            log_n: 8,
            log_q: vec![55, 40, 40],
            log_p: vec![61],
            log_default_scale: 40,
            ..Default::default()
        })
        .unwrap()
    }

    fn message(t: usize, slots: usize) -> Vec<Complex64> {
        (0..slots)
            .map(|i| Complex64::new(((t * 7 + i) as f64 * 0.3).sin(), ((t + i) as f64 * 0.2).cos() * 0.5))
            .collect()
    }

    #[test]
    fn test_stage_count() {
        let packer = Packer::new(&params()).unwrap();
        // log_max_slots = 7
        assert_eq!(packer.stages(3, 1), 0);
        assert_eq!(packer.stages(3, 2), 1);
        assert_eq!(packer.stages(3, 5), 3);
        assert_eq!(packer.stages(6, 5), 1);
        assert_eq!(packer.stages(7, 5), 0);
        assert_eq!(packer.block_size(3, 5), 8);

        let capped = packer.with_log_max_slots(4);
        assert_eq!(capped.stages(3, 5), 1);
        assert_eq!(capped.block_size(3, 5), 2);
    }

    #[test]
    fn test_pack_then_unpack_recovers_messages() {
        let params = params();
        let mut kgen = KeyGenerator::with_seed(&params, 3);
        let sk = kgen.gen_secret_key();
        let encoder = Encoder::new(&params);
        let mut encryptor = Encryptor::with_seed(&params, &sk, 5);
        let decryptor = Decryptor::new(&params, &sk);
        let packer = Packer::new(&params).unwrap();

        let log_slots = 3;
        let count = 5;
        let cts: Vec<Ciphertext> = (0..count)
            .map(|t| {
                let pt = encoder
                    .encode(&message(t, 1 << log_slots), log_slots, params.default_scale(), params.max_level())
                    .unwrap();
                encryptor.encrypt(&pt).unwrap()
            })
            .collect();

        let packed = packer.pack(cts).unwrap();
        assert_eq!(packed.len(), 1);
        assert_eq!(packed[0].log_slots, log_slots + 3);

        let unpacked = packer.unpack_many(&packed, log_slots, count).unwrap();
        assert_eq!(unpacked.len(), count);
        for (t, ct) in unpacked.iter().enumerate() {
            assert_eq!(ct.log_slots, log_slots);
            let got = encoder.decode(&decryptor.decrypt(ct));
            for (g, w) in got.iter().zip(&message(t, 1 << log_slots)) {
                assert!((g - w).norm() < 1e-6, "message {t}: {g} vs {w}");
            }
        }
    }

    #[test]
    fn test_pack_rejects_mixed_slots() {
        let params = params();
        let packer = Packer::new(&params).unwrap();
        let a = Ciphertext::zero(params.n(), 1, params.default_scale(), 3, RingKind::Standard);
        let b = Ciphertext::zero(params.n(), 1, params.default_scale(), 4, RingKind::Standard);
        assert!(matches!(packer.pack(vec![a, b]), Err(Error::Arithmetic(_))));
    }

    #[test]
    fn test_full_slots_are_not_packed() {
        let params = params();
        let packer = Packer::new(&params).unwrap();
        let log_max = params.log_max_slots();
        let cts = vec![Ciphertext::zero(params.n(), 1, params.default_scale(), log_max, RingKind::Standard); 3];
        let packed = packer.pack(cts).unwrap();
        assert_eq!(packed.len(), 3);
        assert_eq!(packer.unpack_many(&packed, log_max, 3).unwrap().len(), 3);
    }
}
