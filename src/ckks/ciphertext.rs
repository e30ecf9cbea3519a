//! Degree-one CKKS ciphertexts.

use crate::ring::{Poly, RingKind};

/// A ciphertext (c0, c1) decrypting to c0 + c1·s, both components in the NTT domain.
#[derive(Debug, Clone, PartialEq)]
pub struct Ciphertext {
    pub c0: Poly,
    pub c1: Poly,

    /// Scaling factor Δ of the encrypted message
    pub scale: f64,

    /// log2 of the number of slots the message occupies
    pub log_slots: usize,

    pub ring_kind: RingKind,
}

impl Ciphertext {
    pub fn new(c0: Poly, c1: Poly, scale: f64, log_slots: usize, ring_kind: RingKind) -> Self {
        debug_assert_eq!(c0.rows(), c1.rows());
        Self {
            c0,
            c1,
            scale,
            log_slots,
            ring_kind,
        }
    }

    /// A zero ciphertext with the given metadata.
    pub fn zero(n: usize, level: usize, scale: f64, log_slots: usize, ring_kind: RingKind) -> Self {
        Self::new(Poly::zero(n, level + 1), Poly::zero(n, level + 1), scale, log_slots, ring_kind)
    }

    #[inline]
    pub fn level(&self) -> usize {
        self.c0.level()
    }

    /// Ring degree.
    #[inline]
    pub fn n(&self) -> usize {
        self.c0.n()
    }

    #[inline]
    pub fn slots(&self) -> usize {
        1 << self.log_slots
    }

    /// Truncate both components to `level`.
    pub fn drop_to_level(&mut self, level: usize) {
        self.c0.drop_to_level(level);
        self.c1.drop_to_level(level);
    }

    /// Copy restricted to `level`.
    pub fn at_level(&self, level: usize) -> Ciphertext {
        Ciphertext::new(
            self.c0.at_level(level),
            self.c1.at_level(level),
            self.scale,
            self.log_slots,
            self.ring_kind,
        )
    }
}
