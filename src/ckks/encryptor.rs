//! Secret-key encryption and decryption.

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use super::ciphertext::Ciphertext;
use super::encoder::Plaintext;
use super::keys::SecretKey;
use super::params::Parameters;
use crate::error::{Error, Result};
use crate::ring::sampling;

/// Symmetric encryptor: ct = (−a·s + e + m, a).
pub struct Encryptor {
    params: Parameters,
    sk: SecretKey,
    rng: ChaCha20Rng,
}

impl Encryptor {
    pub fn new(params: &Parameters, sk: &SecretKey) -> Self {
        Self {
            params: params.clone(),
            sk: sk.clone(),
            rng: ChaCha20Rng::from_entropy(),
        }
    }

    pub fn with_seed(params: &Parameters, sk: &SecretKey, seed: u64) -> Self {
        Self {
            params: params.clone(),
            sk: sk.clone(),
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }

    /// Encrypt `pt` at its own level and scale.
    pub fn encrypt(&mut self, pt: &Plaintext) -> Result<Ciphertext> {
        if pt.poly.n() != self.params.n() {
            return Err(Error::arithmetic("plaintext ring degree does not match the encryptor"));
        }
        let ring = self.params.ring_q();
        let level = pt.level();

        let c1 = sampling::uniform(&mut self.rng, ring, level + 1);

        let e = sampling::gaussian(&mut self.rng, self.params.n(), self.params.sigma());
        let mut c0 = ring.from_signed(&e, level + 1);
        ring.ntt(&mut c0);

        let mut a_s = c1.clone();
        ring.mul_coeffs_assign(&mut a_s, &self.sk.value().q);
        ring.sub_assign(&mut c0, &a_s);
        ring.add_assign(&mut c0, &pt.poly);

        Ok(Ciphertext::new(c0, c1, pt.scale, pt.log_slots, self.params.ring_kind()))
    }
}

/// Decryptor: m = c0 + c1·s.
pub struct Decryptor {
    params: Parameters,
    sk: SecretKey,
}

impl Decryptor {
    pub fn new(params: &Parameters, sk: &SecretKey) -> Self {
        Self {
            params: params.clone(),
            sk: sk.clone(),
        }
    }

    pub fn decrypt(&self, ct: &Ciphertext) -> Plaintext {
        let ring = self.params.ring_q();
        let mut m = ct.c1.clone();
        ring.mul_coeffs_assign(&mut m, &self.sk.value().q);
        ring.add_assign(&mut m, &ct.c0);
        Plaintext {
            poly: m,
            scale: ct.scale,
            log_slots: ct.log_slots,
        }
    }
}
