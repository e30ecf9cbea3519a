//! Shared fixtures for the integration tests.
//!
//! Key generation dominates the running time, so every test binary builds
//! its fixture once and hands out shallow copies of the evaluator.
#![allow(dead_code)]

use std::sync::{Mutex, Once};

use ckks_bootstrapping::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use rustfft::num_complex::Complex64;

static TRACING: Once = Once::new();

/// Install a `RUST_LOG`-driven subscriber once per test binary.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Residual chain of three primes with a 40-bit scale, NTT-friendly in a
/// bootstrapping ring of degree 2^(log_nth_root − 1).
pub fn residual_literal(log_n: usize, log_nth_root: usize, ring_kind: RingKind) -> ParametersLiteral {
    ParametersLiteral {
        log_n,
        log_q: vec![55, 40, 40],
        log_p: vec![61],
        log_default_scale: 40,
        log_nth_root,
        ring_kind,
        ..Default::default()
    }
}

pub fn complex_values(count: usize, seed: u64) -> Vec<Complex64> {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    (0..count)
        .map(|_| Complex64::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0)))
        .collect()
}

pub fn real_values(count: usize, seed: u64) -> Vec<f64> {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    (0..count).map(|_| rng.gen_range(-1.0..1.0)).collect()
}

pub struct Fixture {
    pub params: BootstrappingParameters,
    pub residual_sk: SecretKey,
    pub bootstrapping_sk: SecretKey,
    pub encoder: Encoder,
    pub decryptor: Decryptor,
    prototype: Mutex<Evaluator>,
}

impl Fixture {
    pub fn new(residual: ParametersLiteral, literal: BootstrappingParametersLiteral) -> Self {
        init_tracing();
        let residual = Parameters::new(residual).unwrap();
        let params = BootstrappingParameters::new(&residual, &literal).unwrap();
        let residual_sk = KeyGenerator::with_seed(&residual, 42).gen_secret_key();
        let (keys, bootstrapping_sk) = params.gen_evaluation_keys_with_seed(&residual_sk, 7).unwrap();
        let evaluator = Evaluator::new(&params, keys).unwrap();
        Self {
            encoder: Encoder::new(&residual),
            decryptor: Decryptor::new(&residual, &residual_sk),
            params,
            residual_sk,
            bootstrapping_sk,
            prototype: Mutex::new(evaluator),
        }
    }

    pub fn residual(&self) -> &Parameters {
        &self.params.residual
    }

    pub fn evaluator(&self) -> Evaluator {
        self.prototype
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .shallow_copy()
    }

    pub fn encrypt(&self, values: &[Complex64], log_slots: usize, level: usize, seed: u64) -> Ciphertext {
        let residual = self.residual();
        let pt = self
            .encoder
            .encode(values, log_slots, residual.default_scale(), level)
            .unwrap();
        Encryptor::with_seed(residual, &self.residual_sk, seed).encrypt(&pt).unwrap()
    }

    pub fn encrypt_real(&self, values: &[f64], log_slots: usize, level: usize, seed: u64) -> Ciphertext {
        let residual = self.residual();
        let pt = self
            .encoder
            .encode_real(values, log_slots, residual.default_scale(), level)
            .unwrap();
        Encryptor::with_seed(residual, &self.residual_sk, seed).encrypt(&pt).unwrap()
    }

    pub fn decrypt(&self, ct: &Ciphertext) -> Vec<Complex64> {
        self.encoder.decode(&self.decryptor.decrypt(ct))
    }

    pub fn decrypt_real(&self, ct: &Ciphertext) -> Vec<f64> {
        self.encoder.decode_real(&self.decryptor.decrypt(ct))
    }

    /// Decrypt a ciphertext of the bootstrapping ring.
    pub fn decrypt_bootstrapping(&self, ct: &Ciphertext) -> Vec<Complex64> {
        let btp = &self.params.bootstrapping;
        let pt = Decryptor::new(btp, &self.bootstrapping_sk).decrypt(ct);
        Encoder::new(btp).decode(&pt)
    }
}

pub fn precision(want: &[Complex64], have: &[Complex64]) -> PrecisionStats {
    let stats = PrecisionStats::new(want, have);
    tracing::info!(
        mean_real = stats.mean_precision.real,
        mean_imag = stats.mean_precision.imag,
        min_real = stats.min_precision.real,
        "precision"
    );
    stats
}

pub fn assert_precision(want: &[Complex64], have: &[Complex64], bits: f64) {
    let stats = precision(want, have);
    assert!(
        stats.mean_precision.real >= bits && stats.mean_precision.imag >= bits,
        "mean precision {:?} below {bits} bits",
        stats.mean_precision
    );
}
