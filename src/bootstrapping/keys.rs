//! Bootstrapping evaluation keys
//!
//! Besides the relinearization and Galois keys of the circuit, bootstrapping
//! needs switching keys to enter and leave the bootstrapping ring:
//!
//! - ring-degree switching N1 ↔ N2 for standard residual rings of smaller degree
//! - domain switching for conjugate-invariant residual rings
//! - dense ↔ sparse encapsulation keys around ModUp, when an ephemeral secret
//!   weight is set
//!
//! Every key is generated under a secret of the bootstrapping ring, returned
//! alongside the keys.

use std::sync::Arc;

use tracing::debug;

use super::parameters::BootstrappingParameters;
use crate::ckks::{EvaluationKey, EvaluationKeySet, KeyGenerator, SecretKey};
use crate::error::{Error, Result};
use crate::ring::{embed_signed, unfold_signed, RingKind};

/// Every key the bootstrapping circuit consumes.
#[derive(Debug, Clone)]
pub struct BootstrappingKeys {
    /// Residual ring degree N1 to bootstrapping degree N2
    pub ring_up: Option<Arc<EvaluationKey>>,
    /// Bootstrapping degree N2 back to N1
    pub ring_down: Option<Arc<EvaluationKey>>,
    /// Unfolded conjugate-invariant secret to the standard secret
    pub real_to_complex: Option<Arc<EvaluationKey>>,
    /// Standard secret to the unfolded conjugate-invariant secret
    pub complex_to_real: Option<Arc<EvaluationKey>>,
    /// Dense secret to the ephemeral sparse secret, at level 0
    pub dense_to_sparse: Option<Arc<EvaluationKey>>,
    /// Ephemeral sparse secret back to the dense secret
    pub sparse_to_dense: Option<Arc<EvaluationKey>>,
    /// Relinearization and Galois keys of the circuit
    pub evaluation_keys: Arc<EvaluationKeySet>,
}

impl BootstrappingKeys {
    /// Serialized size of all keys, in bytes.
    pub fn binary_size(&self) -> usize {
        let switching: usize = [
            &self.ring_up,
            &self.ring_down,
            &self.real_to_complex,
            &self.complex_to_real,
            &self.dense_to_sparse,
            &self.sparse_to_dense,
        ]
        .into_iter()
        .flatten()
        .map(|k| k.binary_size())
        .sum();
        switching + self.evaluation_keys.binary_size()
    }

    /// Check that every key required by `params` is present.
    pub fn check(&self, params: &BootstrappingParameters) -> Result<()> {
        let keys = &self.evaluation_keys;
        keys.relinearization_key()?;
        for g in params.galois_elements(&params.bootstrapping) {
            keys.galois_key(g)?;
        }

        let residual = &params.residual;
        match residual.ring_kind() {
            RingKind::Standard if residual.n() != params.bootstrapping.n() => {
                if self.ring_up.is_none() || self.ring_down.is_none() {
                    return Err(Error::missing_key("ring switching keys N1 ↔ N2"));
                }
            }
            RingKind::Standard => {}
            RingKind::ConjugateInvariant => {
                if self.real_to_complex.is_none() || self.complex_to_real.is_none() {
                    return Err(Error::missing_key("domain switching keys"));
                }
            }
        }

        if params.ephemeral_secret_weight != 0 {
            if self.dense_to_sparse.is_none() {
                return Err(Error::missing_key("dense to sparse encapsulation key"));
            }
            if self.sparse_to_dense.is_none() {
                return Err(Error::missing_key("sparse to dense encapsulation key"));
            }
        }
        Ok(())
    }
}

impl BootstrappingParameters {
    /// Generate the bootstrapping keys for the residual secret `sk`, with an
    /// OS-seeded generator.
    ///
    /// Returns the keys and the secret of the bootstrapping ring they were
    /// generated under.
    pub fn gen_evaluation_keys(&self, sk: &SecretKey) -> Result<(BootstrappingKeys, SecretKey)> {
        self.gen_keys(sk, KeyGenerator::new(&self.bootstrapping))
    }

    /// Same as [`BootstrappingParameters::gen_evaluation_keys`] with a
    /// deterministic generator.
    pub fn gen_evaluation_keys_with_seed(&self, sk: &SecretKey, seed: u64) -> Result<(BootstrappingKeys, SecretKey)> {
        self.gen_keys(sk, KeyGenerator::with_seed(&self.bootstrapping, seed))
    }

    fn gen_keys(&self, sk: &SecretKey, mut kgen: KeyGenerator) -> Result<(BootstrappingKeys, SecretKey)> {
        let residual = &self.residual;
        let btp = &self.bootstrapping;
        if sk.n() != residual.n() {
            return Err(Error::config(format!(
                "secret of degree {} for a residual ring of degree {}",
                sk.n(),
                residual.n()
            )));
        }

        let mut keys = BootstrappingKeys {
            ring_up: None,
            ring_down: None,
            real_to_complex: None,
            complex_to_real: None,
            dense_to_sparse: None,
            sparse_to_dense: None,
            evaluation_keys: Arc::default(),
        };

        let sk_btp = match residual.ring_kind() {
            RingKind::ConjugateInvariant => {
                let sk_btp = kgen.gen_secret_key();
                let unfolded = SecretKey::from_signed(btp, unfold_signed(sk.coefficients()))?;
                keys.complex_to_real = Some(Arc::new(kgen.gen_evaluation_key(&sk_btp, &unfolded)?));
                keys.real_to_complex = Some(Arc::new(kgen.gen_evaluation_key(&unfolded, &sk_btp)?));
                sk_btp
            }
            RingKind::Standard if residual.n() != btp.n() => {
                let sk_btp = kgen.gen_secret_key();
                let gap = btp.n() / residual.n();
                let embedded = SecretKey::from_signed(btp, embed_signed(sk.coefficients(), gap))?;
                keys.ring_up = Some(Arc::new(kgen.gen_evaluation_key(&embedded, &sk_btp)?));
                keys.ring_down = Some(Arc::new(kgen.gen_evaluation_key(&sk_btp, &embedded)?));
                sk_btp
            }
            // Same secret, extended to the primes of the bootstrapping ring.
            RingKind::Standard => SecretKey::from_signed(btp, sk.coefficients().to_vec())?,
        };

        if self.ephemeral_secret_weight != 0 {
            let sparse = kgen.gen_secret_key_with_hamming_weight(self.ephemeral_secret_weight);
            keys.dense_to_sparse = Some(Arc::new(kgen.gen_evaluation_key_at_level(&sk_btp, &sparse, 0)?));
            keys.sparse_to_dense = Some(Arc::new(kgen.gen_evaluation_key(&sparse, &sk_btp)?));
        }

        let galois_elements = self.galois_elements(btp);
        debug!(
            galois_keys = galois_elements.len(),
            encapsulation = self.ephemeral_secret_weight != 0,
            "generating bootstrapping keys"
        );
        keys.evaluation_keys = Arc::new(kgen.gen_evaluation_key_set(&sk_btp, &galois_elements));

        Ok((keys, sk_btp))
    }
}
