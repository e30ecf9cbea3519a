//! # Quickstart
//!
//! ```no_run
//! use ckks_bootstrapping::prelude::*;
//!
//! # fn main() -> ckks_bootstrapping::Result<()> {
//! let residual = Parameters::new(ParametersLiteral {
//!     log_n: 12,
//!     log_q: vec![55, 40, 40],
//!     log_p: vec![61],
//!     log_default_scale: 40,
//!     log_nth_root: 14,
//!     ..Default::default()
//! })?;
//! let params = BootstrappingParameters::new(
//!     &residual,
//!     &BootstrappingParametersLiteral {
//!         log_n: Some(13),
//!         ..Default::default()
//!     },
//! )?;
//!
//! let mut kgen = KeyGenerator::new(&residual);
//! let sk = kgen.gen_secret_key();
//! let (keys, _) = params.gen_evaluation_keys(&sk)?;
//! let evaluator = Evaluator::new(&params, keys)?;
//!
//! let encoder = Encoder::new(&residual);
//! let mut encryptor = Encryptor::new(&residual, &sk);
//! let values = vec![0.25; residual.max_slots()];
//! let pt = encoder.encode_real(&values, residual.log_max_slots(), residual.default_scale(), 1)?;
//! let ct = encryptor.encrypt(&pt)?;
//!
//! let fresh = evaluator.bootstrap(&ct)?;
//! assert_eq!(fresh.level(), residual.max_level());
//! # Ok(())
//! # }
//! ```
//!
#![doc = include_str!("../README.md")]

// Arithmetic core
pub mod barrett; // Barrett and Shoup reduction for word-sized primes
pub mod bignum; // 256-bit fixed point for polynomial fitting
pub mod ntt; // Negacyclic NTT
pub mod ring; // RNS polynomial rings

// Schemes
pub mod bootstrapping;
pub mod ckks;

pub mod error;
pub mod prelude;

// --- Public API exports ---

pub use bootstrapping::{BootstrappingKeys, BootstrappingParameters, BootstrappingParametersLiteral, Evaluator};
pub use error::{Error, Result, Stage};
