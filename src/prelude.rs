// src/prelude.rs
//! The "everything" import for bootstrapping.
//!
//! Brings the commonly used types in with one glob:
//! ```rust
//! use ckks_bootstrapping::prelude::*;
//! ```

// CKKS substrate
pub use crate::ckks::{
    Ciphertext, Decryptor, Encoder, Encryptor, KeyGenerator, Parameters, ParametersLiteral, Plaintext,
    PrecisionStats, SecretKey,
};
pub use crate::ring::RingKind;

// Bootstrapping
pub use crate::bootstrapping::{
    BootstrappingKeys, BootstrappingParameters, BootstrappingParametersLiteral, CircuitOrder, Evaluator,
    IterationsParameters, Mod1Type,
};

pub use crate::error::{Error, Result, Stage};
