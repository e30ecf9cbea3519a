//! Leveled CKKS over RNS polynomial rings
//!
//! The substrate the bootstrapping circuit runs on: parameters, the
//! canonical-embedding encoder, secret-key encryption, key generation with a
//! single special prime, and an evaluator with hoisted rotations, diagonal
//! linear transformations and Chebyshev polynomial evaluation.

mod ciphertext;
mod encoder;
mod encryptor;
mod evaluator;
mod keys;
pub(crate) mod keyswitch;
mod linear_transform;
mod params;
mod polynomial;
mod precision;

pub use ciphertext::Ciphertext;
pub use encoder::{Encoder, Plaintext};
pub use encryptor::{Decryptor, Encryptor};
pub use evaluator::Evaluator;
pub use keys::{EvaluationKey, EvaluationKeySet, GaloisKey, KeyGenerator, RelinearizationKey, SecretKey};
pub use linear_transform::{bsgs_index, find_best_bsgs_ratio, required_rotations, Diagonals, LinearTransformation};
pub use params::{Parameters, ParametersLiteral, DEFAULT_SIGMA, GALOIS_GEN};
pub use polynomial::{Basis, Polynomial, PowerBasis};
pub use precision::{PrecisionStats, Stats};
