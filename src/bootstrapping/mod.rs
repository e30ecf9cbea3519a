//! CKKS bootstrapping
//!
//! Refreshes a ciphertext of the residual parameters that has run out of
//! levels into a ciphertext at the top of the residual chain, encrypting the
//! same slot values up to the approximation error of the circuit.
//!
//! **Layout:**
//! - [`parameters`]: literals, defaults and the derived modulus chain
//! - [`keys`]: evaluation and switching key generation
//! - [`dft`]: CoeffsToSlots and SlotsToCoeffs
//! - [`mod1`]: homomorphic reduction modulo 1
//! - [`switching`]: ring-degree and domain switching
//! - [`packing`]: merging sparse ciphertexts before the circuit
//! - [`evaluator`]: the circuit itself
//! - [`iterative`]: precision refinement by repeated bootstrapping
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
//! let literal = BootstrappingParametersLiteral {
//!     log_n: Some(13),
//!     ..Default::default()
//! };
//! let params = BootstrappingParameters::new(&residual, &literal)?;
//!
//! let sk = KeyGenerator::new(&residual).gen_secret_key();
//! let (keys, _) = params.gen_evaluation_keys(&sk)?;
//! let evaluator = Evaluator::new(&params, keys)?;
//! # let ct: Ciphertext = unimplemented!();
//! let fresh = evaluator.bootstrap(&ct)?;
//! assert_eq!(fresh.level(), evaluator.output_level());
//! # Ok(())
//! # }
//! ```

pub mod dft;
pub mod evaluator;
pub mod iterative;
pub mod keys;
pub mod mod1;
pub mod packing;
pub mod parameters;
pub mod switching;

pub use dft::{DftEvaluator, DftFormat, DftMatrix, DftMatrixLiteral, DftType};
pub use evaluator::Evaluator;
pub use iterative::IterativeRefiner;
pub use keys::BootstrappingKeys;
pub use mod1::{Mod1Evaluator, Mod1Parameters, Mod1ParametersLiteral, Mod1Type};
pub use packing::Packer;
pub use parameters::{BootstrappingParameters, BootstrappingParametersLiteral, CircuitOrder, IterationsParameters};
pub use switching::{DomainSwitcher, RingSwitcher};
