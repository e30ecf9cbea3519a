//! Bootstrapping parameters
//!
//! A [`BootstrappingParametersLiteral`] lists the knobs of the circuit; every
//! field is optional and falls back to the documented default. Combined with
//! the residual parameters (the ones the user computes with) it yields
//! [`BootstrappingParameters`]: the parameters of the bootstrapping ring, whose
//! modulus chain is the residual chain extended by the primes of
//! SlotsToCoeffs, Mod1 and CoeffsToSlots, plus the literals of each stage.
//!
//! The stage start levels chain exactly:
//!
//! ```text
//! SlotsToCoeffs.level_q = residual.max_level + |S2C| (+1 reserved prime)
//! Mod1.level_q          = SlotsToCoeffs.level_q + Mod1.depth
//! CoeffsToSlots.level_q = Mod1.level_q + |C2S|
//! ```

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::dft::{DftFormat, DftMatrixLiteral, DftType};
use super::mod1::{bit_len, Mod1ParametersLiteral, Mod1Type};
use crate::ckks::{Parameters, ParametersLiteral, DEFAULT_SIGMA};
use crate::error::{Error, Result};
use crate::ring::{primes, RingKind};

pub const DEFAULT_LOG_N: usize = 16;
pub const DEFAULT_LOG_P: usize = 61;
pub const DEFAULT_HAMMING_WEIGHT: usize = 192;
pub const DEFAULT_C2S_DEPTH: usize = 4;
pub const DEFAULT_C2S_LOG_SCALE: usize = 56;
pub const DEFAULT_S2C_DEPTH: usize = 3;
pub const DEFAULT_S2C_LOG_SCALE: usize = 39;
pub const DEFAULT_EVAL_MOD_LOG_SCALE: usize = 60;
pub const DEFAULT_EPHEMERAL_SECRET_WEIGHT: usize = 32;
pub const DEFAULT_MOD1_TYPE: Mod1Type = Mod1Type::CosDiscrete;
pub const DEFAULT_LOG_MESSAGE_RATIO: usize = 8;
pub const DEFAULT_K: usize = 16;
pub const DEFAULT_MOD1_DEGREE: usize = 30;
pub const DEFAULT_DOUBLE_ANGLE: usize = 3;
pub const DEFAULT_MOD1_INV_DEGREE: usize = 0;
pub const DEFAULT_LOG_BSGS_RATIO: i32 = 1;

/// Largest prime size the RNS arithmetic supports.
const MAX_PRIME_BITS: usize = 61;

/// Order of the first bootstrapping stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CircuitOrder {
    /// ModUp, CoeffsToSlots, Mod1, SlotsToCoeffs
    #[default]
    ModUpThenEncode,
    /// SlotsToCoeffs on the input, then ModUp, CoeffsToSlots, Mod1
    DecodeThenModUp,
    /// No stage chaining is enforced
    Custom,
}

/// Schedule of the iterated bootstrapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationsParameters {
    /// Log2 precision gained by each bootstrapping
    pub bootstrapping_precision: Vec<f64>,
    /// Bit size of the prime reserved for the last correction; 0 for none
    #[serde(default)]
    pub reserved_prime_bit_size: usize,
}

/// Optional knobs of the bootstrapping circuit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrappingParametersLiteral {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_n: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_p: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hamming_weight: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sigma: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_slots: Option<usize>,
    /// One inner vector per consumed level; its entries are the log scales of
    /// the matrices merged on that level
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coeffs_to_slots_factorization: Option<Vec<Vec<usize>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slots_to_coeffs_factorization: Option<Vec<Vec<usize>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eval_mod_log_scale: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ephemeral_secret_weight: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iterations_parameters: Option<IterationsParameters>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mod1_type: Option<Mod1Type>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_message_ratio: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub k: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mod1_degree: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub double_angle: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mod1_inv_degree: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_bsgs_ratio: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circuit_order: Option<CircuitOrder>,
}

impl BootstrappingParametersLiteral {
    pub fn log_n(&self) -> usize {
        self.log_n.unwrap_or(DEFAULT_LOG_N)
    }

    pub fn log_p(&self) -> Result<usize> {
        match self.log_p {
            None => Ok(DEFAULT_LOG_P),
            Some(p) if p == 0 || p > MAX_PRIME_BITS => {
                Err(Error::config(format!("log_p = {p} outside [1, {MAX_PRIME_BITS}]")))
            }
            Some(p) => Ok(p),
        }
    }

    pub fn hamming_weight(&self) -> usize {
        self.hamming_weight.unwrap_or(DEFAULT_HAMMING_WEIGHT)
    }

    pub fn sigma(&self) -> f64 {
        self.sigma.unwrap_or(DEFAULT_SIGMA)
    }

    /// Log2 of the slot count; defaults to the maximum, log_n − 1.
    pub fn log_slots(&self) -> Result<usize> {
        let log_n = self.log_n();
        match self.log_slots {
            None => Ok(log_n - 1),
            Some(s) if s < 1 || s > log_n - 1 => Err(Error::config(format!(
                "log_slots = {s} outside [1, {}]",
                log_n - 1
            ))),
            Some(s) => Ok(s),
        }
    }

    fn factorization(
        given: &Option<Vec<Vec<usize>>>,
        log_slots: usize,
        default_depth: usize,
        default_scale: usize,
        name: &str,
    ) -> Result<Vec<Vec<usize>>> {
        let Some(f) = given else {
            return Ok(vec![vec![default_scale]; default_depth.min(log_slots.max(1))]);
        };
        if f.is_empty() || f.iter().any(|level| level.is_empty()) {
            return Err(Error::config(format!("{name} factorization has an empty level")));
        }
        let depth: usize = f.iter().map(Vec::len).sum();
        if depth > log_slots {
            return Err(Error::config(format!(
                "{name} factorization of depth {depth} exceeds log_slots = {log_slots}"
            )));
        }
        Ok(f.clone())
    }

    pub fn coeffs_to_slots_factorization(&self, log_slots: usize) -> Result<Vec<Vec<usize>>> {
        Self::factorization(
            &self.coeffs_to_slots_factorization,
            log_slots,
            DEFAULT_C2S_DEPTH,
            DEFAULT_C2S_LOG_SCALE,
            "CoeffsToSlots",
        )
    }

    pub fn slots_to_coeffs_factorization(&self, log_slots: usize) -> Result<Vec<Vec<usize>>> {
        Self::factorization(
            &self.slots_to_coeffs_factorization,
            log_slots,
            DEFAULT_S2C_DEPTH,
            DEFAULT_S2C_LOG_SCALE,
            "SlotsToCoeffs",
        )
    }

    pub fn eval_mod_log_scale(&self) -> Result<usize> {
        match self.eval_mod_log_scale {
            None => Ok(DEFAULT_EVAL_MOD_LOG_SCALE),
            Some(s) if s > 60 => Err(Error::config(format!("eval_mod_log_scale = {s} exceeds 60"))),
            Some(s) => Ok(s),
        }
    }

    pub fn ephemeral_secret_weight(&self) -> usize {
        self.ephemeral_secret_weight.unwrap_or(DEFAULT_EPHEMERAL_SECRET_WEIGHT)
    }

    pub fn iterations_parameters(&self) -> Result<Option<IterationsParameters>> {
        let Some(it) = &self.iterations_parameters else {
            return Ok(None);
        };
        if it.bootstrapping_precision.is_empty() {
            return Err(Error::config("bootstrapping_precision needs at least one entry"));
        }
        if it.bootstrapping_precision.iter().any(|&p| p == 0.0) {
            return Err(Error::config("bootstrapping_precision entries cannot be 0"));
        }
        if it.reserved_prime_bit_size > MAX_PRIME_BITS {
            return Err(Error::config(format!(
                "reserved_prime_bit_size = {} exceeds {MAX_PRIME_BITS}",
                it.reserved_prime_bit_size
            )));
        }
        Ok(Some(it.clone()))
    }

    pub fn mod1_type(&self) -> Mod1Type {
        self.mod1_type.unwrap_or(DEFAULT_MOD1_TYPE)
    }

    pub fn log_message_ratio(&self) -> usize {
        self.log_message_ratio.unwrap_or(DEFAULT_LOG_MESSAGE_RATIO)
    }

    pub fn k(&self) -> usize {
        self.k.unwrap_or(DEFAULT_K)
    }

    pub fn mod1_degree(&self) -> usize {
        self.mod1_degree.unwrap_or(DEFAULT_MOD1_DEGREE)
    }

    /// Double-angle steps; the default is 0 for the sine approximation.
    pub fn double_angle(&self) -> usize {
        match (self.double_angle, self.mod1_type()) {
            (Some(r), _) => r,
            (None, Mod1Type::SinContinuous) => 0,
            (None, _) => DEFAULT_DOUBLE_ANGLE,
        }
    }

    pub fn mod1_inv_degree(&self) -> usize {
        self.mod1_inv_degree.unwrap_or(DEFAULT_MOD1_INV_DEGREE)
    }

    pub fn log_bsgs_ratio(&self) -> i32 {
        self.log_bsgs_ratio.unwrap_or(DEFAULT_LOG_BSGS_RATIO)
    }

    pub fn circuit_order(&self) -> CircuitOrder {
        self.circuit_order.unwrap_or_default()
    }

    /// Bits of modulus the circuit consumes on top of the residual chain.
    pub fn bit_consumption(&self, log_slots: usize) -> Result<usize> {
        let c2s: usize = self.coeffs_to_slots_factorization(log_slots)?.iter().flatten().sum();
        let s2c: usize = self.slots_to_coeffs_factorization(log_slots)?.iter().flatten().sum();
        let reserved = self
            .iterations_parameters()?
            .map_or(0, |it| it.reserved_prime_bit_size);
        let mod1_levels = bit_len(self.mod1_degree()) + self.double_angle() + bit_len(self.mod1_inv_degree());
        Ok(c2s + s2c + 1 + self.eval_mod_log_scale()? * mod1_levels + reserved)
    }
}

/// Complete, validated bootstrapping parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BootstrappingParameters {
    /// Parameters of the ciphertexts given to and returned by the circuit
    pub residual: Parameters,
    /// Parameters of the ring the circuit runs in
    pub bootstrapping: Parameters,
    pub slots_to_coeffs: DftMatrixLiteral,
    pub mod1: Mod1ParametersLiteral,
    pub coeffs_to_slots: DftMatrixLiteral,
    pub iterations: Option<IterationsParameters>,
    /// Hamming weight of the sparse secret used during ModUp; 0 disables it
    pub ephemeral_secret_weight: usize,
    pub circuit_order: CircuitOrder,
}

impl BootstrappingParameters {
    /// Derive the bootstrapping parameters for `residual`.
    ///
    /// # Errors
    /// A configuration error if a literal field is out of range, the ring
    /// degrees are incompatible, a residual prime is not NTT-friendly in the
    /// bootstrapping ring, or a stage needs a prime larger than 61 bits.
    pub fn new(residual: &Parameters, lit: &BootstrappingParametersLiteral) -> Result<Self> {
        let log_n = lit.log_n();
        let nth_root = match residual.ring_kind() {
            RingKind::ConjugateInvariant => {
                if log_n != residual.log_n() + 1 {
                    return Err(Error::config(format!(
                        "a conjugate-invariant residual ring of degree 2^{} needs log_n = {}, got {log_n}",
                        residual.log_n(),
                        residual.log_n() + 1
                    )));
                }
                ((residual.n() as u64) << 2).max(2u64 << log_n)
            }
            RingKind::Standard => {
                if log_n < residual.log_n() {
                    return Err(Error::config(format!(
                        "bootstrapping ring 2^{log_n} smaller than the residual ring 2^{}",
                        residual.log_n()
                    )));
                }
                ((residual.n() as u64) << 1).max(2u64 << log_n)
            }
        };
        for (i, &q) in residual.q().iter().enumerate() {
            if q & (nth_root - 1) != 1 {
                return Err(Error::config(format!("Q[{i}] = {q} is not 1 mod NthRoot = {nth_root}")));
            }
        }

        let log_slots = lit.log_slots()?;
        let c2s = lit.coeffs_to_slots_factorization(log_slots)?;
        let s2c = lit.slots_to_coeffs_factorization(log_slots)?;
        let iterations = lit.iterations_parameters()?;
        let reserved_bits = iterations.as_ref().map_or(0, |it| it.reserved_prime_bit_size);
        let has_reserved = usize::from(reserved_bits > 0);
        let log_bsgs_ratio = lit.log_bsgs_ratio();

        let slots_to_coeffs = DftMatrixLiteral {
            dft_type: DftType::Decode,
            log_slots,
            level_q: residual.max_level() + s2c.len() + has_reserved,
            levels: s2c.iter().map(Vec::len).collect(),
            format: DftFormat::RepackImagAsReal,
            scaling: None,
            bit_reversed: false,
            log_bsgs_ratio,
        };

        let eval_mod_log_scale = lit.eval_mod_log_scale()?;
        let mut mod1 = Mod1ParametersLiteral {
            level_q: 0,
            log_scale: eval_mod_log_scale,
            mod1_type: lit.mod1_type(),
            scaling: 0.0,
            log_message_ratio: lit.log_message_ratio(),
            k: lit.k(),
            mod1_degree: lit.mod1_degree(),
            double_angle: lit.double_angle(),
            mod1_inv_degree: lit.mod1_inv_degree(),
        };
        mod1.level_q = slots_to_coeffs.level_q + mod1.depth();

        let coeffs_to_slots = DftMatrixLiteral {
            dft_type: DftType::Encode,
            log_slots,
            level_q: mod1.level_q + c2s.len(),
            levels: c2s.iter().map(Vec::len).collect(),
            format: DftFormat::RepackImagAsReal,
            scaling: None,
            bit_reversed: false,
            log_bsgs_ratio,
        };

        let mut log_q = Vec::new();
        if has_reserved == 1 {
            log_q.push(reserved_bits);
        }
        for group in &s2c {
            let mut bits: usize = group.iter().sum();
            if bits + residual.log_default_scale() < MAX_PRIME_BITS {
                bits += residual.log_default_scale();
            }
            log_q.push(bits);
        }
        log_q.extend(std::iter::repeat(eval_mod_log_scale).take(mod1.depth()));
        log_q.extend(c2s.iter().map(|group| group.iter().sum::<usize>()));

        if let Some(&bits) = log_q.iter().find(|&&b| b == 0 || b > MAX_PRIME_BITS) {
            return Err(Error::config(format!(
                "bootstrapping stage needs a {bits}-bit prime, supported sizes are [1, {MAX_PRIME_BITS}]"
            )));
        }

        let mut q = residual.q().to_vec();
        for &bits in &log_q {
            let prime = primes::generate_primes(bits, nth_root, 1, &q)?;
            q.extend(prime);
        }
        let p = primes::generate_primes(lit.log_p()?, nth_root, 1, &q)?;

        let bootstrapping = Parameters::new(ParametersLiteral {
            log_n,
            q,
            p,
            log_q: Vec::new(),
            log_p: Vec::new(),
            ring_kind: RingKind::Standard,
            hamming_weight: lit.hamming_weight(),
            sigma: lit.sigma(),
            log_default_scale: residual.log_default_scale(),
            log_nth_root: nth_root.trailing_zeros() as usize,
        })?;

        debug!(
            log_n,
            log_slots,
            levels = bootstrapping.max_level() + 1,
            depth = bootstrapping.max_level() - residual.max_level(),
            "bootstrapping parameters ready"
        );

        Ok(Self {
            residual: residual.clone(),
            bootstrapping,
            slots_to_coeffs,
            mod1,
            coeffs_to_slots,
            iterations,
            ephemeral_secret_weight: lit.ephemeral_secret_weight(),
            circuit_order: lit.circuit_order(),
        })
    }

    /// Log2 of the number of slots the circuit refreshes.
    pub fn log_max_slots(&self) -> usize {
        self.slots_to_coeffs.log_slots
    }

    pub fn depth_coeffs_to_slots(&self) -> usize {
        self.coeffs_to_slots.depth(true)
    }

    pub fn depth_eval_mod(&self) -> usize {
        self.mod1.depth()
    }

    pub fn depth_slots_to_coeffs(&self) -> usize {
        self.slots_to_coeffs.depth(true)
    }

    /// Levels consumed by CoeffsToSlots, Mod1 and SlotsToCoeffs together.
    pub fn depth(&self) -> usize {
        self.depth_coeffs_to_slots() + self.depth_eval_mod() + self.depth_slots_to_coeffs()
    }

    /// Galois elements of every rotation the circuit performs in `params`.
    ///
    /// The trace elements cover every slot count, so sparser ciphertexts
    /// than `log_max_slots` can be bootstrapped with the same keys.
    pub fn galois_elements(&self, params: &Parameters) -> Vec<u64> {
        let mut keys: BTreeSet<u64> = (0..params.log_n() - 1)
            .map(|i| params.galois_element(1 << i))
            .collect();
        keys.extend(self.coeffs_to_slots.galois_elements(params));
        keys.extend(self.slots_to_coeffs.galois_elements(params));
        keys.insert(params.galois_element_for_conjugation());
        keys.into_iter().collect()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let lit = BootstrappingParametersLiteral::default();
        assert_eq!(lit.log_n(), 16);
        assert_eq!(lit.log_slots().unwrap(), 15);
        assert_eq!(lit.coeffs_to_slots_factorization(15).unwrap(), vec![vec![56]; 4]);
        assert_eq!(lit.slots_to_coeffs_factorization(15).unwrap(), vec![vec![39]; 3]);
        assert_eq!(lit.double_angle(), 3);
        assert_eq!(lit.ephemeral_secret_weight(), 32);
        assert_eq!(lit.circuit_order(), CircuitOrder::ModUpThenEncode);

        let sin = BootstrappingParametersLiteral {
            mod1_type: Some(Mod1Type::SinContinuous),
            ..Default::default()
        };
        assert_eq!(sin.double_angle(), 0);
    }

    #[test]
    fn test_small_slot_counts_shrink_default_factorization() {
        let lit = BootstrappingParametersLiteral::default();
        assert_eq!(lit.coeffs_to_slots_factorization(2).unwrap().len(), 2);
        assert_eq!(lit.slots_to_coeffs_factorization(1).unwrap().len(), 1);
    }

    #[test]
    fn test_bit_consumption() {
        let lit = BootstrappingParametersLiteral::default();
        // 4·56 + 3·39 + 1 + 60·(5 + 3 + 0)
        assert_eq!(lit.bit_consumption(15).unwrap(), 224 + 117 + 1 + 480);
    }

    #[test]
    fn test_literal_validation() {
        let too_deep = BootstrappingParametersLiteral {
            log_n: Some(6),
            coeffs_to_slots_factorization: Some(vec![vec![50, 50], vec![50, 50], vec![50, 50]]),
            ..Default::default()
        };
        assert!(matches!(
            too_deep.coeffs_to_slots_factorization(5),
            Err(Error::Configuration(_))
        ));

        let bad_slots = BootstrappingParametersLiteral {
            log_n: Some(10),
            log_slots: Some(10),
            ..Default::default()
        };
        assert!(bad_slots.log_slots().is_err());

        let zero_prec = BootstrappingParametersLiteral {
            iterations_parameters: Some(IterationsParameters {
                bootstrapping_precision: vec![25.0, 0.0],
                reserved_prime_bit_size: 0,
            }),
            ..Default::default()
        };
        assert!(zero_prec.iterations_parameters().is_err());
    }

    #[test]
    fn test_literal_json_skips_unset_fields() {
        let lit = BootstrappingParametersLiteral {
            log_n: Some(12),
            k: Some(12),
            ..Default::default()
        };
        let json = serde_json::to_string(&lit).unwrap();
        assert_eq!(json, r#"{"log_n":12,"k":12}"#);
        let back: BootstrappingParametersLiteral = serde_json::from_str(&json).unwrap();
        assert_eq!(lit, back);
    }
}
