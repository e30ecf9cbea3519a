//! Derivation, validation and serialization of bootstrapping parameters.

mod common;

use ckks_bootstrapping::prelude::*;
use common::residual_literal;

fn residual(log_n: usize, log_nth_root: usize, kind: RingKind) -> Parameters {
    Parameters::new(residual_literal(log_n, log_nth_root, kind)).unwrap()
}

fn literal(log_n: usize) -> BootstrappingParametersLiteral {
    BootstrappingParametersLiteral {
        log_n: Some(log_n),
        ..Default::default()
    }
}

#[test]
fn test_chain_extends_the_residual_chain() {
    let residual = residual(10, 11, RingKind::Standard);
    let params = BootstrappingParameters::new(&residual, &literal(10)).unwrap();
    let btp = &params.bootstrapping;

    assert_eq!(&btp.q()[..residual.q().len()], residual.q());
    assert_eq!(btp.max_level(), residual.max_level() + params.depth());
    assert_eq!(btp.log_default_scale(), residual.log_default_scale());

    // SlotsToCoeffs ends on the residual top level, the stages follow each other.
    assert_eq!(params.slots_to_coeffs.level_q - params.depth_slots_to_coeffs(), residual.max_level());
    assert_eq!(params.mod1.level_q - params.depth_eval_mod(), params.slots_to_coeffs.level_q);
    assert_eq!(params.coeffs_to_slots.level_q - params.depth_coeffs_to_slots(), params.mod1.level_q);
    assert_eq!(params.coeffs_to_slots.level_q, btp.max_level());
    assert_eq!(params.log_max_slots(), 9);
}

#[test]
fn test_json_round_trip() {
    let residual = residual(10, 11, RingKind::Standard);
    let lit = BootstrappingParametersLiteral {
        log_n: Some(10),
        mod1_type: Some(Mod1Type::SinContinuous),
        k: Some(4),
        mod1_degree: Some(63),
        iterations_parameters: Some(IterationsParameters {
            bootstrapping_precision: vec![20.0, 10.0],
            reserved_prime_bit_size: 28,
        }),
        circuit_order: Some(CircuitOrder::ModUpThenEncode),
        ..Default::default()
    };
    let params = BootstrappingParameters::new(&residual, &lit).unwrap();

    let json = params.to_json().unwrap();
    let back = BootstrappingParameters::from_json(&json).unwrap();
    assert_eq!(params, back);
    assert_eq!(back.mod1.double_angle, 0);

    let lit_json = serde_json::to_string(&lit).unwrap();
    let lit_back: BootstrappingParametersLiteral = serde_json::from_str(&lit_json).unwrap();
    assert_eq!(lit, lit_back);

    assert!(matches!(
        BootstrappingParameters::from_json("{\"residual\": 3}"),
        Err(Error::Serialization(_))
    ));
}

#[test]
fn test_bit_consumption_counts_the_reserved_prime() {
    let plain = literal(10);
    let reserved = BootstrappingParametersLiteral {
        iterations_parameters: Some(IterationsParameters {
            bootstrapping_precision: vec![20.0],
            reserved_prime_bit_size: 30,
        }),
        ..literal(10)
    };
    assert_eq!(reserved.bit_consumption(9).unwrap(), plain.bit_consumption(9).unwrap() + 30);
}

#[test]
fn test_galois_elements_cover_trace_and_conjugation() {
    let residual = residual(10, 11, RingKind::Standard);
    let params = BootstrappingParameters::new(&residual, &literal(10)).unwrap();
    let btp = &params.bootstrapping;
    let elements = params.galois_elements(btp);

    assert!(elements.windows(2).all(|w| w[0] < w[1]));
    assert!(elements.contains(&btp.galois_element_for_conjugation()));
    for i in 0..btp.log_n() - 1 {
        assert!(elements.contains(&btp.galois_element(1 << i)), "rotation by 2^{i}");
    }
}

#[test]
fn test_conjugate_invariant_needs_twice_the_degree() {
    let residual = residual(9, 11, RingKind::ConjugateInvariant);
    assert!(BootstrappingParameters::new(&residual, &literal(10)).is_ok());
    let err = BootstrappingParameters::new(&residual, &literal(11)).unwrap_err();
    assert!(matches!(err, Error::Configuration(_)), "{err}");
}

#[test]
fn test_bootstrapping_ring_smaller_than_residual_is_rejected() {
    let residual = residual(10, 11, RingKind::Standard);
    let err = BootstrappingParameters::new(&residual, &literal(9)).unwrap_err();
    assert!(matches!(err, Error::Configuration(_)), "{err}");
}

#[test]
fn test_oversized_stage_prime_is_rejected() {
    let residual = residual(10, 11, RingKind::Standard);
    let lit = BootstrappingParametersLiteral {
        eval_mod_log_scale: Some(62),
        ..literal(10)
    };
    let err = BootstrappingParameters::new(&residual, &lit).unwrap_err();
    assert!(matches!(err, Error::Configuration(_)), "{err}");
}
