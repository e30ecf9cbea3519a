//! End-to-end bootstrapping in a standard ring of degree 2^10, with the
//! residual ring equal to the bootstrapping ring.
//!
//! Run with: cargo test --release --test bootstrapping -- --nocapture

mod common;

use std::sync::{Arc, OnceLock};

use ckks_bootstrapping::ckks::EvaluationKeySet;
use ckks_bootstrapping::prelude::*;
use common::{assert_precision, complex_values, residual_literal, Fixture};
use rustfft::num_complex::Complex64;

const LOG_N: usize = 10;

fn fixture() -> &'static Fixture {
    static FIXTURE: OnceLock<Fixture> = OnceLock::new();
    FIXTURE.get_or_init(|| {
        Fixture::new(
            residual_literal(LOG_N, LOG_N + 1, RingKind::Standard),
            BootstrappingParametersLiteral {
                log_n: Some(LOG_N),
                ..Default::default()
            },
        )
    })
}

#[test]
fn test_levels_and_depth() {
    let f = fixture();
    let eval = f.evaluator();
    assert_eq!(eval.minimum_input_level(), 1);
    assert_eq!(eval.output_level(), f.residual().max_level());
    assert_eq!(eval.depth(), f.params.depth());
    assert_eq!(
        f.params.bootstrapping.max_level(),
        f.residual().max_level() + f.params.depth()
    );
    assert!(eval.keys().binary_size() > 0);
    assert!(format!("{eval:?}").starts_with("Evaluator"));
}

#[test]
fn test_bootstrap_precision_over_slot_counts() {
    let f = fixture();
    let eval = f.evaluator();
    for log_slots in [0, LOG_N - 2, LOG_N - 1] {
        let values = complex_values(1 << log_slots, log_slots as u64);
        let ct = f.encrypt(&values, log_slots, eval.minimum_input_level(), 1);

        let fresh = eval.bootstrap(&ct).unwrap();
        assert_eq!(fresh.level(), eval.output_level());
        assert_eq!(fresh.log_slots, log_slots);
        assert_eq!(fresh.scale, f.residual().default_scale());

        println!("log_slots = {log_slots}");
        assert_precision(&values, &f.decrypt(&fresh), 20.0);
    }
}

#[test]
fn test_single_slot_keeps_the_imaginary_part() {
    let f = fixture();
    let eval = f.evaluator();
    let values = vec![Complex64::new(-0.95, 0.96)];
    let ct = f.encrypt(&values, 0, eval.minimum_input_level(), 5);

    let fresh = eval.bootstrap(&ct).unwrap();
    assert_eq!(fresh.log_slots, 0);
    let have = f.decrypt(&fresh);
    assert!((have[0].im - values[0].im).abs() < 1e-4, "{:?}", have[0]);
    assert_precision(&values, &have, 20.0);
}

#[test]
fn test_sparse_messages_are_spread_before_scale_down() {
    let f = fixture();
    let eval = f.evaluator();
    let log_max = f.params.log_max_slots();
    assert_eq!(eval.sparse_spread(log_max), 1.0);
    assert_eq!(eval.sparse_spread(log_max - 2), 2.0);
    assert_eq!(eval.sparse_spread(0), (log_max as f64 / 2.0).exp2());

    for log_slots in [1, 2, 3] {
        let values = complex_values(1 << log_slots, 20 + log_slots as u64);
        let ct = f.encrypt(&values, log_slots, eval.minimum_input_level(), 20);
        let fresh = eval.bootstrap(&ct).unwrap();
        assert_eq!(fresh.scale, f.residual().default_scale());
        println!("log_slots = {log_slots}");
        assert_precision(&values, &f.decrypt(&fresh), 20.0);
    }
}

#[test]
fn test_bootstrap_many_packs_sparse_ciphertexts() {
    let f = fixture();
    let eval = f.evaluator();
    let log_slots = 3;
    let messages: Vec<_> = (0..3).map(|i| complex_values(1 << log_slots, 100 + i)).collect();
    let cts: Vec<_> = messages
        .iter()
        .enumerate()
        .map(|(i, m)| f.encrypt(m, log_slots, 2, 10 + i as u64))
        .collect();

    let fresh = eval.bootstrap_many(cts).unwrap();
    assert_eq!(fresh.len(), messages.len());
    for (ct, want) in fresh.iter().zip(&messages) {
        assert_eq!(ct.level(), eval.output_level());
        assert_eq!(ct.log_slots, log_slots);
        assert_precision(want, &f.decrypt(ct), 20.0);
    }
}

#[test]
fn test_input_below_minimum_level_is_rejected() {
    let f = fixture();
    let eval = f.evaluator();
    let values = complex_values(8, 3);
    let ct = f.encrypt(&values, 3, 0, 3);

    let err = eval.bootstrap(&ct).unwrap_err();
    assert!(matches!(err, Error::RuntimeLevel { .. }), "{err}");
    assert_eq!(err.stage(), Some(Stage::ScaleDown));
}

#[test]
fn test_shallow_copies_are_deterministic_across_threads() {
    let f = fixture();
    let eval = f.evaluator();
    let log_slots = LOG_N - 1;
    let cts: Vec<Ciphertext> = (0..3)
        .map(|i| f.encrypt(&complex_values(1 << log_slots, 50 + i), log_slots, 1, 50 + i))
        .collect();
    let sequential: Vec<Ciphertext> = cts.iter().map(|ct| eval.bootstrap(ct).unwrap()).collect();

    let concurrent: Vec<Ciphertext> = std::thread::scope(|scope| {
        let handles: Vec<_> = cts
            .iter()
            .map(|ct| {
                let copy = eval.shallow_copy();
                scope.spawn(move || copy.bootstrap(ct).unwrap())
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert_eq!(concurrent, sequential);
}

#[test]
fn test_mismatched_chain_is_rejected() {
    let f = fixture();
    let keys = f.evaluator().keys().clone();

    let mut params = f.params.clone();
    params.mod1.level_q += 1;
    let err = Evaluator::new(&params, keys.clone()).unwrap_err();
    assert!(matches!(err, Error::Configuration(_)), "{err}");

    let mut params = f.params.clone();
    params.circuit_order = CircuitOrder::DecodeThenModUp;
    params.mod1.level_q -= 1;
    let err = Evaluator::new(&params, keys.clone()).unwrap_err();
    assert!(matches!(err, Error::Configuration(_)), "{err}");

    // Custom chains are taken as given.
    let mut params = f.params.clone();
    params.circuit_order = CircuitOrder::Custom;
    assert!(Evaluator::new(&params, keys).is_ok());
}

#[test]
fn test_missing_keys_are_reported() {
    let f = fixture();
    let mut keys = f.evaluator().keys().clone();
    keys.evaluation_keys = Arc::new(EvaluationKeySet::new(None, Vec::new()));

    let err = Evaluator::new(&f.params, keys).unwrap_err();
    assert!(matches!(err, Error::KeyMismatch(_)), "{err}");
}

#[test]
fn test_decode_first_order_needs_bootstrapping_ring_levels() {
    let f = fixture();
    let mut params = f.params.clone();
    params.circuit_order = CircuitOrder::DecodeThenModUp;
    let eval = Evaluator::new(&params, f.evaluator().keys().clone()).unwrap();

    let values = complex_values(8, 4);
    let ct = f.encrypt(&values, 3, 1, 4);
    let err = eval.bootstrap(&ct).unwrap_err();
    assert_eq!(err.stage(), Some(Stage::SlotsToCoeffs));
}
