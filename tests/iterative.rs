//! Iterative refinement with a reserved prime above the residual chain.
//!
//! Run with: cargo test --release --test iterative -- --nocapture

mod common;

use std::sync::OnceLock;

use ckks_bootstrapping::bootstrapping::IterativeRefiner;
use ckks_bootstrapping::prelude::*;
use common::{assert_precision, complex_values, precision, residual_literal, Fixture};

const LOG_N: usize = 10;

fn fixture() -> &'static Fixture {
    static FIXTURE: OnceLock<Fixture> = OnceLock::new();
    FIXTURE.get_or_init(|| {
        Fixture::new(
            residual_literal(LOG_N, LOG_N + 1, RingKind::Standard),
            BootstrappingParametersLiteral {
                log_n: Some(LOG_N),
                iterations_parameters: Some(IterationsParameters {
                    bootstrapping_precision: vec![16.0],
                    reserved_prime_bit_size: 30,
                }),
                ..Default::default()
            },
        )
    })
}

#[test]
fn test_reserved_prime_sits_above_the_residual_chain() {
    let f = fixture();
    let eval = f.evaluator();
    let btp = &f.params.bootstrapping;
    let reserved = btp.q()[f.residual().max_level() + 1];
    // Closest NTT-friendly prime to 2^30, on either side.
    assert_eq!((reserved as f64).log2().round(), 30.0);
    assert_eq!(f.params.slots_to_coeffs.level_q, f.residual().max_level() + 1 + f.params.depth_slots_to_coeffs());
    assert_eq!(eval.depth(), f.params.depth() + 1);
}

#[test]
fn test_precision_does_not_decrease_across_iterations() {
    let f = fixture();
    let eval = f.evaluator();
    let log_slots = LOG_N - 1;
    let values = complex_values(1 << log_slots, 1);
    let ct = f.encrypt(&values, log_slots, 1, 1);

    let schedule = eval.parameters().iterations.clone().unwrap();
    let mut history = Vec::new();
    let out = IterativeRefiner::new(&eval, &schedule)
        .refine_with(&ct, |i, step| {
            let stats = precision(&values, &f.decrypt_bootstrapping(step));
            history.push((i, stats.mean_precision.l2));
        })
        .unwrap();

    assert_eq!(history.len(), schedule.bootstrapping_precision.len() + 1);
    for pair in history.windows(2) {
        let ((i, before), (j, after)) = (pair[0], pair[1]);
        assert_eq!(j, i + 1);
        assert!(after >= before, "iteration {j}: {after} bits after {before}");
    }
    assert_eq!(out.level(), eval.output_level());
    assert_precision(&values, &f.decrypt(&out), 20.0);
}

#[test]
fn test_bootstrap_runs_the_schedule() {
    let f = fixture();
    let eval = f.evaluator();
    let values = complex_values(8, 2);
    let ct = f.encrypt(&values, 3, 1, 2);

    let fresh = eval.bootstrap(&ct).unwrap();
    assert_eq!(fresh.level(), eval.output_level());
    assert_precision(&values, &f.decrypt(&fresh), 20.0);
}

#[test]
fn test_schedule_without_reserved_prime_fails_when_scales_match() {
    let f = fixture();
    let mut params = f.params.clone();
    if let Some(it) = params.iterations.as_mut() {
        it.reserved_prime_bit_size = 0;
    }
    let eval = Evaluator::new(&params, f.evaluator().keys().clone()).unwrap();
    let values = complex_values(8, 3);
    let ct = f.encrypt(&values, 3, 1, 3);

    let err = eval.bootstrap(&ct).unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Refinement));
}
