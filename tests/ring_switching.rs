//! Bootstrapping a residual ring of degree 2^9 in a ring of degree 2^10.
//!
//! Run with: cargo test --release --test ring_switching -- --nocapture

mod common;

use std::sync::OnceLock;

use ckks_bootstrapping::bootstrapping::RingSwitcher;
use ckks_bootstrapping::prelude::*;
use common::{assert_precision, complex_values, residual_literal, Fixture};

const LOG_N1: usize = 9;
const LOG_N2: usize = 10;

fn fixture() -> &'static Fixture {
    static FIXTURE: OnceLock<Fixture> = OnceLock::new();
    FIXTURE.get_or_init(|| {
        Fixture::new(
            residual_literal(LOG_N1, LOG_N2 + 1, RingKind::Standard),
            BootstrappingParametersLiteral {
                log_n: Some(LOG_N2),
                ..Default::default()
            },
        )
    })
}

fn switcher(f: &Fixture, eval: &Evaluator) -> RingSwitcher {
    let keys = eval.keys();
    RingSwitcher::new(
        f.residual(),
        &f.params.bootstrapping,
        keys.ring_up.clone(),
        keys.ring_down.clone(),
    )
    .unwrap()
}

#[test]
fn test_switch_up_then_down_keeps_the_message() {
    let f = fixture();
    let eval = f.evaluator();
    let switcher = switcher(f, &eval);
    let log_slots = 4;
    let values = complex_values(1 << log_slots, 1);
    let ct = f.encrypt(&values, log_slots, f.residual().max_level(), 1);

    let up = switcher.switch_up(&eval.ckks, &ct).unwrap();
    assert_eq!(up.n(), 1 << LOG_N2);
    assert_eq!(up.level(), ct.level());
    assert_precision(&values, &f.decrypt_bootstrapping(&up), 20.0);

    let down = switcher.switch_down(&eval.ckks, &up).unwrap();
    assert_eq!(down.n(), 1 << LOG_N1);
    assert_eq!(down.scale, ct.scale);
    assert_precision(&values, &f.decrypt(&down), 20.0);
}

#[test]
fn test_switch_down_rejects_levels_above_the_residual_chain() {
    let f = fixture();
    let eval = f.evaluator();
    let switcher = switcher(f, &eval);
    let ct = Ciphertext::zero(
        1 << LOG_N2,
        f.residual().max_level() + 1,
        f.residual().default_scale(),
        3,
        RingKind::Standard,
    );

    let err = switcher.switch_down(&eval.ckks, &ct).unwrap_err();
    assert!(matches!(err, Error::RuntimeLevel { .. }), "{err}");
    assert_eq!(err.stage(), Some(Stage::RingSwitch));
}

#[test]
fn test_residual_ring_larger_than_bootstrapping_ring_is_rejected() {
    let f = fixture();
    let err = RingSwitcher::new(&f.params.bootstrapping, f.residual(), None, None).unwrap_err();
    assert!(matches!(err, Error::Configuration(_)), "{err}");
}

#[test]
fn test_bootstrap_full_residual_slots() {
    let f = fixture();
    let eval = f.evaluator();
    let log_slots = f.residual().log_max_slots();
    let values = complex_values(1 << log_slots, 2);
    let ct = f.encrypt(&values, log_slots, 1, 2);

    let fresh = eval.bootstrap(&ct).unwrap();
    assert_eq!(fresh.n(), 1 << LOG_N1);
    assert_eq!(fresh.level(), eval.output_level());
    assert_precision(&values, &f.decrypt(&fresh), 20.0);
}

#[test]
fn test_bootstrap_many_packs_before_switching_up() {
    let f = fixture();
    let eval = f.evaluator();
    let log_slots = 4;
    let messages: Vec<_> = (0..5).map(|i| complex_values(1 << log_slots, 20 + i)).collect();
    let cts: Vec<_> = messages
        .iter()
        .enumerate()
        .map(|(i, m)| f.encrypt(m, log_slots, 1, 30 + i as u64))
        .collect();

    let fresh = eval.bootstrap_many(cts).unwrap();
    assert_eq!(fresh.len(), messages.len());
    for (ct, want) in fresh.iter().zip(&messages) {
        assert_eq!(ct.n(), 1 << LOG_N1);
        assert_eq!(ct.log_slots, log_slots);
        assert_eq!(ct.level(), eval.output_level());
        assert_precision(want, &f.decrypt(ct), 20.0);
    }
}
