//! Conjugate-invariant residual ring of degree 2^9 bootstrapped in the
//! standard ring of degree 2^10.
//!
//! Run with: cargo test --release --test conjugate_invariant -- --nocapture

mod common;

use std::sync::OnceLock;

use ckks_bootstrapping::bootstrapping::DomainSwitcher;
use ckks_bootstrapping::prelude::*;
use common::{real_values, residual_literal, Fixture};
use rustfft::num_complex::Complex64;

const LOG_N: usize = 9;

fn fixture() -> &'static Fixture {
    static FIXTURE: OnceLock<Fixture> = OnceLock::new();
    FIXTURE.get_or_init(|| {
        Fixture::new(
            residual_literal(LOG_N, LOG_N + 2, RingKind::ConjugateInvariant),
            BootstrappingParametersLiteral {
                log_n: Some(LOG_N + 1),
                ..Default::default()
            },
        )
    })
}

fn assert_real_precision(want: &[f64], have: &[f64], bits: f64) {
    let stats = PrecisionStats::from_real(want, have);
    assert!(
        stats.mean_precision.real >= bits,
        "mean precision {:?} below {bits} bits",
        stats.mean_precision
    );
}

#[test]
fn test_domain_switch_round_trip_doubles_the_scale() {
    let f = fixture();
    let eval = f.evaluator();
    let switcher = eval.domain_switcher.as_ref().unwrap();
    let log_slots = f.residual().log_max_slots();
    let values = real_values(1 << log_slots, 1);
    let ct = f.encrypt_real(&values, log_slots, f.residual().max_level(), 1);

    let complex = switcher.real_to_complex(&eval.ckks, &ct).unwrap();
    assert_eq!(complex.n(), 2 * ct.n());
    assert_eq!(complex.ring_kind, RingKind::Standard);
    assert_eq!(complex.scale, ct.scale);
    let lifted: Vec<Complex64> = values.iter().map(|&x| Complex64::new(x, 0.0)).collect();
    let stats = PrecisionStats::new(&lifted, &f.decrypt_bootstrapping(&complex));
    assert!(stats.mean_precision.real >= 20.0, "{stats}");

    let real = switcher.complex_to_real(&eval.ckks, &complex).unwrap();
    assert_eq!(real.ring_kind, RingKind::ConjugateInvariant);
    assert_eq!(real.scale, 2.0 * ct.scale);
    assert_real_precision(&values, &f.decrypt_real(&real), 20.0);
}

#[test]
fn test_complex_to_real_keeps_the_real_part() {
    let f = fixture();
    let eval = f.evaluator();
    let switcher = eval.domain_switcher.as_ref().unwrap();
    let btp = &f.params.bootstrapping;
    let log_slots = f.residual().log_max_slots();
    let values = common::complex_values(1 << log_slots, 2);
    let pt = Encoder::new(btp)
        .encode(&values, log_slots, btp.default_scale(), f.residual().max_level())
        .unwrap();
    let ct = Encryptor::with_seed(btp, &f.bootstrapping_sk, 2).encrypt(&pt).unwrap();

    let real = switcher.complex_to_real(&eval.ckks, &ct).unwrap();
    assert_eq!(real.scale, 2.0 * ct.scale);
    let want: Vec<f64> = values.iter().map(|v| v.re).collect();
    assert_real_precision(&want, &f.decrypt_real(&real), 20.0);

    let back = switcher.real_to_complex(&eval.ckks, &real).unwrap();
    assert_eq!(back.scale, real.scale);
    let have: Vec<f64> = f.decrypt_bootstrapping(&back).iter().map(|v| v.re).collect();
    assert_real_precision(&want, &have, 20.0);
}

#[test]
fn test_degree_ratio_other_than_two_is_rejected() {
    let f = fixture();
    let smaller = Parameters::new(residual_literal(LOG_N - 1, LOG_N + 2, RingKind::ConjugateInvariant)).unwrap();
    let err = DomainSwitcher::new(&f.params.bootstrapping, &smaller, None, None).unwrap_err();
    assert!(matches!(err, Error::Configuration(_)), "{err}");

    let err = DomainSwitcher::new(&f.params.bootstrapping, f.residual(), None, None).unwrap_err();
    assert!(matches!(err, Error::KeyMismatch(_)), "{err}");
}

#[test]
fn test_bootstrap_pairs_of_real_ciphertexts() {
    let f = fixture();
    let eval = f.evaluator();
    let log_slots = f.residual().log_max_slots();
    let messages: Vec<_> = (0..3).map(|i| real_values(1 << log_slots, 10 + i)).collect();
    let cts: Vec<_> = messages
        .iter()
        .enumerate()
        .map(|(i, m)| f.encrypt_real(m, log_slots, 1, 40 + i as u64))
        .collect();

    let fresh = eval.bootstrap_many(cts).unwrap();
    assert_eq!(fresh.len(), 3);
    for (ct, want) in fresh.iter().zip(&messages) {
        assert_eq!(ct.ring_kind, RingKind::ConjugateInvariant);
        assert_eq!(ct.level(), eval.output_level());
        assert_eq!(ct.scale, f.residual().default_scale());
        assert_real_precision(want, &f.decrypt_real(ct), 20.0);
    }
}

#[test]
fn test_single_real_ciphertext() {
    let f = fixture();
    let eval = f.evaluator();
    let log_slots = 4;
    let values = real_values(1 << log_slots, 7);
    let ct = f.encrypt_real(&values, log_slots, 1, 7);

    let (left, right) = eval.bootstrap_conjugate_invariant(&ct, None).unwrap();
    assert!(right.is_none());
    assert_eq!(left.log_slots, log_slots);
    assert_real_precision(&values, &f.decrypt_real(&left), 20.0);
}
