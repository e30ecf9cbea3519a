//! Homomorphic reduction modulo 1 on its own modulus chain.
//!
//! Run with: cargo test --release --test mod1 -- --nocapture

mod common;

use std::f64::consts::PI;
use std::sync::{Arc, OnceLock};

use ckks_bootstrapping::bootstrapping::{Mod1Evaluator, Mod1Parameters, Mod1ParametersLiteral};
use ckks_bootstrapping::ckks::{EvaluationKeySet, Evaluator as CkksEvaluator};
use ckks_bootstrapping::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

const LOG_SCALE: usize = 60;
const LEVEL: usize = 10;

struct Context {
    params: Parameters,
    sk: SecretKey,
    keys: Arc<EvaluationKeySet>,
}

fn context() -> &'static Context {
    static CONTEXT: OnceLock<Context> = OnceLock::new();
    CONTEXT.get_or_init(|| {
        common::init_tracing();
        let mut log_q = vec![55];
        log_q.extend([LOG_SCALE; LEVEL]);
        let params = Parameters::new(ParametersLiteral {
            log_n: 8,
            log_q,
            log_p: vec![61],
            log_default_scale: 40,
            ..Default::default()
        })
        .unwrap();
        let mut kgen = KeyGenerator::with_seed(&params, 42);
        let sk = kgen.gen_secret_key();
        let keys = Arc::new(kgen.gen_evaluation_key_set(&sk, &[]));
        Context { params, sk, keys }
    })
}

fn literal(mod1_type: Mod1Type, k: usize, mod1_degree: usize, double_angle: usize) -> Mod1ParametersLiteral {
    Mod1ParametersLiteral {
        level_q: LEVEL,
        log_scale: LOG_SCALE,
        mod1_type,
        scaling: 0.0,
        log_message_ratio: 8,
        k,
        mod1_degree,
        double_angle,
        mod1_inv_degree: 0,
    }
}

/// Points I + ε with |I| < K − 1 and |ε| ≤ 1/256, both signs.
fn sample_points(k: usize, count: usize) -> Vec<f64> {
    let mut rng = ChaCha20Rng::seed_from_u64(k as u64);
    let bound = k as i64 - 1;
    (0..count)
        .map(|i| {
            let integer = rng.gen_range(-bound..=bound) as f64;
            let eps: f64 = rng.gen_range(-1.0..=1.0) / 256.0;
            if i % 2 == 0 {
                integer + eps
            } else {
                -(integer + eps)
            }
        })
        .collect()
}

fn scaled_sine(q_diff: f64, t: f64) -> f64 {
    q_diff * (2.0 * PI * t).sin() / (2.0 * PI)
}

fn scaled_remainder(q_diff: f64, t: f64) -> f64 {
    q_diff * (t - t.round())
}

/// Evaluate mod 1 on `t/K` and compare with `expected(q_diff, t)`.
fn check(lit: Mod1ParametersLiteral, expected: fn(f64, f64) -> f64, bits: f64) {
    let ctx = context();
    let params = &ctx.params;
    let mod1 = Arc::new(Mod1Parameters::new(params, &lit).unwrap());
    let evaluator = Mod1Evaluator::new(CkksEvaluator::new(params, Arc::clone(&ctx.keys)), Arc::clone(&mod1));

    let log_slots = params.log_max_slots();
    let points = sample_points(lit.k, 1 << log_slots);
    let inputs: Vec<f64> = points.iter().map(|t| t / lit.k as f64).collect();
    let want: Vec<f64> = points.iter().map(|&t| expected(mod1.q_diff, t)).collect();

    let encoder = Encoder::new(params);
    let pt = encoder
        .encode_real(&inputs, log_slots, mod1.scaling_factor(), lit.level_q)
        .unwrap();
    let ct = Encryptor::with_seed(params, &ctx.sk, 1).encrypt(&pt).unwrap();

    let out = evaluator.evaluate(&ct).unwrap();
    assert_eq!(out.level(), mod1.output_level());
    assert_eq!(out.level(), lit.level_q - lit.depth());

    let have = encoder.decode_real(&Decryptor::new(params, &ctx.sk).decrypt(&out));
    let stats = PrecisionStats::from_real(&want, &have);
    println!("{:?}\n{stats}", lit.mod1_type);
    assert!(
        stats.mean_precision.real >= bits,
        "{:?}: mean precision {} below {bits}",
        lit.mod1_type,
        stats.mean_precision.real
    );
}

#[test]
fn test_cos_discrete() {
    check(literal(Mod1Type::CosDiscrete, 16, 30, 3), scaled_sine, 20.0);
}

#[test]
fn test_sin_continuous() {
    check(literal(Mod1Type::SinContinuous, 4, 63, 0), scaled_sine, 20.0);
}

#[test]
fn test_cos_continuous() {
    check(literal(Mod1Type::CosContinuous, 4, 31, 2), scaled_sine, 20.0);
}

#[test]
fn test_arcsine_correction() {
    let lit = Mod1ParametersLiteral {
        mod1_inv_degree: 7,
        ..literal(Mod1Type::CosContinuous, 4, 31, 2)
    };
    check(lit, scaled_remainder, 20.0);
}

#[test]
fn test_input_below_start_level_is_rejected() {
    let ctx = context();
    let params = &ctx.params;
    let lit = literal(Mod1Type::CosDiscrete, 16, 30, 3);
    let mod1 = Arc::new(Mod1Parameters::new(params, &lit).unwrap());
    let evaluator = Mod1Evaluator::new(CkksEvaluator::new(params, Arc::clone(&ctx.keys)), mod1);

    let ct = Ciphertext::zero(params.n(), LEVEL - 1, 1.0, 0, RingKind::Standard);
    let err = evaluator.evaluate(&ct).unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Mod1));
}

#[test]
fn test_invalid_literals_are_rejected() {
    let params = &context().params;
    for lit in [
        literal(Mod1Type::SinContinuous, 4, 63, 2),
        literal(Mod1Type::CosDiscrete, 16, 20, 3),
        Mod1ParametersLiteral {
            level_q: 3,
            ..literal(Mod1Type::CosDiscrete, 16, 30, 3)
        },
    ] {
        let err = Mod1Parameters::new(params, &lit).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)), "{err}");
    }
}
