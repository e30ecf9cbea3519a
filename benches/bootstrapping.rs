use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ckks_bootstrapping::prelude::*;
use rustfft::num_complex::Complex64;

const LOG_N: usize = 11;

struct Setup {
    eval: Evaluator,
    ct: Ciphertext,
}

fn setup() -> Setup {
    let residual = Parameters::new(ParametersLiteral {
        log_n: LOG_N,
        log_q: vec![55, 40, 40],
        log_p: vec![61],
        log_default_scale: 40,
        log_nth_root: LOG_N + 1,
        ..Default::default()
    })
    .expect("residual parameters");
    let params = BootstrappingParameters::new(
        &residual,
        &BootstrappingParametersLiteral {
            log_n: Some(LOG_N),
            ..Default::default()
        },
    )
    .expect("bootstrapping parameters");

    let sk = KeyGenerator::with_seed(&residual, 1).gen_secret_key();
    let (keys, _) = params.gen_evaluation_keys_with_seed(&sk, 2).expect("keys");
    let eval = Evaluator::new(&params, keys).expect("evaluator");

    let slots = residual.max_slots();
    let values: Vec<Complex64> = (0..slots)
        .map(|i| Complex64::new((i as f64 / slots as f64) - 0.5, 0.25))
        .collect();
    let pt = Encoder::new(&residual)
        .encode(&values, residual.log_max_slots(), residual.default_scale(), 1)
        .expect("encode");
    let ct = Encryptor::with_seed(&residual, &sk, 3).encrypt(&pt).expect("encrypt");
    Setup { eval, ct }
}

/// Full circuit, one ciphertext with every slot in use.
fn bench_bootstrap(c: &mut Criterion) {
    let Setup { eval, ct } = setup();
    let mut group = c.benchmark_group(format!("bootstrap N=2^{LOG_N}"));
    group.sample_size(10);

    group.bench_function("bootstrap", |b| b.iter(|| eval.bootstrap(black_box(&ct)).expect("bootstrap")));

    let (scaled, _) = eval.scale_down(&ct).expect("scale down");
    group.bench_function("scale_down", |b| b.iter(|| eval.scale_down(black_box(&ct)).expect("scale down")));

    let raised = eval.mod_up(&scaled).expect("mod up");
    group.bench_function("mod_up", |b| b.iter(|| eval.mod_up(black_box(&scaled)).expect("mod up")));

    let (encoded, imag) = eval.coeffs_to_slots(&raised).expect("coeffs to slots");
    group.bench_function("coeffs_to_slots", |b| {
        b.iter(|| eval.coeffs_to_slots(black_box(&raised)).expect("coeffs to slots"))
    });

    let real = eval.eval_mod(&encoded).expect("mod1");
    group.bench_function("eval_mod", |b| b.iter(|| eval.eval_mod(black_box(&encoded)).expect("mod1")));

    let imag = imag.map(|imag| eval.eval_mod(&imag).expect("mod1"));
    group.bench_function("slots_to_coeffs", |b| {
        b.iter(|| {
            eval.slots_to_coeffs(black_box(&real), imag.as_ref())
                .expect("slots to coeffs")
        })
    });
    group.finish();
}

criterion_group!(benches, bench_bootstrap);
criterion_main!(benches);
