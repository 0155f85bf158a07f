use criterion::{criterion_group, criterion_main, Criterion};
use review_core::tokenizer::Normalizer;

const REVIEW: &str = "Battery life is great :) but the charger broke after two weeks :-( \
    Screens are bright, speakers are loud, and the cases fit well. Would I buy these batteries again? Probably!";

fn bench_normalize(c: &mut Criterion) {
    let normalizer = Normalizer::default_config();
    let text = REVIEW.repeat(50);
    c.bench_function("normalize_review", |b| b.iter(|| normalizer.normalize(&text)));
}

criterion_group!(benches, bench_normalize);
criterion_main!(benches);
