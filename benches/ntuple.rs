use criterion::{criterion_group, criterion_main, Criterion};
use ntuple_2048::engine::{Action, State};
use ntuple_2048::game::Game;
use ntuple_2048::learning::{play_episode, AfterstateTd, LearningConfig};
use ntuple_2048::ntuple::NTupleNetwork;
use rand::{rngs::StdRng, SeedableRng};
use std::hint::black_box;

fn corpus() -> Vec<State> {
    let mut rng = StdRng::seed_from_u64(7);
    let mut states = Vec::new();
    let mut s = State::EMPTY.with_random_tile(&mut rng).with_random_tile(&mut rng);
    for i in 0..64 {
        states.push(s);
        let (next, _) = s.shift(Action::ALL[i % 4]);
        s = if next.count_empty() == 0 { State::EMPTY.with_random_tile(&mut rng) } else { next.with_random_tile(&mut rng) };
    }
    states
}

fn trained() -> NTupleNetwork {
    let mut agent = AfterstateTd::new(&LearningConfig::default());
    for seed in 0..20 {
        play_episode(&mut agent, &mut Game::seeded(seed));
    }
    agent.value().clone()
}

fn bench_evaluate(c: &mut Criterion) {
    let states = corpus();
    let v = trained();
    c.bench_function("ntuple/evaluate", |b| {
        b.iter(|| {
            let mut acc = 0f64;
            for &s in &states {
                acc += v.evaluate(s);
            }
            black_box(acc)
        })
    });
}

fn bench_train(c: &mut Criterion) {
    let states = corpus();
    let mut v = trained();
    c.bench_function("ntuple/train", |b| {
        b.iter(|| {
            for &s in &states {
                black_box(v.train(s, 100.0));
            }
        })
    });
}

fn bench_episode(c: &mut Criterion) {
    let mut agent = AfterstateTd::new(&LearningConfig::default());
    let mut seed = 0;
    c.bench_function("ntuple/afterstate_episode", |b| {
        b.iter(|| {
            seed += 1;
            black_box(play_episode(&mut agent, &mut Game::seeded(seed)).score)
        })
    });
}

criterion_group!(ntuple, bench_evaluate, bench_train, bench_episode);
criterion_main!(ntuple);
