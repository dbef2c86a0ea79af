use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dict_core::types::UnigramProperty;
use dict_core::word_store::WordStore;

fn sample_words(n: usize) -> Vec<Vec<u32>> {
    (0..n)
        .map(|i| format!("word{i}").chars().map(|c| c as u32).collect())
        .collect()
}

fn bench_insert(c: &mut Criterion) {
    let words = sample_words(5_000);
    c.bench_function("word_store_insert_5k", |b| {
        b.iter(|| {
            let mut store = WordStore::new();
            for (i, word) in words.iter().enumerate() {
                store
                    .add_unigram_word(word, UnigramProperty::new((i % 256) as u8), 1)
                    .unwrap();
            }
            store
        });
    });
}

fn bench_lookup_hit(c: &mut Criterion) {
    let words = sample_words(5_000);
    let mut store = WordStore::new();
    for (i, word) in words.iter().enumerate() {
        store
            .add_unigram_word(word, UnigramProperty::new((i % 256) as u8), 1)
            .unwrap();
    }
    let probe = &words[2_500];
    c.bench_function("word_store_lookup_hit", |b| {
        b.iter(|| black_box(store.terminal_position_of_word(black_box(probe), false)));
    });
}

fn bench_lookup_miss(c: &mut Criterion) {
    let words = sample_words(5_000);
    let mut store = WordStore::new();
    for (i, word) in words.iter().enumerate() {
        store
            .add_unigram_word(word, UnigramProperty::new((i % 256) as u8), 1)
            .unwrap();
    }
    let probe: Vec<u32> = "not-present".chars().map(|c| c as u32).collect();
    c.bench_function("word_store_lookup_miss", |b| {
        b.iter(|| black_box(store.terminal_position_of_word(black_box(&probe), false)));
    });
}

criterion_group!(benches, bench_insert, bench_lookup_hit, bench_lookup_miss);
criterion_main!(benches);
