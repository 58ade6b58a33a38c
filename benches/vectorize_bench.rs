//! Criterion benchmarks for the TF-IDF vectorizer and prediction path.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use lexiclass::inference::{InferenceServer, InferenceService};
use lexiclass::model::{LoadedModel, SoftmaxRegression, SoftmaxRegressionConfig};
use lexiclass::record::{MemoryRecordSource, RawRecord};
use lexiclass::vectorizer::{FeatureVectorizer, TfIdfConfig, TfIdfVectorizer};

const WORDS: &[&str] = &[
    "market", "shares", "striker", "goal", "election", "senate", "budget", "league", "season",
    "profit", "coach", "minister", "inflation", "transfer", "debate", "stadium", "policy",
    "growth", "penalty", "campaign", "earnings", "referee", "treaty", "merger",
];

/// Generate pseudo-random documents from a fixed word list.
fn generate_documents(count: usize, length: usize) -> Vec<String> {
    (0..count)
        .map(|i| {
            (0..length)
                .map(|j| WORDS[(i * 7 + j * 13 + i * j) % WORDS.len()])
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}

fn labels() -> Vec<String> {
    vec!["business".to_string(), "sport".to_string(), "politics".to_string()]
}

fn built_vectorizer(documents: &[String]) -> TfIdfVectorizer {
    let rows: Vec<(&str, &str)> = documents
        .iter()
        .enumerate()
        .map(|(i, d)| (d.as_str(), ["business", "sport", "politics"][i % 3]))
        .collect();
    let mut vectorizer = TfIdfVectorizer::new(TfIdfConfig::default(), labels()).unwrap();
    vectorizer
        .build_vocabulary(&mut MemoryRecordSource::from_texts(labels(), &rows))
        .unwrap();
    vectorizer
}

fn bench_build_vocabulary(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_vocabulary");

    for count in [100, 1000] {
        let documents = generate_documents(count, 40);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &documents, |b, docs| {
            b.iter(|| black_box(built_vectorizer(docs)))
        });
    }

    group.finish();
}

fn bench_vectorize(c: &mut Criterion) {
    let documents = generate_documents(500, 40);
    let vectorizer = built_vectorizer(&documents);
    let record = RawRecord::one_hot(documents[17].as_bytes(), 1, 3);

    c.bench_function("vectorize_record", |b| {
        b.iter(|| black_box(vectorizer.vectorize(black_box(&record)).unwrap()))
    });
}

fn bench_infer(c: &mut Criterion) {
    let documents = generate_documents(500, 40);
    let vectorizer = built_vectorizer(&documents);
    let model = SoftmaxRegression::new(
        SoftmaxRegressionConfig::default(),
        vectorizer.feature_count(),
        3,
        7,
    );

    let mut server = InferenceServer::new();
    server
        .register(
            "bench",
            LoadedModel {
                model: Box::new(model),
                vectorizer: Box::new(vectorizer),
                labels: labels(),
            },
        )
        .unwrap();
    let payload = documents[3].as_bytes();

    c.bench_function("infer_document", |b| {
        b.iter(|| black_box(server.infer("bench", black_box(payload)).unwrap()))
    });
}

criterion_group!(benches, bench_build_vocabulary, bench_vectorize, bench_infer);
criterion_main!(benches);
