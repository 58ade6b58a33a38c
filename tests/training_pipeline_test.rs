//! Integration tests for complete training runs over directory sources.

use std::fs;
use std::path::Path;

use lexiclass::error::{LexiclassError, Result};
use lexiclass::inference::{InferenceServer, InferenceService};
use lexiclass::model::{ModelBundle, ModelRegistry};
use lexiclass::training::{TempLayout, TrainingConfig, TrainingOrchestrator};
use lexiclass::vectorizer::VectorizerRegistry;
use tempfile::TempDir;

const SPORT: &[&str] = &[
    "the striker scored a late goal in the football match",
    "the keeper saved a penalty and the match ended level",
    "fans cheered as the team won the league title",
    "the coach praised the defence after the football game",
    "a hat trick from the striker sealed the cup final",
    "the team trained hard before the derby match",
];

const POLITICS: &[&str] = &[
    "the minister announced a new budget in parliament",
    "voters head to the polls in the general election",
    "the senate passed the bill after a long debate",
    "the government faces a vote of confidence in parliament",
    "the opposition leader criticised the budget plan",
    "the election campaign focused on taxes and healthcare",
];

fn write_corpus(root: &Path) -> Result<()> {
    for (label, texts) in [("sport", SPORT), ("politics", POLITICS)] {
        let dir = root.join(label);
        fs::create_dir_all(&dir)?;
        for (i, text) in texts.iter().enumerate() {
            fs::write(dir.join(format!("{i:03}.txt")), text)?;
        }
    }
    Ok(())
}

fn training_config(corpus: &Path, seed: u64) -> Result<TrainingConfig> {
    let json = serde_json::json!({
        "hyper-parameters": {
            "max-epochs": 15,
            "batch-size": 4,
            "random-seed": seed,
            "evaluation-metric": "f1",
            "patience": 10
        },
        "labels": ["sport", "politics"],
        "training-record-source": "directory",
        "training-record-source-config": {"directory": corpus},
        "evaluation-record-source": "directory",
        "evaluation-record-source-config": {"directory": corpus},
        "input-sequence": "tfidf",
        "input-sequence-config": {"word-min-characters": 3},
        "model-builder": "softmax-regression",
        "model-builder-config": {"learning-rate": 2.0},
        "thread-pool-size": 2
    });
    TrainingConfig::from_json(&json.to_string())
}

fn read_dir_bytes(dir: &Path) -> Result<Vec<(String, Vec<u8>)>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        files.push((
            entry.file_name().to_string_lossy().to_string(),
            fs::read(entry.path())?,
        ));
    }
    files.sort();
    Ok(files)
}

#[test]
fn test_train_then_serve_bundle() -> Result<()> {
    let temp = TempDir::new()?;
    let corpus = temp.path().join("corpus");
    write_corpus(&corpus)?;

    let model_out = temp.path().join("model.bin");
    let eval_out = temp.path().join("eval.json");
    let config = training_config(&corpus, 11)?;

    let summary = TrainingOrchestrator::new().execute(
        &config,
        &temp.path().join("work"),
        &model_out,
        &eval_out,
    )?;

    assert_eq!(summary.seed, 11);
    assert_eq!(summary.training_records, 12);
    assert_eq!(summary.evaluation_records, 12);
    assert!(summary.feature_count > 0);
    assert!(summary.outcome.epochs_run >= 1);
    assert!(summary.evaluation.accuracy > 0.5);

    let report: serde_json::Value = serde_json::from_str(&fs::read_to_string(&eval_out)?)?;
    assert!(report["confusion-per-label"]["sport"].is_object());
    assert!(report["confusion-per-label"]["politics"].is_object());

    let loaded = ModelBundle::load(&model_out)?
        .instantiate(&ModelRegistry::new(), &VectorizerRegistry::new())?;
    let mut server = InferenceServer::new();
    server.register("news", loaded)?;

    let result = server.infer("news", b"the striker scored a goal in the match")?;
    assert_eq!(result.highest_label, "sport");

    let result = server.infer("news", b"parliament debated the budget before the election")?;
    assert_eq!(result.highest_label, "politics");

    Ok(())
}

#[test]
fn test_fixed_seed_reproduces_datasets() -> Result<()> {
    let temp = TempDir::new()?;
    let corpus = temp.path().join("corpus");
    write_corpus(&corpus)?;
    let config = training_config(&corpus, 5)?;

    let mut runs = Vec::new();
    for run in ["a", "b"] {
        let work = temp.path().join(run);
        TrainingOrchestrator::new().execute(
            &config,
            &work,
            &temp.path().join(format!("{run}.bin")),
            &temp.path().join(format!("{run}.json")),
        )?;

        let layout = TempLayout::new(&work);
        runs.push((
            read_dir_bytes(&layout.training_dir())?,
            read_dir_bytes(&layout.evaluation_dir())?,
            fs::read(layout.snapshot_file())?,
        ));
    }

    assert_eq!(runs[0].0.len(), 12);
    assert_eq!(runs[0], runs[1]);
    Ok(())
}

#[test]
fn test_reuse_cached_sequence_data() -> Result<()> {
    let temp = TempDir::new()?;
    let corpus = temp.path().join("corpus");
    write_corpus(&corpus)?;
    let work = temp.path().join("work");

    let config = training_config(&corpus, 3)?;
    let first = TrainingOrchestrator::new().execute(
        &config,
        &work,
        &temp.path().join("first.bin"),
        &temp.path().join("first.json"),
    )?;

    let snapshot_before = fs::read(TempLayout::new(&work).snapshot_file())?;
    let mut cached = config.clone();
    cached.reuse_cached_sequence_data = true;
    let second = TrainingOrchestrator::new().execute(
        &cached,
        &work,
        &temp.path().join("second.bin"),
        &temp.path().join("second.json"),
    )?;

    assert_eq!(first.feature_count, second.feature_count);
    assert_eq!(second.training_records, 12);
    assert_eq!(fs::read(TempLayout::new(&work).snapshot_file())?, snapshot_before);
    assert!(temp.path().join("second.bin").is_file());
    Ok(())
}

#[test]
fn test_missing_corpus_is_config_error() -> Result<()> {
    let temp = TempDir::new()?;
    let config = training_config(&temp.path().join("absent"), 1)?;

    let err = TrainingOrchestrator::new()
        .execute(
            &config,
            &temp.path().join("work"),
            &temp.path().join("m.bin"),
            &temp.path().join("e.json"),
        )
        .unwrap_err();

    assert!(matches!(err, LexiclassError::Config(_)));
    assert!(!temp.path().join("m.bin").exists());
    Ok(())
}
