//! The inference capability shared by every transport.

use std::collections::HashMap;

use crate::error::{LexiclassError, Result};
use crate::inference::config::ModelEntry;
use crate::inference::fair_lock::FairLock;
use crate::inference::result::InferenceResult;
use crate::model::{LoadedModel, ModelBundle, ModelRegistry, TrainableModel};
use crate::record::RawRecord;
use crate::vectorizer::{FeatureVectorizer, VectorizerRegistry};

/// Answers inference requests. Implemented by [`InferenceServer`] and by
/// test doubles handed to transport adapters.
pub trait InferenceService: Send + Sync {
    fn infer(&self, model_id: &str, payload: &[u8]) -> Result<InferenceResult>;
}

struct ServedModel {
    model: FairLock<Box<dyn TrainableModel>>,
    vectorizer: Box<dyn FeatureVectorizer>,
    labels: Vec<String>,
}

/// Loaded models by identifier.
///
/// Requests for one model are served one at a time in arrival order;
/// requests for different models run in parallel.
#[derive(Default)]
pub struct InferenceServer {
    models: HashMap<String, ServedModel>,
}

impl std::fmt::Debug for InferenceServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceServer")
            .field("models", &self.model_ids())
            .finish()
    }
}

impl InferenceServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every configured bundle.
    pub fn load(
        entries: &[ModelEntry],
        models: &ModelRegistry,
        vectorizers: &VectorizerRegistry,
    ) -> Result<Self> {
        let mut server = InferenceServer::new();
        for entry in entries {
            let loaded = ModelBundle::load(&entry.file)?.instantiate(models, vectorizers)?;
            log::info!(
                "loaded model '{}' from {} ({} labels, {} features)",
                entry.id,
                entry.file.display(),
                loaded.labels.len(),
                loaded.vectorizer.feature_count()
            );
            server.register(&entry.id, loaded)?;
        }
        Ok(server)
    }

    pub fn register(&mut self, id: &str, loaded: LoadedModel) -> Result<()> {
        if self.models.contains_key(id) {
            return Err(LexiclassError::config(format!("duplicate model id '{id}'")));
        }
        self.models.insert(
            id.to_string(),
            ServedModel {
                model: FairLock::new(loaded.model),
                vectorizer: loaded.vectorizer,
                labels: loaded.labels,
            },
        );
        Ok(())
    }

    pub fn model_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.models.keys().map(|k| k.as_str()).collect();
        ids.sort_unstable();
        ids
    }

    pub fn labels(&self, model_id: &str) -> Option<&[String]> {
        self.models.get(model_id).map(|m| m.labels.as_slice())
    }
}

impl InferenceService for InferenceServer {
    fn infer(&self, model_id: &str, payload: &[u8]) -> Result<InferenceResult> {
        let served = self
            .models
            .get(model_id)
            .ok_or_else(|| LexiclassError::model_not_found(model_id))?;

        let record = RawRecord::new(payload, vec![0.0; served.labels.len()]);
        let scores = {
            let model = served.model.lock();
            let vectorized = served
                .vectorizer
                .vectorize(&record)
                .map_err(|e| LexiclassError::prediction(e.to_string()))?;
            model.predict(&vectorized.features)?
        };

        InferenceResult::from_scores(&served.labels, &scores)
    }
}
