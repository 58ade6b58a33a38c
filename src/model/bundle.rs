//! Model bundle container.
//!
//! A bundle is everything a server needs to answer inference requests for
//! one model, written as a single file:
//!
//! ```text
//! "LXCB" | version: u32 LE | header_len: u32 LE | header (bincode)
//!        | model_len: u64 LE | model bytes | crc32(everything before): u32 LE
//! ```
//!
//! The header holds the builder name, the label list, the creation time and
//! the vectorizer snapshot. The model bytes are whatever the builder's
//! model wrote in [`TrainableModel::save`].

use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::codec;
use crate::error::{LexiclassError, Result};
use crate::model::{ModelRegistry, TrainableModel};
use crate::vectorizer::{FeatureVectorizer, VectorizerRegistry, VectorizerSnapshot};

const BUNDLE_MAGIC: &[u8; 4] = b"LXCB";
const BUNDLE_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct BundleHeader {
    builder: String,
    labels: Vec<String>,
    created_at: DateTime<Utc>,
    vectorizer: VectorizerSnapshot,
}

/// A serialized model together with its vectorizer and labels.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelBundle {
    pub builder: String,
    pub labels: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub vectorizer: VectorizerSnapshot,
    pub model: Vec<u8>,
}

/// A bundle whose model and vectorizer have been instantiated.
pub struct LoadedModel {
    pub model: Box<dyn TrainableModel>,
    pub vectorizer: Box<dyn FeatureVectorizer>,
    pub labels: Vec<String>,
}

impl std::fmt::Debug for LoadedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedModel")
            .field("builder", &self.model.builder_name())
            .field("vectorizer", &self.vectorizer)
            .field("labels", &self.labels)
            .finish()
    }
}

impl ModelBundle {
    /// Capture a trained model and the vectorizer it was trained with.
    pub fn from_parts(model: &dyn TrainableModel, vectorizer: &dyn FeatureVectorizer) -> Result<Self> {
        let mut bytes = Vec::new();
        model.save(&mut bytes)?;

        Ok(ModelBundle {
            builder: model.builder_name().to_string(),
            labels: vectorizer.labels().to_vec(),
            created_at: Utc::now(),
            vectorizer: vectorizer.snapshot()?,
            model: bytes,
        })
    }

    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> Result<()> {
        let header = codec::encode_payload(&BundleHeader {
            builder: self.builder.clone(),
            labels: self.labels.clone(),
            created_at: self.created_at,
            vectorizer: self.vectorizer.clone(),
        })?;
        let header_len = u32::try_from(header.len())
            .map_err(|_| LexiclassError::serialization("bundle header too large"))?;

        let mut buffer = Vec::with_capacity(header.len() + self.model.len() + 24);
        buffer.write_all(BUNDLE_MAGIC)?;
        buffer.write_u32::<LittleEndian>(BUNDLE_VERSION)?;
        buffer.write_u32::<LittleEndian>(header_len)?;
        buffer.write_all(&header)?;
        buffer.write_u64::<LittleEndian>(self.model.len() as u64)?;
        buffer.write_all(&self.model)?;
        let checksum = crc32fast::hash(&buffer);
        buffer.write_u32::<LittleEndian>(checksum)?;

        writer.write_all(&buffer)?;
        Ok(())
    }

    pub fn read_from<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;

        if bytes.len() < 4 {
            return Err(LexiclassError::model("bundle is truncated"));
        }
        let (body, trailer) = bytes.split_at(bytes.len() - 4);
        let expected = Cursor::new(trailer).read_u32::<LittleEndian>()?;
        let magic_ok = body.len() >= 4 && &body[..4] == BUNDLE_MAGIC;
        if !magic_ok {
            return Err(LexiclassError::model("not a model bundle"));
        }
        if crc32fast::hash(body) != expected {
            return Err(LexiclassError::model("bundle checksum mismatch"));
        }

        let mut cursor = Cursor::new(&body[4..]);
        let version = cursor.read_u32::<LittleEndian>()?;
        if version != BUNDLE_VERSION {
            return Err(LexiclassError::model(format!(
                "unsupported bundle version {version}"
            )));
        }

        let header_len = cursor.read_u32::<LittleEndian>()? as usize;
        let mut header = vec![0u8; header_len];
        cursor.read_exact(&mut header)?;
        let header: BundleHeader = codec::decode_payload(&header)?;

        let model_len = usize::try_from(cursor.read_u64::<LittleEndian>()?)
            .map_err(|_| LexiclassError::model("model section too large"))?;
        let remaining = body.len() - 4 - cursor.position() as usize;
        if model_len != remaining {
            return Err(LexiclassError::model("model section length mismatch"));
        }
        let mut model = vec![0u8; model_len];
        cursor.read_exact(&mut model)?;

        Ok(ModelBundle {
            builder: header.builder,
            labels: header.labels,
            created_at: header.created_at,
            vectorizer: header.vectorizer,
            model,
        })
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_to(&mut writer)?;
        writer.flush()?;
        log::info!("saved {} bundle to {}", self.builder, path.display());
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            LexiclassError::model(format!("cannot open bundle {}: {e}", path.display()))
        })?;
        Self::read_from(&mut BufReader::new(file))
    }

    /// Rebuild the model and vectorizer through their registries.
    pub fn instantiate(
        &self,
        models: &ModelRegistry,
        vectorizers: &VectorizerRegistry,
    ) -> Result<LoadedModel> {
        let builder = models.get(&self.builder)?;
        let model = builder.load(&mut Cursor::new(&self.model))?;
        let vectorizer = vectorizers.restore(&self.vectorizer)?;

        if model.label_count() != self.labels.len() {
            return Err(LexiclassError::model(format!(
                "model predicts {} labels but bundle lists {}",
                model.label_count(),
                self.labels.len()
            )));
        }
        if model.feature_count() != vectorizer.feature_count() {
            return Err(LexiclassError::model(format!(
                "model expects {} features but vectorizer produces {}",
                model.feature_count(),
                vectorizer.feature_count()
            )));
        }

        Ok(LoadedModel {
            model,
            vectorizer,
            labels: self.labels.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelBuilder;
    use crate::model::linear::SoftmaxRegressionBuilder;
    use crate::record::MemoryRecordSource;
    use crate::vectorizer::{TfIdfConfig, TfIdfVectorizer};

    fn labels() -> Vec<String> {
        vec!["ham".to_string(), "spam".to_string()]
    }

    fn bundle() -> ModelBundle {
        let mut vectorizer = TfIdfVectorizer::new(TfIdfConfig::default(), labels()).unwrap();
        let mut source = MemoryRecordSource::from_texts(
            labels(),
            &[("lunch at noon", "ham"), ("win cash now", "spam")],
        );
        vectorizer.build_vocabulary(&mut source).unwrap();

        let model = SoftmaxRegressionBuilder
            .create(&serde_json::Value::Null, vectorizer.feature_count(), 2, 5)
            .unwrap();
        ModelBundle::from_parts(model.as_ref(), &vectorizer).unwrap()
    }

    #[test]
    fn test_write_read() {
        let bundle = bundle();
        let mut bytes = Vec::new();
        bundle.write_to(&mut bytes).unwrap();

        let read = ModelBundle::read_from(&mut bytes.as_slice()).unwrap();
        assert_eq!(read, bundle);

        let loaded = read
            .instantiate(&ModelRegistry::new(), &VectorizerRegistry::new())
            .unwrap();
        assert_eq!(loaded.labels, labels());
        assert_eq!(loaded.model.feature_count(), 6);
    }

    #[test]
    fn test_corruption_detected() {
        let mut bytes = Vec::new();
        bundle().write_to(&mut bytes).unwrap();

        let middle = bytes.len() / 2;
        bytes[middle] ^= 0xff;
        let err = ModelBundle::read_from(&mut bytes.as_slice()).unwrap_err();
        assert!(err.to_string().contains("checksum"));

        let err = ModelBundle::read_from(&mut &b"nope"[..]).unwrap_err();
        assert!(matches!(err, LexiclassError::Model(_)));
    }

    #[test]
    fn test_unknown_builder() {
        let mut bundle = bundle();
        bundle.builder = "recurrent".to_string();
        let err = bundle
            .instantiate(&ModelRegistry::new(), &VectorizerRegistry::new())
            .unwrap_err();
        assert!(matches!(err, LexiclassError::Config(_)));
    }
}
