use actix_web::web;
use shared::DiagnosisResponse;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::error::{DiagnosisError, StartupError};
use crate::pipeline::model::InferenceEngine;
use crate::pipeline::preprocess::Preprocessor;
use crate::pipeline::resolver::{resolve, Diagnosis};
use crate::registry::ClassRegistry;
use crate::storage::upload_store::UploadStore;

/// A file taken from the `file` part of an upload.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub file_name: String,
    pub data: Vec<u8>,
}

/// Everything a request needs, built once at startup and shared by all
/// workers.
pub struct DiagnosisService {
    engine: InferenceEngine,
    registry: ClassRegistry,
    preprocessor: Preprocessor,
    store: UploadStore,
}

impl DiagnosisService {
    pub fn new(
        engine: InferenceEngine,
        registry: ClassRegistry,
        preprocessor: Preprocessor,
        store: UploadStore,
    ) -> Self {
        Self {
            engine,
            registry,
            preprocessor,
            store,
        }
    }

    pub async fn from_config(config: &AppConfig) -> Result<Self, StartupError> {
        let registry = ClassRegistry::load(&config.registry)?;
        log::info!("Loaded {} advisory records", registry.len());

        let engine = InferenceEngine::load(&config.model, &config.image)?;
        log::info!("Model ready on {} backend", engine.backend_name());

        let store = UploadStore::new(&config.storage.upload_dir);
        store.init().await?;
        log::info!("Storing uploads in {}", store.upload_dir().display());

        Ok(Self::new(
            engine,
            registry,
            Preprocessor::new(&config.image),
            store,
        ))
    }

    pub fn engine(&self) -> &InferenceEngine {
        &self.engine
    }

    /// Stores the upload, then runs decode, inference and resolution on the
    /// blocking pool.
    pub async fn diagnose(
        self: Arc<Self>,
        upload: UploadedImage,
    ) -> Result<DiagnosisResponse, DiagnosisError> {
        if upload.file_name.is_empty() {
            return Err(DiagnosisError::NoFileSelected);
        }

        let stored = self.store.persist(&upload.data, &upload.file_name).await?;

        let service = Arc::clone(&self);
        let image_data = upload.data;
        let diagnosis = web::block(move || service.run_pipeline(&image_data))
            .await
            .map_err(|e| DiagnosisError::Worker(e.to_string()))??;

        log::info!(
            "Diagnosed {} as {} ({:.2}%)",
            stored,
            diagnosis.label,
            diagnosis.confidence
        );

        Ok(DiagnosisResponse::new(
            stored.to_string(),
            diagnosis.label,
            diagnosis.confidence,
            diagnosis.advisory,
        ))
    }

    pub fn run_pipeline(&self, image_data: &[u8]) -> Result<Diagnosis, DiagnosisError> {
        let tensor = self.preprocessor.preprocess(image_data)?;
        let probabilities = self.engine.classify(&tensor)?;
        resolve(&probabilities, &self.registry)
    }
}
