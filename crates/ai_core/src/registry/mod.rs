//! Model registry
//!
//! Read-only catalog of model capability records. The catalog is parsed on
//! first access and shared as an `Arc` afterwards; ids missing from it fall
//! back to dated-suffix stripping and then to heuristic classification.

mod classify;

use std::{
    collections::{BTreeMap, BTreeSet},
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use domain::{ModelCategory, ModelMetadata};
use parking_lot::RwLock;
use serde::Deserialize;
use tracing::{debug, info};

pub use self::classify::classify_id;
use crate::error::InferenceError;

const EMBEDDED_CATALOG: &str = include_str!("../../catalog/models.json");

/// Where the catalog JSON comes from
#[derive(Debug, Clone)]
pub enum CatalogSource {
    /// Catalog compiled into the binary
    Embedded,
    /// Catalog JSON held in memory
    Json(String),
    /// Catalog JSON file read on first access
    File(PathBuf),
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    models: Vec<ModelMetadata>,
}

/// Parsed catalog, keyed by model id
#[derive(Debug, Default)]
struct Catalog {
    models: BTreeMap<String, Arc<ModelMetadata>>,
}

impl Catalog {
    fn parse(json: &str) -> Result<Self, InferenceError> {
        let file: CatalogFile =
            serde_json::from_str(json).map_err(|e| InferenceError::Catalog(e.to_string()))?;

        let mut models = BTreeMap::new();
        for model in file.models {
            let id = model.id.clone();
            if models.insert(id.clone(), Arc::new(model)).is_some() {
                return Err(InferenceError::Catalog(format!("duplicate model id '{id}'")));
            }
        }
        Ok(Self { models })
    }

    /// Exact match, then repeatedly strip the last `-suffix` and retry
    fn resolve(&self, id: &str) -> Option<&Arc<ModelMetadata>> {
        let mut candidate = id.trim();
        loop {
            if let Some(meta) = self.models.get(candidate) {
                return Some(meta);
            }
            let (head, _) = candidate.rsplit_once('-')?;
            candidate = head;
        }
    }
}

/// Injected, lazily loaded model catalog
#[derive(Debug)]
pub struct ModelRegistry {
    source: CatalogSource,
    cache: RwLock<Option<Arc<Catalog>>>,
    loads: AtomicUsize,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::embedded()
    }
}

impl ModelRegistry {
    /// Registry over the given catalog source
    pub fn new(source: CatalogSource) -> Self {
        Self {
            source,
            cache: RwLock::new(None),
            loads: AtomicUsize::new(0),
        }
    }

    /// Registry over the catalog compiled into the crate
    pub fn embedded() -> Self {
        Self::new(CatalogSource::Embedded)
    }

    /// Registry over catalog JSON held in memory
    pub fn from_json(json: impl Into<String>) -> Self {
        Self::new(CatalogSource::Json(json.into()))
    }

    /// Registry over a catalog file
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self::new(CatalogSource::File(path.into()))
    }

    fn catalog(&self) -> Result<Arc<Catalog>, InferenceError> {
        if let Some(catalog) = self.cache.read().as_ref() {
            return Ok(Arc::clone(catalog));
        }

        let mut cache = self.cache.write();
        if let Some(catalog) = cache.as_ref() {
            return Ok(Arc::clone(catalog));
        }

        let catalog = Arc::new(self.load()?);
        self.loads.fetch_add(1, Ordering::Relaxed);
        info!(models = catalog.models.len(), "Loaded model catalog");
        *cache = Some(Arc::clone(&catalog));
        Ok(catalog)
    }

    fn load(&self) -> Result<Catalog, InferenceError> {
        match &self.source {
            CatalogSource::Embedded => Catalog::parse(EMBEDDED_CATALOG),
            CatalogSource::Json(json) => Catalog::parse(json),
            CatalogSource::File(path) => {
                debug!(path = %path.display(), "Reading model catalog");
                let json = std::fs::read_to_string(path).map_err(|e| {
                    InferenceError::Catalog(format!("cannot read {}: {e}", path.display()))
                })?;
                Catalog::parse(&json)
            },
        }
    }

    /// All catalog ids in lexicographic order
    pub fn list_models(&self) -> Result<Vec<String>, InferenceError> {
        Ok(self.catalog()?.models.keys().cloned().collect())
    }

    /// Metadata for `id`, exact or after stripping dated suffixes
    pub fn get_meta(&self, id: &str) -> Result<Option<Arc<ModelMetadata>>, InferenceError> {
        Ok(self.catalog()?.resolve(id).cloned())
    }

    /// Catalog entries of one category, sorted by id
    pub fn list_by_category(
        &self,
        category: ModelCategory,
    ) -> Result<Vec<Arc<ModelMetadata>>, InferenceError> {
        Ok(self
            .catalog()?
            .models
            .values()
            .filter(|meta| meta.category == category)
            .cloned()
            .collect())
    }

    /// Category of `id`: from the catalog when resolvable, else by heuristic
    pub fn classify(&self, id: &str) -> Result<ModelCategory, InferenceError> {
        Ok(self
            .catalog()?
            .resolve(id)
            .map_or_else(|| classify_id(id), |meta| meta.category))
    }

    /// Supported parameter names of `id`, if the model is known
    pub fn list_capabilities(&self, id: &str) -> Result<Option<BTreeSet<String>>, InferenceError> {
        Ok(self
            .catalog()?
            .resolve(id)
            .map(|meta| meta.supported_params.clone()))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn small_catalog() -> ModelRegistry {
        ModelRegistry::from_json(
            r#"{"models": [
                {"id": "gpt-4o", "category": "chat", "max_output_tokens": 16384,
                 "supported_params": ["temperature"], "endpoints": {"chat": "/v1/chat/completions"}},
                {"id": "gpt-4o-mini", "category": "chat", "max_output_tokens": 16384},
                {"id": "o3-mini", "category": "reasoning", "max_output_tokens": 100000,
                 "reasoning_required": true}
            ]}"#,
        )
    }

    #[test]
    fn embedded_catalog_parses() {
        let registry = ModelRegistry::embedded();
        let models = registry.list_models().unwrap();
        assert!(models.contains(&"gpt-4o".to_string()));
        assert!(models.contains(&"dall-e-3".to_string()));
    }

    #[test]
    fn list_models_is_sorted() {
        let models = ModelRegistry::embedded().list_models().unwrap();
        let mut sorted = models.clone();
        sorted.sort();
        assert_eq!(models, sorted);
    }

    #[test]
    fn every_listed_id_round_trips() {
        let registry = ModelRegistry::embedded();
        for id in registry.list_models().unwrap() {
            let meta = registry.get_meta(&id).unwrap().unwrap();
            assert_eq!(meta.id, id);
        }
    }

    #[test]
    fn dated_suffix_falls_back_to_base_model() {
        let registry = small_catalog();
        let meta = registry.get_meta("gpt-4o-2024-06-01").unwrap().unwrap();
        assert_eq!(meta.id, "gpt-4o");
    }

    #[test]
    fn suffix_stripping_prefers_longest_match() {
        let registry = small_catalog();
        let meta = registry.get_meta("gpt-4o-mini-2024-07-18").unwrap().unwrap();
        assert_eq!(meta.id, "gpt-4o-mini");
    }

    #[test]
    fn unknown_id_without_match_is_none() {
        let registry = small_catalog();
        assert!(registry.get_meta("llama3").unwrap().is_none());
        assert!(registry.get_meta("").unwrap().is_none());
    }

    #[test]
    fn classify_prefers_catalog_category() {
        let registry = small_catalog();
        assert_eq!(registry.classify("o3-mini").unwrap(), ModelCategory::Reasoning);
        assert_eq!(registry.classify("gpt-4o-2030-01-01").unwrap(), ModelCategory::Chat);
        assert_eq!(
            registry.classify("text-embedding-3-small").unwrap(),
            ModelCategory::Embedding
        );
    }

    #[test]
    fn list_by_category_is_sorted_and_filtered() {
        let registry = ModelRegistry::embedded();
        let images = registry.list_by_category(ModelCategory::Image).unwrap();
        let ids: Vec<_> = images.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["dall-e-2", "dall-e-3", "gpt-image-1"]);
    }

    #[test]
    fn capabilities_of_known_model() {
        let registry = small_catalog();
        let caps = registry.list_capabilities("gpt-4o").unwrap().unwrap();
        assert!(caps.contains("temperature"));
        assert!(registry.list_capabilities("nope").unwrap().is_none());
    }

    #[test]
    fn invalid_catalog_is_catalog_error() {
        let registry = ModelRegistry::from_json("{not json");
        assert!(matches!(
            registry.list_models(),
            Err(InferenceError::Catalog(_))
        ));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let registry = ModelRegistry::from_json(
            r#"{"models": [
                {"id": "a", "category": "chat", "max_output_tokens": 1},
                {"id": "a", "category": "chat", "max_output_tokens": 1}
            ]}"#,
        );
        let err = registry.list_models().unwrap_err();
        assert!(err.to_string().contains("duplicate model id 'a'"));
    }

    #[test]
    fn missing_file_is_catalog_error() {
        let registry = ModelRegistry::from_path("/nonexistent/models.json");
        assert!(matches!(
            registry.get_meta("gpt-4o"),
            Err(InferenceError::Catalog(_))
        ));
    }

    #[test]
    fn file_catalog_is_loaded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"models": [{{"id": "local-1", "category": "completion", "max_output_tokens": 64}}]}}"#
        )
        .unwrap();
        let registry = ModelRegistry::from_path(file.path());
        assert_eq!(registry.list_models().unwrap(), vec!["local-1".to_string()]);
    }

    #[test]
    fn concurrent_first_access_loads_once() {
        let registry = Arc::new(ModelRegistry::embedded());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.list_models().map(|m| m.len()))
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap().unwrap() > 0);
        }
        assert_eq!(registry.loads.load(Ordering::Relaxed), 1);
    }
}
