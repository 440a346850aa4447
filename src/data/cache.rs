use std::collections::HashMap;
use std::sync::Arc;

use super::model::{ArchiveIdentity, Model};

// ---------------------------------------------------------------------------
// Model cache: archive identity → constructed model
// ---------------------------------------------------------------------------

/// Session-scoped store of constructed models.
///
/// Entries are only added; a new archive evicts nothing. Failed
/// constructions are never stored, so the next interaction retries.
#[derive(Debug, Default)]
pub struct ModelCache {
    models: HashMap<ArchiveIdentity, Arc<Model>>,
}

impl ModelCache {
    /// Return the cached model for `identity`, or run `construct` and cache
    /// its result.
    pub fn get_or_create<E>(
        &mut self,
        identity: &ArchiveIdentity,
        construct: impl FnOnce() -> Result<Model, E>,
    ) -> Result<Arc<Model>, E> {
        if let Some(model) = self.models.get(identity) {
            log::debug!("Model cache hit for {identity}");
            return Ok(model.clone());
        }

        log::info!("Constructing model for {identity}");
        let model = Arc::new(construct()?);
        self.models.insert(identity.clone(), model.clone());
        Ok(model)
    }

    /// Drop one entry. Returns whether it was present.
    pub fn invalidate(&mut self, identity: &ArchiveIdentity) -> bool {
        self.models.remove(identity).is_some()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::extract::{ExtractError, Extractor};
    use crate::data::model::UploadedArchive;
    use crate::data::testing::{sample_archive, CountingExtractor};

    #[test]
    fn repeated_lookups_construct_once() {
        let extractor = CountingExtractor::default();
        let archive = sample_archive();
        let mut cache = ModelCache::default();

        let first = cache
            .get_or_create(archive.identity(), || extractor.load(&archive))
            .unwrap();
        for _ in 0..5 {
            let again = cache
                .get_or_create(archive.identity(), || extractor.load(&archive))
                .unwrap();
            assert!(Arc::ptr_eq(&first, &again));
        }

        assert_eq!(extractor.loads(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn failures_are_not_cached() {
        let extractor = CountingExtractor::default();
        let archive = sample_archive();
        let mut cache = ModelCache::default();

        let err = cache
            .get_or_create(archive.identity(), || {
                Err::<Model, _>(ExtractError::Unsupported("test".into()))
            })
            .unwrap_err();
        assert!(matches!(err, ExtractError::Unsupported(_)));
        assert!(cache.is_empty());

        cache
            .get_or_create(archive.identity(), || extractor.load(&archive))
            .unwrap();
        assert_eq!(extractor.loads(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn new_archive_evicts_nothing() {
        let extractor = CountingExtractor::default();
        let a = sample_archive();
        let b = UploadedArchive::new("copy.pbix", a.bytes().to_vec());
        let mut cache = ModelCache::default();

        cache.get_or_create(a.identity(), || extractor.load(&a)).unwrap();
        cache.get_or_create(b.identity(), || extractor.load(&b)).unwrap();
        assert_eq!(cache.len(), 2);

        assert!(cache.invalidate(a.identity()));
        assert!(!cache.invalidate(a.identity()));
        cache.get_or_create(b.identity(), || extractor.load(&b)).unwrap();
        assert_eq!(extractor.loads(), 2);

        assert!(cache.invalidate(b.identity()));
        assert!(cache.is_empty());
    }
}
