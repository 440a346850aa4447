use std::collections::hash_map::Entry;
use std::collections::HashMap;

use super::{VisualizationSession, VizError};
use crate::data::model::{ArchiveIdentity, MaterializedTable, TableKey};

/// One renderer per materialized table, reused across views so its
/// interaction state survives reselection.
#[derive(Debug, Default)]
pub struct SessionCache {
    sessions: HashMap<TableKey, VisualizationSession>,
    builds: usize,
}

impl SessionCache {
    pub fn get_or_create(
        &mut self,
        table: &MaterializedTable,
        build: impl FnOnce(&MaterializedTable) -> Result<VisualizationSession, VizError>,
    ) -> Result<&mut VisualizationSession, VizError> {
        match self.sessions.entry(table.key().clone()) {
            Entry::Occupied(entry) => {
                log::debug!("Reusing chart session for '{}'", table.name());
                Ok(entry.into_mut())
            }
            Entry::Vacant(entry) => {
                let session = build(table)?;
                self.builds += 1;
                Ok(entry.insert(session))
            }
        }
    }

    pub fn get_mut(&mut self, key: &TableKey) -> Option<&mut VisualizationSession> {
        self.sessions.get_mut(key)
    }

    /// Drop every session belonging to `archive`.
    pub fn invalidate_archive(&mut self, archive: &ArchiveIdentity) {
        self.sessions.retain(|key, _| &key.archive != archive);
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Number of renderer constructions so far.
    pub fn builds(&self) -> usize {
        self.builds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::extract::Extractor;
    use crate::data::materialize::materialize;
    use crate::data::testing::{sample_archive, CountingExtractor};
    use crate::viz::{build_renderer, ChartKind, Interaction, RendererMode};

    fn build(table: &MaterializedTable) -> Result<VisualizationSession, VizError> {
        build_renderer(table, None, RendererMode::Explore)
    }

    #[test]
    fn distinct_tables_get_distinct_sessions() {
        let model = CountingExtractor::default().load(&sample_archive()).unwrap();
        let sales = materialize(&model, "Sales").unwrap();
        let returns = materialize(&model, "Returns").unwrap();
        let mut cache = SessionCache::default();

        cache.get_or_create(&sales, build).unwrap();
        cache.get_or_create(&returns, build).unwrap();
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.builds(), 2);
    }

    #[test]
    fn reselecting_reuses_session_state() {
        let model = CountingExtractor::default().load(&sample_archive()).unwrap();
        let mut cache = SessionCache::default();

        let sales = materialize(&model, "Sales").unwrap();
        cache
            .get_or_create(&sales, build)
            .unwrap()
            .apply(Interaction::SetKind(ChartKind::Points));

        // A fresh materialization of the same table maps to the same key.
        let again = materialize(&model, "Sales").unwrap();
        let session = cache.get_or_create(&again, build).unwrap();
        assert_eq!(session.spec().kind, ChartKind::Points);
        assert_eq!(session.history().len(), 1);
        assert_eq!(cache.builds(), 1);
    }

    #[test]
    fn failed_builds_are_retried() {
        let model = CountingExtractor::default().load(&sample_archive()).unwrap();
        let age = materialize(&model, "Age").unwrap();
        let mut cache = SessionCache::default();

        assert!(cache.get_or_create(&age, build).is_err());
        assert!(cache.get_or_create(&age, build).is_err());
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.builds(), 0);
    }

    #[test]
    fn invalidating_an_archive_drops_its_sessions() {
        let model = CountingExtractor::default().load(&sample_archive()).unwrap();
        let sales = materialize(&model, "Sales").unwrap();
        let mut cache = SessionCache::default();
        cache.get_or_create(&sales, build).unwrap();

        cache.invalidate_archive(model.identity());
        assert_eq!(cache.len(), 0);
        assert!(cache.get_mut(sales.key()).is_none());
    }
}
