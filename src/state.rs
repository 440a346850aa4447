use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::ScannerConfig;
use crate::data::cache::ModelCache;
use crate::data::export::{write_csv, write_parquet};
use crate::data::extract::Extractor;
use crate::data::materialize::{materialize, MaterializeError};
use crate::data::model::{MaterializedTable, Model, UploadedArchive};
use crate::error::{error_chain, AppError, Notice};
use crate::summary::{summarize, DisplayBundle};
use crate::viz::cache::SessionCache;
use crate::viz::{build_renderer, VisualizationSession};

// ---------------------------------------------------------------------------
// Actions: everything the user can do
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum Action {
    /// Read a file from disk and upload it.
    Open(PathBuf),
    Upload(UploadedArchive),
    Select(String),
    /// Materialize the selected table.
    View,
    ExportCsv(PathBuf),
    ExportParquet(PathBuf),
    /// Drop the current model and its cache entries.
    Forget,
}

// ---------------------------------------------------------------------------
// Session phases
// ---------------------------------------------------------------------------

/// The table currently on screen.
#[derive(Debug)]
pub struct TableView {
    pub table: MaterializedTable,
    /// Why no chart is shown, if building one failed.
    pub chart_error: Option<String>,
}

#[derive(Debug)]
pub struct LoadedModel {
    pub model: Arc<Model>,
    pub summary: DisplayBundle,
    pub selected: Option<String>,
    pub view: Option<TableView>,
}

#[derive(Debug, Default)]
pub enum Phase {
    #[default]
    Empty,
    Loaded(LoadedModel),
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full session state, independent of rendering. Only [`AppState::handle`]
/// mutates it.
pub struct AppState {
    extractor: Box<dyn Extractor>,
    config: ScannerConfig,
    models: ModelCache,
    charts: SessionCache,
    phase: Phase,
    notice: Option<Notice>,
}

impl AppState {
    pub fn new(extractor: Box<dyn Extractor>, config: ScannerConfig) -> Self {
        Self {
            extractor,
            config,
            models: ModelCache::default(),
            charts: SessionCache::default(),
            phase: Phase::Empty,
            notice: None,
        }
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn models(&self) -> &ModelCache {
        &self.models
    }

    pub fn charts(&self) -> &SessionCache {
        &self.charts
    }

    pub fn current_table(&self) -> Option<&MaterializedTable> {
        match &self.phase {
            Phase::Loaded(loaded) => loaded.view.as_ref().map(|v| &v.table),
            Phase::Empty => None,
        }
    }

    /// The table on screen together with its chart session, if one was built.
    pub fn view_and_chart(&mut self) -> Option<(&TableView, Option<&mut VisualizationSession>)> {
        let Phase::Loaded(loaded) = &self.phase else {
            return None;
        };
        let view = loaded.view.as_ref()?;
        let chart = self.charts.get_mut(view.table.key());
        Some((view, chart))
    }

    /// Apply one user action. Failures end up in [`AppState::notice`]; a
    /// success replaces any earlier notice.
    pub fn handle(&mut self, action: Action) {
        let outcome = match action {
            Action::Open(path) => self.open(&path),
            Action::Upload(archive) => self.upload(archive),
            Action::Select(name) => self.select(name),
            Action::View => self.view(),
            Action::ExportCsv(path) => self.export(&path, write_csv),
            Action::ExportParquet(path) => self.export(&path, write_parquet),
            Action::Forget => self.forget(),
        };
        match outcome {
            Ok(notice) => self.notice = notice,
            Err(err) => {
                let notice = Notice::from(&err);
                log::error!("{}", notice.text);
                self.notice = Some(notice);
            }
        }
    }

    fn open(&mut self, path: &Path) -> Result<Option<Notice>, AppError> {
        let bytes = std::fs::read(path).map_err(|source| AppError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.upload(UploadedArchive::new(name, bytes))
    }

    fn upload(&mut self, archive: UploadedArchive) -> Result<Option<Notice>, AppError> {
        let extractor = &self.extractor;
        let model = self
            .models
            .get_or_create(archive.identity(), || extractor.load(&archive))
            .map_err(|source| AppError::ArchiveDecode {
                name: archive.name().to_string(),
                source,
            })?;

        if let Phase::Loaded(loaded) = &self.phase {
            if Arc::ptr_eq(&loaded.model, &model) {
                return Ok(None);
            }
        }

        let summary = summarize(&model);
        let text = format!(
            "Loaded {}: {} tables, {}",
            archive.name(),
            summary.table_count,
            summary.size
        );
        log::info!("{text}");
        self.phase = Phase::Loaded(LoadedModel {
            selected: summary.table_names.first().cloned(),
            model,
            summary,
            view: None,
        });
        Ok(Some(Notice::info(text)))
    }

    fn select(&mut self, name: String) -> Result<Option<Notice>, AppError> {
        let Phase::Loaded(loaded) = &mut self.phase else {
            return Err(AppError::NoModel);
        };
        if !loaded.model.has_table(&name) {
            return Err(MaterializeError::TableNotFound(name).into());
        }
        loaded.selected = Some(name);
        Ok(None)
    }

    fn view(&mut self) -> Result<Option<Notice>, AppError> {
        let Phase::Loaded(loaded) = &mut self.phase else {
            return Err(AppError::NoModel);
        };
        let name = loaded.selected.clone().ok_or(AppError::NoSelection)?;
        let table = materialize(&loaded.model, &name)?;

        let config = &self.config;
        let built = self.charts.get_or_create(&table, |t| {
            build_renderer(t, config.chart_config.as_deref(), config.render_mode)
        });
        let chart_error = match built {
            Ok(_) => None,
            Err(source) => {
                let err = AppError::VisualizationBuild {
                    table: name,
                    source,
                };
                let text = error_chain(&err);
                log::warn!("{text}");
                Some(text)
            }
        };

        loaded.view = Some(TableView { table, chart_error });
        Ok(None)
    }

    fn export(
        &self,
        path: &Path,
        write: fn(&MaterializedTable, &Path) -> anyhow::Result<()>,
    ) -> Result<Option<Notice>, AppError> {
        let table = self.current_table().ok_or(AppError::NoTable)?;
        write(table, path).map_err(AppError::Export)?;
        Ok(Some(Notice::info(format!(
            "Exported '{}' to {}",
            table.name(),
            path.display()
        ))))
    }

    fn forget(&mut self) -> Result<Option<Notice>, AppError> {
        let Phase::Loaded(loaded) = std::mem::take(&mut self.phase) else {
            return Err(AppError::NoModel);
        };
        let identity = loaded.model.identity();
        self.models.invalidate(identity);
        self.charts.invalidate_archive(identity);
        Ok(Some(Notice::info(format!("Closed {identity}"))))
    }
}
