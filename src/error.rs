use std::error::Error as StdError;
use std::path::PathBuf;

use thiserror::Error;

use crate::data::extract::ExtractError;
use crate::data::materialize::MaterializeError;
use crate::viz::VizError;

/// Every failure a user action can end in. None of them is fatal; each
/// becomes a [`Notice`].
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Could not read {}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Could not open archive '{name}'")]
    ArchiveDecode {
        name: String,
        source: ExtractError,
    },
    #[error(transparent)]
    Materialize(#[from] MaterializeError),
    #[error("Could not build chart for '{table}'")]
    VisualizationBuild { table: String, source: VizError },
    #[error("Export failed: {0:#}")]
    Export(anyhow::Error),
    #[error("Upload an archive first")]
    NoModel,
    #[error("Select a table first")]
    NoSelection,
    #[error("View a table first")]
    NoTable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A message shown in the status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl Notice {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            text: text.into(),
        }
    }
}

impl From<&AppError> for Notice {
    fn from(err: &AppError) -> Self {
        let level = match err {
            AppError::NoModel | AppError::NoSelection | AppError::NoTable => NoticeLevel::Warning,
            _ => NoticeLevel::Error,
        };
        Notice {
            level,
            text: error_chain(err),
        }
    }
}

/// `err` followed by each of its causes, separated by `: `.
pub fn error_chain(err: &dyn StdError) -> String {
    let mut text = err.to_string();
    let mut cause = err.source();
    while let Some(inner) = cause {
        text.push_str(": ");
        text.push_str(&inner.to_string());
        cause = inner.source();
    }
    text
}
