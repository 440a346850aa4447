use thiserror::Error;

use super::extract::ExtractError;
use super::model::{MaterializedTable, Model, TableKey};

#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error("table '{0}' does not exist in this model")]
    TableNotFound(String),
    #[error("could not materialize table '{table}'")]
    Decode {
        table: String,
        #[source]
        source: ExtractError,
    },
}

/// Decode the rows of `table`.
///
/// Nothing is retained here: calling this twice decodes twice and yields
/// equal tables.
pub fn materialize(model: &Model, table: &str) -> Result<MaterializedTable, MaterializeError> {
    if !model.has_table(table) {
        return Err(MaterializeError::TableNotFound(table.to_string()));
    }

    let batch = model.decoder().decode(table).map_err(|e| match e {
        ExtractError::NotFound(name) => MaterializeError::TableNotFound(name),
        source => MaterializeError::Decode {
            table: table.to_string(),
            source,
        },
    })?;

    log::info!(
        "Materialized '{table}' from {}: {} rows x {} columns",
        model.identity(),
        batch.num_rows(),
        batch.num_columns()
    );

    Ok(MaterializedTable::new(
        TableKey {
            archive: model.identity().clone(),
            table: table.to_string(),
        },
        batch,
    ))
}
