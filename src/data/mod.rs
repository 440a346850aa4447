//! Data layer: archive decoding, model caching and table materialization.
//!
//! Architecture:
//! ```text
//!   uploaded archive
//!        │
//!        ▼
//!   ┌──────────┐
//!   │ extract   │  Extractor::load → Model (summary only)
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  cache    │  archive identity → Arc<Model>
//!   └──────────┘
//!        │  on "View table"
//!        ▼
//!   ┌─────────────┐
//!   │ materialize  │  Model + table name → MaterializedTable
//!   └─────────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  export   │  MaterializedTable → .csv / .parquet
//!   └──────────┘
//! ```

pub mod cache;
pub mod export;
pub mod extract;
pub mod materialize;
pub mod model;

#[cfg(test)]
pub(crate) mod testing;
