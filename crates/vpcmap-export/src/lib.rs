//! Text renderings of a finished graph for external visualizers.

pub mod export;

pub use export::{ExportFormat, export, export_dot, export_mermaid};
