pub mod export_use_case;
pub mod import_use_case;

pub use export_use_case::{ExportUseCase, ExportedDocument};
pub use import_use_case::ImportEngine;
