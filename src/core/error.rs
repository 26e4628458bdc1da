use std::path::PathBuf;
use thiserror::Error;

/// Failures surfaced by discovery, selection, construction and evaluation.
///
/// Discovery swallows `ModuleLoad` and `MissingCapability` per module; the
/// construction entry point returns `ModelFileUnreadable` and
/// `NoCompatibleImplementation` to the caller instead of aborting.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("failed to load module {}: {source}", .path.display())]
    ModuleLoad {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    #[error("module {} does not export `{symbol}`", .path.display())]
    MissingCapability { path: PathBuf, symbol: &'static str },

    #[error("cannot open model file {}: {source}", .path.display())]
    ModelFileUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no implementation can load {} with build variant `{variant}`", .path.display())]
    NoCompatibleImplementation { path: PathBuf, variant: String },

    #[error("{model_type} ({build_variant}) failed to construct an engine")]
    ConstructionFailed {
        model_type: String,
        build_variant: String,
    },

    #[error("failed to evaluate {n_tokens} tokens at n_past {n_past}")]
    Evaluation { n_past: usize, n_tokens: usize },

    #[error("failed to load model {}", .path.display())]
    ModelLoad { path: PathBuf },
}
