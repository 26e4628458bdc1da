//! Registry and dispatcher for dynamically loaded inference backends.
//!
//! Backend modules are discovered once per process, matched against a model
//! file by their magic probe and requested build variant, and asked to
//! construct an engine. [`recalculate_context`] replays a token history
//! through such an engine in fixed-size batches.

pub mod core;
pub mod discover;
pub mod envconfig;
pub mod infra;

pub use crate::core::{
    recalculate_context, BackendError, LlModel, PromptContext, RecalculateOutcome, Result,
    TokenId,
};

pub use crate::infra::dylib::{
    construct, implementation_list, Capabilities, DylibLoader, DylibModel, Implementation,
    ImplementationRegistry, ModuleLoader,
};
