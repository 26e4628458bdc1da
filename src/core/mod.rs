pub mod error;
pub mod model;

pub use error::BackendError;
pub use model::{recalculate_context, LlModel, PromptContext, RecalculateOutcome, TokenId};

pub type Result<T> = std::result::Result<T, BackendError>;
