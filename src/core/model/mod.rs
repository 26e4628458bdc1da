pub mod context;
pub mod recalculate;
pub mod traits;

pub use context::PromptContext;
pub use recalculate::{recalculate_context, RecalculateOutcome};
pub use traits::LlModel;

use serde::{Deserialize, Serialize};

/// A vocabulary index as exchanged with backend modules.
///
/// `repr(transparent)` so a `&[TokenId]` can cross the module ABI as `*const i32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct TokenId(pub i32);

impl From<i32> for TokenId {
    fn from(id: i32) -> Self {
        Self(id)
    }
}
