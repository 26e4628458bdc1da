use super::{recalculate_context, PromptContext, RecalculateOutcome, TokenId};
use crate::core::Result;
use std::path::Path;

/// The engine surface handed out by a backend implementation.
///
/// Instances returned by [`Implementation::construct`](crate::infra::dylib::Implementation::construct)
/// borrow the implementation they came from, so a module cannot be unloaded
/// while one of its engines is still alive.
pub trait LlModel {
    fn load_model(&mut self, model_path: &Path) -> Result<()>;

    fn is_model_loaded(&self) -> bool;

    /// Folds `tokens` into the engine state, starting at position `n_past`.
    fn eval_tokens(&mut self, n_past: usize, tokens: &[TokenId]) -> Result<()>;

    /// Replays `ctx.tokens` in `ctx.n_batch` sized chunks. See [`recalculate_context`].
    fn recalculate_context(
        &mut self,
        ctx: &mut PromptContext,
        recalculate: &mut dyn FnMut(bool) -> bool,
    ) -> RecalculateOutcome {
        recalculate_context(self, ctx, recalculate)
    }
}
