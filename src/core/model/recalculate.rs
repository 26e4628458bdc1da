use super::{LlModel, PromptContext};

/// How a context recalculation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecalculateOutcome {
    /// Every token was replayed; `n_past == tokens.len()`.
    Completed,
    /// The progress callback asked to stop.
    Cancelled,
    /// The engine rejected a batch; `n_past` covers the batches before it.
    Failed,
}

enum State {
    Running,
    Stopped(RecalculateOutcome),
}

/// Rebuilds engine state by replaying `ctx.tokens` from position zero.
///
/// Tokens are submitted in chunks of at most `ctx.n_batch`. After every
/// successful chunk `recalculate(true)` is called and may return `false` to
/// cancel. Whatever the outcome, `recalculate(false)` is called exactly once
/// when the loop stops.
///
/// # Panics
///
/// Panics if `ctx.n_batch` is zero or if a chunk would overflow `ctx.n_ctx`.
pub fn recalculate_context<M, F>(
    model: &mut M,
    ctx: &mut PromptContext,
    mut recalculate: F,
) -> RecalculateOutcome
where
    M: LlModel + ?Sized,
    F: FnMut(bool) -> bool,
{
    assert!(ctx.n_batch > 0, "n_batch must be positive");

    ctx.n_past = 0;
    let mut state = State::Running;

    let outcome = loop {
        if let State::Stopped(outcome) = state {
            break outcome;
        }

        if ctx.n_past >= ctx.tokens.len() {
            debug_assert_eq!(ctx.n_past, ctx.tokens.len());
            state = State::Stopped(RecalculateOutcome::Completed);
            continue;
        }

        let batch_end = (ctx.n_past + ctx.n_batch).min(ctx.tokens.len());
        let batch = &ctx.tokens[ctx.n_past..batch_end];
        let n_tokens = batch.len();
        assert!(
            ctx.n_past + n_tokens <= ctx.n_ctx,
            "batch of {} tokens at n_past {} overflows n_ctx {}",
            n_tokens,
            ctx.n_past,
            ctx.n_ctx
        );

        state = match model.eval_tokens(ctx.n_past, batch) {
            Err(err) => {
                tracing::error!(error = %err, n_past = ctx.n_past, "failed to process prompt");
                State::Stopped(RecalculateOutcome::Failed)
            }
            Ok(()) => {
                ctx.n_past += n_tokens;
                if recalculate(true) {
                    State::Running
                } else {
                    State::Stopped(RecalculateOutcome::Cancelled)
                }
            }
        };
    };

    recalculate(false);
    outcome
}
