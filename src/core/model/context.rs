use super::TokenId;
use serde::{Deserialize, Serialize};

/// Token history and window bookkeeping shared between the caller and an engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptContext {
    /// Every token folded into the engine so far, oldest first.
    pub tokens: Vec<TokenId>,
    /// Number of tokens from `tokens` already evaluated.
    pub n_past: usize,
    /// Context window size of the engine.
    pub n_ctx: usize,
    /// Maximum number of tokens per evaluation call.
    pub n_batch: usize,
    /// Fraction of the window dropped by [`PromptContext::erase_context`].
    pub context_erase: f32,
}

impl Default for PromptContext {
    fn default() -> Self {
        Self {
            tokens: Vec::new(),
            n_past: 0,
            n_ctx: 0,
            n_batch: 9,
            context_erase: 0.75,
        }
    }
}

impl PromptContext {
    pub fn new(n_ctx: usize) -> Self {
        Self {
            n_ctx,
            ..Self::default()
        }
    }

    pub fn with_tokens<I, T>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TokenId>,
    {
        self.tokens = tokens.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_batch_size(mut self, n_batch: usize) -> Self {
        self.n_batch = n_batch;
        self
    }

    pub fn with_context_erase(mut self, context_erase: f32) -> Self {
        self.context_erase = context_erase;
        self
    }

    /// Whether the whole history fits in the context window.
    pub fn fits_window(&self) -> bool {
        self.tokens.len() <= self.n_ctx
    }

    /// Drops the oldest `n_ctx * context_erase` tokens from the history.
    ///
    /// Engine state no longer matches `tokens` afterwards; the caller is
    /// expected to run a context recalculation. Returns the number of
    /// tokens removed.
    pub fn erase_context(&mut self) -> usize {
        let erase_point = (self.n_ctx as f32 * self.context_erase) as usize;
        let erased = erase_point.min(self.tokens.len());
        self.tokens.drain(..erased);
        self.n_past = self.tokens.len();
        erased
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_erase_context_drops_oldest_tokens() {
        let mut ctx = PromptContext::new(8).with_tokens(0..8);
        ctx.context_erase = 0.5;

        assert_eq!(ctx.erase_context(), 4);
        assert_eq!(ctx.tokens, vec![TokenId(4), TokenId(5), TokenId(6), TokenId(7)]);
        assert_eq!(ctx.n_past, 4);
    }

    #[test]
    fn test_erase_context_never_underflows() {
        let mut ctx = PromptContext::new(100).with_tokens([1, 2, 3]);

        assert_eq!(ctx.erase_context(), 3);
        assert!(ctx.tokens.is_empty());
    }

    #[test]
    fn test_erase_brings_overlong_history_into_window() {
        let mut ctx = PromptContext::new(8).with_tokens(0..12);
        assert!(!ctx.fits_window());

        assert_eq!(ctx.erase_context(), 6);
        assert!(ctx.fits_window());
        assert_eq!(ctx.tokens.first(), Some(&TokenId(6)));
    }

    #[test]
    fn test_zero_erase_keeps_history() {
        let mut ctx = PromptContext::new(4)
            .with_tokens([1, 2, 3, 4, 5])
            .with_context_erase(0.0);

        assert_eq!(ctx.erase_context(), 0);
        assert_eq!(ctx.tokens.len(), 5);
        assert!(!ctx.fits_window());
    }

    #[test]
    fn test_deserialize_fills_defaults() {
        let ctx: PromptContext =
            serde_json::from_str(r#"{"tokens": [5, 6], "n_ctx": 512, "n_batch": 2}"#).unwrap();
        assert_eq!(ctx.tokens, vec![TokenId(5), TokenId(6)]);
        assert_eq!(ctx.n_ctx, 512);
        assert_eq!(ctx.n_batch, 2);
        assert_eq!(ctx.context_erase, 0.75);
        assert_eq!(ctx.n_past, 0);
    }
}
