use super::abi::RawEngine;
use super::implementation::Implementation;
use crate::core::{BackendError, LlModel, Result, TokenId};
use std::ffi::CString;
use std::path::Path;

/// An engine built by a backend module, driven through its [`RawEngine`] table.
pub struct DylibModel<'a> {
    raw: RawEngine,
    implementation: &'a Implementation,
}

impl<'a> DylibModel<'a> {
    pub(crate) fn new(raw: RawEngine, implementation: &'a Implementation) -> Self {
        Self {
            raw,
            implementation,
        }
    }

    /// The implementation this engine was constructed from.
    pub fn implementation(&self) -> &'a Implementation {
        self.implementation
    }
}

impl LlModel for DylibModel<'_> {
    fn load_model(&mut self, model_path: &Path) -> Result<()> {
        let model_error = || BackendError::ModelLoad {
            path: model_path.to_path_buf(),
        };
        let c_path = model_path
            .to_str()
            .and_then(|path| CString::new(path).ok())
            .ok_or_else(model_error)?;

        if unsafe { (self.raw.load_model)(self.raw.instance, c_path.as_ptr()) } {
            Ok(())
        } else {
            Err(model_error())
        }
    }

    fn is_model_loaded(&self) -> bool {
        unsafe { (self.raw.is_model_loaded)(self.raw.instance) }
    }

    fn eval_tokens(&mut self, n_past: usize, tokens: &[TokenId]) -> Result<()> {
        let ok = unsafe {
            (self.raw.eval_tokens)(
                self.raw.instance,
                n_past,
                tokens.as_ptr().cast(),
                tokens.len(),
            )
        };
        if ok {
            Ok(())
        } else {
            Err(BackendError::Evaluation {
                n_past,
                n_tokens: tokens.len(),
            })
        }
    }
}

impl Drop for DylibModel<'_> {
    fn drop(&mut self) {
        unsafe { (self.raw.destroy)(self.raw.instance) }
    }
}
