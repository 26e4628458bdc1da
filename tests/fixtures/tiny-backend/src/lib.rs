//! A backend module recognizing files that start with `TINY`.

use llmodel::infra::dylib::RawStream;
use llmodel::{BackendError, LlModel, Result, TokenId};
use std::io::Read;
use std::path::Path;

#[derive(Default)]
struct TinyEngine {
    loaded: bool,
    n_past: usize,
}

impl LlModel for TinyEngine {
    fn load_model(&mut self, model_path: &Path) -> Result<()> {
        if !model_path.exists() {
            return Err(BackendError::ModelLoad {
                path: model_path.to_path_buf(),
            });
        }
        self.loaded = true;
        Ok(())
    }

    fn is_model_loaded(&self) -> bool {
        self.loaded
    }

    fn eval_tokens(&mut self, n_past: usize, tokens: &[TokenId]) -> Result<()> {
        if !self.loaded || n_past != self.n_past || tokens.contains(&TokenId(-1)) {
            return Err(BackendError::Evaluation {
                n_past,
                n_tokens: tokens.len(),
            });
        }
        self.n_past += tokens.len();
        Ok(())
    }
}

fn is_tiny(stream: &mut RawStream) -> bool {
    let mut magic = [0u8; 4];
    stream.read_exact(&mut magic).is_ok() && &magic == b"TINY"
}

llmodel::export_backend! {
    model_type: "Tiny",
    build_variant: "default",
    magic_match: is_tiny,
    construct: TinyEngine::default(),
}
