use llmodel::infra::dylib::RawStream;
use llmodel::{
    BackendError, Capabilities, Implementation, ImplementationRegistry, LlModel, PromptContext,
    RecalculateOutcome, Result, TokenId,
};
use std::io::{Read, Write};
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
        if !self.loaded || n_past != self.n_past {
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

fn exported() -> Implementation {
    assert!(is_g4a_backend_model_implementation(0));
    let capabilities = Capabilities {
        get_model_type,
        get_build_variant,
        magic_match,
        construct,
    };
    // SAFETY: generated by `export_backend!`, which follows the module ABI.
    unsafe { Implementation::builtin(capabilities) }.unwrap()
}

fn model_file(contents: &[u8]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents).unwrap();
    file
}

#[test]
fn test_exported_tags() {
    let implementation = exported();
    assert_eq!(implementation.model_type(), "Tiny");
    assert_eq!(implementation.build_variant(), "default");
}

#[test]
fn test_exported_engine_round_trip() {
    let registry = ImplementationRegistry::from_implementations(vec![exported()]);
    let file = model_file(b"TINY\x01\x00");

    let mut engine = registry.construct(file.path(), "default").unwrap();
    assert!(!engine.is_model_loaded());
    engine.load_model(file.path()).unwrap();
    assert!(engine.is_model_loaded());

    let mut ctx = PromptContext::new(32).with_tokens(1..=10).with_batch_size(3);
    let mut progress = 0;
    let outcome = engine.recalculate_context(&mut ctx, &mut |more| {
        if more {
            progress += 1;
        }
        true
    });

    assert_eq!(outcome, RecalculateOutcome::Completed);
    assert_eq!(progress, 4);
    assert_eq!(ctx.n_past, 10);
}

#[test]
fn test_exported_engine_reports_evaluation_failure() {
    let registry = ImplementationRegistry::from_implementations(vec![exported()]);
    let file = model_file(b"TINY");

    // Never loaded, so the first batch is rejected.
    let mut engine = registry.construct(file.path(), "default").unwrap();
    let mut ctx = PromptContext::new(32).with_tokens([1, 2, 3]).with_batch_size(2);
    let mut finals = 0;
    let outcome = engine.recalculate_context(&mut ctx, &mut |more| {
        if !more {
            finals += 1;
        }
        true
    });

    assert_eq!(outcome, RecalculateOutcome::Failed);
    assert_eq!(ctx.n_past, 0);
    assert_eq!(finals, 1);
}

#[test]
fn test_exported_engine_rejects_missing_model() {
    let registry = ImplementationRegistry::from_implementations(vec![exported()]);
    let file = model_file(b"TINY");

    let mut engine = registry.construct(file.path(), "default").unwrap();
    let err = engine.load_model(Path::new("/nonexistent/tiny.bin")).unwrap_err();
    assert!(matches!(err, BackendError::ModelLoad { .. }));
}

#[test]
fn test_exported_magic_rejects_other_formats() {
    let registry = ImplementationRegistry::from_implementations(vec![exported()]);
    let file = model_file(b"GGUF\x03\x00\x00\x00");

    let err = registry.construct(file.path(), "default").err().unwrap();
    assert!(matches!(err, BackendError::NoCompatibleImplementation { .. }));
}
