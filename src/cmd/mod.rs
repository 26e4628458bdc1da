use anyhow::{bail, Context, Result};
use llmodel::discover::{self, resolve_build_variant, supports_avx2};
use llmodel::{implementation_list, LlModel, PromptContext, RecalculateOutcome};
use serde_json::json;
use std::fs::File;
use std::path::Path;

pub fn list(as_json: bool) -> Result<()> {
    let registry = implementation_list();

    if as_json {
        let entries: Vec<_> = registry
            .iter()
            .map(|i| {
                json!({
                    "model_type": i.model_type(),
                    "build_variant": i.build_variant(),
                    "path": i.path().map(|p| p.display().to_string()),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if registry.is_empty() {
        println!("No backend implementations found");
        return Ok(());
    }

    println!("{:<16} {:<12} PATH", "MODEL TYPE", "VARIANT");
    for implementation in registry {
        println!(
            "{:<16} {:<12} {}",
            implementation.model_type(),
            implementation.build_variant(),
            implementation
                .path()
                .map(|p| p.display().to_string())
                .unwrap_or_default()
        );
    }
    Ok(())
}

pub fn probe(model: &Path, variant: &str) -> Result<()> {
    let variant = resolve_build_variant(variant);
    let mut file = File::open(model)
        .with_context(|| format!("cannot open model file {}", model.display()))?;

    match implementation_list().implementation(&mut file, &variant) {
        Some(implementation) => {
            println!(
                "{} can be loaded by {} ({})",
                model.display(),
                implementation.model_type(),
                implementation.build_variant()
            );
            Ok(())
        }
        None => bail!(
            "no implementation for {} with build variant `{}`",
            model.display(),
            variant
        ),
    }
}

fn load_engine(model: &Path, variant: &str) -> Result<Box<dyn LlModel>> {
    let mut engine = llmodel::construct(model, variant)?;
    engine.load_model(model)?;
    Ok(engine)
}

pub fn load(model: &Path, variant: &str) -> Result<()> {
    let engine = load_engine(model, variant)?;
    println!(
        "Loaded {} (model loaded: {})",
        model.display(),
        engine.is_model_loaded()
    );
    Ok(())
}

pub fn replay(
    model: &Path,
    variant: &str,
    tokens: Vec<i32>,
    n_batch: usize,
    n_ctx: usize,
    context_erase: f32,
) -> Result<()> {
    if n_batch == 0 {
        bail!("--batch must be at least 1");
    }

    let mut ctx = PromptContext::new(n_ctx)
        .with_tokens(tokens)
        .with_batch_size(n_batch)
        .with_context_erase(context_erase);
    if !ctx.fits_window() {
        let erased = ctx.erase_context();
        tracing::info!(erased, n_ctx, "history exceeds the context window");
    }
    if !ctx.fits_window() {
        bail!("{} tokens do not fit in a context of {}", ctx.tokens.len(), n_ctx);
    }

    let mut engine = load_engine(model, variant)?;
    let total = ctx.tokens.len();

    let mut batches = 0usize;
    let outcome = engine.recalculate_context(&mut ctx, &mut |more| {
        if more {
            batches += 1;
            eprint!("\rRecalculating context: batch {}", batches);
        } else {
            eprintln!();
        }
        true
    });

    match outcome {
        RecalculateOutcome::Completed => {
            println!("Replayed {} tokens in {} batches", total, batches);
            Ok(())
        }
        RecalculateOutcome::Cancelled => bail!("recalculation cancelled at n_past {}", ctx.n_past),
        RecalculateOutcome::Failed => bail!("evaluation failed at n_past {}", ctx.n_past),
    }
}

pub fn cpu() -> Result<()> {
    println!("Arch: {}", std::env::consts::ARCH);
    println!("  AVX2: {}", if supports_avx2() { "yes" } else { "no" });
    println!(
        "  auto variant: {}",
        resolve_build_variant(discover::AUTO_VARIANT)
    );
    Ok(())
}
