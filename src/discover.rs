/// Requests the variant matching the host CPU.
pub const AUTO_VARIANT: &str = "auto";
/// Built with AVX2 and the rest of the extended vector set.
pub const DEFAULT_VARIANT: &str = "default";
/// Conservative build for hosts without AVX2.
pub const AVX_ONLY_VARIANT: &str = "avxonly";

/// Whether the host runs the extended vector set the default variant is built for.
///
/// Always false off x86_64.
pub fn supports_avx2() -> bool {
    #[cfg(target_arch = "x86_64")]
    {
        std::arch::is_x86_feature_detected!("avx2")
    }
    #[cfg(not(target_arch = "x86_64"))]
    {
        false
    }
}

/// Replaces `"auto"` with the variant for this host; other names pass through.
pub fn resolve_build_variant(requested: &str) -> &str {
    resolve_build_variant_for(requested, supports_avx2())
}

pub fn resolve_build_variant_for(requested: &str, avx2: bool) -> &str {
    if requested != AUTO_VARIANT {
        return requested;
    }
    let resolved = if avx2 { DEFAULT_VARIANT } else { AVX_ONLY_VARIANT };
    tracing::debug!(build_variant = resolved, "resolved auto build variant");
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_resolves_by_capability() {
        assert_eq!(resolve_build_variant_for("auto", true), "default");
        assert_eq!(resolve_build_variant_for("auto", false), "avxonly");
    }

    #[test]
    fn test_auto_never_survives_resolution() {
        let resolved = resolve_build_variant("auto");
        assert!(resolved == DEFAULT_VARIANT || resolved == AVX_ONLY_VARIANT);
        assert_eq!(resolved == DEFAULT_VARIANT, supports_avx2());
    }

    #[test]
    fn test_explicit_variants_pass_through() {
        for variant in ["default", "avxonly", "cuda", "Auto", ""] {
            assert_eq!(resolve_build_variant_for(variant, true), variant);
            assert_eq!(resolve_build_variant_for(variant, false), variant);
        }
    }
}
