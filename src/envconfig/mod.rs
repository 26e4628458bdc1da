use crate::discover::AUTO_VARIANT;
use std::env;
use std::ffi::OsString;
use std::path::PathBuf;

/// Extra directories to scan for backend modules, `PATH`-style separated.
pub const IMPLEMENTATIONS_PATH_ENV: &str = "LLMODEL_IMPLEMENTATIONS_PATH";
/// Build variant used when the caller does not name one.
pub const BUILD_VARIANT_ENV: &str = "LLMODEL_BUILD_VARIANT";

#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub implementations_path: Vec<PathBuf>,
    pub build_variant: String,
}

impl EnvConfig {
    pub fn from_env() -> Self {
        Self::from_vars(
            env::var_os(IMPLEMENTATIONS_PATH_ENV),
            env::var(BUILD_VARIANT_ENV).ok(),
        )
    }

    pub fn from_vars(
        implementations_path: Option<OsString>,
        build_variant: Option<String>,
    ) -> Self {
        Self {
            implementations_path: implementations_path
                .map(|paths| {
                    env::split_paths(&paths)
                        .filter(|p| !p.as_os_str().is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            build_variant: build_variant
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| AUTO_VARIANT.to_string()),
        }
    }

    /// Directories scanned for modules, highest precedence first.
    ///
    /// Override directories come before the working directory; on macOS the
    /// app bundle root three levels up is scanned last. Duplicates are dropped.
    pub fn search_paths(&self) -> Vec<PathBuf> {
        let mut candidates = self.implementations_path.clone();
        candidates.push(PathBuf::from("."));
        #[cfg(target_os = "macos")]
        candidates.push(PathBuf::from("../../../"));

        let mut paths: Vec<PathBuf> = Vec::new();
        let mut seen = Vec::new();
        for candidate in candidates {
            let key = candidate.canonicalize().unwrap_or_else(|_| candidate.clone());
            if !seen.contains(&key) {
                seen.push(key);
                paths.push(candidate);
            }
        }
        paths
    }
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
