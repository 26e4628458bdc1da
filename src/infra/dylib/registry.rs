use super::handle::Dlhandle;
use super::implementation::Implementation;
use crate::core::{BackendError, LlModel, Result};
use crate::discover::resolve_build_variant;
use crate::envconfig::EnvConfig;
use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::ffi::OsStr;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

/// Turns a candidate file into an implementation.
///
/// `Ok(None)` means the file is a valid library that is not a backend module.
pub trait ModuleLoader {
    fn load(&self, path: &Path) -> Result<Option<Implementation>>;
}

/// Loads candidates as native dynamic libraries.
#[derive(Debug, Default, Clone, Copy)]
pub struct DylibLoader;

impl ModuleLoader for DylibLoader {
    fn load(&self, path: &Path) -> Result<Option<Implementation>> {
        let handle = Dlhandle::open(path)?;
        if !Implementation::is_implementation(&handle) {
            return Ok(None);
        }
        Implementation::from_handle(handle).map(Some)
    }
}

/// Every backend implementation found at startup, in discovery order.
#[derive(Debug, Default)]
pub struct ImplementationRegistry {
    implementations: Vec<Implementation>,
}

impl ImplementationRegistry {
    /// Scans the directories named by `config` with the native loader.
    pub fn discover(config: &EnvConfig) -> Self {
        Self::scan(&config.search_paths(), &DylibLoader)
    }

    /// Scans `dirs` in order for files with the platform library extension.
    ///
    /// Modules that fail to load or are not implementations are skipped; an
    /// unreadable directory is skipped as a whole.
    pub fn scan<P: AsRef<Path>>(dirs: &[P], loader: &dyn ModuleLoader) -> Self {
        let mut implementations = Vec::new();
        for dir in dirs {
            search_in_directory(dir.as_ref(), loader, &mut implementations);
        }

        let mut seen = HashSet::new();
        for implementation in &implementations {
            if !seen.insert((implementation.model_type(), implementation.build_variant())) {
                tracing::warn!(
                    model_type = implementation.model_type(),
                    build_variant = implementation.build_variant(),
                    path = ?implementation.path(),
                    "duplicate implementation, the earlier one takes precedence"
                );
            }
        }

        tracing::info!(count = implementations.len(), "backend implementations discovered");
        Self { implementations }
    }

    pub fn from_implementations(implementations: Vec<Implementation>) -> Self {
        Self { implementations }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Implementation> {
        self.implementations.iter()
    }

    pub fn len(&self) -> usize {
        self.implementations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.implementations.is_empty()
    }

    /// Distinct build variants, in first-seen order.
    pub fn variants(&self) -> Vec<&str> {
        let mut variants: Vec<&str> = Vec::new();
        for implementation in &self.implementations {
            if !variants.contains(&implementation.build_variant()) {
                variants.push(implementation.build_variant());
            }
        }
        variants
    }

    /// First implementation that recognizes `file` and was built as `build_variant`.
    ///
    /// The file is rewound before every probe. `build_variant` is compared
    /// verbatim; resolve `"auto"` before calling.
    pub fn implementation<R: Read + Seek>(
        &self,
        file: &mut R,
        build_variant: &str,
    ) -> Option<&Implementation> {
        for implementation in &self.implementations {
            if let Err(err) = file.seek(SeekFrom::Start(0)) {
                tracing::warn!(error = %err, "failed to rewind model file");
                continue;
            }
            if !implementation.magic_match(file) {
                continue;
            }
            if implementation.build_variant() != build_variant {
                continue;
            }
            return Some(implementation);
        }
        None
    }

    /// Opens `model_path`, selects an implementation for it and constructs an engine.
    ///
    /// `"auto"` picks the variant for the host CPU. The returned engine is not
    /// loaded yet; call [`LlModel::load_model`] on it.
    pub fn construct<P: AsRef<Path>>(
        &self,
        model_path: P,
        build_variant: &str,
    ) -> Result<Box<dyn LlModel + '_>> {
        let model_path = model_path.as_ref();
        let build_variant = resolve_build_variant(build_variant);

        let mut file = File::open(model_path).map_err(|source| {
            BackendError::ModelFileUnreadable {
                path: model_path.to_path_buf(),
                source,
            }
        })?;

        let implementation = self.implementation(&mut file, &build_variant).ok_or_else(|| {
            BackendError::NoCompatibleImplementation {
                path: model_path.to_path_buf(),
                variant: build_variant.to_string(),
            }
        })?;
        drop(file);

        tracing::info!(
            model = %model_path.display(),
            model_type = implementation.model_type(),
            build_variant = implementation.build_variant(),
            "selected backend implementation"
        );
        Ok(Box::new(implementation.construct()?))
    }
}

impl<'a> IntoIterator for &'a ImplementationRegistry {
    type Item = &'a Implementation;
    type IntoIter = std::slice::Iter<'a, Implementation>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

fn search_in_directory(dir: &Path, loader: &dyn ModuleLoader, out: &mut Vec<Implementation>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            tracing::warn!(dir = %dir.display(), error = %err, "cannot scan for implementations");
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension() != Some(OsStr::new(std::env::consts::DLL_EXTENSION)) {
            continue;
        }

        match loader.load(&path) {
            Ok(Some(implementation)) => {
                tracing::info!(
                    path = %path.display(),
                    model_type = implementation.model_type(),
                    build_variant = implementation.build_variant(),
                    "found backend implementation"
                );
                out.push(implementation);
            }
            Ok(None) => {
                tracing::debug!(path = %path.display(), "not a backend implementation");
            }
            Err(err @ BackendError::MissingCapability { .. }) => {
                tracing::warn!(error = %err, "skipping incomplete implementation");
            }
            Err(err) => {
                tracing::debug!(error = %err, "skipping module");
            }
        }
    }
}

// Never dropped: modules stay loaded until the process exits, so engines
// released during shutdown still find their code mapped.
static REGISTRY: Lazy<ImplementationRegistry> =
    Lazy::new(|| ImplementationRegistry::discover(&EnvConfig::from_env()));

/// The process-wide registry, discovered on first use.
pub fn implementation_list() -> &'static ImplementationRegistry {
    &REGISTRY
}

/// [`ImplementationRegistry::construct`] over the process-wide registry.
pub fn construct<P: AsRef<Path>>(model_path: P, build_variant: &str) -> Result<Box<dyn LlModel>> {
    implementation_list().construct(model_path, build_variant)
}
