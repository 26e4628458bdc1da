use crate::core::{BackendError, Result};
use libloading::Library;
use std::path::{Path, PathBuf};

/// An open dynamic library. Dropping it unloads the library.
pub struct Dlhandle {
    library: Library,
    path: PathBuf,
}

impl Dlhandle {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        // SAFETY: loading runs the library's initializers. Candidates come from
        // directories the operator configured for backend modules.
        let library = unsafe { Library::new(&path) }.map_err(|source| BackendError::ModuleLoad {
            path: path.clone(),
            source,
        })?;

        Ok(Self { library, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolves the exported symbol `name` as a `T`, usually a function pointer.
    ///
    /// # Safety
    ///
    /// `T` must match the symbol's real signature, and the returned value must
    /// not be used after this handle is dropped.
    pub unsafe fn get<T: Copy>(&self, name: &str) -> Option<T> {
        self.library.get::<T>(name.as_bytes()).ok().map(|symbol| *symbol)
    }
}

impl Drop for Dlhandle {
    fn drop(&mut self) {
        tracing::debug!(path = %self.path.display(), "unloading module");
    }
}

impl std::fmt::Debug for Dlhandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dlhandle").field("path", &self.path).finish()
    }
}
