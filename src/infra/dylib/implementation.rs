use super::abi::{
    ConstructFn, GetBuildVariantFn, GetModelTypeFn, IsImplementationFn, MagicMatchFn, RawStream,
    ReadSeek, BUILD_VARIANT_SYMBOL, CONSTRUCT_SYMBOL, IS_IMPLEMENTATION_SYMBOL,
    MAGIC_MATCH_SYMBOL, MODEL_TYPE_SYMBOL,
};
use super::handle::Dlhandle;
use super::model::DylibModel;
use crate::core::{BackendError, Result};
use std::ffi::{c_char, CStr};
use std::fmt;
use std::path::{Path, PathBuf};

/// The four entry points a backend module provides.
#[derive(Debug, Clone, Copy)]
pub struct Capabilities {
    pub get_model_type: GetModelTypeFn,
    pub get_build_variant: GetBuildVariantFn,
    pub magic_match: MagicMatchFn,
    pub construct: ConstructFn,
}

impl Capabilities {
    /// Resolves every capability from `handle`, or names the first missing one.
    fn resolve(handle: &Dlhandle) -> std::result::Result<Self, &'static str> {
        // SAFETY: the aliases mirror the module ABI; the pointers are only
        // stored next to the handle that keeps them valid.
        unsafe {
            Ok(Self {
                get_model_type: handle
                    .get::<GetModelTypeFn>(MODEL_TYPE_SYMBOL)
                    .ok_or(MODEL_TYPE_SYMBOL)?,
                get_build_variant: handle
                    .get::<GetBuildVariantFn>(BUILD_VARIANT_SYMBOL)
                    .ok_or(BUILD_VARIANT_SYMBOL)?,
                magic_match: handle
                    .get::<MagicMatchFn>(MAGIC_MATCH_SYMBOL)
                    .ok_or(MAGIC_MATCH_SYMBOL)?,
                construct: handle
                    .get::<ConstructFn>(CONSTRUCT_SYMBOL)
                    .ok_or(CONSTRUCT_SYMBOL)?,
            })
        }
    }
}

/// A validated backend module and its resolved capabilities.
///
/// Not `Clone`: the module has a single owner and is unloaded when the
/// implementation is dropped. Engines borrow the implementation that built them.
pub struct Implementation {
    model_type: String,
    build_variant: String,
    magic_match: MagicMatchFn,
    construct: ConstructFn,
    // Dropped last so the function pointers above never outlive the library.
    handle: Option<Dlhandle>,
}

impl Implementation {
    /// Checks for the marker export without resolving anything else.
    pub fn is_implementation(handle: &Dlhandle) -> bool {
        // SAFETY: only the presence of the symbol is inspected.
        unsafe { handle.get::<IsImplementationFn>(IS_IMPLEMENTATION_SYMBOL) }.is_some()
    }

    /// Takes ownership of `handle` and resolves its capabilities.
    ///
    /// On failure the handle is dropped and the module unloaded.
    pub fn from_handle(handle: Dlhandle) -> Result<Self> {
        let capabilities =
            Capabilities::resolve(&handle).map_err(|symbol| BackendError::MissingCapability {
                path: handle.path().to_path_buf(),
                symbol,
            })?;
        let path = handle.path().to_path_buf();
        Self::with_capabilities(capabilities, Some(handle), path)
    }

    /// Wraps entry points linked into the current process.
    ///
    /// # Safety
    ///
    /// Every entry point must follow the module ABI for as long as the
    /// implementation lives: the tag getters return null or a NUL-terminated
    /// string, `magic_match` only uses the stream it is handed, and
    /// `construct` returns a [`RawEngine`](super::RawEngine) whose entry
    /// points are valid for its `instance`.
    ///
    /// ```compile_fail
    /// use llmodel::{Capabilities, Implementation};
    ///
    /// fn wrap(capabilities: Capabilities) -> llmodel::Result<Implementation> {
    ///     Implementation::builtin(capabilities)
    /// }
    /// ```
    pub unsafe fn builtin(capabilities: Capabilities) -> Result<Self> {
        Self::with_capabilities(capabilities, None, PathBuf::from("<builtin>"))
    }

    fn with_capabilities(
        capabilities: Capabilities,
        handle: Option<Dlhandle>,
        path: PathBuf,
    ) -> Result<Self> {
        // SAFETY: both getters take no arguments and return static strings.
        let model_type = unsafe { read_tag((capabilities.get_model_type)()) }.ok_or(
            BackendError::MissingCapability {
                path: path.clone(),
                symbol: MODEL_TYPE_SYMBOL,
            },
        )?;
        let build_variant = unsafe { read_tag((capabilities.get_build_variant)()) }.ok_or(
            BackendError::MissingCapability {
                path,
                symbol: BUILD_VARIANT_SYMBOL,
            },
        )?;

        Ok(Self {
            model_type,
            build_variant,
            magic_match: capabilities.magic_match,
            construct: capabilities.construct,
            handle,
        })
    }

    pub fn model_type(&self) -> &str {
        &self.model_type
    }

    pub fn build_variant(&self) -> &str {
        &self.build_variant
    }

    /// Location of the module file; `None` for builtin implementations.
    pub fn path(&self) -> Option<&Path> {
        self.handle.as_ref().map(Dlhandle::path)
    }

    /// Asks the module whether it recognizes the stream's format.
    ///
    /// Reads from the current position; callers rewind beforehand.
    pub fn magic_match(&self, reader: &mut dyn ReadSeek) -> bool {
        let mut reader = reader;
        let mut stream = RawStream::borrowed(&mut reader);
        // SAFETY: `stream` outlives the call and the pointer is valid while
        // `self.handle` is alive.
        unsafe { (self.magic_match)(&mut stream) }
    }

    /// Builds a fresh engine. The engine borrows `self`.
    pub fn construct(&self) -> Result<DylibModel<'_>> {
        // SAFETY: valid while `self.handle` is alive; the returned engine
        // borrows `self` for its whole lifetime.
        let raw = unsafe { (self.construct)() };
        if raw.is_null() {
            return Err(BackendError::ConstructionFailed {
                model_type: self.model_type.clone(),
                build_variant: self.build_variant.clone(),
            });
        }
        Ok(DylibModel::new(raw, self))
    }
}

impl fmt::Debug for Implementation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Implementation")
            .field("model_type", &self.model_type)
            .field("build_variant", &self.build_variant)
            .field("path", &self.path())
            .finish()
    }
}

unsafe fn read_tag(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    Some(CStr::from_ptr(ptr).to_string_lossy().into_owned())
}
