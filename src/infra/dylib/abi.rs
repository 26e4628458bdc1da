//! The C ABI every backend module exports.
//!
//! A module is a dynamic library exporting five unmangled functions:
//!
//! | symbol                                 | signature                       |
//! |----------------------------------------|---------------------------------|
//! | `is_g4a_backend_model_implementation`  | `fn(u32) -> bool`               |
//! | `get_model_type`                       | `fn() -> *const c_char`         |
//! | `get_build_variant`                    | `fn() -> *const c_char`         |
//! | `magic_match`                          | `fn(*mut RawStream) -> bool`    |
//! | `construct`                            | `fn() -> RawEngine`             |
//!
//! Rust modules can generate all of them with [`export_backend!`](crate::export_backend).

use crate::core::{LlModel, TokenId};
use std::ffi::{c_char, c_int, c_void, CStr};
use std::io::{self, Read, Seek, SeekFrom};
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

pub const IS_IMPLEMENTATION_SYMBOL: &str = "is_g4a_backend_model_implementation";
pub const MODEL_TYPE_SYMBOL: &str = "get_model_type";
pub const BUILD_VARIANT_SYMBOL: &str = "get_build_variant";
pub const MAGIC_MATCH_SYMBOL: &str = "magic_match";
pub const CONSTRUCT_SYMBOL: &str = "construct";

pub type IsImplementationFn = unsafe extern "C" fn(u32) -> bool;
pub type GetModelTypeFn = unsafe extern "C" fn() -> *const c_char;
pub type GetBuildVariantFn = unsafe extern "C" fn() -> *const c_char;
pub type MagicMatchFn = unsafe extern "C" fn(*mut RawStream) -> bool;
pub type ConstructFn = unsafe extern "C" fn() -> RawEngine;

const WHENCE_START: c_int = 0;
const WHENCE_CURRENT: c_int = 1;
const WHENCE_END: c_int = 2;

/// Anything a model file can be probed through.
pub trait ReadSeek: Read + Seek {}

impl<T: Read + Seek> ReadSeek for T {}

/// A borrowed byte stream handed to `magic_match`.
///
/// The host builds it over its open model file; the module reads it through
/// the `Read` and `Seek` impls. Only valid for the duration of the call.
#[repr(C)]
pub struct RawStream {
    ctx: *mut c_void,
    read: unsafe extern "C" fn(ctx: *mut c_void, buf: *mut u8, len: usize) -> isize,
    seek: unsafe extern "C" fn(ctx: *mut c_void, offset: i64, whence: c_int) -> i64,
}

impl RawStream {
    pub(crate) fn borrowed(reader: &mut &mut dyn ReadSeek) -> Self {
        Self {
            ctx: reader as *mut &mut dyn ReadSeek as *mut c_void,
            read: host_read,
            seek: host_seek,
        }
    }
}

unsafe extern "C" fn host_read(ctx: *mut c_void, buf: *mut u8, len: usize) -> isize {
    if len == 0 {
        return 0;
    }
    let reader = &mut *(ctx as *mut &mut dyn ReadSeek);
    let buf = std::slice::from_raw_parts_mut(buf, len);
    match reader.read(buf) {
        Ok(n) => n as isize,
        Err(_) => -1,
    }
}

unsafe extern "C" fn host_seek(ctx: *mut c_void, offset: i64, whence: c_int) -> i64 {
    let reader = &mut *(ctx as *mut &mut dyn ReadSeek);
    let pos = match whence {
        WHENCE_START if offset >= 0 => SeekFrom::Start(offset as u64),
        WHENCE_CURRENT => SeekFrom::Current(offset),
        WHENCE_END => SeekFrom::End(offset),
        _ => return -1,
    };
    match reader.seek(pos) {
        Ok(pos) => pos as i64,
        Err(_) => -1,
    }
}

impl Read for RawStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = unsafe { (self.read)(self.ctx, buf.as_mut_ptr(), buf.len()) };
        if n < 0 {
            return Err(io::Error::other("host stream read failed"));
        }
        Ok(n as usize)
    }
}

impl Seek for RawStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let (offset, whence) = match pos {
            SeekFrom::Start(n) => (n as i64, WHENCE_START),
            SeekFrom::Current(n) => (n, WHENCE_CURRENT),
            SeekFrom::End(n) => (n, WHENCE_END),
        };
        let pos = unsafe { (self.seek)(self.ctx, offset, whence) };
        if pos < 0 {
            return Err(io::Error::other("host stream seek failed"));
        }
        Ok(pos as u64)
    }
}

pub type LoadModelFn =
    unsafe extern "C" fn(instance: *mut c_void, model_path: *const c_char) -> bool;
pub type IsModelLoadedFn = unsafe extern "C" fn(instance: *const c_void) -> bool;
pub type EvalTokensFn = unsafe extern "C" fn(
    instance: *mut c_void,
    n_past: usize,
    tokens: *const i32,
    n_tokens: usize,
) -> bool;
pub type DestroyFn = unsafe extern "C" fn(instance: *mut c_void);

/// The engine object returned by a module's `construct`.
///
/// `instance` is owned by the module and released through `destroy`. A null
/// `instance` means construction failed.
///
/// The table can only be filled through [`RawEngine::from_model`],
/// [`RawEngine::null`] or the unsafe [`RawEngine::from_raw_parts`]:
///
/// ```compile_fail
/// let mut engine = llmodel::infra::dylib::RawEngine::null();
/// engine.instance = 0x10 as *mut std::ffi::c_void;
/// ```
#[repr(C)]
pub struct RawEngine {
    pub(crate) instance: *mut c_void,
    pub(crate) load_model: LoadModelFn,
    pub(crate) is_model_loaded: IsModelLoadedFn,
    pub(crate) eval_tokens: EvalTokensFn,
    pub(crate) destroy: DestroyFn,
}

impl RawEngine {
    /// Exposes a Rust engine through the module ABI.
    pub fn from_model<M: LlModel + 'static>(model: Box<M>) -> Self {
        Self {
            instance: Box::into_raw(model).cast(),
            load_model: load_model_trampoline::<M>,
            is_model_loaded: is_model_loaded_trampoline::<M>,
            eval_tokens: eval_tokens_trampoline::<M>,
            destroy: destroy_trampoline::<M>,
        }
    }

    /// An engine with a null instance, reported by the host as a failed construction.
    pub fn null() -> Self {
        Self {
            instance: std::ptr::null_mut(),
            load_model: null_load_model,
            is_model_loaded: null_is_model_loaded,
            eval_tokens: null_eval_tokens,
            destroy: null_destroy,
        }
    }

    /// Assembles a table for an engine that is not a Rust [`LlModel`].
    ///
    /// # Safety
    ///
    /// `instance` must be null or stay valid for every entry point until
    /// `destroy` is called on it. The entry points must follow the module ABI:
    /// `tokens` points to `n_tokens` ids and `model_path` is NUL-terminated.
    pub unsafe fn from_raw_parts(
        instance: *mut c_void,
        load_model: LoadModelFn,
        is_model_loaded: IsModelLoadedFn,
        eval_tokens: EvalTokensFn,
        destroy: DestroyFn,
    ) -> Self {
        Self {
            instance,
            load_model,
            is_model_loaded,
            eval_tokens,
            destroy,
        }
    }

    pub fn is_null(&self) -> bool {
        self.instance.is_null()
    }
}

// Panics must not unwind into the host; they surface as a failed call.
fn guard<T>(what: &str, fallback: T, f: impl FnOnce() -> T) -> T {
    panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|_| {
        tracing::error!(entry = what, "backend panicked");
        fallback
    })
}

unsafe extern "C" fn load_model_trampoline<M: LlModel>(
    instance: *mut c_void,
    model_path: *const c_char,
) -> bool {
    if model_path.is_null() {
        return false;
    }
    let model = &mut *(instance as *mut M);
    let Ok(path) = CStr::from_ptr(model_path).to_str() else {
        return false;
    };
    guard("load_model", false, || match model.load_model(Path::new(path)) {
        Ok(()) => true,
        Err(err) => {
            tracing::error!(error = %err, "backend failed to load model");
            false
        }
    })
}

unsafe extern "C" fn is_model_loaded_trampoline<M: LlModel>(instance: *const c_void) -> bool {
    let model = &*(instance as *const M);
    guard("is_model_loaded", false, || model.is_model_loaded())
}

unsafe extern "C" fn eval_tokens_trampoline<M: LlModel>(
    instance: *mut c_void,
    n_past: usize,
    tokens: *const i32,
    n_tokens: usize,
) -> bool {
    let model = &mut *(instance as *mut M);
    let tokens: &[TokenId] = if n_tokens == 0 {
        &[]
    } else {
        std::slice::from_raw_parts(tokens.cast(), n_tokens)
    };
    guard("eval_tokens", false, || match model.eval_tokens(n_past, tokens) {
        Ok(()) => true,
        Err(err) => {
            tracing::error!(error = %err, "backend failed to evaluate tokens");
            false
        }
    })
}

unsafe extern "C" fn destroy_trampoline<M: LlModel>(instance: *mut c_void) {
    if !instance.is_null() {
        let model = Box::from_raw(instance as *mut M);
        guard("destroy", (), || drop(model));
    }
}

unsafe extern "C" fn null_load_model(_: *mut c_void, _: *const c_char) -> bool {
    false
}

unsafe extern "C" fn null_is_model_loaded(_: *const c_void) -> bool {
    false
}

unsafe extern "C" fn null_eval_tokens(_: *mut c_void, _: usize, _: *const i32, _: usize) -> bool {
    false
}

unsafe extern "C" fn null_destroy(_: *mut c_void) {}

/// Exports the backend module ABI from a Rust `cdylib`.
///
/// ```ignore
/// fn is_gguf(stream: &mut llmodel::infra::dylib::RawStream) -> bool {
///     let mut magic = [0u8; 4];
///     std::io::Read::read_exact(stream, &mut magic).is_ok() && &magic == b"GGUF"
/// }
///
/// llmodel::export_backend! {
///     model_type: "LLaMA",
///     build_variant: "default",
///     magic_match: is_gguf,
///     construct: LlamaEngine::default(),
/// }
/// ```
#[macro_export]
macro_rules! export_backend {
    (
        model_type: $model_type:literal,
        build_variant: $build_variant:literal,
        magic_match: $magic_match:path,
        construct: $construct:expr $(,)?
    ) => {
        #[no_mangle]
        pub extern "C" fn is_g4a_backend_model_implementation(_: u32) -> bool {
            true
        }

        #[no_mangle]
        pub extern "C" fn get_model_type() -> *const ::std::ffi::c_char {
            concat!($model_type, "\0").as_ptr().cast()
        }

        #[no_mangle]
        pub extern "C" fn get_build_variant() -> *const ::std::ffi::c_char {
            concat!($build_variant, "\0").as_ptr().cast()
        }

        #[no_mangle]
        pub unsafe extern "C" fn magic_match(stream: *mut $crate::infra::dylib::RawStream) -> bool {
            match stream.as_mut() {
                Some(stream) => ::std::panic::catch_unwind(::std::panic::AssertUnwindSafe(|| {
                    $magic_match(stream)
                }))
                .unwrap_or(false),
                None => false,
            }
        }

        #[no_mangle]
        pub extern "C" fn construct() -> $crate::infra::dylib::RawEngine {
            ::std::panic::catch_unwind(::std::panic::AssertUnwindSafe(|| {
                $crate::infra::dylib::RawEngine::from_model(::std::boxed::Box::new($construct))
            }))
            .unwrap_or_else(|_| $crate::infra::dylib::RawEngine::null())
        }
    };
}
