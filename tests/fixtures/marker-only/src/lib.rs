//! Claims to be a backend module but stops exporting after the model type.

use std::ffi::c_char;

#[no_mangle]
pub extern "C" fn is_g4a_backend_model_implementation(_: u32) -> bool {
    true
}

#[no_mangle]
pub extern "C" fn get_model_type() -> *const c_char {
    b"Partial\0".as_ptr().cast()
}
