pub mod dylib;

pub use dylib::{Implementation, ImplementationRegistry};
