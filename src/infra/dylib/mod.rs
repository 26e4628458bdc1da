//! Discovery and dispatch of dynamically loaded backend modules.

pub mod abi;
mod handle;
mod implementation;
mod model;
mod registry;

pub use abi::{RawEngine, RawStream, ReadSeek};
pub use handle::Dlhandle;
pub use implementation::{Capabilities, Implementation};
pub use model::DylibModel;
pub use registry::{
    construct, implementation_list, DylibLoader, ImplementationRegistry, ModuleLoader,
};
