pub mod backend;
pub mod config;
pub mod env;
pub mod error;
pub mod globals;
pub mod restore;
pub mod secrets;

pub use backend::{ActiveBackend, BackendKind, BackendSpec, PRECEDENCE, Variant};
pub use error::{Error, ErrorKind, Result};
pub use globals::GlobalConfig;
