// Common infrastructure shared across layers

pub mod credentials;
pub mod error;

pub use error::{ErrorKind, SyncError};
