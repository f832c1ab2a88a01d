pub mod persist;
pub mod types;

pub use persist::{atomic_read_json, atomic_write_json, PersistError};
pub use types::*;
