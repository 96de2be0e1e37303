//! Persisted resource state.
//!
//! Each resource instance is recorded as an ID plus a flat key/value map
//! (see [`flatmap`]). The [`StateFile`] helper reads and writes one
//! instance as JSON for the command-line surface.

pub mod flatmap;
mod file;
mod types;

pub use file::StateFile;
pub use types::{InstanceState, STATE_VERSION};
