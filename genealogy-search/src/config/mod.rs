//! Configuration and dependency initialization.

mod dependencies;
mod settings;

pub use dependencies::{Collaborators, Dependencies};
pub use settings::{BlobStoreSettings, Settings};
