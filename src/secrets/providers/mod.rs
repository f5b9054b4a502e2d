//! Built-in providers.
//!
//! - **inline**: the secret is written directly in the configuration
//! - **file**: the secret is the full contents of a file, re-read on every fetch

pub mod file;
pub mod inline;

pub use file::{FileProvider, FileProviderConfig};
pub use inline::{InlineProvider, InlineProviderConfig};

/// Registry name of the inline provider.
pub const INLINE: &str = "inline";

/// Registry name of the file provider.
pub const FILE: &str = "file";
