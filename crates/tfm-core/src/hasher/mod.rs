pub mod sha256;

pub use sha256::{full_hash, partial_hash};
