//! Storage for uploaded media.

mod local;

pub use local::LocalMediaStorage;
