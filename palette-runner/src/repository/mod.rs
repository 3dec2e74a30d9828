//! Repository layer
//!
//! Repositories are thin, stateless wrappers around the two remote systems
//! a run talks to: object storage and the palette service. They carry no
//! business logic.
//!
//! All repositories are trait-based so tests can substitute them.

mod generator;
mod storage;

// Re-export traits
pub use generator::PaletteGenerator;
pub use storage::ObjectStorage;

// Re-export implementations
pub use generator::HttpPaletteGenerator;
pub use storage::S3ObjectStorage;
