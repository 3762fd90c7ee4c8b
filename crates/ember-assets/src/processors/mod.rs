//! Built-in container processors.

pub mod archive;
pub mod datpal;
pub mod directory;

pub use archive::ArchiveProcessor;
pub use datpal::DatPalProcessor;
pub use directory::DirectoryProcessor;
