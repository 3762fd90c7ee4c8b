//! Test utilities for Ember.
//!
//! - [`MockRenderer`] stands in for a GPU backend: it reports a configurable
//!   maximum texture size and records every atlas upload.
//! - [`fixtures`] builds the little-endian byte layouts the asset processors
//!   understand, so tests can describe containers instead of hand-writing
//!   hex dumps.
//!
//! # Example
//!
//! ```rust
//! use ember_test_utils::{MockRenderer, fixtures::dat_bytes};
//! use ember_render::Renderer;
//!
//! let renderer = MockRenderer::new(256);
//! assert_eq!(renderer.max_texture_size(), 256);
//! assert_eq!(renderer.upload_count(), 0);
//!
//! let dat = dat_bytes(2, 2, &[0, 1, 2, 3]);
//! assert_eq!(dat.len(), 6 + 4);
//! ```

pub mod fixtures;
pub mod mock_render;

pub use mock_render::*;
