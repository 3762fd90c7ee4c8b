//! Ember Core
//!
//! This crate contains the shared building blocks of the Ember asset pipeline:
//! logging bootstrap, engine configuration, profiling hooks, geometry
//! primitives and the generational storage used by the atlas arena.

pub mod alloc;
pub mod config;
pub mod geometry;
pub mod logging;
pub mod profiling;
