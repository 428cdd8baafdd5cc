//! Small helpers shared across the crate.

pub mod template;

pub use template::render;
