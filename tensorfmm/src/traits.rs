//! Trait definitions and shared utility types.
pub mod fmm;
pub mod types;
