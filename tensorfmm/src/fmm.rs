//! The kernel independent FMM engine: translation surfaces,
//! check-to-equivalent solves, dual-tree traversal and the evaluation
//! passes.
pub mod builder;
pub mod c2e;
pub mod constants;
pub mod surface;
pub mod traversal;
pub mod types;

mod field_translation {
    pub mod source;
    pub mod source_to_target;
    pub mod target;
}

#[doc(inline)]
pub use builder::{build_fmm, FmmBuilder};
#[doc(inline)]
pub use types::{FmmConfig, TensorFmm};
