//! Ball trees over observation and source point clouds.
pub mod build;
pub mod helpers;
pub mod types;

#[doc(inline)]
pub use build::build_tree;
#[doc(inline)]
pub use types::{Ball, Tree, TreeNode};
