//! # tensorfmm
//!
//! A kernel-independent fast multipole method (KIFMM) for evaluating dense
//! pairwise interactions `u(x_i) = Σ_j K(x_i, n_i, x_j, n_j) · q_j` of
//! tensor-valued Green's function kernels over point clouds in two or three
//! dimensions, based on \[1\].
//!
//! Observation and source clouds are partitioned into ball trees; a
//! dual-tree traversal classifies node pairs with a multipole acceptance
//! criterion into direct (P2P), multipole-to-local (M2L) and the asymmetric
//! P2L/M2P lists; equivalent/check surface solves make the translation
//! operators independent of the kernel's analytic form. A naive O(N·M)
//! evaluation drops to O(N + M) up to logarithmic factors, at an accuracy
//! set by the expansion order.
//!
//! ## References
//! \[1\] Ying, L., Biros, G., & Zorin, D. (2004). A kernel-independent
//! adaptive fast multipole algorithm in two and three dimensions. Journal of
//! Computational Physics, 196(2), 591-626.
#![cfg_attr(feature = "strict", deny(warnings))]
#![warn(missing_docs)]

pub mod fmm;
pub mod kernel;
pub mod linalg;
pub mod traits;
pub mod tree;

// Public API
#[doc(inline)]
pub use fmm::builder::{build_fmm, FmmBuilder};
#[doc(inline)]
pub use fmm::types::{FmmConfig, TensorFmm};
#[doc(inline)]
pub use kernel::{direct_eval, get_by_name, AnyKernel, Kernel};
#[doc(inline)]
pub use traits::types::FmmError;
#[doc(inline)]
pub use tree::{build_tree, Tree};
