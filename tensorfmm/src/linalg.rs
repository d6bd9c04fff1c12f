//! Dense linear algebra used during precomputation.
pub mod pinv;
