//! Crate wide constants
/// Default value chosen for maximum number of particles per leaf.
pub const DEFAULT_LEAF_CAPACITY: usize = 50;

/// Default equivalent-surface radius factor.
pub const DEFAULT_INNER_R: f64 = 1.1;

/// Default check-surface radius factor.
pub const DEFAULT_OUTER_R: f64 = 2.9;

/// Default multipole acceptance criterion threshold.
pub const DEFAULT_MAC: f64 = 0.3;

/// Default relative cut-off for singular values when inverting
/// check-to-equivalent operators.
pub const DEFAULT_SVD_THRESHOLD: f64 = 1e-15;
