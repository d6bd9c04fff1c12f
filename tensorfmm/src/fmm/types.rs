//! Data structures for the kernel independent FMM.
use std::time::Instant;

use num::Float;
use rlst::RlstScalar;

use crate::fmm::c2e::C2eOperatorCache;
use crate::fmm::constants::{
    DEFAULT_INNER_R, DEFAULT_LEAF_CAPACITY, DEFAULT_MAC, DEFAULT_OUTER_R, DEFAULT_SVD_THRESHOLD,
};
use crate::fmm::surface::scale_surface;
use crate::fmm::traversal::InteractionLists;
use crate::kernel::Kernel;
use crate::traits::fmm::{SourceToTargetTranslation, SourceTranslation, TargetTranslation};
use crate::traits::types::{FmmError, OperatorTime, OperatorType};
use crate::tree::types::{Tree, TreeNode};

/// Represents a threadsafe mutable raw pointer to `T`.
///
/// This struct encapsulates a raw mutable pointer (`*mut T`), making it safe
/// to send across threads. It is used where each thread of a phase writes a
/// distinct region of a shared buffer, with disjointness upheld by the list
/// partition rather than the borrow checker.
///
/// # Safety
///
/// The user must ensure that the pointed-to data adheres to Rust's safety
/// rules regarding mutability, lifetimes, and thread safety.
#[derive(Clone, Debug, Copy)]
pub struct SendPtrMut<T> {
    /// Holds the raw mutable pointer to an instance of `T`.
    pub raw: *mut T,
}

unsafe impl<T> Send for SendPtrMut<T> {}
unsafe impl<T> Sync for SendPtrMut<T> {}

/// Fixed parameters of an FMM evaluation.
///
/// The invariant `mac < 1 / (outer_r - 1)` is required for correctness:
/// farfield approximations are only valid when the check surface does not
/// intersect the target box.
#[derive(Debug, Clone, Copy)]
pub struct FmmConfig<T> {
    /// Equivalent surface radius factor, as a multiple of the node radius.
    pub inner_r: T,

    /// Check surface radius factor, as a multiple of the node radius.
    pub outer_r: T,

    /// Expansion order controlling the surface discretisation, at least 2.
    pub order: usize,

    /// Multipole acceptance criterion threshold.
    pub mac: T,

    /// Maximum number of points per leaf, at least 1.
    pub leaf_capacity: usize,

    /// Relative singular value cut-off for the check-to-equivalent solves.
    pub svd_threshold: T,
}

impl<T> Default for FmmConfig<T>
where
    T: Float,
{
    fn default() -> Self {
        Self {
            inner_r: T::from(DEFAULT_INNER_R).unwrap(),
            outer_r: T::from(DEFAULT_OUTER_R).unwrap(),
            order: 6,
            mac: T::from(DEFAULT_MAC).unwrap(),
            leaf_capacity: DEFAULT_LEAF_CAPACITY,
            svd_threshold: T::from(DEFAULT_SVD_THRESHOLD).unwrap(),
        }
    }
}

impl<T> FmmConfig<T>
where
    T: Float,
{
    /// Check every parameter against its valid range.
    ///
    /// # Arguments
    /// * `dim` - Spatial dimension the configuration will be used in.
    pub fn validate(&self, dim: usize) -> Result<(), FmmError> {
        if dim != 2 && dim != 3 {
            return Err(FmmError::InvalidConfig(format!(
                "dimension must be 2 or 3, got {dim}"
            )));
        }
        if self.order < 2 {
            return Err(FmmError::InvalidConfig(format!(
                "expansion order must be at least 2, got {}",
                self.order
            )));
        }
        if self.leaf_capacity < 1 {
            return Err(FmmError::InvalidConfig(
                "leaf capacity must be at least 1".to_string(),
            ));
        }
        if !(self.inner_r > T::zero()) {
            return Err(FmmError::InvalidConfig(
                "inner radius factor must be positive".to_string(),
            ));
        }
        if !(self.outer_r > self.inner_r) {
            return Err(FmmError::InvalidConfig(
                "outer radius factor must exceed the inner radius factor".to_string(),
            ));
        }
        if !(self.outer_r > T::one()) {
            return Err(FmmError::InvalidConfig(
                "outer radius factor must exceed 1".to_string(),
            ));
        }
        if !(self.svd_threshold >= T::zero()) {
            return Err(FmmError::InvalidConfig(
                "SVD threshold must be non-negative".to_string(),
            ));
        }
        if !(self.mac > T::zero()) {
            return Err(FmmError::InvalidConfig(
                "MAC threshold must be positive".to_string(),
            ));
        }
        // The farfield approximation breaks down once the check surface can
        // intersect the target box.
        if self.mac * (self.outer_r - T::one()) >= T::one() {
            return Err(FmmError::InvalidConfig(
                "MAC threshold must be below 1 / (outer_r - 1)".to_string(),
            ));
        }
        Ok(())
    }
}

/// Expansion buffers for a single evaluation. Allocated fresh per call, all
/// at once; the passes write disjoint per-node regions through raw pointers.
pub struct EvalState<T> {
    /// Multipole densities on the upward equivalent surface of each source
    /// node, `n_coeffs` entries per node.
    pub(crate) multipoles: Vec<T>,

    /// Local densities on the downward equivalent surface of each
    /// observation node, `n_coeffs` entries per node.
    pub(crate) locals: Vec<T>,

    /// Accumulated downward check potentials per observation node.
    pub(crate) check_potentials: Vec<T>,

    /// Potentials at the observation points, in tree-reordered order.
    pub(crate) potentials: Vec<T>,
}

impl<T> EvalState<T>
where
    T: RlstScalar<Real = T>,
{
    /// Allocate buffers for a full evaluation.
    pub(crate) fn new(
        n_src_nodes: usize,
        n_obs_nodes: usize,
        n_obs_points: usize,
        n_coeffs: usize,
        tensor_dim: usize,
    ) -> Self {
        Self {
            multipoles: vec![T::zero(); n_src_nodes * n_coeffs],
            locals: vec![T::zero(); n_obs_nodes * n_coeffs],
            check_potentials: vec![T::zero(); n_obs_nodes * n_coeffs],
            potentials: vec![T::zero(); n_obs_points * tensor_dim],
        }
    }

    /// Allocate only the output buffer, for direct-only evaluation.
    pub(crate) fn direct(n_obs_points: usize, tensor_dim: usize) -> Self {
        Self {
            multipoles: Vec::new(),
            locals: Vec::new(),
            check_potentials: Vec::new(),
            potentials: vec![T::zero(); n_obs_points * tensor_dim],
        }
    }
}

/// Holds all data and precomputed operators for evaluating a kernel
/// independent FMM between an observation and a source point cloud.
///
/// Built once per geometry and configuration via
/// [`FmmBuilder`](crate::fmm::builder::FmmBuilder); evaluated repeatedly with
/// fresh charge vectors through [`TensorFmm::evaluate`].
pub struct TensorFmm<T, const D: usize, K>
where
    T: RlstScalar<Real = T> + Float,
    K: Kernel<T, D>,
{
    /// The observation tree.
    pub obs_tree: Tree<T, D>,

    /// The source tree.
    pub src_tree: Tree<T, D>,

    /// The associated kernel function.
    pub kernel: K,

    /// The configuration the FMM was built with.
    pub config: FmmConfig<T>,

    /// The canonical unit translation surface, shared by all nodes. Doubles
    /// as the outward surface normals of every placement.
    pub surface: Vec<T>,

    /// Number of points discretising the translation surface.
    pub n_surf: usize,

    /// Tensor dimension of the kernel.
    pub tensor_dim: usize,

    /// The compressed interaction lists driving the evaluation.
    pub lists: InteractionLists,

    /// Upward check-to-equivalent operators, one per source node radius.
    pub(crate) u2e: C2eOperatorCache<T>,

    /// Downward check-to-equivalent operators, one per observation node
    /// radius.
    pub(crate) d2e: C2eOperatorCache<T>,

    /// Per-operator wall clock times of the most recent evaluation.
    pub times: Vec<OperatorTime>,
}

impl<T, const D: usize, K> TensorFmm<T, D, K>
where
    T: RlstScalar<Real = T> + Float + Default,
    K: Kernel<T, D>,
{
    /// Number of expansion coefficients per node, surface points times
    /// tensor dimension.
    pub fn n_coeffs(&self) -> usize {
        self.n_surf * self.tensor_dim
    }

    /// The upward equivalent surface of a source node.
    pub(crate) fn upward_equiv_surface(&self, node: &TreeNode<T, D>) -> Vec<T> {
        scale_surface::<T, D>(
            &self.surface,
            &node.bounds.center,
            node.bounds.radius,
            self.config.inner_r,
        )
    }

    /// The upward check surface of a source node.
    pub(crate) fn upward_check_surface(&self, node: &TreeNode<T, D>) -> Vec<T> {
        scale_surface::<T, D>(
            &self.surface,
            &node.bounds.center,
            node.bounds.radius,
            self.config.outer_r,
        )
    }

    /// The downward equivalent surface of an observation node.
    pub(crate) fn downward_equiv_surface(&self, node: &TreeNode<T, D>) -> Vec<T> {
        scale_surface::<T, D>(
            &self.surface,
            &node.bounds.center,
            node.bounds.radius,
            self.config.outer_r,
        )
    }

    /// The downward check surface of an observation node.
    pub(crate) fn downward_check_surface(&self, node: &TreeNode<T, D>) -> Vec<T> {
        scale_surface::<T, D>(
            &self.surface,
            &node.bounds.center,
            node.bounds.radius,
            self.config.inner_r,
        )
    }

    /// Re-scaling factor taking a cached unit-radius check-to-equivalent
    /// inverse to a node of the given radius. One for non-homogeneous
    /// kernels, whose caches hold per-radius inverses already.
    pub(crate) fn c2e_scale(&self, radius: T) -> T {
        if self.kernel.is_homogeneous() {
            self.kernel.scale(radius)
        } else {
            T::one()
        }
    }

    fn validate_charges(&self, charges: &[T]) -> Result<(), FmmError> {
        let expected = self.src_tree.n_points() * self.tensor_dim;
        if charges.len() != expected {
            return Err(FmmError::ShapeMismatch {
                expected,
                found: charges.len(),
            });
        }
        Ok(())
    }

    /// Evaluate the potentials induced at the observation points by a charge
    /// vector at the source points.
    ///
    /// Charges and potentials are in tree-reordered index order with tensor
    /// components interleaved; callers permute via the trees' `orig_idx` to
    /// recover input order. Per-operator timings of the call are left in
    /// [`TensorFmm::times`].
    ///
    /// # Arguments
    /// * `charges` - Charge vector of length `n_src_points · tensor_dim`.
    pub fn evaluate(&mut self, charges: &[T]) -> Result<Vec<T>, FmmError> {
        self.validate_charges(charges)?;

        let eval = EvalState::new(
            self.src_tree.n_nodes(),
            self.obs_tree.n_nodes(),
            self.obs_tree.n_points(),
            self.n_coeffs(),
            self.tensor_dim,
        );
        let mut times = Vec::new();

        // Upward pass
        {
            let s = Instant::now();
            self.p2m(charges, &eval)?;
            times.push(OperatorTime::from_instant(OperatorType::P2M, s));

            for height in 1..=self.src_tree.max_height {
                let s = Instant::now();
                self.m2m(height, &eval)?;
                times.push(OperatorTime::from_instant(OperatorType::M2M(height), s));
            }
        }

        // Farfield translations
        {
            let s = Instant::now();
            self.m2l(&eval)?;
            times.push(OperatorTime::from_instant(OperatorType::M2L, s));

            let s = Instant::now();
            self.p2l(charges, &eval)?;
            times.push(OperatorTime::from_instant(OperatorType::P2L, s));
        }

        // Downward pass
        {
            for depth in 0..=self.obs_tree.max_depth {
                let s = Instant::now();
                self.l2l(depth, &eval)?;
                times.push(OperatorTime::from_instant(OperatorType::L2L(depth), s));
            }

            // Leaf level computation
            let s = Instant::now();
            self.l2p(&eval)?;
            times.push(OperatorTime::from_instant(OperatorType::L2P, s));

            let s = Instant::now();
            self.m2p(&eval)?;
            times.push(OperatorTime::from_instant(OperatorType::M2P, s));

            let s = Instant::now();
            self.p2p(charges, &eval)?;
            times.push(OperatorTime::from_instant(OperatorType::P2P, s));
        }

        self.times = times;
        Ok(eval.potentials)
    }

    /// Evaluate only the near-field P2P list, the direct part of the
    /// potential. Intended for testing and baselines.
    ///
    /// # Arguments
    /// * `charges` - Charge vector of length `n_src_points · tensor_dim`.
    pub fn evaluate_p2p_only(&self, charges: &[T]) -> Result<Vec<T>, FmmError> {
        self.validate_charges(charges)?;

        let eval = EvalState::direct(self.obs_tree.n_points(), self.tensor_dim);
        self.p2p(charges, &eval)?;
        Ok(eval.potentials)
    }
}
