//! Builder objects to construct FMMs
use num::Float;
use rlst::{MatrixSvd, RlstScalar};

use crate::fmm::c2e::build_c2e_cache;
use crate::fmm::surface::surface_grid;
use crate::fmm::traversal::build_interaction_lists;
use crate::fmm::types::{FmmConfig, TensorFmm};
use crate::kernel::Kernel;
use crate::traits::types::FmmError;
use crate::tree::types::Tree;

/// A builder for constructing a kernel independent FMM object in a
/// step-by-step manner: attach the observation and source trees, specify the
/// configuration and kernel, then build.
///
/// # Example
/// ```
/// # extern crate blas_src;
/// # extern crate lapack_src;
/// use tensorfmm::fmm::builder::FmmBuilder;
/// use tensorfmm::fmm::types::FmmConfig;
/// use tensorfmm::kernel::get_by_name;
/// use tensorfmm::tree::helpers::{normals_fixture, points_fixture};
/// use tensorfmm::tree::Tree;
///
/// let n_points = 500;
/// let points = points_fixture::<f64, 3>(n_points, None, None, Some(0));
/// let normals = normals_fixture::<f64, 3>(n_points, Some(1));
///
/// let obs_tree = Tree::<f64, 3>::from_points(points.clone(), normals.clone(), 50).unwrap();
/// let src_tree = Tree::<f64, 3>::from_points(points, normals, 50).unwrap();
///
/// let kernel = get_by_name::<f64, 3>("invr", &[]).unwrap();
/// let mut fmm = FmmBuilder::new()
///     .trees(obs_tree, src_tree)
///     .unwrap()
///     .parameters(FmmConfig::default(), kernel)
///     .unwrap()
///     .build()
///     .unwrap();
///
/// let charges = vec![1.0; n_points];
/// let potentials = fmm.evaluate(&charges).unwrap();
/// assert_eq!(potentials.len(), n_points);
/// ```
pub struct FmmBuilder<T, const D: usize, K>
where
    T: RlstScalar<Real = T> + Float,
    K: Kernel<T, D>,
{
    /// Observation tree
    pub obs_tree: Option<Tree<T, D>>,
    /// Source tree
    pub src_tree: Option<Tree<T, D>>,
    /// Configuration
    pub config: Option<FmmConfig<T>>,
    /// Kernel
    pub kernel: Option<K>,
}

impl<T, const D: usize, K> Default for FmmBuilder<T, D, K>
where
    T: RlstScalar<Real = T> + Float + Default + MatrixSvd,
    K: Kernel<T, D>,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const D: usize, K> FmmBuilder<T, D, K>
where
    T: RlstScalar<Real = T> + Float + Default + MatrixSvd,
    K: Kernel<T, D>,
{
    /// Initialise an empty FMM builder.
    pub fn new() -> Self {
        Self {
            obs_tree: None,
            src_tree: None,
            config: None,
            kernel: None,
        }
    }

    /// Associate the builder with observation and source trees. The trees
    /// own their (reordered) points and normals.
    ///
    /// # Arguments
    /// * `obs_tree` - Tree over the observation cloud.
    /// * `src_tree` - Tree over the source cloud.
    pub fn trees(mut self, obs_tree: Tree<T, D>, src_tree: Tree<T, D>) -> Result<Self, FmmError> {
        if D != 2 && D != 3 {
            return Err(FmmError::InvalidConfig(format!(
                "dimension must be 2 or 3, got {D}"
            )));
        }
        self.obs_tree = Some(obs_tree);
        self.src_tree = Some(src_tree);
        Ok(self)
    }

    /// Specify the FMM configuration and the kernel. Fails with
    /// `InvalidConfig` when a parameter is outside its valid range, in
    /// particular when `mac >= 1 / (outer_r - 1)`.
    ///
    /// # Arguments
    /// * `config` - The FMM configuration.
    /// * `kernel` - The kernel the FMM evaluates.
    pub fn parameters(mut self, config: FmmConfig<T>, kernel: K) -> Result<Self, FmmError> {
        config.validate(D)?;
        if kernel.tensor_dim() < 1 {
            return Err(FmmError::InvalidConfig(
                "kernel tensor dimension must be at least 1".to_string(),
            ));
        }
        self.config = Some(config);
        self.kernel = Some(kernel);
        Ok(self)
    }

    /// Finalize and build the FMM: construct the translation surface, the
    /// check-to-equivalent operator caches for both trees, and the
    /// interaction lists.
    pub fn build(self) -> Result<TensorFmm<T, D, K>, FmmError> {
        let (Some(obs_tree), Some(src_tree)) = (self.obs_tree, self.src_tree) else {
            return Err(FmmError::InvalidConfig(
                "must attach trees before building".to_string(),
            ));
        };
        let (Some(config), Some(kernel)) = (self.config, self.kernel) else {
            return Err(FmmError::InvalidConfig(
                "must specify parameters before building".to_string(),
            ));
        };

        let surface = surface_grid::<T, D>(config.order);
        let n_surf = surface.len() / D;
        let tensor_dim = kernel.tensor_dim();

        let u2e = build_c2e_cache(
            &src_tree,
            &kernel,
            &surface,
            config.inner_r,
            config.outer_r,
            config.svd_threshold,
        )?;
        let d2e = build_c2e_cache(
            &obs_tree,
            &kernel,
            &surface,
            config.outer_r,
            config.inner_r,
            config.svd_threshold,
        )?;

        let lists = build_interaction_lists(&obs_tree, &src_tree, config.mac, n_surf);

        Ok(TensorFmm {
            obs_tree,
            src_tree,
            kernel,
            config,
            surface,
            n_surf,
            tensor_dim,
            lists,
            u2e,
            d2e,
            times: Vec::new(),
        })
    }
}

/// Perform all precomputation for an FMM over a pair of trees: translation
/// surface, check-to-equivalent inverses and interaction lists. Convenience
/// wrapper over [`FmmBuilder`].
///
/// # Arguments
/// * `obs_tree` - Tree over the observation cloud.
/// * `src_tree` - Tree over the source cloud.
/// * `config` - The FMM configuration.
/// * `kernel` - The kernel the FMM evaluates.
pub fn build_fmm<T, const D: usize, K>(
    obs_tree: Tree<T, D>,
    src_tree: Tree<T, D>,
    config: FmmConfig<T>,
    kernel: K,
) -> Result<TensorFmm<T, D, K>, FmmError>
where
    T: RlstScalar<Real = T> + Float + Default + MatrixSvd,
    K: Kernel<T, D>,
{
    FmmBuilder::new()
        .trees(obs_tree, src_tree)?
        .parameters(config, kernel)?
        .build()
}
