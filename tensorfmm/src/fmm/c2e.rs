//! Precomputed check-to-equivalent operators.
//!
//! For every tree node the upward (U2E) and downward (D2E) solves map a
//! potential sampled on the node's check surface to an equivalent density on
//! its equivalent surface. The inverse is an SVD-truncated pseudoinverse of
//! the dense kernel matrix between the two surfaces, kept in two factors to
//! avoid forming an ill-conditioned product.
//!
//! The operators depend only on the node radius. Homogeneous kernels share a
//! single inverse computed at unit radius, re-scaled per node through
//! [`Kernel::scale`]; non-homogeneous kernels get one inverse per distinct
//! node radius.
use num::Float;
use rlst::{
    empty_array, rlst_array_from_slice2, rlst_dynamic_array2, Array, BaseArray, MatrixSvd,
    MultIntoResize, RawAccess, RawAccessMut, RlstScalar, VectorContainer,
};

use crate::fmm::surface::scale_surface;
use crate::kernel::Kernel;
use crate::linalg::pinv::pinv;
use crate::traits::types::FmmError;
use crate::tree::types::Tree;

/// Dense operator matrix type.
pub type C2eMatrix<T> = Array<T, BaseArray<T, VectorContainer<T>, 2>, 2>;

/// A cache of check-to-equivalent pseudoinverses for one direction (upward
/// or downward) over one tree.
pub struct C2eOperatorCache<T>
where
    T: RlstScalar,
{
    /// The pseudoinverse factors `(V·Σ⁻¹, Uᵀ)`, applied right to left.
    pub operators: Vec<(C2eMatrix<T>, C2eMatrix<T>)>,

    /// Map from node index to its entry in `operators`.
    pub node_operator: Vec<usize>,

    /// Whether a single unit-radius operator is shared across all nodes.
    pub homogeneous: bool,
}

impl<T> C2eOperatorCache<T>
where
    T: RlstScalar<Real = T>,
{
    /// Apply the cached inverse for a node to a check potential,
    /// accumulating the resulting equivalent density:
    /// `out += scale · inv_1 · (inv_2 · check_potential)`.
    ///
    /// # Arguments
    /// * `node_idx` - The node the potential belongs to.
    /// * `scale` - Radius re-scaling factor, one for non-homogeneous caches.
    /// * `check_potential` - Potential on the node's check surface.
    /// * `out` - Equivalent density on the node's equivalent surface.
    pub fn apply(&self, node_idx: usize, scale: T, check_potential: &[T], out: &mut [T]) {
        let (inv_1, inv_2) = &self.operators[self.node_operator[node_idx]];
        let n_coeffs = check_potential.len();
        let check_mat = rlst_array_from_slice2!(check_potential, [n_coeffs, 1]);

        let tmp = empty_array::<T, 2>().simple_mult_into_resize(
            inv_1.view(),
            empty_array::<T, 2>().simple_mult_into_resize(inv_2.view(), check_mat.view()),
        );

        out.iter_mut()
            .zip(tmp.data())
            .for_each(|(o, &t)| *o += scale * t);
    }
}

/// Build the check-to-equivalent operator cache for one tree.
///
/// # Arguments
/// * `tree` - The tree whose node radii key the cache.
/// * `kernel` - The kernel the operators invert.
/// * `surface` - The canonical unit translation surface.
/// * `equiv_r` - Equivalent surface radius factor.
/// * `check_r` - Check surface radius factor.
/// * `svd_threshold` - Relative singular value cut-off.
pub(crate) fn build_c2e_cache<T, const D: usize, K>(
    tree: &Tree<T, D>,
    kernel: &K,
    surface: &[T],
    equiv_r: T,
    check_r: T,
    svd_threshold: T,
) -> Result<C2eOperatorCache<T>, FmmError>
where
    T: RlstScalar<Real = T> + Float + Default + MatrixSvd,
    K: Kernel<T, D>,
{
    if kernel.is_homogeneous() {
        let pair = invert_c2e(kernel, surface, T::one(), equiv_r, check_r, svd_threshold)?;
        return Ok(C2eOperatorCache {
            operators: vec![pair],
            node_operator: vec![0; tree.n_nodes()],
            homogeneous: true,
        });
    }

    let mut radii: Vec<T> = tree.nodes.iter().map(|n| n.bounds.radius).collect();
    radii.sort_by(|a, b| a.partial_cmp(b).unwrap());
    radii.dedup();

    let mut operators = Vec::with_capacity(radii.len());
    for &radius in radii.iter() {
        operators.push(invert_c2e(kernel, surface, radius, equiv_r, check_r, svd_threshold)?);
    }

    let node_operator = tree
        .nodes
        .iter()
        .map(|n| {
            radii
                .binary_search_by(|probe| probe.partial_cmp(&n.bounds.radius).unwrap())
                .unwrap()
        })
        .collect();

    Ok(C2eOperatorCache {
        operators,
        node_operator,
        homogeneous: false,
    })
}

/// Assemble and invert the kernel matrix from the equivalent surface to the
/// check surface of a node of the given radius, centered at the origin.
fn invert_c2e<T, const D: usize, K>(
    kernel: &K,
    surface: &[T],
    radius: T,
    equiv_r: T,
    check_r: T,
    svd_threshold: T,
) -> Result<(C2eMatrix<T>, C2eMatrix<T>), FmmError>
where
    T: RlstScalar<Real = T> + Float + Default + MatrixSvd,
    K: Kernel<T, D>,
{
    let origin = [T::zero(); D];
    let equiv_surface = scale_surface::<T, D>(surface, &origin, radius, equiv_r);
    let check_surface = scale_surface::<T, D>(surface, &origin, radius, check_r);

    let n_coeffs = (surface.len() / D) * kernel.tensor_dim();
    let mut c2e = rlst_dynamic_array2!(T, [n_coeffs, n_coeffs]);
    kernel.assemble(
        &check_surface,
        surface,
        &equiv_surface,
        surface,
        c2e.data_mut(),
    )?;

    let (s, ut, v) = pinv(&c2e, None, Some(svd_threshold))?;

    let mut mat_s = rlst_dynamic_array2!(T, [s.len(), s.len()]);
    for i in 0..s.len() {
        mat_s[[i, i]] = s[i];
    }

    let inv_1 = empty_array::<T, 2>().simple_mult_into_resize(v.view(), mat_s.view());
    Ok((inv_1, ut))
}
