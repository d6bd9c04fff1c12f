//! Tensor-valued kernels evaluated over point batches.
//!
//! A kernel is an injected value with a name, a tensor dimension and a
//! parameter vector; the engine only ever talks to it through batched
//! evaluation. Kernels are pure and reentrant.
pub mod elastic;
pub mod laplace;

use num::Float;
use rayon::prelude::*;

use crate::traits::types::FmmError;

pub use elastic::{ElasticTKernel, ElasticUKernel};
pub use laplace::{InvRKernel, LogRKernel};

/// Interface for tensor-valued kernels over `D`-dimensional point batches.
///
/// Coordinates and normals are flat row-major slices with `D` entries per
/// point. Charge and potential vectors interleave tensor components per
/// point, `T` entries per point for a kernel of tensor dimension `T`.
pub trait Kernel<T, const D: usize>: Send + Sync
where
    T: Float,
{
    /// Kernel name, used for registry lookup.
    fn name(&self) -> &'static str;

    /// Output dimensionality per observation/source pair.
    fn tensor_dim(&self) -> usize;

    /// Kernel parameters.
    fn params(&self) -> &[T];

    /// Whether the kernel is homogeneous under uniform scaling of all
    /// coordinates. Homogeneous kernels share a single check-to-equivalent
    /// operator across node radii, re-scaled via [`Kernel::scale`].
    fn is_homogeneous(&self) -> bool;

    /// For a kernel with `K(a x, a y) = a^p K(x, y)`, returns `radius^{-p}`:
    /// the factor mapping the unit-radius check-to-equivalent inverse to the
    /// inverse at `radius`. Unused for non-homogeneous kernels.
    fn scale(&self, radius: T) -> T;

    /// Evaluate the kernel between batches, accumulating into `result`:
    ///
    /// `result[i·T + a] += Σ_j Σ_b K_ab(obs_i, src_j) · charges[j·T + b]`
    ///
    /// # Arguments
    /// * `obs_points` - Observation coordinates, `n_obs · D` entries.
    /// * `obs_normals` - Observation normals, `n_obs · D` entries.
    /// * `src_points` - Source coordinates, `n_src · D` entries.
    /// * `src_normals` - Source normals, `n_src · D` entries.
    /// * `charges` - Source densities, `n_src · T` entries.
    /// * `result` - Accumulated potentials, `n_obs · T` entries.
    fn evaluate(
        &self,
        obs_points: &[T],
        obs_normals: &[T],
        src_points: &[T],
        src_normals: &[T],
        charges: &[T],
        result: &mut [T],
    ) -> Result<(), FmmError>;

    /// Assemble the dense interaction matrix between batches into `result`,
    /// column-major with shape `[n_obs · T, n_src · T]`: the entry coupling
    /// observation dof `i·T + a` to source dof `j·T + b` lands at
    /// `result[(j·T + b) · n_obs · T + i·T + a]`.
    ///
    /// # Arguments
    /// * `obs_points` - Observation coordinates, `n_obs · D` entries.
    /// * `obs_normals` - Observation normals, `n_obs · D` entries.
    /// * `src_points` - Source coordinates, `n_src · D` entries.
    /// * `src_normals` - Source normals, `n_src · D` entries.
    /// * `result` - Matrix entries, `n_obs · n_src · T²` of them.
    fn assemble(
        &self,
        obs_points: &[T],
        obs_normals: &[T],
        src_points: &[T],
        src_normals: &[T],
        result: &mut [T],
    ) -> Result<(), FmmError>;
}

/// Check the slice lengths handed to a kernel call against each other.
pub(crate) fn check_batch_shapes<T, const D: usize>(
    tensor_dim: usize,
    obs_points: &[T],
    obs_normals: &[T],
    src_points: &[T],
    src_normals: &[T],
    n_charges: usize,
    n_result: usize,
) -> Result<(usize, usize), FmmError> {
    if obs_normals.len() != obs_points.len() {
        return Err(FmmError::ShapeMismatch {
            expected: obs_points.len(),
            found: obs_normals.len(),
        });
    }
    if src_normals.len() != src_points.len() {
        return Err(FmmError::ShapeMismatch {
            expected: src_points.len(),
            found: src_normals.len(),
        });
    }
    let n_obs = obs_points.len() / D;
    let n_src = src_points.len() / D;
    if n_charges != n_src * tensor_dim {
        return Err(FmmError::ShapeMismatch {
            expected: n_src * tensor_dim,
            found: n_charges,
        });
    }
    if n_result != n_obs * tensor_dim {
        return Err(FmmError::ShapeMismatch {
            expected: n_obs * tensor_dim,
            found: n_result,
        });
    }
    Ok((n_obs, n_src))
}

/// Check the slice lengths handed to a kernel assembly call.
pub(crate) fn check_assemble_shapes<T, const D: usize>(
    tensor_dim: usize,
    obs_points: &[T],
    obs_normals: &[T],
    src_points: &[T],
    src_normals: &[T],
    n_result: usize,
) -> Result<(usize, usize), FmmError> {
    if obs_normals.len() != obs_points.len() {
        return Err(FmmError::ShapeMismatch {
            expected: obs_points.len(),
            found: obs_normals.len(),
        });
    }
    if src_normals.len() != src_points.len() {
        return Err(FmmError::ShapeMismatch {
            expected: src_points.len(),
            found: src_normals.len(),
        });
    }
    let n_obs = obs_points.len() / D;
    let n_src = src_points.len() / D;
    if n_result != n_obs * n_src * tensor_dim * tensor_dim {
        return Err(FmmError::ShapeMismatch {
            expected: n_obs * n_src * tensor_dim * tensor_dim,
            found: n_result,
        });
    }
    Ok((n_obs, n_src))
}

/// The constant kernel, `K(x, y) = 1` for every pair including coincident
/// points. Useful as a counting kernel: the potential at every observation
/// point is the sum of all source densities.
#[derive(Clone, Copy, Debug, Default)]
pub struct OneKernel;

impl OneKernel {
    /// Constructor
    pub fn new() -> Self {
        Self
    }
}

impl<T, const D: usize> Kernel<T, D> for OneKernel
where
    T: Float + Send + Sync,
{
    fn name(&self) -> &'static str {
        "one"
    }

    fn tensor_dim(&self) -> usize {
        1
    }

    fn params(&self) -> &[T] {
        &[]
    }

    fn is_homogeneous(&self) -> bool {
        true
    }

    fn scale(&self, _radius: T) -> T {
        T::one()
    }

    fn evaluate(
        &self,
        obs_points: &[T],
        obs_normals: &[T],
        src_points: &[T],
        src_normals: &[T],
        charges: &[T],
        result: &mut [T],
    ) -> Result<(), FmmError> {
        let (n_obs, _n_src) = check_batch_shapes::<T, D>(
            1,
            obs_points,
            obs_normals,
            src_points,
            src_normals,
            charges.len(),
            result.len(),
        )?;
        let total = charges.iter().fold(T::zero(), |acc, &q| acc + q);
        for i in 0..n_obs {
            result[i] = result[i] + total;
        }
        Ok(())
    }

    fn assemble(
        &self,
        obs_points: &[T],
        obs_normals: &[T],
        src_points: &[T],
        src_normals: &[T],
        result: &mut [T],
    ) -> Result<(), FmmError> {
        check_assemble_shapes::<T, D>(
            1,
            obs_points,
            obs_normals,
            src_points,
            src_normals,
            result.len(),
        )?;
        for entry in result.iter_mut() {
            *entry = T::one();
        }
        Ok(())
    }
}

/// A kernel selected by name, the registry's return type. Dispatches to the
/// concrete built-in kernels.
#[derive(Clone, Debug)]
pub enum AnyKernel<T> {
    /// The constant kernel.
    One(OneKernel),
    /// `1/r`.
    InvR(InvRKernel),
    /// `log r`.
    LogR(LogRKernel),
    /// 3D elastostatic displacement (Kelvin solution), tensor dimension 3.
    ElasticU(ElasticUKernel<T>),
    /// 3D elastostatic traction, tensor dimension 3.
    ElasticT(ElasticTKernel<T>),
}

macro_rules! dispatch {
    ($self:expr, $inner:ident, $call:expr) => {
        match $self {
            AnyKernel::One($inner) => $call,
            AnyKernel::InvR($inner) => $call,
            AnyKernel::LogR($inner) => $call,
            AnyKernel::ElasticU($inner) => $call,
            AnyKernel::ElasticT($inner) => $call,
        }
    };
}

impl<T, const D: usize> Kernel<T, D> for AnyKernel<T>
where
    T: Float + Send + Sync,
{
    fn name(&self) -> &'static str {
        dispatch!(self, k, Kernel::<T, D>::name(k))
    }

    fn tensor_dim(&self) -> usize {
        dispatch!(self, k, Kernel::<T, D>::tensor_dim(k))
    }

    fn params(&self) -> &[T] {
        dispatch!(self, k, Kernel::<T, D>::params(k))
    }

    fn is_homogeneous(&self) -> bool {
        dispatch!(self, k, Kernel::<T, D>::is_homogeneous(k))
    }

    fn scale(&self, radius: T) -> T {
        dispatch!(self, k, Kernel::<T, D>::scale(k, radius))
    }

    fn evaluate(
        &self,
        obs_points: &[T],
        obs_normals: &[T],
        src_points: &[T],
        src_normals: &[T],
        charges: &[T],
        result: &mut [T],
    ) -> Result<(), FmmError> {
        dispatch!(
            self,
            k,
            Kernel::<T, D>::evaluate(k, obs_points, obs_normals, src_points, src_normals, charges, result)
        )
    }

    fn assemble(
        &self,
        obs_points: &[T],
        obs_normals: &[T],
        src_points: &[T],
        src_normals: &[T],
        result: &mut [T],
    ) -> Result<(), FmmError> {
        dispatch!(
            self,
            k,
            Kernel::<T, D>::assemble(k, obs_points, obs_normals, src_points, src_normals, result)
        )
    }
}

/// Look up a built-in kernel by name.
///
/// # Arguments
/// * `name` - One of `"one"`, `"invr"`, `"logr"`, `"elasticU"`, `"elasticT"`.
/// * `params` - Kernel parameters; the elastic kernels expect
///   `[shear_modulus, poisson_ratio]`, the rest expect none.
pub fn get_by_name<T, const D: usize>(name: &str, params: &[T]) -> Result<AnyKernel<T>, FmmError>
where
    T: Float + Send + Sync,
{
    match name {
        "one" => Ok(AnyKernel::One(OneKernel::new())),
        "invr" => Ok(AnyKernel::InvR(InvRKernel::new())),
        "logr" => Ok(AnyKernel::LogR(LogRKernel::new())),
        "elasticU" | "elasticT" => {
            if D != 3 {
                return Err(FmmError::InvalidConfig(format!(
                    "kernel {name} is only defined in three dimensions"
                )));
            }
            if params.len() != 2 {
                return Err(FmmError::InvalidConfig(format!(
                    "kernel {name} expects parameters [shear_modulus, poisson_ratio], got {} values",
                    params.len()
                )));
            }
            if name == "elasticU" {
                Ok(AnyKernel::ElasticU(ElasticUKernel::new(params[0], params[1])))
            } else {
                Ok(AnyKernel::ElasticT(ElasticTKernel::new(params[0], params[1])))
            }
        }
        _ => Err(FmmError::InvalidConfig(format!("unknown kernel name {name}"))),
    }
}

/// Dense direct evaluation of all observation/source pairs, the naive
/// reference the engine approximates. Thread-parallel over observation
/// points.
///
/// # Arguments
/// * `kernel` - The kernel to evaluate.
/// * `obs_points` - Observation coordinates, flat row-major.
/// * `obs_normals` - Observation normals, flat row-major.
/// * `src_points` - Source coordinates, flat row-major.
/// * `src_normals` - Source normals, flat row-major.
/// * `charges` - Source densities, tensor components interleaved.
pub fn direct_eval<T, const D: usize, K>(
    kernel: &K,
    obs_points: &[T],
    obs_normals: &[T],
    src_points: &[T],
    src_normals: &[T],
    charges: &[T],
) -> Result<Vec<T>, FmmError>
where
    T: Float + Send + Sync,
    K: Kernel<T, D>,
{
    let tensor_dim = kernel.tensor_dim();
    let (n_obs, _) = check_batch_shapes::<T, D>(
        tensor_dim,
        obs_points,
        obs_normals,
        src_points,
        src_normals,
        charges.len(),
        (obs_points.len() / D) * tensor_dim,
    )?;

    let mut result = vec![T::zero(); n_obs * tensor_dim];
    result
        .par_chunks_mut(tensor_dim)
        .enumerate()
        .try_for_each(|(i, out)| {
            kernel.evaluate(
                &obs_points[i * D..(i + 1) * D],
                &obs_normals[i * D..(i + 1) * D],
                src_points,
                src_normals,
                charges,
                out,
            )
        })?;

    Ok(result)
}
