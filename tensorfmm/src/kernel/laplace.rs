//! Scalar Laplace-type kernels.
use num::Float;

use crate::kernel::{check_assemble_shapes, check_batch_shapes, Kernel};
use crate::traits::types::FmmError;
use crate::tree::types::distance;

/// The `1/r` kernel, with the singular diagonal excluded: `K(x, x) = 0`.
/// Homogeneous of degree -1.
#[derive(Clone, Copy, Debug, Default)]
pub struct InvRKernel;

impl InvRKernel {
    /// Constructor
    pub fn new() -> Self {
        Self
    }
}

impl<T, const D: usize> Kernel<T, D> for InvRKernel
where
    T: Float + Send + Sync,
{
    fn name(&self) -> &'static str {
        "invr"
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

    fn scale(&self, radius: T) -> T {
        radius
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
        let (n_obs, n_src) = check_batch_shapes::<T, D>(
            1,
            obs_points,
            obs_normals,
            src_points,
            src_normals,
            charges.len(),
            result.len(),
        )?;

        for i in 0..n_obs {
            let obs = &obs_points[i * D..(i + 1) * D];
            let mut acc = T::zero();
            for j in 0..n_src {
                let r = distance::<T, D>(obs, &src_points[j * D..(j + 1) * D]);
                if r > T::zero() {
                    acc = acc + charges[j] / r;
                }
            }
            result[i] = result[i] + acc;
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
        let (n_obs, n_src) = check_assemble_shapes::<T, D>(
            1,
            obs_points,
            obs_normals,
            src_points,
            src_normals,
            result.len(),
        )?;

        for j in 0..n_src {
            let src = &src_points[j * D..(j + 1) * D];
            for i in 0..n_obs {
                let r = distance::<T, D>(&obs_points[i * D..(i + 1) * D], src);
                result[j * n_obs + i] = if r > T::zero() { T::one() / r } else { T::zero() };
            }
        }
        Ok(())
    }
}

/// The `log r` kernel, with the singular diagonal excluded: `K(x, x) = 0`.
/// Not homogeneous: `log(a r) = log a + log r`, so check-to-equivalent
/// operators are computed per node radius rather than re-scaled.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogRKernel;

impl LogRKernel {
    /// Constructor
    pub fn new() -> Self {
        Self
    }
}

impl<T, const D: usize> Kernel<T, D> for LogRKernel
where
    T: Float + Send + Sync,
{
    fn name(&self) -> &'static str {
        "logr"
    }

    fn tensor_dim(&self) -> usize {
        1
    }

    fn params(&self) -> &[T] {
        &[]
    }

    fn is_homogeneous(&self) -> bool {
        false
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
        let (n_obs, n_src) = check_batch_shapes::<T, D>(
            1,
            obs_points,
            obs_normals,
            src_points,
            src_normals,
            charges.len(),
            result.len(),
        )?;

        for i in 0..n_obs {
            let obs = &obs_points[i * D..(i + 1) * D];
            let mut acc = T::zero();
            for j in 0..n_src {
                let r = distance::<T, D>(obs, &src_points[j * D..(j + 1) * D]);
                if r > T::zero() {
                    acc = acc + charges[j] * r.ln();
                }
            }
            result[i] = result[i] + acc;
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
        let (n_obs, n_src) = check_assemble_shapes::<T, D>(
            1,
            obs_points,
            obs_normals,
            src_points,
            src_normals,
            result.len(),
        )?;

        for j in 0..n_src {
            let src = &src_points[j * D..(j + 1) * D];
            for i in 0..n_obs {
                let r = distance::<T, D>(&obs_points[i * D..(i + 1) * D], src);
                result[j * n_obs + i] = if r > T::zero() { r.ln() } else { T::zero() };
            }
        }
        Ok(())
    }
}
