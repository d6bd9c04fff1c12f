//! Elastostatic kernels in three dimensions: the Kelvin displacement
//! solution and its traction counterpart. Tensor dimension 3.
use num::Float;

use crate::kernel::{check_assemble_shapes, check_batch_shapes, Kernel};
use crate::traits::types::FmmError;

fn require_3d<const D: usize>(name: &str) -> Result<(), FmmError> {
    if D != 3 {
        return Err(FmmError::Kernel(format!(
            "kernel {name} is only defined in three dimensions"
        )));
    }
    Ok(())
}

/// The 3D elastostatic displacement kernel (Kelvin solution),
///
/// `U_ij = 1 / (16 π μ (1 − ν)) · 1/r · ((3 − 4ν) δ_ij + r_i r_j / r²)`
///
/// with the singular diagonal excluded. Normals are ignored. Homogeneous of
/// degree -1.
#[derive(Clone, Copy, Debug)]
pub struct ElasticUKernel<T> {
    params: [T; 2],
    prefactor: T,
    c1: T,
}

impl<T> ElasticUKernel<T>
where
    T: Float,
{
    /// Constructor
    ///
    /// # Arguments
    /// * `shear_modulus` - Shear modulus μ.
    /// * `poisson_ratio` - Poisson ratio ν.
    pub fn new(shear_modulus: T, poisson_ratio: T) -> Self {
        let pi = T::from(std::f64::consts::PI).unwrap();
        let one = T::one();
        let prefactor = one
            / (T::from(16.0).unwrap() * pi * shear_modulus * (one - poisson_ratio));
        let c1 = T::from(3.0).unwrap() - T::from(4.0).unwrap() * poisson_ratio;
        Self {
            params: [shear_modulus, poisson_ratio],
            prefactor,
            c1,
        }
    }

    /// The displacement block for a single pair, accumulated as
    /// `out[a] += Σ_b U_ab · q[b]`. Zero when the points coincide.
    #[inline]
    fn block(&self, obs: &[T], src: &[T], charge: &[T], out: &mut [T]) {
        let dx = obs[0] - src[0];
        let dy = obs[1] - src[1];
        let dz = obs[2] - src[2];
        let r2 = dx * dx + dy * dy + dz * dz;
        if r2 == T::zero() {
            return;
        }
        let r = r2.sqrt();
        let inv_r = T::one() / r;
        let d = [dx * inv_r, dy * inv_r, dz * inv_r];
        let f = self.prefactor * inv_r;

        for a in 0..3 {
            let mut acc = T::zero();
            for b in 0..3 {
                let delta = if a == b { T::one() } else { T::zero() };
                acc = acc + (self.c1 * delta + d[a] * d[b]) * charge[b];
            }
            out[a] = out[a] + f * acc;
        }
    }
}

impl<T, const D: usize> Kernel<T, D> for ElasticUKernel<T>
where
    T: Float + Send + Sync,
{
    fn name(&self) -> &'static str {
        "elasticU"
    }

    fn tensor_dim(&self) -> usize {
        3
    }

    fn params(&self) -> &[T] {
        &self.params
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
        require_3d::<D>("elasticU")?;
        let (n_obs, n_src) = check_batch_shapes::<T, D>(
            3,
            obs_points,
            obs_normals,
            src_points,
            src_normals,
            charges.len(),
            result.len(),
        )?;

        for i in 0..n_obs {
            let obs = &obs_points[i * 3..(i + 1) * 3];
            let out = &mut result[i * 3..(i + 1) * 3];
            for j in 0..n_src {
                self.block(obs, &src_points[j * 3..(j + 1) * 3], &charges[j * 3..(j + 1) * 3], out);
            }
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
        require_3d::<D>("elasticU")?;
        let (n_obs, n_src) = check_assemble_shapes::<T, D>(
            3,
            obs_points,
            obs_normals,
            src_points,
            src_normals,
            result.len(),
        )?;

        let n_rows = n_obs * 3;
        for j in 0..n_src {
            let src = &src_points[j * 3..(j + 1) * 3];
            for b in 0..3 {
                let mut unit = [T::zero(); 3];
                unit[b] = T::one();
                for i in 0..n_obs {
                    let mut block = [T::zero(); 3];
                    self.block(&obs_points[i * 3..(i + 1) * 3], src, &unit, &mut block);
                    for a in 0..3 {
                        result[(j * 3 + b) * n_rows + i * 3 + a] = block[a];
                    }
                }
            }
        }
        Ok(())
    }
}

/// The 3D elastostatic traction kernel,
///
/// `T_ij = -1 / (8 π (1 − ν) r²) · ( ∂r/∂n ((1 − 2ν) δ_ij + 3 r_i r_j)
///          + (1 − 2ν) (n_i r_j − n_j r_i) )`
///
/// where `n` is the source normal. Homogeneous of degree -2, singular
/// diagonal excluded.
#[derive(Clone, Copy, Debug)]
pub struct ElasticTKernel<T> {
    params: [T; 2],
    prefactor: T,
    c2: T,
}

impl<T> ElasticTKernel<T>
where
    T: Float,
{
    /// Constructor
    ///
    /// # Arguments
    /// * `shear_modulus` - Shear modulus μ.
    /// * `poisson_ratio` - Poisson ratio ν.
    pub fn new(shear_modulus: T, poisson_ratio: T) -> Self {
        let pi = T::from(std::f64::consts::PI).unwrap();
        let one = T::one();
        let prefactor =
            -one / (T::from(8.0).unwrap() * pi * (one - poisson_ratio));
        let c2 = one - T::from(2.0).unwrap() * poisson_ratio;
        Self {
            params: [shear_modulus, poisson_ratio],
            prefactor,
            c2,
        }
    }

    /// The traction block for a single pair, accumulated as
    /// `out[a] += Σ_b T_ab · q[b]`. Zero when the points coincide.
    #[inline]
    fn block(&self, obs: &[T], src: &[T], src_normal: &[T], charge: &[T], out: &mut [T]) {
        let dx = obs[0] - src[0];
        let dy = obs[1] - src[1];
        let dz = obs[2] - src[2];
        let r2 = dx * dx + dy * dy + dz * dz;
        if r2 == T::zero() {
            return;
        }
        let r = r2.sqrt();
        let inv_r = T::one() / r;
        let d = [dx * inv_r, dy * inv_r, dz * inv_r];
        let n = src_normal;
        let drdn = d[0] * n[0] + d[1] * n[1] + d[2] * n[2];
        let f = self.prefactor * inv_r * inv_r;
        let three = T::from(3.0).unwrap();

        for a in 0..3 {
            let mut acc = T::zero();
            for b in 0..3 {
                let delta = if a == b { T::one() } else { T::zero() };
                let t = drdn * (self.c2 * delta + three * d[a] * d[b])
                    + self.c2 * (n[a] * d[b] - n[b] * d[a]);
                acc = acc + t * charge[b];
            }
            out[a] = out[a] + f * acc;
        }
    }
}

impl<T, const D: usize> Kernel<T, D> for ElasticTKernel<T>
where
    T: Float + Send + Sync,
{
    fn name(&self) -> &'static str {
        "elasticT"
    }

    fn tensor_dim(&self) -> usize {
        3
    }

    fn params(&self) -> &[T] {
        &self.params
    }

    fn is_homogeneous(&self) -> bool {
        true
    }

    fn scale(&self, radius: T) -> T {
        radius * radius
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
        require_3d::<D>("elasticT")?;
        let (n_obs, n_src) = check_batch_shapes::<T, D>(
            3,
            obs_points,
            obs_normals,
            src_points,
            src_normals,
            charges.len(),
            result.len(),
        )?;

        for i in 0..n_obs {
            let obs = &obs_points[i * 3..(i + 1) * 3];
            let out = &mut result[i * 3..(i + 1) * 3];
            for j in 0..n_src {
                self.block(
                    obs,
                    &src_points[j * 3..(j + 1) * 3],
                    &src_normals[j * 3..(j + 1) * 3],
                    &charges[j * 3..(j + 1) * 3],
                    out,
                );
            }
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
        require_3d::<D>("elasticT")?;
        let (n_obs, n_src) = check_assemble_shapes::<T, D>(
            3,
            obs_points,
            obs_normals,
            src_points,
            src_normals,
            result.len(),
        )?;

        let n_rows = n_obs * 3;
        for j in 0..n_src {
            let src = &src_points[j * 3..(j + 1) * 3];
            let src_normal = &src_normals[j * 3..(j + 1) * 3];
            for b in 0..3 {
                let mut unit = [T::zero(); 3];
                unit[b] = T::one();
                for i in 0..n_obs {
                    let mut block = [T::zero(); 3];
                    self.block(&obs_points[i * 3..(i + 1) * 3], src, src_normal, &unit, &mut block);
                    for a in 0..3 {
                        result[(j * 3 + b) * n_rows + i * 3 + a] = block[a];
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_elastic_u_is_symmetric() {
        let kernel = ElasticUKernel::new(1.0, 0.25);
        let obs = [1.0, 2.0, 3.0];
        let src = [0.5, -0.25, 1.5];

        let mut blocks = [[0.0; 3]; 3];
        for (b, row) in blocks.iter_mut().enumerate() {
            let mut unit = [0.0; 3];
            unit[b] = 1.0;
            kernel.block(&obs, &src, &unit, row);
        }

        // U_ab = U_ba, and swapping obs/src leaves the block unchanged.
        for a in 0..3 {
            for b in 0..3 {
                assert_relative_eq!(blocks[b][a], blocks[a][b], epsilon = 1e-15);
            }
        }

        let mut swapped = [0.0; 3];
        kernel.block(&src, &obs, &[1.0, 0.0, 0.0], &mut swapped);
        assert_relative_eq!(swapped[0], blocks[0][0], epsilon = 1e-15);
    }

    #[test]
    fn test_elastic_u_decays_like_inverse_r() {
        let kernel = ElasticUKernel::new(1.0, 0.25);
        let src = [0.0, 0.0, 0.0];
        let q = [1.0, 0.0, 0.0];

        let mut near = [0.0; 3];
        kernel.block(&[1.0, 0.0, 0.0], &src, &q, &mut near);
        let mut far = [0.0; 3];
        kernel.block(&[2.0, 0.0, 0.0], &src, &q, &mut far);

        assert_relative_eq!(near[0], 2.0 * far[0], epsilon = 1e-15);
    }

    #[test]
    fn test_elastic_t_uses_source_normal() {
        let kernel = ElasticTKernel::new(1.0, 0.25);
        let obs = [2.0, 0.0, 0.0];
        let src = [0.0, 0.0, 0.0];
        let q = [0.0, 1.0, 0.0];

        let mut with_x = [0.0; 3];
        kernel.block(&obs, &src, &[1.0, 0.0, 0.0], &q, &mut with_x);
        let mut with_z = [0.0; 3];
        kernel.block(&obs, &src, &[0.0, 0.0, 1.0], &q, &mut with_z);

        assert!(with_x != with_z);
    }

    #[test]
    fn test_self_interaction_is_zero() {
        let kernel = ElasticTKernel::new(1.0, 0.25);
        let p = [0.3, 0.3, 0.3];
        let mut out = [0.0; 3];
        kernel.block(&p, &p, &[0.0, 0.0, 1.0], &[1.0, 1.0, 1.0], &mut out);
        assert_eq!(out, [0.0; 3]);
    }
}
