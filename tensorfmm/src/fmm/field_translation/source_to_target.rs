//! Multipole to local translations, and the particle to local fallback for
//! undersized source leaves.
use num::Float;
use rayon::prelude::*;
use rlst::RlstScalar;

use crate::fmm::types::{EvalState, SendPtrMut, TensorFmm};
use crate::kernel::Kernel;
use crate::traits::fmm::SourceToTargetTranslation;
use crate::traits::types::FmmError;

impl<T, const D: usize, K> SourceToTargetTranslation for TensorFmm<T, D, K>
where
    T: RlstScalar<Real = T> + Float + Default,
    K: Kernel<T, D>,
{
    type Scalar = T;

    fn m2l(&self, eval: &EvalState<T>) -> Result<(), FmmError> {
        let n_coeffs = self.n_coeffs();
        let check_ptr = SendPtrMut {
            raw: eval.check_potentials.as_ptr() as *mut T,
        };
        let list = &self.lists.m2l;

        (0..list.n_obs()).into_par_iter().try_for_each(|i| {
            let check_ptr = check_ptr;
            let obs_idx = list.obs_n_idxs[i];
            let obs = &self.obs_tree.nodes[obs_idx];
            let check_surface = self.downward_check_surface(obs);

            // Each observation node appears once in the list, so its check
            // potential slice is written by exactly one thread.
            let check_potential = unsafe {
                std::slice::from_raw_parts_mut(check_ptr.raw.add(obs_idx * n_coeffs), n_coeffs)
            };

            for &src_idx in list.srcs(i) {
                let src = &self.src_tree.nodes[src_idx];
                let src_equiv_surface = self.upward_equiv_surface(src);
                self.kernel.evaluate(
                    &check_surface,
                    &self.surface,
                    &src_equiv_surface,
                    &self.surface,
                    &eval.multipoles[src_idx * n_coeffs..(src_idx + 1) * n_coeffs],
                    check_potential,
                )?;
            }
            Ok(())
        })
    }

    fn p2l(&self, charges: &[T], eval: &EvalState<T>) -> Result<(), FmmError> {
        let n_coeffs = self.n_coeffs();
        let check_ptr = SendPtrMut {
            raw: eval.check_potentials.as_ptr() as *mut T,
        };
        let list = &self.lists.p2l;

        (0..list.n_obs()).into_par_iter().try_for_each(|i| {
            let check_ptr = check_ptr;
            let obs_idx = list.obs_n_idxs[i];
            let obs = &self.obs_tree.nodes[obs_idx];
            let check_surface = self.downward_check_surface(obs);

            let check_potential = unsafe {
                std::slice::from_raw_parts_mut(check_ptr.raw.add(obs_idx * n_coeffs), n_coeffs)
            };

            for &src_idx in list.srcs(i) {
                let src = &self.src_tree.nodes[src_idx];
                self.kernel.evaluate(
                    &check_surface,
                    &self.surface,
                    self.src_tree.node_points(src_idx),
                    self.src_tree.node_normals(src_idx),
                    &charges[src.start * self.tensor_dim..src.end * self.tensor_dim],
                    check_potential,
                )?;
            }
            Ok(())
        })
    }
}
