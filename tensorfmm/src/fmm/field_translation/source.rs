//! Multipole expansion translations
use num::Float;
use rayon::prelude::*;
use rlst::RlstScalar;

use crate::fmm::types::{EvalState, SendPtrMut, TensorFmm};
use crate::kernel::Kernel;
use crate::traits::fmm::SourceTranslation;
use crate::traits::types::FmmError;

impl<T, const D: usize, K> SourceTranslation for TensorFmm<T, D, K>
where
    T: RlstScalar<Real = T> + Float + Default,
    K: Kernel<T, D>,
{
    type Scalar = T;

    fn p2m(&self, charges: &[T], eval: &EvalState<T>) -> Result<(), FmmError> {
        let n_coeffs = self.n_coeffs();
        let multipole_ptr = SendPtrMut {
            raw: eval.multipoles.as_ptr() as *mut T,
        };
        let list = &self.lists.p2m;

        list.obs_n_idxs.par_iter().try_for_each(|&leaf_idx| {
            let multipole_ptr = multipole_ptr;
            let node = &self.src_tree.nodes[leaf_idx];
            let check_surface = self.upward_check_surface(node);

            let mut check_potential = vec![T::zero(); n_coeffs];
            self.kernel.evaluate(
                &check_surface,
                &self.surface,
                self.src_tree.node_points(leaf_idx),
                self.src_tree.node_normals(leaf_idx),
                &charges[node.start * self.tensor_dim..node.end * self.tensor_dim],
                &mut check_potential,
            )?;

            // Each leaf owns its multipole slice, writes are disjoint.
            let multipole = unsafe {
                std::slice::from_raw_parts_mut(multipole_ptr.raw.add(leaf_idx * n_coeffs), n_coeffs)
            };
            self.u2e.apply(
                leaf_idx,
                self.c2e_scale(node.bounds.radius),
                &check_potential,
                multipole,
            );
            Ok(())
        })
    }

    fn m2m(&self, height: usize, eval: &EvalState<T>) -> Result<(), FmmError> {
        let n_coeffs = self.n_coeffs();
        let multipole_ptr = SendPtrMut {
            raw: eval.multipoles.as_ptr() as *mut T,
        };
        let list = &self.lists.m2m[height];

        (0..list.n_obs()).into_par_iter().try_for_each(|i| {
            let multipole_ptr = multipole_ptr;
            let parent_idx = list.obs_n_idxs[i];
            let parent = &self.src_tree.nodes[parent_idx];
            let check_surface = self.upward_check_surface(parent);

            // Children sit strictly below this height, so their multipoles
            // are final and safe to read concurrently.
            let mut check_potential = vec![T::zero(); n_coeffs];
            for &child_idx in list.srcs(i) {
                let child = &self.src_tree.nodes[child_idx];
                let child_equiv_surface = self.upward_equiv_surface(child);
                self.kernel.evaluate(
                    &check_surface,
                    &self.surface,
                    &child_equiv_surface,
                    &self.surface,
                    &eval.multipoles[child_idx * n_coeffs..(child_idx + 1) * n_coeffs],
                    &mut check_potential,
                )?;
            }

            let multipole = unsafe {
                std::slice::from_raw_parts_mut(
                    multipole_ptr.raw.add(parent_idx * n_coeffs),
                    n_coeffs,
                )
            };
            self.u2e.apply(
                parent_idx,
                self.c2e_scale(parent.bounds.radius),
                &check_potential,
                multipole,
            );
            Ok(())
        })
    }
}
