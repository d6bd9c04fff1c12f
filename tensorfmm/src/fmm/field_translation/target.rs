//! Local expansion translations and direct near-field evaluation.
use num::Float;
use rayon::prelude::*;
use rlst::RlstScalar;

use crate::fmm::types::{EvalState, SendPtrMut, TensorFmm};
use crate::kernel::Kernel;
use crate::traits::fmm::TargetTranslation;
use crate::traits::types::FmmError;

impl<T, const D: usize, K> TargetTranslation for TensorFmm<T, D, K>
where
    T: RlstScalar<Real = T> + Float + Default,
    K: Kernel<T, D>,
{
    type Scalar = T;

    fn l2l(&self, depth: usize, eval: &EvalState<T>) -> Result<(), FmmError> {
        let n_coeffs = self.n_coeffs();
        let check_ptr = SendPtrMut {
            raw: eval.check_potentials.as_ptr() as *mut T,
        };
        let local_ptr = SendPtrMut {
            raw: eval.locals.as_ptr() as *mut T,
        };
        let list = &self.lists.l2l[depth];

        (0..list.n_obs()).into_par_iter().try_for_each(|i| {
            let check_ptr = check_ptr;
            let local_ptr = local_ptr;
            let child_idx = list.obs_n_idxs[i];
            let child = &self.obs_tree.nodes[child_idx];

            // A node's check potential already carries its M2L and P2L
            // contributions; what remains is the parent's local expansion,
            // finalised in the previous depth sweep.
            let check_potential = unsafe {
                std::slice::from_raw_parts_mut(check_ptr.raw.add(child_idx * n_coeffs), n_coeffs)
            };

            if !list.srcs(i).is_empty() {
                let check_surface = self.downward_check_surface(child);
                for &parent_idx in list.srcs(i) {
                    let parent = &self.obs_tree.nodes[parent_idx];
                    let parent_equiv_surface = self.downward_equiv_surface(parent);
                    self.kernel.evaluate(
                        &check_surface,
                        &self.surface,
                        &parent_equiv_surface,
                        &self.surface,
                        &eval.locals[parent_idx * n_coeffs..(parent_idx + 1) * n_coeffs],
                        check_potential,
                    )?;
                }
            }

            let local = unsafe {
                std::slice::from_raw_parts_mut(local_ptr.raw.add(child_idx * n_coeffs), n_coeffs)
            };
            self.d2e.apply(
                child_idx,
                self.c2e_scale(child.bounds.radius),
                check_potential,
                local,
            );
            Ok(())
        })
    }

    fn l2p(&self, eval: &EvalState<T>) -> Result<(), FmmError> {
        let potential_ptr = SendPtrMut {
            raw: eval.potentials.as_ptr() as *mut T,
        };
        let n_coeffs = self.n_coeffs();
        let list = &self.lists.l2p;

        list.obs_n_idxs.par_iter().try_for_each(|&leaf_idx| {
            let potential_ptr = potential_ptr;
            let node = &self.obs_tree.nodes[leaf_idx];
            let equiv_surface = self.downward_equiv_surface(node);

            // Leaf point ranges are disjoint, so each slice of the output
            // has exactly one writer per phase.
            let potential = unsafe {
                std::slice::from_raw_parts_mut(
                    potential_ptr.raw.add(node.start * self.tensor_dim),
                    node.n_points() * self.tensor_dim,
                )
            };
            self.kernel.evaluate(
                self.obs_tree.node_points(leaf_idx),
                self.obs_tree.node_normals(leaf_idx),
                &equiv_surface,
                &self.surface,
                &eval.locals[leaf_idx * n_coeffs..(leaf_idx + 1) * n_coeffs],
                potential,
            )
        })
    }

    fn m2p(&self, eval: &EvalState<T>) -> Result<(), FmmError> {
        let potential_ptr = SendPtrMut {
            raw: eval.potentials.as_ptr() as *mut T,
        };
        let n_coeffs = self.n_coeffs();
        let list = &self.lists.m2p;

        (0..list.n_obs()).into_par_iter().try_for_each(|i| {
            let potential_ptr = potential_ptr;
            let obs_idx = list.obs_n_idxs[i];
            let node = &self.obs_tree.nodes[obs_idx];

            let potential = unsafe {
                std::slice::from_raw_parts_mut(
                    potential_ptr.raw.add(node.start * self.tensor_dim),
                    node.n_points() * self.tensor_dim,
                )
            };

            for &src_idx in list.srcs(i) {
                let src = &self.src_tree.nodes[src_idx];
                let src_equiv_surface = self.upward_equiv_surface(src);
                self.kernel.evaluate(
                    self.obs_tree.node_points(obs_idx),
                    self.obs_tree.node_normals(obs_idx),
                    &src_equiv_surface,
                    &self.surface,
                    &eval.multipoles[src_idx * n_coeffs..(src_idx + 1) * n_coeffs],
                    potential,
                )?;
            }
            Ok(())
        })
    }

    fn p2p(&self, charges: &[T], eval: &EvalState<T>) -> Result<(), FmmError> {
        let potential_ptr = SendPtrMut {
            raw: eval.potentials.as_ptr() as *mut T,
        };
        let list = &self.lists.p2p;

        (0..list.n_obs()).into_par_iter().try_for_each(|i| {
            let potential_ptr = potential_ptr;
            let obs_idx = list.obs_n_idxs[i];
            let node = &self.obs_tree.nodes[obs_idx];

            let potential = unsafe {
                std::slice::from_raw_parts_mut(
                    potential_ptr.raw.add(node.start * self.tensor_dim),
                    node.n_points() * self.tensor_dim,
                )
            };

            for &src_idx in list.srcs(i) {
                let src = &self.src_tree.nodes[src_idx];
                self.kernel.evaluate(
                    self.obs_tree.node_points(obs_idx),
                    self.obs_tree.node_normals(obs_idx),
                    self.src_tree.node_points(src_idx),
                    self.src_tree.node_normals(src_idx),
                    &charges[src.start * self.tensor_dim..src.end * self.tensor_dim],
                    potential,
                )?;
            }
            Ok(())
        })
    }
}
