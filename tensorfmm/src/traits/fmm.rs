//! FMM traits
use crate::fmm::types::EvalState;

use super::types::FmmError;

/// Interface for source field translations.
pub trait SourceTranslation {
    /// Scalar type of charge and expansion data.
    type Scalar;

    /// Particle to multipole translations, applied at leaf level over all source boxes.
    ///
    /// # Arguments
    /// * `charges` - Charge data in tree-reordered index order.
    /// * `eval` - Evaluation-scoped expansion buffers.
    fn p2m(&self, charges: &[Self::Scalar], eval: &EvalState<Self::Scalar>)
        -> Result<(), FmmError>;

    /// Multipole to multipole translations, applied during upward pass. Defined over each
    /// height of a tree, leaves first.
    ///
    /// # Arguments
    /// * `height` - The height of the parent nodes this translation is being applied to.
    /// * `eval` - Evaluation-scoped expansion buffers.
    fn m2m(&self, height: usize, eval: &EvalState<Self::Scalar>) -> Result<(), FmmError>;
}

/// Interface for the source to target field translations that bypass the
/// observation tree's downward sweep entry points.
pub trait SourceToTargetTranslation {
    /// Scalar type of charge and expansion data.
    type Scalar;

    /// Multipole to local translation, defined over all well separated node pairs.
    ///
    /// # Arguments
    /// * `eval` - Evaluation-scoped expansion buffers.
    fn m2l(&self, eval: &EvalState<Self::Scalar>) -> Result<(), FmmError>;

    /// Particle to local translations, applied when a source box is in the far field of an
    /// observation box but holds too few points for its multipole expansion to pay off, so
    /// its points are delivered directly to the observation box's check potential.
    ///
    /// # Arguments
    /// * `charges` - Charge data in tree-reordered index order.
    /// * `eval` - Evaluation-scoped expansion buffers.
    fn p2l(&self, charges: &[Self::Scalar], eval: &EvalState<Self::Scalar>)
        -> Result<(), FmmError>;
}

/// Interface for target field translations.
pub trait TargetTranslation {
    /// Scalar type of charge and expansion data.
    type Scalar;

    /// Local to local translations, applied during the downward pass. Defined over each
    /// depth of a tree, root first. Finalises the local expansion of every node at this
    /// depth by applying the downward check-to-equivalent inverse.
    ///
    /// # Arguments
    /// * `depth` - The depth of the nodes whose local expansions are finalised.
    /// * `eval` - Evaluation-scoped expansion buffers.
    fn l2l(&self, depth: usize, eval: &EvalState<Self::Scalar>) -> Result<(), FmmError>;

    /// Local to particle translations, applies the local expansion accumulated at each
    /// observation leaf to the points it contains.
    ///
    /// # Arguments
    /// * `eval` - Evaluation-scoped expansion buffers.
    fn l2p(&self, eval: &EvalState<Self::Scalar>) -> Result<(), FmmError>;

    /// Multipole to particle translations, applied when an observation leaf is in the far
    /// field of a source box but holds too few points for a local expansion to pay off, so
    /// the source multipole is evaluated at its points directly.
    ///
    /// # Arguments
    /// * `eval` - Evaluation-scoped expansion buffers.
    fn m2p(&self, eval: &EvalState<Self::Scalar>) -> Result<(), FmmError>;

    /// Near field particle to particle (direct) potential contributions for leaf pairs that
    /// were never well separated at any depth.
    ///
    /// # Arguments
    /// * `charges` - Charge data in tree-reordered index order.
    /// * `eval` - Evaluation-scoped expansion buffers.
    fn p2p(&self, charges: &[Self::Scalar], eval: &EvalState<Self::Scalar>)
        -> Result<(), FmmError>;
}
