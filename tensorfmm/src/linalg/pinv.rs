//! Implementation of Moore-Penrose PseudoInverse
use num::Float;
use rlst::{
    rlst_dynamic_array2, Array, BaseArray, MatrixSvd, RlstScalar, Shape, SvdMode, VectorContainer,
};

use crate::traits::types::FmmError;

/// Matrix type
pub type PinvMatrix<T> = Array<T, BaseArray<T, VectorContainer<T>, 2>, 2>;

type PinvReturnType<T> = Result<(Vec<T>, PinvMatrix<T>, PinvMatrix<T>), FmmError>;

/// Compute the (Moore-Penrose) pseudo-inverse of a matrix.
///
/// Calculate a generalised inverse using its singular value decomposition
/// `U @ S @ V*`. If `s` is the maximum singular value, then the significance
/// cut-off value is determined by `atol + rtol * s`. Any singular value below
/// this is assumed insignificant. The inverse is returned in component form
/// `(s⁻¹, Uᵀ, V)` so callers can keep the two factors separate and avoid
/// forming an ill-conditioned product.
///
/// # Arguments
/// * `mat` - (M, N) matrix to be inverted.
/// * `atol` - Absolute threshold term, default is 0.
/// * `rtol` - Relative threshold term, default value is max(M, N) * eps
pub(crate) fn pinv<T>(mat: &PinvMatrix<T>, atol: Option<T>, rtol: Option<T>) -> PinvReturnType<T>
where
    T: RlstScalar<Real = T> + num::Float + Default + MatrixSvd,
{
    let shape = mat.shape();

    if shape[0] == 0 || shape[1] == 0 {
        return Err(FmmError::InvalidConfig(format!(
            "cannot invert an empty matrix of shape [{}, {}]",
            shape[0], shape[1]
        )));
    }

    let k = std::cmp::min(shape[0], shape[1]);
    let mut u = rlst_dynamic_array2!(T, [shape[0], k]);
    let mut s = vec![T::zero(); k];
    let mut vt = rlst_dynamic_array2!(T, [k, shape[1]]);

    let mut mat_copy = rlst_dynamic_array2!(T, shape);
    mat_copy.fill_from(mat.view());
    mat_copy
        .into_svd_alloc(u.view_mut(), vt.view_mut(), &mut s[..], SvdMode::Reduced)
        .map_err(|_| FmmError::NumericallySingular)?;

    let eps = Float::epsilon();
    let max_dim = T::from(std::cmp::max(shape[0], shape[1])).unwrap();

    let atol = atol.unwrap_or_else(T::zero);
    let rtol = rtol.unwrap_or(max_dim * eps);

    let max_s = s[0];
    if max_s == T::zero() {
        return Err(FmmError::NumericallySingular);
    }

    let threshold = (atol + rtol) * max_s;

    // Filter singular values below this threshold
    for s in s.iter_mut() {
        if *s > threshold {
            *s = T::one() / *s;
        } else {
            *s = T::zero();
        }
    }

    // Return pseudo-inverse in component form
    let mut v = rlst_dynamic_array2!(T, [vt.shape()[1], vt.shape()[0]]);
    let mut ut = rlst_dynamic_array2!(T, [u.shape()[1], u.shape()[0]]);
    v.fill_from(vt.transpose());
    ut.fill_from(u.transpose());

    Ok((s, ut, v))
}
