//! Translation surfaces for the kernel independent FMM.
//!
//! The canonical surface is a lattice over the shell of an `order`-per-axis
//! cube, projected radially onto the unit sphere (unit circle in 2D). The
//! projection keeps the lattice's point count, `6·order² - 12·order + 8` in
//! 3D and `4·order - 4` in 2D, while giving every point a natural outward
//! normal: itself. Per-node placements are produced by translate-and-scale
//! of the canonical surface; it is never materialised per node.
use num::Float;

/// Number of points discretising the translation surface for a given
/// expansion order.
///
/// # Arguments
/// * `order` - Expansion order, at least 2.
/// * `dim` - Spatial dimension, 2 or 3.
pub fn n_surf(order: usize, dim: usize) -> usize {
    match dim {
        2 => 4 * order - 4,
        3 => 6 * order * order - 12 * order + 8,
        _ => unreachable!("surfaces are only defined in two or three dimensions"),
    }
}

/// Compute the canonical translation surface for a given expansion order:
/// unit-norm points, flat row-major `[x_1, y_1, z_1, ..., x_S, y_S, z_S]`.
/// Deterministic, lattice-ordered.
///
/// # Arguments
/// * `order` - Expansion order, at least 2.
pub fn surface_grid<T, const D: usize>(order: usize) -> Vec<T>
where
    T: Float,
{
    let n_coeffs = n_surf(order, D);
    let mut surface: Vec<T> = Vec::with_capacity(D * n_coeffs);

    let lower = 0;
    let upper = order - 1;
    let two = T::from(2.0).unwrap();
    let step = two / T::from(order - 1).unwrap();
    let to_unit_cube = |index: usize| T::from(index).unwrap() * step - T::one();

    match D {
        2 => {
            for j in 0..order {
                for i in 0..order {
                    if i == lower || i == upper || j == lower || j == upper {
                        surface.push(to_unit_cube(i));
                        surface.push(to_unit_cube(j));
                    }
                }
            }
        }
        3 => {
            for k in 0..order {
                for j in 0..order {
                    for i in 0..order {
                        if (k == lower || k == upper)
                            || (i == lower || i == upper)
                            || (j == lower || j == upper)
                        {
                            surface.push(to_unit_cube(i));
                            surface.push(to_unit_cube(j));
                            surface.push(to_unit_cube(k));
                        }
                    }
                }
            }
        }
        _ => unreachable!("surfaces are only defined in two or three dimensions"),
    }

    debug_assert_eq!(surface.len(), D * n_coeffs);

    // Project the cube shell onto the unit sphere. Cube-shell points have
    // max-norm 1, so no two of them share a direction and the projection is
    // injective.
    for point in surface.chunks_exact_mut(D) {
        let norm = point
            .iter()
            .fold(T::zero(), |acc, &x| acc + x * x)
            .sqrt();
        for component in point.iter_mut() {
            *component = *component / norm;
        }
    }

    surface
}

/// Place the canonical surface around a node: scale by `radius · factor` and
/// translate to `center`.
///
/// # Arguments
/// * `surface` - The canonical unit surface.
/// * `center` - Node center.
/// * `radius` - Node radius.
/// * `factor` - Surface radius factor, the equivalent or check multiplier.
pub fn scale_surface<T, const D: usize>(
    surface: &[T],
    center: &[T; D],
    radius: T,
    factor: T,
) -> Vec<T>
where
    T: Float,
{
    let scale = radius * factor;
    let mut scaled = Vec::with_capacity(surface.len());
    for point in surface.chunks_exact(D) {
        for axis in 0..D {
            scaled.push(point[axis] * scale + center[axis]);
        }
    }
    scaled
}
