//! Helper functions used in testing tree implementations, specifically test
//! point and normal generators.
use num::Float;
use rand::prelude::*;

/// Points fixture for testing, uniformly samples each axis from min to max.
/// Returned flat row-major, `D` coordinates per point.
///
/// # Arguments
/// * `n_points` - The number of points to sample.
/// * `min` - The minimum coordinate value along each axis.
/// * `max` - The maximum coordinate value along each axis.
/// * `seed` - RNG seed, defaults to 0.
pub fn points_fixture<T, const D: usize>(
    n_points: usize,
    min: Option<T>,
    max: Option<T>,
    seed: Option<u64>,
) -> Vec<T>
where
    T: Float + rand::distributions::uniform::SampleUniform,
{
    let seed = seed.unwrap_or(0);
    let mut range = StdRng::seed_from_u64(seed);

    let between;
    if let (Some(min), Some(max)) = (min, max) {
        between = rand::distributions::Uniform::from(min..max);
    } else {
        between = rand::distributions::Uniform::from(T::zero()..T::one());
    }

    let mut points = Vec::with_capacity(n_points * D);
    for _ in 0..n_points {
        for _ in 0..D {
            points.push(between.sample(&mut range));
        }
    }

    points
}

/// Normals fixture for testing, uniformly samples directions and normalises
/// them. Returned flat row-major, `D` components per point.
///
/// # Arguments
/// * `n_points` - The number of normals to sample.
/// * `seed` - RNG seed, defaults to 0.
pub fn normals_fixture<T, const D: usize>(n_points: usize, seed: Option<u64>) -> Vec<T>
where
    T: Float + rand::distributions::uniform::SampleUniform,
{
    let seed = seed.unwrap_or(0);
    let mut range = StdRng::seed_from_u64(seed);
    let between = rand::distributions::Uniform::from(-T::one()..T::one());

    let mut normals = Vec::with_capacity(n_points * D);
    for _ in 0..n_points {
        let mut v = [T::zero(); D];
        loop {
            for component in v.iter_mut() {
                *component = between.sample(&mut range);
            }
            let norm = v.iter().fold(T::zero(), |acc, &x| acc + x * x).sqrt();
            if norm > T::from(1e-3).unwrap() {
                for component in v.iter_mut() {
                    *component = *component / norm;
                }
                break;
            }
        }
        normals.extend_from_slice(&v);
    }

    normals
}
