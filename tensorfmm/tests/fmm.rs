//! End-to-end tests of the FMM against direct evaluation.
extern crate blas_src;
extern crate lapack_src;

use approx::assert_relative_eq;
use rand::prelude::*;

use tensorfmm::fmm::builder::FmmBuilder;
use tensorfmm::fmm::types::FmmConfig;
use tensorfmm::kernel::{direct_eval, get_by_name, AnyKernel};
use tensorfmm::traits::types::FmmError;
use tensorfmm::tree::helpers::{normals_fixture, points_fixture};
use tensorfmm::tree::Tree;

/// Permute a charge vector from input order into a tree's reordered index
/// order.
fn to_tree_order<const D: usize>(
    charges: &[f64],
    tree: &Tree<f64, D>,
    tensor_dim: usize,
) -> Vec<f64> {
    let mut reordered = vec![0.0; charges.len()];
    for (new, &orig) in tree.orig_idx.iter().enumerate() {
        for c in 0..tensor_dim {
            reordered[new * tensor_dim + c] = charges[orig * tensor_dim + c];
        }
    }
    reordered
}

fn max_relative_error(found: &[f64], expected: &[f64]) -> f64 {
    let scale = expected.iter().fold(0.0f64, |acc, &x| acc.max(x.abs()));
    found
        .iter()
        .zip(expected.iter())
        .fold(0.0f64, |acc, (&f, &e)| acc.max((f - e).abs()))
        / scale
}

fn build_fmm_over<const D: usize>(
    points: &[f64],
    normals: &[f64],
    kernel_name: &str,
    params: &[f64],
    config: FmmConfig<f64>,
) -> tensorfmm::TensorFmm<f64, D, AnyKernel<f64>> {
    let obs_tree =
        Tree::<f64, D>::from_points(points.to_vec(), normals.to_vec(), config.leaf_capacity)
            .unwrap();
    let src_tree =
        Tree::<f64, D>::from_points(points.to_vec(), normals.to_vec(), config.leaf_capacity)
            .unwrap();
    let kernel = get_by_name::<f64, D>(kernel_name, params).unwrap();
    FmmBuilder::new()
        .trees(obs_tree, src_tree)
        .unwrap()
        .parameters(config, kernel)
        .unwrap()
        .build()
        .unwrap()
}

#[test]
fn test_two_charges_in_the_plane() {
    // Two opposite charges on the x axis, one distant observation point.
    let src_points = vec![0.0, 0.0, 1.0, 0.0];
    let src_normals = vec![0.0, 1.0, 0.0, 1.0];
    let obs_points = vec![10.0, 0.0];
    let obs_normals = vec![0.0, 1.0];

    let obs_tree = Tree::<f64, 2>::from_points(obs_points, obs_normals, 1).unwrap();
    let src_tree = Tree::<f64, 2>::from_points(src_points, src_normals, 1).unwrap();

    let config = FmmConfig {
        order: 8,
        mac: 0.4,
        leaf_capacity: 1,
        ..Default::default()
    };
    let kernel = get_by_name::<f64, 2>("invr", &[]).unwrap();
    let mut fmm = FmmBuilder::new()
        .trees(obs_tree, src_tree)
        .unwrap()
        .parameters(config, kernel)
        .unwrap()
        .build()
        .unwrap();

    let charges = to_tree_order(&[1.0, -1.0], &fmm.src_tree, 1);
    let potentials = fmm.evaluate(&charges).unwrap();

    let expected = 1.0 / 10.0 - 1.0 / 9.0;
    assert_eq!(potentials.len(), 1);
    assert_relative_eq!(potentials[0], expected, epsilon = 1e-6);
}

#[test]
fn test_self_evaluation_against_direct() {
    let n_points = 1000;
    let points = points_fixture::<f64, 3>(n_points, None, None, Some(0));
    let normals = normals_fixture::<f64, 3>(n_points, Some(1));
    let charges = vec![1.0; n_points];

    for (order, threshold) in [(6, 1e-4), (10, 1e-6)] {
        let config = FmmConfig {
            order,
            ..Default::default()
        };
        let mut fmm = build_fmm_over::<3>(&points, &normals, "invr", &[], config);

        let charges_tree = to_tree_order(&charges, &fmm.src_tree, 1);
        let found = fmm.evaluate(&charges_tree).unwrap();

        let expected = direct_eval::<f64, 3, _>(
            &fmm.kernel,
            &fmm.obs_tree.points,
            &fmm.obs_tree.normals,
            &fmm.src_tree.points,
            &fmm.src_tree.normals,
            &charges_tree,
        )
        .unwrap();

        let error = max_relative_error(&found, &expected);
        assert!(
            error < threshold,
            "order {order}: max relative error {error} above {threshold}"
        );
    }
}

#[test]
fn test_elastic_displacement_linearity() {
    let n_points = 500;
    let points = points_fixture::<f64, 3>(n_points, None, None, Some(2));
    let normals = normals_fixture::<f64, 3>(n_points, Some(3));

    let config = FmmConfig {
        order: 4,
        ..Default::default()
    };
    let mut fmm = build_fmm_over::<3>(&points, &normals, "elasticU", &[1.0, 0.25], config);

    let mut rng = StdRng::seed_from_u64(4);
    let q1: Vec<f64> = (0..n_points * 3).map(|_| rng.gen_range(-1.0..1.0)).collect();
    let q2: Vec<f64> = (0..n_points * 3).map(|_| rng.gen_range(-1.0..1.0)).collect();
    let a: f64 = rng.gen_range(-2.0..2.0);
    let b: f64 = rng.gen_range(-2.0..2.0);

    let u1 = fmm.evaluate(&q1).unwrap();
    let u2 = fmm.evaluate(&q2).unwrap();

    let combined: Vec<f64> = q1.iter().zip(q2.iter()).map(|(&x, &y)| a * x + b * y).collect();
    let u_combined = fmm.evaluate(&combined).unwrap();

    let expected: Vec<f64> = u1.iter().zip(u2.iter()).map(|(&x, &y)| a * x + b * y).collect();
    let error = max_relative_error(&u_combined, &expected);
    assert!(error < 1e-10, "linearity violated, max relative error {error}");
}

#[test]
fn test_elastic_displacement_against_direct() {
    let n_points = 400;
    let points = points_fixture::<f64, 3>(n_points, None, None, Some(5));
    let normals = normals_fixture::<f64, 3>(n_points, Some(6));

    let config = FmmConfig {
        order: 8,
        ..Default::default()
    };
    let mut fmm = build_fmm_over::<3>(&points, &normals, "elasticU", &[1.0, 0.25], config);

    let mut rng = StdRng::seed_from_u64(7);
    let charges: Vec<f64> = (0..n_points * 3).map(|_| rng.gen_range(-1.0..1.0)).collect();

    let found = fmm.evaluate(&charges).unwrap();
    let expected = direct_eval::<f64, 3, _>(
        &fmm.kernel,
        &fmm.obs_tree.points,
        &fmm.obs_tree.normals,
        &fmm.src_tree.points,
        &fmm.src_tree.normals,
        &charges,
    )
    .unwrap();

    let error = max_relative_error(&found, &expected);
    assert!(error < 1e-5, "max relative error {error}");
}

#[test]
fn test_traction_kernel_linearity() {
    let n_points = 200;
    let points = points_fixture::<f64, 3>(n_points, None, None, Some(8));
    let normals = normals_fixture::<f64, 3>(n_points, Some(9));

    let config = FmmConfig {
        order: 4,
        ..Default::default()
    };
    let mut fmm = build_fmm_over::<3>(&points, &normals, "elasticT", &[1.0, 0.25], config);

    let mut rng = StdRng::seed_from_u64(10);
    let q1: Vec<f64> = (0..n_points * 3).map(|_| rng.gen_range(-1.0..1.0)).collect();
    let q2: Vec<f64> = (0..n_points * 3).map(|_| rng.gen_range(-1.0..1.0)).collect();

    let u1 = fmm.evaluate(&q1).unwrap();
    let u2 = fmm.evaluate(&q2).unwrap();

    let combined: Vec<f64> = q1.iter().zip(q2.iter()).map(|(&x, &y)| 0.5 * x - 2.0 * y).collect();
    let u_combined = fmm.evaluate(&combined).unwrap();

    let expected: Vec<f64> = u1.iter().zip(u2.iter()).map(|(&x, &y)| 0.5 * x - 2.0 * y).collect();
    let error = max_relative_error(&u_combined, &expected);
    assert!(error < 1e-10, "linearity violated, max relative error {error}");
}

#[test]
fn test_mac_boundary_is_rejected() {
    // With outer_r = 2 the MAC bound is 1/(outer_r - 1) = 1; sitting exactly
    // on the bound must be rejected.
    let n_points = 100;
    let points = points_fixture::<f64, 3>(n_points, None, None, Some(11));
    let normals = normals_fixture::<f64, 3>(n_points, Some(12));
    let obs_tree = Tree::<f64, 3>::from_points(points.clone(), normals.clone(), 50).unwrap();
    let src_tree = Tree::<f64, 3>::from_points(points, normals, 50).unwrap();

    let config = FmmConfig {
        outer_r: 2.0,
        mac: 1.0,
        ..Default::default()
    };
    let kernel = get_by_name::<f64, 3>("invr", &[]).unwrap();
    let result = FmmBuilder::new()
        .trees(obs_tree, src_tree)
        .unwrap()
        .parameters(config, kernel);
    assert!(matches!(result, Err(FmmError::InvalidConfig(_))));
}

#[test]
fn test_clustered_cloud_against_direct() {
    // Points confined to one octant; the tree drops empty orthants and the
    // evaluation must still match direct summation.
    let n_points = 100;
    let points = points_fixture::<f64, 3>(n_points, Some(0.0), Some(0.25), Some(13));
    let normals = normals_fixture::<f64, 3>(n_points, Some(14));

    let config = FmmConfig {
        order: 8,
        leaf_capacity: 10,
        ..Default::default()
    };
    let mut fmm = build_fmm_over::<3>(&points, &normals, "invr", &[], config);

    for node in fmm.obs_tree.nodes.iter() {
        for &child in node.children.iter() {
            assert!(fmm.obs_tree.nodes[child].n_points() > 0);
        }
    }

    let mut rng = StdRng::seed_from_u64(15);
    let charges: Vec<f64> = (0..n_points).map(|_| rng.gen_range(-1.0..1.0)).collect();

    let found = fmm.evaluate(&charges).unwrap();
    let expected = direct_eval::<f64, 3, _>(
        &fmm.kernel,
        &fmm.obs_tree.points,
        &fmm.obs_tree.normals,
        &fmm.src_tree.points,
        &fmm.src_tree.normals,
        &charges,
    )
    .unwrap();

    let error = max_relative_error(&found, &expected);
    assert!(error < 1e-6, "max relative error {error}");
}

#[test]
fn test_log_kernel_in_the_plane() {
    // The 2D log kernel is not homogeneous, exercising the per-radius
    // operator cache.
    let n_points = 300;
    let points = points_fixture::<f64, 2>(n_points, None, None, Some(16));
    let normals = normals_fixture::<f64, 2>(n_points, Some(17));

    let config = FmmConfig {
        order: 8,
        leaf_capacity: 20,
        ..Default::default()
    };
    let mut fmm = build_fmm_over::<2>(&points, &normals, "logr", &[], config);

    let mut rng = StdRng::seed_from_u64(18);
    let charges: Vec<f64> = (0..n_points).map(|_| rng.gen_range(-1.0..1.0)).collect();

    let found = fmm.evaluate(&charges).unwrap();
    let expected = direct_eval::<f64, 2, _>(
        &fmm.kernel,
        &fmm.obs_tree.points,
        &fmm.obs_tree.normals,
        &fmm.src_tree.points,
        &fmm.src_tree.normals,
        &charges,
    )
    .unwrap();

    let error = max_relative_error(&found, &expected);
    assert!(error < 1e-4, "max relative error {error}");
}

#[test]
fn test_every_pair_is_delivered_exactly_once() {
    // The constant kernel turns the FMM into a sum over source charges: the
    // translation operators reproduce it exactly, so any missed or doubled
    // leaf pair shows up as a wrong count.
    let n_points = 350;
    let points = points_fixture::<f64, 3>(n_points, None, None, Some(19));
    let normals = normals_fixture::<f64, 3>(n_points, Some(20));

    let config = FmmConfig {
        order: 3,
        leaf_capacity: 7,
        ..Default::default()
    };
    let mut fmm = build_fmm_over::<3>(&points, &normals, "one", &[], config);

    let mut rng = StdRng::seed_from_u64(21);
    let charges: Vec<f64> = (0..n_points).map(|_| rng.gen_range(-1.0..1.0)).collect();
    let total: f64 = charges.iter().sum();

    let potentials = fmm.evaluate(&charges).unwrap();
    for &u in potentials.iter() {
        assert_relative_eq!(u, total, max_relative = 1e-10);
    }
}

#[test]
fn test_p2p_only_on_a_single_leaf_is_direct() {
    let n_points = 80;
    let points = points_fixture::<f64, 3>(n_points, None, None, Some(22));
    let normals = normals_fixture::<f64, 3>(n_points, Some(23));

    // Capacity above the point count collapses both trees to single leaves,
    // so the P2P list is the whole product and nothing else contributes.
    let config = FmmConfig {
        order: 4,
        leaf_capacity: 200,
        ..Default::default()
    };
    let fmm = build_fmm_over::<3>(&points, &normals, "invr", &[], config);

    let mut rng = StdRng::seed_from_u64(24);
    let charges: Vec<f64> = (0..n_points).map(|_| rng.gen_range(-1.0..1.0)).collect();

    let found = fmm.evaluate_p2p_only(&charges).unwrap();
    let expected = direct_eval::<f64, 3, _>(
        &fmm.kernel,
        &fmm.obs_tree.points,
        &fmm.obs_tree.normals,
        &fmm.src_tree.points,
        &fmm.src_tree.normals,
        &charges,
    )
    .unwrap();

    let error = max_relative_error(&found, &expected);
    assert!(error < 1e-13, "max relative error {error}");
}

#[test]
fn test_determinism() {
    let n_points = 600;
    let points = points_fixture::<f64, 3>(n_points, None, None, Some(25));
    let normals = normals_fixture::<f64, 3>(n_points, Some(26));

    let config = FmmConfig {
        order: 4,
        ..Default::default()
    };
    let mut fmm = build_fmm_over::<3>(&points, &normals, "invr", &[], config);

    let mut rng = StdRng::seed_from_u64(27);
    let charges: Vec<f64> = (0..n_points).map(|_| rng.gen_range(-1.0..1.0)).collect();

    let first = fmm.evaluate(&charges).unwrap();
    let second = fmm.evaluate(&charges).unwrap();
    assert_eq!(first, second);

    assert!(!fmm.times.is_empty());
}

#[test]
fn test_charge_vector_shape_is_checked() {
    let n_points = 50;
    let points = points_fixture::<f64, 3>(n_points, None, None, Some(28));
    let normals = normals_fixture::<f64, 3>(n_points, Some(29));

    let config = FmmConfig::default();
    let mut fmm = build_fmm_over::<3>(&points, &normals, "elasticU", &[1.0, 0.25], config);

    // elasticU has tensor dimension 3, a scalar-sized vector must fail.
    let charges = vec![1.0; n_points];
    assert!(matches!(
        fmm.evaluate(&charges),
        Err(FmmError::ShapeMismatch { .. })
    ));
    assert!(matches!(
        fmm.evaluate_p2p_only(&charges),
        Err(FmmError::ShapeMismatch { .. })
    ));
}

#[test]
fn test_observation_and_source_clouds_can_differ() {
    let n_src = 500;
    let n_obs = 250;
    let src_points = points_fixture::<f64, 3>(n_src, Some(0.0), Some(1.0), Some(30));
    let src_normals = normals_fixture::<f64, 3>(n_src, Some(31));
    let obs_points = points_fixture::<f64, 3>(n_obs, Some(2.0), Some(3.0), Some(32));
    let obs_normals = normals_fixture::<f64, 3>(n_obs, Some(33));

    let obs_tree = Tree::<f64, 3>::from_points(obs_points, obs_normals, 30).unwrap();
    let src_tree = Tree::<f64, 3>::from_points(src_points, src_normals, 30).unwrap();

    let config = FmmConfig {
        order: 8,
        leaf_capacity: 30,
        ..Default::default()
    };
    let kernel = get_by_name::<f64, 3>("invr", &[]).unwrap();
    let mut fmm = FmmBuilder::new()
        .trees(obs_tree, src_tree)
        .unwrap()
        .parameters(config, kernel)
        .unwrap()
        .build()
        .unwrap();

    let mut rng = StdRng::seed_from_u64(34);
    let charges: Vec<f64> = (0..n_src).map(|_| rng.gen_range(-1.0..1.0)).collect();

    let found = fmm.evaluate(&charges).unwrap();
    let expected = direct_eval::<f64, 3, _>(
        &fmm.kernel,
        &fmm.obs_tree.points,
        &fmm.obs_tree.normals,
        &fmm.src_tree.points,
        &fmm.src_tree.normals,
        &charges,
    )
    .unwrap();

    assert_eq!(found.len(), n_obs);
    let error = max_relative_error(&found, &expected);
    assert!(error < 1e-5, "max relative error {error}");
}
