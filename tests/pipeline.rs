mod common;

use common::synthetic_scene::{manhattan_scene, HEIGHT, WIDTH};
use ortho_vp::sdp::{ConvexSolver, SdpProblem, SdpSolution, SolveStatus, SolverError};
use ortho_vp::{
    process_lines, ImageSize, Line2D, PipelineParams, SearchParams, VpEstimator, VpReport,
};

fn image_size() -> ImageSize {
    ImageSize {
        width: WIDTH,
        height: HEIGHT,
    }
}

#[test]
fn too_few_lines_become_an_error_report() {
    let lines: Vec<Line2D> = (0..12)
        .map(|i| Line2D::new(10.0 * i as f64, 5.0, 10.0 * i as f64 + 8.0, 5.0))
        .collect();
    let report = process_lines(&lines, image_size(), None, &PipelineParams::default());

    assert_eq!(report.status(), "error");
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["status"], "error");
    let message = json["message"].as_str().unwrap();
    assert!(
        message.contains("not enough line segments (0 < 10)"),
        "unexpected message: {message}"
    );
}

#[test]
fn invalid_params_become_an_error_report() {
    let scene = manhattan_scene(1, [6, 5, 4], 30.2);
    let params = PipelineParams {
        search: SearchParams {
            sample_size: 0,
            ..SearchParams::default()
        },
        ..PipelineParams::default()
    };
    let report = process_lines(&scene.lines, image_size(), None, &params);
    match report {
        VpReport::Error { message } => assert!(message.contains("sample_size")),
        other => panic!("expected an error report, got {other:?}"),
    }
}

#[test]
fn success_report_has_three_vps_and_an_association_per_line() {
    let _ = env_logger::builder().is_test(true).try_init();
    let scene = manhattan_scene(42, [24, 16, 10], 30.2);
    let params = PipelineParams {
        use_uncertainty: false,
        search: SearchParams {
            sample_size: 5,
            eigen_ratio_thresh: 2.0,
            max_iterations: 400,
            seed: Some(7),
            ..SearchParams::default()
        },
        ..PipelineParams::default()
    };
    let report = process_lines(
        &scene.lines,
        image_size(),
        Some(scene.intrinsics.clone()),
        &params,
    );
    assert!(report.is_success(), "report: {report:?}");

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["status"], "success");
    let vps = json["vps3d"].as_array().unwrap();
    assert_eq!(vps.len(), 3);
    for vp in vps {
        let v: Vec<f64> = vp
            .as_array()
            .unwrap()
            .iter()
            .map(|x| x.as_f64().unwrap())
            .collect();
        let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-9);
    }
    assert_eq!(json["vps2d"].as_array().unwrap().len(), 3);

    let associations = json["associations"].as_array().unwrap();
    assert_eq!(associations.len(), scene.lines.len());
    assert!(associations
        .iter()
        .all(|a| matches!(a.as_u64(), Some(0..=2)) || a.is_null()));
    assert_eq!(json["lines"].as_array().unwrap().len(), scene.lines.len());
    assert!(json["trace"]["iterations"].as_u64().unwrap() >= 3);
}

/// Reports every solve as stalled at the iteration cap.
struct Stalled;

impl ConvexSolver for Stalled {
    fn name(&self) -> &str {
        "stalled"
    }

    fn solve(&mut self, problem: &SdpProblem) -> Result<SdpSolution, SolverError> {
        Err(SolverError::Unsolved {
            solver: format!("stalled({})", problem.dim()),
            status: SolveStatus::MaxIterations,
        })
    }
}

#[test]
fn exhausted_search_becomes_a_failed_report() {
    let scene = manhattan_scene(8, [10, 8, 6], 30.2);
    let params = PipelineParams {
        search: SearchParams {
            max_iterations: 9,
            seed: Some(4),
            ..SearchParams::default()
        },
        ..PipelineParams::default()
    };
    let mut estimator = VpEstimator::with_solver(params, Stalled).unwrap();
    let estimate = estimator
        .estimate(&scene.lines, image_size(), Some(scene.intrinsics.clone()))
        .unwrap();
    assert!(!estimate.is_success());

    let report = VpReport::from_estimate(&estimate);
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["status"], "failed");
    assert_eq!(json["iterations"], 9);
    assert_eq!(json["trace"]["solverFailures"], 9);
    assert!(json.get("vps3d").is_none());
}
