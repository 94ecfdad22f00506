//! Integration test: evaluation of whole genomes, including instances that
//! abort mid-run.

use rand::SeedableRng;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use evorobot_engine::config::ExperimentConfig;
use evorobot_engine::error::DecodeError;
use evorobot_engine::sim::collision::CollisionKind;
use evorobot_engine::sim::constants::evaluation::SENTINEL_FITNESS;
use evorobot_engine::sim::fitness::{EndPointBC, SingleGoalPoint};
use evorobot_engine::sim::network::{DenseGenome, GenomeDecoder, Network, StackDecode, TeamDecode};
use evorobot_engine::sim::substrate::SubstrateDescription;
use evorobot_engine::sim::{BrainTopology, Environment, Evaluator, SimRng};
use evorobot_engine::util::point::Point2D;

// ── Broken controllers ───────────────────────────────────────────────

/// Emits a constant for every output
#[derive(Debug)]
struct Constant {
    value: f32,
    inputs: usize,
    outputs: usize,
}

impl Network for Constant {
    fn set_input_signals(&mut self, _inputs: &[f32]) {}

    fn multiple_steps(&mut self, _steps: usize) {}

    fn output_signal(&self, _index: usize) -> f32 {
        self.value
    }

    fn input_count(&self) -> usize {
        self.inputs
    }

    fn output_count(&self) -> usize {
        self.outputs
    }
}

#[derive(Debug)]
struct ConstantDecoder(f32);

impl GenomeDecoder for ConstantDecoder {
    fn decode_homogeneous(&self, s: &SubstrateDescription) -> Result<Box<dyn Network>, DecodeError> {
        Ok(Box::new(Constant {
            value: self.0,
            inputs: s.input_count(),
            outputs: s.output_count,
        }))
    }

    fn decode_team(&self, s: &SubstrateDescription, n: usize) -> Result<TeamDecode, DecodeError> {
        Ok(TeamDecode {
            network: Box::new(Constant {
                value: self.0,
                inputs: n * s.input_count(),
                outputs: n * s.output_count,
            }),
            z_coordinates: vec![0.0; n],
        })
    }

    fn decode_stack(&self, s: &SubstrateDescription, n: usize, depth: usize) -> Result<StackDecode, DecodeError> {
        let networks = (0..depth)
            .map(|_| self.decode_team(s, n).map(|t| t.network))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(StackDecode {
            networks,
            z_coordinates: vec![0.0; n],
        })
    }
}

/// Refuses every substrate
#[derive(Debug)]
struct Undecodable;

impl GenomeDecoder for Undecodable {
    fn decode_homogeneous(&self, s: &SubstrateDescription) -> Result<Box<dyn Network>, DecodeError> {
        Err(DecodeError::InputWidth {
            expected: 1,
            actual: s.input_count(),
        })
    }

    fn decode_team(&self, s: &SubstrateDescription, _n: usize) -> Result<TeamDecode, DecodeError> {
        self.decode_homogeneous(s).map(|network| TeamDecode {
            network,
            z_coordinates: Vec::new(),
        })
    }

    fn decode_stack(&self, _s: &SubstrateDescription, _n: usize, depth: usize) -> Result<StackDecode, DecodeError> {
        Err(DecodeError::StackSize(depth))
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────

fn arena() -> Environment {
    let mut env = Environment::bounded_arena("arena", 500.0, 300.0);
    env.start_point = Point2D::new(50.0, 150.0);
    env.group_orientation = 90.0;
    env.robot_spacing = 25.0;
    env.poi.push(Point2D::new(450.0, 150.0));
    env
}

fn config() -> ExperimentConfig {
    ExperimentConfig {
        number_robots: 3,
        evaluation_time: 3.0,
        times_to_run_environments: 2,
        ..ExperimentConfig::default()
    }
}

fn evaluator(config: ExperimentConfig) -> Evaluator {
    Evaluator::new(
        config,
        vec![arena(), arena()],
        Box::new(SingleGoalPoint::default()),
        Some(Box::new(EndPointBC::default())),
    )
    .unwrap()
}

fn dense(seed: u64) -> Arc<dyn GenomeDecoder> {
    Arc::new(DenseGenome::random(&mut SimRng::seed_from_u64(seed)))
}

// ── Tests ────────────────────────────────────────────────────────────

#[test]
fn non_finite_pose_scores_sentinel() {
    let ev = evaluator(config());
    let result = ev.evaluate(Arc::new(ConstantDecoder(f32::INFINITY)));

    assert_eq!(result.aborted, 4);
    assert!((result.fitness - SENTINEL_FITNESS).abs() < 1e-15);
    assert!(result.behavior.is_empty());
    assert_eq!(ev.metrics().instances_aborted.load(Ordering::Relaxed), 4);
    assert_eq!(ev.metrics().instances_completed.load(Ordering::Relaxed), 0);
}

#[test]
fn nan_outputs_are_counted_and_trials_complete() {
    let ev = evaluator(ExperimentConfig {
        topology: BrainTopology::PerRobotClone,
        ..config()
    });
    let result = ev.evaluate(Arc::new(ConstantDecoder(f32::NAN)));

    assert_eq!(result.aborted, 0);
    assert_eq!(ev.metrics().instances_completed.load(Ordering::Relaxed), 4);
    assert_eq!(ev.metrics().instances_aborted.load(Ordering::Relaxed), 0);
    // One NaN activation per robot per tick: 4 trials x 19 ticks x 3 robots
    assert_eq!(ev.metrics().nan_outputs.load(Ordering::Relaxed), 4 * 19 * 3);

    // The tick-0 poses were still finite, so the goal credit is real
    assert!(result.fitness.is_finite());
    assert!(result.fitness > SENTINEL_FITNESS);
    assert_eq!(result.behavior.len(), 24);
    assert!(result.behavior.iter().all(|v| v.is_nan()));
}

#[test]
fn decode_failure_scores_sentinel() {
    let ev = evaluator(config());
    let result = ev.evaluate(Arc::new(Undecodable));
    assert_eq!(result.aborted, 4);
    assert!((result.fitness - SENTINEL_FITNESS).abs() < 1e-15);
}

#[test]
fn aborts_do_not_disturb_siblings() {
    let ev = evaluator(config());
    let good = dense(9);
    let alone = ev.evaluate(Arc::clone(&good));

    let population: Vec<Arc<dyn GenomeDecoder>> = vec![
        Arc::new(ConstantDecoder(f32::INFINITY)),
        Arc::clone(&good),
        Arc::new(Undecodable),
    ];
    let results = ev.evaluate_population(&population);

    assert_eq!(results.len(), 3);
    assert_eq!(results[1], alone);
    assert_eq!(results[1].aborted, 0);
    assert_eq!(results[0].aborted, 4);
    assert_eq!(results[2].aborted, 4);
}

#[test]
fn idle_team_completes_every_trial() {
    let ev = evaluator(config());
    let result = ev.evaluate(Arc::new(ConstantDecoder(0.5)));

    assert_eq!(result.aborted, 0);
    // 2 environments x 2 trials x 3 robots x (x, y)
    assert_eq!(result.behavior.len(), 24);
    assert_eq!(&result.behavior[0..2], &[50.0, 150.0]);
    assert_eq!(&result.behavior[2..4], &[50.0, 175.0]);
    // 3.0 s at 0.16 s per tick rounds up to 19 ticks
    assert_eq!(ev.metrics().ticks.load(Ordering::Relaxed), 4 * 19);
}

#[test]
fn noisy_evaluation_is_reproducible() {
    let noisy = ExperimentConfig {
        sensor_noise: 20.0,
        effector_noise: 10.0,
        heading_noise: 15.0,
        collision: CollisionKind::Grid,
        ..config()
    };
    let genome = dense(12);
    let a = evaluator(noisy.clone()).evaluate(Arc::clone(&genome));
    let b = evaluator(noisy).evaluate(genome);
    assert_eq!(a, b);
}

#[test]
fn grid_and_standard_evaluate_identically() {
    let genome = dense(3);
    let standard = evaluator(config()).evaluate(Arc::clone(&genome));
    let grid = evaluator(ExperimentConfig {
        collision: CollisionKind::Grid,
        ..config()
    })
    .evaluate(genome);
    assert_eq!(standard, grid);
}
