//! Experiment-level evaluation: environments x trials per genome
//!
//! Each trial gets a fresh instance pack: a deep copy of the environment, an
//! RNG seeded from the trial number, new robots in team formation, a new
//! agent brain, and a copy of the collision manager template. A trial that
//! aborts scores the sentinel fitness and the evaluation carries on.

use rand::{Rng, RngCore, SeedableRng};
use rayon::prelude::*;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

use crate::config::ExperimentConfig;
use crate::error::{BrainError, ConfigError};
use crate::metrics::EvaluationMetrics;
use crate::sim::brain::AgentBrain;
use crate::sim::collision::{self, CollisionManager};
use crate::sim::constants::{evaluation, robot};
use crate::sim::environment::Environment;
use crate::sim::fitness::{BehaviorCharacterization, FitnessFunction};
use crate::sim::instance::InstancePack;
use crate::sim::network::GenomeDecoder;
use crate::sim::robot::{DriveParams, Robot};
use crate::sim::step::run_evaluation;
use crate::sim::substrate::SubstrateDescription;
use crate::sim::SimRng;
use crate::util::point::Point2D;

/// Noise ceilings drawn for one trial (percent)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NoiseLevels {
    pub sensor: f64,
    pub effector: f64,
}

/// Outcome of evaluating one genome
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationResult {
    /// Mean over environments of the mean over trials
    pub fitness: f64,
    /// Objective values summed over every completed trial
    pub objectives: Vec<f64>,
    /// Behavior vectors of completed trials, concatenated
    pub behavior: Vec<f64>,
    /// Trials that scored the sentinel fitness
    pub aborted: usize,
}

#[derive(Debug)]
pub struct Evaluator {
    config: ExperimentConfig,
    environments: Vec<Environment>,
    fitness: Box<dyn FitnessFunction>,
    behavior: Option<Box<dyn BehaviorCharacterization>>,
    collision_template: Box<dyn CollisionManager>,
    metrics: Arc<EvaluationMetrics>,
}

impl Evaluator {
    pub fn new(
        config: ExperimentConfig,
        environments: Vec<Environment>,
        fitness: Box<dyn FitnessFunction>,
        behavior: Option<Box<dyn BehaviorCharacterization>>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        if environments.is_empty() {
            return Err(ConfigError::Invalid {
                field: "environments",
                requirement: "non-empty",
            });
        }

        let collision_template = collision::create(
            config.collision,
            config.collision_settings(),
            config.grid_cell_size,
        );

        Ok(Self {
            config,
            environments,
            fitness,
            behavior,
            collision_template,
            metrics: Arc::new(EvaluationMetrics::new()),
        })
    }

    pub fn with_metrics(mut self, metrics: Arc<EvaluationMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &Arc<EvaluationMetrics> {
        &self.metrics
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    pub fn environments(&self) -> &[Environment] {
        &self.environments
    }

    /// Per-robot substrate for the configured robot model
    pub fn substrate(&self) -> SubstrateDescription {
        SubstrateDescription::new(
            self.config.robot_model.input_layers(
                self.config.rangefinder_density,
                self.config.topology.is_multi_brain(),
            ),
            self.config.hidden_neurons,
            robot::OUTPUTS,
        )
    }

    /// Noise levels for every (environment, trial) pair, in evaluation order.
    ///
    /// Drawn from a fixed-seed RNG so every genome faces the same noise.
    pub fn noise_levels(&self) -> Vec<NoiseLevels> {
        let mut rng = SimRng::seed_from_u64(evaluation::NOISE_LEVEL_SEED);
        let sensor_levels = self.config.sensor_noise.max(0.0) as u32 + 1;
        let effector_levels = self.config.effector_noise.max(0.0) as u32 + 1;

        (0..self.environments.len() * self.config.times_to_run_environments)
            .map(|_| NoiseLevels {
                sensor: f64::from(rng.next_u32() % sensor_levels),
                effector: f64::from(rng.next_u32() % effector_levels),
            })
            .collect()
    }

    /// Create the team in formation and register it with the brain.
    ///
    /// Robot `n` starts at `start_point + n * spacing` along the group
    /// orientation. Afterwards the substrate's rangefinder layer is sized to
    /// the actual rangefinder count and the brain is rebuilt if needed.
    pub fn initialize_robots(
        &self,
        brain: &mut AgentBrain,
        environment: &Environment,
        noise: NoiseLevels,
        rng: &mut SimRng,
    ) -> Result<Vec<Robot>, BrainError> {
        let (orientation, spacing, heading) = if self.config.override_team_formation {
            (
                self.config.group_orientation,
                self.config.group_spacing,
                self.config.robot_heading,
            )
        } else {
            (
                environment.group_orientation,
                environment.robot_spacing,
                environment.robot_heading,
            )
        };

        let step = Point2D::from_angle(orientation.to_radians()) * spacing;
        let drive = DriveParams {
            max_speed: robot::MAX_SPEED,
            sensor_noise: noise.sensor,
            effector_noise: noise.effector,
            collision_penalty: self.config.collision_penalty,
            timestep: self.config.timestep,
        };
        let multi_brain = self.config.topology.is_multi_brain();
        let z_coordinates = brain.z_coordinates().map(<[f32]>::to_vec);

        let mut robots = Vec::with_capacity(self.config.number_robots);
        for n in 0..self.config.number_robots {
            let position = environment.start_point + step * n as f64;
            let mut heading_deg = heading;
            if self.config.heading_noise > 0.0 {
                heading_deg += self.config.heading_noise * rng.gen_range(-1.0..=1.0);
            }

            let mut r = Robot::new(
                n,
                position,
                heading_deg.to_radians(),
                self.config.robot_model,
                drive,
            );
            r.populate_sensors(self.config.rangefinder_density, multi_brain);
            r.zstack = z_coordinates
                .as_ref()
                .and_then(|z| z.get(n).copied())
                .unwrap_or(0.0);
            r.autopilot = environment.autopilot;

            brain.register_robot(n);
            robots.push(r);
        }

        let rangefinders = robots
            .first()
            .map_or(self.config.rangefinder_density, Robot::rangefinder_count);
        brain.substrate_mut().set_neuron_density(0, rangefinders);
        brain.update_input_density()?;

        Ok(robots)
    }

    /// Assemble a ready-to-run instance for one trial
    pub fn build_instance(
        &self,
        decoder: Option<Arc<dyn GenomeDecoder>>,
        environment: &Environment,
        trial: usize,
        noise: NoiseLevels,
    ) -> Result<InstancePack, BrainError> {
        let environment = environment.copy();
        let mut rng = SimRng::seed_from_u64(trial as u64 + 1);

        let mut brain = AgentBrain::new(
            self.config.topology,
            self.config.number_robots,
            self.substrate(),
            decoder,
            self.config.stack_size,
        )?
        .with_activation_steps(self.config.activation_steps);

        let robots = self.initialize_robots(&mut brain, &environment, noise, &mut rng)?;
        let bodies: Vec<_> = robots.iter().map(Robot::body).collect();

        let mut collision_manager = self.collision_template.copy();
        collision_manager.initialize(&environment, &bodies);

        Ok(InstancePack {
            environment,
            robots,
            collision_manager,
            agent_brain: brain,
            fitness: self.fitness.copy(),
            behavior: self.behavior.as_ref().map(|b| b.copy()),
            rng,
            elapsed: 0.0,
            time_steps: 0,
            timestep: self.config.timestep,
            trial,
        })
    }

    /// Evaluate one genome over every environment and trial
    pub fn evaluate(&self, decoder: Arc<dyn GenomeDecoder>) -> EvaluationResult {
        let trials = self.config.times_to_run_environments;
        let noise = self.noise_levels();

        let mut fitness_sum = 0.0;
        let mut objectives = vec![0.0; evaluation::OBJECTIVES];
        let mut behavior = Vec::new();
        let mut aborted = 0;

        for (e, environment) in self.environments.iter().enumerate() {
            let mut env_fitness = 0.0;

            for trial in 0..trials {
                let levels = noise[e * trials + trial];
                let started = Instant::now();

                let mut pack = match self.build_instance(Some(decoder.clone()), environment, trial, levels) {
                    Ok(pack) => pack,
                    Err(err) => {
                        error!(environment = %environment.name, trial, "failed to build instance: {}", err);
                        env_fitness += evaluation::SENTINEL_FITNESS;
                        aborted += 1;
                        self.metrics.record_abort(0, started.elapsed());
                        continue;
                    }
                };
                let rebuilds = pack.agent_brain.rebuilds();

                match run_evaluation(&mut pack, self.config.evaluation_time) {
                    Ok(summary) => {
                        let view = pack.view();
                        let (fitness, objs) = pack.fitness.calculate(&view);
                        for (slot, value) in objectives.iter_mut().zip(objs) {
                            *slot += value;
                        }
                        if let Some(bc) = pack.behavior.as_ref() {
                            behavior.extend(bc.calculate(&view));
                        }
                        env_fitness += fitness;
                        self.metrics.record_instance(&summary, rebuilds, started.elapsed());
                        debug!(
                            environment = %environment.name,
                            trial,
                            fitness,
                            ticks = summary.ticks,
                            collisions = summary.collisions,
                            "trial complete"
                        );
                    }
                    Err(failure) => {
                        env_fitness += evaluation::SENTINEL_FITNESS;
                        aborted += 1;
                        self.metrics.record_abort(failure.tick, started.elapsed());
                    }
                }
            }

            fitness_sum += env_fitness / trials as f64;
        }

        self.metrics
            .evaluations_completed
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);

        EvaluationResult {
            fitness: fitness_sum / self.environments.len() as f64,
            objectives,
            behavior,
            aborted,
        }
    }

    /// Evaluate a population in parallel; results keep the input order
    pub fn evaluate_population(&self, genomes: &[Arc<dyn GenomeDecoder>]) -> Vec<EvaluationResult> {
        let started = Instant::now();
        let results: Vec<EvaluationResult> = genomes
            .par_iter()
            .map(|g| self.evaluate(Arc::clone(g)))
            .collect();
        info!(
            genomes = genomes.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "population evaluated"
        );
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::brain::BrainTopology;
    use crate::sim::fitness::{EndPointBC, SingleGoalPoint};
    use crate::sim::network::DenseGenome;

    fn config(robots: usize) -> ExperimentConfig {
        ExperimentConfig {
            number_robots: robots,
            evaluation_time: 2.0,
            ..ExperimentConfig::default()
        }
    }

    fn arena() -> Environment {
        let mut env = Environment::bounded_arena("box", 400.0, 400.0);
        env.start_point = Point2D::new(100.0, 200.0);
        env.robot_spacing = 40.0;
        env.poi.push(Point2D::new(300.0, 200.0));
        env
    }

    fn evaluator(config: ExperimentConfig) -> Evaluator {
        Evaluator::new(
            config,
            vec![arena()],
            Box::new(SingleGoalPoint::default()),
            Some(Box::new(EndPointBC::default())),
        )
        .unwrap()
    }

    fn genome(seed: u64) -> Arc<dyn GenomeDecoder> {
        Arc::new(DenseGenome::random(&mut SimRng::seed_from_u64(seed)))
    }

    #[test]
    fn test_rejects_invalid_setup() {
        let bad = Evaluator::new(
            ExperimentConfig {
                number_robots: 0,
                ..ExperimentConfig::default()
            },
            vec![arena()],
            Box::new(SingleGoalPoint::default()),
            None,
        );
        assert!(bad.is_err());

        let empty = Evaluator::new(
            ExperimentConfig::default(),
            Vec::new(),
            Box::new(SingleGoalPoint::default()),
            None,
        );
        assert!(matches!(empty, Err(ConfigError::Invalid { field: "environments", .. })));
    }

    #[test]
    fn test_formation_follows_environment() {
        let ev = evaluator(config(3));
        let pack = ev
            .build_instance(Some(genome(1)), &arena(), 0, NoiseLevels::default())
            .unwrap();
        let xs: Vec<f64> = pack.robots.iter().map(|r| r.position.x).collect();
        assert!((xs[0] - 100.0).abs() < 1e-9);
        assert!((xs[1] - 140.0).abs() < 1e-9);
        assert!((xs[2] - 180.0).abs() < 1e-9);
        assert_eq!(pack.agent_brain.listeners(), &[0, 1, 2]);
    }

    #[test]
    fn test_formation_override() {
        let ev = evaluator(ExperimentConfig {
            override_team_formation: true,
            group_orientation: 90.0,
            group_spacing: 20.0,
            robot_heading: 180.0,
            ..config(2)
        });
        let pack = ev
            .build_instance(Some(genome(1)), &arena(), 0, NoiseLevels::default())
            .unwrap();
        assert!(pack.robots[1]
            .position
            .approx_eq(Point2D::new(100.0, 220.0), 1e-9));
        assert!((pack.robots[0].heading - std::f64::consts::PI).abs() < 1e-9);
    }

    #[test]
    fn test_role_tags_come_from_team_decode() {
        let ev = evaluator(config(3));
        let pack = ev
            .build_instance(Some(genome(2)), &arena(), 0, NoiseLevels::default())
            .unwrap();
        let z: Vec<f32> = pack.robots.iter().map(|r| r.zstack).collect();
        assert_eq!(z, vec![-1.0, 0.0, 1.0]);

        let clone = evaluator(ExperimentConfig {
            topology: BrainTopology::PerRobotClone,
            ..config(3)
        });
        let pack = clone
            .build_instance(Some(genome(2)), &arena(), 0, NoiseLevels::default())
            .unwrap();
        assert!(pack.robots.iter().all(|r| r.zstack == 0.0));
    }

    #[test]
    fn test_substrate_matches_sensor_suite() {
        let ev = evaluator(config(2));
        let pack = ev
            .build_instance(Some(genome(3)), &arena(), 0, NoiseLevels::default())
            .unwrap();
        assert_eq!(
            pack.agent_brain.substrate().input_count(),
            pack.robots[0].sensors.len()
        );
        assert_eq!(pack.agent_brain.rebuilds(), 0);
    }

    #[test]
    fn test_noise_levels_are_fixed_and_bounded() {
        let ev = evaluator(ExperimentConfig {
            sensor_noise: 10.0,
            effector_noise: 5.0,
            times_to_run_environments: 8,
            ..config(1)
        });
        let a = ev.noise_levels();
        let b = ev.noise_levels();
        assert_eq!(a, b);
        assert_eq!(a.len(), 8);
        assert!(a.iter().all(|n| n.sensor <= 10.0 && n.effector <= 5.0));

        let quiet = evaluator(config(1)).noise_levels();
        assert!(quiet.iter().all(|n| n.sensor == 0.0 && n.effector == 0.0));
    }

    #[test]
    fn test_instance_rng_seeded_by_trial() {
        let ev = evaluator(config(2));
        for trial in [0usize, 3] {
            let mut pack = ev
                .build_instance(Some(genome(1)), &arena(), trial, NoiseLevels::default())
                .unwrap();
            let mut expected = SimRng::seed_from_u64(trial as u64 + 1);
            assert_eq!(pack.rng.next_u64(), expected.next_u64(), "trial {}", trial);
        }
    }

    #[test]
    fn test_evaluation_is_deterministic() {
        let ev = evaluator(ExperimentConfig {
            times_to_run_environments: 2,
            ..config(2)
        });
        let g = genome(4);
        let a = ev.evaluate(g.clone());
        let b = ev.evaluate(g);
        assert_eq!(a, b);
        assert_eq!(a.objectives.len(), evaluation::OBJECTIVES);
        assert_eq!(a.behavior.len(), 2 * 2 * 2);
        assert_eq!(a.aborted, 0);
        assert!(a.fitness > 0.0 && a.fitness <= 1.0);
    }

    #[test]
    fn test_population_preserves_order() {
        let ev = evaluator(config(1));
        let genomes: Vec<Arc<dyn GenomeDecoder>> = (0..4).map(genome).collect();
        let parallel = ev.evaluate_population(&genomes);
        let serial: Vec<EvaluationResult> = genomes.iter().map(|g| ev.evaluate(g.clone())).collect();
        assert_eq!(parallel, serial);
        assert_eq!(
            ev.metrics()
                .evaluations_completed
                .load(std::sync::atomic::Ordering::Relaxed),
            8
        );
    }
}
