//! Tick driver and evaluation loop
//!
//! One tick, in order:
//! 1. collision manager housekeeping
//! 2. per robot: leave autopilot inside the area of interest, sense, act
//! 3. agent brain executes and delivers outputs (used on the next tick)
//! 4. per robot: collision test, flag, hook
//! 5. behavior then fitness observe the instance
//! 6. clock advances
//!
//! Robots act in index order and each sees the poses already updated by
//! lower-indexed robots in the same tick.

use tracing::error;

use crate::error::{EvaluationFailure, SimulationError};
use crate::sim::instance::{InstancePack, InstanceView};
use crate::sim::sensor::SensorContext;

/// What happened during one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickOutcome {
    /// Robots flagged as colliding this tick
    pub collisions: usize,
}

/// Totals of a completed evaluation instance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvaluationSummary {
    pub ticks: u64,
    pub collisions: u64,
    pub nan_outputs: u64,
}

/// Advance the instance by one tick
pub fn run_tick(pack: &mut InstancePack) -> Result<TickOutcome, SimulationError> {
    let mut bodies = pack.bodies();
    pack.collision_manager.simulation_step_callback(&bodies);

    for x in 0..pack.robots.len() {
        let robot = &mut pack.robots[x];
        if pack.environment.aoi.contains(robot.position) {
            robot.autopilot = false;
        }

        let ctx = SensorContext {
            environment: &pack.environment,
            bodies: &bodies,
            collisions: pack.collision_manager.as_ref(),
        };
        robot.update_sensors(&ctx, &mut pack.rng);
        pack.agent_brain.set_input_signals(x, robot.inputs());
        robot.do_action(&mut pack.rng)?;

        bodies[x] = robot.body();
        pack.collision_manager.robot_moved(&bodies[x]);
    }

    pack.agent_brain.execute(&mut pack.robots)?;

    let mut collisions = 0;
    for x in 0..pack.robots.len() {
        let hit = pack.collision_manager.robot_collide(&bodies[x], &bodies);
        let robot = &mut pack.robots[x];
        robot.collide_last = hit;
        if !hit {
            continue;
        }
        collisions += 1;
        if robot.on_collision() {
            bodies[x] = robot.body();
            pack.collision_manager.robot_moved(&bodies[x]);
        }
    }

    let view = InstanceView {
        environment: &pack.environment,
        robots: &pack.robots,
        elapsed: pack.elapsed,
        time_steps: pack.time_steps,
        timestep: pack.timestep,
    };
    if let Some(behavior) = pack.behavior.as_mut() {
        behavior.update(&view);
    }
    pack.fitness.update(&view);

    pack.elapsed += pack.timestep;
    pack.time_steps += 1;

    Ok(TickOutcome { collisions })
}

/// Tick until `evaluation_time` simulated seconds have elapsed.
///
/// A failing tick aborts the instance; the failure carries every robot's
/// trajectory and is logged before it is returned.
pub fn run_evaluation(
    pack: &mut InstancePack,
    evaluation_time: f64,
) -> Result<EvaluationSummary, EvaluationFailure> {
    let mut collisions = 0u64;

    while pack.elapsed < evaluation_time {
        match run_tick(pack) {
            Ok(outcome) => collisions += outcome.collisions as u64,
            Err(kind) => {
                error!(
                    environment = %pack.environment.name,
                    trial = pack.trial,
                    tick = pack.time_steps,
                    "simulation aborted: {}",
                    kind
                );
                let failure = EvaluationFailure {
                    kind,
                    tick: pack.time_steps,
                    trail: pack.trails(),
                };
                failure.log_trail();
                return Err(failure);
            }
        }
    }

    Ok(EvaluationSummary {
        ticks: pack.time_steps,
        collisions,
        nan_outputs: pack.agent_brain.nan_outputs(),
    })
}
