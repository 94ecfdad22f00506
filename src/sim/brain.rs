//! AgentBrain: routes sensor vectors into controllers and outputs back to robots
//!
//! Three topologies:
//! - `SharedNetwork`: one network for the whole team; inputs are concatenated
//!   per robot and outputs are split into equal per-robot segments.
//! - `PerRobotClone`: the genome is decoded once per robot into independent
//!   networks with identical weights but separate state.
//! - `MultiBrainStack`: several team networks; one is active at a time.
//!
//! Robots are registered as listeners, in order. Output segment `k` goes to
//! the `k`-th registered listener.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{BrainError, SimulationError};
use crate::sim::constants::brain::ACTIVATION_STEPS;
use crate::sim::network::{GenomeDecoder, Network};
use crate::sim::robot::Robot;
use crate::sim::substrate::SubstrateDescription;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrainTopology {
    /// One heterogeneous team network
    #[default]
    SharedNetwork,
    /// One independent copy of the network per robot
    PerRobotClone,
    /// A stack of team networks with a selectable active brain
    MultiBrainStack,
}

impl BrainTopology {
    pub fn is_homogeneous(self) -> bool {
        matches!(self, BrainTopology::PerRobotClone)
    }

    pub fn is_multi_brain(self) -> bool {
        matches!(self, BrainTopology::MultiBrainStack)
    }
}

#[derive(Debug)]
enum Networks {
    /// No genome, or decode has not run yet
    Unbuilt,
    Shared(Box<dyn Network>),
    PerRobot(Vec<Box<dyn Network>>),
    Stack {
        brains: Vec<Box<dyn Network>>,
        active: usize,
    },
}

#[derive(Debug)]
pub struct AgentBrain {
    topology: BrainTopology,
    num_robots: usize,
    activation_steps: usize,
    stack_size: usize,
    substrate: SubstrateDescription,
    decoder: Option<Arc<dyn GenomeDecoder>>,
    networks: Networks,
    /// Concatenated per-robot input vectors
    team_input: Vec<f32>,
    listeners: Vec<usize>,
    z_coordinates: Option<Vec<f32>>,
    nan_outputs: u64,
    rebuilds: u64,
}

impl AgentBrain {
    /// Create a brain and, if a genome is given, decode it immediately
    pub fn new(
        topology: BrainTopology,
        num_robots: usize,
        substrate: SubstrateDescription,
        decoder: Option<Arc<dyn GenomeDecoder>>,
        stack_size: usize,
    ) -> Result<Self, BrainError> {
        let mut brain = Self {
            topology,
            num_robots,
            activation_steps: ACTIVATION_STEPS,
            stack_size,
            team_input: vec![0.0; num_robots * substrate.input_count()],
            substrate,
            decoder,
            networks: Networks::Unbuilt,
            listeners: Vec::with_capacity(num_robots),
            z_coordinates: None,
            nan_outputs: 0,
            rebuilds: 0,
        };
        brain.build()?;
        Ok(brain)
    }

    pub fn with_activation_steps(mut self, steps: usize) -> Self {
        self.activation_steps = steps;
        self
    }

    /// Decode the genome for the current substrate
    fn build(&mut self) -> Result<(), BrainError> {
        let Some(decoder) = self.decoder.as_ref() else {
            self.networks = Networks::Unbuilt;
            return Ok(());
        };

        match self.topology {
            BrainTopology::PerRobotClone => {
                let nets = (0..self.num_robots)
                    .map(|_| decoder.decode_homogeneous(&self.substrate))
                    .collect::<Result<Vec<_>, _>>()?;
                self.networks = Networks::PerRobot(nets);
                self.z_coordinates = None;
            }
            BrainTopology::SharedNetwork => {
                let team = decoder.decode_team(&self.substrate, self.num_robots)?;
                self.networks = Networks::Shared(team.network);
                self.z_coordinates = Some(team.z_coordinates);
            }
            BrainTopology::MultiBrainStack => {
                let stack = decoder.decode_stack(&self.substrate, self.num_robots, self.stack_size)?;
                self.networks = Networks::Stack {
                    brains: stack.networks,
                    active: 0,
                };
                self.z_coordinates = Some(stack.z_coordinates);
            }
        }

        debug!(
            topology = ?self.topology,
            robots = self.num_robots,
            inputs = self.substrate.input_count(),
            "brain built"
        );
        Ok(())
    }

    /// Copy one robot's sensor vector into its slot of the team input.
    ///
    /// Slot `k` starts at `k * substrate.input_count()`.
    pub fn set_input_signals(&mut self, robot_index: usize, inputs: &[f32]) {
        let width = self.substrate.input_count();
        debug_assert!(inputs.len() <= width, "sensor vector wider than substrate");
        let start = robot_index * width;
        let Some(slot) = self.team_input.get_mut(start..start + width) else {
            warn!(robot_index, "input slot outside team vector");
            return;
        };
        let n = inputs.len().min(width);
        slot[..n].copy_from_slice(&inputs[..n]);
    }

    /// Run the controller and deliver outputs to registered listeners.
    ///
    /// Does nothing while no network is built.
    pub fn execute(&mut self, robots: &mut [Robot]) -> Result<(), SimulationError> {
        let width = self.substrate.input_count();
        let steps = self.activation_steps;

        match &mut self.networks {
            Networks::Unbuilt => Ok(()),
            Networks::PerRobot(nets) => {
                for (agent, &listener) in self.listeners.iter().take(self.num_robots).enumerate() {
                    let net = nets
                        .get_mut(agent)
                        .ok_or(SimulationError::MissingNetwork(agent))?;
                    let start = agent * width;
                    net.set_input_signals(&self.team_input[start..start + width]);
                    net.multiple_steps(steps);

                    let outputs: Vec<f32> = (0..net.output_count()).map(|i| net.output_signal(i)).collect();
                    if outputs.iter().any(|o| o.is_nan()) {
                        warn!(agent, "NaN in outputs");
                        self.nan_outputs += 1;
                    }
                    deliver(robots, listener, &outputs)?;
                }
                Ok(())
            }
            Networks::Shared(net) => run_team(
                net.as_mut(),
                &self.team_input,
                steps,
                self.num_robots,
                &self.listeners,
                robots,
                &mut self.nan_outputs,
            ),
            Networks::Stack { brains, active } => {
                let len = brains.len();
                let net = brains
                    .get_mut(*active)
                    .ok_or(BrainError::NoSuchBrain { index: *active, len })?;
                run_team(
                    net.as_mut(),
                    &self.team_input,
                    steps,
                    self.num_robots,
                    &self.listeners,
                    robots,
                    &mut self.nan_outputs,
                )
            }
        }
    }

    /// Add a robot as the next output listener.
    ///
    /// Duplicates are ignored; registering more robots than the brain was
    /// built for is accepted with a warning.
    pub fn register_robot(&mut self, robot_id: usize) {
        if self.listeners.contains(&robot_id) {
            warn!(robot_id, "robot registered twice with agent brain");
            return;
        }
        self.listeners.push(robot_id);
        if self.listeners.len() > self.num_robots {
            warn!(
                registered = self.listeners.len(),
                expected = self.num_robots,
                "more robots registered than the brain was built for"
            );
        }
    }

    /// Resize the team input to the substrate and rebuild networks whose
    /// input width no longer matches. Returns true if a rebuild happened.
    pub fn update_input_density(&mut self) -> Result<bool, BrainError> {
        let width = self.substrate.input_count();
        self.team_input = vec![0.0; self.num_robots * width];

        let current = match &self.networks {
            Networks::Unbuilt => return Ok(false),
            Networks::PerRobot(nets) => nets.first().map(|n| n.input_count()),
            Networks::Shared(net) => Some(net.input_count() / self.num_robots.max(1)),
            Networks::Stack { brains, active } => brains
                .get(*active)
                .map(|n| n.input_count() / self.num_robots.max(1)),
        };

        if current == Some(width) {
            return Ok(false);
        }

        info!(
            from = ?current,
            to = width,
            "input density changed, rebuilding brain"
        );
        let active = match &self.networks {
            Networks::Stack { active, .. } => *active,
            _ => 0,
        };
        self.build()?;
        if let Networks::Stack { active: a, brains } = &mut self.networks {
            if active < brains.len() {
                *a = active;
            }
        }
        self.rebuilds += 1;
        Ok(true)
    }

    /// Network `index`: a per-robot clone, the shared network, or the active stack brain
    pub fn get_brain(&self, index: usize) -> Option<&dyn Network> {
        match &self.networks {
            Networks::Unbuilt => None,
            Networks::PerRobot(nets) => nets.get(index).map(|n| n.as_ref()),
            Networks::Shared(net) => Some(net.as_ref()),
            Networks::Stack { brains, active } => brains.get(*active).map(|n| n.as_ref()),
        }
    }

    /// Switch the active brain of a multi-brain stack
    pub fn select_brain(&mut self, index: usize) -> Result<(), BrainError> {
        match &mut self.networks {
            Networks::Stack { brains, active } => {
                if index >= brains.len() {
                    return Err(BrainError::NoSuchBrain {
                        index,
                        len: brains.len(),
                    });
                }
                *active = index;
                Ok(())
            }
            _ => Err(BrainError::NotAStack),
        }
    }

    pub fn active_brain(&self) -> Option<usize> {
        match &self.networks {
            Networks::Stack { active, .. } => Some(*active),
            _ => None,
        }
    }

    pub fn clear_robot_listeners(&mut self) {
        self.listeners.clear();
    }

    /// Drop listeners and zero the team input; networks are kept
    pub fn reset(&mut self) {
        self.clear_robot_listeners();
        self.team_input.fill(0.0);
    }

    pub fn is_built(&self) -> bool {
        !matches!(self.networks, Networks::Unbuilt)
    }

    pub fn topology(&self) -> BrainTopology {
        self.topology
    }

    pub fn num_robots(&self) -> usize {
        self.num_robots
    }

    pub fn listeners(&self) -> &[usize] {
        &self.listeners
    }

    pub fn substrate(&self) -> &SubstrateDescription {
        &self.substrate
    }

    pub fn substrate_mut(&mut self) -> &mut SubstrateDescription {
        &mut self.substrate
    }

    pub fn team_input(&self) -> &[f32] {
        &self.team_input
    }

    /// Role coordinates from the last team or stack decode
    pub fn z_coordinates(&self) -> Option<&[f32]> {
        self.z_coordinates.as_deref()
    }

    pub fn nan_outputs(&self) -> u64 {
        self.nan_outputs
    }

    pub fn rebuilds(&self) -> u64 {
        self.rebuilds
    }
}

/// Shared-network execution: one activation, outputs split per listener
fn run_team(
    net: &mut dyn Network,
    team_input: &[f32],
    steps: usize,
    num_robots: usize,
    listeners: &[usize],
    robots: &mut [Robot],
    nan_outputs: &mut u64,
) -> Result<(), SimulationError> {
    let total = net.output_count();
    if num_robots == 0 || total % num_robots != 0 {
        return Err(SimulationError::OutputWidth {
            actual: total,
            robots: num_robots,
        });
    }
    let per_robot = total / num_robots;

    net.set_input_signals(team_input);
    net.multiple_steps(steps);

    let outputs: Vec<f32> = (0..total).map(|i| net.output_signal(i)).collect();
    if outputs.iter().any(|o| o.is_nan()) {
        warn!("NaN in outputs");
        *nan_outputs += 1;
    }

    for (k, &listener) in listeners.iter().take(num_robots).enumerate() {
        deliver(robots, listener, &outputs[k * per_robot..(k + 1) * per_robot])?;
    }
    Ok(())
}

fn deliver(robots: &mut [Robot], listener: usize, outputs: &[f32]) -> Result<(), SimulationError> {
    let robot = robots
        .get_mut(listener)
        .filter(|r| r.id == listener)
        .ok_or(SimulationError::UnknownListener(listener))?;
    robot.receive_outputs(outputs);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DecodeError;
    use crate::sim::network::{StackDecode, TeamDecode};
    use crate::sim::robot::{DriveParams, RobotModel};
    use crate::util::point::Point2D;

    /// Network that echoes its inputs (scaled) to its outputs and counts steps
    #[derive(Debug)]
    struct Echo {
        width: usize,
        inputs: Vec<f32>,
        outputs: usize,
        gain: f32,
        steps: usize,
    }

    impl Network for Echo {
        fn set_input_signals(&mut self, inputs: &[f32]) {
            self.inputs.clear();
            self.inputs.extend_from_slice(inputs);
        }
        fn multiple_steps(&mut self, steps: usize) {
            self.steps += steps;
        }
        fn output_signal(&self, index: usize) -> f32 {
            self.inputs.get(index).copied().unwrap_or(0.0) * self.gain
        }
        fn input_count(&self) -> usize {
            self.width
        }
        fn output_count(&self) -> usize {
            self.outputs
        }
    }

    fn echo(inputs: usize, outputs: usize, gain: f32) -> Box<dyn Network> {
        Box::new(Echo {
            width: inputs,
            inputs: Vec::with_capacity(inputs),
            outputs,
            gain,
            steps: 0,
        })
    }

    /// Decodes echo networks; widths follow the substrate
    #[derive(Debug)]
    struct EchoDecoder {
        /// Reject substrates wider than this
        max_inputs: usize,
    }

    impl EchoDecoder {
        fn check(&self, s: &SubstrateDescription) -> Result<(), DecodeError> {
            if s.input_count() > self.max_inputs {
                return Err(DecodeError::InputWidth {
                    expected: self.max_inputs,
                    actual: s.input_count(),
                });
            }
            Ok(())
        }
    }

    impl GenomeDecoder for EchoDecoder {
        fn decode_homogeneous(&self, s: &SubstrateDescription) -> Result<Box<dyn Network>, DecodeError> {
            self.check(s)?;
            Ok(echo(s.input_count(), s.output_count, 1.0))
        }
        fn decode_team(&self, s: &SubstrateDescription, n: usize) -> Result<TeamDecode, DecodeError> {
            self.check(s)?;
            Ok(TeamDecode {
                network: echo(n * s.input_count(), n * s.output_count, 1.0),
                z_coordinates: (0..n).map(|k| k as f32).collect(),
            })
        }
        fn decode_stack(&self, s: &SubstrateDescription, n: usize, depth: usize) -> Result<StackDecode, DecodeError> {
            self.check(s)?;
            Ok(StackDecode {
                networks: (0..depth)
                    .map(|j| echo(n * s.input_count(), n * s.output_count, (j + 1) as f32))
                    .collect(),
                z_coordinates: vec![0.0; n],
            })
        }
    }

    fn decoder() -> Option<Arc<dyn GenomeDecoder>> {
        Some(Arc::new(EchoDecoder { max_inputs: 16 }))
    }

    fn robots(n: usize) -> Vec<Robot> {
        (0..n)
            .map(|i| Robot::new(i, Point2D::new(i as f64 * 20.0, 0.0), 0.0, RobotModel::Khepera3, DriveParams::default()))
            .collect()
    }

    fn substrate() -> SubstrateDescription {
        SubstrateDescription::new(vec![2], 0, 2)
    }

    #[test]
    fn test_shared_network_splits_outputs_in_listener_order() {
        let mut brain = AgentBrain::new(BrainTopology::SharedNetwork, 2, substrate(), decoder(), 2).unwrap();
        let mut team = robots(2);
        brain.register_robot(0);
        brain.register_robot(1);
        brain.set_input_signals(0, &[0.1, 0.2]);
        brain.set_input_signals(1, &[0.3, 0.4]);

        brain.execute(&mut team).unwrap();
        assert_eq!(team[0].outputs(), &[0.1, 0.2]);
        assert_eq!(team[1].outputs(), &[0.3, 0.4]);
    }

    #[test]
    fn test_shared_listener_order_decides_segments() {
        let mut brain = AgentBrain::new(BrainTopology::SharedNetwork, 2, substrate(), decoder(), 2).unwrap();
        let mut team = robots(2);
        brain.register_robot(1);
        brain.register_robot(0);
        brain.set_input_signals(0, &[0.1, 0.2]);
        brain.set_input_signals(1, &[0.3, 0.4]);

        brain.execute(&mut team).unwrap();
        assert_eq!(team[1].outputs(), &[0.1, 0.2]);
        assert_eq!(team[0].outputs(), &[0.3, 0.4]);
    }

    #[test]
    fn test_per_robot_outputs_depend_only_on_own_inputs() {
        let mut brain = AgentBrain::new(BrainTopology::PerRobotClone, 2, substrate(), decoder(), 2).unwrap();
        let mut team = robots(2);
        brain.register_robot(0);
        brain.register_robot(1);

        brain.set_input_signals(0, &[0.5, 0.6]);
        brain.set_input_signals(1, &[0.0, 0.0]);
        brain.execute(&mut team).unwrap();
        let first = team[0].outputs().to_vec();

        brain.set_input_signals(1, &[0.9, 0.9]);
        brain.execute(&mut team).unwrap();
        assert_eq!(team[0].outputs(), first.as_slice());
        assert_eq!(team[1].outputs(), &[0.9, 0.9]);
    }

    #[test]
    fn test_duplicate_registration_ignored() {
        let mut brain = AgentBrain::new(BrainTopology::SharedNetwork, 2, substrate(), decoder(), 2).unwrap();
        brain.register_robot(0);
        brain.register_robot(0);
        assert_eq!(brain.listeners(), &[0]);
    }

    #[test]
    fn test_over_registration_accepted() {
        let mut brain = AgentBrain::new(BrainTopology::SharedNetwork, 1, substrate(), decoder(), 2).unwrap();
        let mut team = robots(2);
        brain.register_robot(0);
        brain.register_robot(1);
        assert_eq!(brain.listeners().len(), 2);
        brain.set_input_signals(0, &[0.7, 0.8]);
        // Only the first listener receives the single segment
        brain.execute(&mut team).unwrap();
        assert_eq!(team[0].outputs(), &[0.7, 0.8]);
        assert!(team[1].outputs().is_empty());
    }

    #[test]
    fn test_unknown_listener_fails_tick() {
        let mut brain = AgentBrain::new(BrainTopology::SharedNetwork, 1, substrate(), decoder(), 2).unwrap();
        let mut team = robots(1);
        brain.register_robot(5);
        assert_eq!(brain.execute(&mut team), Err(SimulationError::UnknownListener(5)));
    }

    #[test]
    fn test_unbuilt_brain_is_a_noop() {
        let mut brain = AgentBrain::new(BrainTopology::SharedNetwork, 1, substrate(), None, 2).unwrap();
        let mut team = robots(1);
        brain.register_robot(0);
        brain.execute(&mut team).unwrap();
        assert!(team[0].outputs().is_empty());
        assert!(!brain.is_built());
        assert!(brain.get_brain(0).is_none());
    }

    #[test]
    fn test_update_input_density_rebuilds_on_change() {
        let mut brain = AgentBrain::new(BrainTopology::SharedNetwork, 2, substrate(), decoder(), 2).unwrap();
        assert!(!brain.update_input_density().unwrap());
        assert_eq!(brain.rebuilds(), 0);

        brain.substrate_mut().set_neuron_density(0, 5);
        assert!(brain.update_input_density().unwrap());
        assert_eq!(brain.rebuilds(), 1);
        assert_eq!(brain.team_input().len(), 10);
        assert_eq!(brain.get_brain(0).unwrap().input_count(), 10);
    }

    #[test]
    fn test_update_input_density_per_robot() {
        let mut brain = AgentBrain::new(BrainTopology::PerRobotClone, 3, substrate(), decoder(), 2).unwrap();
        brain.substrate_mut().set_neuron_density(0, 4);
        assert!(brain.update_input_density().unwrap());
        for i in 0..3 {
            assert_eq!(brain.get_brain(i).unwrap().input_count(), 4);
        }
        assert!(brain.get_brain(3).is_none());
    }

    #[test]
    fn test_rebuild_decode_failure_surfaces() {
        let mut brain = AgentBrain::new(
            BrainTopology::SharedNetwork,
            1,
            substrate(),
            Some(Arc::new(EchoDecoder { max_inputs: 3 })),
            2,
        )
        .unwrap();
        brain.substrate_mut().set_neuron_density(0, 8);
        assert_eq!(
            brain.update_input_density(),
            Err(BrainError::Decode(DecodeError::InputWidth { expected: 3, actual: 8 }))
        );
    }

    #[test]
    fn test_multi_brain_selection() {
        let mut brain = AgentBrain::new(BrainTopology::MultiBrainStack, 1, substrate(), decoder(), 2).unwrap();
        let mut team = robots(1);
        brain.register_robot(0);
        brain.set_input_signals(0, &[0.25, 0.5]);

        assert_eq!(brain.active_brain(), Some(0));
        brain.execute(&mut team).unwrap();
        assert_eq!(team[0].outputs(), &[0.25, 0.5]);

        brain.select_brain(1).unwrap();
        brain.execute(&mut team).unwrap();
        assert_eq!(team[0].outputs(), &[0.5, 1.0]);

        assert_eq!(
            brain.select_brain(2),
            Err(BrainError::NoSuchBrain { index: 2, len: 2 })
        );
    }

    #[test]
    fn test_select_brain_requires_stack() {
        let mut brain = AgentBrain::new(BrainTopology::SharedNetwork, 1, substrate(), decoder(), 2).unwrap();
        assert_eq!(brain.select_brain(0), Err(BrainError::NotAStack));
    }

    #[test]
    fn test_z_coordinates_from_team_decode() {
        let brain = AgentBrain::new(BrainTopology::SharedNetwork, 3, substrate(), decoder(), 2).unwrap();
        assert_eq!(brain.z_coordinates(), Some(&[0.0, 1.0, 2.0][..]));
        let homogeneous = AgentBrain::new(BrainTopology::PerRobotClone, 3, substrate(), decoder(), 2).unwrap();
        assert!(homogeneous.z_coordinates().is_none());
    }

    #[test]
    fn test_nan_outputs_are_counted_and_delivered() {
        let mut brain = AgentBrain::new(BrainTopology::SharedNetwork, 1, substrate(), decoder(), 2).unwrap();
        let mut team = robots(1);
        brain.register_robot(0);
        brain.set_input_signals(0, &[f32::NAN, 0.5]);
        brain.execute(&mut team).unwrap();
        assert_eq!(brain.nan_outputs(), 1);
        assert!(team[0].outputs()[0].is_nan());
    }

    #[test]
    fn test_reset_clears_listeners_and_inputs() {
        let mut brain = AgentBrain::new(BrainTopology::SharedNetwork, 1, substrate(), decoder(), 2).unwrap();
        brain.register_robot(0);
        brain.set_input_signals(0, &[0.5, 0.5]);
        brain.reset();
        assert!(brain.listeners().is_empty());
        assert!(brain.team_input().iter().all(|&v| v == 0.0));
        assert!(brain.is_built());
    }

    #[test]
    fn test_activation_steps_forwarded() {
        let mut brain = AgentBrain::new(BrainTopology::SharedNetwork, 1, substrate(), decoder(), 2)
            .unwrap()
            .with_activation_steps(3);
        let mut team = robots(1);
        brain.register_robot(0);
        brain.execute(&mut team).unwrap();
        brain.execute(&mut team).unwrap();
        let steps = format!("{:?}", brain.get_brain(0).unwrap());
        assert!(steps.contains("steps: 6"), "{}", steps);
    }
}
