//! Controller contracts and a reference substrate-decoded network
//!
//! [`Network`] and [`GenomeDecoder`] are the seams an evolutionary algorithm
//! plugs into. [`DenseGenome`] is a small indirect encoding: a handful of
//! parameters describe a weight function over neuron coordinates, so the same
//! genome decodes onto substrates of any width.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DecodeError;
use crate::sim::substrate::SubstrateDescription;

/// An executable controller
pub trait Network: Send + fmt::Debug {
    /// Load input activations; missing trailing inputs read as 0
    fn set_input_signals(&mut self, inputs: &[f32]);

    /// Propagate signals `steps` times
    fn multiple_steps(&mut self, steps: usize);

    fn output_signal(&self, index: usize) -> f32;

    fn input_count(&self) -> usize;

    fn output_count(&self) -> usize;
}

/// Shared team controller plus per-robot role coordinates
#[derive(Debug)]
pub struct TeamDecode {
    pub network: Box<dyn Network>,
    pub z_coordinates: Vec<f32>,
}

/// Multi-brain stack plus per-robot role coordinates
#[derive(Debug)]
pub struct StackDecode {
    pub networks: Vec<Box<dyn Network>>,
    pub z_coordinates: Vec<f32>,
}

/// Turns a genome into networks for a given substrate
pub trait GenomeDecoder: Send + Sync + fmt::Debug {
    /// One single-robot network
    fn decode_homogeneous(
        &self,
        substrate: &SubstrateDescription,
    ) -> Result<Box<dyn Network>, DecodeError>;

    /// One network whose inputs and outputs are `num_robots` concatenated
    /// copies of the substrate
    fn decode_team(
        &self,
        substrate: &SubstrateDescription,
        num_robots: usize,
    ) -> Result<TeamDecode, DecodeError>;

    /// `stack_size` team networks
    fn decode_stack(
        &self,
        substrate: &SubstrateDescription,
        num_robots: usize,
        stack_size: usize,
    ) -> Result<StackDecode, DecodeError>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Connection {
    source: usize,
    target: usize,
    weight: f32,
}

#[inline]
fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-4.9 * x).exp())
}

/// Synchronous recurrent network over a flat neuron array.
///
/// Neuron layout: `[bias, inputs.., hidden.., outputs..]`. Each step every
/// non-input neuron takes the sigmoid of its weighted inputs from the previous
/// step, so a signal needs two steps to travel input -> hidden -> output.
#[derive(Debug, Clone)]
pub struct DenseNetwork {
    inputs: usize,
    hidden: usize,
    outputs: usize,
    connections: Vec<Connection>,
    signals: Vec<f32>,
    scratch: Vec<f32>,
}

impl DenseNetwork {
    fn new(inputs: usize, hidden: usize, outputs: usize, connections: Vec<Connection>) -> Self {
        let total = 1 + inputs + hidden + outputs;
        let mut signals = vec![0.0; total];
        signals[0] = 1.0;
        Self {
            inputs,
            hidden,
            outputs,
            connections,
            signals,
            scratch: vec![0.0; total],
        }
    }

    #[inline]
    fn first_output(&self) -> usize {
        1 + self.inputs + self.hidden
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

impl Network for DenseNetwork {
    fn set_input_signals(&mut self, inputs: &[f32]) {
        let dst = &mut self.signals[1..1 + self.inputs];
        let n = inputs.len().min(dst.len());
        dst[..n].copy_from_slice(&inputs[..n]);
        dst[n..].fill(0.0);
    }

    fn multiple_steps(&mut self, steps: usize) {
        let first_active = 1 + self.inputs;
        for _ in 0..steps {
            self.scratch.fill(0.0);
            for c in &self.connections {
                self.scratch[c.target] += c.weight * self.signals[c.source];
            }
            for i in first_active..self.signals.len() {
                self.signals[i] = sigmoid(self.scratch[i]);
            }
        }
    }

    fn output_signal(&self, index: usize) -> f32 {
        self.signals
            .get(self.first_output() + index)
            .copied()
            .unwrap_or(0.0)
    }

    fn input_count(&self) -> usize {
        self.inputs
    }

    fn output_count(&self) -> usize {
        self.outputs
    }
}

/// Parameters per layer pair: source coordinate, target coordinate, their
/// product, role coordinate, constant
const LAYER_PARAMS: usize = 5;
const WEIGHT_SCALE: f32 = 3.0;
/// Weights below this magnitude are not expressed
const WEIGHT_THRESHOLD: f32 = 0.2;

/// Indirectly encoded genome.
///
/// The weight between two neurons is a function of their substrate
/// coordinates and the robot's role coordinate, so teams decoded from one
/// genome are related but not identical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseGenome {
    /// Input->hidden parameters followed by hidden->output parameters
    pub params: [f32; 2 * LAYER_PARAMS],
}

impl DenseGenome {
    pub fn new(params: [f32; 2 * LAYER_PARAMS]) -> Self {
        Self { params }
    }

    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut params = [0.0; 2 * LAYER_PARAMS];
        for p in &mut params {
            *p = rng.gen_range(-1.0..1.0);
        }
        Self { params }
    }

    fn weight(&self, layer: usize, source: f64, target: f64, z: f32) -> Option<f32> {
        let p = &self.params[layer * LAYER_PARAMS..(layer + 1) * LAYER_PARAMS];
        let (s, t) = (source as f32, target as f32);
        let raw = (p[0] * s + p[1] * t + p[2] * s * t + p[3] * z + p[4]).tanh();
        (raw.abs() >= WEIGHT_THRESHOLD).then_some(raw * WEIGHT_SCALE)
    }

    /// Connections for one robot block at the given neuron offsets
    fn block(
        &self,
        substrate: &SubstrateDescription,
        z: f32,
        input_base: usize,
        hidden_base: usize,
        output_base: usize,
        out: &mut Vec<Connection>,
    ) {
        let inputs = substrate.input_coordinates();
        let hidden = substrate.hidden_coordinates();
        let outputs = substrate.output_coordinates();

        for (h, &hx) in hidden.iter().enumerate() {
            // Bias sits at coordinate 0
            if let Some(w) = self.weight(0, 0.0, hx, z) {
                out.push(Connection { source: 0, target: hidden_base + h, weight: w });
            }
            for (i, &ix) in inputs.iter().enumerate() {
                if let Some(w) = self.weight(0, ix, hx, z) {
                    out.push(Connection { source: input_base + i, target: hidden_base + h, weight: w });
                }
            }
        }

        for (o, &ox) in outputs.iter().enumerate() {
            if let Some(w) = self.weight(1, 0.0, ox, z) {
                out.push(Connection { source: 0, target: output_base + o, weight: w });
            }
            for (h, &hx) in hidden.iter().enumerate() {
                if let Some(w) = self.weight(1, hx, ox, z) {
                    out.push(Connection { source: hidden_base + h, target: output_base + o, weight: w });
                }
            }
        }
    }

    fn check(substrate: &SubstrateDescription) -> Result<(), DecodeError> {
        if substrate.input_count() == 0 {
            return Err(DecodeError::EmptyLayer("input"));
        }
        if substrate.output_count == 0 {
            return Err(DecodeError::EmptyLayer("output"));
        }
        Ok(())
    }

    /// Block-diagonal team network; robot `k` uses role coordinate `z[k] + shift`
    fn team_network(
        &self,
        substrate: &SubstrateDescription,
        z_coordinates: &[f32],
        shift: f32,
    ) -> DenseNetwork {
        let n = z_coordinates.len();
        let (i, h, o) = (substrate.input_count(), substrate.hidden_count, substrate.output_count);
        let hidden_start = 1 + n * i;
        let output_start = hidden_start + n * h;

        let mut connections = Vec::new();
        for (k, &z) in z_coordinates.iter().enumerate() {
            self.block(
                substrate,
                z + shift,
                1 + k * i,
                hidden_start + k * h,
                output_start + k * o,
                &mut connections,
            );
        }
        DenseNetwork::new(n * i, n * h, n * o, connections)
    }

    fn role_coordinates(num_robots: usize) -> Vec<f32> {
        (0..num_robots)
            .map(|k| SubstrateDescription::coordinate(k, num_robots) as f32)
            .collect()
    }
}

impl GenomeDecoder for DenseGenome {
    fn decode_homogeneous(
        &self,
        substrate: &SubstrateDescription,
    ) -> Result<Box<dyn Network>, DecodeError> {
        Self::check(substrate)?;
        Ok(Box::new(self.team_network(substrate, &[0.0], 0.0)))
    }

    fn decode_team(
        &self,
        substrate: &SubstrateDescription,
        num_robots: usize,
    ) -> Result<TeamDecode, DecodeError> {
        Self::check(substrate)?;
        let z_coordinates = Self::role_coordinates(num_robots);
        let network = Box::new(self.team_network(substrate, &z_coordinates, 0.0));
        Ok(TeamDecode {
            network,
            z_coordinates,
        })
    }

    fn decode_stack(
        &self,
        substrate: &SubstrateDescription,
        num_robots: usize,
        stack_size: usize,
    ) -> Result<StackDecode, DecodeError> {
        Self::check(substrate)?;
        if stack_size == 0 {
            return Err(DecodeError::StackSize(stack_size));
        }
        let z_coordinates = Self::role_coordinates(num_robots);
        let networks = (0..stack_size)
            .map(|j| {
                Box::new(self.team_network(substrate, &z_coordinates, j as f32)) as Box<dyn Network>
            })
            .collect();
        Ok(StackDecode {
            networks,
            z_coordinates,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn substrate() -> SubstrateDescription {
        SubstrateDescription::new(vec![3, 2], 4, 2)
    }

    fn genome() -> DenseGenome {
        DenseGenome::random(&mut ChaCha8Rng::seed_from_u64(7))
    }

    #[test]
    fn test_homogeneous_widths_follow_substrate() {
        let net = genome().decode_homogeneous(&substrate()).unwrap();
        assert_eq!(net.input_count(), 5);
        assert_eq!(net.output_count(), 2);
    }

    #[test]
    fn test_team_widths_scale_with_robots() {
        let team = genome().decode_team(&substrate(), 3).unwrap();
        assert_eq!(team.network.input_count(), 15);
        assert_eq!(team.network.output_count(), 6);
        assert_eq!(team.z_coordinates, vec![-1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_stack_has_requested_depth() {
        let stack = genome().decode_stack(&substrate(), 2, 3).unwrap();
        assert_eq!(stack.networks.len(), 3);
        assert_eq!(
            genome().decode_stack(&substrate(), 2, 0).unwrap_err(),
            DecodeError::StackSize(0)
        );
    }

    #[test]
    fn test_empty_substrate_rejected() {
        let empty = SubstrateDescription::new(vec![], 4, 2);
        assert_eq!(
            genome().decode_homogeneous(&empty).unwrap_err(),
            DecodeError::EmptyLayer("input")
        );
    }

    #[test]
    fn test_outputs_stay_in_unit_interval() {
        let mut net = genome().decode_homogeneous(&substrate()).unwrap();
        net.set_input_signals(&[1.0, 0.0, 0.5, 0.2, 0.9]);
        net.multiple_steps(2);
        for i in 0..net.output_count() {
            let o = net.output_signal(i);
            assert!((0.0..=1.0).contains(&o), "output {} = {}", i, o);
        }
    }

    #[test]
    fn test_signal_needs_two_steps_to_reach_outputs() {
        // Constant-only weight functions: every connection gets the same strong weight
        let g = DenseGenome::new([0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0]);
        let mut net = g.decode_homogeneous(&SubstrateDescription::new(vec![1], 1, 1)).unwrap();

        net.set_input_signals(&[0.0]);
        net.multiple_steps(1);
        let after_one = net.output_signal(0);
        net.multiple_steps(1);
        let after_two = net.output_signal(0);
        // Output reads hidden's settled value only on the second step
        assert_ne!(after_one, after_two);
    }

    #[test]
    fn test_decode_is_deterministic() {
        let mut a = genome().decode_homogeneous(&substrate()).unwrap();
        let mut b = genome().decode_homogeneous(&substrate()).unwrap();
        let inputs = [0.3, 0.1, 0.7, 0.0, 1.0];
        a.set_input_signals(&inputs);
        b.set_input_signals(&inputs);
        a.multiple_steps(2);
        b.multiple_steps(2);
        assert_eq!(a.output_signal(0), b.output_signal(0));
        assert_eq!(a.output_signal(1), b.output_signal(1));
    }
}
