//! Neuron layout a genome is decoded onto

use serde::{Deserialize, Serialize};

/// Per-robot neuron layout.
///
/// Input neurons are grouped into layers that mirror the sensor suite; layer
/// 0 holds one neuron per rangefinder. A team controller stacks one copy of
/// this layout per robot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubstrateDescription {
    input_layers: Vec<usize>,
    pub hidden_count: usize,
    pub output_count: usize,
}

impl SubstrateDescription {
    pub fn new(input_layers: Vec<usize>, hidden_count: usize, output_count: usize) -> Self {
        Self {
            input_layers,
            hidden_count,
            output_count,
        }
    }

    /// Inputs per robot
    pub fn input_count(&self) -> usize {
        self.input_layers.iter().sum()
    }

    pub fn input_layers(&self) -> &[usize] {
        &self.input_layers
    }

    /// Resize one input layer, appending empty layers as needed
    pub fn set_neuron_density(&mut self, layer: usize, count: usize) {
        if self.input_layers.len() <= layer {
            self.input_layers.resize(layer + 1, 0);
        }
        self.input_layers[layer] = count;
    }

    /// Position in [-1, 1] of neuron `index` among `count` neurons
    pub fn coordinate(index: usize, count: usize) -> f64 {
        if count <= 1 {
            0.0
        } else {
            -1.0 + 2.0 * index as f64 / (count - 1) as f64
        }
    }

    pub fn input_coordinates(&self) -> Vec<f64> {
        let n = self.input_count();
        (0..n).map(|i| Self::coordinate(i, n)).collect()
    }

    pub fn hidden_coordinates(&self) -> Vec<f64> {
        (0..self.hidden_count)
            .map(|i| Self::coordinate(i, self.hidden_count))
            .collect()
    }

    pub fn output_coordinates(&self) -> Vec<f64> {
        (0..self.output_count)
            .map(|i| Self::coordinate(i, self.output_count))
            .collect()
    }
}
