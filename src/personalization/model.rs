// PersonalizationModel - residual 2→8→16→2 tanh regressor
//
// Maps a suggested (valence, arousal) pair to a user-corrected pair.
//
// Normalization:
// - valence is already in [-1, 1]
// - arousal in [0, 1] is rescaled to [-1, 1] (a × 2 − 1) before the network
//   and mapped back ((y + 1) / 2) after it
//
// Forward pass on a normalized input x:
//   h1  = tanh(W1·x + b1)                   8 units
//   h2  = tanh(W2·h1 + b2)                  16 units
//   d   = W3·h2 + b3                        2 units, W3/b3 start at zero
//   out = tanh(atanh(clip(x, ±0.999)) + d)
//
// The residual path through atanh makes an untrained model the identity,
// and the outer tanh bounds the output. Training is minibatch gradient
// descent on mean squared error for a fixed epoch budget.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::{EmotionCoordinate, TrainingSample};
use crate::config::PersonalizationConfig;
use crate::error::PersonalizationError;
use crate::suggestion::EmotionSuggestion;

/// Layer widths, input to output
pub const ARCHITECTURE: [usize; 4] = [2, 8, 16, 2];

/// Inputs are clipped inside (-1, 1) before atanh
const RESIDUAL_CLIP: f32 = 0.999;

/// Fully connected layer, weights row-major (`outputs × inputs`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseLayer {
    pub inputs: usize,
    pub outputs: usize,
    pub weights: Vec<f32>,
    pub biases: Vec<f32>,
}

impl DenseLayer {
    /// Xavier-uniform initialized layer
    fn xavier(inputs: usize, outputs: usize, rng: &mut StdRng) -> Self {
        let limit = (6.0 / (inputs + outputs) as f32).sqrt();
        Self {
            inputs,
            outputs,
            weights: (0..inputs * outputs)
                .map(|_| rng.gen_range(-limit..limit))
                .collect(),
            biases: vec![0.0; outputs],
        }
    }

    fn zeros(inputs: usize, outputs: usize) -> Self {
        Self {
            inputs,
            outputs,
            weights: vec![0.0; inputs * outputs],
            biases: vec![0.0; outputs],
        }
    }

    fn forward(&self, input: &[f32]) -> Vec<f32> {
        (0..self.outputs)
            .map(|o| {
                let row = &self.weights[o * self.inputs..(o + 1) * self.inputs];
                row.iter().zip(input).map(|(w, x)| w * x).sum::<f32>() + self.biases[o]
            })
            .collect()
    }

    /// Wᵀ·delta
    fn backward(&self, delta: &[f32]) -> Vec<f32> {
        (0..self.inputs)
            .map(|i| {
                (0..self.outputs)
                    .map(|o| self.weights[o * self.inputs + i] * delta[o])
                    .sum()
            })
            .collect()
    }

    fn is_well_formed(&self) -> bool {
        self.weights.len() == self.inputs * self.outputs
            && self.biases.len() == self.outputs
            && self.weights.iter().chain(&self.biases).all(|v| v.is_finite())
    }
}

/// Accumulated gradients for one layer
struct LayerGradient {
    weights: Vec<f32>,
    biases: Vec<f32>,
}

impl LayerGradient {
    fn zeros_like(layer: &DenseLayer) -> Self {
        Self {
            weights: vec![0.0; layer.weights.len()],
            biases: vec![0.0; layer.biases.len()],
        }
    }

    fn accumulate(&mut self, delta: &[f32], input: &[f32]) {
        let inputs = input.len();
        for (o, d) in delta.iter().enumerate() {
            self.biases[o] += d;
            for (i, x) in input.iter().enumerate() {
                self.weights[o * inputs + i] += d * x;
            }
        }
    }
}

/// Intermediate activations kept for backpropagation
struct ForwardTrace {
    input: [f32; 2],
    hidden1: Vec<f32>,
    hidden2: Vec<f32>,
    output: Vec<f32>,
}

/// Trained (or untrained) correction model for one profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalizationModel {
    pub architecture: Vec<usize>,
    pub layers: Vec<DenseLayer>,
    /// Number of samples the model was last trained on
    #[serde(default)]
    pub trained_samples: usize,
    /// Mean squared error on the training set after the final epoch
    #[serde(default)]
    pub final_loss: f32,
}

impl PersonalizationModel {
    /// Untrained model: Xavier hidden layers, zero output layer (identity)
    pub fn new(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        Self {
            architecture: ARCHITECTURE.to_vec(),
            layers: vec![
                DenseLayer::xavier(ARCHITECTURE[0], ARCHITECTURE[1], &mut rng),
                DenseLayer::xavier(ARCHITECTURE[1], ARCHITECTURE[2], &mut rng),
                DenseLayer::zeros(ARCHITECTURE[2], ARCHITECTURE[3]),
            ],
            trained_samples: 0,
            final_loss: 0.0,
        }
    }

    /// Train a fresh model on `samples`
    ///
    /// Always runs the full epoch budget. Minimum-sample policy belongs to
    /// the caller; this only rejects an empty or out-of-range sample set.
    ///
    /// # Errors
    /// - `InsufficientSamples` when `samples` is empty
    /// - `InvalidSample` when any coordinate is out of range
    pub fn train(
        samples: &[TrainingSample],
        config: &PersonalizationConfig,
    ) -> Result<Self, PersonalizationError> {
        if samples.is_empty() {
            return Err(PersonalizationError::InsufficientSamples {
                required: 1,
                collected: 0,
            });
        }
        for sample in samples {
            sample.validate()?;
        }

        let mut model = Self::new(config.seed);
        let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(1));
        let data: Vec<([f32; 2], [f32; 2])> = samples
            .iter()
            .map(|s| (normalize(s.input), normalize(s.output)))
            .collect();
        let batch_size = match config.batch_size {
            0 => data.len(),
            n => n.min(data.len()),
        };

        let mut order: Vec<usize> = (0..data.len()).collect();
        for _ in 0..config.epochs {
            order.shuffle(&mut rng);
            for batch in order.chunks(batch_size) {
                model.step(batch.iter().map(|&i| &data[i]), batch.len(), config.learning_rate);
            }
        }

        model.trained_samples = samples.len();
        model.final_loss = model.mean_squared_error(samples);

        tracing::info!(
            "[PersonalizationModel] Trained on {} samples for {} epochs (mse {:.5})",
            samples.len(),
            config.epochs,
            model.final_loss
        );

        Ok(model)
    }

    /// Corrected coordinate, clamped to valence [-1, 1] and arousal [0, 1]
    pub fn predict_point(&self, input: EmotionCoordinate) -> EmotionCoordinate {
        let output = self.forward(normalize(input)).output;
        let corrected = denormalize([output[0], output[1]]);
        EmotionCoordinate {
            valence: finite_or(corrected.valence, input.valence).clamp(-1.0, 1.0),
            arousal: finite_or(corrected.arousal, input.arousal).clamp(0.0, 1.0),
        }
    }

    /// Apply the correction to every suggestion's coordinates
    pub fn predict(&self, suggestions: &[EmotionSuggestion]) -> Vec<EmotionSuggestion> {
        suggestions
            .iter()
            .map(|suggestion| {
                let corrected = self.predict_point(EmotionCoordinate {
                    valence: suggestion.valence,
                    arousal: suggestion.arousal,
                });
                EmotionSuggestion {
                    valence: corrected.valence,
                    arousal: corrected.arousal,
                    ..suggestion.clone()
                }
            })
            .collect()
    }

    /// Mean squared error in unnormalized coordinate units
    pub fn mean_squared_error(&self, samples: &[TrainingSample]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }
        let total: f32 = samples
            .iter()
            .map(|s| {
                let p = self.predict_point(s.input);
                (p.valence - s.output.valence).powi(2) + (p.arousal - s.output.arousal).powi(2)
            })
            .sum();
        total / (2 * samples.len()) as f32
    }

    /// Check that deserialized weights match the architecture
    pub fn validate_shape(&self) -> Result<(), PersonalizationError> {
        if self.architecture != ARCHITECTURE || self.layers.len() != ARCHITECTURE.len() - 1 {
            return Err(PersonalizationError::ModelShape {
                reason: format!("architecture {:?}", self.architecture),
            });
        }

        for (index, layer) in self.layers.iter().enumerate() {
            if layer.inputs != ARCHITECTURE[index]
                || layer.outputs != ARCHITECTURE[index + 1]
                || !layer.is_well_formed()
            {
                return Err(PersonalizationError::ModelShape {
                    reason: format!(
                        "layer {} is {}x{} with {} weights",
                        index,
                        layer.outputs,
                        layer.inputs,
                        layer.weights.len()
                    ),
                });
            }
        }

        Ok(())
    }

    fn forward(&self, input: [f32; 2]) -> ForwardTrace {
        let hidden1: Vec<f32> = self.layers[0].forward(&input).into_iter().map(f32::tanh).collect();
        let hidden2: Vec<f32> = self.layers[1].forward(&hidden1).into_iter().map(f32::tanh).collect();
        let residual = self.layers[2].forward(&hidden2);
        let output = input
            .iter()
            .zip(&residual)
            .map(|(x, d)| (x.clamp(-RESIDUAL_CLIP, RESIDUAL_CLIP).atanh() + d).tanh())
            .collect();

        ForwardTrace {
            input,
            hidden1,
            hidden2,
            output,
        }
    }

    /// One gradient-descent step over a minibatch
    fn step<'a>(
        &mut self,
        batch: impl Iterator<Item = &'a ([f32; 2], [f32; 2])>,
        batch_len: usize,
        learning_rate: f32,
    ) {
        let mut gradients: Vec<LayerGradient> =
            self.layers.iter().map(LayerGradient::zeros_like).collect();

        for (input, target) in batch {
            let trace = self.forward(*input);

            let delta3: Vec<f32> = trace
                .output
                .iter()
                .zip(target)
                .map(|(y, t)| (y - t) * (1.0 - y * y))
                .collect();
            let delta2: Vec<f32> = self.layers[2]
                .backward(&delta3)
                .iter()
                .zip(&trace.hidden2)
                .map(|(g, h)| g * (1.0 - h * h))
                .collect();
            let delta1: Vec<f32> = self.layers[1]
                .backward(&delta2)
                .iter()
                .zip(&trace.hidden1)
                .map(|(g, h)| g * (1.0 - h * h))
                .collect();

            gradients[2].accumulate(&delta3, &trace.hidden2);
            gradients[1].accumulate(&delta2, &trace.hidden1);
            gradients[0].accumulate(&delta1, &trace.input);
        }

        let scale = learning_rate / batch_len.max(1) as f32;
        for (layer, gradient) in self.layers.iter_mut().zip(gradients) {
            for (w, g) in layer.weights.iter_mut().zip(gradient.weights) {
                *w -= scale * g;
            }
            for (b, g) in layer.biases.iter_mut().zip(gradient.biases) {
                *b -= scale * g;
            }
        }
    }
}

fn normalize(point: EmotionCoordinate) -> [f32; 2] {
    [point.valence, point.arousal * 2.0 - 1.0]
}

fn denormalize(output: [f32; 2]) -> EmotionCoordinate {
    EmotionCoordinate {
        valence: output[0],
        arousal: (output[1] + 1.0) / 2.0,
    }
}

fn finite_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}
