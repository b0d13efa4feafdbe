//! Backpropagation network: the layer chain and the learner that trains it.
use std::fmt;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::config::NetworkConfig;
use crate::datasets::{one_hot, DataMatrix};
use crate::error::{NetError, NetResult};
use crate::layers::{Layer, LayerParams, BIAS};
use crate::learner::{Predictor, SupervisedLearner};
use crate::loss::{output_delta, sum_squared_error};
use crate::metrics::measure_accuracy;
use crate::report::{EpochRecord, TrainingReport};
use crate::stopping::{ScoreKind, StopReason, StoppingCriteria};

/// How labels map onto output units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputEncoding {
    /// One output unit carrying the label value.
    Continuous,
    /// One output unit per class; the target is one-hot.
    OneHot(usize),
}

impl OutputEncoding {
    /// Label columns with fewer than two nominal values are treated as continuous.
    pub fn for_labels(labels: &DataMatrix) -> Self {
        match labels.value_count(0) {
            n if n < 2 => OutputEncoding::Continuous,
            n => OutputEncoding::OneHot(n),
        }
    }

    pub fn output_rank(self) -> usize {
        match self {
            OutputEncoding::Continuous => 1,
            OutputEncoding::OneHot(n) => n,
        }
    }

    pub fn score_kind(self) -> ScoreKind {
        match self {
            OutputEncoding::Continuous => ScoreKind::MeanSquaredError,
            OutputEncoding::OneHot(_) => ScoreKind::Accuracy,
        }
    }

    /// Whether `label` can be encoded: any finite value for a continuous output, a
    /// whole class index below `n` for one-hot.
    pub fn accepts(self, label: f64) -> bool {
        match self {
            OutputEncoding::Continuous => label.is_finite(),
            OutputEncoding::OneHot(n) => {
                label >= 0.0 && label.fract() == 0.0 && (label as usize) < n
            }
        }
    }

    /// Target vector for a label.
    pub fn target(self, label: f64) -> NetResult<Vec<f64>> {
        if !self.accepts(label) {
            let classes = match self {
                OutputEncoding::Continuous => 0,
                OutputEncoding::OneHot(n) => n,
            };
            return Err(NetError::LabelOutOfRange {
                row: None,
                label,
                classes,
            });
        }
        Ok(match self {
            OutputEncoding::Continuous => vec![label],
            OutputEncoding::OneHot(n) => one_hot(label as usize, n),
        })
    }

    /// Label for an output vector; anything past the output units (the bias) is ignored.
    pub fn decode(self, output: &[f64]) -> f64 {
        match self {
            OutputEncoding::Continuous => output[0],
            OutputEncoding::OneHot(n) => {
                let mut best = 0;
                for (i, &v) in output.iter().enumerate().take(n) {
                    if v > output[best] {
                        best = i;
                    }
                }
                best as f64
            }
        }
    }
}

/// Ordered chain of layers, input side first.
#[derive(Debug, Clone)]
pub struct Network {
    layers: Vec<Layer>,
    encoding: OutputEncoding,
}

impl Network {
    /// Builds `input_rank -> hidden[0] -> ... -> encoding.output_rank()`.
    pub fn new<R: Rng + ?Sized>(
        rng: &mut R,
        input_rank: usize,
        hidden: &[usize],
        encoding: OutputEncoding,
        init_range: f64,
        params: LayerParams,
    ) -> NetResult<Self> {
        let mut layers = Vec::with_capacity(hidden.len() + 1);
        let mut prev = input_rank;
        for (index, &size) in hidden.iter().enumerate() {
            layers.push(Layer::new(rng, index, prev, size, init_range, params)?);
            prev = size;
        }
        layers.push(Layer::new(
            rng,
            hidden.len(),
            prev,
            encoding.output_rank(),
            init_range,
            params,
        )?);
        Ok(Self { layers, encoding })
    }

    /// Assembles a network from prebuilt layers, checking that adjacent ranks line up.
    pub fn from_layers(layers: Vec<Layer>, encoding: OutputEncoding) -> NetResult<Self> {
        let last = layers
            .last()
            .ok_or_else(|| NetError::InvalidData("a network needs at least one layer".into()))?;
        for (i, pair) in layers.windows(2).enumerate() {
            if pair[1].input_rank() != pair[0].output_rank() {
                return Err(NetError::DimensionMismatch {
                    layer: i + 1,
                    expected: pair[0].output_rank() + 1,
                    actual: pair[1].input_rank() + 1,
                });
            }
        }
        if last.output_rank() != encoding.output_rank() {
            return Err(NetError::DimensionMismatch {
                layer: layers.len() - 1,
                expected: encoding.output_rank(),
                actual: last.output_rank(),
            });
        }
        Ok(Self { layers, encoding })
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn encoding(&self) -> OutputEncoding {
        self.encoding
    }

    pub fn input_rank(&self) -> usize {
        self.layers[0].input_rank()
    }

    pub fn output_rank(&self) -> usize {
        self.encoding.output_rank()
    }

    fn input_vector(features: &[f64]) -> Vec<f64> {
        let mut input = Vec::with_capacity(features.len() + 1);
        input.extend_from_slice(features);
        input.push(BIAS);
        input
    }

    /// Runs `features` through every layer, recording state for backpropagation.
    /// The result still carries the trailing bias value.
    pub fn forward(&mut self, features: &[f64]) -> NetResult<Vec<f64>> {
        let mut current = Self::input_vector(features);
        for layer in &mut self.layers {
            current = layer.forward(&current)?;
        }
        Ok(current)
    }

    /// Same as [`forward`](Network::forward) without touching layer state.
    pub fn activate(&self, features: &[f64]) -> NetResult<Vec<f64>> {
        let mut current = Self::input_vector(features);
        for layer in &self.layers {
            current = layer.activate(&current)?;
        }
        Ok(current)
    }

    /// Propagates the output-layer delta back to the input, updating every layer.
    pub fn backward(&mut self, output_delta: Vec<f64>) -> NetResult<()> {
        let mut delta = output_delta;
        for layer in self.layers.iter_mut().rev() {
            delta = layer.backward(&delta)?;
        }
        Ok(())
    }

    /// One stochastic gradient step on a single instance. Returns the squared error of
    /// the output before the update. A label the encoding rejects leaves the weights as
    /// they were.
    pub fn train_instance(&mut self, features: &[f64], label: f64) -> NetResult<f64> {
        let target = self.encoding.target(label)?;
        let output = self.forward(features)?;
        let sse = sum_squared_error(&target, &output);
        self.backward(output_delta(&target, &output))?;
        Ok(sse)
    }
}

impl Predictor for Network {
    fn predict(&self, features: &[f64]) -> NetResult<f64> {
        let output = self.activate(features)?;
        Ok(self.encoding.decode(&output))
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sizes = vec![self.input_rank()];
        for layer in &self.layers {
            sizes.push(layer.output_rank());
        }
        write!(f, "Network: {:?}", sizes)
    }
}

/// Backpropagation learner.
///
/// Each [`train`](SupervisedLearner::train) call builds a fresh [`Network`] sized from the
/// data, runs epochs until the [`StoppingCriteria`] say stop, and keeps the result for
/// prediction. A failed call leaves the learner untrained.
#[derive(Debug)]
pub struct NeuralNet {
    config: NetworkConfig,
    rng: StdRng,
    validation: Option<(DataMatrix, DataMatrix)>,
    network: Option<Network>,
    report: Option<TrainingReport>,
}

impl NeuralNet {
    pub fn new(config: NetworkConfig, rng: StdRng) -> Self {
        Self {
            config,
            rng,
            validation: None,
            network: None,
            report: None,
        }
    }

    /// Learner whose generator is seeded from `config.seed`.
    pub fn from_config(config: NetworkConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self::new(config, rng)
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn is_trained(&self) -> bool {
        self.network.is_some()
    }

    /// The trained network, if any.
    pub fn network(&self) -> Option<&Network> {
        self.network.as_ref()
    }

    /// History of the last successful training run.
    pub fn report(&self) -> Option<&TrainingReport> {
        self.report.as_ref()
    }

    fn layer_params(&self) -> LayerParams {
        LayerParams {
            learning_rate: self.config.learning_rate,
            momentum: self.config.use_momentum.then_some(self.config.momentum),
        }
    }

    fn run_epochs(
        &mut self,
        network: &mut Network,
        mut features: DataMatrix,
        mut labels: DataMatrix,
        mut val_features: DataMatrix,
        mut val_labels: DataMatrix,
    ) -> NetResult<TrainingReport> {
        let start = Instant::now();
        let kind = network.encoding().score_kind();
        let criteria = StoppingCriteria::from_config(&self.config, kind);
        let mut report = TrainingReport::new(kind);

        let mut epoch_count = 0;
        let mut current = kind.worst();
        let mut best = kind.worst();
        let reason = loop {
            best = criteria.promote_best(epoch_count, current, best);

            features.shuffle(&mut self.rng, Some(&mut labels))?;
            let mut sse = 0.0;
            for i in 0..features.rows() {
                sse += network.train_instance(features.row(i), labels.get(i, 0))?;
            }

            val_features.shuffle(&mut self.rng, Some(&mut val_labels))?;
            current = measure_accuracy(&*network, &val_features, &val_labels)?;
            let training_score = measure_accuracy(&*network, &features, &labels)?;
            epoch_count += 1;

            let elapsed = start.elapsed();
            debug!(
                epoch = epoch_count,
                validation = current,
                training = training_score,
                sse,
                "epoch finished"
            );
            report.push(EpochRecord {
                epoch: epoch_count,
                validation_score: current,
                training_score,
                sum_squared_error: sse,
                elapsed_secs: elapsed.as_secs_f64(),
            });

            if let Some(reason) = criteria.stop_reason(epoch_count, current, best, elapsed) {
                break reason;
            }
        };

        if reason == StopReason::TimeBudget && epoch_count < criteria.min_epochs {
            warn!(
                epochs = epoch_count,
                min_epochs = criteria.min_epochs,
                "time budget ran out before the minimum epoch count"
            );
        }
        report.finish(reason, start.elapsed());
        info!(
            epochs = epoch_count,
            ?reason,
            validation = current,
            secs = report.total_secs(),
            "training finished"
        );
        Ok(report)
    }
}

fn check_training_data(features: &DataMatrix, labels: &DataMatrix) -> NetResult<()> {
    if features.is_empty() {
        return Err(NetError::InvalidData("no training rows".into()));
    }
    if features.cols() == 0 {
        return Err(NetError::InvalidData("no feature columns".into()));
    }
    if labels.cols() != 1 {
        return Err(NetError::InvalidData(format!(
            "expected one label column, found {}",
            labels.cols()
        )));
    }
    if labels.rows() != features.rows() {
        return Err(NetError::InvalidData(format!(
            "{} feature rows but {} label rows",
            features.rows(),
            labels.rows()
        )));
    }
    let encoding = OutputEncoding::for_labels(labels);
    for row in 0..labels.rows() {
        let label = labels.get(row, 0);
        if !encoding.accepts(label) {
            return Err(NetError::LabelOutOfRange {
                row: Some(row),
                label,
                classes: labels.value_count(0),
            });
        }
    }
    Ok(())
}

impl SupervisedLearner for NeuralNet {
    fn train(&mut self, features: &DataMatrix, labels: &DataMatrix) -> NetResult<()> {
        self.network = None;
        self.report = None;

        self.config.validate()?;
        check_training_data(features, labels)?;
        let (val_features, val_labels) = match &self.validation {
            Some((vf, vl)) => {
                check_training_data(vf, vl)?;
                if vf.cols() != features.cols() || vl.value_count(0) != labels.value_count(0) {
                    return Err(NetError::InvalidData(
                        "validation set does not match the training columns".into(),
                    ));
                }
                (vf.clone(), vl.clone())
            }
            None => (features.clone(), labels.clone()),
        };

        let encoding = OutputEncoding::for_labels(labels);
        let params = self.layer_params();
        let mut network = Network::new(
            &mut self.rng,
            features.cols(),
            &self.config.hidden_layers,
            encoding,
            self.config.init_weight_range,
            params,
        )?;
        info!(
            topology = %network,
            rows = features.rows(),
            validation_rows = val_features.rows(),
            "training started"
        );

        let report = self.run_epochs(
            &mut network,
            features.clone(),
            labels.clone(),
            val_features,
            val_labels,
        )?;
        self.network = Some(network);
        self.report = Some(report);
        Ok(())
    }

    fn set_validation_set(&mut self, features: DataMatrix, labels: DataMatrix) {
        self.validation = Some((features, labels));
    }
}

impl Predictor for NeuralNet {
    fn predict(&self, features: &[f64]) -> NetResult<f64> {
        self.network
            .as_ref()
            .ok_or(NetError::NotTrained)?
            .predict(features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasets::Attribute;
    use crate::layers::Matrix;
    use crate::utils::xor_dataset;
    use approx::assert_relative_eq;

    const PARAMS: LayerParams = LayerParams {
        learning_rate: 0.05,
        momentum: None,
    };

    fn quick_config() -> NetworkConfig {
        NetworkConfig {
            min_epochs: 5,
            epoch_window: 5,
            max_epochs: Some(20),
            ..NetworkConfig::default()
        }
    }

    #[test]
    fn test_network_shapes() {
        let mut rng = StdRng::seed_from_u64(1);
        let net =
            Network::new(&mut rng, 3, &[5, 4], OutputEncoding::OneHot(3), 0.1, PARAMS).unwrap();
        assert_eq!(net.layers().len(), 3);
        assert_eq!(net.layers()[0].weights().len(), 4);
        assert_eq!(net.layers()[1].weights().len(), 6);
        assert_eq!(net.layers()[2].weights().len(), 5);
        assert_eq!(net.output_rank(), 3);
        assert_eq!(net.to_string(), "Network: [3, 5, 4, 3]");

        let flat =
            Network::new(&mut rng, 2, &[], OutputEncoding::Continuous, 0.1, PARAMS).unwrap();
        assert_eq!(flat.layers().len(), 1);
        assert_eq!(flat.output_rank(), 1);
    }

    #[test]
    fn test_from_layers_checks_ranks() {
        let a = Layer::from_weights(0, vec![vec![0.0; 3]; 3], PARAMS);
        let b = Layer::from_weights(1, vec![vec![0.0; 2]; 3], PARAMS);
        assert!(matches!(
            Network::from_layers(vec![a.clone(), b], OutputEncoding::OneHot(2)),
            Err(NetError::DimensionMismatch { layer: 1, .. })
        ));
        let c = Layer::from_weights(1, vec![vec![0.0; 2]; 4], PARAMS);
        assert!(
            Network::from_layers(vec![a.clone(), c.clone()], OutputEncoding::OneHot(2)).is_ok()
        );
        assert!(Network::from_layers(vec![a, c], OutputEncoding::Continuous).is_err());
        assert!(Network::from_layers(Vec::new(), OutputEncoding::Continuous).is_err());
    }

    #[test]
    fn test_decode_ignores_bias() {
        let enc = OutputEncoding::OneHot(3);
        assert_eq!(enc.decode(&[0.1, 0.7, 0.3, 1.0]), 1.0);
        assert_eq!(enc.decode(&[0.9, 0.7, 0.3, 1.0]), 0.0);
        assert_eq!(OutputEncoding::Continuous.decode(&[0.42, 1.0]), 0.42);
        assert_eq!(enc.target(2.0).unwrap(), vec![0.0, 0.0, 1.0]);
        assert_eq!(OutputEncoding::Continuous.target(0.3).unwrap(), vec![0.3]);
    }

    #[test]
    fn test_single_step_reduces_error() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut net =
            Network::new(&mut rng, 2, &[3], OutputEncoding::OneHot(2), 0.5, PARAMS).unwrap();
        let features = [0.4, 0.9];
        let target = OutputEncoding::OneHot(2).target(1.0).unwrap();

        let before = sum_squared_error(&target, &net.activate(&features).unwrap());
        let reported = net.train_instance(&features, 1.0).unwrap();
        let after = sum_squared_error(&target, &net.activate(&features).unwrap());
        assert_relative_eq!(reported, before, epsilon = 1e-12);
        assert!(after < before, "error went from {before} to {after}");
    }

    #[test]
    fn test_network_rejects_bad_init_range() {
        let mut rng = StdRng::seed_from_u64(2);
        for range in [0.0, -1.0] {
            assert!(matches!(
                Network::new(&mut rng, 2, &[3], OutputEncoding::OneHot(2), range, PARAMS),
                Err(NetError::InvalidData(_))
            ));
        }
    }

    #[test]
    fn test_train_instance_rejects_unencodable_labels() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut net =
            Network::new(&mut rng, 2, &[3], OutputEncoding::OneHot(2), 0.5, PARAMS).unwrap();
        let before: Vec<Matrix> = net.layers().iter().map(|l| l.weights().clone()).collect();
        for label in [-1.0, 7.0, 2.0, 0.5, f64::NAN] {
            assert!(matches!(
                net.train_instance(&[0.4, 0.9], label),
                Err(NetError::LabelOutOfRange {
                    row: None,
                    classes: 2,
                    ..
                })
            ));
        }
        let after: Vec<Matrix> = net.layers().iter().map(|l| l.weights().clone()).collect();
        assert_eq!(before, after);
        assert!(net.train_instance(&[0.4, 0.9], 1.0).is_ok());

        let mut reg =
            Network::new(&mut rng, 1, &[2], OutputEncoding::Continuous, 0.5, PARAMS).unwrap();
        for label in [f64::NAN, f64::INFINITY] {
            assert!(matches!(
                reg.train_instance(&[0.3], label),
                Err(NetError::LabelOutOfRange { row: None, .. })
            ));
        }
        assert!(reg.train_instance(&[0.3], -0.25).is_ok());
    }

    #[test]
    fn test_predict_before_train() {
        let net = NeuralNet::from_config(NetworkConfig::default());
        assert!(!net.is_trained());
        assert!(matches!(net.predict(&[0.0, 1.0]), Err(NetError::NotTrained)));
    }

    #[test]
    fn test_output_units_follow_label_cardinality() {
        let (features, labels) = xor_dataset();
        let mut net = NeuralNet::from_config(quick_config());
        net.train(&features, &labels).unwrap();
        assert_eq!(net.network().unwrap().output_rank(), 2);

        let continuous = DataMatrix::from_rows(vec![vec![0.0], vec![1.0], vec![1.0], vec![0.0]])
            .unwrap();
        net.train(&features, &continuous).unwrap();
        let network = net.network().unwrap();
        assert_eq!(network.output_rank(), 1);
        assert_eq!(network.encoding(), OutputEncoding::Continuous);
        assert_eq!(net.report().unwrap().score_kind(), ScoreKind::MeanSquaredError);
    }

    #[test]
    fn test_classification_predictions_in_range() {
        let mut features = DataMatrix::from_rows(vec![vec![0.0, 0.0]]).unwrap();
        let mut labels =
            DataMatrix::new(vec![Attribute::nominal("c", vec!["a", "b", "c"])]);
        labels.push_row(vec![2.0]).unwrap();
        features.push_row(vec![1.0, 1.0]).unwrap();
        labels.push_row(vec![0.0]).unwrap();

        let mut net = NeuralNet::from_config(quick_config());
        net.train(&features, &labels).unwrap();
        for x in [-3.0, -0.5, 0.0, 0.5, 3.0] {
            let p = net.predict(&[x, -x]).unwrap();
            assert!(p >= 0.0 && p < 3.0 && p.fract() == 0.0);
        }
    }

    #[test]
    fn test_bad_labels_leave_net_untrained() {
        let (features, _) = xor_dataset();
        let mut labels = DataMatrix::new(vec![Attribute::nominal("c", vec!["a", "b"])]);
        for v in [0.0, 1.0, 2.0, 0.0] {
            labels.push_row(vec![v]).unwrap();
        }
        let mut net = NeuralNet::from_config(quick_config());
        assert!(matches!(
            net.train(&features, &labels),
            Err(NetError::LabelOutOfRange { row: Some(2), .. })
        ));
        assert!(!net.is_trained());

        let short = labels.select_rows(0..2);
        assert!(matches!(
            net.train(&features, &short),
            Err(NetError::InvalidData(_))
        ));
    }

    #[test]
    fn test_invalid_config_leaves_net_untrained() {
        let (features, labels) = xor_dataset();
        let mut net = NeuralNet::from_config(quick_config());
        net.train(&features, &labels).unwrap();
        assert!(net.is_trained());

        let mut broken = NeuralNet::from_config(NetworkConfig {
            hidden_layers: vec![0],
            ..quick_config()
        });
        assert!(matches!(
            broken.train(&features, &labels),
            Err(NetError::Config(_))
        ));
        assert!(broken.report().is_none());
        assert!(!broken.is_trained());
    }

    #[test]
    fn test_mismatched_validation_set_rejected() {
        let (features, labels) = xor_dataset();
        let mut net = NeuralNet::from_config(quick_config());
        let narrow = features.select_columns(0..1);
        net.set_validation_set(narrow, labels.clone());
        assert!(net.train(&features, &labels).is_err());
        assert!(!net.is_trained());
    }

    #[test]
    fn test_predict_dimension_mismatch() {
        let (features, labels) = xor_dataset();
        let mut net = NeuralNet::from_config(quick_config());
        net.train(&features, &labels).unwrap();
        assert!(matches!(
            net.predict(&[1.0, 0.0, 1.0]),
            Err(NetError::DimensionMismatch {
                layer: 0,
                expected: 3,
                actual: 4
            })
        ));
    }
}
