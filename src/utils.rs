//! Synthetic datasets and console summaries.
use rand::Rng;

use crate::datasets::{Attribute, DataMatrix};
use crate::network::NeuralNet;
use crate::report::TrainingReport;

/// The four XOR instances with nominal `{0, 1}` inputs and a two-class label.
pub fn xor_dataset() -> (DataMatrix, DataMatrix) {
    let mut features = DataMatrix::new(vec![
        Attribute::nominal("a", vec!["0", "1"]),
        Attribute::nominal("b", vec!["0", "1"]),
    ]);
    let mut labels = DataMatrix::new(vec![Attribute::nominal("xor", vec!["0", "1"])]);
    for (a, b) in [(0.0, 0.0), (0.0, 1.0), (1.0, 0.0), (1.0, 1.0)] {
        features.push_row(vec![a, b]).expect("xor rows have two columns");
        let label = if a == b { 0.0 } else { 1.0 };
        labels.push_row(vec![label]).expect("xor labels have one column");
    }
    (features, labels)
}

/// Two noisy point clouds centred on `(-0.5, -0.5)` and `(0.5, 0.5)` inside the unit square
/// `[-1, 1]²`, labelled `low` and `high`.
pub fn two_clusters<R: Rng + ?Sized>(rng: &mut R, per_class: usize) -> (DataMatrix, DataMatrix) {
    let mut features =
        DataMatrix::new(vec![Attribute::continuous("x"), Attribute::continuous("y")]);
    let mut labels = DataMatrix::new(vec![Attribute::nominal("cluster", vec!["low", "high"])]);
    for class in 0..2 {
        let centre = if class == 0 { -0.5 } else { 0.5 };
        for _ in 0..per_class {
            let x = centre + rng.gen_range(-0.4..0.4);
            let y = centre + rng.gen_range(-0.4..0.4);
            features.push_row(vec![x, y]).expect("cluster rows have two columns");
            labels.push_row(vec![class as f64]).expect("cluster labels have one column");
        }
    }
    (features, labels)
}

/// Print model summary
pub fn print_model_summary(net: &NeuralNet) {
    let config = net.config();
    println!("Model Summary:");
    match net.network() {
        Some(network) => println!("  {}", network),
        None => println!("  untrained, hidden layers {:?}", config.hidden_layers),
    }
    println!(
        "  learning rate {}, momentum {}",
        config.learning_rate,
        if config.use_momentum {
            config.momentum.to_string()
        } else {
            "off".to_string()
        }
    );
}

/// Print the training history, one line per stopping window plus the final epoch.
pub fn print_summary_table(report: &TrainingReport, window: usize) {
    println!("\nTraining Summary ({:?}):", report.score_kind());
    println!("+--------+------------+------------+------------+");
    println!("| Epoch  | Validation | Training   | SSE        |");
    println!("+--------+------------+------------+------------+");
    let window = window.max(1);
    let epochs = report.epochs();
    for (i, rec) in epochs.iter().enumerate() {
        if rec.epoch % window == 0 || i + 1 == epochs.len() {
            println!(
                "| {:>6} | {:>10.6} | {:>10.6} | {:>10.6} |",
                rec.epoch, rec.validation_score, rec.training_score, rec.sum_squared_error
            );
        }
    }
    println!("+--------+------------+------------+------------+");
    if let Some(reason) = report.stop_reason() {
        println!(
            "Stopped after {} epochs ({:?}, {:.2}s)",
            report.epoch_count(),
            reason,
            report.total_secs()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_xor_dataset() {
        let (features, labels) = xor_dataset();
        assert_eq!(features.rows(), 4);
        assert_eq!(features.value_count(0), 2);
        assert_eq!(labels.value_count(0), 2);
        for i in 0..4 {
            let expected = (features.get(i, 0) != features.get(i, 1)) as u8 as f64;
            assert_eq!(labels.get(i, 0), expected);
        }
    }

    #[test]
    fn test_two_clusters() {
        let mut rng = StdRng::seed_from_u64(4);
        let (features, labels) = two_clusters(&mut rng, 10);
        assert_eq!(features.rows(), 20);
        assert_eq!(labels.rows(), 20);
        for i in 0..20 {
            let low = labels.get(i, 0) == 0.0;
            assert_eq!(features.get(i, 0) < 0.0, low);
            assert_eq!(features.get(i, 1) < 0.0, low);
        }
    }
}
