//! Metrics for evaluating learners.
use crate::datasets::DataMatrix;
use crate::error::{NetError, NetResult};
use crate::learner::Predictor;

fn check_shapes(features: &DataMatrix, labels: &DataMatrix) -> NetResult<()> {
    if features.is_empty() {
        return Err(NetError::InvalidData("no rows to score".into()));
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
    Ok(())
}

/// Fraction of correct predictions when the label column is nominal, mean squared error
/// when it is continuous.
pub fn measure_accuracy<P: Predictor + ?Sized>(
    model: &P,
    features: &DataMatrix,
    labels: &DataMatrix,
) -> NetResult<f64> {
    check_shapes(features, labels)?;
    let rows = features.rows();
    if labels.value_count(0) >= 2 {
        let mut correct = 0;
        for i in 0..rows {
            let pred = model.predict(features.row(i))?;
            if pred as usize == labels.get(i, 0) as usize {
                correct += 1;
            }
        }
        Ok(correct as f64 / rows as f64)
    } else {
        let mut sse = 0.0;
        for i in 0..rows {
            let pred = model.predict(features.row(i))?;
            sse += (pred - labels.get(i, 0)).powi(2);
        }
        Ok(sse / rows as f64)
    }
}

/// Confusion matrix indexed `[true_class][predicted_class]`.
pub fn confusion_matrix<P: Predictor + ?Sized>(
    model: &P,
    features: &DataMatrix,
    labels: &DataMatrix,
) -> NetResult<Vec<Vec<usize>>> {
    check_shapes(features, labels)?;
    let num_classes = labels.value_count(0);
    if num_classes < 2 {
        return Err(NetError::InvalidData(
            "confusion matrix needs a nominal label column".into(),
        ));
    }
    let mut cm = vec![vec![0; num_classes]; num_classes];
    for i in 0..features.rows() {
        let true_class = labels.get(i, 0);
        let pred_class = model.predict(features.row(i))?;
        if true_class < 0.0 || true_class as usize >= num_classes {
            return Err(NetError::LabelOutOfRange {
                row: Some(i),
                label: true_class,
                classes: num_classes,
            });
        }
        let pred_class = (pred_class.max(0.0) as usize).min(num_classes - 1);
        cm[true_class as usize][pred_class] += 1;
    }
    Ok(cm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasets::Attribute;
    use approx::assert_relative_eq;

    /// Predicts the first feature.
    struct Echo;

    impl Predictor for Echo {
        fn predict(&self, features: &[f64]) -> NetResult<f64> {
            Ok(features[0])
        }
    }

    fn nominal_labels(values: &[f64]) -> DataMatrix {
        let mut m = DataMatrix::new(vec![Attribute::nominal("class", vec!["a", "b", "c"])]);
        for &v in values {
            m.push_row(vec![v]).unwrap();
        }
        m
    }

    #[test]
    fn test_classification_accuracy() {
        let features =
            DataMatrix::from_rows(vec![vec![0.0], vec![1.0], vec![2.0], vec![1.0]]).unwrap();
        let labels = nominal_labels(&[0.0, 1.0, 1.0, 1.0]);
        assert_relative_eq!(measure_accuracy(&Echo, &features, &labels).unwrap(), 0.75);

        let cm = confusion_matrix(&Echo, &features, &labels).unwrap();
        assert_eq!(cm[0][0], 1);
        assert_eq!(cm[1][1], 2);
        assert_eq!(cm[1][2], 1);
        assert_eq!(cm.iter().flatten().sum::<usize>(), 4);
    }

    #[test]
    fn test_regression_mse() {
        let features = DataMatrix::from_rows(vec![vec![1.0], vec![3.0]]).unwrap();
        let labels = DataMatrix::from_rows(vec![vec![0.0], vec![1.0]]).unwrap();
        assert_relative_eq!(measure_accuracy(&Echo, &features, &labels).unwrap(), 2.5);
        assert!(confusion_matrix(&Echo, &features, &labels).is_err());
    }

    #[test]
    fn test_shape_errors() {
        let features = DataMatrix::from_rows(vec![vec![1.0], vec![3.0]]).unwrap();
        let labels = DataMatrix::from_rows(vec![vec![0.0]]).unwrap();
        assert!(matches!(
            measure_accuracy(&Echo, &features, &labels),
            Err(NetError::InvalidData(_))
        ));
    }
}
