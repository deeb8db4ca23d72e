// src/dataset/metrics.rs
use std::fmt;

use serde::Deserialize;

use crate::dataset::labels::{LabelVocabulary, SentimentLabel};
use crate::utils::error::DatasetError;

/// Rows are expected labels, columns are predicted labels, both in vocabulary order.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfusionMatrix {
    labels: Vec<SentimentLabel>,
    counts: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    pub fn count(&self, expected: usize, predicted: usize) -> usize {
        self.counts[expected][predicted]
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    fn support(&self, class: usize) -> usize {
        self.counts[class].iter().sum()
    }

    fn predicted(&self, class: usize) -> usize {
        self.counts.iter().map(|row| row[class]).sum()
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>10}", "")?;
        for label in &self.labels {
            write!(f, "{:>10}", label.as_str())?;
        }
        writeln!(f)?;
        for (label, row) in self.labels.iter().zip(&self.counts) {
            write!(f, "{:>10}", label.as_str())?;
            for count in row {
                write!(f, "{:>10}", count)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassScores {
    pub label: SentimentLabel,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Accuracy plus support-weighted precision, recall and F1.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationReport {
    pub per_class: Vec<ClassScores>,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:>14}{:>11}{:>11}{:>11}{:>11}", "", "precision", "recall", "f1-score", "support")?;
        for class in &self.per_class {
            writeln!(
                f,
                "{:>14}{:>11.2}{:>11.2}{:>11.2}{:>11}",
                class.label.as_str(),
                class.precision,
                class.recall,
                class.f1,
                class.support
            )?;
        }
        writeln!(f)?;
        writeln!(f, "{:>14}{:>11}{:>11}{:>11.2}{:>11}", "accuracy", "", "", self.accuracy, self.support)?;
        writeln!(
            f,
            "{:>14}{:>11.2}{:>11.2}{:>11.2}{:>11}",
            "weighted avg", self.precision, self.recall, self.f1, self.support
        )
    }
}

/// One classifier output: a label name, or the label's index in the vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Prediction {
    Id(usize),
    Label(SentimentLabel),
}

/// Turns raw classifier outputs into labels of `vocabulary`.
pub fn resolve_predictions(
    predictions: &[Prediction],
    vocabulary: &LabelVocabulary,
) -> Result<Vec<SentimentLabel>, DatasetError> {
    predictions
        .iter()
        .enumerate()
        .map(|(i, prediction)| match *prediction {
            Prediction::Label(label) if vocabulary.contains(label) => Ok(label),
            Prediction::Label(label) => Err(DatasetError::Configuration(format!(
                "prediction {} ('{}') is not in the label set",
                i, label
            ))),
            Prediction::Id(id) => vocabulary.decode(id).ok_or_else(|| {
                DatasetError::Configuration(format!("prediction {} has label id {} out of range", i, id))
            }),
        })
        .collect()
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Scores `predicted` against `expected`, position by position.
pub fn evaluate(
    expected: &[SentimentLabel],
    predicted: &[SentimentLabel],
    vocabulary: &LabelVocabulary,
) -> Result<(ConfusionMatrix, ClassificationReport), DatasetError> {
    if expected.len() != predicted.len() {
        return Err(DatasetError::Configuration(format!(
            "{} expected labels but {} predictions",
            expected.len(),
            predicted.len()
        )));
    }
    if expected.is_empty() {
        return Err(DatasetError::Configuration("nothing to evaluate".to_string()));
    }

    let encode = |label: SentimentLabel| {
        vocabulary
            .encode(label)
            .ok_or_else(|| DatasetError::Configuration(format!("label '{}' is not in the label set", label)))
    };

    let n = vocabulary.len();
    let mut counts = vec![vec![0usize; n]; n];
    for (e, p) in expected.iter().zip(predicted) {
        counts[encode(*e)?][encode(*p)?] += 1;
    }
    let matrix = ConfusionMatrix {
        labels: vocabulary.labels().to_vec(),
        counts,
    };

    let total = matrix.total();
    let per_class: Vec<ClassScores> = (0..n)
        .map(|class| {
            let tp = matrix.count(class, class);
            let precision = ratio(tp, matrix.predicted(class));
            let recall = ratio(tp, matrix.support(class));
            let f1 = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };
            ClassScores {
                label: vocabulary.labels()[class],
                precision,
                recall,
                f1,
                support: matrix.support(class),
            }
        })
        .collect();

    let weighted = |score: fn(&ClassScores) -> f64| {
        per_class.iter().map(|c| score(c) * c.support as f64).sum::<f64>() / total as f64
    };
    let report = ClassificationReport {
        accuracy: ratio((0..n).map(|c| matrix.count(c, c)).sum(), total),
        precision: weighted(|c| c.precision),
        recall: weighted(|c| c.recall),
        f1: weighted(|c| c.f1),
        support: total,
        per_class,
    };

    Ok((matrix, report))
}
