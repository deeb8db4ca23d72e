// src/dataset/labels.rs
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::utils::error::DatasetError;

/// Class of a labelled text. `Ambiguous` only occurs in the PolEmo (KLEJ) corpora.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Negative,
    Neutral,
    Positive,
    #[serde(rename = "amb")]
    Ambiguous,
}

impl SentimentLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Negative => "negative",
            SentimentLabel::Neutral => "neutral",
            SentimentLabel::Positive => "positive",
            SentimentLabel::Ambiguous => "amb",
        }
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SentimentLabel {
    type Err = DatasetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "negative" => Ok(SentimentLabel::Negative),
            "neutral" => Ok(SentimentLabel::Neutral),
            "positive" => Ok(SentimentLabel::Positive),
            "amb" => Ok(SentimentLabel::Ambiguous),
            other => Err(DatasetError::Configuration(format!("unknown label '{}'", other))),
        }
    }
}

/// The label set used for the financial corpus.
pub const FINANCIAL_LABELS: [SentimentLabel; 3] = [
    SentimentLabel::Positive,
    SentimentLabel::Negative,
    SentimentLabel::Neutral,
];

/// One `{text, label}` record of a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledText {
    pub text: String,
    pub label: SentimentLabel,
}

impl LabeledText {
    pub fn new(text: impl Into<String>, label: SentimentLabel) -> Self {
        Self {
            text: text.into(),
            label,
        }
    }
}

/// Validated pair of sentiment thresholds, `negative < positive`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    positive: f64,
    negative: f64,
}

impl Thresholds {
    pub fn new(positive: f64, negative: f64) -> Result<Self, DatasetError> {
        // `!(a < b)` also rejects NaN.
        if !(negative < positive) {
            return Err(DatasetError::Configuration(format!(
                "negative threshold ({}) must be lower than positive threshold ({})",
                negative, positive
            )));
        }
        Ok(Self { positive, negative })
    }

    pub fn positive(&self) -> f64 {
        self.positive
    }

    pub fn negative(&self) -> f64 {
        self.negative
    }
}

/// Thresholds a price-movement score into a sentiment label.
///
/// `score <= negative` is negative, `score >= positive` is positive, neutral in between.
pub fn label(score: f64, positive_threshold: f64, negative_threshold: f64) -> Result<SentimentLabel, DatasetError> {
    let thresholds = Thresholds::new(positive_threshold, negative_threshold)?;
    Ok(if score <= thresholds.negative() {
        SentimentLabel::Negative
    } else if score < thresholds.positive() {
        SentimentLabel::Neutral
    } else {
        SentimentLabel::Positive
    })
}

/// Fixed label ordering used for integer encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelVocabulary {
    labels: Vec<SentimentLabel>,
}

impl LabelVocabulary {
    pub fn new(labels: &[SentimentLabel]) -> Result<Self, DatasetError> {
        if labels.is_empty() {
            return Err(DatasetError::Configuration("label set is empty".to_string()));
        }
        for (i, label) in labels.iter().enumerate() {
            if labels[..i].contains(label) {
                return Err(DatasetError::Configuration(format!("label '{}' listed twice", label)));
            }
        }
        Ok(Self {
            labels: labels.to_vec(),
        })
    }

    pub fn labels(&self) -> &[SentimentLabel] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn contains(&self, label: SentimentLabel) -> bool {
        self.labels.contains(&label)
    }

    pub fn encode(&self, label: SentimentLabel) -> Option<usize> {
        self.labels.iter().position(|l| *l == label)
    }

    pub fn decode(&self, id: usize) -> Option<SentimentLabel> {
        self.labels.get(id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_partition_the_real_line() {
        let (pos, neg) = (0.05, -0.05);
        for score in [-1e9, -0.05000001, -0.05, -0.049, 0.0, 0.049, 0.05, 0.051, 1e9] {
            let got = label(score, pos, neg).unwrap();
            let expected = if score <= neg {
                SentimentLabel::Negative
            } else if score >= pos {
                SentimentLabel::Positive
            } else {
                SentimentLabel::Neutral
            };
            assert_eq!(got, expected, "score {}", score);
        }
    }

    #[test]
    fn thresholds_are_inclusive_on_their_own_side() {
        assert_eq!(label(-0.2, 0.2, -0.2).unwrap(), SentimentLabel::Negative);
        assert_eq!(label(0.2, 0.2, -0.2).unwrap(), SentimentLabel::Positive);
    }

    #[test]
    fn inverted_or_equal_thresholds_are_configuration_errors() {
        assert!(matches!(label(0.0, -0.1, 0.1), Err(DatasetError::Configuration(_))));
        assert!(matches!(label(0.0, 0.1, 0.1), Err(DatasetError::Configuration(_))));
        assert!(matches!(Thresholds::new(f64::NAN, 0.0), Err(DatasetError::Configuration(_))));
    }

    #[test]
    fn labels_serialize_to_short_names() {
        let json = serde_json::to_string(&LabeledText::new("x", SentimentLabel::Ambiguous)).unwrap();
        assert_eq!(json, r#"{"text":"x","label":"amb"}"#);
        assert_eq!("neutral".parse::<SentimentLabel>().unwrap(), SentimentLabel::Neutral);
        assert!("bullish".parse::<SentimentLabel>().is_err());
    }

    #[test]
    fn vocabulary_encodes_in_configured_order() {
        let vocabulary = LabelVocabulary::new(&FINANCIAL_LABELS).unwrap();
        assert_eq!(vocabulary.encode(SentimentLabel::Positive), Some(0));
        assert_eq!(vocabulary.encode(SentimentLabel::Neutral), Some(2));
        assert_eq!(vocabulary.encode(SentimentLabel::Ambiguous), None);
        assert_eq!(vocabulary.decode(1), Some(SentimentLabel::Negative));
        assert_eq!(vocabulary.decode(3), None);
    }

    #[test]
    fn vocabulary_rejects_empty_and_duplicate_sets() {
        assert!(LabelVocabulary::new(&[]).is_err());
        assert!(LabelVocabulary::new(&[SentimentLabel::Neutral, SentimentLabel::Neutral]).is_err());
    }
}
