use serde::{Deserialize, Serialize};

/// One ranked label from the classification service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    pub class_name: String,
    pub probability: f64,
}

impl Prediction {
    pub fn new(class_name: impl Into<String>, probability: f64) -> Self {
        Self {
            class_name: class_name.into(),
            probability,
        }
    }

    /// True when the probability is a finite value in `[0, 1]` and the
    /// label is not blank.
    pub fn is_valid(&self) -> bool {
        self.probability.is_finite()
            && (0.0..=1.0).contains(&self.probability)
            && !self.class_name.trim().is_empty()
    }

    /// Probability as a percentage with one decimal, e.g. `"87.0%"`.
    pub fn percent_label(&self) -> String {
        format!("{:.1}%", self.probability * 100.0)
    }
}

/// Sort descending by probability. Stable, so equal scores keep service order.
pub fn sort_predictions(predictions: &mut [Prediction]) {
    predictions.sort_by(|a, b| b.probability.total_cmp(&a.probability));
}
