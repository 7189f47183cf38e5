//! The in-progress incident report.

use std::fmt;
use uuid::Uuid;

use crate::models::{AnimalType, GeoPoint, ImageBlob, IncidentCategory, Prediction};

/// Label of the location button before a position has been captured.
pub const GET_LOCATION_LABEL: &str = "Get Location";
/// Label of the location button once a position exists.
pub const UPDATE_LOCATION_LABEL: &str = "Update";
/// Hint shown while no position has been captured.
pub const LOCATION_REQUIRED_HINT: &str = "Location required for warning system";
/// Number of predictions shown under the preview.
pub const PREDICTION_SUMMARY_LEN: usize = 2;

/// How `selected_animal_type` got its current value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionSource {
    /// Picked by the user
    Manual,
    /// Copied from the top prediction
    Auto,
}

/// A field required before a draft can be submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftField {
    Photo,
    Location,
    IncidentType,
}

impl DraftField {
    pub fn as_str(&self) -> &'static str {
        match self {
            DraftField::Photo => "photo",
            DraftField::Location => "location",
            DraftField::IncidentType => "incident type",
        }
    }
}

impl fmt::Display for DraftField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Data of one report, from flow entry to submission or reset.
///
/// Plain data: no I/O, no async. The capture controller owns exactly one of
/// these and hands out clones as snapshots.
#[derive(Debug, Clone)]
pub struct IncidentDraft {
    report_id: Uuid,
    image: Option<ImageBlob>,
    predictions: Vec<Prediction>,
    selected_animal_type: String,
    animal_type_source: Option<SelectionSource>,
    location: Option<GeoPoint>,
    incident_category: Option<IncidentCategory>,
}

impl Default for IncidentDraft {
    fn default() -> Self {
        Self::new()
    }
}

impl IncidentDraft {
    pub fn new() -> Self {
        Self {
            report_id: Uuid::new_v4(),
            image: None,
            predictions: Vec::new(),
            selected_animal_type: String::new(),
            animal_type_source: None,
            location: None,
            incident_category: None,
        }
    }

    /// Identifier sent with every submission attempt of this draft.
    pub fn report_id(&self) -> Uuid {
        self.report_id
    }

    pub fn image(&self) -> Option<&ImageBlob> {
        self.image.as_ref()
    }

    pub fn predictions(&self) -> &[Prediction] {
        &self.predictions
    }

    pub fn top_prediction(&self) -> Option<&Prediction> {
        self.predictions.first()
    }

    /// Top predictions as shown to the user, e.g. `"deer 87.0%"`.
    pub fn prediction_summary(&self) -> Vec<String> {
        self.predictions
            .iter()
            .take(PREDICTION_SUMMARY_LEN)
            .map(|p| format!("{} {}", p.class_name, p.percent_label()))
            .collect()
    }

    pub fn selected_animal_type(&self) -> &str {
        &self.selected_animal_type
    }

    pub fn animal_type_source(&self) -> Option<SelectionSource> {
        self.animal_type_source
    }

    /// The selection as a catalog entry, when it matches one.
    pub fn catalog_animal_type(&self) -> Option<AnimalType> {
        AnimalType::from_key(&self.selected_animal_type)
    }

    pub fn location(&self) -> Option<GeoPoint> {
        self.location
    }

    /// `"40.7100, -74.0000"`, or `None` before capture.
    pub fn location_display(&self) -> Option<String> {
        self.location.map(|p| p.to_string())
    }

    pub fn location_button_label(&self) -> &'static str {
        if self.location.is_some() {
            UPDATE_LOCATION_LABEL
        } else {
            GET_LOCATION_LABEL
        }
    }

    pub fn location_hint(&self) -> Option<&'static str> {
        self.location.is_none().then_some(LOCATION_REQUIRED_HINT)
    }

    pub fn incident_category(&self) -> Option<IncidentCategory> {
        self.incident_category
    }

    /// Attach a new image.
    ///
    /// Predictions belong to the previous image and are dropped, as is an
    /// animal type that was only auto-populated from them. A manual pick,
    /// the location and the category carry over.
    pub fn set_image(&mut self, image: ImageBlob) {
        self.image = Some(image);
        self.predictions.clear();
        if self.animal_type_source == Some(SelectionSource::Auto) {
            self.selected_animal_type.clear();
            self.animal_type_source = None;
        }
    }

    /// Store classification results. Returns `true` when the animal type
    /// was auto-populated from the top prediction.
    pub fn apply_predictions(&mut self, predictions: Vec<Prediction>) -> bool {
        self.predictions = predictions;
        if self.animal_type_source.is_some() {
            return false;
        }
        match self.predictions.first() {
            Some(top) => {
                self.selected_animal_type = top.class_name.clone();
                self.animal_type_source = Some(SelectionSource::Auto);
                true
            }
            None => false,
        }
    }

    /// User pick. Always wins over auto-population.
    pub fn select_animal_type(&mut self, animal_type: impl Into<String>) {
        self.selected_animal_type = animal_type.into();
        self.animal_type_source = Some(SelectionSource::Manual);
    }

    pub fn set_location(&mut self, location: GeoPoint) {
        self.location = Some(location);
    }

    pub fn set_incident_category(&mut self, category: IncidentCategory) {
        self.incident_category = Some(category);
    }

    /// Required fields still unset, in form order.
    pub fn missing_fields(&self) -> Vec<DraftField> {
        let mut missing = Vec::new();
        if self.image.is_none() {
            missing.push(DraftField::Photo);
        }
        if self.location.is_none() {
            missing.push(DraftField::Location);
        }
        if self.incident_category.is_none() {
            missing.push(DraftField::IncidentType);
        }
        missing
    }

    pub fn is_submittable(&self) -> bool {
        self.image.is_some() && self.location.is_some() && self.incident_category.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deer_predictions() -> Vec<Prediction> {
        vec![
            Prediction::new("deer", 0.87),
            Prediction::new("elk", 0.05),
            Prediction::new("moose", 0.01),
        ]
    }

    #[test]
    fn test_new_draft_is_empty() {
        let draft = IncidentDraft::new();
        assert!(draft.image().is_none());
        assert!(draft.predictions().is_empty());
        assert_eq!(draft.selected_animal_type(), "");
        assert_eq!(
            draft.missing_fields(),
            vec![DraftField::Photo, DraftField::Location, DraftField::IncidentType]
        );
        assert_ne!(draft.report_id(), IncidentDraft::new().report_id());
    }

    #[test]
    fn test_auto_population_from_top_prediction() {
        let mut draft = IncidentDraft::new();
        draft.set_image(ImageBlob::new(vec![1]));
        assert!(draft.apply_predictions(deer_predictions()));
        assert_eq!(draft.selected_animal_type(), "deer");
        assert_eq!(draft.animal_type_source(), Some(SelectionSource::Auto));
        assert_eq!(draft.prediction_summary(), vec!["deer 87.0%", "elk 5.0%"]);
    }

    #[test]
    fn test_manual_selection_wins() {
        let mut draft = IncidentDraft::new();
        draft.set_image(ImageBlob::new(vec![1]));
        draft.select_animal_type("bird");
        assert!(!draft.apply_predictions(vec![Prediction::new("deer", 0.9)]));
        assert_eq!(draft.selected_animal_type(), "bird");
        assert_eq!(draft.predictions().len(), 1);
    }

    #[test]
    fn test_auto_selection_not_overwritten_by_later_predictions() {
        let mut draft = IncidentDraft::new();
        draft.apply_predictions(deer_predictions());
        assert!(!draft.apply_predictions(vec![Prediction::new("fox", 0.7)]));
        assert_eq!(draft.selected_animal_type(), "deer");
    }

    #[test]
    fn test_empty_predictions_leave_selection_blank() {
        let mut draft = IncidentDraft::new();
        assert!(!draft.apply_predictions(Vec::new()));
        assert_eq!(draft.selected_animal_type(), "");
        assert_eq!(draft.animal_type_source(), None);
    }

    #[test]
    fn test_new_image_drops_auto_selection_but_keeps_manual() {
        let mut draft = IncidentDraft::new();
        draft.set_image(ImageBlob::new(vec![1]));
        draft.apply_predictions(deer_predictions());
        draft.set_image(ImageBlob::new(vec![2]));
        assert!(draft.predictions().is_empty());
        assert_eq!(draft.selected_animal_type(), "");

        draft.select_animal_type("reptile");
        draft.set_image(ImageBlob::new(vec![3]));
        assert_eq!(draft.selected_animal_type(), "reptile");
        assert_eq!(draft.catalog_animal_type(), Some(AnimalType::Reptile));
    }

    #[test]
    fn test_location_presentation() {
        let mut draft = IncidentDraft::new();
        assert_eq!(draft.location_button_label(), GET_LOCATION_LABEL);
        assert_eq!(draft.location_hint(), Some(LOCATION_REQUIRED_HINT));
        assert_eq!(draft.location_display(), None);

        draft.set_location(GeoPoint::new(40.71, -74.0).unwrap());
        assert_eq!(draft.location_button_label(), UPDATE_LOCATION_LABEL);
        assert_eq!(draft.location_hint(), None);
        assert_eq!(draft.location_display().as_deref(), Some("40.7100, -74.0000"));
    }

    #[test]
    fn test_submittable_requires_all_three_fields() {
        let mut draft = IncidentDraft::new();
        draft.set_image(ImageBlob::new(vec![1]));
        draft.set_location(GeoPoint::new(40.71, -74.0).unwrap());
        assert!(!draft.is_submittable());
        assert_eq!(draft.missing_fields(), vec![DraftField::IncidentType]);

        draft.set_incident_category(IncidentCategory::NearMiss);
        assert!(draft.is_submittable());
        assert!(draft.missing_fields().is_empty());
    }
}
