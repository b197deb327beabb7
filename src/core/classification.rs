//! Classifier response normalization.
//!
//! The upstream classifier has shipped several response shapes over time:
//! a bare array of predictions, an object keyed by material, a single
//! top-result object, the `{ top, all }` server shape and the workflow
//! envelope `{ outputs: [{ predictions: ... }] }`. All of them are reduced
//! here to a `Vec<MaterialPrediction>` sorted by descending confidence.
//! Nothing outside this module looks at raw classifier JSON.

use crate::domain::model::MaterialPrediction;
use crate::domain::ports::MaterialClassifier;
use crate::utils::error::{Result, XpError};
use serde_json::{Map, Value};
use std::sync::Arc;

pub const UNKNOWN_MATERIAL: &str = "Unknown";

/// Points for a fully confident detection.
pub const DEFAULT_POINTS_SCALE: f64 = 20.0;

const MATERIAL_FIELDS: &[&str] = &["class", "label", "name", "predicted_class", "material"];
const CONFIDENCE_FIELDS: &[&str] = &["confidence", "score", "probability", "value"];

/// `round(confidence * scale)` with confidence clamped to `[0, 1]`.
pub fn reward_points(confidence: f64, scale: f64) -> u32 {
    let confidence = clamp_confidence(confidence);
    (confidence * scale.max(0.0)).round() as u32
}

pub fn clamp_confidence(confidence: f64) -> f64 {
    if confidence.is_nan() {
        0.0
    } else {
        confidence.clamp(0.0, 1.0)
    }
}

pub struct ClassificationAdapter {
    classifier: Arc<dyn MaterialClassifier>,
}

impl ClassificationAdapter {
    pub fn new(classifier: Arc<dyn MaterialClassifier>) -> Self {
        Self { classifier }
    }

    /// Classifies one image. Transport and service failures propagate; an
    /// unrecognized body yields an empty list.
    pub async fn classify(&self, image: &[u8]) -> Result<Vec<MaterialPrediction>> {
        if image.is_empty() {
            return Err(XpError::ClassifierError {
                message: "image is empty".to_string(),
            });
        }

        tracing::debug!("🤖 Sending {} bytes to classifier", image.len());
        let raw = self.classifier.classify_raw(image).await?;
        let predictions = normalize_predictions(&raw);

        match predictions.first() {
            Some(top) => tracing::debug!(
                "🤖 {} prediction(s), top: {} ({:.2})",
                predictions.len(),
                top.material,
                top.confidence
            ),
            None => tracing::warn!("🤖 Classifier response contained no predictions"),
        }

        Ok(predictions)
    }
}

pub fn normalize_predictions(response: &Value) -> Vec<MaterialPrediction> {
    let mut predictions = Vec::new();
    collect(response, &mut predictions);
    // sort_by 是穩定排序，同分時保留上游順序
    predictions.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    predictions
}

fn collect(value: &Value, out: &mut Vec<MaterialPrediction>) {
    match value {
        Value::Array(items) => {
            for item in items {
                if let Value::Object(obj) = item {
                    if let Some(prediction) = prediction_from_object(obj, None) {
                        out.push(prediction);
                    }
                }
            }
        }
        Value::Object(obj) => collect_object(obj, out),
        _ => {}
    }
}

fn collect_object(obj: &Map<String, Value>, out: &mut Vec<MaterialPrediction>) {
    if obj.contains_key("error") && !has_any(obj, MATERIAL_FIELDS) {
        return;
    }

    // workflow envelope: outputs[0].predictions
    if let Some(first_output) = obj
        .get("outputs")
        .and_then(Value::as_array)
        .and_then(|o| o.first())
    {
        collect(first_output, out);
        return;
    }

    // { top, all }: `all` already holds every prediction
    if let Some(all) = obj.get("all") {
        collect(all, out);
        return;
    }

    if let Some(predictions) = obj.get("predictions") {
        match predictions {
            Value::Array(_) => collect(predictions, out),
            Value::Object(inner) if inner.contains_key("predictions") => collect(predictions, out),
            Value::Object(inner) => collect_keyed(inner, out, true),
            _ => {}
        }
        return;
    }

    if has_any(obj, MATERIAL_FIELDS) || has_any(obj, CONFIDENCE_FIELDS) {
        if let Some(prediction) = prediction_from_object(obj, None) {
            out.push(prediction);
        }
        return;
    }

    // { "plastic": { "confidence": 0.9 }, ... }
    collect_keyed(obj, out, false);
}

/// Object keyed by material. Entries without a confidence field are not
/// predictions (e.g. `image` or `time` metadata) and are skipped.
fn collect_keyed(obj: &Map<String, Value>, out: &mut Vec<MaterialPrediction>, allow_scalars: bool) {
    for (key, entry) in obj {
        match entry {
            Value::Object(inner) if confidence_of(inner).is_some() => {
                if let Some(prediction) = prediction_from_object(inner, Some(key.as_str())) {
                    out.push(prediction);
                }
            }
            Value::Number(_) | Value::String(_) if allow_scalars => {
                if let Some(confidence) = as_confidence(entry) {
                    out.push(MaterialPrediction::new(key.clone(), confidence));
                }
            }
            _ => {}
        }
    }
}

fn prediction_from_object(
    obj: &Map<String, Value>,
    key: Option<&str>,
) -> Option<MaterialPrediction> {
    let material = MATERIAL_FIELDS
        .iter()
        .filter_map(|field| obj.get(*field))
        .find_map(|v| v.as_str().map(str::trim).filter(|s| !s.is_empty()))
        .map(str::to_string);
    let confidence = confidence_of(obj);

    if material.is_none() && confidence.is_none() && key.is_none() {
        return None;
    }

    let material = material
        .or_else(|| key.map(str::to_string))
        .unwrap_or_else(|| UNKNOWN_MATERIAL.to_string());

    Some(MaterialPrediction::new(material, confidence.unwrap_or(0.0)))
}

fn confidence_of(obj: &Map<String, Value>) -> Option<f64> {
    CONFIDENCE_FIELDS
        .iter()
        .filter_map(|field| obj.get(*field))
        .find_map(as_confidence)
}

fn as_confidence(value: &Value) -> Option<f64> {
    let raw = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    Some(clamp_confidence(raw))
}

fn has_any(obj: &Map<String, Value>, fields: &[&str]) -> bool {
    fields.iter().any(|field| obj.contains_key(*field))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    fn materials(predictions: &[MaterialPrediction]) -> Vec<&str> {
        predictions.iter().map(|p| p.material.as_str()).collect()
    }

    #[test]
    fn test_bare_array_sorted_by_confidence() {
        let predictions = normalize_predictions(&json!([
            {"class": "paper", "confidence": 0.4},
            {"class": "plastic", "confidence": 0.91},
            {"class": "glass", "confidence": 0.55}
        ]));

        assert_eq!(materials(&predictions), vec!["plastic", "glass", "paper"]);
        assert_eq!(predictions[0].confidence, 0.91);
    }

    #[test]
    fn test_workflow_envelope_with_object_predictions() {
        let predictions = normalize_predictions(&json!({
            "outputs": [{
                "predictions": {
                    "metal": {"confidence": 0.2},
                    "cardboard": {"confidence": 0.75}
                }
            }]
        }));

        assert_eq!(materials(&predictions), vec!["cardboard", "metal"]);
    }

    #[test]
    fn test_workflow_envelope_with_nested_classification_result() {
        let predictions = normalize_predictions(&json!({
            "outputs": [{
                "predictions": {
                    "top": "battery",
                    "confidence": 0.88,
                    "predictions": [
                        {"class": "battery", "confidence": 0.88},
                        {"class": "metal", "confidence": 0.1}
                    ]
                }
            }]
        }));

        assert_eq!(materials(&predictions), vec!["battery", "metal"]);
    }

    #[test]
    fn test_top_and_all_shape() {
        let predictions = normalize_predictions(&json!({
            "top": {"material": "Glass", "confidence": 0.8},
            "all": [
                {"material": "Glass", "confidence": 0.8},
                {"material": "Plastic", "confidence": 0.15}
            ]
        }));

        assert_eq!(predictions.len(), 2);
        assert_eq!(predictions[0], MaterialPrediction::new("Glass", 0.8));
    }

    #[test]
    fn test_single_top_result_with_aliases() {
        let predictions = normalize_predictions(&json!({
            "predicted_class": "clothes",
            "probability": "0.73"
        }));

        assert_eq!(predictions, vec![MaterialPrediction::new("clothes", 0.73)]);
    }

    #[test]
    fn test_missing_fields_use_sentinels() {
        let predictions = normalize_predictions(&json!([
            {"score": 0.6},
            {"label": "trash"}
        ]));

        assert_eq!(
            predictions,
            vec![
                MaterialPrediction::new(UNKNOWN_MATERIAL, 0.6),
                MaterialPrediction::new("trash", 0.0)
            ]
        );
    }

    #[test]
    fn test_metadata_is_not_a_prediction() {
        let predictions = normalize_predictions(&json!({
            "time": 0.12,
            "image": {"width": 640, "height": 480},
            "inference_id": "f1e2"
        }));
        assert!(predictions.is_empty());

        let predictions = normalize_predictions(&json!({
            "outputs": [{"predictions": {"plastic": 0.64, "paper": "0.3"}}]
        }));
        assert_eq!(materials(&predictions), vec!["plastic", "paper"]);
    }

    #[test]
    fn test_confidence_is_clamped() {
        let predictions = normalize_predictions(&json!([
            {"class": "metal", "confidence": 1.7},
            {"class": "paper", "confidence": -0.2}
        ]));

        assert_eq!(predictions[0].confidence, 1.0);
        assert_eq!(predictions[1].confidence, 0.0);
    }

    #[test]
    fn test_error_and_garbage_shapes_yield_nothing() {
        assert!(normalize_predictions(&json!({"error": "No waste detected"})).is_empty());
        assert!(normalize_predictions(&json!([])).is_empty());
        assert!(normalize_predictions(&json!("plastic")).is_empty());
        assert!(normalize_predictions(&json!(null)).is_empty());
        assert!(normalize_predictions(&json!({"outputs": []})).is_empty());
        assert!(normalize_predictions(&json!([1, "two", null])).is_empty());
    }

    #[test]
    fn test_reward_points_mapping() {
        assert_eq!(reward_points(0.85, DEFAULT_POINTS_SCALE), 17);
        assert_eq!(reward_points(0.70, DEFAULT_POINTS_SCALE), 14);
        assert_eq!(reward_points(1.0, DEFAULT_POINTS_SCALE), 20);
        assert_eq!(reward_points(0.0, DEFAULT_POINTS_SCALE), 0);
        assert_eq!(reward_points(2.0, DEFAULT_POINTS_SCALE), 20);
        assert_eq!(reward_points(f64::NAN, DEFAULT_POINTS_SCALE), 0);
    }

    struct CannedClassifier(Value);

    #[async_trait]
    impl MaterialClassifier for CannedClassifier {
        async fn classify_raw(&self, _image: &[u8]) -> Result<Value> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn test_adapter_rejects_empty_image() {
        let adapter = ClassificationAdapter::new(Arc::new(CannedClassifier(json!([]))));
        let err = adapter.classify(&[]).await.unwrap_err();
        assert!(matches!(err, XpError::ClassifierError { .. }));
    }

    #[tokio::test]
    async fn test_adapter_normalizes_response() {
        let adapter = ClassificationAdapter::new(Arc::new(CannedClassifier(json!({
            "class": "plastic",
            "confidence": 0.93
        }))));
        let predictions = adapter.classify(b"jpeg-bytes").await.unwrap();
        assert_eq!(predictions, vec![MaterialPrediction::new("plastic", 0.93)]);
    }
}
