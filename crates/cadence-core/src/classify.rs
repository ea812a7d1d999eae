//! Coarse skill classification backed by an externally trained model.
//!
//! The adapter never fails an evaluation: a missing model, a malformed row,
//! an error or a panic inside the model all yield [`SkillLabel::Unclassified`].

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::difference::DifferenceVector;
use crate::error::ModelError;

/// Skill bucket assigned to a performance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SkillLabel {
    Beginner,
    Intermediate,
    Advanced,
    Unclassified,
}

impl SkillLabel {
    /// Map a predicted class index to a label.
    pub fn from_class(class: i64) -> Self {
        match class {
            0 => SkillLabel::Beginner,
            1 => SkillLabel::Intermediate,
            2 => SkillLabel::Advanced,
            _ => SkillLabel::Unclassified,
        }
    }
}

impl fmt::Display for SkillLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkillLabel::Beginner => write!(f, "Beginner"),
            SkillLabel::Intermediate => write!(f, "Intermediate"),
            SkillLabel::Advanced => write!(f, "Advanced"),
            SkillLabel::Unclassified => write!(f, "Unclassified"),
        }
    }
}

/// A pre-trained classifier over a flat feature row.
///
/// Implementations are shared read-only across concurrent evaluations.
pub trait SkillModel: Send + Sync {
    /// Expected row length, if the model knows it.
    fn n_features(&self) -> Option<usize> {
        None
    }

    fn predict(&self, row: &[f64]) -> Result<i64, ModelError>;
}

/// Number of features in a classifier row: seven metrics plus clarity.
pub const FEATURE_COUNT: usize = 8;

/// Build the classifier row: absolute differences in
/// [`crate::model::Metric::ALL`] order, then the clarity deviation.
pub fn feature_row(diff: &DifferenceVector, clarity_deviation: f64) -> Vec<f64> {
    let mut row = diff.abs_row();
    row.push(clarity_deviation);
    row
}

// ---------------------------------------------------------------------------
// Decision tree artifact
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        class: i64,
    },
}

/// A binary decision tree exported as JSON by the training pipeline.
///
/// Splits send `row[feature] <= threshold` to `left`, everything else to
/// `right`. Node 0 is the root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTreeModel {
    n_features: usize,
    nodes: Vec<TreeNode>,
}

impl DecisionTreeModel {
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ModelError::Unavailable(format!("{}: {e}", path.display())))?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self, ModelError> {
        let model: DecisionTreeModel = serde_json::from_str(json)
            .map_err(|e| ModelError::Unavailable(format!("invalid model artifact: {e}")))?;
        model.check()?;
        Ok(model)
    }

    fn check(&self) -> Result<(), ModelError> {
        if self.nodes.is_empty() {
            return Err(ModelError::Unavailable("model has no nodes".into()));
        }
        for (i, node) in self.nodes.iter().enumerate() {
            if let TreeNode::Split {
                feature,
                left,
                right,
                ..
            } = node
            {
                if *feature >= self.n_features {
                    return Err(ModelError::Unavailable(format!(
                        "node {i} splits on feature {feature} of {}",
                        self.n_features
                    )));
                }
                if *left >= self.nodes.len() || *right >= self.nodes.len() {
                    return Err(ModelError::Unavailable(format!(
                        "node {i} points outside the tree"
                    )));
                }
            }
        }
        Ok(())
    }
}

impl SkillModel for DecisionTreeModel {
    fn n_features(&self) -> Option<usize> {
        Some(self.n_features)
    }

    fn predict(&self, row: &[f64]) -> Result<i64, ModelError> {
        if row.len() != self.n_features {
            return Err(ModelError::ShapeMismatch {
                expected: self.n_features,
                actual: row.len(),
            });
        }
        let mut index = 0;
        // a well-formed tree reaches a leaf in fewer steps than it has nodes
        for _ in 0..self.nodes.len() {
            match &self.nodes[index] {
                TreeNode::Leaf { class } => return Ok(*class),
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
        Err(ModelError::Prediction("tree contains a cycle".into()))
    }
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

/// Wraps a [`SkillModel`] so classification can never fail a request.
pub struct ClassificationAdapter {
    source: Option<PathBuf>,
    model: RwLock<Option<Arc<dyn SkillModel>>>,
}

impl ClassificationAdapter {
    /// Adapter around an already constructed model.
    pub fn from_model(model: Arc<dyn SkillModel>) -> Self {
        Self {
            source: None,
            model: RwLock::new(Some(model)),
        }
    }

    /// Adapter that always answers [`SkillLabel::Unclassified`].
    pub fn unavailable() -> Self {
        Self {
            source: None,
            model: RwLock::new(None),
        }
    }

    /// Load a decision tree artifact. A load failure is logged and leaves the
    /// adapter degraded until [`ClassificationAdapter::reload`] succeeds.
    pub fn load(path: &Path) -> Self {
        let model = match DecisionTreeModel::load(path) {
            Ok(tree) => {
                tracing::info!("loaded skill model from {}", path.display());
                Some(Arc::new(tree) as Arc<dyn SkillModel>)
            }
            Err(e) => {
                tracing::warn!("skill model unavailable, labels will be Unclassified: {e}");
                None
            }
        };
        Self {
            source: Some(path.to_path_buf()),
            model: RwLock::new(model),
        }
    }

    /// Re-read the artifact this adapter was loaded from.
    pub fn reload(&self) -> Result<(), ModelError> {
        let Some(path) = &self.source else {
            return Err(ModelError::Unavailable("adapter has no model path".into()));
        };
        let tree = DecisionTreeModel::load(path)?;
        let mut guard = self.model.write().unwrap_or_else(|e| e.into_inner());
        *guard = Some(Arc::new(tree));
        tracing::info!("reloaded skill model from {}", path.display());
        Ok(())
    }

    pub fn is_available(&self) -> bool {
        self.current().is_some()
    }

    fn current(&self) -> Option<Arc<dyn SkillModel>> {
        self.model
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(Arc::clone)
    }

    pub fn classify(&self, diff: &DifferenceVector, clarity_deviation: f64) -> SkillLabel {
        let Some(model) = self.current() else {
            return SkillLabel::Unclassified;
        };
        let row = feature_row(diff, clarity_deviation);
        if let Some(expected) = model.n_features() {
            if expected != row.len() {
                tracing::warn!(
                    "skill model expects {expected} features, row has {}",
                    row.len()
                );
                return SkillLabel::Unclassified;
            }
        }
        match catch_unwind(AssertUnwindSafe(|| model.predict(&row))) {
            Ok(Ok(class)) => SkillLabel::from_class(class),
            Ok(Err(e)) => {
                tracing::warn!("skill prediction failed: {e}");
                SkillLabel::Unclassified
            }
            Err(_) => {
                tracing::error!("skill model panicked during prediction");
                SkillLabel::Unclassified
            }
        }
    }
}

impl fmt::Debug for ClassificationAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassificationAdapter")
            .field("source", &self.source)
            .field("available", &self.is_available())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Metric;

    /// Splits on |speech_rate| then on clarity deviation.
    const TREE: &str = r#"{
        "n_features": 8,
        "nodes": [
            {"feature": 2, "threshold": 0.2, "left": 1, "right": 4},
            {"feature": 7, "threshold": 0.1, "left": 2, "right": 3},
            {"class": 2},
            {"class": 1},
            {"class": 0}
        ]
    }"#;

    struct PanickingModel;

    impl SkillModel for PanickingModel {
        fn predict(&self, _row: &[f64]) -> Result<i64, ModelError> {
            panic!("model exploded");
        }
    }

    struct FailingModel;

    impl SkillModel for FailingModel {
        fn predict(&self, _row: &[f64]) -> Result<i64, ModelError> {
            Err(ModelError::Prediction("internal".into()))
        }
    }

    struct ConstantModel(i64);

    impl SkillModel for ConstantModel {
        fn predict(&self, _row: &[f64]) -> Result<i64, ModelError> {
            Ok(self.0)
        }
    }

    fn diff_with_speech_rate(value: f64) -> DifferenceVector {
        let mut diff = DifferenceVector::new();
        diff.insert(Metric::SpeechRate, value);
        diff
    }

    #[test]
    fn row_layout_is_abs_metrics_then_clarity() {
        let row = feature_row(&diff_with_speech_rate(-0.5), 0.25);
        assert_eq!(row.len(), FEATURE_COUNT);
        assert_eq!(row[2], 0.5);
        assert_eq!(row[7], 0.25);
    }

    #[test]
    fn tree_predicts_all_labels() {
        let tree = DecisionTreeModel::from_json(TREE).unwrap();
        let adapter = ClassificationAdapter::from_model(Arc::new(tree));
        assert_eq!(
            adapter.classify(&diff_with_speech_rate(0.0), 0.0),
            SkillLabel::Advanced
        );
        assert_eq!(
            adapter.classify(&diff_with_speech_rate(-0.1), 0.3),
            SkillLabel::Intermediate
        );
        assert_eq!(
            adapter.classify(&diff_with_speech_rate(-0.8), 0.0),
            SkillLabel::Beginner
        );
    }

    #[test]
    fn panicking_model_yields_unclassified() {
        let adapter = ClassificationAdapter::from_model(Arc::new(PanickingModel));
        assert_eq!(
            adapter.classify(&DifferenceVector::new(), 0.0),
            SkillLabel::Unclassified
        );
    }

    #[test]
    fn failing_model_yields_unclassified() {
        let adapter = ClassificationAdapter::from_model(Arc::new(FailingModel));
        assert_eq!(
            adapter.classify(&DifferenceVector::new(), 0.0),
            SkillLabel::Unclassified
        );
    }

    #[test]
    fn unknown_class_index_is_unclassified() {
        let adapter = ClassificationAdapter::from_model(Arc::new(ConstantModel(7)));
        assert_eq!(
            adapter.classify(&DifferenceVector::new(), 0.0),
            SkillLabel::Unclassified
        );
    }

    #[test]
    fn shape_mismatch_yields_unclassified() {
        let json = r#"{"n_features": 3, "nodes": [{"class": 2}]}"#;
        let tree = DecisionTreeModel::from_json(json).unwrap();
        assert!(matches!(
            tree.predict(&[0.0; 8]),
            Err(ModelError::ShapeMismatch {
                expected: 3,
                actual: 8
            })
        ));
        let adapter = ClassificationAdapter::from_model(Arc::new(tree));
        assert_eq!(
            adapter.classify(&DifferenceVector::new(), 0.0),
            SkillLabel::Unclassified
        );
    }

    #[test]
    fn missing_artifact_degrades_until_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tree.json");

        let adapter = ClassificationAdapter::load(&path);
        assert!(!adapter.is_available());
        assert_eq!(
            adapter.classify(&DifferenceVector::new(), 0.0),
            SkillLabel::Unclassified
        );
        assert!(adapter.reload().is_err());

        std::fs::write(&path, TREE).unwrap();
        adapter.reload().unwrap();
        assert!(adapter.is_available());
        assert_eq!(
            adapter.classify(&DifferenceVector::new(), 0.0),
            SkillLabel::Advanced
        );
    }

    #[test]
    fn malformed_artifacts_are_rejected() {
        assert!(DecisionTreeModel::from_json("not json").is_err());
        assert!(DecisionTreeModel::from_json(r#"{"n_features": 8, "nodes": []}"#).is_err());
        let out_of_range = r#"{"n_features": 8, "nodes": [
            {"feature": 9, "threshold": 0.5, "left": 1, "right": 1}, {"class": 0}]}"#;
        assert!(DecisionTreeModel::from_json(out_of_range).is_err());
        let dangling = r#"{"n_features": 8, "nodes": [
            {"feature": 0, "threshold": 0.5, "left": 1, "right": 5}, {"class": 0}]}"#;
        assert!(DecisionTreeModel::from_json(dangling).is_err());
    }

    #[test]
    fn cyclic_tree_fails_prediction() {
        let json = r#"{"n_features": 8, "nodes": [
            {"feature": 0, "threshold": 0.5, "left": 0, "right": 0}]}"#;
        let tree = DecisionTreeModel::from_json(json).unwrap();
        assert!(matches!(
            tree.predict(&[0.0; 8]),
            Err(ModelError::Prediction(_))
        ));
    }

    #[test]
    fn unavailable_adapter() {
        let adapter = ClassificationAdapter::unavailable();
        assert!(!adapter.is_available());
        assert!(adapter.reload().is_err());
    }
}
