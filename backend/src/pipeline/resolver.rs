use shared::{AdvisoryRecord, DiseaseClass};
use strum::EnumCount;

use crate::error::DiagnosisError;
use crate::pipeline::model::ProbabilityVector;
use crate::registry::ClassRegistry;

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnosis {
    pub label: DiseaseClass,
    /// Top score as a percentage, `[0, 100]`.
    pub confidence: f64,
    pub advisory: AdvisoryRecord,
}

/// Picks the top-scoring class and attaches its advisory record.
pub fn resolve(
    probabilities: &ProbabilityVector,
    registry: &ClassRegistry,
) -> Result<Diagnosis, DiagnosisError> {
    if probabilities.len() != DiseaseClass::COUNT {
        return Err(DiagnosisError::ShapeMismatch {
            expected: vec![DiseaseClass::COUNT],
            actual: vec![probabilities.len()],
        });
    }

    let (index, score) = probabilities.argmax().ok_or_else(|| {
        DiagnosisError::InvalidOutput("no comparable score in probability vector".into())
    })?;
    let label = DiseaseClass::from_index(index)
        .ok_or_else(|| DiagnosisError::UnknownClass(format!("class index {}", index)))?;
    let advisory = registry
        .lookup(label.label())
        .ok_or_else(|| DiagnosisError::UnknownClass(label.to_string()))?;

    Ok(Diagnosis {
        label,
        confidence: f64::from(score) * 100.0,
        advisory: advisory.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ClassRegistry {
        ClassRegistry::embedded().unwrap()
    }

    #[test]
    fn picks_highest_score_and_scales_confidence() {
        let probs = ProbabilityVector::new(vec![0.9, 0.02, 0.02, 0.02, 0.02, 0.02]);
        let diagnosis = resolve(&probs, &registry()).unwrap();

        assert_eq!(diagnosis.label, DiseaseClass::Anthracnose);
        assert!((diagnosis.confidence - 90.0).abs() < 1e-4);
        assert_eq!(diagnosis.advisory.product.name, "Bonide Copper Fungicide");
    }

    #[test]
    fn every_position_maps_to_its_label() {
        let registry = registry();
        for (index, label) in DiseaseClass::labels().into_iter().enumerate() {
            let mut scores = vec![0.0; 6];
            scores[index] = 1.0;
            let diagnosis = resolve(&ProbabilityVector::new(scores), &registry).unwrap();
            assert_eq!(diagnosis.label.label(), label);
            assert_eq!(diagnosis.confidence, 100.0);
        }
    }

    #[test]
    fn ties_go_to_the_first_class() {
        let probs = ProbabilityVector::new(vec![0.1, 0.1, 0.3, 0.3, 0.1, 0.1]);
        let diagnosis = resolve(&probs, &registry()).unwrap();
        assert_eq!(diagnosis.label, DiseaseClass::CuttingWeevil);
    }

    #[test]
    fn confidence_is_max_only_even_when_sum_drifts() {
        let probs = ProbabilityVector::new(vec![0.2, 0.2, 0.2, 0.2, 0.2, 0.25]);
        let diagnosis = resolve(&probs, &registry()).unwrap();
        assert_eq!(diagnosis.label, DiseaseClass::Healthy);
        assert!((diagnosis.confidence - 25.0).abs() < 1e-4);
        assert!((0.0..=100.0).contains(&diagnosis.confidence));
    }

    #[test]
    fn wrong_length_is_a_shape_mismatch() {
        let probs = ProbabilityVector::new(vec![0.5, 0.5]);
        let err = resolve(&probs, &registry()).unwrap_err();
        match err {
            DiagnosisError::ShapeMismatch { expected, actual } => {
                assert_eq!(DiseaseClass::COUNT, 6);
                assert_eq!(expected, vec![DiseaseClass::COUNT]);
                assert_eq!(actual, vec![2]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn label_missing_from_registry_is_unknown_class() {
        let empty = ClassRegistry::from_yaml_str("{}").unwrap();
        let probs = ProbabilityVector::new(vec![0.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
        let err = resolve(&probs, &empty).unwrap_err();
        match err {
            DiagnosisError::UnknownClass(label) => assert_eq!(label, "Gall Midge"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
