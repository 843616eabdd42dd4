//! Weight vector and parameter checks performed before a run starts.

use std::collections::BTreeSet;

use storage_siting_scoring_models::{
    EconomicParams, MobileParams, Normalization, StaticParams, WEIGHT_SUM_TOLERANCE,
};

use crate::{ConfigurationError, WeightKind};

/// Validates a weight vector against the number of entries it weights and
/// returns it rescaled to sum to exactly 1.0.
///
/// An empty vector is accepted only when there is nothing to weight.
///
/// # Errors
///
/// * [`ConfigurationError::WeightCount`] if `weights.len() != expected`
/// * [`ConfigurationError::WeightRange`] if a weight is outside `[0, 1]`
/// * [`ConfigurationError::WeightSum`] if the sum is not 1.0 within
///   [`WEIGHT_SUM_TOLERANCE`]
pub fn validate_weights(
    kind: WeightKind,
    weights: &[f64],
    expected: usize,
) -> Result<Vec<f64>, ConfigurationError> {
    if weights.len() != expected {
        return Err(ConfigurationError::WeightCount {
            kind,
            expected,
            actual: weights.len(),
        });
    }
    if weights.is_empty() {
        return Ok(Vec::new());
    }

    for (index, &value) in weights.iter().enumerate() {
        if !value.is_finite() || !(0.0..=1.0).contains(&value) {
            return Err(ConfigurationError::WeightRange { kind, index, value });
        }
    }

    let sum: f64 = weights.iter().sum();
    if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
        return Err(ConfigurationError::WeightSum { kind, sum });
    }

    Ok(weights.iter().map(|w| w / sum).collect())
}

/// Checks that a normalization rule can map raw values into `[0, 1]`.
///
/// # Errors
///
/// Returns [`ConfigurationError::InvalidParameter`] for a reference value
/// that is not a positive finite number.
pub fn validate_normalization(
    owner: &str,
    normalization: Normalization,
) -> Result<(), ConfigurationError> {
    match normalization {
        Normalization::Reference { value } if !value.is_finite() || value <= 0.0 => {
            Err(ConfigurationError::parameter(
                format!("{owner}.normalization.value"),
                format!("reference value must be positive, got {value}"),
            ))
        }
        _ => Ok(()),
    }
}

/// Rejects repeated names among layers or attributes.
///
/// # Errors
///
/// Returns [`ConfigurationError::DuplicateName`] for the first repeat.
pub fn ensure_unique<'a>(
    kind: &'static str,
    names: impl IntoIterator<Item = &'a str>,
) -> Result<(), ConfigurationError> {
    let mut seen = BTreeSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(ConfigurationError::DuplicateName {
                kind,
                name: name.to_string(),
            });
        }
    }
    Ok(())
}

/// Checks static-model parameters.
///
/// # Errors
///
/// Returns [`ConfigurationError::InvalidParameter`] for a non-positive
/// buffer, too few buffer segments, or invalid economic inputs.
pub fn validate_static(params: &StaticParams) -> Result<(), ConfigurationError> {
    if !params.buffer_m.is_finite() || params.buffer_m <= 0.0 {
        return Err(ConfigurationError::parameter(
            "static.buffer_m",
            format!("must be a positive distance in meters, got {}", params.buffer_m),
        ));
    }
    if params.buffer_segments < 3 {
        return Err(ConfigurationError::parameter(
            "static.buffer_segments",
            format!("must be at least 3, got {}", params.buffer_segments),
        ));
    }
    if let Some(economic) = &params.economic {
        validate_economic(economic)?;
    }
    Ok(())
}

fn validate_economic(params: &EconomicParams) -> Result<(), ConfigurationError> {
    if params.exposure_attribute.trim().is_empty() {
        return Err(ConfigurationError::parameter(
            "static.economic.exposure_attribute",
            "must name a census attribute",
        ));
    }
    if !params.cost_per_unit.is_finite() || params.cost_per_unit < 0.0 {
        return Err(ConfigurationError::parameter(
            "static.economic.cost_per_unit",
            format!("must be a non-negative number, got {}", params.cost_per_unit),
        ));
    }
    if !params.outage_hours.is_finite() || params.outage_hours < 0.0 {
        return Err(ConfigurationError::parameter(
            "static.economic.outage_hours",
            format!("must be a non-negative number, got {}", params.outage_hours),
        ));
    }
    Ok(())
}

/// Checks mobile-model parameters.
///
/// # Errors
///
/// Returns [`ConfigurationError::InvalidParameter`] for a non-positive
/// decay scale or fallback speed.
pub fn validate_mobile(params: &MobileParams) -> Result<(), ConfigurationError> {
    if !params.decay_scale.is_finite() || params.decay_scale <= 0.0 {
        return Err(ConfigurationError::parameter(
            "mobile.decay_scale",
            format!("must be positive, got {}", params.decay_scale),
        ));
    }
    if !params.fallback_speed_mps.is_finite() || params.fallback_speed_mps <= 0.0 {
        return Err(ConfigurationError::parameter(
            "mobile.fallback_speed_mps",
            format!("must be positive, got {}", params.fallback_speed_mps),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use storage_siting_scoring_models::DistanceMode;

    use super::*;

    #[test]
    fn accepts_weights_within_tolerance() {
        let weights = validate_weights(WeightKind::Infrastructure, &[0.5, 0.3, 0.2], 3).unwrap();
        assert_eq!(weights.len(), 3);

        let weights = validate_weights(WeightKind::Census, &[0.5, 0.5005], 2).unwrap();
        let sum: f64 = weights.iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
    }

    #[test]
    fn rejects_weights_outside_tolerance() {
        let err = validate_weights(WeightKind::Infrastructure, &[0.5, 0.3], 2).unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::WeightSum { sum, .. } if (sum - 0.8).abs() < 1e-9
        ));

        assert!(validate_weights(WeightKind::Census, &[0.6, 0.402], 2).is_err());
    }

    #[test]
    fn rejects_mismatched_counts() {
        let err = validate_weights(WeightKind::Census, &[1.0], 2).unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::WeightCount {
                kind: WeightKind::Census,
                expected: 2,
                actual: 1,
            }
        );
    }

    #[test]
    fn empty_vector_only_without_layers() {
        assert!(validate_weights(WeightKind::Infrastructure, &[], 0).unwrap().is_empty());
        assert!(validate_weights(WeightKind::Infrastructure, &[], 1).is_err());
    }

    #[test]
    fn rejects_out_of_range_weights() {
        let err = validate_weights(WeightKind::Infrastructure, &[1.5, -0.5], 2).unwrap_err();
        assert!(matches!(err, ConfigurationError::WeightRange { index: 0, .. }));

        let err = validate_weights(WeightKind::Infrastructure, &[f64::NAN, 1.0], 2).unwrap_err();
        assert!(matches!(err, ConfigurationError::WeightRange { .. }));
    }

    #[test]
    fn rejects_non_positive_reference() {
        assert!(
            validate_normalization("hospitals", Normalization::Reference { value: 0.0 }).is_err()
        );
        assert!(validate_normalization("hospitals", Normalization::MinMax).is_ok());
        assert!(validate_normalization("hospitals", Normalization::default()).is_ok());
    }

    #[test]
    fn detects_duplicate_names() {
        assert!(ensure_unique("zone", ["flood", "industrial"]).is_ok());
        let err = ensure_unique("zone", ["flood", "flood"]).unwrap_err();
        assert!(matches!(err, ConfigurationError::DuplicateName { name, .. } if name == "flood"));
    }

    #[test]
    fn static_params_need_positive_buffer() {
        let mut params = StaticParams {
            buffer_m: 0.0,
            distance_mode: DistanceMode::StraightLine,
            buffer_segments: 36,
            economic: None,
        };
        assert!(validate_static(&params).is_err());

        params.buffer_m = 500.0;
        assert!(validate_static(&params).is_ok());

        params.economic = Some(EconomicParams {
            exposure_attribute: "population".to_string(),
            cost_per_unit: f64::INFINITY,
            outage_hours: 4.0,
        });
        assert!(validate_static(&params).is_err());
    }

    #[test]
    fn mobile_params_need_positive_scales() {
        assert!(validate_mobile(&MobileParams::default()).is_ok());
        let params = MobileParams {
            fallback_speed_mps: 0.0,
            ..MobileParams::default()
        };
        assert!(validate_mobile(&params).is_err());
    }
}
