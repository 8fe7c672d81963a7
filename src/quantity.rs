//! Derived reception quantities
use super::document::AcceptationStatus;
use super::error::ValidationError;

/// Reception inputs as entered by the caller, weights in the human unit.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReceptionInput {
    pub weight: Option<f64>,
    pub acceptation_status: Option<AcceptationStatus>,
    pub refused_weight: Option<f64>,
}

/// Stored reception triple, weights in the stored unit.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReceptionQuantities {
    pub received_weight: Option<f64>,
    pub refused_weight: Option<f64>,
    pub accepted_weight: Option<f64>,
}

// stored weights carry at most three decimals
fn to_stored(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

fn scaled(field: &'static str, value: f64, scale: f64) -> Result<f64, ValidationError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ValidationError::InvalidWeight { field, value });
    }
    Ok(to_stored(value * scale))
}

/// Compute the stored received/refused/accepted triple.
///
/// When `input.weight` is absent the already-stored weight is kept. A missing
/// refused weight yields a missing accepted weight, not zero.
pub fn derive_reception(
    input: &ReceptionInput,
    prior_stored_weight: Option<f64>,
    scale: f64,
) -> Result<ReceptionQuantities, ValidationError> {
    let received_weight = match input.weight {
        Some(weight) => Some(scaled("received weight", weight, scale)?),
        None => prior_stored_weight,
    };
    let refused_weight = input
        .refused_weight
        .map(|refused| scaled("refused weight", refused, scale))
        .transpose()?;

    let accepted_weight = match (received_weight, refused_weight) {
        (Some(received), Some(refused)) => {
            let accepted = to_stored(received - refused);
            if accepted < 0.0 {
                return Err(ValidationError::NegativeAcceptedWeight { received, refused });
            }
            Some(accepted)
        }
        _ => None,
    };

    check_acceptation(input.acceptation_status, received_weight, refused_weight)?;

    Ok(ReceptionQuantities {
        received_weight,
        refused_weight,
        accepted_weight,
    })
}

/// Status and stored weights must agree: nothing refused when accepted,
/// everything refused when refused. Skipped until a refused weight is known.
pub fn check_acceptation(
    status: Option<AcceptationStatus>,
    received_weight: Option<f64>,
    refused_weight: Option<f64>,
) -> Result<(), ValidationError> {
    let (Some(status), Some(refused)) = (status, refused_weight) else {
        return Ok(());
    };
    let consistent = match status {
        AcceptationStatus::Accepted => refused == 0.0,
        AcceptationStatus::Refused => Some(refused) == received_weight,
        AcceptationStatus::PartiallyRefused => true,
    };
    if !consistent {
        return Err(ValidationError::AcceptationMismatch { status, refused });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tonnes_are_stored_as_kilograms() {
        let input = ReceptionInput {
            weight: Some(4.0),
            refused_weight: Some(1.5),
            acceptation_status: Some(AcceptationStatus::PartiallyRefused),
        };

        let derived = derive_reception(&input, None, 1000.0).unwrap();
        assert_eq!(derived.received_weight, Some(4000.0));
        assert_eq!(derived.refused_weight, Some(1500.0));
        assert_eq!(derived.accepted_weight, Some(2500.0));
    }

    #[test]
    fn missing_refusal_leaves_accepted_unknown() {
        let input = ReceptionInput {
            weight: Some(2.0),
            ..Default::default()
        };

        let derived = derive_reception(&input, Some(9000.0), 1000.0).unwrap();
        assert_eq!(derived.received_weight, Some(2000.0));
        assert_eq!(derived.refused_weight, None);
        assert_eq!(derived.accepted_weight, None);
    }

    #[test]
    fn prior_weight_is_kept_when_only_refusal_is_given() {
        let input = ReceptionInput {
            refused_weight: Some(0.5),
            ..Default::default()
        };

        let derived = derive_reception(&input, Some(3000.0), 1000.0).unwrap();
        assert_eq!(derived.received_weight, Some(3000.0));
        assert_eq!(derived.accepted_weight, Some(2500.0));
    }

    #[test]
    fn refusing_more_than_received_is_rejected() {
        let input = ReceptionInput {
            weight: Some(1.0),
            refused_weight: Some(2.0),
            ..Default::default()
        };

        assert_eq!(
            derive_reception(&input, None, 1000.0),
            Err(ValidationError::NegativeAcceptedWeight {
                received: 1000.0,
                refused: 2000.0
            })
        );
    }

    #[test]
    fn negative_or_non_finite_inputs_are_rejected() {
        for bad in [-1.0, f64::NAN, f64::INFINITY] {
            let input = ReceptionInput {
                weight: Some(bad),
                ..Default::default()
            };
            assert!(matches!(
                derive_reception(&input, None, 1000.0),
                Err(ValidationError::InvalidWeight { .. })
            ));
        }
    }

    #[test]
    fn acceptation_status_must_match_refusal() {
        let accepted_with_refusal = ReceptionInput {
            weight: Some(1.0),
            refused_weight: Some(0.2),
            acceptation_status: Some(AcceptationStatus::Accepted),
        };
        assert!(derive_reception(&accepted_with_refusal, None, 1000.0).is_err());

        let refused_partially = ReceptionInput {
            weight: Some(1.0),
            refused_weight: Some(0.2),
            acceptation_status: Some(AcceptationStatus::Refused),
        };
        assert!(derive_reception(&refused_partially, None, 1000.0).is_err());

        let refused_fully = ReceptionInput {
            weight: Some(1.0),
            refused_weight: Some(1.0),
            acceptation_status: Some(AcceptationStatus::Refused),
        };
        let derived = derive_reception(&refused_fully, None, 1000.0).unwrap();
        assert_eq!(derived.accepted_weight, Some(0.0));
    }

    #[test]
    fn derivation_is_idempotent() {
        let input = ReceptionInput {
            weight: Some(4.123),
            refused_weight: Some(0.456),
            ..Default::default()
        };

        let first = derive_reception(&input, None, 1000.0).unwrap();
        let second = derive_reception(&input, first.received_weight, 1000.0).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn stored_weights_are_checked_against_status() {
        assert!(check_acceptation(Some(AcceptationStatus::Accepted), Some(4000.0), Some(0.0)).is_ok());
        assert!(check_acceptation(Some(AcceptationStatus::Refused), Some(4000.0), Some(4000.0)).is_ok());
        assert!(check_acceptation(Some(AcceptationStatus::Accepted), Some(4000.0), None).is_ok());
        assert!(matches!(
            check_acceptation(Some(AcceptationStatus::Accepted), Some(4000.0), Some(1500.0)),
            Err(ValidationError::AcceptationMismatch { refused, .. }) if refused == 1500.0
        ));
    }
}
