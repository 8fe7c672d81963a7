use super::document::{AcceptationStatus, Status};
use super::registry::Ineligibility;
use super::sealing::FieldViolation;

/// Everything `update_document` can refuse an update with. Every variant is
/// raised before anything is written.
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("Document {0} not found")]
    DocumentNotFound(String),
    #[error("Unknown transporter ids: {}", .0.join(", "))]
    TransporterNotFound(Vec<String>),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{}", sealed_message(.0))]
    SealedFieldConflict(Vec<FieldViolation>),
    #[error("Company {siret} cannot be referenced on a document: {reason}")]
    CompanyIneligible { siret: String, reason: Ineligibility },
    #[error("Document {id} is {status} and can no longer be modified")]
    LockedDocument { id: String, status: Status },
    #[error(transparent)]
    Storage(StoreError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl EngineError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            EngineError::DocumentNotFound(_) | EngineError::TransporterNotFound(_)
        )
    }
}

impl From<StoreError> for EngineError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::DocumentNotFound(id) => EngineError::DocumentNotFound(id),
            other => EngineError::Storage(other),
        }
    }
}

fn sealed_message(violations: &[FieldViolation]) -> String {
    let labels: Vec<&str> = violations.iter().map(|v| v.label.as_str()).collect();
    format!(
        "The following fields have been locked by signature and can no longer be modified: {}",
        labels.join(", ")
    )
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("A document accepts at most {max} transporters, {submitted} were submitted")]
    TooManyTransporters { submitted: usize, max: usize },
    #[error("Transporter ids submitted more than once: {}", .0.join(", "))]
    DuplicateTransporterIds(Vec<String>),
    #[error("The transporter id list and the first-transporter input cannot be combined in one update")]
    ConflictingTransporterInputs,
    #[error("Invalid {field}: {value}")]
    InvalidWeight { field: &'static str, value: f64 },
    #[error("Refused weight {refused} exceeds received weight {received}")]
    NegativeAcceptedWeight { received: f64, refused: f64 },
    #[error("Refused weight {refused} is inconsistent with acceptation status {status}")]
    AcceptationMismatch {
        status: AcceptationStatus,
        refused: f64,
    },
    #[error("A transit station can only be added with the initially planned destination as next destination")]
    FinalDestinationDropped,
    #[error("A transit station can only be removed by making the planned next destination the destination")]
    FinalDestinationNotRestored,
}

/// Failures of the transporter chain manager.
#[derive(thiserror::Error, Debug)]
pub enum ChainError {
    #[error("Unknown transporter ids: {}", .0.join(", "))]
    UnknownTransporterIds(Vec<String>),
    #[error("A document accepts at most {max} transporters, {submitted} were submitted")]
    TooManyTransporters { submitted: usize, max: usize },
    #[error("Transporter ids submitted more than once: {}", .0.join(", "))]
    DuplicateTransporterIds(Vec<String>),
    #[error("The transporter id list and the first-transporter input cannot be combined")]
    ConflictingInputs,
    #[error("{}", sealed_message(.0))]
    SealedTransporterModification(Vec<FieldViolation>),
    #[error(transparent)]
    Storage(#[from] StoreError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<ChainError> for EngineError {
    fn from(value: ChainError) -> Self {
        match value {
            ChainError::UnknownTransporterIds(ids) => EngineError::TransporterNotFound(ids),
            ChainError::TooManyTransporters { submitted, max } => {
                ValidationError::TooManyTransporters { submitted, max }.into()
            }
            ChainError::DuplicateTransporterIds(ids) => {
                ValidationError::DuplicateTransporterIds(ids).into()
            }
            ChainError::ConflictingInputs => ValidationError::ConflictingTransporterInputs.into(),
            ChainError::SealedTransporterModification(violations) => {
                EngineError::SealedFieldConflict(violations)
            }
            ChainError::Storage(e) => e.into(),
            ChainError::Internal(e) => EngineError::Internal(e),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("Document {0} not found")]
    DocumentNotFound(String),
    #[error("Document {document} references missing transporter {transporter}")]
    DanglingTransporter {
        document: String,
        transporter: String,
    },
    #[error(transparent)]
    Sled(#[from] sled::Error),
    #[error("Failed to decode stored record: {0}")]
    Decode(#[from] minicbor::decode::Error),
    #[error("Failed to encode record: {0}")]
    Encode(#[from] anyhow::Error),
}

#[derive(thiserror::Error, Debug)]
#[error("Notification dispatch failed: {0}")]
pub struct DispatchError(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sealed_conflict_lists_every_label() {
        let err = EngineError::SealedFieldConflict(vec![
            FieldViolation::new("destination.cap", "destination CAP"),
            FieldViolation::new("waste.code", "waste code"),
        ]);

        let message = err.to_string();
        assert!(message.contains("destination CAP, waste code"));
    }

    #[test]
    fn chain_errors_map_onto_engine_taxonomy() {
        let err: EngineError = ChainError::UnknownTransporterIds(vec!["a".into()]).into();
        assert!(err.is_not_found());

        let err: EngineError = ChainError::TooManyTransporters {
            submitted: 6,
            max: 5,
        }
        .into();
        assert!(matches!(
            err,
            EngineError::Validation(ValidationError::TooManyTransporters { .. })
        ));

        let err: EngineError = ChainError::SealedTransporterModification(vec![]).into();
        assert!(matches!(err, EngineError::SealedFieldConflict(_)));
    }

    #[test]
    fn chain_storage_faults_stay_storage_errors() {
        let fault = StoreError::DanglingTransporter {
            document: "bsda_1".into(),
            transporter: "t1".into(),
        };
        let err: EngineError = ChainError::from(fault).into();
        assert!(matches!(err, EngineError::Storage(StoreError::DanglingTransporter { .. })));
        assert!(!err.is_not_found());
    }

    #[test]
    fn missing_document_in_store_is_not_found() {
        let err: EngineError = StoreError::DocumentNotFound("bsda_x".into()).into();
        assert!(matches!(err, EngineError::DocumentNotFound(id) if id == "bsda_x"));
    }
}
