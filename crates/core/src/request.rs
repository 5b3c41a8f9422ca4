//! Batch submit requests and their kind-specific parameters.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::CoreError;
use crate::job::JobKind;

/// Upper bound on items per batch accepted by the processor.
pub const MAX_BATCH_ITEMS: usize = 500;

/// A user-initiated batch: one target (usually a job opening), many items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct BatchRequest {
    /// The entity the batch is run against, e.g. a job opening id.
    #[validate(length(min = 1))]
    pub target_id: String,
    /// Resume ids for ingestion, candidate ids for screening/invitation.
    #[validate(length(min = 1))]
    pub item_ids: Vec<String>,
    pub parameters: BatchParameters,
}

impl BatchRequest {
    pub fn new(
        target_id: impl Into<String>,
        item_ids: Vec<String>,
        parameters: BatchParameters,
    ) -> Self {
        Self {
            target_id: target_id.into(),
            item_ids,
            parameters,
        }
    }

    /// The kind of runner this request belongs to.
    pub fn kind(&self) -> JobKind {
        self.parameters.kind()
    }

    /// Validate the envelope and the kind-specific parameters.
    pub fn validate_all(&self) -> Result<(), CoreError> {
        self.validate()?;
        if self.item_ids.len() > MAX_BATCH_ITEMS {
            return Err(CoreError::Validation(format!(
                "item_ids: at most {MAX_BATCH_ITEMS} items per batch"
            )));
        }
        if self.item_ids.iter().any(|id| id.trim().is_empty()) {
            return Err(CoreError::Validation("item_ids: blank id".into()));
        }
        self.parameters.validate_inner()
    }
}

/// Kind-specific parameters, tagged by `kind` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BatchParameters {
    Ingestion(IngestionParameters),
    Screening(ScreeningParameters),
    Invitation(InvitationParameters),
}

impl BatchParameters {
    pub fn kind(&self) -> JobKind {
        match self {
            Self::Ingestion(_) => JobKind::Ingestion,
            Self::Screening(_) => JobKind::Screening,
            Self::Invitation(_) => JobKind::Invitation,
        }
    }

    fn validate_inner(&self) -> Result<(), CoreError> {
        match self {
            Self::Ingestion(p) => p.validate()?,
            Self::Screening(p) => p.validate()?,
            Self::Invitation(p) => p.validate()?,
        }
        Ok(())
    }
}

/// Resume parsing options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct IngestionParameters {
    /// ISO 639-1 hint for the parser; autodetected when absent.
    #[validate(length(equal = 2))]
    pub language: Option<String>,
    /// Extract email/phone into the candidate profile.
    #[serde(default)]
    pub extract_contacts: bool,
}

/// Screening options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct ScreeningParameters {
    /// Free-text criteria appended to the opening's requirements.
    pub criteria: Option<String>,
    /// Candidates scoring below this are marked rejected.
    #[validate(range(max = 100))]
    pub minimum_score: Option<u8>,
}

/// Interview invitation options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct InvitationParameters {
    #[validate(length(min = 1))]
    pub template_id: String,
    /// e.g. `"phone"`, `"onsite"`, `"video"`.
    pub interview_type: Option<String>,
    #[validate(range(min = 1, max = 60))]
    pub expires_in_days: Option<u32>,
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn ids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("cand-{i}")).collect()
    }

    #[test]
    fn valid_screening_request_passes() {
        let req = BatchRequest::new(
            "opening-1",
            ids(10),
            BatchParameters::Screening(ScreeningParameters {
                criteria: Some("5+ years Rust".into()),
                minimum_score: Some(60),
            }),
        );
        assert!(req.validate_all().is_ok());
        assert_eq!(req.kind(), JobKind::Screening);
    }

    #[test]
    fn empty_batch_is_rejected() {
        let req = BatchRequest::new(
            "opening-1",
            Vec::new(),
            BatchParameters::Ingestion(IngestionParameters::default()),
        );
        assert_matches!(req.validate_all(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn oversized_batch_is_rejected() {
        let req = BatchRequest::new(
            "opening-1",
            ids(MAX_BATCH_ITEMS + 1),
            BatchParameters::Ingestion(IngestionParameters::default()),
        );
        assert_matches!(req.validate_all(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn full_batch_is_accepted() {
        let req = BatchRequest::new(
            "opening-1",
            ids(MAX_BATCH_ITEMS),
            BatchParameters::Ingestion(IngestionParameters::default()),
        );
        assert!(req.validate_all().is_ok());
    }

    #[test]
    fn blank_item_id_is_rejected() {
        let req = BatchRequest::new(
            "opening-1",
            vec!["a".into(), "  ".into()],
            BatchParameters::Ingestion(IngestionParameters::default()),
        );
        assert_matches!(req.validate_all(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn invitation_requires_template() {
        let req = BatchRequest::new(
            "opening-1",
            ids(2),
            BatchParameters::Invitation(InvitationParameters {
                template_id: String::new(),
                interview_type: None,
                expires_in_days: Some(7),
            }),
        );
        assert_matches!(req.validate_all(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn screening_score_out_of_range() {
        let req = BatchRequest::new(
            "opening-1",
            ids(2),
            BatchParameters::Screening(ScreeningParameters {
                criteria: None,
                minimum_score: Some(101),
            }),
        );
        assert_matches!(req.validate_all(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn parameters_are_tagged_by_kind() {
        let params = BatchParameters::Ingestion(IngestionParameters {
            language: Some("en".into()),
            extract_contacts: true,
        });
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["kind"], "ingestion");
        assert_eq!(json["language"], "en");
        assert_eq!(json["extract_contacts"], true);
    }
}
