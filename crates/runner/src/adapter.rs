//! Kind-specific adapters: payload shaping and endpoint selection.
//!
//! Everything else about a job's lifecycle is shared by the generic runner.

use std::sync::Arc;

use hirebatch_core::request::{IngestionParameters, InvitationParameters, ScreeningParameters};
use hirebatch_core::{BatchParameters, BatchRequest, CoreError, JobId, JobKind};
use serde_json::{json, Value};

/// Adapts the generic runner to one job kind.
pub trait JobAdapter: Send + Sync + 'static {
    fn kind(&self) -> JobKind;

    /// Path of the batch submission endpoint.
    fn submit_endpoint(&self) -> &'static str;

    /// Path of the progress endpoint for `job_id`. The id is escaped as a
    /// single path segment.
    fn progress_endpoint(&self, job_id: &JobId) -> String {
        format!(
            "{}/{}",
            self.submit_endpoint(),
            urlencoding::encode(job_id.as_str())
        )
    }

    /// Validate `request` and build the JSON body for the submit endpoint.
    fn build_payload(&self, request: &BatchRequest) -> Result<Value, CoreError>;
}

/// Shared prologue: validate, check the kind, emit the common fields.
fn envelope(kind: JobKind, request: &BatchRequest) -> Result<Value, CoreError> {
    if request.kind() != kind {
        return Err(CoreError::KindMismatch {
            expected: kind,
            actual: request.kind(),
        });
    }
    request.validate_all()?;
    Ok(json!({
        "target_id": request.target_id,
        "item_ids": request.item_ids,
    }))
}

fn merge(mut base: Value, extra: Value) -> Value {
    if let (Some(base), Value::Object(extra)) = (base.as_object_mut(), extra) {
        base.extend(extra);
    }
    base
}

// ---------------------------------------------------------------------------
// Ingestion
// ---------------------------------------------------------------------------

/// Resume parsing. Progress counts parsed resumes.
pub struct IngestionAdapter;

impl JobAdapter for IngestionAdapter {
    fn kind(&self) -> JobKind {
        JobKind::Ingestion
    }

    fn submit_endpoint(&self) -> &'static str {
        "/resumes/batch-parse"
    }

    fn build_payload(&self, request: &BatchRequest) -> Result<Value, CoreError> {
        let base = envelope(self.kind(), request)?;
        let BatchParameters::Ingestion(IngestionParameters {
            language,
            extract_contacts,
        }) = &request.parameters
        else {
            return Err(CoreError::Internal("ingestion parameters expected".into()));
        };
        let mut extra = json!({ "extract_contacts": extract_contacts });
        if let Some(language) = language {
            extra["language"] = json!(language.to_ascii_lowercase());
        }
        Ok(merge(base, extra))
    }
}

// ---------------------------------------------------------------------------
// Screening
// ---------------------------------------------------------------------------

/// Candidate screening. This endpoint publishes a `done` flag.
pub struct ScreeningAdapter;

impl JobAdapter for ScreeningAdapter {
    fn kind(&self) -> JobKind {
        JobKind::Screening
    }

    fn submit_endpoint(&self) -> &'static str {
        "/screening/batches"
    }

    fn build_payload(&self, request: &BatchRequest) -> Result<Value, CoreError> {
        let base = envelope(self.kind(), request)?;
        let BatchParameters::Screening(ScreeningParameters {
            criteria,
            minimum_score,
        }) = &request.parameters
        else {
            return Err(CoreError::Internal("screening parameters expected".into()));
        };
        let mut extra = json!({});
        if let Some(criteria) = criteria.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            extra["criteria"] = json!(criteria);
        }
        if let Some(score) = minimum_score {
            extra["minimum_score"] = json!(score);
        }
        Ok(merge(base, extra))
    }
}

// ---------------------------------------------------------------------------
// Invitation
// ---------------------------------------------------------------------------

/// Interview invitation dispatch. Progress counts sent invitations.
pub struct InvitationAdapter;

/// Invitation links expire after a week unless told otherwise.
const DEFAULT_INVITATION_EXPIRY_DAYS: u32 = 7;

impl JobAdapter for InvitationAdapter {
    fn kind(&self) -> JobKind {
        JobKind::Invitation
    }

    fn submit_endpoint(&self) -> &'static str {
        "/invitations/batches"
    }

    fn build_payload(&self, request: &BatchRequest) -> Result<Value, CoreError> {
        let base = envelope(self.kind(), request)?;
        let BatchParameters::Invitation(InvitationParameters {
            template_id,
            interview_type,
            expires_in_days,
        }) = &request.parameters
        else {
            return Err(CoreError::Internal("invitation parameters expected".into()));
        };
        let extra = json!({
            "template_id": template_id,
            "interview_type": interview_type.as_deref().unwrap_or("video"),
            "expires_in_days": expires_in_days.unwrap_or(DEFAULT_INVITATION_EXPIRY_DAYS),
        });
        Ok(merge(base, extra))
    }
}

/// The adapter for `kind`.
pub fn adapter_for(kind: JobKind) -> Arc<dyn JobAdapter> {
    match kind {
        JobKind::Ingestion => Arc::new(IngestionAdapter),
        JobKind::Screening => Arc::new(ScreeningAdapter),
        JobKind::Invitation => Arc::new(InvitationAdapter),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn request(parameters: BatchParameters) -> BatchRequest {
        BatchRequest::new("opening-7", vec!["a".into(), "b".into()], parameters)
    }

    #[test]
    fn every_kind_has_a_matching_adapter() {
        for kind in JobKind::ALL {
            assert_eq!(adapter_for(kind).kind(), kind);
        }
    }

    #[test]
    fn progress_endpoint_appends_job_id() {
        let adapter = ScreeningAdapter;
        assert_eq!(
            adapter.progress_endpoint(&JobId::new("981")),
            "/screening/batches/981"
        );
    }

    #[test]
    fn progress_endpoint_escapes_job_id() {
        let adapter = IngestionAdapter;
        assert_eq!(
            adapter.progress_endpoint(&JobId::new("a/b?c#d")),
            "/resumes/batch-parse/a%2Fb%3Fc%23d"
        );
    }

    #[test]
    fn ingestion_payload() {
        let payload = IngestionAdapter
            .build_payload(&request(BatchParameters::Ingestion(IngestionParameters {
                language: Some("EN".into()),
                extract_contacts: true,
            })))
            .unwrap();

        assert_eq!(payload["target_id"], "opening-7");
        assert_eq!(payload["item_ids"], json!(["a", "b"]));
        assert_eq!(payload["language"], "en");
        assert_eq!(payload["extract_contacts"], true);
    }

    #[test]
    fn screening_payload_omits_blank_criteria() {
        let payload = ScreeningAdapter
            .build_payload(&request(BatchParameters::Screening(ScreeningParameters {
                criteria: Some("   ".into()),
                minimum_score: Some(70),
            })))
            .unwrap();

        assert!(payload.get("criteria").is_none());
        assert_eq!(payload["minimum_score"], 70);
    }

    #[test]
    fn invitation_payload_fills_defaults() {
        let payload = InvitationAdapter
            .build_payload(&request(BatchParameters::Invitation(InvitationParameters {
                template_id: "tpl-1".into(),
                interview_type: None,
                expires_in_days: None,
            })))
            .unwrap();

        assert_eq!(payload["template_id"], "tpl-1");
        assert_eq!(payload["interview_type"], "video");
        assert_eq!(payload["expires_in_days"], 7);
    }

    #[test]
    fn wrong_kind_is_rejected() {
        let result = InvitationAdapter.build_payload(&request(BatchParameters::Screening(
            ScreeningParameters::default(),
        )));

        assert_matches!(
            result,
            Err(CoreError::KindMismatch {
                expected: JobKind::Invitation,
                actual: JobKind::Screening,
            })
        );
    }

    #[test]
    fn invalid_request_is_rejected_before_shaping() {
        let empty = BatchRequest::new(
            "opening-7",
            Vec::new(),
            BatchParameters::Screening(ScreeningParameters::default()),
        );
        assert_matches!(
            ScreeningAdapter.build_payload(&empty),
            Err(CoreError::Validation(_))
        );
    }
}
