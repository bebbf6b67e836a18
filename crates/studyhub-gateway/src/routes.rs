//! Feature routes
//!
//! Essentials extraction always answers 200 and signals failure in the body;
//! the JSON routes use 400 for bad input and 500 when generation fails.

use axum::Json;
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::{Value, json};
use studyhub_core::{SurvivalPlanRequest, UploadError, UploadedFile};
use tracing::{error, info, warn};

use crate::server::GatewayState;

const NO_FILE: &str = "No file uploaded";
const EXTRACTION_FAILED: &str = "Failed to extract essentials";
const AI_REQUEST_FAILED: &str = "AI request failed";
const MISSING_FIELDS: &str = "Missing required fields";

/// Error reply for the JSON routes: a status code and a short message
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn generation_failed() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: AI_REQUEST_FAILED.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

// ── Essentials ──

fn essentials_error(message: &str, details: Option<String>) -> Json<Value> {
    let mut body = json!({ "success": false, "error": message });
    if let Some(details) = details {
        body["details"] = Value::String(details);
    }
    Json(body)
}

/// First `file` field of the form, if any
async fn read_upload(mut multipart: Multipart) -> Result<Option<UploadedFile>, MultipartError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let name = field.file_name().unwrap_or("upload").to_string();
        let mime_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field.bytes().await?;
        return Ok(Some(UploadedFile::new(name, mime_type, bytes.to_vec())));
    }
    Ok(None)
}

/// POST /api/essentials/extract
pub async fn extract_essentials(
    State(state): State<GatewayState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Json<Value> {
    let Ok(multipart) = multipart else {
        return essentials_error(NO_FILE, None);
    };

    let file = match read_upload(multipart).await {
        Ok(Some(file)) => file,
        Ok(None) => return essentials_error(NO_FILE, None),
        Err(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            warn!("Upload rejected: {}", e.body_text());
            return essentials_error("File too large", Some(e.body_text()));
        }
        Err(e) => {
            warn!("Malformed upload: {}", e.body_text());
            return essentials_error(EXTRACTION_FAILED, Some(e.body_text()));
        }
    };

    if let Err(e) = file.validate() {
        warn!("Upload rejected ({}): {}", file.name, e);
        return match e {
            UploadError::TooLarge { .. } => essentials_error("File too large", Some(e.to_string())),
            UploadError::UnsupportedType { .. } => essentials_error(&e.to_string(), None),
        };
    }

    match state.assistant.extract_essentials(&file).await {
        Ok(report) => Json(json!({
            "success": true,
            "essentials": report.essentials,
            "raw": report.raw,
            "fileName": file.name,
        })),
        Err(e) => {
            error!("Error processing {}: {}", file.name, e);
            essentials_error(EXTRACTION_FAILED, Some(e.to_string()))
        }
    }
}

// ── Survival plan ──

fn survival_request(
    body: Result<Json<SurvivalPlanRequest>, JsonRejection>,
) -> Result<SurvivalPlanRequest, ApiError> {
    let Json(request) = body.map_err(|e| {
        warn!("Rejected survival plan body: {}", e.body_text());
        ApiError::bad_request(MISSING_FIELDS)
    })?;

    let missing = request.missing_fields();
    if !missing.is_empty() {
        info!("Survival plan request missing: {}", missing.join(", "));
        return Err(ApiError::bad_request(MISSING_FIELDS));
    }
    Ok(request)
}

/// POST /api/survivalplan
pub async fn survival_plan(
    State(state): State<GatewayState>,
    body: Result<Json<SurvivalPlanRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let request = survival_request(body)?;
    let plan = state
        .assistant
        .generate_survival_plan_text(&request)
        .await
        .map_err(|e| {
            error!("Survival plan failed: {}", e);
            ApiError::generation_failed()
        })?;
    Ok(Json(json!({ "plan": plan })))
}

/// POST /api/survivalplan/structured
pub async fn structured_survival_plan(
    State(state): State<GatewayState>,
    body: Result<Json<SurvivalPlanRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let request = survival_request(body)?;
    let plan = state
        .assistant
        .generate_survival_plan(&request)
        .await
        .map_err(|e| {
            error!("Structured survival plan failed: {}", e);
            ApiError::generation_failed()
        })?;
    Ok(Json(json!({ "plan": plan })))
}

// ── Revision plan ──

#[derive(Debug, Deserialize)]
pub struct RevisionPlanBody {
    #[serde(default)]
    syllabus: Option<String>,
    #[serde(default)]
    preferences: Option<Value>,
}

/// POST /api/revision/plan
pub async fn revision_plan(
    State(state): State<GatewayState>,
    body: Result<Json<RevisionPlanBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let syllabus = body
        .syllabus
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing required field: syllabus"))?;

    let plan = state
        .assistant
        .generate_revision_plan(&syllabus, body.preferences.as_ref())
        .await
        .map_err(|e| {
            error!("Revision plan failed: {}", e);
            ApiError::generation_failed()
        })?;
    Ok(Json(json!({ "plan": plan })))
}

// ── Doubt solver ──

#[derive(Debug, Deserialize)]
pub struct DoubtBody {
    #[serde(default)]
    question: Option<String>,
    #[serde(default)]
    context: Option<String>,
}

/// POST /api/doubts/solve
pub async fn solve_doubt(
    State(state): State<GatewayState>,
    body: Result<Json<DoubtBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let question = body
        .question
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing required field: question"))?;

    let answer = state
        .assistant
        .solve_doubt(&question, body.context.as_deref())
        .await
        .map_err(|e| {
            error!("Doubt solver failed: {}", e);
            ApiError::generation_failed()
        })?;
    Ok(Json(json!({ "answer": answer })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{body_json, failing_gateway, gateway, json_request, multipart_request};
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::atomic::Ordering;
    use tower::ServiceExt;

    const ESSENTIALS_JSON: &str = r#"```json
{"creativeTopics": ["Heat engine design"], "theoryTopics": ["Entropy"], "numericalTopics": ["Carnot efficiency"], "marksDistribution": {"twoMarks": ["State the zeroth law"], "threeMarks": [], "fourteenMarks": [], "sixteenMarks": []}}
```"#;

    #[tokio::test]
    async fn test_extract_essentials_png() {
        let (server, calls) = gateway(ESSENTIALS_JSON);
        let resp = server
            .router()
            .oneshot(multipart_request("file", "syllabus.png", "image/png", &[0x89, 0x50]))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["fileName"], "syllabus.png");
        assert_eq!(body["raw"], ESSENTIALS_JSON);
        let essentials = &body["essentials"];
        for key in [
            "creativeTopics",
            "theoryTopics",
            "numericalTopics",
            "marksDistribution",
        ] {
            assert!(essentials.get(key).is_some(), "missing {}", key);
        }
        assert_eq!(essentials["theoryTopics"], json!(["Entropy"]));
        // vision then text, both on the primary
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_extract_essentials_missing_file() {
        let (server, calls) = gateway(ESSENTIALS_JSON);
        let resp = server
            .router()
            .oneshot(multipart_request("notes", "syllabus.png", "image/png", &[1]))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body, json!({"success": false, "error": "No file uploaded"}));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_extract_essentials_not_multipart() {
        let (server, calls) = gateway(ESSENTIALS_JSON);
        let resp = server
            .router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/essentials/extract")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["error"], "No file uploaded");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_extract_essentials_rejects_type() {
        let (server, calls) = gateway(ESSENTIALS_JSON);
        let resp = server
            .router()
            .oneshot(multipart_request("file", "notes.txt", "text/plain", b"hello"))
            .await
            .unwrap();

        let body = body_json(resp).await;
        assert_eq!(body["success"], false);
        assert_eq!(
            body["error"],
            "Only images (JPG, PNG), PDFs, and MP4 videos are allowed"
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_extract_essentials_generation_failure() {
        let (server, _calls) = failing_gateway();
        let resp = server
            .router()
            .oneshot(multipart_request("file", "lecture.mp4", "video/mp4", &[0; 8]))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Failed to extract essentials");
        let details = body["details"].as_str().unwrap();
        assert!(details.starts_with("AI generation failed:"));
        assert!(!details.contains("groq"));
    }

    #[tokio::test]
    async fn test_survival_plan_missing_goals() {
        let (server, calls) = gateway("plan");
        let resp = server
            .router()
            .oneshot(json_request(
                "/api/survivalplan",
                r#"{"skills": ["Python"], "stressLevel": "high", "timeAvailable": "2h", "examDates": ["May 1"]}"#,
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = body_json(resp).await;
        assert_eq!(body, json!({"error": "Missing required fields"}));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_survival_plan_invalid_json() {
        let (server, calls) = gateway("plan");
        let resp = server
            .router()
            .oneshot(json_request("/api/survivalplan", "{not json"))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_survival_plan_text() {
        let (server, _calls) = gateway("- Week 1: fundamentals");
        let resp = server
            .router()
            .oneshot(json_request(
                "/api/survivalplan",
                r#"{"skills": "Python", "stressLevel": 6, "timeAvailable": "2h", "examDates": "May 1", "goals": "Pass"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body, json!({"plan": "- Week 1: fundamentals"}));
    }

    #[tokio::test]
    async fn test_survival_plan_failure_is_500() {
        let (server, calls) = failing_gateway();
        let resp = server
            .router()
            .oneshot(json_request(
                "/api/survivalplan",
                r#"{"skills": "Python", "stressLevel": "low", "timeAvailable": "2h", "examDates": "May 1", "goals": "Pass"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(resp).await;
        // no provider names or raw errors in the reply
        assert_eq!(body, json!({"error": "AI request failed"}));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_structured_survival_plan_fallback_shape() {
        let (server, _calls) = gateway("Sorry, I can only answer in prose.");
        let resp = server
            .router()
            .oneshot(json_request(
                "/api/survivalplan/structured",
                r#"{"userSkills": ["SQL"], "stressLevel": "low", "timeAvailable": "1h", "examDates": ["June 3"], "goals": "Learn joins"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        let plan = &body["plan"];
        assert_eq!(plan["weeklyPlan"], json!([]));
        assert_eq!(plan["productivityRules"], json!([]));
        assert_eq!(plan["rawResponse"], "Sorry, I can only answer in prose.");
    }

    #[tokio::test]
    async fn test_revision_plan() {
        let (server, _calls) = gateway(
            r#"{"weeks": [{"weekNumber": 1, "topics": ["Limits"], "goals": "Basics", "activities": [], "assessments": "Quiz"}], "studyTips": [], "resources": ["Khan Academy"]}"#,
        );
        let resp = server
            .router()
            .oneshot(json_request(
                "/api/revision/plan",
                r#"{"syllabus": "Calculus I", "preferences": {"hoursPerDay": 2}}"#,
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["plan"]["weeks"][0]["topics"], json!(["Limits"]));
        assert_eq!(body["plan"]["resources"], json!(["Khan Academy"]));
    }

    #[tokio::test]
    async fn test_revision_plan_missing_syllabus() {
        let (server, calls) = gateway("{}");
        let resp = server
            .router()
            .oneshot(json_request("/api/revision/plan", r#"{"syllabus": "  "}"#))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_solve_doubt() {
        let (server, _calls) = gateway("Entropy measures disorder.");
        let resp = server
            .router()
            .oneshot(json_request(
                "/api/doubts/solve",
                r#"{"question": "What is entropy?", "context": "Thermodynamics"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body, json!({"answer": "Entropy measures disorder."}));
    }

    #[tokio::test]
    async fn test_solve_doubt_missing_question() {
        let (server, calls) = gateway("unused");
        let resp = server
            .router()
            .oneshot(json_request("/api/doubts/solve", r#"{"context": "x"}"#))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = body_json(resp).await;
        assert_eq!(body["error"], "Missing required field: question");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
