// routes.rs — HTTP routes for the compliance engine.
//
//   POST /checks                      evaluate and record a request
//   GET  /checks                      audit history (query filters, newest first)
//   GET  /checks/{id}                 one check, with its resolution if any
//   POST /checks/{id}/approve         resolve a pending check
//   GET  /checks/{id}/replay          re-evaluate against the recorded snapshot
//   GET  /policies                    residency policies
//   GET  /geo-restrictions            geographic restrictions
//   GET  /sector-modes                sector mode postures
//   GET  /stats                       aggregate counters
//   GET  /healthz                     snapshot version and audit backlog
//   POST /admin/reload                re-read the policy file and publish it

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

use sov_audit::{ApprovalDecision, CheckFilter, ComplianceCheck, ComplianceStats, Page};
use sov_engine::{CheckRequest, EngineHealth, ReplayOutcome};
use sov_policy::{DataResidencyPolicy, GeoRestriction, SectorMode, SectorModeConfig, Verdict};

use crate::error::ApiError;
use crate::state::AppState;

/// Query parameters for `GET /checks`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecksQuery {
    pub tenant_id: Option<String>,
    pub verdict: Option<Verdict>,
    pub sector_mode: Option<String>,
    pub source_country: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

impl ChecksQuery {
    fn into_parts(self) -> Result<(CheckFilter, Page), ApiError> {
        let sector_mode = self
            .sector_mode
            .map(|m| m.parse::<SectorMode>())
            .transpose()
            .map_err(|e| ApiError::bad_parameter("sectorMode", e.to_string()))?;
        let mut page = Page::default();
        if let Some(offset) = self.offset {
            page.offset = offset;
        }
        if let Some(limit) = self.limit {
            page.limit = limit;
        }
        Ok((
            CheckFilter {
                tenant_id: self.tenant_id,
                verdict: self.verdict,
                sector_mode,
                source_country: self.source_country,
                since: self.since,
                until: self.until,
            },
            page,
        ))
    }
}

/// Body of `POST /checks/{id}/approve`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveRequest {
    pub decision: ApprovalDecision,
    pub approver: String,
    #[serde(default)]
    pub note: Option<String>,
}

/// Response of `POST /admin/reload`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReloadResponse {
    pub version: u64,
    pub digest: String,
    pub policies: usize,
    pub geo_restrictions: usize,
}

/// Build the full application router.
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/checks", post(create_check).get(list_checks))
        .route("/checks/{id}", get(get_check))
        .route("/checks/{id}/approve", post(approve_check))
        .route("/checks/{id}/replay", get(replay_check))
        .route("/policies", get(list_policies))
        .route("/geo-restrictions", get(list_geo_restrictions))
        .route("/sector-modes", get(list_sector_modes))
        .route("/stats", get(get_stats))
        .route("/healthz", get(health))
        .route("/admin/reload", post(reload_policies))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|e| ApiError::bad_parameter("id", e.to_string()))
}

async fn create_check(
    State(state): State<AppState>,
    Json(request): Json<CheckRequest>,
) -> Result<Json<ComplianceCheck>, ApiError> {
    let check = state.blocking(move |engine| engine.check(request)).await?;
    Ok(Json(check))
}

async fn list_checks(
    State(state): State<AppState>,
    Query(query): Query<ChecksQuery>,
) -> Result<Json<Vec<ComplianceCheck>>, ApiError> {
    let (filter, page) = query.into_parts()?;
    let checks = state
        .blocking(move |engine| engine.checks(&filter, page))
        .await?;
    Ok(Json(checks))
}

async fn get_check(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ComplianceCheck>, ApiError> {
    let id = parse_id(&id)?;
    let check = state.blocking(move |engine| engine.check_by_id(id)).await?;
    Ok(Json(check))
}

async fn approve_check(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ApproveRequest>,
) -> Result<Json<ComplianceCheck>, ApiError> {
    let id = parse_id(&id)?;
    let check = state
        .blocking(move |engine| engine.approve(id, body.decision, &body.approver, body.note))
        .await?;
    Ok(Json(check))
}

async fn replay_check(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ReplayOutcome>, ApiError> {
    let id = parse_id(&id)?;
    let outcome = state.blocking(move |engine| engine.verify_check(id)).await?;
    Ok(Json(outcome))
}

async fn list_policies(State(state): State<AppState>) -> Json<Vec<DataResidencyPolicy>> {
    Json(state.engine.policies())
}

async fn list_geo_restrictions(State(state): State<AppState>) -> Json<Vec<GeoRestriction>> {
    Json(state.engine.geo_restrictions())
}

async fn list_sector_modes(State(state): State<AppState>) -> Json<Vec<SectorModeConfig>> {
    Json(state.engine.sector_modes())
}

async fn get_stats(State(state): State<AppState>) -> Result<Json<ComplianceStats>, ApiError> {
    let stats = state.blocking(|engine| engine.stats()).await?;
    Ok(Json(stats))
}

async fn health(State(state): State<AppState>) -> Result<Json<EngineHealth>, ApiError> {
    // Counting the audit backlog takes locks and may read the log.
    let health = state.blocking(|engine| engine.health()).await?;
    Ok(Json(health))
}

async fn reload_policies(State(state): State<AppState>) -> Result<Json<ReloadResponse>, ApiError> {
    let path = state.policies_path.clone().ok_or(ApiError::ReloadUnavailable)?;
    let snapshot = state
        .blocking(move |engine| engine.reload_policies(&path))
        .await?;
    Ok(Json(ReloadResponse {
        version: snapshot.version,
        digest: snapshot.digest.clone(),
        policies: snapshot.policies().len(),
        geo_restrictions: snapshot.geo_restrictions().len(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body, Bytes};
    use axum::http::{Method, Request, StatusCode};
    use serde::de::DeserializeOwned;
    use std::sync::Arc;
    use tower::util::ServiceExt;

    use sov_audit::MemoryAuditLog;
    use sov_engine::{ComplianceEngine, EngineConfig, RetryPolicy};
    use sov_policy::PolicySet;

    use crate::error::ErrorBody;

    const POLICIES: &str = r#"
policies:
  - id: sa-pdpl
    region: SA
    localStorageOnly: true
    crossBorderTransferAllowed: false
"#;

    fn test_state() -> AppState {
        let config = EngineConfig {
            retry: RetryPolicy::none(),
            ..EngineConfig::default()
        };
        let engine = ComplianceEngine::new(
            config,
            PolicySet::from_yaml_str(POLICIES).unwrap(),
            Arc::new(MemoryAuditLog::new()),
        )
        .unwrap();
        AppState::new(engine)
    }

    async fn send(
        app: Router,
        method: Method,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, Bytes) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, bytes)
    }

    fn decode<T: DeserializeOwned>(bytes: &[u8]) -> T {
        serde_json::from_slice(bytes).unwrap()
    }

    fn pending_request() -> serde_json::Value {
        serde_json::json!({
            "tenantId": "tenant-1",
            "operation": "data_processing",
            "sourceCountry": "SA",
            "sectorMode": "critical-infrastructure",
            "dataTypes": ["telemetry"],
            "encryption": "aes256_hsm",
            "auditLevel": "forensic"
        })
    }

    #[tokio::test]
    async fn cross_border_check_is_denied() {
        let app = build_app(test_state());
        let (status, body) = send(
            app,
            Method::POST,
            "/checks",
            Some(serde_json::json!({
                "tenantId": "tenant-1",
                "operation": "cross_border",
                "sourceCountry": "SA",
                "targetCountry": "US",
                "sectorMode": "civilian",
                "dataTypes": ["personal"]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let check: ComplianceCheck = decode(&body);
        assert_eq!(check.result.verdict, Verdict::Denied);
        let json: serde_json::Value = decode(&body);
        assert_eq!(json["result"]["violations"][0]["code"], "CROSS_BORDER_DENIED");
    }

    #[tokio::test]
    async fn payload_fields_use_record_names() {
        let state = test_state();
        let (_, body) = send(build_app(state.clone()), Method::POST, "/checks", Some(pending_request())).await;
        let check: serde_json::Value = decode(&body);
        for key in ["checkId", "tenantId", "sectorMode", "policyVersion", "policyDigest"] {
            assert!(check.get(key).is_some(), "missing {key} in {check}");
        }
        assert!(check.get("check_id").is_none());
        assert_eq!(check["request"]["sourceCountry"], "SA");
        assert_eq!(check["result"]["verdict"], "pending-approval");
        assert_eq!(check["result"]["conditions"][0]["kind"], "authority_sign_off");

        let (_, body) = send(build_app(state.clone()), Method::GET, "/policies", None).await;
        let policies: serde_json::Value = decode(&body);
        assert_eq!(policies[0]["localStorageOnly"], true);
        assert_eq!(policies[0]["crossBorderTransferAllowed"], false);
        assert_eq!(policies[0]["encryptionRequired"], false);

        let (_, body) = send(build_app(state.clone()), Method::GET, "/sector-modes", None).await;
        let modes: serde_json::Value = decode(&body);
        assert!(modes[0].get("securityLevel").is_some());
        assert!(modes[0].get("minEncryption").is_some());

        let (_, body) = send(build_app(state.clone()), Method::GET, "/stats", None).await;
        let stats: serde_json::Value = decode(&body);
        assert_eq!(stats["totalChecks"], 1);
        assert_eq!(stats["checksPending"], 1);
        assert_eq!(stats["checksAllowed"], 0);

        let (_, body) = send(build_app(state), Method::GET, "/healthz", None).await;
        let health: serde_json::Value = decode(&body);
        assert_eq!(health["policyVersion"], 1);
        assert_eq!(health["auditPending"], 0);
    }

    #[tokio::test]
    async fn missing_fields_are_bad_request() {
        let app = build_app(test_state());
        let (status, body) = send(
            app,
            Method::POST,
            "/checks",
            Some(serde_json::json!({ "tenantId": "tenant-1", "dataTypes": [] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let error: ErrorBody = decode(&body);
        assert_eq!(error.code, "INVALID_REQUEST");
    }

    #[tokio::test]
    async fn approve_flow_and_conflict() {
        let state = test_state();
        let (_, body) = send(
            build_app(state.clone()),
            Method::POST,
            "/checks",
            Some(pending_request()),
        )
        .await;
        let check: ComplianceCheck = decode(&body);
        assert_eq!(check.result.verdict, Verdict::PendingApproval);

        let uri = format!("/checks/{}/approve", check.check_id);
        let approval = serde_json::json!({ "decision": "allow", "approver": "officer-7" });
        let (status, body) = send(
            build_app(state.clone()),
            Method::POST,
            &uri,
            Some(approval.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let resolved: ComplianceCheck = decode(&body);
        assert_eq!(resolved.result.verdict, Verdict::Allowed);

        let (status, body) = send(build_app(state.clone()), Method::POST, &uri, Some(approval)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        let error: ErrorBody = decode(&body);
        assert_eq!(error.code, "ALREADY_RESOLVED");

        let (status, body) = send(
            build_app(state),
            Method::GET,
            &format!("/checks/{}", check.check_id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let stored: ComplianceCheck = decode(&body);
        assert_eq!(stored.result.verdict, Verdict::Allowed);
        assert!(stored.resolution.is_some());
    }

    #[tokio::test]
    async fn unknown_and_malformed_ids() {
        let state = test_state();
        let (status, _) = send(
            build_app(state.clone()),
            Method::GET,
            &format!("/checks/{}", Uuid::new_v4()),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(build_app(state), Method::GET, "/checks/not-a-uuid", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let error: ErrorBody = decode(&body);
        assert_eq!(error.code, "BAD_PARAMETER");
    }

    #[tokio::test]
    async fn history_filters_and_stats() {
        let state = test_state();
        send(build_app(state.clone()), Method::POST, "/checks", Some(pending_request())).await;
        send(
            build_app(state.clone()),
            Method::POST,
            "/checks",
            Some(serde_json::json!({
                "tenantId": "tenant-2",
                "operation": "data_processing",
                "sourceCountry": "FR",
                "sectorMode": "civilian",
                "dataTypes": ["logs"]
            })),
        )
        .await;

        let (status, body) = send(
            build_app(state.clone()),
            Method::GET,
            "/checks?verdict=pending-approval&sectorMode=critical-infrastructure",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let checks: Vec<ComplianceCheck> = decode(&body);
        assert_eq!(checks.len(), 1);
        assert_eq!(checks[0].tenant_id, "tenant-1");

        let (status, _) = send(
            build_app(state.clone()),
            Method::GET,
            "/checks?sectorMode=navy",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, body) = send(build_app(state), Method::GET, "/stats", None).await;
        let stats: ComplianceStats = decode(&body);
        assert_eq!(stats.total_checks, 2);
        assert_eq!(stats.checks_pending, 1);
        assert_eq!(stats.checks_allowed, 1);
        assert!(stats.is_consistent());
    }

    #[tokio::test]
    async fn configuration_listings() {
        let state = test_state();
        let (_, body) = send(build_app(state.clone()), Method::GET, "/policies", None).await;
        let policies: Vec<DataResidencyPolicy> = decode(&body);
        assert_eq!(policies.len(), 1);

        let (_, body) = send(build_app(state.clone()), Method::GET, "/geo-restrictions", None).await;
        let restrictions: Vec<GeoRestriction> = decode(&body);
        assert!(restrictions.is_empty());

        let (_, body) = send(build_app(state), Method::GET, "/sector-modes", None).await;
        let modes: Vec<SectorModeConfig> = decode(&body);
        assert_eq!(modes.len(), 5);
    }

    #[tokio::test]
    async fn replay_reproduces_recorded_check() {
        let state = test_state();
        let (_, body) = send(build_app(state.clone()), Method::POST, "/checks", Some(pending_request())).await;
        let check: ComplianceCheck = decode(&body);

        let (status, body) = send(
            build_app(state),
            Method::GET,
            &format!("/checks/{}/replay", check.check_id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = decode(&body);
        assert_eq!(json["outcome"], "reproduced");
    }

    #[tokio::test]
    async fn reload_requires_policy_file() {
        let (status, body) = send(build_app(test_state()), Method::POST, "/admin/reload", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let error: ErrorBody = decode(&body);
        assert_eq!(error.code, "RELOAD_UNAVAILABLE");
    }

    #[tokio::test]
    async fn reload_publishes_new_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policies.yaml");
        std::fs::write(&path, POLICIES).unwrap();
        let state = test_state().with_policies_path(&path);

        std::fs::write(
            &path,
            "geoRestrictions:\n  - id: kp\n    country: KP\n    restrictionLevel: prohibited\n",
        )
        .unwrap();
        let (status, body) = send(build_app(state.clone()), Method::POST, "/admin/reload", None).await;
        assert_eq!(status, StatusCode::OK);
        let reload: ReloadResponse = decode(&body);
        assert_eq!(reload.version, 2);
        assert_eq!(reload.policies, 0);
        assert_eq!(reload.geo_restrictions, 1);

        let (_, body) = send(build_app(state), Method::GET, "/healthz", None).await;
        let health: EngineHealth = decode(&body);
        assert_eq!(health.policy_version, 2);
        assert_eq!(health.audit_pending, 0);
    }

    #[tokio::test]
    async fn conflicting_reload_keeps_current_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policies.yaml");
        std::fs::write(
            &path,
            r#"
geoRestrictions:
  - id: a
    country: IR
    restrictionLevel: prohibited
  - id: b
    country: IR
    restrictionLevel: restricted
"#,
        )
        .unwrap();
        let state = test_state().with_policies_path(&path);
        let (status, body) = send(build_app(state.clone()), Method::POST, "/admin/reload", None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        let error: ErrorBody = decode(&body);
        assert_eq!(error.code, "CONFIGURATION_ERROR");
        assert_eq!(state.engine.snapshot().version, 1);
    }
}
