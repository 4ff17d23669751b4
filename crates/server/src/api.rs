//! JSON API.
//!
//! - `POST /api/recommendations` runs one pipeline over a raw preference payload
//! - `GET  /api/catalog`         lists the catalog items and their static attributes
//!
//! Every response carries an `x-request-id` header, echoed from the request when present.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use pumpfit_agent::RecommendationEngine;
use pumpfit_core::{InterfaceError, PreferenceProfile, PumpSpec, ValidationError, PUMP_SPECS};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Clone)]
pub struct ApiState {
    engine: Arc<RecommendationEngine>,
}

impl ApiState {
    pub fn new(engine: Arc<RecommendationEngine>) -> Self {
        Self { engine }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    pub error: &'static str,
    pub message: String,
    pub correlation_id: String,
}

impl From<&InterfaceError> for ApiError {
    fn from(error: &InterfaceError) -> Self {
        Self {
            error: error.error_class(),
            message: format!("{} ({error})", error.user_message()),
            correlation_id: error.correlation_id().to_string(),
        }
    }
}

pub fn router(engine: Arc<RecommendationEngine>) -> Router {
    Router::new()
        .route("/api/recommendations", post(recommend))
        .route("/api/catalog", get(catalog))
        .with_state(ApiState::new(engine))
}

pub async fn recommend(State(state): State<ApiState>, headers: HeaderMap, body: Bytes) -> Response {
    let request_id = request_id(&headers);

    let profile = serde_json::from_slice::<Value>(&body)
        .map_err(|error| ValidationError::Unparseable(error.to_string()))
        .and_then(|payload| PreferenceProfile::from_value(&payload));

    let profile = match profile {
        Ok(profile) => profile,
        Err(error) => {
            let interface = InterfaceError::from_validation(error, request_id.clone());
            warn!(
                event_name = "api.recommendation.rejected",
                correlation_id = %request_id,
                error_class = interface.error_class(),
                error = %interface,
                "preference payload rejected"
            );
            return with_request_id(
                (StatusCode::BAD_REQUEST, Json(ApiError::from(&interface))).into_response(),
                &request_id,
            );
        }
    };

    let recommendation = state.engine.recommend(profile).await;
    info!(
        event_name = "api.recommendation.served",
        correlation_id = %request_id,
        top = recommendation.overall_top.id.key(),
        ai_assisted = recommendation.ai_assisted,
        "recommendation served"
    );

    with_request_id((StatusCode::OK, Json(recommendation)).into_response(), &request_id)
}

pub async fn catalog() -> Json<Vec<PumpSpec>> {
    Json(PUMP_SPECS.to_vec())
}

fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("req-{}", Uuid::new_v4()))
}

fn with_request_id(mut response: Response, request_id: &str) -> Response {
    if let Ok(value) = HeaderValue::from_str(request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body, Bytes},
        extract::State,
        http::{HeaderMap, HeaderValue, Request, StatusCode},
        response::Response,
    };
    use pumpfit_agent::RecommendationEngine;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::{recommend, router, ApiState, REQUEST_ID_HEADER};

    fn state() -> State<ApiState> {
        State(ApiState::new(Arc::new(RecommendationEngine::rules_only())))
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), 1 << 20).await.expect("body should be readable");
        serde_json::from_slice(&bytes).expect("body should be JSON")
    }

    #[tokio::test]
    async fn recommendation_response_uses_camel_case_contract() {
        let body = Bytes::from_static(
            br#"{"sliders":{"activity":9,"discreteness":9},"features":["completely_tubeless"]}"#,
        );

        let response = recommend(state(), HeaderMap::new(), body).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));

        let payload = json_body(response).await;
        assert_eq!(payload["overallTop"]["id"], "omnipod_5");
        assert_eq!(payload["alternatives"].as_array().map(Vec::len), Some(3));
        assert_eq!(payload["aiAssisted"], false);
        assert!(payload["keyFactors"].as_array().is_some_and(|factors| !factors.is_empty()));
        assert!(payload["personalizedInsights"].as_str().is_some_and(|text| !text.is_empty()));
        assert!(payload["debug"]["ledger"].is_array());
    }

    #[tokio::test]
    async fn invalid_payload_is_a_bad_request_with_correlation_id() {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_static("req-test-42"));

        let response =
            recommend(state(), headers, Bytes::from_static(br#"{"sliders":{"activity":"lots"}}"#))
                .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers().get(REQUEST_ID_HEADER).and_then(|value| value.to_str().ok()),
            Some("req-test-42")
        );

        let payload = json_body(response).await;
        assert_eq!(payload["error"], "validation");
        assert_eq!(payload["correlationId"], "req-test-42");
        assert!(payload["message"].as_str().is_some_and(|message| message.contains("activity")));
    }

    #[tokio::test]
    async fn unparseable_body_is_a_bad_request() {
        let response = recommend(state(), HeaderMap::new(), Bytes::from_static(b"not json")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let payload = json_body(response).await;
        assert!(payload["correlationId"].as_str().is_some_and(|id| id.starts_with("req-")));
    }

    #[tokio::test]
    async fn router_serves_catalog_and_recommendations() {
        let app = router(Arc::new(RecommendationEngine::rules_only()));

        let response = app
            .clone()
            .oneshot(Request::get("/api/catalog").body(Body::empty()).expect("request"))
            .await
            .expect("router should respond");
        assert_eq!(response.status(), StatusCode::OK);
        let catalog = json_body(response).await;
        assert_eq!(catalog.as_array().map(Vec::len), Some(6));
        assert_eq!(catalog[0]["model"], "medtronic_780g");

        let response = app
            .oneshot(
                Request::post("/api/recommendations")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"freeText":{"currentSituation":"I swim every day"}}"#))
                    .expect("request"),
            )
            .await
            .expect("router should respond");
        assert_eq!(response.status(), StatusCode::OK);
        let payload = json_body(response).await;
        assert!(payload["debug"]["keywordHits"].as_array().is_some_and(|hits| !hits.is_empty()));
    }
}
