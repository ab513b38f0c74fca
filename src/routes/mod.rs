pub mod ai;
pub mod directory;
pub mod health;
pub mod knowledge;
pub mod requests;
pub mod vendors;

use axum::{
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;

use crate::app::AppState;

/// Build the API router with all routes
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health::health_check))
        // Requests
        .route(
            "/requests",
            post(requests::submit_request).get(requests::list_requests),
        )
        .route("/requests/:request_id", get(requests::get_request))
        .route(
            "/requests/:request_id/status",
            patch(requests::update_status),
        )
        .route(
            "/requests/:request_id/schedule",
            post(requests::schedule_request),
        )
        .route("/requests/:request_id/assign", post(requests::assign_vendor))
        .route("/calendar", get(requests::calendar))
        .route("/calendar/summary", get(requests::calendar_summary))
        // Directory
        .route("/tenants", get(directory::list_tenants))
        .route(
            "/vendors",
            get(vendors::list_vendors).post(vendors::create_vendor),
        )
        .route("/vendors/performance", get(vendors::vendor_performance))
        .route("/solutions", get(directory::list_solutions))
        .route("/dashboard/stats", get(directory::dashboard_stats))
        // Classification pipeline
        .route("/ai/classify", post(ai::classify))
        .route("/ai/estimate", post(ai::estimate))
        .route("/ai/recommend", post(ai::recommend))
        .route("/ai/ask", post(ai::ask))
        .route("/ai/interactions", get(ai::list_interactions))
        // Knowledge base
        .route("/knowledge/documents", post(knowledge::upload_documents))
        .route("/knowledge/stats", get(knowledge::knowledge_stats))
        .route("/knowledge/search", post(knowledge::search_knowledge))
}

#[cfg(test)]
mod tests {
    use crate::app::{create_app, tests::test_state};
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
        Router,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn app() -> Router {
        create_app(test_state().await)
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            // Extractor rejections answer in plain text
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, value)
    }

    #[tokio::test]
    async fn health_reports_remote_model_disabled() {
        let app = app().await;
        let (status, body) = send(&app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["services"]["remote_model"], "disabled");
    }

    #[tokio::test]
    async fn submit_then_read_back_and_resolve() {
        let app = app().await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/requests",
            Some(json!({
                "name": "Sam Tenant",
                "unit": "12A",
                "description": "AC blowing warm air occasionally"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let data = &body["data"];
        assert_eq!(data["classification"]["category"], "hvac");
        assert_eq!(data["classification"]["priority"], "medium");
        assert_eq!(data["classified_by"], "deterministic");
        assert_eq!(data["request"]["status"], "pending");
        let id = data["request"]["id"].as_i64().unwrap();

        let (status, body) = send(&app, Method::GET, &format!("/requests/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["unit_number"], "12A");

        let (status, body) = send(&app, Method::GET, "/requests?category=hvac", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["pagination"]["total_items"], 1);

        let (status, _) = send(
            &app,
            Method::PATCH,
            &format!("/requests/{id}/status"),
            Some(json!({ "status": "resolved", "actual_cost": 90.0 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(
            &app,
            Method::PATCH,
            &format!("/requests/{id}/status"),
            Some(json!({ "status": "pending" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn invalid_submission_is_unprocessable() {
        let app = app().await;
        let (status, body) = send(
            &app,
            Method::POST,
            "/requests",
            Some(json!({
                "name": "Sam Tenant",
                "unit": "12A",
                "email": "sam-at-example",
                "description": "Door sticks"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "VALIDATION_ERROR");

        let (status, _) = send(&app, Method::GET, "/requests/777", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn pipeline_endpoints_work_without_remote_model() {
        let app = app().await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/ai/classify",
            Some(json!({ "description": "Water leaking under kitchen sink, emergency!" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["category"], "plumbing");
        assert_eq!(body["data"]["priority"], "high");

        let (status, body) = send(
            &app,
            Method::POST,
            "/ai/estimate",
            Some(json!({ "description": "Bedroom wall cracked", "category": "other" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let cost = body["data"]["estimated_cost"].as_f64().unwrap();
        assert!((70.0..=130.0).contains(&cost), "{cost}");
        assert_eq!(body["data"]["source"], "fallback");

        let (status, body) = send(
            &app,
            Method::POST,
            "/ai/recommend",
            Some(json!({ "description": "toilet keeps running", "top_k": 2 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let recs = body["data"].as_array().unwrap();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0]["source"], "solutions_db");

        let (status, body) = send(
            &app,
            Method::POST,
            "/ai/ask",
            Some(json!({ "question": "How do I reset a tripped circuit breaker?" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["source"], "faq");

        let (status, body) = send(&app, Method::GET, "/ai/interactions", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 1);

        let (status, _) = send(&app, Method::POST, "/ai/classify", Some(json!({ "description": " " }))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn multipart_upload_indexes_text_files() {
        let app = app().await;
        let boundary = "XBOUNDARYX";
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"category\"\r\n\r\nappliance\r\n\
             --{b}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"dishwasher.txt\"\r\n\
             Content-Type: text/plain\r\n\r\nClean the dishwasher filter at the bottom of the tub.\r\n\
             --{b}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"empty.txt\"\r\n\
             Content-Type: text/plain\r\n\r\n   \r\n\
             --{b}--\r\n",
            b = boundary
        );

        let request = Request::builder()
            .method(Method::POST)
            .uri("/knowledge/documents")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["data"]["indexed"], 1);
        assert_eq!(body["data"]["document_count"], 1);
        assert_eq!(body["data"]["outcomes"][1]["status"], "skipped");

        let (_, stats) = send(&app, Method::GET, "/knowledge/stats", None).await;
        assert_eq!(stats["data"]["document_count"], 1);

        let (status, hits) = send(
            &app,
            Method::POST,
            "/knowledge/search",
            Some(json!({ "query": "dishwasher filter" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(hits["data"][0]["metadata"]["category"], "appliance");
    }

    #[tokio::test]
    async fn truncated_file_part_fails_alone() {
        let app = app().await;
        let boundary = "XBOUNDARYX";
        // Second part never reaches its closing boundary
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"gutter.txt\"\r\n\
             Content-Type: text/plain\r\n\r\nClear the gutter downspouts every autumn.\r\n\
             --{b}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"cut.txt\"\r\n\
             Content-Type: text/plain\r\n\r\nThis upload stops half",
            b = boundary
        );

        let request = Request::builder()
            .method(Method::POST)
            .uri("/knowledge/documents")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["data"]["indexed"], 1);
        assert_eq!(body["data"]["outcomes"][0]["status"], "indexed");
        assert_eq!(body["data"]["outcomes"][1]["filename"], "cut.txt");
        assert_eq!(body["data"]["outcomes"][1]["status"], "failed");
    }

    #[tokio::test]
    async fn vendors_and_dashboard_are_served() {
        let app = app().await;

        let (status, body) = send(&app, Method::GET, "/vendors?specialization=hvac", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 1);

        let (status, _) = send(
            &app,
            Method::POST,
            "/vendors",
            Some(json!({ "company_name": "QuickFix Plumbing", "specialization": "plumbing" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = send(&app, Method::GET, "/solutions?category=structural", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 3);

        let (status, body) = send(&app, Method::GET, "/dashboard/stats", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["total_requests"], 0);
        assert_eq!(body["data"]["monthly_trends"], json!([]));

        let (status, body) = send(&app, Method::GET, "/tenants", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["pagination"]["total_items"], 0);

        assert_eq!(body["data"]["monthly_trends"], json!([]));

        let (status, _) = send(&app, Method::GET, "/calendar", None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn calendar_summary_shows_the_booked_week() {
        let app = app().await;

        let (_, body) = send(
            &app,
            Method::POST,
            "/requests",
            Some(json!({
                "name": "Ari Tenant",
                "unit": "3D",
                "description": "Dishwasher leaves standing water"
            })),
        )
        .await;
        let id = body["data"]["request"]["id"].as_i64().unwrap();

        let (status, _) = send(
            &app,
            Method::POST,
            &format!("/requests/{id}/schedule"),
            Some(json!({ "scheduled_at": "2030-01-18T14:00:00Z" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) =
            send(&app, Method::GET, "/calendar/summary?week_of=2030-01-16", None).await;
        assert_eq!(status, StatusCode::OK);
        let data = &body["data"];
        assert_eq!(data["week_start"], "2030-01-14");
        assert_eq!(data["week"].as_array().unwrap().len(), 7);
        assert_eq!(data["week"][4]["weekday"], "Friday");
        assert_eq!(data["week"][4]["visits"][0]["id"], id);
        assert_eq!(data["monthly"], json!([{ "month": "2030-01", "count": 1 }]));

        let (status, _) =
            send(&app, Method::GET, "/calendar/summary?week_of=not-a-date", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
