use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use delivery_tracker::api::rest::router;
use delivery_tracker::state::AppState;
use serde_json::{json, Value};
use tower::ServiceExt;

fn setup() -> (axum::Router, Arc<AppState>) {
    // Fast ticks, no geocoder delay.
    let state = Arc::new(AppState::new(1024, 10, 0));
    (router(state.clone()), state)
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn delete_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn create_partner(app: &axum::Router, name: &str) -> String {
    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/partners",
            json!({ "name": name, "phone": "9000000000" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let partner = body_json(res).await;
    partner["id"].as_str().unwrap().to_string()
}

async fn create_order(app: &axum::Router) -> Value {
    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/orders",
            json!({
                "pickup_address": "MG Road, Bangalore",
                "delivery_address": "Whitefield, Bangalore",
                "package": { "size": "Small", "weight_kg": 2.0, "description": "books" },
                "recipient": { "name": "Asha", "phone": "9876543210" }
            }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    body_json(res).await
}

async fn partner_action(app: &axum::Router, order_id: &str, action: &str, partner_id: &str) -> axum::response::Response {
    app.clone()
        .oneshot(json_request(
            "POST",
            &format!("/orders/{order_id}/{action}"),
            json!({ "partner_id": partner_id }),
        ))
        .await
        .unwrap()
}

#[tokio::test]
async fn health_returns_ok() {
    let (app, _state) = setup();
    let response = app.oneshot(get_request("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["orders"], 0);
    assert_eq!(body["partners"], 0);
    assert_eq!(body["active_simulations"], 0);
}

#[tokio::test]
async fn metrics_returns_prometheus_format() {
    let (app, _state) = setup();
    let response = app.oneshot(get_request("/metrics")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.contains("text/plain"));

    let body = body_string(response).await;
    assert!(body.contains("orders_created_total"));
    assert!(body.contains("active_simulations"));
}

#[tokio::test]
async fn create_partner_empty_name_returns_400() {
    let (app, _state) = setup();
    let response = app
        .oneshot(json_request(
            "POST",
            "/partners",
            json!({ "name": "  ", "phone": "9000000000" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn create_order_prices_and_starts_pending() {
    let (app, _state) = setup();
    let order = create_order(&app).await;

    assert_eq!(order["status"], "Pending");
    assert!(order["partner_id"].is_null());
    assert_eq!(order["payment_method"], "CashOnDelivery");
    assert_eq!(order["payment_status"], "Pending");
    assert_eq!(order["otp_verified"], false);

    // small = 50 base, 2 kg = 20, distance charge = km * 5,
    // total = ceil(0.9 * subtotal)
    let distance = order["distance_km"].as_f64().unwrap();
    let expected = (0.9 * (50.0 + 20.0 + distance * 5.0)).ceil() as u64;
    assert_eq!(order["price"]["base_fare"], 50.0);
    assert_eq!(order["price"]["weight_charge"], 20.0);
    assert_eq!(order["price"]["total"].as_u64().unwrap(), expected);
}

#[tokio::test]
async fn create_order_invalid_phone_returns_400() {
    let (app, _state) = setup();
    let response = app
        .oneshot(json_request(
            "POST",
            "/orders",
            json!({
                "pickup_address": "Bangalore",
                "delivery_address": "Bangalore",
                "package": { "size": "Small", "weight_kg": 1.0, "description": "x" },
                "recipient": { "name": "Asha", "phone": "12ab" }
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn get_nonexistent_order_returns_404() {
    let (app, _state) = setup();
    let fake_id = "00000000-0000-0000-0000-000000000000";
    let response = app
        .oneshot(get_request(&format!("/orders/{fake_id}")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn new_order_has_tracking_record_at_pickup() {
    let (app, _state) = setup();
    let order = create_order(&app).await;
    let order_id = order["id"].as_str().unwrap();

    let res = app
        .oneshot(get_request(&format!("/orders/{order_id}/tracking")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let tracking = body_json(res).await;
    assert_eq!(tracking["progress"], 0);
    assert_eq!(tracking["status"], "Pending");
    assert_eq!(tracking["current_position"], tracking["pickup_coords"]);
    assert_eq!(tracking["route"].as_array().unwrap().len(), 8);
}

#[tokio::test]
async fn second_partner_cannot_claim_an_accepted_order() {
    let (app, _state) = setup();
    let order = create_order(&app).await;
    let order_id = order["id"].as_str().unwrap();
    let first = create_partner(&app, "Ravi").await;
    let second = create_partner(&app, "Meena").await;

    let res = partner_action(&app, order_id, "accept", &first).await;
    assert_eq!(res.status(), StatusCode::OK);
    let accepted = body_json(res).await;
    assert_eq!(accepted["status"], "Assigned");
    assert_eq!(accepted["partner_id"], first.as_str());

    let res = partner_action(&app, order_id, "accept", &second).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn otp_gates_delivery_completion() {
    let (app, _state) = setup();
    let order = create_order(&app).await;
    let order_id = order["id"].as_str().unwrap();
    let partner_id = create_partner(&app, "Ravi").await;

    // The code is not available before the delivery starts.
    let res = app
        .clone()
        .oneshot(get_request(&format!("/orders/{order_id}/otp")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    partner_action(&app, order_id, "accept", &partner_id).await;
    let res = partner_action(&app, order_id, "start", &partner_id).await;
    assert_eq!(res.status(), StatusCode::OK);
    let started = body_json(res).await;
    assert_eq!(started["status"], "InTransit");

    // Completion is a hard no without a verified code.
    let res = partner_action(&app, order_id, "complete", &partner_id).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = app
        .clone()
        .oneshot(get_request(&format!("/orders/{order_id}/otp")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let otp = body_json(res).await["otp"].as_str().unwrap().to_string();
    assert_eq!(otp.len(), 6);

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/orders/{order_id}/verify-otp"),
            json!({ "partner_id": partner_id, "otp": "000000" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/orders/{order_id}/verify-otp"),
            json!({ "partner_id": partner_id, "otp": otp }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = partner_action(&app, order_id, "complete", &partner_id).await;
    assert_eq!(res.status(), StatusCode::OK);
    let delivered = body_json(res).await;
    assert_eq!(delivered["status"], "Delivered");
    assert!(delivered["delivered_at"].is_string());

    let res = app
        .oneshot(get_request(&format!("/orders/{order_id}/tracking")))
        .await
        .unwrap();
    let tracking = body_json(res).await;
    assert_eq!(tracking["status"], "Delivered");
    assert_eq!(tracking["progress"], 100);
    assert_eq!(tracking["current_position"], tracking["delivery_coords"]);
}

#[tokio::test]
async fn payment_and_rating_after_delivery() {
    let (app, _state) = setup();
    let order = create_order(&app).await;
    let order_id = order["id"].as_str().unwrap();
    let partner_id = create_partner(&app, "Ravi").await;

    partner_action(&app, order_id, "accept", &partner_id).await;
    partner_action(&app, order_id, "start", &partner_id).await;
    let res = app
        .clone()
        .oneshot(get_request(&format!("/orders/{order_id}/otp")))
        .await
        .unwrap();
    let otp = body_json(res).await["otp"].as_str().unwrap().to_string();
    app.clone()
        .oneshot(json_request(
            "POST",
            &format!("/orders/{order_id}/verify-otp"),
            json!({ "partner_id": partner_id, "otp": otp }),
        ))
        .await
        .unwrap();
    partner_action(&app, order_id, "complete", &partner_id).await;

    // Rating before payment is fine; the two are independent.
    let res = partner_action(&app, order_id, "payment", &partner_id).await;
    assert_eq!(res.status(), StatusCode::OK);
    let paid = body_json(res).await;
    assert_eq!(paid["payment_status"], "Paid");

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/orders/{order_id}/rating"),
            json!({ "rating": 5, "comment": "quick" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let rated = body_json(res).await;
    assert_eq!(rated["rated"], true);
    assert_eq!(rated["rating"], 5);

    // Exactly once per order.
    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/orders/{order_id}/rating"),
            json!({ "rating": 1 }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = app
        .clone()
        .oneshot(get_request(&format!("/partners/{partner_id}")))
        .await
        .unwrap();
    let partner = body_json(res).await;
    assert_eq!(partner["rating_count"], 1);
    assert_eq!(partner["rating_avg"], 5.0);

    let res = app
        .oneshot(get_request(&format!("/partners/{partner_id}/ratings")))
        .await
        .unwrap();
    let log = body_json(res).await;
    assert_eq!(log.as_array().unwrap().len(), 1);
    assert_eq!(log[0]["order_id"], order_id);
}

#[tokio::test]
async fn partner_location_round_trips_through_store() {
    let (app, _state) = setup();
    let partner_id = create_partner(&app, "Ravi").await;

    let res = app
        .clone()
        .oneshot(json_request(
            "PATCH",
            &format!("/partners/{partner_id}/location"),
            json!({ "location": { "lat": 12.93, "lng": 77.62 } }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = app
        .oneshot(get_request(&format!("/partners/{partner_id}/location")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let location = body_json(res).await;
    assert_eq!(location["position"]["lat"], 12.93);
    assert_eq!(location["position"]["lng"], 77.62);
}

#[tokio::test]
async fn simulation_runs_to_delivered() {
    let (app, state) = setup();
    let order = create_order(&app).await;
    let order_id = order["id"].as_str().unwrap().to_string();

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/orders/{order_id}/simulate"),
            json!({ "speed_factor": 5 }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // A second start while one runs is refused.
    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/orders/{order_id}/simulate"),
            json!({ "speed_factor": 5 }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let tracking = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let res = app
                .clone()
                .oneshot(get_request(&format!("/orders/{order_id}/tracking")))
                .await
                .unwrap();
            let tracking = body_json(res).await;
            if tracking["status"] == "Delivered" {
                return tracking;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("simulation did not deliver in time");

    assert_eq!(tracking["progress"], 100);
    assert_eq!(tracking["current_position"], tracking["delivery_coords"]);
    assert_eq!(state.simulations.len(), 0);

    // The finished simulation cannot be stopped again.
    let res = app
        .oneshot(delete_request(&format!("/orders/{order_id}/simulate")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn simulation_can_be_stopped() {
    let (app, state) = setup();
    let order = create_order(&app).await;
    let order_id = order["id"].as_str().unwrap().to_string();

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/orders/{order_id}/simulate"),
            json!({ "speed_factor": 1 }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = app
        .clone()
        .oneshot(delete_request(&format!("/orders/{order_id}/simulate")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // The task unregisters itself once it observes the stop signal.
    tokio::time::timeout(Duration::from_secs(1), async {
        while !state.simulations.is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("stopped simulation did not clean up");

    let res = app
        .oneshot(get_request(&format!("/orders/{order_id}/tracking")))
        .await
        .unwrap();
    let tracking = body_json(res).await;
    assert!(tracking["progress"].as_u64().unwrap() < 100);
}

#[tokio::test]
async fn simulate_unknown_order_returns_404() {
    let (app, _state) = setup();
    let fake_id = "00000000-0000-0000-0000-000000000000";
    let res = app
        .oneshot(json_request(
            "POST",
            &format!("/orders/{fake_id}/simulate"),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}
