//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use api::AppState;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use checkout::services::{Address, VariationPrice};
use checkout::{CheckoutConfig, Clock, InMemoryCollaborators, ManualClock};
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use common::{AddressId, UserId};
use domain::{Coupon, Money};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use store::InMemoryStore;
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

struct TestApp {
    app: axum::Router,
    fakes: InMemoryCollaborators,
    clock: ManualClock,
    user_id: UserId,
    address_id: AddressId,
}

fn setup() -> TestApp {
    let fakes = InMemoryCollaborators::new("api_secret");
    fakes
        .catalog
        .add_variation("V-1", VariationPrice::at("P-1", Money::from_major(250), 10));
    fakes
        .coupons
        .add_coupon(Coupon::new("SAVE50", Money::from_major(50)));
    let user_id = UserId::new();
    let address_id = fakes
        .addresses
        .add_address(Address::new(user_id, "Asha", "12 MG Road"));

    let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 10, 18, 4, 0, 0).unwrap());
    let shared_clock: Arc<dyn Clock> = Arc::new(clock.clone());
    let state = Arc::new(AppState::new(
        InMemoryStore::new(),
        fakes.collaborators(),
        shared_clock,
        CheckoutConfig::default(),
        "memory",
    ));
    let app = api::create_app(state, get_metrics_handle());

    TestApp {
        app,
        fakes,
        clock,
        user_id,
        address_id,
    }
}

impl TestApp {
    async fn send(
        &self,
        method: &str,
        uri: &str,
        user: Option<UserId>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user_id) = user {
            builder = builder.header("x-user-id", user_id.to_string());
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    async fn place(&self, payment_type: &str) -> Value {
        let (status, json) = self
            .send(
                "POST",
                "/orders",
                Some(self.user_id),
                Some(json!({
                    "items": [{ "product_id": "P-1", "variation_id": "V-1", "quantity": 2 }],
                    "shipping_address_id": self.address_id,
                    "payment_type": payment_type,
                    "coupon_code": "SAVE50",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{json}");
        json
    }
}

fn money(value: &Value) -> Money {
    serde_json::from_value(value.clone()).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let t = setup();

    let (status, json) = t.send("GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["store"], "memory");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let t = setup();

    let response = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_create_order_requires_user_header() {
    let t = setup();

    let (status, json) = t
        .send(
            "POST",
            "/orders",
            None,
            Some(json!({
                "shipping_address_id": t.address_id,
                "payment_type": "COD",
            })),
        )
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(json["error"].as_str().unwrap().contains("x-user-id"));
}

#[tokio::test]
async fn test_create_and_get_order() {
    let t = setup();

    let created = t.place("COD").await;
    assert_eq!(created["order_code"], "202610180001");
    assert_eq!(money(&created["grand_total"]), Money::from_major(530));
    assert!(created["gateway_order_id"].is_null());

    let order_id = created["order_id"].as_str().unwrap();
    let (status, json) = t
        .send("GET", &format!("/orders/{order_id}"), Some(t.user_id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["order"]["order_code"], "202610180001");
    assert_eq!(json["payment"]["status"], "pending");
    assert_eq!(json["shipment"]["status"], "Pending");
    assert_eq!(json["items"].as_array().unwrap().len(), 1);

    // Another user cannot see it
    let (status, _) = t
        .send("GET", &format!("/orders/{order_id}"), Some(UserId::new()), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_order_from_saved_cart() {
    let t = setup();
    t.fakes.cart.set_cart(
        t.user_id,
        vec![domain::CartLine::new("P-1", "V-1", 1)],
    );

    let (status, json) = t
        .send(
            "POST",
            "/orders",
            Some(t.user_id),
            Some(json!({
                "shipping_address_id": t.address_id,
                "payment_type": "cod",
            })),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    // 250 plus flat shipping
    assert_eq!(money(&json["grand_total"]), Money::from_major(330));
}

#[tokio::test]
async fn test_create_order_validation_errors() {
    let t = setup();

    let (status, _) = t
        .send(
            "POST",
            "/orders",
            Some(t.user_id),
            Some(json!({
                "items": [],
                "shipping_address_id": t.address_id,
                "payment_type": "COD",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = t
        .send(
            "POST",
            "/orders",
            Some(t.user_id),
            Some(json!({
                "items": [{ "product_id": "P-1", "variation_id": "V-1", "quantity": 1 }],
                "shipping_address_id": AddressId::new(),
                "payment_type": "COD",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_gateway_failure_is_bad_gateway() {
    let t = setup();
    t.fakes.gateway.set_fail_on_create(true);

    let (status, json) = t
        .send(
            "POST",
            "/orders",
            Some(t.user_id),
            Some(json!({
                "items": [{ "product_id": "P-1", "variation_id": "V-1", "quantity": 1 }],
                "shipping_address_id": t.address_id,
                "payment_type": "Prepaid",
            })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(json["error"].is_string());

    let (_, list) = t.send("GET", "/orders", Some(t.user_id), None).await;
    assert_eq!(list["total"], 0);
}

#[tokio::test]
async fn test_verify_callback_flow() {
    let t = setup();
    let created = t.place("Prepaid").await;
    let gateway_order_id = created["gateway_order_id"].as_str().unwrap().to_string();
    let signature = t.fakes.gateway.sign(&gateway_order_id, "pay_001");
    let callback = json!({
        "razorpay_order_id": gateway_order_id,
        "razorpay_payment_id": "pay_001",
        "razorpay_signature": signature,
    });

    let (status, json) = t
        .send("POST", "/payments/verify", None, Some(callback.clone()))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["applied"], true);
    assert_eq!(json["payment_status"], "success");

    let (status, json) = t
        .send("POST", "/payments/verify", None, Some(callback))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["applied"], false);

    let order_id = created["order_id"].as_str().unwrap();
    let (status, logs) = t
        .send(
            "GET",
            &format!("/admin/orders/{order_id}/payment-logs"),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let statuses: Vec<_> = logs
        .as_array()
        .unwrap()
        .iter()
        .map(|log| log["status"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(statuses, vec!["success", "duplicate"]);
}

#[tokio::test]
async fn test_tampered_callback_is_unprocessable() {
    let t = setup();
    let created = t.place("Prepaid").await;
    let gateway_order_id = created["gateway_order_id"].as_str().unwrap();

    let (status, _) = t
        .send(
            "POST",
            "/payments/verify",
            None,
            Some(json!({
                "gateway_order_id": gateway_order_id,
                "gateway_payment_id": "pay_001",
                "signature": "00ff",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = t
        .send("POST", "/payments/verify", None, Some(json!({ "foo": 1 })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_cancel_payment() {
    let t = setup();
    let created = t.place("Prepaid").await;
    let gateway_order_id = created["gateway_order_id"].as_str().unwrap();

    let (status, _) = t
        .send(
            "POST",
            "/payments/cancel",
            Some(UserId::new()),
            Some(json!({ "gateway_order_id": gateway_order_id })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, json) = t
        .send(
            "POST",
            "/payments/cancel",
            Some(t.user_id),
            Some(json!({ "gateway_order_id": gateway_order_id })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["payment_status"], "cancelled");
}

#[tokio::test]
async fn test_admin_status_update_and_delete() {
    let t = setup();
    let created = t.place("COD").await;
    let order_id = created["order_id"].as_str().unwrap();
    let status_uri = format!("/admin/orders/{order_id}/status");

    let (status, _) = t.send("PATCH", &status_uri, None, Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = t
        .send(
            "PATCH",
            &status_uri,
            None,
            Some(json!({ "shipping_status": "Approved", "delivery_status": "delivered" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["invoice"]["invoice_no"], "INV-2026/10/18/101");

    let (status, _) = t
        .send(
            "PATCH",
            &status_uri,
            None,
            Some(json!({ "delivery_status": "pending" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = t
        .send("DELETE", &format!("/admin/orders/{order_id}"), None, None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = t
        .send("DELETE", &format!("/admin/orders/{order_id}"), None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_list_filters() {
    let t = setup();
    let first = t.place("COD").await;
    t.place("COD").await;

    let (status, json) = t
        .send("GET", "/admin/orders?limit=1&order_code=0001", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 1);
    assert_eq!(json["limit"], 1);
    assert_eq!(json["orders"][0]["order"]["id"], first["order_id"]);

    let (_, json) = t
        .send(
            "GET",
            &format!("/admin/orders?user_id={}", UserId::new()),
            None,
            None,
        )
        .await;
    assert_eq!(json["total"], 0);

    let (status, _) = t.send("GET", "/admin/orders/not-a-uuid/payment-logs", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_admin_sweep() {
    let t = setup();
    let created = t.place("Prepaid").await;

    t.clock.advance(ChronoDuration::minutes(10));
    let (status, json) = t.send("POST", "/admin/payments/sweep", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["auto_cancelled"], 1);

    let order_id = created["order_id"].as_str().unwrap();
    let (_, order) = t
        .send("GET", &format!("/orders/{order_id}"), Some(t.user_id), None)
        .await;
    assert_eq!(order["payment"]["status"], "failed");
    assert_eq!(order["order"]["delivery_status"], "cancelled");
    assert_eq!(order["shipment"]["status"], "Cancelled");
}

#[tokio::test]
async fn test_coupons() {
    let t = setup();

    let (status, json) = t.send("GET", "/coupons", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json[0]["code"], "SAVE50");

    let (status, json) = t
        .send("POST", "/coupons/validate", None, Some(json!({ "code": "SAVE50" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(money(&json["value"]), Money::from_major(50));

    let (status, json) = t
        .send("POST", "/coupons/validate", None, Some(json!({ "code": "NOPE" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("NOPE"));
}
