mod common;

use axum::http::{Method, StatusCode};
use common::{response_json, TestApp, TEST_PASSWORD};
use serde_json::json;

#[tokio::test]
async fn health_and_docs_are_public() {
    let app = TestApp::new().await;

    let health = app.request(Method::GET, "/health", None, None).await;
    assert_eq!(health.status(), StatusCode::OK);
    let live = app.request(Method::GET, "/health/live", None, None).await;
    assert_eq!(live.status(), StatusCode::OK);

    let docs = app
        .request(Method::GET, "/api-docs/openapi.json", None, None)
        .await;
    assert_eq!(docs.status(), StatusCode::OK);
    let body = response_json(docs).await;
    assert!(body["paths"]["/api/v1/orders"].is_object());
    assert!(body["paths"]["/api/v1/returns/:id/refund"].is_object());
}

#[tokio::test]
async fn api_requires_a_bearer_token() {
    let app = TestApp::new().await;

    let anonymous = app.request(Method::GET, "/api/v1/orders", None, None).await;
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
    let body = response_json(anonymous).await;
    assert_eq!(body["kind"], "unauthorized");

    let garbage = app
        .request(Method::GET, "/api/v1/orders", None, Some("not-a-jwt"))
        .await;
    assert_eq!(garbage.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_issues_a_usable_token() {
    let app = TestApp::new().await;

    let wrong = app
        .request(
            Method::POST,
            "/auth/login",
            Some(json!({ "email": "admin@acme.test", "password": "nope-nope" })),
            None,
        )
        .await;
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

    let empty = app
        .request(
            Method::POST,
            "/auth/login",
            Some(json!({ "email": " ", "password": "" })),
            None,
        )
        .await;
    assert_eq!(empty.status(), StatusCode::BAD_REQUEST);

    let ok = app
        .request(
            Method::POST,
            "/auth/login",
            Some(json!({ "email": "Admin@Acme.test", "password": TEST_PASSWORD })),
            None,
        )
        .await;
    assert_eq!(ok.status(), StatusCode::OK);
    let body = response_json(ok).await;
    let token = body["data"]["access_token"]
        .as_str()
        .expect("access token")
        .to_string();
    assert_eq!(body["data"]["token_type"], "Bearer");

    let me = app
        .request(Method::GET, "/api/v1/auth/me", None, Some(&token))
        .await;
    assert_eq!(me.status(), StatusCode::OK);
    let me = response_json(me).await;
    assert_eq!(me["data"]["user_id"], app.tenant.admin.id.to_string());
    assert_eq!(me["data"]["role"], "company_admin");
    assert_eq!(me["data"]["company_id"], app.tenant.company_id.to_string());
}

#[tokio::test]
async fn order_lifecycle_over_http() {
    let app = TestApp::new().await;
    let admin = app.token_for(&app.tenant.admin);
    let manager = app.token_for(&app.tenant.manager);
    let packer = app.token_for(&app.tenant.packer);

    let created = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "customer_id": uuid::Uuid::new_v4(),
                "items": [
                    { "product_id": app.tenant.product(3), "quantity": 2 },
                    { "product_id": app.tenant.product(5), "quantity": 1 }
                ]
            })),
            Some(&admin),
        )
        .await;
    assert_eq!(created.status(), StatusCode::CREATED);
    let order = response_json(created).await;
    let order_id = order["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(order["success"], true);
    assert_eq!(order["data"]["status"], "pick_list_created");
    assert_eq!(order["data"]["order_number"], "SO-000001");
    assert_eq!(order["data"]["items"].as_array().unwrap().len(), 2);

    let pick_list = app
        .request(
            Method::GET,
            &format!("/api/v1/orders/{}/pick-list", order_id),
            None,
            Some(&manager),
        )
        .await;
    assert_eq!(pick_list.status(), StatusCode::OK);
    let pick_list = response_json(pick_list).await;
    assert_eq!(pick_list["data"]["items"].as_array().unwrap().len(), 2);

    let task = app
        .packing_task_for(order_id.parse().unwrap())
        .await;
    let assigned = app
        .request(
            Method::POST,
            &format!("/api/v1/packing-tasks/{}/assign", task.id),
            Some(json!({ "packer_id": app.tenant.packer.id })),
            Some(&manager),
        )
        .await;
    assert_eq!(assigned.status(), StatusCode::OK);

    let early_ship = app
        .request(
            Method::POST,
            "/api/v1/shipments",
            Some(json!({ "sales_order_id": order_id, "courier_name": "DHL" })),
            Some(&packer),
        )
        .await;
    assert_eq!(early_ship.status(), StatusCode::PRECONDITION_FAILED);
    assert_eq!(response_json(early_ship).await["kind"], "precondition_failed");

    let packed = app
        .request(
            Method::POST,
            &format!("/api/v1/packing-tasks/{}/complete", task.id),
            None,
            Some(&packer),
        )
        .await;
    assert_eq!(packed.status(), StatusCode::OK);

    let shipped = app
        .request(
            Method::POST,
            "/api/v1/shipments",
            Some(json!({ "sales_order_id": order_id, "courier_name": "DHL" })),
            Some(&packer),
        )
        .await;
    assert_eq!(shipped.status(), StatusCode::CREATED);
    let shipment_id = response_json(shipped).await["data"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let delivered = app
        .request(
            Method::POST,
            &format!("/api/v1/shipments/{}/deliver", shipment_id),
            None,
            Some(&manager),
        )
        .await;
    assert_eq!(delivered.status(), StatusCode::OK);

    let order = app
        .request(
            Method::GET,
            &format!("/api/v1/orders/{}", order_id),
            None,
            Some(&admin),
        )
        .await;
    assert_eq!(response_json(order).await["data"]["status"], "DELIVERED");

    let rma = app
        .request(
            Method::POST,
            "/api/v1/returns",
            Some(json!({
                "sales_order_id": order_id,
                "shipment_id": shipment_id,
                "reason": "Wrong size"
            })),
            Some(&manager),
        )
        .await;
    assert_eq!(rma.status(), StatusCode::CREATED);
    let rma = response_json(rma).await;
    assert_eq!(rma["data"]["status"], "RMA_CREATED");
    let rma_id = rma["data"]["id"].as_str().unwrap().to_string();

    let refund = app
        .request(
            Method::POST,
            &format!("/api/v1/returns/{}/refund", rma_id),
            Some(json!({ "amount": "45.00" })),
            Some(&admin),
        )
        .await;
    assert_eq!(refund.status(), StatusCode::CONFLICT);
    assert_eq!(response_json(refund).await["kind"], "invalid_state");
}

#[tokio::test]
async fn errors_share_one_shape() {
    let app = TestApp::new().await;
    let viewer = app.token_for(&app.tenant.viewer);

    let missing = app
        .request(
            Method::GET,
            &format!("/api/v1/orders/{}", uuid::Uuid::new_v4()),
            None,
            Some(&viewer),
        )
        .await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    assert!(missing.headers().contains_key("x-request-id"));
    let body = response_json(missing).await;
    assert_eq!(body["kind"], "not_found");
    assert!(body["message"].as_str().unwrap().contains("not found"));
    assert!(body["timestamp"].is_string());

    let forbidden = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(json!({ "customer_id": uuid::Uuid::new_v4(), "items": [] })),
            Some(&viewer),
        )
        .await;
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);
    assert_eq!(response_json(forbidden).await["kind"], "forbidden");
}

#[tokio::test]
async fn super_admin_selects_a_company_by_header() {
    let app = TestApp::new().await;
    let root = app.token_for(&app.super_admin);
    let company = app.tenant.company_id.to_string();
    let body = json!({ "customer_id": uuid::Uuid::new_v4(), "items": [] });

    let unscoped = app
        .request(Method::POST, "/api/v1/orders", Some(body.clone()), Some(&root))
        .await;
    assert_eq!(unscoped.status(), StatusCode::BAD_REQUEST);

    let scoped = app
        .request_with_headers(
            Method::POST,
            "/api/v1/orders",
            Some(body),
            Some(&root),
            &[("x-company-id", company.as_str())],
        )
        .await;
    assert_eq!(scoped.status(), StatusCode::CREATED);

    let (orders, _) = app
        .state
        .services
        .orders
        .list_orders(&app.tenant.viewer(), None, 1, 20)
        .await
        .unwrap();
    assert_eq!(orders.len(), 1);
}

#[tokio::test]
async fn admins_create_users_who_can_log_in() {
    let app = TestApp::new().await;
    let admin = app.token_for(&app.tenant.admin);

    let created = app
        .request(
            Method::POST,
            "/api/v1/users",
            Some(json!({
                "email": "Night.Picker@acme.test",
                "name": "Night Picker",
                "password": "hunter2hunter2",
                "role": "picker"
            })),
            Some(&admin),
        )
        .await;
    assert_eq!(created.status(), StatusCode::CREATED);
    let user = response_json(created).await;
    assert_eq!(user["data"]["email"], "night.picker@acme.test");
    assert!(user["data"].get("password_hash").is_none());

    let duplicate = app
        .request(
            Method::POST,
            "/api/v1/users",
            Some(json!({
                "email": "night.picker@acme.test",
                "name": "Again",
                "password": "hunter2hunter2",
                "role": "picker"
            })),
            Some(&admin),
        )
        .await;
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);

    let login = app
        .request(
            Method::POST,
            "/auth/login",
            Some(json!({ "email": "night.picker@acme.test", "password": "hunter2hunter2" })),
            None,
        )
        .await;
    assert_eq!(login.status(), StatusCode::OK);

    let picker = app.token_for(&app.tenant.picker);
    let not_admin = app
        .request(Method::GET, "/api/v1/users", None, Some(&picker))
        .await;
    assert_eq!(not_admin.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn stock_endpoints_adjust_and_report() {
    let app = TestApp::new().await;
    let inventory = app.token_for(&app.tenant.inventory);
    let product = app.tenant.product(1);
    let warehouse = app.tenant.warehouse.id;

    let adjusted = app
        .request(
            Method::POST,
            "/api/v1/stock/adjust",
            Some(json!({ "product_id": product, "warehouse_id": warehouse, "delta": 12 })),
            Some(&inventory),
        )
        .await;
    assert_eq!(adjusted.status(), StatusCode::OK);
    assert_eq!(response_json(adjusted).await["data"]["available"], 12);

    let short = app
        .request(
            Method::POST,
            "/api/v1/stock/adjust",
            Some(json!({ "product_id": product, "warehouse_id": warehouse, "delta": -20 })),
            Some(&inventory),
        )
        .await;
    assert_eq!(short.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let level = app
        .request(
            Method::GET,
            &format!("/api/v1/stock/{}/{}", product, warehouse),
            None,
            Some(&inventory),
        )
        .await;
    assert_eq!(level.status(), StatusCode::OK);
    assert_eq!(response_json(level).await["data"]["quantity"], 12);
}
