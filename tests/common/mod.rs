#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request},
    Router,
};
use chrono::Utc;
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

use fulfillment_api::{
    auth::{hash_password, Caller, Role},
    config::AppConfig,
    db,
    entities::{packing_task, product, shipment, user, warehouse},
    events::{self, EventSender},
    services::{
        orders::{CreateOrderInput, OrderDetails, OrderItemInput},
        shipments::CreateShipmentInput,
    },
    AppState,
};

pub const TEST_PASSWORD: &str = "correct-horse-battery-staple";

/// Hashed once per test binary; argon2 is slow in debug builds.
static PASSWORD_HASH: Lazy<String> =
    Lazy::new(|| hash_password(TEST_PASSWORD).expect("hash test password"));

/// Catalogue prices of the products every tenant is seeded with.
pub fn prices() -> [Decimal; 5] {
    [dec!(5.00), dec!(12.50), dec!(10.00), dec!(20.00), dec!(25.00)]
}

/// One seeded tenant: a warehouse, five products and one user per role.
pub struct Tenant {
    pub company_id: Uuid,
    pub warehouse: warehouse::Model,
    pub products: Vec<product::Model>,
    pub admin: user::Model,
    pub manager: user::Model,
    pub inventory: user::Model,
    pub picker: user::Model,
    pub packer: user::Model,
    pub viewer: user::Model,
}

impl Tenant {
    pub fn caller(&self, user: &user::Model) -> Caller {
        Caller::new(user.id, user.role, user.company_id)
    }

    pub fn admin(&self) -> Caller {
        self.caller(&self.admin)
    }

    pub fn manager(&self) -> Caller {
        self.caller(&self.manager)
    }

    pub fn inventory(&self) -> Caller {
        self.caller(&self.inventory)
    }

    pub fn picker(&self) -> Caller {
        self.caller(&self.picker)
    }

    pub fn packer(&self) -> Caller {
        self.caller(&self.packer)
    }

    pub fn viewer(&self) -> Caller {
        self.caller(&self.viewer)
    }

    /// Product `n` counted from 1, so `product(3)` is priced `prices()[2]`.
    pub fn product(&self, n: usize) -> Uuid {
        self.products[n - 1].id
    }
}

/// Application state over a fresh in-memory SQLite database with two seeded tenants.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub tenant: Tenant,
    pub other: Tenant,
    pub super_admin: user::Model,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Like [`TestApp::new`], letting the caller adjust the configuration first.
    pub async fn with_config(adjust: impl FnOnce(&mut AppConfig)) -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "test_secret_key_for_testing_purposes_only_32chars".to_string(),
            3600,
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        // One connection keeps the in-memory database alive and serializes transactions.
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        adjust(&mut cfg);

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = Arc::new(EventSender::new(event_tx));
        let event_task = tokio::spawn(events::process_events(event_rx));

        let state = AppState::new(db_arc, cfg, event_sender);
        let router = fulfillment_api::build_router(state.clone());

        let tenant = seed_tenant(&state, "acme").await;
        let other = seed_tenant(&state, "globex").await;
        let super_admin = seed_user(&state, None, Role::SuperAdmin, "root@platform.test").await;

        Self {
            router,
            state,
            tenant,
            other,
            super_admin,
            _event_task: event_task,
        }
    }

    pub fn db(&self) -> &sea_orm::DatabaseConnection {
        &self.state.db
    }

    pub fn super_admin(&self) -> Caller {
        Caller::new(self.super_admin.id, Role::SuperAdmin, None)
    }

    /// Creates an order for `tenant` as its company admin; `lines` are `(product n, quantity)`.
    pub async fn create_order(&self, tenant: &Tenant, lines: &[(usize, i32)]) -> OrderDetails {
        let items = lines
            .iter()
            .map(|&(n, quantity)| OrderItemInput {
                product_id: tenant.product(n),
                quantity,
                unit_price: None,
            })
            .collect();
        self.state
            .services
            .orders
            .create_order(
                &tenant.admin(),
                CreateOrderInput {
                    customer_id: Uuid::new_v4(),
                    items,
                    notes: None,
                    shipping_address: Some("1 Dock Road".into()),
                },
            )
            .await
            .expect("order created")
    }

    pub async fn packing_task_for(&self, order_id: Uuid) -> packing_task::Model {
        packing_task::Entity::find()
            .filter(packing_task::Column::SalesOrderId.eq(order_id))
            .one(self.db())
            .await
            .expect("query packing task")
            .expect("order has a packing task")
    }

    /// Assigns the tenant's packer and completes packing, leaving the order `packed`.
    pub async fn pack(&self, tenant: &Tenant, order_id: Uuid) -> packing_task::Model {
        let packing = &self.state.services.packing;
        let task = self.packing_task_for(order_id).await;
        packing
            .assign_packer(&tenant.manager(), task.id, tenant.packer.id)
            .await
            .expect("packer assigned");
        packing
            .complete_packing(&tenant.packer(), task.id)
            .await
            .expect("packing completed")
    }

    pub async fn ship(&self, tenant: &Tenant, order_id: Uuid) -> shipment::Model {
        self.state
            .services
            .shipments
            .create_shipment(
                &tenant.packer(),
                CreateShipmentInput {
                    sales_order_id: order_id,
                    courier_name: "DHL".into(),
                    tracking_number: Some("JD0002".into()),
                    weight: Some(dec!(2.5)),
                    dispatch_date: None,
                    delivery_status: None,
                },
            )
            .await
            .expect("shipment created")
    }

    /// Takes a fresh order with `lines` all the way to `DELIVERED`.
    pub async fn delivered_order(
        &self,
        tenant: &Tenant,
        lines: &[(usize, i32)],
    ) -> (OrderDetails, shipment::Model) {
        let details = self.create_order(tenant, lines).await;
        self.pack(tenant, details.order.id).await;
        let shipped = self.ship(tenant, details.order.id).await;
        self.state
            .services
            .shipments
            .mark_delivered(&tenant.manager(), shipped.id)
            .await
            .expect("shipment delivered");
        (details, shipped)
    }

    pub fn token_for(&self, user: &user::Model) -> String {
        self.state
            .auth
            .issue_token(user)
            .expect("token issued")
            .access_token
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> axum::response::Response {
        self.request_with_headers(method, uri, body, token, &[]).await
    }

    pub async fn request_with_headers(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
        headers: &[(&str, &str)],
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }
}

pub async fn response_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).expect("response body is json")
}

async fn seed_tenant(state: &AppState, slug: &str) -> Tenant {
    let company_id = Uuid::new_v4();
    let db = &*state.db;

    let warehouse = warehouse::ActiveModel {
        id: Set(Uuid::new_v4()),
        company_id: Set(company_id),
        name: Set(format!("{} main", slug)),
        created_at: Set(Utc::now()),
    }
    .insert(db)
    .await
    .expect("seed warehouse");

    let mut products = Vec::new();
    for (index, price) in prices().into_iter().enumerate() {
        let created = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            company_id: Set(company_id),
            sku: Set(format!("{}-P{}", slug.to_uppercase(), index + 1)),
            name: Set(format!("Product {}", index + 1)),
            price: Set(price),
            created_at: Set(Utc::now()),
        }
        .insert(db)
        .await
        .expect("seed product");
        products.push(created);
    }

    let email = |role: &str| format!("{}@{}.test", role, slug);
    Tenant {
        company_id,
        warehouse,
        products,
        admin: seed_user(state, Some(company_id), Role::CompanyAdmin, &email("admin")).await,
        manager: seed_user(state, Some(company_id), Role::WarehouseManager, &email("manager")).await,
        inventory: seed_user(state, Some(company_id), Role::InventoryManager, &email("inventory"))
            .await,
        picker: seed_user(state, Some(company_id), Role::Picker, &email("picker")).await,
        packer: seed_user(state, Some(company_id), Role::Packer, &email("packer")).await,
        viewer: seed_user(state, Some(company_id), Role::Viewer, &email("viewer")).await,
    }
}

pub async fn seed_user(
    state: &AppState,
    company_id: Option<Uuid>,
    role: Role,
    email: &str,
) -> user::Model {
    let now = Utc::now();
    user::ActiveModel {
        id: Set(Uuid::new_v4()),
        company_id: Set(company_id),
        email: Set(email.to_string()),
        name: Set(email.split('@').next().unwrap_or(email).to_string()),
        password_hash: Set(PASSWORD_HASH.clone()),
        role: Set(role),
        active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&*state.db)
    .await
    .expect("seed user")
}
