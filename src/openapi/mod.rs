use axum::response::Json;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::handlers;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Fulfillment API",
        version = "1.0.0",
        description = r#"
# Warehouse fulfillment API

Multi-tenant order fulfillment: sales orders, pick lists, packing tasks, shipments,
return authorizations (RMA) and stock levels.

## Authentication

Every `/api/v1` endpoint requires a bearer token from `POST /auth/login`:

```
Authorization: Bearer <your-jwt-token>
```

Super admins select the tenant they act for with the `X-Company-Id` header.

## Errors

Errors share one shape with a stable `kind` (`not_found`, `invalid_state`,
`precondition_failed`, `validation_error`, `forbidden`, ...).

## Pagination

List endpoints take `page` (1-based) and `limit`.
        "#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers((url = "http://localhost:8080", description = "Local development")),
    modifiers(&BearerAuth),
    tags(
        (name = "auth", description = "Login and identity"),
        (name = "orders", description = "Sales order endpoints"),
        (name = "picking", description = "Pick list endpoints"),
        (name = "packing", description = "Packing task endpoints"),
        (name = "shipments", description = "Shipment endpoints"),
        (name = "returns", description = "Return authorization endpoints"),
        (name = "stock", description = "Stock level endpoints"),
        (name = "users", description = "User administration"),
        (name = "health", description = "Health check endpoints")
    ),
    paths(
        // Auth
        handlers::auth::login,
        handlers::auth::whoami,
        // Orders
        handlers::orders::list_orders,
        handlers::orders::get_order,
        handlers::orders::create_order,
        handlers::orders::update_order,
        handlers::orders::delete_order,
        handlers::orders::get_order_pick_list,
        // Picking
        handlers::pick_lists::list_pick_lists,
        handlers::pick_lists::get_pick_list,
        handlers::pick_lists::assign_picker,
        handlers::pick_lists::start_picking,
        handlers::pick_lists::complete_picking,
        handlers::pick_lists::record_pick,
        // Packing
        handlers::packing::list_packing_tasks,
        handlers::packing::get_packing_task,
        handlers::packing::assign_packer,
        handlers::packing::start_packing,
        handlers::packing::complete_packing,
        // Shipments
        handlers::shipments::list_shipments,
        handlers::shipments::get_shipment,
        handlers::shipments::create_shipment,
        handlers::shipments::update_shipment,
        handlers::shipments::mark_delivered,
        // Returns
        handlers::returns::list_returns,
        handlers::returns::get_return,
        handlers::returns::create_return,
        handlers::returns::mark_awaiting_return,
        handlers::returns::receive_item,
        handlers::returns::start_inspection,
        handlers::returns::inspect_return,
        handlers::returns::process_refund,
        handlers::returns::close_return,
        // Stock
        handlers::stock::get_stock_level,
        handlers::stock::adjust_stock,
        // Users
        handlers::users::create_user,
        handlers::users::list_users,
        // Health
        crate::health::health_check,
    ),
    components(
        schemas(
            crate::errors::ErrorResponse,
            crate::entities::sales_order::OrderStatus,
            crate::entities::pick_list::PickListStatus,
            crate::entities::packing_task::PackingStatus,
            crate::entities::shipment::DeliveryStatus,
            crate::entities::return_authorization::ReturnStatus,
            crate::auth::Role,
        )
    )
)]
pub struct ApiDocV1;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

/// Serves the generated document at `/api-docs/openapi.json`.
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDocV1::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_fulfillment_paths() {
        let json = serde_json::to_string(&ApiDocV1::openapi()).expect("openapi serializes");
        assert!(json.contains("Fulfillment API"));
        assert!(json.contains("/api/v1/orders"));
        assert!(json.contains("/api/v1/returns/:id/refund"));
        assert!(json.contains("bearer_auth"));
    }
}
