use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "ERP Fulfillment API",
        version = "1.0.0",
        description = r#"
# ERP Fulfillment API

Order creation, delivery assignment, return processing and return disposition.
Every mutating endpoint runs as a single transaction: it either commits all of
its writes or none of them.

## Authentication

Every `/api/v1` endpoint requires a bearer JWT whose `role` claim is one of
`Admin`, `Warehouse` or `Sale`:

```
Authorization: Bearer <your-jwt-token>
```

## Error Handling

Failures share one body shape:

```json
{
  "error": "Bad Request",
  "message": "Insufficient stock for product 7: requested 3, available 1",
  "request_id": "req-abc123xyz",
  "timestamp": "2024-01-01T00:00:00Z"
}
```

Validation and business conflicts return 400, missing or ineligible rows
return 404, and store failures return 500 with a generic message.
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "orders", description = "Order creation and tracking"),
        (name = "deliveries", description = "Driver and truck dispatch"),
        (name = "returns", description = "Return processing and disposition")
    ),
    paths(
        // Orders
        crate::handlers::orders::create_order,
        crate::handlers::orders::get_order,
        crate::handlers::orders::update_order_status,

        // Deliveries
        crate::handlers::deliveries::create_delivery,
        crate::handlers::deliveries::get_delivery,
        crate::handlers::deliveries::update_delivery_status,

        // Returns
        crate::handlers::returns::process_returns,
        crate::handlers::returns::assign_service_center,
        crate::handlers::returns::update_return_status,
        crate::handlers::returns::service_center_queue,
    ),
    components(
        schemas(
            crate::ApiResponse<serde_json::Value>,
            crate::handlers::common::StatusUpdateRequest,

            // Order types
            crate::commands::orders::CreateOrderCommand,
            crate::commands::orders::OrderLineRequest,
            crate::commands::orders::CreateOrderResult,
            crate::commands::orders::CreatedOrderItem,
            crate::commands::orders::UpdateOrderStatusResult,
            crate::services::orders::OrderDetails,
            crate::services::orders::OrderItemDetails,

            // Delivery types
            crate::handlers::deliveries::CreateDeliveryRequest,
            crate::commands::deliveries::CreateDeliveryResult,
            crate::commands::deliveries::UpdateDeliveryStatusResult,
            crate::services::deliveries::DeliveryDetails,

            // Return types
            crate::commands::returns::ReturnRequest,
            crate::commands::returns::ProcessedReturn,
            crate::commands::returns::ProcessReturnsResult,
            crate::commands::returns::AssignServiceCenterCommand,
            crate::commands::returns::AssignServiceCenterResult,
            crate::commands::returns::UpdateReturnStatusResult,
            crate::handlers::returns::ServiceCenterQueue,
            crate::services::returns::ServiceCenterQueueEntry,

            // Error types
            crate::errors::ErrorResponse
        )
    ),
    modifiers(&BearerAuth)
)]
pub struct ApiDocV1;

/// Registers the `Bearer` scheme referenced by every secured path
pub struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "Bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_every_workflow_route() {
        let openapi = ApiDocV1::openapi();
        let json = serde_json::to_string_pretty(&openapi).unwrap();
        assert!(json.contains("ERP Fulfillment API"));
        for path in [
            "/api/v1/orders",
            "/api/v1/orders/{id}/status",
            "/api/v1/deliveries",
            "/api/v1/returns",
            "/api/v1/returns/assign-service-center",
            "/api/v1/returns/service-center-queue",
        ] {
            assert!(json.contains(path), "missing {path}");
        }
    }

    #[test]
    fn bearer_scheme_is_registered() {
        let openapi = ApiDocV1::openapi();
        let components = openapi.components.expect("components");
        assert!(components.security_schemes.contains_key("Bearer"));
    }
}
