use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront API",
        description = r#"
# Storefront Catalog API

Backend for an e-commerce storefront: catalog browsing with full-text
search and filtering, variant resolution, and bulk product import.

## Products

- Filtered, sorted and paginated listing with weighted full-text search
- Lookup by id or slug
- Related products by shared taxonomy
- Atomic bulk creation and CSV import (one row per SKU)

## Rate Limiting

Requests are rate-limited per caller identity with a sliding window.
Exceeding the limit yields HTTP 429.

## Errors

Failed requests return a consistent payload:

```json
{
  "error": "Not Found",
  "message": "Product with slug acme-solid-tee not found",
  "timestamp": "2025-08-25T10:30:00Z"
}
```
        "#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    paths(
        crate::handlers::products::list_products,
        crate::handlers::products::get_product_by_id,
        crate::handlers::products::get_product_by_slug,
        crate::handlers::products::get_related_products,
        crate::handlers::products::bulk_create_products,
        crate::handlers::products::import_products,
    ),
    components(schemas(
        crate::errors::ErrorResponse,
        crate::handlers::products::ProductListResponse,
        crate::handlers::products::CreateProductRequest,
        crate::handlers::products::CreateOptionRequest,
        crate::handlers::products::CreateVariantRequest,
        crate::handlers::products::ImportResponse,
        crate::models::product::CatalogProduct,
        crate::models::product::Offering,
        crate::models::product::ProductOption,
        crate::models::product::ProductVariant,
        crate::models::product::OptionValue,
        crate::models::product::BrandRef,
        crate::models::product::TaxonomyRef,
    )),
    tags(
        (name = "Products", description = "Catalog browsing, bulk creation and import")
    )
)]
pub struct ApiDoc;

/// Swagger UI mounted at `/docs`, serving the generated document at
/// `/api-docs/openapi.json`.
pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_includes_every_product_route() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&str> = doc.paths.paths.keys().map(String::as_str).collect();
        assert!(paths.contains(&"/api/v1/products"));
        assert!(paths.contains(&"/api/v1/products/{id}"));
        assert!(paths.contains(&"/api/v1/products/slug/{slug}"));
        assert!(paths.contains(&"/api/v1/products/{id}/related"));
        assert!(paths.contains(&"/api/v1/products/bulk"));
        assert!(paths.contains(&"/api/v1/products/import"));
    }
}
