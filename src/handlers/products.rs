use crate::handlers::common::{created_response, map_service_error, success_response, validate_input};
use crate::import;
use crate::models::product::{
    CatalogProduct, CreateOptionInput, CreateProductInput, CreateVariantInput,
    MAX_OPTIONS_PER_PRODUCT,
};
use crate::services::product_service::{
    ProductFilter, ProductLookup, SortBy, SortOrder, MAX_PAGE_SIZE, MAX_RELATED_PRODUCTS,
};
use crate::{errors::ApiError, AppState};
use axum::{
    extract::{Json, Path, Query, State},
    routing::{get, post},
    Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

const DEFAULT_PAGE: u64 = 1;
const DEFAULT_LIMIT: u64 = 30;
const DEFAULT_MAX_PRICE_DOLLARS: i64 = 5000;
const DEFAULT_RELATED_LIMIT: u64 = 10;

/// Creates the router for product endpoints
pub fn products_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products))
        .route("/bulk", post(bulk_create_products))
        .route("/import", post(import_products))
        .route("/slug/:slug", get(get_product_by_slug))
        .route("/:id", get(get_product_by_id))
        .route("/:id/related", get(get_related_products))
}

/// Listing query string. Out-of-range values are clamped, not rejected.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListProductsQuery {
    /// 1-based page number (floor 1)
    pub page: Option<u64>,
    /// Page size, clamped to [1, 30]
    pub limit: Option<u64>,
    /// Full-text search over title and description
    pub search: Option<String>,
    /// Comma-joined brand UUIDs
    pub brand_ids: Option<String>,
    /// Lower price bound in dollars (0 = unbounded)
    pub min_price: Option<Decimal>,
    /// Upper price bound in dollars (ceiling 5000)
    pub max_price: Option<Decimal>,
    pub category_id: Option<String>,
    pub subcategory_id: Option<String>,
    pub product_type_id: Option<String>,
    pub is_available: Option<bool>,
    /// `price` or `createdAt` (default)
    pub sort_by: Option<String>,
    /// `asc` or `desc` (default)
    pub sort_order: Option<String>,
}

impl ListProductsQuery {
    fn into_filter(self) -> Result<ProductFilter, ApiError> {
        let brand_ids = match self.brand_ids.as_deref().filter(|s| !s.trim().is_empty()) {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    Uuid::parse_str(s).map_err(|_| {
                        ApiError::ValidationError(format!("Invalid brand id: {}", s))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };

        let sort_by = match self.sort_by.as_deref() {
            None | Some("createdAt") => SortBy::CreatedAt,
            Some("price") => SortBy::Price,
            Some(other) => {
                return Err(ApiError::ValidationError(format!(
                    "Invalid sort_by: {} (expected price or createdAt)",
                    other
                )))
            }
        };
        let sort_order = match self.sort_order.as_deref() {
            None | Some("desc") => SortOrder::Desc,
            Some("asc") => SortOrder::Asc,
            Some(other) => {
                return Err(ApiError::ValidationError(format!(
                    "Invalid sort_order: {} (expected asc or desc)",
                    other
                )))
            }
        };

        let zero = Decimal::ZERO;
        let ceiling = Decimal::from(DEFAULT_MAX_PRICE_DOLLARS);
        let min_price = self.min_price.unwrap_or(zero).max(zero);
        let max_price = self.max_price.unwrap_or(ceiling).clamp(zero, ceiling);

        Ok(ProductFilter {
            page: self.page.unwrap_or(DEFAULT_PAGE).max(1),
            limit: self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_PAGE_SIZE),
            search: self.search.filter(|s| !s.trim().is_empty()),
            brand_ids,
            min_price: Some(min_price),
            max_price: Some(max_price),
            category_id: self.category_id.filter(|s| !s.is_empty()),
            subcategory_id: self.subcategory_id.filter(|s| !s.is_empty()),
            product_type_id: self.product_type_id.filter(|s| !s.is_empty()),
            is_available: self.is_available,
            sort_by,
            sort_order,
        })
    }
}

/// One page of products and the total match count.
#[derive(Debug, Serialize, ToSchema)]
pub struct ProductListResponse {
    pub data: Vec<CatalogProduct>,
    pub count: u64,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct GetProductQuery {
    pub is_available: Option<bool>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct RelatedProductsQuery {
    /// Result cap, default 10, max 12
    pub limit: Option<u64>,
}

/// Option input of a bulk-create request.
#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
pub struct CreateOptionRequest {
    #[validate(length(min = 1, message = "option name is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "option needs at least one value"))]
    pub values: Vec<String>,
}

/// Variant input of a bulk-create request; combinations are keyed by
/// option name and value name.
#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
pub struct CreateVariantRequest {
    pub combinations: HashMap<String, String>,
    #[validate(range(min = 0, message = "price cannot be negative"))]
    pub price: i32,
    #[validate(range(min = 0, message = "compare_at_price cannot be negative"))]
    pub compare_at_price: Option<i32>,
    #[validate(range(min = 0, message = "quantity cannot be negative"))]
    pub quantity: i32,
    pub weight: Option<i32>,
    pub length: Option<i32>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub origin_country: Option<String>,
    pub hs_code: Option<String>,
}

/// One product of a bulk-create request.
#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, message = "title is required"))]
    pub title: String,
    pub description: Option<String>,
    pub brand_id: Uuid,
    #[serde(default = "default_true")]
    pub is_available: bool,
    #[validate(length(min = 1, message = "at least one image is required"))]
    pub image_urls: Vec<String>,
    #[validate(length(min = 1, message = "category_id is required"))]
    pub category_id: String,
    #[validate(length(min = 1, message = "subcategory_id is required"))]
    pub subcategory_id: String,
    #[validate(length(min = 1, message = "product_type_id is required"))]
    pub product_type_id: String,
    /// Integer cents
    #[validate(range(min = 0, message = "price cannot be negative"))]
    pub price: Option<i32>,
    #[validate(range(min = 0, message = "compare_at_price cannot be negative"))]
    pub compare_at_price: Option<i32>,
    #[validate(range(min = 0, message = "quantity cannot be negative"))]
    pub quantity: Option<i32>,
    pub weight: Option<i32>,
    pub length: Option<i32>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub origin_country: Option<String>,
    pub hs_code: Option<String>,
    #[validate(length(max = 70, message = "meta_title is limited to 70 characters"))]
    pub meta_title: Option<String>,
    #[validate(length(max = 160, message = "meta_description is limited to 160 characters"))]
    pub meta_description: Option<String>,
    #[serde(default)]
    pub meta_keywords: Vec<String>,
    #[serde(default)]
    #[validate]
    pub options: Vec<CreateOptionRequest>,
    #[serde(default)]
    #[validate]
    pub variants: Vec<CreateVariantRequest>,
}

fn default_true() -> bool {
    true
}

impl CreateProductRequest {
    fn into_input(self) -> Result<CreateProductInput, ApiError> {
        if self.options.len() > MAX_OPTIONS_PER_PRODUCT {
            return Err(ApiError::ValidationError(format!(
                "Product {} has more than {} options",
                self.title, MAX_OPTIONS_PER_PRODUCT
            )));
        }
        Ok(CreateProductInput {
            title: self.title,
            description: self.description,
            brand_id: self.brand_id,
            is_available: self.is_available,
            image_urls: self.image_urls,
            category_id: self.category_id,
            subcategory_id: self.subcategory_id,
            product_type_id: self.product_type_id,
            price: self.price,
            compare_at_price: self.compare_at_price,
            quantity: self.quantity,
            weight: self.weight,
            length: self.length,
            width: self.width,
            height: self.height,
            origin_country: self.origin_country,
            hs_code: self.hs_code,
            meta_title: self.meta_title,
            meta_description: self.meta_description,
            meta_keywords: self.meta_keywords,
            options: self
                .options
                .into_iter()
                .map(|o| CreateOptionInput {
                    name: o.name,
                    values: o.values,
                })
                .collect(),
            variants: self
                .variants
                .into_iter()
                .map(|v| CreateVariantInput {
                    combinations: v.combinations,
                    price: v.price,
                    compare_at_price: v.compare_at_price,
                    quantity: v.quantity,
                    weight: v.weight,
                    length: v.length,
                    width: v.width,
                    height: v.height,
                    origin_country: v.origin_country,
                    hs_code: v.hs_code,
                })
                .collect(),
        })
    }
}

/// Result of a CSV import.
#[derive(Debug, Serialize, ToSchema)]
pub struct ImportResponse {
    pub created: usize,
    pub ids: Vec<Uuid>,
}

/// List products with filtering, search, sorting and pagination
#[utoipa::path(
    get,
    path = "/api/v1/products",
    params(ListProductsQuery),
    responses(
        (status = 200, description = "Matching products with total count", body = ProductListResponse),
        (status = 400, description = "Invalid query parameters", body = crate::errors::ErrorResponse)
    ),
    tag = "Products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ListProductsQuery>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let filter = query.into_filter()?;
    let page = state
        .product_service
        .list_products(&filter)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(ProductListResponse {
        data: page.data,
        count: page.count,
    }))
}

/// Get a product by id
#[utoipa::path(
    get,
    path = "/api/v1/products/{id}",
    params(
        ("id" = Uuid, Path, description = "Product id"),
        GetProductQuery
    ),
    responses(
        (status = 200, description = "The product", body = CatalogProduct),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Products"
)]
pub async fn get_product_by_id(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<GetProductQuery>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let lookup = ProductLookup {
        id: Some(id),
        slug: None,
        is_available: query.is_available,
    };
    let product = state
        .product_service
        .get_product(&lookup)
        .await
        .map_err(map_service_error)?
        .ok_or_else(|| ApiError::NotFound(format!("Product with id {} not found", id)))?;

    Ok(success_response(product))
}

/// Get a product by slug
#[utoipa::path(
    get,
    path = "/api/v1/products/slug/{slug}",
    params(
        ("slug" = String, Path, description = "Product slug"),
        GetProductQuery
    ),
    responses(
        (status = 200, description = "The product", body = CatalogProduct),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Products"
)]
pub async fn get_product_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<GetProductQuery>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let lookup = ProductLookup {
        id: None,
        slug: Some(slug.clone()),
        is_available: query.is_available,
    };
    let product = state
        .product_service
        .get_product(&lookup)
        .await
        .map_err(map_service_error)?
        .ok_or_else(|| ApiError::NotFound(format!("Product with slug {} not found", slug)))?;

    Ok(success_response(product))
}

/// Products related to the given one by shared taxonomy
#[utoipa::path(
    get,
    path = "/api/v1/products/{id}/related",
    params(
        ("id" = Uuid, Path, description = "Source product id"),
        RelatedProductsQuery
    ),
    responses(
        (status = 200, description = "Related products", body = Vec<CatalogProduct>)
    ),
    tag = "Products"
)]
pub async fn get_related_products(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<RelatedProductsQuery>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_RELATED_LIMIT)
        .clamp(1, MAX_RELATED_PRODUCTS);
    let related = state
        .product_service
        .get_related_products(id, limit)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(related))
}

/// Create a batch of products atomically
#[utoipa::path(
    post,
    path = "/api/v1/products/bulk",
    request_body = Vec<CreateProductRequest>,
    responses(
        (status = 201, description = "Created products", body = Vec<CatalogProduct>),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse)
    ),
    tag = "Products"
)]
pub async fn bulk_create_products(
    State(state): State<AppState>,
    Json(payload): Json<Vec<CreateProductRequest>>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    if state.config.disable_product_creation {
        return Err(ApiError::ValidationError(
            "Product creation is disabled".into(),
        ));
    }

    let mut inputs = Vec::with_capacity(payload.len());
    for request in payload {
        validate_input(&request)?;
        inputs.push(request.into_input()?);
    }

    let created = state
        .product_service
        .bulk_create_products(inputs)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(created))
}

/// Import products from a CSV body (one row per SKU)
#[utoipa::path(
    post,
    path = "/api/v1/products/import",
    request_body(content = String, content_type = "text/csv"),
    responses(
        (status = 201, description = "Import result", body = ImportResponse),
        (status = 400, description = "Malformed CSV or unresolvable reference", body = crate::errors::ErrorResponse)
    ),
    tag = "Products"
)]
pub async fn import_products(
    State(state): State<AppState>,
    body: String,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    if state.config.disable_product_creation {
        return Err(ApiError::ValidationError(
            "Product creation is disabled".into(),
        ));
    }

    let inputs = import::normalize_csv(&body, &state.catalog).map_err(map_service_error)?;
    let created = state
        .product_service
        .bulk_create_products(inputs)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(ImportResponse {
        created: created.len(),
        ids: created.iter().map(|p| p.id).collect(),
    }))
}
