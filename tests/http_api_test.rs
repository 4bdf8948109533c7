mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use common::setup_state;
use serde_json::Value;
use storefront_api::{api_v1_routes, AppState};
use tower::ServiceExt;
use uuid::Uuid;

fn app(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", api_v1_routes())
        .with_state(state)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read body");
    serde_json::from_slice(&bytes).expect("body is not JSON")
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore)]
async fn empty_catalog_lists_as_empty_page() {
    let app = app(setup_state().await);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/products")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["count"], 0);
    assert_eq!(json["data"].as_array().unwrap().len(), 0);
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore)]
async fn unknown_product_id_is_404_with_error_payload() {
    let app = app(setup_state().await);

    let response = app
        .oneshot(
            Request::builder()
                .uri(&format!("/api/v1/products/{}", Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = body_json(response).await;
    assert_eq!(json["error"], "Not Found");
    assert!(json["message"].as_str().unwrap().contains("not found"));
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore)]
async fn invalid_sort_parameter_is_400() {
    let app = app(setup_state().await);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/products?sort_by=rating")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore)]
async fn csv_import_round_trips_through_the_api() {
    let state = setup_state().await;
    let app = app(state);

    let csv = "\
Product Title,Product Description,Brand,Meta Title,Meta Description,Meta Keywords,Has Variants,Category,Subcategory,Product Type,Option1 Name,Option1 Value,Option2 Name,Option2 Value,Option3 Name,Option3 Value,Price,Compare At Price,Quantity,Weight (g),Length (cm),Width (cm),Height (cm),Country Code (ISO),HS Code
Cast Iron Pan,Heavy pan,Véranda Home,,,,false,Home & Living,Kitchen,Cookware,,,,,,,49.99,,3,2500,30,30,8,FR,7323";

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/products/import")
                .header("content-type", "text/csv")
                .body(Body::from(csv))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = body_json(response).await;
    assert_eq!(json["created"], 1);
    let id = json["ids"][0].as_str().unwrap().to_owned();

    let response = app
        .oneshot(
            Request::builder()
                .uri(&format!("/api/v1/products/{}", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["title"], "Cast Iron Pan");
    assert_eq!(json["offering"]["kind"], "simple");
    assert_eq!(json["offering"]["price"], 4999);
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore)]
async fn import_with_unknown_reference_is_400_naming_the_value() {
    let app = app(setup_state().await);

    let csv = "\
Product Title,Product Description,Brand,Meta Title,Meta Description,Meta Keywords,Has Variants,Category,Subcategory,Product Type,Option1 Name,Option1 Value,Option2 Name,Option2 Value,Option3 Name,Option3 Value,Price,Compare At Price,Quantity,Weight (g),Length (cm),Width (cm),Height (cm),Country Code (ISO),HS Code
Gizmo,,Acme Apparel,,,,false,Gadgets,Tops,T-Shirts,,,,,,,9.99,,,,,,,,";

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/products/import")
                .header("content-type", "text/csv")
                .body(Body::from(csv))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert!(json["message"]
        .as_str()
        .unwrap()
        .contains("Category not found: Gadgets"));
}
