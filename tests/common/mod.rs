use std::sync::Arc;

use sea_orm::{ConnectionTrait, Database, Schema};
use storefront_api::{
    catalog::Catalog,
    config::AppConfig,
    entities::{product, product_option, product_variant},
    AppState,
};

fn test_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".to_string(),
        host: "127.0.0.1".to_string(),
        port: 18_080,
        environment: "test".to_string(),
        log_level: "debug".to_string(),
        log_json: false,
        taxonomy_path: None,
        db_max_connections: 1,
        db_min_connections: 1,
        db_connect_timeout_secs: 5,
        db_idle_timeout_secs: 60,
        rate_limit_requests_per_window: 100,
        rate_limit_window_seconds: 60,
        disable_product_creation: false,
    }
}

/// Application state backed by a fresh in-memory SQLite database with the
/// catalog schema created from the entities.
pub async fn setup_state() -> AppState {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("failed to open in-memory database");

    let backend = db.get_database_backend();
    let schema = Schema::new(backend);
    for statement in [
        schema.create_table_from_entity(product::Entity),
        schema.create_table_from_entity(product_option::Entity),
        schema.create_table_from_entity(product_variant::Entity),
    ] {
        db.execute(backend.build(&statement))
            .await
            .expect("failed to create table");
    }

    let catalog = Catalog::from_embedded().expect("embedded taxonomy must load");
    AppState::new(Arc::new(db), Arc::new(test_config()), Arc::new(catalog))
}
