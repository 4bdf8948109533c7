use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Product row. Flat price/inventory columns are populated only for
/// simple products; variant products carry them on their variants.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub title: String,
    #[sea_orm(unique)]
    pub slug: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub brand_id: Uuid,
    pub is_available: bool,
    /// JSON array of image URLs
    #[sea_orm(column_type = "Json")]
    pub image_urls: Json,
    pub product_has_variants: bool,
    pub category_id: String,
    pub subcategory_id: String,
    pub product_type_id: String,
    /// Integer cents, only for simple products
    #[sea_orm(nullable)]
    pub price: Option<i32>,
    #[sea_orm(nullable)]
    pub compare_at_price: Option<i32>,
    #[sea_orm(nullable)]
    pub quantity: Option<i32>,
    /// Grams
    #[sea_orm(nullable)]
    pub weight: Option<i32>,
    /// Millimeters
    #[sea_orm(nullable)]
    pub length: Option<i32>,
    #[sea_orm(nullable)]
    pub width: Option<i32>,
    #[sea_orm(nullable)]
    pub height: Option<i32>,
    #[sea_orm(nullable)]
    pub origin_country: Option<String>,
    #[sea_orm(nullable)]
    pub hs_code: Option<String>,
    #[sea_orm(nullable)]
    pub meta_title: Option<String>,
    #[sea_orm(nullable)]
    pub meta_description: Option<String>,
    /// JSON array of keyword strings
    #[sea_orm(column_type = "Json")]
    pub meta_keywords: Json,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::product_option::Entity")]
    ProductOptions,
    #[sea_orm(has_many = "super::product_variant::Entity")]
    ProductVariants,
}

impl Related<super::product_option::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProductOptions.def()
    }
}

impl Related<super::product_variant::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProductVariants.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
