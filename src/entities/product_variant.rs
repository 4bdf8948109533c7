use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Concrete sellable SKU of a variant product. `combinations` maps every
/// active option id of the parent product to one of that option's value ids.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "product_variants")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub product_id: Uuid,
    /// JSON object optionId -> valueId
    #[sea_orm(column_type = "Json")]
    pub combinations: Json,
    /// Integer cents
    pub price: i32,
    #[sea_orm(nullable)]
    pub compare_at_price: Option<i32>,
    pub quantity: i32,
    #[sea_orm(nullable)]
    pub weight: Option<i32>,
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
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id",
        on_delete = "Cascade"
    )]
    Product,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
