use crate::catalog::Catalog;
use crate::common::{convert_dollar_to_cent, generate_product_slug};
use crate::entities::{product, product_option, product_variant};
use crate::errors::ServiceError;
use crate::models::product::{CatalogProduct, CreateProductInput, OptionValue};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::{Expr, SimpleExpr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, Order,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select, TransactionTrait,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

pub const MAX_PAGE_SIZE: u64 = 30;
pub const MAX_RELATED_PRODUCTS: u64 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortBy {
    Price,
    #[default]
    CreatedAt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    fn to_order(self) -> Order {
        match self {
            SortOrder::Asc => Order::Asc,
            SortOrder::Desc => Order::Desc,
        }
    }
}

/// Filter for listing products. All present filters are ANDed; price
/// bounds are in dollars and a bound of zero means no bound.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub page: u64,
    pub limit: u64,
    pub search: Option<String>,
    pub brand_ids: Vec<Uuid>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub category_id: Option<String>,
    pub subcategory_id: Option<String>,
    pub product_type_id: Option<String>,
    pub is_available: Option<bool>,
    pub sort_by: SortBy,
    pub sort_order: SortOrder,
}

/// Keys for fetching a single product. Both absent means no lookup.
#[derive(Debug, Clone, Default)]
pub struct ProductLookup {
    pub id: Option<Uuid>,
    pub slug: Option<String>,
    pub is_available: Option<bool>,
}

/// One page of enriched products plus the total match count.
#[derive(Debug, Clone)]
pub struct ProductPage {
    pub data: Vec<CatalogProduct>,
    pub count: u64,
}

const SEARCH_VECTOR: &str = "(setweight(to_tsvector('english', \"products\".\"title\"), 'A') || \
     setweight(to_tsvector('english', COALESCE(\"products\".\"description\", '')), 'B'))";

fn search_predicate(search: &str) -> SimpleExpr {
    Expr::cust_with_values(
        &format!("{} @@ plainto_tsquery('english', ?)", SEARCH_VECTOR),
        [search.to_owned()],
    )
}

fn search_rank(search: &str) -> SimpleExpr {
    Expr::cust_with_values(
        &format!("ts_rank({}, plainto_tsquery('english', ?))", SEARCH_VECTOR),
        [search.to_owned()],
    )
}

/// Price bound that holds when any variant is inside the bound for
/// variant products, or the flat price is for simple ones.
fn price_bound_predicate(op: &str, cents: i32) -> SimpleExpr {
    Expr::cust(format!(
        "(CASE WHEN \"products\".\"product_has_variants\" = TRUE THEN \
           EXISTS (SELECT 1 FROM \"product_variants\" \"pv\" \
             WHERE \"pv\".\"product_id\" = \"products\".\"id\" \
             AND \"pv\".\"price\" {op} {cents}) \
         ELSE COALESCE(\"products\".\"price\", 0) {op} {cents} END)"
    ))
}

/// Sort key that substitutes the minimum variant price for variant products.
fn price_sort_key() -> SimpleExpr {
    Expr::cust(
        "(CASE WHEN \"products\".\"product_has_variants\" = TRUE THEN \
           (SELECT MIN(\"price\") FROM \"product_variants\" \
             WHERE \"product_id\" = \"products\".\"id\") \
         ELSE \"products\".\"price\" END)",
    )
}

/// Dollar bound -> cents, treating zero as "no bound".
fn bound_cents(bound: Option<Decimal>) -> Option<i32> {
    bound
        .map(convert_dollar_to_cent)
        .filter(|&cents| cents > 0)
}

fn filter_condition(filter: &ProductFilter) -> Condition {
    let mut condition = Condition::all();

    if let Some(search) = filter.search.as_deref().filter(|s| !s.is_empty()) {
        condition = condition.add(search_predicate(search));
    }
    if !filter.brand_ids.is_empty() {
        condition = condition.add(product::Column::BrandId.is_in(filter.brand_ids.clone()));
    }
    if let Some(cents) = bound_cents(filter.min_price) {
        condition = condition.add(price_bound_predicate(">=", cents));
    }
    if let Some(cents) = bound_cents(filter.max_price) {
        condition = condition.add(price_bound_predicate("<=", cents));
    }
    if let Some(available) = filter.is_available {
        condition = condition.add(product::Column::IsAvailable.eq(available));
    }
    if let Some(category_id) = &filter.category_id {
        condition = condition.add(product::Column::CategoryId.eq(category_id.clone()));
    }
    if let Some(subcategory_id) = &filter.subcategory_id {
        condition = condition.add(product::Column::SubcategoryId.eq(subcategory_id.clone()));
    }
    if let Some(product_type_id) = &filter.product_type_id {
        condition = condition.add(product::Column::ProductTypeId.eq(product_type_id.clone()));
    }

    condition
}

/// Builds the filtered, ordered, paginated listing query. Kept separate
/// from execution so the generated SQL can be asserted directly.
fn build_list_query(filter: &ProductFilter) -> Select<product::Entity> {
    let mut query = product::Entity::find().filter(filter_condition(filter));

    let order = filter.sort_order.to_order();
    query = match filter.sort_by {
        SortBy::Price => query.order_by(price_sort_key(), order),
        SortBy::CreatedAt => query.order_by(product::Column::CreatedAt, order),
    };
    if let Some(search) = filter.search.as_deref().filter(|s| !s.is_empty()) {
        query = query.order_by(search_rank(search), Order::Desc);
    }

    let page = filter.page.max(1);
    query
        .offset((page - 1) * filter.limit)
        .limit(filter.limit)
}

/// Product repository: filtered listing, single lookups, related
/// products, and bulk creation. Every row leaving this service is
/// enriched against the catalog and re-validated.
#[derive(Clone)]
pub struct ProductService {
    db: Arc<DatabaseConnection>,
    catalog: Arc<Catalog>,
}

impl ProductService {
    pub fn new(db: Arc<DatabaseConnection>, catalog: Arc<Catalog>) -> Self {
        Self { db, catalog }
    }

    /// Loads options and variants for the given products and assembles
    /// the validated read models, preserving row order.
    async fn enrich(
        &self,
        rows: Vec<product::Model>,
    ) -> Result<Vec<CatalogProduct>, ServiceError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = rows.iter().map(|p| p.id).collect();

        let option_rows = product_option::Entity::find()
            .filter(product_option::Column::ProductId.is_in(ids.clone()))
            .order_by_asc(product_option::Column::Position)
            .all(self.db.as_ref())
            .await?;
        let variant_rows = product_variant::Entity::find()
            .filter(product_variant::Column::ProductId.is_in(ids))
            .all(self.db.as_ref())
            .await?;

        let mut options_by_product: HashMap<Uuid, Vec<product_option::Model>> = HashMap::new();
        for row in option_rows {
            options_by_product.entry(row.product_id).or_default().push(row);
        }
        let mut variants_by_product: HashMap<Uuid, Vec<product_variant::Model>> = HashMap::new();
        for row in variant_rows {
            variants_by_product.entry(row.product_id).or_default().push(row);
        }

        rows.into_iter()
            .map(|row| {
                let options = options_by_product.remove(&row.id).unwrap_or_default();
                let variants = variants_by_product.remove(&row.id).unwrap_or_default();
                CatalogProduct::from_rows(row, options, variants, &self.catalog)
            })
            .collect()
    }

    /// Lists products matching the filter, with the total match count.
    #[instrument(skip(self))]
    pub async fn list_products(&self, filter: &ProductFilter) -> Result<ProductPage, ServiceError> {
        let count = product::Entity::find()
            .filter(filter_condition(filter))
            .count(self.db.as_ref())
            .await?;

        let rows = build_list_query(filter).all(self.db.as_ref()).await?;
        let data = self.enrich(rows).await?;

        Ok(ProductPage { data, count })
    }

    /// Fetches one product by id and/or slug. Absent keys mean no lookup;
    /// absence of a match is `Ok(None)`, not an error.
    #[instrument(skip(self))]
    pub async fn get_product(
        &self,
        lookup: &ProductLookup,
    ) -> Result<Option<CatalogProduct>, ServiceError> {
        if lookup.id.is_none() && lookup.slug.is_none() {
            return Ok(None);
        }

        let mut keys = Condition::any();
        if let Some(id) = lookup.id {
            keys = keys.add(product::Column::Id.eq(id));
        }
        if let Some(slug) = &lookup.slug {
            keys = keys.add(product::Column::Slug.eq(slug.clone()));
        }

        let mut condition = Condition::all().add(keys);
        if let Some(available) = lookup.is_available {
            condition = condition.add(product::Column::IsAvailable.eq(available));
        }

        let row = product::Entity::find()
            .filter(condition)
            .one(self.db.as_ref())
            .await?;

        match row {
            Some(row) => Ok(self.enrich(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    /// Products sharing the source's category, subcategory or product
    /// type. Available products only, the source itself excluded.
    #[instrument(skip(self))]
    pub async fn get_related_products(
        &self,
        product_id: Uuid,
        limit: u64,
    ) -> Result<Vec<CatalogProduct>, ServiceError> {
        let source = product::Entity::find_by_id(product_id)
            .one(self.db.as_ref())
            .await?;
        let source = match source {
            Some(source) => source,
            None => return Ok(Vec::new()),
        };

        let rows = product::Entity::find()
            .filter(
                Condition::all()
                    .add(
                        Condition::any()
                            .add(product::Column::CategoryId.eq(source.category_id.clone()))
                            .add(product::Column::SubcategoryId.eq(source.subcategory_id.clone()))
                            .add(product::Column::ProductTypeId.eq(source.product_type_id.clone())),
                    )
                    .add(product::Column::IsAvailable.eq(true))
                    .add(product::Column::Id.ne(product_id)),
            )
            .limit(limit.min(MAX_RELATED_PRODUCTS))
            .all(self.db.as_ref())
            .await?;

        self.enrich(rows).await
    }

    /// Validates references, assigns ids and slugs, and inserts all
    /// products with their options and variants in one transaction. Any
    /// failure rolls back the whole batch.
    #[instrument(skip(self, inputs), fields(count = inputs.len()))]
    pub async fn bulk_create_products(
        &self,
        inputs: Vec<CreateProductInput>,
    ) -> Result<Vec<CatalogProduct>, ServiceError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let unknown_brands: Vec<String> = inputs
            .iter()
            .map(|input| input.brand_id)
            .filter(|id| self.catalog.brand(id).is_none())
            .map(|id| id.to_string())
            .collect();
        if !unknown_brands.is_empty() {
            return Err(ServiceError::InvalidInput(format!(
                "Brand not found: {}",
                unknown_brands.join(", ")
            )));
        }

        let now = Utc::now();
        let mut product_rows = Vec::with_capacity(inputs.len());
        let mut option_rows: Vec<product_option::Model> = Vec::new();
        let mut variant_rows: Vec<product_variant::Model> = Vec::new();

        for input in &inputs {
            let (row, options, variants) = self.prepare_product(input, now)?;
            product_rows.push(row);
            option_rows.extend(options);
            variant_rows.extend(variants);
        }

        let txn = self.db.begin().await?;
        product::Entity::insert_many(
            product_rows
                .iter()
                .cloned()
                .map(|m| product::ActiveModel::from(m).reset_all()),
        )
        .exec(&txn)
        .await?;
        if !option_rows.is_empty() {
            product_option::Entity::insert_many(
                option_rows
                    .iter()
                    .cloned()
                    .map(|m| product_option::ActiveModel::from(m).reset_all()),
            )
            .exec(&txn)
            .await?;
        }
        if !variant_rows.is_empty() {
            product_variant::Entity::insert_many(
                variant_rows
                    .iter()
                    .cloned()
                    .map(|m| product_variant::ActiveModel::from(m).reset_all()),
            )
            .exec(&txn)
            .await?;
        }
        txn.commit().await?;

        info!(
            products = product_rows.len(),
            options = option_rows.len(),
            variants = variant_rows.len(),
            "Bulk created products"
        );

        let mut options_by_product: HashMap<Uuid, Vec<product_option::Model>> = HashMap::new();
        for row in option_rows {
            options_by_product.entry(row.product_id).or_default().push(row);
        }
        let mut variants_by_product: HashMap<Uuid, Vec<product_variant::Model>> = HashMap::new();
        for row in variant_rows {
            variants_by_product.entry(row.product_id).or_default().push(row);
        }

        product_rows
            .into_iter()
            .map(|row| {
                let options = options_by_product.remove(&row.id).unwrap_or_default();
                let variants = variants_by_product.remove(&row.id).unwrap_or_default();
                CatalogProduct::from_rows(row, options, variants, &self.catalog)
            })
            .collect()
    }

    /// Turns one creation input into concrete rows with generated ids,
    /// resolving option and value names to ids for the variants.
    fn prepare_product(
        &self,
        input: &CreateProductInput,
        now: chrono::DateTime<Utc>,
    ) -> Result<
        (
            product::Model,
            Vec<product_option::Model>,
            Vec<product_variant::Model>,
        ),
        ServiceError,
    > {
        let brand = self
            .catalog
            .brand(&input.brand_id)
            .ok_or_else(|| {
                ServiceError::InvalidInput(format!("Brand not found: {}", input.brand_id))
            })?;
        if self.catalog.category(&input.category_id).is_none() {
            return Err(ServiceError::InvalidInput(format!(
                "Category not found: {}",
                input.category_id
            )));
        }
        if self.catalog.subcategory(&input.subcategory_id).is_none() {
            return Err(ServiceError::InvalidInput(format!(
                "Subcategory not found: {}",
                input.subcategory_id
            )));
        }
        if self.catalog.product_type(&input.product_type_id).is_none() {
            return Err(ServiceError::InvalidInput(format!(
                "Product type not found: {}",
                input.product_type_id
            )));
        }
        if input.title.trim().is_empty() {
            return Err(ServiceError::InvalidInput("Product title is empty".into()));
        }
        if input.image_urls.is_empty() {
            return Err(ServiceError::InvalidInput(format!(
                "Product {} has no images",
                input.title
            )));
        }

        let has_variants = input.has_variants();
        if has_variants && input.variants.is_empty() {
            return Err(ServiceError::InvalidInput(format!(
                "Product {} declares options but no variants",
                input.title
            )));
        }
        if !has_variants && !input.variants.is_empty() {
            return Err(ServiceError::InvalidInput(format!(
                "Product {} declares variants but no options",
                input.title
            )));
        }
        if !has_variants && input.price.is_none() {
            return Err(ServiceError::InvalidInput(format!(
                "Product {} has no price",
                input.title
            )));
        }

        let product_id = Uuid::new_v4();
        let slug = generate_product_slug(&brand.name, &input.title);

        let row = product::Model {
            id: product_id,
            title: input.title.clone(),
            slug,
            description: input.description.clone(),
            brand_id: input.brand_id,
            is_available: input.is_available,
            image_urls: serde_json::json!(input.image_urls),
            product_has_variants: has_variants,
            category_id: input.category_id.clone(),
            subcategory_id: input.subcategory_id.clone(),
            product_type_id: input.product_type_id.clone(),
            price: if has_variants { None } else { input.price },
            compare_at_price: if has_variants {
                None
            } else {
                input.compare_at_price
            },
            quantity: if has_variants { None } else { input.quantity },
            weight: input.weight,
            length: input.length,
            width: input.width,
            height: input.height,
            origin_country: input.origin_country.clone(),
            hs_code: input.hs_code.clone(),
            meta_title: input.meta_title.clone(),
            meta_description: input.meta_description.clone(),
            meta_keywords: serde_json::json!(input.meta_keywords),
            created_at: now,
            updated_at: now,
        };

        // option name -> (option id, value name -> value id)
        let mut name_index: HashMap<&str, (Uuid, HashMap<&str, Uuid>)> = HashMap::new();
        let mut option_rows = Vec::with_capacity(input.options.len());
        for (position, option) in input.options.iter().enumerate() {
            if option.values.is_empty() {
                return Err(ServiceError::InvalidInput(format!(
                    "Option {} of product {} has no values",
                    option.name, input.title
                )));
            }
            let option_id = Uuid::new_v4();
            let values: Vec<OptionValue> = option
                .values
                .iter()
                .enumerate()
                .map(|(i, name)| OptionValue {
                    id: Uuid::new_v4(),
                    name: name.clone(),
                    position: i as i32,
                })
                .collect();
            name_index.insert(
                option.name.as_str(),
                (
                    option_id,
                    option
                        .values
                        .iter()
                        .zip(values.iter())
                        .map(|(name, v)| (name.as_str(), v.id))
                        .collect(),
                ),
            );
            option_rows.push(product_option::Model {
                id: option_id,
                product_id,
                name: option.name.clone(),
                values: serde_json::to_value(&values)
                    .map_err(|e| ServiceError::InvalidInput(e.to_string()))?,
                position: position as i32,
                is_deleted: false,
                deleted_at: None,
                created_at: now,
                updated_at: now,
            });
        }

        let mut variant_rows = Vec::with_capacity(input.variants.len());
        let mut seen_combinations: HashSet<Vec<(Uuid, Uuid)>> = HashSet::new();
        for variant in &input.variants {
            let mut combinations: HashMap<Uuid, Uuid> = HashMap::new();
            for (option_name, value_name) in &variant.combinations {
                let (option_id, values) = name_index.get(option_name.as_str()).ok_or_else(|| {
                    ServiceError::InvalidInput(format!(
                        "Variant of product {} references unknown option {}",
                        input.title, option_name
                    ))
                })?;
                let value_id = values.get(value_name.as_str()).ok_or_else(|| {
                    ServiceError::InvalidInput(format!(
                        "Variant of product {} references unknown value {} for option {}",
                        input.title, value_name, option_name
                    ))
                })?;
                combinations.insert(*option_id, *value_id);
            }
            if combinations.len() != input.options.len() {
                return Err(ServiceError::InvalidInput(format!(
                    "Variant of product {} does not cover every option",
                    input.title
                )));
            }
            let mut combination_key: Vec<(Uuid, Uuid)> =
                combinations.iter().map(|(k, v)| (*k, *v)).collect();
            combination_key.sort_unstable();
            if !seen_combinations.insert(combination_key) {
                return Err(ServiceError::InvalidInput(format!(
                    "Product {} has two variants with the same combination",
                    input.title
                )));
            }
            variant_rows.push(product_variant::Model {
                id: Uuid::new_v4(),
                product_id,
                combinations: serde_json::to_value(&combinations)
                    .map_err(|e| ServiceError::InvalidInput(e.to_string()))?,
                price: variant.price,
                compare_at_price: variant.compare_at_price,
                quantity: variant.quantity,
                weight: variant.weight,
                length: variant.length,
                width: variant.width,
                height: variant.height,
                origin_country: variant.origin_country.clone(),
                hs_code: variant.hs_code.clone(),
                created_at: now,
                updated_at: now,
            });
        }

        Ok((row, option_rows, variant_rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use sea_orm::{DbBackend, QueryTrait};

    fn base_filter() -> ProductFilter {
        ProductFilter {
            page: 1,
            limit: 30,
            ..Default::default()
        }
    }

    fn sql(filter: &ProductFilter) -> String {
        build_list_query(filter).build(DbBackend::Postgres).to_string()
    }

    #[test]
    fn price_bounds_use_existential_variant_match() {
        let filter = ProductFilter {
            min_price: Some(dec!(10)),
            max_price: Some(dec!(50)),
            ..base_filter()
        };
        let sql = sql(&filter);
        assert!(sql.contains("EXISTS (SELECT 1 FROM \"product_variants\""));
        assert!(sql.contains("\"pv\".\"price\" >= 1000"));
        assert!(sql.contains("\"pv\".\"price\" <= 5000"));
        assert!(sql.contains("COALESCE(\"products\".\"price\", 0) >= 1000"));
    }

    #[test]
    fn zero_price_bound_means_no_bound() {
        let filter = ProductFilter {
            min_price: Some(dec!(0)),
            ..base_filter()
        };
        assert!(!sql(&filter).contains("EXISTS"));
    }

    #[test]
    fn search_adds_weighted_fts_and_rank_tiebreak() {
        let filter = ProductFilter {
            search: Some("wireless headphones".into()),
            ..base_filter()
        };
        let sql = sql(&filter);
        assert!(sql.contains("setweight(to_tsvector('english', \"products\".\"title\"), 'A')"));
        assert!(sql.contains("@@ plainto_tsquery('english'"));
        assert!(sql.contains("ts_rank"));
        // relevance is the secondary key, always descending
        assert!(sql.contains("DESC"));
    }

    #[test]
    fn empty_search_is_ignored() {
        let filter = ProductFilter {
            search: Some(String::new()),
            ..base_filter()
        };
        assert!(!sql(&filter).contains("plainto_tsquery"));
    }

    #[test]
    fn price_sort_uses_min_variant_price_key() {
        let filter = ProductFilter {
            sort_by: SortBy::Price,
            sort_order: SortOrder::Asc,
            ..base_filter()
        };
        let sql = sql(&filter);
        assert!(sql.contains("SELECT MIN(\"price\") FROM \"product_variants\""));
        assert!(sql.contains("ASC"));
    }

    #[test]
    fn created_at_sort_has_no_price_subquery() {
        let sql = sql(&base_filter());
        assert!(!sql.contains("MIN(\"price\")"));
        assert!(sql.contains("\"created_at\""));
    }

    #[test]
    fn pagination_offsets_by_page_minus_one() {
        let filter = ProductFilter {
            page: 3,
            limit: 20,
            ..base_filter()
        };
        let sql = sql(&filter);
        assert!(sql.contains("LIMIT 20"));
        assert!(sql.contains("OFFSET 40"));
    }

    #[test]
    fn all_present_filters_are_anded() {
        let filter = ProductFilter {
            brand_ids: vec![Uuid::new_v4()],
            category_id: Some("clothing".into()),
            subcategory_id: Some("tops".into()),
            product_type_id: Some("t-shirts".into()),
            is_available: Some(true),
            ..base_filter()
        };
        let sql = sql(&filter);
        assert!(sql.contains("\"brand_id\" IN"));
        assert!(sql.contains("\"category_id\" = 'clothing'"));
        assert!(sql.contains("\"subcategory_id\" = 'tops'"));
        assert!(sql.contains("\"product_type_id\" = 't-shirts'"));
        assert!(sql.contains("\"is_available\" = TRUE"));
    }

    #[test]
    fn explicit_unavailable_filter_is_kept() {
        let filter = ProductFilter {
            is_available: Some(false),
            ..base_filter()
        };
        assert!(sql(&filter).contains("\"is_available\" = FALSE"));
    }
}
