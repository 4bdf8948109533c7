use crate::catalog::Catalog;
use crate::entities::{product, product_option, product_variant};
use crate::errors::ServiceError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use utoipa::ToSchema;
use uuid::Uuid;

pub const MAX_META_TITLE_LEN: usize = 70;
pub const MAX_META_DESCRIPTION_LEN: usize = 160;
pub const MAX_OPTIONS_PER_PRODUCT: usize = 3;

/// Brand reference resolved from the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BrandRef {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
}

/// Taxonomy reference resolved from the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TaxonomyRef {
    pub id: String,
    pub name: String,
}

/// One selectable value of an option axis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct OptionValue {
    pub id: Uuid,
    pub name: String,
    pub position: i32,
}

/// Option axis of a variant product (active options only).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductOption {
    pub id: Uuid,
    pub name: String,
    pub values: Vec<OptionValue>,
    pub position: i32,
}

/// Concrete SKU of a variant product.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductVariant {
    pub id: Uuid,
    /// optionId -> valueId, covering every active option of the product
    pub combinations: HashMap<Uuid, Uuid>,
    /// Integer cents
    pub price: i32,
    pub compare_at_price: Option<i32>,
    pub quantity: i32,
    pub weight: Option<i32>,
    pub length: Option<i32>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub origin_country: Option<String>,
    pub hs_code: Option<String>,
}

/// Pricing and inventory shape of a product. A product either carries flat
/// price fields or an option/variant matrix, never both.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Offering {
    Simple {
        /// Integer cents
        price: i32,
        compare_at_price: Option<i32>,
        quantity: i32,
    },
    WithVariants {
        options: Vec<ProductOption>,
        variants: Vec<ProductVariant>,
    },
}

impl Offering {
    pub fn has_variants(&self) -> bool {
        matches!(self, Offering::WithVariants { .. })
    }
}

/// Enriched, schema-validated read model served to clients. Constructed
/// only through [`CatalogProduct::from_rows`], which re-validates the
/// persisted rows against the catalog and the offering invariants.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CatalogProduct {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub brand: BrandRef,
    pub is_available: bool,
    pub image_urls: Vec<String>,
    pub category: TaxonomyRef,
    pub subcategory: TaxonomyRef,
    pub product_type: TaxonomyRef,
    pub offering: Offering,
    pub weight: Option<i32>,
    pub length: Option<i32>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub origin_country: Option<String>,
    pub hs_code: Option<String>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub meta_keywords: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn violation(product_id: Uuid, detail: impl std::fmt::Display) -> ServiceError {
    ServiceError::SchemaViolation(format!("product {}: {}", product_id, detail))
}

fn json_string_array(value: &serde_json::Value, what: &str, id: Uuid) -> Result<Vec<String>, ServiceError> {
    let arr = value
        .as_array()
        .ok_or_else(|| violation(id, format!("{} is not a JSON array", what)))?;
    arr.iter()
        .map(|v| {
            v.as_str()
                .map(str::to_owned)
                .ok_or_else(|| violation(id, format!("{} contains a non-string entry", what)))
        })
        .collect()
}

impl CatalogProduct {
    /// Builds the read model from persisted rows, resolving catalog
    /// references and re-validating structure. Any mismatch is internal
    /// data corruption and surfaces as a schema violation, never a
    /// silently coerced record.
    pub fn from_rows(
        row: product::Model,
        options: Vec<product_option::Model>,
        variants: Vec<product_variant::Model>,
        catalog: &Catalog,
    ) -> Result<Self, ServiceError> {
        let id = row.id;

        let brand = catalog
            .brand(&row.brand_id)
            .ok_or_else(|| violation(id, format!("unknown brand {}", row.brand_id)))?;
        let category = catalog
            .category(&row.category_id)
            .ok_or_else(|| violation(id, format!("unknown category {}", row.category_id)))?;
        let subcategory = catalog
            .subcategory(&row.subcategory_id)
            .ok_or_else(|| violation(id, format!("unknown subcategory {}", row.subcategory_id)))?;
        let product_type = catalog
            .product_type(&row.product_type_id)
            .ok_or_else(|| violation(id, format!("unknown product type {}", row.product_type_id)))?;

        if subcategory.category_id != category.id {
            return Err(violation(
                id,
                format!("subcategory {} is not under category {}", subcategory.id, category.id),
            ));
        }
        if product_type.subcategory_id != subcategory.id
            || product_type.category_id != category.id
        {
            return Err(violation(
                id,
                format!("product type {} is not under {}/{}", product_type.id, category.id, subcategory.id),
            ));
        }

        let image_urls = json_string_array(&row.image_urls, "image_urls", id)?;
        if image_urls.is_empty() {
            return Err(violation(id, "image_urls is empty"));
        }

        let meta_keywords = json_string_array(&row.meta_keywords, "meta_keywords", id)?;

        if let Some(t) = &row.meta_title {
            if t.chars().count() > MAX_META_TITLE_LEN {
                return Err(violation(id, "meta_title exceeds 70 characters"));
            }
        }
        if let Some(d) = &row.meta_description {
            if d.chars().count() > MAX_META_DESCRIPTION_LEN {
                return Err(violation(id, "meta_description exceeds 160 characters"));
            }
        }

        let offering = if row.product_has_variants {
            if row.price.is_some() || row.compare_at_price.is_some() || row.quantity.is_some() {
                return Err(violation(id, "variant product carries flat price fields"));
            }
            Self::build_variant_offering(id, options, variants)?
        } else {
            if !options.iter().all(|o| o.is_deleted) || !variants.is_empty() {
                return Err(violation(id, "simple product carries options or variants"));
            }
            let price = row
                .price
                .ok_or_else(|| violation(id, "simple product has no price"))?;
            if price < 0 {
                return Err(violation(id, "negative price"));
            }
            if row.compare_at_price.map_or(false, |c| c < 0) {
                return Err(violation(id, "negative compare_at_price"));
            }
            Offering::Simple {
                price,
                compare_at_price: row.compare_at_price,
                quantity: row.quantity.unwrap_or(0),
            }
        };

        Ok(CatalogProduct {
            id,
            title: row.title,
            slug: row.slug,
            description: row.description,
            brand: BrandRef {
                id: brand.id,
                name: brand.name.clone(),
                slug: brand.slug(),
            },
            is_available: row.is_available,
            image_urls,
            category: TaxonomyRef {
                id: category.id.clone(),
                name: category.name.clone(),
            },
            subcategory: TaxonomyRef {
                id: subcategory.id.clone(),
                name: subcategory.name.clone(),
            },
            product_type: TaxonomyRef {
                id: product_type.id.clone(),
                name: product_type.name.clone(),
            },
            offering,
            weight: row.weight,
            length: row.length,
            width: row.width,
            height: row.height,
            origin_country: row.origin_country,
            hs_code: row.hs_code,
            meta_title: row.meta_title,
            meta_description: row.meta_description,
            meta_keywords,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    fn build_variant_offering(
        id: Uuid,
        option_rows: Vec<product_option::Model>,
        variant_rows: Vec<product_variant::Model>,
    ) -> Result<Offering, ServiceError> {
        let mut options: Vec<ProductOption> = Vec::new();
        for row in option_rows {
            if row.is_deleted {
                continue;
            }
            let values: Vec<OptionValue> = serde_json::from_value(row.values)
                .map_err(|e| violation(id, format!("option {} has malformed values: {}", row.id, e)))?;
            if values.is_empty() {
                return Err(violation(id, format!("option {} has no values", row.id)));
            }
            options.push(ProductOption {
                id: row.id,
                name: row.name,
                values,
                position: row.position,
            });
        }
        options.sort_by_key(|o| o.position);

        if options.is_empty() {
            return Err(violation(id, "variant product has no active options"));
        }

        let mut positions = HashSet::new();
        for o in &options {
            if !positions.insert(o.position) {
                return Err(violation(id, format!("duplicate option position {}", o.position)));
            }
        }

        let option_ids: HashSet<Uuid> = options.iter().map(|o| o.id).collect();
        let value_ids: HashMap<Uuid, HashSet<Uuid>> = options
            .iter()
            .map(|o| (o.id, o.values.iter().map(|v| v.id).collect()))
            .collect();

        if variant_rows.is_empty() {
            return Err(violation(id, "variant product has no variants"));
        }

        let mut variants = Vec::with_capacity(variant_rows.len());
        let mut seen_combinations: HashSet<Vec<(Uuid, Uuid)>> = HashSet::new();
        for row in variant_rows {
            let combinations: HashMap<Uuid, Uuid> = serde_json::from_value(row.combinations)
                .map_err(|e| {
                    violation(id, format!("variant {} has malformed combinations: {}", row.id, e))
                })?;

            let keys: HashSet<Uuid> = combinations.keys().copied().collect();
            if keys != option_ids {
                return Err(violation(
                    id,
                    format!("variant {} does not cover the active option set", row.id),
                ));
            }
            for (option_id, value_id) in &combinations {
                if !value_ids[option_id].contains(value_id) {
                    return Err(violation(
                        id,
                        format!("variant {} references unknown value {}", row.id, value_id),
                    ));
                }
            }
            if row.price < 0 || row.compare_at_price.map_or(false, |c| c < 0) {
                return Err(violation(id, format!("variant {} has a negative price", row.id)));
            }

            let mut combination_key: Vec<(Uuid, Uuid)> =
                combinations.iter().map(|(k, v)| (*k, *v)).collect();
            combination_key.sort_unstable();
            if !seen_combinations.insert(combination_key) {
                return Err(violation(
                    id,
                    format!("variant {} repeats another variant's combination", row.id),
                ));
            }

            variants.push(ProductVariant {
                id: row.id,
                combinations,
                price: row.price,
                compare_at_price: row.compare_at_price,
                quantity: row.quantity,
                weight: row.weight,
                length: row.length,
                width: row.width,
                height: row.height,
                origin_country: row.origin_country,
                hs_code: row.hs_code,
            });
        }

        Ok(Offering::WithVariants { options, variants })
    }

    /// Lowest purchasable price in cents ("from $X" on listings).
    pub fn min_price(&self) -> i32 {
        match &self.offering {
            Offering::Simple { price, .. } => *price,
            Offering::WithVariants { variants, .. } => {
                variants.iter().map(|v| v.price).min().unwrap_or(0)
            }
        }
    }
}

/// Option input for bulk creation. Value ids are assigned server-side.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateOptionInput {
    pub name: String,
    /// Distinct value names in display order
    pub values: Vec<String>,
}

/// Variant input for bulk creation; combinations are keyed by option name
/// and value name, resolved to generated ids at insert time.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateVariantInput {
    /// option name -> value name
    pub combinations: HashMap<String, String>,
    /// Integer cents
    pub price: i32,
    pub compare_at_price: Option<i32>,
    pub quantity: i32,
    pub weight: Option<i32>,
    pub length: Option<i32>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub origin_country: Option<String>,
    pub hs_code: Option<String>,
}

/// Normalized product creation input consumed by the repository.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateProductInput {
    pub title: String,
    pub description: Option<String>,
    pub brand_id: Uuid,
    pub is_available: bool,
    pub image_urls: Vec<String>,
    pub category_id: String,
    pub subcategory_id: String,
    pub product_type_id: String,
    /// Flat fields, simple products only (integer cents)
    pub price: Option<i32>,
    pub compare_at_price: Option<i32>,
    pub quantity: Option<i32>,
    pub weight: Option<i32>,
    pub length: Option<i32>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub origin_country: Option<String>,
    pub hs_code: Option<String>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub meta_keywords: Vec<String>,
    pub options: Vec<CreateOptionInput>,
    pub variants: Vec<CreateVariantInput>,
}

impl CreateProductInput {
    pub fn has_variants(&self) -> bool {
        !self.options.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn catalog() -> Catalog {
        Catalog::from_embedded().unwrap()
    }

    fn brand_id(catalog: &Catalog) -> Uuid {
        catalog.brands()[0].id
    }

    fn simple_row(catalog: &Catalog) -> product::Model {
        let now = Utc::now();
        product::Model {
            id: Uuid::new_v4(),
            title: "Solid Tee".into(),
            slug: "acme-solid-tee-1".into(),
            description: Some("A plain tee".into()),
            brand_id: brand_id(catalog),
            is_available: true,
            image_urls: json!(["https://img.example/1.jpg"]),
            product_has_variants: false,
            category_id: "clothing".into(),
            subcategory_id: "tops".into(),
            product_type_id: "t-shirts".into(),
            price: Some(1999),
            compare_at_price: Some(2499),
            quantity: Some(10),
            weight: None,
            length: None,
            width: None,
            height: None,
            origin_country: None,
            hs_code: None,
            meta_title: None,
            meta_description: None,
            meta_keywords: json!([]),
            created_at: now,
            updated_at: now,
        }
    }

    fn option_row(product_id: Uuid, name: &str, values: &[(Uuid, &str)], position: i32) -> product_option::Model {
        let now = Utc::now();
        product_option::Model {
            id: Uuid::new_v4(),
            product_id,
            name: name.into(),
            values: json!(values
                .iter()
                .enumerate()
                .map(|(i, (id, name))| json!({"id": id, "name": name, "position": i as i32}))
                .collect::<Vec<_>>()),
            position,
            is_deleted: false,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn variant_row(product_id: Uuid, combos: &HashMap<Uuid, Uuid>, price: i32) -> product_variant::Model {
        let now = Utc::now();
        product_variant::Model {
            id: Uuid::new_v4(),
            product_id,
            combinations: serde_json::to_value(combos).unwrap(),
            price,
            compare_at_price: None,
            quantity: 5,
            weight: None,
            length: None,
            width: None,
            height: None,
            origin_country: None,
            hs_code: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn simple_product_builds_simple_offering() {
        let catalog = catalog();
        let row = simple_row(&catalog);
        let product = CatalogProduct::from_rows(row, vec![], vec![], &catalog).unwrap();
        assert_matches!(product.offering, Offering::Simple { price: 1999, .. });
        assert_eq!(product.brand.name, "Acme Apparel");
        assert_eq!(product.category.name, "Clothing");
        assert_eq!(product.min_price(), 1999);
    }

    #[test]
    fn simple_product_without_price_is_a_schema_violation() {
        let catalog = catalog();
        let mut row = simple_row(&catalog);
        row.price = None;
        let err = CatalogProduct::from_rows(row, vec![], vec![], &catalog).unwrap_err();
        assert_matches!(err, ServiceError::SchemaViolation(_));
    }

    #[test]
    fn variant_product_with_flat_price_is_a_schema_violation() {
        let catalog = catalog();
        let mut row = simple_row(&catalog);
        row.product_has_variants = true;
        let err = CatalogProduct::from_rows(row, vec![], vec![], &catalog).unwrap_err();
        assert_matches!(err, ServiceError::SchemaViolation(_));
    }

    #[test]
    fn unknown_brand_is_a_schema_violation() {
        let catalog = catalog();
        let mut row = simple_row(&catalog);
        row.brand_id = Uuid::new_v4();
        let err = CatalogProduct::from_rows(row, vec![], vec![], &catalog).unwrap_err();
        assert_matches!(err, ServiceError::SchemaViolation(_));
    }

    #[test]
    fn mismatched_hierarchy_is_a_schema_violation() {
        let catalog = catalog();
        let mut row = simple_row(&catalog);
        row.subcategory_id = "audio".into(); // belongs to electronics
        let err = CatalogProduct::from_rows(row, vec![], vec![], &catalog).unwrap_err();
        assert_matches!(err, ServiceError::SchemaViolation(_));
    }

    #[test]
    fn variant_offering_builds_and_orders_options() {
        let catalog = catalog();
        let mut row = simple_row(&catalog);
        row.product_has_variants = true;
        row.price = None;
        row.compare_at_price = None;
        row.quantity = None;

        let s = Uuid::new_v4();
        let m = Uuid::new_v4();
        let red = Uuid::new_v4();
        let size = option_row(row.id, "Size", &[(s, "S"), (m, "M")], 1);
        let color = option_row(row.id, "Color", &[(red, "Red")], 0);

        let mut combo = HashMap::new();
        combo.insert(size.id, s);
        combo.insert(color.id, red);
        let variant = variant_row(row.id, &combo, 1500);

        let product =
            CatalogProduct::from_rows(row, vec![size, color], vec![variant], &catalog).unwrap();
        match &product.offering {
            Offering::WithVariants { options, variants } => {
                assert_eq!(options[0].name, "Color");
                assert_eq!(options[1].name, "Size");
                assert_eq!(variants.len(), 1);
            }
            _ => panic!("expected variant offering"),
        }
        assert_eq!(product.min_price(), 1500);
    }

    #[test]
    fn variant_missing_an_option_key_is_a_schema_violation() {
        let catalog = catalog();
        let mut row = simple_row(&catalog);
        row.product_has_variants = true;
        row.price = None;
        row.compare_at_price = None;
        row.quantity = None;

        let s = Uuid::new_v4();
        let red = Uuid::new_v4();
        let size = option_row(row.id, "Size", &[(s, "S")], 0);
        let color = option_row(row.id, "Color", &[(red, "Red")], 1);

        // covers Size only
        let mut combo = HashMap::new();
        combo.insert(size.id, s);
        let variant = variant_row(row.id, &combo, 1500);

        let err = CatalogProduct::from_rows(row, vec![size, color], vec![variant], &catalog)
            .unwrap_err();
        assert_matches!(err, ServiceError::SchemaViolation(_));
    }

    #[test]
    fn duplicate_variant_combinations_are_a_schema_violation() {
        let catalog = catalog();
        let mut row = simple_row(&catalog);
        row.product_has_variants = true;
        row.price = None;
        row.compare_at_price = None;
        row.quantity = None;

        let s = Uuid::new_v4();
        let size = option_row(row.id, "Size", &[(s, "S")], 0);

        let mut combo = HashMap::new();
        combo.insert(size.id, s);
        let first = variant_row(row.id, &combo, 1500);
        let second = variant_row(row.id, &combo, 1600);

        let err = CatalogProduct::from_rows(row, vec![size], vec![first, second], &catalog)
            .unwrap_err();
        assert_matches!(err, ServiceError::SchemaViolation(_));
    }

    #[test]
    fn deleted_options_are_excluded_from_the_active_set() {
        let catalog = catalog();
        let mut row = simple_row(&catalog);
        row.product_has_variants = true;
        row.price = None;
        row.compare_at_price = None;
        row.quantity = None;

        let s = Uuid::new_v4();
        let size = option_row(row.id, "Size", &[(s, "S")], 0);
        let mut ghost = option_row(row.id, "Material", &[(Uuid::new_v4(), "Cotton")], 1);
        ghost.is_deleted = true;

        let mut combo = HashMap::new();
        combo.insert(size.id, s);
        let variant = variant_row(row.id, &combo, 900);

        let product =
            CatalogProduct::from_rows(row, vec![size, ghost], vec![variant], &catalog).unwrap();
        match &product.offering {
            Offering::WithVariants { options, .. } => assert_eq!(options.len(), 1),
            _ => panic!("expected variant offering"),
        }
    }

    #[test]
    fn empty_image_list_is_a_schema_violation() {
        let catalog = catalog();
        let mut row = simple_row(&catalog);
        row.image_urls = json!([]);
        let err = CatalogProduct::from_rows(row, vec![], vec![], &catalog).unwrap_err();
        assert_matches!(err, ServiceError::SchemaViolation(_));
    }
}
