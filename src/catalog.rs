use crate::common::slugify;
use crate::errors::ServiceError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

/// Top-level merchandising category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Subdivision of a category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subcategory {
    pub id: String,
    pub name: String,
    pub category_id: String,
}

/// Leaf of the taxonomy tree, scoped to a category and subcategory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductType {
    pub id: String,
    pub name: String,
    pub category_id: String,
    pub subcategory_id: String,
}

/// Flat brand table. Ids are fixed UUIDs; the slug is derived from the name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Brand {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
}

impl Brand {
    pub fn slug(&self) -> String {
        self.slug.clone().unwrap_or_else(|| slugify(&self.name))
    }
}

#[derive(Debug, Deserialize)]
struct TaxonomyData {
    categories: Vec<Category>,
    subcategories: Vec<Subcategory>,
    product_types: Vec<ProductType>,
    brands: Vec<Brand>,
}

/// Immutable reference data loaded once at startup. All lookups go through
/// prebuilt indexes; slug keys are normalized with [`slugify`], so matching
/// is case- and diacritic-insensitive.
#[derive(Debug, Clone)]
pub struct Catalog {
    categories: Vec<Category>,
    subcategories: Vec<Subcategory>,
    product_types: Vec<ProductType>,
    brands: Vec<Brand>,

    category_by_id: HashMap<String, usize>,
    subcategory_by_id: HashMap<String, usize>,
    product_type_by_id: HashMap<String, usize>,
    brand_by_id: HashMap<Uuid, usize>,

    category_by_slug: HashMap<String, usize>,
    // keyed by (category id, normalized subcategory slug)
    subcategory_by_slug: HashMap<(String, String), usize>,
    // keyed by (category id, subcategory id, normalized product type slug)
    product_type_by_slug: HashMap<(String, String, String), usize>,
    brand_by_slug: HashMap<String, usize>,
}

const EMBEDDED_TAXONOMY: &str = include_str!("../data/taxonomy.json");

impl Catalog {
    /// Builds the catalog from the taxonomy JSON compiled into the binary.
    pub fn from_embedded() -> Result<Self, ServiceError> {
        Self::from_json_str(EMBEDDED_TAXONOMY)
    }

    /// Builds the catalog from a taxonomy file on disk.
    pub fn from_file(path: &str) -> Result<Self, ServiceError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ServiceError::InvalidInput(format!("Cannot read taxonomy file {}: {}", path, e))
        })?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ServiceError> {
        let data: TaxonomyData = serde_json::from_str(raw)
            .map_err(|e| ServiceError::InvalidInput(format!("Invalid taxonomy JSON: {}", e)))?;
        Self::from_data(data)
    }

    fn from_data(data: TaxonomyData) -> Result<Self, ServiceError> {
        let TaxonomyData {
            categories,
            subcategories,
            product_types,
            brands,
        } = data;

        let mut catalog = Catalog {
            category_by_id: HashMap::with_capacity(categories.len()),
            subcategory_by_id: HashMap::with_capacity(subcategories.len()),
            product_type_by_id: HashMap::with_capacity(product_types.len()),
            brand_by_id: HashMap::with_capacity(brands.len()),
            category_by_slug: HashMap::with_capacity(categories.len()),
            subcategory_by_slug: HashMap::with_capacity(subcategories.len()),
            product_type_by_slug: HashMap::with_capacity(product_types.len()),
            brand_by_slug: HashMap::with_capacity(brands.len()),
            categories,
            subcategories,
            product_types,
            brands,
        };

        for (i, c) in catalog.categories.iter().enumerate() {
            catalog.category_by_id.insert(c.id.clone(), i);
            catalog.category_by_slug.insert(slugify(&c.name), i);
        }
        for (i, sc) in catalog.subcategories.iter().enumerate() {
            if !catalog.category_by_id.contains_key(&sc.category_id) {
                return Err(ServiceError::InvalidInput(format!(
                    "Subcategory {} references unknown category {}",
                    sc.id, sc.category_id
                )));
            }
            catalog.subcategory_by_id.insert(sc.id.clone(), i);
            catalog
                .subcategory_by_slug
                .insert((sc.category_id.clone(), slugify(&sc.name)), i);
        }
        for (i, pt) in catalog.product_types.iter().enumerate() {
            let parent_ok = catalog
                .subcategory_by_id
                .get(&pt.subcategory_id)
                .map(|&j| catalog.subcategories[j].category_id == pt.category_id)
                .unwrap_or(false);
            if !parent_ok {
                return Err(ServiceError::InvalidInput(format!(
                    "Product type {} references unknown parent {}/{}",
                    pt.id, pt.category_id, pt.subcategory_id
                )));
            }
            catalog.product_type_by_id.insert(pt.id.clone(), i);
            catalog.product_type_by_slug.insert(
                (
                    pt.category_id.clone(),
                    pt.subcategory_id.clone(),
                    slugify(&pt.name),
                ),
                i,
            );
        }
        for (i, b) in catalog.brands.iter().enumerate() {
            catalog.brand_by_id.insert(b.id, i);
            catalog.brand_by_slug.insert(b.slug(), i);
        }

        info!(
            categories = catalog.categories.len(),
            subcategories = catalog.subcategories.len(),
            product_types = catalog.product_types.len(),
            brands = catalog.brands.len(),
            "Catalog loaded"
        );

        Ok(catalog)
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn brands(&self) -> &[Brand] {
        &self.brands
    }

    pub fn category(&self, id: &str) -> Option<&Category> {
        self.category_by_id.get(id).map(|&i| &self.categories[i])
    }

    pub fn subcategory(&self, id: &str) -> Option<&Subcategory> {
        self.subcategory_by_id
            .get(id)
            .map(|&i| &self.subcategories[i])
    }

    pub fn product_type(&self, id: &str) -> Option<&ProductType> {
        self.product_type_by_id
            .get(id)
            .map(|&i| &self.product_types[i])
    }

    pub fn brand(&self, id: &Uuid) -> Option<&Brand> {
        self.brand_by_id.get(id).map(|&i| &self.brands[i])
    }

    /// Resolves a category by human-entered name.
    pub fn resolve_category(&self, name: &str) -> Result<&Category, ServiceError> {
        self.category_by_slug
            .get(&slugify(name))
            .map(|&i| &self.categories[i])
            .ok_or_else(|| ServiceError::InvalidInput(format!("Category not found: {}", name)))
    }

    /// Resolves a subcategory by name, scoped to its parent category.
    pub fn resolve_subcategory(
        &self,
        name: &str,
        category_name: &str,
    ) -> Result<&Subcategory, ServiceError> {
        let category = self.resolve_category(category_name)?;
        self.subcategory_by_slug
            .get(&(category.id.clone(), slugify(name)))
            .map(|&i| &self.subcategories[i])
            .ok_or_else(|| {
                ServiceError::InvalidInput(format!(
                    "Subcategory not found: {} under category {}",
                    name, category_name
                ))
            })
    }

    /// Resolves a product type by name, scoped to both ancestors.
    pub fn resolve_product_type(
        &self,
        name: &str,
        subcategory_name: &str,
        category_name: &str,
    ) -> Result<&ProductType, ServiceError> {
        let subcategory = self.resolve_subcategory(subcategory_name, category_name)?;
        self.product_type_by_slug
            .get(&(
                subcategory.category_id.clone(),
                subcategory.id.clone(),
                slugify(name),
            ))
            .map(|&i| &self.product_types[i])
            .ok_or_else(|| {
                ServiceError::InvalidInput(format!(
                    "Product type not found: {} under subcategory {}",
                    name, subcategory_name
                ))
            })
    }

    /// Resolves a brand by human-entered name.
    pub fn resolve_brand(&self, name: &str) -> Result<&Brand, ServiceError> {
        self.brand_by_slug
            .get(&slugify(name))
            .map(|&i| &self.brands[i])
            .ok_or_else(|| ServiceError::InvalidInput(format!("Brand not found: {}", name)))
    }
}
