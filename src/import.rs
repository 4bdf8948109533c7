use crate::catalog::Catalog;
use crate::common::{parse_money_cents, parse_number_or_zero, slugify};
use crate::errors::ServiceError;
use crate::models::product::{CreateOptionInput, CreateProductInput, CreateVariantInput};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::info;

pub const PLACEHOLDER_IMAGE_COUNT: usize = 5;
const OPTION_SLOTS: usize = 3;

/// One physical CSV row. Columns are matched by exact header name;
/// missing cells deserialize to empty strings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImportRow {
    #[serde(rename = "Product Title", default)]
    pub title: String,
    #[serde(rename = "Product Description", default)]
    pub description: String,
    #[serde(rename = "Brand", default)]
    pub brand: String,
    #[serde(rename = "Meta Title", default)]
    pub meta_title: String,
    #[serde(rename = "Meta Description", default)]
    pub meta_description: String,
    #[serde(rename = "Meta Keywords", default)]
    pub meta_keywords: String,
    #[serde(rename = "Has Variants", default)]
    pub has_variants: String,
    #[serde(rename = "Category", default)]
    pub category: String,
    #[serde(rename = "Subcategory", default)]
    pub subcategory: String,
    #[serde(rename = "Product Type", default)]
    pub product_type: String,
    #[serde(rename = "Option1 Name", default)]
    pub option1_name: String,
    #[serde(rename = "Option1 Value", default)]
    pub option1_value: String,
    #[serde(rename = "Option2 Name", default)]
    pub option2_name: String,
    #[serde(rename = "Option2 Value", default)]
    pub option2_value: String,
    #[serde(rename = "Option3 Name", default)]
    pub option3_name: String,
    #[serde(rename = "Option3 Value", default)]
    pub option3_value: String,
    #[serde(rename = "Price", default)]
    pub price: String,
    #[serde(rename = "Compare At Price", default)]
    pub compare_at_price: String,
    #[serde(rename = "Quantity", default)]
    pub quantity: String,
    #[serde(rename = "Weight (g)", default)]
    pub weight: String,
    #[serde(rename = "Length (cm)", default)]
    pub length: String,
    #[serde(rename = "Width (cm)", default)]
    pub width: String,
    #[serde(rename = "Height (cm)", default)]
    pub height: String,
    #[serde(rename = "Country Code (ISO)", default)]
    pub origin_country: String,
    #[serde(rename = "HS Code", default)]
    pub hs_code: String,
}

impl ImportRow {
    /// Name/value pairs of the three option slots, in slot order.
    fn option_slots(&self) -> [(&str, &str); OPTION_SLOTS] {
        [
            (self.option1_name.trim(), self.option1_value.trim()),
            (self.option2_name.trim(), self.option2_value.trim()),
            (self.option3_name.trim(), self.option3_value.trim()),
        ]
    }

    fn has_variants(&self) -> bool {
        self.has_variants.trim().eq_ignore_ascii_case("true")
    }
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

/// Deterministic placeholder gallery for imported products.
pub fn placeholder_image_urls(title: &str) -> Vec<String> {
    let slug = slugify(title);
    (0..PLACEHOLDER_IMAGE_COUNT)
        .map(|i| format!("https://picsum.photos/seed/{}{}/1500/1500", slug, i))
        .collect()
}

fn split_keywords(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Parses the raw CSV body into rows. Header-driven, so column order is
/// irrelevant; unknown columns are ignored. Cells are kept verbatim:
/// titles group by exact string, and the cells that tolerate padding
/// (options, numbers, taxonomy names) trim individually.
pub fn parse_rows(csv_text: &str) -> Result<Vec<ImportRow>, ServiceError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(csv_text.as_bytes());

    let mut rows = Vec::new();
    for (i, record) in reader.deserialize::<ImportRow>().enumerate() {
        let row = record.map_err(|e| {
            ServiceError::InvalidInput(format!("CSV parse error at data row {}: {}", i + 1, e))
        })?;
        rows.push(row);
    }
    Ok(rows)
}

/// Normalizes parsed rows into creation inputs: rows grouped by exact
/// title (one product per group, one variant per row for variant
/// products), taxonomy and brand names resolved against the catalog.
/// Any unresolvable reference fails the entire import.
pub fn normalize(rows: Vec<ImportRow>, catalog: &Catalog) -> Result<Vec<CreateProductInput>, ServiceError> {
    // group by exact title, preserving first-seen order
    let mut group_index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(String, Vec<ImportRow>)> = Vec::new();
    for row in rows {
        if row.title.trim().is_empty() {
            continue;
        }
        let title = row.title.clone();
        match group_index.get(&title) {
            Some(&i) => groups[i].1.push(row),
            None => {
                group_index.insert(title.clone(), groups.len());
                groups.push((title, vec![row]));
            }
        }
    }

    let mut products = Vec::with_capacity(groups.len());
    for (title, rows) in groups {
        products.push(normalize_group(&title, &rows, catalog)?);
    }

    info!(products = products.len(), "Normalized import file");
    Ok(products)
}

/// Convenience wrapper: parse then normalize.
pub fn normalize_csv(csv_text: &str, catalog: &Catalog) -> Result<Vec<CreateProductInput>, ServiceError> {
    normalize(parse_rows(csv_text)?, catalog)
}

fn normalize_group(
    title: &str,
    rows: &[ImportRow],
    catalog: &Catalog,
) -> Result<CreateProductInput, ServiceError> {
    let first = &rows[0];

    let category = catalog.resolve_category(&first.category)?;
    let subcategory = catalog.resolve_subcategory(&first.subcategory, &first.category)?;
    let product_type =
        catalog.resolve_product_type(&first.product_type, &first.subcategory, &first.category)?;
    let brand = catalog.resolve_brand(&first.brand)?;

    let mut input = CreateProductInput {
        title: title.to_owned(),
        description: non_empty(&first.description),
        brand_id: brand.id,
        is_available: true,
        image_urls: placeholder_image_urls(title),
        category_id: category.id.clone(),
        subcategory_id: subcategory.id.clone(),
        product_type_id: product_type.id.clone(),
        price: None,
        compare_at_price: None,
        quantity: None,
        weight: None,
        length: None,
        width: None,
        height: None,
        origin_country: None,
        hs_code: None,
        meta_title: non_empty(&first.meta_title),
        meta_description: non_empty(&first.meta_description),
        meta_keywords: split_keywords(&first.meta_keywords),
        options: Vec::new(),
        variants: Vec::new(),
    };

    if !first.has_variants() {
        // extra rows under the same title are ignored for flat products
        input.price = Some(parse_money_cents(&first.price));
        input.compare_at_price = Some(parse_money_cents(&first.compare_at_price)).filter(|&c| c > 0);
        input.quantity = Some(parse_number_or_zero(&first.quantity));
        input.weight = Some(parse_number_or_zero(&first.weight));
        input.length = Some(parse_number_or_zero(&first.length));
        input.width = Some(parse_number_or_zero(&first.width));
        input.height = Some(parse_number_or_zero(&first.height));
        input.origin_country = non_empty(&first.origin_country);
        input.hs_code = non_empty(&first.hs_code);
        return Ok(input);
    }

    // distinct option names and values across all rows, first-seen order
    let mut options: Vec<CreateOptionInput> = Vec::new();
    for row in rows {
        for (name, value) in row.option_slots() {
            if name.is_empty() || value.is_empty() {
                continue;
            }
            let idx = match options.iter().position(|o| o.name == name) {
                Some(idx) => idx,
                None => {
                    options.push(CreateOptionInput {
                        name: name.to_owned(),
                        values: Vec::new(),
                    });
                    options.len() - 1
                }
            };
            if !options[idx].values.iter().any(|v| v == value) {
                options[idx].values.push(value.to_owned());
            }
        }
    }

    // one variant per row
    let mut variants = Vec::with_capacity(rows.len());
    for row in rows {
        let mut combinations = HashMap::new();
        for (name, value) in row.option_slots() {
            if !name.is_empty() && !value.is_empty() {
                combinations.insert(name.to_owned(), value.to_owned());
            }
        }
        variants.push(CreateVariantInput {
            combinations,
            price: parse_money_cents(&row.price),
            compare_at_price: Some(parse_money_cents(&row.compare_at_price)).filter(|&c| c > 0),
            quantity: parse_number_or_zero(&row.quantity),
            weight: Some(parse_number_or_zero(&row.weight)),
            length: Some(parse_number_or_zero(&row.length)),
            width: Some(parse_number_or_zero(&row.width)),
            height: Some(parse_number_or_zero(&row.height)),
            origin_country: non_empty(&row.origin_country),
            hs_code: non_empty(&row.hs_code),
        });
    }

    input.options = options;
    input.variants = variants;
    Ok(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use once_cell::sync::Lazy;

    static CATALOG: Lazy<Catalog> = Lazy::new(|| Catalog::from_embedded().unwrap());

    fn catalog() -> &'static Catalog {
        &CATALOG
    }

    const HEADER: &str = "Product Title,Product Description,Brand,Meta Title,Meta Description,Meta Keywords,Has Variants,Category,Subcategory,Product Type,Option1 Name,Option1 Value,Option2 Name,Option2 Value,Option3 Name,Option3 Value,Price,Compare At Price,Quantity,Weight (g),Length (cm),Width (cm),Height (cm),Country Code (ISO),HS Code";

    fn csv(rows: &[&str]) -> String {
        let mut out = String::from(HEADER);
        for row in rows {
            out.push('\n');
            out.push_str(row);
        }
        out
    }

    #[test]
    fn two_rows_one_title_become_one_product_with_two_variants() {
        let text = csv(&[
            "Solid Tee,Plain cotton tee,Acme Apparel,,,\"tee, cotton\",true,Clothing,Tops,T-Shirts,Size,S,,,,,19.99,24.99,10,180,30,25,2,IN,6109",
            "Solid Tee,Plain cotton tee,Acme Apparel,,,,true,Clothing,Tops,T-Shirts,Size,M,,,,,21.99,,5,190,31,26,2,IN,6109",
        ]);
        let products = normalize_csv(&text, catalog()).unwrap();
        assert_eq!(products.len(), 1);

        let p = &products[0];
        assert_eq!(p.title, "Solid Tee");
        assert_eq!(p.options.len(), 1);
        assert_eq!(p.options[0].name, "Size");
        assert_eq!(p.options[0].values, vec!["S".to_owned(), "M".to_owned()]);
        assert_eq!(p.variants.len(), 2);
        assert_eq!(p.variants[0].price, 1999);
        assert_eq!(p.variants[0].compare_at_price, Some(2499));
        assert_eq!(p.variants[1].price, 2199);
        assert_eq!(p.variants[1].compare_at_price, None);
        assert_eq!(p.variants[1].combinations["Size"], "M");
        assert!(p.price.is_none());
        assert_eq!(p.meta_keywords, vec!["tee".to_owned(), "cotton".to_owned()]);
    }

    #[test]
    fn flat_product_takes_first_row_and_ignores_the_rest() {
        let text = csv(&[
            "Cast Iron Pan,Heavy pan,Véranda Home,,,,false,Home & Living,Kitchen,Cookware,,,,,,,49.99,,3,2500,30,30,8,FR,7323",
            "Cast Iron Pan,DIFFERENT,Véranda Home,,,,false,Home & Living,Kitchen,Cookware,,,,,,,99.99,,9,,,,,,",
        ]);
        let products = normalize_csv(&text, catalog()).unwrap();
        assert_eq!(products.len(), 1);

        let p = &products[0];
        assert!(p.options.is_empty());
        assert!(p.variants.is_empty());
        assert_eq!(p.price, Some(4999));
        assert_eq!(p.quantity, Some(3));
        assert_eq!(p.origin_country.as_deref(), Some("FR"));
    }

    #[test]
    fn rows_with_empty_titles_are_dropped() {
        let text = csv(&[
            ",x,Acme Apparel,,,,false,Clothing,Tops,T-Shirts,,,,,,,10,,,,,,,,",
            "   ,x,Acme Apparel,,,,false,Clothing,Tops,T-Shirts,,,,,,,10,,,,,,,,",
        ]);
        let products = normalize_csv(&text, catalog()).unwrap();
        assert!(products.is_empty());
    }

    #[test]
    fn titles_differing_in_whitespace_stay_separate_products() {
        let text = csv(&[
            " Tee,,Acme Apparel,,,,false,Clothing,Tops,T-Shirts,,,,,,,10,,,,,,,,",
            "Tee,,Acme Apparel,,,,false,Clothing,Tops,T-Shirts,,,,,,,10,,,,,,,,",
        ]);
        let products = normalize_csv(&text, catalog()).unwrap();
        assert_eq!(products.len(), 2);
        assert_eq!(products[0].title, " Tee");
        assert_eq!(products[1].title, "Tee");
    }

    #[test]
    fn unknown_category_fails_the_whole_import_naming_the_value() {
        let text = csv(&[
            "Solid Tee,,Acme Apparel,,,,false,Clothing,Tops,T-Shirts,,,,,,,19.99,,,,,,,,",
            "Gizmo,,Acme Apparel,,,,false,Gadgets,Tops,T-Shirts,,,,,,,9.99,,,,,,,,",
        ]);
        let err = normalize_csv(&text, catalog()).unwrap_err();
        assert_matches!(err, ServiceError::InvalidInput(_));
        assert!(err.to_string().contains("Category not found: Gadgets"));
    }

    #[test]
    fn taxonomy_names_match_case_and_diacritic_insensitively() {
        let text = csv(&[
            "Solid Tee,,acme apparel,,,,false,CLOTHING,tops,t shirts,,,,,,,19.99,,,,,,,,",
        ]);
        let products = normalize_csv(&text, catalog()).unwrap();
        assert_eq!(products[0].category_id, "clothing");
        assert_eq!(products[0].product_type_id, "t-shirts");
    }

    #[test]
    fn option_values_are_distinct_in_first_seen_order() {
        let text = csv(&[
            "Tee,,Acme Apparel,,,,true,Clothing,Tops,T-Shirts,Size,M,Color,Red,,,10,,,,,,,,",
            "Tee,,Acme Apparel,,,,true,Clothing,Tops,T-Shirts,Size,S,Color,Red,,,10,,,,,,,,",
            "Tee,,Acme Apparel,,,,true,Clothing,Tops,T-Shirts,Size,M,Color,Blue,,,10,,,,,,,,",
        ]);
        let products = normalize_csv(&text, catalog()).unwrap();
        let p = &products[0];
        assert_eq!(p.options.len(), 2);
        assert_eq!(p.options[0].values, vec!["M".to_owned(), "S".to_owned()]);
        assert_eq!(p.options[1].values, vec!["Red".to_owned(), "Blue".to_owned()]);
        assert_eq!(p.variants.len(), 3);
    }

    #[test]
    fn unparsable_money_and_numbers_default_to_zero() {
        let text = csv(&[
            "Tee,,Acme Apparel,,,,false,Clothing,Tops,T-Shirts,,,,,,,not-a-price,nope,many,,,,,,",
        ]);
        let p = &normalize_csv(&text, catalog()).unwrap()[0];
        assert_eq!(p.price, Some(0));
        assert_eq!(p.compare_at_price, None);
        assert_eq!(p.quantity, Some(0));
    }

    #[test]
    fn placeholder_images_are_deterministic() {
        let urls = placeholder_image_urls("Solid Tee");
        assert_eq!(urls.len(), PLACEHOLDER_IMAGE_COUNT);
        assert_eq!(urls[0], "https://picsum.photos/seed/solid-tee0/1500/1500");
        assert_eq!(urls[4], "https://picsum.photos/seed/solid-tee4/1500/1500");
        assert_eq!(urls, placeholder_image_urls("Solid Tee"));
    }

    #[test]
    fn groups_preserve_file_order() {
        let text = csv(&[
            "Bravo,,Acme Apparel,,,,false,Clothing,Tops,T-Shirts,,,,,,,10,,,,,,,,",
            "Alpha,,Acme Apparel,,,,false,Clothing,Tops,T-Shirts,,,,,,,10,,,,,,,,",
            "Bravo,,Acme Apparel,,,,false,Clothing,Tops,T-Shirts,,,,,,,10,,,,,,,,",
        ]);
        let products = normalize_csv(&text, catalog()).unwrap();
        let titles: Vec<&str> = products.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["Bravo", "Alpha"]);
    }
}
