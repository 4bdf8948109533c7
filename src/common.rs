use rand::Rng;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Converts a dollar amount to integer cents, rounding half up.
pub fn convert_dollar_to_cent(dollars: Decimal) -> i32 {
    (dollars * Decimal::from(100))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i32()
        .unwrap_or(0)
}

/// Converts integer cents back to a dollar amount.
pub fn convert_cent_to_dollar(cents: i32) -> Decimal {
    Decimal::from(cents) / Decimal::from(100)
}

/// Parses a free-form money cell into integer cents.
/// Unparsable input counts as zero rather than failing the row.
pub fn parse_money_cents(raw: &str) -> i32 {
    let cleaned = raw.trim().trim_start_matches('$').replace(',', "");
    match cleaned.parse::<Decimal>() {
        Ok(dollars) => convert_dollar_to_cent(dollars),
        Err(_) => 0,
    }
}

/// Parses a free-form numeric cell, defaulting to zero.
pub fn parse_number_or_zero(raw: &str) -> i32 {
    raw.trim().parse::<f64>().map(|v| v as i32).unwrap_or(0)
}

/// Folds common Latin diacritics to their base letter.
fn fold_diacritic(c: char) -> char {
    match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'è' | 'é' | 'ê' | 'ë' => 'e',
        'ì' | 'í' | 'î' | 'ï' => 'i',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' => 'o',
        'ù' | 'ú' | 'û' | 'ü' => 'u',
        'ý' | 'ÿ' => 'y',
        'ç' => 'c',
        'ñ' => 'n',
        'ß' => 's',
        _ => c,
    }
}

/// Produces a URL-safe slug: lowercase, diacritics folded, every run of
/// non-alphanumeric characters collapsed into a single hyphen.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut last_was_dash = true;

    for c in input.chars().flat_map(char::to_lowercase) {
        let c = fold_diacritic(c);
        if c.is_ascii_alphanumeric() {
            slug.push(c);
            last_was_dash = false;
        } else if !last_was_dash {
            slug.push('-');
            last_was_dash = true;
        }
    }

    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Generates a unique product slug from the brand name and title.
/// A timestamp plus a random suffix keeps re-imports of the same
/// product from colliding.
pub fn generate_product_slug(brand_name: &str, title: &str) -> String {
    let timestamp = chrono::Utc::now().timestamp_millis();
    let suffix: u32 = rand::thread_rng().gen_range(1000..10000);
    slugify(&format!("{} {} {} {}", brand_name, title, timestamp, suffix))
}
