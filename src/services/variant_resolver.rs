use crate::models::product::{CatalogProduct, Offering, ProductOption, ProductVariant};
use std::collections::HashMap;
use uuid::Uuid;

/// Partial choice of option values: optionId -> valueId.
pub type Selection = HashMap<Uuid, Uuid>;

/// Resolves option selections against a product's variant matrix.
/// Pure lookup logic over an already-loaded offering, no I/O.
pub struct VariantResolver<'a> {
    options: &'a [ProductOption],
    variants: &'a [ProductVariant],
}

impl<'a> VariantResolver<'a> {
    pub fn new(options: &'a [ProductOption], variants: &'a [ProductVariant]) -> Self {
        Self { options, variants }
    }

    /// Returns a resolver for variant products, `None` for simple ones.
    pub fn for_product(product: &'a CatalogProduct) -> Option<Self> {
        match &product.offering {
            Offering::WithVariants { options, variants } => {
                Some(Self::new(options, variants))
            }
            Offering::Simple { .. } => None,
        }
    }

    /// True when the variant agrees with the selection on every selected key.
    fn matches(variant: &ProductVariant, selection: &Selection) -> bool {
        selection
            .iter()
            .all(|(option_id, value_id)| variant.combinations.get(option_id) == Some(value_id))
    }

    fn covers_all_options(&self, selection: &Selection) -> bool {
        self.options.iter().all(|o| selection.contains_key(&o.id))
    }

    /// Resolves a selection to its unique variant. A selection that leaves
    /// any option unpinned never resolves, even when only one variant could
    /// match it.
    pub fn find_variant(&self, selection: &Selection) -> Option<&'a ProductVariant> {
        if !self.covers_all_options(selection) {
            return None;
        }
        self.variants.iter().find(|v| Self::matches(v, selection))
    }

    /// Whether choosing `value_id` for `option_id` on top of the current
    /// selection still leads to at least one variant.
    pub fn is_value_available(
        &self,
        option_id: Uuid,
        value_id: Uuid,
        selection: &Selection,
    ) -> bool {
        let mut extended = selection.clone();
        extended.insert(option_id, value_id);
        self.variants.iter().any(|v| Self::matches(v, &extended))
    }

    /// Total stock across the variants reachable by choosing `value_id`
    /// for `option_id` on top of the current selection. Zero means the
    /// value is selectable but nothing is purchasable.
    pub fn stock_for_value(&self, option_id: Uuid, value_id: Uuid, selection: &Selection) -> i64 {
        let mut extended = selection.clone();
        extended.insert(option_id, value_id);
        self.variants
            .iter()
            .filter(|v| Self::matches(v, &extended))
            .map(|v| v.quantity as i64)
            .sum()
    }

    /// Price in cents for the current selection: the resolved variant's
    /// price when fully pinned, otherwise the minimum variant price.
    pub fn effective_price(&self, selection: &Selection) -> i32 {
        match self.find_variant(selection) {
            Some(v) => v.price,
            None => self.variants.iter().map(|v| v.price).min().unwrap_or(0),
        }
    }

    /// Compare-at price to display, only for a fully resolved variant and
    /// only when it exceeds the actual price.
    pub fn display_compare_at(&self, selection: &Selection) -> Option<i32> {
        let variant = self.find_variant(selection)?;
        variant
            .compare_at_price
            .filter(|&compare_at| compare_at > variant.price)
    }
}
