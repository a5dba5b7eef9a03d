use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::utils::{fits_unit, MAX_PRICE, MAX_QUANTITY};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Category {
    pub id: Uuid,
    pub shop_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub name: String,
    pub name_tamil: Option<String>,
    pub image_url: Option<String>,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryNode {
    #[serde(flatten)]
    pub category: Category,
    pub children: Vec<CategoryNode>,
}

#[derive(Debug, Deserialize)]
pub struct CategoryInput {
    pub name: String,
    pub name_tamil: Option<String>,
    pub parent_id: Option<Uuid>,
    pub sort_order: Option<i32>,
}

/// Nests a flat category list.
///
/// Siblings keep `sort_order`, then name. A category whose parent is not in
/// the list is treated as a root.
pub fn build_category_tree(categories: Vec<Category>) -> Vec<CategoryNode> {
    let known: HashSet<Uuid> = categories.iter().map(|c| c.id).collect();
    let mut by_parent: HashMap<Option<Uuid>, Vec<Category>> = HashMap::new();

    for category in categories {
        let parent = category.parent_id.filter(|p| known.contains(p) && *p != category.id);
        by_parent.entry(parent).or_default().push(category);
    }

    fn attach(
        parent: Option<Uuid>,
        by_parent: &mut HashMap<Option<Uuid>, Vec<Category>>,
    ) -> Vec<CategoryNode> {
        let mut siblings = by_parent.remove(&parent).unwrap_or_default();
        sort_siblings(&mut siblings);

        siblings
            .into_iter()
            .map(|category| {
                let children = attach(Some(category.id), by_parent);
                CategoryNode { category, children }
            })
            .collect()
    }

    let mut roots = attach(None, &mut by_parent);

    // Categories caught in a parent cycle are unreachable from a root.
    let mut stranded: Vec<Category> = by_parent.into_values().flatten().collect();
    sort_siblings(&mut stranded);
    roots.extend(stranded.into_iter().map(|category| CategoryNode {
        category,
        children: Vec::new(),
    }));

    roots
}

fn sort_siblings(categories: &mut [Category]) {
    categories.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then_with(|| a.name.cmp(&b.name)));
}

/// Ids of `root` and every category below it.
pub fn descendant_ids(categories: &[Category], root: Uuid) -> HashSet<Uuid> {
    let mut found = HashSet::from([root]);
    let mut frontier = vec![root];

    while let Some(id) = frontier.pop() {
        for child in categories.iter().filter(|c| c.parent_id == Some(id)) {
            if found.insert(child.id) {
                frontier.push(child.id);
            }
        }
    }

    found
}

/// Whether moving `category_id` under `new_parent` would create a cycle.
pub fn creates_cycle(categories: &[Category], category_id: Uuid, new_parent: Option<Uuid>) -> bool {
    match new_parent {
        Some(parent) => descendant_ids(categories, category_id).contains(&parent),
        None => false,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Brand {
    pub id: Uuid,
    pub shop_id: Uuid,
    pub name: String,
    pub name_tamil: Option<String>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct BrandInput {
    pub name: String,
    pub name_tamil: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PriceType {
    pub id: Uuid,
    pub shop_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct PriceTypeInput {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub id: Uuid,
    pub shop_id: Uuid,
    pub category_id: Option<Uuid>,
    pub brand_id: Option<Uuid>,
    pub sku: Option<String>,
    pub barcode: Option<String>,
    pub name: String,
    pub name_tamil: Option<String>,
    pub description: Option<String>,
    pub mrp: Decimal,
    pub cost_price: Decimal,
    pub default_selling_price: Decimal,
    pub gst_percent: Decimal,
    pub hsn_code: Option<String>,
    pub unit: String,
    pub track_inventory: bool,
    pub stock_quantity: Decimal,
    pub low_stock_threshold: Decimal,
    pub image_url: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProductPrice {
    pub id: Uuid,
    pub product_id: Uuid,
    pub price_type_id: Uuid,
    pub selling_price: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ProductWithPrices {
    #[serde(flatten)]
    pub product: Product,
    pub prices: Vec<ProductPrice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PriceInput {
    pub price_type_id: Uuid,
    pub selling_price: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductInput {
    pub category_id: Option<Uuid>,
    pub brand_id: Option<Uuid>,
    pub sku: Option<String>,
    pub barcode: Option<String>,
    pub name: String,
    pub name_tamil: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub mrp: Decimal,
    #[serde(default)]
    pub cost_price: Decimal,
    #[serde(default)]
    pub default_selling_price: Decimal,
    #[serde(default)]
    pub gst_percent: Decimal,
    pub hsn_code: Option<String>,
    pub unit: Option<String>,
    #[serde(default)]
    pub track_inventory: bool,
    #[serde(default)]
    pub stock_quantity: Decimal,
    #[serde(default)]
    pub low_stock_threshold: Decimal,
    pub is_active: Option<bool>,
    #[serde(default)]
    pub prices: Vec<PriceInput>,
}

impl ProductInput {
    /// Checks the numeric fields and returns the stock pair to persist.
    ///
    /// Untracked products always store zero stock and threshold.
    pub fn validated_stock(&self) -> Result<(Decimal, Decimal), String> {
        if self.name.trim().is_empty() {
            return Err("Product name is required".to_string());
        }
        for (label, value) in [
            ("MRP", self.mrp),
            ("Cost price", self.cost_price),
            ("Selling price", self.default_selling_price),
        ] {
            if value.is_sign_negative() && !value.is_zero() {
                return Err(format!("{} cannot be negative", label));
            }
            if value > MAX_PRICE {
                return Err(format!("{} cannot exceed {}", label, MAX_PRICE));
            }
        }
        if self.gst_percent < Decimal::ZERO || self.gst_percent > Decimal::ONE_HUNDRED {
            return Err("GST percent must be between 0 and 100".to_string());
        }
        if self.prices.iter().any(|p| p.selling_price < Decimal::ZERO) {
            return Err("Selling price cannot be negative".to_string());
        }
        if self.prices.iter().any(|p| p.selling_price > MAX_PRICE) {
            return Err(format!("Selling price cannot exceed {}", MAX_PRICE));
        }

        if !self.track_inventory {
            return Ok((Decimal::ZERO, Decimal::ZERO));
        }
        if self.stock_quantity < Decimal::ZERO || self.low_stock_threshold < Decimal::ZERO {
            return Err("Stock quantities cannot be negative".to_string());
        }
        if self.stock_quantity > MAX_QUANTITY || self.low_stock_threshold > MAX_QUANTITY {
            return Err(format!("Stock quantities cannot exceed {}", MAX_QUANTITY));
        }
        let unit = self.unit_or_default();
        if !fits_unit(&unit, self.stock_quantity) || !fits_unit(&unit, self.low_stock_threshold) {
            return Err(format!("Stock for {} must be a whole number", unit));
        }
        Ok((self.stock_quantity, self.low_stock_threshold))
    }

    pub fn unit_or_default(&self) -> String {
        self.unit
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .unwrap_or("pcs")
            .to_lowercase()
    }
}

/// Selling price for a product under a price type.
///
/// Falls back from the requested type to the shop default type, then to the
/// product's default selling price.
pub fn resolve_unit_price(
    product: &Product,
    prices: &[ProductPrice],
    requested_type: Option<Uuid>,
    default_type: Option<Uuid>,
) -> Decimal {
    [requested_type, default_type]
        .into_iter()
        .flatten()
        .find_map(|type_id| {
            prices
                .iter()
                .find(|p| p.product_id == product.id && p.price_type_id == type_id)
                .map(|p| p.selling_price)
        })
        .unwrap_or(product.default_selling_price)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn product(name: &str, price: Decimal, gst: Decimal) -> Product {
        let now = Utc::now();
        Product {
            id: Uuid::new_v4(),
            shop_id: Uuid::nil(),
            category_id: None,
            brand_id: None,
            sku: None,
            barcode: None,
            name: name.to_string(),
            name_tamil: None,
            description: None,
            mrp: price,
            cost_price: price,
            default_selling_price: price,
            gst_percent: gst,
            hsn_code: None,
            unit: "pcs".to_string(),
            track_inventory: false,
            stock_quantity: Decimal::ZERO,
            low_stock_threshold: Decimal::ZERO,
            image_url: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn category(name: &str, parent_id: Option<Uuid>, sort_order: i32) -> Category {
        let now = Utc::now();
        Category {
            id: Uuid::new_v4(),
            shop_id: Uuid::nil(),
            parent_id,
            name: name.to_string(),
            name_tamil: None,
            image_url: None,
            sort_order,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::{category, product};
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn tree_nests_children_in_sort_order() {
        let groceries = category("Groceries", None, 1);
        let dairy = category("Dairy", None, 0);
        let rice = category("Rice", Some(groceries.id), 2);
        let dal = category("Dal", Some(groceries.id), 1);
        let basmati = category("Basmati", Some(rice.id), 0);

        let tree = build_category_tree(vec![rice.clone(), groceries.clone(), basmati, dal, dairy]);

        let roots: Vec<_> = tree.iter().map(|n| n.category.name.as_str()).collect();
        assert_eq!(roots, ["Dairy", "Groceries"]);
        let children: Vec<_> = tree[1].children.iter().map(|n| n.category.name.as_str()).collect();
        assert_eq!(children, ["Dal", "Rice"]);
        assert_eq!(tree[1].children[1].children[0].category.name, "Basmati");
    }

    #[test]
    fn orphaned_category_becomes_root() {
        let orphan = category("Orphan", Some(Uuid::new_v4()), 0);
        let tree = build_category_tree(vec![orphan]);
        assert_eq!(tree.len(), 1);
        assert!(tree[0].children.is_empty());
    }

    #[test]
    fn categories_in_a_parent_cycle_are_still_listed() {
        let mut a = category("A", None, 0);
        let b = category("B", Some(a.id), 0);
        a.parent_id = Some(b.id);

        let tree = build_category_tree(vec![a, b]);
        let names: Vec<_> = tree.iter().map(|n| n.category.name.as_str()).collect();
        assert_eq!(names, ["A", "B"]);
    }

    #[test]
    fn cannot_move_category_under_itself_or_descendant() {
        let root = category("Root", None, 0);
        let child = category("Child", Some(root.id), 0);
        let grandchild = category("Grandchild", Some(child.id), 0);
        let other = category("Other", None, 1);
        let all = vec![root.clone(), child.clone(), grandchild.clone(), other.clone()];

        assert!(creates_cycle(&all, root.id, Some(root.id)));
        assert!(creates_cycle(&all, root.id, Some(grandchild.id)));
        assert!(!creates_cycle(&all, grandchild.id, Some(other.id)));
        assert!(!creates_cycle(&all, child.id, None));
    }

    #[test]
    fn unit_price_prefers_requested_then_default_type() {
        let item = product("Tea", dec!(100), dec!(5));
        let wholesale = Uuid::new_v4();
        let retail = Uuid::new_v4();
        let now = Utc::now();
        let price = |type_id, amount| ProductPrice {
            id: Uuid::new_v4(),
            product_id: item.id,
            price_type_id: type_id,
            selling_price: amount,
            created_at: now,
            updated_at: now,
        };
        let prices = vec![price(wholesale, dec!(90)), price(retail, dec!(98))];

        assert_eq!(resolve_unit_price(&item, &prices, Some(wholesale), Some(retail)), dec!(90));
        assert_eq!(resolve_unit_price(&item, &prices, Some(Uuid::new_v4()), Some(retail)), dec!(98));
        assert_eq!(resolve_unit_price(&item, &[], Some(wholesale), Some(retail)), dec!(100));
    }

    #[test]
    fn untracked_products_store_zero_stock() {
        let input = ProductInput {
            category_id: None,
            brand_id: None,
            sku: None,
            barcode: None,
            name: "Soap".to_string(),
            name_tamil: None,
            description: None,
            mrp: dec!(40),
            cost_price: dec!(30),
            default_selling_price: dec!(38),
            gst_percent: dec!(18),
            hsn_code: None,
            unit: Some(" PCS ".to_string()),
            track_inventory: false,
            stock_quantity: dec!(12),
            low_stock_threshold: dec!(3),
            is_active: None,
            prices: Vec::new(),
        };

        assert_eq!(input.validated_stock(), Ok((Decimal::ZERO, Decimal::ZERO)));
        assert_eq!(input.unit_or_default(), "pcs");

        let tracked = ProductInput { track_inventory: true, ..input };
        assert_eq!(tracked.validated_stock(), Ok((dec!(12), dec!(3))));

        let fractional = ProductInput { stock_quantity: dec!(1.5), ..tracked.clone() };
        assert_eq!(
            fractional.validated_stock(),
            Err("Stock for pcs must be a whole number".to_string())
        );
        let loose_rice = ProductInput {
            unit: Some("kg".to_string()),
            stock_quantity: dec!(1.5),
            ..tracked.clone()
        };
        assert_eq!(loose_rice.validated_stock(), Ok((dec!(1.5), dec!(3))));

        let huge_stock = ProductInput { stock_quantity: Decimal::MAX, ..tracked.clone() };
        assert!(huge_stock.validated_stock().is_err());
        let huge_price = ProductInput { mrp: MAX_PRICE + dec!(1), ..tracked.clone() };
        assert!(huge_price.validated_stock().is_err());

        let bad_gst = ProductInput { gst_percent: dec!(120), ..tracked };
        assert!(bad_gst.validated_stock().is_err());
    }
}
