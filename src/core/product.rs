//! Observed product records and query identifiers.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Normalized SKU identifier (trimmed, uppercased).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SkuQuery(String);

impl SkuQuery {
    /// Normalize a raw SKU string.
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_uppercase())
    }

    /// Borrow the normalized value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the normalized value is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for SkuQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SkuQuery {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

/// One purchasable size of a product.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableSize {
    /// Size label as shown by the shop.
    pub name: String,
    /// Units available to sell.
    pub amount_in_stock: u32,
}

impl AvailableSize {
    /// Convenience constructor.
    pub fn new(name: impl Into<String>, amount_in_stock: u32) -> Self {
        Self {
            name: name.into(),
            amount_in_stock,
        }
    }
}

/// A product as observed by one fetch.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSnapshot {
    /// Shop SKU, as returned by the fetcher.
    pub sku: String,
    /// Display title.
    pub title: String,
    /// Canonical product page.
    pub product_url: String,
    /// Whether the product can currently be bought.
    pub available_for_sale: bool,
    /// Sizes in stock.
    pub available_sizes: Vec<AvailableSize>,
    /// Price as the raw string reported by the shop.
    pub price: String,
    /// Primary product image.
    pub image_url: String,
    /// Normalized brand/title/color string used only for keyword matching.
    pub identifier: String,
}

impl ProductSnapshot {
    /// Normalized SKU of this snapshot.
    #[must_use]
    pub fn sku_query(&self) -> SkuQuery {
        SkuQuery::new(&self.sku)
    }
}

/// Entry of the new-arrivals listing, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceRecord {
    /// Listing product id, used as the "last seen" marker.
    pub pid: String,
    /// Shop SKU of the listed product.
    pub sku: String,
}

/// Sort sizes by alphabetic prefix, then numerically, then lexicographically.
///
/// `"EU 40"` < `"EU 40.5"` < `"EU 41"`, and numeric labels sort before
/// purely alphabetic ones sharing the same prefix.
pub fn sort_available_sizes(sizes: &mut [AvailableSize]) {
    sizes.sort_by(|a, b| compare_size_names(&a.name, &b.name));
}

fn compare_size_names(a: &str, b: &str) -> Ordering {
    let (prefix_a, num_a) = split_size(a);
    let (prefix_b, num_b) = split_size(b);

    if prefix_a != prefix_b {
        return prefix_a.cmp(prefix_b);
    }

    match (num_a, num_b) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

/// Split a size label into its leading non-digit prefix and numeric part.
/// A single `.` or `,` is accepted as decimal separator.
fn split_size(size: &str) -> (&str, Option<f64>) {
    let start = size
        .find(|c: char| c.is_ascii_digit())
        .unwrap_or(size.len());

    let mut end = start;
    let mut seen_separator = false;
    for (offset, c) in size[start..].char_indices() {
        if c.is_ascii_digit() {
            end = start + offset + 1;
        } else if !seen_separator && (c == '.' || c == ',') {
            seen_separator = true;
            end = start + offset + 1;
        } else {
            break;
        }
    }

    let prefix = size[..start].trim();
    let numeric = size[start..end]
        .trim()
        .trim_end_matches(['.', ','])
        .replace(',', ".");

    (prefix, numeric.parse::<f64>().ok())
}
