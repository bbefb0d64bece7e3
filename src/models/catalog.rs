use super::ItemId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const UNKNOWN_VALUE: &str = "Unknown";

/// Categorical attributes in encoding order.
pub const CATEGORICAL_FIELDS: [&str; 7] = [
    "gender",
    "masterCategory",
    "subCategory",
    "articleType",
    "baseColour",
    "season",
    "usage",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    pub id: ItemId,
    pub gender: String,
    pub master_category: String,
    pub sub_category: String,
    pub article_type: String,
    pub base_colour: String,
    pub season: String,
    pub usage: String,
    pub year: i32,
    pub product_display_name: String,
}

impl CatalogItem {
    /// Stand-in record for an id that has ratings but no catalog entry.
    pub fn placeholder(id: ItemId) -> Self {
        Self {
            id,
            gender: UNKNOWN_VALUE.to_string(),
            master_category: UNKNOWN_VALUE.to_string(),
            sub_category: UNKNOWN_VALUE.to_string(),
            article_type: UNKNOWN_VALUE.to_string(),
            base_colour: UNKNOWN_VALUE.to_string(),
            season: UNKNOWN_VALUE.to_string(),
            usage: UNKNOWN_VALUE.to_string(),
            year: 0,
            product_display_name: format!("Item {}", id),
        }
    }

    /// Values of [`CATEGORICAL_FIELDS`], in the same order.
    pub fn categorical_values(&self) -> [&str; 7] {
        [
            &self.gender,
            &self.master_category,
            &self.sub_category,
            &self.article_type,
            &self.base_colour,
            &self.season,
            &self.usage,
        ]
    }
}

/// Fixed, ordered item catalog shared read-only by both engines.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    items: Vec<CatalogItem>,
    index: HashMap<ItemId, usize>,
}

impl Catalog {
    /// Builds the catalog; when an id repeats, the first row wins.
    pub fn new(items: Vec<CatalogItem>) -> Self {
        let mut index = HashMap::with_capacity(items.len());
        for (row, item) in items.iter().enumerate() {
            index.entry(item.id).or_insert(row);
        }
        Self { items, index }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[CatalogItem] {
        &self.items
    }

    pub fn get(&self, id: ItemId) -> Option<&CatalogItem> {
        self.index.get(&id).map(|&row| &self.items[row])
    }

    pub fn row_of(&self, id: ItemId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn distinct_ids(&self) -> usize {
        self.index.len()
    }
}

/// Equality constraints over the categorical attributes; `None` means "any".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureFilter {
    pub gender: Option<String>,
    pub master_category: Option<String>,
    pub sub_category: Option<String>,
    pub article_type: Option<String>,
    pub base_colour: Option<String>,
    pub season: Option<String>,
    pub usage: Option<String>,
}

impl FeatureFilter {
    fn constraints(&self) -> [Option<&str>; 7] {
        [
            self.gender.as_deref(),
            self.master_category.as_deref(),
            self.sub_category.as_deref(),
            self.article_type.as_deref(),
            self.base_colour.as_deref(),
            self.season.as_deref(),
            self.usage.as_deref(),
        ]
    }

    pub fn is_empty(&self) -> bool {
        self.constraints().iter().all(|c| c.map_or(true, str::is_empty))
    }

    pub fn matches(&self, item: &CatalogItem) -> bool {
        self.constraints()
            .iter()
            .zip(item.categorical_values())
            .all(|(wanted, actual)| match wanted {
                Some(value) if !value.is_empty() => *value == actual,
                _ => true,
            })
    }
}
