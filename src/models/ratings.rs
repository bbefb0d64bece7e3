use super::{ItemId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// One observed rating. `rating` is on the 1..=5 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingRecord {
    pub user_id: UserId,
    #[serde(rename = "product_id", alias = "item_id")]
    pub item_id: ItemId,
    pub rating: f64,
}

impl RatingRecord {
    pub fn new(user_id: impl Into<UserId>, item_id: ItemId, rating: f64) -> Self {
        Self {
            user_id: user_id.into(),
            item_id,
            rating,
        }
    }
}

/// Sparse user x item rating matrix.
///
/// Only observed pairs are stored, once per user and once per item, so an
/// unrated cell is simply absent. Users and items are kept in ascending order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RatingMatrix {
    users: Vec<UserId>,
    items: Vec<ItemId>,
    user_index: HashMap<UserId, usize>,
    item_index: HashMap<ItemId, usize>,
    /// Per user: (item column, rating), sorted by column.
    by_user: Vec<Vec<(usize, f64)>>,
    /// Per item: (user row, rating), sorted by row.
    by_item: Vec<Vec<(usize, f64)>>,
}

impl RatingMatrix {
    /// Pivots records into the matrix. Repeated (user, item) observations are averaged.
    pub fn from_records(records: &[RatingRecord]) -> Self {
        let mut cells: BTreeMap<(&str, ItemId), (f64, usize)> = BTreeMap::new();
        for record in records {
            let cell = cells
                .entry((record.user_id.as_str(), record.item_id))
                .or_insert((0.0, 0));
            cell.0 += record.rating;
            cell.1 += 1;
        }

        let mut users: Vec<UserId> = cells.keys().map(|(user, _)| user.to_string()).collect();
        users.dedup();
        let mut items: Vec<ItemId> = cells.keys().map(|(_, item)| *item).collect();
        items.sort_unstable();
        items.dedup();

        let user_index: HashMap<UserId, usize> = users
            .iter()
            .enumerate()
            .map(|(row, user)| (user.clone(), row))
            .collect();
        let item_index: HashMap<ItemId, usize> = items
            .iter()
            .enumerate()
            .map(|(col, item)| (*item, col))
            .collect();

        let mut by_user = vec![Vec::new(); users.len()];
        let mut by_item = vec![Vec::new(); items.len()];
        // BTreeMap order is (user, item) ascending, so both lists come out sorted.
        for ((user, item), (sum, count)) in cells {
            let row = user_index[user];
            let col = item_index[&item];
            let rating = sum / count as f64;
            by_user[row].push((col, rating));
            by_item[col].push((row, rating));
        }

        Self {
            users,
            items,
            user_index,
            item_index,
            by_user,
            by_item,
        }
    }

    /// Restricts the matrix to `keep` (in that column order). Every user row is kept,
    /// including users left with no ratings.
    pub fn retain_items(&self, keep: &[ItemId]) -> Self {
        let items: Vec<ItemId> = keep
            .iter()
            .copied()
            .filter(|item| self.item_index.contains_key(item))
            .collect();
        let item_index: HashMap<ItemId, usize> = items
            .iter()
            .enumerate()
            .map(|(col, item)| (*item, col))
            .collect();

        let mut by_user = vec![Vec::new(); self.users.len()];
        let mut by_item = Vec::with_capacity(items.len());
        for (new_col, item) in items.iter().enumerate() {
            let column = self.by_item[self.item_index[item]].clone();
            for &(row, rating) in &column {
                by_user[row].push((new_col, rating));
            }
            by_item.push(column);
        }
        for row in &mut by_user {
            row.sort_by_key(|&(col, _)| col);
        }

        Self {
            users: self.users.clone(),
            items,
            user_index: self.user_index.clone(),
            item_index,
            by_user,
            by_item,
        }
    }

    pub fn n_users(&self) -> usize {
        self.users.len()
    }

    pub fn n_items(&self) -> usize {
        self.items.len()
    }

    /// Number of observed (user, item) cells.
    pub fn n_observed(&self) -> usize {
        self.by_item.iter().map(Vec::len).sum()
    }

    pub fn users(&self) -> &[UserId] {
        &self.users
    }

    pub fn items(&self) -> &[ItemId] {
        &self.items
    }

    pub fn has_user(&self, user_id: &str) -> bool {
        self.user_index.contains_key(user_id)
    }

    pub fn has_item(&self, item_id: ItemId) -> bool {
        self.item_index.contains_key(&item_id)
    }

    pub fn item_column(&self, item_id: ItemId) -> Option<usize> {
        self.item_index.get(&item_id).copied()
    }

    pub fn get(&self, user_id: &str, item_id: ItemId) -> Option<f64> {
        let row = *self.user_index.get(user_id)?;
        let col = *self.item_index.get(&item_id)?;
        self.by_user[row]
            .binary_search_by_key(&col, |&(c, _)| c)
            .ok()
            .map(|pos| self.by_user[row][pos].1)
    }

    /// Items rated by `user_id` with their ratings, in column order.
    pub fn user_ratings(&self, user_id: &str) -> Option<Vec<(ItemId, f64)>> {
        let row = *self.user_index.get(user_id)?;
        Some(
            self.by_user[row]
                .iter()
                .map(|&(col, rating)| (self.items[col], rating))
                .collect(),
        )
    }

    /// Raw column: (user row, rating) pairs sorted by row.
    pub fn item_column_entries(&self, col: usize) -> &[(usize, f64)] {
        &self.by_item[col]
    }

    pub fn rating_count(&self, item_id: ItemId) -> usize {
        self.item_column(item_id)
            .map_or(0, |col| self.by_item[col].len())
    }

    /// Mean observed rating of an item, `None` when nobody rated it.
    pub fn item_mean(&self, item_id: ItemId) -> Option<f64> {
        let column = &self.by_item[self.item_column(item_id)?];
        if column.is_empty() {
            return None;
        }
        Some(column.iter().map(|&(_, r)| r).sum::<f64>() / column.len() as f64)
    }
}
