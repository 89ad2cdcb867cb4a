use serde::{Deserialize, Serialize};

use crate::domain::product::Product;

pub const BASE_SLOT: &str = "base";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutfitItem {
    pub slot: String,
    pub product: Product,
    pub compatibility_score: f64,
    pub rank_score: f64,
}

/// One complete look: the base product plus exactly one product per slot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Outfit {
    pub base: Product,
    pub items: Vec<OutfitItem>,
    pub outfit_score: f64,
    pub total_price: f64,
}

impl Outfit {
    pub fn slot(&self, name: &str) -> Option<&Product> {
        if name == BASE_SLOT {
            return Some(&self.base);
        }
        self.items.iter().find(|item| item.slot == name).map(|item| &item.product)
    }

    pub fn products(&self) -> impl Iterator<Item = &Product> {
        std::iter::once(&self.base).chain(self.items.iter().map(|item| &item.product))
    }
}
