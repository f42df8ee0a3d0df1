//! Shopping cart stored inside the conversation session.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::num::NonZeroU32;

use crate::catalog::ProductId;

/// Product id to requested quantity.
///
/// Quantities are `NonZeroU32`, so a line item with zero units cannot be
/// stored; dropping a product removes its key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart {
    items: BTreeMap<ProductId, NonZeroU32>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the quantity of a product, replacing any previous quantity
    pub fn set(&mut self, product_id: ProductId, count: NonZeroU32) -> Option<NonZeroU32> {
        self.items.insert(product_id, count)
    }

    pub fn remove(&mut self, product_id: ProductId) -> Option<NonZeroU32> {
        self.items.remove(&product_id)
    }

    pub fn quantity(&self, product_id: ProductId) -> Option<NonZeroU32> {
        self.items.get(&product_id).copied()
    }

    pub fn contains(&self, product_id: ProductId) -> bool {
        self.items.contains_key(&product_id)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn product_ids(&self) -> Vec<ProductId> {
        self.items.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ProductId, NonZeroU32)> + '_ {
        self.items.iter().map(|(id, count)| (*id, *count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn qty(n: u32) -> NonZeroU32 {
        NonZeroU32::new(n).unwrap()
    }

    #[test]
    fn test_set_overwrites_instead_of_accumulating() {
        let mut cart = Cart::new();
        cart.set(ProductId(1), qty(3));
        let previous = cart.set(ProductId(1), qty(2));

        assert_eq!(previous, Some(qty(3)));
        assert_eq!(cart.quantity(ProductId(1)), Some(qty(2)));
        assert_eq!(cart.len(), 1);
    }

    #[test]
    fn test_remove_last_item_leaves_empty_cart() {
        let mut cart = Cart::new();
        cart.set(ProductId(7), qty(1));

        assert_eq!(cart.remove(ProductId(7)), Some(qty(1)));
        assert!(cart.is_empty());
        assert!(!cart.contains(ProductId(7)));
        assert_eq!(cart.remove(ProductId(7)), None);
    }

    #[test]
    fn test_serialized_as_string_keyed_map() {
        let mut cart = Cart::new();
        cart.set(ProductId(2), qty(1));
        cart.set(ProductId(10), qty(4));

        let json = serde_json::to_string(&cart).unwrap();
        assert_eq!(json, r#"{"2":1,"10":4}"#);

        let restored: Cart = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, cart);
    }

    #[test]
    fn test_zero_quantity_rejected_on_load() {
        assert!(serde_json::from_str::<Cart>(r#"{"1":0}"#).is_err());
    }
}
