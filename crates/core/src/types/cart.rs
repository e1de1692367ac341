//! Shopping cart lines and snapshots.
//!
//! A [`CartSnapshot`] holds at most one [`CartLine`] per product, and every
//! stored line has a quantity of at least one. All mutations go through the
//! snapshot's methods so those invariants cannot be broken from outside.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::ProductId;

/// Display fields for a product, resolved from the catalog by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineDetails {
    /// Product name shown in the cart.
    pub name: String,
    /// Price of a single unit.
    pub unit_price: Decimal,
    /// Image URL or placeholder glyph.
    pub image_ref: String,
}

/// One product's quantity entry within a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: u32,
    pub name: String,
    pub unit_price: Decimal,
    pub image_ref: String,
}

impl CartLine {
    /// Build a line from catalog details.
    #[must_use]
    pub fn new(product_id: ProductId, quantity: u32, details: LineDetails) -> Self {
        Self {
            product_id,
            quantity,
            name: details.name,
            unit_price: details.unit_price,
            image_ref: details.image_ref,
        }
    }

    /// Price of the whole line (`quantity * unit_price`).
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Outcome of [`CartSnapshot::set_quantity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityChange {
    /// The line now has the given quantity.
    Updated(u32),
    /// The line was removed because the requested quantity was not positive.
    Removed,
    /// No line exists for the product; nothing changed.
    Missing,
}

/// The complete set of cart lines for the active identity.
///
/// Lines keep insertion order so views render them stably.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSnapshot {
    lines: Vec<CartLine>,
}

impl CartSnapshot {
    /// Create an empty snapshot.
    #[must_use]
    pub const fn new() -> Self {
        Self { lines: Vec::new() }
    }

    /// Build a snapshot from arbitrary lines, restoring the invariants.
    ///
    /// Lines with a zero quantity are dropped and duplicate products are merged
    /// by summing their quantities (the first occurrence keeps its display fields).
    #[must_use]
    pub fn from_lines(lines: impl IntoIterator<Item = CartLine>) -> Self {
        let mut snapshot = Self::new();
        for line in lines {
            if line.quantity == 0 {
                continue;
            }
            match snapshot.line_mut(line.product_id) {
                Some(existing) => {
                    existing.quantity = existing.quantity.saturating_add(line.quantity);
                }
                None => snapshot.lines.push(line),
            }
        }
        snapshot
    }

    /// All lines, in insertion order.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Iterate over the lines.
    pub fn iter(&self) -> std::slice::Iter<'_, CartLine> {
        self.lines.iter()
    }

    /// Look up the line for a product.
    #[must_use]
    pub fn get(&self, product_id: ProductId) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.product_id == product_id)
    }

    fn line_mut(&mut self, product_id: ProductId) -> Option<&mut CartLine> {
        self.lines.iter_mut().find(|l| l.product_id == product_id)
    }

    /// Number of distinct products in the cart.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Returns `true` if the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Add one unit of a product.
    ///
    /// An existing line is incremented and keeps its display fields; otherwise a
    /// new line with quantity 1 is appended. Returns the line's new quantity.
    pub fn add_line(&mut self, product_id: ProductId, details: LineDetails) -> u32 {
        if let Some(line) = self.line_mut(product_id) {
            line.quantity = line.quantity.saturating_add(1);
            return line.quantity;
        }
        self.lines.push(CartLine::new(product_id, 1, details));
        1
    }

    /// Remove a product's line, returning it if it was present.
    pub fn remove_line(&mut self, product_id: ProductId) -> Option<CartLine> {
        let index = self.lines.iter().position(|l| l.product_id == product_id)?;
        Some(self.lines.remove(index))
    }

    /// Overwrite a line's quantity.
    ///
    /// A quantity of zero or less removes the line, exactly like
    /// [`remove_line`](Self::remove_line). Unknown products are left alone.
    pub fn set_quantity(&mut self, product_id: ProductId, quantity: i64) -> QuantityChange {
        if quantity <= 0 {
            return match self.remove_line(product_id) {
                Some(_) => QuantityChange::Removed,
                None => QuantityChange::Missing,
            };
        }
        let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
        match self.line_mut(product_id) {
            Some(line) => {
                line.quantity = quantity;
                QuantityChange::Updated(quantity)
            }
            None => QuantityChange::Missing,
        }
    }

    /// Remove every line.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Sum of all quantities.
    #[must_use]
    pub fn total_items(&self) -> u64 {
        self.lines.iter().map(|l| u64::from(l.quantity)).sum()
    }

    /// Sum of `quantity * unit_price` over all lines.
    #[must_use]
    pub fn total_price(&self) -> Decimal {
        self.lines.iter().map(CartLine::line_total).sum()
    }
}

impl<'a> IntoIterator for &'a CartSnapshot {
    type Item = &'a CartLine;
    type IntoIter = std::slice::Iter<'a, CartLine>;

    fn into_iter(self) -> Self::IntoIter {
        self.lines.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details(name: &str, price: i64) -> LineDetails {
        LineDetails {
            name: name.to_string(),
            unit_price: Decimal::from(price),
            image_ref: "🫒".to_string(),
        }
    }

    fn assert_invariants(snapshot: &CartSnapshot) {
        let mut seen = std::collections::HashSet::new();
        for line in snapshot {
            assert!(line.quantity >= 1, "line {} has zero quantity", line.product_id);
            assert!(
                seen.insert(line.product_id),
                "duplicate line for {}",
                line.product_id
            );
        }
    }

    #[test]
    fn test_add_same_product_twice_increments() {
        let mut cart = CartSnapshot::new();
        assert_eq!(cart.add_line(ProductId::new(1), details("Extra Virgin", 1000)), 1);
        assert_eq!(cart.add_line(ProductId::new(1), details("Extra Virgin", 1000)), 2);

        assert_eq!(cart.len(), 1);
        assert_eq!(cart.get(ProductId::new(1)).map(|l| l.quantity), Some(2));
    }

    #[test]
    fn test_add_keeps_original_display_fields() {
        let mut cart = CartSnapshot::new();
        cart.add_line(ProductId::new(1), details("Old Name", 1000));
        cart.add_line(ProductId::new(1), details("New Name", 1200));

        let line = cart.get(ProductId::new(1)).cloned();
        assert_eq!(line.as_ref().map(|l| l.name.as_str()), Some("Old Name"));
        assert_eq!(line.map(|l| l.unit_price), Some(Decimal::from(1000)));
    }

    #[test]
    fn test_set_quantity_zero_equals_remove() {
        let mut by_set = CartSnapshot::new();
        by_set.add_line(ProductId::new(1), details("A", 10));
        by_set.add_line(ProductId::new(2), details("B", 20));
        let mut by_remove = by_set.clone();

        assert_eq!(by_set.set_quantity(ProductId::new(1), 0), QuantityChange::Removed);
        assert!(by_remove.remove_line(ProductId::new(1)).is_some());

        assert_eq!(by_set, by_remove);
    }

    #[test]
    fn test_set_quantity_negative_removes() {
        let mut cart = CartSnapshot::new();
        cart.add_line(ProductId::new(1), details("A", 10));
        assert_eq!(cart.set_quantity(ProductId::new(1), -3), QuantityChange::Removed);
        assert!(cart.is_empty());
    }

    #[test]
    fn test_set_quantity_unknown_product_is_noop() {
        let mut cart = CartSnapshot::new();
        cart.add_line(ProductId::new(1), details("A", 10));
        let before = cart.clone();

        assert_eq!(cart.set_quantity(ProductId::new(9), 4), QuantityChange::Missing);
        assert_eq!(cart.set_quantity(ProductId::new(9), 0), QuantityChange::Missing);
        assert_eq!(cart, before);
    }

    #[test]
    fn test_set_quantity_overwrites() {
        let mut cart = CartSnapshot::new();
        cart.add_line(ProductId::new(1), details("A", 10));
        assert_eq!(
            cart.set_quantity(ProductId::new(1), 5),
            QuantityChange::Updated(5)
        );
        assert_eq!(cart.total_items(), 5);
    }

    #[test]
    fn test_remove_absent_leaves_snapshot_unchanged() {
        let mut cart = CartSnapshot::new();
        cart.add_line(ProductId::new(1), details("A", 10));
        let before = cart.clone();

        assert!(cart.remove_line(ProductId::new(2)).is_none());
        assert_eq!(cart, before);
    }

    #[test]
    fn test_totals() {
        let mut cart = CartSnapshot::new();
        cart.add_line(ProductId::new(1), details("A", 1000));
        cart.add_line(ProductId::new(1), details("A", 1000));
        cart.add_line(ProductId::new(2), details("B", 250));

        assert_eq!(cart.total_items(), 3);
        assert_eq!(cart.total_price(), Decimal::from(2250));
    }

    #[test]
    fn test_empty_totals_are_zero() {
        let cart = CartSnapshot::new();
        assert_eq!(cart.total_items(), 0);
        assert_eq!(cart.total_price(), Decimal::ZERO);
    }

    #[test]
    fn test_from_lines_merges_duplicates_and_drops_zero() {
        let cart = CartSnapshot::from_lines([
            CartLine::new(ProductId::new(1), 2, details("A", 10)),
            CartLine::new(ProductId::new(2), 0, details("B", 10)),
            CartLine::new(ProductId::new(1), 3, details("A again", 99)),
        ]);

        assert_eq!(cart.len(), 1);
        let line = cart.get(ProductId::new(1));
        assert_eq!(line.map(|l| l.quantity), Some(5));
        assert_eq!(line.map(|l| l.name.as_str()), Some("A"));
    }

    #[test]
    fn test_mixed_operation_sequences_keep_invariants() {
        let mut cart = CartSnapshot::new();
        // Deterministic pseudo-random walk over a small product space.
        let mut seed: u32 = 17;
        for _ in 0..500 {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            let product = ProductId::new(i32::try_from(seed % 4).unwrap_or(0));
            match (seed >> 8) % 3 {
                0 => {
                    cart.add_line(product, details("P", 5));
                }
                1 => {
                    cart.remove_line(product);
                }
                _ => {
                    let quantity = i64::from((seed >> 12) % 7) - 2;
                    cart.set_quantity(product, quantity);
                }
            }
            assert_invariants(&cart);
        }
    }

    #[test]
    fn test_clear_empties() {
        let mut cart = CartSnapshot::new();
        cart.add_line(ProductId::new(1), details("A", 10));
        cart.clear();
        assert!(cart.is_empty());
        assert_eq!(cart.total_items(), 0);
    }
}
