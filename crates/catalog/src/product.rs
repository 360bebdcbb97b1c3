use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bakery_core::{CategoryId, DomainError, DomainResult, Money, ProductId};

/// A sellable product with its finished-goods ("showcase") stock.
///
/// # Invariants
/// - `showcase_stock >= 0`
/// - `base_price >= 0`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub base_price: Money,
    pub category_id: CategoryId,
    pub image_url: Option<String>,
    pub customizable: bool,
    pub showcase_stock: i64,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// Editable product fields, shared by create and update.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProductDraft {
    pub name: String,
    pub description: Option<String>,
    pub base_price: Money,
    pub category_id: CategoryId,
    pub image_url: Option<String>,
    #[serde(default)]
    pub customizable: bool,
    #[serde(default)]
    pub showcase_stock: i64,
}

impl ProductDraft {
    fn validated(mut self) -> DomainResult<Self> {
        self.name = self.name.trim().to_string();
        if self.name.is_empty() {
            return Err(DomainError::validation("product name cannot be empty"));
        }
        self.base_price.ensure_non_negative("base_price")?;
        if self.showcase_stock < 0 {
            return Err(DomainError::validation("showcase_stock cannot be negative"));
        }
        self.description = self.description.filter(|d| !d.trim().is_empty());
        self.image_url = self.image_url.filter(|u| !u.trim().is_empty());
        Ok(self)
    }
}

impl Product {
    pub fn create(draft: ProductDraft, now: DateTime<Utc>) -> DomainResult<Self> {
        let d = draft.validated()?;
        Ok(Self {
            id: ProductId::new(),
            name: d.name,
            description: d.description,
            base_price: d.base_price,
            category_id: d.category_id,
            image_url: d.image_url,
            customizable: d.customizable,
            showcase_stock: d.showcase_stock,
            active: true,
            created_at: now,
        })
    }

    /// Replace all editable fields.
    pub fn update(&mut self, draft: ProductDraft) -> DomainResult<()> {
        let d = draft.validated()?;
        self.name = d.name;
        self.description = d.description;
        self.base_price = d.base_price;
        self.category_id = d.category_id;
        self.image_url = d.image_url;
        self.customizable = d.customizable;
        self.showcase_stock = d.showcase_stock;
        Ok(())
    }

    /// Soft delete: hidden from the storefront, kept for order history.
    pub fn deactivate(&mut self) {
        self.active = false;
    }

    pub fn ensure_sellable(&self) -> DomainResult<()> {
        if !self.active {
            return Err(DomainError::conflict(format!(
                "product '{}' is no longer sold",
                self.name
            )));
        }
        Ok(())
    }

    /// Take `quantity` units out of the showcase (a sale).
    pub fn withdraw(&mut self, quantity: i64) -> DomainResult<()> {
        if quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        if self.showcase_stock < quantity {
            return Err(DomainError::conflict(format!(
                "insufficient stock for product '{}' (available {}, requested {})",
                self.name, self.showcase_stock, quantity
            )));
        }
        self.showcase_stock -= quantity;
        Ok(())
    }

    /// Put `quantity` units into the showcase (production output or a cancelled sale).
    pub fn restock(&mut self, quantity: i64) -> DomainResult<()> {
        if quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        self.showcase_stock = self
            .showcase_stock
            .checked_add(quantity)
            .ok_or_else(|| DomainError::invariant("stock overflow"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn draft(stock: i64) -> ProductDraft {
        ProductDraft {
            name: "Torta de chocolate".to_string(),
            description: Some("  ".to_string()),
            base_price: Money::from_cents(4500),
            category_id: CategoryId::new(),
            image_url: None,
            customizable: true,
            showcase_stock: stock,
        }
    }

    #[test]
    fn create_validates_and_activates() {
        let p = Product::create(draft(3), Utc::now()).unwrap();
        assert!(p.active);
        assert_eq!(p.description, None);
        assert_eq!(p.showcase_stock, 3);
    }

    #[test]
    fn negative_prices_and_stock_are_rejected() {
        let mut d = draft(0);
        d.base_price = Money::from_cents(-1);
        assert!(Product::create(d, Utc::now()).is_err());
        assert!(Product::create(draft(-1), Utc::now()).is_err());
    }

    #[test]
    fn withdraw_refuses_to_oversell() {
        let mut p = Product::create(draft(2), Utc::now()).unwrap();
        let err = p.withdraw(3).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
        assert_eq!(p.showcase_stock, 2);

        p.withdraw(2).unwrap();
        assert_eq!(p.showcase_stock, 0);
    }

    #[test]
    fn inactive_products_are_not_sellable() {
        let mut p = Product::create(draft(5), Utc::now()).unwrap();
        p.deactivate();
        assert!(p.ensure_sellable().is_err());
    }

    proptest! {
        #[test]
        fn stock_never_goes_negative(initial in 0i64..100, ops in proptest::collection::vec(-20i64..20, 0..40)) {
            let mut p = Product::create(draft(initial), Utc::now()).unwrap();
            for op in ops {
                let _ = if op < 0 { p.withdraw(-op) } else { p.restock(op) };
                prop_assert!(p.showcase_stock >= 0);
            }
        }
    }
}
