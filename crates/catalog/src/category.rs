use serde::{Deserialize, Serialize};

use bakery_core::{CategoryId, DomainError, DomainResult};

/// Storefront grouping of products (cakes, breads, desserts, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub image_url: Option<String>,
    pub active: bool,
}

impl Category {
    pub fn new(name: &str, image_url: Option<String>) -> DomainResult<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("category name cannot be empty"));
        }
        Ok(Self {
            id: CategoryId::new(),
            name: name.to_string(),
            image_url: image_url.filter(|u| !u.trim().is_empty()),
            active: true,
        })
    }
}
