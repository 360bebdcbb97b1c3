use serde::{Deserialize, Serialize};

use bakery_core::{DomainError, DomainResult, SupplierId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supplier {
    pub id: SupplierId,
    pub business_name: String,
    pub tax_id: Option<String>,
    pub contact_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SupplierDraft {
    pub business_name: String,
    pub tax_id: Option<String>,
    pub contact_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl SupplierDraft {
    fn validated(self) -> DomainResult<Self> {
        let business_name = self.business_name.trim().to_string();
        if business_name.is_empty() {
            return Err(DomainError::validation("business_name cannot be empty"));
        }
        Ok(Self {
            business_name,
            tax_id: blank_to_none(self.tax_id),
            contact_name: blank_to_none(self.contact_name),
            phone: blank_to_none(self.phone),
            email: blank_to_none(self.email),
        })
    }
}

fn blank_to_none(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl Supplier {
    pub fn create(draft: SupplierDraft) -> DomainResult<Self> {
        let d = draft.validated()?;
        Ok(Self {
            id: SupplierId::new(),
            business_name: d.business_name,
            tax_id: d.tax_id,
            contact_name: d.contact_name,
            phone: d.phone,
            email: d.email,
        })
    }

    pub fn update(&mut self, draft: SupplierDraft) -> DomainResult<()> {
        let d = draft.validated()?;
        self.business_name = d.business_name;
        self.tax_id = d.tax_id;
        self.contact_name = d.contact_name;
        self.phone = d.phone;
        self.email = d.email;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_trims_optional_fields() {
        let s = Supplier::create(SupplierDraft {
            business_name: " Molinos del Sur ".into(),
            tax_id: Some("  ".into()),
            contact_name: Some("Ana".into()),
            phone: None,
            email: None,
        })
        .unwrap();
        assert_eq!(s.business_name, "Molinos del Sur");
        assert_eq!(s.tax_id, None);
        assert_eq!(s.contact_name.as_deref(), Some("Ana"));
    }

    #[test]
    fn business_name_is_required() {
        let err = Supplier::create(SupplierDraft {
            business_name: String::new(),
            tax_id: None,
            contact_name: None,
            phone: None,
            email: None,
        })
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
