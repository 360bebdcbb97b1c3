use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bakery_core::{DomainError, DomainResult, Money, OrderId, PaymentId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    Cash,
    Card,
    Transfer,
    DigitalWallet,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::Transfer => "transfer",
            PaymentMethod::DigitalWallet => "digital_wallet",
        }
    }
}

impl core::str::FromStr for PaymentMethod {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cash" => Ok(PaymentMethod::Cash),
            "card" => Ok(PaymentMethod::Card),
            "transfer" => Ok(PaymentMethod::Transfer),
            "digital_wallet" => Ok(PaymentMethod::DigitalWallet),
            other => Err(DomainError::validation(format!("invalid payment method '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Confirmed,
    Rejected,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Confirmed => "confirmed",
            PaymentStatus::Rejected => "rejected",
        }
    }
}

impl core::str::FromStr for PaymentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "confirmed" => Ok(PaymentStatus::Confirmed),
            "rejected" => Ok(PaymentStatus::Rejected),
            other => Err(DomainError::validation(format!("invalid payment status '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub order_id: OrderId,
    pub method: PaymentMethod,
    pub amount: Money,
    pub status: PaymentStatus,
    pub paid_at: DateTime<Utc>,
    pub receipt_url: Option<String>,
}

impl Payment {
    /// The payment row recorded when an order is placed.
    pub fn pending(order_id: OrderId, method: PaymentMethod, amount: Money, now: DateTime<Utc>) -> Self {
        Self {
            id: PaymentId::new(),
            order_id,
            method,
            amount,
            status: PaymentStatus::Pending,
            paid_at: now,
            receipt_url: None,
        }
    }

    pub fn confirm(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if self.status != PaymentStatus::Pending {
            return Err(DomainError::conflict(format!(
                "payment is already {}",
                self.status.as_str()
            )));
        }
        self.status = PaymentStatus::Confirmed;
        self.paid_at = now;
        Ok(())
    }
}
