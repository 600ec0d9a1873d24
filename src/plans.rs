//! Premium plan catalog shown on the membership page.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::checkout::model::{BillingCycle, PlanSelection};

/// A purchasable subscription plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Plan {
    pub id: String,
    pub name: String,
    pub monthly_price: Decimal,
    pub yearly_price: Decimal,
    pub features: Vec<String>,
}

impl Plan {
    /// Price charged per billing period.
    pub fn price(&self, cycle: BillingCycle) -> Decimal {
        match cycle {
            BillingCycle::Monthly => self.monthly_price,
            BillingCycle::Yearly => self.yearly_price,
        }
    }

    /// How much a year costs less when billed yearly. Never negative.
    pub fn yearly_savings(&self) -> Decimal {
        (self.monthly_price * Decimal::from(12) - self.yearly_price).max(Decimal::ZERO)
    }

    pub fn selection(&self, cycle: BillingCycle) -> PlanSelection {
        PlanSelection {
            plan_id: self.id.clone(),
            billing_cycle: cycle,
        }
    }
}

/// Ordered list of plans offered at checkout.
#[derive(Debug, Clone)]
pub struct PlanCatalog {
    plans: Vec<Plan>,
}

impl PlanCatalog {
    pub fn new(plans: Vec<Plan>) -> Self {
        Self { plans }
    }

    pub fn get(&self, id: &str) -> Option<&Plan> {
        self.plans.iter().find(|p| p.id == id)
    }

    /// Plans in display order.
    pub fn plans(&self) -> &[Plan] {
        &self.plans
    }
}

impl Default for PlanCatalog {
    fn default() -> Self {
        Self::new(vec![Plan {
            id: "premium".to_string(),
            name: "HoopMetrix Premium".to_string(),
            monthly_price: dec!(9.99),
            yearly_price: dec!(99.99),
            features: vec![
                "Advanced player and team analytics".to_string(),
                "Ad-free browsing".to_string(),
                "Member pricing in the shop".to_string(),
            ],
        }])
    }
}
