//! Purchasable subscription plans.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{PlanId, Role};

/// A subscription tier with a fixed price and duration.
///
/// Prices are integers in the smallest currency unit (XOF has no minor unit).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub id: PlanId,
    pub name: String,
    pub description: Option<String>,
    pub price: i64,
    pub duration_days: u32,
    pub role: Role,
    pub features: Vec<String>,
    pub active: bool,
}

impl Plan {
    /// A plan can be purchased only while active and only by its target role.
    pub fn is_available_to(&self, role: Role) -> bool {
        self.active && self.role == role
    }

    /// Daily price rounded to two decimals.
    pub fn price_per_day(&self) -> f64 {
        if self.duration_days == 0 {
            return 0.0;
        }
        let raw = self.price as f64 / f64::from(self.duration_days);
        (raw * 100.0).round() / 100.0
    }

    pub fn duration(&self) -> chrono::Days {
        chrono::Days::new(u64::from(self.duration_days))
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn monthly_driver_plan() -> Plan {
        Plan {
            id: PlanId::new(),
            name: "Mensuel".to_string(),
            description: Some("30 days of trip assignments".to_string()),
            price: 5000,
            duration_days: 30,
            role: Role::Driver,
            features: vec!["unlimited_trips".to_string()],
            active: true,
        }
    }
}
