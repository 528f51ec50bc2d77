use serde::{Deserialize, Serialize};

use crate::error::{MemoryError, MemoryResult};

/// Named accommodation price tier.
///
/// Every preset except `Custom` maps to a canonical nightly price range.
/// `Custom` carries whatever explicit range the user typed in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BudgetPreset {
    Eco,
    Comfort,
    Premium,
    Luxury,
    Custom,
}

impl BudgetPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eco => "eco",
            Self::Comfort => "comfort",
            Self::Premium => "premium",
            Self::Luxury => "luxury",
            Self::Custom => "custom",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "eco" | "economy" | "budget" => Some(Self::Eco),
            "comfort" => Some(Self::Comfort),
            "premium" => Some(Self::Premium),
            "luxury" => Some(Self::Luxury),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }

    /// Canonical `(price_min, price_max)` for a preset. `None` max is unbounded.
    /// `Custom` has no canonical range.
    pub fn canonical_range(&self) -> Option<(u32, Option<u32>)> {
        match self {
            Self::Eco => Some((0, Some(80))),
            Self::Comfort => Some((80, Some(180))),
            Self::Premium => Some((180, Some(500))),
            Self::Luxury => Some((500, None)),
            Self::Custom => None,
        }
    }

    /// Tier for a derived nightly ceiling. Thresholds: ≤80 eco, ≤150 comfort,
    /// ≤300 premium, anything above luxury.
    pub fn for_price_max(price_max: u32) -> Self {
        match price_max {
            0..=80 => Self::Eco,
            81..=150 => Self::Comfort,
            151..=300 => Self::Premium,
            _ => Self::Luxury,
        }
    }
}

/// The budget fields shared by accommodation entries and collection defaults.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Budget {
    pub budget_preset: BudgetPreset,
    pub price_min: u32,
    /// `None` means no upper bound (luxury).
    pub price_max: Option<u32>,
}

impl Budget {
    /// Budget for a named preset using its canonical range.
    pub fn from_preset(preset: BudgetPreset) -> MemoryResult<Self> {
        let (price_min, price_max) = preset.canonical_range().ok_or_else(|| {
            MemoryError::validation("custom budget requires an explicit price range")
        })?;
        Ok(Self {
            budget_preset: preset,
            price_min,
            price_max,
        })
    }

    /// Explicit range entered by the user.
    pub fn custom(price_min: u32, price_max: Option<u32>) -> MemoryResult<Self> {
        let budget = Self {
            budget_preset: BudgetPreset::Custom,
            price_min,
            price_max,
        };
        budget.validate()?;
        Ok(budget)
    }

    pub fn validate(&self) -> MemoryResult<()> {
        if let Some(max) = self.price_max {
            if max < self.price_min {
                return Err(MemoryError::validation(format!(
                    "price_max {} is below price_min {}",
                    max, self.price_min
                )));
            }
        }
        Ok(())
    }
}

impl Default for Budget {
    fn default() -> Self {
        Self {
            budget_preset: BudgetPreset::Comfort,
            price_min: 80,
            price_max: Some(180),
        }
    }
}
