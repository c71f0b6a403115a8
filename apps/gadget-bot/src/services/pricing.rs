/// Plan lengths offered in the purchase menu.
pub const PLAN_MONTHS: [u32; 4] = [1, 3, 6, 12];

/// Tiered pricing. Amounts are in minor currency units (kopecks, cents).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricingConfig {
    pub base_monthly_price: i64,
    pub discount_3_months: u32,
    pub discount_6_months: u32,
    pub discount_12_months: u32,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            base_monthly_price: 39_900,
            discount_3_months: 5,
            discount_6_months: 10,
            discount_12_months: 20,
        }
    }
}

impl PricingConfig {
    /// Discount percentage for a plan; the highest tier reached wins.
    pub fn discount(&self, months: u32) -> u32 {
        match months {
            12.. => self.discount_12_months,
            6.. => self.discount_6_months,
            3.. => self.discount_3_months,
            _ => 0,
        }
    }

    /// `base * months * (1 - discount / 100)`, rounded down to a whole minor unit.
    pub fn price(&self, months: u32) -> i64 {
        let gross = self.base_monthly_price * i64::from(months);
        gross * i64::from(100 - self.discount(months)) / 100
    }
}

/// `113715` -> `"1137.15"`.
pub fn format_amount(minor: i64) -> String {
    let sign = if minor < 0 { "-" } else { "" };
    let abs = minor.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

/// Parses a non-negative decimal amount with at most two fractional digits
/// into minor units: `"399"` -> `39900`, `"12.5"` -> `1250`.
pub fn parse_amount(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    let (whole, frac) = raw.split_once('.').unwrap_or((raw, ""));
    if whole.is_empty() || frac.len() > 2 || !whole.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if !frac.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let whole: i64 = whole.parse().ok()?;
    let frac: i64 = match frac.len() {
        0 => 0,
        1 => frac.parse::<i64>().ok()? * 10,
        _ => frac.parse().ok()?,
    };
    whole.checked_mul(100)?.checked_add(frac)
}
