use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::models::Platform;
use crate::services::pricing::{format_amount, PricingConfig, PLAN_MONTHS};

pub fn start_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback("🎁 Get a free trial", "trial")],
        vec![InlineKeyboardButton::callback("💳 Choose a plan", "show_plans")],
    ])
}

pub fn plan_label(months: u32, discount: u32) -> String {
    let unit = if months == 1 { "month" } else { "months" };
    if discount == 0 {
        format!("{} {}", months, unit)
    } else {
        format!("{} {} (-{}%)", months, unit, discount)
    }
}

pub fn plans_keyboard(pricing: &PricingConfig, currency: &str) -> InlineKeyboardMarkup {
    let rows = PLAN_MONTHS
        .iter()
        .map(|&months| {
            let label = format!(
                "{} · {} {}",
                plan_label(months, pricing.discount(months)),
                format_amount(pricing.price(months)),
                currency
            );
            vec![InlineKeyboardButton::callback(label, format!("buy_{}", months))]
        })
        .collect::<Vec<_>>();
    InlineKeyboardMarkup::new(rows)
}

/// Two platforms per row; callback data carries the owner's id.
pub fn platforms_keyboard(user_id: i64) -> InlineKeyboardMarkup {
    let buttons: Vec<InlineKeyboardButton> = Platform::ALL
        .iter()
        .map(|p| InlineKeyboardButton::callback(p.label(), format!("config_{}_{}", p.as_str(), user_id)))
        .collect();
    InlineKeyboardMarkup::new(buttons.chunks(2).map(|row| row.to_vec()).collect::<Vec<_>>())
}

pub fn admin_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback("Active subscriptions", "admin_subs")],
        vec![InlineKeyboardButton::callback("Deactivate a subscription", "admin_deactivate")],
        vec![InlineKeyboardButton::callback("Extend a subscription", "admin_extend")],
    ])
}
