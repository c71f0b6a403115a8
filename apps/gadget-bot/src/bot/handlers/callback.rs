use gadget_db::models::Subscription;
use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, ChatId, InputFile, LabeledPrice, ParseMode};
use tracing::{error, info};

use crate::bot::handlers::{deliver_issued, failure_reply, format_date, profile_file_name};
use crate::bot::instructions::instructions;
use crate::bot::keyboards::{plan_label, plans_keyboard, platforms_keyboard};
use crate::models::InvoicePayload;
use crate::services::pricing::{format_amount, PLAN_MONTHS};
use crate::state::AppState;

const ADMIN_LIST_LIMIT: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    Trial,
    ShowPlans,
    Buy(u32),
    Config { platform: String, owner: i64 },
    AdminSubs,
    AdminDeactivate,
    AdminExtend,
    Unknown,
}

impl CallbackAction {
    pub fn parse(data: &str) -> Self {
        match data {
            "trial" => return Self::Trial,
            "show_plans" => return Self::ShowPlans,
            "admin_subs" => return Self::AdminSubs,
            "admin_deactivate" => return Self::AdminDeactivate,
            "admin_extend" => return Self::AdminExtend,
            _ => {}
        }

        if let Some(months) = data.strip_prefix("buy_") {
            return match months.parse() {
                Ok(months) if PLAN_MONTHS.contains(&months) => Self::Buy(months),
                _ => Self::Unknown,
            };
        }
        if let Some(rest) = data.strip_prefix("config_") {
            if let Some((platform, owner)) = rest.rsplit_once('_') {
                if let Ok(owner) = owner.parse() {
                    return Self::Config { platform: platform.to_string(), owner };
                }
            }
        }
        Self::Unknown
    }
}

pub fn active_list_text(subs: &[Subscription]) -> String {
    if subs.is_empty() {
        return "No active subscriptions.".to_string();
    }
    let mut text = format!("Active subscriptions ({}):\n", subs.len());
    for sub in subs.iter().take(ADMIN_LIST_LIMIT) {
        text.push_str(&format!(
            "\n#{} · user {} · {} · until {}",
            sub.id,
            sub.user_id,
            sub.kind,
            format_date(sub.end_date)
        ));
    }
    if subs.len() > ADMIN_LIST_LIMIT {
        text.push_str(&format!("\n… and {} more", subs.len() - ADMIN_LIST_LIMIT));
    }
    text
}

pub async fn callback_handler(
    bot: Bot,
    q: CallbackQuery,
    state: AppState,
) -> Result<(), teloxide::RequestError> {
    info!("Received callback: {:?}", q.data);
    let callback_id = q.id.clone();
    let tg_id = q.from.id.0 as i64;
    let chat_id = q
        .message
        .as_ref()
        .map(|m| m.chat().id)
        .unwrap_or(ChatId(tg_id));
    let Some(data) = q.data.as_deref() else {
        return Ok(());
    };
    let service = &state.subscriptions;

    match CallbackAction::parse(data) {
        CallbackAction::Trial => match service.request_trial(tg_id).await {
            Ok(issued) => {
                bot.answer_callback_query(callback_id).await?;
                bot.send_message(
                    chat_id,
                    format!(
                        "✅ Trial activated until {}!",
                        format_date(issued.subscription.end_date)
                    ),
                )
                .await?;
                deliver_issued(&bot, chat_id, &issued).await?;
                bot.send_message(
                    chat_id,
                    "📱 Choose your operating system to get the setup instructions:",
                )
                .reply_markup(platforms_keyboard(tg_id))
                .await?;
            }
            Err(e) => {
                bot.answer_callback_query(callback_id)
                    .text(failure_reply("Trial", &e))
                    .show_alert(true)
                    .await?;
            }
        },

        CallbackAction::ShowPlans => {
            bot.answer_callback_query(callback_id).await?;
            bot.send_message(chat_id, "Choose a plan:")
                .reply_markup(plans_keyboard(service.pricing(), &state.payment.currency))
                .await?;
        }

        CallbackAction::Buy(months) => {
            let price = match service.quote(months) {
                Ok(price) => price,
                Err(e) => {
                    bot.answer_callback_query(callback_id)
                        .text(failure_reply("Quote", &e))
                        .show_alert(true)
                        .await?;
                    return Ok(());
                }
            };
            let Ok(amount) = u32::try_from(price) else {
                error!("Price {} for {} months does not fit an invoice", price, months);
                bot.answer_callback_query(callback_id)
                    .text("This plan is not available right now.")
                    .show_alert(true)
                    .await?;
                return Ok(());
            };
            bot.answer_callback_query(callback_id).await?;

            let prices = vec![LabeledPrice {
                label: plan_label(months, service.pricing().discount(months)),
                amount,
            }];
            let payload = InvoicePayload::new(tg_id, months).to_payload_string();
            let mut invoice = bot.send_invoice(
                chat_id,
                format!("VPN subscription for {} months", months),
                format!(
                    "WireGuard VPN access for {} months. Total: {} {}",
                    months,
                    format_amount(price),
                    state.payment.currency
                ),
                payload,
                state.payment.currency.clone(),
                prices,
            );
            if let Some(token) = &state.payment.provider_token {
                invoice = invoice.provider_token(token.clone());
            }
            invoice.await?;
        }

        CallbackAction::Config { platform, owner } => {
            if owner != tg_id {
                bot.answer_callback_query(callback_id)
                    .text("This is not your configuration!")
                    .show_alert(true)
                    .await?;
                return Ok(());
            }

            let profile = match service.profile_for_platform(tg_id, &platform).await {
                Ok(profile) => profile,
                Err(e) => {
                    bot.answer_callback_query(callback_id)
                        .text(failure_reply("Profile delivery", &e))
                        .show_alert(true)
                        .await?;
                    return Ok(());
                }
            };
            bot.answer_callback_query(callback_id).await?;

            bot.send_message(chat_id, instructions(profile.platform)).await?;

            let file = InputFile::memory(profile.profile_text.into_bytes())
                .file_name(profile_file_name(tg_id));
            bot.send_document(chat_id, file)
                .caption("📝 Your WireGuard configuration file")
                .await?;

            if let Some(scannable) = profile.scannable {
                bot.send_message(
                    chat_id,
                    format!("📱 Quick setup link:\n<code>{}</code>", scannable),
                )
                .parse_mode(ParseMode::Html)
                .await?;
            }
        }

        CallbackAction::AdminSubs => {
            let text = match service.admin_list_active(tg_id).await {
                Ok(subs) => active_list_text(&subs),
                Err(e) => failure_reply("Admin listing", &e),
            };
            bot.answer_callback_query(callback_id).await?;
            bot.send_message(chat_id, text).await?;
        }

        CallbackAction::AdminDeactivate | CallbackAction::AdminExtend => {
            let text = if !service.is_admin(tg_id) {
                "You do not have access to the admin panel."
            } else if data == "admin_deactivate" {
                "Send /deactivate <subscription id>"
            } else {
                "Send /extend <subscription id> <months>"
            };
            bot.answer_callback_query(callback_id).await?;
            bot.send_message(chat_id, text).await?;
        }

        CallbackAction::Unknown => {
            bot.answer_callback_query(callback_id).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use gadget_db::models::SubscriptionKind;

    #[test]
    fn parses_callback_data() {
        assert_eq!(CallbackAction::parse("trial"), CallbackAction::Trial);
        assert_eq!(CallbackAction::parse("buy_6"), CallbackAction::Buy(6));
        assert_eq!(CallbackAction::parse("buy_12"), CallbackAction::Buy(12));
        assert_eq!(
            CallbackAction::parse("config_android_123"),
            CallbackAction::Config { platform: "android".into(), owner: 123 }
        );
        assert_eq!(CallbackAction::parse("admin_subs"), CallbackAction::AdminSubs);
    }

    #[test]
    fn malformed_callback_data_is_unknown() {
        for data in ["buy_", "buy_x", "config_windows", "config_windows_abc", "settings"] {
            assert_eq!(CallbackAction::parse(data), CallbackAction::Unknown, "{data}");
        }
    }

    #[test]
    fn buy_outside_offered_plans_is_unknown() {
        for data in ["buy_0", "buy_2", "buy_13", "buy_100000", "buy_4294967295"] {
            assert_eq!(CallbackAction::parse(data), CallbackAction::Unknown, "{data}");
        }
    }

    #[test]
    fn admin_list_is_capped() {
        let now = Utc::now();
        let subs: Vec<Subscription> = (1..=55)
            .map(|id| Subscription {
                id,
                user_id: id * 10,
                start_date: now,
                end_date: now + Duration::days(30),
                kind: SubscriptionKind::Paid,
                payment_id: None,
                is_trial: false,
                is_active: true,
            })
            .collect();

        let text = active_list_text(&subs);
        assert!(text.starts_with("Active subscriptions (55):"));
        assert!(text.contains("#50 · user 500 · paid"));
        assert!(!text.contains("#51 "));
        assert!(text.ends_with("… and 5 more"));

        assert_eq!(active_list_text(&[]), "No active subscriptions.");
    }
}
