use teloxide::prelude::*;
use teloxide::types::{MessageId, ParseMode, PreCheckoutQuery};
use tracing::{error, info, warn};

use crate::bot::handlers::{deliver_issued, failure_reply, format_date};
use crate::bot::keyboards::platforms_keyboard;
use crate::models::InvoicePayload;
use crate::services::pricing::PLAN_MONTHS;
use crate::services::subscription_service::PaymentOutcome;
use crate::state::AppState;

/// Why a checkout is refused, or `None` to accept it.
pub fn checkout_rejection(
    payload: &str,
    payer: i64,
    currency: &str,
    total_amount: i64,
    state: &AppState,
) -> Option<&'static str> {
    let Some(invoice) = InvoicePayload::parse(payload) else {
        return Some("Unknown invoice.");
    };
    if invoice.user_id != payer {
        return Some("This invoice was issued to another user.");
    }
    if !PLAN_MONTHS.contains(&invoice.months) {
        return Some("This plan is not offered.");
    }
    if currency != state.payment.currency {
        return Some("Unexpected currency.");
    }
    match state.subscriptions.quote(invoice.months) {
        Ok(price) if price == total_amount => None,
        _ => Some("The price has changed, please request a new invoice."),
    }
}

pub async fn pre_checkout_handler(
    bot: Bot,
    q: PreCheckoutQuery,
    state: AppState,
) -> Result<(), teloxide::RequestError> {
    let payer = q.from.id.0 as i64;
    let rejection = checkout_rejection(
        &q.invoice_payload,
        payer,
        &q.currency,
        i64::from(q.total_amount),
        &state,
    );

    match rejection {
        None => {
            bot.answer_pre_checkout_query(q.id, true).await?;
        }
        Some(reason) => {
            warn!("Rejecting checkout {:?} from {}: {}", q.invoice_payload, payer, reason);
            bot.answer_pre_checkout_query(q.id, false)
                .error_message(reason)
                .await?;
        }
    }
    Ok(())
}

/// Idempotency key for a completed payment. Telegram's own charge id is
/// always set and unique; the provider id and the message coordinates are
/// fallbacks.
pub fn payment_reference(
    telegram_charge: &str,
    provider_charge: &str,
    chat_id: ChatId,
    message_id: MessageId,
) -> String {
    if !telegram_charge.is_empty() {
        telegram_charge.to_string()
    } else if !provider_charge.is_empty() {
        provider_charge.to_string()
    } else {
        format!("tg:{}:{}", chat_id.0, message_id.0)
    }
}

pub async fn successful_payment_handler(
    bot: Bot,
    msg: Message,
    state: AppState,
) -> Result<(), teloxide::RequestError> {
    let Some(payment) = msg.successful_payment() else {
        return Ok(());
    };
    let Some(invoice) = InvoicePayload::parse(&payment.invoice_payload) else {
        error!("Successful payment with unknown payload {:?}", payment.invoice_payload);
        return Ok(());
    };

    let payment_id = payment_reference(
        &payment.telegram_payment_charge_id.0,
        &payment.provider_payment_charge_id,
        msg.chat.id,
        msg.id,
    );
    let amount = i64::from(payment.total_amount);
    info!(
        "Payment {} received: {} {} for {} months from {}",
        payment_id, amount, payment.currency, invoice.months, invoice.user_id
    );

    let outcome = state
        .subscriptions
        .confirm_payment(invoice.user_id, invoice.months, &payment_id, amount)
        .await;

    match outcome {
        Ok(PaymentOutcome::Provisioned(issued)) => {
            bot.send_message(
                msg.chat.id,
                format!(
                    "✅ Payment received! Your subscription is active until {}.",
                    format_date(issued.subscription.end_date)
                ),
            )
            .await?;
            deliver_issued(&bot, msg.chat.id, &issued).await?;
            bot.send_message(
                msg.chat.id,
                "📱 Choose your operating system to get the setup instructions:",
            )
            .reply_markup(platforms_keyboard(invoice.user_id))
            .await?;
        }
        Ok(PaymentOutcome::Extended(sub)) => {
            bot.send_message(
                msg.chat.id,
                format!(
                    "✅ Payment received! Your subscription is extended until <b>{}</b>.\n\
                     Your current configuration keeps working.",
                    format_date(sub.end_date)
                ),
            )
            .parse_mode(ParseMode::Html)
            .await?;
        }
        Ok(PaymentOutcome::Duplicate) => {
            info!("Payment {} was already applied", payment_id);
        }
        Err(e) => {
            bot.send_message(msg.chat.id, failure_reply("Payment processing", &e))
                .await?;
        }
    }
    Ok(())
}
