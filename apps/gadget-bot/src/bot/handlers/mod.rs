pub mod callback;
pub mod command;
pub mod payment;

use chrono::{DateTime, Utc};
use teloxide::prelude::*;
use teloxide::types::{InputFile, ParseMode};
use tracing::error;

use crate::error::LifecycleError;
use crate::services::subscription_service::IssuedProfile;

/// `31.12.2025`
pub fn format_date(date: DateTime<Utc>) -> String {
    date.format("%d.%m.%Y").to_string()
}

/// Reply text for a failed lifecycle call. Failures the user cannot fix are
/// logged here.
pub fn failure_reply(context: &str, err: &LifecycleError) -> String {
    match err {
        LifecycleError::IdentityGeneration(_)
        | LifecycleError::AddressPoolExhausted(_)
        | LifecycleError::Storage(_) => error!("{} failed: {}", context, err),
        _ => {}
    }
    err.user_message()
}

pub fn profile_file_name(user_id: i64) -> String {
    format!("wireguard_{}.conf", user_id)
}

/// Sends a freshly issued profile as a `.conf` document followed by its
/// quick setup link.
pub async fn deliver_issued(
    bot: &Bot,
    chat_id: ChatId,
    issued: &IssuedProfile,
) -> Result<(), teloxide::RequestError> {
    let file = InputFile::memory(issued.profile_text.clone().into_bytes())
        .file_name(profile_file_name(issued.subscription.user_id));
    bot.send_document(chat_id, file)
        .caption(format!(
            "📝 Your WireGuard configuration file (address {})",
            issued.address
        ))
        .await?;

    bot.send_message(
        chat_id,
        format!("📱 Quick setup link:\n<code>{}</code>", issued.scannable),
    )
    .parse_mode(ParseMode::Html)
    .await?;
    Ok(())
}
