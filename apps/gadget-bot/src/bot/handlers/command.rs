use teloxide::prelude::*;
use tracing::{error, info};

use crate::bot::handlers::{failure_reply, format_date, payment};
use crate::bot::keyboards::{admin_keyboard, start_keyboard};
use crate::services::subscription_service::StatusReport;
use crate::state::AppState;

const WELCOME: &str = "👋 Welcome to the GadgetBar VPN bot!\n\n\
    🎁 Get a free one-month trial\n\
    or choose one of the plans:";

const DEACTIVATE_USAGE: &str = "Usage: /deactivate <subscription id>";
const EXTEND_USAGE: &str = "Usage: /extend <subscription id> <months>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Status,
    Admin,
    Deactivate(i64),
    Extend(i64, u32),
    /// Recognised command with bad arguments.
    Usage(&'static str),
    Unknown,
}

/// Parses `/name[@bot] args...`. Plain text is not a command.
pub fn parse_command(text: &str) -> Option<Command> {
    let mut words = text.split_whitespace();
    let head = words.next()?.strip_prefix('/')?;
    let name = head.split('@').next().unwrap_or(head);
    let args: Vec<&str> = words.collect();

    let command = match name {
        "start" => Command::Start,
        "status" => Command::Status,
        "admin" => Command::Admin,
        "deactivate" => match args.as_slice() {
            [id] => id.parse().map_or(Command::Usage(DEACTIVATE_USAGE), Command::Deactivate),
            _ => Command::Usage(DEACTIVATE_USAGE),
        },
        "extend" => match args.as_slice() {
            [id, months] => match (id.parse(), months.parse()) {
                (Ok(id), Ok(months)) => Command::Extend(id, months),
                _ => Command::Usage(EXTEND_USAGE),
            },
            _ => Command::Usage(EXTEND_USAGE),
        },
        _ => Command::Unknown,
    };
    Some(command)
}

pub fn status_text(report: &StatusReport) -> String {
    match (report.end_date, report.is_trial) {
        (Some(end_date), Some(is_trial)) if report.active => format!(
            "Your subscription is active until: {}\nSubscription type: {}",
            format_date(end_date),
            if is_trial { "Trial period" } else { "Paid subscription" }
        ),
        _ => "You have no active subscription.".to_string(),
    }
}

pub async fn message_handler(
    bot: Bot,
    msg: Message,
    state: AppState,
) -> Result<(), teloxide::RequestError> {
    if msg.successful_payment().is_some() {
        return payment::successful_payment_handler(bot, msg, state).await;
    }

    let (Some(text), Some(from)) = (msg.text(), msg.from.as_ref()) else {
        return Ok(());
    };
    let tg_id = from.id.0 as i64;

    let Some(command) = parse_command(text) else {
        bot.send_message(msg.chat.id, "Send /start to see what I can do.").await?;
        return Ok(());
    };
    info!("Command {:?} from {}", command, tg_id);

    let service = &state.subscriptions;
    match command {
        Command::Start => {
            if let Err(e) = service.register_user(tg_id, from.username.as_deref()).await {
                error!("Failed to register user {}: {}", tg_id, e);
            }
            match service.status(tg_id).await {
                Ok(report) if report.active => {
                    bot.send_message(msg.chat.id, status_text(&report)).await?;
                }
                Ok(_) => {
                    bot.send_message(msg.chat.id, WELCOME)
                        .reply_markup(start_keyboard())
                        .await?;
                }
                Err(e) => {
                    bot.send_message(msg.chat.id, failure_reply("/start", &e)).await?;
                }
            }
        }

        Command::Status => {
            let text = match service.status(tg_id).await {
                Ok(report) => {
                    info!("Status for user {}: active={}", report.user_id, report.active);
                    status_text(&report)
                }
                Err(e) => failure_reply("/status", &e),
            };
            bot.send_message(msg.chat.id, text).await?;
        }

        Command::Admin => {
            if service.is_admin(tg_id) {
                bot.send_message(msg.chat.id, "Admin panel:")
                    .reply_markup(admin_keyboard())
                    .await?;
            } else {
                bot.send_message(msg.chat.id, "You do not have access to the admin panel.")
                    .await?;
            }
        }

        Command::Deactivate(id) => {
            let text = match service.admin_deactivate(tg_id, id).await {
                Ok(()) => format!("✅ Subscription #{} deactivated.", id),
                Err(e) => failure_reply("/deactivate", &e),
            };
            bot.send_message(msg.chat.id, text).await?;
        }

        Command::Extend(id, months) => {
            let text = match service.admin_extend(tg_id, id, months).await {
                Ok(sub) => format!(
                    "✅ Subscription #{} extended until {}.",
                    id,
                    format_date(sub.end_date)
                ),
                Err(e) => failure_reply("/extend", &e),
            };
            bot.send_message(msg.chat.id, text).await?;
        }

        Command::Usage(usage) => {
            bot.send_message(msg.chat.id, usage).await?;
        }

        Command::Unknown => {
            bot.send_message(msg.chat.id, "Unknown command. Send /start to begin.")
                .await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn parses_commands_and_arguments() {
        assert_eq!(parse_command("/start"), Some(Command::Start));
        assert_eq!(parse_command("/status@GadgetVpnBot"), Some(Command::Status));
        assert_eq!(parse_command("/deactivate 15"), Some(Command::Deactivate(15)));
        assert_eq!(parse_command("/extend 15 3"), Some(Command::Extend(15, 3)));
        assert_eq!(parse_command("/frobnicate"), Some(Command::Unknown));
        assert_eq!(parse_command("hello"), None);
        assert_eq!(parse_command("   "), None);
    }

    #[test]
    fn bad_admin_arguments_produce_usage() {
        assert_eq!(parse_command("/deactivate"), Some(Command::Usage(DEACTIVATE_USAGE)));
        assert_eq!(parse_command("/deactivate abc"), Some(Command::Usage(DEACTIVATE_USAGE)));
        assert_eq!(parse_command("/extend 15"), Some(Command::Usage(EXTEND_USAGE)));
        assert_eq!(parse_command("/extend 15 -1"), Some(Command::Usage(EXTEND_USAGE)));
    }

    #[test]
    fn status_text_formats_date_and_type() {
        let report = StatusReport {
            user_id: 1,
            active: true,
            end_date: Some(Utc.with_ymd_and_hms(2030, 3, 9, 12, 0, 0).unwrap()),
            is_trial: Some(true),
        };
        assert_eq!(
            status_text(&report),
            "Your subscription is active until: 09.03.2030\nSubscription type: Trial period"
        );

        let none = StatusReport { user_id: 1, active: false, end_date: None, is_trial: None };
        assert_eq!(status_text(&none), "You have no active subscription.");
    }
}
