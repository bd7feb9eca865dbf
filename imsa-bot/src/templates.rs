//! Outgoing message texts (Telegram HTML parse mode).

use crate::health::{BotHealth, NoticeStatus};
use imsa_core::dialog::{InputError, Prompt};
use imsa_core::notify::format_seconds;
use imsa_core::{RegisteredUser, Role};
use teloxide::utils::html::escape;

pub fn greeting(username: Option<&str>) -> String {
    match username {
        Some(name) => format!("Hello, <b>@{}</b>!", escape(name)),
        None => "Hello!".to_string(),
    }
}

pub fn help(role: Option<Role>) -> String {
    let mut lines = vec![
        "<b>Commands</b>".to_string(),
        "/start - start the bot".to_string(),
        "/help - show this help".to_string(),
        "/id - show your Telegram ID".to_string(),
    ];
    match role {
        None => {
            lines.push(String::new());
            lines.push("You are not registered. Send your ID to the bot owner to get access.".to_string());
        }
        Some(Role::User) => {
            lines.push("/health - bot status".to_string());
        }
        Some(Role::Admin) => {
            lines.push("/health - bot status".to_string());
            lines.push("/users - list registered users".to_string());
            lines.push("/adduser - register a user".to_string());
            lines.push("/deluser - remove a user".to_string());
            lines.push("/cancel - abort the current dialogue".to_string());
        }
    }
    lines.join("\n")
}

pub fn user_id(id: i64) -> String {
    format!("Your Telegram ID: <code>{}</code>", id)
}

pub fn downtime_notice(duration: &str) -> String {
    format!("The bot is back online after <b>{}</b> of downtime.", escape(duration))
}

pub fn health(h: &BotHealth) -> String {
    let directory = match (h.directory_ok, h.registered_users) {
        (true, Some(n)) => format!("ok, {} registered users", n),
        (true, None) => "ok".to_string(),
        (false, _) => "<b>unavailable</b>".to_string(),
    };
    let notice = match &h.notice {
        NoticeStatus::NotNeeded => "not needed".to_string(),
        NoticeStatus::InProgress => "in progress".to_string(),
        NoticeStatus::Done(r) => format!(
            "{} delivered, {} unreachable, {} failed",
            r.delivered, r.unreachable, r.failed
        ),
    };
    format!(
        "<b>Status</b>\nUptime: {}\nDowntime before start: {}\nDirectory: {}\nDowntime notice: {}",
        format_seconds(h.uptime_seconds as i64),
        format_seconds(h.downtime_seconds),
        directory,
        notice,
    )
}

pub fn prompt(p: Prompt) -> String {
    match p {
        Prompt::NewUserId => "Send the Telegram ID of the new user (or /cancel).",
        Prompt::NewUserName => "Send a display name for this user.",
        Prompt::NewUserRole => "Send the role: <code>user</code> or <code>admin</code>.",
        Prompt::DeleteUserId => "Send the Telegram ID of the user to remove (or /cancel).",
    }
    .to_string()
}

pub fn users_list(users: &[RegisteredUser]) -> String {
    if users.is_empty() {
        return "No registered users.".to_string();
    }
    let mut out = format!("<b>Registered users ({})</b>", users.len());
    for u in users {
        out.push_str(&format!("\n<code>{}</code> {} ({})", u.telegram_id, escape(&u.name), u.role));
    }
    out
}

pub fn user_added(user: &RegisteredUser) -> String {
    format!(
        "User <b>{}</b> (<code>{}</code>) added as {}.",
        escape(&user.name),
        user.telegram_id,
        user.role
    )
}

pub fn user_exists(id: i64) -> String {
    format!("Error: user <code>{}</code> is already registered. Dialogue cancelled.", id)
}

pub fn user_deleted(id: i64) -> String {
    format!("User <code>{}</code> removed.", id)
}

pub fn user_not_found(id: i64) -> String {
    format!("Error: no user with ID <code>{}</code>. Dialogue cancelled.", id)
}

pub fn cannot_delete_self() -> String {
    "Error: you cannot remove yourself. Dialogue cancelled.".to_string()
}

pub fn input_error(e: &InputError) -> String {
    format!("Error: {}. Dialogue cancelled.", escape(&e.to_string()))
}

pub fn directory_error() -> String {
    "Error: the user directory is unavailable. Dialogue cancelled.".to_string()
}

pub fn cancelled() -> String {
    "Cancelled.".to_string()
}

pub fn nothing_to_cancel() -> String {
    "Nothing to cancel.".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use imsa_core::notify::FanoutReport;

    #[test]
    fn test_help_depends_on_role() {
        assert!(help(None).contains("not registered"));
        assert!(!help(Some(Role::User)).contains("/adduser"));
        assert!(help(Some(Role::User)).contains("/health"));
        assert!(help(Some(Role::Admin)).contains("/deluser"));
    }

    #[test]
    fn test_names_are_escaped() {
        let u = RegisteredUser { telegram_id: 5, name: "<b>evil</b>".into(), role: Role::User };
        assert!(user_added(&u).contains("&lt;b&gt;evil&lt;/b&gt;"));
        assert!(users_list(&[u]).contains("&lt;b&gt;"));
    }

    #[test]
    fn test_health_text() {
        let h = BotHealth {
            uptime_seconds: 3700,
            downtime_seconds: -5,
            directory_ok: true,
            registered_users: Some(3),
            notice: NoticeStatus::Done(FanoutReport { delivered: 2, unreachable: 1, failed: 0 }),
        };
        let text = health(&h);
        assert!(text.contains("Uptime: 1 hour, 1 minute"));
        assert!(text.contains("Downtime before start: unknown time"));
        assert!(text.contains("3 registered users"));
        assert!(text.contains("2 delivered, 1 unreachable, 0 failed"));
    }

    #[test]
    fn test_downtime_notice() {
        assert_eq!(
            downtime_notice("1 day, 1 hour"),
            "The bot is back online after <b>1 day, 1 hour</b> of downtime."
        );
    }
}
