//! Command router
//!
//! Every inbound message goes through the same pipeline: drop backlog dated before
//! startup, load the chat's dialogue state, then either a command (role-gated
//! uniformly through `Command::requirement`) or free text fed to the running
//! dialogue.

use crate::health::HealthTracker;
use crate::logging::sender_label;
use crate::templates;
use chrono::{DateTime, Utc};
use imsa_core::access::{permits, Requirement};
use imsa_core::dialog::{self, Action, DialogueState, Step};
use imsa_core::{Directory, Role};
use std::sync::Arc;
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::dispatching::{HandlerExt, UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use teloxide::utils::command::BotCommands;
use tracing::{debug, error, info};

pub type UserDialogue = Dialogue<DialogueState, InMemStorage<DialogueState>>;
pub type HandlerResult = anyhow::Result<()>;

#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    #[command(description = "start the bot")]
    Start,
    #[command(description = "show help")]
    Help,
    #[command(description = "show your Telegram ID")]
    Id,
    #[command(description = "bot status")]
    Health,
    #[command(description = "list registered users")]
    Users,
    #[command(description = "register a user")]
    AddUser,
    #[command(description = "remove a user")]
    DelUser,
    #[command(description = "abort the current dialogue")]
    Cancel,
}

impl Command {
    pub fn requirement(&self) -> Requirement {
        match self {
            Command::Start | Command::Help | Command::Id => Requirement::Anyone,
            Command::Health => Requirement::Registered,
            Command::Users | Command::AddUser | Command::DelUser | Command::Cancel => Requirement::Admin,
        }
    }
}

/// Shared state handed to every handler by the dispatcher.
pub struct BotContext {
    pub directory: Directory,
    pub health: HealthTracker,
    pub started_at: DateTime<Utc>,
}

/// Messages older than the start of this process piled up while it was down.
pub fn is_backlog(date: DateTime<Utc>, started_at: DateTime<Utc>) -> bool {
    date.timestamp() < started_at.timestamp()
}

pub fn schema() -> UpdateHandler<anyhow::Error> {
    Update::filter_message()
        .filter(|msg: Message, ctx: Arc<BotContext>| {
            let fresh = !is_backlog(msg.date, ctx.started_at);
            if !fresh {
                debug!("Skipping backlog message {} from {}", msg.id.0, msg.date);
            }
            fresh
        })
        .enter_dialogue::<Message, InMemStorage<DialogueState>, DialogueState>()
        .branch(dptree::entry().filter_command::<Command>().endpoint(on_command))
        .branch(dptree::endpoint(on_text))
}

async fn reply(bot: &Bot, msg: &Message, text: String) -> HandlerResult {
    bot.send_message(msg.chat.id, text).parse_mode(ParseMode::Html).await?;
    Ok(())
}

fn sender_id(msg: &Message) -> Option<i64> {
    msg.from.as_ref().map(|u| u.id.0 as i64)
}

async fn on_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    ctx: Arc<BotContext>,
    dialogue: UserDialogue,
) -> HandlerResult {
    let Some(sender) = sender_id(&msg) else {
        error!("Can not get user info from message: {}", msg.id.0);
        return Ok(());
    };

    let role = ctx.directory.role_of(sender).await;
    if !permits(cmd.requirement(), role) {
        debug!("Access denied for /{:?}. {}", cmd, sender_label(&msg));
        return Ok(());
    }
    debug!("Handling /{:?}. {}", cmd, sender_label(&msg));

    match cmd {
        Command::Start => {
            let username = msg.from.as_ref().and_then(|u| u.username.as_deref());
            reply(&bot, &msg, templates::greeting(username)).await?;
            reply(&bot, &msg, templates::help(role)).await
        }
        Command::Help => reply(&bot, &msg, templates::help(role)).await,
        Command::Id => reply(&bot, &msg, templates::user_id(sender)).await,
        Command::Health => {
            let health = ctx.health.get_health(&ctx.directory).await;
            reply(&bot, &msg, templates::health(&health)).await
        }
        Command::Users => {
            let text = match ctx.directory.list_users().await {
                Ok(users) => templates::users_list(&users),
                Err(_) => templates::directory_error(),
            };
            reply(&bot, &msg, text).await
        }
        Command::AddUser => apply_step(&bot, &msg, &ctx, &dialogue, sender, dialog::begin_add_user()).await,
        Command::DelUser => apply_step(&bot, &msg, &ctx, &dialogue, sender, dialog::begin_delete_user()).await,
        Command::Cancel => {
            let state = dialogue.get_or_default().await?;
            if state == DialogueState::Idle {
                reply(&bot, &msg, templates::nothing_to_cancel()).await
            } else {
                dialogue.exit().await?;
                reply(&bot, &msg, templates::cancelled()).await
            }
        }
    }
}

async fn on_text(
    bot: Bot,
    msg: Message,
    ctx: Arc<BotContext>,
    dialogue: UserDialogue,
    state: DialogueState,
) -> HandlerResult {
    let (Some(sender), Some(text)) = (sender_id(&msg), msg.text()) else {
        return Ok(());
    };
    let Some(step) = dialog::advance(&state, text) else {
        return Ok(());
    };

    // the role may have changed since the dialogue started
    if ctx.directory.role_of(sender).await != Some(Role::Admin) {
        debug!("Dropping dialogue of non-admin. {}", sender_label(&msg));
        dialogue.exit().await?;
        return Ok(());
    }

    apply_step(&bot, &msg, &ctx, &dialogue, sender, step).await
}

async fn apply_step(
    bot: &Bot,
    msg: &Message,
    ctx: &BotContext,
    dialogue: &UserDialogue,
    sender: i64,
    step: Step,
) -> HandlerResult {
    match step {
        Step::Ask(next, prompt) => {
            dialogue.update(next).await?;
            reply(bot, msg, templates::prompt(prompt)).await
        }
        Step::Abort(e) => {
            info!("Dialogue aborted: {}. {}", e, sender_label(msg));
            dialogue.exit().await?;
            reply(bot, msg, templates::input_error(&e)).await
        }
        Step::Commit(action) => {
            dialogue.exit().await?;
            let text = commit(&ctx.directory, sender, action).await;
            reply(bot, msg, text).await
        }
    }
}

/// Applies a finished dialogue to the directory and renders the outcome.
pub async fn commit(directory: &Directory, actor: i64, action: Action) -> String {
    match action {
        Action::Add(user) => match directory.get_user(user.telegram_id).await {
            Ok(Some(_)) => templates::user_exists(user.telegram_id),
            Ok(None) => match directory.add_user(user.telegram_id, &user.name, user.role).await {
                Ok(()) => templates::user_added(&user),
                Err(_) => templates::directory_error(),
            },
            Err(_) => templates::directory_error(),
        },
        Action::Delete(id) if id == actor => templates::cannot_delete_self(),
        Action::Delete(id) => match directory.delete_user(id).await {
            Ok(true) => templates::user_deleted(id),
            Ok(false) => templates::user_not_found(id),
            Err(_) => templates::directory_error(),
        },
    }
}
