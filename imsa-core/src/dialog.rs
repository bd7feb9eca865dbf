//! Admin dialogues (add user, delete user) as an explicit per-chat state machine.
//!
//! Transitions are pure: the router feeds the admin's text in and gets back either
//! the next question, a finished action to commit, or an abort. Nothing is written
//! to the directory before the last step, so an abandoned dialogue leaves no trace.

use crate::access::Role;
use crate::directory::RegisteredUser;

pub const MAX_NAME_LEN: usize = 64;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DialogueState {
    #[default]
    Idle,
    AddUser(AddUserStep),
    DeleteUser,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddUserStep {
    AwaitId,
    AwaitName { telegram_id: i64 },
    AwaitRole { telegram_id: i64, name: String },
}

/// Question to put to the admin next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    NewUserId,
    NewUserName,
    NewUserRole,
    DeleteUserId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Add(RegisteredUser),
    Delete(i64),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    #[error("`{0}` is not a valid Telegram ID")]
    InvalidId(String),
    #[error("name must not be empty")]
    EmptyName,
    #[error("name is longer than {} characters", MAX_NAME_LEN)]
    NameTooLong,
    #[error("`{0}` is not a role (expected user or admin)")]
    InvalidRole(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Ask(DialogueState, Prompt),
    Commit(Action),
    Abort(InputError),
}

pub fn begin_add_user() -> Step {
    Step::Ask(DialogueState::AddUser(AddUserStep::AwaitId), Prompt::NewUserId)
}

pub fn begin_delete_user() -> Step {
    Step::Ask(DialogueState::DeleteUser, Prompt::DeleteUserId)
}

fn parse_id(input: &str) -> Result<i64, InputError> {
    match input.trim().parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(InputError::InvalidId(input.trim().to_string())),
    }
}

fn parse_name(input: &str) -> Result<String, InputError> {
    let name = input.trim();
    if name.is_empty() {
        return Err(InputError::EmptyName);
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(InputError::NameTooLong);
    }
    Ok(name.to_string())
}

/// Feeds one message into the dialogue. `None` when no dialogue is running.
pub fn advance(state: &DialogueState, input: &str) -> Option<Step> {
    let step = match state {
        DialogueState::Idle => return None,
        DialogueState::AddUser(AddUserStep::AwaitId) => match parse_id(input) {
            Ok(telegram_id) => Step::Ask(
                DialogueState::AddUser(AddUserStep::AwaitName { telegram_id }),
                Prompt::NewUserName,
            ),
            Err(e) => Step::Abort(e),
        },
        DialogueState::AddUser(AddUserStep::AwaitName { telegram_id }) => match parse_name(input) {
            Ok(name) => Step::Ask(
                DialogueState::AddUser(AddUserStep::AwaitRole { telegram_id: *telegram_id, name }),
                Prompt::NewUserRole,
            ),
            Err(e) => Step::Abort(e),
        },
        DialogueState::AddUser(AddUserStep::AwaitRole { telegram_id, name }) => {
            match input.parse::<Role>() {
                Ok(role) => Step::Commit(Action::Add(RegisteredUser {
                    telegram_id: *telegram_id,
                    name: name.clone(),
                    role,
                })),
                Err(_) => Step::Abort(InputError::InvalidRole(input.trim().to_string())),
            }
        }
        DialogueState::DeleteUser => match parse_id(input) {
            Ok(id) => Step::Commit(Action::Delete(id)),
            Err(e) => Step::Abort(e),
        },
    };
    Some(step)
}
