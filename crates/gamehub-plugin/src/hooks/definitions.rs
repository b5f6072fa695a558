//! Lifecycle callbacks domain code fires through the dispatcher.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What a lifecycle callback yields when the configured module does not
/// implement it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafeDefault {
    /// Approve the primary input unchanged.
    PassThrough,
    /// Nothing to return.
    Unit,
}

/// Enumeration of all lifecycle callbacks in the system.
///
/// `before_*` callbacks may transform or reject their primary input (the
/// first argument); `after_*` and `on_*` callbacks observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleHook {
    // ── Accounts ──
    /// `before_user_register(attrs)`.
    BeforeUserRegister,
    /// `after_user_register(user)`.
    AfterUserRegister,
    /// `before_user_login(credentials)`.
    BeforeUserLogin,
    /// `after_user_login(user)`.
    AfterUserLogin,

    // ── Lobbies ──
    /// `before_lobby_create(attrs)`.
    BeforeLobbyCreate,
    /// `after_lobby_create(lobby)`.
    AfterLobbyCreate,
    /// `before_lobby_join(lobby, user)`.
    BeforeLobbyJoin,
    /// `after_lobby_join(lobby, user)`.
    AfterLobbyJoin,
    /// `after_lobby_leave(lobby, user)`.
    AfterLobbyLeave,
    /// `before_lobby_update(changes)`.
    BeforeLobbyUpdate,
    /// `after_lobby_update(lobby)`.
    AfterLobbyUpdate,

    // ── Groups ──
    /// `before_group_create(attrs)`.
    BeforeGroupCreate,
    /// `after_group_create(group)`.
    AfterGroupCreate,

    // ── Leaderboards ──
    /// `before_leaderboard_submit(score)`.
    BeforeLeaderboardSubmit,
    /// `after_leaderboard_submit(record)`.
    AfterLeaderboardSubmit,

    // ── Chat ──
    /// `before_chat_message(message)`.
    BeforeChatMessage,
    /// `after_chat_message(message)`.
    AfterChatMessage,

    // ── Notifications ──
    /// `before_notification_send(notification)`.
    BeforeNotificationSend,

    // ── Matchmaking ──
    /// `on_matchmaker_matched(match)`.
    OnMatchmakerMatched,
}

impl LifecycleHook {
    /// Every lifecycle callback.
    pub const ALL: [LifecycleHook; 19] = [
        Self::BeforeUserRegister,
        Self::AfterUserRegister,
        Self::BeforeUserLogin,
        Self::AfterUserLogin,
        Self::BeforeLobbyCreate,
        Self::AfterLobbyCreate,
        Self::BeforeLobbyJoin,
        Self::AfterLobbyJoin,
        Self::AfterLobbyLeave,
        Self::BeforeLobbyUpdate,
        Self::AfterLobbyUpdate,
        Self::BeforeGroupCreate,
        Self::AfterGroupCreate,
        Self::BeforeLeaderboardSubmit,
        Self::AfterLeaderboardSubmit,
        Self::BeforeChatMessage,
        Self::AfterChatMessage,
        Self::BeforeNotificationSend,
        Self::OnMatchmakerMatched,
    ];

    /// Returns the function name the module exports for this callback.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BeforeUserRegister => "before_user_register",
            Self::AfterUserRegister => "after_user_register",
            Self::BeforeUserLogin => "before_user_login",
            Self::AfterUserLogin => "after_user_login",
            Self::BeforeLobbyCreate => "before_lobby_create",
            Self::AfterLobbyCreate => "after_lobby_create",
            Self::BeforeLobbyJoin => "before_lobby_join",
            Self::AfterLobbyJoin => "after_lobby_join",
            Self::AfterLobbyLeave => "after_lobby_leave",
            Self::BeforeLobbyUpdate => "before_lobby_update",
            Self::AfterLobbyUpdate => "after_lobby_update",
            Self::BeforeGroupCreate => "before_group_create",
            Self::AfterGroupCreate => "after_group_create",
            Self::BeforeLeaderboardSubmit => "before_leaderboard_submit",
            Self::AfterLeaderboardSubmit => "after_leaderboard_submit",
            Self::BeforeChatMessage => "before_chat_message",
            Self::AfterChatMessage => "after_chat_message",
            Self::BeforeNotificationSend => "before_notification_send",
            Self::OnMatchmakerMatched => "on_matchmaker_matched",
        }
    }

    /// Number of arguments the callback takes.
    pub fn arity(&self) -> usize {
        match self {
            Self::BeforeLobbyJoin | Self::AfterLobbyJoin | Self::AfterLobbyLeave => 2,
            _ => 1,
        }
    }

    /// Returns whether this is a "before" callback that may transform or
    /// reject its input.
    pub fn is_before_hook(&self) -> bool {
        matches!(
            self,
            Self::BeforeUserRegister
                | Self::BeforeUserLogin
                | Self::BeforeLobbyCreate
                | Self::BeforeLobbyJoin
                | Self::BeforeLobbyUpdate
                | Self::BeforeGroupCreate
                | Self::BeforeLeaderboardSubmit
                | Self::BeforeChatMessage
                | Self::BeforeNotificationSend
        )
    }

    /// Behaviour when the configured module does not implement the callback.
    pub fn safe_default(&self) -> SafeDefault {
        if self.is_before_hook() {
            SafeDefault::PassThrough
        } else {
            SafeDefault::Unit
        }
    }

    /// Computes the safe-default result for `args`.
    pub fn default_result(&self, args: &[Value]) -> Value {
        match self.safe_default() {
            SafeDefault::PassThrough => args.first().cloned().unwrap_or(Value::Null),
            SafeDefault::Unit => Value::Null,
        }
    }
}

impl std::fmt::Display for LifecycleHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for LifecycleHook {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|hook| hook.as_str() == s)
            .ok_or_else(|| format!("unknown lifecycle hook '{s}'"))
    }
}
