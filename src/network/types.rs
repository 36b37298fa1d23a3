use serde::{Serialize, Deserialize};

/// A player known to this client: the local user or a friend.
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq, Eq, Hash)]
pub struct GameUser {
    pub user_id: String,
    pub user_name: String,
}

impl GameUser {
    pub fn new(user_id: impl Into<String>, user_name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            user_name: user_name.into(),
        }
    }
}

/// Entry of a player's friends list.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct FriendInfo {
    pub friend_player_id: String,
    pub username: Option<String>,
}

impl FriendInfo {
    /// The friend as a [`GameUser`], falling back to the id when no username is set.
    pub fn to_user(&self) -> GameUser {
        GameUser::new(
            self.friend_player_id.clone(),
            self.username.clone().unwrap_or_else(|| self.friend_player_id.clone()),
        )
    }
}

/// Public account record returned by account lookups.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct AccountInfo {
    pub player_id: String,
    pub username: Option<String>,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

/// Result of any successful login or registration.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct LoginResult {
    pub player_id: String,
    /// Username of the account, if it has one (anonymous device accounts do not).
    pub username: Option<String>,
    pub newly_created: bool,
}

/// Field an account lookup searches on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AccountQuery {
    Username(String),
    Email(String),
    PlayerId(String),
    DisplayName(String),
}

impl AccountQuery {
    /// The four lookups tried when searching for a user by free text.
    pub fn all_for(text: &str) -> [AccountQuery; 4] {
        [
            AccountQuery::Username(text.to_string()),
            AccountQuery::Email(text.to_string()),
            AccountQuery::PlayerId(text.to_string()),
            AccountQuery::DisplayName(text.to_string()),
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            AccountQuery::Username(_) => "GetAccountInfo(username)",
            AccountQuery::Email(_) => "GetAccountInfo(email)",
            AccountQuery::PlayerId(_) => "GetAccountInfo(id)",
            AccountQuery::DisplayName(_) => "GetAccountInfo(displayName)",
        }
    }
}
