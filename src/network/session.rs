//! Identity and session bookkeeping.
//!
//! Tracks who is logged in on this device and how: an anonymous account bound to the
//! device id, or a username/password account the device id has been linked to. Also
//! owns the friends list operations, which all act on behalf of the current user.

use log::{debug, info};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::backend::{ops, PlayerBackend};
use super::device_id::DeviceIdStore;
use super::error::{codes, NetworkError};
use super::types::{AccountQuery, GameUser, LoginResult};

#[derive(Debug, Clone, Default)]
struct SessionState {
    current_user: Option<GameUser>,
    logged_in_with_password: bool,
}

/// Session of the local player against a [`PlayerBackend`].
pub struct Session<B> {
    backend: Arc<B>,
    device_ids: DeviceIdStore,
    state: Mutex<SessionState>,
}

impl<B: PlayerBackend> Session<B> {
    pub fn new(backend: Arc<B>, device_ids: DeviceIdStore) -> Self {
        Self {
            backend,
            device_ids,
            state: Mutex::new(SessionState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn current_user(&self) -> Option<GameUser> {
        self.state().current_user.clone()
    }

    /// The current user, or `NotLoggedIn`.
    pub fn require_user(&self) -> Result<GameUser, NetworkError> {
        self.current_user().ok_or(NetworkError::NotLoggedIn)
    }

    pub fn is_logged_in_with_password(&self) -> bool {
        self.state().logged_in_with_password
    }

    fn set_user(&self, user: GameUser, with_password: bool) {
        let mut state = self.state();
        state.current_user = Some(user);
        state.logged_in_with_password = with_password;
    }

    fn device_custom_id(&self) -> Result<String, NetworkError> {
        Ok(self.device_ids.get_value()?.to_string())
    }

    /// Silently log in with this device's id, creating an anonymous account on first run.
    pub async fn login_this_device(&self) -> Result<GameUser, NetworkError> {
        let custom_id = self.device_custom_id()?;
        let result = self
            .backend
            .login_with_custom_id(&custom_id, true)
            .await
            .map_err(|e| NetworkError::logged(ops::LOGIN_WITH_CUSTOM_ID, e))?;

        let (user, with_password) = match result.username.filter(|name| !name.is_empty()) {
            Some(username) => (GameUser::new(result.player_id, username), true),
            None => (GameUser::new(result.player_id.clone(), result.player_id), false),
        };
        info!("[Session] Logged in user: {}", user.user_name);
        self.set_user(user.clone(), with_password);
        Ok(user)
    }

    /// Register a username/password account and bind this device to it.
    pub async fn sign_up(&self, username: &str, password: &str) -> Result<GameUser, NetworkError> {
        let result = self
            .backend
            .register_user(username, password)
            .await
            .map_err(|e| NetworkError::logged(ops::REGISTER_USER, e))?;
        info!("[Session] Registered username: {}", username);

        self.link_device(&result.player_id).await?;
        let user = user_from_login(&result, username);
        self.set_user(user.clone(), true);
        Ok(user)
    }

    /// Log in with username/password and bind this device to that account.
    pub async fn sign_in(&self, username: &str, password: &str) -> Result<GameUser, NetworkError> {
        let result = self
            .backend
            .login_with_password(username, password)
            .await
            .map_err(|e| NetworkError::logged(ops::LOGIN_WITH_PASSWORD, e))?;
        info!("[Session] Logged in username: {}", username);

        self.link_device(&result.player_id).await?;
        let user = user_from_login(&result, username);
        self.set_user(user.clone(), true);
        Ok(user)
    }

    /// Detach this device from the current account. The next device login starts a
    /// fresh anonymous account.
    pub async fn log_out(&self) -> Result<(), NetworkError> {
        let user = self.require_user()?;
        let custom_id = self.device_custom_id()?;
        self.backend
            .unlink_custom_id(&user.user_id, &custom_id)
            .await
            .map_err(|e| NetworkError::logged(ops::UNLINK_CUSTOM_ID, e))?;
        self.state().logged_in_with_password = false;
        info!("[Session] Device unlinked from {}", user.user_name);
        Ok(())
    }

    async fn link_device(&self, player_id: &str) -> Result<(), NetworkError> {
        let custom_id = self.device_custom_id()?;
        self.backend
            .link_custom_id(player_id, &custom_id, true)
            .await
            .map_err(|e| NetworkError::logged(ops::LINK_CUSTOM_ID, e))
    }

    pub async fn add_friend(&self, friend_id: &str) -> Result<(), NetworkError> {
        let user = self.require_user()?;
        self.backend
            .add_friend(&user.user_id, friend_id)
            .await
            .map_err(|e| NetworkError::logged(ops::ADD_FRIEND, e))
    }

    pub async fn friends(&self) -> Result<Vec<GameUser>, NetworkError> {
        let user = self.require_user()?;
        let friends = self
            .backend
            .get_friends_list(&user.user_id)
            .await
            .map_err(|e| NetworkError::logged(ops::GET_FRIENDS_LIST, e))?;
        Ok(friends.iter().map(|f| f.to_user()).collect())
    }

    /// Find users matching `text` by username, email, id or display name, leaving out
    /// the current user and existing friends.
    ///
    /// A lookup that finds no account is skipped; any other failure fails the search.
    pub async fn search_users(&self, text: &str) -> Result<Vec<GameUser>, NetworkError> {
        let user = self.require_user()?;
        let mut excluded: HashSet<String> = self
            .friends()
            .await?
            .into_iter()
            .map(|f| f.user_id)
            .collect();
        excluded.insert(user.user_id);

        let mut found = Vec::new();
        for query in AccountQuery::all_for(text) {
            match self.backend.get_account_info(&query).await {
                Ok(account) => {
                    if excluded.insert(account.player_id.clone()) {
                        let name = account.username.unwrap_or_else(|| account.player_id.clone());
                        found.push(GameUser::new(account.player_id, name));
                    }
                }
                Err(e) if e.is(codes::ACCOUNT_NOT_FOUND) => {
                    debug!("[Session] {} found nothing for {:?}", query.label(), text)
                }
                Err(e) => return Err(NetworkError::logged(ops::GET_ACCOUNT_INFO, e)),
            }
        }
        Ok(found)
    }
}

fn user_from_login(result: &LoginResult, fallback_name: &str) -> GameUser {
    let name = result.username.clone().unwrap_or_else(|| fallback_name.to_string());
    GameUser::new(result.player_id.clone(), name)
}
