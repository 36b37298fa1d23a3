//! In-process backend.
//!
//! Implements [`PlayerBackend`] over plain maps behind one lock: accounts, custom-id
//! links, friends and shared groups. Used by tests and by the demo binary. Any
//! operation can be made to fail once with [`InMemoryBackend::fail_next`].

use log::debug;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

use super::backend::{ops, unavailable, PlayerBackend};
use super::error::{codes, BackendError, BackendResult};
use super::types::{AccountInfo, AccountQuery, FriendInfo, LoginResult};
use crate::config::network::MIN_PASSWORD_LEN;

#[derive(Debug, Clone, Default)]
struct Account {
    username: Option<String>,
    password: Option<String>,
    email: Option<String>,
    display_name: Option<String>,
    friends: Vec<String>,
}

#[derive(Debug, Clone, Default)]
struct SharedGroup {
    members: HashSet<String>,
    data: HashMap<String, String>,
}

#[derive(Default)]
struct MemoryState {
    /// Accounts by player id.
    accounts: HashMap<String, Account>,
    /// Custom (device) id -> player id.
    custom_ids: HashMap<String, String>,
    groups: HashMap<String, SharedGroup>,
    /// One-shot failures by operation name.
    failures: HashMap<String, BackendError>,
    /// (group, key, value) written by someone else just before the next compare-and-swap.
    swap_interference: Option<(String, String, String)>,
}

impl MemoryState {
    fn take_failure(&mut self, operation: &str) -> BackendResult<()> {
        match self.failures.remove(operation) {
            Some(err) => {
                debug!("[MemoryBackend] Injected failure for {}: {}", operation, err);
                Err(err)
            }
            None => Ok(()),
        }
    }

    fn account(&self, player_id: &str) -> BackendResult<&Account> {
        self.accounts
            .get(player_id)
            .ok_or_else(|| account_not_found(player_id))
    }

    fn account_mut(&mut self, player_id: &str) -> BackendResult<&mut Account> {
        self.accounts
            .get_mut(player_id)
            .ok_or_else(|| account_not_found(player_id))
    }

    fn create_account(&mut self, account: Account) -> String {
        let player_id = new_player_id();
        self.accounts.insert(player_id.clone(), account);
        player_id
    }

    fn writable_group(&mut self, player_id: &str, group_id: &str) -> BackendResult<&mut SharedGroup> {
        let group = self
            .groups
            .get_mut(group_id)
            .ok_or_else(|| group_not_found(group_id))?;
        if !group.members.contains(player_id) {
            return Err(BackendError::new(
                codes::NOT_A_GROUP_MEMBER,
                format!("{} is not a member of shared group {}", player_id, group_id),
            ));
        }
        Ok(group)
    }
}

/// Thread-safe in-memory backend.
#[derive(Default)]
pub struct InMemoryBackend {
    state: Mutex<MemoryState>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the next call of `operation` (see [`ops`]) fail with `error`.
    pub fn fail_next_with(&self, operation: &str, error: BackendError) {
        self.lock().failures.insert(operation.to_string(), error);
    }

    /// Make the next call of `operation` fail as if the service was unreachable.
    pub fn fail_next(&self, operation: &str) {
        self.fail_next_with(operation, unavailable(operation));
    }

    #[cfg(test)]
    pub fn set_email(&self, player_id: &str, email: &str) -> BackendResult<()> {
        self.lock().account_mut(player_id)?.email = Some(email.to_string());
        Ok(())
    }

    #[cfg(test)]
    pub fn set_display_name(&self, player_id: &str, display_name: &str) -> BackendResult<()> {
        self.lock().account_mut(player_id)?.display_name = Some(display_name.to_string());
        Ok(())
    }

    /// Have another writer store `key = value` in `group_id` right before the next
    /// compare-and-swap runs.
    #[cfg(test)]
    pub fn write_before_next_swap(&self, group_id: &str, key: &str, value: &str) {
        self.lock().swap_interference = Some((group_id.to_string(), key.to_string(), value.to_string()));
    }

    /// Player currently linked to a custom id.
    #[cfg(test)]
    pub fn linked_player(&self, custom_id: &str) -> Option<String> {
        self.lock().custom_ids.get(custom_id).cloned()
    }

    /// Members of a shared group, sorted.
    #[cfg(test)]
    pub fn group_members(&self, group_id: &str) -> Option<Vec<String>> {
        self.lock().groups.get(group_id).map(|g| {
            let mut members: Vec<String> = g.members.iter().cloned().collect();
            members.sort();
            members
        })
    }
}

impl PlayerBackend for InMemoryBackend {
    async fn login_with_custom_id(&self, custom_id: &str, create_account: bool) -> BackendResult<LoginResult> {
        let mut state = self.lock();
        state.take_failure(ops::LOGIN_WITH_CUSTOM_ID)?;
        if let Some(player_id) = state.custom_ids.get(custom_id).cloned() {
            let username = state.account(&player_id)?.username.clone();
            return Ok(LoginResult { player_id, username, newly_created: false });
        }
        if !create_account {
            return Err(BackendError::new(
                codes::ACCOUNT_NOT_FOUND,
                "No account is linked to this custom id",
            ));
        }
        let player_id = state.create_account(Account::default());
        state.custom_ids.insert(custom_id.to_string(), player_id.clone());
        Ok(LoginResult { player_id, username: None, newly_created: true })
    }

    async fn register_user(&self, username: &str, password: &str) -> BackendResult<LoginResult> {
        let mut state = self.lock();
        state.take_failure(ops::REGISTER_USER)?;
        if username.is_empty() || password.len() < MIN_PASSWORD_LEN {
            return Err(BackendError::new(codes::INVALID_PARAMS, "Invalid input parameters").with_details(
                format!("username must not be empty, password needs at least {} characters", MIN_PASSWORD_LEN),
            ));
        }
        if state.accounts.values().any(|a| a.username.as_deref() == Some(username)) {
            return Err(BackendError::new(
                codes::USERNAME_NOT_AVAILABLE,
                format!("Username {} is not available", username),
            ));
        }
        let player_id = state.create_account(Account {
            username: Some(username.to_string()),
            password: Some(password.to_string()),
            ..Account::default()
        });
        Ok(LoginResult { player_id, username: Some(username.to_string()), newly_created: true })
    }

    async fn login_with_password(&self, username: &str, password: &str) -> BackendResult<LoginResult> {
        let mut state = self.lock();
        state.take_failure(ops::LOGIN_WITH_PASSWORD)?;
        state
            .accounts
            .iter()
            .find(|(_, a)| a.username.as_deref() == Some(username) && a.password.as_deref() == Some(password))
            .map(|(player_id, a)| LoginResult {
                player_id: player_id.clone(),
                username: a.username.clone(),
                newly_created: false,
            })
            .ok_or_else(|| BackendError::new(codes::INVALID_USERNAME_OR_PASSWORD, "Invalid username or password"))
    }

    async fn link_custom_id(&self, player_id: &str, custom_id: &str, force_link: bool) -> BackendResult<()> {
        let mut state = self.lock();
        state.take_failure(ops::LINK_CUSTOM_ID)?;
        state.account(player_id)?;
        let claimed_elsewhere = state.custom_ids.get(custom_id).is_some_and(|owner| owner != player_id);
        if claimed_elsewhere && !force_link {
            return Err(BackendError::new(
                codes::LINKED_ID_ALREADY_CLAIMED,
                "This custom id is already linked to another account",
            ));
        }
        state.custom_ids.insert(custom_id.to_string(), player_id.to_string());
        Ok(())
    }

    async fn unlink_custom_id(&self, player_id: &str, custom_id: &str) -> BackendResult<()> {
        let mut state = self.lock();
        state.take_failure(ops::UNLINK_CUSTOM_ID)?;
        if state.custom_ids.get(custom_id).map(String::as_str) != Some(player_id) {
            return Err(BackendError::new(
                codes::CUSTOM_ID_NOT_LINKED,
                "This custom id is not linked to the account",
            ));
        }
        state.custom_ids.remove(custom_id);
        Ok(())
    }

    async fn add_friend(&self, player_id: &str, friend_id: &str) -> BackendResult<()> {
        let mut state = self.lock();
        state.take_failure(ops::ADD_FRIEND)?;
        state.account(friend_id)?;
        let account = state.account_mut(player_id)?;
        if account.friends.iter().any(|f| f == friend_id) {
            return Err(BackendError::new(codes::USERS_ALREADY_FRIENDS, "Users are already friends"));
        }
        account.friends.push(friend_id.to_string());
        Ok(())
    }

    async fn get_friends_list(&self, player_id: &str) -> BackendResult<Vec<FriendInfo>> {
        let mut state = self.lock();
        state.take_failure(ops::GET_FRIENDS_LIST)?;
        let account = state.account(player_id)?;
        Ok(account
            .friends
            .iter()
            .map(|friend_id| FriendInfo {
                friend_player_id: friend_id.clone(),
                username: state.accounts.get(friend_id).and_then(|a| a.username.clone()),
            })
            .collect())
    }

    async fn get_account_info(&self, query: &AccountQuery) -> BackendResult<AccountInfo> {
        let mut state = self.lock();
        state.take_failure(ops::GET_ACCOUNT_INFO)?;
        let matches = |id: &String, a: &Account| match query {
            AccountQuery::Username(name) => a.username.as_ref() == Some(name),
            AccountQuery::Email(email) => a.email.as_ref() == Some(email),
            AccountQuery::PlayerId(player_id) => id == player_id,
            AccountQuery::DisplayName(name) => a.display_name.as_ref() == Some(name),
        };
        state
            .accounts
            .iter()
            .find(|(id, a)| matches(id, a))
            .map(|(id, a)| AccountInfo {
                player_id: id.clone(),
                username: a.username.clone(),
                email: a.email.clone(),
                display_name: a.display_name.clone(),
            })
            .ok_or_else(|| BackendError::new(codes::ACCOUNT_NOT_FOUND, "User not found"))
    }

    async fn create_shared_group(&self, player_id: &str, group_id: &str) -> BackendResult<String> {
        let mut state = self.lock();
        state.take_failure(ops::CREATE_SHARED_GROUP)?;
        state.account(player_id)?;
        if state.groups.contains_key(group_id) {
            return Err(BackendError::new(
                codes::SHARED_GROUP_ID_IN_USE,
                format!("Shared group {} already exists", group_id),
            ));
        }
        let group = SharedGroup {
            members: HashSet::from([player_id.to_string()]),
            data: HashMap::new(),
        };
        state.groups.insert(group_id.to_string(), group);
        Ok(group_id.to_string())
    }

    async fn add_shared_group_members(&self, group_id: &str, member_ids: &[String]) -> BackendResult<()> {
        let mut state = self.lock();
        state.take_failure(ops::ADD_SHARED_GROUP_MEMBERS)?;
        for member in member_ids {
            state.account(member)?;
        }
        let group = state
            .groups
            .get_mut(group_id)
            .ok_or_else(|| group_not_found(group_id))?;
        group.members.extend(member_ids.iter().cloned());
        Ok(())
    }

    async fn get_shared_group_data(&self, group_id: &str) -> BackendResult<HashMap<String, String>> {
        let mut state = self.lock();
        state.take_failure(ops::GET_SHARED_GROUP_DATA)?;
        state
            .groups
            .get(group_id)
            .map(|g| g.data.clone())
            .ok_or_else(|| group_not_found(group_id))
    }

    async fn update_shared_group_data(
        &self,
        player_id: &str,
        group_id: &str,
        data: HashMap<String, String>,
    ) -> BackendResult<()> {
        let mut state = self.lock();
        state.take_failure(ops::UPDATE_SHARED_GROUP_DATA)?;
        state.writable_group(player_id, group_id)?.data.extend(data);
        Ok(())
    }

    async fn compare_and_swap_shared_group_data(
        &self,
        player_id: &str,
        group_id: &str,
        key: &str,
        expected: Option<&str>,
        value: String,
    ) -> BackendResult<bool> {
        let mut state = self.lock();
        state.take_failure(ops::UPDATE_SHARED_GROUP_DATA)?;
        if let Some((other_group, other_key, other_value)) = state.swap_interference.take() {
            if let Some(group) = state.groups.get_mut(&other_group) {
                group.data.insert(other_key, other_value);
            }
        }
        let group = state.writable_group(player_id, group_id)?;
        if group.data.get(key).map(String::as_str) != expected {
            return Ok(false);
        }
        group.data.insert(key.to_string(), value);
        Ok(true)
    }
}

fn new_player_id() -> String {
    Uuid::new_v4().simple().to_string()[..16].to_uppercase()
}

fn account_not_found(player_id: &str) -> BackendError {
    BackendError::new(codes::ACCOUNT_NOT_FOUND, format!("Account {} not found", player_id))
}

fn group_not_found(group_id: &str) -> BackendError {
    BackendError::new(
        codes::SHARED_GROUP_NOT_FOUND,
        format!("Shared group {} not found", group_id),
    )
}
