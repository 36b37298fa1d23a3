//! Backend capability surface.
//!
//! The identity and cloud-data service is an external collaborator: this crate only
//! consumes the operations below. Calls are asynchronous request/response; a call that
//! never completes simply never resolves. The caller identity is passed explicitly.

use std::collections::HashMap;
use std::future::Future;

use super::error::{BackendError, BackendResult};
use super::types::{AccountInfo, AccountQuery, FriendInfo, LoginResult};

/// Operation names, used in logs, failure reports and failure injection.
pub mod ops {
    pub const LOGIN_WITH_CUSTOM_ID: &str = "LoginWithCustomID";
    pub const REGISTER_USER: &str = "RegisterUser";
    pub const LOGIN_WITH_PASSWORD: &str = "LoginWithPassword";
    pub const LINK_CUSTOM_ID: &str = "LinkCustomID";
    pub const UNLINK_CUSTOM_ID: &str = "UnlinkCustomID";
    pub const ADD_FRIEND: &str = "AddFriend";
    pub const GET_FRIENDS_LIST: &str = "GetFriendsList";
    pub const GET_ACCOUNT_INFO: &str = "GetAccountInfo";
    pub const CREATE_SHARED_GROUP: &str = "CreateSharedGroup";
    pub const ADD_SHARED_GROUP_MEMBERS: &str = "AddSharedGroupMembers";
    pub const GET_SHARED_GROUP_DATA: &str = "GetSharedGroupData";
    pub const UPDATE_SHARED_GROUP_DATA: &str = "UpdateSharedGroupData";
}

/// Player-identity and shared-group storage service.
pub trait PlayerBackend: Send + Sync + 'static {
    /// Log in with a device-bound custom id, optionally creating the account.
    fn login_with_custom_id(
        &self,
        custom_id: &str,
        create_account: bool,
    ) -> impl Future<Output = BackendResult<LoginResult>> + Send;

    /// Register a username/password account.
    fn register_user(
        &self,
        username: &str,
        password: &str,
    ) -> impl Future<Output = BackendResult<LoginResult>> + Send;

    fn login_with_password(
        &self,
        username: &str,
        password: &str,
    ) -> impl Future<Output = BackendResult<LoginResult>> + Send;

    /// Attach a custom id to `player_id`. With `force_link`, steal it from any
    /// account it is currently linked to.
    fn link_custom_id(
        &self,
        player_id: &str,
        custom_id: &str,
        force_link: bool,
    ) -> impl Future<Output = BackendResult<()>> + Send;

    fn unlink_custom_id(
        &self,
        player_id: &str,
        custom_id: &str,
    ) -> impl Future<Output = BackendResult<()>> + Send;

    /// Add `friend_id` to `player_id`'s friends list (one direction only).
    fn add_friend(
        &self,
        player_id: &str,
        friend_id: &str,
    ) -> impl Future<Output = BackendResult<()>> + Send;

    fn get_friends_list(
        &self,
        player_id: &str,
    ) -> impl Future<Output = BackendResult<Vec<FriendInfo>>> + Send;

    fn get_account_info(
        &self,
        query: &AccountQuery,
    ) -> impl Future<Output = BackendResult<AccountInfo>> + Send;

    /// Create a shared group owned by `player_id`. Returns the group id.
    fn create_shared_group(
        &self,
        player_id: &str,
        group_id: &str,
    ) -> impl Future<Output = BackendResult<String>> + Send;

    fn add_shared_group_members(
        &self,
        group_id: &str,
        member_ids: &[String],
    ) -> impl Future<Output = BackendResult<()>> + Send;

    /// Read a group's whole data map.
    fn get_shared_group_data(
        &self,
        group_id: &str,
    ) -> impl Future<Output = BackendResult<HashMap<String, String>>> + Send;

    /// Write fields of a group's data map. `player_id` must be a member.
    fn update_shared_group_data(
        &self,
        player_id: &str,
        group_id: &str,
        data: HashMap<String, String>,
    ) -> impl Future<Output = BackendResult<()>> + Send;

    /// Write `key = value` only if the field currently holds `expected`
    /// (`None`: field absent). Returns false when the field did not match.
    ///
    /// The default reads then writes and is not atomic; backends with a conditional
    /// write should override it.
    fn compare_and_swap_shared_group_data(
        &self,
        player_id: &str,
        group_id: &str,
        key: &str,
        expected: Option<&str>,
        value: String,
    ) -> impl Future<Output = BackendResult<bool>> + Send {
        async move {
            let current = self.get_shared_group_data(group_id).await?;
            if current.get(key).map(String::as_str) != expected {
                return Ok(false);
            }
            let data = HashMap::from([(key.to_string(), value)]);
            self.update_shared_group_data(player_id, group_id, data).await?;
            Ok(true)
        }
    }
}

/// Error returned by backends that cannot be reached.
pub fn unavailable(operation: &str) -> BackendError {
    BackendError::new(
        super::error::codes::SERVICE_UNAVAILABLE,
        format!("{} could not reach the service", operation),
    )
}
