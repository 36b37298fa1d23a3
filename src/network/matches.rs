//! Friend match exchange over shared groups.
//!
//! Every friend pair owns one shared group keyed by [`group_id`]. The group's data map
//! is used as a one-slot mailbox: the current [`MatchState`] of the pair is stored as
//! JSON under [`MATCH_DATA_KEY`]. A group that does not exist, has no data, or lacks the
//! field means the pair has no match yet; that is a normal outcome, not an error.
//!
//! Nothing here retries. Creating a match is three dependent remote steps with no
//! rollback, so a failed creation can leave an empty group behind; readers treat that
//! as "no match".

use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::Arc;

use super::backend::{ops, PlayerBackend};
use super::error::{codes, NetworkError};
use super::group_id::group_id;
use super::types::GameUser;
use crate::config::network::MATCH_DATA_KEY;
use crate::game::match_state::MatchState;

/// Match of the local user with one friend, as reported by [`MatchExchange::get_matches`].
#[derive(Debug)]
pub struct FriendMatch {
    pub friend: GameUser,
    /// `Ok(None)`: no match with this friend yet.
    pub state: Result<Option<MatchState>, NetworkError>,
}

pub struct MatchExchange<B> {
    backend: Arc<B>,
}

impl<B> Clone for MatchExchange<B> {
    fn clone(&self) -> Self {
        Self { backend: self.backend.clone() }
    }
}

impl<B: PlayerBackend> MatchExchange<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    /// Open a new match between `me` (left side) and `friend` (right side).
    ///
    /// Creates the pair's group, adds the friend to it and writes a default match. The
    /// first failing step aborts the operation; earlier steps are not undone.
    pub async fn create_match(&self, me: &GameUser, friend: &GameUser) -> Result<MatchState, NetworkError> {
        let group = group_id(&me.user_id, &friend.user_id)?;

        let group = self
            .backend
            .create_shared_group(&me.user_id, &group)
            .await
            .map_err(|e| NetworkError::logged(ops::CREATE_SHARED_GROUP, e))?;
        debug!("[Matches] Success: CreateSharedGroup {}", group);

        self.backend
            .add_shared_group_members(&group, &[friend.user_id.clone()])
            .await
            .map_err(|e| NetworkError::logged(ops::ADD_SHARED_GROUP_MEMBERS, e))?;
        debug!("[Matches] Success: AddSharedGroupMembers {}", group);

        let state = MatchState::new(me, friend, &mut rand::rng());
        let data = HashMap::from([(MATCH_DATA_KEY.to_string(), encode(&state)?)]);
        self.backend
            .update_shared_group_data(&me.user_id, &group, data)
            .await
            .map_err(|e| NetworkError::logged(ops::UPDATE_SHARED_GROUP_DATA, e))?;

        info!("[Matches] Match created in group {} ({} vs {})", group, me.user_name, friend.user_name);
        Ok(state)
    }

    /// The match between `me` and the user `friend_id`, if there is one.
    pub async fn load_match(&self, me: &GameUser, friend_id: &str) -> Result<Option<MatchState>, NetworkError> {
        let group = group_id(&me.user_id, friend_id)?;
        let Some(data) = self.group_data(&group).await? else {
            return Ok(None);
        };
        match data.get(MATCH_DATA_KEY) {
            Some(json) => decode(&group, json).map(Some),
            None => Ok(None),
        }
    }

    /// True if the pair's group holds any data at all.
    pub async fn has_match(&self, me: &GameUser, friend_id: &str) -> Result<bool, NetworkError> {
        let group = group_id(&me.user_id, friend_id)?;
        Ok(self
            .group_data(&group)
            .await?
            .is_some_and(|data| !data.is_empty()))
    }

    /// Look up the match with every friend of `me`.
    ///
    /// Fails only if the friends list cannot be read; a failed read for one friend is
    /// reported in that friend's entry.
    pub async fn get_matches(&self, me: &GameUser) -> Result<Vec<FriendMatch>, NetworkError> {
        let friends = self
            .backend
            .get_friends_list(&me.user_id)
            .await
            .map_err(|e| NetworkError::logged(ops::GET_FRIENDS_LIST, e))?;

        let mut matches = Vec::with_capacity(friends.len());
        for friend in friends {
            let state = self.load_match(me, &friend.friend_player_id).await;
            matches.push(FriendMatch { friend: friend.to_user(), state });
        }
        Ok(matches)
    }

    /// Store `state` as the pair's current match.
    ///
    /// The stored version must still equal `state.version`; otherwise the other player
    /// saved in between and this write is refused with `Conflict`. On success
    /// `state.version` is bumped to the stored version.
    pub async fn save_match(&self, me: &GameUser, state: &mut MatchState) -> Result<(), NetworkError> {
        let Some(counterpart) = state.opponent_of(&me.user_id) else {
            return Err(NetworkError::NotParticipant {
                user_id: me.user_id.clone(),
                group_id: group_id(&state.player_left_id, &state.player_right_id)?,
            });
        };
        let group = group_id(&me.user_id, counterpart)?;

        let (current, found) = self.stored_match(&group).await?;
        if found != state.version {
            warn!("[Matches] Save refused for {}: expected version {}, found {}", group, state.version, found);
            return Err(NetworkError::Conflict { group_id: group, expected: state.version, found });
        }

        let mut next = state.clone();
        next.version += 1;
        let swapped = self
            .backend
            .compare_and_swap_shared_group_data(&me.user_id, &group, MATCH_DATA_KEY, current.as_deref(), encode(&next)?)
            .await
            .map_err(|e| NetworkError::logged(ops::UPDATE_SHARED_GROUP_DATA, e))?;
        if !swapped {
            let (_, found) = self.stored_match(&group).await?;
            warn!("[Matches] Save lost a race for {}: expected version {}, found {}", group, state.version, found);
            return Err(NetworkError::Conflict { group_id: group, expected: state.version, found });
        }

        state.version = next.version;
        debug!("[Matches] Success: UpdateSharedGroupData {} version={}", group, state.version);
        Ok(())
    }

    /// The stored match JSON and its version (0 when there is none).
    async fn stored_match(&self, group: &str) -> Result<(Option<String>, u64), NetworkError> {
        let current = self
            .group_data(group)
            .await?
            .and_then(|mut data| data.remove(MATCH_DATA_KEY));
        let version = match &current {
            Some(json) => decode(group, json)?.version,
            None => 0,
        };
        Ok((current, version))
    }

    /// A group's data map; `None` if the group does not exist.
    async fn group_data(&self, group: &str) -> Result<Option<HashMap<String, String>>, NetworkError> {
        match self.backend.get_shared_group_data(group).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.is(codes::SHARED_GROUP_NOT_FOUND) => Ok(None),
            Err(e) => Err(NetworkError::logged(ops::GET_SHARED_GROUP_DATA, e)),
        }
    }
}

fn encode(state: &MatchState) -> Result<String, NetworkError> {
    state.to_json().map_err(|e| NetworkError::Serialize(e.to_string()))
}

fn decode(group: &str, json: &str) -> Result<MatchState, NetworkError> {
    MatchState::from_json(json).map_err(|e| NetworkError::MalformedMatch {
        group_id: group.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::memory::InMemoryBackend;

    async fn pair(backend: &Arc<InMemoryBackend>) -> (GameUser, GameUser) {
        let a = backend.register_user("alice", "secret1").await.unwrap();
        let b = backend.register_user("bob", "secret1").await.unwrap();
        backend.add_friend(&a.player_id, &b.player_id).await.unwrap();
        backend.add_friend(&b.player_id, &a.player_id).await.unwrap();
        (GameUser::new(a.player_id, "alice"), GameUser::new(b.player_id, "bob"))
    }

    #[tokio::test]
    async fn test_create_then_load_from_both_sides() {
        let backend = Arc::new(InMemoryBackend::new());
        let exchange = MatchExchange::new(backend.clone());
        let (alice, bob) = pair(&backend).await;

        let created = exchange.create_match(&alice, &bob).await.unwrap();

        assert_eq!(exchange.load_match(&alice, &bob.user_id).await.unwrap(), Some(created.clone()));
        assert_eq!(exchange.load_match(&bob, &alice.user_id).await.unwrap(), Some(created));
        let mut members = vec![alice.user_id.clone(), bob.user_id.clone()];
        members.sort();
        assert_eq!(backend.group_members(&group_id(&alice.user_id, &bob.user_id).unwrap()), Some(members));
    }

    #[tokio::test]
    async fn test_missing_group_or_field_is_absent() {
        let backend = Arc::new(InMemoryBackend::new());
        let exchange = MatchExchange::new(backend.clone());
        let (alice, bob) = pair(&backend).await;

        assert_eq!(exchange.load_match(&alice, &bob.user_id).await.unwrap(), None);
        assert!(!exchange.has_match(&alice, &bob.user_id).await.unwrap());

        let group = group_id(&alice.user_id, &bob.user_id).unwrap();
        backend.create_shared_group(&alice.user_id, &group).await.unwrap();
        let other = HashMap::from([("Other".to_string(), "x".to_string())]);
        backend.update_shared_group_data(&alice.user_id, &group, other).await.unwrap();

        assert_eq!(exchange.load_match(&alice, &bob.user_id).await.unwrap(), None);
        assert!(exchange.has_match(&alice, &bob.user_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_create_failure_names_the_step() {
        let backend = Arc::new(InMemoryBackend::new());
        let exchange = MatchExchange::new(backend.clone());
        let (alice, bob) = pair(&backend).await;
        backend.fail_next(ops::UPDATE_SHARED_GROUP_DATA);

        let err = exchange.create_match(&alice, &bob).await.unwrap_err();

        assert!(matches!(err, NetworkError::Backend { operation: ops::UPDATE_SHARED_GROUP_DATA, .. }));
        // Group and membership stay behind, without a match.
        assert!(backend.group_members(&group_id(&alice.user_id, &bob.user_id).unwrap()).is_some());
        assert_eq!(exchange.load_match(&bob, &alice.user_id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_second_create_for_same_pair_fails() {
        let backend = Arc::new(InMemoryBackend::new());
        let exchange = MatchExchange::new(backend.clone());
        let (alice, bob) = pair(&backend).await;
        exchange.create_match(&alice, &bob).await.unwrap();

        let err = exchange.create_match(&bob, &alice).await.unwrap_err();

        assert_eq!(err.backend_code(), Some(codes::SHARED_GROUP_ID_IN_USE));
    }

    #[tokio::test]
    async fn test_save_bumps_version_and_detects_conflicts() {
        let backend = Arc::new(InMemoryBackend::new());
        let exchange = MatchExchange::new(backend.clone());
        let (alice, bob) = pair(&backend).await;
        let created = exchange.create_match(&alice, &bob).await.unwrap();

        let mut alice_view = created.clone();
        let mut bob_view = created;
        alice_view.player_right_health -= 25;
        alice_view.is_player_left_turn = false;
        exchange.save_match(&alice, &mut alice_view).await.unwrap();
        assert_eq!(alice_view.version, 1);

        bob_view.player_left_health -= 10;
        let err = exchange.save_match(&bob, &mut bob_view).await.unwrap_err();
        assert!(matches!(err, NetworkError::Conflict { expected: 0, found: 1, .. }));
        assert_eq!(bob_view.version, 0);

        let mut bob_view = exchange.load_match(&bob, &alice.user_id).await.unwrap().unwrap();
        assert_eq!(bob_view, alice_view);
        bob_view.player_left_health -= 10;
        exchange.save_match(&bob, &mut bob_view).await.unwrap();
        assert_eq!(bob_view.version, 2);
    }

    #[tokio::test]
    async fn test_lost_race_reports_stored_version() {
        let backend = Arc::new(InMemoryBackend::new());
        let exchange = MatchExchange::new(backend.clone());
        let (alice, bob) = pair(&backend).await;
        let mut state = exchange.create_match(&alice, &bob).await.unwrap();

        // Bob lands two saves between alice's version check and her write.
        let mut bob_view = state.clone();
        bob_view.version = 2;
        let group = group_id(&alice.user_id, &bob.user_id).unwrap();
        backend.write_before_next_swap(&group, MATCH_DATA_KEY, &bob_view.to_json().unwrap());

        let err = exchange.save_match(&alice, &mut state).await.unwrap_err();

        assert!(matches!(err, NetworkError::Conflict { expected: 0, found: 2, .. }));
        assert_eq!(state.version, 0);
    }

    #[tokio::test]
    async fn test_user_id_with_separator_is_refused() {
        let backend = Arc::new(InMemoryBackend::new());
        let exchange = MatchExchange::new(backend.clone());
        let (alice, _) = pair(&backend).await;

        let err = exchange.load_match(&alice, "not-an-id").await.unwrap_err();

        assert!(matches!(err, NetworkError::InvalidUserId { .. }));
    }

    #[tokio::test]
    async fn test_save_by_outsider_is_refused() {
        let backend = Arc::new(InMemoryBackend::new());
        let exchange = MatchExchange::new(backend.clone());
        let (alice, bob) = pair(&backend).await;
        let mut state = exchange.create_match(&alice, &bob).await.unwrap();

        let carol = GameUser::new("CAROL", "carol");
        let err = exchange.save_match(&carol, &mut state).await.unwrap_err();

        assert!(matches!(err, NetworkError::NotParticipant { .. }));
    }

    #[tokio::test]
    async fn test_malformed_match_is_reported() {
        let backend = Arc::new(InMemoryBackend::new());
        let exchange = MatchExchange::new(backend.clone());
        let (alice, bob) = pair(&backend).await;
        let group = group_id(&alice.user_id, &bob.user_id).unwrap();
        backend.create_shared_group(&alice.user_id, &group).await.unwrap();
        let garbage = HashMap::from([(MATCH_DATA_KEY.to_string(), "{oops".to_string())]);
        backend.update_shared_group_data(&alice.user_id, &group, garbage).await.unwrap();

        let matches = exchange.get_matches(&alice).await.unwrap();

        assert_eq!(matches.len(), 1);
        assert!(matches!(&matches[0].state, Err(NetworkError::MalformedMatch { group_id, .. }) if *group_id == group));
    }

    #[tokio::test]
    async fn test_get_matches_reports_each_friend() {
        let backend = Arc::new(InMemoryBackend::new());
        let exchange = MatchExchange::new(backend.clone());
        let (alice, bob) = pair(&backend).await;
        let carol = backend.register_user("carol", "secret1").await.unwrap();
        backend.add_friend(&alice.user_id, &carol.player_id).await.unwrap();
        exchange.create_match(&alice, &bob).await.unwrap();

        let matches = exchange.get_matches(&alice).await.unwrap();

        assert_eq!(matches.len(), 2);
        let by_name: HashMap<&str, &FriendMatch> =
            matches.iter().map(|m| (m.friend.user_name.as_str(), m)).collect();
        assert!(matches!(&by_name["bob"].state, Ok(Some(s)) if s.player_right_name == "bob"));
        assert!(matches!(&by_name["carol"].state, Ok(None)));
    }

    #[tokio::test]
    async fn test_get_matches_fails_without_friends_list() {
        let backend = Arc::new(InMemoryBackend::new());
        let exchange = MatchExchange::new(backend.clone());
        let (alice, _) = pair(&backend).await;
        backend.fail_next(ops::GET_FRIENDS_LIST);

        let err = exchange.get_matches(&alice).await.unwrap_err();

        assert_eq!(err.backend_code(), Some(codes::SERVICE_UNAVAILABLE));
    }
}
