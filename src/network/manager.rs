//! Network manager: continuation façade over the session and the match exchange.
//!
//! Every operation takes a success and a failure continuation. The work runs on the
//! background Tokio runtime; when it completes, exactly one of the two continuations is
//! queued on the [`Dispatcher`] and runs on the host thread at the next drain.
//! Operations that report per friend queue one call per friend.

use log::{debug, info};
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use super::backend::PlayerBackend;
use super::device_id::DeviceIdStore;
use super::error::NetworkError;
use super::matches::{FriendMatch, MatchExchange};
use super::session::Session;
use super::types::GameUser;
use crate::dispatch::queue::Dispatcher;
use crate::game::match_state::MatchState;

pub struct NetworkManager<B> {
    dispatcher: Arc<Dispatcher>,
    session: Arc<Session<B>>,
    matches: MatchExchange<B>,
    runtime: Handle,
    /// Match chosen for play; only written from the host thread.
    current_match: Arc<Mutex<Option<MatchState>>>,
}

impl<B: PlayerBackend> NetworkManager<B> {
    pub fn new(backend: Arc<B>, device_ids: DeviceIdStore, dispatcher: Arc<Dispatcher>, runtime: Handle) -> Self {
        if !dispatcher.is_started() {
            debug!("[NetworkManager] Dispatcher not started; continuations wait for a manual drain");
        }
        Self {
            dispatcher,
            session: Arc::new(Session::new(backend.clone(), device_ids)),
            matches: MatchExchange::new(backend),
            runtime,
            current_match: Arc::new(Mutex::new(None)),
        }
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn current_user(&self) -> Option<GameUser> {
        self.session.current_user()
    }

    pub fn is_logged_in_with_password(&self) -> bool {
        self.session.is_logged_in_with_password()
    }

    /// Run `work` in the background and queue the matching continuation.
    fn run<T, W, S, E>(&self, operation: &'static str, work: W, on_success: S, on_error: E) -> JoinHandle<()>
    where
        T: Send + 'static,
        W: Future<Output = Result<T, NetworkError>> + Send + 'static,
        S: FnOnce(T) + Send + 'static,
        E: FnOnce(NetworkError) + Send + 'static,
    {
        let dispatcher = self.dispatcher.clone();
        self.runtime.spawn(async move {
            match work.await {
                Ok(value) => dispatcher.call_on_main_thread_with(on_success, value),
                Err(err) => {
                    debug!("[NetworkManager] {} reported failure: {}", operation, err);
                    dispatcher.call_on_main_thread_with(on_error, err);
                }
            }
        })
    }

    /// Log in silently with this device's id.
    pub fn login_this_device(
        &self,
        on_success: impl FnOnce(GameUser) + Send + 'static,
        on_error: impl FnOnce(NetworkError) + Send + 'static,
    ) -> JoinHandle<()> {
        let session = self.session.clone();
        self.run("login_this_device", async move { session.login_this_device().await }, on_success, on_error)
    }

    pub fn sign_up(
        &self,
        username: &str,
        password: &str,
        on_success: impl FnOnce(GameUser) + Send + 'static,
        on_error: impl FnOnce(NetworkError) + Send + 'static,
    ) -> JoinHandle<()> {
        let session = self.session.clone();
        let (username, password) = (username.to_string(), password.to_string());
        self.run(
            "sign_up",
            async move { session.sign_up(&username, &password).await },
            on_success,
            on_error,
        )
    }

    pub fn sign_in(
        &self,
        username: &str,
        password: &str,
        on_success: impl FnOnce(GameUser) + Send + 'static,
        on_error: impl FnOnce(NetworkError) + Send + 'static,
    ) -> JoinHandle<()> {
        let session = self.session.clone();
        let (username, password) = (username.to_string(), password.to_string());
        self.run(
            "sign_in",
            async move { session.sign_in(&username, &password).await },
            on_success,
            on_error,
        )
    }

    pub fn log_out(
        &self,
        on_success: impl FnOnce() + Send + 'static,
        on_error: impl FnOnce(NetworkError) + Send + 'static,
    ) -> JoinHandle<()> {
        let session = self.session.clone();
        self.run("log_out", async move { session.log_out().await }, move |()| on_success(), on_error)
    }

    pub fn add_friend(
        &self,
        friend_id: &str,
        on_success: impl FnOnce() + Send + 'static,
        on_error: impl FnOnce(NetworkError) + Send + 'static,
    ) -> JoinHandle<()> {
        let session = self.session.clone();
        let friend_id = friend_id.to_string();
        self.run(
            "add_friend",
            async move { session.add_friend(&friend_id).await },
            move |()| on_success(),
            on_error,
        )
    }

    /// Report every friend to `on_friend`, one host-thread call per friend.
    pub fn load_friends<F>(&self, on_friend: F, on_error: impl FnOnce(NetworkError) + Send + 'static) -> JoinHandle<()>
    where
        F: Fn(GameUser) + Send + Sync + 'static,
    {
        let session = self.session.clone();
        let dispatcher = self.dispatcher.clone();
        let on_friend = Arc::new(on_friend);
        self.run(
            "load_friends",
            async move { session.friends().await },
            move |friends: Vec<GameUser>| {
                for friend in friends {
                    let on_friend = on_friend.clone();
                    dispatcher.call_on_main_thread_with(move |f| on_friend(f), friend);
                }
            },
            on_error,
        )
    }

    /// Search for users to befriend (see [`Session::search_users`]).
    pub fn search_users(
        &self,
        text: &str,
        on_results: impl FnOnce(Vec<GameUser>) + Send + 'static,
        on_error: impl FnOnce(NetworkError) + Send + 'static,
    ) -> JoinHandle<()> {
        let session = self.session.clone();
        let text = text.to_string();
        self.run("search_users", async move { session.search_users(&text).await }, on_results, on_error)
    }

    /// Open a match with `friend`. The local user plays the left side.
    pub fn create_match(
        &self,
        friend: GameUser,
        on_success: impl FnOnce(MatchState) + Send + 'static,
        on_error: impl FnOnce(NetworkError) + Send + 'static,
    ) -> JoinHandle<()> {
        let session = self.session.clone();
        let matches = self.matches.clone();
        self.run(
            "create_match",
            async move {
                let me = session.require_user()?;
                matches.create_match(&me, &friend).await
            },
            on_success,
            on_error,
        )
    }

    /// Report the match with every friend: `on_each_match(friend, None)` when there is
    /// none. A failed read for one friend goes to `on_error` without stopping the others.
    pub fn get_matches<M, E>(&self, on_each_match: M, on_error: E) -> JoinHandle<()>
    where
        M: Fn(GameUser, Option<MatchState>) + Send + Sync + 'static,
        E: Fn(NetworkError) + Send + Sync + 'static,
    {
        let session = self.session.clone();
        let matches = self.matches.clone();
        let dispatcher = self.dispatcher.clone();
        let on_each_match = Arc::new(on_each_match);
        let on_error = Arc::new(on_error);
        let on_list_error = on_error.clone();
        self.run(
            "get_matches",
            async move {
                let me = session.require_user()?;
                matches.get_matches(&me).await
            },
            move |found: Vec<FriendMatch>| {
                for entry in found {
                    match entry.state {
                        Ok(state) => {
                            let on_each_match = on_each_match.clone();
                            dispatcher.call_on_main_thread_with(
                                move |(friend, state)| on_each_match(friend, state),
                                (entry.friend, state),
                            );
                        }
                        Err(err) => {
                            let on_error = on_error.clone();
                            dispatcher.call_on_main_thread_with(move |e| on_error(e), err);
                        }
                    }
                }
            },
            move |err| on_list_error(err),
        )
    }

    /// Tell whether a match exists with `friend_id`.
    pub fn has_match(
        &self,
        friend_id: &str,
        on_result: impl FnOnce(bool) + Send + 'static,
        on_error: impl FnOnce(NetworkError) + Send + 'static,
    ) -> JoinHandle<()> {
        let session = self.session.clone();
        let matches = self.matches.clone();
        let friend_id = friend_id.to_string();
        self.run(
            "has_match",
            async move {
                let me = session.require_user()?;
                matches.has_match(&me, &friend_id).await
            },
            on_result,
            on_error,
        )
    }

    /// Save `state` for the pair. `on_success` receives it with its new version.
    pub fn save_match(
        &self,
        mut state: MatchState,
        on_success: impl FnOnce(MatchState) + Send + 'static,
        on_error: impl FnOnce(NetworkError) + Send + 'static,
    ) -> JoinHandle<()> {
        let session = self.session.clone();
        let matches = self.matches.clone();
        self.run(
            "save_match",
            async move {
                let me = session.require_user()?;
                matches.save_match(&me, &mut state).await?;
                Ok(state)
            },
            on_success,
            on_error,
        )
    }

    /// Make `state` the match to play. Takes effect on the host thread.
    pub fn load_match(&self, state: MatchState) {
        let current = self.current_match.clone();
        self.dispatcher.call_on_main_thread(move || {
            info!(
                "[NetworkManager] Loading match {} vs {}",
                state.player_left_name, state.player_right_name
            );
            *current.lock().unwrap_or_else(PoisonError::into_inner) = Some(state);
        });
    }

    pub fn current_match(&self) -> Option<MatchState> {
        self.current_match
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
