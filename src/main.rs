//! Main entry point for the arrow duel client core.
//!
//! Starts the main-thread dispatcher on the actix system (the host's update thread),
//! runs network work on a background Tokio runtime, and plays one asynchronous turn
//! between two local players against the in-memory backend.

use log::{error, info};
use std::error::Error;
use std::sync::Arc;
use tokio::runtime::{Builder, Handle};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use config::dispatcher::TICK_INTERVAL;
use dispatch::queue::Dispatcher;
use game::level::LevelManager;
use game::match_state::{MatchState, ShotArrow, Side};
use network::device_id::DeviceIdStore;
use network::error::NetworkError;
use network::manager::NetworkManager;
use network::memory::InMemoryBackend;
use network::types::GameUser;

pub mod config;
mod dispatch;
mod game;
mod network;


type Continuation<T> = Box<dyn FnOnce(T) + Send>;

fn main() -> std::io::Result<()> {
    // Initialize logger from environment variable.
    env_logger::init();

    // Network work runs here; continuations come back to the actix thread.
    let io_runtime = Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("arrow-duel-io")
        .enable_all()
        .build()?;

    let system = actix::System::new();
    if let Err(e) = system.block_on(run(io_runtime.handle().clone())) {
        error!("[Main] Demo turn failed: {}", e);
    }
    Ok(())
}

/// Start a network operation and wait until its continuation has run on the host thread.
async fn settle<T, F>(start: F) -> Result<T, Box<dyn Error>>
where
    T: Send + 'static,
    F: FnOnce(Continuation<T>, Continuation<NetworkError>) -> JoinHandle<()>,
{
    let (tx, mut rx) = mpsc::unbounded_channel();
    let err_tx = tx.clone();
    start(
        Box::new(move |value| {
            let _ = tx.send(Ok(value));
        }),
        Box::new(move |e| {
            let _ = err_tx.send(Err(e));
        }),
    );
    Ok(rx.recv().await.ok_or("continuation dropped")??)
}

async fn run(io: Handle) -> Result<(), Box<dyn Error>> {
    let dispatcher = Dispatcher::new();
    dispatcher.start(TICK_INTERVAL);

    let backend = Arc::new(InMemoryBackend::new());
    let data_dir = config::network::data_dir();
    let alice_ids = DeviceIdStore::in_dir(data_dir.join("alice"));
    if let Ok(pinned) = std::env::var(config::network::DEVICE_ID_ENV) {
        let id = alice_ids.update_value_on_disk(&pinned)?;
        info!("[Main] Device id pinned to {}", id);
    }
    let alice = NetworkManager::new(
        backend.clone(),
        alice_ids,
        dispatcher.clone(),
        io.clone(),
    );
    let bob = NetworkManager::new(
        backend.clone(),
        DeviceIdStore::in_dir(data_dir.join("bob")),
        dispatcher.clone(),
        io,
    );

    let alice_user: GameUser = settle(|ok, err| alice.login_this_device(ok, err)).await?;
    let bob_user: GameUser = settle(|ok, err| bob.login_this_device(ok, err)).await?;
    info!("[Main] Players {} and {} are online", alice_user.user_id, bob_user.user_id);

    settle(|ok, err| alice.add_friend(&bob_user.user_id, move || ok(()), err)).await?;
    settle(|ok, err| bob.add_friend(&alice_user.user_id, move || ok(()), err)).await?;

    let mut state: MatchState = settle(|ok, err| alice.create_match(bob_user.clone(), ok, err)).await?;
    info!("[Main] Match created, wall height {}", state.wall_height);

    // Alice plays left and opens the match.
    state.shot_arrows.push(ShotArrow {
        shooter: Side::Left,
        x: state.player_distance_from_center,
        y: 0.5,
        rotation: -20.0,
    });
    state.player_right_health -= 40;
    state.is_player_left_turn = false;
    let saved: MatchState = settle(|ok, err| alice.save_match(state, ok, err)).await?;
    info!("[Main] Turn saved as version {}", saved.version);

    // Bob has a single friend, so exactly one report comes back.
    let (tx, mut rx) = mpsc::unbounded_channel();
    let err_tx = tx.clone();
    bob.get_matches(
        move |friend, state| {
            let _ = tx.send(Ok((friend, state)));
        },
        move |e| {
            let _ = err_tx.send(Err(e));
        },
    );
    let (friend, found) = rx.recv().await.ok_or("get_matches reported nothing")??;
    let Some(found) = found else {
        return Err(format!("no match found with {}", friend.user_name).into());
    };

    let mut level = LevelManager::new();
    level.start_playing(&found);
    if let Some(setup) = level.current() {
        info!(
            "[Main] Bob opens the level in phase {:?} with {} health left",
            setup.phase, setup.player_right_health
        );
    }
    bob.load_match(found);

    let has_match: bool = settle(|ok, err| alice.has_match(&bob_user.user_id, ok, err)).await?;
    info!("[Main] Alice still has a match with bob: {}", has_match);

    actix::System::current().stop();
    Ok(())
}
