/// Main configuration module.
///
/// Re-exports submodules for dispatcher, network and game configuration.
pub mod dispatcher;
pub mod network;
pub mod game;
