//! Network layer root module.
//!
//! This module wraps the player-identity and cloud-data backend:
//! - Backend capability surface and an in-process implementation
//! - Group ids and the friend match exchange built on shared groups
//! - Device identity and session bookkeeping
//! - The continuation façade delivering results on the host thread

pub mod types;
pub mod error;
pub mod backend;
pub mod memory;
pub mod group_id;
pub mod matches;
pub mod device_id;
pub mod session;
pub mod manager;
