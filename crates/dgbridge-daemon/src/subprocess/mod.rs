//! Subprocess management for the bridged console process.

pub mod manager;

pub use manager::{
    ProcessExit, SpawnConfig, StdinWriter, SubprocessBuses, SubprocessError, SubprocessManager,
};
