//! Configuration components for the daemon and its clients.

pub mod networking;

pub use networking::*;
