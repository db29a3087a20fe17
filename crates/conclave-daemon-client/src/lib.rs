//! Client library for connecting to a Conclave daemon
//!
//! This crate provides two connection patterns:
//!
//! 1. [`Client`]: strict request/response. `invoke` writes one request and
//!    reads until its reply arrives.
//! 2. [`ListeningClient`]: a background listener reads every inbound frame
//!    and forwards it on a channel, so server pushes (broadcasts, notices)
//!    are seen as they happen. `invoke` only writes.
//!
//! Both share the same [`Connection`] write side.

mod client;
pub mod console;
mod listener;

pub use client::{Client, ClientError, Connection, Inbound};
pub use listener::ListeningClient;
