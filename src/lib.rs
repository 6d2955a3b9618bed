#![cfg_attr(not(test), deny(clippy::panic))]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::too_many_lines
)]

//! # Card Duel Server
//!
//! A realtime, line-delimited TCP server for a two-player turn-based card
//! duel. Clients connect over a raw socket, authenticate, signal readiness,
//! get paired into a room, and exchange plays until one side's health
//! reaches zero.

/// Startup-loaded catalogs: cards, bonds, response codes
pub mod catalog;

/// Server configuration (defaults, config.json, env overrides)
pub mod config;

/// Typed publish/subscribe event bus
pub mod events;

/// Game domain: cards, bonds, rooms, rule engine
pub mod game;

/// Structured logging configuration
pub mod logging;

/// Wire protocol: envelopes, framing, snapshot shapes
pub mod protocol;

/// Connection registry and session lifecycle
pub mod registry;

/// Orchestration: accept loop, command handlers, event processors
pub mod server;

/// Read-through store abstraction (in-memory implementation)
pub mod store;
