//! The reusable core of a text-based multi-user world server.
//!
//! The core owns the object store, the relationship graph, persistence, the
//! edge link, connections, sessions, command dispatch and the heartbeat. It
//! deliberately knows nothing about combat, stats or any other game rules;
//! a game composes its content on top through components, commands, systems
//! and the [`hooks::CoreHooks`] surface.

pub mod accounts;
pub mod command;
pub mod commands;
pub mod components;
pub mod connection;
pub mod error;
pub mod game;
pub mod hooks;
pub mod link;
pub mod objects;
pub mod persist;
pub mod prelude;
pub mod protocol;
pub mod search;
pub mod session;
pub mod spatial;
pub mod systems;
pub mod text;
pub mod world;

mod relations;
