//! Ripple - a component dependency graph with change propagation.
//!
//! Ripple keeps a directed graph of generated components and the
//! dependencies between them. It rejects edges that would close a cycle,
//! propagates version and breaking changes to every transitive dependent,
//! and grades the impact of a proposed change before it is made.
//!
//! # Layers
//!
//! - [`domain`]: components, dependencies, and their validation rules
//! - [`storage`]: the [`storage::GraphStore`] trait with its in-memory and
//!   snapshot backends
//! - [`registry`], [`dependency`], [`propagation`], [`impact`]: the services
//! - [`events`]: outbound events and sinks; [`inbound`]: inbound streams
//! - [`engine`]: everything wired together behind one query interface
//!
//! The `ripple` binary wraps [`engine::Engine`] in a CLI.

#![forbid(unsafe_code)]

// Public modules for library usage
pub mod dependency;
pub mod domain;
pub mod engine;
pub mod error;
pub mod events;
pub mod impact;
pub mod inbound;
pub mod propagation;
pub mod registry;
pub mod storage;

// Public CLI module (needed by binary)
pub mod cli;

// Command implementations
pub mod commands;

pub mod config;
pub mod output;
