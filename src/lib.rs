//! # semdex
//!
//! Document ingestion, AI enrichment, and semantic search.
//!
//! semdex extracts text from local files and uploads, embeds it and asks a
//! language model for classification labels, stores the result in SQLite,
//! and answers similarity searches over a CLI and a JSON HTTP API.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────────┐   ┌──────────┐
//! │ Directory / │──▶│ Extract ─▶ Enrich │──▶│  SQLite   │
//! │   Upload    │   │ (embed ∥ classify)│   │ + vectors │
//! └─────────────┘   └──────────────────┘   └────┬─────┘
//!                                               │
//!                        ┌──────────────────────┤
//!                        ▼                      ▼
//!                   ┌──────────┐          ┌──────────┐
//!                   │   CLI    │          │   HTTP   │
//!                   │ (semdex) │          │  (axum)  │
//!                   └──────────┘          └──────────┘
//! ```
//!
//! The runtime-agnostic pieces (model, identity, pipeline, search, stats)
//! live in the `semdex-core` crate; this crate wires them to concrete
//! storage, providers, and frontends.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`db`] / [`migrate`] | SQLite connection and schema |
//! | [`sqlite_store`] | SQLite `VectorStore` |
//! | [`extract`] | Text extraction per format |
//! | [`embedding`] / [`classify`] | HTTP model providers |
//! | [`blob`] | Storage for uploaded bytes |
//! | [`indexer`] | Directory and upload indexing |
//! | [`jobs`] | Background index jobs |
//! | [`service`] | Operations shared by CLI and HTTP |
//! | [`server`] | HTTP API |

pub mod blob;
pub mod classify;
pub mod commands;
pub mod config;
pub mod db;
pub mod embedding;
pub mod extract;
pub mod indexer;
pub mod jobs;
pub mod logging;
pub mod migrate;
pub mod progress;
pub mod retry;
pub mod server;
pub mod service;
pub mod sqlite_store;
