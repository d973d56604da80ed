//! # News Ledger
//!
//! Feed ingestion ledger: pulls article entries from an RSS/Atom feed or a
//! scraped JSON payload, classifies them by title, gives each a stable
//! per-category sequential id, and syncs them into a durable store without
//! ever admitting the same URL twice.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌────────────┐   ┌───────────┐   ┌──────────┐
//! │ Feed / JSON  │──▶│ Classifier │──▶│   Merge   │──▶│ Staging  │
//! │   payload    │   │            │   │ (ids, dup)│   │  (JSON)  │
//! └──────────────┘   └────────────┘   └───────────┘   └────┬─────┘
//!                                                          │ sync
//!                      ┌──────────┐   ┌──────────┐    ┌────▼─────┐
//!                      │   CLI    │   │   HTTP   │───▶│  SQLite  │
//!                      └──────────┘   └──────────┘    └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! news-ledger init                 # create database
//! news-ledger run                  # feed + payload + sync
//! news-ledger counters             # where each category stands
//! news-ledger serve                # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`category`] | Category enum and sequence family table |
//! | [`classify`] | Title-pattern classifier |
//! | [`sequence`] | Sequence counters and id allocation |
//! | [`dedup`] | URL duplicate index |
//! | [`staging`] | Staging JSON document |
//! | [`merge`] | Merge engine |
//! | [`sync`] | Sync engine, rebuild and counter restore |
//! | [`feed`] | RSS/Atom and scraped payload readers |
//! | [`store`] | Article and counter stores |
//! | [`pipeline`] | End-to-end run and run gate |
//! | [`server`] | HTTP server |
//! | [`articles`] | Listing and post-ingestion updates |
//! | [`stats`] | Counter overview |
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod articles;
pub mod category;
pub mod classify;
pub mod config;
pub mod db;
pub mod dedup;
pub mod error;
pub mod feed;
pub mod merge;
pub mod migrate;
pub mod models;
pub mod pipeline;
pub mod sequence;
pub mod server;
pub mod staging;
pub mod stats;
pub mod store;
pub mod sync;
