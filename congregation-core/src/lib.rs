//! Core of the congregation site backend.
//!
//! - `occurrence` and `materialize` turn weekly event templates and one-off
//!   events into the dated list the site displays
//! - `sermon` does the same for the sermon library
//! - `store`, `auth` and `storage` are the ports to the hosted services, each
//!   with an in-process backend
//! - `service` holds the site features built on those ports

pub mod auth;
pub mod backend;
pub mod cache;
pub mod config;
pub mod constants;
pub mod error;
pub mod event;
pub mod materialize;
pub mod month;
pub mod occurrence;
pub mod sermon;
pub mod service;
pub mod storage;
pub mod store;

pub use error::{CongregationError, CongregationResult};
pub use event::{EventInstance, EventRecord, EventType, Recurrence};
pub use materialize::materialize;
pub use occurrence::next_occurrences;
pub use sermon::{Sermon, materialize_sermons};
