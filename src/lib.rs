//! schedario — the client-side entity cache and mutation layer of a
//! record-management front end.
//!
//! A signed-in session holds one [`cache::CacheSession`] over one
//! [`cache::CacheStore`]. Screens read collection pages and record details
//! through the session, which serves cached slots when fresh, seeds detail
//! slots from already-loaded collection rows on list → detail navigation, and
//! refetches through the [`application::fetch::FetchAdapter`] otherwise.
//! Writes go through the [`application::write::WriteAdapter`]; the confirmed
//! result is reconciled into every affected slot before the
//! [`application::status::StatusSink`] hears about it, and a failed write
//! leaves the cache untouched.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;

pub use application::fetch::{FetchAdapter, FetchError};
pub use application::pagination::{Page, PageRequest};
pub use application::status::{StatusNote, StatusSink};
pub use application::write::{ConfirmedMutation, MutationDescriptor, WriteAdapter};
pub use cache::{CacheSession, CacheStore, CollectionKey, QueryKey, StalenessPolicy, ViewGuard};
pub use config::Settings;
