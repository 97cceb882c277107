//! # tinshine-shared
//!
//! Data model shared by the record store server and the sync client:
//! records, the collection registry, typed entities, version info and the
//! snapshot / sync payload shapes.

pub mod constants;
pub mod entities;
pub mod error;
pub mod models;
pub mod types;

pub use entities::{BlogPost, Category, Entity, Product};
pub use error::SharedError;
pub use models::{Fields, Record, Snapshot, SyncPayload, VersionInfo};
pub use types::Collection;
