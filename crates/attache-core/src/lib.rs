//! attache-core - Core library for Attache
//!
//! This crate contains the attachment data model, the compose upload
//! manager (a pure reducer over entry state), the byte-size formatting
//! utility, the compose endpoint HTTP client, and the tokio upload driver
//! shared by all Attache front ends.

pub mod api;
pub mod error;
pub mod manager;
pub mod models;
pub mod render;
pub mod uploader;
pub mod util;

pub use error::{Error, Result};
pub use manager::{AttachmentEvent, AttachmentManager, Effect, FormState};
pub use models::{
    AttachmentEntry, AttachmentFile, LocalAttachmentId, RemoteAttachmentId, UploadOutcome,
    UploadState,
};
