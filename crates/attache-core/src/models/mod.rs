//! Data models for Attache

mod attachment;

pub use attachment::{
    AttachmentEntry, AttachmentFile, LocalAttachmentId, RemoteAttachmentId, UploadOutcome,
    UploadState,
};
