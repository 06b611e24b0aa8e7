//! The attachment upload manager.
//!
//! Owns the ordered attachment collection and reconciles every mutation
//! into aggregate form state. The manager is a pure reducer: operations
//! return the effects the host must execute (start or abort transports,
//! dispatch removal notices, apply display writes) and never perform I/O
//! themselves, so the whole state machine is testable without a network.
//!
//! Per-entry transitions:
//!
//! ```text
//! Uploading -> Completed   transport success with a remote id
//! Uploading -> Failed      rejection, malformed response, transport error
//! Uploading -> (removed)   dismissed in flight: transport aborted
//! Completed -> (removed)   dismissed after success: removal notice sent
//! Failed    -> (removed)   dismissed after failure: no server contact
//! ```
//!
//! Events carrying an id that is no longer tracked are dropped without
//! effects; that is also what suppresses callbacks from an aborted
//! transport that were already scheduled.

use crate::models::{
    AttachmentEntry, AttachmentFile, LocalAttachmentId, RemoteAttachmentId, UploadOutcome,
    UploadState,
};
use crate::render::RenderOp;
use crate::util::format_size_label;

/// Fixed message for failures of the network operation itself.
pub const TRANSPORT_ERROR_MESSAGE: &str = "an unexpected problem occurred";

/// Fixed message for responses that could not be interpreted.
pub const INVALID_RESPONSE_MESSAGE: &str = "invalid response";

/// Inbound events the manager reduces over.
///
/// File acceptance is not an event: the manager mints the entry id, so it
/// is the method [`AttachmentManager::accept_file`].
#[derive(Debug, Clone, PartialEq)]
pub enum AttachmentEvent {
    /// Transport progress callback for one entry.
    UploadProgress {
        /// Entry the transport belongs to.
        id: LocalAttachmentId,
        /// Bytes reported sent so far.
        bytes_sent: u64,
        /// Total payload bytes.
        bytes_total: u64,
    },
    /// Transport settled with a terminal outcome.
    UploadSettled {
        /// Entry the transport belonged to.
        id: LocalAttachmentId,
        /// Terminal classification of the response.
        outcome: UploadOutcome,
    },
    /// The user invoked an entry's dismiss control.
    DismissRequested {
        /// Entry to remove.
        id: LocalAttachmentId,
    },
}

/// Side effects produced by one reduction step, in execution order.
///
/// Every state-affecting operation ends with exactly one [`Effect::SyncForm`]:
/// aggregate reconciliation is unconditional and always last.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Start the entry's upload transport immediately, concurrent with any
    /// other entry's transport.
    StartUpload {
        /// Entry to upload.
        id: LocalAttachmentId,
        /// Payload to send.
        file: AttachmentFile,
    },
    /// Abort the entry's in-flight transport.
    AbortUpload {
        /// Entry whose transport must stop.
        id: LocalAttachmentId,
    },
    /// Best-effort removal notice for a server-held attachment. Outcome is
    /// neither awaited nor surfaced.
    RemoveRemote {
        /// Identifier the server assigned at upload time.
        remote_id: RemoteAttachmentId,
    },
    /// Display write.
    Render(RenderOp),
    /// Aggregate reconciliation result for the enclosing form.
    SyncForm(FormState),
}

/// Derived collection-wide state handed to the enclosing compose form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormState {
    /// Send/save controls enabled: every tracked entry has completed
    /// (vacuously true for an empty collection).
    pub send_enabled: bool,
    /// Hidden-field value: comma-joined remote ids of completed entries in
    /// collection order, empty when none.
    pub attachment_ids: String,
}

/// Attachment upload manager: the ordered entry collection plus reducer.
#[derive(Debug, Default)]
pub struct AttachmentManager {
    entries: Vec<AttachmentEntry>,
}

impl AttachmentManager {
    /// Create an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracked entries in acceptance order.
    #[must_use]
    pub fn entries(&self) -> &[AttachmentEntry] {
        &self.entries
    }

    /// Look up one entry by id.
    #[must_use]
    pub fn entry(&self, id: LocalAttachmentId) -> Option<&AttachmentEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    /// True while at least one upload is in flight.
    #[must_use]
    pub fn has_uploads_in_flight(&self) -> bool {
        self.entries.iter().any(|entry| entry.state.is_uploading())
    }

    /// Accept a file from the selection surface.
    ///
    /// Creates the entry in `Uploading` state, appends it to the end of the
    /// collection, renders its row, and starts its transport immediately.
    pub fn accept_file(&mut self, file: AttachmentFile) -> (LocalAttachmentId, Vec<Effect>) {
        let id = LocalAttachmentId::new();
        let mut effects = vec![
            Effect::Render(RenderOp::EntryAdded {
                id,
                filename: file.filename.clone(),
                size_label: format_size_label(file.size_bytes()),
            }),
            Effect::StartUpload {
                id,
                file: file.clone(),
            },
        ];
        self.entries.push(AttachmentEntry {
            id,
            file,
            state: UploadState::Uploading { progress: 0.0 },
        });
        effects.push(self.reconcile());
        (id, effects)
    }

    /// Accept a batch of files in the order the surface reported them.
    ///
    /// Both the file picker and drag-and-drop funnel through here, one
    /// entry per file.
    pub fn accept_files(&mut self, files: impl IntoIterator<Item = AttachmentFile>) -> Vec<Effect> {
        files
            .into_iter()
            .flat_map(|file| self.accept_file(file).1)
            .collect()
    }

    /// Reduce one inbound event into state changes plus effects.
    pub fn apply(&mut self, event: AttachmentEvent) -> Vec<Effect> {
        match event {
            AttachmentEvent::UploadProgress {
                id,
                bytes_sent,
                bytes_total,
            } => self.apply_progress(id, bytes_sent, bytes_total),
            AttachmentEvent::UploadSettled { id, outcome } => self.apply_settled(id, outcome),
            AttachmentEvent::DismissRequested { id } => self.apply_dismiss(id),
        }
    }

    /// Derived collection-wide form state.
    #[must_use]
    pub fn form_state(&self) -> FormState {
        let send_enabled = self.entries.iter().all(|entry| entry.state.is_completed());
        let attachment_ids = self
            .entries
            .iter()
            .filter_map(|entry| entry.state.remote_id())
            .map(RemoteAttachmentId::as_str)
            .collect::<Vec<_>>()
            .join(",");
        FormState {
            send_enabled,
            attachment_ids,
        }
    }

    // progress is clamped to [0, 1], so the percent cast cannot truncate
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    fn apply_progress(
        &mut self,
        id: LocalAttachmentId,
        bytes_sent: u64,
        bytes_total: u64,
    ) -> Vec<Effect> {
        let Some(entry) = self.entries.iter_mut().find(|entry| entry.id == id) else {
            return Vec::new();
        };
        let UploadState::Uploading { progress } = &mut entry.state else {
            return Vec::new();
        };
        if bytes_total > 0 {
            *progress = (bytes_sent as f64 / bytes_total as f64).clamp(0.0, 1.0);
        }
        let percent = (*progress * 100.0).floor() as u8;
        vec![
            Effect::Render(RenderOp::EntryProgress { id, percent }),
            self.reconcile(),
        ]
    }

    fn apply_settled(&mut self, id: LocalAttachmentId, outcome: UploadOutcome) -> Vec<Effect> {
        let Some(entry) = self.entries.iter_mut().find(|entry| entry.id == id) else {
            return Vec::new();
        };
        if !entry.state.is_uploading() {
            return Vec::new();
        }
        let op = match outcome {
            UploadOutcome::Completed { remote_id } => {
                entry.state = UploadState::Completed { remote_id };
                RenderOp::EntryCompleted { id }
            }
            UploadOutcome::Rejected { message } => Self::fail_entry(entry, id, message),
            UploadOutcome::MalformedResponse => {
                Self::fail_entry(entry, id, INVALID_RESPONSE_MESSAGE.to_string())
            }
            UploadOutcome::TransportFailed => {
                Self::fail_entry(entry, id, TRANSPORT_ERROR_MESSAGE.to_string())
            }
        };
        vec![Effect::Render(op), self.reconcile()]
    }

    fn apply_dismiss(&mut self, id: LocalAttachmentId) -> Vec<Effect> {
        let Some(index) = self.entries.iter().position(|entry| entry.id == id) else {
            return Vec::new();
        };
        let entry = self.entries.remove(index);
        let mut effects = Vec::new();
        match entry.state {
            UploadState::Uploading { .. } => effects.push(Effect::AbortUpload { id }),
            UploadState::Completed { remote_id } => {
                effects.push(Effect::RemoveRemote { remote_id });
            }
            UploadState::Failed { .. } => {}
        }
        effects.push(Effect::Render(RenderOp::EntryRemoved { id }));
        effects.push(self.reconcile());
        effects
    }

    fn fail_entry(entry: &mut AttachmentEntry, id: LocalAttachmentId, message: String) -> RenderOp {
        let error_text = format!("Error: {message}");
        entry.state = UploadState::Failed { message };
        RenderOp::EntryFailed { id, error_text }
    }

    /// Aggregate reconciliation: recompute the derived form state.
    fn reconcile(&self) -> Effect {
        Effect::SyncForm(self.form_state())
    }
}
