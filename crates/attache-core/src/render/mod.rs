//! One-way projection from attachment state to a display sink.
//!
//! Entry state lives in the manager as plain data; the view only ever
//! receives attribute writes. Hosts map [`RenderOp`]s onto whatever
//! surface they own: DOM-like nodes, terminal lines, a test recorder.

use crate::manager::FormState;
use crate::models::LocalAttachmentId;

/// A single display write the manager wants applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOp {
    /// New entry row: filename text, human-readable size text, a progress
    /// indicator at zero width, and a dismiss control.
    EntryAdded {
        /// Entry the row belongs to.
        id: LocalAttachmentId,
        /// Filename text.
        filename: String,
        /// Size text, e.g. `"1.5kB"`.
        size_label: String,
    },
    /// Progress indicator width as a floored percent.
    EntryProgress {
        /// Entry the row belongs to.
        id: LocalAttachmentId,
        /// Floored percent in [0, 100].
        percent: u8,
    },
    /// Upload finished: hide the progress indicator.
    EntryCompleted {
        /// Entry the row belongs to.
        id: LocalAttachmentId,
    },
    /// Upload failed: strip the progress indicator and show the error text
    /// in place. The dismiss control stays.
    EntryFailed {
        /// Entry the row belongs to.
        id: LocalAttachmentId,
        /// Inline error text, e.g. `"Error: too large"`.
        error_text: String,
    },
    /// Entry dismissed: drop the row entirely.
    EntryRemoved {
        /// Entry the row belonged to.
        id: LocalAttachmentId,
    },
}

/// Display sink for the attachment list and the enclosing compose form.
pub trait AttachmentListView {
    /// Apply one display write.
    fn render(&mut self, op: &RenderOp);

    /// Mirror the reconciled aggregate state: send/save enablement and the
    /// hidden identifier field value.
    fn sync_form(&mut self, form: &FormState);
}

/// View that discards every write, for headless hosts and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullView;

impl AttachmentListView for NullView {
    fn render(&mut self, _op: &RenderOp) {}

    fn sync_form(&mut self, _form: &FormState) {}
}
