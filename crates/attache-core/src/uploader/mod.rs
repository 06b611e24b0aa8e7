//! Tokio driver connecting the manager to concurrent upload transports.
//!
//! One spawned task per accepted file, an abort handle per in-flight
//! upload, and a single event channel back into the reducer. All state
//! mutation happens on the caller's context; transport tasks only emit
//! events, so progress and settle callbacks may interleave arbitrarily
//! across entries.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

use crate::manager::{AttachmentEvent, AttachmentManager, Effect, FormState};
use crate::models::{
    AttachmentEntry, AttachmentFile, LocalAttachmentId, RemoteAttachmentId, UploadOutcome,
};
use crate::render::AttachmentListView;

/// Byte-level progress snapshot emitted by a transport while sending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadProgressUpdate {
    /// Bytes reported sent so far.
    pub bytes_sent: u64,
    /// Total payload bytes.
    pub bytes_total: u64,
}

/// Network seam for one file's upload and the best-effort removal notice.
#[async_trait]
pub trait UploadTransport: Send + Sync + 'static {
    /// Upload one file, emitting progress while the body is consumed.
    ///
    /// The terminal result is always an [`UploadOutcome`]; transport-level
    /// failures are part of the outcome taxonomy, not an `Err`.
    async fn upload(
        &self,
        file: AttachmentFile,
        progress: mpsc::UnboundedSender<UploadProgressUpdate>,
    ) -> UploadOutcome;

    /// Dispatch a removal notice for an already-stored attachment.
    ///
    /// Best effort: failures must be swallowed (logged) by the
    /// implementation, the caller never observes them.
    async fn remove(&self, remote_id: RemoteAttachmentId);
}

/// Drives the attachment manager against a real transport and a view.
///
/// Uploads run concurrently with no cap and no ordering guarantee between
/// completions. There is no timeout policy: a stalled upload stays in
/// flight until dismissed or until its transport reports an error.
pub struct ComposeUploader<T, V> {
    manager: AttachmentManager,
    transport: Arc<T>,
    view: V,
    event_tx: mpsc::UnboundedSender<AttachmentEvent>,
    event_rx: mpsc::UnboundedReceiver<AttachmentEvent>,
    in_flight: HashMap<LocalAttachmentId, AbortHandle>,
}

impl<T: UploadTransport, V: AttachmentListView> ComposeUploader<T, V> {
    /// Create a driver around a transport and a display sink.
    #[must_use]
    pub fn new(transport: Arc<T>, view: V) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        Self {
            manager: AttachmentManager::new(),
            transport,
            view,
            event_tx,
            event_rx,
            in_flight: HashMap::new(),
        }
    }

    /// Accept one file from the selection surface and start its upload.
    pub fn attach(&mut self, file: AttachmentFile) -> LocalAttachmentId {
        let (id, effects) = self.manager.accept_file(file);
        self.run_effects(effects);
        id
    }

    /// Accept a batch of files in the order the surface reported them.
    pub fn attach_all(
        &mut self,
        files: impl IntoIterator<Item = AttachmentFile>,
    ) -> Vec<LocalAttachmentId> {
        files.into_iter().map(|file| self.attach(file)).collect()
    }

    /// Dismiss an entry: abort its in-flight transport, or notify the
    /// server when the upload had already completed.
    ///
    /// Synchronous from the caller's perspective; the entry is gone on
    /// return and any late callbacks from its transport are dropped as
    /// stale.
    pub fn dismiss(&mut self, id: LocalAttachmentId) {
        let effects = self.manager.apply(AttachmentEvent::DismissRequested { id });
        self.run_effects(effects);
    }

    /// Apply the next delivered transport event.
    ///
    /// Returns `false` only when every sender is gone and the channel has
    /// drained; with uploads in flight this waits indefinitely, matching
    /// the no-timeout policy.
    pub async fn pump_event(&mut self) -> bool {
        let Some(event) = self.event_rx.recv().await else {
            return false;
        };
        if let AttachmentEvent::UploadSettled { id, .. } = &event {
            self.in_flight.remove(id);
        }
        let effects = self.manager.apply(event);
        self.run_effects(effects);
        true
    }

    /// Drive delivered events until no entry is still uploading.
    pub async fn run_until_settled(&mut self) {
        while self.manager.has_uploads_in_flight() {
            if !self.pump_event().await {
                break;
            }
        }
    }

    /// Reconciled aggregate state for the enclosing form.
    #[must_use]
    pub fn form_state(&self) -> FormState {
        self.manager.form_state()
    }

    /// Tracked entries in acceptance order.
    #[must_use]
    pub fn entries(&self) -> &[AttachmentEntry] {
        self.manager.entries()
    }

    fn run_effects(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::StartUpload { id, file } => self.start_upload(id, file),
                Effect::AbortUpload { id } => {
                    if let Some(handle) = self.in_flight.remove(&id) {
                        handle.abort();
                    }
                }
                Effect::RemoveRemote { remote_id } => {
                    let transport = Arc::clone(&self.transport);
                    tokio::spawn(async move {
                        transport.remove(remote_id).await;
                    });
                }
                Effect::Render(op) => self.view.render(&op),
                Effect::SyncForm(form) => self.view.sync_form(&form),
            }
        }
    }

    fn start_upload(&mut self, id: LocalAttachmentId, file: AttachmentFile) {
        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<UploadProgressUpdate>();

        // tag raw progress updates with the entry id
        let progress_events = self.event_tx.clone();
        tokio::spawn(async move {
            while let Some(update) = progress_rx.recv().await {
                let event = AttachmentEvent::UploadProgress {
                    id,
                    bytes_sent: update.bytes_sent,
                    bytes_total: update.bytes_total,
                };
                if progress_events.send(event).is_err() {
                    break;
                }
            }
        });

        let transport = Arc::clone(&self.transport);
        let events = self.event_tx.clone();
        let upload = tokio::spawn(async move {
            let outcome = transport.upload(file, progress_tx).await;
            tracing::debug!("upload settled for attachment {id}");
            let _ = events.send(AttachmentEvent::UploadSettled { id, outcome });
        });
        self.in_flight.insert(id, upload.abort_handle());
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use tokio::sync::{mpsc as test_mpsc, oneshot};

    use super::*;
    use crate::render::NullView;

    enum Settle {
        Now(UploadOutcome),
        WhenReleased(oneshot::Receiver<UploadOutcome>),
    }

    struct Script {
        progress: Vec<(u64, u64)>,
        settle: Settle,
    }

    /// Transport scripted per filename; upload starts and removal notices
    /// stream out on channels so tests can await them.
    struct ScriptedTransport {
        scripts: Mutex<HashMap<String, Script>>,
        started_tx: test_mpsc::UnboundedSender<String>,
        removed_tx: test_mpsc::UnboundedSender<RemoteAttachmentId>,
    }

    struct TransportProbes {
        started: test_mpsc::UnboundedReceiver<String>,
        removed: test_mpsc::UnboundedReceiver<RemoteAttachmentId>,
    }

    impl ScriptedTransport {
        fn new() -> (Arc<Self>, TransportProbes) {
            let (started_tx, started) = test_mpsc::unbounded_channel();
            let (removed_tx, removed) = test_mpsc::unbounded_channel();
            (
                Arc::new(Self {
                    scripts: Mutex::new(HashMap::new()),
                    started_tx,
                    removed_tx,
                }),
                TransportProbes { started, removed },
            )
        }

        fn script(&self, filename: &str, progress: Vec<(u64, u64)>, settle: Settle) {
            self.scripts
                .lock()
                .unwrap()
                .insert(filename.to_string(), Script { progress, settle });
        }
    }

    #[async_trait]
    impl UploadTransport for ScriptedTransport {
        async fn upload(
            &self,
            file: AttachmentFile,
            progress: mpsc::UnboundedSender<UploadProgressUpdate>,
        ) -> UploadOutcome {
            let script = self
                .scripts
                .lock()
                .unwrap()
                .remove(&file.filename)
                .expect("missing upload script");
            let _ = self.started_tx.send(file.filename.clone());
            for (bytes_sent, bytes_total) in script.progress {
                let _ = progress.send(UploadProgressUpdate {
                    bytes_sent,
                    bytes_total,
                });
            }
            match script.settle {
                Settle::Now(outcome) => outcome,
                Settle::WhenReleased(gate) => {
                    gate.await.unwrap_or(UploadOutcome::TransportFailed)
                }
            }
        }

        async fn remove(&self, remote_id: RemoteAttachmentId) {
            let _ = self.removed_tx.send(remote_id);
        }
    }

    fn file(name: &str, size: usize) -> AttachmentFile {
        AttachmentFile::new(name, None, vec![0; size]).unwrap()
    }

    fn remote(token: &str) -> RemoteAttachmentId {
        RemoteAttachmentId::new(token).unwrap()
    }

    #[tokio::test]
    async fn concurrent_uploads_settle_independently() {
        let (transport, _probes) = ScriptedTransport::new();
        let (release_a, gate_a) = oneshot::channel();
        let (release_b, gate_b) = oneshot::channel();
        transport.script("a.bin", vec![(2000, 2000)], Settle::WhenReleased(gate_a));
        transport.script("b.bin", vec![(1200, 3000)], Settle::WhenReleased(gate_b));

        let mut uploader = ComposeUploader::new(Arc::clone(&transport), NullView);
        let ids = uploader.attach_all([file("a.bin", 2000), file("b.bin", 3000)]);
        assert_eq!(ids.len(), 2);

        // A settles while B is still mid-flight
        release_a
            .send(UploadOutcome::Completed {
                remote_id: remote("u1"),
            })
            .unwrap();
        while uploader.entries()[0].state.is_uploading() {
            assert!(uploader.pump_event().await);
        }
        let form = uploader.form_state();
        assert!(!form.send_enabled);
        assert_eq!(form.attachment_ids, "u1");
        assert!(uploader.entries()[1].state.is_uploading());

        release_b
            .send(UploadOutcome::Completed {
                remote_id: remote("u2"),
            })
            .unwrap();
        uploader.run_until_settled().await;
        let form = uploader.form_state();
        assert!(form.send_enabled);
        assert_eq!(form.attachment_ids, "u1,u2");
    }

    #[tokio::test]
    async fn dismiss_in_flight_upload_aborts_transport() {
        let (transport, mut probes) = ScriptedTransport::new();
        let (mut release, gate) = oneshot::channel();
        transport.script("a.bin", Vec::new(), Settle::WhenReleased(gate));

        let mut uploader = ComposeUploader::new(Arc::clone(&transport), NullView);
        let id = uploader.attach(file("a.bin", 10));
        assert_eq!(probes.started.recv().await.as_deref(), Some("a.bin"));

        uploader.dismiss(id);
        assert!(uploader.entries().is_empty());
        assert!(uploader.form_state().send_enabled);

        // the aborted task drops its end of the gate
        release.closed().await;
        assert!(probes.removed.try_recv().is_err());
    }

    #[tokio::test]
    async fn dismiss_completed_entry_notifies_server_once() {
        let (transport, mut probes) = ScriptedTransport::new();
        transport.script(
            "a.bin",
            vec![(10, 10)],
            Settle::Now(UploadOutcome::Completed {
                remote_id: remote("u1"),
            }),
        );

        let mut uploader = ComposeUploader::new(Arc::clone(&transport), NullView);
        let id = uploader.attach(file("a.bin", 10));
        uploader.run_until_settled().await;
        assert_eq!(uploader.form_state().attachment_ids, "u1");

        uploader.dismiss(id);
        assert_eq!(probes.removed.recv().await, Some(remote("u1")));
        assert!(probes.removed.try_recv().is_err());
        assert!(uploader.entries().is_empty());
    }

    #[tokio::test]
    async fn failed_upload_blocks_send_until_dismissed() {
        let (transport, mut probes) = ScriptedTransport::new();
        transport.script(
            "huge.iso",
            Vec::new(),
            Settle::Now(UploadOutcome::Rejected {
                message: "too large".to_string(),
            }),
        );

        let mut uploader = ComposeUploader::new(Arc::clone(&transport), NullView);
        let id = uploader.attach(file("huge.iso", 100));
        uploader.run_until_settled().await;

        let entry = &uploader.entries()[0];
        assert_eq!(entry.state.error_message(), Some("too large"));
        assert!(!uploader.form_state().send_enabled);

        uploader.dismiss(id);
        assert!(uploader.form_state().send_enabled);
        // failed entries never contact the server
        assert!(probes.removed.try_recv().is_err());
    }
}
