use super::error::Result;
use super::handle::{FileHandle, PermissionState};
use super::notify::Notice;
use super::schema::ReconcileReport;
use super::service::LocalFileService;
use crate::config::DeniedPolicy;
use tracing::{debug, info, warn};

impl LocalFileService {
    /// Re-validate the persisted handle of every local record and give the
    /// record a fresh ephemeral URL. Meant to run once at startup.
    ///
    /// Records are visited one at a time in list order. With
    /// [`DeniedPolicy::Halt`] the first unreadable handle stops the pass and
    /// later records stay stale. A handle entry that cannot be read is
    /// counted as failed and the pass moves on.
    pub async fn reconcile(&self) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        let snapshot = self.images.read();

        for record in snapshot.iter().filter(|r| r.is_local()) {
            let id = &record.id;
            let handle = match self.store.get(id).await {
                Ok(Some(handle)) => handle,
                Ok(None) => {
                    debug!(%id, "No persisted handle, record left as is");
                    report.skipped.push(id.clone());
                    continue;
                }
                Err(e) => {
                    warn!(%id, error = %format!("{e:#}"), "Persisted handle unreadable");
                    report.failed.push(id.clone());
                    continue;
                }
            };

            let permission = match handle.query_permission().await {
                Ok(permission) => permission,
                Err(e) => {
                    warn!(%id, error = %e, "Permission query failed");
                    report.failed.push(id.clone());
                    continue;
                }
            };
            if permission != PermissionState::Granted {
                report.denied.push(id.clone());
                if self.config.reconcile.on_denied == DeniedPolicy::Halt {
                    report.halted = true;
                    break;
                }
                continue;
            }

            match self.refresh(id, &handle).await {
                Ok(true) => report.refreshed.push(id.clone()),
                Ok(false) => report.skipped.push(id.clone()),
                Err(e) => {
                    warn!(%id, error = %e, "Could not resolve persisted handle");
                    report.failed.push(id.clone());
                }
            }
        }

        if !report.denied.is_empty() {
            self.notifier.notify(&Notice::PermissionNotGranted {
                denied: report.denied.len(),
                halted: report.halted,
            });
        }
        info!(
            refreshed = report.refreshed.len(),
            skipped = report.skipped.len(),
            denied = report.denied.len(),
            failed = report.failed.len(),
            halted = report.halted,
            "Reconciliation finished"
        );
        report
    }

    // Returns false when the record disappeared while its file was resolved.
    async fn refresh(&self, id: &str, handle: &FileHandle) -> Result<bool> {
        let file = handle.get_file().await?;
        let url = self.urls.create(file);

        let mut replaced = Vec::new();
        let applied = self.images.update_record(id, |record| {
            replaced.push(std::mem::replace(&mut record.preview, url.clone()));
            replaced.push(std::mem::replace(&mut record.full, url.clone()));
        });
        if !applied {
            self.urls.revoke(&url);
            return Ok(false);
        }
        for old in replaced.iter().filter(|old| **old != url) {
            self.urls.revoke(old);
        }
        Ok(true)
    }
}
