//! Server-rendered report download.

#[cfg(test)]
#[path = "export_test.rs"]
mod export_test;

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use super::session::SessionContext;
use crate::error::ConsoleError;
use crate::net::api::BackendApi;
use crate::net::types::ExportFormat;

#[derive(Clone)]
pub struct ReportExporter {
    api: Arc<dyn BackendApi>,
    session: SessionContext,
    download_dir: PathBuf,
}

impl ReportExporter {
    pub fn new(api: Arc<dyn BackendApi>, session: SessionContext, download_dir: PathBuf) -> Self {
        Self { api, session, download_dir }
    }

    /// Download the report and write it as `sentinel_report.<ext>` in the
    /// download directory. Returns the written path.
    ///
    /// # Errors
    ///
    /// Request errors from the download, or an I/O error from the write.
    pub async fn export(&self, format: ExportFormat) -> Result<PathBuf, ConsoleError> {
        let ticket = self.session.ticket()?;
        let bytes = self
            .api
            .export_report(&ticket.token, format)
            .await?;
        let path = self.download_dir.join(format.file_name());
        tokio::fs::write(&path, &bytes).await?;
        info!(path = %path.display(), bytes = bytes.len(), "report exported");
        Ok(path)
    }
}
