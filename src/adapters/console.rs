//! Console stand-ins for the remote collaborators.
//!
//! The spreadsheet append and push service are deployment specific; these
//! adapters print what would be sent so the worker's whole path (rate
//! limit, retries, classification) runs on a bench unit with no network.

use log::{info, warn};

use crate::app::ports::{Notifier, RowSink, SinkError};
use crate::telemetry::notify::NotifyCategory;
use crate::telemetry::row::LogRow;

/// Prints each row as the JSON body of an append call.
///
/// Not ready until the first [`RowSink::maintain`], like a session that
/// has to fetch a token before its first request.
#[derive(Debug, Default)]
pub struct ConsoleRowSink {
    session_ready: bool,
    appended: u32,
}

impl ConsoleRowSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn appended(&self) -> u32 {
        self.appended
    }
}

impl RowSink for ConsoleRowSink {
    fn is_ready(&self) -> bool {
        self.session_ready
    }

    fn maintain(&mut self) {
        if !self.session_ready {
            info!("ROW | session ready");
            self.session_ready = true;
        }
    }

    fn append_row(&mut self, row: &LogRow) -> Result<(), SinkError> {
        let body = row.to_json().map_err(|e| {
            warn!("ROW | encode failed: {}", e);
            SinkError::Io
        })?;
        info!("ROW | {}", body);
        self.appended = self.appended.wrapping_add(1);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn send(&mut self, title: &str, body: &str, category: NotifyCategory) -> Result<(), SinkError> {
        info!("PUSH | [{}] {} | {}", category.tag(), title, body.replace('\n', " | "));
        Ok(())
    }
}
