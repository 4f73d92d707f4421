//! Sheets v4 implementation of [`AuditLog`].

use serde_json::json;

use mirror_core::remote::{AuditLog, AuditRow};
use mirror_core::RemoteError;

use crate::http::{encode_segment, map_error, Session};

#[derive(Debug, Clone)]
pub struct SheetsLog {
    session: Session,
    api_url: String,
}

impl SheetsLog {
    pub fn new(token: impl Into<String>, api_url: impl Into<String>) -> Self {
        Self {
            session: Session::new(token),
            api_url: api_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// `values:append` URL for the whole of `tab`.
    pub fn append_url(&self, sheet_id: &str, tab: &str) -> String {
        format!(
            "{}/spreadsheets/{}/values/{}:append",
            self.api_url,
            encode_segment(sheet_id),
            encode_segment(tab)
        )
    }
}

impl AuditLog for SheetsLog {
    fn append_row(&self, sheet_id: &str, tab: &str, row: &AuditRow) -> Result<(), RemoteError> {
        self.session
            .request("POST", &self.append_url(sheet_id, tab))
            .query("valueInputOption", "USER_ENTERED")
            .query("insertDataOption", "INSERT_ROWS")
            .send_json(json!({ "values": [row.cells()] }))
            .map_err(|e| map_error(e, None))?;
        tracing::debug!("logged '{}' to {tab}", row.label);
        Ok(())
    }
}
