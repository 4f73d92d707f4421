//! HTTP adapters for the remote ports: Drive v3 for the folder hierarchy,
//! Sheets v4 for the audit log. Both are blocking `ureq` clients.

pub mod drive;
pub mod http;
pub mod sheets;

pub use drive::DriveClient;
pub use sheets::SheetsLog;
