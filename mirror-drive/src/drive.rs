//! Drive v3 implementation of [`RemoteHierarchy`].

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::json;

use mirror_core::remote::{ChildEntry, RemoteHierarchy, FOLDER_MIME};
use mirror_core::{RemoteError, RemoteId};

use crate::http::{decode, encode_segment, map_error, Session};

const BOUNDARY: &str = "catalog_mirror_boundary_7f3a";
const PAGE_SIZE: &str = "1000";

/// Blocking Drive client for one identity.
#[derive(Debug, Clone)]
pub struct DriveClient {
    session: Session,
    api_url: String,
    upload_url: String,
}

#[derive(Debug, Deserialize)]
struct FileId {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Parents {
    #[serde(default)]
    parents: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<ListedFile>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListedFile {
    id: String,
    name: String,
}

impl DriveClient {
    pub fn new(token: impl Into<String>, api_url: impl Into<String>, upload_url: impl Into<String>) -> Self {
        Self {
            session: Session::new(token),
            api_url: api_url.into().trim_end_matches('/').to_string(),
            upload_url: upload_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn file_url(&self, id: &RemoteId) -> String {
        format!("{}/files/{}", self.api_url, encode_segment(&id.0))
    }

    /// All files matching `query`, following page tokens.
    fn list(&self, query: &str) -> Result<Vec<ListedFile>, RemoteError> {
        let mut files = vec![];
        let mut page_token: Option<String> = None;
        loop {
            let mut request = self
                .session
                .request("GET", &format!("{}/files", self.api_url))
                .query("q", query)
                .query("fields", "nextPageToken,files(id,name)")
                .query("pageSize", PAGE_SIZE);
            if let Some(token) = &page_token {
                request = request.query("pageToken", token);
            }
            let page: FileList = decode(request.call().map_err(|e| map_error(e, None))?)?;
            files.extend(page.files);
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }
        Ok(files)
    }

    fn patch_parents(&self, id: &RemoteId, param: &str, parent: &RemoteId) -> Result<(), RemoteError> {
        self.session
            .request("PATCH", &self.file_url(id))
            .query(param, &parent.0)
            .query("fields", "id")
            .send_json(json!({}))
            .map_err(|e| map_error(e, Some(&id.0)))?;
        Ok(())
    }
}

/// Quote a literal for a Drive `q` expression.
pub fn query_literal(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// `multipart/related` body with JSON metadata followed by the media part.
pub fn multipart_body(metadata: &serde_json::Value, mime_type: &str, content: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(content.len() + 512);
    body.extend_from_slice(format!("--{BOUNDARY}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n").as_bytes());
    body.extend_from_slice(metadata.to_string().as_bytes());
    body.extend_from_slice(format!("\r\n--{BOUNDARY}\r\nContent-Type: {mime_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn read_upload(path: &Path) -> Result<Vec<u8>, RemoteError> {
    fs::read(path).map_err(|e| RemoteError::Upload {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

impl RemoteHierarchy for DriveClient {
    fn create_folder(&self, name: &str, parent: &RemoteId) -> Result<RemoteId, RemoteError> {
        let response = self
            .session
            .request("POST", &format!("{}/files", self.api_url))
            .query("fields", "id")
            .send_json(json!({
                "name": name,
                "mimeType": FOLDER_MIME,
                "parents": [parent.0],
            }))
            .map_err(|e| map_error(e, Some(&parent.0)))?;
        let created: FileId = decode(response)?;
        tracing::debug!("created folder '{name}' ({})", created.id);
        Ok(RemoteId(created.id))
    }

    fn create_file(
        &self,
        name: &str,
        parents: &[RemoteId],
        local_path: &Path,
        mime_type: &str,
    ) -> Result<RemoteId, RemoteError> {
        let content = read_upload(local_path)?;
        let parent_ids: Vec<&str> = parents.iter().map(|p| p.0.as_str()).collect();
        let metadata = json!({
            "name": name,
            "mimeType": mime_type,
            "parents": parent_ids,
        });
        let response = self
            .session
            .request("POST", &format!("{}/files", self.upload_url))
            .query("uploadType", "multipart")
            .query("fields", "id")
            .set("Content-Type", &format!("multipart/related; boundary={BOUNDARY}"))
            .send_bytes(&multipart_body(&metadata, mime_type, &content))
            .map_err(|e| map_error(e, None))?;
        let created: FileId = decode(response)?;
        tracing::debug!("uploaded '{name}' ({} bytes) as {}", content.len(), created.id);
        Ok(RemoteId(created.id))
    }

    fn update_file(&self, id: &RemoteId, local_path: &Path, mime_type: &str) -> Result<(), RemoteError> {
        let content = read_upload(local_path)?;
        self.session
            .request("PATCH", &format!("{}/files/{}", self.upload_url, encode_segment(&id.0)))
            .query("uploadType", "media")
            .query("fields", "id")
            .set("Content-Type", mime_type)
            .send_bytes(&content)
            .map_err(|e| map_error(e, Some(&id.0)))?;
        tracing::debug!("updated {id} ({} bytes)", content.len());
        Ok(())
    }

    fn list_children(&self, parent: &RemoteId) -> Result<Vec<ChildEntry>, RemoteError> {
        let query = format!("{} in parents and trashed = false", query_literal(&parent.0));
        Ok(self
            .list(&query)?
            .into_iter()
            .map(|f| ChildEntry {
                name: f.name,
                id: RemoteId(f.id),
            })
            .collect())
    }

    fn find_child_by_name(&self, name: &str, parent: &RemoteId) -> Result<Option<RemoteId>, RemoteError> {
        let query = format!(
            "name = {} and {} in parents and trashed = false",
            query_literal(name),
            query_literal(&parent.0)
        );
        // Drive name matching is case-insensitive; keep only exact spellings.
        Ok(self
            .list(&query)?
            .into_iter()
            .find(|f| f.name == name)
            .map(|f| RemoteId(f.id)))
    }

    fn get_parents(&self, id: &RemoteId) -> Result<BTreeSet<RemoteId>, RemoteError> {
        let response = self
            .session
            .request("GET", &self.file_url(id))
            .query("fields", "parents")
            .call()
            .map_err(|e| map_error(e, Some(&id.0)))?;
        let parents: Parents = decode(response)?;
        Ok(parents.parents.into_iter().map(RemoteId).collect())
    }

    fn add_parent(&self, id: &RemoteId, parent: &RemoteId) -> Result<(), RemoteError> {
        self.patch_parents(id, "addParents", parent)
    }

    fn remove_parent(&self, id: &RemoteId, parent: &RemoteId) -> Result<(), RemoteError> {
        self.patch_parents(id, "removeParents", parent)
    }

    fn set_owner(&self, id: &RemoteId, principal: &str) -> Result<(), RemoteError> {
        self.session
            .request("POST", &format!("{}/permissions", self.file_url(id)))
            .query("transferOwnership", "true")
            .send_json(json!({
                "type": "user",
                "role": "owner",
                "emailAddress": principal,
            }))
            .map_err(|e| map_error(e, Some(&id.0)))?;
        Ok(())
    }

    fn delete(&self, id: &RemoteId) -> Result<(), RemoteError> {
        self.session
            .request("DELETE", &self.file_url(id))
            .call()
            .map_err(|e| map_error(e, Some(&id.0)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("lakes", "'lakes'")]
    #[case("Bob's roads", "'Bob\\'s roads'")]
    #[case("a\\b", "'a\\\\b'")]
    fn query_literals_are_escaped(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(query_literal(input), expected);
    }

    #[test]
    fn multipart_body_frames_metadata_and_media() {
        let body = multipart_body(&json!({"name": "a.tar.gz"}), "application/gzip", b"DATA");
        let text = String::from_utf8(body).expect("utf8");
        assert!(text.starts_with(&format!("--{BOUNDARY}\r\n")));
        assert!(text.contains("{\"name\":\"a.tar.gz\"}"));
        assert!(text.contains("Content-Type: application/gzip\r\n\r\nDATA\r\n"));
        assert!(text.ends_with(&format!("--{BOUNDARY}--\r\n")));
    }

    #[test]
    fn urls_drop_trailing_slash() {
        let client = DriveClient::new("t", "https://example.test/drive/v3/", "https://example.test/upload/");
        assert_eq!(
            client.file_url(&RemoteId::from("abc")),
            "https://example.test/drive/v3/files/abc"
        );
    }
}
