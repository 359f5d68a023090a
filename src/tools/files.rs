//! Client virtual filesystem access.

use base64::Engine;
use serde_json::{Map, Value as Json};

use crate::client::Client;
use crate::error::Result;
use crate::statement::{Select, Statement, call, quote};
use crate::tools::rows_output;

pub(crate) fn vfs_statement(client_id: &str, path: &str) -> Statement {
    Select::star(call(
        "vfs_files",
        [("client_id", quote(client_id)), ("path", quote(path))],
    ))
    .build()
}

/// List a directory from the server's cached VFS view.
pub async fn list_directory(client: &Client, client_id: &str, path: &str) -> Result<Json> {
    let rows = client.query(vfs_statement(client_id, path)).await?;
    rows_output("entries", rows)
}

/// Metadata for one VFS path.
pub async fn get_file_info(client: &Client, client_id: &str, path: &str) -> Result<Json> {
    let rows = client.query(vfs_statement(client_id, path)).await?;
    rows_output("info", rows)
}

/// Download a byte range of a file already collected into the VFS.
///
/// The reply echoes the request and carries the bytes as base64. `length`
/// in the reply is the number of bytes actually received.
pub async fn download_file(
    client: &Client,
    client_id: &str,
    path: &str,
    offset: u64,
    length: u64,
) -> Result<Json> {
    let download = client.download(client_id, path, offset, length).await?;
    let encoded = base64::engine::general_purpose::STANDARD.encode(download.data());

    let mut out = Map::new();
    out.insert("path".to_string(), Json::from(path));
    out.insert("client_id".to_string(), Json::from(client_id));
    out.insert("offset".to_string(), Json::from(offset));
    out.insert("length".to_string(), Json::from(download.len()));
    out.insert("data_base64".to_string(), Json::from(encoded));
    Ok(Json::Object(out))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vfs_statement_escapes_path() {
        assert_eq!(
            vfs_statement("C.1", "/auto/C:/Users/o'brien").text(),
            "SELECT * FROM vfs_files(client_id='C.1', path='/auto/C:/Users/o''brien')"
        );
    }
}
