//! Single File Transfer
//!
//! `read_local_file` and `save_download_locally`.

use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine};
use tracing::{debug, info};

use crate::error::{Result, ToolError};
use crate::models::{ReadFileResponse, ReadLocalFileRequest, SaveDownloadRequest, SaveDownloadResponse};
use crate::tools::epoch_secs;

// == Text Encodings ==
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextEncoding {
    Utf8,
    Ascii,
    Latin1,
}

impl TextEncoding {
    fn parse(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "utf-8" | "utf8" => Ok(TextEncoding::Utf8),
            "ascii" | "us-ascii" => Ok(TextEncoding::Ascii),
            "latin-1" | "latin1" | "iso-8859-1" => Ok(TextEncoding::Latin1),
            other => Err(ToolError::InvalidRequest(format!(
                "unsupported encoding: {}",
                other
            ))),
        }
    }

    fn decode(self, bytes: &[u8]) -> Result<String> {
        match self {
            TextEncoding::Utf8 => String::from_utf8(bytes.to_vec())
                .map_err(|e| ToolError::DecodeError(e.to_string())),
            TextEncoding::Ascii if bytes.is_ascii() => {
                Ok(bytes.iter().map(|&b| b as char).collect())
            }
            TextEncoding::Ascii => Err(ToolError::DecodeError(
                "content is not plain ASCII".to_string(),
            )),
            TextEncoding::Latin1 => Ok(bytes.iter().map(|&b| b as char).collect()),
        }
    }
}

/// `read_local_file`: text when it decodes, base64 otherwise.
pub async fn read_local_file(req: ReadLocalFileRequest) -> Result<ReadFileResponse> {
    if let Some(msg) = req.validate() {
        return Err(ToolError::InvalidRequest(msg));
    }

    let path = PathBuf::from(&req.file_path);
    let meta = tokio::fs::metadata(&path)
        .await
        .map_err(|e| ToolError::from_io(e, &req.file_path))?;
    if !meta.is_file() {
        return Err(ToolError::NotAFile(req.file_path));
    }

    let encoding = if req.as_text {
        Some(TextEncoding::parse(&req.encoding)?)
    } else {
        None
    };

    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| ToolError::from_io(e, &req.file_path))?;
    let size = meta.len();
    let modified = meta.modified().ok().and_then(epoch_secs);

    if let Some(encoding) = encoding {
        match encoding.decode(&bytes) {
            Ok(content) => {
                return Ok(ReadFileResponse {
                    content,
                    encoding: req.encoding,
                    size,
                    modified,
                })
            }
            Err(err) => debug!("{}: {}, falling back to base64", req.file_path, err),
        }
    }

    Ok(ReadFileResponse {
        content: STANDARD.encode(&bytes),
        encoding: "base64".to_string(),
        size,
        modified,
    })
}

/// `save_download_locally`: decode base64 content and write it to disk.
pub async fn save_download_locally(req: SaveDownloadRequest) -> Result<SaveDownloadResponse> {
    if let Some(msg) = req.validate() {
        return Err(ToolError::InvalidRequest(msg));
    }

    let compact: String = req
        .content_b64
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    let content = STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| ToolError::DecodeError(format!("invalid base64 content: {}", e)))?;

    let path = Path::new(&req.target_path);
    if req.create_dirs {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ToolError::from_io(e, parent.display().to_string()))?;
        }
    }

    tokio::fs::write(path, &content)
        .await
        .map_err(|e| ToolError::from_io(e, &req.target_path))?;
    info!("Saved file to: {}", req.target_path);

    Ok(SaveDownloadResponse {
        saved_path: req.target_path,
        size: content.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn read_req(path: &Path, as_text: bool, encoding: &str) -> ReadLocalFileRequest {
        ReadLocalFileRequest {
            file_path: path.display().to_string(),
            as_text,
            encoding: encoding.to_string(),
        }
    }

    #[tokio::test]
    async fn test_read_text_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "héllo").unwrap();

        let resp = read_local_file(read_req(&path, true, "utf-8")).await.unwrap();
        assert_eq!(resp.content, "héllo");
        assert_eq!(resp.encoding, "utf-8");
        assert_eq!(resp.size, 6);
        assert!(resp.modified.is_some());
    }

    #[tokio::test]
    async fn test_invalid_utf8_falls_back_to_base64() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blob.bin");
        std::fs::write(&path, [0xff, 0xfe, 0x00]).unwrap();

        let resp = read_local_file(read_req(&path, true, "utf-8")).await.unwrap();
        assert_eq!(resp.encoding, "base64");
        assert_eq!(STANDARD.decode(resp.content).unwrap(), vec![0xff, 0xfe, 0x00]);
    }

    #[tokio::test]
    async fn test_latin1_decodes_any_byte() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("latin.txt");
        std::fs::write(&path, [0x63, 0x61, 0x66, 0xe9]).unwrap();

        let resp = read_local_file(read_req(&path, true, "latin-1")).await.unwrap();
        assert_eq!(resp.content, "café");
    }

    #[tokio::test]
    async fn test_read_binary_mode() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "abc").unwrap();

        let resp = read_local_file(read_req(&path, false, "utf-8")).await.unwrap();
        assert_eq!(resp.encoding, "base64");
        assert_eq!(resp.content, "YWJj");
    }

    #[tokio::test]
    async fn test_read_missing_and_directory() {
        let dir = TempDir::new().unwrap();
        let missing = read_local_file(read_req(&dir.path().join("x"), true, "utf-8")).await;
        assert!(matches!(missing, Err(ToolError::NotFound(_))));

        let not_file = read_local_file(read_req(dir.path(), true, "utf-8")).await;
        assert!(matches!(not_file, Err(ToolError::NotAFile(_))));
    }

    #[tokio::test]
    async fn test_unsupported_encoding() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "abc").unwrap();

        let result = read_local_file(read_req(&path, true, "shift-jis")).await;
        assert!(matches!(result, Err(ToolError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_save_creates_dirs_and_round_trips() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("out/model/weights.bin");
        let bytes: Vec<u8> = (0..=255).collect();

        let resp = save_download_locally(SaveDownloadRequest {
            content_b64: STANDARD.encode(&bytes),
            target_path: target.display().to_string(),
            create_dirs: true,
        })
        .await
        .unwrap();

        assert_eq!(resp.size, 256);
        assert_eq!(std::fs::read(&target).unwrap(), bytes);
    }

    #[tokio::test]
    async fn test_save_rejects_bad_base64() {
        let dir = TempDir::new().unwrap();
        let result = save_download_locally(SaveDownloadRequest {
            content_b64: "not base64!!".to_string(),
            target_path: dir.path().join("x").display().to_string(),
            create_dirs: true,
        })
        .await;
        assert!(matches!(result, Err(ToolError::DecodeError(_))));
    }

    #[tokio::test]
    async fn test_save_without_create_dirs_fails_on_missing_parent() {
        let dir = TempDir::new().unwrap();
        let result = save_download_locally(SaveDownloadRequest {
            content_b64: "YWJj".to_string(),
            target_path: dir.path().join("nope/x.bin").display().to_string(),
            create_dirs: false,
        })
        .await;
        assert!(matches!(result, Err(ToolError::NotFound(_))));
    }
}
