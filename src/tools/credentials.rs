//! Credential Loading
//!
//! Locates a credentials file (explicit path first, then fallbacks under the
//! home directory) and returns its text. Only a masked copy is ever logged.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, info};

use crate::error::{Result, ToolError};
use crate::models::{CredentialsResponse, ReadCredentialsRequest};

/// Replacement written over secret values in logs
pub const MASK_TOKEN: &str = "***MASKED***";

/// How much of the masked text is logged at debug level
const LOG_PREVIEW_CHARS: usize = 200;

fn secret_assignment() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r#"(?i)(["']?[\w.\-]*(?:key|secret|token|password)[\w.\-]*["']?[ \t]*[=:][ \t]*)(?:"[^"\n]*"|'[^'\n]*'|[^,;\n]+)"#,
        )
        .expect("secret pattern is a valid regex")
    })
}

// == Masking ==
/// Replaces the value of every secret-looking assignment with [`MASK_TOKEN`].
///
/// An assignment counts as secret when its key contains KEY, SECRET, TOKEN
/// or PASSWORD in any case. Every assignment on a line is masked; an unquoted
/// value runs to the next `,`, `;` or line end.
pub fn mask_secrets(text: &str) -> String {
    secret_assignment()
        .replace_all(text, format!("${{1}}{}", MASK_TOKEN).as_str())
        .into_owned()
}

// == Credential Reader ==
#[derive(Debug, Clone, Default)]
pub struct CredentialReader {
    home_dir: Option<PathBuf>,
}

impl CredentialReader {
    pub fn new(home_dir: Option<PathBuf>) -> Self {
        Self { home_dir }
    }

    /// Uses the current user's home directory for fallbacks.
    pub fn from_home() -> Self {
        Self::new(dirs::home_dir())
    }

    /// Fallback locations checked, in order, when the requested path is absent.
    pub fn fallbacks(&self, requested: &Path) -> Vec<PathBuf> {
        let Some(home) = &self.home_dir else {
            return Vec::new();
        };
        let mut candidates = vec![home.join(".aws").join("credentials")];
        if let Some(basename) = requested.file_name() {
            candidates.push(home.join(basename));
            candidates.push(home.join(".aws").join(basename));
        }
        candidates
    }

    /// Resolves the file to read, or `NotFound` if no candidate exists.
    pub async fn locate(&self, creds_path: &str) -> Result<PathBuf> {
        let requested = PathBuf::from(creds_path);
        if tokio::fs::try_exists(&requested).await.unwrap_or(false) {
            return Ok(requested);
        }

        for candidate in self.fallbacks(&requested) {
            if tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
                debug!(
                    "Credentials not at {}, using fallback {}",
                    creds_path,
                    candidate.display()
                );
                return Ok(candidate);
            }
        }

        Err(ToolError::NotFound(format!("credentials file {}", creds_path)))
    }

    /// `read_credentials`: the unmasked file text plus where it came from.
    pub async fn read(&self, req: ReadCredentialsRequest) -> Result<CredentialsResponse> {
        let path = self.locate(&req.creds_path).await?;
        let source = path.display().to_string();
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ToolError::from_io(e, &source))?;

        let masked = mask_secrets(&content);
        let preview: String = masked.chars().take(LOG_PREVIEW_CHARS).collect();
        info!("Read credentials from: {}", source);
        debug!("Masked content: {}...", preview);

        Ok(CredentialsResponse {
            credentials_text: content,
            source_path: source,
            provider_hint: req.provider,
        })
    }
}
