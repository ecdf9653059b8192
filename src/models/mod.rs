//! Request and Response models for the tool surface
//!
//! This module defines the DTOs used for deserializing tool arguments and
//! serializing tool results, plus the uniform success/error envelope.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{
    ClearCacheRequest, ConfigTemplateRequest, ExploreDirectoryRequest, GetCachedDataRequest,
    PrepareFolderRequest, ReadCredentialsRequest, ReadLocalFileRequest, SaveDownloadRequest,
    ValidateDatasetRequest,
};
pub use responses::{
    CachedDataResponse, ClearCacheResponse, CredentialsResponse, Envelope, ExploreResponse,
    HealthResponse, PrepareFolderResponse, PrepareSummary, ReadFileResponse,
    SaveDownloadResponse, StatsResponse,
};
