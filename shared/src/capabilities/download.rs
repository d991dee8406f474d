use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub const DEFAULT_DOWNLOAD_FILE_NAME: &str = "detected-insect.png";
pub const MAX_FILE_NAME_LENGTH: usize = 255;

pub struct Download<E> {
    context: CapabilityContext<DownloadOperation, E>,
}

impl<Ev> Capability<Ev> for Download<Ev> {
    type Operation = DownloadOperation;
    type MappedSelf<MappedEv> = Download<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Download::new(self.context.map_event(f))
    }
}

impl<E> Download<E>
where
    E: Send + 'static,
{
    pub fn new(context: CapabilityContext<DownloadOperation, E>) -> Self {
        Self { context }
    }

    pub fn save<F>(&self, request: SaveRequest, callback: F)
    where
        F: FnOnce(DownloadResult) -> E + Send + 'static,
    {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            let result = ctx.request_from_shell(DownloadOperation::Save(request)).await;
            ctx.update_app(callback(result));
        });
    }
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SaveRequest {
    pub file_name: String,
    pub mime_type: String,
    #[serde(with = "serde_bytes")]
    pub data: Vec<u8>,
}

impl SaveRequest {
    pub fn new(
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        data: Vec<u8>,
    ) -> Result<Self, DownloadError> {
        let file_name = file_name.into();
        validate_file_name(&file_name)?;
        Ok(Self {
            file_name,
            mime_type: mime_type.into(),
            data,
        })
    }
}

impl fmt::Debug for SaveRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SaveRequest")
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("data_len", &self.data.len())
            .finish()
    }
}

/// The shell decides the directory; the name must not escape it.
pub fn validate_file_name(name: &str) -> Result<(), DownloadError> {
    let reason = if name.trim().is_empty() {
        Some("file name cannot be empty")
    } else if name.len() > MAX_FILE_NAME_LENGTH {
        Some("file name too long")
    } else if name.contains('/') || name.contains('\\') || name.contains('\0') {
        Some("file name cannot contain path separators")
    } else if name == "." || name == ".." {
        Some("file name cannot be a directory reference")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(DownloadError::InvalidFileName {
            name: name.chars().take(50).collect(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum DownloadOperation {
    Save(SaveRequest),
}

impl Operation for DownloadOperation {
    type Output = DownloadResult;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum DownloadOutput {
    Saved { file_name: String },
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum DownloadError {
    #[error("invalid file name {name:?}: {reason}")]
    InvalidFileName { name: String, reason: String },

    #[error("download failed: {reason}")]
    Failed { reason: String },
}

pub type DownloadResult = Result<DownloadOutput, DownloadError>;
