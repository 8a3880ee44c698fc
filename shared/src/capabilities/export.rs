use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const PNG_MIME_TYPE: &str = "image/png";

/// Hands rendered files to the shell, which decides where they go (a
/// download, a share sheet, the photo library).
#[derive(Clone)]
pub struct Export<E> {
    context: CapabilityContext<ExportOperation, E>,
}

impl<Ev> Capability<Ev> for Export<Ev> {
    type Operation = ExportOperation;
    type MappedSelf<MappedEv> = Export<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Export::new(self.context.map_event(f))
    }
}

impl<E> Export<E>
where
    E: 'static,
{
    pub fn new(context: CapabilityContext<ExportOperation, E>) -> Self {
        Self { context }
    }

    pub fn save_image<F>(&self, file_name: String, data: Vec<u8>, callback: F)
    where
        F: FnOnce(SaveResult) -> E + Send + 'static,
    {
        let operation = ExportOperation::SaveImage {
            file_name,
            mime_type: PNG_MIME_TYPE.to_string(),
            data,
        };
        self.request(operation, callback);
    }

    fn request<F>(&self, operation: ExportOperation, callback: F)
    where
        F: FnOnce(SaveResult) -> E + Send + 'static,
    {
        let context = self.context.clone();
        self.context.spawn(async move {
            let output = context.request_from_shell(operation).await;
            context.update_app(callback(output));
        });
    }
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ExportOperation {
    SaveImage {
        file_name: String,
        mime_type: String,
        #[serde(with = "serde_bytes")]
        data: Vec<u8>,
    },
}

impl std::fmt::Debug for ExportOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SaveImage {
                file_name,
                mime_type,
                data,
            } => f
                .debug_struct("SaveImage")
                .field("file_name", file_name)
                .field("mime_type", mime_type)
                .field("data_len", &data.len())
                .finish(),
        }
    }
}

impl Operation for ExportOperation {
    type Output = SaveResult;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ExportOutput {
    Saved { location: Option<String> },
    Cancelled,
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum SaveError {
    #[error("permission denied")]
    PermissionDenied,

    #[error("storage full")]
    StorageFull,

    #[error("save failed: {reason}")]
    Failed { reason: String },
}

pub type SaveResult = Result<ExportOutput, SaveError>;
