mod auth;
mod drive;
#[cfg(test)]
pub mod memory;
mod model;
mod resolver;
mod share;
mod store;
mod uploader;

pub use drive::DriveClient;
pub use model::{
    ParentReference, RemoteFolderRef, RemoteObject, RemoteObjectMeta, ShareList, ShareReport,
    FOLDER_MIME_TYPE,
};
pub use resolver::{path_segments, RemotePathResolver};
pub use share::apply_shares;
pub use store::{ChunkStatus, FolderPage, RemoteStore, UploadSession};
pub use uploader::{sniff_mime, UploadEngine, UploadOutcome};
