pub mod cloudinary;
pub mod form;
pub mod lifecycle;
pub mod staging;
pub mod store;

pub use cloudinary::CloudinaryStore;
pub use form::{UploadForm, UploadSlot};
pub use lifecycle::MediaLifecycle;
pub use staging::{StagedFile, StagingArea, StagingError};
pub use store::{MediaKind, MediaStore, MediaStoreError, RemoteAsset, public_id_from_url};
