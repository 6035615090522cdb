mod client;
mod oauth;
mod upload;

pub use client::{
    ApiErrorClass, DriveClient, DriveError, DriveFile, FOLDER_MIME_TYPE, FileList, FileMetadata,
};
pub use oauth::{OAuthClient, OAuthError, OAuthToken};
pub use upload::{UploadClient, parse_range_high};
