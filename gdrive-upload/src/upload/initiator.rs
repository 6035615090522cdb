use gdrive_core::DriveError;
use tracing::debug;
use url::Url;

use super::session::TransferSession;
use super::transport::UploadTransport;

/// One session-creation request for a session that has no location yet.
pub(crate) async fn open_session<T: UploadTransport>(
    transport: &T,
    session: &TransferSession,
) -> Result<Url, DriveError> {
    debug!(
        file = %session.file_path().display(),
        size = session.file_size(),
        mime = session.mime_type(),
        "requesting resumable session"
    );
    transport
        .initiate(
            session.bearer_token(),
            session.metadata(),
            session.file_size(),
            session.mime_type(),
        )
        .await
}
