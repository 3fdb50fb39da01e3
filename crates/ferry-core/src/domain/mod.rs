//! Domain model (ids, credential, metadata, session, outcomes, errors).

pub mod chunk;
pub mod credential;
pub mod errors;
pub mod ids;
pub mod metadata;
pub mod outcome;
pub mod progress;
pub mod session;

pub use chunk::ChunkRange;
pub use credential::{Credential, TokenGrant};
pub use errors::{CredentialError, FailureReason, FileError, TransportError, UploadError};
pub use ids::{UploadId, UserId};
pub use metadata::{PrivacyStatus, VideoMetadata};
pub use outcome::{ChunkOutcome, RemoteResource, UploadResult};
pub use progress::ProgressEvent;
pub use session::{SessionLocator, SessionState, UploadSession};
