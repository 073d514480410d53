//! External service clients

pub mod listenbrainz_client;
pub mod submission;

pub use listenbrainz_client::ListenBrainzClient;
pub use submission::SubmissionClient;
