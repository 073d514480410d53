//! Submission capability used by the import engine

use crate::error::SubmitError;
use crate::models::Listen;
use async_trait::async_trait;

/// Something that can accept a batch of listens
///
/// `Ok(())` means every listen in the batch was accepted. Anything short of that is
/// an error; [`SubmitError::Transient`] marks failures worth retrying later.
#[async_trait]
pub trait SubmissionClient: Send + Sync {
    async fn submit_many(&self, listens: &[Listen]) -> Result<(), SubmitError>;
}
