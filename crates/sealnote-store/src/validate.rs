//! Submission checks shared by every backend.

use sealnote_core::{PrincipalId, ResourceRef};
use sealnote_escrow::{
    key_chunk_contexts, ChunkHandles, EncryptedChunkHandle, EncryptedInput, HandleContext,
};

use crate::error::{Result, StoreError};

/// Verify a key submission for `party` and take its handles.
pub(crate) fn key_input(
    submitter: &PrincipalId,
    resource: ResourceRef,
    party: &PrincipalId,
    input: &EncryptedInput,
) -> Result<ChunkHandles> {
    input.verify(submitter, &key_chunk_contexts(resource, *party))?;
    Ok(ChunkHandles::from_input(input.clone())?)
}

/// Verify a category submission and take its handle.
pub(crate) fn category_input(
    submitter: &PrincipalId,
    resource: ResourceRef,
    input: &EncryptedInput,
) -> Result<EncryptedChunkHandle> {
    input.verify(submitter, &[HandleContext::category(resource, resource.owner)])?;
    input
        .handles
        .first()
        .cloned()
        .ok_or_else(|| StoreError::InvalidProof("empty category submission".into()))
}

/// A grant names someone other than the owner.
pub(crate) fn grantee(owner: &PrincipalId, grantee: &PrincipalId) -> Result<()> {
    if owner == grantee {
        return Err(StoreError::InvalidData(
            "owner already holds the self-capability".into(),
        ));
    }
    Ok(())
}
