//! Encrypted inputs and their proofs.
//!
//! Every submission of sealed values to the capability store carries one
//! [`InputProof`]. The proof is a signed binding over the ids of exactly the
//! handles in that submission, so one proof is amortized across the chunks
//! of one call and cannot be reused for another.

use serde::{Deserialize, Serialize};

use sealnote_core::{
    domain_hash, Blake3Hash, Ed25519Signature, KeyChunks, Keypair, PrincipalId, ResourceRef,
    CHUNK_COUNT,
};

use crate::crypto::NetworkPublicKey;
use crate::error::{EscrowCryptoError, Result};
use crate::handle::{EncryptedChunkHandle, HandleContext};

const INPUT_PROOF_DOMAIN: &str = "sealnote-escrow v1 input proof";

/// Signed binding over one submission's handles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputProof {
    /// Who produced the handles.
    pub submitter: PrincipalId,
    /// Domain hash of the submitter and every handle id, in order.
    pub binding: Blake3Hash,
    /// Submitter's signature over `binding`.
    pub signature: Ed25519Signature,
}

impl InputProof {
    /// Prove `handles` as `keypair`'s submission.
    pub fn create(keypair: &Keypair, handles: &[EncryptedChunkHandle]) -> Self {
        let submitter = keypair.principal();
        let binding = compute_binding(&submitter, handles);
        let signature = keypair.sign(binding.as_bytes());
        Self {
            submitter,
            binding,
            signature,
        }
    }

    /// Check that this proof covers exactly `handles`.
    pub fn verify(&self, handles: &[EncryptedChunkHandle]) -> Result<()> {
        let expected = compute_binding(&self.submitter, handles);
        if expected != self.binding {
            return Err(EscrowCryptoError::InvalidProof(
                "binding does not cover submitted handles".into(),
            ));
        }
        self.submitter
            .verify(self.binding.as_bytes(), &self.signature)
            .map_err(|_| EscrowCryptoError::InvalidProof("bad signature".into()))
    }
}

fn compute_binding(submitter: &PrincipalId, handles: &[EncryptedChunkHandle]) -> Blake3Hash {
    let ids: Vec<_> = handles.iter().map(EncryptedChunkHandle::id).collect();
    let count = (handles.len() as u64).to_be_bytes();

    let mut parts: Vec<&[u8]> = Vec::with_capacity(ids.len() + 2);
    parts.push(submitter.as_bytes());
    parts.push(&count);
    for id in &ids {
        parts.push(id.as_bytes());
    }
    domain_hash(INPUT_PROOF_DOMAIN, &parts)
}

/// A batch of sealed values plus the proof that covers them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedInput {
    pub handles: Vec<EncryptedChunkHandle>,
    pub proof: InputProof,
}

impl EncryptedInput {
    /// Seal one value per context and prove the batch.
    pub fn seal(
        keypair: &Keypair,
        values: &[u64],
        contexts: &[HandleContext],
        network: &NetworkPublicKey,
    ) -> Result<Self> {
        if values.len() != contexts.len() {
            return Err(EscrowCryptoError::Sealing(format!(
                "{} values for {} contexts",
                values.len(),
                contexts.len()
            )));
        }

        let handles = values
            .iter()
            .zip(contexts)
            .map(|(value, context)| EncryptedChunkHandle::seal(*value, *context, network))
            .collect::<Result<Vec<_>>>()?;
        let proof = InputProof::create(keypair, &handles);

        Ok(Self { handles, proof })
    }

    /// Seal the four chunks of a key for `party`.
    pub fn seal_key(
        keypair: &Keypair,
        resource: ResourceRef,
        party: PrincipalId,
        chunks: &KeyChunks,
        network: &NetworkPublicKey,
    ) -> Result<Self> {
        Self::seal(
            keypair,
            chunks.values(),
            &key_chunk_contexts(resource, party),
            network,
        )
    }

    /// Seal a category value for the resource owner.
    pub fn seal_category(
        keypair: &Keypair,
        resource: ResourceRef,
        value: u64,
        network: &NetworkPublicKey,
    ) -> Result<Self> {
        Self::seal(
            keypair,
            &[value],
            &[HandleContext::category(resource, resource.owner)],
            network,
        )
    }

    /// Verify the submission before it is persisted.
    ///
    /// The proof must be signed by `submitter` and cover the handles, and
    /// every handle must carry the context the store expects at that slot.
    pub fn verify(&self, submitter: &PrincipalId, expected: &[HandleContext]) -> Result<()> {
        if self.proof.submitter != *submitter {
            return Err(EscrowCryptoError::InvalidProof(format!(
                "submitted by {} but proven by {}",
                submitter, self.proof.submitter
            )));
        }
        if self.handles.len() != expected.len() {
            return Err(EscrowCryptoError::ContextMismatch(format!(
                "expected {} handles, got {}",
                expected.len(),
                self.handles.len()
            )));
        }
        for (handle, context) in self.handles.iter().zip(expected) {
            if handle.context != *context {
                return Err(EscrowCryptoError::ContextMismatch(format!(
                    "handle for {} position {} submitted at {} position {}",
                    handle.context.resource,
                    handle.context.position,
                    context.resource,
                    context.position
                )));
            }
        }
        self.proof.verify(&self.handles)
    }
}

/// The four contexts of a key's chunks, in position order.
pub fn key_chunk_contexts(resource: ResourceRef, party: PrincipalId) -> [HandleContext; CHUNK_COUNT] {
    std::array::from_fn(|i| HandleContext::key_chunk(resource, party, i as u8))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::NetworkSecret;
    use sealnote_core::{ResourceId, SymmetricKey};

    fn setup() -> (Keypair, ResourceRef, NetworkPublicKey) {
        let owner = Keypair::from_seed(&[1; 32]);
        let resource = ResourceRef::new(owner.principal(), ResourceId(0));
        (owner, resource, NetworkSecret::generate().public_key())
    }

    #[test]
    fn test_key_input_verifies() {
        let (owner, resource, network) = setup();
        let chunks = KeyChunks::split(&SymmetricKey::generate());
        let input =
            EncryptedInput::seal_key(&owner, resource, owner.principal(), &chunks, &network)
                .unwrap();

        assert_eq!(input.handles.len(), CHUNK_COUNT);
        input
            .verify(
                &owner.principal(),
                &key_chunk_contexts(resource, owner.principal()),
            )
            .unwrap();
    }

    #[test]
    fn test_proof_not_reusable_across_submissions() {
        let (owner, resource, network) = setup();
        let chunks = KeyChunks::split(&SymmetricKey::generate());
        let first =
            EncryptedInput::seal_key(&owner, resource, owner.principal(), &chunks, &network)
                .unwrap();
        let mut second =
            EncryptedInput::seal_key(&owner, resource, owner.principal(), &chunks, &network)
                .unwrap();

        second.proof = first.proof.clone();
        assert!(matches!(
            second.verify(
                &owner.principal(),
                &key_chunk_contexts(resource, owner.principal())
            ),
            Err(EscrowCryptoError::InvalidProof(_))
        ));
    }

    #[test]
    fn test_wrong_submitter_rejected() {
        let (owner, resource, network) = setup();
        let other = Keypair::from_seed(&[2; 32]);
        let input = EncryptedInput::seal_category(&owner, resource, 3, &network).unwrap();

        assert!(input
            .verify(
                &other.principal(),
                &[HandleContext::category(resource, resource.owner)]
            )
            .is_err());
    }

    #[test]
    fn test_context_mismatch_rejected() {
        let (owner, resource, network) = setup();
        let grantee = Keypair::from_seed(&[3; 32]).principal();
        let chunks = KeyChunks::split(&SymmetricKey::generate());
        let input =
            EncryptedInput::seal_key(&owner, resource, owner.principal(), &chunks, &network)
                .unwrap();

        assert!(matches!(
            input.verify(&owner.principal(), &key_chunk_contexts(resource, grantee)),
            Err(EscrowCryptoError::ContextMismatch(_))
        ));
    }

    #[test]
    fn test_contexts_are_positional() {
        let (owner, resource, _) = setup();
        let contexts = key_chunk_contexts(resource, owner.principal());
        for (i, context) in contexts.iter().enumerate() {
            assert_eq!(context.position as usize, i);
        }
    }
}
