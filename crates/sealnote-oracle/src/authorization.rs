//! Signed, time-bounded decryption authorizations.
//!
//! The requester signs the list of resources it wants values for together
//! with a validity window. The oracle checks the signature and the window
//! before it reads the handle ACL.

use ciborium::value::Value;
use serde::{Deserialize, Serialize};

use sealnote_core::{canonical_encode, int_map, Ed25519Signature, Keypair, PrincipalId, ResourceRef};

use crate::error::AuthorizationError;

/// Default validity window.
pub const DEFAULT_VALIDITY_DAYS: u32 = 10;

/// Longest window an oracle accepts.
pub const MAX_VALIDITY_DAYS: u32 = 365;

const MILLIS_PER_DAY: i64 = 86_400_000;

const AUTHORIZATION_DOMAIN: &[u8] = b"sealnote-oracle v1 decryption authorization\x00";

/// A requester's signed permission slip for one batch of resources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptionAuthorization {
    pub requester: PrincipalId,
    /// Sorted, deduplicated.
    pub context_addresses: Vec<ResourceRef>,
    /// Window start, Unix milliseconds.
    pub start_timestamp: i64,
    pub duration_days: u32,
    pub signature: Ed25519Signature,
}

impl DecryptionAuthorization {
    /// Sign an authorization for `context_addresses` starting at `start_timestamp`.
    pub fn sign(
        keypair: &Keypair,
        context_addresses: &[ResourceRef],
        start_timestamp: i64,
        duration_days: u32,
    ) -> Result<Self, AuthorizationError> {
        check_duration(duration_days)?;
        if context_addresses.is_empty() {
            return Err(AuthorizationError::EmptyContext);
        }

        let mut context_addresses = context_addresses.to_vec();
        context_addresses.sort();
        context_addresses.dedup();

        let requester = keypair.principal();
        let message = signing_bytes(&requester, &context_addresses, start_timestamp, duration_days)?;
        let signature = keypair.sign(&message);

        Ok(Self {
            requester,
            context_addresses,
            start_timestamp,
            duration_days,
            signature,
        })
    }

    /// First instant (Unix ms) the authorization is no longer valid.
    pub fn expires_at(&self) -> i64 {
        self.start_timestamp
            .saturating_add(i64::from(self.duration_days).saturating_mul(MILLIS_PER_DAY))
    }

    /// Whether the authorization names `resource`.
    pub fn covers(&self, resource: &ResourceRef) -> bool {
        self.context_addresses.binary_search(resource).is_ok()
    }

    /// Check the signature and that `now` falls in the window.
    pub fn verify(&self, now: i64) -> Result<(), AuthorizationError> {
        check_duration(self.duration_days)?;
        if self.context_addresses.is_empty() {
            return Err(AuthorizationError::EmptyContext);
        }
        if !self.context_addresses.windows(2).all(|w| w[0] < w[1]) {
            return Err(AuthorizationError::Encoding(
                "context addresses not in canonical order".into(),
            ));
        }

        let message = signing_bytes(
            &self.requester,
            &self.context_addresses,
            self.start_timestamp,
            self.duration_days,
        )?;
        self.requester
            .verify(&message, &self.signature)
            .map_err(|_| AuthorizationError::BadSignature)?;

        if now < self.start_timestamp {
            return Err(AuthorizationError::NotYetValid {
                start: self.start_timestamp,
                now,
            });
        }
        let expires_at = self.expires_at();
        if now >= expires_at {
            return Err(AuthorizationError::Expired { expires_at, now });
        }
        Ok(())
    }
}

fn check_duration(days: u32) -> Result<(), AuthorizationError> {
    if days == 0 || days > MAX_VALIDITY_DAYS {
        return Err(AuthorizationError::InvalidDuration(days));
    }
    Ok(())
}

/// Domain prefix followed by the canonical CBOR of the signed fields.
fn signing_bytes(
    requester: &PrincipalId,
    context_addresses: &[ResourceRef],
    start_timestamp: i64,
    duration_days: u32,
) -> Result<Vec<u8>, AuthorizationError> {
    let addresses = context_addresses
        .iter()
        .map(|r| {
            Value::Array(vec![
                Value::Bytes(r.owner.as_bytes().to_vec()),
                Value::Integer(r.id.get().into()),
            ])
        })
        .collect();

    let body = int_map(vec![
        (0, Value::Bytes(requester.as_bytes().to_vec())),
        (1, Value::Array(addresses)),
        (2, Value::Integer(start_timestamp.into())),
        (3, Value::Integer(duration_days.into())),
    ]);
    let encoded =
        canonical_encode(&body).map_err(|e| AuthorizationError::Encoding(e.to_string()))?;

    let mut message = Vec::with_capacity(AUTHORIZATION_DOMAIN.len() + encoded.len());
    message.extend_from_slice(AUTHORIZATION_DOMAIN);
    message.extend_from_slice(&encoded);
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sealnote_core::ResourceId;

    const NOW: i64 = 1_700_000_000_000;

    fn fixture() -> (Keypair, Vec<ResourceRef>) {
        let keypair = Keypair::from_seed(&[5; 32]);
        let owner = Keypair::from_seed(&[6; 32]).principal();
        let resources = vec![
            ResourceRef::new(owner, ResourceId(2)),
            ResourceRef::new(owner, ResourceId(0)),
            ResourceRef::new(owner, ResourceId(2)),
        ];
        (keypair, resources)
    }

    #[test]
    fn test_sign_verify() {
        let (keypair, resources) = fixture();
        let auth = DecryptionAuthorization::sign(&keypair, &resources, NOW, DEFAULT_VALIDITY_DAYS)
            .unwrap();

        assert_eq!(auth.context_addresses.len(), 2);
        assert!(auth.covers(&resources[0]));
        auth.verify(NOW).unwrap();
        auth.verify(NOW + 9 * MILLIS_PER_DAY).unwrap();
    }

    #[test]
    fn test_window_edges() {
        let (keypair, resources) = fixture();
        let auth = DecryptionAuthorization::sign(&keypair, &resources, NOW, 10).unwrap();

        assert!(matches!(
            auth.verify(NOW - 1),
            Err(AuthorizationError::NotYetValid { .. })
        ));
        assert!(auth.verify(NOW + 10 * MILLIS_PER_DAY - 1).is_ok());
        assert!(matches!(
            auth.verify(NOW + 10 * MILLIS_PER_DAY),
            Err(AuthorizationError::Expired { .. })
        ));
    }

    #[test]
    fn test_tampered_fields_fail() {
        let (keypair, resources) = fixture();
        let auth = DecryptionAuthorization::sign(&keypair, &resources, NOW, 10).unwrap();

        let mut longer = auth.clone();
        longer.duration_days = 30;
        assert_eq!(longer.verify(NOW), Err(AuthorizationError::BadSignature));

        let mut narrowed = auth.clone();
        narrowed.context_addresses.truncate(1);
        assert_eq!(narrowed.verify(NOW), Err(AuthorizationError::BadSignature));

        let mut impostor = auth;
        impostor.requester = Keypair::from_seed(&[7; 32]).principal();
        assert_eq!(impostor.verify(NOW), Err(AuthorizationError::BadSignature));
    }

    #[test]
    fn test_duration_bounds() {
        let (keypair, resources) = fixture();
        for days in [0, MAX_VALIDITY_DAYS + 1] {
            assert_eq!(
                DecryptionAuthorization::sign(&keypair, &resources, NOW, days),
                Err(AuthorizationError::InvalidDuration(days))
            );
        }
        assert!(DecryptionAuthorization::sign(&keypair, &resources, NOW, MAX_VALIDITY_DAYS).is_ok());
    }

    #[test]
    fn test_empty_context_rejected() {
        let (keypair, _) = fixture();
        assert_eq!(
            DecryptionAuthorization::sign(&keypair, &[], NOW, 10),
            Err(AuthorizationError::EmptyContext)
        );
    }
}
