//! In-process decryption oracle.
//!
//! Holds the network secret and reads permissions from a [`CapabilityStore`].
//! A request is refused as a whole when its authorization does not hold;
//! otherwise each handle is answered or left absent on its own.

use std::collections::HashSet;
use std::sync::Arc;

use sealnote_core::now_millis;
use sealnote_escrow::{NetworkPublicKey, NetworkSecret};
use sealnote_store::CapabilityStore;

use crate::error::Result;
use crate::messages::{DecryptedValue, DenialCode, OracleReply, OracleRequest, PROTOCOL_VERSION};

/// An oracle that answers from a local store.
pub struct LocalOracle<S: CapabilityStore> {
    store: Arc<S>,
    secret: NetworkSecret,
}

impl<S: CapabilityStore> LocalOracle<S> {
    pub fn new(store: Arc<S>, secret: NetworkSecret) -> Self {
        Self { store, secret }
    }

    /// The key clients seal handles to.
    pub fn network_key(&self) -> NetworkPublicKey {
        self.secret.public_key()
    }

    /// Answer one decoded request.
    pub async fn handle(&self, request: &OracleRequest) -> OracleReply {
        self.handle_at(request, now_millis()).await
    }

    /// Decode a request, answer it, and encode the reply.
    pub async fn handle_bytes(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        let reply = match OracleRequest::from_bytes(bytes) {
            Ok(request) => self.handle(&request).await,
            Err(e) => OracleReply::denied(DenialCode::MalformedRequest, e.to_string()),
        };
        reply.to_bytes()
    }

    async fn handle_at(&self, request: &OracleRequest, now: i64) -> OracleReply {
        if request.protocol_version != PROTOCOL_VERSION {
            return OracleReply::denied(
                DenialCode::VersionMismatch,
                format!(
                    "expected version {}, got {}",
                    PROTOCOL_VERSION, request.protocol_version
                ),
            );
        }
        if let Err(reason) = request.validate_limits() {
            return OracleReply::denied(DenialCode::MalformedRequest, reason);
        }

        let authorization = &request.authorization;
        if let Err(e) = authorization.verify(now) {
            tracing::warn!(
                requester = %authorization.requester,
                error = %e,
                "Rejected oracle authorization"
            );
            return OracleReply::denied(e.code(), e.to_string());
        }

        let uncovered = request
            .context_addresses
            .iter()
            .chain(request.handles.iter().map(|h| &h.context.resource))
            .find(|resource| !authorization.covers(resource));
        if let Some(resource) = uncovered {
            return OracleReply::denied(
                DenialCode::ContextMismatch,
                format!("resource {} not authorized", resource),
            );
        }

        let requester = authorization.requester;
        let mut seen = HashSet::new();
        let mut values = Vec::with_capacity(request.handles.len());

        for handle in &request.handles {
            let id = handle.id();
            if !seen.insert(id) {
                continue;
            }
            if handle.context.party != requester {
                continue;
            }
            match self.store.is_handle_authorized(&id, &requester).await {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    tracing::warn!(error = %e, "ACL lookup failed");
                    return OracleReply::denied(DenialCode::InternalError, "acl unavailable");
                }
            }
            match handle.open(&self.secret) {
                Ok(value) => values.push(DecryptedValue { handle: id, value }),
                Err(e) => {
                    tracing::warn!(handle = %id, error = %e, "Failed to open authorized handle");
                }
            }
        }

        tracing::debug!(
            requester = %requester,
            requested = request.handles.len(),
            answered = values.len(),
            "Answered oracle request"
        );
        OracleReply::Decrypted { values }
    }
}
