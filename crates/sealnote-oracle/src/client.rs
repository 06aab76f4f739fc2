//! Client side of the decryption oracle.

use std::collections::HashMap;
use std::time::Duration;

use sealnote_core::{now_millis, Keypair, ResourceRef};
use sealnote_escrow::{EncryptedChunkHandle, HandleId, NetworkPublicKey};

use crate::authorization::{DecryptionAuthorization, DEFAULT_VALIDITY_DAYS};
use crate::error::{OracleError, Result};
use crate::messages::{limits, OracleReply, OracleRequest, PROTOCOL_VERSION};
use crate::transport::OracleTransport;

/// Configuration for oracle requests.
#[derive(Debug, Clone)]
pub struct OracleConfig {
    /// How long to wait for one reply.
    pub timeout: Duration,
    /// Validity window of each signed authorization.
    pub authorization_validity_days: u32,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            authorization_validity_days: DEFAULT_VALIDITY_DAYS,
        }
    }
}

/// Sends batched decryption requests over a transport.
///
/// One call is one request with one authorization. Retries are left to the
/// caller.
pub struct OracleClient<T: OracleTransport> {
    transport: T,
    network: NetworkPublicKey,
    config: OracleConfig,
}

impl<T: OracleTransport> OracleClient<T> {
    /// Create a client for the oracle network whose key is `network`.
    pub fn new(transport: T, network: NetworkPublicKey, config: OracleConfig) -> Self {
        Self {
            transport,
            network,
            config,
        }
    }

    /// The key handles must be sealed to.
    pub fn network_key(&self) -> &NetworkPublicKey {
        &self.network
    }

    pub fn config(&self) -> &OracleConfig {
        &self.config
    }

    /// Ask the oracle for the cleartext values of `handles`.
    ///
    /// The result has one entry per input handle, in input order. An entry is
    /// `None` when the oracle left that handle out of its answer.
    pub async fn request_decryption(
        &self,
        handles: &[EncryptedChunkHandle],
        requester: &Keypair,
    ) -> Result<Vec<Option<u64>>> {
        if handles.is_empty() {
            return Ok(Vec::new());
        }
        if handles.len() > limits::MAX_HANDLES_PER_REQUEST {
            return Err(OracleError::TooManyHandles {
                count: handles.len(),
                max: limits::MAX_HANDLES_PER_REQUEST,
            });
        }

        let mut context_addresses: Vec<ResourceRef> =
            handles.iter().map(|h| h.context.resource).collect();
        context_addresses.sort();
        context_addresses.dedup();

        let authorization = DecryptionAuthorization::sign(
            requester,
            &context_addresses,
            now_millis(),
            self.config.authorization_validity_days,
        )?;

        let request = OracleRequest {
            protocol_version: PROTOCOL_VERSION,
            handles: handles.to_vec(),
            context_addresses,
            authorization,
        };

        tracing::debug!(
            requester = %requester.principal(),
            handles = handles.len(),
            "Sending oracle request"
        );

        let reply = self.exchange(request.to_bytes()?).await?;
        let values = match reply {
            OracleReply::Decrypted { values } => values,
            OracleReply::Denied { code, reason } => {
                tracing::warn!(?code, %reason, "Oracle denied request");
                return Err(OracleError::Rejected(format!("{:?}: {}", code, reason)));
            }
        };

        let ids: Vec<HandleId> = handles.iter().map(|h| h.id()).collect();
        let mut answered: HashMap<HandleId, u64> = HashMap::with_capacity(values.len());
        for entry in values {
            if !ids.contains(&entry.handle) {
                return Err(OracleError::Rejected(format!(
                    "reply names unrequested handle {}",
                    entry.handle
                )));
            }
            if answered.insert(entry.handle, entry.value).is_some() {
                return Err(OracleError::Rejected(format!(
                    "reply repeats handle {}",
                    entry.handle
                )));
            }
        }

        Ok(ids.iter().map(|id| answered.get(id).copied()).collect())
    }

    async fn exchange(&self, request: Vec<u8>) -> Result<OracleReply> {
        let bytes = tokio::time::timeout(self.config.timeout, self.transport.exchange(request))
            .await
            .map_err(|_| {
                OracleError::Unavailable(format!("no reply within {:?}", self.config.timeout))
            })??;

        OracleReply::from_bytes(&bytes)
            .map_err(|e| OracleError::Rejected(format!("malformed reply: {}", e)))
    }
}
