//! The connected principal and its in-memory key cache.
//!
//! A [`Session`] exists between `connect` and `disconnect`. It owns the
//! signing keypair and, per resource, either a `Decrypting` marker or the
//! unlocked key with its plaintext. Nothing here is ever persisted.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use zeroize::Zeroizing;

use sealnote_core::{Keypair, PrincipalId, ResourceRef, SymmetricKey};

static NEXT_EPOCH: AtomicU64 = AtomicU64::new(1);

/// Observable state of one resource in the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceState {
    /// No key material in memory.
    NoKey,
    /// A decrypt is in flight.
    Decrypting,
    /// Key and plaintext are cached.
    Unlocked,
}

pub(crate) struct Unlocked {
    pub(crate) key: SymmetricKey,
    pub(crate) plaintext: Zeroizing<Vec<u8>>,
}

enum Entry {
    Decrypting { ticket: u64 },
    Unlocked(Unlocked),
}

/// A connected principal.
pub struct Session {
    keypair: Keypair,
    epoch: u64,
    next_ticket: u64,
    entries: HashMap<ResourceRef, Entry>,
}

impl Session {
    pub fn new(keypair: Keypair) -> Self {
        Self {
            keypair,
            epoch: NEXT_EPOCH.fetch_add(1, Ordering::Relaxed),
            next_ticket: 0,
            entries: HashMap::new(),
        }
    }

    pub fn principal(&self) -> PrincipalId {
        self.keypair.principal()
    }

    pub(crate) fn keypair(&self) -> &Keypair {
        &self.keypair
    }

    pub fn state(&self, resource: &ResourceRef) -> ResourceState {
        match self.entries.get(resource) {
            None => ResourceState::NoKey,
            Some(Entry::Decrypting { .. }) => ResourceState::Decrypting,
            Some(Entry::Unlocked(_)) => ResourceState::Unlocked,
        }
    }

    pub(crate) fn unlocked(&self, resource: &ResourceRef) -> Option<&Unlocked> {
        match self.entries.get(resource) {
            Some(Entry::Unlocked(unlocked)) => Some(unlocked),
            _ => None,
        }
    }

    /// Forget the key and plaintext of one resource.
    pub fn lock(&mut self, resource: &ResourceRef) {
        self.entries.remove(resource);
    }

    /// Forget every cached key.
    pub fn lock_all(&mut self) {
        self.entries.clear();
    }

    fn begin(&mut self, resource: ResourceRef) -> u64 {
        self.next_ticket += 1;
        let ticket = self.next_ticket;
        self.entries.insert(resource, Entry::Decrypting { ticket });
        ticket
    }

    fn is_pending(&self, resource: &ResourceRef, ticket: u64) -> bool {
        matches!(
            self.entries.get(resource),
            Some(Entry::Decrypting { ticket: t }) if *t == ticket
        )
    }
}

/// Session slot shared by an engine.
pub(crate) type SessionSlot = RwLock<Option<Session>>;

pub(crate) fn read_slot<R>(slot: &SessionSlot, f: impl FnOnce(Option<&Session>) -> R) -> R {
    let guard = slot.read().unwrap_or_else(PoisonError::into_inner);
    f(guard.as_ref())
}

pub(crate) fn write_slot<R>(slot: &SessionSlot, f: impl FnOnce(&mut Option<Session>) -> R) -> R {
    let mut guard = slot.write().unwrap_or_else(PoisonError::into_inner);
    f(&mut guard)
}

/// Marks a resource `Decrypting` for as long as it lives.
///
/// Dropping the guard without calling [`finish`](Self::finish) puts the
/// resource back to `NoKey`. The marker is only touched if it still belongs
/// to this guard, so a lock, a newer decrypt, or a reconnect in the meantime
/// wins.
pub(crate) struct DecryptGuard<'a> {
    slot: &'a SessionSlot,
    epoch: u64,
    resource: ResourceRef,
    ticket: u64,
    armed: bool,
}

impl<'a> DecryptGuard<'a> {
    /// Mark `resource` as decrypting in the connected session.
    ///
    /// Returns `None` when no session is connected.
    pub(crate) fn begin(slot: &'a SessionSlot, resource: ResourceRef) -> Option<Self> {
        write_slot(slot, |session| {
            let session = session.as_mut()?;
            let ticket = session.begin(resource);
            Some(Self {
                slot,
                epoch: session.epoch,
                resource,
                ticket,
                armed: true,
            })
        })
    }

    /// Cache the unlocked key. Returns whether it was stored.
    pub(crate) fn finish(mut self, unlocked: Unlocked) -> bool {
        self.armed = false;
        write_slot(self.slot, |session| match session.as_mut() {
            Some(s) if s.epoch == self.epoch && s.is_pending(&self.resource, self.ticket) => {
                s.entries.insert(self.resource, Entry::Unlocked(unlocked));
                true
            }
            _ => false,
        })
    }
}

impl Drop for DecryptGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        write_slot(self.slot, |session| {
            if let Some(s) = session.as_mut() {
                if s.epoch == self.epoch && s.is_pending(&self.resource, self.ticket) {
                    s.entries.remove(&self.resource);
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sealnote_core::ResourceId;

    fn slot_with_session() -> (SessionSlot, ResourceRef) {
        let session = Session::new(Keypair::from_seed(&[1; 32]));
        let resource = ResourceRef::new(session.principal(), ResourceId(0));
        (RwLock::new(Some(session)), resource)
    }

    fn state(slot: &SessionSlot, resource: &ResourceRef) -> ResourceState {
        read_slot(slot, |s| s.map_or(ResourceState::NoKey, |s| s.state(resource)))
    }

    fn unlocked() -> Unlocked {
        Unlocked {
            key: SymmetricKey::generate(),
            plaintext: Zeroizing::new(b"text".to_vec()),
        }
    }

    #[test]
    fn test_dropped_guard_resets() {
        let (slot, resource) = slot_with_session();
        let guard = DecryptGuard::begin(&slot, resource).unwrap();
        assert_eq!(state(&slot, &resource), ResourceState::Decrypting);
        drop(guard);
        assert_eq!(state(&slot, &resource), ResourceState::NoKey);
    }

    #[test]
    fn test_finish_unlocks() {
        let (slot, resource) = slot_with_session();
        let guard = DecryptGuard::begin(&slot, resource).unwrap();
        assert!(guard.finish(unlocked()));
        assert_eq!(state(&slot, &resource), ResourceState::Unlocked);
    }

    #[test]
    fn test_lock_during_decrypt_wins() {
        let (slot, resource) = slot_with_session();
        let guard = DecryptGuard::begin(&slot, resource).unwrap();
        write_slot(&slot, |s| s.as_mut().unwrap().lock(&resource));
        assert!(!guard.finish(unlocked()));
        assert_eq!(state(&slot, &resource), ResourceState::NoKey);
    }

    #[test]
    fn test_reconnect_during_decrypt() {
        let (slot, resource) = slot_with_session();
        let guard = DecryptGuard::begin(&slot, resource).unwrap();
        write_slot(&slot, |s| *s = Some(Session::new(Keypair::from_seed(&[1; 32]))));
        let newer = DecryptGuard::begin(&slot, resource).unwrap();

        drop(guard);
        assert_eq!(state(&slot, &resource), ResourceState::Decrypting);
        drop(newer);
        assert_eq!(state(&slot, &resource), ResourceState::NoKey);
    }

    #[test]
    fn test_no_session() {
        let slot: SessionSlot = RwLock::new(None);
        let resource = ResourceRef::new(Keypair::from_seed(&[1; 32]).principal(), ResourceId(0));
        assert!(DecryptGuard::begin(&slot, resource).is_none());
    }
}
