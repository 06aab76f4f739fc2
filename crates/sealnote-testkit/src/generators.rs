//! Proptest generators for property-based testing.

use proptest::prelude::*;

use sealnote_core::{KeyChunks, Keypair, PrincipalId, ResourceId, ResourceRef, SymmetricKey};

use crate::MAX_CATEGORY;

/// Generate a random keypair.
pub fn keypair() -> impl Strategy<Value = Keypair> {
    any::<[u8; 32]>().prop_map(|seed| Keypair::from_seed(&seed))
}

/// Generate a valid principal.
pub fn principal() -> impl Strategy<Value = PrincipalId> {
    keypair().prop_map(|kp| kp.principal())
}

/// Generate a content key.
pub fn symmetric_key() -> impl Strategy<Value = SymmetricKey> {
    any::<[u8; 32]>().prop_map(SymmetricKey::from_bytes)
}

/// Generate raw chunk values.
pub fn key_chunks() -> impl Strategy<Value = KeyChunks> {
    any::<[u64; 4]>().prop_map(KeyChunks::from_values)
}

/// Generate a resource index.
pub fn resource_id() -> impl Strategy<Value = ResourceId> {
    (0u64..10_000).prop_map(ResourceId)
}

/// Generate a resource address.
pub fn resource_ref() -> impl Strategy<Value = ResourceRef> {
    (principal(), resource_id()).prop_map(|(owner, id)| ResourceRef::new(owner, id))
}

/// Generate note bytes of at most `max_len`.
pub fn body(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

/// Generate a note title.
pub fn title() -> impl Strategy<Value = String> {
    "[A-Za-z0-9 ]{0,40}".prop_map(String::from)
}

/// Generate a valid category.
pub fn category() -> impl Strategy<Value = u8> {
    0..=MAX_CATEGORY
}

/// Parameters for one saved note.
#[derive(Debug, Clone)]
pub struct NoteParams {
    pub title: String,
    pub body: Vec<u8>,
    pub category: Option<u8>,
}

impl Arbitrary for NoteParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (title(), body(2048), prop::option::of(category()))
            .prop_map(|(title, body, category)| NoteParams {
                title,
                body,
                category,
            })
            .boxed()
    }
}
