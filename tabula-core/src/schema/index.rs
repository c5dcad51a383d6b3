//! Field identity tokens and the index resolving them to descriptors

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use super::descriptor::AttributeDescriptor;

static NEXT_REGISTRY: AtomicU32 = AtomicU32::new(1);

/// Allocate the identity of a new registry; tokens from other registries never resolve
pub(crate) fn next_registry_id() -> u32 {
    NEXT_REGISTRY.fetch_add(1, Ordering::Relaxed)
}

/// Opaque handle naming one mapped column
///
/// Tokens are handed out by the registry (`EntityDescriptor::field`) and are
/// only meaningful for the registry that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldToken {
    registry: u32,
    slot: u32,
}

impl FieldToken {
    pub(crate) fn new(registry: u32, slot: u32) -> Self {
        Self { registry, slot }
    }

    /// A token that resolves in no registry
    pub const fn dangling() -> Self {
        Self {
            registry: 0,
            slot: u32::MAX,
        }
    }
}

/// Opaque handle naming one mapped entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityToken {
    pub(crate) registry: u32,
    pub(crate) entity: u32,
}

impl EntityToken {
    pub const fn dangling() -> Self {
        Self {
            registry: 0,
            entity: u32::MAX,
        }
    }
}

/// Read-only map from [`FieldToken`] to the column it names
///
/// Filled during the registry build and frozen afterwards; shared reads need
/// no synchronization.
#[derive(Debug)]
pub struct IdentityIndex {
    registry: u32,
    slots: Vec<Arc<AttributeDescriptor>>,
}

impl IdentityIndex {
    pub(crate) fn new(registry: u32) -> Self {
        Self {
            registry,
            slots: Vec::new(),
        }
    }

    /// Token the next registered attribute will receive
    pub(crate) fn next_token(&self) -> FieldToken {
        FieldToken::new(self.registry, self.slots.len() as u32)
    }

    pub(crate) fn register(&mut self, attribute: Arc<AttributeDescriptor>) {
        debug_assert_eq!(attribute.token(), self.next_token());
        self.slots.push(attribute);
    }

    pub fn resolve(&self, token: FieldToken) -> Option<&Arc<AttributeDescriptor>> {
        if token.registry != self.registry {
            return None;
        }
        self.slots.get(token.slot as usize)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
