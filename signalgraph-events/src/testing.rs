//! ABOUTME: Test-only helpers shared by this crate's unit tests
#![cfg(test)]

use signalgraph_core::backend::Backends;

pub fn in_memory_backends() -> Backends {
    signalgraph_storage::create_in_memory_backends()
}
