use crate::{options::EngineOptions, repository::Repository, storage::DocumentStore, time::Clock};

/// Everything a service needs for one tenant: store access, an audit clock, and options.
///
/// The clock only stamps `createdAt`/`updatedAt` metadata. Recognition and posting
/// decisions use the explicit `as_of`/`up_to` passed to each operation.
#[derive(Clone, Copy)]
pub struct EngineContext<'a> {
    pub repo: Repository<'a>,
    pub clock: &'a dyn Clock,
    pub options: &'a EngineOptions,
}

impl<'a> EngineContext<'a> {
    pub fn new(
        store: &'a dyn DocumentStore,
        tenant_id: &'a str,
        clock: &'a dyn Clock,
        options: &'a EngineOptions,
    ) -> Self {
        Self {
            repo: Repository::new(store, tenant_id),
            clock,
            options,
        }
    }
}
