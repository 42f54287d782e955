// Concrete sync handlers and the registry wiring used by the daemon

pub mod github_repo_metadata;

use std::sync::Arc;

use crate::kernel::{HandlerRegistry, SyncType};

pub use github_repo_metadata::GithubRepoMetadataHandler;

/// Build the production handler registry.
pub fn build_registry() -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    registry.register(
        SyncType::GithubRepoMetadata,
        Arc::new(GithubRepoMetadataHandler),
    );
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn production_registry_handles_metadata_syncs() {
        let registry = build_registry();
        assert!(registry.is_registered(SyncType::GithubRepoMetadata));
    }
}
