pub mod repo;
pub mod repo_import;

pub use repo::Repo;
pub use repo_import::{ClaimedImport, ImportSettings, ImportType, RepoImport};
