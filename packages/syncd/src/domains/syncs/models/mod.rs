pub mod github_repo_info;
pub mod repo_sync;
pub mod sync_log;

pub use github_repo_info::GithubRepoInfo;
pub use repo_sync::RepoSync;
pub use sync_log::{SyncLog, SyncLogType};
