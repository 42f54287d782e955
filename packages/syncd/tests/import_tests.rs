mod common;

use std::time::Duration;

use common::TestHarness;
use syncd_core::domains::repos::models::{ImportType, Repo, RepoImport};
use syncd_core::domains::syncs::models::RepoSync;
use test_context::test_context;

fn tags(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

// =============================================================================
// Tests: repo upsert + tag merge
// =============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn upsert_merges_tags_as_set_union(ctx: &TestHarness) {
    let url = "https://github.com/acme/widget";

    Repo::upsert(&ctx.db_pool, url, true, None, &tags(&["a", "b"]))
        .await
        .unwrap();
    Repo::upsert(&ctx.db_pool, url, true, None, &tags(&["b", "c"]))
        .await
        .unwrap();

    let repo = Repo::find_by_url(&ctx.db_pool, url)
        .await
        .unwrap()
        .expect("repo expected");
    let mut merged = repo.tag_list();
    merged.sort();
    assert_eq!(merged, vec!["a", "b", "c"]);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM repos WHERE repo = $1")
        .bind(url)
        .fetch_one(&ctx.db_pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn upsert_tag_merge_is_commutative(ctx: &TestHarness) {
    let url_ab = "https://github.com/acme/order-ab";
    let url_ba = "https://github.com/acme/order-ba";

    Repo::upsert(&ctx.db_pool, url_ab, true, None, &tags(&["a", "b"])).await.unwrap();
    Repo::upsert(&ctx.db_pool, url_ab, true, None, &tags(&["b", "c"])).await.unwrap();

    Repo::upsert(&ctx.db_pool, url_ba, true, None, &tags(&["b", "c"])).await.unwrap();
    Repo::upsert(&ctx.db_pool, url_ba, true, None, &tags(&["a", "b"])).await.unwrap();

    let mut first = Repo::find_by_url(&ctx.db_pool, url_ab)
        .await
        .unwrap()
        .unwrap()
        .tag_list();
    let mut second = Repo::find_by_url(&ctx.db_pool, url_ba)
        .await
        .unwrap()
        .unwrap()
        .tag_list();
    first.sort();
    second.sort();
    assert_eq!(first, second);
}

// =============================================================================
// Tests: import reconciliation
// =============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn reconciliation_inserts_new_and_prunes_removed(ctx: &TestHarness) {
    let import_id = RepoImport::create(
        &ctx.db_pool,
        ImportType::GithubOrg,
        serde_json::json!({"org": "acme"}),
        Duration::from_secs(3600),
    )
    .await
    .unwrap();

    let url_a = "https://github.com/acme/a";
    let url_b = "https://github.com/acme/b";
    let url_c = "https://github.com/acme/c";
    let url_d = "https://github.com/acme/d";

    // Previous pass discovered A, B, D.
    for url in [url_a, url_b, url_d] {
        Repo::upsert(&ctx.db_pool, url, true, Some(import_id), &[]).await.unwrap();
    }

    // This pass discovers A, B, C: upsert everything, then prune.
    for url in [url_a, url_b, url_c] {
        Repo::upsert(&ctx.db_pool, url, true, Some(import_id), &[]).await.unwrap();
    }
    let keep: Vec<String> = [url_a, url_b, url_c].iter().map(|s| s.to_string()).collect();
    let deleted = Repo::delete_removed(&ctx.db_pool, import_id, &keep).await.unwrap();
    assert_eq!(deleted, 1);

    let remaining: Vec<String> = Repo::list_for_import(&ctx.db_pool, import_id)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.repo)
        .collect();
    assert_eq!(remaining, vec![url_a, url_b, url_c]);

    let repo_c = Repo::find_by_url(&ctx.db_pool, url_c).await.unwrap().unwrap();
    assert_eq!(repo_c.repo_import_id, Some(import_id));
    assert!(Repo::find_by_url(&ctx.db_pool, url_d).await.unwrap().is_none());
}

// =============================================================================
// Tests: due-import claiming
// =============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn never_imported_source_is_claimed_once(ctx: &TestHarness) {
    let import_id = RepoImport::create(
        &ctx.db_pool,
        ImportType::GithubUser,
        serde_json::json!({"user": "octocat"}),
        Duration::from_secs(3600),
    )
    .await
    .unwrap();

    let claimed = RepoImport::claim_due(&ctx.db_pool).await.unwrap();
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].id, import_id);
    assert_eq!(claimed[0].kind, "GITHUB_USER");

    // The claim stamped last_import_started_at, so the import is no
    // longer due until the interval passes.
    assert!(RepoImport::claim_due(&ctx.db_pool).await.unwrap().is_empty());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn recently_imported_source_is_not_due(ctx: &TestHarness) {
    let import_id = RepoImport::create(
        &ctx.db_pool,
        ImportType::GithubUser,
        serde_json::json!({"user": "octocat"}),
        Duration::from_secs(3600),
    )
    .await
    .unwrap();

    sqlx::query("UPDATE repo_imports SET last_import = now() WHERE id = $1")
        .bind(import_id)
        .execute(&ctx.db_pool)
        .await
        .unwrap();

    assert!(RepoImport::claim_due(&ctx.db_pool).await.unwrap().is_empty());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn mark_updated_advances_last_import(ctx: &TestHarness) {
    let import_id = RepoImport::create(
        &ctx.db_pool,
        ImportType::GithubUser,
        serde_json::json!({"user": "octocat"}),
        Duration::from_secs(3600),
    )
    .await
    .unwrap();

    RepoImport::claim_due(&ctx.db_pool).await.unwrap();
    RepoImport::mark_updated(&ctx.db_pool, import_id).await.unwrap();

    let import = RepoImport::find_by_id(&ctx.db_pool, import_id).await.unwrap();
    assert!(import.last_import.is_some());
    assert!(import.last_import_started_at.is_some());
}

// =============================================================================
// Tests: default sync seeding
// =============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn default_syncs_seeded_once_per_repo(ctx: &TestHarness) {
    let import_id = RepoImport::create(
        &ctx.db_pool,
        ImportType::GithubOrg,
        serde_json::json!({"org": "acme"}),
        Duration::from_secs(3600),
    )
    .await
    .unwrap();

    for url in ["https://github.com/acme/a", "https://github.com/acme/b"] {
        Repo::upsert(&ctx.db_pool, url, true, Some(import_id), &[]).await.unwrap();
    }

    let sync_types = vec!["GITHUB_REPO_METADATA".to_string()];
    let created = RepoSync::insert_defaults(&ctx.db_pool, import_id, &sync_types)
        .await
        .unwrap();
    assert_eq!(created, 2);

    // Re-running the import must not duplicate definitions.
    let created_again = RepoSync::insert_defaults(&ctx.db_pool, import_id, &sync_types)
        .await
        .unwrap();
    assert_eq!(created_again, 0);

    let repo = Repo::find_by_url(&ctx.db_pool, "https://github.com/acme/a")
        .await
        .unwrap()
        .unwrap();
    let syncs = RepoSync::list_for_repo(&ctx.db_pool, repo.id).await.unwrap();
    assert_eq!(syncs.len(), 1);
    assert_eq!(syncs[0].sync_type, "GITHUB_REPO_METADATA");
    assert!(syncs[0].schedule_enabled);
}
