//! Access to the encrypted credential store.
//!
//! Credentials live in `service_credentials` as pgp-symmetric-encrypted
//! bytes; decryption happens inside Postgres so the plaintext never hits
//! an index or a log.

use anyhow::Result;
use sqlx::PgPool;

const GITHUB_PAT_TYPE: &str = "GITHUB_PAT";

/// Decrypt and return the most recently stored forge access token.
///
/// Returns `None` when no credential row exists or the stored value is
/// empty; callers decide whether that is fatal for their operation.
pub async fn fetch_github_token(pool: &PgPool, secret: &str) -> Result<Option<String>> {
    let token: Option<String> = sqlx::query_scalar(
        r#"
        SELECT pgp_sym_decrypt(credentials, $1)
        FROM service_credentials
        WHERE type = $2
        ORDER BY created_at DESC
        LIMIT 1
        "#,
    )
    .bind(secret)
    .bind(GITHUB_PAT_TYPE)
    .fetch_optional(pool)
    .await?;

    Ok(token.filter(|t| !t.is_empty()))
}

/// Encrypt and store a forge access token.
pub async fn store_github_token(pool: &PgPool, secret: &str, token: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO service_credentials (type, credentials)
        VALUES ($1, pgp_sym_encrypt($2, $3))
        "#,
    )
    .bind(GITHUB_PAT_TYPE)
    .bind(token)
    .bind(secret)
    .execute(pool)
    .await?;

    Ok(())
}
