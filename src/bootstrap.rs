//! One-time startup migration for datasets predating multi-user support.
//!
//! If no user exists but unowned application records do, a bootstrap admin
//! account is created and every orphan record is assigned to it. User
//! creation and reassignment happen in one transaction, so a failure rolls
//! the whole step back and the next startup retries it from the same state.

use rand::distributions::Alphanumeric;
use rand::Rng;
use sqlx::SqlitePool;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::password::hash_password;

/// Well-known identity of the account that claims orphan records.
pub const BOOTSTRAP_EMAIL: &str = "admin@localhost";

const BOOTSTRAP_PASSWORD_LEN: usize = 24;

#[derive(Debug)]
pub struct BootstrapReport {
    pub user_id: Uuid,
    pub reclaimed: u64,
}

/// Run the migration. Returns `None` when there is nothing to do: either the
/// user table is already populated (any earlier run, or a fresh registration)
/// or no orphan records exist.
pub async fn claim_orphan_applications(db: &SqlitePool) -> anyhow::Result<Option<BootstrapReport>> {
    let mut tx = db.begin().await?;

    let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(&mut *tx)
        .await?;
    if users > 0 {
        return Ok(None);
    }

    let orphans: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM applications WHERE user_id IS NULL")
            .fetch_one(&mut *tx)
            .await?;
    if orphans == 0 {
        info!("fresh install, no orphan records to claim");
        return Ok(None);
    }

    let password: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(BOOTSTRAP_PASSWORD_LEN)
        .map(char::from)
        .collect();
    let password_hash = hash_password(&password)?;
    let user_id = Uuid::new_v4();

    sqlx::query(
        r#"
        INSERT INTO users (id, email, password_hash, created_at)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(user_id.to_string())
    .bind(BOOTSTRAP_EMAIL)
    .bind(&password_hash)
    .bind(OffsetDateTime::now_utc())
    .execute(&mut *tx)
    .await?;

    // Reassigning an already-owned record is excluded by the predicate, so
    // a retry after partial failure converges on the same outcome.
    let reclaimed = sqlx::query("UPDATE applications SET user_id = ? WHERE user_id IS NULL")
        .bind(user_id.to_string())
        .execute(&mut *tx)
        .await?
        .rows_affected();

    tx.commit().await?;

    // The plaintext appears exactly once, here; only the hash is stored.
    warn!(
        email = BOOTSTRAP_EMAIL,
        password = %password,
        reclaimed,
        "bootstrap admin created; record this password, it will not be shown again"
    );

    Ok(Some(BootstrapReport { user_id, reclaimed }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::verify_password;
    use crate::auth::repo::User;
    use crate::state::test_pool;

    async fn insert_orphan(db: &SqlitePool, company: &str) {
        let now = OffsetDateTime::now_utc();
        sqlx::query(
            r#"
            INSERT INTO applications (user_id, company, title, description, status, created_at, updated_at)
            VALUES (NULL, ?, 'Engineer', 'desc', 'Saved', ?, ?)
            "#,
        )
        .bind(company)
        .bind(now)
        .bind(now)
        .execute(db)
        .await
        .expect("insert orphan");
    }

    async fn orphan_count(db: &SqlitePool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM applications WHERE user_id IS NULL")
            .fetch_one(db)
            .await
            .expect("count")
    }

    #[tokio::test]
    async fn fresh_install_is_a_noop() {
        let db = test_pool().await;
        let report = claim_orphan_applications(&db).await.expect("run");
        assert!(report.is_none());
        assert_eq!(User::count(&db).await.expect("count"), 0);
    }

    #[tokio::test]
    async fn orphans_are_claimed_by_a_new_admin() {
        let db = test_pool().await;
        insert_orphan(&db, "Acme").await;
        insert_orphan(&db, "Globex").await;
        insert_orphan(&db, "Initech").await;

        let report = claim_orphan_applications(&db)
            .await
            .expect("run")
            .expect("claimed");
        assert_eq!(report.reclaimed, 3);
        assert_eq!(orphan_count(&db).await, 0);

        let admin = User::find_by_email(&db, BOOTSTRAP_EMAIL)
            .await
            .expect("find")
            .expect("admin exists");
        assert_eq!(admin.id, report.user_id);
        // Only a hash is persisted, never the generated plaintext.
        assert!(admin.password_hash.starts_with("$argon2"));
        assert!(!verify_password("", &admin.password_hash).unwrap_or(true));

        let owned: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM applications WHERE user_id = ?")
            .bind(report.user_id.to_string())
            .fetch_one(&db)
            .await
            .expect("count");
        assert_eq!(owned, 3);
    }

    #[tokio::test]
    async fn second_run_is_a_noop() {
        let db = test_pool().await;
        insert_orphan(&db, "Acme").await;

        assert!(claim_orphan_applications(&db).await.expect("first").is_some());
        assert!(claim_orphan_applications(&db).await.expect("second").is_none());
        assert_eq!(User::count(&db).await.expect("count"), 1, "exactly one bootstrap user");
    }

    #[tokio::test]
    async fn existing_user_disables_the_migration() {
        let db = test_pool().await;
        User::create(&db, "someone@x.com", "h").await.expect("user");
        insert_orphan(&db, "Acme").await;

        assert!(claim_orphan_applications(&db).await.expect("run").is_none());
        assert_eq!(orphan_count(&db).await, 1, "orphans untouched");
    }
}
