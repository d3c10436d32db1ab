use serde::Serialize;
use sqlx::{FromRow, SqlitePool};
use time::OffsetDateTime;
use uuid::Uuid;

/// A registered account. The persisted shape lives in the `users` table; this
/// module is the only place that reads or writes it.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: OffsetDateTime,
}

/// Raw row shape: SQLite stores the id as hyphenated UUID text.
#[derive(FromRow)]
struct UserRow {
    id: String,
    email: String,
    password_hash: String,
    created_at: OffsetDateTime,
}

impl TryFrom<UserRow> for User {
    type Error = sqlx::Error;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&row.id).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        Ok(User {
            id,
            email: row.email,
            password_hash: row.password_hash,
            created_at: row.created_at,
        })
    }
}

impl User {
    /// Look up a user by normalized email.
    pub async fn find_by_email(db: &SqlitePool, email: &str) -> Result<Option<User>, sqlx::Error> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, password_hash, created_at
            FROM users
            WHERE email = ?
            "#,
        )
        .bind(email)
        .fetch_optional(db)
        .await?;
        row.map(User::try_from).transpose()
    }

    pub async fn find_by_id(db: &SqlitePool, id: Uuid) -> Result<Option<User>, sqlx::Error> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, password_hash, created_at
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(db)
        .await?;
        row.map(User::try_from).transpose()
    }

    /// Insert a new user. The unique index on `email` (COLLATE NOCASE) makes
    /// check-and-insert atomic under concurrent registrations; the caller
    /// translates the resulting unique violation into `DuplicateEmail`.
    pub async fn create(
        db: &SqlitePool,
        email: &str,
        password_hash: &str,
    ) -> Result<User, sqlx::Error> {
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at: OffsetDateTime::now_utc(),
        };
        sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(user.id.to_string())
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .execute(db)
        .await?;
        Ok(user)
    }

    pub async fn count(db: &SqlitePool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(db)
            .await
    }
}
