use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use time::OffsetDateTime;
use uuid::Uuid;

/// Pipeline stage of a tracked application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplicationStatus {
    Saved,
    Applied,
    #[serde(rename = "Recruiter Screen")]
    RecruiterScreen,
    Interviewing,
    Offer,
    Rejected,
    Ghosted,
    Archived,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Saved => "Saved",
            ApplicationStatus::Applied => "Applied",
            ApplicationStatus::RecruiterScreen => "Recruiter Screen",
            ApplicationStatus::Interviewing => "Interviewing",
            ApplicationStatus::Offer => "Offer",
            ApplicationStatus::Rejected => "Rejected",
            ApplicationStatus::Ghosted => "Ghosted",
            ApplicationStatus::Archived => "Archived",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "Saved" => ApplicationStatus::Saved,
            "Applied" => ApplicationStatus::Applied,
            "Recruiter Screen" => ApplicationStatus::RecruiterScreen,
            "Interviewing" => ApplicationStatus::Interviewing,
            "Offer" => ApplicationStatus::Offer,
            "Rejected" => ApplicationStatus::Rejected,
            "Ghosted" => ApplicationStatus::Ghosted,
            "Archived" => ApplicationStatus::Archived,
            _ => return None,
        })
    }
}

/// A stored job-application record, always owned by a user. Rows predating
/// multi-user support carry a NULL owner until the startup migration claims
/// them; those rows are invisible to every query here.
#[derive(Debug, Clone, Serialize)]
pub struct JobApplication {
    pub id: i64,
    pub user_id: Uuid,
    pub company: String,
    pub title: String,
    pub location: Option<String>,
    pub salary_range: Option<String>,
    pub job_type: Option<String>,
    pub description: String,
    pub requirements: Option<Vec<String>>,
    pub url: Option<String>,
    pub job_id: Option<String>,
    pub status: ApplicationStatus,
    pub notes: Option<String>,
    pub fingerprint: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(FromRow)]
struct ApplicationRow {
    id: i64,
    user_id: Option<String>,
    company: String,
    title: String,
    location: Option<String>,
    salary_range: Option<String>,
    job_type: Option<String>,
    description: String,
    requirements: Option<String>,
    url: Option<String>,
    job_id: Option<String>,
    status: String,
    notes: Option<String>,
    fingerprint: Option<String>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

fn decode_err(msg: impl Into<String>) -> sqlx::Error {
    sqlx::Error::Decode(msg.into().into())
}

impl TryFrom<ApplicationRow> for JobApplication {
    type Error = sqlx::Error;

    fn try_from(row: ApplicationRow) -> Result<Self, Self::Error> {
        let user_id = row
            .user_id
            .ok_or_else(|| decode_err("unowned application row in a scoped query"))?;
        let user_id =
            Uuid::parse_str(&user_id).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        let status = ApplicationStatus::parse(&row.status)
            .ok_or_else(|| decode_err(format!("unknown application status: {}", row.status)))?;
        let requirements = row
            .requirements
            .as_deref()
            .map(serde_json::from_str::<Vec<String>>)
            .transpose()
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        Ok(JobApplication {
            id: row.id,
            user_id,
            company: row.company,
            title: row.title,
            location: row.location,
            salary_range: row.salary_range,
            job_type: row.job_type,
            description: row.description,
            requirements,
            url: row.url,
            job_id: row.job_id,
            status,
            notes: row.notes,
            fingerprint: row.fingerprint,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Fields supplied when a record is stored. The owning user is never part of
/// this struct; it comes from the resolved session.
#[derive(Debug, Clone, Deserialize)]
pub struct NewApplication {
    pub company: String,
    pub title: String,
    pub location: Option<String>,
    pub salary_range: Option<String>,
    pub job_type: Option<String>,
    pub description: String,
    pub requirements: Option<Vec<String>>,
    pub url: Option<String>,
    pub job_id: Option<String>,
    pub fingerprint: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ApplicationFilter {
    pub statuses: Option<Vec<ApplicationStatus>>,
    pub company: Option<String>,
    pub keyword: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApplicationPatch {
    pub status: Option<ApplicationStatus>,
    pub notes: Option<String>,
    pub company: Option<String>,
    pub title: Option<String>,
    pub location: Option<String>,
    pub salary_range: Option<String>,
    pub job_type: Option<String>,
    pub description: Option<String>,
}

impl ApplicationPatch {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.notes.is_none()
            && self.company.is_none()
            && self.title.is_none()
            && self.location.is_none()
            && self.salary_range.is_none()
            && self.job_type.is_none()
            && self.description.is_none()
    }
}

const SELECT_COLUMNS: &str = "id, user_id, company, title, location, salary_range, job_type, \
     description, requirements, url, job_id, status, notes, fingerprint, created_at, updated_at";

pub async fn create(
    db: &SqlitePool,
    user_id: Uuid,
    new: &NewApplication,
) -> Result<i64, sqlx::Error> {
    let requirements = new
        .requirements
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
    let now = OffsetDateTime::now_utc();
    let result = sqlx::query(
        r#"
        INSERT INTO applications (
            user_id, company, title, location, salary_range, job_type,
            description, requirements, url, job_id, status, fingerprint,
            created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(user_id.to_string())
    .bind(&new.company)
    .bind(&new.title)
    .bind(&new.location)
    .bind(&new.salary_range)
    .bind(&new.job_type)
    .bind(&new.description)
    .bind(requirements)
    .bind(&new.url)
    .bind(&new.job_id)
    .bind(ApplicationStatus::Saved.as_str())
    .bind(&new.fingerprint)
    .bind(now)
    .bind(now)
    .execute(db)
    .await?;
    Ok(result.last_insert_rowid())
}

pub async fn get(
    db: &SqlitePool,
    user_id: Uuid,
    id: i64,
) -> Result<Option<JobApplication>, sqlx::Error> {
    let row = sqlx::query_as::<_, ApplicationRow>(&format!(
        "SELECT {SELECT_COLUMNS} FROM applications WHERE id = ? AND user_id = ?"
    ))
    .bind(id)
    .bind(user_id.to_string())
    .fetch_optional(db)
    .await?;
    row.map(JobApplication::try_from).transpose()
}

pub async fn list(
    db: &SqlitePool,
    user_id: Uuid,
    filter: &ApplicationFilter,
) -> Result<Vec<JobApplication>, sqlx::Error> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
        "SELECT {SELECT_COLUMNS} FROM applications WHERE user_id = "
    ));
    qb.push_bind(user_id.to_string());

    if let Some(statuses) = filter.statuses.as_deref() {
        if !statuses.is_empty() {
            qb.push(" AND status IN (");
            {
                let mut sep = qb.separated(", ");
                for s in statuses {
                    sep.push_bind(s.as_str());
                }
            }
            qb.push(")");
        }
    }
    if let Some(company) = filter.company.as_deref() {
        qb.push(" AND company LIKE ");
        qb.push_bind(format!("%{company}%"));
    }
    if let Some(keyword) = filter.keyword.as_deref() {
        let pattern = format!("%{keyword}%");
        qb.push(" AND (title LIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" OR description LIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" OR company LIKE ");
        qb.push_bind(pattern);
        qb.push(")");
    }
    qb.push(" ORDER BY updated_at DESC");

    let rows = qb
        .build_query_as::<ApplicationRow>()
        .fetch_all(db)
        .await?;
    rows.into_iter().map(JobApplication::try_from).collect()
}

/// Apply a patch to a record the caller owns. Returns false when nothing
/// matched, which covers both "no such record" and "owned by someone else".
pub async fn update(
    db: &SqlitePool,
    user_id: Uuid,
    id: i64,
    patch: &ApplicationPatch,
) -> Result<bool, sqlx::Error> {
    if patch.is_empty() {
        return Ok(false);
    }

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE applications SET updated_at = ");
    qb.push_bind(OffsetDateTime::now_utc());
    if let Some(status) = patch.status {
        qb.push(", status = ");
        qb.push_bind(status.as_str());
    }
    if let Some(notes) = patch.notes.as_deref() {
        qb.push(", notes = ");
        qb.push_bind(notes.to_string());
    }
    if let Some(company) = patch.company.as_deref() {
        qb.push(", company = ");
        qb.push_bind(company.to_string());
    }
    if let Some(title) = patch.title.as_deref() {
        qb.push(", title = ");
        qb.push_bind(title.to_string());
    }
    if let Some(location) = patch.location.as_deref() {
        qb.push(", location = ");
        qb.push_bind(location.to_string());
    }
    if let Some(salary_range) = patch.salary_range.as_deref() {
        qb.push(", salary_range = ");
        qb.push_bind(salary_range.to_string());
    }
    if let Some(job_type) = patch.job_type.as_deref() {
        qb.push(", job_type = ");
        qb.push_bind(job_type.to_string());
    }
    if let Some(description) = patch.description.as_deref() {
        qb.push(", description = ");
        qb.push_bind(description.to_string());
    }
    qb.push(" WHERE id = ");
    qb.push_bind(id);
    qb.push(" AND user_id = ");
    qb.push_bind(user_id.to_string());

    let result = qb.build().execute(db).await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete(db: &SqlitePool, user_id: Uuid, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM applications WHERE id = ? AND user_id = ?")
        .bind(id)
        .bind(user_id.to_string())
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Per-status record counts for one user.
pub async fn status_counts(
    db: &SqlitePool,
    user_id: Uuid,
) -> Result<Vec<(String, i64)>, sqlx::Error> {
    sqlx::query_as::<_, (String, i64)>(
        "SELECT status, COUNT(*) FROM applications WHERE user_id = ? GROUP BY status",
    )
    .bind(user_id.to_string())
    .fetch_all(db)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::repo::User;
    use crate::state::test_pool;

    fn sample(company: &str, title: &str) -> NewApplication {
        NewApplication {
            company: company.into(),
            title: title.into(),
            location: Some("Remote".into()),
            salary_range: None,
            job_type: Some("Full-time".into()),
            description: "Ship backend services".into(),
            requirements: Some(vec!["Rust".into(), "SQL".into()]),
            url: None,
            job_id: None,
            fingerprint: None,
        }
    }

    #[tokio::test]
    async fn create_then_get_roundtrip() {
        let db = test_pool().await;
        let user = User::create(&db, "a@x.com", "h").await.expect("user");

        let id = create(&db, user.id, &sample("Acme", "Backend Engineer"))
            .await
            .expect("create");
        let app = get(&db, user.id, id).await.expect("get").expect("present");
        assert_eq!(app.company, "Acme");
        assert_eq!(app.status, ApplicationStatus::Saved);
        assert_eq!(app.user_id, user.id);
        assert_eq!(app.requirements.as_deref(), Some(&["Rust".to_string(), "SQL".to_string()][..]));
    }

    #[tokio::test]
    async fn records_are_isolated_per_user() {
        let db = test_pool().await;
        let u1 = User::create(&db, "a@x.com", "h").await.expect("u1");
        let u2 = User::create(&db, "b@x.com", "h").await.expect("u2");

        let id1 = create(&db, u1.id, &sample("Acme", "Backend")).await.expect("a1");
        let id2 = create(&db, u2.id, &sample("Globex", "Frontend")).await.expect("a2");

        assert!(get(&db, u1.id, id2).await.expect("get").is_none());
        assert!(get(&db, u2.id, id1).await.expect("get").is_none());

        let patch = ApplicationPatch {
            notes: Some("mine now".into()),
            ..Default::default()
        };
        assert!(!update(&db, u1.id, id2, &patch).await.expect("update"));
        assert!(!delete(&db, u1.id, id2).await.expect("delete"));

        // The foreign record is untouched.
        let app2 = get(&db, u2.id, id2).await.expect("get").expect("present");
        assert_eq!(app2.notes, None);

        let mine = list(&db, u1.id, &ApplicationFilter::default()).await.expect("list");
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].id, id1);
    }

    #[tokio::test]
    async fn update_patches_fields_and_bumps_updated_at() {
        let db = test_pool().await;
        let user = User::create(&db, "a@x.com", "h").await.expect("user");
        let id = create(&db, user.id, &sample("Acme", "Backend")).await.expect("create");

        let patch = ApplicationPatch {
            status: Some(ApplicationStatus::Applied),
            notes: Some("sent CV".into()),
            ..Default::default()
        };
        assert!(update(&db, user.id, id, &patch).await.expect("update"));

        let app = get(&db, user.id, id).await.expect("get").expect("present");
        assert_eq!(app.status, ApplicationStatus::Applied);
        assert_eq!(app.notes.as_deref(), Some("sent CV"));
        assert!(app.updated_at >= app.created_at);

        assert!(
            !update(&db, user.id, id, &ApplicationPatch::default())
                .await
                .expect("empty patch"),
            "an empty patch changes nothing"
        );
    }

    #[tokio::test]
    async fn list_filters_by_status_company_and_keyword() {
        let db = test_pool().await;
        let user = User::create(&db, "a@x.com", "h").await.expect("user");

        let a = create(&db, user.id, &sample("Acme", "Backend Engineer")).await.expect("a");
        let _b = create(&db, user.id, &sample("Globex", "Data Engineer")).await.expect("b");

        update(
            &db,
            user.id,
            a,
            &ApplicationPatch {
                status: Some(ApplicationStatus::Interviewing),
                ..Default::default()
            },
        )
        .await
        .expect("patch");

        let filter = ApplicationFilter {
            statuses: Some(vec![ApplicationStatus::Interviewing]),
            ..Default::default()
        };
        let hits = list(&db, user.id, &filter).await.expect("list");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, a);

        let filter = ApplicationFilter {
            company: Some("glob".into()),
            ..Default::default()
        };
        let hits = list(&db, user.id, &filter).await.expect("list");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].company, "Globex");

        let filter = ApplicationFilter {
            keyword: Some("Engineer".into()),
            ..Default::default()
        };
        assert_eq!(list(&db, user.id, &filter).await.expect("list").len(), 2);
    }

    #[tokio::test]
    async fn duplicate_fingerprint_is_a_unique_violation() {
        let db = test_pool().await;
        let user = User::create(&db, "a@x.com", "h").await.expect("user");

        let mut first = sample("Acme", "Backend");
        first.fingerprint = Some("fp-1".into());
        create(&db, user.id, &first).await.expect("first");

        let mut second = sample("Acme", "Backend");
        second.fingerprint = Some("fp-1".into());
        let err = create(&db, user.id, &second).await.expect_err("dup");
        assert!(err
            .as_database_error()
            .map(|d| d.is_unique_violation())
            .unwrap_or(false));
    }

    #[tokio::test]
    async fn status_counts_group_per_user() {
        let db = test_pool().await;
        let user = User::create(&db, "a@x.com", "h").await.expect("user");
        let other = User::create(&db, "b@x.com", "h").await.expect("other");

        create(&db, user.id, &sample("Acme", "Backend")).await.expect("1");
        create(&db, user.id, &sample("Globex", "Frontend")).await.expect("2");
        create(&db, other.id, &sample("Initech", "QA")).await.expect("3");

        let counts = status_counts(&db, user.id).await.expect("counts");
        assert_eq!(counts, vec![("Saved".to_string(), 2)]);
    }
}
