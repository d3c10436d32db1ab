use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::repo::{ApplicationStatus, JobApplication};

/// Query parameters for listing: `?status=Applied&company=acme&q=rust`.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub status: Option<ApplicationStatus>,
    pub company: Option<String>,
    pub q: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ApplicationListItem {
    pub id: i64,
    pub company: String,
    pub title: String,
    pub location: Option<String>,
    pub status: ApplicationStatus,
    pub updated_at: OffsetDateTime,
}

impl From<JobApplication> for ApplicationListItem {
    fn from(app: JobApplication) -> Self {
        Self {
            id: app.id,
            company: app.company,
            title: app.title,
            location: app.location,
            status: app.status,
            updated_at: app.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreatedApplicationResponse {
    pub id: i64,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub total: i64,
    pub by_status: BTreeMap<String, i64>,
}
