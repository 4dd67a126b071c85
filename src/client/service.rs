//! GitHub activity statistics built on the fetch client

use std::{sync::Arc, time::Duration};

use chrono::{NaiveDate, Utc};
use compact_str::{CompactString, format_compact};
use serde::Serialize;
use tracing::{error, info, instrument};

use super::{
    api::PulseClient,
    config::FetchOptions,
    error::ApiError,
};
use crate::domain::{
    ContributionSummary, ContributionsDto, EventDto, PushActivity, RECENT_PUSH_LIMIT,
    RepositoryDto, RepositorySummary, recent_pushes, summarize_contributions,
    summarize_repositories,
};

pub const DEFAULT_CONTRIBUTIONS_URL: &str = "https://github-contributions-api.jogruber.de/v4";

const EVENTS_TTL: Duration = Duration::from_secs(5 * 60);
const CONTRIBUTIONS_TTL: Duration = Duration::from_secs(15 * 60);
const REPOSITORIES_TTL: Duration = Duration::from_secs(30 * 60);

/// Every section of the activity view; each one fails independently
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivitySnapshot {
    #[serde(serialize_with = "section")]
    pub pushes: Result<Vec<PushActivity>, ApiError>,
    #[serde(serialize_with = "section")]
    pub contributions: Result<ContributionSummary, ApiError>,
    #[serde(serialize_with = "section")]
    pub repositories: Result<RepositorySummary, ApiError>,
}

fn section<T: Serialize, S: serde::Serializer>(
    value: &Result<T, ApiError>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    #[derive(Serialize)]
    #[serde(rename_all = "snake_case")]
    enum Section<'a, T> {
        Ok(&'a T),
        Error { message: &'a str, is_rate_limit: bool },
    }

    match value {
        Ok(data) => Section::Ok(data).serialize(serializer),
        Err(err) => {
            let section: Section<'_, T> = Section::Error {
                message: &err.message,
                is_rate_limit: err.is_rate_limit,
            };
            section.serialize(serializer)
        },
    }
}

impl ActivitySnapshot {
    /// First section error, when no section loaded at all
    pub fn total_failure(&self) -> Option<&ApiError> {
        match (&self.pushes, &self.contributions, &self.repositories) {
            (Err(err), Err(_), Err(_)) => Some(err),
            _ => None,
        }
    }
}

/// Fetches and summarizes one user's public GitHub activity
#[derive(Debug, Clone)]
pub struct ActivityService {
    client: Arc<PulseClient>,
    user: CompactString,
    contributions_base_url: CompactString,
    options: FetchOptions,
}

impl ActivityService {
    pub fn new(client: Arc<PulseClient>, user: impl Into<CompactString>) -> Self {
        Self {
            client,
            user: user.into(),
            contributions_base_url: DEFAULT_CONTRIBUTIONS_URL.into(),
            options: FetchOptions::default(),
        }
    }

    pub fn with_contributions_url(mut self, url: impl Into<CompactString>) -> Self {
        self.contributions_base_url = url.into();
        self
    }

    /// Base options; each section overrides the cache TTL
    pub fn with_options(mut self, options: FetchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    fn section_options(&self, label: &'static str, ttl: Duration) -> FetchOptions {
        self.options
            .clone()
            .with_cache_ttl(ttl)
            .on_retry(move |attempt, err| {
                info!(section = label, attempt, error = %err, "Retrying activity request");
            })
    }

    #[instrument(skip(self), fields(user = %self.user))]
    pub async fn recent_pushes(&self) -> Result<Vec<PushActivity>, ApiError> {
        let endpoint = format_compact!("/users/{}/events/public", self.user);
        let events: Vec<EventDto> = self
            .client
            .fetch_github(&endpoint, &self.section_options("events", EVENTS_TTL))
            .await?;
        Ok(recent_pushes(&events, RECENT_PUSH_LIMIT))
    }

    #[instrument(skip(self), fields(user = %self.user))]
    pub async fn contributions(&self, today: NaiveDate) -> Result<ContributionSummary, ApiError> {
        let url = format_compact!(
            "{}/{}?y=last",
            self.contributions_base_url.trim_end_matches('/'),
            self.user
        );
        let calendar: ContributionsDto = self
            .client
            .fetch_with_retry(&url, &self.section_options("contributions", CONTRIBUTIONS_TTL))
            .await?;
        Ok(summarize_contributions(calendar.contributions, today))
    }

    #[instrument(skip(self), fields(user = %self.user))]
    pub async fn repositories(&self) -> Result<RepositorySummary, ApiError> {
        let endpoint = format_compact!("/users/{}/repos?per_page=100", self.user);
        let repos: Vec<RepositoryDto> = self
            .client
            .fetch_github(&endpoint, &self.section_options("repositories", REPOSITORIES_TTL))
            .await?;
        Ok(summarize_repositories(&repos))
    }

    /// Load every section concurrently
    pub async fn snapshot(&self) -> ActivitySnapshot {
        let today = Utc::now().date_naive();
        let (pushes, contributions, repositories) = tokio::join!(
            self.recent_pushes(),
            self.contributions(today),
            self.repositories()
        );

        for (label, failure) in [
            ("events", pushes.as_ref().err()),
            ("contributions", contributions.as_ref().err()),
            ("repositories", repositories.as_ref().err()),
        ] {
            if let Some(err) = failure {
                error!(section = label, error = %err.detail, "Failed to load activity section");
            }
        }

        ActivitySnapshot { pushes, contributions, repositories }
    }
}
