use chrono::{DateTime, Datelike, NaiveDate, Utc};
use compact_str::CompactString;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// Push events shown in the activity feed
pub const RECENT_PUSH_LIMIT: usize = 5;
/// Languages shown in the breakdown
pub const TOP_LANGUAGE_LIMIT: usize = 5;
const FALLBACK_LANGUAGE_COLOR: &str = "#6e7681";

#[derive(Debug, Clone, Deserialize)]
pub struct EventDto {
    pub id: CompactString,
    #[serde(rename = "type")]
    pub kind: CompactString,
    pub repo: EventRepoDto,
    #[serde(default)]
    pub payload: EventPayloadDto,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventRepoDto {
    pub name: CompactString,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventPayloadDto {
    #[serde(default)]
    pub commits: Vec<CommitDto>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitDto {
    pub message: CompactString,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryDto {
    pub name: CompactString,
    #[serde(default)]
    pub fork: bool,
    pub language: Option<CompactString>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContributionsDto {
    #[serde(default)]
    pub contributions: Vec<ContributionDay>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ContributionDay {
    pub date: NaiveDate,
    pub count: u32,
    #[serde(default)]
    pub level: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushActivity {
    pub id: CompactString,
    pub repo: CompactString,
    pub message: CompactString,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LanguageShare {
    pub name: CompactString,
    pub percentage: u32,
    pub color: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContributionSummary {
    pub total: u32,
    pub this_year: u32,
    pub current_streak: u32,
    pub days: Vec<ContributionDay>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepositorySummary {
    /// Repositories that are not forks
    pub repo_count: usize,
    pub languages: Vec<LanguageShare>,
}

pub fn language_color(language: &str) -> &'static str {
    match language {
        "TypeScript" => "#3178c6",
        "JavaScript" => "#f1e05a",
        "Python" => "#3572A5",
        "Rust" => "#dea584",
        "C#" => "#178600",
        "Java" => "#b07219",
        "Go" => "#00ADD8",
        "Ruby" => "#701516",
        "PHP" => "#4F5D95",
        "CSS" => "#563d7c",
        "HTML" => "#e34c26",
        _ => FALLBACK_LANGUAGE_COLOR,
    }
}

/// Most recent push events, newest first as returned by the events API
pub fn recent_pushes(events: &[EventDto], limit: usize) -> Vec<PushActivity> {
    events
        .iter()
        .filter(|event| event.kind == "PushEvent")
        .take(limit)
        .map(|event| PushActivity {
            id: event.id.clone(),
            repo: event.repo.name.clone(),
            message: event
                .payload
                .commits
                .first()
                .map(|commit| commit.message.clone())
                .unwrap_or_else(|| "Pushed updates".into()),
            date: event.created_at,
        })
        .collect()
}

/// Share of repositories per primary language, largest first.
///
/// Ties keep first-seen order. Repositories without a language are ignored.
pub fn language_breakdown(repos: &[RepositoryDto], limit: usize) -> Vec<LanguageShare> {
    let mut counts: Vec<(&str, u32)> = Vec::new();
    for language in repos.iter().filter_map(|repo| repo.language.as_deref()) {
        match counts.iter_mut().find(|(name, _)| *name == language) {
            Some((_, count)) => *count += 1,
            None => counts.push((language, 1)),
        }
    }

    let total: u32 = counts.iter().map(|(_, count)| count).sum();
    if total == 0 {
        return Vec::new();
    }

    counts
        .into_iter()
        .map(|(name, count)| LanguageShare {
            name: name.into(),
            percentage: (f64::from(count) / f64::from(total) * 100.0).round() as u32,
            color: language_color(name),
        })
        .sorted_by(|a, b| b.percentage.cmp(&a.percentage))
        .take(limit)
        .collect()
}

/// Consecutive days with contributions ending today.
///
/// Future days are skipped; a day without contributions ends the streak.
pub fn current_streak(days: &[ContributionDay], today: NaiveDate) -> u32 {
    let mut streak = 0u32;
    for day in days.iter().sorted_by(|a, b| b.date.cmp(&a.date)) {
        let days_ago = (today - day.date).num_days();
        if days_ago == i64::from(streak) && day.count > 0 {
            streak += 1;
        } else if days_ago > i64::from(streak) {
            break;
        }
    }
    streak
}

pub fn summarize_contributions(days: Vec<ContributionDay>, today: NaiveDate) -> ContributionSummary {
    let this_year = days
        .iter()
        .filter(|day| day.date.year() == today.year())
        .map(|day| day.count)
        .sum();

    ContributionSummary {
        total: days.iter().map(|day| day.count).sum(),
        this_year,
        current_streak: current_streak(&days, today),
        days,
    }
}

pub fn summarize_repositories(repos: &[RepositoryDto]) -> RepositorySummary {
    let own: Vec<RepositoryDto> = repos.iter().filter(|repo| !repo.fork).cloned().collect();

    RepositorySummary {
        repo_count: own.len(),
        languages: language_breakdown(&own, TOP_LANGUAGE_LIMIT),
    }
}
