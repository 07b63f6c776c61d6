//! Repository probe: walks recent commits for added localization files and
//! checks open pull requests for localization intent in their titles.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::{FirstScanPolicy, MonitorConfig};
use crate::cursor::{Cursor, CursorKey, CursorKind};
use crate::detect;
use crate::model::{SourceClass, Target};
use crate::net::{Fetcher, GithubClient};

use super::{CursorView, Observation, Probe, ProbeUnit, SoftReason, UnitOutcome, UnitStatus};

#[derive(Debug, Deserialize)]
struct ApiCommit {
    sha: String,
    #[serde(default)]
    html_url: Option<String>,
    commit: CommitMeta,
}

#[derive(Debug, Deserialize)]
struct CommitMeta {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    author: Option<CommitAuthor>,
}

#[derive(Debug, Deserialize)]
struct CommitAuthor {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CommitDetail {
    #[serde(default)]
    files: Vec<CommitFile>,
}

#[derive(Debug, Deserialize)]
struct CommitFile {
    filename: String,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiPull {
    number: u64,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    html_url: Option<String>,
    #[serde(default)]
    user: Option<PullUser>,
}

#[derive(Debug, Deserialize)]
struct PullUser {
    #[serde(default)]
    login: Option<String>,
}

pub struct RepoProbe {
    config: Arc<MonitorConfig>,
    fetcher: Arc<dyn Fetcher>,
    github: Arc<GithubClient>,
}

impl RepoProbe {
    pub fn new(
        config: Arc<MonitorConfig>,
        fetcher: Arc<dyn Fetcher>,
        github: Arc<GithubClient>,
    ) -> Self {
        Self {
            config,
            fetcher,
            github,
        }
    }

    fn commits_url(&self, scope: &str) -> String {
        format!(
            "{}/repos/{}/commits?per_page={}",
            self.config.repo_api_base, scope, self.config.commit_page_size
        )
    }

    fn commit_url(&self, scope: &str, sha: &str) -> String {
        format!("{}/repos/{}/commits/{}", self.config.repo_api_base, scope, sha)
    }

    fn pulls_url(&self, scope: &str) -> String {
        format!(
            "{}/repos/{}/pulls?state=open&per_page={}",
            self.config.repo_api_base, scope, self.config.pr_page_size
        )
    }

    /// Fetch the file list of one commit. Any failure here aborts the unit:
    /// a partially examined page must not advance the cursor.
    async fn fetch_commit_files(
        &self,
        scope: &str,
        sha: &str,
    ) -> Result<Vec<CommitFile>, SoftReason> {
        let request = self.github.request(self.commit_url(scope, sha));
        let response = self.fetcher.get(request).await.map_err(SoftReason::from)?;
        if response.is_rate_limited() {
            return Err(SoftReason::RateLimited);
        }
        if !response.is_success() {
            return Err(SoftReason::Http(response.status));
        }
        let detail: CommitDetail = serde_json::from_str(&response.body)
            .map_err(|e| SoftReason::Parse(e.to_string()))?;
        Ok(detail.files)
    }

    /// Inspect commits newer than the prior cursor, newest first. Work is
    /// bounded to the fetched page; commits at or past the prior sha are
    /// never re-examined.
    async fn check_commits(
        &self,
        unit: &ProbeUnit,
        prior: Option<&str>,
        commits: &[ApiCommit],
        outcome: &mut UnitOutcome,
    ) -> Result<(), SoftReason> {
        for commit in commits {
            if Some(commit.sha.as_str()) == prior {
                break;
            }

            let author = commit
                .commit
                .author
                .as_ref()
                .and_then(|a| a.name.as_deref())
                .unwrap_or("Unknown");
            if detect::is_bot_author(author, &self.config.bot_patterns) {
                continue;
            }

            let message = commit.commit.message.as_deref().unwrap_or("");
            let url = commit.html_url.clone().unwrap_or_default();

            let files = self.fetch_commit_files(&unit.scope, &commit.sha).await?;
            let mut added = Vec::new();
            let mut languages: Vec<String> = Vec::new();
            for file in &files {
                if file.status.as_deref() == Some("added")
                    && detect::is_localization_file(
                        &file.filename,
                        &self.config.localization_dirs,
                        &self.config.localization_exts,
                    )
                {
                    added.push(file.filename.clone());
                    if let Some(lang) =
                        detect::extract_language(&file.filename, &self.config.language_codes)
                    {
                        if !languages.iter().any(|l| l == lang) {
                            languages.push(lang.to_string());
                        }
                    }
                }
            }

            if !added.is_empty() {
                outcome.observations.push(Observation::NewLocalizationFiles {
                    repo: unit.scope.clone(),
                    sha: commit.sha.clone(),
                    author: author.to_string(),
                    message: message.to_string(),
                    files: added,
                    languages,
                    url,
                });
            } else {
                let keywords: Vec<String> = detect::contains_keywords(message, &self.config.keywords)
                    .into_iter()
                    .map(String::from)
                    .collect();
                if !keywords.is_empty() {
                    outcome.observations.push(Observation::CommitKeywords {
                        repo: unit.scope.clone(),
                        sha: commit.sha.clone(),
                        author: author.to_string(),
                        message: message.to_string(),
                        keywords,
                        url,
                    });
                }
            }
        }
        Ok(())
    }

    /// Open-PR sub-probe: title keyword matches are reported before merge.
    /// Carries no cursor; still-open PRs are re-observed each cycle and
    /// deduplicated within the cycle by the classifier. Failures here are
    /// logged and do not fail the unit, which may already hold commit work.
    async fn check_pulls(&self, unit: &ProbeUnit, outcome: &mut UnitOutcome) {
        let request = self.github.request(self.pulls_url(&unit.scope));
        let response = match self.fetcher.get(request).await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(unit = %unit, error = %e, "PR fetch failed");
                return;
            }
        };
        if response.is_rate_limited() {
            tracing::warn!(unit = %unit, "rate limited during PR check");
            return;
        }
        if !response.is_success() {
            if !response.is_not_found() {
                tracing::warn!(unit = %unit, status = response.status, "PR fetch rejected");
            }
            return;
        }
        let pulls: Vec<ApiPull> = match serde_json::from_str(&response.body) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(unit = %unit, error = %e, "PR response parse failed");
                return;
            }
        };

        for pull in pulls {
            let author = pull
                .user
                .as_ref()
                .and_then(|u| u.login.as_deref())
                .unwrap_or("Unknown");
            if detect::is_bot_author(author, &self.config.bot_patterns) {
                continue;
            }
            let title = pull.title.as_deref().unwrap_or("");
            let keywords: Vec<String> = detect::contains_keywords(title, &self.config.pr_keywords)
                .into_iter()
                .map(String::from)
                .collect();
            if keywords.is_empty() {
                continue;
            }
            outcome.observations.push(Observation::OpenPr {
                repo: unit.scope.clone(),
                number: pull.number,
                title: title.to_string(),
                author: author.to_string(),
                keywords,
                url: pull.html_url.clone().unwrap_or_default(),
            });
        }
    }
}

#[async_trait]
impl Probe for RepoProbe {
    fn source(&self) -> SourceClass {
        SourceClass::Repository
    }

    fn units(&self, target: &Target) -> Vec<ProbeUnit> {
        let Some(org) = &target.repo_org else {
            return Vec::new();
        };
        target
            .repos
            .iter()
            .map(|repo| ProbeUnit {
                target: target.name.clone(),
                source: SourceClass::Repository,
                scope: format!("{org}/{repo}"),
            })
            .collect()
    }

    async fn probe(&self, unit: &ProbeUnit, cursors: &CursorView<'_>) -> UnitOutcome {
        let key = CursorKey::new(&unit.target, CursorKind::LastCommit, &unit.scope);
        let prior = match cursors.get(&key) {
            Some(Cursor::Commit { sha }) => Some(sha),
            Some(_) | None => None,
        };

        let request = self.github.request(self.commits_url(&unit.scope));
        let response = match self.fetcher.get(request).await {
            Ok(r) => r,
            Err(e) => return UnitOutcome::soft(unit.clone(), e.into()),
        };
        if response.is_rate_limited() {
            tracing::warn!(unit = %unit, "rate limit hit, retrying next cycle");
            return UnitOutcome::soft(unit.clone(), SoftReason::RateLimited);
        }
        if response.is_not_found() {
            tracing::warn!(unit = %unit, "repository not found");
            return UnitOutcome::soft(unit.clone(), SoftReason::NotFound);
        }
        if !response.is_success() {
            return UnitOutcome::soft(unit.clone(), SoftReason::Http(response.status));
        }

        let commits: Vec<ApiCommit> = match serde_json::from_str(&response.body) {
            Ok(c) => c,
            Err(e) => return UnitOutcome::soft(unit.clone(), SoftReason::Parse(e.to_string())),
        };

        let mut outcome = UnitOutcome::ok(unit.clone());

        if let Some(newest) = commits.first().map(|c| c.sha.clone()) {
            let first_scan = prior.is_none();
            if !(first_scan && self.config.delta_first_scan == FirstScanPolicy::Baseline) {
                if let Err(reason) = self
                    .check_commits(unit, prior.as_deref(), &commits, &mut outcome)
                    .await
                {
                    return UnitOutcome::soft(unit.clone(), reason);
                }
            }
            outcome = outcome.advance(key, Cursor::Commit { sha: newest });
        }

        self.check_pulls(unit, &mut outcome).await;

        outcome
    }
}
