#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Classroom service records, the seam used to fetch them, and the
//! per-assignment settings file.
//!
//! The classroom service is reached through the GitHub CLI (`gh api`), so
//! authentication stays with `gh`.

use std::{
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
    constants::SETTINGS_FILE_NAME,
    datetime::iso,
    grade::scoring::ScoringParams,
    process::{StdinSource, run_collect},
    repo::{SubmissionRepo, git_dirs},
};

/// Whether each student or each team gets a repository.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentType {
    /// One repository per student.
    #[default]
    Individual,
    /// One repository per team.
    Group,
}

/// The classroom an assignment belongs to.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ClassroomRef {
    /// Classroom id.
    pub id:   u64,
    /// Classroom name.
    #[serde(default)]
    pub name: String,
}

/// An assignment as published by the classroom service.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Builder)]
#[builder(on(String, into))]
pub struct Assignment {
    /// Assignment id.
    pub id:        u64,
    /// Human title.
    pub title:     String,
    /// Short stable name prefixed to every repository name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug:      Option<String>,
    /// Submission deadline, if any.
    #[serde(default, with = "iso::option", skip_serializing_if = "Option::is_none")]
    pub deadline:  Option<DateTime<Utc>>,
    /// Individual or group.
    #[serde(rename = "type", default)]
    #[builder(default)]
    pub kind:      AssignmentType,
    /// Owning classroom.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classroom: Option<ClassroomRef>,
}

impl Assignment {
    /// `slug-`, the prefix of every repository created for this assignment.
    pub fn repo_prefix(&self) -> Option<String> {
        self.slug.as_ref().map(|slug| format!("{slug}-"))
    }
}

/// An assignment given either by id or as an already fetched record.
#[derive(Clone, Debug, PartialEq)]
pub enum AssignmentRef {
    /// Only the id is known.
    Id(u64),
    /// The full record is at hand.
    Resolved(Assignment),
}

impl AssignmentRef {
    /// The assignment id.
    pub fn id(&self) -> u64 {
        match self {
            AssignmentRef::Id(id) => *id,
            AssignmentRef::Resolved(assignment) => assignment.id,
        }
    }

    /// Returns the record, fetching it from `source` when only the id is
    /// known.
    pub async fn resolve(self, source: &impl AssignmentSource) -> Result<Assignment> {
        match self {
            AssignmentRef::Id(id) => source.assignment(id).await,
            AssignmentRef::Resolved(assignment) => Ok(assignment),
        }
    }
}

impl From<u64> for AssignmentRef {
    fn from(id: u64) -> Self {
        AssignmentRef::Id(id)
    }
}

impl From<Assignment> for AssignmentRef {
    fn from(assignment: Assignment) -> Self {
        AssignmentRef::Resolved(assignment)
    }
}

/// A student or team that accepted an assignment, whether or not anything
/// was committed since.
#[derive(Clone, Debug, PartialEq, Builder)]
#[builder(on(String, into))]
pub struct AcceptedSubmission {
    /// Browser URL of the repository; `git clone` accepts it.
    pub repository_url:  String,
    /// Repository name, e.g. `hw1-ada`.
    pub repository_name: String,
    /// Login of the first student on the repository.
    pub login:           Option<String>,
    /// Commits on the repository, including the starter commit.
    #[builder(default)]
    pub commit_count:    u64,
}

impl AcceptedSubmission {
    /// Directory name to clone into: the repository name, with `prefix`
    /// removed when given.
    pub fn clone_dir_name(&self, prefix: Option<&str>) -> String {
        prefix
            .and_then(|p| self.repository_name.strip_prefix(p))
            .filter(|rest| !rest.is_empty())
            .unwrap_or(self.repository_name.as_str())
            .to_string()
    }

    /// True once anything beyond the starter commit exists.
    pub fn is_submitted(&self) -> bool {
        self.commit_count > 0
    }
}

/// Where assignment records come from.
#[allow(async_fn_in_trait)]
pub trait AssignmentSource {
    /// Fetches one assignment.
    async fn assignment(&self, id: u64) -> Result<Assignment>;

    /// Lists everyone who accepted the assignment.
    async fn accepted(&self, assignment_id: u64) -> Result<Vec<AcceptedSubmission>>;
}

/// [`AssignmentSource`] backed by `gh api`.
#[derive(Clone, Debug, Default)]
pub struct GhCliSource;

/// Student entry of an accepted-assignment payload.
#[derive(Deserialize, Debug)]
struct ApiStudent {
    /// GitHub login.
    login: String,
}

/// Repository entry of an accepted-assignment payload.
#[derive(Deserialize, Debug)]
struct ApiRepository {
    /// Repository name.
    name:     String,
    /// Browser URL.
    html_url: String,
}

/// One accepted-assignment payload.
#[derive(Deserialize, Debug)]
struct ApiAccepted {
    /// Commits on the repository.
    #[serde(default)]
    commit_count: u64,
    /// Students on the repository.
    #[serde(default)]
    students:     Vec<ApiStudent>,
    /// The repository itself.
    repository:   ApiRepository,
}

impl From<ApiAccepted> for AcceptedSubmission {
    fn from(raw: ApiAccepted) -> Self {
        AcceptedSubmission {
            repository_url:  raw.repository.html_url,
            repository_name: raw.repository.name,
            login:           raw.students.into_iter().next().map(|s| s.login),
            commit_count:    raw.commit_count,
        }
    }
}

impl GhCliSource {
    /// Runs `gh api --paginate <endpoint>` and returns stdout.
    async fn api(&self, endpoint: &str) -> Result<String> {
        let args: Vec<OsString> = vec!["api".into(), endpoint.into(), "--paginate".into()];
        let output = run_collect("gh", &args, StdinSource::Null, None, None)
            .await
            .context("Could not run `gh`; is the GitHub CLI installed?")?;
        if !output.success() {
            bail!("`gh api {endpoint}` failed: {}", output.stderr_lossy());
        }
        Ok(output.stdout_lossy())
    }
}

/// Parses paginated `gh api` output, which concatenates one JSON array per
/// page.
fn parse_pages<T: DeserializeOwned>(raw: &str) -> Result<Vec<T>> {
    let mut items = Vec::new();
    for page in serde_json::Deserializer::from_str(raw).into_iter::<Vec<T>>() {
        items.extend(page.context("Unexpected response from the classroom service")?);
    }
    Ok(items)
}

impl AssignmentSource for GhCliSource {
    async fn assignment(&self, id: u64) -> Result<Assignment> {
        let raw = self.api(&format!("assignments/{id}")).await?;
        serde_json::from_str(&raw).with_context(|| format!("Could not read assignment {id}"))
    }

    async fn accepted(&self, assignment_id: u64) -> Result<Vec<AcceptedSubmission>> {
        let raw = self
            .api(&format!("assignments/{assignment_id}/accepted_assignments"))
            .await?;
        let pages: Vec<ApiAccepted> = parse_pages(&raw)?;
        Ok(pages.into_iter().map(AcceptedSubmission::from).collect())
    }
}

/// What [`clone_all`] did.
#[derive(Debug, Default, PartialEq)]
pub struct CloneSummary {
    /// Directories cloned (or that would be, in preview).
    pub cloned:        Vec<String>,
    /// Existing directories pulled (or that would be, in preview).
    pub pulled:        Vec<String>,
    /// Repositories without any commit.
    pub not_submitted: Vec<String>,
    /// Directories that failed to clone or pull.
    pub errors:        Vec<String>,
}

/// Clones every submitted repository of `assignment` into `root`. Existing
/// repositories are pulled when `update` is set. Repositories are named as
/// on the hosting service, without the assignment prefix unless
/// `preserve_prefix` is set.
pub async fn clone_all(
    source: &impl AssignmentSource,
    root: &Path,
    assignment: &Assignment,
    preserve_prefix: bool,
    update: bool,
    preview: bool,
) -> Result<CloneSummary> {
    let prefix = if preserve_prefix { None } else { assignment.repo_prefix() };
    let accepted = source.accepted(assignment.id).await?;
    let existing = git_dirs(root)?;
    let mut summary = CloneSummary::default();

    for submission in accepted {
        let dir_name = submission.clone_dir_name(prefix.as_deref());
        if !submission.is_submitted() {
            summary.not_submitted.push(dir_name);
            continue;
        }

        let target = root.join(&dir_name);
        if existing.contains(&target) {
            if !update {
                continue;
            }
            if preview {
                tracing::info!("Would pull {dir_name}");
            } else if let Err(e) = pull(&target).await {
                tracing::error!("Could not pull {dir_name}: {e:#}");
                summary.errors.push(dir_name);
                continue;
            }
            summary.pulled.push(dir_name);
            continue;
        }

        if preview {
            tracing::info!("Would clone {dir_name} from {}", submission.repository_url);
        } else if let Err(e) = SubmissionRepo::clone_from(&submission.repository_url, &target).await
        {
            tracing::error!("Could not clone {}: {e}", submission.repository_url);
            summary.errors.push(dir_name);
            continue;
        }
        summary.cloned.push(dir_name);
    }

    Ok(summary)
}

/// Pulls the repository in `dir`.
async fn pull(dir: &Path) -> Result<()> {
    SubmissionRepo::open(dir)?.pull().await?;
    Ok(())
}

/// `[Classroom]` table of the settings file.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct ClassroomSettings {
    /// Classroom id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classroom_id:  Option<u64>,
    /// Assignment id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignment_id: Option<u64>,
    /// Roster CSV, relative to the settings file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roster_file:   Option<PathBuf>,
}

/// `[Assignment]` table of the settings file: enough of the assignment to
/// grade without reaching the classroom service.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct AssignmentTable {
    /// Assignment id under its older location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignment_id: Option<u64>,
    /// Human title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title:         Option<String>,
    /// Repository name prefix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug:          Option<String>,
    /// Deadline as an ISO8601 string.
    #[serde(default, with = "iso::option", skip_serializing_if = "Option::is_none")]
    pub deadline:      Option<DateTime<Utc>>,
    /// Individual or group.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind:          Option<AssignmentType>,
}

/// `[Grading]` table of the settings file.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct GradingSettings {
    /// Points for a perfect submission.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_score:         Option<f64>,
    /// Weight of the test pass fraction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_weight:       Option<f64>,
    /// Weight of the style fraction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_weight:      Option<f64>,
    /// Feedback document name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback_filename: Option<String>,
}

/// Contents of `assignment.toml`.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct AssignmentSettings {
    /// Classroom and roster.
    #[serde(rename = "Classroom", default)]
    pub classroom:  ClassroomSettings,
    /// Offline assignment record.
    #[serde(rename = "Assignment", default)]
    pub assignment: AssignmentTable,
    /// Scoring defaults.
    #[serde(rename = "Grading", default)]
    pub grading:    GradingSettings,
    /// Directory the settings were read from.
    #[serde(skip)]
    pub base_dir:   PathBuf,
}

impl AssignmentSettings {
    /// Reads `assignment.toml` from `dir`, or from its parent when `dir` has
    /// none. `Ok(None)` when neither has one.
    pub fn load(dir: &Path) -> Result<Option<Self>> {
        let candidates = std::iter::once(dir).chain(dir.parent());
        for base in candidates {
            let path = base.join(SETTINGS_FILE_NAME);
            if !path.is_file() {
                continue;
            }
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("Could not read {}", path.display()))?;
            let mut settings: AssignmentSettings = toml::from_str(&raw)
                .with_context(|| format!("Could not parse {}", path.display()))?;
            settings.base_dir = base.to_path_buf();
            tracing::debug!("Using settings from {}", path.display());
            return Ok(Some(settings));
        }
        Ok(None)
    }

    /// Empty settings that [`Self::save`] writes into `dir`.
    pub fn new_in(dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: dir.into(),
            ..Self::default()
        }
    }

    /// Records `assignment` so later runs can grade it offline. The id moves
    /// to `[Classroom]`. Returns true when anything changed.
    pub fn remember(&mut self, assignment: &Assignment) -> bool {
        let before = (self.classroom.clone(), self.assignment.clone());
        if let Some(classroom) = &assignment.classroom {
            self.classroom.classroom_id = Some(classroom.id);
        }
        self.classroom.assignment_id = Some(assignment.id);
        self.assignment = AssignmentTable {
            assignment_id: None,
            title:         Some(assignment.title.clone()),
            slug:          assignment.slug.clone(),
            deadline:      assignment.deadline,
            kind:          Some(assignment.kind),
        };
        before != (self.classroom.clone(), self.assignment.clone())
    }

    /// Writes the settings to `assignment.toml` in [`Self::base_dir`].
    pub fn save(&self) -> Result<PathBuf> {
        let path = self.base_dir.join(SETTINGS_FILE_NAME);
        let raw = toml::to_string_pretty(self).context("Could not serialize settings")?;
        fs::write(&path, raw).with_context(|| format!("Could not write {}", path.display()))?;
        Ok(path)
    }

    /// Assignment id, preferring the `[Classroom]` key over the older
    /// `[Assignment]` one.
    pub fn assignment_id(&self) -> Option<u64> {
        self.classroom.assignment_id.or(self.assignment.assignment_id)
    }

    /// Roster path resolved against the settings directory.
    pub fn roster_path(&self) -> Option<PathBuf> {
        self.classroom
            .roster_file
            .as_ref()
            .map(|file| self.base_dir.join(file))
    }

    /// The assignment as recorded in the file, when an id and a title are
    /// both present.
    pub fn offline_assignment(&self) -> Option<Assignment> {
        let table = &self.assignment;
        Some(Assignment {
            id:        self.assignment_id()?,
            title:     table.title.clone()?,
            slug:      table.slug.clone(),
            deadline:  table.deadline,
            kind:      table.kind.unwrap_or_default(),
            classroom: None,
        })
    }

    /// Scoring parameters: explicit values win, then `[Grading]`, then the
    /// built-in defaults.
    pub fn scoring_params(
        &self,
        max_score: Option<f64>,
        test_weight: Option<f64>,
        style_weight: Option<f64>,
    ) -> ScoringParams {
        ScoringParams::builder()
            .maybe_max_score(max_score.or(self.grading.max_score))
            .maybe_test_weight(test_weight.or(self.grading.test_weight))
            .maybe_style_weight(style_weight.or(self.grading.style_weight))
            .build()
    }
}
