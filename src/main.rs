#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! # au
//!
//! Command line front end for grading classroom submissions.
//!
//! Typical run for a directory of cloned submissions:
//!
//! ```text
//! au python grade submissions/ --roster classroom_roster.csv
//! au python grades-csv submissions/
//! ```

use std::{
    io::{BufRead, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use au::{
    GradeError,
    classroom::{self, Assignment, AssignmentRef, AssignmentSettings, GhCliSource},
    config,
    constants::{DEFAULT_FEEDBACK_FILE_NAME, DEFAULT_GRADES_FILE_NAME},
    grade::{
        Evaluator, ScoringParams,
        export::export,
        feedback,
        scoring::{score, summary_table},
    },
    late::{late_submissions, late_table},
    repo::{self, SubmissionRepo, git_dirs},
    roster::{MatchMode, Roster, apply_renames, plan_renames, subdir_names},
};
use bpaf::*;
use colored::Colorize;
use dotenvy::dotenv;
use tracing::{Level, metadata::LevelFilter};
use tracing_subscriber::{fmt, prelude::*, util::SubscriberInitExt};

/// Scoring flags shared by the grading commands.
#[derive(Debug, Clone)]
struct ScoringArgs {
    /// Points for a perfect submission.
    max_score:    Option<f64>,
    /// Weight of the test pass fraction.
    test_weight:  Option<f64>,
    /// Weight of the style fraction.
    style_weight: Option<f64>,
}

/// Python grading subcommands.
#[derive(Debug, Clone)]
enum PythonCmd {
    /// Evaluate one submission
    Eval {
        /// Submission directory.
        dir:        PathBuf,
        /// Student display name.
        name:       Option<String>,
        /// Assignment id.
        assignment: Option<u64>,
        /// Skip the terminal summary.
        no_summary: bool,
        /// Scoring flags for the summary.
        scoring:    ScoringArgs,
    },
    /// Evaluate and render feedback for every submission under a root
    Grade {
        /// Directory holding the submissions.
        root:              PathBuf,
        /// Roster CSV.
        roster:            Option<PathBuf>,
        /// Assignment id.
        assignment:        Option<u64>,
        /// Reuse cached results instead of evaluating.
        skip_eval:         bool,
        /// Do not write feedback documents.
        skip_feedback:     bool,
        /// Feedback document name.
        feedback_filename: Option<String>,
        /// Replace existing feedback documents.
        overwrite:         bool,
        /// Scoring flags.
        scoring:           ScoringArgs,
    },
    /// Render feedback for one evaluated submission
    Feedback {
        /// Submission directory.
        dir:               PathBuf,
        /// Feedback document name.
        feedback_filename: Option<String>,
        /// Replace an existing feedback document.
        overwrite:         bool,
        /// Scoring flags.
        scoring:           ScoringArgs,
    },
    /// Export grades from rendered feedback
    GradesCsv {
        /// Directory holding the submissions.
        root:              PathBuf,
        /// Feedback document name.
        feedback_filename: Option<String>,
        /// Grade book name.
        grades_filename:   String,
        /// Overwrite without asking.
        yes:               bool,
    },
}

/// Classroom subcommands.
#[derive(Debug, Clone)]
enum ClassroomCmd {
    /// Rename submission directories after the students' names
    RenameRoster {
        /// Directory holding the submissions.
        root:          PathBuf,
        /// Roster CSV.
        roster:        Option<PathBuf>,
        /// Drop the prefix shared by all directories.
        remove_prefix: bool,
        /// Only show what would change.
        preview:       bool,
        /// Match identities case-insensitively.
        ignore_case:   bool,
    },
    /// Commit and push every dirty submission
    CommitAll {
        /// Directory holding the submissions.
        root:    PathBuf,
        /// Commit message.
        message: String,
        /// Only list dirty repositories.
        preview: bool,
    },
    /// Clone every submitted repository of an assignment
    CloneAll {
        /// Directory to clone into.
        root:            PathBuf,
        /// Assignment id.
        assignment:      Option<u64>,
        /// Keep the assignment prefix in directory names.
        preserve_prefix: bool,
        /// Pull repositories that are already cloned.
        update:          bool,
        /// Only show what would change.
        preview:         bool,
    },
    /// Report commits made after the deadline
    LateSubmissions {
        /// Directory holding the submissions.
        root:       PathBuf,
        /// Assignment id.
        assignment: Option<u64>,
        /// Roster CSV.
        roster:     Option<PathBuf>,
    },
}

/// Repository subcommands.
#[derive(Debug, Clone)]
enum RepoCmd {
    /// List submission repositories under a root
    Discover(PathBuf),
    /// Run one git command in every repository under a root
    Git {
        /// Directory holding the repositories.
        root: PathBuf,
        /// Arguments passed to git.
        args: Vec<String>,
    },
}

/// Top-level CLI commands.
#[derive(Debug, Clone)]
enum Cmd {
    /// Python grading
    Python(PythonCmd),
    /// Classroom housekeeping
    Classroom(ClassroomCmd),
    /// Repository discovery and bulk git
    Repo(RepoCmd),
}

/// Parsed command line.
#[derive(Debug, Clone)]
struct Opts {
    /// Log at debug level.
    debug: bool,
    /// Log warnings and errors only.
    quiet: bool,
    /// The command to run.
    cmd:   Cmd,
}

/// parses a submission directory
fn dir() -> impl Parser<PathBuf> {
    positional::<PathBuf>("DIR").help("Submission directory")
}

/// parses the directory holding all submissions
fn root() -> impl Parser<PathBuf> {
    positional::<PathBuf>("ROOT").help("Directory containing the submission repositories")
}

/// parses an assignment id
fn assignment() -> impl Parser<Option<u64>> {
    long("assignment-id")
        .short('a')
        .help("Classroom assignment id (defaults to assignment.toml)")
        .argument::<u64>("ID")
        .optional()
}

/// parses a roster file
fn roster() -> impl Parser<Option<PathBuf>> {
    long("roster")
        .short('r')
        .help("Classroom roster CSV (defaults to assignment.toml)")
        .argument::<PathBuf>("CSV")
        .optional()
}

/// parses the feedback file name
fn feedback_filename() -> impl Parser<Option<String>> {
    long("feedback-filename")
        .help("Name of the feedback document")
        .argument::<String>("FILE")
        .optional()
}

/// parses the overwrite flag
fn overwrite() -> impl Parser<bool> {
    long("overwrite-feedback")
        .short('o')
        .help("Replace existing feedback documents")
        .switch()
}

/// parses the preview flag
fn preview() -> impl Parser<bool> {
    long("preview")
        .help("Show what would change without changing anything")
        .switch()
}

/// parses the scoring flags
fn scoring() -> impl Parser<ScoringArgs> {
    let max_score = long("max-score")
        .help("Maximum score for the assignment [default: 10]")
        .argument::<f64>("N")
        .optional();
    let test_weight = long("test-weight")
        .help("Weight of the test results, 0 to 1 [default: 1]")
        .argument::<f64>("W")
        .optional();
    let style_weight = long("style-weight")
        .help("Weight of the style score, 0 to 1 [default: 0]")
        .argument::<f64>("W")
        .optional();
    construct!(ScoringArgs {
        max_score,
        test_weight,
        style_weight
    })
}

/// Python subcommand parser
fn python_cmd() -> impl Parser<Cmd> {
    let eval = {
        let dir = dir();
        let name = long("student-name")
            .short('s')
            .help("Student display name (defaults to the last committer)")
            .argument::<String>("NAME")
            .optional();
        let assignment = assignment();
        let no_summary = long("no-summary")
            .help("Do not print the summary table")
            .switch();
        let scoring = scoring();
        construct!(PythonCmd::Eval {
            dir,
            name,
            assignment,
            no_summary,
            scoring
        })
        .to_options()
        .command("eval")
        .help("Evaluate one submission and cache the results")
    };

    let grade = {
        let root = root();
        let roster = roster();
        let assignment = assignment();
        let skip_eval = long("skip-eval")
            .help("Reuse cached results instead of running the tools")
            .switch();
        let skip_feedback = long("skip-feedback")
            .help("Do not write feedback documents")
            .switch();
        let feedback_filename = feedback_filename();
        let overwrite = overwrite();
        let scoring = scoring();
        construct!(PythonCmd::Grade {
            root,
            roster,
            assignment,
            skip_eval,
            skip_feedback,
            feedback_filename,
            overwrite,
            scoring
        })
        .to_options()
        .command("grade")
        .help("Evaluate every submission and write feedback")
    };

    let feedback = {
        let dir = dir();
        let feedback_filename = feedback_filename();
        let overwrite = overwrite();
        let scoring = scoring();
        construct!(PythonCmd::Feedback {
            dir,
            feedback_filename,
            overwrite,
            scoring
        })
        .to_options()
        .command("feedback")
        .help("Write the feedback document for an evaluated submission")
    };

    let grades_csv = {
        let root = root();
        let feedback_filename = feedback_filename();
        let grades_filename = long("grades-filename")
            .help("Name of the grade book")
            .argument::<String>("FILE")
            .fallback(DEFAULT_GRADES_FILE_NAME.to_string());
        let yes = long("yes")
            .short('y')
            .help("Overwrite an existing grade book without asking")
            .switch();
        construct!(PythonCmd::GradesCsv {
            root,
            feedback_filename,
            grades_filename,
            yes
        })
        .to_options()
        .command("grades-csv")
        .help("Export grades from the feedback documents")
    };

    construct!([eval, grade, feedback, grades_csv])
        .to_options()
        .command("python")
        .help("Python assignment grading")
        .map(Cmd::Python)
}

/// Classroom subcommand parser
fn classroom_cmd() -> impl Parser<Cmd> {
    let rename_roster = {
        let root = root();
        let roster = roster();
        let remove_prefix = long("remove-prefix")
            .help("Drop the prefix shared by all directories")
            .switch();
        let preview = preview();
        let ignore_case = long("ignore-case")
            .short('i')
            .help("Match roster identities case-insensitively")
            .switch();
        construct!(ClassroomCmd::RenameRoster {
            root,
            roster,
            remove_prefix,
            preview,
            ignore_case
        })
        .to_options()
        .command("rename-roster")
        .help("Rename directories to include the students' names")
    };

    let commit_all = {
        let root = root();
        let message = long("message")
            .short('m')
            .help("Commit message")
            .argument::<String>("MSG")
            .fallback("Instructor feedback".to_string());
        let preview = preview();
        construct!(ClassroomCmd::CommitAll {
            root,
            message,
            preview
        })
        .to_options()
        .command("commit-all")
        .help("Commit and push every repository with local changes")
    };

    let clone_all = {
        let root = root();
        let assignment = assignment();
        let preserve_prefix = long("preserve-prefix")
            .help("Keep the assignment prefix in directory names")
            .switch();
        let update = long("update")
            .short('u')
            .help("Pull repositories that are already cloned")
            .switch();
        let preview = preview();
        construct!(ClassroomCmd::CloneAll {
            root,
            assignment,
            preserve_prefix,
            update,
            preview
        })
        .to_options()
        .command("clone-all")
        .help("Clone every submitted repository of an assignment")
    };

    let late_submissions = {
        let root = root();
        let assignment = assignment();
        let roster = roster();
        construct!(ClassroomCmd::LateSubmissions {
            root,
            assignment,
            roster
        })
        .to_options()
        .command("late-submissions")
        .help("List the commits made after the deadline")
    };

    construct!([rename_roster, commit_all, clone_all, late_submissions])
        .to_options()
        .command("classroom")
        .help("Classroom housekeeping")
        .map(Cmd::Classroom)
}

/// Repo subcommand parser
fn repo_cmd() -> impl Parser<Cmd> {
    let discover = {
        let root = root();
        construct!(RepoCmd::Discover(root))
            .to_options()
            .command("discover")
            .help("List the submission repositories under a directory")
    };

    let git = {
        let root = root();
        let args = any::<String, _, _>("ARGS", Some)
            .help("Arguments passed to git, e.g. `pull --rebase`")
            .some("a git command is required");
        construct!(RepoCmd::Git { root, args })
            .to_options()
            .command("git")
            .help("Run a git command in every repository under a directory")
    };

    construct!([discover, git])
        .to_options()
        .command("repo")
        .help("Submission repositories")
        .map(Cmd::Repo)
}

/// Parse the command line arguments and return `Opts`
fn options() -> Opts {
    let debug = long("debug")
        .short('d')
        .help("Enable detailed output")
        .switch();
    let quiet = long("quiet")
        .short('q')
        .help("Only print warnings and errors")
        .switch();
    let python = python_cmd();
    let classroom = classroom_cmd();
    let repo = repo_cmd();
    let cmd = construct!([python, classroom, repo]);

    construct!(Opts { debug, quiet, cmd })
        .to_options()
        .descr("Assignment utilities for grading classroom submissions")
        .run()
}

/// Prints a section banner.
fn banner(title: &str) {
    println!("{}", "=".repeat(80).bright_blue());
    println!("{}", title.bold());
    println!("{}", "-".repeat(80).bright_blue());
}

/// Reads `assignment.toml` from `dir` or its parent.
fn settings_for(dir: &Path) -> Result<Option<AssignmentSettings>> {
    AssignmentSettings::load(dir)
}

/// Finds the assignment to grade against: the id given on the command line
/// or in the settings, resolved from the settings file or the classroom
/// service. Grading proceeds without an assignment when none resolves.
async fn resolve_assignment(
    settings: Option<&AssignmentSettings>,
    id: Option<u64>,
) -> Option<Assignment> {
    let reference = match (id, settings.and_then(AssignmentSettings::offline_assignment)) {
        (Some(id), Some(assignment)) if assignment.id != id => AssignmentRef::Id(id),
        (_, Some(assignment)) => AssignmentRef::Resolved(assignment),
        (Some(id), None) => AssignmentRef::Id(id),
        (None, None) => AssignmentRef::Id(settings.and_then(AssignmentSettings::assignment_id)?),
    };
    let id = reference.id();
    match reference.resolve(&GhCliSource).await {
        Ok(assignment) => Some(assignment),
        Err(e) => {
            tracing::warn!("Could not fetch assignment {id}: {e:#}. Lateness will not be checked.");
            None
        }
    }
}

/// Records `assignment` in the settings file under `root`, creating the file
/// when there is none. Failing to save only warns.
fn remember_assignment(
    root: &Path,
    settings: Option<&AssignmentSettings>,
    assignment: &Assignment,
) {
    let mut settings = settings
        .cloned()
        .unwrap_or_else(|| AssignmentSettings::new_in(root));
    if !settings.remember(assignment) {
        return;
    }
    match settings.save() {
        Ok(path) => tracing::info!("Saved assignment {} to {}", assignment.id, path.display()),
        Err(e) => tracing::warn!("{e:#}"),
    }
}

/// Loads the roster from the flag or the settings file.
fn load_roster(
    flag: Option<PathBuf>,
    settings: Option<&AssignmentSettings>,
) -> Result<Option<Roster>> {
    match flag.or_else(|| settings.and_then(AssignmentSettings::roster_path)) {
        Some(path) => Ok(Some(Roster::from_csv(&path)?)),
        None => Ok(None),
    }
}

/// Scoring parameters from flags, then settings, then defaults.
fn scoring_params(args: &ScoringArgs, settings: Option<&AssignmentSettings>) -> ScoringParams {
    match settings {
        Some(s) => s.scoring_params(args.max_score, args.test_weight, args.style_weight),
        None => ScoringParams::builder()
            .maybe_max_score(args.max_score)
            .maybe_test_weight(args.test_weight)
            .maybe_style_weight(args.style_weight)
            .build(),
    }
}

/// Feedback file name from the flag, then settings, then the default.
fn feedback_name(flag: Option<String>, settings: Option<&AssignmentSettings>) -> String {
    flag.or_else(|| settings.and_then(|s| s.grading.feedback_filename.clone()))
        .unwrap_or_else(|| DEFAULT_FEEDBACK_FILE_NAME.to_string())
}

/// Asks whether `path` may be overwritten. Empty input means yes.
fn confirm_overwrite(path: &Path) -> Result<bool> {
    let stdin = std::io::stdin();
    loop {
        print!("Overwrite {} (Y/n)? ", path.display());
        std::io::stdout().flush()?;
        let mut answer = String::new();
        if stdin.lock().read_line(&mut answer)? == 0 {
            return Ok(false);
        }
        match answer.trim().to_lowercase().as_str() {
            "" | "y" | "yes" => return Ok(true),
            "n" | "no" => return Ok(false),
            _ => continue,
        }
    }
}

/// Final path components of `dirs`.
fn dir_names(dirs: &[PathBuf]) -> Vec<String> {
    dirs.iter()
        .filter_map(|d| d.file_name().map(|n| n.to_string_lossy().into_owned()))
        .collect()
}

/// Prints the commits made after the deadline in every repository under
/// `root`.
async fn report_late(root: &Path, assignment: Option<u64>, roster: Option<PathBuf>) -> Result<()> {
    let settings = settings_for(root)?;
    let settings = settings.as_ref();
    let Some(assignment) = resolve_assignment(settings, assignment).await else {
        bail!("No assignment given and none configured in assignment.toml");
    };
    remember_assignment(root, settings, &assignment);
    let Some(deadline) = assignment.deadline else {
        bail!("{} has no deadline", assignment.title);
    };

    let roster = load_roster(roster, settings)?;
    let names = dir_names(&git_dirs(root)?);
    let labeling = roster
        .as_ref()
        .map(|r| r.label_dirs(&names, MatchMode::Lookup, false));
    let own_email = repo::user_email().await.unwrap_or_else(|e| {
        tracing::warn!("Could not read your git email, instructor commits count as late: {e}");
        None
    });

    let late = late_submissions(
        root,
        &deadline,
        labeling.as_ref(),
        &config::bot_marker(),
        own_email.as_deref(),
    )
    .await?;
    banner(&format!("Late submissions for {}", assignment.title));
    if late.is_empty() {
        println!("No late submissions");
    } else {
        println!("{}", late_table(&late, &deadline));
    }
    Ok(())
}

/// Runs `git args` in every repository under `root` and prints what each
/// one answered.
async fn git_everywhere(root: &Path, args: &[String]) -> Result<()> {
    let dirs = git_dirs(root).with_context(|| format!("Could not list {}", root.display()))?;
    println!("Processing {} repositories", dirs.len());
    let command = format!("> git {}", args.join(" "));
    for dir in dirs {
        banner(&format!("Processing {}", dir.display()));
        println!("{}", command.dimmed());
        match SubmissionRepo::open(&dir)?.run_git(args).await {
            Ok(output) => {
                print!("{}", output.stdout_lossy());
                let stderr = output.stderr_lossy();
                if output.success() {
                    eprint!("{stderr}");
                } else {
                    eprint!("{}", stderr.red());
                }
            }
            Err(e) => tracing::error!("{}: {e}", dir.display()),
        }
    }
    Ok(())
}

/// Evaluates every submission under `root`, then renders its feedback.
/// A failing submission is logged and the loop moves on.
#[allow(clippy::too_many_arguments)]
async fn grade_all(
    root: &Path,
    roster: Option<PathBuf>,
    assignment: Option<u64>,
    skip_eval: bool,
    skip_feedback: bool,
    feedback_filename: Option<String>,
    overwrite: bool,
    scoring: &ScoringArgs,
) -> Result<()> {
    let settings = settings_for(root)?;
    let settings = settings.as_ref();
    let roster = load_roster(roster, settings)?;
    let params = scoring_params(scoring, settings);
    let feedback_filename = feedback_name(feedback_filename, settings);
    let assignment = if skip_eval { None } else { resolve_assignment(settings, assignment).await };
    if let Some(assignment) = &assignment {
        remember_assignment(root, settings, assignment);
    }

    let dirs = git_dirs(root).with_context(|| format!("Could not list {}", root.display()))?;
    if dirs.is_empty() {
        bail!("No submission repositories found in {}", root.display());
    }
    let names = dir_names(&dirs);
    let labeling = roster
        .as_ref()
        .map(|r| r.label_dirs(&names, MatchMode::Lookup, false));
    if let Some(labeling) = &labeling {
        for identity in &labeling.unmatched {
            tracing::warn!("No submission found for {identity}");
        }
    }

    let evaluator = Evaluator::default();
    for (dir, dir_name) in dirs.iter().zip(&names) {
        banner(&format!("Processing {dir_name}"));
        let display_name = labeling.as_ref().and_then(|l| l.display_name(dir_name));

        if !skip_eval {
            match evaluator
                .evaluate(dir, assignment.as_ref(), display_name)
                .await
            {
                Ok(result) => {
                    println!("{}", summary_table(&result, &score(&result, &params), &params));
                }
                Err(e) if e.is_skip() => {
                    tracing::info!("SKIPPING {dir_name}: {e}");
                    continue;
                }
                Err(e) => {
                    tracing::error!("{dir_name}: {e}");
                    continue;
                }
            }
        }

        if !skip_feedback {
            match feedback::generate(dir, &feedback_filename, &params, overwrite) {
                Ok(_) => {}
                Err(e @ GradeError::FeedbackExists(_)) => {
                    tracing::info!("SKIPPING {dir_name}: {e}");
                }
                Err(e) => tracing::error!("{dir_name}: {e}"),
            }
        }
    }

    Ok(())
}

/// Dispatches a python subcommand.
async fn run_python(cmd: PythonCmd) -> Result<()> {
    match cmd {
        PythonCmd::Eval {
            dir,
            name,
            assignment,
            no_summary,
            scoring,
        } => {
            let settings = settings_for(&dir)?;
            let assignment = resolve_assignment(settings.as_ref(), assignment).await;
            match Evaluator::default()
                .evaluate(&dir, assignment.as_ref(), name.as_deref())
                .await
            {
                Ok(result) => {
                    if !no_summary {
                        let params = scoring_params(&scoring, settings.as_ref());
                        println!("{}", summary_table(&result, &score(&result, &params), &params));
                    }
                }
                Err(e @ GradeError::NoCommits(_)) => tracing::info!("SKIPPING: {e}"),
                Err(e) => return Err(e.into()),
            }
        }
        PythonCmd::Grade {
            root,
            roster,
            assignment,
            skip_eval,
            skip_feedback,
            feedback_filename,
            overwrite,
            scoring,
        } => {
            grade_all(
                &root,
                roster,
                assignment,
                skip_eval,
                skip_feedback,
                feedback_filename,
                overwrite,
                &scoring,
            )
            .await?
        }
        PythonCmd::Feedback {
            dir,
            feedback_filename,
            overwrite,
            scoring,
        } => {
            let settings = settings_for(&dir)?;
            let params = scoring_params(&scoring, settings.as_ref());
            let filename = feedback_name(feedback_filename, settings.as_ref());
            match feedback::generate(&dir, &filename, &params, overwrite) {
                Ok(_) => {}
                Err(e @ GradeError::FeedbackExists(_)) => tracing::info!("SKIPPING: {e}"),
                Err(e) => return Err(e.into()),
            }
        }
        PythonCmd::GradesCsv {
            root,
            feedback_filename,
            grades_filename,
            yes,
        } => {
            let settings = settings_for(&root)?;
            let filename = feedback_name(feedback_filename, settings.as_ref());
            let grades_path = root.join(&grades_filename);
            if grades_path.exists() && !yes && !confirm_overwrite(&grades_path)? {
                return Ok(());
            }
            let rows = export(&root, &filename, &grades_filename, true)?;
            println!("Wrote {rows} grades to {}", grades_path.display());
        }
    }
    Ok(())
}

/// Dispatches a classroom subcommand.
async fn run_classroom(cmd: ClassroomCmd) -> Result<()> {
    match cmd {
        ClassroomCmd::RenameRoster {
            root,
            roster,
            remove_prefix,
            preview,
            ignore_case,
        } => {
            let settings = settings_for(&root)?;
            let Some(roster) = load_roster(roster, settings.as_ref())? else {
                bail!("No roster given and none configured in assignment.toml");
            };
            let names = subdir_names(&root)?;
            let plans = plan_renames(&roster, &names, remove_prefix, ignore_case);
            let done = apply_renames(&root, &plans, preview);
            println!("{} of {} directories renamed", done.len(), names.len());
        }
        ClassroomCmd::CommitAll {
            root,
            message,
            preview,
        } => {
            let dirty = repo::commit_all(&root, &message, preview).await?;
            println!("{} repositories with changes", dirty.len());
        }
        ClassroomCmd::CloneAll {
            root,
            assignment,
            preserve_prefix,
            update,
            preview,
        } => {
            let settings = settings_for(&root)?;
            let Some(assignment) = resolve_assignment(settings.as_ref(), assignment).await else {
                bail!("No assignment given and none configured in assignment.toml");
            };
            remember_assignment(&root, settings.as_ref(), &assignment);
            banner(&format!("Cloning {}", assignment.title));
            let summary = classroom::clone_all(
                &GhCliSource,
                &root,
                &assignment,
                preserve_prefix,
                update,
                preview,
            )
            .await?;
            for (label, dirs) in [
                ("Cloned", &summary.cloned),
                ("Pulled", &summary.pulled),
                ("Not submitted", &summary.not_submitted),
                ("Errors", &summary.errors),
            ] {
                if !dirs.is_empty() {
                    println!("{} ({}): {}", label.bold(), dirs.len(), dirs.join(", "));
                }
            }
        }
        ClassroomCmd::LateSubmissions {
            root,
            assignment,
            roster,
        } => report_late(&root, assignment, roster).await?,
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let opts = options();

    let level = if opts.debug {
        Level::DEBUG
    } else if opts.quiet {
        Level::WARN
    } else {
        Level::INFO
    };
    let fmt = fmt::layer()
        .without_time()
        .with_file(false)
        .with_line_number(false);
    let filter_layer = LevelFilter::from_level(level);
    tracing_subscriber::registry()
        .with(fmt)
        .with(filter_layer)
        .init();

    config::ensure_initialized()?;

    match opts.cmd {
        Cmd::Python(cmd) => run_python(cmd).await?,
        Cmd::Classroom(cmd) => run_classroom(cmd).await?,
        Cmd::Repo(RepoCmd::Discover(root)) => {
            for dir in git_dirs(&root)? {
                println!("{}", dir.display());
            }
        }
        Cmd::Repo(RepoCmd::Git { root, args }) => git_everywhere(&root, &args).await?,
    }

    Ok(())
}
