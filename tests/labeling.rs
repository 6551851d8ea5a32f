use std::fs;

use au::roster::{MatchMode, Rename, Roster, apply_renames, plan_renames, subdir_names};

#[test]
fn directory_is_labeled_with_the_roster_name() {
    let roster = Roster::from_entries([("ada", "Ada Lovelace")]);
    let labeling = roster.label_dirs(&["hw1-ada-20240101"], MatchMode::Lookup, false);

    assert_eq!(labeling.display_name("hw1-ada-20240101"), Some("Ada Lovelace"));
    assert_eq!(
        labeling.dir_identity.get("hw1-ada-20240101").map(String::as_str),
        Some("ada")
    );
    assert!(labeling.unmatched.is_empty());
}

#[test]
fn longer_identities_win_over_their_substrings() {
    let roster = Roster::from_entries([("ann", "Ann Smith"), ("joanna", "Joanna Jones")]);
    let labeling = roster.label_dirs(&["hw1-joanna", "hw1-ann"], MatchMode::Lookup, false);

    assert_eq!(labeling.display_name("hw1-joanna"), Some("Joanna Jones"));
    assert_eq!(labeling.display_name("hw1-ann"), Some("Ann Smith"));
}

#[test]
fn short_and_empty_identities_are_dropped() {
    let roster = Roster::from_entries([("a", "Too Short"), ("", "Nobody"), ("bob", "Bob")]);
    assert_eq!(roster.len(), 1);
    assert_eq!(roster.name("bob"), Some("Bob"));
}

#[test]
fn consume_mode_labels_each_identity_once() {
    let roster = Roster::from_entries([("ada", "Ada Lovelace")]);
    let dirs = ["hw1-ada", "hw2-ada"];

    let consumed = roster.label_dirs(&dirs, MatchMode::Consume, false);
    assert_eq!(consumed.dir_identity.len(), 1);
    assert!(consumed.dir_identity.contains_key("hw1-ada"));

    let looked_up = roster.label_dirs(&dirs, MatchMode::Lookup, false);
    assert_eq!(looked_up.dir_identity.len(), 2);
    assert_eq!(
        looked_up.identity_dir.get("ada").map(String::as_str),
        Some("hw2-ada")
    );
}

#[test]
fn identities_without_a_directory_are_reported() {
    let roster = Roster::from_entries([("ada", "Ada"), ("grace", "Grace Hopper")]);
    let labeling = roster.label_dirs(&["hw1-ada", "hw1-unknown"], MatchMode::Lookup, false);

    assert_eq!(labeling.unmatched, vec!["grace".to_string()]);
    assert_eq!(labeling.display_name("hw1-unknown"), None);
}

#[test]
fn case_folding_is_opt_in() {
    let roster = Roster::from_entries([("ada", "Ada Lovelace")]);
    let strict = roster.label_dirs(&["hw1-ADA"], MatchMode::Lookup, false);
    assert!(strict.dir_identity.is_empty());

    let folded = roster.label_dirs(&["hw1-ADA"], MatchMode::Lookup, true);
    assert_eq!(folded.display_name("hw1-ADA"), Some("Ada Lovelace"));
}

#[test]
fn roster_csv_requires_its_columns() {
    let dir = tempfile::tempdir().unwrap();

    let good = dir.path().join("roster.csv");
    fs::write(
        &good,
        "identifier,github_username,github_id,name\nAda Lovelace,ada,1,\nNo Login,,,\n",
    )
    .unwrap();
    let roster = Roster::from_csv(&good).unwrap();
    assert_eq!(roster.len(), 1);
    assert_eq!(roster.name("ada"), Some("Ada Lovelace"));

    let bad = dir.path().join("bad.csv");
    fs::write(&bad, "name,login\nAda,ada\n").unwrap();
    assert!(Roster::from_csv(&bad).is_err());
}

#[test]
fn renames_insert_the_student_name() {
    let roster = Roster::from_entries([("ada", "Ada Lovelace"), ("alan", "Alan Turing")]);
    let dirs = ["hw1-ada", "hw1-alan", "hw1-Ada_Lovelace@ada-old"];

    let plans = plan_renames(&roster, &dirs[..2], false, false);
    assert_eq!(
        plans,
        vec![
            Rename {
                from: "hw1-ada".into(),
                to:   "hw1-Ada_Lovelace@ada".into(),
            },
            Rename {
                from: "hw1-alan".into(),
                to:   "hw1-Alan_Turing@alan".into(),
            },
        ]
    );

    let already = plan_renames(&roster, &dirs[2..], false, false);
    assert!(already.is_empty());
}

#[test]
fn renames_can_drop_the_shared_prefix() {
    let roster = Roster::from_entries([("ada", "Ada Lovelace"), ("alan", "Alan Turing")]);
    let plans = plan_renames(&roster, &["hw1-ada", "hw1-alan"], true, false);
    let targets: Vec<&str> = plans.iter().map(|p| p.to.as_str()).collect();
    assert_eq!(targets, vec!["Ada_Lovelace@ada", "Alan_Turing@alan"]);
}

#[test]
fn preview_leaves_directories_alone() {
    let root = tempfile::tempdir().unwrap();
    fs::create_dir(root.path().join("hw1-ada")).unwrap();
    let roster = Roster::from_entries([("ada", "Ada Lovelace")]);

    let names = subdir_names(root.path()).unwrap();
    let plans = plan_renames(&roster, &names, false, false);

    let previewed = apply_renames(root.path(), &plans, true);
    assert_eq!(previewed.len(), 1);
    assert!(root.path().join("hw1-ada").is_dir());

    let done = apply_renames(root.path(), &plans, false);
    assert_eq!(done.len(), 1);
    assert!(root.path().join("hw1-Ada_Lovelace@ada").is_dir());
    assert!(!root.path().join("hw1-ada").exists());
}
