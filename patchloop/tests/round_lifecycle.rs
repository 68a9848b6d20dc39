//! Full collaborator rounds: apply, commit, verify, then iterate on feedback.

use patchloop::core::types::{Action, ChangeBatch, FileAction, RepoChange, Requirement};
use patchloop::round::{Round, RoundOptions, run_round};
use patchloop::test_support::{TestRepo, patch};

fn greeting_requirement() -> Requirement {
    Requirement {
        description: "greet.sh prints the greeting".to_string(),
        verification_commands: vec!["sh greet.sh".to_string()],
        expected_output: "Hello, World!".to_string(),
    }
}

#[test]
fn rounds_converge_on_fulfilled_requirement() {
    let repo = TestRepo::new().expect("repo");
    let req = greeting_requirement();
    let options = RoundOptions::default();

    // Round 1: a script that prints the wrong thing.
    let first = ChangeBatch {
        changes: vec![RepoChange::File(FileAction {
            action: Action::Create,
            file_name: "greet.sh".to_string(),
            content: Some("echo Hello\n".to_string()),
        })],
    };
    let outcome = run_round(
        repo.repo(),
        &Round {
            batch: &first,
            requirement: &req,
            commit_message: "round 1",
        },
        &options,
    );
    assert!(outcome.report.all_applied(), "{:?}", outcome.report);
    assert!(outcome.committed);
    assert!(outcome.commit_error.is_none());
    let first_revision = outcome.revision.clone().expect("revision");
    assert!(!outcome.verdict.fulfilled);
    assert_eq!(
        outcome.verdict.message,
        "Got unexpected output: Hello, expecting Hello, World!"
    );

    // Round 2: patch against the committed hash from the manifest.
    let hash = repo.blob_hash("greet.sh").expect("hash");
    let second = ChangeBatch {
        changes: vec![RepoChange::Patch(patch(
            "greet.sh",
            &hash,
            "-1 +1",
            &["-echo Hello", "+echo 'Hello, World!'"],
        ))],
    };
    let outcome = run_round(
        repo.repo(),
        &Round {
            batch: &second,
            requirement: &req,
            commit_message: "round 2",
        },
        &options,
    );
    assert!(outcome.report.all_applied(), "{:?}", outcome.report);
    assert!(outcome.committed);
    assert_ne!(outcome.revision.as_deref(), Some(first_revision.as_str()));
    assert!(outcome.verdict.fulfilled, "{}", outcome.verdict.message);
}

#[test]
fn round_without_effective_changes_does_not_commit() {
    let repo = TestRepo::new().expect("repo");
    repo.commit_file("greet.sh", "echo 'Hello, World!'\n")
        .expect("commit");
    let head = repo.repo().current_revision_id().output;

    let outcome = run_round(
        repo.repo(),
        &Round {
            batch: &ChangeBatch { changes: vec![] },
            requirement: &greeting_requirement(),
            commit_message: "empty round",
        },
        &RoundOptions::default(),
    );
    assert!(!outcome.committed);
    assert_eq!(outcome.revision.as_deref(), Some(head.as_str()));
    assert!(outcome.verdict.fulfilled);
}

#[test]
fn failed_entries_still_get_a_verdict() {
    let repo = TestRepo::new().expect("repo");
    let batch = ChangeBatch {
        changes: vec![RepoChange::File(FileAction {
            action: Action::Delete,
            file_name: "greet.sh".to_string(),
            content: None,
        })],
    };
    let outcome = run_round(
        repo.repo(),
        &Round {
            batch: &batch,
            requirement: &greeting_requirement(),
            commit_message: "nothing to do",
        },
        &RoundOptions::default(),
    );
    assert_eq!(outcome.report.failures().count(), 1);
    assert!(!outcome.committed);
    assert_eq!(outcome.revision, None);
    assert!(!outcome.verdict.fulfilled);
}
