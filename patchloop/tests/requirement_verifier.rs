//! Requirement verification against real working trees.

use std::time::{Duration, Instant};

use patchloop::apply::{ApplyOptions, apply_batch};
use patchloop::core::types::{Action, ChangeBatch, FileAction, RepoChange, Requirement};
use patchloop::io::config::PatchloopConfig;
use patchloop::io::repo::Repo;
use patchloop::test_support::TestRepo;
use patchloop::verify::{FULFILLED_MESSAGE, NO_COMMANDS_MESSAGE, VerifyOptions, verify};

fn requirement(commands: &[&str], expected: &str) -> Requirement {
    Requirement {
        description: "test requirement".to_string(),
        verification_commands: commands.iter().map(|c| c.to_string()).collect(),
        expected_output: expected.to_string(),
    }
}

/// Build in `build/` with a shell script and run the produced program.
fn hello_requirement() -> Requirement {
    requirement(
        &["mkdir build", "cd build", "sh ../build.sh", "./hello"],
        "Hello, World!",
    )
}

const BUILD_SCRIPT: &str = "printf '#!/bin/sh\\necho \"Hello, World!\"\\n' > hello\nchmod +x hello\n";

#[test]
fn cmake_project_is_initially_unfulfilled() {
    let repo = TestRepo::new().expect("repo");
    let req = requirement(
        &["mkdir build", "cd build", "cmake ..", "make", "./hello"],
        "Hello, World!",
    );
    let verdict = verify(repo.repo(), &req, &VerifyOptions::default());
    assert!(!verdict.fulfilled);
    assert_ne!(verdict.message, FULFILLED_MESSAGE);
}

#[test]
fn build_requirement_flips_once_sources_exist() {
    let repo = TestRepo::new().expect("repo");
    let req = hello_requirement();

    let before = verify(repo.repo(), &req, &VerifyOptions::default());
    assert!(!before.fulfilled);
    assert!(repo.path().join("build").is_dir());

    let batch = ChangeBatch {
        changes: vec![RepoChange::File(FileAction {
            action: Action::Create,
            file_name: "build.sh".to_string(),
            content: Some(BUILD_SCRIPT.to_string()),
        })],
    };
    let report = apply_batch(repo.repo(), &batch, &ApplyOptions::default());
    assert!(report.all_applied(), "{report:?}");

    // `build/` already exists from the first run.
    let after = verify(repo.repo(), &req, &VerifyOptions::default());
    assert!(after.fulfilled, "{}", after.message);
    assert_eq!(after.message, FULFILLED_MESSAGE);
}

#[test]
fn committed_sources_are_not_enough_without_a_build() {
    let repo = TestRepo::new().expect("repo");
    let run_only = requirement(&["./build/hello"], "Hello, World!");

    let batch = ChangeBatch {
        changes: vec![RepoChange::File(FileAction {
            action: Action::Create,
            file_name: "build.sh".to_string(),
            content: Some(BUILD_SCRIPT.to_string()),
        })],
    };
    let report = apply_batch(repo.repo(), &batch, &ApplyOptions::default());
    assert!(report.all_applied(), "{report:?}");
    repo.commit_all("add build script").expect("commit");

    let unbuilt = verify(repo.repo(), &run_only, &VerifyOptions::default());
    assert!(!unbuilt.fulfilled);
    assert!(!unbuilt.message.trim().is_empty());
    assert_ne!(unbuilt.message, FULFILLED_MESSAGE);

    let built = verify(repo.repo(), &hello_requirement(), &VerifyOptions::default());
    assert!(built.fulfilled, "{}", built.message);
    assert_eq!(built.message, FULFILLED_MESSAGE);

    let rerun = verify(repo.repo(), &run_only, &VerifyOptions::default());
    assert!(rerun.fulfilled, "{}", rerun.message);
}

#[test]
fn bare_mkdir_fails_on_rerun_without_normalization() {
    let repo = TestRepo::new().expect("repo");
    repo.write("build.sh", BUILD_SCRIPT).expect("write");
    let options = VerifyOptions {
        normalize_mkdir: false,
    };
    let req = hello_requirement();

    assert!(verify(repo.repo(), &req, &options).fulfilled);
    let second = verify(repo.repo(), &req, &options);
    assert!(!second.fulfilled);
    assert!(second.message.contains("build"), "{}", second.message);
}

#[test]
fn unexpected_output_names_both_values() {
    let repo = TestRepo::new().expect("repo");
    let req = requirement(&["echo first", "echo Goodbye"], "Hello");
    let verdict = verify(repo.repo(), &req, &VerifyOptions::default());
    assert!(!verdict.fulfilled);
    assert_eq!(verdict.message, "Got unexpected output: Goodbye, expecting Hello");
}

#[test]
fn only_the_last_line_is_compared() {
    let repo = TestRepo::new().expect("repo");
    let req = requirement(&["printf 'noise\\nmore noise\\ndone\\n'"], "done");
    assert!(verify(repo.repo(), &req, &VerifyOptions::default()).fulfilled);
}

#[test]
fn failing_command_reports_its_output() {
    let repo = TestRepo::new().expect("repo");
    let req = requirement(&["echo out", "echo err >&2; false", "echo never"], "never");
    let verdict = verify(repo.repo(), &req, &VerifyOptions::default());
    assert!(!verdict.fulfilled);
    assert!(verdict.message.contains("out"), "{}", verdict.message);
    assert!(verdict.message.contains("err"), "{}", verdict.message);
    assert!(!verdict.message.contains("never"), "{}", verdict.message);
}

#[test]
fn empty_command_list_is_unfulfilled() {
    let repo = TestRepo::new().expect("repo");
    let verdict = verify(repo.repo(), &requirement(&[], ""), &VerifyOptions::default());
    assert!(!verdict.fulfilled);
    assert_eq!(verdict.message, NO_COMMANDS_MESSAGE);
}

#[test]
fn commands_run_in_the_tree_root() {
    let repo = TestRepo::new().expect("repo");
    repo.write("marker.txt", "here\n").expect("write");
    let req = requirement(&["cat marker.txt"], "here");
    assert!(verify(repo.repo(), &req, &VerifyOptions::default()).fulfilled);
}

#[test]
fn slow_command_times_out() {
    let test_repo = TestRepo::new().expect("repo");
    let cfg = PatchloopConfig {
        command_timeout_secs: 1,
        ..PatchloopConfig::default()
    };
    let repo = Repo::from_config(test_repo.path(), &cfg);
    let req = requirement(&["exec sleep 5"], "");
    let verdict = verify(&repo, &req, &VerifyOptions::from(&cfg));
    assert!(!verdict.fulfilled);
    assert!(verdict.message.contains("timed out"), "{}", verdict.message);
}

#[test]
fn repeated_mkdir_succeeds_when_normalized() {
    let repo = TestRepo::new().expect("repo");
    let req = requirement(&["mkdir out", "mkdir out", "echo ok"], "ok");
    assert!(verify(repo.repo(), &req, &VerifyOptions::default()).fulfilled);
    assert!(repo.path().join("out").is_dir());
}

#[test]
fn timeout_bounds_commands_the_shell_forks() {
    let test_repo = TestRepo::new().expect("repo");
    let cfg = PatchloopConfig {
        command_timeout_secs: 1,
        ..PatchloopConfig::default()
    };
    let repo = Repo::from_config(test_repo.path(), &cfg);
    let req = requirement(&["true", "sleep 8"], "");

    let started = Instant::now();
    let verdict = verify(&repo, &req, &VerifyOptions::from(&cfg));
    let elapsed = started.elapsed();

    assert!(!verdict.fulfilled);
    assert!(verdict.message.contains("timed out"), "{}", verdict.message);
    assert!(elapsed < Duration::from_secs(5), "took {elapsed:?}");
}
