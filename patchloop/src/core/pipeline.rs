//! Text transformations for verification pipelines.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, Regex};

/// `mkdir` in command position: at the start, or after `;`, `&`, `|`, `(`,
/// `{` or a newline.
static MKDIR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(^|[;&|({\n])(\s*)mkdir\b(\s+-p\b)?").expect("mkdir regex")
});

/// Rewrite every bare `mkdir` invocation to `mkdir -p`.
///
/// Only command words are touched (`echo mkdir` is left alone). Occurrences
/// already followed by `-p` are kept as-is, so the rewrite is idempotent.
pub fn normalize_mkdir(command: &str) -> Cow<'_, str> {
    MKDIR_RE.replace_all(command, |caps: &Captures<'_>| {
        if caps.get(3).is_some() {
            caps[0].to_string()
        } else {
            format!("{}{}mkdir -p", &caps[1], &caps[2])
        }
    })
}

/// Join commands into one `&&` chain so the first failure stops the rest.
pub fn join_commands(commands: &[String], normalize: bool) -> String {
    commands
        .iter()
        .map(|command| {
            if normalize {
                normalize_mkdir(command).into_owned()
            } else {
                command.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" && ")
}

/// Last line of a command's output (empty output yields `""`).
pub fn final_line(output: &str) -> &str {
    output.rsplit('\n').next().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_bare_mkdir() {
        assert_eq!(normalize_mkdir("mkdir build"), "mkdir -p build");
        assert_eq!(
            normalize_mkdir("mkdir a; cd a && mkdir b"),
            "mkdir -p a; cd a && mkdir -p b"
        );
    }

    #[test]
    fn leaves_existing_flag_and_other_words_alone() {
        assert_eq!(normalize_mkdir("mkdir -p build"), "mkdir -p build");
        assert_eq!(normalize_mkdir("mkdir  -p build"), "mkdir  -p build");
        assert_eq!(normalize_mkdir("echo mkdir_tool"), "echo mkdir_tool");
        assert_eq!(normalize_mkdir("cmake --build ."), "cmake --build .");
        assert!(matches!(normalize_mkdir("ls"), Cow::Borrowed(_)));
    }

    #[test]
    fn mkdir_as_argument_is_not_rewritten() {
        assert_eq!(normalize_mkdir("echo mkdir"), "echo mkdir");
        assert_eq!(normalize_mkdir("grep mkdir log.txt"), "grep mkdir log.txt");
        assert_eq!(
            normalize_mkdir("echo mkdir && mkdir out"),
            "echo mkdir && mkdir -p out"
        );
        assert_eq!(
            normalize_mkdir("test -d out || mkdir out|cat"),
            "test -d out || mkdir -p out|cat"
        );
        assert_eq!(normalize_mkdir("(mkdir a)"), "(mkdir -p a)");
    }

    #[test]
    fn normalization_is_idempotent() {
        let once = normalize_mkdir("mkdir out && mkdir out").into_owned();
        assert_eq!(normalize_mkdir(&once), once);
    }

    #[test]
    fn joins_with_and_chain() {
        let commands = vec![
            "mkdir build".to_string(),
            "cmake -S . -B build".to_string(),
            "./build/hello".to_string(),
        ];
        assert_eq!(
            join_commands(&commands, true),
            "mkdir -p build && cmake -S . -B build && ./build/hello"
        );
        assert_eq!(
            join_commands(&commands, false),
            "mkdir build && cmake -S . -B build && ./build/hello"
        );
        assert_eq!(join_commands(&[], true), "");
    }

    #[test]
    fn final_line_takes_last_segment() {
        assert_eq!(final_line("configuring\nbuilding\nhello world"), "hello world");
        assert_eq!(final_line("single"), "single");
        assert_eq!(final_line(""), "");
    }
}
