//! Helpers producing common instruction sequences.

use super::instruction::{Instruction, Run};
use crate::defaults::Layout;

/// Commands creating the given group and user account, unless they exist.
pub fn create_user(name: &str, uid: &str, gid: &str, layout: &Layout) -> Vec<Run> {
    vec![
        Run::new("(getent group %s || groupadd -o -g %s -r %s)", [gid, gid, name]),
        Run::new(
            "(getent passwd %s || useradd -l -o -m -d %s -r -g %s -u %s %s)",
            [uid, layout.home_dir(name).as_str(), gid, uid, name],
        ),
    ]
}

/// Sets ownership of `path`.
pub fn chown(uid: &str, gid: &str, path: &str) -> Run {
    Run::new("chown %s:%s", [uid, gid, path])
}

pub fn create_directories<I, S>(paths: I) -> Run
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Run::new("mkdir -p", paths)
}

pub fn create_directory(path: &str) -> Run {
    create_directories([path])
}

/// Sets `HOME` for the given account.
pub fn home(name: &str, layout: &Layout) -> Instruction {
    Instruction::env([("HOME", layout.home_dir(name))])
}

/// Wraps copy instructions so the copied files are owned by `uid:gid`.
/// Other instructions are returned unchanged.
pub fn apply_user(uid: &str, gid: &str, instructions: Vec<Instruction>) -> Vec<Instruction> {
    instructions
        .into_iter()
        .map(|instruction| match instruction {
            Instruction::Copy(copy) => Instruction::CopyAs {
                uid: uid.to_string(),
                gid: gid.to_string(),
                from: None,
                copy,
            },
            Instruction::CopyFrom { from, copy } => Instruction::CopyAs {
                uid: uid.to_string(),
                gid: gid.to_string(),
                from: Some(from),
                copy,
            },
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::instruction::Copy;

    #[test]
    fn test_create_user() {
        let runs = create_user("$LIVES_AS", "$LIVES_UID", "$LIVES_GID", &Layout::default());
        assert_eq!(
            runs,
            vec![
                Run::new(
                    "(getent group %s || groupadd -o -g %s -r %s)",
                    ["$LIVES_GID", "$LIVES_GID", "$LIVES_AS"]
                ),
                Run::new(
                    "(getent passwd %s || useradd -l -o -m -d %s -r -g %s -u %s %s)",
                    ["$LIVES_UID", "/home/$LIVES_AS", "$LIVES_GID", "$LIVES_UID", "$LIVES_AS"]
                ),
            ]
        );
    }

    #[test]
    fn test_chown_and_directories() {
        assert_eq!(
            chown("$LIVES_UID", "$LIVES_GID", "/srv/app").render(),
            r#"chown "$LIVES_UID":"$LIVES_GID" "/srv/app""#
        );
        assert_eq!(create_directory("/opt/lib").render(), r#"mkdir -p "/opt/lib""#);
        assert_eq!(create_directories(["/a", "/b"]).render(), r#"mkdir -p "/a" "/b""#);
    }

    #[test]
    fn test_home() {
        let layout = Layout::default();
        assert_eq!(home("root", &layout).tokens(), vec![r#"HOME="/root""#]);
        assert_eq!(home("$RUNS_AS", &layout).tokens(), vec![r#"HOME="/home/$RUNS_AS""#]);
    }

    #[test]
    fn test_apply_user_wraps_copies_only() {
        let instructions = vec![
            Instruction::Copy(Copy::new(["."], ".")),
            Instruction::run("echo", Vec::<String>::new()),
            Instruction::CopyFrom {
                from: "build".to_string(),
                copy: Copy::new(["/foo/src"], "/foo/dst"),
            },
        ];

        let applied = apply_user("$LIVES_UID", "$LIVES_GID", instructions);

        assert_eq!(
            applied,
            vec![
                Instruction::CopyAs {
                    uid: "$LIVES_UID".to_string(),
                    gid: "$LIVES_GID".to_string(),
                    from: None,
                    copy: Copy::new(["."], "."),
                },
                Instruction::run("echo", Vec::<String>::new()),
                Instruction::CopyAs {
                    uid: "$LIVES_UID".to_string(),
                    gid: "$LIVES_GID".to_string(),
                    from: Some("build".to_string()),
                    copy: Copy::new(["/foo/src"], "/foo/dst"),
                },
            ]
        );
    }
}
