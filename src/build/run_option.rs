//! Mount options attached to run instructions.
//!
//! A [`RunOption`] is declarative; resolving it against a [`Target`] produces
//! a [`Mount`], which is the form recorded in the build-graph state. Cache
//! mounts become persistent caches keyed by id; source mounts resolve their
//! `from` through the named-context lookup, which may compile another
//! variant.

use serde::Serialize;

use super::target::{Context, ContextLookup, Target};
use crate::error::Result;

/// Sharing mode of a persistent cache mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheSharing {
    Shared,
    Private,
    Locked,
}

impl CacheSharing {
    /// Parses an access mode. Anything unrecognized is shared.
    pub fn from_access(access: &str) -> Self {
        match access {
            "private" => CacheSharing::Private,
            "locked" => CacheSharing::Locked,
            _ => CacheSharing::Shared,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheSharing::Shared => "shared",
            CacheSharing::Private => "private",
            CacheSharing::Locked => "locked",
        }
    }
}

/// Mounts a persistent cache at `destination` while a run executes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheMount {
    pub destination: String,
    /// Cache id. Defaults to the expanded destination.
    pub id: String,
    /// `shared`, `private`, or `locked`.
    pub access: String,
    /// Owner uid. May reference build arguments such as `$LIVES_UID`.
    pub uid: String,
    /// Owner gid. May reference build arguments such as `$LIVES_GID`.
    pub gid: String,
}

/// Mounts a build context (`local` or another variant) while a run executes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceMount {
    pub from: String,
    pub destination: String,
    pub source: String,
    pub readonly: bool,
}

/// An attachment to a run instruction describing a mount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RunOption {
    CacheMount(CacheMount),
    SourceMount(SourceMount),
}

/// A resolved mount, as recorded in a target's build-graph state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Mount {
    Cache {
        target: String,
        id: String,
        sharing: CacheSharing,
        uid: u32,
        gid: u32,
        /// Seed directory prepared with the owner's uid/gid, if any.
        source: Option<String>,
    },
    Source {
        target: String,
        from: Context,
        source: Option<String>,
        readonly: bool,
    },
}

impl RunOption {
    /// Resolves this option into a mount for the given target.
    pub fn mount(&self, target: &mut Target, contexts: &dyn ContextLookup) -> Result<Mount> {
        match self {
            RunOption::CacheMount(cache) => Ok(cache.mount(target)),
            RunOption::SourceMount(source) => source.mount(target, contexts),
        }
    }
}

impl CacheMount {
    fn mount(&self, target: &Target) -> Mount {
        let id = if self.id.is_empty() {
            target.expand_env(&self.destination)
        } else {
            self.id.clone()
        };

        // uid/gid are string forms of integers that may reference build
        // arguments; unparseable values fall back to root
        let uid = parse_id(&target.expand_env(&self.uid));
        let gid = parse_id(&target.expand_env(&self.gid));

        let source = if uid != 0 || gid != 0 {
            Some(target.layout().cache_mount_source_dir.clone())
        } else {
            None
        };

        Mount::Cache {
            target: target.expand_env(&self.destination),
            id,
            sharing: CacheSharing::from_access(&self.access),
            uid,
            gid,
            source,
        }
    }
}

impl SourceMount {
    fn mount(&self, target: &mut Target, contexts: &dyn ContextLookup) -> Result<Mount> {
        let destination = if self.destination.is_empty() {
            "."
        } else {
            self.destination.as_str()
        };

        let source = if self.source.is_empty() {
            None
        } else {
            Some(target.expand_env(&self.source))
        };

        let from = target.resolve(&self.from, contexts)?;

        Ok(Mount::Source {
            target: target.expand_env(destination),
            from,
            source,
            readonly: self.readonly,
        })
    }
}

fn parse_id(value: &str) -> u32 {
    value.trim().parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::target::tests::{LocalOnly, StaticContexts};
    use crate::build::target::Target;
    use crate::defaults::Layout;

    fn target_with_lives_args() -> Target {
        let mut target = Target::new("build", Some("debian:bookworm"), Layout::default(), 0);
        target.add_arg("LIVES_UID", "123");
        target.add_arg("LIVES_GID", "223");
        target
    }

    #[test]
    fn test_cache_mount_defaults_id_to_destination() {
        let mut target = target_with_lives_args();
        let option = RunOption::CacheMount(CacheMount {
            destination: "/var/cache/go".to_string(),
            ..CacheMount::default()
        });

        match option.mount(&mut target, &LocalOnly).unwrap() {
            Mount::Cache {
                target, id, sharing, source, ..
            } => {
                assert_eq!(target, "/var/cache/go");
                assert_eq!(id, "/var/cache/go");
                assert_eq!(sharing, CacheSharing::Shared);
                assert_eq!(source, None);
            }
            other => panic!("Expected cache mount, got {:?}", other),
        }
    }

    #[test]
    fn test_cache_mounts_with_distinct_ids_are_distinct() {
        let mut target = target_with_lives_args();
        let first = RunOption::CacheMount(CacheMount {
            destination: "/root/.cache".to_string(),
            id: "one".to_string(),
            ..CacheMount::default()
        })
        .mount(&mut target, &LocalOnly)
        .unwrap();
        let second = RunOption::CacheMount(CacheMount {
            destination: "/root/.cache".to_string(),
            id: "two".to_string(),
            ..CacheMount::default()
        })
        .mount(&mut target, &LocalOnly)
        .unwrap();

        assert_ne!(first, second);
    }

    #[test]
    fn test_cache_mount_expands_owner_and_seeds_directory() {
        let mut target = target_with_lives_args();
        let option = RunOption::CacheMount(CacheMount {
            destination: "/home/$LIVES_UID/.npm".to_string(),
            access: "locked".to_string(),
            uid: "$LIVES_UID".to_string(),
            gid: "$LIVES_GID".to_string(),
            ..CacheMount::default()
        });

        match option.mount(&mut target, &LocalOnly).unwrap() {
            Mount::Cache {
                target,
                id,
                sharing,
                uid,
                gid,
                source,
            } => {
                assert_eq!(target, "/home/123/.npm");
                assert_eq!(id, "/home/123/.npm");
                assert_eq!(sharing, CacheSharing::Locked);
                assert_eq!((uid, gid), (123, 223));
                assert_eq!(source.as_deref(), Some("/cache"));
            }
            other => panic!("Expected cache mount, got {:?}", other),
        }
    }

    #[test]
    fn test_source_mount_resolves_context() {
        let mut target = target_with_lives_args();
        let contexts = StaticContexts::with_image("tools", "docker-registry.example/tools:1");
        let option = RunOption::SourceMount(SourceMount {
            from: "tools".to_string(),
            destination: "/src".to_string(),
            source: "/usr/bin".to_string(),
            readonly: true,
        });

        match option.mount(&mut target, &contexts).unwrap() {
            Mount::Source {
                target,
                from,
                source,
                readonly,
            } => {
                assert_eq!(target, "/src");
                assert_eq!(from, Context::Image("docker-registry.example/tools:1".to_string()));
                assert_eq!(source.as_deref(), Some("/usr/bin"));
                assert!(readonly);
            }
            other => panic!("Expected source mount, got {:?}", other),
        }
    }

    #[test]
    fn test_source_mount_defaults_destination() {
        let mut target = target_with_lives_args();
        let option = RunOption::SourceMount(SourceMount {
            from: "local".to_string(),
            ..SourceMount::default()
        });

        match option.mount(&mut target, &LocalOnly).unwrap() {
            Mount::Source { target, from, .. } => {
                assert_eq!(target, ".");
                assert_eq!(from, Context::Local);
            }
            other => panic!("Expected source mount, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_access_is_shared() {
        assert_eq!(CacheSharing::from_access("bogus"), CacheSharing::Shared);
        assert_eq!(CacheSharing::from_access("private"), CacheSharing::Private);
    }
}
