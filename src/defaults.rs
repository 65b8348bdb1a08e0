//! Default values for stagewright configuration and compilation.
//!
//! This module centralizes the fixed filesystem locations and default user
//! accounts that the instruction compilers rely on. They are plain values,
//! passed explicitly to the components that need them, so tests and embedders
//! can substitute their own.

/// Name of the configuration file looked up when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "stagewright.yaml";

/// The only configuration document version this crate understands.
pub const CURRENT_VERSION: &str = "v4";

/// Keyword for artifacts that come from the local build context.
pub const LOCAL_ARTIFACT_KEYWORD: &str = "local";

/// Keyword for apt packages installed from the base image's default release.
pub const APT_DEFAULT_TARGET: &str = "default";

/// Filesystem locations used by the generated build instructions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    /// Shared library directory owned by the `lives` user.
    pub local_lib_prefix: String,
    /// Parent directory of per-user home directories.
    pub home_prefix: String,
    /// APT sources list written for configured sources.
    pub apt_sources_path: String,
    /// Directory holding keyrings for signed APT sources.
    pub apt_keyring_dir: String,
    /// APT configuration file written for configured proxies.
    pub apt_proxy_path: String,
    /// Mode of generated APT files.
    pub apt_file_mode: u32,
    /// Directory created in a scratch state to seed owned cache mounts.
    pub cache_mount_source_dir: String,
    /// Mode of the cache mount seed directory.
    pub cache_mount_mode: u32,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            local_lib_prefix: "/opt/lib".to_string(),
            home_prefix: "/home".to_string(),
            apt_sources_path: "/etc/apt/sources.list.d/99blubber.list".to_string(),
            apt_keyring_dir: "/etc/apt/keyrings".to_string(),
            apt_proxy_path: "/etc/apt/apt.conf.d/99blubber-proxies".to_string(),
            apt_file_mode: 0o644,
            cache_mount_source_dir: "/cache".to_string(),
            cache_mount_mode: 0o755,
        }
    }
}

impl Layout {
    /// Home directory for the given account name.
    pub fn home_dir(&self, name: &str) -> String {
        if name == "root" {
            return "/root".to_string();
        }
        format!("{}/{}", self.home_prefix.trim_end_matches('/'), name)
    }

    /// Path below the shared library directory.
    pub fn lib_path(&self, relative: &str) -> String {
        format!("{}/{}", self.local_lib_prefix.trim_end_matches('/'), relative)
    }
}

/// Default accounts applied to the root of every configuration document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserDefaults {
    pub lives_as: String,
    pub lives_uid: u32,
    pub lives_gid: u32,
    pub lives_in: String,
    pub runs_as: String,
    pub runs_uid: u32,
    pub runs_gid: u32,
}

impl Default for UserDefaults {
    fn default() -> Self {
        Self {
            lives_as: "somebody".to_string(),
            lives_uid: 65533,
            lives_gid: 65533,
            lives_in: "/srv/app".to_string(),
            runs_as: "runuser".to_string(),
            runs_uid: 900,
            runs_gid: 900,
        }
    }
}
