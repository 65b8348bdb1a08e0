//! # Terminal Output
//!
//! Controls how the `stagewright` CLI decorates its human-readable output.
//! Machine-readable output (rendered Dockerfiles, JSON) is never decorated.
//!
//! Color is decided from the `--color=never|always|auto` flag. In auto mode
//! these environment variables are honored:
//! - `NO_COLOR` disables colors when set (https://no-color.org/)
//! - `CLICOLOR=0` disables colors
//! - `CLICOLOR_FORCE=1` forces colors even when stdout is not a TTY
//! - `TERM=dumb` disables colors
//!
//! ```rust,ignore
//! use stagewright::output::{marker, Marker, OutputConfig};
//!
//! let out = OutputConfig::from_env_and_flag("auto");
//! println!("{} configuration is valid", marker(&out, Marker::Ok));
//! ```

use std::env;

use console::style;

/// Decoration settings for CLI output.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Whether colors and symbols should be used.
    pub use_color: bool,
}

impl OutputConfig {
    /// Resolves the `--color` flag value ("always", "never" or "auto")
    /// against the environment.
    pub fn from_env_and_flag(color_flag: &str) -> Self {
        let use_color = match color_flag.to_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => Self::detect_color_support(),
        };

        Self { use_color }
    }

    fn detect_color_support() -> bool {
        // presence alone disables, even when empty
        if env::var_os("NO_COLOR").is_some() {
            return false;
        }

        if env::var("CLICOLOR").is_ok_and(|v| v == "0") {
            return false;
        }

        if env::var("CLICOLOR_FORCE").is_ok_and(|v| v != "0" && !v.is_empty()) {
            return true;
        }

        if env::var("TERM").is_ok_and(|v| v == "dumb") {
            return false;
        }

        console::Term::stdout().features().colors_supported()
    }

    #[cfg(test)]
    pub fn with_color() -> Self {
        Self { use_color: true }
    }

    #[cfg(test)]
    pub fn without_color() -> Self {
        Self { use_color: false }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::from_env_and_flag("auto")
    }
}

/// Kinds of status line prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Ok,
    Error,
    Warning,
    Info,
}

/// Returns the prefix for a status line: a colored symbol when colors are
/// enabled, a bracketed plain-text tag otherwise.
pub fn marker(config: &OutputConfig, kind: Marker) -> String {
    if !config.use_color {
        let plain = match kind {
            Marker::Ok => "[OK]",
            Marker::Error => "[ERR]",
            Marker::Warning => "[WARN]",
            Marker::Info => "[INFO]",
        };
        return plain.to_string();
    }

    let styled = match kind {
        Marker::Ok => style("✔").green(),
        Marker::Error => style("✘").red(),
        Marker::Warning => style("!").yellow(),
        Marker::Info => style("i").cyan(),
    };
    styled.bold().force_styling(true).to_string()
}

/// Highlights a field path or variant name.
pub fn highlight(config: &OutputConfig, text: &str) -> String {
    if config.use_color {
        style(text).bold().force_styling(true).to_string()
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_color_always() {
        assert!(OutputConfig::from_env_and_flag("always").use_color);
        assert!(OutputConfig::from_env_and_flag("ALWAYS").use_color);
    }

    #[test]
    fn test_color_never() {
        assert!(!OutputConfig::from_env_and_flag("never").use_color);
    }

    #[test]
    #[serial]
    fn test_auto_respects_no_color() {
        env::set_var("NO_COLOR", "");
        env::set_var("CLICOLOR_FORCE", "1");
        let auto = OutputConfig::from_env_and_flag("auto");
        let always = OutputConfig::from_env_and_flag("always");
        env::remove_var("NO_COLOR");
        env::remove_var("CLICOLOR_FORCE");

        assert!(!auto.use_color);
        assert!(always.use_color);
    }

    #[test]
    #[serial]
    fn test_auto_respects_clicolor_force() {
        env::remove_var("NO_COLOR");
        env::remove_var("CLICOLOR");
        env::set_var("CLICOLOR_FORCE", "1");
        let auto = OutputConfig::from_env_and_flag("auto");
        env::remove_var("CLICOLOR_FORCE");

        assert!(auto.use_color);
    }

    #[test]
    fn test_marker_without_color() {
        let out = OutputConfig::without_color();
        assert_eq!(marker(&out, Marker::Ok), "[OK]");
        assert_eq!(marker(&out, Marker::Error), "[ERR]");
        assert_eq!(marker(&out, Marker::Warning), "[WARN]");
        assert_eq!(highlight(&out, "variants.build"), "variants.build");
    }

    #[test]
    fn test_marker_with_color() {
        let out = OutputConfig::with_color();
        let ok = marker(&out, Marker::Ok);
        assert!(ok.contains('✔'));
        assert!(ok.contains("\u{1b}["));
        assert!(highlight(&out, "build").contains("build"));
    }
}
