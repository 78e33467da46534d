//! Path spelling used by `FileManager`.

/// Turn every `\` into `/`.
#[must_use]
pub fn fixup_separators(path: &str) -> String {
    path.replace('\\', "/")
}

/// Redirects relative paths into the per-user configuration directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathResolver {
    config_dir: String,
}

impl PathResolver {
    /// `config_dir` is used as a prefix as is; a missing trailing `/` is added.
    #[must_use]
    pub fn new(config_dir: &str) -> Self {
        let mut config_dir = fixup_separators(config_dir);
        if !config_dir.ends_with('/') {
            config_dir.push('/');
        }
        Self { config_dir }
    }

    #[must_use]
    pub fn config_dir(&self) -> &str {
        &self.config_dir
    }

    /// The configuration-directory spelling of `path`, or `None` for
    /// absolute paths, which are never rewritten.
    #[must_use]
    pub fn rewrite_to_config(&self, path: &str) -> Option<String> {
        if path.starts_with('/') {
            return None;
        }
        Some(format!("{}{path}", self.config_dir))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backslashes_become_slashes() {
        assert_eq!(fixup_separators(r"Save\Slot1.usa"), "Save/Slot1.usa");
        assert_eq!(fixup_separators("/abs/path"), "/abs/path");
        assert_eq!(fixup_separators(""), "");
    }

    #[test]
    fn relative_paths_move_into_config_dir() {
        let resolver = PathResolver::new("/home/u/.config/game/System");
        assert_eq!(resolver.config_dir(), "/home/u/.config/game/System/");
        assert_eq!(
            resolver.rewrite_to_config("User.ini"),
            Some("/home/u/.config/game/System/User.ini".to_string())
        );
        assert_eq!(
            resolver.rewrite_to_config("../Maps/a.map"),
            Some("/home/u/.config/game/System/../Maps/a.map".to_string())
        );
    }

    #[test]
    fn absolute_paths_are_kept() {
        let resolver = PathResolver::new("/cfg/");
        assert_eq!(resolver.rewrite_to_config("/etc/game.ini"), None);
    }
}
