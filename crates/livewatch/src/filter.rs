//! Decides whether a changed path should reload connected browsers.

use crate::config::Config;
use crate::error::ConfigError;
use regex::Regex;
use std::borrow::Cow;
use std::path::Path;

/// Ordered set of exclusion patterns.
///
/// Patterns are regular expressions matched anywhere in the path, with `\`
/// separators normalized to `/` so the same pattern works on every platform.
#[derive(Debug, Clone)]
pub struct ExclusionSet {
    patterns: Vec<Regex>,
}

impl ExclusionSet {
    /// Compile patterns, preserving their order.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPattern`] for the first pattern that
    /// fails to compile.
    pub fn new<'a>(patterns: impl IntoIterator<Item = &'a str>) -> Result<Self, ConfigError> {
        let patterns = patterns
            .into_iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
                    pattern: pattern.to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { patterns })
    }

    /// Check whether any pattern matches `path`.
    pub fn is_excluded(&self, path: &Path) -> bool {
        if self.patterns.is_empty() {
            return false;
        }

        let path = normalize_separators(path);
        self.patterns.iter().any(|re| re.is_match(&path))
    }

    /// Pattern sources, in match order.
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(Regex::as_str)
    }

    /// Number of patterns.
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Check if there are no patterns.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

fn normalize_separators(path: &Path) -> Cow<'_, str> {
    let path = path.to_string_lossy();
    if std::path::MAIN_SEPARATOR == '\\' && path.contains('\\') {
        Cow::Owned(path.replace('\\', "/"))
    } else {
        path
    }
}

/// Check whether a change to `path` should reload clients.
///
/// Excluded paths never reload. Otherwise the path qualifies when its
/// extension (without the dot) is a watched extension, or when its basename is
/// listed in `files_to_reload`. Full paths are never compared against
/// `files_to_reload`.
pub fn should_reload(path: &Path, config: &Config) -> bool {
    if config.exclusions.is_excluded(path) {
        return false;
    }

    let Some(name) = path.file_name().map(|name| name.to_string_lossy()) else {
        return false;
    };

    // Text after the last dot, so ".htaccess" has extension "htaccess"
    let ext = name.rsplit_once('.').map_or("", |(_, ext)| ext);
    if !ext.is_empty() && config.exts.iter().any(|watched| watched == ext) {
        return true;
    }

    config.files_to_reload.iter().any(|file| *file == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Options;
    use std::path::PathBuf;

    fn normalized(options: Options) -> Config {
        options.normalize().unwrap()
    }

    #[test]
    fn test_watched_extension_reloads() {
        let config = normalized(Options::default());
        assert!(should_reload(Path::new("/project/index.html"), &config));
        assert!(should_reload(Path::new("/project/css/site.css"), &config));
        assert!(should_reload(Path::new("app.coffee"), &config));
        assert!(!should_reload(Path::new("/project/notes.md"), &config));
    }

    #[test]
    fn test_explicit_exts_only() {
        let config = normalized(Options {
            exts: vec!["html".to_string()],
            ..Options::default()
        });
        assert!(should_reload(Path::new("/project/index.html"), &config));
        assert!(!should_reload(Path::new("/project/site.css"), &config));
    }

    #[test]
    fn test_files_to_reload_matches_basename() {
        let config = normalized(Options {
            exts: vec!["html".to_string()],
            files_to_reload: vec!["index.html".to_string()],
            ..Options::default()
        });
        let path = PathBuf::from("/project/backup/index.html");
        assert!(should_reload(&path, &config));

        let config = normalized(Options {
            exts: vec!["css".to_string()],
            files_to_reload: vec!["Makefile".to_string()],
            ..Options::default()
        });
        assert!(should_reload(Path::new("/project/Makefile"), &config));
        assert!(!should_reload(Path::new("/project/other.bak"), &config));
    }

    #[test]
    fn test_files_to_reload_never_matches_full_path() {
        let config = normalized(Options {
            exts: vec!["css".to_string()],
            files_to_reload: vec!["/project/index.bak".to_string()],
            ..Options::default()
        });
        assert!(!should_reload(Path::new("/project/index.bak"), &config));
    }

    #[test]
    fn test_extension_is_case_sensitive() {
        let config = normalized(Options::default());
        assert!(!should_reload(Path::new("/project/INDEX.HTML"), &config));
    }

    #[test]
    fn test_no_extension() {
        let config = normalized(Options::default());
        assert!(!should_reload(Path::new("/project/Makefile"), &config));
        assert!(!should_reload(Path::new("/project/file."), &config));
    }

    #[test]
    fn test_dotfile_extension() {
        let config = normalized(Options {
            exts: vec!["htaccess".to_string()],
            ..Options::default()
        });
        assert!(should_reload(Path::new("/project/.htaccess"), &config));
        assert!(!should_reload(Path::new("/project/htaccess"), &config));
        assert!(!should_reload(Path::new("/project/.html"), &config));
    }

    #[test]
    fn test_bare_dot_name_counts_as_extension() {
        // A dotfile named after a watched extension reloads under the defaults
        let config = normalized(Options::default());
        assert!(should_reload(Path::new("/p/.css"), &config));
        assert!(should_reload(Path::new("/p/.js"), &config));
        assert!(!should_reload(Path::new("/p/.env"), &config));
        assert!(!should_reload(Path::new("/p/style."), &config));
    }

    #[test]
    fn test_extension_taken_after_last_dot() {
        let config = normalized(Options::default());
        assert!(should_reload(Path::new("/project/app.min.js"), &config));
        assert!(!should_reload(Path::new("/project/app.js.map"), &config));
    }

    #[test]
    fn test_builtin_exclusions() {
        let config = normalized(Options::default());
        assert!(!should_reload(Path::new("/project/.git/index.html"), &config));
        assert!(!should_reload(Path::new("/project/.svn/x.css"), &config));
        assert!(!should_reload(Path::new("/project/.hg/x.js"), &config));
        assert!(should_reload(Path::new("/project/git/index.html"), &config));
    }

    #[test]
    fn test_exclusion_set_order_and_matching() {
        let set = ExclusionSet::new(["node_modules/", r"\.git/"]).unwrap();
        assert_eq!(set.len(), 2);
        assert!(!set.is_empty());
        assert!(set.is_excluded(Path::new("/p/node_modules/react/index.js")));
        assert!(set.is_excluded(Path::new("/p/.git/HEAD")));
        assert!(!set.is_excluded(Path::new("/p/src/index.js")));
        assert_eq!(set.patterns().collect::<Vec<_>>(), vec!["node_modules/", r"\.git/"]);
    }

    #[test]
    fn test_empty_exclusion_set() {
        let set = ExclusionSet::new(Vec::<&str>::new()).unwrap();
        assert!(set.is_empty());
        assert!(!set.is_excluded(Path::new("/p/.git/HEAD")));
    }

    #[test]
    fn test_should_reload_is_pure() {
        let config = normalized(Options::default());
        let path = Path::new("/project/index.html");
        assert_eq!(should_reload(path, &config), should_reload(path, &config));
    }
}
