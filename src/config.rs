//! Viewer configuration: an INI-style key file with a `[Settings]` section
//! and a `[Dictionaries]` section of `name=path` lines.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::dictionary::OpenOptions;
use crate::error::{Result, StardictError};
use crate::registry::Registry;

pub const CONFIG_ENV: &str = "SDTUI_CONFIG";
const CONFIG_DIR: &str = "sdtui";
const CONFIG_FILE: &str = "sdtui.conf";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerSettings {
    /// Lift a fresh search result about a third of the way down the view.
    pub center_search: bool,
    pub collation: bool,
    pub strict_synonym_targets: bool,
    /// Loader threads; all cores when unset.
    pub load_threads: Option<usize>,
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            center_search: true,
            collation: true,
            strict_synonym_targets: false,
            load_threads: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictionaryEntry {
    pub name: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// File the configuration was read from, if any.
    pub source: Option<PathBuf>,
    pub settings: ViewerSettings,
    pub dictionaries: Vec<DictionaryEntry>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Settings,
    Dictionaries,
    Unknown,
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

impl Config {
    /// Parse key-file text. Relative dictionary paths are resolved against
    /// `base`.
    pub fn parse(text: &str, base: &Path) -> Result<Self> {
        let mut config = Config::default();
        let mut section = Section::None;

        for (n, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                section = match name.trim() {
                    "Settings" => Section::Settings,
                    "Dictionaries" => Section::Dictionaries,
                    other => {
                        warn!("line {}: unknown section [{}]", n + 1, other);
                        Section::Unknown
                    }
                };
                continue;
            }

            let (key, value) = line.split_once('=').ok_or_else(|| {
                StardictError::InvalidData(format!("line {}: expected key=value", n + 1))
            })?;
            let (key, value) = (key.trim(), value.trim());

            match section {
                Section::Settings => config.apply_setting(n + 1, key, value)?,
                Section::Dictionaries => {
                    if value.is_empty() {
                        return Err(StardictError::InvalidData(format!(
                            "line {}: dictionary `{}' has no path",
                            n + 1,
                            key
                        )));
                    }
                    let path = Path::new(value);
                    let path = if path.is_absolute() {
                        path.to_path_buf()
                    } else {
                        base.join(path)
                    };
                    config.dictionaries.push(DictionaryEntry {
                        name: key.to_string(),
                        path,
                    });
                }
                Section::None => {
                    return Err(StardictError::InvalidData(format!(
                        "line {}: `{}' outside of any section",
                        n + 1,
                        key
                    )))
                }
                Section::Unknown => {}
            }
        }
        Ok(config)
    }

    fn apply_setting(&mut self, line: usize, key: &str, value: &str) -> Result<()> {
        let bad = || {
            StardictError::InvalidData(format!("line {}: bad value for {}: `{}'", line, key, value))
        };
        let s = &mut self.settings;
        match key {
            "center-search" => s.center_search = parse_bool(value).ok_or_else(bad)?,
            "collation" => s.collation = parse_bool(value).ok_or_else(bad)?,
            "strict-synonyms" => s.strict_synonym_targets = parse_bool(value).ok_or_else(bad)?,
            "load-threads" => {
                let n: usize = value.parse().map_err(|_| bad())?;
                s.load_threads = (n > 0).then_some(n);
            }
            _ => warn!("line {}: unknown setting `{}'", line, key),
        }
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| StardictError::from(e).in_file(path))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let mut config = Self::parse(&text, base).map_err(|e| e.in_file(path))?;
        config.source = Some(path.to_path_buf());
        debug!(
            "read {}: {} dictionaries",
            path.display(),
            config.dictionaries.len()
        );
        Ok(config)
    }

    /// Load the first configuration file found by [`search_paths`]; an
    /// empty configuration if there is none.
    pub fn discover() -> Result<Self> {
        match search_paths(|k| env::var_os(k).map(PathBuf::from))
            .into_iter()
            .find(|p| p.is_file())
        {
            Some(path) => Self::load(path),
            None => {
                debug!("no configuration file found");
                Ok(Self::default())
            }
        }
    }

    pub fn open_options(&self) -> OpenOptions {
        OpenOptions {
            collation: self.settings.collation,
            strict_synonym_targets: self.settings.strict_synonym_targets,
        }
    }

    /// An unloaded registry holding the configured dictionaries.
    pub fn registry(&self) -> Registry {
        let mut registry = Registry::new(self.open_options());
        for d in &self.dictionaries {
            registry.add(d.name.clone(), d.path.clone());
        }
        registry
    }
}

/// Candidate configuration files in priority order, given an environment
/// lookup.
pub fn search_paths<F>(var: F) -> Vec<PathBuf>
where
    F: Fn(&str) -> Option<PathBuf>,
{
    let mut paths = Vec::new();
    if let Some(explicit) = var(CONFIG_ENV) {
        paths.push(explicit);
    }
    if let Some(xdg) = var("XDG_CONFIG_HOME").filter(|p| p.is_absolute()) {
        paths.push(xdg.join(CONFIG_DIR).join(CONFIG_FILE));
    }
    if let Some(home) = var("HOME") {
        paths.push(home.join(".config").join(CONFIG_DIR).join(CONFIG_FILE));
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# viewer settings
[Settings]
center-search = false
strict-synonyms=1
load-threads = 3
; dictionaries in display order
[Dictionaries]
English = dicts/en.ifo
Czech=/usr/share/stardict/cs.ifo
";

    #[test]
    fn parses_sections_in_order() {
        let c = Config::parse(SAMPLE, Path::new("/home/me/.config/sdtui")).unwrap();
        assert!(!c.settings.center_search);
        assert!(c.settings.collation);
        assert!(c.settings.strict_synonym_targets);
        assert_eq!(c.settings.load_threads, Some(3));
        assert_eq!(
            c.dictionaries,
            vec![
                DictionaryEntry {
                    name: "English".into(),
                    path: PathBuf::from("/home/me/.config/sdtui/dicts/en.ifo"),
                },
                DictionaryEntry {
                    name: "Czech".into(),
                    path: PathBuf::from("/usr/share/stardict/cs.ifo"),
                },
            ]
        );
        assert_eq!(
            c.open_options(),
            OpenOptions {
                collation: true,
                strict_synonym_targets: true
            }
        );
    }

    #[test]
    fn rejects_bad_values() {
        let base = Path::new("/");
        assert!(Config::parse("[Settings]\ncollation=maybe\n", base).is_err());
        assert!(Config::parse("[Settings]\nload-threads=-1\n", base).is_err());
        assert!(Config::parse("orphan=1\n", base).is_err());
        assert!(Config::parse("[Dictionaries]\nnothing\n", base).is_err());
        assert!(Config::parse("[Dictionaries]\nempty=\n", base).is_err());
        // unknown sections and keys are tolerated
        let c = Config::parse("[Colors]\nfg=red\n[Settings]\nfoo=bar\n", base).unwrap();
        assert_eq!(c.settings, ViewerSettings::default());
    }

    #[test]
    fn search_order() {
        let env = |k: &str| match k {
            "SDTUI_CONFIG" => Some(PathBuf::from("/tmp/x.conf")),
            "XDG_CONFIG_HOME" => Some(PathBuf::from("/xdg")),
            "HOME" => Some(PathBuf::from("/home/me")),
            _ => None,
        };
        assert_eq!(
            search_paths(env),
            vec![
                PathBuf::from("/tmp/x.conf"),
                PathBuf::from("/xdg/sdtui/sdtui.conf"),
                PathBuf::from("/home/me/.config/sdtui/sdtui.conf"),
            ]
        );
        assert!(search_paths(|_| None).is_empty());
    }

    #[test]
    fn load_records_source_and_builds_registry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sdtui.conf");
        fs::write(&path, "[Dictionaries]\nlocal=words.ifo\n").unwrap();

        let c = Config::load(&path).unwrap();
        assert_eq!(c.source.as_deref(), Some(path.as_path()));
        assert_eq!(c.dictionaries[0].path, dir.path().join("words.ifo"));

        let reg = c.registry();
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.slots()[0].display_name, "local");
        assert!(reg.slots()[0].handle.is_none());

        let missing = Config::load(dir.path().join("nope.conf")).unwrap_err();
        assert!(matches!(missing, StardictError::FileNotFound(_)));
    }
}
