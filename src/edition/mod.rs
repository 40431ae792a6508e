//! Per-edition configuration and callbacks, compiled once at load time.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::Path;

use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use crate::error::ConfigError;
use crate::formula::{self, Expr};

mod fr;
mod hooks;
mod sv;
mod zh;

pub use hooks::{find_all, hooks_named, DefaultHooks, EditionHooks, Fallback, FallbackContext, PageCalls};

/// Prefix of the shadow rule consulted in variant mode.
pub const VARIANT_PREFIX: &str = "__variant__";

const BUNDLED: &[(&str, &str)] = &[
    ("fr", include_str!("../../editions/fr.yaml")),
    ("sv", include_str!("../../editions/sv.yaml")),
    ("zh", include_str!("../../editions/zh.yaml")),
];

// === Edition YAML structure ===

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EditionConfig {
    pub locale: String,
    /// Name of the registered [`EditionHooks`]; `default` when absent.
    pub hooks: Option<String>,

    pub head_sections: Vec<String>,
    pub etymology_sections: Vec<String>,
    pub sections: Vec<String>,
    /// Heading depths at which `sections` apply. Empty means any depth.
    pub section_levels: Vec<usize>,
    /// Characters that may form a definition bullet run.
    pub bullets: String,
    pub top_label: Option<String>,

    pub variant_titles: Vec<String>,
    pub variant_templates: Vec<String>,

    pub templates_ignored: Vec<String>,
    pub templates_italic: BTreeMap<String, String>,
    pub templates_other: BTreeMap<String, String>,
    pub templates_alias: BTreeMap<String, String>,
    pub templates_multi: BTreeMap<String, String>,

    pub definitions_to_ignore: Vec<String>,
    pub pos_patterns: Vec<String>,
    pub pos_merge: BTreeMap<String, String>,

    pub langs: BTreeMap<String, String>,
    pub labels: BTreeMap<String, String>,
    pub link_namespaces_ignored: Vec<String>,

    pub pronunciation_pattern: Option<String>,
    pub pronunciation_format: Option<String>,
    pub gender_pattern: Option<String>,
}

/// A loaded edition: configuration, compiled formulas and patterns, hooks.
pub struct Edition {
    pub config: EditionConfig,
    ignored: HashSet<String>,
    multi: HashMap<String, Expr>,
    pos_patterns: Vec<Regex>,
    pronunciation: Option<Regex>,
    gender: Option<Regex>,
    hooks: Box<dyn EditionHooks>,
}

impl fmt::Debug for Edition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Edition")
            .field("locale", &self.config.locale)
            .field("hooks", &self.hooks.name())
            .field("formulas", &self.multi.len())
            .finish()
    }
}

fn compile_pattern(field: &'static str, pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|source| ConfigError::Pattern {
        field,
        pattern: pattern.to_string(),
        source,
    })
}

impl Edition {
    /// Load a bundled edition by locale code, or an edition YAML file by path.
    pub fn load(locale_or_path: &str) -> Result<Self, ConfigError> {
        let path = Path::new(locale_or_path);
        if path.extension().is_some_and(|ext| ext == "yaml" || ext == "yml") {
            Self::from_path(path)
        } else {
            Self::bundled(locale_or_path)
        }
    }

    pub fn bundled(locale: &str) -> Result<Self, ConfigError> {
        let source = BUNDLED
            .iter()
            .find(|(code, _)| *code == locale)
            .map(|(_, source)| *source)
            .ok_or_else(|| ConfigError::UnknownEdition(locale.to_string()))?;
        Self::from_yaml(source)
    }

    /// Locale codes of the editions compiled into the crate.
    pub fn bundled_locales() -> impl Iterator<Item = &'static str> {
        BUNDLED.iter().map(|(code, _)| *code)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let source = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&source)
    }

    pub fn from_yaml(source: &str) -> Result<Self, ConfigError> {
        let config: EditionConfig = serde_yaml::from_str(source)?;
        Self::from_config(config)
    }

    pub fn from_config(mut config: EditionConfig) -> Result<Self, ConfigError> {
        let hooks = hooks_named(config.hooks.as_deref().unwrap_or("default"))?;

        let mut multi = HashMap::with_capacity(config.templates_multi.len());
        for (name, source) in &config.templates_multi {
            multi.insert(name.clone(), formula::compile(name, source)?);
        }

        let pos_patterns = config
            .pos_patterns
            .iter()
            .map(|p| compile_pattern("pos_patterns", p))
            .collect::<Result<Vec<_>, _>>()?;
        let pronunciation = config
            .pronunciation_pattern
            .as_deref()
            .map(|p| compile_pattern("pronunciation_pattern", p))
            .transpose()?;
        let gender = config
            .gender_pattern
            .as_deref()
            .map(|p| compile_pattern("gender_pattern", p))
            .transpose()?;

        if config.bullets.is_empty() {
            config.bullets = "#".to_string();
        }
        let ignored = config.templates_ignored.iter().cloned().collect();

        debug!(
            locale = %config.locale,
            hooks = hooks.name(),
            formulas = multi.len(),
            "edition loaded"
        );

        Ok(Edition {
            config,
            ignored,
            multi,
            pos_patterns,
            pronunciation,
            gender,
            hooks,
        })
    }

    pub fn locale(&self) -> &str {
        &self.config.locale
    }

    pub fn hooks(&self) -> &dyn EditionHooks {
        self.hooks.as_ref()
    }

    pub fn is_ignored(&self, name: &str) -> bool {
        self.ignored.contains(name)
    }

    pub fn alias(&self, name: &str) -> Option<&str> {
        self.config.templates_alias.get(name).map(String::as_str)
    }

    pub fn italic(&self, name: &str) -> Option<&str> {
        self.config.templates_italic.get(name).map(String::as_str)
    }

    pub fn other(&self, name: &str) -> Option<&str> {
        self.config.templates_other.get(name).map(String::as_str)
    }

    pub fn formula(&self, name: &str) -> Option<&Expr> {
        self.multi.get(name)
    }

    /// True when `name` has a variant-mode rule, either a formula or a hook arm.
    pub fn has_shadow(&self, name: &str) -> bool {
        let shadow = format!("{VARIANT_PREFIX}{name}");
        self.multi.contains_key(&shadow) || self.hooks.handles(&shadow)
    }

    pub fn lang_name(&self, code: &str) -> Option<&str> {
        self.config.langs.get(code).map(String::as_str)
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.config.labels.get(key).map(String::as_str)
    }

    pub fn is_bullet(&self, c: char) -> bool {
        self.config.bullets.contains(c)
    }

    /// Namespaces whose links render empty, on top of the universal ones.
    pub fn ignores_namespace(&self, namespace: &str) -> bool {
        ["category", "file", "image"]
            .iter()
            .any(|ns| namespace.eq_ignore_ascii_case(ns))
            || self
                .config
                .link_namespaces_ignored
                .iter()
                .any(|ns| ns.to_lowercase() == namespace.to_lowercase())
    }

    /// Part-of-speech label for a section heading title.
    pub fn pos_label(&self, title: &str) -> String {
        let mut label = title.trim().to_lowercase();
        for pattern in &self.pos_patterns {
            label = pattern.replace_all(&label, "$1").into_owned();
        }
        self.merge_label(label.trim())
    }

    pub fn merge_label(&self, label: &str) -> String {
        self.config
            .pos_merge
            .get(label)
            .cloned()
            .unwrap_or_else(|| label.to_string())
    }

    pub fn pronunciation_pattern(&self) -> Option<&Regex> {
        self.pronunciation.as_ref()
    }

    pub fn gender_pattern(&self) -> Option<&Regex> {
        self.gender.as_ref()
    }

    pub fn normalize(&self, text: &str) -> String {
        self.hooks.normalize(text, self)
    }

    pub fn pronunciations(&self, text: &str) -> Vec<String> {
        self.hooks.extract_pronunciations(text, self)
    }

    pub fn genders(&self, text: &str) -> Vec<String> {
        self.hooks.extract_genders(text, self)
    }
}
