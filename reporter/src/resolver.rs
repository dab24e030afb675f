//! Maps local test outcomes to external test-case identifiers.
//!
//! An annotation carried by the outcome wins over the static name table.
//! Lookups are exact and case-sensitive.

use crate::config::{ConfigError, ConfigResult, ReporterConfig};
use regex::Regex;
use run_client::{ExternalId, TestOutcome};
use std::collections::BTreeMap;

const ID_PATTERN: &str = r"[A-Za-z0-9][A-Za-z0-9_.:-]*";

/// Static local-test-name → external id table. Read-only once built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentifierMap {
    entries: BTreeMap<String, ExternalId>,
}

impl IdentifierMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, external_id: impl Into<String>) {
        self.entries
            .insert(name.into(), ExternalId::new(external_id.into()));
    }

    pub fn get(&self, name: &str) -> Option<&ExternalId> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for IdentifierMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (name, id) in iter {
            map.insert(name, id);
        }
        map
    }
}

/// Where an outcome's external id came from, if anywhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Annotated(ExternalId),
    Mapped(ExternalId),
    Unresolved,
}

impl Resolution {
    pub fn external_id(&self) -> Option<&ExternalId> {
        match self {
            Resolution::Annotated(id) | Resolution::Mapped(id) => Some(id),
            Resolution::Unresolved => None,
        }
    }

    pub fn into_external_id(self) -> Option<ExternalId> {
        match self {
            Resolution::Annotated(id) | Resolution::Mapped(id) => Some(id),
            Resolution::Unresolved => None,
        }
    }

    pub fn origin(&self) -> &'static str {
        match self {
            Resolution::Annotated(_) => "annotation",
            Resolution::Mapped(_) => "identifier map",
            Resolution::Unresolved => "none",
        }
    }
}

#[derive(Debug, Clone)]
pub struct IdentifierResolver {
    map: IdentifierMap,
    tag: Regex,
    bare: Regex,
}

impl IdentifierResolver {
    /// `annotation_key` names bracketed tags such as `[testinyId=TC-40]`.
    pub fn new(map: IdentifierMap, annotation_key: &str) -> Result<Self, regex::Error> {
        let tag = Regex::new(&format!(
            r"\[\s*{}\s*=\s*({})\s*\]",
            regex::escape(annotation_key),
            ID_PATTERN
        ))?;
        let bare = Regex::new(&format!("^{}$", ID_PATTERN))?;
        Ok(Self { map, tag, bare })
    }

    pub fn from_config(config: &ReporterConfig) -> ConfigResult<Self> {
        Self::new(config.identifier_map(), &config.annotation_key).map_err(|e| {
            ConfigError::Invalid {
                message: format!("annotation_key '{}': {}", config.annotation_key, e),
            }
        })
    }

    pub fn map(&self) -> &IdentifierMap {
        &self.map
    }

    /// Extracts an external id from annotation text.
    ///
    /// Accepts a bracketed tag anywhere in the text, or text that is a single
    /// identifier token as a whole.
    pub fn parse_annotation(&self, annotation: &str) -> Option<ExternalId> {
        if let Some(captures) = self.tag.captures(annotation) {
            return captures.get(1).map(|m| ExternalId::new(m.as_str()));
        }

        let trimmed = annotation.trim();
        self.bare
            .is_match(trimmed)
            .then(|| ExternalId::new(trimmed))
    }

    pub fn resolve(&self, outcome: &TestOutcome) -> Resolution {
        if let Some(id) = outcome
            .annotation
            .as_deref()
            .and_then(|a| self.parse_annotation(a))
        {
            return Resolution::Annotated(id);
        }

        match self.map.get(&outcome.name) {
            Some(id) => Resolution::Mapped(id.clone()),
            None => Resolution::Unresolved,
        }
    }
}
