//! Analyzer registry
//!
//! Holds the custom analysis components and analyzers of one index and
//! resolves analyzer names the way the engine would: custom definitions
//! first, then the analyzers the engine ships with. The engine default is
//! exposed as an ordinary resolvable entry so callers never have to guess
//! which analyzer a field without an explicit reference ends up with.

use crate::analysis::builtin::{builtin_analyzer, default_builtin};
use crate::analysis::components::{
    is_builtin, CharFilterKind, ComponentKind, TokenFilterKind, TokenizerKind,
};
use crate::analysis::error::{ConfigError, ConfigResult};
use crate::analysis::spec::{validate_identifier, AnalyzerSpec};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Analyzer name the engine treats as the index level default
pub const INDEX_DEFAULT_ANALYZER: &str = "default";

/// Custom analysis configuration of a single index
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalyzerRegistry {
    char_filters: BTreeMap<String, CharFilterKind>,
    tokenizers: BTreeMap<String, TokenizerKind>,
    filters: BTreeMap<String, TokenFilterKind>,
    analyzers: BTreeMap<String, AnalyzerSpec>,
}

impl AnalyzerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a custom character filter
    pub fn define_char_filter(&mut self, name: impl Into<String>, kind: CharFilterKind) -> ConfigResult<()> {
        let name = name.into();
        validate_identifier(&name)?;
        kind.validate(&name)?;
        insert_component(&mut self.char_filters, ComponentKind::CharFilter, name, kind)
    }

    /// Define a custom tokenizer
    pub fn define_tokenizer(&mut self, name: impl Into<String>, kind: TokenizerKind) -> ConfigResult<()> {
        let name = name.into();
        validate_identifier(&name)?;
        kind.validate(&name)?;
        insert_component(&mut self.tokenizers, ComponentKind::Tokenizer, name, kind)
    }

    /// Define a custom token filter
    pub fn define_filter(&mut self, name: impl Into<String>, kind: TokenFilterKind) -> ConfigResult<()> {
        let name = name.into();
        validate_identifier(&name)?;
        kind.validate(&name)?;
        insert_component(&mut self.filters, ComponentKind::TokenFilter, name, kind)
    }

    /// Define a custom analyzer
    ///
    /// Every component the analyzer references must either be built into the
    /// engine or already defined in this registry.
    pub fn define(&mut self, spec: AnalyzerSpec) -> ConfigResult<()> {
        spec.validate()?;

        if self.analyzers.contains_key(&spec.identifier) {
            return Err(ConfigError::DuplicateAnalyzer(spec.identifier));
        }

        if builtin_analyzer(&spec.identifier).is_some() && !spec.override_builtin {
            return Err(ConfigError::ReservedName(spec.identifier));
        }

        for name in &spec.char_filters {
            self.check_reference(&spec.identifier, ComponentKind::CharFilter, name)?;
        }
        self.check_reference(&spec.identifier, ComponentKind::Tokenizer, &spec.tokenizer)?;
        for name in &spec.filters {
            self.check_reference(&spec.identifier, ComponentKind::TokenFilter, name)?;
        }

        debug!(analyzer = %spec.identifier, tokenizer = %spec.tokenizer, "Analyzer defined");
        self.analyzers.insert(spec.identifier.clone(), spec);
        Ok(())
    }

    fn check_reference(&self, analyzer: &str, component: ComponentKind, name: &str) -> ConfigResult<()> {
        if self.has_component(component, name) {
            Ok(())
        } else {
            Err(ConfigError::UnknownComponent {
                analyzer: analyzer.to_string(),
                component,
                name: name.to_string(),
            })
        }
    }

    /// Whether a component name is resolvable, either custom or built in
    pub fn has_component(&self, component: ComponentKind, name: &str) -> bool {
        let custom = match component {
            ComponentKind::CharFilter => self.char_filters.contains_key(name),
            ComponentKind::Tokenizer => self.tokenizers.contains_key(name),
            ComponentKind::TokenFilter => self.filters.contains_key(name),
            ComponentKind::Analyzer => self.analyzers.contains_key(name),
        };
        custom || is_builtin(component, name)
    }

    /// Resolve an analyzer by name: custom definitions shadow built-ins
    pub fn resolve(&self, identifier: &str) -> ConfigResult<&AnalyzerSpec> {
        self.analyzers
            .get(identifier)
            .or_else(|| builtin_analyzer(identifier))
            .ok_or_else(|| ConfigError::AnalyzerNotFound(identifier.to_string()))
    }

    /// The analyzer analyzed fields without an explicit reference end up with
    pub fn default_analyzer(&self) -> &AnalyzerSpec {
        self.analyzers
            .get(INDEX_DEFAULT_ANALYZER)
            .unwrap_or_else(|| default_builtin())
    }

    /// Effective analyzer for an optional explicit reference
    pub fn effective_analyzer(&self, identifier: Option<&str>) -> ConfigResult<&AnalyzerSpec> {
        match identifier {
            Some(identifier) => self.resolve(identifier),
            None => Ok(self.default_analyzer()),
        }
    }

    pub fn custom_analyzers(&self) -> impl Iterator<Item = &AnalyzerSpec> {
        self.analyzers.values()
    }

    pub fn char_filter(&self, name: &str) -> Option<&CharFilterKind> {
        self.char_filters.get(name)
    }

    pub fn tokenizer(&self, name: &str) -> Option<&TokenizerKind> {
        self.tokenizers.get(name)
    }

    pub fn filter(&self, name: &str) -> Option<&TokenFilterKind> {
        self.filters.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.char_filters.is_empty()
            && self.tokenizers.is_empty()
            && self.filters.is_empty()
            && self.analyzers.is_empty()
    }

    /// The `analysis` section of index settings, omitting empty sections
    pub fn settings_body(&self) -> Value {
        let mut analysis = Map::new();

        if !self.char_filters.is_empty() {
            analysis.insert(
                ComponentKind::CharFilter.settings_key().to_string(),
                json!(self.char_filters),
            );
        }
        if !self.tokenizers.is_empty() {
            analysis.insert(
                ComponentKind::Tokenizer.settings_key().to_string(),
                json!(self.tokenizers),
            );
        }
        if !self.filters.is_empty() {
            analysis.insert(
                ComponentKind::TokenFilter.settings_key().to_string(),
                json!(self.filters),
            );
        }
        if !self.analyzers.is_empty() {
            let analyzers: Map<String, Value> = self
                .analyzers
                .iter()
                .map(|(name, spec)| (name.clone(), spec.to_settings_body()))
                .collect();
            analysis.insert(
                ComponentKind::Analyzer.settings_key().to_string(),
                Value::Object(analyzers),
            );
        }

        json!({ "analysis": analysis })
    }

    /// Rebuild a registry from the `analysis` section the engine reports
    ///
    /// Live state is taken as is: references are not re-checked, and
    /// component definitions this crate does not model are skipped.
    pub fn from_settings(analysis: &Value) -> ConfigResult<Self> {
        let mut registry = Self::new();

        registry.char_filters = decode_section(analysis, ComponentKind::CharFilter);
        registry.tokenizers = decode_section(analysis, ComponentKind::Tokenizer);
        registry.filters = decode_section(analysis, ComponentKind::TokenFilter);

        if let Some(analyzers) = analysis
            .get(ComponentKind::Analyzer.settings_key())
            .and_then(Value::as_object)
        {
            for (name, body) in analyzers {
                let spec = AnalyzerSpec::from_settings_body(name, body)?;
                registry.analyzers.insert(name.clone(), spec);
            }
        }

        Ok(registry)
    }
}

fn insert_component<T>(
    section: &mut BTreeMap<String, T>,
    component: ComponentKind,
    name: String,
    kind: T,
) -> ConfigResult<()> {
    if section.contains_key(&name) {
        return Err(ConfigError::DuplicateComponent { component, name });
    }
    section.insert(name, kind);
    Ok(())
}

fn decode_section<T: DeserializeOwned>(analysis: &Value, component: ComponentKind) -> BTreeMap<String, T> {
    let Some(section) = analysis.get(component.settings_key()).and_then(Value::as_object) else {
        return BTreeMap::new();
    };

    section
        .iter()
        .filter_map(|(name, body)| match serde_json::from_value::<T>(body.clone()) {
            Ok(kind) => Some((name.clone(), kind)),
            Err(e) => {
                warn!(component = %component, name = %name, error = %e, "Skipping unrecognised analysis component");
                None
            }
        })
        .collect()
}
