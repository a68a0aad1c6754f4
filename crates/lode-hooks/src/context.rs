//! Hook context validation
//!
//! The host supplies a frozen property set per call phase. Any deviation
//! from the documented key sets is a compatibility anomaly: it means the
//! host's protocol has changed underneath the pipeline, and it must be
//! surfaced distinctly instead of silently ignored.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

/// Documented resolve-phase keys
pub const RESOLVE_KEYS: [&str; 3] = ["conditions", "importAssertions", "parentURL"];
/// Documented load-phase keys
pub const LOAD_KEYS: [&str; 2] = ["format", "importAssertions"];

/// Which hook phase a context belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Resolve,
    Load,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Resolve => f.write_str("resolve"),
            Phase::Load => f.write_str("load"),
        }
    }
}

/// A context object exactly as observed from the host: the raw key/value
/// set, before any interpretation
#[derive(Debug, Clone, Default)]
pub struct RawContext {
    pub entries: BTreeMap<String, Value>,
}

impl RawContext {
    /// A well-formed resolve-phase context
    pub fn resolve(
        conditions: &[&str],
        assertions: &[(&str, &str)],
        parent_url: Option<&str>,
    ) -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(
            "conditions".to_string(),
            Value::Array(conditions.iter().map(|c| Value::String(c.to_string())).collect()),
        );
        entries.insert(
            "importAssertions".to_string(),
            Value::Object(
                assertions
                    .iter()
                    .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
                    .collect(),
            ),
        );
        entries.insert(
            "parentURL".to_string(),
            parent_url.map(|p| Value::String(p.to_string())).unwrap_or(Value::Null),
        );
        Self { entries }
    }

    /// A well-formed load-phase context
    pub fn load(format: Option<&str>, assertions: &[(&str, &str)]) -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(
            "format".to_string(),
            format.map(|f| Value::String(f.to_string())).unwrap_or(Value::Null),
        );
        entries.insert(
            "importAssertions".to_string(),
            Value::Object(
                assertions
                    .iter()
                    .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
                    .collect(),
            ),
        );
        Self { entries }
    }

    fn key_set(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }
}

/// A context whose key set deviates from the documented contract
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextAnomaly {
    pub phase: Phase,
    pub missing: Vec<String>,
    pub unexpected: Vec<String>,
}

impl fmt::Display for ContextAnomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} context deviates from the documented key set (missing: [{}], unexpected: [{}])",
            self.phase,
            self.missing.join(", "),
            self.unexpected.join(", ")
        )
    }
}

/// Compare an observed context's key set against the documented set for its
/// phase
pub fn validate(context: &RawContext, phase: Phase) -> Option<ContextAnomaly> {
    let documented: &[&str] = match phase {
        Phase::Resolve => &RESOLVE_KEYS,
        Phase::Load => &LOAD_KEYS,
    };
    let observed = context.key_set();

    let missing: Vec<String> = documented
        .iter()
        .filter(|k| !observed.contains(k))
        .map(|k| k.to_string())
        .collect();
    let unexpected: Vec<String> = observed
        .iter()
        .filter(|k| !documented.contains(k))
        .map(|k| k.to_string())
        .collect();

    if missing.is_empty() && unexpected.is_empty() {
        None
    } else {
        Some(ContextAnomaly {
            phase,
            missing,
            unexpected,
        })
    }
}

/// Typed resolve-phase context, extracted best-effort from the raw form
#[derive(Debug, Clone, Default)]
pub struct ResolveContext {
    pub conditions: Vec<String>,
    pub import_assertions: BTreeMap<String, String>,
    pub parent_url: Option<String>,
}

impl ResolveContext {
    pub fn from_raw(raw: &RawContext) -> Self {
        let conditions = match raw.entries.get("conditions") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        };
        let import_assertions = extract_assertions(raw);
        let parent_url = raw
            .entries
            .get("parentURL")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        Self {
            conditions,
            import_assertions,
            parent_url,
        }
    }
}

/// Typed load-phase context
#[derive(Debug, Clone, Default)]
pub struct LoadContext {
    pub format: Option<String>,
    pub import_assertions: BTreeMap<String, String>,
}

impl LoadContext {
    pub fn from_raw(raw: &RawContext) -> Self {
        let format = raw
            .entries
            .get("format")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        Self {
            format,
            import_assertions: extract_assertions(raw),
        }
    }
}

fn extract_assertions(raw: &RawContext) -> BTreeMap<String, String> {
    match raw.entries.get("importAssertions") {
        Some(Value::Object(map)) => map
            .iter()
            .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
            .collect(),
        _ => BTreeMap::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_documented_contexts_validate_clean() {
        let ctx = RawContext::resolve(&["node", "import"], &[], Some("file:///main.ts"));
        assert!(validate(&ctx, Phase::Resolve).is_none());

        let ctx = RawContext::load(Some("module"), &[("type", "json")]);
        assert!(validate(&ctx, Phase::Load).is_none());
    }

    #[test]
    fn test_extra_key_is_anomalous() {
        let mut ctx = RawContext::resolve(&[], &[], None);
        ctx.entries
            .insert("importAttributes".to_string(), Value::Null);

        let anomaly = validate(&ctx, Phase::Resolve).unwrap();
        assert_eq!(anomaly.unexpected, vec!["importAttributes"]);
        assert!(anomaly.missing.is_empty());
    }

    #[test]
    fn test_missing_key_is_anomalous() {
        let mut ctx = RawContext::load(None, &[]);
        ctx.entries.remove("format");

        let anomaly = validate(&ctx, Phase::Load).unwrap();
        assert_eq!(anomaly.missing, vec!["format"]);
    }

    #[test]
    fn test_typed_extraction() {
        let ctx = RawContext::resolve(&["import"], &[("type", "json")], Some("file:///a.ts"));
        let typed = ResolveContext::from_raw(&ctx);
        assert_eq!(typed.conditions, vec!["import"]);
        assert_eq!(typed.import_assertions.get("type").unwrap(), "json");
        assert_eq!(typed.parent_url.as_deref(), Some("file:///a.ts"));

        // Entry modules carry a null parentURL.
        let entry = RawContext::resolve(&[], &[], None);
        assert!(ResolveContext::from_raw(&entry).parent_url.is_none());
    }
}
