use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{FlowError, Result};

/// Free-form passage metadata, also used as an equality filter for searches.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Internal component identifier, unique within its workflow and never reused.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentId(pub u64);

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The closed set of node kinds a workflow can contain.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    UserQuery,
    Knowledgebase,
    LlmEngine,
    Output,
}

impl ComponentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentKind::UserQuery => "user_query",
            ComponentKind::Knowledgebase => "knowledgebase",
            ComponentKind::LlmEngine => "llm_engine",
            ComponentKind::Output => "output",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComponentKind {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "user_query" => Ok(ComponentKind::UserQuery),
            "knowledgebase" => Ok(ComponentKind::Knowledgebase),
            "llm_engine" => Ok(ComponentKind::LlmEngine),
            "output" => Ok(ComponentKind::Output),
            other => Err(FlowError::UnknownComponentKind(other.to_string())),
        }
    }
}

/// Retrieval settings for a `knowledgebase` component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgebaseConfig {
    #[serde(default = "default_embedding_provider")]
    pub embedding_provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
    #[serde(default = "default_collection_name")]
    pub collection_name: String,
    #[serde(default = "default_n_results")]
    pub n_results: usize,
}

impl Default for KnowledgebaseConfig {
    fn default() -> Self {
        Self {
            embedding_provider: default_embedding_provider(),
            embedding_model: None,
            collection_name: default_collection_name(),
            n_results: default_n_results(),
        }
    }
}

fn default_embedding_provider() -> String { "openai".to_string() }
fn default_collection_name() -> String { "documents".to_string() }
fn default_n_results() -> usize { 5 }

/// Generation settings for an `llm_engine` component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmEngineConfig {
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    /// Model name; the provider's default when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub use_web_search: bool,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for LlmEngineConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: None,
            system_prompt: None,
            use_web_search: false,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_llm_provider() -> String { "openai".to_string() }
fn default_temperature() -> f32 { 0.7 }
fn default_max_tokens() -> u32 { 1000 }

/// A component's kind together with its typed configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentSpec {
    UserQuery,
    Knowledgebase(KnowledgebaseConfig),
    LlmEngine(LlmEngineConfig),
    Output,
}

impl ComponentSpec {
    /// Parse an untyped kind tag and configuration object.
    ///
    /// A missing or `null` configuration yields the kind's defaults. Keys the
    /// kind does not recognize are ignored; recognized keys with the wrong type
    /// are rejected.
    pub fn parse(component_type: &str, config: Option<serde_json::Value>) -> Result<Self> {
        let kind: ComponentKind = component_type.parse()?;
        let config = match config {
            None | Some(serde_json::Value::Null) => serde_json::Value::Object(Metadata::new()),
            Some(value) => value,
        };

        match kind {
            ComponentKind::UserQuery => Ok(ComponentSpec::UserQuery),
            ComponentKind::Output => Ok(ComponentSpec::Output),
            ComponentKind::Knowledgebase => serde_json::from_value(config)
                .map(ComponentSpec::Knowledgebase)
                .map_err(|e| FlowError::Config(format!("invalid knowledgebase config: {}", e))),
            ComponentKind::LlmEngine => serde_json::from_value(config)
                .map(ComponentSpec::LlmEngine)
                .map_err(|e| FlowError::Config(format!("invalid llm_engine config: {}", e))),
        }
    }

    pub fn kind(&self) -> ComponentKind {
        match self {
            ComponentSpec::UserQuery => ComponentKind::UserQuery,
            ComponentSpec::Knowledgebase(_) => ComponentKind::Knowledgebase,
            ComponentSpec::LlmEngine(_) => ComponentKind::LlmEngine,
            ComponentSpec::Output => ComponentKind::Output,
        }
    }

    /// The configuration as a JSON object, `None` for kinds without settings.
    pub fn config_value(&self) -> Option<serde_json::Value> {
        match self {
            ComponentSpec::UserQuery | ComponentSpec::Output => None,
            ComponentSpec::Knowledgebase(cfg) => serde_json::to_value(cfg).ok(),
            ComponentSpec::LlmEngine(cfg) => serde_json::to_value(cfg).ok(),
        }
    }
}

/// Canvas position; presentation only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: i64,
    pub y: i64,
}

/// A typed node in a workflow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ComponentRecord", into = "ComponentRecord")]
pub struct Component {
    pub id: ComponentId,
    /// Label assigned by the graph-editing client. Also scopes knowledge bases.
    pub node_id: String,
    pub position: Position,
    pub spec: ComponentSpec,
}

impl Component {
    pub fn new(id: ComponentId, node_id: impl Into<String>, spec: ComponentSpec) -> Self {
        Self {
            id,
            node_id: node_id.into(),
            position: Position::default(),
            spec,
        }
    }

    pub fn kind(&self) -> ComponentKind {
        self.spec.kind()
    }
}

/// Persisted shape of a component.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ComponentRecord {
    id: ComponentId,
    component_type: String,
    node_id: String,
    #[serde(default)]
    position_x: i64,
    #[serde(default)]
    position_y: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    config: Option<serde_json::Value>,
}

impl TryFrom<ComponentRecord> for Component {
    type Error = FlowError;

    fn try_from(record: ComponentRecord) -> Result<Self> {
        Ok(Self {
            id: record.id,
            spec: ComponentSpec::parse(&record.component_type, record.config)?,
            node_id: record.node_id,
            position: Position {
                x: record.position_x,
                y: record.position_y,
            },
        })
    }
}

impl From<Component> for ComponentRecord {
    fn from(c: Component) -> Self {
        Self {
            id: c.id,
            component_type: c.kind().to_string(),
            config: c.spec.config_value(),
            node_id: c.node_id,
            position_x: c.position.x,
            position_y: c.position.y,
        }
    }
}

/// A directed edge between two components of the same workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub source: ComponentId,
    pub target: ComponentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
}

impl Connection {
    pub fn new(source: ComponentId, target: ComponentId) -> Self {
        Self {
            source,
            target,
            source_handle: None,
            target_handle: None,
        }
    }
}

/// Data handed from one node to the next, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    Query { query: String },
    Knowledgebase { query: String, context: String },
    Llm { response: String },
    Output { response: String },
}

impl Payload {
    pub fn query(text: impl Into<String>) -> Self {
        Payload::Query { query: text.into() }
    }

    /// The carried query, or `""` for payloads without one.
    pub fn query_text(&self) -> &str {
        match self {
            Payload::Query { query } | Payload::Knowledgebase { query, .. } => query,
            _ => "",
        }
    }

    /// Retrieved context, if any was carried and it is non-empty.
    pub fn context(&self) -> Option<&str> {
        match self {
            Payload::Knowledgebase { context, .. } if !context.is_empty() => Some(context),
            _ => None,
        }
    }

    /// The carried response, or `""` for payloads without one.
    pub fn response(&self) -> &str {
        match self {
            Payload::Llm { response } | Payload::Output { response } => response,
            _ => "",
        }
    }

    pub fn type_tag(&self) -> &'static str {
        match self {
            Payload::Query { .. } => "query",
            Payload::Knowledgebase { .. } => "knowledgebase",
            Payload::Llm { .. } => "llm",
            Payload::Output { .. } => "output",
        }
    }
}

/// Everything a generation provider needs for one completion.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub query: String,
    pub context: Option<String>,
    pub system_prompt: Option<String>,
    pub provider: String,
    pub model: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Knowledge-base scope: one collection per (collection name, component label).
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct SearchScope {
    pub collection: String,
    pub knowledgebase: String,
}

impl SearchScope {
    pub fn new(collection: impl Into<String>, knowledgebase: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            knowledgebase: knowledgebase.into(),
        }
    }

    /// Storage name of the scope.
    pub fn name(&self) -> String {
        format!("{}_{}", self.collection, self.knowledgebase)
    }
}

/// A retrieved passage with its similarity score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPassage {
    pub text: String,
    pub score: f32,
    #[serde(default)]
    pub metadata: Metadata,
}

/// A single organic web search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebResult {
    pub title: String,
    pub link: String,
    pub snippet: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_round_trip_names() {
        for kind in [
            ComponentKind::UserQuery,
            ComponentKind::Knowledgebase,
            ComponentKind::LlmEngine,
            ComponentKind::Output,
        ] {
            assert_eq!(kind.as_str().parse::<ComponentKind>().unwrap(), kind);
        }
        assert!(matches!(
            "router".parse::<ComponentKind>(),
            Err(FlowError::UnknownComponentKind(k)) if k == "router"
        ));
    }

    #[test]
    fn test_parse_defaults_when_config_missing() {
        let spec = ComponentSpec::parse("knowledgebase", None).unwrap();
        assert_eq!(spec, ComponentSpec::Knowledgebase(KnowledgebaseConfig::default()));

        let spec = ComponentSpec::parse("llm_engine", Some(serde_json::Value::Null)).unwrap();
        let ComponentSpec::LlmEngine(cfg) = spec else {
            panic!("expected llm_engine");
        };
        assert_eq!(cfg.provider, "openai");
        assert_eq!(cfg.temperature, 0.7);
        assert_eq!(cfg.max_tokens, 1000);
        assert!(!cfg.use_web_search);
        assert!(cfg.model.is_none());
    }

    #[test]
    fn test_parse_ignores_unknown_keys_and_rejects_bad_types() {
        let spec = ComponentSpec::parse(
            "knowledgebase",
            Some(json!({"n_results": 3, "label": "ignored"})),
        )
        .unwrap();
        let ComponentSpec::Knowledgebase(cfg) = spec else {
            panic!("expected knowledgebase");
        };
        assert_eq!(cfg.n_results, 3);
        assert_eq!(cfg.collection_name, "documents");

        let err = ComponentSpec::parse("llm_engine", Some(json!({"temperature": "hot"})))
            .unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("invalid llm_engine config"));
    }

    #[test]
    fn test_component_persisted_shape() {
        let raw = json!({
            "id": 7,
            "component_type": "llm_engine",
            "node_id": "llm-1",
            "position_x": 120,
            "position_y": -40,
            "config": {"provider": "gemini", "use_web_search": true}
        });
        let component: Component = serde_json::from_value(raw).unwrap();
        assert_eq!(component.id, ComponentId(7));
        assert_eq!(component.kind(), ComponentKind::LlmEngine);
        assert_eq!(component.position, Position { x: 120, y: -40 });

        let back = serde_json::to_value(&component).unwrap();
        assert_eq!(back["component_type"], "llm_engine");
        assert_eq!(back["config"]["provider"], "gemini");
        assert_eq!(back["config"]["max_tokens"], 1000);
    }

    #[test]
    fn test_component_unknown_kind_fails_to_load() {
        let raw = json!({"id": 1, "component_type": "router", "node_id": "r"});
        let err = serde_json::from_value::<Component>(raw).unwrap_err();
        assert!(err.to_string().contains("Unknown component kind: router"));
    }

    #[test]
    fn test_payload_tags_and_accessors() {
        let p: Payload =
            serde_json::from_value(json!({"type": "knowledgebase", "query": "q", "context": ""}))
                .unwrap();
        assert_eq!(p.query_text(), "q");
        assert_eq!(p.context(), None);
        assert_eq!(p.response(), "");

        let p = Payload::Llm { response: "hi".into() };
        assert_eq!(serde_json::to_value(&p).unwrap(), json!({"type": "llm", "response": "hi"}));
        assert_eq!(p.query_text(), "");
        assert_eq!(p.type_tag(), "llm");
    }

    #[test]
    fn test_search_scope_name() {
        assert_eq!(SearchScope::new("documents", "kb-1").name(), "documents_kb-1");
    }
}
