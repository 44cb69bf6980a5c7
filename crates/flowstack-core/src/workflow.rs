use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{FlowError, Result};
use crate::types::{Component, ComponentId, ComponentKind, ComponentSpec, Connection, Position};

/// A workflow definition: components plus the connections between them.
///
/// This is a plain value. It performs no structural validation; that is the
/// engine's job, run against whatever was loaded or assembled here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    components: Vec<Component>,
    #[serde(default)]
    connections: Vec<Connection>,
    /// Next id handed out; ids are never reused, even after a full replace.
    #[serde(default)]
    next_component_id: u64,
}

impl Workflow {
    /// Build a workflow directly from already-identified parts.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        components: Vec<Component>,
        connections: Vec<Connection>,
    ) -> Self {
        let next_component_id = components.iter().map(|c| c.id.0 + 1).max().unwrap_or(0);
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            components,
            connections,
            next_component_id,
        }
    }

    /// Create a workflow from a client definition.
    ///
    /// Every connection must name existing node labels.
    pub fn assemble(id: impl Into<String>, draft: WorkflowDraft) -> Result<Self> {
        let mut workflow = Self::new(id, draft.name.clone(), Vec::new(), Vec::new());
        workflow.description = draft.description.clone();
        let (components, labels) = workflow.allocate_components(&draft.components)?;

        let mut connections = Vec::with_capacity(draft.connections.len());
        for conn in &draft.connections {
            let resolved = resolve_connection(conn, &labels).ok_or_else(|| {
                FlowError::Config(format!(
                    "invalid node labels in connection: {} -> {}",
                    conn.source, conn.target
                ))
            })?;
            connections.push(resolved);
        }

        workflow.components = components;
        workflow.connections = connections;
        Ok(workflow)
    }

    /// Replace every component and connection with the draft's.
    ///
    /// Connections whose labels do not resolve are skipped. If any component
    /// fails to parse the workflow is left untouched.
    pub fn replace_definition(&mut self, draft: WorkflowDraft) -> Result<()> {
        let saved_next = self.next_component_id;
        let (components, labels) = match self.allocate_components(&draft.components) {
            Ok(parts) => parts,
            Err(e) => {
                self.next_component_id = saved_next;
                return Err(e);
            }
        };

        let connections = draft
            .connections
            .iter()
            .filter_map(|conn| {
                let resolved = resolve_connection(conn, &labels);
                if resolved.is_none() {
                    warn!(
                        workflow_id = %self.id,
                        source = %conn.source,
                        target = %conn.target,
                        "Skipping connection with unknown node labels"
                    );
                }
                resolved
            })
            .collect();

        if !draft.name.is_empty() {
            self.name = draft.name;
        }
        if draft.description.is_some() {
            self.description = draft.description;
        }
        self.components = components;
        self.connections = connections;
        Ok(())
    }

    fn allocate_components(
        &mut self,
        drafts: &[ComponentDraft],
    ) -> Result<(Vec<Component>, HashMap<String, ComponentId>)> {
        // Loaded workflows may lack the counter; never drop below existing ids.
        let floor = self.components.iter().map(|c| c.id.0 + 1).max().unwrap_or(0);
        self.next_component_id = self.next_component_id.max(floor);

        let mut components = Vec::with_capacity(drafts.len());
        let mut labels = HashMap::new();

        for draft in drafts {
            let spec = ComponentSpec::parse(&draft.component_type, draft.config.clone())?;
            let id = ComponentId(self.next_component_id);
            self.next_component_id += 1;
            labels.insert(draft.node_id.clone(), id);
            components.push(Component {
                id,
                node_id: draft.node_id.clone(),
                position: Position {
                    x: draft.position_x,
                    y: draft.position_y,
                },
                spec,
            });
        }

        Ok((components, labels))
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Get a component by internal id.
    pub fn component(&self, id: ComponentId) -> Option<&Component> {
        self.components.iter().find(|c| c.id == id)
    }

    /// The first component of the given kind, in declaration order.
    pub fn first_of_kind(&self, kind: ComponentKind) -> Option<&Component> {
        self.components.iter().find(|c| c.kind() == kind)
    }
}

fn resolve_connection(
    conn: &ConnectionDraft,
    labels: &HashMap<String, ComponentId>,
) -> Option<Connection> {
    let source = *labels.get(&conn.source)?;
    let target = *labels.get(&conn.target)?;
    Some(Connection {
        source,
        target,
        source_handle: conn.source_handle.clone(),
        target_handle: conn.target_handle.clone(),
    })
}

/// Workflow definition as submitted by the graph-editing client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowDraft {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub components: Vec<ComponentDraft>,
    #[serde(default)]
    pub connections: Vec<ConnectionDraft>,
}

/// An unparsed component; kind and config are checked on assembly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentDraft {
    pub component_type: String,
    pub node_id: String,
    #[serde(default)]
    pub position_x: i64,
    #[serde(default)]
    pub position_y: i64,
    #[serde(default)]
    pub config: Option<serde_json::Value>,
}

impl ComponentDraft {
    pub fn new(component_type: impl Into<String>, node_id: impl Into<String>) -> Self {
        Self {
            component_type: component_type.into(),
            node_id: node_id.into(),
            position_x: 0,
            position_y: 0,
            config: None,
        }
    }

    pub fn with_config(mut self, config: serde_json::Value) -> Self {
        self.config = Some(config);
        self
    }
}

/// A connection between node labels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionDraft {
    #[serde(alias = "source_component_id")]
    pub source: String,
    #[serde(alias = "target_component_id")]
    pub target: String,
    #[serde(default)]
    pub source_handle: Option<String>,
    #[serde(default)]
    pub target_handle: Option<String>,
}

impl ConnectionDraft {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            source_handle: None,
            target_handle: None,
        }
    }
}
