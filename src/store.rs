use std::collections::HashMap;

use chrono::Utc;
use serde::Deserialize;

use crate::{Connection, DEFAULT_WORKFLOW_NAME, Node, NodeStatus, Point, Workflow};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    NodeNotFound(String),

    ConnectionNotFound(String),

    DuplicateConnection { source: String, target: String },

    UnknownEndpoint(String),
}

impl std::fmt::Display for GraphError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GraphError::NodeNotFound(id) => write!(f, "node '{id}' does not exist"),
            GraphError::ConnectionNotFound(id) => write!(f, "connection '{id}' does not exist"),
            GraphError::DuplicateConnection { source, target } => {
                write!(f, "a connection from '{source}' to '{target}' already exists")
            }
            GraphError::UnknownEndpoint(id) => {
                write!(f, "connection endpoint '{id}' does not name an existing node")
            }
        }
    }
}

impl std::error::Error for GraphError {}

/// Partial update applied to a node. Absent fields keep their current value;
/// `data` entries are merged key by key into the node's configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePatch {
    #[serde(default)]
    pub position: Option<Point>,
    #[serde(default)]
    pub status: Option<NodeStatus>,
    #[serde(default)]
    pub selected: Option<bool>,
    #[serde(default)]
    pub data: Option<HashMap<String, serde_json::Value>>,
}

impl NodePatch {
    pub fn position(position: Point) -> Self {
        Self {
            position: Some(position),
            ..Self::default()
        }
    }

    pub fn status(status: NodeStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

/// Reducer form of the mutation API. Every write the store supports is
/// expressible as one of these values applied through [`GraphStore::apply`].
#[derive(Debug, Clone)]
pub enum GraphAction {
    AddNode {
        kind: String,
        position: Point,
        source: Option<String>,
    },
    UpdateNode {
        id: String,
        patch: NodePatch,
    },
    DeleteNode {
        id: String,
    },
    AddConnection {
        source: String,
        target: String,
    },
    DeleteConnection {
        id: String,
    },
    SelectNode {
        id: Option<String>,
    },
    RenameWorkflow {
        name: String,
    },
    Reset,
}

pub type ChangeListener = Box<dyn FnMut(&Workflow) + Send + Sync>;

/// Sole writer of workflow state. All other components read derived views
/// through [`GraphStore::workflow`] or an owned [`GraphStore::snapshot`].
///
/// Node and connection ids come from monotonic counters, never from the
/// wall clock, so ids stay unique under arbitrarily rapid creation.
pub struct GraphStore {
    workflow: Workflow,
    next_node: u64,
    next_connection: u64,
    revision: u64,
    listeners: Vec<ChangeListener>,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::with_workflow(Workflow::new(DEFAULT_WORKFLOW_NAME))
    }

    /// Wraps an existing workflow document, seeding the id counters past any
    /// ids already present so generated ids never collide with loaded ones.
    pub fn with_workflow(workflow: Workflow) -> Self {
        let next_node = next_index(workflow.nodes.iter().map(|node| node.id.as_str()), "node-");
        let next_connection = next_index(
            workflow.connections.iter().map(|c| c.id.as_str()),
            "connection-",
        );
        Self {
            workflow,
            next_node,
            next_connection,
            revision: 0,
            listeners: Vec::new(),
        }
    }

    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    pub fn snapshot(&self) -> Workflow {
        self.workflow.clone()
    }

    /// Bumped on every successful mutation; consumers compare revisions to
    /// decide when to recompute derived views.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Registers a callback fired after every successful mutation with the
    /// new canonical state.
    pub fn subscribe(&mut self, listener: ChangeListener) {
        self.listeners.push(listener);
    }

    pub fn apply(&mut self, action: GraphAction) -> Result<Option<String>, GraphError> {
        match action {
            GraphAction::AddNode {
                kind,
                position,
                source,
            } => Ok(Some(self.add_node_linked(&kind, position, source.as_deref()))),
            GraphAction::UpdateNode { id, patch } => self.update_node(&id, patch).map(|_| None),
            GraphAction::DeleteNode { id } => self.delete_node(&id).map(|_| None),
            GraphAction::AddConnection { source, target } => {
                self.add_connection(&source, &target).map(Some)
            }
            GraphAction::DeleteConnection { id } => self.delete_connection(&id).map(|_| None),
            GraphAction::SelectNode { id } => self.select_node(id.as_deref()).map(|_| None),
            GraphAction::RenameWorkflow { name } => {
                self.rename_workflow(&name);
                Ok(None)
            }
            GraphAction::Reset => {
                self.reset();
                Ok(None)
            }
        }
    }

    /// Creates a node with a fresh unique id, default status and empty
    /// configuration, returning the new id.
    pub fn add_node(&mut self, kind: &str, position: Point) -> String {
        self.add_node_linked(kind, position, None)
    }

    /// Like [`GraphStore::add_node`], but additionally connects `source` to
    /// the new node when `source` names an existing node. A vanished source
    /// skips the link; the node is still created and its id returned.
    pub fn add_node_linked(
        &mut self,
        kind: &str,
        position: Point,
        source: Option<&str>,
    ) -> String {
        let id = format!("node-{}", self.next_node);
        self.next_node += 1;

        self.workflow.nodes.push(Node {
            id: id.clone(),
            kind: kind.to_string(),
            position,
            data: HashMap::new(),
            selected: false,
            status: NodeStatus::Idle,
        });

        if let Some(source) = source {
            if self.workflow.has_node(source) {
                self.insert_connection(source, &id);
            }
        }

        self.touch();
        id
    }

    /// Shallow-merges `patch` into the named node.
    pub fn update_node(&mut self, id: &str, patch: NodePatch) -> Result<(), GraphError> {
        let node = self
            .workflow
            .node_mut(id)
            .ok_or_else(|| GraphError::NodeNotFound(id.to_string()))?;

        if let Some(position) = patch.position {
            node.position = position;
        }
        if let Some(status) = patch.status {
            node.status = status;
        }
        if let Some(selected) = patch.selected {
            node.selected = selected;
        }
        if let Some(data) = patch.data {
            for (key, value) in data {
                node.data.insert(key, value);
            }
        }

        self.touch();
        Ok(())
    }

    /// Removes the node and cascades to every connection referencing it.
    pub fn delete_node(&mut self, id: &str) -> Result<(), GraphError> {
        if !self.workflow.has_node(id) {
            return Err(GraphError::NodeNotFound(id.to_string()));
        }

        self.workflow.nodes.retain(|node| node.id != id);
        self.workflow
            .connections
            .retain(|connection| connection.source != id && connection.target != id);

        self.touch();
        Ok(())
    }

    /// Appends a connection after validating both endpoints exist and the
    /// (source, target) pair is not already present.
    pub fn add_connection(&mut self, source: &str, target: &str) -> Result<String, GraphError> {
        if !self.workflow.has_node(source) {
            return Err(GraphError::UnknownEndpoint(source.to_string()));
        }
        if !self.workflow.has_node(target) {
            return Err(GraphError::UnknownEndpoint(target.to_string()));
        }
        if self.workflow.has_connection_between(source, target) {
            return Err(GraphError::DuplicateConnection {
                source: source.to_string(),
                target: target.to_string(),
            });
        }

        let id = self.insert_connection(source, target);
        self.touch();
        Ok(id)
    }

    pub fn delete_connection(&mut self, id: &str) -> Result<(), GraphError> {
        if self.workflow.connection(id).is_none() {
            return Err(GraphError::ConnectionNotFound(id.to_string()));
        }

        self.workflow.connections.retain(|connection| connection.id != id);
        self.touch();
        Ok(())
    }

    /// Single-selection model: exactly one node ends up selected for a known
    /// id, none for `None`. An unknown id clears the selection and reports
    /// `NodeNotFound` so the caller can decide whether to surface it.
    pub fn select_node(&mut self, id: Option<&str>) -> Result<(), GraphError> {
        let known = id.map(|id| self.workflow.has_node(id)).unwrap_or(false);

        for node in &mut self.workflow.nodes {
            node.selected = known && id == Some(node.id.as_str());
        }
        self.touch();

        match id {
            Some(id) if !known => Err(GraphError::NodeNotFound(id.to_string())),
            _ => Ok(()),
        }
    }

    pub fn selected_node(&self) -> Option<&Node> {
        self.workflow.selected_node()
    }

    pub fn rename_workflow(&mut self, name: &str) {
        self.workflow.name = name.to_string();
        self.touch();
    }

    /// Replaces the state with a fresh empty workflow.
    pub fn reset(&mut self) {
        self.workflow = Workflow::new(DEFAULT_WORKFLOW_NAME);
        self.next_node = 1;
        self.next_connection = 1;
        self.touch();
    }

    fn insert_connection(&mut self, source: &str, target: &str) -> String {
        let id = format!("connection-{}", self.next_connection);
        self.next_connection += 1;
        self.workflow.connections.push(Connection {
            id: id.clone(),
            source: source.to_string(),
            target: target.to_string(),
        });
        id
    }

    fn touch(&mut self) {
        self.workflow.updated_at = Utc::now();
        self.revision += 1;

        let mut listeners = std::mem::take(&mut self.listeners);
        for listener in &mut listeners {
            listener(&self.workflow);
        }
        self.listeners = listeners;
    }
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new()
    }
}

fn next_index<'a>(ids: impl Iterator<Item = &'a str>, prefix: &str) -> u64 {
    ids.filter_map(|id| id.strip_prefix(prefix))
        .filter_map(|suffix| suffix.parse::<u64>().ok())
        .max()
        .map_or(1, |highest| highest + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn apply_drives_the_same_mutations_as_the_typed_api() {
        let mut store = GraphStore::new();

        let n1 = store
            .apply(GraphAction::AddNode {
                kind: "database".to_string(),
                position: Point::new(100.0, 100.0),
                source: None,
            })
            .expect("add succeeds")
            .expect("add returns an id");
        let n2 = store
            .apply(GraphAction::AddNode {
                kind: "transform".to_string(),
                position: Point::new(320.0, 100.0),
                source: Some(n1.clone()),
            })
            .expect("linked add succeeds")
            .expect("linked add returns an id");

        assert!(store.workflow().has_connection_between(&n1, &n2));

        store
            .apply(GraphAction::Reset)
            .expect("reset always succeeds");
        assert!(store.workflow().nodes.is_empty());
        assert!(store.workflow().connections.is_empty());
    }

    #[test]
    fn counters_skip_ids_already_present_in_a_loaded_document() {
        let mut workflow = Workflow::new("Loaded");
        workflow.nodes.push(Node {
            id: "node-7".to_string(),
            kind: "filter".to_string(),
            position: Point::default(),
            data: HashMap::new(),
            selected: false,
            status: NodeStatus::Idle,
        });

        let mut store = GraphStore::with_workflow(workflow);
        let id = store.add_node("output", Point::new(50.0, 50.0));

        assert_eq!(id, "node-8");
    }

    #[test]
    fn revision_and_listeners_fire_on_every_mutation() {
        let mut store = GraphStore::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        store.subscribe(Box::new(move |workflow| {
            sink.lock().unwrap().push(workflow.nodes.len());
        }));

        assert_eq!(store.revision(), 0);
        let id = store.add_node("scheduler", Point::new(10.0, 10.0));
        store
            .update_node(&id, NodePatch::status(NodeStatus::Running))
            .unwrap();
        store.delete_node(&id).unwrap();

        assert_eq!(store.revision(), 3);
        assert_eq!(*seen.lock().unwrap(), vec![1, 1, 0]);
    }

    #[test]
    fn data_patch_merges_per_key() {
        let mut store = GraphStore::new();
        let id = store.add_node("database", Point::default());

        store
            .update_node(
                &id,
                NodePatch {
                    data: Some(HashMap::from([(
                        "table".to_string(),
                        serde_json::json!("sensor_data"),
                    )])),
                    ..NodePatch::default()
                },
            )
            .unwrap();
        store
            .update_node(
                &id,
                NodePatch {
                    data: Some(HashMap::from([(
                        "query".to_string(),
                        serde_json::json!("SELECT 1"),
                    )])),
                    ..NodePatch::default()
                },
            )
            .unwrap();

        let node = store.workflow().node(&id).unwrap();
        assert_eq!(node.data.len(), 2);
        assert_eq!(node.data["table"], serde_json::json!("sensor_data"));
    }

    #[test]
    fn deleting_a_missing_connection_reports_not_found() {
        let mut store = GraphStore::new();
        assert_eq!(
            store.delete_connection("connection-9"),
            Err(GraphError::ConnectionNotFound("connection-9".to_string()))
        );
    }
}
