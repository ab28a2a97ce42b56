use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Point;

pub const DEFAULT_WORKFLOW_NAME: &str = "New ETL Workflow";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    #[default]
    Idle,
    Running,
    Success,
    Error,
}

impl NodeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeStatus::Idle => "idle",
            NodeStatus::Running => "running",
            NodeStatus::Success => "success",
            NodeStatus::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    #[default]
    Draft,
    Running,
    Success,
    Error,
}

/// A single step in the pipeline graph. `kind` names an entry in the
/// [`NodeTypeCatalog`](crate::NodeTypeCatalog); `data` holds the free-form
/// per-kind configuration keyed by field name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    pub kind: String,
    pub position: Point,
    #[serde(default)]
    pub data: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub selected: bool,
    #[serde(default)]
    pub status: NodeStatus,
}

/// A directed edge declaring that `source`'s output feeds `target`'s input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub id: String,
    pub source: String,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub connections: Vec<Connection>,
    #[serde(default)]
    pub status: WorkflowStatus,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Workflow {
    pub fn new(name: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            nodes: Vec::new(),
            connections: Vec::new(),
            status: WorkflowStatus::Draft,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|node| node.id == id)
    }

    pub fn has_node(&self, id: &str) -> bool {
        self.nodes.iter().any(|node| node.id == id)
    }

    pub fn connection(&self, id: &str) -> Option<&Connection> {
        self.connections.iter().find(|connection| connection.id == id)
    }

    pub fn has_connection_between(&self, source: &str, target: &str) -> bool {
        self.connections
            .iter()
            .any(|connection| connection.source == source && connection.target == target)
    }

    pub fn selected_node(&self) -> Option<&Node> {
        self.nodes.iter().find(|node| node.selected)
    }

    pub fn parse(definition: &str) -> Result<Self> {
        serde_json::from_str(definition).context("failed to parse workflow definition")
    }

    pub fn to_definition(&self) -> Result<String> {
        let mut definition =
            serde_json::to_string_pretty(self).context("failed to serialize workflow")?;
        definition.push('\n');
        Ok(definition)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read '{}'", path.display()))?;
        Self::parse(&contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn definition_round_trips() -> Result<()> {
        let mut workflow = Workflow::new("Plant Telemetry");
        workflow.nodes.push(Node {
            id: "node-1".to_string(),
            kind: "energy-meter".to_string(),
            position: Point::new(120.0, 80.0),
            data: HashMap::from([("meterId".to_string(), serde_json::json!("EM001"))]),
            selected: false,
            status: NodeStatus::Idle,
        });

        let definition = workflow.to_definition()?;
        let parsed = Workflow::parse(&definition)?;

        assert_eq!(parsed, workflow);
        Ok(())
    }

    #[test]
    fn parse_tolerates_missing_optional_fields() -> Result<()> {
        let definition = r#"{
            "id": "wf-1",
            "name": "Bare Workflow",
            "nodes": [
                { "id": "node-1", "kind": "database", "position": { "x": 10.0, "y": 20.0 } }
            ]
        }"#;

        let workflow = Workflow::parse(definition)?;
        let node = workflow.node("node-1").expect("node should parse");

        assert_eq!(node.status, NodeStatus::Idle);
        assert!(!node.selected);
        assert!(node.data.is_empty());
        assert!(workflow.connections.is_empty());
        assert_eq!(workflow.status, WorkflowStatus::Draft);
        Ok(())
    }
}
