use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::{ENTRY_NODE_HEIGHT, ENTRY_NODE_WIDTH, Footprint, NODE_HEIGHT, NODE_WIDTH};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeCategory {
    Source,
    Transform,
    Destination,
}

impl NodeCategory {
    pub fn label(self) -> &'static str {
        match self {
            NodeCategory::Source => "Data Sources",
            NodeCategory::Transform => "Transformations",
            NodeCategory::Destination => "Destinations",
        }
    }

    /// Source kinds are pipeline entry points and get the larger footprint.
    pub fn footprint(self) -> Footprint {
        match self {
            NodeCategory::Source => Footprint {
                width: ENTRY_NODE_WIDTH,
                height: ENTRY_NODE_HEIGHT,
            },
            NodeCategory::Transform | NodeCategory::Destination => Footprint {
                width: NODE_WIDTH,
                height: NODE_HEIGHT,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldInput {
    Text,
    Number,
    Textarea,
    Select,
}

/// One entry in a kind's configuration template, rendered by the side panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigField {
    pub key: String,
    pub label: String,
    pub input: FieldInput,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

impl ConfigField {
    fn text(key: &str, label: &str, placeholder: &str) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            input: FieldInput::Text,
            placeholder: Some(placeholder.to_string()),
            options: Vec::new(),
        }
    }

    fn number(key: &str, label: &str, placeholder: &str) -> Self {
        Self {
            input: FieldInput::Number,
            ..Self::text(key, label, placeholder)
        }
    }

    fn textarea(key: &str, label: &str, placeholder: &str) -> Self {
        Self {
            input: FieldInput::Textarea,
            ..Self::text(key, label, placeholder)
        }
    }

    fn select(key: &str, label: &str, options: &[&str]) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            input: FieldInput::Select,
            placeholder: None,
            options: options.iter().map(|option| option.to_string()).collect(),
        }
    }
}

/// Catalog metadata for one node kind. `icon` names a glyph and `color` is a
/// CSS color string; both are opaque data passed through to the frontend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeKind {
    pub id: String,
    pub name: String,
    pub category: NodeCategory,
    pub icon: String,
    pub color: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub config_fields: Vec<ConfigField>,
}

/// The static, read-only list of node kinds available in the palette.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeTypeCatalog {
    kinds: Vec<NodeKind>,
}

impl NodeTypeCatalog {
    pub fn new(kinds: Vec<NodeKind>) -> Self {
        Self { kinds }
    }

    pub fn builtin() -> Self {
        let entry = |id: &str,
                     name: &str,
                     category: NodeCategory,
                     icon: &str,
                     color: &str,
                     description: &str,
                     config_fields: Vec<ConfigField>| NodeKind {
            id: id.to_string(),
            name: name.to_string(),
            category,
            icon: icon.to_string(),
            color: color.to_string(),
            description: description.to_string(),
            config_fields,
        };

        Self::new(vec![
            entry(
                "delta-plc",
                "Delta PLC",
                NodeCategory::Source,
                "Factory",
                "#2f6f9f",
                "Connect to Delta PLC devices",
                vec![
                    ConfigField::text("host", "PLC Host", "192.168.1.100"),
                    ConfigField::number("port", "Port", "502"),
                    ConfigField::number("slaveId", "Slave ID", "1"),
                ],
            ),
            entry(
                "energy-meter",
                "Energy Meter",
                NodeCategory::Source,
                "Lightning",
                "#c9972c",
                "Read energy consumption data",
                vec![
                    ConfigField::text("meterId", "Meter ID", "EM001"),
                    ConfigField::select("protocol", "Protocol", &["Modbus", "RS485", "Ethernet"]),
                    ConfigField::number("pollInterval", "Poll Interval (ms)", "1000"),
                ],
            ),
            entry(
                "mitsubishi-plc",
                "Mitsubishi PLC",
                NodeCategory::Source,
                "Cpu",
                "#b2473a",
                "Connect to Mitsubishi PLC systems",
                Vec::new(),
            ),
            entry(
                "database",
                "Database",
                NodeCategory::Source,
                "Database",
                "#4a4f94",
                "Connect to SQL databases",
                vec![
                    ConfigField::text("connectionString", "Connection String", "postgresql://..."),
                    ConfigField::text("table", "Table Name", "sensor_data"),
                    ConfigField::textarea("query", "SQL Query", "SELECT * FROM..."),
                ],
            ),
            entry(
                "scheduler",
                "Scheduler",
                NodeCategory::Source,
                "Clock",
                "#3d8452",
                "Schedule automated tasks",
                Vec::new(),
            ),
            entry(
                "siemens",
                "Siemens",
                NodeCategory::Source,
                "Gear",
                "#39405a",
                "Connect to Siemens devices",
                Vec::new(),
            ),
            entry(
                "transform",
                "Transform",
                NodeCategory::Transform,
                "ArrowsClockwise",
                "#c27a35",
                "Transform and process data",
                vec![
                    ConfigField::textarea(
                        "expression",
                        "Transform Expression",
                        "value * 1.5 + offset",
                    ),
                    ConfigField::text("outputField", "Output Field", "processed_value"),
                ],
            ),
            entry(
                "filter",
                "Filter",
                NodeCategory::Transform,
                "Funnel",
                "#a08a2f",
                "Filter data based on conditions",
                Vec::new(),
            ),
            entry(
                "output",
                "Output",
                NodeCategory::Destination,
                "Export",
                "#3f8f5f",
                "Send data to external systems",
                Vec::new(),
            ),
        ])
    }

    pub fn parse(definition: &str) -> Result<Self> {
        let kinds: Vec<NodeKind> =
            serde_json::from_str(definition).context("failed to parse node type catalog")?;
        if kinds.is_empty() {
            bail!("node type catalog does not declare any kinds");
        }
        Ok(Self::new(kinds))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read '{}'", path.display()))?;
        Self::parse(&contents)
    }

    pub fn kinds(&self) -> &[NodeKind] {
        &self.kinds
    }

    pub fn kind(&self, id: &str) -> Option<&NodeKind> {
        self.kinds.iter().find(|kind| kind.id == id)
    }

    /// Footprint lookup by kind id. Unknown kinds fall back to the standard
    /// footprint so a workflow referencing a retired kind still renders.
    pub fn footprint_of(&self, kind_id: &str) -> Footprint {
        self.kind(kind_id)
            .map(|kind| kind.category.footprint())
            .unwrap_or(Footprint {
                width: NODE_WIDTH,
                height: NODE_HEIGHT,
            })
    }

    pub fn by_category(&self, category: NodeCategory) -> Vec<&NodeKind> {
        self.kinds
            .iter()
            .filter(|kind| kind.category == category)
            .collect()
    }
}

impl Default for NodeTypeCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
