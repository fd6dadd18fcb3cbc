//! Notion page records and their typed property values

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// A single database row as returned by the Notion API
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Record {
    #[serde(default)]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_properties")]
    pub properties: HashMap<String, PropertyValue>,
}

impl Record {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            properties: HashMap::new(),
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: PropertyValue) -> Self {
        self.properties.insert(name.into(), value);
        self
    }

    /// Build a record from a raw page object. Returns None for partial pages
    /// that carry no `properties` object.
    pub fn from_page(page: Value) -> Option<Self> {
        if !page.get("properties").is_some_and(Value::is_object) {
            return None;
        }
        serde_json::from_value(page).ok()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RichText {
    #[serde(default)]
    pub plain_text: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SelectOption {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DateValue {
    pub start: String,
    #[serde(default)]
    pub end: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FormulaValue {
    Number { number: Option<f64> },
    String { string: Option<String> },
    Boolean { boolean: Option<bool> },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RollupValue {
    Number { number: Option<f64> },
    #[serde(other)]
    Other,
}

/// Property payload tagged by Notion's `type` field
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PropertyValue {
    Title { title: Vec<RichText> },
    RichText { rich_text: Vec<RichText> },
    Number { number: Option<f64> },
    Select { select: Option<SelectOption> },
    Status { status: Option<SelectOption> },
    MultiSelect { multi_select: Vec<SelectOption> },
    Date { date: Option<DateValue> },
    Checkbox { checkbox: bool },
    Formula { formula: FormulaValue },
    Rollup { rollup: RollupValue },
    #[serde(other)]
    Unsupported,
}

impl PropertyValue {
    pub fn title(text: &str) -> Self {
        PropertyValue::Title {
            title: vec![RichText {
                plain_text: text.to_string(),
            }],
        }
    }

    pub fn rich_text(text: &str) -> Self {
        PropertyValue::RichText {
            rich_text: vec![RichText {
                plain_text: text.to_string(),
            }],
        }
    }

    pub fn number(n: f64) -> Self {
        PropertyValue::Number { number: Some(n) }
    }

    pub fn select(name: &str) -> Self {
        PropertyValue::Select {
            select: Some(SelectOption {
                name: name.to_string(),
            }),
        }
    }

    pub fn status(name: &str) -> Self {
        PropertyValue::Status {
            status: Some(SelectOption {
                name: name.to_string(),
            }),
        }
    }

    pub fn multi_select(names: &[&str]) -> Self {
        PropertyValue::MultiSelect {
            multi_select: names
                .iter()
                .map(|n| SelectOption {
                    name: n.to_string(),
                })
                .collect(),
        }
    }

    pub fn date(start: &str) -> Self {
        PropertyValue::Date {
            date: Some(DateValue {
                start: start.to_string(),
                end: None,
            }),
        }
    }

    pub fn checkbox(checked: bool) -> Self {
        PropertyValue::Checkbox { checkbox: checked }
    }
}

/// Deserialize each property on its own so one malformed payload degrades
/// to `Unsupported` instead of rejecting the whole page.
fn lenient_properties<'de, D>(deserializer: D) -> Result<HashMap<String, PropertyValue>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: HashMap<String, Value> = HashMap::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(name, value)| {
            let parsed = serde_json::from_value(value).unwrap_or(PropertyValue::Unsupported);
            (name, parsed)
        })
        .collect())
}

/// Normalized value of one property
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    String(String),
    Number(f64),
    Bool(bool),
}

impl Scalar {
    /// Finite numeric value, if this is a number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Scalar::Number(n) if n.is_finite() => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::String(s) => Some(s),
            _ => None,
        }
    }

    /// String coercion used for grouping keys
    pub fn to_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::String(s) => f.write_str(s),
            // negative zero groups with zero
            Scalar::Number(n) if *n == 0.0 => f.write_str("0"),
            // f64's Display already prints 3.0 as "3"
            Scalar::Number(n) => write!(f, "{}", n),
            Scalar::Bool(b) => write!(f, "{}", b),
        }
    }
}
