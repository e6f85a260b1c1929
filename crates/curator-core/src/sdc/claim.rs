//! Wikibase claim types in their MediaInfo JSON shape.
//!
//! Server-assigned `hash` and statement `id` fields are carried verbatim
//! through parse/serialize and are never part of value equality.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnakType {
    Value,
    SomeValue,
    NoValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityIdValue {
    #[serde(rename = "entity-type")]
    pub entity_type: String,
    #[serde(rename = "numeric-id", skip_serializing_if = "Option::is_none")]
    pub numeric_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl EntityIdValue {
    /// An item reference from a Q-id string ("Q42").
    pub fn item(qid: &str) -> Self {
        Self {
            entity_type: "item".to_string(),
            numeric_id: qid.strip_prefix('Q').and_then(|n| n.parse().ok()),
            id: Some(qid.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobeCoordinateValue {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precision: Option<f64>,
    pub globe: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeValue {
    pub time: String,
    #[serde(default)]
    pub timezone: i64,
    #[serde(default)]
    pub before: i64,
    #[serde(default)]
    pub after: i64,
    pub precision: u32,
    pub calendarmodel: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantityValue {
    pub amount: String,
    pub unit: String,
    #[serde(rename = "upperBound", skip_serializing_if = "Option::is_none")]
    pub upper_bound: Option<String>,
    #[serde(rename = "lowerBound", skip_serializing_if = "Option::is_none")]
    pub lower_bound: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonolingualValue {
    pub text: String,
    pub language: String,
}

/// Typed datavalue, discriminated by the wire `type` field. URL and external
/// id values travel as `string` datavalues, matching the Wikibase JSON model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum DataValue {
    #[serde(rename = "string")]
    String(String),
    #[serde(rename = "wikibase-entityid")]
    EntityId(EntityIdValue),
    #[serde(rename = "globecoordinate")]
    GlobeCoordinate(GlobeCoordinateValue),
    #[serde(rename = "time")]
    Time(TimeValue),
    #[serde(rename = "quantity")]
    Quantity(QuantityValue),
    #[serde(rename = "monolingualtext")]
    Monolingual(MonolingualValue),
}

impl DataValue {
    /// Type-specific structural equality. Entity ids compare by entity type
    /// and numeric id; times by timestamp, precision, calendar model, and
    /// timezone (`before`/`after` do not participate); coordinates compare
    /// every component with exact float equality (differing precisions are
    /// different values); everything else compares field-for-field.
    pub fn value_eq(&self, other: &DataValue) -> bool {
        match (self, other) {
            (DataValue::EntityId(a), DataValue::EntityId(b)) => {
                a.entity_type == b.entity_type
                    && match (a.numeric_id, b.numeric_id) {
                        (Some(x), Some(y)) => x == y,
                        _ => a.id.is_some() && a.id == b.id,
                    }
            }
            (DataValue::Time(a), DataValue::Time(b)) => {
                a.time == b.time
                    && a.precision == b.precision
                    && a.calendarmodel == b.calendarmodel
                    && a.timezone == b.timezone
            }
            (a, b) => a == b,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snak {
    pub snaktype: SnakType,
    pub property: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datavalue: Option<DataValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datatype: Option<String>,
}

impl Snak {
    pub fn value(property: impl Into<String>, datavalue: DataValue) -> Self {
        Self {
            snaktype: SnakType::Value,
            property: property.into(),
            hash: None,
            datavalue: Some(datavalue),
            datatype: None,
        }
    }

    pub fn somevalue(property: impl Into<String>) -> Self {
        Self {
            snaktype: SnakType::SomeValue,
            property: property.into(),
            hash: None,
            datavalue: None,
            datatype: None,
        }
    }

    /// Value equality: same property, same snak type, structurally equal
    /// datavalues. The server `hash` never participates.
    pub fn value_eq(&self, other: &Snak) -> bool {
        if self.property != other.property || self.snaktype != other.snaktype {
            return false;
        }
        match (&self.datavalue, &other.datavalue) {
            (Some(a), Some(b)) => a.value_eq(b),
            (None, None) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rank {
    Preferred,
    #[default]
    Normal,
    Deprecated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    pub snaks: BTreeMap<String, Vec<Snak>>,
    #[serde(rename = "snaks-order")]
    pub snaks_order: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    pub mainsnak: Snak,
    #[serde(rename = "type", default = "statement_type")]
    pub claim_type: String,
    #[serde(default)]
    pub rank: Rank,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qualifiers: Option<BTreeMap<String, Vec<Snak>>>,
    #[serde(rename = "qualifiers-order", skip_serializing_if = "Option::is_none")]
    pub qualifiers_order: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub references: Option<Vec<Reference>>,
}

fn statement_type() -> String {
    "statement".to_string()
}

impl Statement {
    pub fn new(mainsnak: Snak) -> Self {
        Self {
            mainsnak,
            claim_type: statement_type(),
            rank: Rank::Normal,
            id: None,
            qualifiers: None,
            qualifiers_order: None,
            references: None,
        }
    }

    /// Attach a qualifier, keeping `qualifiers_order` in sync.
    pub fn with_qualifier(mut self, snak: Snak) -> Self {
        let prop = snak.property.clone();
        let qualifiers = self.qualifiers.get_or_insert_with(BTreeMap::new);
        let order = self.qualifiers_order.get_or_insert_with(Vec::new);
        if !qualifiers.contains_key(&prop) {
            order.push(prop.clone());
        }
        qualifiers.entry(prop).or_default().push(snak);
        self
    }
}
