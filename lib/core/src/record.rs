use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Field names as they appear in stored catalog documents
pub mod fields {
    pub const ID: &str = "_id";
    pub const STOCK_REF: &str = "stockRef";
    pub const SHAPE: &str = "shape";
    pub const PRICE: &str = "priceListUSD";
    pub const WEIGHT: &str = "weight";
    pub const DEPTH: &str = "depthPerc";
    pub const TABLE: &str = "tablePerc";
    pub const COLOR: &str = "color";
    pub const CLARITY: &str = "clarity";
    pub const CUT_GRADE: &str = "cutGrade";
    pub const CUT: &str = "cut";
    pub const POLISH: &str = "polish";
    pub const SYMMETRY: &str = "symmetry";
    /// Field owned by the engine, overwritten on every run
    pub const SIMILAR: &str = "similar_diamonds";

    /// Projection used when reading the catalog
    pub const PROJECTION: &[&str] = &[
        ID, STOCK_REF, SHAPE, PRICE, WEIGHT, DEPTH, TABLE, COLOR, CLARITY, CUT_GRADE, CUT,
        POLISH, SYMMETRY,
    ];
}

/// Record identifier as stored in the catalog
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    /// Extended-JSON object id, `{"$oid": "..."}`
    ObjectId {
        #[serde(rename = "$oid")]
        oid: String,
    },
    String(String),
    Integer(u64),
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordId::ObjectId { oid } => write!(f, "{}", oid),
            RecordId::String(s) => write!(f, "{}", s),
            RecordId::Integer(i) => write!(f, "{}", i),
        }
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        RecordId::String(s)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        RecordId::String(s.to_string())
    }
}

impl From<u64> for RecordId {
    fn from(i: u64) -> Self {
        RecordId::Integer(i)
    }
}

/// One inventory item, projected to the fields the engine reads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogRecord {
    #[serde(rename = "_id")]
    pub id: RecordId,
    #[serde(rename = "stockRef", deserialize_with = "reference")]
    pub stock_ref: String,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub shape: Option<String>,
    #[serde(rename = "priceListUSD", default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(rename = "depthPerc", default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub depth_percent: Option<f64>,
    #[serde(rename = "tablePerc", default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub table_percent: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub clarity: Option<String>,
    #[serde(rename = "cutGrade", default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub cut_grade: Option<String>,
    /// Older inventories carry the cut grade under `cut`
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub cut: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub polish: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub symmetry: Option<String>,
}

impl CatalogRecord {
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<RecordId>, stock_ref: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            stock_ref: stock_ref.into(),
            shape: None,
            price: None,
            weight: None,
            depth_percent: None,
            table_percent: None,
            color: None,
            clarity: None,
            cut_grade: None,
            cut: None,
            polish: None,
            symmetry: None,
        }
    }

    /// Decode a stored document. Unknown fields are ignored.
    pub fn from_document(doc: &Value) -> crate::Result<Self> {
        Ok(Self::deserialize(doc)?)
    }

    /// Cut grade, preferring `cutGrade` over `cut`
    #[inline]
    pub fn cut_grade(&self) -> Option<&str> {
        self.cut_grade.as_deref().or(self.cut.as_deref())
    }

    /// Group key; records without a shape share the empty key
    #[inline]
    pub fn group_key(&self) -> &str {
        self.shape.as_deref().unwrap_or("")
    }

    #[inline]
    #[must_use]
    pub fn with_shape(mut self, shape: impl Into<String>) -> Self {
        self.shape = Some(shape.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_proportions(mut self, depth_percent: f64, table_percent: f64) -> Self {
        self.depth_percent = Some(depth_percent);
        self.table_percent = Some(table_percent);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_grades(mut self, color: &str, clarity: &str, cut: &str) -> Self {
        self.color = Some(color.to_string());
        self.clarity = Some(clarity.to_string());
        self.cut_grade = Some(cut.to_string());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_finish(mut self, polish: &str, symmetry: &str) -> Self {
        self.polish = Some(polish.to_string());
        self.symmetry = Some(symmetry.to_string());
        self
    }
}

fn reference<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number for stockRef, got {}",
            other
        ))),
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Numbers may arrive as JSON numbers or numeric strings; anything else is missing
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(value.filter(|v| v.is_finite()))
}
