// Schema-driven data containers exchanged with the solve service as JSON

use std::fmt;
use std::io::{Read, Write};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Error types for collector (de)serialization
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Expected a JSON object for collector '{0}'")]
    NotAnObject(String),

    #[error("Field '{field}' expects {expected} but found {found}")]
    TypeMismatch {
        field: String,
        expected: String,
        found: String,
    },

    #[error("Field '{field}' is missing column '{column}'")]
    MissingColumn { field: String, column: String },

    #[error("Field '{0}' is not declared in the schema")]
    UnknownField(String),
}

pub type Result<T> = std::result::Result<T, CollectorError>;

/// Declared type of a schema field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Float,
    Integer,
    Text,
    Boolean,
    /// Rows of named columns, e.g. an OPL tuple set
    Table(IndexMap<String, FieldType>),
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Float => write!(f, "float"),
            FieldType::Integer => write!(f, "integer"),
            FieldType::Text => write!(f, "text"),
            FieldType::Boolean => write!(f, "boolean"),
            FieldType::Table(columns) => {
                let names: Vec<&str> = columns.keys().map(String::as_str).collect();
                write!(f, "table({})", names.join(", "))
            }
        }
    }
}

/// Logical field names and their types, in declaration order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultSchema(IndexMap<String, FieldType>);

impl ResultSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.0.insert(name.into(), field_type);
        self
    }

    /// Parse a schema such as `{"cost": "float", "buy": {"table": {"food": "text"}}}`
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn get(&self, name: &str) -> Option<&FieldType> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldType)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One table row, keyed by column name
pub type Row = IndexMap<String, DataValue>;

/// A typed value held by a collector field
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DataValue {
    Float(f64),
    Integer(i64),
    Text(String),
    Boolean(bool),
    Table(Vec<Row>),
}

impl DataValue {
    fn from_json(field: &str, field_type: &FieldType, value: serde_json::Value) -> Result<Self> {
        use serde_json::Value;

        let mismatch = |value: &Value| CollectorError::TypeMismatch {
            field: field.to_string(),
            expected: field_type.to_string(),
            found: json_kind(value).to_string(),
        };

        match (field_type, value) {
            (FieldType::Float, Value::Number(n)) => match n.as_f64() {
                Some(f) => Ok(DataValue::Float(f)),
                None => Err(mismatch(&Value::Number(n))),
            },
            (FieldType::Integer, Value::Number(n)) => match n.as_i64() {
                Some(i) => Ok(DataValue::Integer(i)),
                None => Err(mismatch(&Value::Number(n))),
            },
            (FieldType::Text, Value::String(s)) => Ok(DataValue::Text(s)),
            (FieldType::Boolean, Value::Bool(b)) => Ok(DataValue::Boolean(b)),
            (FieldType::Table(columns), Value::Array(rows)) => rows
                .into_iter()
                .map(|row| match row {
                    Value::Object(mut cells) => columns
                        .iter()
                        .map(|(column, column_type)| {
                            let cell = cells.remove(column).ok_or_else(|| {
                                CollectorError::MissingColumn {
                                    field: field.to_string(),
                                    column: column.clone(),
                                }
                            })?;
                            let qualified = format!("{}.{}", field, column);
                            let value = DataValue::from_json(&qualified, column_type, cell)?;
                            Ok((column.clone(), value))
                        })
                        .collect::<Result<Row>>(),
                    other => Err(mismatch(&other)),
                })
                .collect::<Result<Vec<_>>>()
                .map(DataValue::Table),
            (_, other) => Err(mismatch(&other)),
        }
    }

    /// Whether this value can be stored in a field of the given type
    pub fn conforms_to(&self, field_type: &FieldType) -> bool {
        match (self, field_type) {
            (DataValue::Float(_), FieldType::Float)
            | (DataValue::Integer(_), FieldType::Float)
            | (DataValue::Integer(_), FieldType::Integer)
            | (DataValue::Text(_), FieldType::Text)
            | (DataValue::Boolean(_), FieldType::Boolean) => true,
            (DataValue::Table(rows), FieldType::Table(columns)) => rows.iter().all(|row| {
                columns.iter().all(|(column, column_type)| {
                    row.get(column).is_some_and(|cell| cell.conforms_to(column_type))
                })
            }),
            _ => false,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            DataValue::Float(_) => "float",
            DataValue::Integer(_) => "integer",
            DataValue::Text(_) => "text",
            DataValue::Boolean(_) => "boolean",
            DataValue::Table(_) => "table",
        }
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    use serde_json::Value;
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "text",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Named, schema-conforming set of data values.
///
/// Result collectors are filled from the solve service's JSON output;
/// input collectors are serialized to JSON and attached to a job.
#[derive(Debug, Clone, PartialEq)]
pub struct Collector {
    name: String,
    schema: ResultSchema,
    values: IndexMap<String, DataValue>,
}

impl Collector {
    pub fn new(name: impl Into<String>, schema: ResultSchema) -> Self {
        Self {
            name: name.into(),
            schema,
            values: IndexMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &ResultSchema {
        &self.schema
    }

    pub fn values(&self) -> &IndexMap<String, DataValue> {
        &self.values
    }

    pub fn get(&self, field: &str) -> Option<&DataValue> {
        self.values.get(field)
    }

    pub fn float(&self, field: &str) -> Option<f64> {
        match self.values.get(field)? {
            DataValue::Float(v) => Some(*v),
            DataValue::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn integer(&self, field: &str) -> Option<i64> {
        match self.values.get(field)? {
            DataValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn text(&self, field: &str) -> Option<&str> {
        match self.values.get(field)? {
            DataValue::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn boolean(&self, field: &str) -> Option<bool> {
        match self.values.get(field)? {
            DataValue::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    pub fn table(&self, field: &str) -> Option<&[Row]> {
        match self.values.get(field)? {
            DataValue::Table(rows) => Some(rows),
            _ => None,
        }
    }

    /// Store a value, checking it against the declared field type
    pub fn set(&mut self, field: impl Into<String>, value: DataValue) -> Result<&mut Self> {
        let field = field.into();
        let field_type = self
            .schema
            .get(&field)
            .ok_or_else(|| CollectorError::UnknownField(field.clone()))?;
        if !value.conforms_to(field_type) {
            return Err(CollectorError::TypeMismatch {
                expected: field_type.to_string(),
                found: value.kind().to_string(),
                field,
            });
        }
        self.values.insert(field, value);
        Ok(self)
    }

    /// Populate this collector from a JSON object.
    ///
    /// Fields declared in the schema but absent (or `null`) in the document
    /// stay unset; undeclared keys are ignored.
    pub fn from_json<R: Read>(mut self, reader: R) -> Result<Self> {
        let document: serde_json::Value = serde_json::from_reader(reader)?;
        let serde_json::Value::Object(mut document) = document else {
            return Err(CollectorError::NotAnObject(self.name));
        };

        for (field, field_type) in self.schema.iter() {
            match document.remove(field) {
                None | Some(serde_json::Value::Null) => {
                    tracing::debug!(
                        collector = %self.name,
                        field = %field,
                        "field absent from JSON"
                    );
                }
                Some(value) => {
                    let value = DataValue::from_json(field, field_type, value)?;
                    self.values.insert(field.clone(), value);
                }
            }
        }

        Ok(self)
    }

    /// Serialize the populated fields as one JSON object
    pub fn to_writer<W: Write>(&self, writer: W) -> Result<()> {
        serde_json::to_writer(writer, &self.values)?;
        Ok(())
    }
}

/// Variable input data that can serialize itself for a job attachment
pub trait InputData {
    fn write_json(&self, out: &mut dyn Write) -> Result<()>;
}

impl InputData for Collector {
    fn write_json(&self, out: &mut dyn Write) -> Result<()> {
        self.to_writer(out)
    }
}

impl InputData for serde_json::Value {
    fn write_json(&self, out: &mut dyn Write) -> Result<()> {
        serde_json::to_writer(out, self)?;
        Ok(())
    }
}
