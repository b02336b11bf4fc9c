//! Query Model
//!
//! Requests and responses exchanged with query backends. The same shapes
//! are used on the wire (JSON) and in process.
//!
//! # Example
//!
//! ```text
//! SearchRequest
//! ├── key
//! ├── query
//! │   ├── data_source: DocRef { type, uuid }
//! │   └── expression: AND
//! │       ├── Term(colour EQUALS red)
//! │       └── Term(timestamp BETWEEN "1000,2000")
//! └── result_requests: [ResultRequest { component_id: "table-1", fields }]
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Reference to a document (data source) held by some backend
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocRef {
    /// Backend type this document belongs to
    #[serde(rename = "type")]
    pub doc_type: String,
    pub uuid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl DocRef {
    pub fn new(doc_type: impl Into<String>, uuid: impl Into<String>) -> Self {
        Self {
            doc_type: doc_type.into(),
            uuid: uuid.into(),
            name: None,
        }
    }

    /// Builder method: set display name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl fmt::Display for DocRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}:{} ({})", self.doc_type, self.uuid, name),
            None => write!(f, "{}:{}", self.doc_type, self.uuid),
        }
    }
}

// ==================== Expressions ====================

/// Boolean operator of an expression node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Op {
    And,
    Or,
    Not,
}

/// Comparison applied by a term
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Condition {
    Equals,
    Contains,
    In,
    GreaterThan,
    GreaterThanOrEqualTo,
    LessThan,
    LessThanOrEqualTo,
    /// Value is `"from,to"`, from inclusive, to exclusive
    Between,
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Condition::Equals => "=",
            Condition::Contains => "contains",
            Condition::In => "in",
            Condition::GreaterThan => ">",
            Condition::GreaterThanOrEqualTo => ">=",
            Condition::LessThan => "<",
            Condition::LessThanOrEqualTo => "<=",
            Condition::Between => "between",
        };
        f.write_str(s)
    }
}

fn enabled() -> bool {
    true
}

/// Leaf of an expression tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpressionTerm {
    pub field: String,
    pub condition: Condition,
    pub value: String,
    #[serde(default = "enabled")]
    pub enabled: bool,
}

impl ExpressionTerm {
    pub fn new(field: impl Into<String>, condition: Condition, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            condition,
            value: value.into(),
            enabled: true,
        }
    }
}

/// Inner node of an expression tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpressionOperator {
    pub op: Op,
    #[serde(default)]
    pub children: Vec<ExpressionItem>,
    #[serde(default = "enabled")]
    pub enabled: bool,
}

impl ExpressionOperator {
    pub fn new(op: Op) -> Self {
        Self {
            op,
            children: Vec::new(),
            enabled: true,
        }
    }

    pub fn and() -> Self {
        Self::new(Op::And)
    }

    pub fn or() -> Self {
        Self::new(Op::Or)
    }

    pub fn not() -> Self {
        Self::new(Op::Not)
    }

    /// Builder method: add a term
    pub fn term(mut self, field: impl Into<String>, condition: Condition, value: impl Into<String>) -> Self {
        self.children
            .push(ExpressionItem::Term(ExpressionTerm::new(field, condition, value)));
        self
    }

    /// Builder method: add a nested operator
    pub fn operator(mut self, operator: ExpressionOperator) -> Self {
        self.children.push(ExpressionItem::Operator(operator));
        self
    }

    /// Builder method: enable or disable this node
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Enabled terms reachable through enabled AND nodes only
    ///
    /// These are the terms every matching row must satisfy.
    pub fn conjunctive_terms(&self) -> Vec<&ExpressionTerm> {
        let mut terms = Vec::new();
        if self.enabled && self.op == Op::And {
            self.collect_conjunctive(&mut terms);
        }
        terms
    }

    fn collect_conjunctive<'a>(&'a self, terms: &mut Vec<&'a ExpressionTerm>) {
        for child in &self.children {
            match child {
                ExpressionItem::Term(term) if term.enabled => terms.push(term),
                ExpressionItem::Operator(op) if op.enabled && op.op == Op::And => {
                    op.collect_conjunctive(terms)
                }
                _ => {}
            }
        }
    }
}

impl Default for ExpressionOperator {
    fn default() -> Self {
        Self::and()
    }
}

/// Either a nested operator or a term
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ExpressionItem {
    Operator(ExpressionOperator),
    Term(ExpressionTerm),
}

// ==================== Requests ====================

/// Named parameter passed through to the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    pub key: String,
    pub value: String,
}

/// What to search and where
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub data_source: DocRef,
    #[serde(default)]
    pub expression: ExpressionOperator,
    #[serde(default)]
    pub params: Vec<Param>,
}

impl Query {
    pub fn new(data_source: DocRef, expression: ExpressionOperator) -> Self {
        Self {
            data_source,
            expression,
            params: Vec::new(),
        }
    }
}

/// Window into a result set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffsetRange {
    pub offset: u64,
    pub length: u64,
}

/// Shape of one result table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRequest {
    pub component_id: String,
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_range: Option<OffsetRange>,
}

impl ResultRequest {
    pub fn new(component_id: impl Into<String>) -> Self {
        Self {
            component_id: component_id.into(),
            fields: Vec::new(),
            requested_range: None,
        }
    }

    /// Builder method: add a field
    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.fields.push(name.into());
        self
    }

    /// Builder method: restrict to a page of rows
    pub fn range(mut self, offset: u64, length: u64) -> Self {
        self.requested_range = Some(OffsetRange { offset, length });
        self
    }
}

/// A complete search request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub key: String,
    pub query: Query,
    #[serde(default)]
    pub result_requests: Vec<ResultRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_time_locale: Option<String>,
    #[serde(default)]
    pub incremental: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl SearchRequest {
    /// New request with a random key
    pub fn new(query: Query) -> Self {
        Self {
            key: uuid::Uuid::new_v4().to_string(),
            query,
            result_requests: Vec::new(),
            date_time_locale: None,
            incremental: false,
            timeout_ms: None,
        }
    }

    /// Builder method: add a result request
    pub fn result_request(mut self, request: ResultRequest) -> Self {
        self.result_requests.push(request);
        self
    }

    /// Builder method: set the key
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn data_source(&self) -> &DocRef {
        &self.query.data_source
    }
}

// ==================== Responses ====================

/// One row of a result table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    pub values: Vec<Option<String>>,
    #[serde(default)]
    pub depth: u32,
}

impl Row {
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            values: values.into_iter().map(|v| Some(v.into())).collect(),
            depth: 0,
        }
    }
}

/// Rows produced for one result request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableResult {
    pub component_id: String,
    #[serde(default)]
    pub rows: Vec<Row>,
    #[serde(default)]
    pub total_results: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TableResult {
    pub fn new(component_id: impl Into<String>, rows: Vec<Row>) -> Self {
        let total_results = rows.len() as u64;
        Self {
            component_id: component_id.into(),
            rows,
            total_results,
            error: None,
        }
    }
}

/// Backend answer to a search request
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub results: Vec<TableResult>,
    #[serde(default)]
    pub highlights: Vec<String>,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub complete: bool,
}

impl SearchResponse {
    /// Total rows across all tables
    pub fn row_count(&self) -> usize {
        self.results.iter().map(|r| r.rows.len()).sum()
    }

    /// Table for a component, if present
    pub fn table(&self, component_id: &str) -> Option<&TableResult> {
        self.results.iter().find(|r| r.component_id == component_id)
    }
}

// ==================== Data Sources ====================

/// Kind of value a field holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldType {
    Id,
    Boolean,
    Integer,
    Long,
    Float,
    Double,
    Date,
    Field,
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSourceField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default = "enabled")]
    pub queryable: bool,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl DataSourceField {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            queryable: true,
            conditions: Vec::new(),
        }
    }
}

/// Schema of a data source
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DataSource {
    #[serde(default)]
    pub fields: Vec<DataSourceField>,
}

impl DataSource {
    pub fn field(&self, name: &str) -> Option<&DataSourceField> {
        self.fields.iter().find(|f| f.name == name)
    }
}
