//! Declared schemas for the six source tables.
//!
//! Each source lists its columns in order with a semantic type, nullability,
//! a numeric domain and a text normalization. Staging checks raw tables
//! against these declarations before coercing anything.

use serde::{Deserialize, Serialize};

use super::types::DataType;

/// The six CSV sources, in processing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Users,
    Products,
    Orders,
    OrderItems,
    Events,
    Reviews,
}

impl Source {
    pub const ALL: [Source; 6] = [
        Source::Users,
        Source::Products,
        Source::Orders,
        Source::OrderItems,
        Source::Events,
        Source::Reviews,
    ];

    /// Logical table name.
    pub fn name(&self) -> &'static str {
        match self {
            Source::Users => "users",
            Source::Products => "products",
            Source::Orders => "orders",
            Source::OrderItems => "order_items",
            Source::Events => "events",
            Source::Reviews => "reviews",
        }
    }

    /// File name under the raw data directory.
    pub fn file_name(&self) -> String {
        format!("{}.csv", self.name())
    }

    /// The declared schema of this source.
    pub fn schema(&self) -> SourceSchema {
        match self {
            Source::Users => SourceSchema::new(*self, "user_id").columns([
                ColumnSpec::new("user_id", DataType::Text).trimmed(),
                ColumnSpec::new("signup_date", DataType::Date),
                ColumnSpec::new("gender", DataType::Text).normalize(Normalization::Title),
                ColumnSpec::new("city", DataType::Text).trimmed(),
            ]),
            Source::Products => SourceSchema::new(*self, "product_id").columns([
                ColumnSpec::new("product_id", DataType::Text).trimmed(),
                ColumnSpec::new("category", DataType::Text).normalize(Normalization::Title),
                ColumnSpec::new("brand", DataType::Text).trimmed(),
                ColumnSpec::new("price", DataType::Float).domain(Domain::NonNegative),
                ColumnSpec::new("rating", DataType::Float).optional(),
            ]),
            Source::Orders => SourceSchema::new(*self, "order_id").columns([
                ColumnSpec::new("order_id", DataType::Text).trimmed(),
                ColumnSpec::new("user_id", DataType::Text).trimmed(),
                ColumnSpec::new("order_date", DataType::Date),
                ColumnSpec::new("order_status", DataType::Text).normalize(Normalization::Lower),
                ColumnSpec::new("total_amount", DataType::Float).domain(Domain::NonNegative),
            ]),
            Source::OrderItems => SourceSchema::new(*self, "order_item_id").columns([
                ColumnSpec::new("order_item_id", DataType::Text).trimmed(),
                ColumnSpec::new("order_id", DataType::Text).trimmed(),
                ColumnSpec::new("product_id", DataType::Text).trimmed(),
                ColumnSpec::new("quantity", DataType::Integer).domain(Domain::Positive),
                ColumnSpec::new("item_price", DataType::Float).domain(Domain::NonNegative),
                ColumnSpec::new("item_total", DataType::Float).optional(),
            ]),
            Source::Events => SourceSchema::new(*self, "event_id").columns([
                ColumnSpec::new("event_id", DataType::Text).trimmed(),
                ColumnSpec::new("user_id", DataType::Text).trimmed(),
                ColumnSpec::new("event_type", DataType::Text).normalize(Normalization::Lower),
                ColumnSpec::new("event_timestamp", DataType::Timestamp),
                ColumnSpec::new("product_id", DataType::Text).trimmed().optional(),
            ]),
            Source::Reviews => SourceSchema::new(*self, "review_id").columns([
                ColumnSpec::new("review_id", DataType::Text).trimmed(),
                ColumnSpec::new("product_id", DataType::Text).trimmed(),
                ColumnSpec::new("user_id", DataType::Text).trimmed().optional(),
                ColumnSpec::new("rating", DataType::Float)
                    .domain(Domain::Range { min: 1.0, max: 5.0 })
                    .clamped(),
                ColumnSpec::new("review_date", DataType::Date),
            ]),
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Valid range of a numeric column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Any,
    /// `x >= 0`
    NonNegative,
    /// `x > 0`
    Positive,
    /// `min <= x <= max`
    Range { min: f64, max: f64 },
}

impl Domain {
    pub fn contains(&self, x: f64) -> bool {
        match self {
            Domain::Any => true,
            Domain::NonNegative => x >= 0.0,
            Domain::Positive => x > 0.0,
            Domain::Range { min, max } => x >= *min && x <= *max,
        }
    }

    /// Pull `x` into the domain. Only ranges have both bounds to clamp to.
    pub fn clamp(&self, x: f64) -> f64 {
        match self {
            Domain::Range { min, max } => x.clamp(*min, *max),
            Domain::NonNegative => x.max(0.0),
            _ => x,
        }
    }
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Domain::Any => write!(f, "any"),
            Domain::NonNegative => write!(f, ">= 0"),
            Domain::Positive => write!(f, "> 0"),
            Domain::Range { min, max } => write!(f, "[{}, {}]", min, max),
        }
    }
}

/// Text cleanup applied during staging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    None,
    /// Trim and collapse internal whitespace.
    Trim,
    /// Trim, then lower-case.
    Lower,
    /// Trim, then capitalize each word.
    Title,
}

/// Declaration of one column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    pub name: String,
    pub data_type: DataType,
    /// Whether the column must be present in the raw file.
    pub required: bool,
    pub domain: Domain,
    pub normalization: Normalization,
    /// Out-of-domain values are clamped rather than only reported.
    pub clamp: bool,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            required: true,
            domain: Domain::Any,
            normalization: Normalization::None,
            clamp: false,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn domain(mut self, domain: Domain) -> Self {
        self.domain = domain;
        self
    }

    pub fn normalize(mut self, normalization: Normalization) -> Self {
        self.normalization = normalization;
        self
    }

    pub fn trimmed(self) -> Self {
        self.normalize(Normalization::Trim)
    }

    pub fn clamped(mut self) -> Self {
        self.clamp = true;
        self
    }
}

/// Ordered column declarations for one source table.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSchema {
    pub source: Source,
    pub primary_key: String,
    pub columns: Vec<ColumnSpec>,
}

impl SourceSchema {
    pub fn new(source: Source, primary_key: impl Into<String>) -> Self {
        Self {
            source,
            primary_key: primary_key.into(),
            columns: Vec::new(),
        }
    }

    pub fn columns(mut self, cols: impl IntoIterator<Item = ColumnSpec>) -> Self {
        self.columns.extend(cols);
        self
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Names of the columns a raw file must provide.
    pub fn required_columns(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .filter(|c| c.required)
            .map(|c| c.name.as_str())
    }
}
