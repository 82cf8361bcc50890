use serde::Serialize;

/// Native storage representation of a column, used both for schema display
/// and for coercing filter values before they are bound into a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Integer,
    Float,
    Text,
    DateTime,
}

/// Static schema descriptor for one entity column. Each entity declares its
/// descriptors once; the filter builder and the `/columns` endpoints both
/// consume the same list.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Column {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub kind: ColumnKind,
    pub nullable: bool,
    pub primary_key: bool,
    pub unique: bool,
}
