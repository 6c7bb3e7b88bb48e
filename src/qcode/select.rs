use serde::{Deserialize, Serialize};

use crate::qcode::exp::Exp;

/// A database table reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableInfo {
    /// Schema qualifier (None for the connection default)
    #[serde(default)]
    pub schema: Option<String>,
    /// Table name
    pub name: String,
    /// Primary key column
    pub pk: Column,
}

impl TableInfo {
    pub fn new(name: impl Into<String>, pk: Column) -> Self {
        Self {
            schema: None,
            name: name.into(),
            pk,
        }
    }
}

/// Column metadata carried by fields, operands and relationships.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name
    pub name: String,
    /// Declared SQL type (as introspected, e.g. "bigint", "character varying")
    pub col_type: String,
    /// Array-valued column
    #[serde(default)]
    pub is_array: bool,
    /// JSON / JSONB column
    #[serde(default)]
    pub is_json: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, col_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            col_type: col_type.into(),
            is_array: false,
            is_json: false,
        }
    }

    pub fn array(mut self) -> Self {
        self.is_array = true;
        self
    }

    pub fn json(mut self) -> Self {
        self.is_json = true;
        self
    }
}

/// How a select relates to its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelKind {
    /// FK on the current side points at a single parent row
    OneToOne,
    /// FK on the current side, parent owns many rows
    OneToMany,
    /// Rows nested inside a JSON column of the parent
    Embedded,
    /// Self-referencing relationship (trees of comments, categories, ...)
    Recursive,
}

/// One side of a relationship.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelCol {
    /// Owning table of the column
    pub table: String,
    /// The column itself
    pub col: Column,
    /// FK stored as a JSON array of keys instead of a scalar
    #[serde(default)]
    pub array: bool,
}

/// Relationship descriptor. `left` belongs to the current select's side,
/// `right` to the other side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rel {
    pub kind: RelKind,
    pub left: RelCol,
    pub right: RelCol,
}

/// Ordering direction, including explicit NULLS placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderDir {
    Asc,
    Desc,
    AscNullsFirst,
    DescNullsFirst,
    AscNullsLast,
    DescNullsLast,
}

/// One ORDER BY entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBy {
    pub col: Column,
    pub dir: OrderDir,
    /// Order by the column's position inside this variable's array value
    #[serde(default)]
    pub var: Option<String>,
    /// Tenant-selected ordering: apply this entry only when the variable
    /// named `key_var` equals `key` at execution time
    #[serde(default)]
    pub key_var: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
}

impl OrderBy {
    pub fn new(col: Column, dir: OrderDir) -> Self {
        Self {
            col,
            dir,
            var: None,
            key_var: None,
            key: None,
        }
    }
}

/// Pagination settings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Paging {
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub limit_var: Option<String>,
    #[serde(default)]
    pub offset: Option<u64>,
    #[serde(default)]
    pub offset_var: Option<String>,
    /// Emit the dialect's maximum instead of a numeric limit
    #[serde(default)]
    pub no_limit: bool,
    /// Keyset pagination requested: the compiled JSON gains a cursor field
    #[serde(default)]
    pub cursor: bool,
    /// Variable holding an existing cursor payload to continue from
    #[serde(default)]
    pub cursor_var: Option<String>,
}

/// Role/disposition applied to a select or field that the requesting role
/// may not (fully) see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SkipRender {
    #[default]
    None,
    /// Render the field with a NULL value so the JSON shape is role-stable
    Nulled,
    /// Blocked by policy; NULL placeholder
    Blocked,
    /// Requires a signed-in user; NULL placeholder
    UserNeeded,
    /// Resolved by a remote service; produces no SQL
    Remote,
    /// Dropped entirely; produces no SQL
    Drop,
}

impl SkipRender {
    /// The select/field contributes no SQL at all.
    pub fn is_absent(self) -> bool {
        matches!(self, SkipRender::Remote | SkipRender::Drop)
    }

    /// The select/field renders as a NULL placeholder.
    pub fn is_nulled(self) -> bool {
        matches!(
            self,
            SkipRender::Nulled | SkipRender::Blocked | SkipRender::UserNeeded
        )
    }
}

/// Select node type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SelectType {
    #[default]
    Regular,
    Union,
    Remote,
    /// Rows unpacked from a JSON column of the parent
    Json,
}

/// An argument to an aggregate/function field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FuncArg {
    Col(Column),
    Val(String),
}

/// One output field of a select.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Field {
    /// Plain column reference
    Col {
        col: Column,
        alias: String,
        #[serde(default)]
        skip: SkipRender,
        /// @skip/@include style field filter
        #[serde(default)]
        filter: Option<Exp>,
    },
    /// Aggregate or scalar function call
    Func {
        name: String,
        args: Vec<FuncArg>,
        alias: String,
    },
    /// The `__typename` marker
    Typename { alias: String },
}

impl Field {
    pub fn col(col: Column) -> Self {
        let alias = col.name.clone();
        Field::Col {
            col,
            alias,
            skip: SkipRender::None,
            filter: None,
        }
    }

    pub fn alias(&self) -> &str {
        match self {
            Field::Col { alias, .. } => alias,
            Field::Func { alias, .. } => alias,
            Field::Typename { alias } => alias,
        }
    }
}

/// One output node of the query tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Select {
    /// Stable numeric id, unique within the QCode; doubles as the alias suffix
    pub id: usize,
    /// Parent select id (None for roots)
    #[serde(default)]
    pub parent: Option<usize>,
    pub table: TableInfo,
    /// Output field name in the JSON document
    pub field_name: String,
    /// Singular cardinality renders an object, plural an array
    #[serde(default)]
    pub singular: bool,
    pub fields: Vec<Field>,
    #[serde(default)]
    pub children: Vec<usize>,
    #[serde(default)]
    pub order_by: Vec<OrderBy>,
    #[serde(default)]
    pub paging: Paging,
    #[serde(default)]
    pub where_: Option<Exp>,
    /// Relationship to the parent select (None for roots)
    #[serde(default)]
    pub rel: Option<Rel>,
    #[serde(default)]
    pub typ: SelectType,
    #[serde(default)]
    pub skip: SkipRender,
    /// Emit a `__typename` field
    #[serde(default)]
    pub typename: bool,
    /// Group by all non-aggregated columns
    #[serde(default)]
    pub group_by: bool,
    /// DISTINCT ON these columns
    #[serde(default)]
    pub distinct_on: Vec<Column>,
}

impl Select {
    /// A bare select over a table; tests and plan builders fill in the rest.
    pub fn new(id: usize, table: TableInfo, field_name: impl Into<String>) -> Self {
        Self {
            id,
            parent: None,
            table,
            field_name: field_name.into(),
            singular: false,
            fields: Vec::new(),
            children: Vec::new(),
            order_by: Vec::new(),
            paging: Paging::default(),
            where_: None,
            rel: None,
            typ: SelectType::Regular,
            skip: SkipRender::None,
            typename: false,
            group_by: false,
            distinct_on: Vec::new(),
        }
    }

    /// FROM-clause alias: `<table>_<id>`, deterministic across compiles.
    pub fn table_alias(&self) -> String {
        format!("{}_{}", self.table.name, self.id)
    }
}
