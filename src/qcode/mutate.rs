use serde::{Deserialize, Serialize};

use crate::qcode::exp::Exp;
use crate::qcode::select::{Column, Rel, TableInfo};

/// Mutation operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MutateKind {
    Insert,
    Update,
    Upsert,
    /// Attach existing rows by rewriting their FK
    Connect,
    /// Detach rows by nulling their FK
    Disconnect,
    Delete,
}

impl MutateKind {
    pub fn name(self) -> &'static str {
        match self {
            MutateKind::Insert => "insert",
            MutateKind::Update => "update",
            MutateKind::Upsert => "upsert",
            MutateKind::Connect => "connect",
            MutateKind::Disconnect => "disconnect",
            MutateKind::Delete => "delete",
        }
    }
}

/// A column written by a mutation, bound to a field of the JSON action input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutateCol {
    pub col: Column,
    /// Field name inside the action-input payload this column reads from
    pub field_name: String,
    /// Fixed value overriding the payload lookup (presets)
    #[serde(default)]
    pub value: Option<String>,
}

impl MutateCol {
    pub fn new(col: Column) -> Self {
        let field_name = col.name.clone();
        Self {
            col,
            field_name,
            value: None,
        }
    }
}

/// FK mirror of a dependent mutation: this mutation writes `col`, the value
/// comes from the captured output of mutation `mutate_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelTail {
    pub col: Column,
    pub mutate_id: usize,
    /// Column read from the dependency's captured row
    pub src_col: Column,
}

/// One node of a mutation plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mutate {
    pub id: usize,
    #[serde(default)]
    pub parent: Option<usize>,
    pub kind: MutateKind,
    pub table: TableInfo,
    /// Relationship to the parent mutation (None at the root)
    #[serde(default)]
    pub rel: Option<Rel>,
    /// Payload is a JSON array (bulk mutation)
    #[serde(default)]
    pub is_array: bool,
    /// Payload arrives as opaque JSON and is unpacked dialect-side
    #[serde(default)]
    pub is_json: bool,
    /// Path of this mutation's payload inside the root action variable
    #[serde(default)]
    pub path: Vec<String>,
    pub cols: Vec<MutateCol>,
    /// FK mirrors of dependency outputs
    #[serde(default)]
    pub rcols: Vec<RelTail>,
    #[serde(default)]
    pub where_: Option<Exp>,
    /// Ids of mutations whose captured output this one consumes
    #[serde(default)]
    pub depends_on: Vec<usize>,
}

impl Mutate {
    pub fn new(id: usize, kind: MutateKind, table: TableInfo) -> Self {
        Self {
            id,
            parent: None,
            kind,
            table,
            rel: None,
            is_array: false,
            is_json: false,
            path: Vec::new(),
            cols: Vec::new(),
            rcols: Vec::new(),
            where_: None,
            depends_on: Vec::new(),
        }
    }

    /// Session variable / CTE discriminator for this mutation's captured ids.
    pub fn tag(&self) -> String {
        format!("{}_{}", self.table.name, self.id)
    }
}
