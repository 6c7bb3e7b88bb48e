use serde::{Deserialize, Serialize};

use crate::qcode::select::Column;

/// Filter operator tag. One flat enum so dialect keyword tables are
/// exhaustive matches and a missing engine mapping fails at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpOp {
    And,
    Or,
    Not,
    Equals,
    NotEquals,
    GreaterThan,
    GreaterOrEquals,
    LesserThan,
    LesserOrEquals,
    In,
    NotIn,
    Like,
    NotLike,
    ILike,
    NotILike,
    Similar,
    NotSimilar,
    Regex,
    NotRegex,
    IRegex,
    NotIRegex,
    Contains,
    ContainedIn,
    HasKey,
    HasKeyAny,
    HasKeyAll,
    IsNull,
    IsNotNull,
    /// Full-text search against the dialect's FTS primitive
    TsQuery,
    /// EXISTS over the expression's sub-joins
    SelectExists,
    /// `@skip(if: $var)` — true when the variable is true
    EqualsTrue,
    /// `@include(if: $var)` — true when the variable is not true
    NotEqualsTrue,
    /// Spatial intersection test
    GeoIntersects,
    /// Spatial containment test
    GeoContains,
    /// Distance-within test
    GeoDwithin,
}

impl ExpOp {
    /// Stable lowercase name used in error messages.
    pub fn name(self) -> &'static str {
        match self {
            ExpOp::And => "and",
            ExpOp::Or => "or",
            ExpOp::Not => "not",
            ExpOp::Equals => "eq",
            ExpOp::NotEquals => "neq",
            ExpOp::GreaterThan => "gt",
            ExpOp::GreaterOrEquals => "gte",
            ExpOp::LesserThan => "lt",
            ExpOp::LesserOrEquals => "lte",
            ExpOp::In => "in",
            ExpOp::NotIn => "nin",
            ExpOp::Like => "like",
            ExpOp::NotLike => "nlike",
            ExpOp::ILike => "ilike",
            ExpOp::NotILike => "nilike",
            ExpOp::Similar => "similar",
            ExpOp::NotSimilar => "nsimilar",
            ExpOp::Regex => "regex",
            ExpOp::NotRegex => "nregex",
            ExpOp::IRegex => "iregex",
            ExpOp::NotIRegex => "niregex",
            ExpOp::Contains => "contains",
            ExpOp::ContainedIn => "contained_in",
            ExpOp::HasKey => "has_key",
            ExpOp::HasKeyAny => "has_key_any",
            ExpOp::HasKeyAll => "has_key_all",
            ExpOp::IsNull => "is_null",
            ExpOp::IsNotNull => "is_not_null",
            ExpOp::TsQuery => "search",
            ExpOp::SelectExists => "exists",
            ExpOp::EqualsTrue => "eq_true",
            ExpOp::NotEqualsTrue => "neq_true",
            ExpOp::GeoIntersects => "intersects",
            ExpOp::GeoContains => "st_contains",
            ExpOp::GeoDwithin => "dwithin",
        }
    }
}

/// Literal value class of an [`Operand`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValType {
    Str,
    Num,
    Bool,
}

/// One side of a filter comparison.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Operand {
    #[default]
    None,
    /// Column reference, optionally scoped to an enclosing select and/or a
    /// JSON subpath within the column
    Col {
        col: Column,
        /// Explicit table override (joined tables, parent references)
        #[serde(default)]
        table: Option<String>,
        /// Scope the column to a particular enclosing select
        #[serde(default)]
        sel_id: Option<usize>,
        /// JSON subpath segments below the column
        #[serde(default)]
        path: Vec<String>,
    },
    /// Pre-rendered literal text plus its value class
    Val { v: String, vt: ValType },
    /// Named query variable, bound as a parameter
    Var(String),
    /// Session-local database variable captured by a linear script
    DbVar(String),
    /// Literal list (IN lists and array constructors)
    List { items: Vec<String>, vt: ValType },
}

impl Operand {
    pub fn col(col: Column) -> Self {
        Operand::Col {
            col,
            table: None,
            sel_id: None,
            path: Vec::new(),
        }
    }

    pub fn str(v: impl Into<String>) -> Self {
        Operand::Val {
            v: v.into(),
            vt: ValType::Str,
        }
    }

    pub fn num(v: impl Into<String>) -> Self {
        Operand::Val {
            v: v.into(),
            vt: ValType::Num,
        }
    }

    pub fn bool(v: bool) -> Self {
        Operand::Val {
            v: v.to_string(),
            vt: ValType::Bool,
        }
    }
}

/// A join pulled in by a filter that crosses tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Join {
    pub table: String,
    pub on: Box<Exp>,
}

/// Filter expression tree node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exp {
    pub op: ExpOp,
    #[serde(default)]
    pub left: Operand,
    #[serde(default)]
    pub right: Operand,
    /// Children of And / Or / Not
    #[serde(default)]
    pub children: Vec<Exp>,
    /// Sub-joins for cross-table filters (SelectExists)
    #[serde(default)]
    pub joins: Vec<Join>,
}

impl Exp {
    /// Binary comparison node.
    pub fn binary(op: ExpOp, left: Operand, right: Operand) -> Self {
        Self {
            op,
            left,
            right,
            children: Vec::new(),
            joins: Vec::new(),
        }
    }

    /// AND over several children.
    pub fn and(children: Vec<Exp>) -> Self {
        Self {
            op: ExpOp::And,
            left: Operand::None,
            right: Operand::None,
            children,
            joins: Vec::new(),
        }
    }

    /// OR over several children.
    pub fn or(children: Vec<Exp>) -> Self {
        Self {
            op: ExpOp::Or,
            left: Operand::None,
            right: Operand::None,
            children,
            joins: Vec::new(),
        }
    }

    /// NOT over a single child.
    pub fn not(child: Exp) -> Self {
        Self {
            op: ExpOp::Not,
            left: Operand::None,
            right: Operand::None,
            children: vec![child],
            joins: Vec::new(),
        }
    }
}
