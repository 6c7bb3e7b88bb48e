use serde::{Deserialize, Serialize};

use crate::qcode::mutate::Mutate;
use crate::qcode::select::Select;

/// Operation kind of a compiled plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OpKind {
    #[default]
    Query,
    Mutation,
    Subscription,
}

/// A compiled query plan. Selects live in an arena indexed by their id;
/// `roots` orders the top-level output fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QCode {
    pub op: OpKind,
    pub roots: Vec<usize>,
    pub selects: Vec<Select>,
    #[serde(default)]
    pub mutates: Vec<Mutate>,
    /// Name of the variable carrying the mutation's JSON action input
    #[serde(default)]
    pub action_var: String,
    /// Role the plan was elaborated for (informational at this layer)
    #[serde(default)]
    pub role: String,
}

impl QCode {
    /// A query plan over pre-built selects; roots default to the parentless ones.
    pub fn query(selects: Vec<Select>) -> Self {
        let roots = selects
            .iter()
            .filter(|s| s.parent.is_none())
            .map(|s| s.id)
            .collect();
        Self {
            op: OpKind::Query,
            roots,
            selects,
            mutates: Vec::new(),
            action_var: String::new(),
            role: String::new(),
        }
    }

    /// Select lookup by id. Ids are arena indices; a mismatch is a plan bug.
    pub fn select(&self, id: usize) -> Option<&Select> {
        self.selects.get(id).filter(|s| s.id == id)
    }

    /// The root select that requested cursor pagination, if any.
    /// At most one per plan.
    pub fn root_with_cursor(&self) -> Option<&Select> {
        self.roots
            .iter()
            .filter_map(|id| self.select(*id))
            .find(|s| s.paging.cursor)
    }

    /// Content hash of the plan, used by external caches as the lookup key.
    pub fn fingerprint(&self) -> String {
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        blake3::hash(&bytes).to_hex().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qcode::select::{Column, TableInfo};

    fn users_select(id: usize) -> Select {
        Select::new(
            id,
            TableInfo::new("users", Column::new("id", "bigint")),
            "users",
        )
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let a = QCode::query(vec![users_select(0)]);
        let b = QCode::query(vec![users_select(0)]);
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let a = QCode::query(vec![users_select(0)]);
        let mut b = QCode::query(vec![users_select(0)]);
        b.selects[0].singular = true;
        assert_ne!(a.fingerprint(), b.fingerprint());
    }
}
