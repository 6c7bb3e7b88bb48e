//! Compiled query plan (QCode) — the input to the SQL emission core.
//!
//! A QCode arrives fully elaborated: parsing, schema introspection and role
//! resolution have already happened upstream. Everything here is a plain
//! owned value record; ownership is a strict tree from [`QCode`] downward.

pub mod cmd;
pub mod exp;
pub mod mutate;
pub mod select;

pub use self::cmd::{OpKind, QCode};
pub use self::exp::{Exp, ExpOp, Join, Operand, ValType};
pub use self::mutate::{Mutate, MutateCol, MutateKind, RelTail};
pub use self::select::{
    Column, Field, FuncArg, OrderBy, OrderDir, Paging, Rel, RelCol, RelKind, Select,
    SelectType, SkipRender, TableInfo,
};
