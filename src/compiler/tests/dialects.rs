//! Engine-specific emission tests (MySQL, MariaDB, Oracle, Snowflake).

use pretty_assertions::assert_eq;

use super::fixtures::*;
use crate::compiler::{compile, Dialect, MariaDbDialect, SqlDialect};
use crate::error::CompileError;
use crate::qcode::*;

#[test]
fn test_mysql_flat_select() {
    let qc = users_qcode();
    let out = compile(&qc, Dialect::MySQL, &opts()).unwrap();
    assert_eq!(
        out.sql,
        "SELECT JSON_OBJECT('users', COALESCE(`__sj_0`.`json`, '[]')) AS `__root` FROM \
         (SELECT true) AS `__root_x` LEFT OUTER JOIN LATERAL (SELECT \
         COALESCE(JSON_ARRAYAGG(JSON_OBJECT('id', `users_0`.`id`, 'email', \
         `users_0`.`email`)), '[]') AS `json` FROM (SELECT `users_0`.`id`, \
         `users_0`.`email` FROM `users` AS `users_0` LIMIT 20) AS `users_0`) AS `__sj_0` \
         ON true"
    );
}

#[test]
fn test_mariadb_inline_child_plural() {
    let qc = users_posts_qcode();
    let out = compile(&qc, Dialect::MariaDB, &opts()).unwrap();
    assert_eq!(
        out.sql,
        "SELECT JSON_OBJECT('users', JSON_QUERY((SELECT \
         COALESCE(JSON_ARRAYAGG(JSON_OBJECT('id', `_gj_t`.`id`, 'email', `_gj_t`.`email`, \
         'posts', JSON_QUERY((SELECT COALESCE(JSON_ARRAYAGG(JSON_OBJECT('title', \
         `_gj_t`.`title`)), '[]') FROM (SELECT `posts_1`.`title` FROM `posts` AS `posts_1` \
         WHERE (`posts_1`.`user_id` = `_gj_t`.`id`) ORDER BY `posts_1`.`created_at` DESC \
         LIMIT 3) AS `_gj_t`), '$'))), '[]') FROM (SELECT `users_0`.`id`, `users_0`.`email` \
         FROM `users` AS `users_0` LIMIT 20) AS `_gj_t`), '$')) AS `__root` FROM (SELECT \
         true) AS `__root_x`"
    );
}

#[test]
fn test_oracle_singular_select() {
    let mut qc = users_qcode();
    qc.selects[0].singular = true;
    qc.selects[0].field_name = "user".into();
    qc.selects[0].paging = Paging::default();
    qc.selects[0].where_ = Some(Exp::binary(
        ExpOp::Equals,
        Operand::col(Column::new("id", "bigint")),
        Operand::Var("id".into()),
    ));
    let out = compile(&qc, Dialect::Oracle, &opts()).unwrap();
    assert_eq!(
        out.sql,
        "SELECT JSON_OBJECT('user' VALUE JSON_QUERY((SELECT JSON_OBJECT('id' VALUE \
         \"_GJ_T\".\"ID\", 'email' VALUE \"_GJ_T\".\"EMAIL\") FROM (SELECT \
         \"USERS_0\".\"ID\", \"USERS_0\".\"EMAIL\" FROM \"USERS\" \"USERS_0\" WHERE \
         (\"USERS_0\".\"ID\" = :1) FETCH NEXT 1 ROWS ONLY) \"_GJ_T\"), '$') FORMAT JSON) AS \
         \"__ROOT\" FROM DUAL"
    );
    assert_eq!(out.params.len(), 1);
}

#[test]
fn test_snowflake_uses_positional_marks_and_preserves_case() {
    let mut qc = users_qcode();
    qc.selects[0].where_ = Some(Exp::binary(
        ExpOp::Equals,
        Operand::col(Column::new("id", "bigint")),
        Operand::Var("id".into()),
    ));
    let out = compile(&qc, Dialect::Snowflake, &opts()).unwrap();
    assert!(out.sql.contains("WHERE (\"users_0\".\"id\" = ?)"));
    assert!(out.sql.contains("json_build_object('users'"));
}

#[test]
fn test_no_limit_renders_dialect_maximum() {
    let mut qc = users_qcode();
    qc.selects[0].paging.limit = None;
    qc.selects[0].paging.no_limit = true;
    let out = compile(&qc, Dialect::MySQL, &opts()).unwrap();
    assert!(out.sql.contains(" LIMIT 18446744073709551610"));
    // no mandatory limit elsewhere
    let out = compile(&qc, Dialect::Oracle, &opts()).unwrap();
    assert!(!out.sql.contains("FETCH NEXT"));
    let out = compile(&qc, Dialect::Postgres, &opts()).unwrap();
    assert!(!out.sql.contains(" LIMIT"));
}

#[test]
fn test_mysql_offset_forces_limit() {
    let mut qc = users_qcode();
    qc.selects[0].paging.limit = None;
    qc.selects[0].paging.offset = Some(10);
    let out = compile(&qc, Dialect::MySQL, &opts()).unwrap();
    assert!(out.sql.contains(" LIMIT 18446744073709551610 OFFSET 10"));
}

#[test]
fn test_mysql_null_ordering_emulation() {
    let mut qc = users_qcode();
    qc.selects[0].order_by = vec![OrderBy::new(
        Column::new("email", "text"),
        OrderDir::AscNullsLast,
    )];
    let out = compile(&qc, Dialect::MySQL, &opts()).unwrap();
    assert!(out
        .sql
        .contains(" ORDER BY ISNULL(`users_0`.`email`), `users_0`.`email` ASC"));
}

#[test]
fn test_has_key_translates_on_mysql() {
    let mut qc = users_qcode();
    qc.selects[0].where_ = Some(Exp::binary(
        ExpOp::HasKey,
        Operand::col(Column::new("profile", "json").json()),
        Operand::str("phone"),
    ));
    let out = compile(&qc, Dialect::MySQL, &opts()).unwrap();
    assert!(out
        .sql
        .contains("JSON_CONTAINS_PATH(`users_0`.`profile`, 'one', '$.phone')"));
}

#[test]
fn test_has_key_unsupported_on_snowflake() {
    let mut qc = users_qcode();
    qc.selects[0].where_ = Some(Exp::binary(
        ExpOp::HasKey,
        Operand::col(Column::new("profile", "json").json()),
        Operand::str("phone"),
    ));
    let err = compile(&qc, Dialect::Snowflake, &opts()).unwrap_err();
    assert!(matches!(
        err,
        CompileError::UnsupportedOperator {
            op: "has_key",
            dialect: "snowflake"
        }
    ));
}

#[test]
fn test_similar_unsupported_on_mysql() {
    let mut qc = users_qcode();
    qc.selects[0].where_ = Some(Exp::binary(
        ExpOp::Similar,
        Operand::col(Column::new("email", "text")),
        Operand::str("%(a|b)%"),
    ));
    let err = compile(&qc, Dialect::MySQL, &opts()).unwrap_err();
    assert!(matches!(
        err,
        CompileError::UnsupportedOperator { op: "similar", .. }
    ));
}

#[test]
fn test_geo_unsupported_on_oracle() {
    let mut qc = users_qcode();
    qc.selects[0].where_ = Some(Exp::binary(
        ExpOp::GeoIntersects,
        Operand::col(Column::new("area", "geometry")),
        Operand::Var("geo".into()),
    ));
    let err = compile(&qc, Dialect::Oracle, &opts()).unwrap_err();
    assert!(matches!(err, CompileError::UnsupportedFeature { .. }));
}

#[test]
fn test_geo_intersects_on_postgres() {
    let mut qc = users_qcode();
    qc.selects[0].where_ = Some(Exp::binary(
        ExpOp::GeoIntersects,
        Operand::col(Column::new("area", "geometry")),
        Operand::Var("geo".into()),
    ));
    let out = compile(&qc, Dialect::Postgres, &opts()).unwrap();
    assert!(out
        .sql
        .contains("ST_Intersects(\"users_0\".\"area\", ST_GeomFromGeoJSON($1))"));
}

#[test]
fn test_in_variable_per_dialect() {
    let mut qc = users_qcode();
    qc.selects[0].where_ = Some(Exp::binary(
        ExpOp::In,
        Operand::col(Column::new("id", "bigint")),
        Operand::Var("ids".into()),
    ));
    let pg = compile(&qc, Dialect::Postgres, &opts()).unwrap();
    assert!(pg.sql.contains("\"users_0\".\"id\" = ANY($1)"));
    assert!(pg.params[0].is_array);
    assert!(pg.params[0].wrap_in_array);

    let my = compile(&qc, Dialect::MySQL, &opts()).unwrap();
    assert!(my
        .sql
        .contains("JSON_CONTAINS(?, CAST(`users_0`.`id` AS JSON))"));

    let ora = compile(&qc, Dialect::Oracle, &opts()).unwrap();
    assert!(ora.sql.contains(
        "\"USERS_0\".\"ID\" IN (SELECT \"_JT\".\"V\" FROM JSON_TABLE(:1, '$[*]' COLUMNS \
         (\"V\" NUMBER PATH '$')) \"_JT\")"
    ));
}

#[test]
fn test_json_path_operand_per_dialect() {
    let mut qc = users_qcode();
    qc.selects[0].where_ = Some(Exp::binary(
        ExpOp::Equals,
        Operand::Col {
            col: Column::new("profile", "json").json(),
            table: None,
            sel_id: None,
            path: vec!["address".into(), "city".into()],
        },
        Operand::str("berlin"),
    ));
    let pg = compile(&qc, Dialect::Postgres, &opts()).unwrap();
    assert!(pg
        .sql
        .contains("\"users_0\".\"profile\"->'address'->>'city' = 'berlin'"));

    let my = compile(&qc, Dialect::MySQL, &opts()).unwrap();
    assert!(my.sql.contains(
        "JSON_UNQUOTE(JSON_EXTRACT(`users_0`.`profile`, '$.address.city')) = 'berlin'"
    ));

    let ora = compile(&qc, Dialect::Oracle, &opts()).unwrap();
    assert!(ora
        .sql
        .contains("JSON_VALUE(\"USERS_0\".\"PROFILE\", '$.address.city') = 'berlin'"));
}

#[test]
fn test_full_text_search_per_dialect() {
    let mut qc = users_qcode();
    qc.selects[0].where_ = Some(Exp::binary(
        ExpOp::TsQuery,
        Operand::col(Column::new("bio", "text")),
        Operand::Var("q".into()),
    ));
    let pg = compile(&qc, Dialect::Postgres, &opts()).unwrap();
    assert!(pg
        .sql
        .contains("to_tsvector(\"users_0\".\"bio\") @@ websearch_to_tsquery($1)"));

    let my = compile(&qc, Dialect::MySQL, &opts()).unwrap();
    assert!(my
        .sql
        .contains("MATCH(`users_0`.`bio`) AGAINST(? IN NATURAL LANGUAGE MODE)"));

    let err = compile(&qc, Dialect::Snowflake, &opts()).unwrap_err();
    assert!(matches!(err, CompileError::UnsupportedFeature { .. }));
}

#[test]
fn test_boolean_literal_as_int_on_oracle() {
    let mut qc = users_qcode();
    qc.selects[0].where_ = Some(Exp::binary(
        ExpOp::Equals,
        Operand::col(Column::new("active", "boolean")),
        Operand::bool(true),
    ));
    let out = compile(&qc, Dialect::Oracle, &opts()).unwrap();
    assert!(out.sql.contains("\"USERS_0\".\"ACTIVE\" = 1"));

    let out = compile(&qc, Dialect::Postgres, &opts()).unwrap();
    assert!(out.sql.contains("\"users_0\".\"active\" = true"));
}

#[test]
fn test_oracle_empty_select_renders_null() {
    let table = TableInfo::new("secrets", Column::new("id", "bigint"));
    let mut s = Select::new(0, table, "secrets");
    s.singular = true;
    let qc = QCode::query(vec![s]);
    let out = compile(&qc, Dialect::Oracle, &opts()).unwrap();
    assert!(out.sql.contains("JSON_QUERY((SELECT NULL FROM (SELECT"));
}

#[test]
fn test_mariadb_returning_version_gate() {
    // the fully-featured variant is canonical: RETURNING is version-gated
    assert!(MariaDbDialect::default().supports_returning());
    assert!(MariaDbDialect::with_version(100502).supports_returning());
    assert!(!MariaDbDialect::with_version(100411).supports_returning());
}

#[test]
fn test_mariadb_recursive_or_chain() {
    let table = TableInfo::new("comments", Column::new("id", "bigint"));
    let mut root = Select::new(0, table.clone(), "comments");
    root.fields = vec![Field::col(Column::new("id", "bigint"))];
    root.children = vec![1];
    let mut replies = Select::new(1, table, "replies");
    replies.parent = Some(0);
    replies.fields = vec![Field::col(Column::new("body", "text"))];
    replies.paging.limit = Some(3);
    replies.rel = Some(Rel {
        kind: RelKind::Recursive,
        left: RelCol {
            table: "comments".into(),
            col: Column::new("reply_to_id", "bigint"),
            array: false,
        },
        right: RelCol {
            table: "comments".into(),
            col: Column::new("id", "bigint"),
            array: false,
        },
    });
    let qc = QCode::query(vec![root, replies]);
    let out = compile(&qc, Dialect::MariaDB, &opts()).unwrap();
    // depth bounded by the user limit: direct children plus two IN levels
    assert!(out.sql.contains("`comments_1`.`reply_to_id` = `_gj_t`.`id` OR"));
    assert!(out.sql.contains(
        "`comments_1`.`reply_to_id` IN (SELECT `id` FROM `comments` WHERE `reply_to_id` = \
         `_gj_t`.`id`)"
    ));
    assert!(out.sql.contains(
        "IN (SELECT `id` FROM `comments` WHERE `reply_to_id` IN (SELECT `id` FROM `comments` \
         WHERE `reply_to_id` = `_gj_t`.`id`))"
    ));
}

#[test]
fn test_mysql_subscription_unbox() {
    let mut qc = users_qcode();
    qc.op = OpKind::Subscription;
    qc.selects[0].where_ = Some(Exp::binary(
        ExpOp::Equals,
        Operand::col(Column::new("id", "bigint")),
        Operand::Var("id".into()),
    ));
    let out = compile(&qc, Dialect::MySQL, &opts()).unwrap();
    assert!(out.sql.starts_with(
        "SELECT `__sub`.`__root` FROM JSON_TABLE(?, '$[*]' COLUMNS(`id` BIGINT PATH \
         '$.id')) AS `_sg_sub`, LATERAL ("
    ));
    assert!(out.sql.contains("`users_0`.`id` = `_sg_sub`.`id`"));
}

#[test]
fn test_subscription_falls_back_without_batching() {
    let mut qc = users_qcode();
    qc.op = OpKind::Subscription;
    qc.selects[0].where_ = Some(Exp::binary(
        ExpOp::Equals,
        Operand::col(Column::new("id", "bigint")),
        Operand::Var("id".into()),
    ));
    let out = compile(&qc, Dialect::Oracle, &opts()).unwrap();
    assert!(out.sql.starts_with("SELECT JSON_OBJECT("));
    assert!(out.sql.contains(":1"));
}

#[test]
fn test_array_relationship_per_dialect() {
    let mut qc = users_posts_qcode();
    // parent holds the FK list: users.post_ids is a JSON array of post ids
    if let Some(rel) = &mut qc.selects[1].rel {
        rel.left = RelCol {
            table: "posts".into(),
            col: Column::new("id", "bigint"),
            array: false,
        };
        rel.right = RelCol {
            table: "users".into(),
            col: Column::new("post_ids", "json").json(),
            array: true,
        };
    }
    let pg = compile(&qc, Dialect::Postgres, &opts()).unwrap();
    assert!(pg.sql.contains(
        "\"posts_1\".\"id\" IN (SELECT CAST(\"j\".\"value\" AS bigint) FROM \
         json_array_elements_text(\"users_0\".\"post_ids\") AS \"j\")"
    ));

    let my = compile(&qc, Dialect::MySQL, &opts()).unwrap();
    assert!(my.sql.contains(
        "JSON_CONTAINS(`users_0`.`post_ids`, CAST(`posts_1`.`id` AS JSON))"
    ));
}

#[test]
fn test_split_script_is_shared_across_dialects() {
    let d = MariaDbDialect::default();
    let parts = d.split_script("SELECT 1; SELECT 'a;b';");
    assert_eq!(parts, vec!["SELECT 1", "SELECT 'a;b'"]);
}
