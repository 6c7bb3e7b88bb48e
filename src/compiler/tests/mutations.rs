//! Mutation compilation tests: writable-CTE and linear strategies.

use pretty_assertions::assert_eq;

use super::fixtures::*;
use crate::compiler::{compile, Dialect};
use crate::error::CompileError;
use crate::qcode::*;

#[test]
fn test_linear_bulk_insert_mysql() {
    let qc = insert_users_bulk_qcode();
    let out = compile(&qc, Dialect::MySQL, &opts()).unwrap();
    assert_eq!(
        out.sql,
        "SET SESSION sql_mode = CONCAT(@@sql_mode, ',ANSI_QUOTES'); INSERT INTO `users` \
         (`full_name`, `email`) SELECT `_jt`.`full_name`, `_jt`.`email` FROM JSON_TABLE(?, \
         '$[*]' COLUMNS(`full_name` VARCHAR(255) PATH '$.full_name', `email` VARCHAR(255) \
         PATH '$.email')) AS `_jt`; SET @users_0 = LAST_INSERT_ID(); SELECT \
         JSON_OBJECT('users', COALESCE(`__sj_0`.`json`, '[]')) AS `__root` FROM (SELECT \
         true) AS `__root_x` LEFT OUTER JOIN LATERAL (SELECT \
         COALESCE(JSON_ARRAYAGG(JSON_OBJECT('id', `users_0`.`id`, 'full_name', \
         `users_0`.`full_name`)), '[]') AS `json` FROM (SELECT `users_0`.`id`, \
         `users_0`.`full_name` FROM `users` AS `users_0` WHERE (`users_0`.`id` >= \
         @users_0)) AS `users_0`) AS `__sj_0` ON true"
    );
    assert_eq!(out.params.len(), 1);
    assert_eq!(out.params[0].name, "data");
}

#[test]
fn test_writable_cte_with_dependency_postgres() {
    let qc = author_book_qcode();
    let out = compile(&qc, Dialect::Postgres, &opts()).unwrap();
    assert_eq!(
        out.sql,
        "WITH \"_sg_input\" AS (SELECT CAST($1 AS json) AS \"j\"), \"author\" AS (INSERT \
         INTO \"author\" (\"name\") SELECT CAST(\"t\".\"name\" AS text) FROM \"_sg_input\" \
         AS \"i\", json_populate_record(NULL::\"author\", \"i\".\"j\"->'author') AS \"t\" \
         RETURNING \"author\".*), \"book\" AS (INSERT INTO \"book\" (\"title\", \
         \"author_id\") SELECT CAST(\"t\".\"title\" AS text), \"author\".\"id\" FROM \
         \"_sg_input\" AS \"i\", json_populate_record(NULL::\"book\", \"i\".\"j\"->'book') \
         AS \"t\", \"author\" RETURNING \"book\".*) SELECT json_build_object('author', \
         COALESCE(\"__sj_0\".\"json\", '[]')) AS \"__root\" FROM (SELECT true) AS \
         \"__root_x\" LEFT OUTER JOIN LATERAL (SELECT \
         COALESCE(json_agg(json_build_object('id', \"author_0\".\"id\", 'name', \
         \"author_0\".\"name\")), '[]') AS \"json\" FROM (SELECT \"author_0\".\"id\", \
         \"author_0\".\"name\" FROM \"author\" AS \"author_0\") AS \"author_0\") AS \
         \"__sj_0\" ON true"
    );
    assert_eq!(out.params.len(), 1);
}

#[test]
fn test_linear_dependency_oracle() {
    let qc = author_book_qcode();
    let out = compile(&qc, Dialect::Oracle, &opts()).unwrap();
    assert!(out
        .sql
        .starts_with("DECLARE v_author_0 NUMBER; v_book_1 NUMBER; c SYS_REFCURSOR; BEGIN "));
    assert!(out.sql.contains(
        "INSERT INTO \"AUTHOR\" (\"NAME\") VALUES (JSON_VALUE(:1, '$.author.name')) \
         RETURNING \"ID\" INTO v_author_0; "
    ));
    assert!(out.sql.contains(
        "INSERT INTO \"BOOK\" (\"TITLE\", \"AUTHOR_ID\") VALUES (JSON_VALUE(:2, \
         '$.book.title'), v_author_0) RETURNING \"ID\" INTO v_book_1; "
    ));
    assert!(out.sql.contains("OPEN c FOR SELECT JSON_OBJECT("));
    assert!(out.sql.contains("(\"AUTHOR_0\".\"ID\" = v_author_0)"));
    assert!(out.sql.ends_with("; DBMS_SQL.RETURN_RESULT(c); END;"));
}

#[test]
fn test_mutation_dependency_order_is_topological() {
    let mut qc = author_book_qcode();
    // author listed second in the arena, still emitted first
    qc.mutates.swap(0, 1);
    qc.mutates[0].id = 0;
    qc.mutates[1].id = 1;
    // restore: slot 0 is book (depends on 1), slot 1 is author
    qc.mutates[0].depends_on = vec![1];
    qc.mutates[0].rcols[0].mutate_id = 1;
    qc.mutates[1].depends_on = vec![];
    qc.mutates[1].rcols = vec![];
    let out = compile(&qc, Dialect::Postgres, &opts()).unwrap();
    let author_at = out.sql.find("INSERT INTO \"author\"").unwrap();
    let book_at = out.sql.find("INSERT INTO \"book\"").unwrap();
    assert!(author_at < book_at);
}

#[test]
fn test_cyclic_dependencies_rejected() {
    let mut qc = author_book_qcode();
    qc.mutates[0].depends_on = vec![1];
    let err = compile(&qc, Dialect::Postgres, &opts()).unwrap_err();
    assert!(matches!(err, CompileError::InvalidInput(_)));
}

#[test]
fn test_user_filter_overrides_id_injection() {
    let mut qc = insert_users_bulk_qcode();
    qc.selects[0].where_ = Some(Exp::binary(
        ExpOp::Equals,
        Operand::col(Column::new("id", "bigint")),
        Operand::num("5"),
    ));
    let out = compile(&qc, Dialect::MySQL, &opts()).unwrap();
    let returning = out.sql.split("LAST_INSERT_ID(); ").nth(1).unwrap();
    assert!(returning.contains("WHERE (`users_0`.`id` = 5)"));
    assert!(!returning.contains("@users_0"));
}

#[test]
fn test_linear_update_mysql_json_paths() {
    let mut m = Mutate::new(0, MutateKind::Update, users_table());
    m.path = vec!["user".into()];
    m.cols = vec![MutateCol::new(Column::new("full_name", "text"))];
    m.where_ = Some(Exp::binary(
        ExpOp::Equals,
        Operand::col(Column::new("id", "bigint")),
        Operand::Var("id".into()),
    ));
    let mut sel = Select::new(0, users_table(), "users");
    sel.fields = vec![Field::col(Column::new("id", "bigint"))];
    let mut qc = QCode::query(vec![sel]);
    qc.op = OpKind::Mutation;
    qc.mutates = vec![m];
    qc.action_var = "data".into();

    let out = compile(&qc, Dialect::MySQL, &opts()).unwrap();
    assert!(out.sql.contains(
        "SELECT `id` INTO @users_0 FROM `users` WHERE (`users`.`id` = ?) LIMIT 1; "
    ));
    assert!(out.sql.contains(
        "UPDATE `users` SET `full_name` = JSON_UNQUOTE(JSON_EXTRACT(?, \
         '$.user.full_name')) WHERE (`users`.`id` = ?); "
    ));
    // id variable, then three action/id binds across the script
    assert_eq!(out.params_by_name().get("id").map(|v| v.len()), Some(2));
}

#[test]
fn test_linear_connect_mysql() {
    let posts_t = posts_table();
    let tags_t = TableInfo::new("tags", Column::new("id", "bigint"));

    let mut sel = Select::new(0, posts_t.clone(), "posts");
    sel.fields = vec![Field::col(Column::new("id", "bigint"))];

    let mut post = Mutate::new(0, MutateKind::Insert, posts_t);
    post.path = vec!["post".into()];
    post.cols = vec![MutateCol::new(Column::new("title", "text"))];

    let mut connect = Mutate::new(1, MutateKind::Connect, tags_t);
    connect.parent = Some(0);
    connect.depends_on = vec![0];
    connect.rel = Some(Rel {
        kind: RelKind::OneToMany,
        left: RelCol {
            table: "tags".into(),
            col: Column::new("post_id", "bigint"),
            array: false,
        },
        right: RelCol {
            table: "posts".into(),
            col: Column::new("id", "bigint"),
            array: false,
        },
    });
    connect.where_ = Some(Exp::binary(
        ExpOp::In,
        Operand::col(Column::new("id", "bigint")),
        Operand::List {
            items: vec!["1".into(), "2".into()],
            vt: ValType::Num,
        },
    ));

    let mut qc = QCode::query(vec![sel]);
    qc.op = OpKind::Mutation;
    qc.mutates = vec![post, connect];
    qc.action_var = "data".into();

    let out = compile(&qc, Dialect::MySQL, &opts()).unwrap();
    assert!(out.sql.contains(
        "SELECT JSON_ARRAYAGG(`post_id`) INTO @tags_1 FROM `tags` WHERE (`tags`.`id` IN \
         (1, 2)); "
    ));
    assert!(out.sql.contains(
        "UPDATE `tags` SET `post_id` = @posts_0 WHERE (`tags`.`id` IN (1, 2)); "
    ));
}

#[test]
fn test_upsert_postgres_on_conflict() {
    let mut qc = insert_users_bulk_qcode();
    qc.mutates[0].kind = MutateKind::Upsert;
    qc.mutates[0].is_array = false;
    let out = compile(&qc, Dialect::Postgres, &opts()).unwrap();
    assert!(out.sql.contains(
        " ON CONFLICT (\"id\") DO UPDATE SET \"full_name\" = EXCLUDED.\"full_name\", \
         \"email\" = EXCLUDED.\"email\" RETURNING \"users\".*"
    ));
}

#[test]
fn test_linear_upsert_mysql_on_duplicate_key() {
    let mut qc = insert_users_bulk_qcode();
    qc.mutates[0].kind = MutateKind::Upsert;
    let out = compile(&qc, Dialect::MySQL, &opts()).unwrap();
    assert!(out.sql.contains(
        " ON DUPLICATE KEY UPDATE `full_name` = VALUES(`full_name`), `email` = \
         VALUES(`email`); SET @users_0 = LAST_INSERT_ID(); "
    ));
}

#[test]
fn test_linear_insert_snowflake_delta_capture() {
    let qc = insert_users_bulk_qcode();
    let out = compile(&qc, Dialect::Snowflake, &opts()).unwrap();
    assert!(out.sql.starts_with(
        "CREATE TEMPORARY TABLE IF NOT EXISTS \"_gj_ids\" (\"tag\" TEXT, \"id\" BIGINT, \
         \"val\" TEXT); DELETE FROM \"_gj_ids\"; CREATE TEMPORARY TABLE \"_gj_prev_ids\" \
         AS SELECT \"id\" FROM \"users\"; "
    ));
    assert!(out.sql.contains(
        "INSERT INTO \"_gj_ids\" (\"tag\", \"id\") SELECT 'users_0', \"id\" FROM \
         \"users\" WHERE \"id\" NOT IN (SELECT \"id\" FROM \"_gj_prev_ids\"); DROP TABLE \
         \"_gj_prev_ids\"; "
    ));
    assert!(out.sql.contains(
        "WHERE (\"users_0\".\"id\" IN (SELECT \"id\" FROM \"_gj_ids\" WHERE \"tag\" = \
         'users_0'))"
    ));
}

#[test]
fn test_linear_update_captures_dependent_columns() {
    // the dependent reads a non-PK column (uuid) of the updated row, so
    // the pre-capture must carry it next to the key
    let accounts_t = TableInfo::new("accounts", Column::new("id", "bigint"));
    let entries_t = TableInfo::new("entries", Column::new("id", "bigint"));

    let mut sel = Select::new(0, accounts_t.clone(), "accounts");
    sel.fields = vec![Field::col(Column::new("id", "bigint"))];

    let mut upd = Mutate::new(0, MutateKind::Update, accounts_t);
    upd.path = vec!["account".into()];
    upd.cols = vec![MutateCol::new(Column::new("status", "text"))];
    upd.where_ = Some(Exp::binary(
        ExpOp::Equals,
        Operand::col(Column::new("id", "bigint")),
        Operand::Var("id".into()),
    ));

    let mut entry = Mutate::new(1, MutateKind::Insert, entries_t);
    entry.path = vec!["entry".into()];
    entry.cols = vec![MutateCol::new(Column::new("note", "text"))];
    entry.depends_on = vec![0];
    entry.rcols = vec![RelTail {
        col: Column::new("account_uuid", "text"),
        mutate_id: 0,
        src_col: Column::new("uuid", "text"),
    }];

    let mut qc = QCode::query(vec![sel]);
    qc.op = OpKind::Mutation;
    qc.mutates = vec![upd, entry];
    qc.action_var = "data".into();

    let my = compile(&qc, Dialect::MySQL, &opts()).unwrap();
    assert!(my.sql.contains(
        "SELECT `id`, `uuid` INTO @accounts_0, @accounts_0_uuid FROM `accounts` WHERE \
         (`accounts`.`id` = ?) LIMIT 1; "
    ));
    assert!(my
        .sql
        .contains("SELECT `_jt`.`note`, @accounts_0_uuid FROM JSON_TABLE("));

    let ora = compile(&qc, Dialect::Oracle, &opts()).unwrap();
    assert!(ora.sql.starts_with(
        "DECLARE v_accounts_0 NUMBER; v_accounts_0_uuid VARCHAR2(4000); v_entries_1 \
         NUMBER; c SYS_REFCURSOR; BEGIN "
    ));
    assert!(ora
        .sql
        .contains("RETURNING \"ID\", \"UUID\" INTO v_accounts_0, v_accounts_0_uuid; "));
    assert!(ora
        .sql
        .contains("), v_accounts_0_uuid) RETURNING \"ID\" INTO v_entries_1; "));

    let sf = compile(&qc, Dialect::Snowflake, &opts()).unwrap();
    assert!(sf.sql.contains(
        "INSERT INTO \"_gj_ids\" (\"tag\", \"val\") SELECT 'accounts_0_uuid', \
         CAST(\"uuid\" AS text) FROM \"accounts\" WHERE (\"accounts\".\"id\" = ?); "
    ));
    assert!(sf.sql.contains(
        "(SELECT CAST(\"val\" AS text) FROM \"_gj_ids\" WHERE \"tag\" = 'accounts_0_uuid')"
    ));
}

#[test]
fn test_connect_from_list_captured_parent_extracts_first() {
    // a connect whose mutation-tree parent is itself a connect reads the
    // first element of the parent's JSON-array capture, not the raw list
    let posts_t = posts_table();
    let tags_t = TableInfo::new("tags", Column::new("id", "bigint"));
    let badges_t = TableInfo::new("badges", Column::new("id", "bigint"));

    let mut sel = Select::new(0, posts_t.clone(), "posts");
    sel.fields = vec![Field::col(Column::new("id", "bigint"))];

    let mut post = Mutate::new(0, MutateKind::Insert, posts_t);
    post.path = vec!["post".into()];
    post.cols = vec![MutateCol::new(Column::new("title", "text"))];

    let mut tags = Mutate::new(1, MutateKind::Connect, tags_t);
    tags.parent = Some(0);
    tags.depends_on = vec![0];
    tags.rel = Some(Rel {
        kind: RelKind::OneToMany,
        left: RelCol {
            table: "tags".into(),
            col: Column::new("post_id", "bigint"),
            array: false,
        },
        right: RelCol {
            table: "posts".into(),
            col: Column::new("id", "bigint"),
            array: false,
        },
    });
    tags.where_ = Some(Exp::binary(
        ExpOp::In,
        Operand::col(Column::new("id", "bigint")),
        Operand::List {
            items: vec!["1".into(), "2".into()],
            vt: ValType::Num,
        },
    ));

    let mut badges = Mutate::new(2, MutateKind::Connect, badges_t);
    badges.parent = Some(1);
    badges.depends_on = vec![1];
    badges.rel = Some(Rel {
        kind: RelKind::OneToMany,
        left: RelCol {
            table: "badges".into(),
            col: Column::new("tag_id", "bigint"),
            array: false,
        },
        right: RelCol {
            table: "tags".into(),
            col: Column::new("id", "bigint"),
            array: false,
        },
    });
    badges.where_ = Some(Exp::binary(
        ExpOp::In,
        Operand::col(Column::new("id", "bigint")),
        Operand::List {
            items: vec!["7".into()],
            vt: ValType::Num,
        },
    ));

    let mut qc = QCode::query(vec![sel]);
    qc.op = OpKind::Mutation;
    qc.mutates = vec![post, tags, badges];
    qc.action_var = "data".into();

    let my = compile(&qc, Dialect::MySQL, &opts()).unwrap();
    // scalar parent capture stays a plain variable read
    assert!(my.sql.contains("UPDATE `tags` SET `post_id` = @posts_0 WHERE"));
    assert!(my.sql.contains(
        "UPDATE `badges` SET `tag_id` = JSON_UNQUOTE(JSON_EXTRACT(@tags_1, '$[0]')) WHERE \
         (`badges`.`id` IN (7)); "
    ));

    let ora = compile(&qc, Dialect::Oracle, &opts()).unwrap();
    assert!(ora.sql.contains(
        "UPDATE \"BADGES\" SET \"TAG_ID\" = JSON_VALUE(v_tags_1, '$[0]') WHERE \
         (\"BADGES\".\"ID\" IN (7)); "
    ));

    let sf = compile(&qc, Dialect::Snowflake, &opts()).unwrap();
    assert!(sf.sql.contains(
        "UPDATE \"badges\" SET \"tag_id\" = (SELECT \"id\" FROM \"_gj_ids\" WHERE \
         \"tag\" = 'tags_1' LIMIT 1) WHERE (\"badges\".\"id\" IN (7)); "
    ));
}

#[test]
fn test_bulk_json_update_uses_pk_sentinel() {
    let mut m = Mutate::new(0, MutateKind::Insert, users_table());
    m.is_array = true;
    m.is_json = true;
    m.cols = vec![
        MutateCol::new(Column::new("id", "bigint")),
        MutateCol::new(Column::new("full_name", "text")),
    ];
    let mut sel = Select::new(0, users_table(), "users");
    sel.fields = vec![Field::col(Column::new("id", "bigint"))];
    let mut qc = QCode::query(vec![sel]);
    qc.op = OpKind::Mutation;
    qc.mutates = vec![m];
    qc.action_var = "data".into();

    let out = compile(&qc, Dialect::MySQL, &opts()).unwrap();
    // the sentinel decodes into a JSON_TABLE subselect over the payload PKs
    assert!(out.sql.contains(
        "WHERE (`users_0`.`id` IN (SELECT `_jt`.`id` FROM JSON_TABLE(?, '$[*]' \
         COLUMNS(`id` BIGINT PATH '$.id')) AS `_jt`))"
    ));
}

#[test]
fn test_mutation_without_mutates_rejected() {
    let mut qc = users_qcode();
    qc.op = OpKind::Mutation;
    let err = compile(&qc, Dialect::Postgres, &opts()).unwrap_err();
    assert!(matches!(err, CompileError::InvalidInput(_)));
}
