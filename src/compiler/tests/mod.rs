//! Compiler test modules.
//!
//! Tests are organized by category:
//! - `queries`: query compilation, composition, JSON shape, grouping
//! - `dialects`: engine-specific emission and operator support
//! - `cursors`: keyset pagination round trips
//! - `mutations`: writable-CTE and linear mutation strategies

mod dialects;
mod mutations;

pub(crate) mod fixtures {
    use crate::compiler::CompileOpts;
    use crate::qcode::*;

    pub fn users_table() -> TableInfo {
        TableInfo::new("users", Column::new("id", "bigint"))
    }

    pub fn posts_table() -> TableInfo {
        TableInfo::new("posts", Column::new("id", "bigint"))
    }

    pub fn opts() -> CompileOpts {
        CompileOpts::default()
    }

    /// Root `users` select: id + email, limit 20.
    pub fn users_select() -> Select {
        let mut s = Select::new(0, users_table(), "users");
        s.fields = vec![
            Field::col(Column::new("id", "bigint")),
            Field::col(Column::new("email", "text")),
        ];
        s.paging.limit = Some(20);
        s
    }

    pub fn users_qcode() -> QCode {
        QCode::query(vec![users_select()])
    }

    /// `users` with a plural `posts` child: title, newest first, limit 3.
    pub fn users_posts_qcode() -> QCode {
        let mut users = users_select();
        users.children = vec![1];
        let mut posts = Select::new(1, posts_table(), "posts");
        posts.parent = Some(0);
        posts.fields = vec![Field::col(Column::new("title", "text"))];
        posts.order_by = vec![OrderBy::new(
            Column::new("created_at", "timestamp"),
            OrderDir::Desc,
        )];
        posts.paging.limit = Some(3);
        posts.rel = Some(Rel {
            kind: RelKind::OneToMany,
            left: RelCol {
                table: "posts".into(),
                col: Column::new("user_id", "bigint"),
                array: false,
            },
            right: RelCol {
                table: "users".into(),
                col: Column::new("id", "bigint"),
                array: false,
            },
        });
        QCode::query(vec![users, posts])
    }

    /// Cursor-paginated `products` root ordered by (price asc, id asc).
    pub fn products_cursor_qcode(cursor_var: Option<&str>) -> QCode {
        let table = TableInfo::new("products", Column::new("id", "bigint"));
        let mut s = Select::new(0, table, "products");
        s.fields = vec![
            Field::col(Column::new("id", "bigint")),
            Field::col(Column::new("name", "text")),
        ];
        s.order_by = vec![
            OrderBy::new(Column::new("price", "numeric"), OrderDir::Asc),
            OrderBy::new(Column::new("id", "bigint"), OrderDir::Asc),
        ];
        s.paging.limit = Some(5);
        s.paging.cursor = true;
        s.paging.cursor_var = cursor_var.map(|v| v.to_string());
        QCode::query(vec![s])
    }

    /// Bulk insert of users from a JSON array payload, plus the returning
    /// select.
    pub fn insert_users_bulk_qcode() -> QCode {
        let mut sel = Select::new(0, users_table(), "users");
        sel.fields = vec![
            Field::col(Column::new("id", "bigint")),
            Field::col(Column::new("full_name", "text")),
        ];
        let mut m = Mutate::new(0, MutateKind::Insert, users_table());
        m.is_array = true;
        m.cols = vec![
            MutateCol::new(Column::new("full_name", "text")),
            MutateCol::new(Column::new("email", "text")),
        ];
        let mut qc = QCode::query(vec![sel]);
        qc.op = OpKind::Mutation;
        qc.mutates = vec![m];
        qc.action_var = "data".into();
        qc
    }

    /// Insert `author`, then insert `book` referencing the new author id.
    pub fn author_book_qcode() -> QCode {
        let author_t = TableInfo::new("author", Column::new("id", "bigint"));
        let book_t = TableInfo::new("book", Column::new("id", "bigint"));

        let mut sel = Select::new(0, author_t.clone(), "author");
        sel.fields = vec![
            Field::col(Column::new("id", "bigint")),
            Field::col(Column::new("name", "text")),
        ];

        let mut author = Mutate::new(0, MutateKind::Insert, author_t);
        author.path = vec!["author".into()];
        author.cols = vec![MutateCol::new(Column::new("name", "text"))];

        let mut book = Mutate::new(1, MutateKind::Insert, book_t);
        book.path = vec!["book".into()];
        book.cols = vec![MutateCol::new(Column::new("title", "text"))];
        book.depends_on = vec![0];
        book.rcols = vec![RelTail {
            col: Column::new("author_id", "bigint"),
            mutate_id: 0,
            src_col: Column::new("id", "bigint"),
        }];

        let mut qc = QCode::query(vec![sel]);
        qc.op = OpKind::Mutation;
        qc.mutates = vec![author, book];
        qc.action_var = "data".into();
        qc
    }
}
