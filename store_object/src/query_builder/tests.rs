//! Statement builder tests across dialects

#[cfg(test)]
mod tests {
    use crate::engine::{CacheIndex, OperationKind, OperationState};
    use crate::errors::EngineError;
    use crate::query_builder::statement::select_by_primary_key;
    use crate::query_builder::{SortOrder, StatementBuilder};
    use dialect::Dialect;
    use serde_json::{json, Value};

    /// users(id, name, phone, sex, created_at readonly)
    fn user_state(id: i64) -> OperationState {
        let mut state = OperationState::new("id");
        state.tables = vec!["users".into()];
        state.dictionary.insert("id", json!(id), false);
        state.dictionary.insert("name", json!("admin"), false);
        state.dictionary.insert("phone", json!("8613011112222"), false);
        state.dictionary.insert("sex", json!(1), false);
        state.dictionary.insert("created_at", Value::Null, true);
        state
    }

    fn detached(table: &str) -> OperationState {
        let mut state = OperationState::new("id");
        state.tables = vec![table.into()];
        state
    }

    fn build(state: &OperationState, dialect: Dialect, kind: OperationKind) -> Result<String, EngineError> {
        let mut state = state.clone();
        state.kind = kind;
        StatementBuilder::new(&state, dialect).build(kind)
    }

    // ========================================
    // SELECT
    // ========================================

    #[test]
    fn test_select_columns_mysql_and_postgres() {
        let mut state = detached("users");
        state.custom_where = Some("id <= 100".into());
        state.select = vec!["id".into(), "phone".into()];

        let mysql = build(&state, Dialect::MySql, OperationKind::Query).unwrap();
        assert_eq!(mysql, "SELECT `id`,`phone` FROM users WHERE id <= 100");

        let pg = build(&state, Dialect::Postgres, OperationKind::Query).unwrap();
        assert_eq!(pg, "SELECT \"id\",\"phone\" FROM users WHERE id <= 100");
        assert!(!pg.contains('`'));
    }

    #[test]
    fn test_select_defaults() {
        let state = detached("users");
        assert_eq!(
            build(&state, Dialect::Sqlite, OperationKind::Query).unwrap(),
            "SELECT * FROM users WHERE 1=1"
        );

        // a record supplies its column list
        let state = user_state(0);
        assert_eq!(
            build(&state, Dialect::MySql, OperationKind::Query).unwrap(),
            "SELECT `id`,`name`,`phone`,`sex`,`created_at` FROM users WHERE 1=1"
        );
    }

    #[test]
    fn test_select_clause_order() {
        let mut state = detached("orders");
        state.distinct = true;
        state.select = vec!["user_id".into(), "count(*) as n".into()];
        state.custom_where = Some("amount > 0".into());
        state.group_by = vec!["user_id".into()];
        state.order_by = vec!["user_id".into()];
        state.sort = Some(SortOrder::Desc);
        state.limit = Some(10);
        state.offset = Some(20);

        assert_eq!(
            build(&state, Dialect::MySql, OperationKind::Query).unwrap(),
            "SELECT DISTINCT `user_id`,count(*) as n FROM orders WHERE amount > 0 \
             GROUP BY `user_id` ORDER BY `user_id` DESC LIMIT 10 OFFSET 20"
        );
    }

    #[test]
    fn test_offset_without_limit() {
        let mut state = detached("users");
        state.offset = Some(5);
        let sql = |dialect| build(&state, dialect, OperationKind::Query).unwrap();

        assert!(sql(Dialect::MySql).ends_with("LIMIT 18446744073709551615 OFFSET 5"));
        assert!(sql(Dialect::Sqlite).ends_with("LIMIT -1 OFFSET 5"));
        assert!(sql(Dialect::Postgres).ends_with("WHERE 1=1 OFFSET 5"));
        assert!(sql(Dialect::MsSql).ends_with("ORDER BY (SELECT NULL) OFFSET 5 ROWS"));
    }

    #[test]
    fn test_mssql_top_follows_select() {
        let mut state = detached("users");
        state.distinct = true;
        state.select = vec!["id".into()];
        state.limit = Some(3);
        assert_eq!(
            build(&state, Dialect::MsSql, OperationKind::Query).unwrap(),
            "SELECT DISTINCT TOP 3 [id] FROM users WHERE 1=1"
        );
    }

    #[test]
    fn test_mssql_paging_uses_fetch() {
        let mut state = detached("users");
        state.order_by = vec!["id".into()];
        state.sort = Some(SortOrder::Asc);
        state.limit = Some(10);
        state.offset = Some(30);
        assert_eq!(
            build(&state, Dialect::MsSql, OperationKind::Query).unwrap(),
            "SELECT * FROM users WHERE 1=1 ORDER BY [id] ASC OFFSET 30 ROWS FETCH NEXT 10 ROWS ONLY"
        );

        state.order_by.clear();
        let sql = build(&state, Dialect::MsSql, OperationKind::Query).unwrap();
        assert!(sql.contains("ORDER BY (SELECT NULL) OFFSET 30 ROWS"));
    }

    #[test]
    fn test_select_index_condition() {
        let mut state = user_state(0);
        state.select = vec!["*".into()];
        state.indexes.push(CacheIndex {
            column: "phone".into(),
            value: json!("8613011112222"),
        });
        assert_eq!(
            build(&state, Dialect::Postgres, OperationKind::Query).unwrap(),
            "SELECT * FROM users WHERE \"phone\" = '8613011112222'"
        );
    }

    #[test]
    fn test_missing_table() {
        let state = OperationState::new("id");
        for kind in [OperationKind::Query, OperationKind::Insert, OperationKind::Delete] {
            let err = build(&state, Dialect::MySql, kind).unwrap_err();
            assert!(matches!(err, EngineError::MissingTable(k) if k == kind));
        }
    }

    #[test]
    fn test_select_by_primary_key() {
        assert_eq!(
            select_by_primary_key(Dialect::MsSql, "users", "id", &json!(4)),
            "SELECT * FROM users WHERE [id] = 4"
        );
    }

    // ========================================
    // INSERT
    // ========================================

    #[test]
    fn test_insert_omits_unset_key_and_null_readonly() {
        let state = user_state(0);
        assert_eq!(
            build(&state, Dialect::MySql, OperationKind::Insert).unwrap(),
            "INSERT INTO users (`name`,`phone`,`sex`) VALUES ('admin','8613011112222',1)"
        );
    }

    #[test]
    fn test_insert_keeps_explicit_key() {
        let mut state = user_state(0);
        state.pk_value = Some(json!(42));
        state.dictionary.insert("created_at", json!("2024-01-01"), true);
        assert_eq!(
            build(&state, Dialect::Postgres, OperationKind::Insert).unwrap(),
            "INSERT INTO users (\"id\",\"name\",\"phone\",\"sex\",\"created_at\") \
             VALUES (42,'admin','8613011112222',1,'2024-01-01')"
        );
    }

    #[test]
    fn test_insert_escapes_quotes() {
        let mut state = detached("notes");
        state.dictionary.insert("body", json!("it's"), false);
        assert_eq!(
            build(&state, Dialect::Sqlite, OperationKind::Insert).unwrap(),
            "INSERT INTO notes (`body`) VALUES ('it''s')"
        );
    }

    // ========================================
    // UPDATE
    // ========================================

    #[test]
    fn test_update_excludes_key_and_readonly() {
        let state = user_state(7);
        assert_eq!(
            build(&state, Dialect::MySql, OperationKind::Update).unwrap(),
            "UPDATE users SET `name`='admin',`phone`='8613011112222',`sex`=1 WHERE `id` = 7"
        );
    }

    #[test]
    fn test_update_selected_columns() {
        let mut state = user_state(7);
        state.select = vec!["name".into(), "created_at".into(), "id".into()];
        assert_eq!(
            build(&state, Dialect::Postgres, OperationKind::Update).unwrap(),
            "UPDATE users SET \"name\"='admin' WHERE \"id\" = 7"
        );
    }

    #[test]
    fn test_update_unknown_column() {
        let mut state = user_state(7);
        state.select = vec!["nickname".into()];
        let err = build(&state, Dialect::MySql, OperationKind::Update).unwrap_err();
        assert!(matches!(err, EngineError::UnknownColumn { column } if column == "nickname"));
    }

    #[test]
    fn test_update_without_writable_columns() {
        let mut state = user_state(7);
        state.select = vec!["id".into(), "created_at".into()];
        let err = build(&state, Dialect::MySql, OperationKind::Update).unwrap_err();
        assert!(matches!(err, EngineError::NoWritableColumns { .. }));
    }

    #[test]
    fn test_update_ignores_index_condition() {
        let mut state = user_state(0);
        state.indexes.push(CacheIndex {
            column: "phone".into(),
            value: json!("8613011112222"),
        });
        state.custom_where = Some("sex = 1".into());
        let sql = build(&state, Dialect::MySql, OperationKind::Update).unwrap();
        assert!(sql.ends_with("WHERE sex = 1"));
    }

    // ========================================
    // UPSERT
    // ========================================

    #[test]
    fn test_upsert_mysql_reports_existing_key() {
        let mut state = user_state(0);
        state.select = vec!["phone".into()];
        state.conflicts = vec!["phone".into()];
        assert_eq!(
            build(&state, Dialect::MySql, OperationKind::Upsert).unwrap(),
            "INSERT INTO users (`name`,`phone`,`sex`) VALUES ('admin','8613011112222',1) \
             ON DUPLICATE KEY UPDATE `id`=LAST_INSERT_ID(`id`),`phone`='8613011112222'"
        );
    }

    #[test]
    fn test_upsert_sqlite_on_conflict_form() {
        let mut state = user_state(0);
        state.select = vec!["name".into()];
        assert_eq!(
            build(&state, Dialect::Sqlite, OperationKind::Upsert).unwrap(),
            "INSERT INTO users (`name`,`phone`,`sex`) VALUES ('admin','8613011112222',1) \
             ON CONFLICT DO UPDATE SET `name`='admin' RETURNING `id`"
        );

        state.conflicts = vec!["phone".into()];
        assert!(build(&state, Dialect::Sqlite, OperationKind::Upsert)
            .unwrap()
            .contains("ON CONFLICT (`phone`) DO UPDATE SET `name`='admin'"));
    }

    #[test]
    fn test_insert_mysql_escapes_backslash() {
        let mut state = user_state(0);
        state.dictionary.insert("name", json!("C:\\"), false);
        state.dictionary.insert("phone", json!("a\\nb"), false);
        let sql = build(&state, Dialect::MySql, OperationKind::Insert).unwrap();
        assert!(sql.ends_with("VALUES ('C:\\\\','a\\\\nb',1)"), "{sql}");
        let sql = build(&state, Dialect::Postgres, OperationKind::Insert).unwrap();
        assert!(sql.ends_with("VALUES ('C:\\','a\\nb',1)"), "{sql}");
    }

    #[test]
    fn test_upsert_postgres_conflict_clause() {
        let mut state = user_state(0);
        state.select = vec!["name".into(), "phone".into()];
        state.conflicts = vec!["phone".into()];
        assert_eq!(
            build(&state, Dialect::Postgres, OperationKind::Upsert).unwrap(),
            "INSERT INTO users (\"name\",\"phone\",\"sex\") VALUES ('admin','8613011112222',1) \
             ON CONFLICT (\"phone\") DO UPDATE SET \"name\"='admin',\"phone\"='8613011112222' \
             RETURNING \"id\""
        );
    }

    #[test]
    fn test_upsert_postgres_requires_conflicts() {
        let state = user_state(0);
        let err = build(&state, Dialect::Postgres, OperationKind::Upsert).unwrap_err();
        assert!(matches!(err, EngineError::MissingConflictColumns { table } if table == "users"));
    }

    #[test]
    fn test_upsert_without_native_clause() {
        let state = user_state(0);
        for dialect in [Dialect::MsSql, Dialect::Ansi] {
            let err = build(&state, dialect, OperationKind::Upsert).unwrap_err();
            assert!(matches!(err, EngineError::Unsupported(_)));
        }
    }

    #[test]
    fn test_uniqueness_predicate() {
        let mut state = user_state(0);
        state.kind = OperationKind::Upsert;
        state.conflicts = vec!["phone".into(), "sex".into()];
        let builder = StatementBuilder::new(&state, Dialect::MsSql);
        let predicate = builder.uniqueness_predicate().unwrap();
        assert_eq!(predicate, "[phone] = '8613011112222' AND [sex] = 1");
        assert_eq!(
            builder.select_primary_key(&predicate).unwrap(),
            "SELECT [id] FROM users WHERE [phone] = '8613011112222' AND [sex] = 1"
        );

        let keyed = user_state(9);
        let builder = StatementBuilder::new(&keyed, Dialect::Ansi);
        assert_eq!(builder.uniqueness_predicate().unwrap(), "\"id\" = 9");

        let bare = user_state(0);
        let builder = StatementBuilder::new(&bare, Dialect::MsSql);
        assert!(matches!(
            builder.uniqueness_predicate(),
            Err(EngineError::MissingConflictColumns { .. })
        ));
    }

    #[test]
    fn test_update_by_primary_key() {
        let mut state = user_state(0);
        state.select = vec!["name".into()];
        let builder = StatementBuilder::new(&state, Dialect::MsSql);
        assert_eq!(
            builder.update_by_primary_key(&json!(12)).unwrap().as_deref(),
            Some("UPDATE users SET [name]='admin' WHERE [id] = 12")
        );

        state.select = vec!["created_at".into()];
        let builder = StatementBuilder::new(&state, Dialect::MsSql);
        assert_eq!(builder.update_by_primary_key(&json!(12)).unwrap(), None);
    }

    // ========================================
    // DELETE
    // ========================================

    #[test]
    fn test_delete_by_key() {
        let state = user_state(3);
        assert_eq!(
            build(&state, Dialect::MsSql, OperationKind::Delete).unwrap(),
            "DELETE FROM users WHERE [id] = 3"
        );
    }

    #[test]
    fn test_unconditioned_delete_is_refused() {
        for dialect in Dialect::ALL {
            let state = user_state(0);
            let err = build(&state, dialect, OperationKind::Delete).unwrap_err();
            assert!(matches!(err, EngineError::UnconditionedDelete { table } if table == "users"));
        }
    }

    #[test]
    fn test_delete_with_fragments_only() {
        let mut state = detached("sessions");
        state.and_fragments.push("expires_at < '2020-01-01'".into());
        assert_eq!(
            build(&state, Dialect::Postgres, OperationKind::Delete).unwrap(),
            "DELETE FROM sessions WHERE 1=1 AND expires_at < '2020-01-01'"
        );
    }
}
