mod common;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use common::{Account, Memo, MockConnection, row, text};
use sqlbean::prelude::*;
use sqlbean::ExecResult;

#[test]
fn insert_writes_back_id_version_and_stamp() {
    let conn = MockConnection::new(Dialect::Mysql);
    conn.push_exec(ExecResult::new(1).with_last_insert_id(7));
    let mut session = Session::new(conn.clone());

    let mut account = Account {
        balance: 10,
        ..Account::named("alice")
    };
    assert_eq!(session.insert(&mut account).unwrap(), 1);

    let (sql, args) = conn.last();
    assert_eq!(
        sql,
        "INSERT INTO `accounts` (`name`, `balance`, `version`, `updated`) VALUES (?, ?, ?, ?)"
    );
    assert_eq!(args[0], text("alice"));
    assert_eq!(args[1], Value::BigInt(10));
    assert_eq!(args[2], Value::BigInt(1));
    assert_eq!(args[3], Value::BigInt(account.updated));

    assert_eq!(account.id, 7);
    assert_eq!(account.version, 1);
    assert!(account.updated > 0);
}

#[test]
fn insert_without_reported_id_leaves_field_alone() {
    let conn = MockConnection::new(Dialect::Sqlite);
    let mut session = Session::new(conn.clone());

    let mut account = Account::named("bob");
    session.insert(&mut account).unwrap();
    assert_eq!(account.id, 0);
}

#[test]
fn postgres_reads_id_from_returning() {
    let conn = MockConnection::new(Dialect::Postgres);
    conn.push_rows(vec![row(&["id"], vec![Value::BigInt(42)])]);
    let mut session = Session::new(conn.clone());

    let mut account = Account::named("carol");
    assert_eq!(session.insert(&mut account).unwrap(), 1);
    assert_eq!(account.id, 42);

    let (sql, _) = conn.last();
    assert!(sql.starts_with("INSERT INTO \"accounts\" (\"name\""));
    assert!(sql.contains("VALUES ($1, $2, $3, $4)"));
    assert!(sql.ends_with(" RETURNING \"id\""));
}

#[test]
fn postgres_without_returned_row_is_an_error() {
    let conn = MockConnection::new(Dialect::Postgres);
    let mut session = Session::new(conn);
    let err = session.insert(&mut Account::named("dave")).unwrap_err();
    assert!(matches!(err, Error::Custom(_)));
}

#[test]
fn oracle_reads_id_from_sequence() {
    let conn = MockConnection::new(Dialect::Oracle);
    conn.push_rows(vec![row(&["CURRVAL"], vec![text("15")])]);
    let mut session = Session::new(conn.clone());

    let mut account = Account::named("erin");
    session.insert(&mut account).unwrap();
    assert_eq!(account.id, 15);
    assert_eq!(conn.last().0, "SELECT SEQ_accounts.currval FROM dual");
}

#[test]
fn insert_multi_uses_one_statement() {
    let conn = MockConnection::new(Dialect::Mysql);
    conn.push_exec(ExecResult::new(2));
    let mut session = Session::new(conn.clone());

    let mut accounts = vec![Account::named("a"), Account::named("b")];
    assert_eq!(session.insert_multi(&mut accounts).unwrap(), 2);

    let statements = conn.statements();
    assert_eq!(statements.len(), 1);
    let (sql, args) = &statements[0];
    assert_eq!(
        sql,
        "INSERT INTO `accounts` (`name`, `balance`, `version`, `updated`) VALUES (?, ?, ?, ?), (?, ?, ?, ?)"
    );
    assert_eq!(args.len(), 8);
    assert_eq!(args[4], text("b"));

    for account in &accounts {
        assert_eq!(account.version, 1);
        assert!(account.updated > 0);
        assert_eq!(account.id, 0);
    }
}

#[test]
fn insert_multi_matches_single_inserts_column_for_column() {
    let single = MockConnection::new(Dialect::Mysql);
    let mut session = Session::new(single.clone());
    session.insert(&mut Account::named("x")).unwrap();

    let multi = MockConnection::new(Dialect::Mysql);
    let mut session = Session::new(multi.clone());
    session.insert_multi(&mut [Account::named("x")]).unwrap();

    let (single_sql, single_args) = single.last();
    let (multi_sql, multi_args) = multi.last();
    assert_eq!(single_sql, multi_sql);
    assert_eq!(single_args[..3], multi_args[..3]);
}

#[test]
fn insert_multi_rejects_empty_slice_and_resets_modifiers() {
    let conn = MockConnection::new(Dialect::Mysql);
    let mut session = Session::new(conn.clone());

    let mut none: Vec<Account> = Vec::new();
    let err = session.cols(&["name"]).insert_multi(&mut none).unwrap_err();
    assert!(matches!(err, Error::Param(_)));
    assert!(conn.statements().is_empty());

    session.insert(&mut Account::named("next")).unwrap();
    assert!(conn.last().0.contains("`balance`"));
}

#[test]
fn cols_and_omit_filter_inserted_columns() {
    let conn = MockConnection::new(Dialect::Mysql);
    let mut session = Session::new(conn.clone());

    session.omit(&["balance"]).insert(&mut Account::named("o")).unwrap();
    assert_eq!(
        conn.last().0,
        "INSERT INTO `accounts` (`name`, `version`, `updated`) VALUES (?, ?, ?)"
    );

    session
        .cols(&["name"])
        .no_auto_time()
        .insert(&mut Account::named("c"))
        .unwrap();
    assert_eq!(conn.last().0, "INSERT INTO `accounts` (`name`) VALUES (?)");
}

#[test]
fn declared_hook_runs_after_user_closure() {
    let conn = MockConnection::new(Dialect::Mysql);
    let mut session = Session::new(conn.clone());

    let mut memo = Memo {
        body: "  note".to_string(),
        ..Memo::default()
    };
    session
        .before_typed::<Memo>(|m| m.body.push_str("  "))
        .insert(&mut memo)
        .unwrap();

    assert_eq!(memo.body, "note");
    let (sql, args) = conn.last();
    assert_eq!(sql, "INSERT INTO `memos` (`body`) VALUES (?)");
    assert_eq!(args, vec![text("note")]);
}

#[test]
fn after_closure_runs_once_per_bean() {
    let conn = MockConnection::new(Dialect::Mysql);
    let mut session = Session::new(conn);

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    session
        .after_typed::<Account>(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .insert_multi(&mut [Account::named("a"), Account::named("b"), Account::named("c")])
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    // closures belong to one operation only
    session.insert(&mut Account::named("d")).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[test]
fn failed_before_hook_aborts_insert() {
    let conn = MockConnection::new(Dialect::Mysql);
    let mut session = Session::new(conn.clone());

    let mut memo = Memo {
        body: "   ".to_string(),
        ..Memo::default()
    };
    let err = session.insert(&mut memo).unwrap_err();
    assert!(matches!(err, Error::Custom(_)));
    assert!(conn.statements().is_empty());
}

#[test]
fn insert_map_fills_auto_time() {
    let conn = MockConnection::new(Dialect::Mysql);
    let mut session = Session::new(conn.clone());

    let mut map = BTreeMap::new();
    map.insert("name".to_string(), text("mapped"));
    map.insert("balance".to_string(), Value::BigInt(3));
    assert_eq!(session.insert_map::<Account>(&map).unwrap(), 1);

    let (sql, args) = conn.last();
    assert_eq!(
        sql,
        "INSERT INTO `accounts` (`balance`, `name`, `updated`) VALUES (?, ?, ?)"
    );
    assert_eq!(args[0], Value::BigInt(3));
    assert_eq!(args[1], text("mapped"));
}

#[test]
fn set_expr_and_table_override() {
    let conn = MockConnection::new(Dialect::Mysql);
    let mut session = Session::new(conn.clone());

    session
        .table("accounts_archive")
        .no_auto_time()
        .set_expr("balance", "0")
        .insert(&mut Account::named("e"))
        .unwrap();
    assert_eq!(
        conn.last().0,
        "INSERT INTO `accounts_archive` (`name`, `version`, `updated`, `balance`) VALUES (?, ?, ?, 0)"
    );
}
