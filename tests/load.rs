mod common;

use assert_cmd::Command;
use predicates::str::contains;

use common::{TestWorkspace, strings};

const USERS_TASK: &str = "  table_name: users
  columns: [name, phone, addr]
  data_columns: [1, 2, 3]
  batch_size: 2
  csv_begin_line: 1
  create_tables: true
";

fn tabload(workspace: &TestWorkspace) -> Command {
    let mut cmd = Command::cargo_bin("tabload").expect("binary exists");
    cmd.current_dir(workspace.path()).env("RUST_LOG", "off");
    cmd
}

fn load(workspace: &TestWorkspace, config: &std::path::Path) -> assert_cmd::assert::Assert {
    tabload(workspace)
        .args(["load", "-c"])
        .arg(config)
        .arg("-d")
        .arg(workspace.data_dir())
        .arg("-l")
        .arg(workspace.log_dir())
        .assert()
}

#[test]
fn load_csv_skips_header_and_inserts_rows() {
    let workspace = TestWorkspace::new();
    workspace.write(
        "data/users.csv",
        "name,phone,addr\nalice,138,Main St\nbob,139,\"Oak Rd, 4\"\ncarol,140,Elm\n",
    );
    let config = workspace.config(USERS_TASK);

    load(&workspace, &config)
        .success()
        .stdout(contains("users.csv"))
        .stdout(contains("1 file(s) loaded, 0 skipped: 3 row(s) inserted"))
        .stdout(contains("Elapsed:"));

    assert_eq!(
        workspace.rows("users", &["name", "phone", "addr"]),
        vec![
            strings(&["alice", "138", "Main St"]),
            strings(&["bob", "139", "Oak Rd, 4"]),
            strings(&["carol", "140", "Elm"]),
        ]
    );
    let logs = workspace.logs_for("users.csv");
    assert_eq!(logs.len(), 1);
    let ledger = std::fs::read_to_string(&logs[0]).expect("read log");
    assert!(ledger.contains("Processing line 3 of users.csv"));
    assert!(ledger.trim_end().ends_with("Processing line 4 of users.csv"));
}

#[test]
fn rerunning_a_finished_file_inserts_nothing() {
    let workspace = TestWorkspace::new();
    workspace.write("data/users.csv", "name,phone,addr\nalice,1,a\nbob,2,b\n");
    let config = workspace.config(USERS_TASK);

    load(&workspace, &config).success();
    load(&workspace, &config)
        .success()
        .stdout(contains("0 row(s) inserted"));
    load(&workspace, &config)
        .success()
        .stdout(contains("0 row(s) inserted"));

    assert_eq!(workspace.rows("users", &["name"]).len(), 2);
}

#[test]
fn load_resumes_after_recorded_checkpoint() {
    let workspace = TestWorkspace::new();
    let rows = (1..=10)
        .map(|i| format!("user_{i},{i},street {i}\n"))
        .collect::<String>();
    workspace.write("data/users.csv", &format!("name,phone,addr\n{rows}"));
    workspace.write(
        "logs/users.csv_20240101120000000.log",
        "2024/01/01 12:00:00 Processing line 9 of users.csv\n\
         2024/01/01 12:00:01 Processing line 6 of users.csv\n",
    );
    let config = workspace.config(USERS_TASK);

    load(&workspace, &config).success();

    let names = workspace
        .rows("users", &["name"])
        .into_iter()
        .map(|row| row[0].clone())
        .collect::<Vec<_>>();
    assert_eq!(
        names,
        (6..=10).map(|i| format!("user_{i}")).collect::<Vec<_>>()
    );
}

#[test]
fn text_files_split_on_multi_character_delimiter() {
    let workspace = TestWorkspace::new();
    workspace.write("data/people.txt", "alice||138||Main St\r\nbob||139\r\n");
    let config = workspace.config(
        "  table_name: people
  columns: [name, phone, addr]
  data_columns: [1, 2, 3]
  delimiter: '||'
  create_tables: true
",
    );

    load(&workspace, &config).success();

    assert_eq!(
        workspace.rows("people", &["name", "phone", "addr"]),
        vec![
            strings(&["alice", "138", "Main St"]),
            strings(&["bob", "139", ""]),
        ]
    );
}

#[test]
fn data_columns_pick_and_reorder_source_fields() {
    let workspace = TestWorkspace::new();
    workspace.write("data/orders.csv", "1,alice,42.5,shipped\n2,bob,13.0,open\n");
    let config = workspace.config(
        "  table_name: orders
  columns: [status, customer]
  data_columns: [4, 2]
  create_tables: true
",
    );

    load(&workspace, &config).success();

    assert_eq!(
        workspace.rows("orders", &["status", "customer"]),
        vec![strings(&["shipped", "alice"]), strings(&["open", "bob"])]
    );
}

#[test]
fn sharded_mode_spreads_rows_over_tables() {
    let workspace = TestWorkspace::new();
    let rows = (1..=9).map(|i| format!("u{i},{i}\n")).collect::<String>();
    workspace.write("data/users.csv", &rows);
    let config = workspace.config(
        "  table_name: users
  columns: [name, phone]
  data_columns: [1, 2]
  batch_size: 3
  multiple_table: true
  table_size: 3
  table_names: [users_0, users_1, users_2]
  create_tables: true
",
    );

    load(&workspace, &config)
        .success()
        .stdout(contains("9 row(s) inserted"));

    let counts = ["users_0", "users_1", "users_2"]
        .map(|table| workspace.rows(table, &["name"]).len());
    assert_eq!(counts.iter().sum::<usize>(), 9);
    assert_eq!(counts[0], 3);
}

#[test]
fn unsupported_files_are_skipped() {
    let workspace = TestWorkspace::new();
    workspace.write("data/users.csv", "name,phone,addr\nalice,1,a\n");
    workspace.write("data/readme.md", "not data");
    workspace.write("data/nested/more.txt", "bob,2,b\n");
    let config = workspace.config(USERS_TASK);

    load(&workspace, &config)
        .success()
        .stdout(contains("2 file(s) loaded, 1 skipped: 2 row(s) inserted"));
}

#[test]
fn failed_batches_are_dropped_and_recorded() {
    let workspace = TestWorkspace::new();
    workspace.write("data/users.csv", "name,phone,addr\nalice,1,a\n");
    let config = workspace.config(
        "  table_name: missing_table
  columns: [name]
  data_columns: [1]
  csv_begin_line: 1
",
    );

    load(&workspace, &config)
        .success()
        .stdout(contains("0 row(s) inserted, 1 dropped in 1 failed batch(es)"));

    let logs = workspace.logs_for("users.csv");
    let ledger = std::fs::read_to_string(&logs[0]).expect("read log");
    assert!(ledger.contains("Error inserting batch to missing_table"));
    assert!(ledger.contains("Processing line 2 of users.csv"));
}

#[test]
fn invalid_config_fails_before_loading() {
    let workspace = TestWorkspace::new();
    workspace.write("data/users.csv", "alice,1\n");
    let config = workspace.config(
        "  table_name: users
  columns: [name, phone]
  data_columns: [1]
",
    );

    load(&workspace, &config)
        .failure()
        .stderr(contains("error:"))
        .stderr(contains("2 column name(s) but 1 data column position(s)"));
    assert!(!workspace.log_dir().exists());
}

#[test]
fn batch_size_override_is_validated() {
    let workspace = TestWorkspace::new();
    workspace.write("data/users.csv", "alice,1,a\n");
    let config = workspace.config(USERS_TASK);

    tabload(&workspace)
        .args(["load", "-c"])
        .arg(&config)
        .args(["--batch-size", "0"])
        .assert()
        .failure()
        .stderr(contains("Batch size must be positive"));
}

#[test]
fn database_flag_overrides_config_path() {
    let workspace = TestWorkspace::new();
    workspace.write("data/users.csv", "name,phone,addr\nalice,1,a\n");
    let config = workspace.config(USERS_TASK);
    let other = workspace.path().join("other").join("alt.db");

    tabload(&workspace)
        .args(["load", "-c"])
        .arg(&config)
        .arg("-d")
        .arg(workspace.data_dir())
        .arg("-l")
        .arg(workspace.log_dir())
        .arg("--database")
        .arg(&other)
        .assert()
        .success();

    assert!(other.exists());
    assert!(!workspace.database().exists());
}

#[test]
fn missing_data_directory_fails() {
    let workspace = TestWorkspace::new();
    let config = workspace.config(USERS_TASK);

    load(&workspace, &config)
        .failure()
        .stderr(contains("does not exist"));
}

const SHEET_TASK: &str = "  table_name: people
  columns: [name, phone]
  data_columns: [1, 2]
  xlsx_begin_line: 1
  sheet: People
  create_tables: true
";

#[test]
fn xlsx_sheet_loads_after_begin_line() {
    let workspace = TestWorkspace::new();
    workspace.write_xlsx(
        "data/people.xlsx",
        "People",
        &[&["name", "phone"], &["alice", "138"], &["bob", "139"]],
    );
    let config = workspace.config(SHEET_TASK);

    load(&workspace, &config)
        .success()
        .stdout(contains("people.xlsx  xlsx"))
        .stdout(contains("2 row(s) inserted"));

    assert_eq!(
        workspace.rows("people", &["name", "phone"]),
        vec![strings(&["alice", "138"]), strings(&["bob", "139"])]
    );
}

#[test]
fn xlsx_without_configured_sheet_fails() {
    let workspace = TestWorkspace::new();
    workspace.write_xlsx("data/people.xlsx", "Other", &[&["alice", "138"]]);
    let config = workspace.config(SHEET_TASK);

    load(&workspace, &config)
        .failure()
        .stderr(contains("sheet 'People' not found"));
    assert!(workspace.logs_for("people.xlsx").is_empty());
}
