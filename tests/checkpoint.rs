mod common;

use std::{fs, thread, time::Duration};

use assert_cmd::Command;
use predicates::prelude::*;
use tabload::checkpoint::{find_latest_log, last_processed_line};

use common::TestWorkspace;

fn checkpoint_cmd(workspace: &TestWorkspace, file: &str) -> assert_cmd::assert::Assert {
    Command::cargo_bin("tabload")
        .expect("binary exists")
        .env("RUST_LOG", "off")
        .args(["checkpoint", file, "-l"])
        .arg(workspace.log_dir())
        .assert()
}

#[test]
fn prints_zero_without_logs() {
    let workspace = TestWorkspace::new();
    checkpoint_cmd(&workspace, "users.csv")
        .success()
        .stdout(predicate::eq("0\n"));
}

#[test]
fn last_line_wins_over_largest_value() {
    let workspace = TestWorkspace::new();
    workspace.write(
        "logs/users.csv_20240101000000000.log",
        "2024/01/01 00:00:00 Processing line 10 of users.csv\n\
         2024/01/01 00:00:01 Error inserting batch to users: boom\n\
         2024/01/01 00:00:02 Processing line 4 of users.csv\n\
         2024/01/01 00:00:03 Processing line garbage of users.csv\n",
    );
    checkpoint_cmd(&workspace, "users.csv")
        .success()
        .stdout(predicate::eq("4\n"));
}

#[test]
fn newest_log_is_used_and_nested_logs_are_found() {
    let workspace = TestWorkspace::new();
    workspace.write(
        "logs/users.csv_20240101000000000.log",
        "2024/01/01 00:00:00 Processing line 100 of users.csv\n",
    );
    thread::sleep(Duration::from_millis(20));
    let newer = workspace.write(
        "logs/archive/users.csv_20230101000000000.log",
        "2023/01/01 00:00:00 Processing line 7 of users.csv\n",
    );
    workspace.write(
        "logs/orders.csv_20250101000000000.log",
        "2025/01/01 00:00:00 Processing line 55 of orders.csv\n",
    );

    assert_eq!(
        find_latest_log(&workspace.log_dir(), "users.csv", None),
        Some(newer.clone())
    );
    assert_eq!(last_processed_line(&workspace.log_dir(), "users.csv", None), 7);
    assert_eq!(
        last_processed_line(&workspace.log_dir(), "users.csv", Some(&newer)),
        100
    );
    checkpoint_cmd(&workspace, "users.csv")
        .success()
        .stdout(predicate::eq("7\n"));
}

#[test]
fn load_writes_a_log_the_checkpoint_command_reads() {
    let workspace = TestWorkspace::new();
    workspace.write("data/users.csv", "a,1\nb,2\nc,3\n");
    let config = workspace.config(
        "  table_name: users
  columns: [name, phone]
  data_columns: [1, 2]
  batch_size: 2
  create_tables: true
",
    );

    Command::cargo_bin("tabload")
        .expect("binary exists")
        .env("RUST_LOG", "off")
        .args(["load", "-c"])
        .arg(&config)
        .arg("-d")
        .arg(workspace.data_dir())
        .arg("-l")
        .arg(workspace.log_dir())
        .assert()
        .success();

    let logs = workspace.logs_for("users.csv");
    assert_eq!(logs.len(), 1);
    let name = logs[0]
        .file_name()
        .and_then(|n| n.to_str())
        .expect("log name")
        .to_string();
    assert!(name.starts_with("users.csv_") && name.ends_with(".log"));
    assert_eq!(name.len(), "users.csv_".len() + 17 + ".log".len());
    assert!(fs::read_to_string(&logs[0]).expect("log").contains("Processing line 2 of users.csv"));

    checkpoint_cmd(&workspace, "users.csv")
        .success()
        .stdout(predicate::eq("3\n"));
}
