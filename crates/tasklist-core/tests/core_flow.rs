use std::ffi::OsString;
use std::fs;
use std::path::Path;

use chrono::{Duration, TimeZone, Utc};
use tasklist_core::datastore::{DataStore, FileStorage, Storage, TASKS_KEY};
use tasklist_core::store::{Action, TaskList};
use tasklist_core::task::Priority;
use tasklist_core::view::{FilterMode, SortMode, ViewQuery, derive};
use tempfile::tempdir;

fn run_cli(config: &Path, data: &Path, args: &[&str]) {
    let mut argv: Vec<OsString> = vec![
        "todo".into(),
        "--config".into(),
        config.into(),
        "--data".into(),
        data.into(),
        "rc.color=off".into(),
    ];
    argv.extend(args.iter().map(OsString::from));
    tasklist_core::run(argv).expect("cli invocation should succeed");
}

#[test]
fn file_store_round_trip_through_reducer() {
    let temp = tempdir().expect("tempdir");
    let store = DataStore::open(temp.path()).expect("open datastore");
    let now = Utc
        .with_ymd_and_hms(2026, 2, 17, 12, 0, 0)
        .single()
        .expect("valid now");

    let mut list = TaskList::new(store.load());
    assert!(list.tasks().is_empty());

    for (text, priority, deadline) in [
        ("A", Priority::High, None),
        ("B", Priority::Low, Some(now + Duration::days(1))),
        ("C", Priority::Medium, Some(now - Duration::days(1))),
    ] {
        let outcome = list.apply(
            Action::Add {
                text: text.to_string(),
                deadline,
                priority,
            },
            now,
        );
        assert!(outcome.tasks_changed);
    }
    let b = list.tasks()[1].id;
    list.apply(Action::Toggle(b), now);
    store.save(list.tasks()).expect("save tasks");

    let reloaded = TaskList::new(store.load());
    assert_eq!(reloaded.tasks(), list.tasks());

    let query = ViewQuery {
        filter: FilterMode::Active,
        sort: SortMode::Deadline,
        ..ViewQuery::default()
    };
    let visible: Vec<&str> = derive(reloaded.tasks(), &query)
        .iter()
        .map(|row| row.task.text.as_str())
        .collect();
    assert_eq!(visible, vec!["C", "A"]);
}

#[test]
fn corrupted_file_starts_empty() {
    let temp = tempdir().expect("tempdir");
    let storage = FileStorage::open(temp.path()).expect("open storage");
    fs::write(storage.slot_path(TASKS_KEY), "[{\"id\": \"oops\"}]").expect("write garbage");

    let store = DataStore::new(storage);
    assert!(store.load().is_empty());
}

#[test]
fn cli_add_edit_move_toggle_delete() {
    let temp = tempdir().expect("tempdir");
    let config = temp.path().join("todorc");
    fs::write(&config, "default.priority = low\n").expect("write config");
    let data = temp.path().join("data");

    run_cli(&config, &data, &["add", "Write", "report", "pri:high"]);
    run_cli(&config, &data, &["add", "Water", "plants"]);
    run_cli(&config, &data, &["add", "   "]);

    let store = DataStore::open(&data).expect("open datastore");
    let tasks = store.load();
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0].text, "Write report");
    assert_eq!(tasks[0].priority, Priority::High);
    assert_eq!(tasks[1].priority, Priority::Low);
    assert!(tasks[1].id > tasks[0].id);

    let first = tasks[0].id.to_string();
    let second = tasks[1].id.to_string();

    run_cli(&config, &data, &["edit", &second, "Water", "cactus", "due:2030-01-01"]);
    run_cli(&config, &data, &["move", "2", "1"]);
    run_cli(&config, &data, &["done", &first]);

    let tasks = store.load();
    assert_eq!(tasks[0].text, "Water cactus");
    assert!(tasks[0].deadline.is_some());
    assert_eq!(tasks[0].priority, Priority::Low);
    assert!(tasks[1].completed);

    run_cli(&config, &data, &["list", "filter:active", "sort:deadline"]);
    run_cli(&config, &data, &["stats"]);
    run_cli(&config, &data, &["delete", &first, "999"]);

    let tasks = store.load();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].text, "Water cactus");
    assert!(store.storage().get_item(TASKS_KEY).expect("read slot").is_some());
}
