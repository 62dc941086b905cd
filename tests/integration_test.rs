use std::path::Path;
use std::process::{Command, Output};

use serde_json::Value;
use tempfile::TempDir;

fn diary_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_food-diary"));
    cmd.current_dir(dir)
        .env_remove("FOOD_DIARY_DB")
        .env("FOOD_DIARY_CONFLICT_RETRIES", "0");
    cmd
}

fn run(dir: &Path, args: &[&str]) -> Output {
    diary_cmd(dir).args(args).output().unwrap()
}

fn run_json(dir: &Path, args: &[&str]) -> Value {
    let output = run(dir, args);
    assert!(
        output.status.success(),
        "command {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).unwrap()
}

/// Creates one page and one product, returning their ids.
fn seed(dir: &Path) -> (i64, i64) {
    let page = run_json(dir, &["page", "add", "2024-04-01", "--json"]);
    let product = run_json(dir, &["product", "add", "Yogurt", "--calories=59", "--json"]);
    (page["id"].as_i64().unwrap(), product["id"].as_i64().unwrap())
}

fn add_note(dir: &Path, page: i64, product: i64, meal: &str) -> i64 {
    let note = run_json(
        dir,
        &[
            "note",
            "add",
            &format!("--page={}", page),
            &format!("--meal={}", meal),
            &format!("--product={}", product),
            "--quantity=100",
            "--json",
        ],
    );
    note["id"].as_i64().unwrap()
}

/// (id, display_order) pairs of one meal, in display order.
fn meal_order(dir: &Path, page: i64, meal: &str) -> Vec<(i64, i64)> {
    let notes = run_json(
        dir,
        &[
            "note",
            "list",
            &format!("--page={}", page),
            &format!("--meal={}", meal),
            "--json",
        ],
    );
    notes
        .as_array()
        .unwrap()
        .iter()
        .map(|n| {
            (
                n["id"].as_i64().unwrap(),
                n["display_order"].as_i64().unwrap(),
            )
        })
        .collect()
}

#[test]
fn test_creates_database_in_working_directory() {
    let tmp = TempDir::new().unwrap();

    let output = run(tmp.path(), &["page", "list"]);

    assert!(output.status.success());
    assert!(tmp.path().join("food-diary.db").exists());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("No pages found"));
}

#[test]
fn test_db_flag_overrides_location() {
    let tmp = TempDir::new().unwrap();

    let output = run(tmp.path(), &["--db", "custom.db", "product", "list"]);

    assert!(output.status.success());
    assert!(tmp.path().join("custom.db").exists());
    assert!(!tmp.path().join("food-diary.db").exists());
}

#[test]
fn test_notes_are_appended_in_creation_order() {
    let tmp = TempDir::new().unwrap();
    let (page, product) = seed(tmp.path());

    let ids: Vec<i64> = (0..3)
        .map(|_| add_note(tmp.path(), page, product, "breakfast"))
        .collect();

    assert_eq!(
        meal_order(tmp.path(), page, "breakfast"),
        vec![(ids[0], 0), (ids[1], 1), (ids[2], 2)]
    );
}

#[test]
fn test_unknown_product_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let (page, _) = seed(tmp.path());

    let output = run(
        tmp.path(),
        &[
            "note",
            "add",
            &format!("--page={}", page),
            "--meal=lunch",
            "--product=999",
            "--quantity=50",
        ],
    );

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ProductId: Selected product not found"));
}

#[test]
fn test_delete_compacts_group() {
    let tmp = TempDir::new().unwrap();
    let (page, product) = seed(tmp.path());
    let a = add_note(tmp.path(), page, product, "dinner");
    let b = add_note(tmp.path(), page, product, "dinner");
    let c = add_note(tmp.path(), page, product, "dinner");

    let output = run(tmp.path(), &["note", "delete", &b.to_string(), "--force"]);
    assert!(output.status.success());

    assert_eq!(meal_order(tmp.path(), page, "dinner"), vec![(a, 0), (c, 1)]);
}

#[test]
fn test_delete_without_force_in_non_interactive_mode_fails() {
    let tmp = TempDir::new().unwrap();
    let (page, product) = seed(tmp.path());
    let a = add_note(tmp.path(), page, product, "dinner");

    let output = diary_cmd(tmp.path())
        .args(["note", "delete", &a.to_string()])
        .stdin(std::process::Stdio::null())
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert_eq!(meal_order(tmp.path(), page, "dinner"), vec![(a, 0)]);
}

#[test]
fn test_batch_delete_with_wrong_id_changes_nothing() {
    let tmp = TempDir::new().unwrap();
    let (page, product) = seed(tmp.path());
    let a = add_note(tmp.path(), page, product, "lunch");
    let b = add_note(tmp.path(), page, product, "lunch");

    let output = run(
        tmp.path(),
        &["note", "delete", &a.to_string(), "4711", "--force"],
    );

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("wrong ids specified"));
    assert_eq!(meal_order(tmp.path(), page, "lunch"), vec![(a, 0), (b, 1)]);
}

#[test]
fn test_move_between_meals() {
    let tmp = TempDir::new().unwrap();
    let (page, product) = seed(tmp.path());
    let a0 = add_note(tmp.path(), page, product, "breakfast");
    let a1 = add_note(tmp.path(), page, product, "breakfast");
    let a2 = add_note(tmp.path(), page, product, "breakfast");
    let b0 = add_note(tmp.path(), page, product, "lunch");
    let b1 = add_note(tmp.path(), page, product, "lunch");

    let report = run_json(
        tmp.path(),
        &[
            "note",
            "move",
            &a1.to_string(),
            "--meal=lunch",
            "--position=0",
            "--json",
        ],
    );
    assert_eq!(report["ordering_writes"].as_i64(), Some(4));

    assert_eq!(
        meal_order(tmp.path(), page, "breakfast"),
        vec![(a0, 0), (a2, 1)]
    );
    assert_eq!(
        meal_order(tmp.path(), page, "lunch"),
        vec![(a1, 0), (b0, 1), (b1, 2)]
    );
}

#[test]
fn test_move_out_of_range_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let (page, product) = seed(tmp.path());
    let a = add_note(tmp.path(), page, product, "breakfast");
    add_note(tmp.path(), page, product, "lunch");
    add_note(tmp.path(), page, product, "lunch");

    for position in ["--position=5", "--position=-1"] {
        let output = run(
            tmp.path(),
            &["note", "move", &a.to_string(), "--meal=lunch", position],
        );
        assert!(!output.status.success());
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("Note cannot be moved to the specified position"));
    }

    assert_eq!(meal_order(tmp.path(), page, "breakfast"), vec![(a, 0)]);
}

#[test]
fn test_move_to_same_position_is_noop() {
    let tmp = TempDir::new().unwrap();
    let (page, product) = seed(tmp.path());
    add_note(tmp.path(), page, product, "dinner");
    let b = add_note(tmp.path(), page, product, "dinner");

    let output = run(
        tmp.path(),
        &["note", "move", &b.to_string(), "--meal=dinner", "--position=1"],
    );

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("already at position 1"));
}

#[test]
fn test_edit_keeps_position() {
    let tmp = TempDir::new().unwrap();
    let (page, product) = seed(tmp.path());
    add_note(tmp.path(), page, product, "dinner");
    let b = add_note(tmp.path(), page, product, "dinner");

    let edited = run_json(
        tmp.path(),
        &[
            "note",
            "edit",
            &b.to_string(),
            &format!("--product={}", product),
            "--quantity=320",
            "--json",
        ],
    );

    assert_eq!(edited["display_order"].as_i64(), Some(1));
    assert_eq!(edited["product_quantity"].as_i64(), Some(320));
}

#[test]
fn test_list_for_missing_page_fails() {
    let tmp = TempDir::new().unwrap();

    let output = run(tmp.path(), &["note", "list", "--page=42"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Not found: page 42"));
}

#[test]
fn test_text_listing_groups_by_meal() {
    let tmp = TempDir::new().unwrap();
    let (page, product) = seed(tmp.path());
    add_note(tmp.path(), page, product, "dinner");
    add_note(tmp.path(), page, product, "breakfast");

    let output = run(tmp.path(), &["note", "list", &format!("--page={}", page)]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let breakfast = stdout.find("breakfast").unwrap();
    let dinner = stdout.find("dinner").unwrap();
    assert!(breakfast < dinner);
    assert!(stdout.contains("Yogurt"));
}
