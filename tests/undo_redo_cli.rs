mod support;

use predicates::str::contains;

use support::TestHome;

#[test]
fn undo_on_empty_history_is_not_an_error() -> Result<(), Box<dyn std::error::Error>> {
    let home = TestHome::new()?;
    home.cmd()
        .arg("undo")
        .assert()
        .success()
        .stdout(contains("Nothing to undo"));
    home.cmd()
        .arg("redo")
        .assert()
        .success()
        .stdout(contains("Nothing to redo"));

    let value = home.json(&["undo"])?;
    assert_eq!(value["data"]["applied"], false);
    Ok(())
}

#[test]
fn undo_delete_restores_task() -> Result<(), Box<dyn std::error::Error>> {
    let home = TestHome::new()?;
    home.cmd().args(["add", "A"]).assert().success();
    home.cmd().args(["rm", "1"]).assert().success();
    home.cmd()
        .args(["show", "1"])
        .assert()
        .code(2)
        .stderr(contains("Task #1 not found"));

    home.cmd()
        .arg("undo")
        .assert()
        .success()
        .stdout(contains("Undid: delete #1"));

    let task = home.json(&["show", "1"])?;
    assert_eq!(task["data"]["text"], "A");
    assert_eq!(task["data"]["completed"], false);
    Ok(())
}

#[test]
fn done_all_undoes_and_redoes_as_one_step() -> Result<(), Box<dyn std::error::Error>> {
    let home = TestHome::new()?;
    home.cmd().args(["add", "first"]).assert().success();
    home.cmd().args(["add", "second"]).assert().success();
    home.cmd().args(["done-all", "1", "2"]).assert().success();

    let undone = home.json(&["undo"])?;
    assert_eq!(undone["data"]["applied"], true);
    assert_eq!(undone["data"]["transaction"]["label"], "complete #1 #2");
    assert_eq!(undone["data"]["transaction"]["changes"], 2);

    let active = home.json(&["ls"])?;
    assert_eq!(active["data"]["total"], 2);

    home.cmd()
        .arg("redo")
        .assert()
        .success()
        .stdout(contains("Redid: complete #1 #2"));
    let after_redo = home.json(&["ls"])?;
    assert_eq!(after_redo["data"]["total"], 0);
    let completed = home.json(&["ls", "--completed"])?;
    assert_eq!(completed["data"]["total"], 2);
    Ok(())
}

#[test]
fn edit_round_trips_through_undo_and_redo() -> Result<(), Box<dyn std::error::Error>> {
    let home = TestHome::new()?;
    home.cmd().args(["add", "X"]).assert().success();
    home.cmd().args(["edit", "1", "--text", "Y"]).assert().success();

    home.cmd().arg("undo").assert().success();
    assert_eq!(home.json(&["show", "1"])?["data"]["text"], "X");

    home.cmd().arg("redo").assert().success();
    assert_eq!(home.json(&["show", "1"])?["data"]["text"], "Y");
    Ok(())
}

#[test]
fn new_change_after_undo_discards_redo() -> Result<(), Box<dyn std::error::Error>> {
    let home = TestHome::new()?;
    home.cmd().args(["add", "one"]).assert().success();
    home.cmd().args(["add", "two"]).assert().success();
    home.cmd().arg("undo").assert().success();
    home.cmd().args(["add", "three"]).assert().success();

    home.cmd()
        .arg("redo")
        .assert()
        .success()
        .stdout(contains("Nothing to redo"));

    let all = home.json(&["ls", "--all"])?;
    let ids: Vec<u64> = all["data"]["tasks"]
        .as_array()
        .map(|tasks| tasks.iter().filter_map(|task| task["id"].as_u64()).collect())
        .unwrap_or_default();
    assert_eq!(ids, vec![1, 3]);
    Ok(())
}

#[test]
fn history_reports_depths_and_labels() -> Result<(), Box<dyn std::error::Error>> {
    let home = TestHome::new()?;
    home.cmd().args(["add", "one"]).assert().success();
    home.cmd().args(["done", "1"]).assert().success();
    home.cmd().arg("undo").assert().success();

    let value = home.json(&["history"])?;
    assert_eq!(value["data"]["undo_depth"], 1);
    assert_eq!(value["data"]["redo_depth"], 1);
    assert_eq!(value["data"]["next_undo"], "add #1");
    assert_eq!(value["data"]["next_redo"], "done #1");
    Ok(())
}

#[test]
fn failed_command_records_no_history() -> Result<(), Box<dyn std::error::Error>> {
    let home = TestHome::new()?;
    home.cmd().args(["add", "one"]).assert().success();
    home.cmd().args(["stop", "1"]).assert().code(2);
    home.cmd().args(["rm", "9"]).assert().code(2);

    let value = home.json(&["history"])?;
    assert_eq!(value["data"]["undo_depth"], 1);
    Ok(())
}

#[test]
fn history_limit_from_config() -> Result<(), Box<dyn std::error::Error>> {
    let home = TestHome::new()?;
    home.write_file("config.toml", "[history]\nlimit = 2\n")?;
    for text in ["a", "b", "c"] {
        home.cmd().args(["add", text]).assert().success();
    }

    home.cmd().arg("undo").assert().success();
    home.cmd().arg("undo").assert().success();
    home.cmd()
        .arg("undo")
        .assert()
        .success()
        .stdout(contains("Nothing to undo"));

    let all = home.json(&["ls"])?;
    assert_eq!(all["data"]["total"], 1);
    assert_eq!(all["data"]["tasks"][0]["text"], "a");
    Ok(())
}

#[test]
fn json_error_envelope_for_missing_task() -> Result<(), Box<dyn std::error::Error>> {
    let home = TestHome::new()?;
    let output = home
        .cmd()
        .args(["show", "42", "--json"])
        .assert()
        .code(2)
        .get_output()
        .stdout
        .clone();
    let value: serde_json::Value = serde_json::from_slice(&output)?;
    assert_eq!(value["status"], "error");
    assert_eq!(value["command"], "show");
    assert_eq!(value["error"]["kind"], "not_found");
    assert_eq!(value["error"]["details"]["task_id"], 42);
    assert_eq!(value["next_steps"][0], "tix ls --all");
    Ok(())
}

#[test]
fn history_clear_forgets_both_stacks() -> Result<(), Box<dyn std::error::Error>> {
    let home = TestHome::new()?;
    home.cmd().args(["add", "one"]).assert().success();
    home.cmd().args(["add", "two"]).assert().success();
    home.cmd().arg("undo").assert().success();

    let value = home.json(&["history", "--clear"])?;
    assert_eq!(value["data"]["undo_depth"], 0);
    assert_eq!(value["data"]["redo_depth"], 0);

    home.cmd()
        .arg("undo")
        .assert()
        .success()
        .stdout(contains("Nothing to undo"));
    Ok(())
}

fn ids(value: &serde_json::Value) -> Vec<u64> {
    value["data"]["tasks"]
        .as_array()
        .map(|tasks| tasks.iter().filter_map(|task| task["id"].as_u64()).collect())
        .unwrap_or_default()
}

#[test]
fn clear_completed_undoes_and_redoes_as_one_step() -> Result<(), Box<dyn std::error::Error>> {
    let home = TestHome::new()?;
    for text in ["a", "b", "c", "d"] {
        home.cmd().args(["add", text]).assert().success();
    }
    home.cmd().args(["done-all", "1", "3", "4"]).assert().success();
    home.cmd().arg("clear").assert().success();
    assert_eq!(ids(&home.json(&["ls", "--all"])?), vec![2]);

    let undone = home.json(&["undo"])?;
    assert_eq!(undone["data"]["transaction"]["label"], "clear completed #1 #3 #4");
    assert_eq!(undone["data"]["transaction"]["changes"], 3);
    assert_eq!(ids(&home.json(&["ls", "--all"])?), vec![1, 2, 3, 4]);
    assert_eq!(ids(&home.json(&["ls", "--completed"])?), vec![1, 3, 4]);

    home.cmd()
        .arg("redo")
        .assert()
        .success()
        .stdout(contains("Redid: clear completed #1 #3 #4"));
    assert_eq!(ids(&home.json(&["ls", "--all"])?), vec![2]);
    Ok(())
}

#[test]
fn clear_active_undoes_and_redoes_as_one_step() -> Result<(), Box<dyn std::error::Error>> {
    let home = TestHome::new()?;
    for text in ["a", "b", "c"] {
        home.cmd().args(["add", text]).assert().success();
    }
    home.cmd().args(["done", "2"]).assert().success();

    let cleared = home.json(&["clear", "--active"])?;
    assert_eq!(cleared["data"]["changed"], serde_json::json!([1, 3]));
    assert_eq!(ids(&home.json(&["ls", "--all"])?), vec![2]);

    home.cmd().arg("undo").assert().success();
    let restored = home.json(&["ls"])?;
    assert_eq!(ids(&restored), vec![1, 3]);
    assert_eq!(restored["data"]["tasks"][0]["text"], "a");
    assert_eq!(restored["data"]["tasks"][1]["text"], "c");

    home.cmd().arg("redo").assert().success();
    assert_eq!(ids(&home.json(&["ls", "--all"])?), vec![2]);
    Ok(())
}

#[test]
fn clear_with_both_flags_empties_the_list() -> Result<(), Box<dyn std::error::Error>> {
    let home = TestHome::new()?;
    home.cmd().args(["add", "a"]).assert().success();
    home.cmd().args(["add", "b"]).assert().success();
    home.cmd().args(["done", "1"]).assert().success();

    home.cmd()
        .args(["clear", "--active", "--completed"])
        .assert()
        .success()
        .stdout(contains("Cleared 2 task(s)"));
    assert_eq!(home.json(&["ls", "--all"])?["data"]["total"], 0);

    home.cmd().arg("undo").assert().success();
    assert_eq!(ids(&home.json(&["ls", "--all"])?), vec![1, 2]);
    Ok(())
}
