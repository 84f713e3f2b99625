use assert_cmd::Command;

fn shelf() -> Command {
    let mut cmd = Command::cargo_bin("shelf").unwrap();
    cmd.env("SHELF_CONFIG_DIR", env!("CARGO_MANIFEST_DIR"))
        .env("SHELF_ENV", "local")
        .env("SHELF__DATABASE__URL", "sqlite::memory:")
        .env("RUST_LOG", "error");
    cmd
}

fn stdout_of(cmd: &mut Command) -> String {
    let output = cmd.assert().success().get_output().stdout.clone();
    String::from_utf8(output).unwrap()
}

#[test]
fn migrate_applies_books_schema() {
    let out = stdout_of(shelf().arg("migrate"));
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines, vec!["applied 1 migration(s)", "  books/001_init"]);
}

#[test]
fn admin_list_on_empty_database_prints_empty_json() {
    let out = stdout_of(shelf().args(["admin", "list", "--json"]));
    assert_eq!(out.trim(), "[]");
}

#[test]
fn admin_show_reports_missing_request() {
    shelf().args(["admin", "show", "41"]).assert().failure();
}

#[test]
fn admin_edit_requires_a_field() {
    shelf().args(["admin", "edit", "1"]).assert().failure();
}

#[test]
fn unknown_status_filter_is_rejected_by_the_parser() {
    shelf()
        .args(["admin", "list", "--status", "Perdido"])
        .assert()
        .failure()
        .code(2);
}
