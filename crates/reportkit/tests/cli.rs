//! Runs the built `reportkit` binary against files in a temporary directory.

use std::path::PathBuf;
use std::process::{Command, Output};

use pretty_assertions::assert_eq;
use tempfile::TempDir;

const SCHEMA: &str = r#"<reportSchema name="Site roster">
  <parameters>
    <parameter name="site" type="string"/>
  </parameters>
  <dataSets>
    <dataSet name="roster" type="subject-attributes">
      <property name="columns" value="$cols"/>
    </dataSet>
  </dataSets>
</reportSchema>
"#;

const POPULATION: &str = r#"{"subjects": [
  {"id": 1, "attributes": {"gender": "F", "site": "north"}},
  {"id": 2, "attributes": {"gender": "M", "site": "south"}},
  {"id": 3, "attributes": {"gender": "F"}}
]}"#;

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let workspace = Self {
            dir: TempDir::new().unwrap(),
        };
        workspace.write("schema.xml", SCHEMA);
        workspace.write("population.json", POPULATION);
        workspace.write("macros.toml", "[macros]\ncols = \"gender, site\"\n");
        workspace
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn write(&self, name: &str, content: &str) {
        std::fs::write(self.path(name), content).unwrap();
    }

    fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_reportkit"))
            .current_dir(self.dir.path())
            .env_remove("RUST_LOG")
            .args(args)
            .output()
            .unwrap()
    }
}

fn stdout(output: &Output) -> String {
    assert!(
        output.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout.clone()).unwrap()
}

#[test]
fn expand_substitutes_macros() {
    let ws = Workspace::new();
    let out = stdout(&ws.run(&["--macros", "macros.toml", "expand", "schema.xml"]));
    assert!(out.contains(r#"<property name="columns" value="gender, site"/>"#));
}

#[test]
fn check_reports_materialization_errors() {
    let ws = Workspace::new();
    ws.write(
        "broken.xml",
        "<reportSchema name=\"x\">\n  <dataSets>\n    <dataSet name=\"a\" type=\"nope\"/>\n  </dataSets>\n</reportSchema>\n",
    );
    let output = ws.run(&["check", "broken.xml"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("nope"), "stderr: {stderr}");
}

#[test]
fn check_prints_summary() {
    let ws = Workspace::new();
    let out = stdout(&ws.run(&["--macros", "macros.toml", "check", "schema.xml"]));
    assert_eq!(
        out,
        "Schema: Site roster\nParameters:\n  site (string, required)\nData sets:\n  roster (subject-attributes)\n"
    );
}

#[test]
fn modes_are_listed_in_preferred_order() {
    let ws = Workspace::new();
    let out = stdout(&ws.run(&["--macros", "macros.toml", "modes", "schema.xml"]));
    let ids: Vec<&str> = out
        .lines()
        .map(|line| line.split('\t').next().unwrap())
        .collect();
    assert_eq!(ids, vec!["text-table", "delimited:csv", "delimited:tsv"]);
}

#[test]
fn renderers_follow_config() {
    let ws = Workspace::new();
    ws.write("reportkit.toml", "renderers = [\"delimited\"]\n");
    let out = stdout(&ws.run(&["--config", "reportkit.toml", "renderers"]));
    assert_eq!(out, "delimited\tDelimited text\n");
}

#[test]
fn run_renders_csv_for_cohort() {
    let ws = Workspace::new();
    let out = stdout(&ws.run(&[
        "--macros",
        "macros.toml",
        "run",
        "schema.xml",
        "--population",
        "population.json",
        "-P",
        "site=north",
        "--cohort",
        "1,3",
        "--mode",
        "delimited:csv",
    ]));
    assert_eq!(out, "subject,gender,site\n1,F,north\n3,F,\n");
}

#[test]
fn run_requires_parameters() {
    let ws = Workspace::new();
    let output = ws.run(&[
        "--macros",
        "macros.toml",
        "run",
        "schema.xml",
        "--population",
        "population.json",
    ]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Missing required parameters: site"), "stderr: {stderr}");
}

#[test]
fn run_writes_into_directory() {
    let ws = Workspace::new();
    std::fs::create_dir(ws.path("out")).unwrap();
    stdout(&ws.run(&[
        "--macros",
        "macros.toml",
        "run",
        "schema.xml",
        "--population",
        "population.json",
        "-P",
        "site=x",
        "--mode",
        "delimited:tsv",
        "-o",
        "out",
    ]));
    let written = std::fs::read_to_string(ws.path("out").join("site-roster.tsv")).unwrap();
    assert_eq!(written, "subject\tgender\tsite\n1\tF\tnorth\n2\tM\tsouth\n3\tF\t\n");
}

#[test]
fn run_without_privilege_is_refused() {
    let ws = Workspace::new();
    ws.write("reportkit.toml", "privileges = []\nmacros-file = \"macros.toml\"\n");
    let output = ws.run(&[
        "--config",
        "reportkit.toml",
        "run",
        "schema.xml",
        "--population",
        "population.json",
        "-P",
        "site=x",
    ]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Run Reports"));
}

#[test]
fn macros_set_and_unset_edit_the_file() {
    let ws = Workspace::new();
    let file = ws.path("macros.toml");
    let file = file.to_str().unwrap();

    stdout(&ws.run(&["--macros", file, "macros", "set", "site", "north"]));
    let listed = stdout(&ws.run(&["--macros", file, "macros", "list"]));
    assert_eq!(listed, "cols = gender, site\nsite = north\n");

    stdout(&ws.run(&["--macros", file, "macros", "unset", "cols"]));
    let listed = stdout(&ws.run(&["--macros", file, "macros", "list"]));
    assert_eq!(listed, "site = north\n");

    let output = ws.run(&["--macros", file, "macros", "unset", "cols"]);
    assert!(!output.status.success());
}

#[test]
fn macros_set_needs_a_file() {
    let ws = Workspace::new();
    let output = ws.run(&["macros", "set", "site", "north"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("No macro file configured"));
}
