mod common;

use docket_client::LocalFactory;
use docket_harness::{RunOptions, SuiteOptions, discover, run_suite};

const GREEN: &str = "t = db.c;\nt.insertOne({ a: 1 });\nassert.eq(1, t.countDocuments());\n";
const RED: &str = "assert.eq(1, 2, 'never');\n";

#[test]
fn discovery_is_recursive_sorted_and_js_only() {
    let dir = common::script_dir(&[
        ("b.js", GREEN),
        ("a.js", GREEN),
        ("nested/c.js", GREEN),
        ("notes.txt", "not a script"),
    ]);
    let files = discover(&[dir.path().to_path_buf()]).unwrap();
    let names: Vec<String> = files
        .iter()
        .map(|p| p.strip_prefix(dir.path()).unwrap().display().to_string())
        .collect();
    assert_eq!(names, vec!["a.js", "b.js", "nested/c.js"]);
}

#[test]
fn missing_path_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(discover(&[dir.path().join("absent")]).is_err());
}

#[test]
fn parallel_runs_are_isolated() {
    let files: Vec<(String, &str)> = (0..12).map(|i| (format!("s{i:02}.js"), GREEN)).collect();
    let refs: Vec<(&str, &str)> = files.iter().map(|(n, s)| (n.as_str(), *s)).collect();
    let dir = common::script_dir(&refs);

    let paths = discover(&[dir.path().to_path_buf()]).unwrap();
    let options = SuiteOptions {
        jobs: 4,
        ..SuiteOptions::default()
    };
    let report = run_suite(&paths, &LocalFactory::default(), &options);
    // Every script counts exactly its own document
    assert!(report.is_green(), "{}", report.render_text());
    let names: Vec<&str> = report.scripts.iter().map(|s| s.name.as_str()).collect();
    let mut sorted = names.clone();
    sorted.sort();
    assert_eq!(names, sorted);
}

#[test]
fn excluded_tags_skip_scripts() {
    let tagged = format!("// @tags: [requires_sharding]\n{RED}");
    let dir = common::script_dir(&[("tagged.js", &tagged), ("plain.js", GREEN)]);
    let paths = discover(&[dir.path().to_path_buf()]).unwrap();
    let options = SuiteOptions {
        exclude_tags: vec!["requires_sharding".into()],
        ..SuiteOptions::default()
    };
    let report = run_suite(&paths, &LocalFactory::default(), &options);
    assert!(report.is_green());
    assert_eq!(report.scripts.len(), 1);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].tag, "requires_sharding");
}

#[test]
fn stepdown_tag_is_inert() {
    let tagged = format!("// @tags: [does_not_support_stepdowns]\n{GREEN}");
    let dir = common::script_dir(&[("tagged.js", &tagged)]);
    let paths = discover(&[dir.path().to_path_buf()]).unwrap();
    let report = run_suite(&paths, &LocalFactory::default(), &SuiteOptions::default());
    assert!(report.is_green());
    assert_eq!(report.scripts[0].tags, vec!["does_not_support_stepdowns"]);
}

#[test]
fn one_red_script_fails_the_suite() {
    let dir = common::script_dir(&[("green.js", GREEN), ("red.js", RED)]);
    let paths = discover(&[dir.path().to_path_buf()]).unwrap();
    let report = run_suite(&paths, &LocalFactory::default(), &SuiteOptions::default());
    assert!(!report.is_green());
    assert_eq!(report.failed(), 1);
    assert!(report.render_text().contains("FAIL"));
}

#[test]
fn kept_data_is_visible_after_the_run() {
    let dir = common::script_dir(&[("keep.js", GREEN)]);
    let paths = discover(&[dir.path().to_path_buf()]).unwrap();
    let factory = LocalFactory::default();
    let options = SuiteOptions {
        run: RunOptions {
            db_prefix: "suite_keep".into(),
            keep_data: true,
        },
        ..SuiteOptions::default()
    };
    assert!(run_suite(&paths, &factory, &options).is_green());
    let db = format!("suite_keep_{}_1", std::process::id());
    assert_eq!(factory.store().list_collections(&db).unwrap(), vec!["c"]);
}
