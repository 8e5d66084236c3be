mod common;
use common::TestEnv;

#[test]
fn delete_and_clear() {
    let t = TestEnv::new();
    let one = t.add("one");
    let two = t.add("two");

    let out = t.stdout(&["delete", &one.to_string()]);
    assert_eq!(out.trim(), "deleted 1");
    let after = t.stdout(&["list"]);
    assert!(!after.contains("one"));
    assert!(after.contains(&format!("{}\t", two)));

    assert_eq!(t.stdout(&["delete"]).trim(), "cleared");
    assert!(t.json(&["list", "--json"]).as_array().unwrap().is_empty());
}
