use querysync::errors::{ParseError, SyncError};
use querysync::graph::{GraphSummary, Label};
use querysync::parser::{QueryOutputParser, RuleKinds};
use querysync::sync::ingest;
use querysync::utils::config::RulesConfig;
use std::path::{Path, PathBuf};

const FIXTURE: &str = include_str!("fixtures/query_output.jsonl");

fn l(s: &str) -> Label {
    Label::parse(s).unwrap()
}

fn labels(v: &[&str]) -> Vec<Label> {
    v.iter().map(|s| l(s)).collect()
}

#[test]
fn fixture_builds_expected_snapshot() {
    let g = ingest(FIXTURE.as_bytes(), &RuleKinds::default()).unwrap();
    assert_eq!(
        g.summary(),
        GraphSummary { source_files: 5, source_targets: 5, rules: 4, project_deps: 5, android_targets: 1 }
    );
    assert!(g.project_deps().contains(&l("//third_party/jsr:jsr305")));
    assert!(!g.project_deps().contains(&l("//java/com/core:core")));
}

#[test]
fn file_dependencies_follow_the_owning_rule() {
    let g = ingest(FIXTURE.as_bytes(), &RuleKinds::default()).unwrap();

    let deps = g.file_dependencies(Path::new("java/com/app/MainActivity.java"));
    assert_eq!(
        deps.iter().cloned().collect::<Vec<_>>(),
        labels(&["//third_party/jsr:jsr305", "@maven//:androidx_appcompat", "@maven//:guava", "@maven//:slf4j_simple"])
    );

    let deps = g.file_dependencies(Path::new("javatests/com/core/CoreTest.java"));
    assert_eq!(
        deps.iter().cloned().collect::<Vec<_>>(),
        labels(&["//third_party/jsr:jsr305", "@maven//:junit", "@maven//:slf4j_simple"])
    );

    // Tracked, but not listed in any source attribute.
    assert_eq!(g.owning_target(Path::new("java/com/app/AndroidManifest.xml")), None);
    assert!(g.file_dependencies(Path::new("java/com/app/AndroidManifest.xml")).is_empty());
}

#[test]
fn source_listings() {
    let g = ingest(FIXTURE.as_bytes(), &RuleKinds::default()).unwrap();
    let mut lang: Vec<PathBuf> = g.language_source_files().into_iter().map(Path::to_path_buf).collect();
    lang.sort();
    assert_eq!(
        lang,
        vec![
            PathBuf::from("java/com/app/MainActivity.java"),
            PathBuf::from("java/com/app/util/Strings.java"),
            PathBuf::from("java/com/core/Core.java"),
            PathBuf::from("javatests/com/core/CoreTest.java"),
        ]
    );
    assert_eq!(g.android_source_files(), vec![Path::new("java/com/app/MainActivity.java")]);
    assert_eq!(g.target_kind(&l("//java/com/app/util:Gen.java")), Some("generated file"));
}

#[test]
fn parse_stats_count_what_was_seen() {
    let (_, stats) = QueryOutputParser::default().parse_with_stats(FIXTURE.as_bytes()).unwrap();
    assert_eq!(stats.rules, 6);
    assert_eq!(stats.source_rules, 4);
    assert_eq!(stats.source_files, 5);
}

#[test]
fn narrower_source_kinds_shrink_the_graph() {
    let cfg = RulesConfig { source_kinds: Some(vec!["java_test".into()]), ..Default::default() };
    let g = ingest(FIXTURE.as_bytes(), &RuleKinds::from_config(Some(&cfg))).unwrap();
    assert_eq!(g.summary().rules, 1);
    // core is no longer enumerated, so it becomes the boundary.
    let deps = g.file_dependencies(Path::new("javatests/com/core/CoreTest.java"));
    assert_eq!(deps.iter().cloned().collect::<Vec<_>>(), labels(&["//java/com/core:core", "@maven//:junit"]));
    assert_eq!(g.owning_target(Path::new("java/com/core/Core.java")), None);
}

#[test]
fn garbage_output_is_a_parse_error() {
    let err = ingest(b"not json at all", &RuleKinds::default()).unwrap_err();
    assert!(matches!(err, SyncError::Parse(ParseError::Json { .. })));
}

#[test]
fn bad_label_in_output_is_a_parse_error() {
    let out = r#"{"type":"RULE","rule":{"name":"not a label","ruleClass":"java_library"}}"#;
    let err = ingest(out.as_bytes(), &RuleKinds::default()).unwrap_err();
    assert!(matches!(err, SyncError::Parse(ParseError::Graph(_))));
}

#[test]
fn rules_listed_as_sources_keep_their_kind() {
    let out = r#"
{"type":"RULE","rule":{"name":"//foo:lib","ruleClass":"java_library","attribute":[{"name":"srcs","stringListValue":["//foo:A.java","//foo:gen_srcs","//foo:codegen"]},{"name":"deps","stringListValue":["@maven//:guava"]}]}}
{"type":"RULE","rule":{"name":"//foo:gen_srcs","ruleClass":"filegroup","attribute":[{"name":"srcs","stringListValue":["//foo:B.java"]}]}}
{"type":"RULE","rule":{"name":"//foo:codegen","ruleClass":"genrule","attribute":[{"name":"srcs","stringListValue":["//foo:schema.txt"]},{"name":"outs","stringListValue":["//foo:Gen.java"]}]}}
{"type":"SOURCE_FILE","sourceFile":{"name":"//foo:A.java","location":"foo/A.java:1:1"}}
{"type":"SOURCE_FILE","sourceFile":{"name":"//foo:B.java","location":"foo/B.java:1:1"}}
{"type":"SOURCE_FILE","sourceFile":{"name":"//foo:schema.txt","location":"foo/schema.txt:1:1"}}
{"type":"GENERATED_FILE","generatedFile":{"name":"//foo:Gen.java","generatingRule":"//foo:codegen"}}
"#;
    let g = ingest(out.as_bytes(), &RuleKinds::default()).unwrap();
    assert_eq!(g.target_kind(&l("//foo:gen_srcs")), Some("filegroup"));
    assert_eq!(g.target_kind(&l("//foo:codegen")), Some("genrule"));

    // Files behind a filegroup belong to the rule that lists the group.
    assert_eq!(g.owning_target(Path::new("foo/A.java")), Some(&l("//foo:lib")));
    assert_eq!(g.owning_target(Path::new("foo/B.java")), Some(&l("//foo:lib")));
    assert_eq!(g.file_dependencies(Path::new("foo/B.java")).iter().cloned().collect::<Vec<_>>(), labels(&["@maven//:guava"]));

    // A genrule's inputs are not sources of the rule consuming its outputs.
    assert_eq!(g.owning_target(Path::new("foo/schema.txt")), None);
}
