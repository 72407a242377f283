//! Decoder for the build tool's streamed JSON query output.
//!
//! The input is a sequence of JSON target messages as produced by
//! `query --output=streamed_jsonproto`, one per line. Rules and source files
//! are turned into `TargetRecord`s for the `GraphBuilder`; everything else is
//! skipped.
use serde::Deserialize;
use std::collections::{HashMap, HashSet};

use crate::errors::ParseError;
use crate::graph::{Label, Location, TargetRecord, GENERATED_FILE_KIND, SOURCE_FILE_KIND};
use crate::utils::config::RulesConfig;

const DEFAULT_SOURCE_KINDS: &[&str] = &[
    "java_library",
    "java_binary",
    "java_test",
    "java_plugin",
    "java_proto_library",
    "java_lite_proto_library",
    "android_library",
    "android_binary",
    "android_local_test",
    "android_instrumentation_test",
    "kt_jvm_library",
    "kt_jvm_binary",
    "kt_jvm_test",
    "kt_android_library",
];
const DEFAULT_SOURCE_ATTRIBUTES: &[&str] = &["srcs"];
const DEFAULT_DEPENDENCY_ATTRIBUTES: &[&str] = &["deps", "runtime_deps", "exports"];
// Rules whose sources are handed through unchanged to whoever lists them.
const FILEGROUP_KIND: &str = "filegroup";

/// Which rules carry sources, and which attributes hold their sources and deps.
#[derive(Debug, Clone)]
pub struct RuleKinds {
    pub source_kinds: HashSet<String>,
    pub source_attributes: Vec<String>,
    pub dependency_attributes: Vec<String>,
}

impl Default for RuleKinds {
    fn default() -> Self {
        let owned = |v: &[&str]| v.iter().map(|s| (*s).to_string()).collect::<Vec<_>>();
        Self {
            source_kinds: owned(DEFAULT_SOURCE_KINDS).into_iter().collect(),
            source_attributes: owned(DEFAULT_SOURCE_ATTRIBUTES),
            dependency_attributes: owned(DEFAULT_DEPENDENCY_ATTRIBUTES),
        }
    }
}

impl RuleKinds {
    /// Defaults overridden by whatever the `[rules]` config section sets.
    #[must_use]
    pub fn from_config(cfg: Option<&RulesConfig>) -> Self {
        let mut kinds = Self::default();
        let Some(cfg) = cfg else { return kinds };
        if let Some(v) = &cfg.source_kinds {
            kinds.source_kinds = v.iter().cloned().collect();
        }
        if let Some(v) = &cfg.source_attributes {
            kinds.source_attributes.clone_from(v);
        }
        if let Some(v) = &cfg.dependency_attributes {
            kinds.dependency_attributes.clone_from(v);
        }
        kinds
    }

    #[must_use]
    pub fn is_source_kind(&self, rule_class: &str) -> bool {
        self.source_kinds.contains(rule_class)
    }
}

#[derive(Debug, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum TargetType {
    Rule,
    SourceFile,
    GeneratedFile,
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTarget {
    #[serde(rename = "type")]
    target_type: TargetType,
    rule: Option<RawRule>,
    source_file: Option<RawFile>,
    generated_file: Option<RawFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRule {
    name: String,
    rule_class: String,
    #[serde(default)]
    attribute: Vec<RawAttribute>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAttribute {
    name: String,
    string_value: Option<String>,
    #[serde(default)]
    string_list_value: Vec<String>,
}

impl RawAttribute {
    fn values(&self) -> impl Iterator<Item = &str> {
        self.string_value.iter().chain(self.string_list_value.iter()).map(String::as_str).filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFile {
    name: String,
    location: Option<String>,
}

/// Counts of what one parse saw, for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseStats {
    pub rules: usize,
    pub source_rules: usize,
    pub source_files: usize,
    pub skipped: usize,
}

#[derive(Debug, Default)]
pub struct QueryOutputParser {
    kinds: RuleKinds,
}

impl QueryOutputParser {
    #[must_use]
    pub fn new(kinds: RuleKinds) -> Self {
        Self { kinds }
    }

    /// Decode `bytes` into builder records.
    ///
    /// # Errors
    /// `ParseError::Json` for undecodable input, `ParseError::Graph` for labels or
    /// locations that fail validation.
    pub fn parse(&self, bytes: &[u8]) -> Result<Vec<TargetRecord>, ParseError> {
        self.parse_with_stats(bytes).map(|(records, _)| records)
    }

    /// Like `parse`, also returning what was seen.
    ///
    /// # Errors
    /// See `parse`.
    pub fn parse_with_stats(&self, bytes: &[u8]) -> Result<(Vec<TargetRecord>, ParseStats), ParseError> {
        let targets = decode(bytes)?;
        let mut stats = ParseStats::default();

        // Pass 1: rules, and which rule owns each source label. First owner wins.
        let mut owners: HashMap<Label, Label> = HashMap::new();
        let mut records: Vec<TargetRecord> = Vec::with_capacity(targets.len());
        let mut generated: HashSet<Label> = HashSet::new();
        let mut rules: HashSet<Label> = HashSet::new();
        let mut filegroups: HashMap<Label, Vec<Label>> = HashMap::new();
        for target in &targets {
            match target.target_type {
                TargetType::Rule => {
                    let Some(rule) = &target.rule else { continue };
                    stats.rules += 1;
                    let record = self.rule_record(rule, &mut owners, &mut stats)?;
                    if rule.rule_class == FILEGROUP_KIND {
                        filegroups.insert(record.label.clone(), self.source_values(rule)?);
                    }
                    rules.insert(record.label.clone());
                    records.push(record);
                }
                TargetType::GeneratedFile => {
                    if let Some(file) = &target.generated_file {
                        generated.insert(Label::parse(&file.name)?);
                    }
                }
                TargetType::SourceFile => {}
                TargetType::Other => stats.skipped += 1,
            }
        }

        forward_filegroup_sources(&mut owners, &filegroups);

        // Pass 2: source files, attached to their owners.
        let mut seen_sources: HashSet<Label> = HashSet::new();
        for target in &targets {
            if target.target_type != TargetType::SourceFile {
                continue;
            }
            let Some(file) = &target.source_file else { continue };
            let label = Label::parse(&file.name)?;
            let mut record = TargetRecord::new(label.clone(), SOURCE_FILE_KIND);
            if let Some(raw) = &file.location {
                record = record.with_location(Location::parse(raw)?);
            }
            if let Some(owner) = owners.get(&label) {
                record = record.with_owner(owner.clone());
            }
            stats.source_files += 1;
            seen_sources.insert(label);
            records.push(record);
        }

        // Owned labels that never showed up as a source file (generated, or outside the query).
        // Rules listed as sources already have their own record and keep their kind.
        let mut missing: Vec<(&Label, &Label)> = owners
            .iter()
            .filter(|(src, _)| !seen_sources.contains(*src) && !rules.contains(*src))
            .collect();
        missing.sort();
        for (src, owner) in missing {
            let kind = if generated.contains(src) { GENERATED_FILE_KIND } else { SOURCE_FILE_KIND };
            records.push(TargetRecord::new(src.clone(), kind).with_owner(owner.clone()));
        }

        stats.skipped += generated.iter().filter(|g| !owners.contains_key(*g)).count();
        tracing::debug!(
            rules = stats.rules,
            source_rules = stats.source_rules,
            source_files = stats.source_files,
            skipped = stats.skipped,
            "parsed query output"
        );
        Ok((records, stats))
    }

    fn rule_record(
        &self,
        rule: &RawRule,
        owners: &mut HashMap<Label, Label>,
        stats: &mut ParseStats,
    ) -> Result<TargetRecord, ParseError> {
        let label = Label::parse(&rule.name)?;
        let record = TargetRecord::new(label.clone(), rule.rule_class.clone());
        if !self.kinds.is_source_kind(&rule.rule_class) {
            return Ok(record);
        }
        stats.source_rules += 1;

        let mut deps: Vec<Label> = Vec::new();
        let mut seen: HashSet<Label> = HashSet::new();
        for attr in &rule.attribute {
            if self.kinds.source_attributes.iter().any(|a| a == &attr.name) {
                for value in attr.values() {
                    let src = Label::parse(value)?;
                    match owners.get(&src) {
                        Some(existing) => {
                            tracing::debug!(source = %src, kept = %existing, ignored = %label, "source listed by several rules");
                        }
                        None => {
                            owners.insert(src, label.clone());
                        }
                    }
                }
            } else if self.kinds.dependency_attributes.iter().any(|a| a == &attr.name) {
                for value in attr.values() {
                    let dep = Label::parse(value)?;
                    if seen.insert(dep.clone()) {
                        deps.push(dep);
                    }
                }
            }
        }
        Ok(record.with_deps(deps))
    }

    fn source_values(&self, rule: &RawRule) -> Result<Vec<Label>, ParseError> {
        let mut out = Vec::new();
        for attr in rule.attribute.iter().filter(|a| self.kinds.source_attributes.contains(&a.name)) {
            for value in attr.values() {
                out.push(Label::parse(value)?);
            }
        }
        Ok(out)
    }
}

/// A source rule that lists a filegroup also owns the filegroup's members, nested
/// groups included. Direct listings keep precedence; otherwise the first owner wins.
fn forward_filegroup_sources(owners: &mut HashMap<Label, Label>, filegroups: &HashMap<Label, Vec<Label>>) {
    let mut pending: Vec<(Label, Label)> = owners
        .iter()
        .filter(|(group, _)| filegroups.contains_key(*group))
        .map(|(group, owner)| (group.clone(), owner.clone()))
        .collect();
    // Pop in label order so the outcome does not depend on hash iteration.
    pending.sort_by(|a, b| b.cmp(a));
    while let Some((group, owner)) = pending.pop() {
        let Some(members) = filegroups.get(&group) else { continue };
        for member in members {
            if owners.contains_key(member) {
                continue;
            }
            tracing::trace!(source = %member, via = %group, owner = %owner, "source reached through filegroup");
            owners.insert(member.clone(), owner.clone());
            if filegroups.contains_key(member) {
                pending.push((member.clone(), owner.clone()));
            }
        }
    }
}

fn decode(bytes: &[u8]) -> Result<Vec<RawTarget>, ParseError> {
    let mut stream = serde_json::Deserializer::from_slice(bytes).into_iter::<RawTarget>();
    let mut out = Vec::new();
    loop {
        let offset = stream.byte_offset();
        match stream.next() {
            Some(Ok(target)) => out.push(target),
            Some(Err(source)) => return Err(ParseError::Json { offset, source }),
            None => break,
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const OUTPUT: &str = r#"
{"type":"RULE","rule":{"name":"//foo:lib","ruleClass":"java_library","attribute":[{"name":"srcs","type":"LABEL_LIST","stringListValue":["//foo:A.java","//foo:Gen.java"]},{"name":"deps","type":"LABEL_LIST","stringListValue":["//bar:bar","@maven//:guava"]},{"name":"exports","type":"LABEL_LIST","stringListValue":["//bar:bar"]}]}}
{"type":"RULE","rule":{"name":"//bar:bar","ruleClass":"genrule","attribute":[{"name":"srcs","type":"LABEL_LIST","stringListValue":["//bar:in.txt"]}]}}
{"type":"SOURCE_FILE","sourceFile":{"name":"//foo:A.java","location":"foo/A.java:1:1"}}
{"type":"GENERATED_FILE","generatedFile":{"name":"//foo:Gen.java","location":"foo/Gen.java:1:1"}}
{"type":"PACKAGE_GROUP","packageGroup":{"name":"//foo:friends"}}
"#;

    fn l(s: &str) -> Label {
        Label::parse(s).unwrap()
    }

    #[test]
    fn rules_and_sources_become_records() {
        let (records, stats) = QueryOutputParser::default().parse_with_stats(OUTPUT.as_bytes()).unwrap();
        assert_eq!(stats.rules, 2);
        assert_eq!(stats.source_rules, 1);
        assert_eq!(stats.source_files, 1);

        let lib = records.iter().find(|r| r.label == l("//foo:lib")).unwrap();
        assert_eq!(lib.deps.as_ref().unwrap(), &vec![l("//bar:bar"), l("@maven//:guava")]);

        let genrule = records.iter().find(|r| r.label == l("//bar:bar")).unwrap();
        assert!(genrule.deps.is_none());
        assert_eq!(genrule.kind, "genrule");

        let a = records.iter().find(|r| r.label == l("//foo:A.java")).unwrap();
        assert_eq!(a.owner, Some(l("//foo:lib")));
        assert_eq!(a.location.as_ref().unwrap().file, std::path::PathBuf::from("foo/A.java"));

        let generated = records.iter().find(|r| r.label == l("//foo:Gen.java")).unwrap();
        assert_eq!(generated.kind, GENERATED_FILE_KIND);
        assert_eq!(generated.owner, Some(l("//foo:lib")));
        assert!(generated.location.is_none());

        // Non-source rules do not claim ownership of their inputs.
        assert!(records.iter().all(|r| r.label != l("//bar:in.txt")));
    }

    #[test]
    fn first_rule_wins_shared_sources() {
        let out = r#"
{"type":"RULE","rule":{"name":"//a:one","ruleClass":"java_library","attribute":[{"name":"srcs","stringListValue":["//a:S.java"]}]}}
{"type":"RULE","rule":{"name":"//a:two","ruleClass":"java_library","attribute":[{"name":"srcs","stringListValue":["//a:S.java"]}]}}
{"type":"SOURCE_FILE","sourceFile":{"name":"//a:S.java","location":"a/S.java:1:1"}}
"#;
        let records = QueryOutputParser::default().parse(out.as_bytes()).unwrap();
        let s = records.iter().find(|r| r.label == l("//a:S.java")).unwrap();
        assert_eq!(s.owner, Some(l("//a:one")));
    }

    #[test]
    fn nested_filegroups_forward_ownership() {
        let out = r#"
{"type":"RULE","rule":{"name":"//a:lib","ruleClass":"java_library","attribute":[{"name":"srcs","stringListValue":["//a:outer","//a:Direct.java"]}]}}
{"type":"RULE","rule":{"name":"//a:outer","ruleClass":"filegroup","attribute":[{"name":"srcs","stringListValue":["//a:inner","//a:Direct.java"]}]}}
{"type":"RULE","rule":{"name":"//a:inner","ruleClass":"filegroup","attribute":[{"name":"srcs","stringListValue":["//a:Deep.java","//a:outer"]}]}}
{"type":"RULE","rule":{"name":"//a:other","ruleClass":"java_library","attribute":[{"name":"srcs","stringListValue":["//a:Deep.java"]}]}}
{"type":"SOURCE_FILE","sourceFile":{"name":"//a:Direct.java","location":"a/Direct.java:1:1"}}
{"type":"SOURCE_FILE","sourceFile":{"name":"//a:Deep.java","location":"a/Deep.java:1:1"}}
"#;
        let records = QueryOutputParser::default().parse(out.as_bytes()).unwrap();
        let owner_of = |s: &str| records.iter().find(|r| r.label == l(s)).and_then(|r| r.owner.clone());
        assert_eq!(owner_of("//a:Direct.java"), Some(l("//a:lib")));
        // A direct listing beats one reached through a filegroup.
        assert_eq!(owner_of("//a:Deep.java"), Some(l("//a:other")));
        // Each rule appears once, under its own kind and without an owner.
        for rule in ["//a:outer", "//a:inner"] {
            let recs: Vec<_> = records.iter().filter(|r| r.label == l(rule)).collect();
            assert_eq!(recs.len(), 1, "{rule}");
            assert_eq!(recs[0].kind, "filegroup");
            assert_eq!(recs[0].owner, None);
        }
    }

    #[test]
    fn absolute_location_fails() {
        let out = r#"{"type":"SOURCE_FILE","sourceFile":{"name":"//a:S.java","location":"/ws/a/S.java:1:1"}}"#;
        let err = QueryOutputParser::default().parse(out.as_bytes()).unwrap_err();
        assert!(matches!(err, ParseError::Graph(crate::errors::GraphError::AbsoluteLocation(_))));
    }

    #[test]
    fn truncated_output_reports_offset() {
        let out = "{\"type\":\"RULE\",\"rule\":{\"name\":\"//a:a\",\"ruleClass\":\"x\"}}\n{\"type\":";
        match QueryOutputParser::default().parse(out.as_bytes()) {
            Err(ParseError::Json { offset, .. }) => assert!(offset > 0),
            other => panic!("expected JSON error, got {other:?}"),
        }
    }

    #[test]
    fn empty_output_is_empty() {
        assert!(QueryOutputParser::default().parse(b"").unwrap().is_empty());
        assert!(QueryOutputParser::default().parse(b"\n\n").unwrap().is_empty());
    }

    #[test]
    fn config_overrides_kinds() {
        let cfg = RulesConfig {
            source_kinds: Some(vec!["my_rule".into()]),
            source_attributes: None,
            dependency_attributes: Some(vec!["libs".into()]),
        };
        let kinds = RuleKinds::from_config(Some(&cfg));
        assert!(kinds.is_source_kind("my_rule"));
        assert!(!kinds.is_source_kind("java_library"));
        assert_eq!(kinds.source_attributes, vec!["srcs".to_string()]);
        assert_eq!(kinds.dependency_attributes, vec!["libs".to_string()]);
    }
}
