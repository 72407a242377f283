use proptest::prelude::*;
use querysync::errors::GraphError;
use querysync::graph::{Label, Location};
use querysync::parser::QueryOutputParser;
use std::path::PathBuf;

#[test]
fn relative_location_parses_into_parts() {
    let loc = Location::parse("foo/Bar.java:12:5").unwrap();
    assert_eq!(loc, Location { file: PathBuf::from("foo/Bar.java"), row: 12, column: 5 });
}

#[test]
fn absolute_location_fails_construction() {
    assert!(matches!(Location::parse("/abs/Bar.java:1:1"), Err(GraphError::AbsoluteLocation(_))));
}

#[test]
fn bad_format_fails_parsing() {
    assert!(matches!(Location::parse("bad-format"), Err(GraphError::MalformedLocation(_))));
}

proptest! {
    // Parsing arbitrary input returns a result, never panics.
    #[test]
    fn location_parse_never_panics(s in ".*") {
        let _ = Location::parse(&s);
    }

    #[test]
    fn label_parse_never_panics(s in ".*") {
        if let Ok(label) = Label::parse(&s) {
            // Canonical form parses to itself.
            prop_assert_eq!(Label::parse(label.as_str()).unwrap(), label);
        }
    }

    #[test]
    fn well_formed_locations_round_trip(
        path in "[a-z][a-z0-9_]{0,7}(/[a-z][a-z0-9_]{0,7}){0,3}\\.(java|kt)",
        row in 1u32..1_000_000,
        column in 1u32..500,
    ) {
        let raw = format!("{path}:{row}:{column}");
        let loc = Location::parse(&raw).unwrap();
        prop_assert_eq!(&loc.file, &PathBuf::from(&path));
        prop_assert_eq!((loc.row, loc.column), (row, column));
        prop_assert_eq!(loc.to_string(), raw);
    }

    #[test]
    fn absolute_paths_are_always_rejected(path in "/[a-z]{1,8}(/[a-z]{1,8}){0,3}", row in 1u32..100) {
        let raw = format!("{path}:{row}:1");
        prop_assert!(matches!(Location::parse(&raw), Err(GraphError::AbsoluteLocation(_))));
    }

    // The decoder reports bad input as an error.
    #[test]
    fn query_output_decoder_never_panics(s in ".*") {
        let _ = QueryOutputParser::default().parse(s.as_bytes());
    }
}
