use std::collections::BTreeMap;

use csv_seeder::{
    TransformRules, Value,
    header::{HeaderMapping, MappedColumn, resolve_header},
    transform::{EmptyStringPolicy, RowOutcome, RowTransformer, normalize_token},
};
use proptest::prelude::*;

fn column_name() -> impl Strategy<Value = String> {
    "%?[a-z]{1,6}"
}

fn random_case(word: &'static str) -> impl Strategy<Value = String> {
    proptest::collection::vec(any::<bool>(), word.len()).prop_map(move |upper| {
        word.chars()
            .zip(upper)
            .map(|(ch, up)| if up { ch.to_ascii_uppercase() } else { ch })
            .collect()
    })
}

proptest! {
    #[test]
    fn resolving_twice_gives_the_same_mapping(
        header in proptest::collection::vec(column_name(), 0..8),
        schema in proptest::collection::vec("[a-z]{1,6}", 0..8),
        aliases in proptest::collection::btree_map(column_name(), column_name(), 0..4),
    ) {
        let first = resolve_header(&header, &schema, &aliases, Some("%"));
        let second = resolve_header(&header, &schema, &aliases, Some("%"));
        prop_assert_eq!(first, second);
    }

    #[test]
    fn mapped_columns_always_exist_in_schema(
        header in proptest::collection::vec(column_name(), 1..8),
        schema in proptest::collection::vec("[a-z]{1,6}", 1..8),
    ) {
        let mapping = resolve_header(&header, &schema, &BTreeMap::new(), Some("%"));
        prop_assert_eq!(mapping.len(), header.len());
        for (_, name) in mapping.destinations() {
            prop_assert!(schema.iter().any(|column| column == name));
            prop_assert!(!name.starts_with('%'));
        }
    }

    #[test]
    fn tokens_convert_in_any_case(
        null in random_case("null"),
        yes in random_case("true"),
        no in random_case("false"),
    ) {
        prop_assert_eq!(normalize_token(&null, EmptyStringPolicy::Null), Value::Null);
        prop_assert_eq!(normalize_token(&yes, EmptyStringPolicy::Null), Value::Boolean(true));
        prop_assert_eq!(normalize_token(&no, EmptyStringPolicy::Null), Value::Boolean(false));
    }

    #[test]
    fn identity_mapping_round_trips_values(
        fields in proptest::collection::vec("[a-zA-Z0-9 ]{0,8}", 1..6),
    ) {
        prop_assume!(fields.iter().any(|field| !field.is_empty()));
        let columns = (0..fields.len()).map(|idx| format!("c{idx}")).collect::<Vec<_>>();
        let mapping = HeaderMapping::identity(&columns);
        let rules = TransformRules::passthrough();
        let RowOutcome::Accepted(row) = RowTransformer::new(&mapping, &rules).transform(&fields) else {
            return Err(TestCaseError::fail("record was rejected"));
        };
        for (column, field) in columns.iter().zip(&fields) {
            let expected = normalize_token(field, EmptyStringPolicy::Null);
            prop_assert_eq!(row.get(column), Some(&expected));
        }
        prop_assert_eq!(row.len(), fields.len());
    }
}

#[test]
fn aliased_name_with_skip_prefix_is_dropped() {
    let aliases = BTreeMap::from([("foo".to_string(), "%bar".to_string())]);
    let mapping = resolve_header(
        &["foo"],
        &["%bar".to_string()],
        &aliases,
        Some("%"),
    );
    assert_eq!(mapping.get(0), Some(&MappedColumn::Dropped));
}
