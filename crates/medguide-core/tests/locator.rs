use medguide_core::models::evidence::{EvidenceId, EvidenceItem, Grade, Locator, SourceKind};
use proptest::prelude::*;

#[test]
fn document_locator_renders_as_uri() {
    let locator = Locator::Document {
        document: "hypertension-guideline-2023".to_string(),
        page: 42,
    };
    assert_eq!(locator.to_string(), "doc://hypertension-guideline-2023#page=42");
    assert_eq!(locator.source_kind(), SourceKind::Document);
}

#[test]
fn table_and_relational_locators_parse() {
    let table: Locator = "table://bp-outcomes#rows=3-7".parse().unwrap();
    assert_eq!(
        table,
        Locator::Table {
            table: "bp-outcomes".to_string(),
            first_row: 3,
            last_row: 7,
        }
    );

    let rel: Locator = "rel://guideline_recommendations/id=17".parse().unwrap();
    assert_eq!(
        rel,
        Locator::Relational {
            table: "guideline_recommendations".to_string(),
            key_column: "id".to_string(),
            key: "17".to_string(),
        }
    );
}

#[test]
fn malformed_locators_are_rejected() {
    for bad in [
        "doc://guide",
        "doc://#page=1",
        "doc://guide#page=x",
        "table://t#rows=9-3",
        "table://t#rows=1",
        "rel://t/id",
        "ftp://somewhere",
        "",
    ] {
        assert!(bad.parse::<Locator>().is_err(), "{bad} should not parse");
    }
}

#[test]
fn evidence_id_is_derived_from_locator() {
    let locator = Locator::Document {
        document: "guide".to_string(),
        page: 1,
    };
    let item = EvidenceItem::new("text", locator.clone(), Grade::IA);
    assert_eq!(item.id(), EvidenceId::for_locator(&locator));

    let other = EvidenceItem::new("text", Locator::Document { document: "guide".to_string(), page: 2 }, Grade::IA);
    assert_ne!(item.id(), other.id());
}

#[test]
fn secondary_locators_skip_primary_and_duplicates() {
    let primary = Locator::Document {
        document: "guide".to_string(),
        page: 1,
    };
    let secondary = Locator::Table {
        table: "stats".to_string(),
        first_row: 1,
        last_row: 1,
    };
    let item = EvidenceItem::new("text", primary.clone(), Grade::IB)
        .with_secondary_locators([primary.clone(), secondary.clone(), secondary.clone()]);
    assert_eq!(item.secondary_locators(), &[secondary]);
    assert_eq!(item.locator(), &primary);
}

#[test]
fn grades_order_strongest_first_and_parse_roman_numerals() {
    assert!(Grade::IA > Grade::IB);
    assert!(Grade::IB > Grade::IIA);
    assert!(Grade::IIA > Grade::IIB);
    assert!(Grade::IIB > Grade::III);
    assert!(Grade::III > Grade::Ungraded);

    assert_eq!("ⅠA".parse::<Grade>().unwrap(), Grade::IA);
    assert_eq!("ⅡB".parse::<Grade>().unwrap(), Grade::IIB);
    assert_eq!("2a".parse::<Grade>().unwrap(), Grade::IIA);
    assert_eq!("Ⅲ".parse::<Grade>().unwrap(), Grade::III);
    assert!("IV".parse::<Grade>().is_err());
}

fn name_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_-]{0,24}"
}

fn locator_strategy() -> impl Strategy<Value = Locator> {
    prop_oneof![
        (name_strategy(), 1u32..2000).prop_map(|(document, page)| Locator::Document { document, page }),
        (name_strategy(), 0u32..5000, 0u32..50).prop_map(|(table, first_row, span)| Locator::Table {
            table,
            first_row,
            last_row: first_row + span,
        }),
        (name_strategy(), name_strategy(), "[A-Za-z0-9-]{1,12}").prop_map(|(table, key_column, key)| {
            Locator::Relational {
                table,
                key_column,
                key,
            }
        }),
    ]
}

proptest! {
    #[test]
    fn prop_locator_round_trips_through_uri(locator in locator_strategy()) {
        let uri = locator.to_string();
        let parsed: Locator = uri.parse().unwrap();
        prop_assert_eq!(&parsed, &locator);
        prop_assert_eq!(EvidenceId::for_locator(&parsed), EvidenceId::for_locator(&locator));
    }
}
