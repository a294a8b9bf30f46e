use medguide_terms::{Lexicon, TermsError};

#[test]
fn expand_query_includes_labels_and_aliases() {
    let lexicon = Lexicon::bundled().unwrap();
    let expanded = lexicon.expand_query(&["cond:hypertension".to_string(), "cond:unknown".to_string()]);
    assert!(expanded.contains(&"hypertension".to_string()));
    assert!(expanded.contains(&"high blood pressure".to_string()));
    assert!(expanded.contains(&"高血压".to_string()));
}

#[test]
fn suggest_ranks_exact_above_partial() {
    let lexicon = Lexicon::bundled().unwrap();
    let suggestions = lexicon.suggest("htn", 5);
    assert_eq!(suggestions[0].code, "cond:hypertension");
    assert_eq!(suggestions[0].confidence, 1.0);

    let partial = lexicon.suggest("sartan", 10);
    assert!(partial.len() >= 5);
    assert!(partial.iter().all(|s| s.code.starts_with("drug:")));
    assert!(partial.iter().all(|s| s.confidence == 0.9));
}

#[test]
fn add_mapping_extends_and_rejects_duplicates() {
    let mut lexicon = Lexicon::bundled().unwrap();
    lexicon.add_mapping("raised BP", "cond:hypertension").unwrap();
    assert!(lexicon.aliases("cond:hypertension").contains(&"raised BP"));

    let err = lexicon.add_mapping("HTN", "cond:t2dm").unwrap_err();
    assert!(matches!(err, TermsError::DuplicateAlias { existing, .. } if existing == "cond:hypertension"));

    let err = lexicon.add_mapping("brand new", "cond:nope").unwrap_err();
    assert!(matches!(err, TermsError::UnknownCode(_)));
}

#[test]
fn duplicate_codes_are_rejected() {
    let raw = r#"{
        "version": "t",
        "entries": [
            { "code": "a", "label": "a", "category": "condition" },
            { "code": "a", "label": "b", "category": "symptom" }
        ]
    }"#;
    assert!(matches!(Lexicon::from_json(raw), Err(TermsError::DuplicateCode(c)) if c == "a"));
}
