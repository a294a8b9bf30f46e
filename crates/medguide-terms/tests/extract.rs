use medguide_core::models::profile::Sex;
use medguide_terms::extract_facts;

#[test]
fn extracts_vitals_from_case_summary() {
    let facts = extract_facts("58-year-old male, BMI 28.5, BP 168/98 mmHg, known type 2 diabetes, HbA1c 7.9%");
    assert_eq!(facts.age, Some(58));
    assert_eq!(facts.sex, Some(Sex::Male));
    assert_eq!(facts.bmi, Some(28.5));
    assert_eq!(facts.systolic, Some(168));
    assert_eq!(facts.diastolic, Some(98));
    assert_eq!(facts.hba1c, Some(7.9));
    assert_eq!(facts.pregnant, None);
}

#[test]
fn pregnancy_and_negation() {
    let facts = extract_facts("35 year old woman, 20 weeks pregnant, blood pressure 158/96");
    assert_eq!(facts.age, Some(35));
    assert_eq!(facts.sex, Some(Sex::Female));
    assert_eq!(facts.pregnant, Some(true));
    assert_eq!(facts.onset_hours, None);

    let facts = extract_facts("She is not pregnant.");
    assert_eq!(facts.pregnant, Some(false));
}

#[test]
fn systolic_only_reading_and_onset() {
    let facts = extract_facts("systolic BP 190 with a 3-hour headache and vomiting");
    assert_eq!(facts.systolic, Some(190));
    assert_eq!(facts.diastolic, None);
    assert_eq!(facts.onset_hours, Some(3.0));
    assert_eq!(facts.age, None);
}

#[test]
fn bmi_is_derived_from_height_and_weight() {
    let facts = extract_facts("height 170 cm, weight 82 kg");
    assert_eq!(facts.bmi, Some(28.4));
}

#[test]
fn chinese_measurements() {
    let facts = extract_facts("女性，45岁，血压 150/95，空腹血糖 8.2，头痛2天");
    assert_eq!(facts.sex, Some(Sex::Female));
    assert_eq!(facts.age, Some(45));
    assert_eq!(facts.systolic, Some(150));
    assert_eq!(facts.fasting_glucose, Some(8.2));
    assert_eq!(facts.onset_hours, Some(48.0));
}

#[test]
fn implausible_pairs_are_ignored() {
    let facts = extract_facts("seen on 12/05, nothing else");
    assert_eq!(facts.systolic, None);
    assert!(facts.is_empty());
}

#[test]
fn smoking_status() {
    assert_eq!(extract_facts("smokes 10 cigarettes a day").smoker, Some(true));
    assert_eq!(extract_facts("non-smoker").smoker, Some(false));
}
