//! Structured measurements pulled out of free text.

use std::sync::LazyLock;

use medguide_core::models::profile::Sex;
use regex::Regex;
use serde::Serialize;

/// Compile a pattern that is a literal in this file.
///
/// # Panics
///
/// Panics if the pattern is invalid, which is a programming error.
fn pattern(re: &str) -> Regex {
    Regex::new(re).unwrap_or_else(|e| panic!("invalid built-in pattern {re:?}: {e}"))
}

static AGE: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?i)\b(\d{1,3})\s*-?\s*(?:years?|yrs?)\s*-?\s*old\b|\b(\d{1,3})\s*-?\s*y/?o\b|\bage[d:]?\s*(\d{1,3})\b|(\d{1,3})\s*岁")
});
static FEMALE: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"(?i)\b(?:female|woman|lady|girl|she)\b|女性|女士|女"));
static MALE: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"(?i)\b(?:male|man|gentleman|boy|he)\b|男性|男士|男"));
static BLOOD_PRESSURE: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"(?:^|[^\d/])(\d{2,3})\s*/\s*(\d{2,3})(?:[^\d/]|$)"));
static SYSTOLIC: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?i)(?:systolic(?:\s+(?:bp|blood pressure|pressure))?|sbp|收缩压)\s*(?:of|is|at|:|：|=)?\s*(\d{2,3})")
});
static HEART_RATE: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?i)(?:heart rate|\bhr\b|pulse|心率)\s*(?:of|is|:|：|=)?\s*(\d{2,3})|(\d{2,3})\s*(?:bpm|次/分)")
});
static BMI: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"(?i)\bbmi\s*(?:of|is|:|：|=)?\s*(\d{2}(?:\.\d+)?)"));
static HEIGHT: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"(?i)(\d{3}(?:\.\d+)?)\s*(?:cm|厘米)"));
static WEIGHT: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"(?i)(\d{2,3}(?:\.\d+)?)\s*(?:kg|公斤|千克)"));
static HBA1C: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?i)(?:hba1c|\ba1c|糖化血红蛋白)\s*(?:of|is|was|:|：|=)?\s*(\d{1,2}(?:\.\d+)?)")
});
static FASTING_GLUCOSE: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?i)(?:fasting (?:plasma |blood )?(?:glucose|sugar)|\bfbg\b|\bfpg\b|空腹血糖)\s*(?:of|is|was|:|：|=)?\s*(\d{1,2}(?:\.\d+)?)")
});
static POTASSIUM: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?i)(?:potassium|血钾)\s*(?:of|is|was|:|：|=)?\s*(\d(?:\.\d+)?)")
});
static EGFR: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?i)\begfr\s*(?:of|is|was|:|：|=)?\s*(\d{1,3}(?:\.\d+)?)")
});
static PREGNANT: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?i)\b(?:pregnant|pregnancy|gestation(?:al)?\s+week|weeks?\s+gestation)\b|怀孕|妊娠|孕\d+周")
});
static NOT_PREGNANT: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?i)\b(?:not|no|never|denies|isn't|is not)\s+(?:\w+\s+){0,2}(?:pregnant|pregnancy)\b|未孕|未怀孕|没有怀孕|否认妊娠|无妊娠|非妊娠")
});
static SMOKER: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?i)\b(?:smoker|smokes|smoking|cigarettes?)\b|吸烟|抽烟")
});
static NON_SMOKER: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?i)\b(?:non-?smoker|never smoked|doesn't smoke|does not smoke|quit smoking|no smoking|denies smoking)\b|不吸烟|已戒烟|戒烟|否认吸烟")
});
static DURATION: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?i)(\d+(?:\.\d+)?)\s*-?\s*(hours?|hrs?|h|days?|weeks?)\b|(\d+(?:\.\d+)?)\s*(小时|天|周)")
});

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtractedFacts {
    pub age: Option<u32>,
    pub sex: Option<Sex>,
    pub systolic: Option<u32>,
    pub diastolic: Option<u32>,
    pub heart_rate: Option<u32>,
    pub bmi: Option<f64>,
    pub hba1c: Option<f64>,
    pub fasting_glucose: Option<f64>,
    pub potassium: Option<f64>,
    pub egfr: Option<f64>,
    pub pregnant: Option<bool>,
    pub smoker: Option<bool>,
    /// Hours since symptom onset.
    pub onset_hours: Option<f64>,
}

impl ExtractedFacts {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn first_number<T: std::str::FromStr>(re: &Regex, text: &str) -> Option<T> {
    re.captures_iter(text).find_map(|caps| {
        caps.iter()
            .skip(1)
            .flatten()
            .find_map(|m| m.as_str().parse().ok())
    })
}

pub fn extract_facts(text: &str) -> ExtractedFacts {
    let mut facts = ExtractedFacts {
        age: first_number::<u32>(&AGE, text).filter(|a| (1..=120).contains(a)),
        ..ExtractedFacts::default()
    };

    let female = FEMALE.is_match(text);
    let male = MALE.is_match(text);
    facts.sex = match (female, male) {
        (true, false) => Some(Sex::Female),
        (false, true) => Some(Sex::Male),
        _ => None,
    };

    if let Some((sys, dia)) = BLOOD_PRESSURE.captures_iter(text).find_map(|caps| {
        let sys: u32 = caps.get(1)?.as_str().parse().ok()?;
        let dia: u32 = caps.get(2)?.as_str().parse().ok()?;
        ((70..=300).contains(&sys) && (30..=200).contains(&dia) && sys > dia).then_some((sys, dia))
    }) {
        facts.systolic = Some(sys);
        facts.diastolic = Some(dia);
    } else {
        facts.systolic = first_number::<u32>(&SYSTOLIC, text).filter(|s| (70..=300).contains(s));
    }

    facts.heart_rate = first_number::<u32>(&HEART_RATE, text).filter(|hr| (20..=250).contains(hr));

    facts.bmi = first_number::<f64>(&BMI, text).filter(|b| (10.0..=80.0).contains(b));
    if facts.bmi.is_none() {
        let height = first_number::<f64>(&HEIGHT, text).filter(|h| (100.0..=230.0).contains(h));
        let weight = first_number::<f64>(&WEIGHT, text).filter(|w| (20.0..=300.0).contains(w));
        if let (Some(h), Some(w)) = (height, weight) {
            let meters = h / 100.0;
            facts.bmi = Some((w / (meters * meters) * 10.0).round() / 10.0);
        }
    }

    facts.hba1c = first_number::<f64>(&HBA1C, text).filter(|v| (3.0..=20.0).contains(v));
    facts.fasting_glucose = first_number::<f64>(&FASTING_GLUCOSE, text).filter(|v| (1.0..=40.0).contains(v));
    facts.potassium = first_number::<f64>(&POTASSIUM, text).filter(|v| (1.5..=9.0).contains(v));
    facts.egfr = first_number::<f64>(&EGFR, text).filter(|v| (1.0..=200.0).contains(v));

    facts.pregnant = if NOT_PREGNANT.is_match(text) {
        Some(false)
    } else if PREGNANT.is_match(text) {
        Some(true)
    } else {
        None
    };
    if facts.pregnant == Some(true) && facts.sex.is_none() {
        facts.sex = Some(Sex::Female);
    }

    facts.smoker = if NON_SMOKER.is_match(text) {
        Some(false)
    } else if SMOKER.is_match(text) {
        Some(true)
    } else {
        None
    };

    facts.onset_hours = DURATION.captures_iter(text).find_map(|caps| {
        let whole = caps.get(0)?;
        let after = text[whole.end()..].trim_start().to_ascii_lowercase();
        if ["pregnant", "of pregnancy", "gestation", "of gestation"]
            .iter()
            .any(|w| after.starts_with(w))
        {
            return None;
        }
        let (amount, unit) = match (caps.get(1), caps.get(2), caps.get(3), caps.get(4)) {
            (Some(a), Some(u), _, _) | (_, _, Some(a), Some(u)) => (a.as_str(), u.as_str()),
            _ => return None,
        };
        let amount: f64 = amount.parse().ok()?;
        let unit = unit.to_ascii_lowercase();
        let factor = if unit.starts_with('h') || unit == "小时" {
            1.0
        } else if unit.starts_with('d') || unit == "天" {
            24.0
        } else {
            168.0
        };
        Some(amount * factor)
    });

    facts
}
