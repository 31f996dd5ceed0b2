//! Salary phrase parsing.
//!
//! Habr salary strings come in a handful of shapes ("от 100 000 до 150 000 ₽",
//! "до 3000 $", "Похожие специалисты получают 100 000 - 150 000", "не указана").
//! Parsing is a priority cascade: the first rule that matches wins and later
//! rules are never tried. The cascade is kept as an explicit rule table so the
//! order is inspectable from tests.

use std::sync::OnceLock;

use regex::Regex;

use super::currency::{parse_currency, Currency};

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSalary {
    pub min: Option<i64>,
    pub max: Option<i64>,
    pub currency: Option<Currency>,
    /// The untouched input text, kept for audit.
    pub original_text: Option<String>,
    /// True only when an explicit per-vacancy figure was parsed; a range
    /// inferred from "похожие специалисты" is not exact.
    pub is_exact: bool,
}

impl ParsedSalary {
    fn empty(text: Option<&str>) -> Self {
        ParsedSalary {
            min: None,
            max: None,
            currency: None,
            original_text: text.map(str::to_string),
            is_exact: false,
        }
    }
}

/// Which groups a rule captures and how they map to (min, max).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SalaryShape {
    /// "от X до Y" — both bounds.
    FromTo,
    /// "X-Y" — both bounds.
    Range,
    /// "до X" — upper bound only.
    UpTo,
    /// "от X" — lower bound only.
    From,
    /// Lone figure — fixed salary, min == max.
    Single,
}

pub struct SalaryRule {
    pub pattern: &'static str,
    pub shape: SalaryShape,
    /// Whether the pattern captures a trailing currency token. Rules without
    /// one infer currency from the original text ($/€/"евро", default RUB).
    pub has_currency: bool,
}

/// Priority-ordered cascade, applied to the cleaned text (whitespace stripped,
/// decimal commas turned into dots). Currency-bearing shapes first, then the
/// same five shapes bare.
pub const RULES: &[SalaryRule] = &[
    SalaryRule {
        pattern: r"(?i)от(\d+)до(\d+)([₽$€]|руб|usd|eur)",
        shape: SalaryShape::FromTo,
        has_currency: true,
    },
    SalaryRule {
        pattern: r"(?i)(\d+)[-–](\d+)([₽$€]|руб|usd|eur)",
        shape: SalaryShape::Range,
        has_currency: true,
    },
    SalaryRule {
        pattern: r"(?i)до(\d+)([₽$€]|руб|usd|eur)",
        shape: SalaryShape::UpTo,
        has_currency: true,
    },
    SalaryRule {
        pattern: r"(?i)от(\d+)([₽$€]|руб|usd|eur)",
        shape: SalaryShape::From,
        has_currency: true,
    },
    SalaryRule {
        pattern: r"(?i)(\d+)([₽$€]|руб|usd|eur)",
        shape: SalaryShape::Single,
        has_currency: true,
    },
    SalaryRule {
        pattern: r"(?i)от(\d+)до(\d+)",
        shape: SalaryShape::FromTo,
        has_currency: false,
    },
    SalaryRule {
        pattern: r"(?i)(\d+)[-–](\d+)",
        shape: SalaryShape::Range,
        has_currency: false,
    },
    SalaryRule {
        pattern: r"(?i)до(\d+)",
        shape: SalaryShape::UpTo,
        has_currency: false,
    },
    SalaryRule {
        pattern: r"(?i)от(\d+)",
        shape: SalaryShape::From,
        has_currency: false,
    },
    SalaryRule {
        pattern: r"(?i)(\d+)",
        shape: SalaryShape::Single,
        has_currency: false,
    },
];

fn compiled_rules() -> &'static Vec<Regex> {
    static COMPILED: OnceLock<Vec<Regex>> = OnceLock::new();
    COMPILED.get_or_init(|| {
        RULES
            .iter()
            .map(|r| Regex::new(r.pattern).unwrap())
            .collect()
    })
}

fn similar_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)похожие специалисты получают\s*([\d\s]+)\s*[-–]\s*([\d\s]+)").unwrap()
    })
}

/// Parse free-text salary phrasing. Total: every input resolves to a
/// `ParsedSalary`, all-null when nothing matches.
pub fn parse_salary(text: Option<&str>) -> ParsedSalary {
    let Some(raw) = text else {
        return ParsedSalary::empty(None);
    };
    if raw.trim().is_empty() {
        return ParsedSalary::empty(text);
    }

    // "Похожие специалисты получают X - Y" outranks everything, including an
    // accompanying "не указана": the range is still worth keeping, just not
    // marked exact. Only rubles are ever quoted in this phrasing.
    if let Some(caps) = similar_re().captures(raw) {
        if let (Some(min), Some(max)) = (parse_figure(&caps[1]), parse_figure(&caps[2])) {
            return ParsedSalary {
                min: Some(min),
                max: Some(max),
                currency: Some(Currency::Rub),
                original_text: Some(raw.to_string()),
                is_exact: false,
            };
        }
    }

    if raw.to_lowercase().contains("не указана") {
        return ParsedSalary::empty(text);
    }

    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == ',' { '.' } else { c })
        .collect();

    for (rule, re) in RULES.iter().zip(compiled_rules()) {
        let Some(caps) = re.captures(&cleaned) else {
            continue;
        };

        let (min, max) = match rule.shape {
            SalaryShape::FromTo | SalaryShape::Range => {
                let (Some(lo), Some(hi)) = (parse_figure(&caps[1]), parse_figure(&caps[2])) else {
                    continue;
                };
                (Some(lo), Some(hi))
            }
            SalaryShape::UpTo => {
                let Some(hi) = parse_figure(&caps[1]) else {
                    continue;
                };
                (None, Some(hi))
            }
            SalaryShape::From => {
                let Some(lo) = parse_figure(&caps[1]) else {
                    continue;
                };
                (Some(lo), None)
            }
            SalaryShape::Single => {
                let Some(val) = parse_figure(&caps[1]) else {
                    continue;
                };
                (Some(val), Some(val))
            }
        };

        let currency = if rule.has_currency {
            parse_currency(&caps[caps.len() - 1])
        } else {
            infer_currency(raw)
        };

        return ParsedSalary {
            min,
            max,
            currency: Some(currency),
            original_text: Some(raw.to_string()),
            is_exact: true,
        };
    }

    // No rule matched ("по договорённости" and friends).
    ParsedSalary::empty(text)
}

fn parse_figure(s: &str) -> Option<i64> {
    let digits: String = s.chars().filter(char::is_ascii_digit).collect();
    digits.parse().ok()
}

/// Currency fallback for bare-number rules: scan the *original* text, where a
/// marker may sit away from the figure itself.
fn infer_currency(original: &str) -> Currency {
    if original.contains('$') {
        Currency::Usd
    } else if original.contains('€') || original.to_lowercase().contains("евро") {
        Currency::Eur
    } else {
        Currency::Rub
    }
}
