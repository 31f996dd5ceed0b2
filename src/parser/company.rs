use std::sync::OnceLock;

use regex::Regex;

#[derive(Debug, Clone, PartialEq)]
pub struct CompanyInfo {
    pub name: Option<String>,
    pub rating: Option<f64>,
}

fn rating_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+\.\d+)").unwrap())
}

/// Split a company card block into name and rating. The first line is the
/// name; the second line, when present, is expected to be the rating. If the
/// second line is not a plain number, the whole block is scanned for the
/// first decimal — a known approximation that can pick up a stray decimal
/// from an address-like fragment.
pub fn parse_company_info(text: Option<&str>) -> CompanyInfo {
    let Some(text) = text else {
        return CompanyInfo {
            name: None,
            rating: None,
        };
    };

    let mut lines = text.trim().lines();
    let name = lines.next().map(|l| l.trim().to_string());

    let rating = lines.next().and_then(|second| {
        second.trim().parse::<f64>().ok().or_else(|| {
            rating_re()
                .captures(text)
                .and_then(|c| c[1].parse::<f64>().ok())
        })
    });

    CompanyInfo { name, rating }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_and_rating() {
        let c = parse_company_info(Some("Acme\n4.8"));
        assert_eq!(c.name.as_deref(), Some("Acme"));
        assert_eq!(c.rating, Some(4.8));
    }

    #[test]
    fn name_only() {
        let c = parse_company_info(Some("Acme"));
        assert_eq!(c.name.as_deref(), Some("Acme"));
        assert_eq!(c.rating, None);
    }

    #[test]
    fn rating_found_anywhere_in_block() {
        let c = parse_company_info(Some("Acme\nрейтинг 4.8 из 5"));
        assert_eq!(c.name.as_deref(), Some("Acme"));
        assert_eq!(c.rating, Some(4.8));
    }

    #[test]
    fn non_numeric_second_line_without_decimal() {
        let c = parse_company_info(Some("Acme\nаккредитованная компания"));
        assert_eq!(c.name.as_deref(), Some("Acme"));
        assert_eq!(c.rating, None);
    }

    #[test]
    fn none_input() {
        let c = parse_company_info(None);
        assert_eq!(c.name, None);
        assert_eq!(c.rating, None);
    }

    #[test]
    fn surrounding_whitespace_is_trimmed() {
        let c = parse_company_info(Some("  Acme  \n  4.5  "));
        assert_eq!(c.name.as_deref(), Some("Acme"));
        assert_eq!(c.rating, Some(4.5));
    }
}
