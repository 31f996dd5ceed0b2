pub mod company;
pub mod currency;
pub mod date;
pub mod location;
pub mod salary;

use chrono::NaiveDate;
use rayon::prelude::*;

use company::parse_company_info;
use currency::Currency;
use date::parse_posted_date;
use location::{parse_location_employment, EmploymentType};
use salary::parse_salary;

/// One vacancy card as scraped, six optional text fields. Any of them may be
/// missing when the card layout changed or a selector came up empty.
#[derive(Debug, Clone, Default)]
pub struct RawVacancy {
    pub date_posted: Option<String>,
    pub company_block: Option<String>,
    pub title: Option<String>,
    pub meta_text: Option<String>,
    pub salary_text: Option<String>,
    pub skills_text: Option<String>,
}

/// Fully normalized vacancy, ready for storage.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedVacancy {
    pub date_posted_original: Option<String>,
    pub date_posted: NaiveDate,
    pub company_name: Option<String>,
    pub company_rating: Option<f64>,
    pub title: Option<String>,
    pub location: Option<String>,
    pub employment_type: Option<EmploymentType>,
    pub remote: bool,
    pub salary_text: Option<String>,
    pub salary_min: Option<i64>,
    pub salary_max: Option<i64>,
    pub currency: Option<Currency>,
    pub is_exact_salary: bool,
    pub skills: Option<String>,
}

/// Normalize one raw card. Every component has a total fallback, so this
/// cannot fail on data shape. `today` is the reference date for year-rollover
/// decisions; callers pin it once per batch.
pub fn normalize(raw: &RawVacancy, today: NaiveDate) -> NormalizedVacancy {
    let date_posted = parse_posted_date(raw.date_posted.as_deref(), today);
    let company = parse_company_info(raw.company_block.as_deref());
    let loc = parse_location_employment(raw.meta_text.as_deref());
    let sal = parse_salary(raw.salary_text.as_deref());

    NormalizedVacancy {
        date_posted_original: raw.date_posted.clone(),
        date_posted,
        company_name: company.name,
        company_rating: company.rating,
        title: raw.title.clone(),
        location: loc.location,
        employment_type: loc.employment_type,
        remote: loc.remote,
        salary_text: sal.original_text,
        salary_min: sal.min,
        salary_max: sal.max,
        currency: sal.currency,
        is_exact_salary: sal.is_exact,
        skills: raw.skills_text.clone(),
    }
}

/// Normalize a batch in parallel. The reference date is captured once so the
/// year-rollover decision cannot differ between items of the same batch.
pub fn normalize_batch(raw: &[RawVacancy], today: NaiveDate) -> Vec<NormalizedVacancy> {
    raw.par_iter().map(|r| normalize(r, today)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 12, 10).unwrap()
    }

    fn sample() -> RawVacancy {
        RawVacancy {
            date_posted: Some("3 декабря".into()),
            company_block: Some("Acme\n4.8".into()),
            title: Some("Rust-разработчик".into()),
            meta_text: Some("Москва • Полный рабочий день • Удалённо".into()),
            salary_text: Some("от 100 000 до 200 000 ₽".into()),
            skills_text: Some("Rust • SQL • Git".into()),
        }
    }

    #[test]
    fn assembles_full_record() {
        let v = normalize(&sample(), today());
        assert_eq!(v.date_posted, NaiveDate::from_ymd_opt(2025, 12, 3).unwrap());
        assert_eq!(v.date_posted_original.as_deref(), Some("3 декабря"));
        assert_eq!(v.company_name.as_deref(), Some("Acme"));
        assert_eq!(v.company_rating, Some(4.8));
        assert_eq!(v.title.as_deref(), Some("Rust-разработчик"));
        assert_eq!(v.employment_type, Some(EmploymentType::Full));
        assert!(v.remote);
        assert_eq!(v.salary_min, Some(100_000));
        assert_eq!(v.salary_max, Some(200_000));
        assert_eq!(v.currency, Some(Currency::Rub));
        assert!(v.is_exact_salary);
        assert_eq!(v.skills.as_deref(), Some("Rust • SQL • Git"));
    }

    #[test]
    fn all_fields_missing_still_yields_a_record() {
        let v = normalize(&RawVacancy::default(), today());
        assert_eq!(v.date_posted, today());
        assert_eq!(v.company_name, None);
        assert_eq!(v.salary_min, None);
        assert!(!v.is_exact_salary);
        assert!(!v.remote);
    }

    #[test]
    fn idempotent_under_pinned_date() {
        let raw = sample();
        assert_eq!(normalize(&raw, today()), normalize(&raw, today()));
    }

    #[test]
    fn batch_matches_single() {
        let raws = vec![sample(), RawVacancy::default()];
        let batch = normalize_batch(&raws, today());
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0], normalize(&raws[0], today()));
        assert_eq!(batch[1], normalize(&raws[1], today()));
    }
}
