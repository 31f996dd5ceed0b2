#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmploymentType {
    Full,
    Part,
    Project,
    Internship,
}

impl EmploymentType {
    /// Label stored in the database, matching the site's own wording.
    pub fn as_str(self) -> &'static str {
        match self {
            EmploymentType::Full => "Полная",
            EmploymentType::Part => "Частичная",
            EmploymentType::Project => "Проектная",
            EmploymentType::Internship => "Стажировка",
        }
    }
}

/// Meta-line phrases as they appear on the card, checked in order.
const EMPLOYMENT_PHRASES: &[(&str, EmploymentType)] = &[
    ("Полный рабочий день", EmploymentType::Full),
    ("Неполный рабочий день", EmploymentType::Part),
    ("Проектная работа", EmploymentType::Project),
    ("Стажировка", EmploymentType::Internship),
];

#[derive(Debug, Clone, PartialEq)]
pub struct LocationInfo {
    /// The meta text verbatim; the card mixes city, employment and remote
    /// markers into one line, so no attempt is made to isolate the city.
    pub location: Option<String>,
    pub employment_type: Option<EmploymentType>,
    pub remote: bool,
}

pub fn parse_location_employment(text: Option<&str>) -> LocationInfo {
    let Some(text) = text else {
        return LocationInfo {
            location: None,
            employment_type: None,
            remote: false,
        };
    };

    let lower = text.to_lowercase();
    // Both spellings occur, with and without the ё.
    let remote = lower.contains("удаленно") || lower.contains("удалённо");

    let employment_type = EMPLOYMENT_PHRASES
        .iter()
        .find(|(phrase, _)| text.contains(phrase))
        .map(|&(_, kind)| kind);

    LocationInfo {
        location: Some(text.to_string()),
        employment_type,
        remote,
    }
}
