use anyhow::Result;
use rusqlite::Connection;

use crate::parser::NormalizedVacancy;

pub fn connect(path: &str) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS vacancies (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            date_posted      TEXT,               -- original card text, e.g. '3 декабря'
            date_posted_date TEXT NOT NULL,      -- normalized YYYY-MM-DD
            company_name     TEXT,
            company_rating   REAL,
            vacancy_title    TEXT,
            location         TEXT,
            employment_type  TEXT,
            remote_option    BOOLEAN NOT NULL DEFAULT 0,

            salary_text      TEXT,
            salary_min       INTEGER,
            salary_max       INTEGER,
            salary_currency  TEXT CHECK(salary_currency IN ('RUB','USD','EUR')),
            is_exact_salary  BOOLEAN NOT NULL DEFAULT 0,

            skills           TEXT,
            scraped_at       TEXT NOT NULL DEFAULT (datetime('now')),

            -- Skills analysis, filled in by the scoring round
            match_score       INTEGER,
            is_relevant       BOOLEAN,
            missing_skills    TEXT,              -- JSON array
            redundant_skills  TEXT,              -- JSON array
            analysis          TEXT,
            recommendations   TEXT,              -- JSON array
            analyzed_at       TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_vacancies_company ON vacancies(company_name);
        CREATE INDEX IF NOT EXISTS idx_vacancies_title ON vacancies(vacancy_title);
        CREATE INDEX IF NOT EXISTS idx_vacancies_salary ON vacancies(salary_min, salary_max);
        CREATE INDEX IF NOT EXISTS idx_vacancies_date ON vacancies(date_posted_date);
        CREATE INDEX IF NOT EXISTS idx_vacancies_exact ON vacancies(is_exact_salary);
        CREATE INDEX IF NOT EXISTS idx_vacancies_analyzed ON vacancies(analyzed_at);
        ",
    )?;
    Ok(())
}

// ── Scraping ──

pub fn insert_vacancies(conn: &Connection, rows: &[NormalizedVacancy]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO vacancies
             (date_posted, date_posted_date, company_name, company_rating, vacancy_title,
              location, employment_type, remote_option, salary_text, salary_min, salary_max,
              salary_currency, is_exact_salary, skills)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14)",
        )?;
        for v in rows {
            count += stmt.execute(rusqlite::params![
                v.date_posted_original,
                v.date_posted.to_string(),
                v.company_name,
                v.company_rating,
                v.title,
                v.location,
                v.employment_type.map(|e| e.as_str()),
                v.remote,
                v.salary_text,
                v.salary_min,
                v.salary_max,
                v.currency.map(|c| c.as_str()),
                v.is_exact_salary,
                v.skills,
            ])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

// ── Scoring ──

/// Vacancy queued for skills analysis.
pub struct UnscoredVacancy {
    pub id: i64,
    pub title: Option<String>,
    pub skills: Option<String>,
}

pub fn fetch_unscored(conn: &Connection, limit: Option<usize>) -> Result<Vec<UnscoredVacancy>> {
    let sql = format!(
        "SELECT id, vacancy_title, skills FROM vacancies
         WHERE analyzed_at IS NULL ORDER BY id{}",
        match limit {
            Some(n) => format!(" LIMIT {}", n),
            None => String::new(),
        }
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(UnscoredVacancy {
                id: row.get(0)?,
                title: row.get(1)?,
                skills: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Analysis result to persist. List fields serialize to JSON text columns;
/// a missing list stays SQL NULL rather than an empty-array literal.
#[derive(Debug, Clone, Default)]
pub struct ScoreUpdate {
    pub match_score: Option<i64>,
    pub is_relevant: Option<bool>,
    pub missing_skills: Option<Vec<String>>,
    pub redundant_skills: Option<Vec<String>>,
    pub analysis: Option<String>,
    pub recommendations: Option<Vec<String>>,
}

fn to_json(list: &Option<Vec<String>>) -> Result<Option<String>> {
    Ok(match list {
        Some(items) => Some(serde_json::to_string(items)?),
        None => None,
    })
}

/// Returns false when the id does not exist; the row is stamped `analyzed_at`
/// either way so partially-null analyses are not re-queued forever.
pub fn apply_score(conn: &Connection, id: i64, update: &ScoreUpdate) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE vacancies SET
            match_score = ?1, is_relevant = ?2, missing_skills = ?3,
            redundant_skills = ?4, analysis = ?5, recommendations = ?6,
            analyzed_at = datetime('now')
         WHERE id = ?7",
        rusqlite::params![
            update.match_score,
            update.is_relevant,
            to_json(&update.missing_skills)?,
            to_json(&update.redundant_skills)?,
            update.analysis,
            to_json(&update.recommendations)?,
            id,
        ],
    )?;
    Ok(changed > 0)
}

// ── Stats ──

pub struct Stats {
    pub total: usize,
    pub scored: usize,
    pub unscored: usize,
    pub with_salary: usize,
    pub remote: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let total: usize = conn.query_row("SELECT COUNT(*) FROM vacancies", [], |r| r.get(0))?;
    let scored: usize = conn.query_row(
        "SELECT COUNT(*) FROM vacancies WHERE analyzed_at IS NOT NULL",
        [],
        |r| r.get(0),
    )?;
    let with_salary: usize = conn.query_row(
        "SELECT COUNT(*) FROM vacancies WHERE salary_min IS NOT NULL OR salary_max IS NOT NULL",
        [],
        |r| r.get(0),
    )?;
    let remote: usize = conn.query_row(
        "SELECT COUNT(*) FROM vacancies WHERE remote_option = 1",
        [],
        |r| r.get(0),
    )?;
    Ok(Stats {
        total,
        scored,
        unscored: total - scored,
        with_salary,
        remote,
    })
}

// ── Export ──

/// Dump the vacancies table to CSV. Returns the number of data rows written.
pub fn export_csv(conn: &Connection, path: &str) -> Result<usize> {
    use std::io::Write;

    let mut stmt = conn.prepare("SELECT * FROM vacancies ORDER BY id")?;
    let column_names: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
    let column_count = column_names.len();

    let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
    writeln!(file, "{}", column_names.join(","))?;

    let mut written = 0;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let mut fields = Vec::with_capacity(column_count);
        for i in 0..column_count {
            let value: rusqlite::types::Value = row.get(i)?;
            fields.push(csv_field(&value));
        }
        writeln!(file, "{}", fields.join(","))?;
        written += 1;
    }
    file.flush()?;
    Ok(written)
}

fn csv_field(value: &rusqlite::types::Value) -> String {
    use rusqlite::types::Value;
    match value {
        Value::Null => String::new(),
        Value::Integer(i) => i.to_string(),
        Value::Real(f) => f.to_string(),
        Value::Text(t) => csv_escape(t),
        Value::Blob(_) => String::new(),
    }
}

fn csv_escape(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Read back one stored salary row, used by tests to check persisted shape.
#[cfg(test)]
fn fetch_salary_row(
    conn: &Connection,
    id: i64,
) -> Result<Option<(Option<i64>, Option<i64>, Option<String>, bool)>> {
    use rusqlite::OptionalExtension;
    let row = conn
        .query_row(
            "SELECT salary_min, salary_max, salary_currency, is_exact_salary
             FROM vacancies WHERE id = ?1",
            [id],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
        )
        .optional()?;
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{normalize, RawVacancy};
    use chrono::NaiveDate;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 12, 10).unwrap()
    }

    fn insert_sample(conn: &Connection) {
        let raw = RawVacancy {
            date_posted: Some("3 декабря".into()),
            company_block: Some("Acme\n4.8".into()),
            title: Some("Rust-разработчик".into()),
            meta_text: Some("Москва • Полный рабочий день • Удалённо".into()),
            salary_text: Some("от 100 000 до 200 000 ₽".into()),
            skills_text: Some("Rust • SQL".into()),
        };
        insert_vacancies(conn, &[normalize(&raw, today())]).unwrap();
    }

    #[test]
    fn insert_and_fetch_unscored() {
        let conn = setup();
        insert_sample(&conn);
        insert_sample(&conn);

        let unscored = fetch_unscored(&conn, None).unwrap();
        assert_eq!(unscored.len(), 2);
        assert_eq!(unscored[0].title.as_deref(), Some("Rust-разработчик"));
        assert_eq!(unscored[0].skills.as_deref(), Some("Rust • SQL"));

        let limited = fetch_unscored(&conn, Some(1)).unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn salary_columns_round_trip() {
        let conn = setup();
        insert_sample(&conn);
        let (min, max, cur, exact) = fetch_salary_row(&conn, 1).unwrap().unwrap();
        assert_eq!(min, Some(100_000));
        assert_eq!(max, Some(200_000));
        assert_eq!(cur.as_deref(), Some("RUB"));
        assert!(exact);
    }

    #[test]
    fn apply_score_updates_and_dequeues() {
        let conn = setup();
        insert_sample(&conn);

        let update = ScoreUpdate {
            match_score: Some(85),
            is_relevant: Some(true),
            missing_skills: Some(vec!["Docker".into()]),
            redundant_skills: Some(vec![]),
            analysis: Some("Хорошее соответствие".into()),
            recommendations: None,
        };
        assert!(apply_score(&conn, 1, &update).unwrap());
        assert!(fetch_unscored(&conn, None).unwrap().is_empty());

        let missing: String = conn
            .query_row("SELECT missing_skills FROM vacancies WHERE id = 1", [], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(missing, r#"["Docker"]"#);

        // Absent list stays NULL, not "[]".
        let rec_type: String = conn
            .query_row(
                "SELECT typeof(recommendations) FROM vacancies WHERE id = 1",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(rec_type, "null");
    }

    #[test]
    fn apply_score_on_missing_id_returns_false() {
        let conn = setup();
        insert_sample(&conn);
        assert!(!apply_score(&conn, 999, &ScoreUpdate::default()).unwrap());
        // Existing data untouched, still queued.
        assert_eq!(fetch_unscored(&conn, None).unwrap().len(), 1);
    }

    #[test]
    fn partially_null_analysis_still_dequeues() {
        let conn = setup();
        insert_sample(&conn);
        assert!(apply_score(&conn, 1, &ScoreUpdate::default()).unwrap());
        assert!(fetch_unscored(&conn, None).unwrap().is_empty());
    }

    #[test]
    fn stats_counts() {
        let conn = setup();
        insert_sample(&conn);
        insert_sample(&conn);
        apply_score(&conn, 1, &ScoreUpdate::default()).unwrap();

        let s = get_stats(&conn).unwrap();
        assert_eq!(s.total, 2);
        assert_eq!(s.scored, 1);
        assert_eq!(s.unscored, 1);
        assert_eq!(s.with_salary, 2);
        assert_eq!(s.remote, 2);
    }

    #[test]
    fn csv_escaping() {
        assert_eq!(csv_escape("plain"), "plain");
        assert_eq!(csv_escape("a,b"), "\"a,b\"");
        assert_eq!(csv_escape("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
