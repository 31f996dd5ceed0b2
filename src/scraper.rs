use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rusqlite::Connection;
use scraper::{ElementRef, Html, Selector};
use tracing::{info, warn};

use crate::config::ScrapeSettings;
use crate::db;
use crate::parser::{self, RawVacancy};

const MAX_RETRIES: u32 = 3;
const BASE_BACKOFF_MS: u64 = 2000;
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) \
                          Chrome/120.0 Safari/537.36";

pub struct ScrapeStats {
    pub pages: usize,
    pub cards: usize,
    pub errors: usize,
}

/// Scrape up to `max_pages` listing pages, normalizing and saving each page's
/// cards as it arrives. A page that fails after retries is logged and
/// skipped; an empty page means the listing ran out and the loop stops.
pub async fn scrape_listing(
    conn: &Connection,
    settings: &ScrapeSettings,
    max_pages: usize,
) -> Result<ScrapeStats> {
    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .context("Failed to build HTTP client")?;

    let pb = ProgressBar::new(max_pages as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} pages ({per_sec})")?
            .progress_chars("=> "),
    );

    // One reference date for the whole run, so year-rollover decisions agree
    // across pages scraped minutes apart.
    let today = chrono::Local::now().date_naive();

    let mut stats = ScrapeStats {
        pages: 0,
        cards: 0,
        errors: 0,
    };

    for page in 1..=max_pages {
        let url = format!("{}?page={}&type=all", settings.base_url, page);

        let html = match fetch_with_retry(&client, &url).await {
            Ok(html) => html,
            Err(e) => {
                warn!("Page {} failed: {}", page, e);
                stats.errors += 1;
                pb.inc(1);
                continue;
            }
        };

        let raw = parse_listing_page(&html);
        if raw.is_empty() {
            info!("Page {} has no vacancy cards, stopping", page);
            break;
        }

        let normalized = parser::normalize_batch(&raw, today);
        let inserted = db::insert_vacancies(conn, &normalized)?;
        stats.pages += 1;
        stats.cards += inserted;
        pb.inc(1);

        tokio::time::sleep(Duration::from_millis(settings.delay_ms)).await;
    }

    pb.finish_and_clear();
    info!(
        "Scraped {} pages, {} vacancies ({} page errors)",
        stats.pages, stats.cards, stats.errors
    );
    Ok(stats)
}

async fn fetch_with_retry(client: &reqwest::Client, url: &str) -> Result<String> {
    for attempt in 0..=MAX_RETRIES {
        match fetch_one(client, url).await {
            Ok(html) => return Ok(html),
            Err(e) => {
                let msg = e.to_string();
                let retryable = msg.contains("429")
                    || msg.contains("500")
                    || msg.contains("502")
                    || msg.contains("503");
                if !retryable || attempt == MAX_RETRIES {
                    return Err(e);
                }
                let backoff = Duration::from_millis(BASE_BACKOFF_MS * 2u64.pow(attempt));
                warn!(
                    "Retrying {} (attempt {}/{}), backing off {:.1}s",
                    url,
                    attempt + 1,
                    MAX_RETRIES,
                    backoff.as_secs_f64()
                );
                tokio::time::sleep(backoff).await;
            }
        }
    }
    unreachable!("retry loop always returns")
}

async fn fetch_one(client: &reqwest::Client, url: &str) -> Result<String> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        anyhow::bail!("HTTP {} for {}", status.as_u16(), url);
    }
    Ok(response.text().await?)
}

struct CardSelectors {
    card: Selector,
    date: Selector,
    company: Selector,
    title: Selector,
    meta: Selector,
    salary: Selector,
    skills: Selector,
}

impl CardSelectors {
    fn new() -> Self {
        let sel = |css: &str| Selector::parse(css).unwrap();
        CardSelectors {
            card: sel(".vacancy-card__inner"),
            date: sel(".vacancy-card__date"),
            company: sel(".vacancy-card__company"),
            title: sel(".vacancy-card__title"),
            meta: sel(".vacancy-card__meta"),
            salary: sel(".vacancy-card__salary"),
            skills: sel(".vacancy-card__skills"),
        }
    }
}

/// Pull the six raw fields out of every vacancy card on a listing page.
/// Each field is taken independently; a missing element stays None and
/// never aborts the card.
pub fn parse_listing_page(html: &str) -> Vec<RawVacancy> {
    let selectors = CardSelectors::new();
    let doc = Html::parse_document(html);

    doc.select(&selectors.card)
        .map(|card| RawVacancy {
            date_posted: inline_text(&card, &selectors.date),
            // The company element stacks name and rating; keep line structure.
            company_block: block_text(&card, &selectors.company),
            title: inline_text(&card, &selectors.title),
            meta_text: inline_text(&card, &selectors.meta),
            salary_text: inline_text(&card, &selectors.salary),
            skills_text: inline_text(&card, &selectors.skills),
        })
        .collect()
}

/// First matching element's text, whitespace-squashed into one line.
fn inline_text(card: &ElementRef, sel: &Selector) -> Option<String> {
    let el = card.select(sel).next()?;
    let joined = el.text().collect::<Vec<_>>().join(" ");
    let squashed = joined.split_whitespace().collect::<Vec<_>>().join(" ");
    if squashed.is_empty() {
        None
    } else {
        Some(squashed)
    }
}

/// First matching element's text with child elements as separate lines.
fn block_text(card: &ElementRef, sel: &Selector) -> Option<String> {
    let el = card.select(sel).next()?;
    let lines: Vec<String> = el
        .text()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}
