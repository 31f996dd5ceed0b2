/// Canonical salary currency. Habr shows rubles almost everywhere, so RUB is
/// the default when a token is missing or unrecognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Currency {
    Rub,
    Usd,
    Eur,
}

impl Currency {
    pub fn as_str(self) -> &'static str {
        match self {
            Currency::Rub => "RUB",
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
        }
    }
}

/// Classify a currency token (symbol or word fragment after a figure).
/// Checks RUB, then USD, then EUR markers; anything else falls back to RUB.
pub fn parse_currency(token: &str) -> Currency {
    let upper = token.to_uppercase();
    if upper.contains('₽') || upper.contains("RUB") || upper.contains("РУБ") {
        Currency::Rub
    } else if upper.contains('$') || upper.contains("USD") {
        Currency::Usd
    } else if upper.contains('€') || upper.contains("EUR") || upper.contains("ЕВРО") {
        Currency::Eur
    } else {
        Currency::Rub
    }
}
