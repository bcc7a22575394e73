//! Locale-aware currency formatting for export rows

/// Formats an amount for display in a given locale
pub trait CurrencyFormatter: Send + Sync {
    fn format(&self, amount: f64, currency: &str, locale: &str) -> String;
}

/// How a locale writes numbers and places the currency symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LocaleRules {
    group: &'static str,
    decimal: char,
    symbol_first: bool,
    space: bool,
}

const EN: LocaleRules = LocaleRules {
    group: ",",
    decimal: '.',
    symbol_first: true,
    space: false,
};

fn rules_for(locale: &str) -> LocaleRules {
    let normalized = locale.replace('_', "-").to_lowercase();
    let language = normalized.split('-').next().unwrap_or("");

    match (language, normalized.as_str()) {
        (_, "pt-br") => LocaleRules {
            group: ".",
            decimal: ',',
            symbol_first: true,
            space: true,
        },
        ("de" | "es" | "it" | "pt" | "da", _) => LocaleRules {
            group: ".",
            decimal: ',',
            symbol_first: false,
            space: true,
        },
        ("nl", _) => LocaleRules {
            group: ".",
            decimal: ',',
            symbol_first: true,
            space: true,
        },
        ("fr" | "sv" | "nb" | "no" | "fi", _) => LocaleRules {
            group: "\u{a0}",
            decimal: ',',
            symbol_first: false,
            space: true,
        },
        _ => EN,
    }
}

/// Symbol for a currency as seen from a locale
fn symbol(currency: &str, locale: &str) -> String {
    let region = locale
        .replace('_', "-")
        .rsplit('-')
        .next()
        .unwrap_or("")
        .to_uppercase();
    match currency {
        "USD" if region == "US" || !locale.contains(['-', '_']) => "$".to_string(),
        "USD" => "US$".to_string(),
        "CAD" if region == "CA" => "$".to_string(),
        "CAD" => "CA$".to_string(),
        "AUD" if region == "AU" => "$".to_string(),
        "AUD" => "A$".to_string(),
        "EUR" => "€".to_string(),
        "GBP" => "£".to_string(),
        "JPY" => "¥".to_string(),
        "INR" => "₹".to_string(),
        "BRL" => "R$".to_string(),
        "KRW" => "₩".to_string(),
        "SEK" | "NOK" | "DKK" => "kr".to_string(),
        other => other.to_string(),
    }
}

fn minor_digits(currency: &str) -> usize {
    match currency {
        "JPY" | "KRW" => 0,
        _ => 2,
    }
}

fn group_digits(digits: &str, separator: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push_str(separator);
        }
        out.push(ch);
    }
    out
}

/// Loose BCP 47 check: `ll`, `lll`, `ll-RR` or `ll_RR` (region may be 3 digits)
pub fn is_valid_locale(locale: &str) -> bool {
    let mut parts = locale.split(['-', '_']);
    let language_ok = parts
        .next()
        .map(|l| (2..=3).contains(&l.len()) && l.chars().all(|c| c.is_ascii_alphabetic()))
        .unwrap_or(false);
    let region_ok = match parts.next() {
        None => true,
        Some(r) => {
            (r.len() == 2 && r.chars().all(|c| c.is_ascii_alphabetic()))
                || (r.len() == 3 && r.chars().all(|c| c.is_ascii_digit()))
        }
    };
    language_ok && region_ok && parts.next().is_none()
}

/// Default formatter with built-in rules for common locales
///
/// Unknown locales format like `en-US`; unknown currencies use their code
/// as the symbol.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocaleCurrencyFormatter;

impl CurrencyFormatter for LocaleCurrencyFormatter {
    fn format(&self, amount: f64, currency: &str, locale: &str) -> String {
        let currency = currency.to_uppercase();
        let rules = rules_for(locale);
        let digits = minor_digits(&currency);

        let fixed = format!("{:.*}", digits, amount.abs());
        let (whole, fraction) = match fixed.split_once('.') {
            Some((w, f)) => (w, Some(f)),
            None => (fixed.as_str(), None),
        };

        let mut number = group_digits(whole, rules.group);
        if let Some(fraction) = fraction {
            number.push(rules.decimal);
            number.push_str(fraction);
        }

        let symbol = symbol(&currency, locale);
        let gap = if rules.space || symbol.chars().all(|c| c.is_ascii_alphabetic()) {
            "\u{a0}"
        } else {
            ""
        };
        let body = if rules.symbol_first {
            format!("{}{}{}", symbol, gap, number)
        } else {
            format!("{}{}{}", number, gap, symbol)
        };

        // Rounds to zero: no "-0.00"
        let negative = amount < 0.0 && fixed.chars().any(|c| matches!(c, '1'..='9'));
        if negative {
            format!("-{}", body)
        } else {
            body
        }
    }
}
