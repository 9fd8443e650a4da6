//! Value formatting: raw cell content -> display string.
//!
//! Formatting never fails. Any parse failure for a typed format falls back
//! to the untransformed raw content, so a bad date in a date column still
//! renders as what the user typed.

use serde::{Deserialize, Serialize};

/// Format descriptor attached to a column (or overridden per cell).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ValueFormat {
    Number(NumberOptions),
    Currency(CurrencyOptions),
    Percent(PercentOptions),
    Date(DateOptions),
    Boolean(BooleanOptions),
    Text(TextOptions),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumberOptions {
    pub decimals: u8,
    /// Insert group separators every three integer digits.
    pub grouping: bool,
    pub decimal_separator: char,
    pub group_separator: char,
}

impl Default for NumberOptions {
    fn default() -> Self {
        Self {
            decimals: 2,
            grouping: true,
            decimal_separator: '.',
            group_separator: ',',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencyOptions {
    pub symbol: String,
    /// Symbol after the amount ("1.00 €") instead of before ("$1.00").
    pub symbol_after: bool,
    pub number: NumberOptions,
}

impl Default for CurrencyOptions {
    fn default() -> Self {
        Self {
            symbol: "$".to_string(),
            symbol_after: false,
            number: NumberOptions::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PercentOptions {
    pub decimals: u8,
    /// Treat raw content as a fraction (0.42 -> "42%"). When false the raw
    /// value is already in percent points (42 -> "42%").
    pub from_fraction: bool,
}

impl Default for PercentOptions {
    fn default() -> Self {
        Self { decimals: 2, from_fraction: true }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DateStyle {
    /// 2024-03-01
    #[default]
    Iso,
    /// 01/03/2024
    Short,
    /// 1 March 2024
    Long,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DateOptions {
    pub style: DateStyle,
    /// chrono format string; overrides `style` when present.
    pub pattern: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BooleanOptions {
    pub true_text: String,
    pub false_text: String,
    pub null_text: String,
}

impl Default for BooleanOptions {
    fn default() -> Self {
        Self {
            true_text: "Yes".to_string(),
            false_text: "No".to_string(),
            null_text: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextTransform {
    Uppercase,
    Lowercase,
    Capitalize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextOptions {
    pub transform: Option<TextTransform>,
    pub prefix: Option<String>,
    pub suffix: Option<String>,
    /// Truncate to at most this many characters, ellipsis included.
    pub max_length: Option<usize>,
}

/// Render raw cell content for display. `None` format -> raw content.
pub fn format_cell_value(content: &str, format: Option<&ValueFormat>) -> String {
    let Some(format) = format else {
        return content.to_string();
    };

    match format {
        ValueFormat::Number(opts) => match parse_number(content) {
            Some(n) => format_number(n, opts),
            None => content.to_string(),
        },
        ValueFormat::Currency(opts) => match parse_number(content) {
            Some(n) => {
                let amount = format_number(n.abs(), &opts.number);
                let sign = if n < 0.0 { "-" } else { "" };
                if opts.symbol_after {
                    format!("{sign}{amount} {}", opts.symbol)
                } else {
                    format!("{sign}{}{amount}", opts.symbol)
                }
            }
            None => content.to_string(),
        },
        ValueFormat::Percent(opts) => match parse_number(content) {
            Some(n) => {
                let points = if opts.from_fraction { n * 100.0 } else { n };
                format!("{:.*}%", opts.decimals as usize, points)
            }
            None => content.to_string(),
        },
        ValueFormat::Date(opts) => format_date(content, opts).unwrap_or_else(|| content.to_string()),
        ValueFormat::Boolean(opts) => format_boolean(content, opts),
        ValueFormat::Text(opts) => format_text(content, opts),
    }
}

fn parse_number(content: &str) -> Option<f64> {
    content.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

fn format_number(n: f64, opts: &NumberOptions) -> String {
    let fixed = format!("{:.*}", opts.decimals as usize, n.abs());
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((i, f)) => (i.to_string(), Some(f.to_string())),
        None => (fixed, None),
    };

    let int_part = if opts.grouping {
        group_digits(&int_part, opts.group_separator)
    } else {
        int_part
    };

    let mut out = String::new();
    if n < 0.0 {
        out.push('-');
    }
    out.push_str(&int_part);
    if let Some(frac) = frac_part {
        out.push(opts.decimal_separator);
        out.push_str(&frac);
    }
    out
}

/// Insert a separator every three digits, counting from the right.
fn group_digits(digits: &str, separator: char) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    let len = digits.len();
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(separator);
        }
        out.push(ch);
    }
    out
}

/// Parse common date shapes; `None` when the content is not a date.
fn format_date(content: &str, opts: &DateOptions) -> Option<String> {
    use chrono::NaiveDate;

    let trimmed = content.trim();
    if trimmed.is_empty() {
        return None;
    }

    let date = chrono::DateTime::parse_from_rfc3339(trimmed)
        .map(|dt| dt.date_naive())
        .ok()
        .or_else(|| NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").ok())
        .or_else(|| NaiveDate::parse_from_str(trimmed, "%d/%m/%Y").ok())
        .or_else(|| NaiveDate::parse_from_str(trimmed, "%m/%d/%Y").ok())?;

    let rendered = match &opts.pattern {
        Some(pattern) => date.format(pattern).to_string(),
        None => match opts.style {
            DateStyle::Iso => date.format("%Y-%m-%d").to_string(),
            DateStyle::Short => date.format("%d/%m/%Y").to_string(),
            DateStyle::Long => date.format("%-d %B %Y").to_string(),
        },
    };
    Some(rendered)
}

fn format_boolean(content: &str, opts: &BooleanOptions) -> String {
    match content.trim().to_ascii_lowercase().as_str() {
        "" => opts.null_text.clone(),
        "true" | "yes" | "1" | "y" | "on" => opts.true_text.clone(),
        "false" | "no" | "0" | "n" | "off" => opts.false_text.clone(),
        _ => content.to_string(),
    }
}

fn format_text(content: &str, opts: &TextOptions) -> String {
    let mut text = match opts.transform {
        Some(TextTransform::Uppercase) => content.to_uppercase(),
        Some(TextTransform::Lowercase) => content.to_lowercase(),
        Some(TextTransform::Capitalize) => capitalize(content),
        None => content.to_string(),
    };

    if let Some(prefix) = &opts.prefix {
        text = format!("{prefix}{text}");
    }
    if let Some(suffix) = &opts.suffix {
        text.push_str(suffix);
    }

    if let Some(max) = opts.max_length {
        let chars: Vec<char> = text.chars().collect();
        if chars.len() > max {
            // Ellipsis counts against the budget.
            let keep = max.saturating_sub(1);
            text = chars.into_iter().take(keep).collect();
            if max >= 1 {
                text.push('…');
            }
        }
    }
    text
}

fn capitalize(text: &str) -> String {
    text.split_inclusive(char::is_whitespace)
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_grouping_and_decimals() {
        let opts = NumberOptions::default();
        assert_eq!(format_cell_value("1234567.891", Some(&ValueFormat::Number(opts.clone()))), "1,234,567.89");
        assert_eq!(format_cell_value("-1234.5", Some(&ValueFormat::Number(opts))), "-1,234.50");
    }

    #[test]
    fn test_number_custom_separators() {
        let opts = NumberOptions {
            decimals: 1,
            grouping: true,
            decimal_separator: ',',
            group_separator: '.',
        };
        assert_eq!(format_cell_value("1234.56", Some(&ValueFormat::Number(opts))), "1.234,6");
    }

    #[test]
    fn test_currency_symbol_position() {
        let before = CurrencyOptions::default();
        assert_eq!(format_cell_value("1500", Some(&ValueFormat::Currency(before))), "$1,500.00");

        let after = CurrencyOptions {
            symbol: "€".into(),
            symbol_after: true,
            ..CurrencyOptions::default()
        };
        assert_eq!(format_cell_value("-2.5", Some(&ValueFormat::Currency(after))), "-2.50 €");
    }

    #[test]
    fn test_percent_from_fraction() {
        let opts = PercentOptions::default();
        assert_eq!(format_cell_value("0.425", Some(&ValueFormat::Percent(opts))), "42.50%");

        let points = PercentOptions { decimals: 0, from_fraction: false };
        assert_eq!(format_cell_value("42", Some(&ValueFormat::Percent(points))), "42%");
    }

    #[test]
    fn test_date_styles_and_fallback() {
        let iso = DateOptions::default();
        assert_eq!(format_cell_value("2024-03-01", Some(&ValueFormat::Date(iso.clone()))), "2024-03-01");

        let long = DateOptions { style: DateStyle::Long, pattern: None };
        assert_eq!(format_cell_value("2024-03-01", Some(&ValueFormat::Date(long))), "1 March 2024");

        // Not a date: raw content comes back untouched, no error.
        assert_eq!(format_cell_value("not a date", Some(&ValueFormat::Date(iso))), "not a date");
    }

    #[test]
    fn test_boolean_text() {
        let opts = BooleanOptions {
            true_text: "Ja".into(),
            false_text: "Nein".into(),
            null_text: "-".into(),
        };
        assert_eq!(format_cell_value("true", Some(&ValueFormat::Boolean(opts.clone()))), "Ja");
        assert_eq!(format_cell_value("0", Some(&ValueFormat::Boolean(opts.clone()))), "Nein");
        assert_eq!(format_cell_value("", Some(&ValueFormat::Boolean(opts))), "-");
    }

    #[test]
    fn test_text_transform_and_truncation() {
        let opts = TextOptions {
            transform: Some(TextTransform::Uppercase),
            prefix: Some("» ".into()),
            suffix: None,
            max_length: Some(8),
        };
        let out = format_cell_value("hello world", Some(&ValueFormat::Text(opts)));
        assert_eq!(out, "» HELLO…");
        assert_eq!(out.chars().count(), 8);
    }

    #[test]
    fn test_capitalize() {
        let opts = TextOptions {
            transform: Some(TextTransform::Capitalize),
            ..TextOptions::default()
        };
        assert_eq!(format_cell_value("hello world", Some(&ValueFormat::Text(opts))), "Hello World");
    }

    #[test]
    fn test_no_format_is_identity() {
        assert_eq!(format_cell_value("anything at all", None), "anything at all");
    }

    #[test]
    fn test_bad_number_falls_back_to_raw() {
        let opts = NumberOptions::default();
        assert_eq!(format_cell_value("12abc", Some(&ValueFormat::Number(opts))), "12abc");
    }
}
