use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use serde::Serialize;

/// Format a monetary value the Brazilian way: `R$ 1.234,56`.
pub(crate) fn format_currency(value: f64) -> String {
    let negative = value < 0.0;
    let cents = (value.abs() * 100.0).round() as i64;
    let whole = (cents / 100).to_string();
    let frac = cents % 100;

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }

    let sign = if negative { "-" } else { "" };
    format!("{sign}R$ {grouped},{frac:02}")
}

/// Parse a quantity string with optional unit: "500", "500g", "2 kg",
/// "1.5 l", "1 dz". Returns the quantity and the unit as written (the
/// caller decides the default when no unit is given).
pub(crate) fn parse_quantity(s: &str) -> Result<(f64, Option<String>)> {
    let s = s.trim();
    if s.is_empty() {
        bail!("Quantity must not be empty");
    }

    // Plain number, unit defaults elsewhere
    if let Ok(qty) = s.replace(',', ".").parse::<f64>() {
        if qty <= 0.0 {
            bail!("Quantity must be greater than 0");
        }
        return Ok((qty, None));
    }

    // "500g", "2 kg", "1.5 litro"
    if let Some(idx) = s.find(|c: char| c.is_alphabetic()) {
        if idx > 0 {
            let (num_part, unit_part) = s.split_at(idx);
            let qty: f64 = num_part
                .trim()
                .replace(',', ".")
                .parse()
                .with_context(|| format!("Invalid quantity: '{s}'"))?;
            if qty <= 0.0 {
                bail!("Quantity must be greater than 0");
            }
            let unit = unit_part.trim();
            if !unit.is_empty() {
                return Ok((qty, Some(unit.to_string())));
            }
        }
    }

    bail!("Invalid quantity format: '{s}'. Use '500g', '2 kg', '1 dz', etc.")
}

pub(crate) fn parse_date(date_str: Option<String>) -> Result<NaiveDate> {
    match date_str {
        None => Ok(Local::now().date_naive()),
        Some(s) => match s.as_str() {
            "today" | "hoje" => Ok(Local::now().date_naive()),
            "yesterday" | "ontem" => Ok(Local::now().date_naive() - chrono::Duration::days(1)),
            _ => NaiveDate::parse_from_str(&s, "%Y-%m-%d")
                .or_else(|_| NaiveDate::parse_from_str(&s, "%d/%m/%Y"))
                .with_context(|| {
                    format!("Invalid date '{s}'. Use YYYY-MM-DD, DD/MM/YYYY, or today/yesterday")
                }),
        },
    }
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let keep = max.saturating_sub(3);
        let end = s.char_indices().nth(keep).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(0.0), "R$ 0,00");
        assert_eq!(format_currency(4.5), "R$ 4,50");
        assert_eq!(format_currency(1234.56), "R$ 1.234,56");
        assert_eq!(format_currency(1_234_567.891), "R$ 1.234.567,89");
        assert_eq!(format_currency(-12.3), "-R$ 12,30");
    }

    #[test]
    fn test_format_currency_rounds() {
        assert_eq!(format_currency(0.005), "R$ 0,01");
        assert_eq!(format_currency(9.999), "R$ 10,00");
    }

    #[test]
    fn test_parse_quantity_plain() {
        let (qty, unit) = parse_quantity("500").unwrap();
        assert!((qty - 500.0).abs() < f64::EPSILON);
        assert!(unit.is_none());
    }

    #[test]
    fn test_parse_quantity_attached_unit() {
        let (qty, unit) = parse_quantity("500g").unwrap();
        assert!((qty - 500.0).abs() < f64::EPSILON);
        assert_eq!(unit.as_deref(), Some("g"));
    }

    #[test]
    fn test_parse_quantity_spaced_unit() {
        let (qty, unit) = parse_quantity("2 kg").unwrap();
        assert!((qty - 2.0).abs() < f64::EPSILON);
        assert_eq!(unit.as_deref(), Some("kg"));

        let (qty, unit) = parse_quantity("1.5 l").unwrap();
        assert!((qty - 1.5).abs() < f64::EPSILON);
        assert_eq!(unit.as_deref(), Some("l"));
    }

    #[test]
    fn test_parse_quantity_decimal_comma() {
        let (qty, unit) = parse_quantity("0,5 kg").unwrap();
        assert!((qty - 0.5).abs() < f64::EPSILON);
        assert_eq!(unit.as_deref(), Some("kg"));
    }

    #[test]
    fn test_parse_quantity_invalid() {
        assert!(parse_quantity("abc").is_err());
        assert!(parse_quantity("").is_err());
        assert!(parse_quantity("0g").is_err());
        assert!(parse_quantity("-2 kg").is_err());
    }

    #[test]
    fn test_parse_date_none_is_today() {
        assert_eq!(parse_date(None).unwrap(), Local::now().date_naive());
    }

    #[test]
    fn test_parse_date_keywords() {
        let today = Local::now().date_naive();
        assert_eq!(parse_date(Some("today".to_string())).unwrap(), today);
        assert_eq!(parse_date(Some("hoje".to_string())).unwrap(), today);
        assert_eq!(
            parse_date(Some("ontem".to_string())).unwrap(),
            today - chrono::Duration::days(1)
        );
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        assert_eq!(parse_date(Some("2024-06-15".to_string())).unwrap(), expected);
        assert_eq!(parse_date(Some("15/06/2024".to_string())).unwrap(), expected);
    }

    #[test]
    fn test_parse_date_invalid() {
        assert!(parse_date(Some("nope".to_string())).is_err());
    }

    #[test]
    fn test_truncate_utf8() {
        assert_eq!(truncate("Açúcar", 10), "Açúcar");
        assert_eq!(truncate("Queijo parmesão ralado fino", 10), "Queijo ...");
    }

    #[test]
    fn test_truncate_tiny_max() {
        // Should not panic when max is below the ellipsis width
        assert_eq!(truncate("Farinha", 2), "...");
        assert_eq!(truncate("Farinha", 0), "...");
        assert_eq!(truncate("ab", 2), "ab");
    }
}
