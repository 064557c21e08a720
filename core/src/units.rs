use std::fmt;

/// Units an ingredient can be purchased or measured in.
///
/// Parsing is case-insensitive and accepts Portuguese and English spellings
/// ("quilo", "duzia", "unidade", ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Unit {
    Kilogram,
    Gram,
    Liter,
    Milliliter,
    Dozen,
    Piece,
}

/// Canonical unit codes, used for validation messages and stored records.
pub const UNIT_CODES: &[&str] = &["kg", "g", "l", "ml", "dz", "un"];

impl Unit {
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let lower = s.trim().to_lowercase();
        match lower.as_str() {
            "kg" | "quilo" | "quilos" | "quilograma" | "quilogramas" | "kilogram"
            | "kilograms" => Some(Self::Kilogram),
            "g" | "grama" | "gramas" | "gram" | "grams" => Some(Self::Gram),
            "l" | "litro" | "litros" | "liter" | "liters" | "litre" | "litres" => {
                Some(Self::Liter)
            }
            "ml" | "mililitro" | "mililitros" | "milliliter" | "milliliters" | "millilitre"
            | "millilitres" => Some(Self::Milliliter),
            "dz" | "duzia" | "dúzia" | "duzias" | "dúzias" | "dozen" | "dozens" => {
                Some(Self::Dozen)
            }
            "un" | "und" | "unidade" | "unidades" | "unit" | "units" | "piece" | "pieces" => {
                Some(Self::Piece)
            }
            _ => None,
        }
    }

    /// Canonical short code ("kg", "g", "l", "ml", "dz", "un").
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::Kilogram => "kg",
            Self::Gram => "g",
            Self::Liter => "l",
            Self::Milliliter => "ml",
            Self::Dozen => "dz",
            Self::Piece => "un",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Multiplier that converts a price-per-`from` into a price-per-`to`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceFactor {
    pub factor: f64,
    /// True when no conversion is known and the factor fell back to 1.
    pub fallback: bool,
}

/// Price-scaling factor between two units: multiply a price-per-`from` by the
/// returned factor to get the equivalent price-per-`to`.
///
/// Identity pairs return 1. Conversions exist within the mass (kg/g), volume
/// (l/ml), and count (dz/un) families and are mutually inverse. Unknown or
/// cross-family pairs return factor 1 with `fallback` set so callers can
/// surface a warning instead of blocking the calculation.
#[must_use]
pub fn price_factor(from: &str, to: &str) -> PriceFactor {
    let (Some(a), Some(b)) = (Unit::parse(from), Unit::parse(to)) else {
        return PriceFactor {
            factor: 1.0,
            fallback: true,
        };
    };
    if a == b {
        return PriceFactor {
            factor: 1.0,
            fallback: false,
        };
    }
    let factor = match (a, b) {
        (Unit::Kilogram, Unit::Gram) | (Unit::Liter, Unit::Milliliter) => 1.0 / 1000.0,
        (Unit::Gram, Unit::Kilogram) | (Unit::Milliliter, Unit::Liter) => 1000.0,
        (Unit::Dozen, Unit::Piece) => 1.0 / 12.0,
        (Unit::Piece, Unit::Dozen) => 12.0,
        _ => {
            return PriceFactor {
                factor: 1.0,
                fallback: true,
            };
        }
    };
    PriceFactor { factor, fallback: false }
}
