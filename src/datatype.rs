// used for decimals of arbitrary precision
use bigdecimal::BigDecimal;

// used when parsing a string to a Decimal
use std::str::FromStr;
// used to print out readable forms of a data type
use std::fmt;

/// Typed view of the [`Datum`] envelope.
///
/// Layers hold values of several kinds side by side, so every cell is stored
/// type-erased as a `Datum`. Callers resolve a key as the Rust type they
/// expect it to hold; asking for the wrong type is reported by the stack as a
/// type mismatch rather than a panic.
pub trait DataType: Sized {
    // static stuff which needs to be implemented downstream
    const UID: u8;
    const DATA_TYPE: &'static str;
    fn into_datum(self) -> Datum;
    fn from_datum(datum: &Datum) -> Option<Self>;
    // instance callable with pre-made implementation
    fn data_type(&self) -> &'static str {
        Self::DATA_TYPE
    }
    fn identifier(&self) -> u8 {
        Self::UID
    }
}

// ------------- Data Types --------------
impl DataType for bool {
    const UID: u8 = 1;
    const DATA_TYPE: &'static str = "Bool";
    fn into_datum(self) -> Datum {
        Datum::Bool(self)
    }
    fn from_datum(datum: &Datum) -> Option<bool> {
        match datum {
            Datum::Bool(b) => Some(*b),
            _ => None,
        }
    }
}
impl DataType for i64 {
    const UID: u8 = 2;
    const DATA_TYPE: &'static str = "Int";
    fn into_datum(self) -> Datum {
        Datum::Int(self)
    }
    fn from_datum(datum: &Datum) -> Option<i64> {
        match datum {
            Datum::Int(i) => Some(*i),
            _ => None,
        }
    }
}
impl DataType for Decimal {
    const UID: u8 = 3;
    const DATA_TYPE: &'static str = "Decimal";
    fn into_datum(self) -> Datum {
        Datum::Decimal(self)
    }
    fn from_datum(datum: &Datum) -> Option<Decimal> {
        match datum {
            Datum::Decimal(d) => Some(d.clone()),
            // integers widen losslessly
            Datum::Int(i) => Some(Decimal(BigDecimal::from(*i))),
            _ => None,
        }
    }
}
impl DataType for String {
    const UID: u8 = 4;
    const DATA_TYPE: &'static str = "Text";
    fn into_datum(self) -> Datum {
        Datum::Text(self)
    }
    fn from_datum(datum: &Datum) -> Option<String> {
        match datum {
            Datum::Text(s) => Some(s.clone()),
            _ => None,
        }
    }
}

// ------------- Datum --------------
#[derive(Eq, PartialEq, Hash, Clone, Debug)]
pub enum Datum {
    Bool(bool),
    Int(i64),
    Decimal(Decimal),
    Text(String),
}

impl Datum {
    /// Name of the data type held, matching [`DataType::DATA_TYPE`].
    pub fn kind(&self) -> &'static str {
        match self {
            Datum::Bool(_) => bool::DATA_TYPE,
            Datum::Int(_) => i64::DATA_TYPE,
            Datum::Decimal(_) => Decimal::DATA_TYPE,
            Datum::Text(_) => String::DATA_TYPE,
        }
    }
    /// Render as a layer script literal. Quotes inside text are doubled.
    pub fn to_source(&self) -> String {
        match self {
            Datum::Bool(b) => b.to_string(),
            Datum::Int(i) => i.to_string(),
            // plain notation, the grammar has no exponents
            Datum::Decimal(d) => {
                let s = d.inner().to_plain_string();
                if s.contains('.') { s } else { s + ".0" }
            }
            Datum::Text(s) => format!("\"{}\"", s.replace('"', "\"\"")),
        }
    }
    /// Decimals are rendered as strings so no precision is lost.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Datum::Bool(b) => serde_json::Value::Bool(*b),
            Datum::Int(i) => serde_json::Value::from(*i),
            Datum::Decimal(d) => serde_json::Value::String(d.to_string()),
            Datum::Text(s) => serde_json::Value::String(s.clone()),
        }
    }
}
impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Datum::Bool(b) => write!(f, "{}", b),
            Datum::Int(i) => write!(f, "{}", i),
            Datum::Decimal(d) => write!(f, "{}", d),
            Datum::Text(s) => write!(f, "{}", s),
        }
    }
}
impl From<bool> for Datum {
    fn from(b: bool) -> Datum {
        Datum::Bool(b)
    }
}
impl From<i64> for Datum {
    fn from(i: i64) -> Datum {
        Datum::Int(i)
    }
}
impl From<i32> for Datum {
    fn from(i: i32) -> Datum {
        Datum::Int(i64::from(i))
    }
}
impl From<Decimal> for Datum {
    fn from(d: Decimal) -> Datum {
        Datum::Decimal(d)
    }
}
impl From<String> for Datum {
    fn from(s: String) -> Datum {
        Datum::Text(s)
    }
}
impl From<&str> for Datum {
    fn from(s: &str) -> Datum {
        Datum::Text(s.to_owned())
    }
}

// Special types below
#[derive(Eq, PartialEq, Hash, PartialOrd, Ord, Clone, Debug)]
pub struct Decimal(BigDecimal);

impl Decimal {
    pub fn from_str(s: &str) -> Option<Decimal> {
        match BigDecimal::from_str(s) {
            Ok(decimal) => Some(Decimal(decimal)),
            _ => None,
        }
    }
    pub fn inner(&self) -> &BigDecimal {
        &self.0
    }
}
impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl From<BigDecimal> for Decimal {
    fn from(d: BigDecimal) -> Decimal {
        Decimal(d)
    }
}
