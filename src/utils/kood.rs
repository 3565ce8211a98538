use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

static KOOD_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[1-6][0-9]{10}$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KoodError {
    Format,
    Birthdate,
}

impl KoodError {
    pub fn message(self) -> &'static str {
        match self {
            KoodError::Format => "Kood must be 11 digits and start with 1–6.",
            KoodError::Birthdate => "Invalid birthdate in kood.",
        }
    }
}

/// Decodes the birth date carried by an Estonian personal code.
///
/// The first digit encodes century and sex (1–2: 1800s, 3–4: 1900s,
/// 5–6: 2000s), digits two to seven are YYMMDD.
pub fn birth_date(kood: &str) -> Result<NaiveDate, KoodError> {
    if !KOOD_PATTERN.is_match(kood) {
        return Err(KoodError::Format);
    }

    let digit = |range: std::ops::Range<usize>| -> u32 {
        kood[range].parse().unwrap_or_default()
    };

    let century = match digit(0..1) {
        1 | 2 => 1800,
        3 | 4 => 1900,
        5 | 6 => 2000,
        _ => return Err(KoodError::Format),
    };

    let year = century + digit(1..3) as i32;
    NaiveDate::from_ymd_opt(year, digit(3..5), digit(5..7)).ok_or(KoodError::Birthdate)
}

pub fn validate(kood: &str) -> Result<(), KoodError> {
    birth_date(kood).map(|_| ())
}
