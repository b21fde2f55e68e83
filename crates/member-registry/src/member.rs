//! Core member types for the registry.
//!
//! This module defines the stored [`Member`] row, the write payloads the
//! store accepts, and the raw HTML form payloads together with the field
//! normalization shared by the create and edit paths.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Timestamp layout of the `created_at` column.
pub const CREATED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Message surfaced when a submission has no usable name.
pub const NAME_REQUIRED: &str = "name is required";

/// One registry entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    /// Unique identifier assigned by the store.
    pub id: i64,
    /// Full name, never empty.
    pub name: String,
    /// Father's name.
    pub father_name: Option<String>,
    /// Mother's name.
    pub mother_name: Option<String>,
    /// National id, kept as free text.
    pub nation_id: Option<String>,
    /// Postal address.
    pub addres: Option<String>,
    /// Email address.
    pub email: Option<String>,
    /// Phone number.
    pub phone: Option<String>,
    /// Reference to an identity document.
    pub id_link: Option<String>,
    /// Status flag, not set by any handler.
    pub status: i64,
    /// Project the housing unit belongs to.
    pub project: Option<String>,
    /// Housing unit.
    pub apartment: Option<String>,
    /// Monetary amount.
    pub amount: f64,
    /// When the row was created (store-local time).
    pub created_at: NaiveDateTime,
}

/// A member name that is known to be non-empty after trimming.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct MemberName(String);

impl MemberName {
    /// Trim `raw` and accept it if anything is left.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the name is empty or whitespace only.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(Error::validation("name", NAME_REQUIRED));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// The name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MemberName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fields written when a member is created.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMember {
    /// Required name.
    pub name: MemberName,
    /// Father's name.
    pub father_name: Option<String>,
    /// Mother's name.
    pub mother_name: Option<String>,
    /// National id.
    pub nation_id: Option<String>,
    /// Postal address.
    pub addres: Option<String>,
    /// Email address.
    pub email: Option<String>,
    /// Phone number.
    pub phone: Option<String>,
    /// Identity document reference.
    pub id_link: Option<String>,
    /// Housing unit.
    pub apartment: Option<String>,
    /// Monetary amount.
    pub amount: f64,
}

impl NewMember {
    /// A payload with only a name set and every other field empty.
    #[must_use]
    pub fn named(name: MemberName) -> Self {
        Self {
            name,
            father_name: None,
            mother_name: None,
            nation_id: None,
            addres: None,
            email: None,
            phone: None,
            id_link: None,
            apartment: None,
            amount: 0.0,
        }
    }
}

/// Fields an edit may overwrite. Everything else is fixed at creation.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberUpdate {
    /// Required name.
    pub name: MemberName,
    /// Email address.
    pub email: Option<String>,
    /// Phone number.
    pub phone: Option<String>,
    /// Housing unit.
    pub apartment: Option<String>,
    /// Monetary amount.
    pub amount: f64,
}

/// Raw create form as posted to `/`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MemberForm {
    /// Name input.
    pub name: String,
    /// Father's name input.
    pub father_name: String,
    /// Mother's name input.
    pub mother_name: String,
    /// National id input.
    pub nation_id: String,
    /// Address input.
    pub addres: String,
    /// Phone input.
    pub phone: String,
    /// Identity document reference input.
    pub id_link: String,
    /// Email input.
    pub email: String,
    /// Housing unit input.
    pub apartment: String,
    /// Amount input.
    pub amount: String,
}

impl MemberForm {
    /// Convert the submitted strings into a create payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the name is blank.
    pub fn normalize(&self) -> Result<NewMember> {
        Ok(NewMember {
            name: MemberName::parse(&self.name)?,
            father_name: optional_text(&self.father_name),
            mother_name: optional_text(&self.mother_name),
            nation_id: optional_text(&self.nation_id),
            addres: optional_text(&self.addres),
            email: optional_text(&self.email),
            phone: optional_text(&self.phone),
            id_link: optional_text(&self.id_link),
            apartment: optional_text(&self.apartment),
            amount: parse_amount(&self.amount),
        })
    }
}

/// Raw edit form as posted to `/edit/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EditForm {
    /// Name input.
    pub name: String,
    /// Email input.
    pub email: String,
    /// Phone input.
    pub phone: String,
    /// Housing unit input.
    pub apartment: String,
    /// Amount input.
    pub amount: String,
}

impl EditForm {
    /// Convert the submitted strings into an update payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the name is blank.
    pub fn normalize(&self) -> Result<MemberUpdate> {
        Ok(MemberUpdate {
            name: MemberName::parse(&self.name)?,
            email: optional_text(&self.email),
            phone: optional_text(&self.phone),
            apartment: optional_text(&self.apartment),
            amount: parse_amount(&self.amount),
        })
    }
}

/// Trim a form value, mapping an empty result to `None`.
#[must_use]
pub fn optional_text(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Parse a monetary amount, falling back to `0.0`.
///
/// Digits from any decimal script are accepted (`١٥٠.٥` is `150.5`), as are
/// single underscores between digits (`1_000`). Empty, unparsable and
/// non-finite input all yield `0.0`.
#[must_use]
pub fn parse_amount(raw: &str) -> f64 {
    ascii_numeral(raw.trim())
        .and_then(|numeral| numeral.parse::<f64>().ok())
        .filter(|amount| amount.is_finite())
        .unwrap_or(0.0)
}

/// First code point of each block of ten decimal digits (general category
/// `Nd`) in the Basic Multilingual Plane, ASCII excluded.
const DECIMAL_DIGIT_ZEROS: &[u32] = &[
    0x0660, 0x06F0, 0x07C0, 0x0966, 0x09E6, 0x0A66, 0x0AE6, 0x0B66, 0x0BE6, 0x0C66, 0x0CE6,
    0x0D66, 0x0DE6, 0x0E50, 0x0ED0, 0x0F20, 0x1040, 0x1090, 0x17E0, 0x1810, 0x1946, 0x19D0,
    0x1A80, 0x1A90, 0x1B50, 0x1BB0, 0x1C40, 0x1C50, 0xA620, 0xA8D0, 0xA900, 0xA9D0, 0xA9F0,
    0xAA50, 0xABF0, 0xFF10,
];

/// Value of a decimal digit in any script.
fn decimal_value(c: char) -> Option<u32> {
    if let Some(value) = c.to_digit(10) {
        return Some(value);
    }
    let code = u32::from(c);
    DECIMAL_DIGIT_ZEROS
        .iter()
        .find_map(|&zero| code.checked_sub(zero).filter(|offset| *offset < 10))
}

/// Rewrite digits to ASCII and drop digit-group underscores.
///
/// Returns `None` when an underscore is not between two digits.
fn ascii_numeral(raw: &str) -> Option<String> {
    let chars: Vec<char> = raw.chars().collect();
    let mut numeral = String::with_capacity(chars.len());

    for (i, &c) in chars.iter().enumerate() {
        if c == '_' {
            let after_digit = i
                .checked_sub(1)
                .and_then(|prev| chars.get(prev))
                .is_some_and(|&prev| decimal_value(prev).is_some());
            let before_digit = chars
                .get(i + 1)
                .is_some_and(|&next| decimal_value(next).is_some());
            if !(after_digit && before_digit) {
                return None;
            }
            continue;
        }

        match decimal_value(c).and_then(|value| char::from_digit(value, 10)) {
            Some(digit) => numeral.push(digit),
            None => numeral.push(c),
        }
    }

    Some(numeral)
}
