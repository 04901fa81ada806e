//! Construction-time validation. Every check runs before the manager writes
//! anything to the store.

use chrono::{DateTime, Datelike as _, Utc};
use thiserror::Error;

use crate::{party::Name, relationship::Attribute};

pub const MIN_NICKNAME_LEN: usize = 2;
pub const MAX_NICKNAME_LEN: usize = 30;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
  #[error("given/family name and unstructured name cannot both be specified")]
  ConflictingNameFields,

  #[error("given name or unstructured name is required")]
  MissingName,

  #[error("name part must be 2 to 30 characters: {0:?}")]
  NameLength(String),

  #[error("end timestamp {end} is before start timestamp {start}")]
  EndBeforeStart {
    start: DateTime<Utc>,
    end:   DateTime<Utc>,
  },

  /// Outside years 1 to 9999, which stores keep as four-digit text.
  #[error("timestamp {0} is out of range")]
  TimestampOutOfRange(DateTime<Utc>),

  #[error("{0} must not be empty")]
  Empty(&'static str),

  #[error("duplicate attribute code: {0:?}")]
  DuplicateAttribute(String),

  #[error("email is not valid: {0:?}")]
  InvalidEmail(String),

  #[error("page must be at least 1")]
  InvalidPage,

  #[error("page size must be between 1 and 100")]
  InvalidPageSize,

  #[error("an invitation can only be accepted by a linked identity")]
  AcceptingIdentityNotLinked,
}

pub type Result<T, E = ValidationError> = std::result::Result<T, E>;

/// Normalise `name` and check the given/family vs unstructured rules.
pub fn validate_name(name: Name) -> Result<Name> {
  let name = name.normalized();
  let structured = name.given_name.is_some() || name.family_name.is_some();

  if structured && name.unstructured_name.is_some() {
    return Err(ValidationError::ConflictingNameFields);
  }
  if name.given_name.is_none() && name.unstructured_name.is_none() {
    return Err(ValidationError::MissingName);
  }
  Ok(name)
}

/// A nickname is a [`Name`] whose parts are also length-bounded.
pub fn validate_nickname(name: Name) -> Result<Name> {
  let name = validate_name(name)?;
  let parts = [&name.given_name, &name.family_name, &name.unstructured_name];
  for part in parts.into_iter().flatten() {
    let len = part.chars().count();
    if !(MIN_NICKNAME_LEN..=MAX_NICKNAME_LEN).contains(&len) {
      return Err(ValidationError::NameLength(part.clone()));
    }
  }
  Ok(name)
}

pub fn validate_period(
  start: DateTime<Utc>,
  end: Option<DateTime<Utc>>,
) -> Result<()> {
  for at in std::iter::once(start).chain(end) {
    if !(1..=9999).contains(&at.year()) {
      return Err(ValidationError::TimestampOutOfRange(at));
    }
  }
  match end {
    Some(end) if end < start => Err(ValidationError::EndBeforeStart { start, end }),
    _ => Ok(()),
  }
}

/// Trim attribute codes; codes must be non-empty and unique.
pub fn validate_attributes(attributes: Vec<Attribute>) -> Result<Vec<Attribute>> {
  let mut seen = std::collections::HashSet::new();
  attributes
    .into_iter()
    .map(|attr| {
      let code = attr.code.trim().to_owned();
      if code.is_empty() {
        return Err(ValidationError::Empty("attribute code"));
      }
      if !seen.insert(code.clone()) {
        return Err(ValidationError::DuplicateAttribute(code));
      }
      Ok(Attribute { code, value: attr.value })
    })
    .collect()
}

/// A deliberately shallow syntax check: `local@domain.tld`, no whitespace.
pub fn validate_email(email: &str) -> Result<()> {
  let invalid = || ValidationError::InvalidEmail(email.to_owned());
  if email.chars().any(char::is_whitespace) {
    return Err(invalid());
  }
  let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
  let domain_ok = !domain.contains('@')
    && domain.contains('.')
    && domain.split('.').all(|label| !label.is_empty());
  if local.is_empty() || !domain_ok {
    return Err(invalid());
  }
  Ok(())
}

pub fn validate_required(field: &'static str, value: &str) -> Result<String> {
  let value = value.trim();
  if value.is_empty() {
    return Err(ValidationError::Empty(field));
  }
  Ok(value.to_owned())
}

/// Check a 1-based page number and an optional page size, returning the
/// effective size.
pub fn validate_page(page: u32, page_size: Option<u32>, default_size: u32) -> Result<u32> {
  if page == 0 {
    return Err(ValidationError::InvalidPage);
  }
  let size = page_size.unwrap_or(default_size);
  if size == 0 || size > MAX_PAGE_SIZE {
    return Err(ValidationError::InvalidPageSize);
  }
  Ok(size)
}
