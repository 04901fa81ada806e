//! Parties and the names attached to them.
//!
//! A party is a thin envelope: who it is lives on its identities, and how the
//! other side of a relationship remembers it lives on the relationship's
//! nicknames.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The kind of entity a party represents.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PartyKind {
  Individual,
  /// An organisation identified by an Australian Business Number.
  Abn,
}

/// An individual or organisation that can be a subject or a delegate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
  pub party_id:   Uuid,
  pub created_at: DateTime<Utc>,
  pub kind:       PartyKind,
}

/// A person's or organisation's name.
///
/// Either the structured pair (`given_name`, `family_name`) or the free-form
/// `unstructured_name` is used, never both. See
/// [`crate::validate::validate_name`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Name {
  pub given_name:        Option<String>,
  pub family_name:       Option<String>,
  pub unstructured_name: Option<String>,
}

impl Name {
  pub fn structured(given: impl Into<String>, family: impl Into<String>) -> Self {
    Self {
      given_name:        Some(given.into()),
      family_name:       Some(family.into()),
      unstructured_name: None,
    }
  }

  pub fn unstructured(name: impl Into<String>) -> Self {
    Self {
      given_name:        None,
      family_name:       None,
      unstructured_name: Some(name.into()),
    }
  }

  /// Trim every part and drop the ones left empty.
  pub fn normalized(self) -> Self {
    fn clean(part: Option<String>) -> Option<String> {
      part
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
    }
    Self {
      given_name:        clean(self.given_name),
      family_name:       clean(self.family_name),
      unstructured_name: clean(self.unstructured_name),
    }
  }

  /// Human-readable form, e.g. for relationship listings.
  pub fn display_name(&self) -> String {
    if let Some(name) = &self.unstructured_name {
      return name.clone();
    }
    [self.given_name.as_deref(), self.family_name.as_deref()]
      .into_iter()
      .flatten()
      .collect::<Vec<_>>()
      .join(" ")
  }
}
