//! Extracted quote records
//!
//! A `Record` is one quote with its author and tag metadata. Records are only
//! ever handed downstream after `Record::validate` succeeds.

use crate::HarvestError;
use serde::{Deserialize, Serialize};

/// A tag attached to a quote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Tag name as displayed on the page
    pub name: String,

    /// Absolute URL of the tag's listing page
    pub url: String,
}

/// One extracted quote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Quote body without surrounding quotation marks
    pub text: String,

    /// Attributed author name
    pub author: String,

    /// Absolute URL of the author's page
    pub author_url: String,

    /// First link to a known third-party reference site, if any
    pub external_reference_url: Option<String>,

    /// Tags in markup order
    pub tags: Vec<Tag>,
}

impl Record {
    /// Checks the required-field invariant
    ///
    /// # Returns
    ///
    /// * `Ok(())` - `text`, `author` and `author_url` are all non-empty
    /// * `Err(HarvestError::RecordInvalid)` - naming the first missing field
    pub fn validate(&self) -> Result<(), HarvestError> {
        let required = [
            ("text", &self.text),
            ("author", &self.author),
            ("author_url", &self.author_url),
        ];

        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(HarvestError::RecordInvalid(format!(
                    "missing required field '{}'",
                    field
                )));
            }
        }

        Ok(())
    }

    /// Tag names in markup order
    pub fn tag_names(&self) -> Vec<&str> {
        self.tags.iter().map(|tag| tag.name.as_str()).collect()
    }
}
