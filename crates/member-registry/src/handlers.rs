//! Request handler core.
//!
//! Each function here turns one kind of request into record-store calls and
//! a plain result: either data to render or a redirect carrying a flash
//! message. Nothing in this module knows about HTTP; the web layer maps the
//! results onto responses.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::member::{EditForm, Member, MemberForm};
use crate::storage::MemberStore;

/// Shown after a member was created.
pub const ADDED: &str = "added successfully";
/// Shown when the requested member does not exist.
pub const NOT_FOUND: &str = "record not found";
/// Shown after a member was edited.
pub const UPDATED: &str = "record updated";
/// Shown after a delete request.
pub const DELETED: &str = "record deleted";

/// Category of a flash message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlashLevel {
    /// The request did what was asked.
    Success,
    /// The request was rejected.
    Error,
}

impl std::fmt::Display for FlashLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A one-time status message shown on the page after a redirect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    /// Category, used for styling.
    pub level: FlashLevel,
    /// Text shown to the user.
    pub message: String,
}

impl Flash {
    /// A success message.
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: FlashLevel::Success,
            message: message.into(),
        }
    }

    /// An error message.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: FlashLevel::Error,
            message: message.into(),
        }
    }
}

/// Where a redirect sends the browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    /// The member listing.
    Listing,
    /// The edit page of one member.
    Edit(i64),
}

impl Location {
    /// The URL path for this location.
    #[must_use]
    pub fn path(&self) -> String {
        match self {
            Self::Listing => "/".to_string(),
            Self::Edit(id) => format!("/edit/{id}"),
        }
    }
}

/// Result of a state-changing request: redirect with a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// Redirect target.
    pub location: Location,
    /// Message to show once at the target.
    pub flash: Flash,
}

impl Outcome {
    fn new(location: Location, flash: Flash) -> Self {
        Self { location, flash }
    }
}

/// Data for the listing page.
#[derive(Debug, Clone, PartialEq)]
pub struct Listing {
    /// Matching members, newest first.
    pub members: Vec<Member>,
    /// The trimmed search text, empty when not searching.
    pub query: String,
}

/// Result of opening the edit page.
#[derive(Debug, Clone, PartialEq)]
pub enum EditPage {
    /// Show the form with the member's current values.
    Form(Member),
    /// The member does not exist.
    Missing(Outcome),
}

/// List members, filtered by `raw_query` when it has any non-blank text.
///
/// # Errors
///
/// Returns an error if the store query fails.
pub fn search<S: MemberStore + ?Sized>(store: &S, raw_query: Option<&str>) -> Result<Listing> {
    let query = raw_query.unwrap_or_default().trim().to_string();
    let filter = (!query.is_empty()).then_some(query.as_str());
    let members = store.list(filter)?;
    debug!(query = %query, results = members.len(), "listed members");
    Ok(Listing { members, query })
}

/// Create a member from a submitted form.
///
/// A blank name is reported back as a flash and nothing is written.
///
/// # Errors
///
/// Returns an error only if the store write fails.
pub fn submit_new<S: MemberStore + ?Sized>(store: &S, form: &MemberForm) -> Result<Outcome> {
    let new = match form.normalize() {
        Ok(new) => new,
        Err(err) => return rejected(err, Location::Listing),
    };

    let id = store.create(&new)?;
    info!(id, "member added");
    Ok(Outcome::new(Location::Listing, Flash::success(ADDED)))
}

/// Load the member behind an edit page.
///
/// # Errors
///
/// Returns an error if the store query fails.
pub fn show_edit<S: MemberStore + ?Sized>(store: &S, id: i64) -> Result<EditPage> {
    match store.get(id)? {
        Some(member) => Ok(EditPage::Form(member)),
        None => {
            debug!(id, "edit requested for missing member");
            Ok(EditPage::Missing(not_found()))
        }
    }
}

/// Apply a submitted edit form.
///
/// A missing member is reported before the form is looked at. A blank name
/// sends the user back to the edit page without saving.
///
/// # Errors
///
/// Returns an error only if the store fails.
pub fn submit_edit<S: MemberStore + ?Sized>(
    store: &S,
    id: i64,
    form: &EditForm,
) -> Result<Outcome> {
    if store.get(id)?.is_none() {
        debug!(id, "edit submitted for missing member");
        return Ok(not_found());
    }

    let update = match form.normalize() {
        Ok(update) => update,
        Err(err) => return rejected(err, Location::Edit(id)),
    };

    if store.update(id, &update)? {
        info!(id, "member updated");
    } else {
        debug!(id, "member vanished before update");
    }
    Ok(Outcome::new(Location::Listing, Flash::success(UPDATED)))
}

/// Delete a member. Deleting an unknown id is not an error.
///
/// # Errors
///
/// Returns an error if the store write fails.
pub fn remove<S: MemberStore + ?Sized>(store: &S, id: i64) -> Result<Outcome> {
    if store.delete(id)? {
        info!(id, "member deleted");
    } else {
        debug!(id, "delete requested for missing member");
    }
    Ok(Outcome::new(Location::Listing, Flash::success(DELETED)))
}

fn not_found() -> Outcome {
    Outcome::new(Location::Listing, Flash::error(NOT_FOUND))
}

/// Turn a validation failure into a redirect; pass anything else through.
fn rejected(err: Error, location: Location) -> Result<Outcome> {
    match err {
        Error::Validation { field, message } => {
            debug!(field, "submission rejected");
            Ok(Outcome::new(location, Flash::error(message)))
        }
        other => Err(other),
    }
}
