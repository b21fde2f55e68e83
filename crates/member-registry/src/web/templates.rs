//! Page templates.

use askama::Template;
use axum::response::{Html, IntoResponse, Response};

use crate::error::Error;
use crate::handlers::{Flash, Listing};
use crate::member::{Member, CREATED_AT_FORMAT};

/// Renders an askama template as an HTML response.
#[derive(Debug)]
pub struct HtmlTemplate<T>(pub T);

impl<T> IntoResponse for HtmlTemplate<T>
where
    T: Template,
{
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(html) => Html(html).into_response(),
            Err(err) => Error::from(err).into_response(),
        }
    }
}

/// A member with every field ready for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRow {
    id: i64,
    name: String,
    father_name: String,
    mother_name: String,
    nation_id: String,
    addres: String,
    email: String,
    phone: String,
    id_link: String,
    status: i64,
    project: String,
    apartment: String,
    amount: String,
    created_at: String,
}

impl From<Member> for MemberRow {
    fn from(member: Member) -> Self {
        Self {
            id: member.id,
            name: member.name,
            father_name: member.father_name.unwrap_or_default(),
            mother_name: member.mother_name.unwrap_or_default(),
            nation_id: member.nation_id.unwrap_or_default(),
            addres: member.addres.unwrap_or_default(),
            email: member.email.unwrap_or_default(),
            phone: member.phone.unwrap_or_default(),
            id_link: member.id_link.unwrap_or_default(),
            status: member.status,
            project: member.project.unwrap_or_default(),
            apartment: member.apartment.unwrap_or_default(),
            amount: format_amount(member.amount),
            created_at: member.created_at.format(CREATED_AT_FORMAT).to_string(),
        }
    }
}

/// Format an amount the way it is typed back into the form.
///
/// Whole numbers keep one decimal (`150.0`), everything else prints in
/// shortest round-trip form.
#[must_use]
pub fn format_amount(amount: f64) -> String {
    format!("{amount:?}")
}

/// The member listing with the add form and search box.
#[derive(Debug, Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    title: String,
    flashes: Vec<Flash>,
    members: Vec<MemberRow>,
    query: String,
}

impl IndexTemplate {
    /// Build the page from a search result.
    #[must_use]
    pub fn new(title: &str, flashes: Vec<Flash>, listing: Listing) -> Self {
        Self {
            title: title.to_string(),
            flashes,
            members: listing.members.into_iter().map(MemberRow::from).collect(),
            query: listing.query,
        }
    }
}

/// The edit form for one member.
#[derive(Debug, Template)]
#[template(path = "edit.html")]
pub struct EditTemplate {
    title: String,
    flashes: Vec<Flash>,
    member: MemberRow,
}

impl EditTemplate {
    /// Build the page for `member`.
    #[must_use]
    pub fn new(title: &str, flashes: Vec<Flash>, member: Member) -> Self {
        Self {
            title: title.to_string(),
            flashes,
            member: member.into(),
        }
    }
}
