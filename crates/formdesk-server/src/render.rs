// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTML rendering of descriptors and pages.
//!
//! Every view is a minijinja template compiled into the binary and loaded
//! once into [`Templates`]. Templates named `*.html` are auto-escaped.
//!
//! Fragments are swapped into `#content` by htmx; plain browser requests get
//! the same fragment wrapped in `layout.html`.

use formdesk_core::form::FieldKind;
use formdesk_core::lifecycle::IndexPage;
use formdesk_core::{Entity, FieldErrors, RawFields, Resource, TableDescriptor};
use minijinja::{Environment, Error, context};
use serde::Serialize;

use crate::auth::LOGIN_LINK_TTL;

const SOURCES: &[(&str, &str)] = &[
    ("layout.html", include_str!("../templates/layout.html")),
    ("index.html", include_str!("../templates/index.html")),
    ("rows.html", include_str!("../templates/rows.html")),
    ("form.html", include_str!("../templates/form.html")),
    ("message.html", include_str!("../templates/message.html")),
    ("not_found.html", include_str!("../templates/not_found.html")),
    ("failure.html", include_str!("../templates/failure.html")),
    ("login.html", include_str!("../templates/login.html")),
    ("check_inbox.html", include_str!("../templates/check_inbox.html")),
    ("session_expired.html", include_str!("../templates/session_expired.html")),
    ("login_email.txt", include_str!("../templates/login_email.txt")),
    ("login_email.html", include_str!("../templates/login_email.html")),
];

/// Page shown for a failed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorPage {
    /// Malformed input, with a short message.
    BadRequest(String),
    /// Missing row or route, naming what was looked up.
    NotFound(String),
    /// Internal failure. Never carries details.
    Failure,
}

#[derive(Serialize)]
struct RowView {
    url: String,
    cells: Vec<String>,
}

#[derive(Serialize)]
struct FieldView<'a> {
    name: &'a str,
    label: &'a str,
    select: bool,
    input_type: &'a str,
    value: &'a str,
    placeholder: &'a str,
    required: bool,
    options: Vec<OptionView<'a>>,
    error: Option<&'a str>,
}

#[derive(Serialize)]
struct OptionView<'a> {
    value: &'a str,
    label: &'a str,
    selected: bool,
}

/// The compiled view templates.
pub struct Templates {
    env: Environment<'static>,
}

impl Templates {
    /// Parse every template. Fails on a syntax error.
    pub fn new() -> Result<Self, Error> {
        let mut env = Environment::new();
        for &(name, source) in SOURCES {
            env.add_template(name, source)?;
        }
        Ok(Self { env })
    }

    /// Render the template `name` with `ctx`.
    pub fn render<S: Serialize>(&self, name: &str, ctx: S) -> Result<String, Error> {
        self.env.get_template(name)?.render(ctx)
    }

    /// Full document around `body`.
    pub fn layout(&self, title: &str, body: &str) -> Result<String, Error> {
        self.render("layout.html", context! { title, body })
    }

    /// `body` as a fragment for htmx, wrapped in the layout otherwise.
    pub fn page(&self, hx: bool, title: &str, body: String) -> Result<String, Error> {
        if hx { Ok(body) } else { self.layout(title, &body) }
    }

    /// Index view: header, create link and the first rows.
    ///
    /// An incomplete page subscribes to the resource stream so the rows
    /// arrive after the initial render.
    pub fn index<R: Resource>(
        &self,
        resource: &R,
        page: &IndexPage<R::Row>,
    ) -> Result<String, Error> {
        let table = resource.table_config();
        let columns: Vec<&str> = table.columns().iter().map(|c| c.label()).collect();
        let stream_url = table.stream_url().filter(|_| !page.complete);
        let next_url = (page.complete && page.rows.len() as u32 == page.page_size).then(|| {
            format!(
                "{}?page={}&pageSize={}",
                resource.location(None),
                page.page + 1,
                page.page_size
            )
        });

        self.render(
            "index.html",
            context! {
                title => table.title(),
                create_url => table.create_url(),
                create_label => table.create_label(),
                columns,
                stream_url,
                rows => row_views(table, &page.rows),
                next_url,
            },
        )
    }

    /// Table rows, each linking to its row view.
    pub fn rows<T>(&self, table: &TableDescriptor<T>, rows: &[T]) -> Result<String, Error> {
        self.render("rows.html", context! { rows => row_views(table, rows) })
    }

    /// Create or edit form prefilled with `values`, with `errors` next to
    /// their inputs.
    pub fn form<R: Resource>(
        &self,
        resource: &R,
        row: Option<&R::Row>,
        values: &RawFields,
        errors: &FieldErrors,
    ) -> Result<String, Error> {
        let form = resource.form_config();
        let row = row.filter(|r| r.is_persisted());
        let action = form.save_target(row);
        let heading = match row {
            Some(r) => format!("{} #{}", resource.title(), r.id()),
            None => format!("New {}", resource.title()),
        };

        let fields: Vec<FieldView<'_>> = form
            .fields()
            .iter()
            .map(|field| {
                let value = values.get(field.name()).map(String::as_str).unwrap_or("");
                let options = match field.kind() {
                    FieldKind::Select { options } => options
                        .iter()
                        .map(|o| OptionView {
                            value: &o.value,
                            label: &o.label,
                            selected: o.value == value,
                        })
                        .collect(),
                    _ => Vec::new(),
                };
                FieldView {
                    name: field.name(),
                    label: field.label(),
                    select: matches!(field.kind(), FieldKind::Select { .. }),
                    input_type: field.kind().input_type().unwrap_or("text"),
                    value,
                    placeholder: field.placeholder_text(),
                    required: field.is_required(),
                    options,
                    error: errors.get(field.name()),
                }
            })
            .collect();

        self.render(
            "form.html",
            context! {
                heading,
                validate_url => format!("{action}/validate"),
                action,
                fields,
            },
        )
    }

    /// Body of an error response.
    pub fn error_page(&self, hx: bool, page: &ErrorPage) -> Result<String, Error> {
        let (title, body) = match page {
            ErrorPage::BadRequest(message) => {
                let title = "Bad request";
                (title, self.render("message.html", context! { title, message })?)
            }
            ErrorPage::NotFound(what) => {
                ("Not found", self.render("not_found.html", context! { what })?)
            }
            ErrorPage::Failure => ("Error", self.render("failure.html", context! {})?),
        };
        self.page(hx, title, body)
    }

    /// Login form.
    pub fn login(&self, email: &str, error: Option<&str>) -> Result<String, Error> {
        self.render("login.html", context! { email, error })
    }

    /// Shown after a login link was requested, whether or not the email is
    /// known.
    pub fn check_inbox(&self, email: &str) -> Result<String, Error> {
        self.render(
            "check_inbox.html",
            context! { email, valid_minutes => LOGIN_LINK_TTL.as_secs() / 60 },
        )
    }

    /// Swapped into `#relogin` when an htmx request arrives without a valid
    /// session.
    pub fn session_expired(&self) -> Result<String, Error> {
        self.render("session_expired.html", context! {})
    }
}

fn row_views<T>(table: &TableDescriptor<T>, rows: &[T]) -> Vec<RowView> {
    rows.iter()
        .map(|row| RowView {
            url: table.row_url(row),
            cells: table.cells(row),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use minijinja::HtmlEscape;

    fn templates() -> Templates {
        Templates::new().unwrap()
    }

    #[test]
    fn test_every_template_parses() {
        let templates = templates();
        for &(name, _) in SOURCES {
            assert!(templates.env.get_template(name).is_ok(), "{name}");
        }
    }

    #[test]
    fn test_page_wraps_only_full_requests() {
        let templates = templates();
        let fragment = templates.page(true, "Users", "<p>x</p>".to_string()).unwrap();
        assert_eq!(fragment, "<p>x</p>");

        let full = templates.page(false, "Users", "<p>x</p>".to_string()).unwrap();
        assert!(full.starts_with("<!DOCTYPE html>"));
        assert!(full.contains("<title>Users - formdesk</title>"));
        assert!(full.contains(r#"<main id="content"><p>x</p></main>"#));
    }

    #[test]
    fn test_layout_escapes_the_title() {
        let html = templates().layout("<script>", "").unwrap();
        assert!(html.contains("<title>&lt;script&gt; - formdesk</title>"));
    }

    #[test]
    fn test_login_escapes_prefill() {
        let html = templates()
            .login("a\"b@example.com", Some("Email is required"))
            .unwrap();
        assert!(html.contains(&format!(r#"value="{}""#, HtmlEscape("a\"b@example.com"))));
        assert!(!html.contains("a\"b@example.com"));
        assert!(html.contains("Email is required"));
    }

    #[test]
    fn test_login_without_error() {
        let html = templates().login("", None).unwrap();
        assert!(html.contains(r#"value="""#));
        assert!(!html.contains("field-error"));
    }

    #[test]
    fn test_check_inbox_states_link_lifetime() {
        let html = templates().check_inbox("ada@example.com").unwrap();
        assert!(html.contains("If ada@example.com belongs to an account"));
        assert!(html.contains("valid for 5 minutes"));
    }

    #[test]
    fn test_error_pages() {
        let templates = templates();

        let html = templates
            .error_page(true, &ErrorPage::NotFound("Users 9".to_string()))
            .unwrap();
        assert!(html.contains("Users 9 does not exist."));
        assert!(!html.contains("<!DOCTYPE html>"));

        let html = templates
            .error_page(false, &ErrorPage::NotFound("Users 9".to_string()))
            .unwrap();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>Not found - formdesk</title>"));

        let html = templates
            .error_page(false, &ErrorPage::BadRequest("invalid id <x>".to_string()))
            .unwrap();
        assert!(html.contains("invalid id &lt;x&gt;"));

        let html = templates.error_page(true, &ErrorPage::Failure).unwrap();
        assert!(html.contains("Something went wrong"));
    }

    #[test]
    fn test_session_expired() {
        let html = templates().session_expired().unwrap();
        assert!(html.contains("Your session has expired."));
    }
}
