//! `shelf admin` subcommands: the administrator's list, detail and edit views.

use anyhow::{anyhow, bail};
use clap::Subcommand;
use tabled::{builder::Builder, settings::Style};
use time::{macros::format_description, Date, OffsetDateTime};

use shelf_app::modules::books::{
    admin::{AdminError, BookRequestAdmin, DetailView},
    models::{BookRequestPayload, BookStatus},
    store::BookRequestFilter,
};
use shelf_app::App;

#[derive(Debug, Subcommand)]
pub enum AdminCommand {
    /// List book requests, newest first
    List {
        /// Only requests in this status (Pendente, Aprobado, Mercado, Rexeitado)
        #[arg(long)]
        status: Option<BookStatus>,

        /// Words that must appear in the name, email or book
        #[arg(long)]
        search: Option<String>,

        /// Created on or after this day (YYYY-MM-DD, UTC)
        #[arg(long, value_parser = parse_day)]
        created_after: Option<OffsetDateTime>,

        /// Created before this day (YYYY-MM-DD, UTC)
        #[arg(long, value_parser = parse_day)]
        created_before: Option<OffsetDateTime>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show one book request grouped by section
    Show {
        id: i64,
    },

    /// Change the editable fields of a book request
    Edit {
        id: i64,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        email: Option<String>,

        #[arg(long)]
        book: Option<String>,

        #[arg(long)]
        date: Option<String>,

        #[arg(long)]
        status: Option<String>,
    },
}

pub async fn run(app: &App, command: AdminCommand) -> anyhow::Result<()> {
    let admin = app.modules.books.admin();

    match command {
        AdminCommand::List {
            status,
            search,
            created_after,
            created_before,
            json,
        } => {
            let filter = BookRequestFilter {
                status,
                created_after,
                created_before,
                search,
            };
            list(&admin, &filter, json).await
        }
        AdminCommand::Show { id } => {
            let view = admin.detail(id).await.map_err(describe)?;
            print!("{}", render_detail(&view));
            Ok(())
        }
        AdminCommand::Edit {
            id,
            name,
            email,
            book,
            date,
            status,
        } => {
            let form = BookRequestPayload {
                name,
                email,
                book,
                date,
                status: status.map(serde_json::Value::String),
            };
            if form.name.is_none()
                && form.email.is_none()
                && form.book.is_none()
                && form.date.is_none()
                && form.status.is_none()
            {
                bail!("nothing to edit; pass at least one of --name, --email, --book, --date, --status");
            }

            let view = admin.edit(id, form).await.map_err(describe)?;
            print!("{}", render_detail(&view));
            Ok(())
        }
    }
}

async fn list(admin: &BookRequestAdmin, filter: &BookRequestFilter, json: bool) -> anyhow::Result<()> {
    let rows = admin.changelist(filter).await.map_err(describe)?;
    let headers = BookRequestAdmin::headers();

    if json {
        let items: Vec<serde_json::Value> = rows
            .iter()
            .map(|row| {
                let mut object = serde_json::Map::new();
                object.insert("id".to_string(), row.id.into());
                for (name, cell) in shelf_app::modules::books::admin::LIST_DISPLAY
                    .iter()
                    .zip(&row.cells)
                {
                    object.insert(name.to_string(), cell.clone().into());
                }
                serde_json::Value::Object(object)
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    let mut builder = Builder::default();
    let mut header = vec!["ID".to_string()];
    header.extend(headers.iter().map(|label| label.to_string()));
    builder.push_record(header);
    for row in &rows {
        let mut record = vec![row.id.to_string()];
        record.extend(row.cells.iter().cloned());
        builder.push_record(record);
    }
    let mut table = builder.build();
    table.with(Style::modern());

    println!("{table}");
    println!("{} book request(s)", rows.len());
    Ok(())
}

fn render_detail(view: &DetailView) -> String {
    let mut out = format!("#{} {}\n", view.id, view.title);
    for section in &view.sections {
        let marker = if section.collapsed { " (collapsed)" } else { "" };
        out.push_str(&format!("\n== {}{}\n", section.title, marker));
        for field in &section.fields {
            let lock = if field.editable { "" } else { " [read-only]" };
            out.push_str(&format!("  {}: {}{}\n", field.label, field.value, lock));
        }
    }
    out
}

/// Turn admin failures into messages an operator can act on
fn describe(err: AdminError) -> anyhow::Error {
    match err {
        AdminError::Invalid(errors) => {
            let lines: Vec<String> = errors
                .errors()
                .iter()
                .map(|error| format!("  {}: {}", error.field, error.message))
                .collect();
            anyhow!("rejected:\n{}", lines.join("\n"))
        }
        AdminError::Store(err) => anyhow::Error::new(err),
    }
}

fn parse_day(value: &str) -> Result<OffsetDateTime, String> {
    Date::parse(value, format_description!("[year]-[month]-[day]"))
        .map(|day| day.midnight().assume_utc())
        .map_err(|err| format!("expected YYYY-MM-DD: {err}"))
}
