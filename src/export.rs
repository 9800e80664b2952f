use chrono::{DateTime, SecondsFormat, Utc};
use std::io::{self, Write};

use crate::models::Deal;

pub const SEPARATOR: char = ',';

const HEADER: [&str; 7] = ["id", "title", "url", "status", "expires_at", "saved_at", "notes"];

fn needs_quotes(field: &str) -> bool {
    field.contains(SEPARATOR) || field.contains('"') || field.contains('\n') || field.contains('\r')
}

fn push_field(line: &mut String, field: &str) {
    if needs_quotes(field) {
        line.push('"');
        line.push_str(&field.replace('"', "\"\""));
        line.push('"');
    } else {
        line.push_str(field);
    }
}

fn format_row<S: AsRef<str>>(cells: &[S]) -> String {
    let mut line = String::new();
    for (i, cell) in cells.iter().enumerate() {
        if i > 0 {
            line.push(SEPARATOR);
        }
        push_field(&mut line, cell.as_ref());
    }
    line.push('\n');
    line
}

fn deal_row(deal: &Deal) -> [String; 7] {
    [
        deal.id.clone(),
        deal.title.clone(),
        deal.url.clone(),
        deal.status.to_string(),
        deal.expires_at.clone().unwrap_or_default(),
        deal.saved_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        deal.notes.clone().unwrap_or_default(),
    ]
}

/// Header row plus one row per deal, in the order given.
pub fn export_csv(deals: &[Deal]) -> String {
    let mut out = format_row(&HEADER);
    for deal in deals {
        out.push_str(&format_row(&deal_row(deal)));
    }
    out
}

pub fn write_csv<W: Write>(mut w: W, deals: &[Deal]) -> io::Result<()> {
    w.write_all(export_csv(deals).as_bytes())?;
    w.flush()
}

pub fn export_filename(at: DateTime<Utc>) -> String {
    format!("deal-watchlist-{}.csv", at.format("%Y-%m-%d"))
}
