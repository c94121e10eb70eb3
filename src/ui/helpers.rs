use anyhow::Error;
use chrono::{DateTime, Local, Utc};
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};

use crate::error::LedgerError;
use crate::models::LoanRecord;

/// Produce a rectangle centered within `area` that spans the requested percent
/// of the width and height. Used for modal dialogs.
pub(crate) fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(area);

    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(horizontal[1]);

    vertical[1]
}

/// Extract the most relevant error message from a chained error.
pub(crate) fn surface_error(err: &Error) -> String {
    err.chain()
        .last()
        .map(|cause| cause.to_string())
        .unwrap_or_else(|| err.to_string())
}

/// Message shown to the person at the desk. Storage failures show their root
/// cause rather than the adapter's outermost context.
pub(crate) fn describe(err: &LedgerError) -> String {
    match err {
        LedgerError::Storage(inner) => format!("Storage failure: {}", surface_error(inner)),
        other => other.to_string(),
    }
}

/// Wall-clock rendering in the machine's local zone.
pub(crate) fn format_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

/// One history row: when, what, who, and how it came back.
pub(crate) fn loan_line(loan: &LoanRecord, selected: bool) -> Line<'static> {
    let base = if selected {
        Style::default().add_modifier(Modifier::BOLD | Modifier::REVERSED)
    } else {
        Style::default()
    };

    let mut who = format!("{} ({})", loan.chorister_name, loan.division);
    if let Some(group) = &loan.group {
        who.push_str(&format!(" / {group}"));
    }

    let returned = match (loan.checkin_time, &loan.condition_returned) {
        (Some(at), Some(condition)) => Span::styled(
            format!("returned {} - {condition}", format_time(at)),
            base.fg(Color::Green),
        ),
        (Some(at), None) => Span::styled(
            format!("returned {}", format_time(at)),
            base.fg(Color::Green),
        ),
        (None, _) => Span::styled("on loan".to_string(), base.fg(Color::Yellow)),
    };

    Line::from(vec![
        Span::styled(format!("{}  ", format_time(loan.checkout_time)), base),
        Span::styled(
            format!("{:<16}", loan.instrument_number),
            base.add_modifier(Modifier::BOLD),
        ),
        Span::styled(format!("{who}  "), base),
        returned,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;
    use chrono::TimeZone;

    #[test]
    fn surface_error_shows_root_cause() {
        let err = Err::<(), _>(anyhow::anyhow!("disk I/O error"))
            .context("failed to insert loan")
            .unwrap_err();
        assert_eq!(surface_error(&err), "disk I/O error");
    }

    #[test]
    fn open_loans_render_as_on_loan() {
        let loan = LoanRecord {
            id: 1,
            division: "Youth Choir".into(),
            group: Some("Brass".into()),
            chorister_name: "Samuel Youth".into(),
            phone: None,
            instrument_type: "Trumpet".into(),
            instrument_number: "Trumpet-004".into(),
            checkout_time: Utc.with_ymd_and_hms(2025, 5, 1, 17, 0, 0).unwrap(),
            checkin_time: None,
            condition_returned: None,
        };

        let text: String = loan_line(&loan, false)
            .spans
            .iter()
            .map(|span| span.content.as_ref())
            .collect();
        assert!(text.contains("Trumpet-004"));
        assert!(text.contains("Samuel Youth (Youth Choir) / Brass"));
        assert!(text.ends_with("on loan"));
    }
}
