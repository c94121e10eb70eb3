use std::mem;

use anyhow::Result;
use crossterm::event::KeyCode;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::prelude::*;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::Frame;
use tracing::warn;

use crate::db::SqliteStore;
use crate::error::ErrorKind;
use crate::ledger::Ledger;

use super::forms::{Dependency, SignInField, SignInForm, SignOutField, SignOutForm};
use super::helpers::{centered_rect, describe, loan_line, surface_error};
use super::screens::{HistoryScreen, LoanList};

/// Footer space reserved for status messages and instructions.
const FOOTER_HEIGHT: u16 = 3;
/// Width of the right-aligned field label plus `": "` in form lines.
const FIELD_PREFIX: u16 = 12;

/// High-level navigation states.
enum Screen {
    /// Instruments currently out, newest loan first.
    Home(LoanList),
    History(HistoryScreen),
}

/// Modal state layered over the current screen.
#[derive(Clone)]
enum Mode {
    Normal,
    SigningOut(SignOutForm),
    SigningIn(SignInForm),
    Searching(SearchState),
}

#[derive(Clone)]
struct SearchState {
    query: String,
}

/// Holds the footer message text plus its severity.
struct StatusMessage {
    text: String,
    kind: StatusKind,
}

/// Severity levels shown in the footer.
enum StatusKind {
    Info,
    Error,
}

impl StatusKind {
    fn style(&self) -> Style {
        match self {
            StatusKind::Info => Style::default().fg(Color::Green),
            StatusKind::Error => Style::default().fg(Color::Red),
        }
    }
}

/// Central application state shared across the TUI.
pub struct App {
    ledger: Ledger<SqliteStore>,
    screen: Screen,
    mode: Mode,
    status: Option<StatusMessage>,
}

impl App {
    pub fn new(ledger: Ledger<SqliteStore>) -> Result<Self> {
        let open = ledger.open_loans()?;
        Ok(Self {
            ledger,
            screen: Screen::Home(LoanList::new(open)),
            mode: Mode::Normal,
            status: None,
        })
    }

    /// Route a key press. Returns `true` when the user asked to quit.
    ///
    /// A failed read never ends the session: the error goes to the footer and
    /// the mode the key was pressed in is restored.
    pub fn handle_key(&mut self, code: KeyCode) -> Result<bool> {
        let mut exit = false;
        let mode = mem::replace(&mut self.mode, Mode::Normal);
        let previous = mode.clone();

        let outcome = match mode {
            Mode::Normal => self.handle_normal_key(code, &mut exit),
            Mode::SigningOut(form) => self.handle_sign_out(code, form),
            Mode::SigningIn(form) => self.handle_sign_in(code, form),
            Mode::Searching(state) => self.handle_search(code, state),
        };

        self.mode = match outcome {
            Ok(next) => next,
            Err(err) => {
                warn!(error = %format!("{err:#}"), "key handler failed");
                self.set_status(surface_error(&err), StatusKind::Error);
                previous
            }
        };

        Ok(exit)
    }

    fn handle_normal_key(&mut self, code: KeyCode, exit: &mut bool) -> Result<Mode> {
        match &mut self.screen {
            Screen::Home(list) => match code {
                KeyCode::Char('q') | KeyCode::Esc => *exit = true,
                KeyCode::Up => list.move_selection(-1),
                KeyCode::Down => list.move_selection(1),
                KeyCode::PageUp => list.move_selection(-10),
                KeyCode::PageDown => list.move_selection(10),
                KeyCode::Home => list.select_first(),
                KeyCode::End => list.select_last(),
                KeyCode::Char('o') | KeyCode::Char('O') => {
                    self.clear_status();
                    return Ok(Mode::SigningOut(self.new_sign_out_form()?));
                }
                KeyCode::Char('i') | KeyCode::Char('I') => {
                    self.clear_status();
                    return Ok(Mode::SigningIn(self.new_sign_in_form(None)?));
                }
                KeyCode::Enter => {
                    let number = list.current().map(|loan| loan.instrument_number.clone());
                    match number {
                        Some(number) => {
                            self.clear_status();
                            return Ok(Mode::SigningIn(self.new_sign_in_form(Some(&number))?));
                        }
                        None => self.set_status("Nothing is signed out.", StatusKind::Error),
                    }
                }
                KeyCode::Char('h') | KeyCode::Char('H') => {
                    self.clear_status();
                    self.open_history(None)?;
                }
                _ => {}
            },
            Screen::History(history) => match code {
                KeyCode::Char('q') => *exit = true,
                KeyCode::Esc => {
                    if history.search.is_some() {
                        self.open_history(None)?;
                    } else {
                        self.open_home()?;
                    }
                    self.clear_status();
                }
                KeyCode::Up => history.list.move_selection(-1),
                KeyCode::Down => history.list.move_selection(1),
                KeyCode::PageUp => history.list.move_selection(-10),
                KeyCode::PageDown => history.list.move_selection(10),
                KeyCode::Home => history.list.select_first(),
                KeyCode::End => history.list.select_last(),
                KeyCode::Char('f') | KeyCode::Char('/') => {
                    let query = history.search.clone().unwrap_or_default();
                    return Ok(Mode::Searching(SearchState { query }));
                }
                _ => {}
            },
        }
        Ok(Mode::Normal)
    }

    fn handle_sign_out(&mut self, code: KeyCode, mut form: SignOutForm) -> Result<Mode> {
        match code {
            KeyCode::Esc => {
                self.set_status("Sign-out cancelled.", StatusKind::Info);
                return Ok(Mode::Normal);
            }
            KeyCode::Tab | KeyCode::Down => form.next_field(),
            KeyCode::BackTab | KeyCode::Up => form.previous_field(),
            KeyCode::Left | KeyCode::Right => {
                let offset = if code == KeyCode::Left { -1 } else { 1 };
                if let Some(dependency) = form.cycle(offset) {
                    self.refresh_dependency(&mut form, dependency)?;
                }
                form.error = None;
            }
            KeyCode::Backspace => form.backspace(),
            KeyCode::Char(ch) => {
                if form.push_char(ch) {
                    form.error = None;
                }
            }
            KeyCode::Enter => {
                let request = form.to_request();
                match self.ledger.checkout(request) {
                    Ok(_) => {
                        let number = form.instrument_number.current().unwrap_or_default();
                        let name = form.chorister.current().unwrap_or_default();
                        self.set_status(
                            format!("Signed out {number} to {name}."),
                            StatusKind::Info,
                        );
                        self.reload_after_write();
                        return Ok(Mode::Normal);
                    }
                    Err(err) => {
                        form.error = Some(describe(&err));
                        // Someone else may have taken it; offer what is left.
                        if err.kind() == ErrorKind::Conflict {
                            self.refresh_dependency(&mut form, Dependency::Numbers)?;
                        }
                    }
                }
            }
            _ => {}
        }
        Ok(Mode::SigningOut(form))
    }

    fn handle_sign_in(&mut self, code: KeyCode, mut form: SignInForm) -> Result<Mode> {
        match code {
            KeyCode::Esc => {
                self.set_status("Sign-in cancelled.", StatusKind::Info);
                return Ok(Mode::Normal);
            }
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => form.toggle_field(),
            KeyCode::Left if form.active == SignInField::Instrument => form.instrument.cycle(-1),
            KeyCode::Right if form.active == SignInField::Instrument => form.instrument.cycle(1),
            KeyCode::Backspace => form.backspace(),
            KeyCode::Char(ch) => {
                if form.push_char(ch) {
                    form.error = None;
                }
            }
            KeyCode::Enter => {
                let number = form.instrument.current().unwrap_or_default().to_string();
                let condition = form.condition.clone();
                match self.ledger.checkin(&number, Some(&condition)) {
                    Ok(_) => {
                        self.set_status(format!("Signed in {number}."), StatusKind::Info);
                        self.reload_after_write();
                        return Ok(Mode::Normal);
                    }
                    Err(err) => form.error = Some(describe(&err)),
                }
            }
            _ => {}
        }
        Ok(Mode::SigningIn(form))
    }

    /// Search is live: every keystroke re-queries the ledger.
    fn handle_search(&mut self, code: KeyCode, mut state: SearchState) -> Result<Mode> {
        match code {
            KeyCode::Esc => {
                self.open_history(None)?;
                return Ok(Mode::Normal);
            }
            KeyCode::Enter => return Ok(Mode::Normal),
            KeyCode::Backspace => {
                state.query.pop();
                self.open_history(Some(&state.query))?;
            }
            KeyCode::Char(ch) if !ch.is_control() => {
                state.query.push(ch);
                self.open_history(Some(&state.query))?;
            }
            _ => {}
        }
        Ok(Mode::Searching(state))
    }

    pub(crate) fn draw(&self, frame: &mut Frame) {
        let area = frame.area();
        let footer_height = FOOTER_HEIGHT.min(area.height);

        let (content_area, footer_area) = if area.height > footer_height {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Min(0), Constraint::Length(footer_height)])
                .split(area);
            (chunks[0], chunks[1])
        } else {
            (area, area)
        };

        match &self.screen {
            Screen::Home(list) => self.draw_home(frame, content_area, list),
            Screen::History(history) => self.draw_history(frame, content_area, history),
        }

        if area.height >= footer_height {
            self.draw_footer(frame, footer_area);
        }

        match &self.mode {
            Mode::SigningOut(form) => self.draw_sign_out_form(frame, area, form),
            Mode::SigningIn(form) => self.draw_sign_in_form(frame, area, form),
            Mode::Searching(state) => self.draw_search_bar(frame, area, state),
            Mode::Normal => {}
        }
    }

    fn draw_home(&self, frame: &mut Frame, area: Rect, list: &LoanList) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title(format!("On loan ({})", list.len()));

        if list.is_empty() {
            let message = Paragraph::new("Nothing is signed out. Press 'o' to sign an instrument out.")
                .alignment(Alignment::Center)
                .block(block);
            frame.render_widget(message, area);
            return;
        }

        self.draw_loan_list(frame, area, block, list);
    }

    fn draw_history(&self, frame: &mut Frame, area: Rect, history: &HistoryScreen) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title(history.title());

        if history.list.is_empty() {
            let text = if history.search.is_some() {
                "No loans match this search."
            } else {
                "No loans recorded yet."
            };
            let message = Paragraph::new(text)
                .alignment(Alignment::Center)
                .block(block);
            frame.render_widget(message, area);
            return;
        }

        self.draw_loan_list(frame, area, block, &history.list);
    }

    fn draw_loan_list(&self, frame: &mut Frame, area: Rect, block: Block, list: &LoanList) {
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let height = inner.height as usize;
        let offset = list.scroll_offset(height);
        let lines: Vec<Line> = list
            .loans
            .iter()
            .enumerate()
            .skip(offset)
            .take(height)
            .map(|(idx, loan)| loan_line(loan, idx == list.selected))
            .collect();

        frame.render_widget(Paragraph::new(lines), inner);
    }

    fn draw_footer(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::TOP);
        frame.render_widget(block.clone(), area);
        let inner = block.inner(area);

        let status_line = if let Some(status) = &self.status {
            Line::from(vec![Span::styled(status.text.clone(), status.kind.style())])
        } else {
            Line::from("")
        };

        let instructions = self.footer_instructions();

        let paragraph = Paragraph::new(vec![status_line, instructions]).wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);
    }

    fn footer_instructions(&self) -> Line<'static> {
        let key_style = Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD);
        let keys: &[(&str, &str)] = match (&self.screen, &self.mode) {
            (_, Mode::SigningOut(_)) => &[
                ("[Tab]", " Next field   "),
                ("[Left/Right]", " Choose   "),
                ("[Enter]", " Sign out   "),
                ("[Esc]", " Cancel"),
            ],
            (_, Mode::SigningIn(_)) => &[
                ("[Tab]", " Next field   "),
                ("[Left/Right]", " Choose   "),
                ("[Enter]", " Sign in   "),
                ("[Esc]", " Cancel"),
            ],
            (_, Mode::Searching(_)) => &[("[Enter]", " Keep results   "), ("[Esc]", " Clear")],
            (Screen::Home(_), Mode::Normal) => &[
                ("[o]", " Sign out   "),
                ("[i]", " Sign in   "),
                ("[Enter]", " Return selected   "),
                ("[h]", " History   "),
                ("[q]", " Quit"),
            ],
            (Screen::History(_), Mode::Normal) => &[
                ("[f]", " Search   "),
                ("[Up/Down]", " Scroll   "),
                ("[Esc]", " Back   "),
                ("[q]", " Quit"),
            ],
        };

        Line::from(
            keys.iter()
                .flat_map(|(key, label)| {
                    [
                        Span::styled(key.to_string(), key_style),
                        Span::raw(label.to_string()),
                    ]
                })
                .collect::<Vec<_>>(),
        )
    }

    fn draw_sign_out_form(&self, frame: &mut Frame, area: Rect, form: &SignOutForm) {
        let popup_area = centered_rect(60, 50, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default()
            .title("Sign Out Instrument")
            .borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let mut lines: Vec<Line> = SignOutField::ORDER
            .iter()
            .map(|field| form.build_line(*field))
            .collect();
        lines.push(Line::from(""));
        lines.push(form_hint(form.error.as_deref()));

        frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), inner);

        let text = match form.active {
            SignOutField::Group => Some(&form.group),
            SignOutField::Phone => Some(&form.phone),
            _ => None,
        };
        if let Some(text) = text {
            let row = SignOutField::ORDER
                .iter()
                .position(|field| *field == form.active)
                .unwrap_or(0) as u16;
            frame.set_cursor_position((
                inner.x + FIELD_PREFIX + text.chars().count() as u16,
                inner.y + row,
            ));
        }
    }

    fn draw_sign_in_form(&self, frame: &mut Frame, area: Rect, form: &SignInForm) {
        let popup_area = centered_rect(60, 30, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default()
            .title("Sign In Instrument")
            .borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let lines = vec![
            form.build_line(SignInField::Instrument),
            form.build_line(SignInField::Condition),
            Line::from(""),
            form_hint(form.error.as_deref()),
        ];
        frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), inner);

        if form.active == SignInField::Condition {
            frame.set_cursor_position((
                inner.x + FIELD_PREFIX + form.condition.chars().count() as u16,
                inner.y + 1,
            ));
        }
    }

    fn draw_search_bar(&self, frame: &mut Frame, area: Rect, state: &SearchState) {
        let height = 3u16.min(area.height);
        let popup_area = Rect {
            x: area.x,
            y: area.y,
            width: area.width,
            height,
        };
        frame.render_widget(Clear, popup_area);

        let block = Block::default().borders(Borders::ALL).title("Search");
        let paragraph = Paragraph::new(Span::raw(format!("Search: {}", state.query)))
            .block(block.clone())
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, popup_area);

        let inner = block.inner(popup_area);
        let cursor_x = inner.x + "Search: ".len() as u16 + state.query.chars().count() as u16;
        frame.set_cursor_position((cursor_x, inner.y));
    }

    fn set_status<S: Into<String>>(&mut self, text: S, kind: StatusKind) {
        self.status = Some(StatusMessage {
            text: text.into(),
            kind,
        });
    }

    fn clear_status(&mut self) {
        self.status = None;
    }

    /// The write has already committed, so a failed reload only reaches the
    /// footer and never reopens the form.
    fn reload_after_write(&mut self) {
        if let Err(err) = self.open_home() {
            warn!(error = %format!("{err:#}"), "failed to reload loans");
            self.set_status(
                format!("Saved, but the list could not be reloaded: {}", surface_error(&err)),
                StatusKind::Error,
            );
        }
    }

    fn open_home(&mut self) -> Result<()> {
        let open = self.ledger.open_loans()?;
        match &mut self.screen {
            Screen::Home(list) => list.set_loans(open),
            Screen::History(_) => self.screen = Screen::Home(LoanList::new(open)),
        }
        Ok(())
    }

    /// Show history, re-querying the ledger. A blank search shows everything.
    fn open_history(&mut self, search: Option<&str>) -> Result<()> {
        let search = search
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .map(str::to_string);
        let loans = self.ledger.history(search.as_deref())?;
        match &mut self.screen {
            Screen::History(history) => {
                history.list.set_loans(loans);
                history.search = search;
            }
            Screen::Home(_) => self.screen = Screen::History(HistoryScreen::new(loans, search)),
        }
        Ok(())
    }

    fn new_sign_out_form(&self) -> Result<SignOutForm> {
        let mut form = SignOutForm::new(self.ledger.divisions()?, self.ledger.instrument_types()?);
        self.refresh_dependency(&mut form, Dependency::Choristers)?;
        self.refresh_dependency(&mut form, Dependency::Numbers)?;
        Ok(form)
    }

    fn new_sign_in_form(&self, preselect: Option<&str>) -> Result<SignInForm> {
        let open = self.ledger.open_loans()?;
        Ok(SignInForm::new(&open, preselect))
    }

    /// Reload the picker that depends on the one the user just changed.
    fn refresh_dependency(&self, form: &mut SignOutForm, dependency: Dependency) -> Result<()> {
        match dependency {
            Dependency::Choristers => {
                let names = match form.division.current() {
                    Some(division) => self
                        .ledger
                        .choristers(division)?
                        .into_iter()
                        .map(|chorister| chorister.name)
                        .collect(),
                    None => Vec::new(),
                };
                form.chorister.set_options(names);
            }
            Dependency::Numbers => {
                let numbers = match form.instrument_type.current() {
                    Some(kind) => self.ledger.list_available(kind)?,
                    None => Vec::new(),
                };
                form.instrument_number.set_options(numbers);
            }
        }
        Ok(())
    }
}

fn form_hint(error: Option<&str>) -> Line<'static> {
    match error {
        Some(error) => Line::from(Span::styled(
            error.to_string(),
            Style::default().fg(Color::Red),
        )),
        None => Line::from(Span::styled(
            "Enter to save, Tab to switch fields, Esc to cancel",
            Style::default().fg(Color::Gray),
        )),
    }
}
