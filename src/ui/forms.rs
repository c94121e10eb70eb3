use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};

use crate::models::{LoanRecord, NewLoan};

/// A fixed list of choices cycled with the arrow keys.
#[derive(Default, Clone, Debug)]
pub(crate) struct Picker {
    pub(crate) options: Vec<String>,
    pub(crate) index: usize,
}

impl Picker {
    pub(crate) fn new(options: Vec<String>) -> Self {
        Self { options, index: 0 }
    }

    pub(crate) fn current(&self) -> Option<&str> {
        self.options.get(self.index).map(String::as_str)
    }

    /// Replace the options, keeping the current value selected when it is
    /// still offered.
    pub(crate) fn set_options(&mut self, options: Vec<String>) {
        let previous = self.current().map(str::to_string);
        self.options = options;
        self.index = previous
            .and_then(|value| self.options.iter().position(|o| *o == value))
            .unwrap_or(0);
    }

    pub(crate) fn select(&mut self, value: &str) {
        if let Some(idx) = self.options.iter().position(|o| o == value) {
            self.index = idx;
        }
    }

    pub(crate) fn cycle(&mut self, offset: isize) {
        if self.options.is_empty() {
            return;
        }
        let len = self.options.len() as isize;
        self.index = (self.index as isize + offset).rem_euclid(len) as usize;
    }
}

/// Fields of the sign-out form, in tab order.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub(crate) enum SignOutField {
    #[default]
    Division,
    Chorister,
    Group,
    Phone,
    InstrumentType,
    InstrumentNumber,
}

impl SignOutField {
    pub(crate) const ORDER: [SignOutField; 6] = [
        SignOutField::Division,
        SignOutField::Chorister,
        SignOutField::Group,
        SignOutField::Phone,
        SignOutField::InstrumentType,
        SignOutField::InstrumentNumber,
    ];

    fn step(self, offset: isize) -> Self {
        let idx = Self::ORDER.iter().position(|f| *f == self).unwrap_or(0) as isize;
        let len = Self::ORDER.len() as isize;
        Self::ORDER[(idx + offset).rem_euclid(len) as usize]
    }

    pub(crate) fn label(self) -> &'static str {
        match self {
            SignOutField::Division => "Division",
            SignOutField::Chorister => "Chorister",
            SignOutField::Group => "Group",
            SignOutField::Phone => "Phone",
            SignOutField::InstrumentType => "Instrument",
            SignOutField::InstrumentNumber => "Number",
        }
    }
}

/// What the app must reload after a key changed a picker.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub(crate) enum Dependency {
    Choristers,
    Numbers,
}

#[derive(Default, Clone, Debug)]
pub(crate) struct SignOutForm {
    pub(crate) division: Picker,
    pub(crate) chorister: Picker,
    pub(crate) group: String,
    pub(crate) phone: String,
    pub(crate) instrument_type: Picker,
    pub(crate) instrument_number: Picker,
    pub(crate) active: SignOutField,
    pub(crate) error: Option<String>,
}

impl SignOutForm {
    pub(crate) fn new(divisions: Vec<String>, types: Vec<String>) -> Self {
        Self {
            division: Picker::new(divisions),
            instrument_type: Picker::new(types),
            ..Self::default()
        }
    }

    pub(crate) fn next_field(&mut self) {
        self.active = self.active.step(1);
    }

    pub(crate) fn previous_field(&mut self) {
        self.active = self.active.step(-1);
    }

    /// Cycle the active picker. Returns which dependent list went stale.
    pub(crate) fn cycle(&mut self, offset: isize) -> Option<Dependency> {
        match self.active {
            SignOutField::Division => {
                self.division.cycle(offset);
                Some(Dependency::Choristers)
            }
            SignOutField::Chorister => {
                self.chorister.cycle(offset);
                None
            }
            SignOutField::InstrumentType => {
                self.instrument_type.cycle(offset);
                Some(Dependency::Numbers)
            }
            SignOutField::InstrumentNumber => {
                self.instrument_number.cycle(offset);
                None
            }
            SignOutField::Group | SignOutField::Phone => None,
        }
    }

    pub(crate) fn push_char(&mut self, ch: char) -> bool {
        if ch.is_control() {
            return false;
        }
        match self.active {
            SignOutField::Group => self.group.push(ch),
            SignOutField::Phone => self.phone.push(ch),
            _ => return false,
        }
        true
    }

    pub(crate) fn backspace(&mut self) {
        match self.active {
            SignOutField::Group => {
                self.group.pop();
            }
            SignOutField::Phone => {
                self.phone.pop();
            }
            _ => {}
        }
    }

    /// Build the checkout request. Unset pickers become blank strings and are
    /// rejected by the ledger's own validation.
    pub(crate) fn to_request(&self) -> NewLoan {
        let picked = |picker: &Picker| picker.current().unwrap_or_default().to_string();
        NewLoan {
            division: picked(&self.division),
            group: Some(self.group.clone()),
            chorister_name: picked(&self.chorister),
            phone: Some(self.phone.clone()),
            instrument_type: picked(&self.instrument_type),
            instrument_number: picked(&self.instrument_number),
        }
    }

    pub(crate) fn build_line(&self, field: SignOutField) -> Line<'static> {
        let is_active = self.active == field;
        let value = match field {
            SignOutField::Division => picker_display(&self.division, "no divisions"),
            SignOutField::Chorister => picker_display(&self.chorister, "no choristers"),
            SignOutField::Group => text_display(&self.group),
            SignOutField::Phone => text_display(&self.phone),
            SignOutField::InstrumentType => picker_display(&self.instrument_type, "no instruments"),
            SignOutField::InstrumentNumber => {
                picker_display(&self.instrument_number, "none available")
            }
        };
        field_line(field.label(), value, is_active)
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub(crate) enum SignInField {
    #[default]
    Instrument,
    Condition,
}

#[derive(Default, Clone, Debug)]
pub(crate) struct SignInForm {
    pub(crate) instrument: Picker,
    pub(crate) condition: String,
    pub(crate) active: SignInField,
    pub(crate) error: Option<String>,
}

impl SignInForm {
    /// Offer every instrument that is currently out, optionally preselecting
    /// one.
    pub(crate) fn new(open_loans: &[LoanRecord], preselect: Option<&str>) -> Self {
        let mut instrument = Picker::new(
            open_loans
                .iter()
                .map(|loan| loan.instrument_number.clone())
                .collect(),
        );
        if let Some(number) = preselect {
            instrument.select(number);
        }
        Self {
            instrument,
            ..Self::default()
        }
    }

    pub(crate) fn toggle_field(&mut self) {
        self.active = match self.active {
            SignInField::Instrument => SignInField::Condition,
            SignInField::Condition => SignInField::Instrument,
        };
    }

    pub(crate) fn push_char(&mut self, ch: char) -> bool {
        if self.active == SignInField::Condition && !ch.is_control() {
            self.condition.push(ch);
            true
        } else {
            false
        }
    }

    pub(crate) fn backspace(&mut self) {
        if self.active == SignInField::Condition {
            self.condition.pop();
        }
    }

    pub(crate) fn build_line(&self, field: SignInField) -> Line<'static> {
        match field {
            SignInField::Instrument => field_line(
                "Instrument",
                picker_display(&self.instrument, "nothing is signed out"),
                self.active == field,
            ),
            SignInField::Condition => field_line(
                "Condition",
                text_display(&self.condition),
                self.active == field,
            ),
        }
    }
}

/// Rendered value plus whether it is a placeholder.
fn picker_display(picker: &Picker, empty: &str) -> (String, bool) {
    match picker.current() {
        Some(value) if picker.options.len() > 1 => (format!("< {value} >"), false),
        Some(value) => (value.to_string(), false),
        None => (format!("({empty})"), true),
    }
}

fn text_display(value: &str) -> (String, bool) {
    if value.is_empty() {
        ("<optional>".to_string(), true)
    } else {
        (value.to_string(), false)
    }
}

fn field_line(name: &str, (display, placeholder): (String, bool), is_active: bool) -> Line<'static> {
    let style = if is_active {
        Style::default().fg(Color::Yellow)
    } else if placeholder {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default()
    };

    Line::from(vec![
        Span::raw(format!("{name:>10}: ")),
        Span::styled(display, style),
    ])
}
