use crate::models::LoanRecord;

/// Scrollable list of loans with a clamped selection.
#[derive(Default, Debug)]
pub(crate) struct LoanList {
    pub(crate) loans: Vec<LoanRecord>,
    pub(crate) selected: usize,
}

impl LoanList {
    pub(crate) fn new(loans: Vec<LoanRecord>) -> Self {
        Self { loans, selected: 0 }
    }

    pub(crate) fn current(&self) -> Option<&LoanRecord> {
        self.loans.get(self.selected)
    }

    pub(crate) fn move_selection(&mut self, offset: isize) {
        if self.loans.is_empty() {
            return;
        }
        let len = self.loans.len() as isize;
        let new = (self.selected as isize + offset).clamp(0, len - 1);
        self.selected = new as usize;
    }

    pub(crate) fn select_first(&mut self) {
        self.selected = 0;
    }

    pub(crate) fn select_last(&mut self) {
        self.selected = self.loans.len().saturating_sub(1);
    }

    /// Swap in fresh rows, keeping the same log selected when it survived.
    pub(crate) fn set_loans(&mut self, loans: Vec<LoanRecord>) {
        let focus = self.current().map(|loan| loan.id);
        self.loans = loans;
        self.selected = focus
            .and_then(|id| self.loans.iter().position(|loan| loan.id == id))
            .unwrap_or(0);
    }

    pub(crate) fn len(&self) -> usize {
        self.loans.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.loans.is_empty()
    }

    /// First row to draw so the selection stays inside `height` rows.
    pub(crate) fn scroll_offset(&self, height: usize) -> usize {
        if height == 0 || self.selected < height {
            0
        } else {
            self.selected + 1 - height
        }
    }
}

/// Full loan history, optionally narrowed by a search term.
#[derive(Default, Debug)]
pub(crate) struct HistoryScreen {
    pub(crate) list: LoanList,
    pub(crate) search: Option<String>,
}

impl HistoryScreen {
    pub(crate) fn new(loans: Vec<LoanRecord>, search: Option<String>) -> Self {
        Self {
            list: LoanList::new(loans),
            search,
        }
    }

    pub(crate) fn title(&self) -> String {
        match &self.search {
            Some(term) => format!("History matching \"{term}\" ({})", self.list.len()),
            None => format!("History ({})", self.list.len()),
        }
    }
}
