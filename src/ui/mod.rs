//! Ratatui front-end for the instrument desk: the list of instruments on loan,
//! the searchable history, and modal sign-out / sign-in forms.

mod app;
mod forms;
mod helpers;
mod screens;
mod terminal;

pub use app::App;
pub use terminal::run_app;
