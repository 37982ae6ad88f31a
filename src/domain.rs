use std::io::Error;
use std::path::PathBuf;

use polars::error::PolarsError;
use ratatui::crossterm::event::KeyEvent;

pub const HELP_TEXT: &str = "\
roster key bindings

  q           quit
  Up/k        move selection up
  Down/j      move selection down
  Left/h      previous page
  Right/l     next page
  1..9        jump to page
  Tab/BackTab move column selection
  s           sort by selected column (toggle direction)
  /           search all fields (live)
  c           clear search
  e           edit selected cell
  Enter/x     show/hide record details
  y           export filtered view to clipboard
  ?           this help

Press any key to close.";

#[derive(Debug)]
pub enum RosterError {
    IoError(Error),
    PolarsError(PolarsError),
    LoadingFailed(String),
    FileNotFound,
    PermissionDenied,
    UnknownFileType,
}

impl From<Error> for RosterError {
    fn from(err: Error) -> Self {
        RosterError::IoError(err)
    }
}

impl From<PolarsError> for RosterError {
    fn from(err: PolarsError) -> Self {
        RosterError::PolarsError(err)
    }
}

#[derive(Debug, Clone)]
pub struct RosterConfig {
    pub roster_path: Option<PathBuf>,
    pub page_size: usize,
    pub event_poll_time: u64,
}

impl Default for RosterConfig {
    fn default() -> Self {
        RosterConfig {
            roster_path: None,
            page_size: 5,
            event_poll_time: 100,
        }
    }
}

// Which text input currently owns raw key events.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputMode {
    SearchRoster,
    EditCell,
}

#[derive(Debug)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    NextColumn,
    PreviousColumn,
    NextPage,
    PreviousPage,
    GotoPage(usize),
    ToggleSort,
    Search,
    ClearSearch,
    EditCell,
    ToggleDetails,
    Export,
    Help,
    Exit,
    RawKey(KeyEvent),
}
