use arboard::Clipboard;
use rayon::prelude::*;
use ratatui::crossterm::event::KeyEvent;
use std::cmp;
use std::time::Instant;
use tracing::{debug, error, trace};

use crate::domain::{HELP_TEXT, InputMode, Message, RosterConfig, RosterError};
use crate::inputter::{InputResult, Inputter};

#[derive(Debug, PartialEq)]
pub enum Status {
    READY,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    TABLE,
    INPUT,
    POPUP,
}

/// One learner record. `id` is the stable identity every overlay state
/// (edit curser, expansion) is keyed by; it is never edited.
#[derive(Debug, Clone, PartialEq)]
pub struct Student {
    pub id: String,
    pub name: String,
    pub class_name: String,
    pub grade: String,
    pub student_id: String,
    pub email: String,
    pub last_login: String,
}

impl Student {
    pub fn field(&self, field: Field) -> &str {
        match field {
            Field::Id => &self.id,
            Field::StudentId => &self.student_id,
            Field::Name => &self.name,
            Field::ClassName => &self.class_name,
            Field::Grade => &self.grade,
            Field::Email => &self.email,
            Field::LastLogin => &self.last_login,
        }
    }

    fn set_field(&mut self, field: Field, value: String) {
        match field {
            Field::Id => error!("Refusing to edit the immutable record id!"),
            Field::StudentId => self.student_id = value,
            Field::Name => self.name = value,
            Field::ClassName => self.class_name = value,
            Field::Grade => self.grade = value,
            Field::Email => self.email = value,
            Field::LastLogin => self.last_login = value,
        }
    }

    // A record matches if any field contains the term. The caller
    // lowercases the term once; an empty term matches everything.
    fn matches(&self, lower_term: &str) -> bool {
        Field::ALL
            .iter()
            .any(|&f| self.field(f).to_lowercase().contains(lower_term))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Id,
    StudentId,
    Name,
    ClassName,
    Grade,
    Email,
    LastLogin,
}

impl Field {
    pub const ALL: [Field; 7] = [
        Field::Id,
        Field::StudentId,
        Field::Name,
        Field::ClassName,
        Field::Grade,
        Field::Email,
        Field::LastLogin,
    ];

    // Columns of the summary table, in render order. Email and last
    // login only show up in the expanded detail panel.
    pub const SUMMARY: [Field; 4] = [
        Field::StudentId,
        Field::Name,
        Field::ClassName,
        Field::Grade,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Field::Id => "Id",
            Field::StudentId => "Student ID",
            Field::Name => "Name",
            Field::ClassName => "Class Name",
            Field::Grade => "Grade",
            Field::Email => "Email",
            Field::LastLogin => "Last Login",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SortOrder {
    ASCENDING,
    DESCENDING,
}

/// At most one sort key is active. Toggling the active key flips the
/// direction, selecting a new key starts ascending again.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SortDirective {
    pub key: Option<Field>,
    pub order: SortOrder,
}

impl SortDirective {
    fn none() -> Self {
        SortDirective {
            key: None,
            order: SortOrder::ASCENDING,
        }
    }

    fn toggled(&self, key: Field) -> Self {
        let order = if self.key == Some(key) && self.order == SortOrder::ASCENDING {
            SortOrder::DESCENDING
        } else {
            SortOrder::ASCENDING
        };
        SortDirective {
            key: Some(key),
            order,
        }
    }
}

/// One summary row handed to the UI, with the overlay state resolved.
#[derive(Debug, Clone)]
pub struct RowView {
    pub id: String,
    pub cells: Vec<String>,
    pub detail: Option<(String, String)>,
    pub editing_column: Option<usize>,
}

pub struct UIData {
    pub title: String,
    pub headers: Vec<String>,
    pub rows: Vec<RowView>,
    pub selected_row: usize,
    pub selected_column: usize,
    pub current_page: usize,
    pub total_pages: usize,
    pub total_filtered: usize,
    pub showing: String,
    pub search_term: String,
    pub show_popup: bool,
    pub popup_message: String,
    pub cmdinput: InputResult,
    pub input_mode: Option<InputMode>,
    pub active_input: bool,
    pub status_message: String,
    pub last_status_message_update: Instant,
    pub last_update: Instant,
}

impl UIData {
    fn empty() -> Self {
        UIData {
            title: String::new(),
            headers: Vec::new(),
            rows: Vec::new(),
            selected_row: 0,
            selected_column: 0,
            current_page: 1,
            total_pages: 0,
            total_filtered: 0,
            showing: String::new(),
            search_term: String::new(),
            show_popup: false,
            popup_message: String::new(),
            cmdinput: InputResult::default(),
            input_mode: None,
            active_input: false,
            status_message: String::new(),
            last_status_message_update: Instant::now(),
            last_update: Instant::now(),
        }
    }
}

pub struct Model {
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    // The canonical collection is never reordered or shrunk. `order` is
    // the working order the sort engine rewrites, filter and pagination
    // derive from it.
    students: Vec<Student>,
    order: Vec<usize>,
    sort: SortDirective,
    search_term: String,
    saved_search: String,
    current_page: usize,
    page_size: usize,
    curser_row: usize,
    curser_column: usize,
    edit: Option<(String, Field)>,
    expanded: Option<String>,
    input: Inputter,
    input_mode: Option<InputMode>,
    last_input: InputResult,
    active_input: bool,
    clipboard: Option<Clipboard>,
    uidata: UIData,
    status_message: String,
    last_status_message_update: Instant,
}

impl Model {
    pub fn init(config: &RosterConfig, students: Vec<Student>) -> Self {
        let order = (0..students.len()).collect();
        let mut model = Self {
            status: Status::READY,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            students,
            order,
            sort: SortDirective::none(),
            search_term: String::new(),
            saved_search: String::new(),
            current_page: 1,
            page_size: cmp::max(config.page_size, 1),
            curser_row: 0,
            curser_column: 0,
            edit: None,
            expanded: None,
            input: Inputter::default(),
            input_mode: None,
            last_input: InputResult::default(),
            active_input: false,
            clipboard: None,
            uidata: UIData::empty(),
            status_message: "Started roster!".to_string(),
            last_status_message_update: Instant::now(),
        };
        debug!("Model initialized with {} records", model.students.len());
        model.update_table_data();
        model
    }

    pub fn get_uidata(&self) -> &UIData {
        &self.uidata
    }

    // The help popup also takes key events raw: any key closes it,
    // including keys with no table mapping.
    pub fn raw_keyevents(&self) -> bool {
        self.active_input || self.modus == Modus::POPUP
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    pub fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.last_status_message_update = Instant::now();
        self.uidata.status_message = self.status_message.clone();
        self.uidata.last_status_message_update = self.last_status_message_update;
        self.uidata.last_update = Instant::now();
    }

    pub fn update(&mut self, message: Message) -> Result<(), RosterError> {
        trace!("Update: Modus {:?}, Message {:?}", self.modus, message);
        match self.modus {
            Modus::TABLE => match message {
                Message::Quit => self.quit(),
                Message::MoveUp => self.move_selection_up(),
                Message::MoveDown => self.move_selection_down(),
                Message::NextColumn => self.move_column(1),
                Message::PreviousColumn => self.move_column(-1),
                Message::NextPage => self.set_page(self.current_page + 1),
                Message::PreviousPage => self.set_page(self.current_page.saturating_sub(1)),
                Message::GotoPage(page) => self.set_page(page),
                Message::ToggleSort => self.toggle_sort(),
                Message::Search => self.enter_search(),
                Message::ClearSearch => self.apply_search(String::new()),
                Message::EditCell => self.begin_edit(),
                Message::ToggleDetails => self.toggle_details(),
                Message::Export => self.export(),
                Message::Help => self.show_help(),
                // There is no exit from the table, only quit
                Message::Exit => (),
                Message::RawKey(_) => (),
            },
            Modus::INPUT => {
                if let Message::RawKey(key) = message {
                    self.raw_input(key);
                }
            }
            // Any key closes the help popup.
            Modus::POPUP => self.close_popup(),
        }
        Ok(())
    }

    // ----------------- Derivation pipeline (sort -> filter -> page) ----------------- //

    // Pure view over the working order; the collection itself is untouched.
    fn filtered_rows(&self) -> Vec<usize> {
        if self.search_term.is_empty() {
            return self.order.clone();
        }
        let term = self.search_term.to_lowercase();
        self.order
            .par_iter()
            .copied()
            .filter(|&idx| self.students[idx].matches(&term))
            .collect()
    }

    fn page_count(filtered_count: usize, page_size: usize) -> usize {
        filtered_count.div_ceil(page_size)
    }

    // Window indices into the filtered rows. A page pointing past a
    // shrunk filtered set yields an empty window; only a search term
    // change snaps the page back to 1.
    fn page_window(filtered_count: usize, page: usize, page_size: usize) -> (usize, usize) {
        let first = cmp::min((page - 1) * page_size, filtered_count);
        let last = cmp::min(first + page_size, filtered_count);
        (first, last)
    }

    fn update_table_data(&mut self) {
        let filtered = self.filtered_rows();
        let total = filtered.len();
        let total_pages = Self::page_count(total, self.page_size);
        let (first, last) = Self::page_window(total, self.current_page, self.page_size);
        let window = &filtered[first..last];

        self.curser_row = if window.is_empty() {
            0
        } else {
            cmp::min(self.curser_row, window.len() - 1)
        };

        trace!(
            "Table: page {}/{}, window {}..{}, {} of {} records",
            self.current_page,
            total_pages,
            first,
            last,
            window.len(),
            self.students.len()
        );

        let rows = window
            .iter()
            .map(|&idx| {
                let student = &self.students[idx];
                let editing_column = self.edit.as_ref().and_then(|(id, field)| {
                    if id == &student.id {
                        Field::SUMMARY.iter().position(|f| f == field)
                    } else {
                        None
                    }
                });
                RowView {
                    id: student.id.clone(),
                    cells: Field::SUMMARY
                        .iter()
                        .map(|&f| student.field(f).to_string())
                        .collect(),
                    detail: (self.expanded.as_deref() == Some(student.id.as_str()))
                        .then(|| (student.email.clone(), student.last_login.clone())),
                    editing_column,
                }
            })
            .collect();

        let headers = Field::SUMMARY
            .iter()
            .map(|&f| {
                let marker = if self.sort.key == Some(f) {
                    match self.sort.order {
                        SortOrder::ASCENDING => " ↑",
                        SortOrder::DESCENDING => " ↓",
                    }
                } else {
                    " ↕"
                };
                format!("{}{}", f.label(), marker)
            })
            .collect();

        let showing = if total == 0 {
            "Showing 0-0 of 0".to_string()
        } else {
            format!("Showing {}-{} of {}", first + 1, last, total)
        };

        self.uidata = UIData {
            title: "Student Dashboard".to_string(),
            headers,
            rows,
            selected_row: self.curser_row,
            selected_column: self.curser_column,
            current_page: self.current_page,
            total_pages,
            total_filtered: total,
            showing,
            search_term: self.search_term.clone(),
            show_popup: false,
            popup_message: String::new(),
            cmdinput: self.last_input.clone(),
            input_mode: self.input_mode,
            active_input: self.active_input,
            status_message: self.status_message.clone(),
            last_status_message_update: self.last_status_message_update,
            last_update: Instant::now(),
        };
    }

    // Record under the curser, as an index into the canonical collection.
    fn record_under_curser(&self) -> Option<usize> {
        let filtered = self.filtered_rows();
        let (first, last) = Self::page_window(filtered.len(), self.current_page, self.page_size);
        filtered[first..last].get(self.curser_row).copied()
    }

    // -------------------- Control handling functions ---------------------- //

    fn move_selection_up(&mut self) {
        self.curser_row = self.curser_row.saturating_sub(1);
        self.update_table_data();
    }

    fn move_selection_down(&mut self) {
        self.curser_row += 1; // clamped against the window in update_table_data
        self.update_table_data();
    }

    fn move_column(&mut self, step: i32) {
        let ncols = Field::SUMMARY.len() as i32;
        self.curser_column = (self.curser_column as i32 + step).rem_euclid(ncols) as usize;
        self.update_table_data();
    }

    fn set_page(&mut self, page: usize) {
        let total_pages = Self::page_count(self.filtered_rows().len(), self.page_size);
        // Only pages with a button are selectable.
        if page >= 1 && page <= total_pages && page != self.current_page {
            self.current_page = page;
            self.curser_row = 0;
            self.update_table_data();
        }
    }

    fn toggle_sort(&mut self) {
        self.sort_by(Field::SUMMARY[self.curser_column]);
    }

    // Rewrites the working order in place (stable), so filter and
    // pagination keep seeing the sorted order afterwards. Edit and
    // expansion overlays are keyed by id and survive unchanged.
    fn sort_by(&mut self, key: Field) {
        self.sort = self.sort.toggled(key);
        let reverse = self.sort.order == SortOrder::DESCENDING;
        let students = &self.students;
        self.order.sort_by(|&a, &b| {
            let ordering = students[a].field(key).cmp(students[b].field(key));
            if reverse { ordering.reverse() } else { ordering }
        });
        trace!("Sorted by {:?} ({:?})", key, self.sort.order);
        self.update_table_data();
    }

    fn enter_search(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::INPUT;
        self.input_mode = Some(InputMode::SearchRoster);
        self.active_input = true;
        self.saved_search = self.search_term.clone();
        self.input.seed(&self.search_term);
        self.last_input = self.input.get();
        self.update_table_data();
    }

    fn apply_search(&mut self, term: String) {
        if term != self.search_term {
            trace!("Search term changed to \"{}\"", term);
            self.search_term = term;
            // Required invariant: a term change always snaps back to page 1.
            self.current_page = 1;
            self.curser_row = 0;
        }
        self.update_table_data();
        let matches = self.uidata.total_filtered;
        if self.search_term.is_empty() {
            self.set_status_message(format!("{} records", matches));
        } else {
            self.set_status_message(format!("Found {} matching records", matches));
        }
    }

    fn begin_edit(&mut self) {
        let Some(idx) = self.record_under_curser() else {
            self.set_status_message("Nothing to edit");
            return;
        };
        let field = Field::SUMMARY[self.curser_column];
        let student = &self.students[idx];
        // A new curser implicitly abandons any previous one.
        self.edit = Some((student.id.clone(), field));
        self.input.seed(student.field(field));
        self.last_input = self.input.get();
        self.previous_modus = self.modus;
        self.modus = Modus::INPUT;
        self.input_mode = Some(InputMode::EditCell);
        self.active_input = true;
        self.update_table_data();
    }

    // Write-through: every intermediate value lands in the record as it
    // is typed. No draft buffer, no rollback.
    fn apply_edit(&mut self, value: String) {
        let Some((id, field)) = self.edit.clone() else {
            return;
        };
        if let Some(student) = self.students.iter_mut().find(|s| s.id == id) {
            student.set_field(field, value);
        } else {
            error!("Edit curser points at unknown record id {}!", id);
        }
        self.update_table_data();
    }

    fn raw_input(&mut self, key: KeyEvent) {
        if !self.active_input {
            return;
        }
        self.last_input = self.input.read(key);
        let result = self.last_input.clone();
        if result.finished {
            if !result.canceled {
                self.apply_input_value(result.input);
            } else if self.input_mode == Some(InputMode::SearchRoster) {
                // A canceled search restores the term that was in
                // effect before the search box opened. Canceled edits
                // keep whatever was already written through.
                let saved = self.saved_search.clone();
                self.apply_search(saved);
            }
            self.close_input();
        } else {
            self.apply_input_value(result.input);
        }
    }

    fn apply_input_value(&mut self, value: String) {
        match self.input_mode {
            Some(InputMode::SearchRoster) => self.apply_search(value),
            Some(InputMode::EditCell) => self.apply_edit(value),
            None => (),
        }
    }

    // Losing focus ends the edit; applied values stay.
    fn close_input(&mut self) {
        self.active_input = false;
        self.input_mode = None;
        self.edit = None;
        self.modus = Modus::TABLE;
        self.input.clear();
        self.last_input = InputResult::default();
        self.update_table_data();
    }

    fn toggle_details(&mut self) {
        let Some(idx) = self.record_under_curser() else {
            return;
        };
        let id = self.students[idx].id.clone();
        self.toggle_expansion(&id);
    }

    // Singleton expansion: opening a record closes whatever was open.
    fn toggle_expansion(&mut self, id: &str) {
        if self.expanded.as_deref() == Some(id) {
            self.expanded = None;
        } else {
            self.expanded = Some(id.to_string());
        }
        self.update_table_data();
    }

    fn show_help(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::POPUP;
        self.uidata.popup_message = HELP_TEXT.to_string();
        self.uidata.show_popup = true;
        self.uidata.last_update = Instant::now();
    }

    fn close_popup(&mut self) {
        self.modus = self.previous_modus;
        self.previous_modus = Modus::POPUP;
        self.uidata.show_popup = false;
        self.uidata.last_update = Instant::now();
    }

    // ----------------------------- Export ----------------------------- //

    // The record sink: the current filtered and sorted view, all fields,
    // as CSV. Pagination is a render concern and not part of the export.
    pub fn export_csv(&self) -> String {
        let mut lines = Vec::with_capacity(self.students.len() + 1);
        lines.push(
            Field::ALL
                .iter()
                .map(|f| Self::wrap_cell_content(f.label()))
                .collect::<Vec<String>>()
                .join(","),
        );
        for idx in self.filtered_rows() {
            let student = &self.students[idx];
            lines.push(
                Field::ALL
                    .iter()
                    .map(|&f| Self::wrap_cell_content(student.field(f)))
                    .collect::<Vec<String>>()
                    .join(","),
            );
        }
        lines.join("\n")
    }

    fn wrap_cell_content(c: &str) -> String {
        let needs_escaping = c.chars().any(|c| c == '"');
        let needs_wrapping = c.chars().any(|c| c == ' ' || c == '\t' || c == ',');
        let mut out = String::from(c);

        if needs_escaping {
            out = out.replace("\"", "\"\"");
        }
        if needs_wrapping || needs_escaping {
            out = format!("\"{out}\"");
        }
        out
    }

    fn export(&mut self) {
        let csv = self.export_csv();
        let nrecords = self.filtered_rows().len();
        if self.clipboard.is_none() {
            self.clipboard = Clipboard::new()
                .map_err(|e| error!("Error opening clipboard: {:?}", e))
                .ok();
        }
        match self.clipboard.as_mut().map(|cb| cb.set_text(csv)) {
            Some(Ok(())) => {
                trace!("Copied table content to clipboard.");
                self.set_status_message(format!("Exported {} records to clipboard", nrecords));
            }
            Some(Err(e)) => {
                error!("Error copying to clipboard: {:?}", e);
                self.set_status_message("Export failed, clipboard unavailable");
            }
            None => self.set_status_message("Export failed, clipboard unavailable"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::fixture_roster;
    use ratatui::crossterm::event::KeyCode;

    fn test_model() -> Model {
        Model::init(&RosterConfig::default(), fixture_roster())
    }

    fn visible_cells(model: &Model, column: usize) -> Vec<String> {
        model
            .get_uidata()
            .rows
            .iter()
            .map(|r| r.cells[column].clone())
            .collect()
    }

    fn filtered_ids(model: &Model) -> Vec<String> {
        model
            .filtered_rows()
            .iter()
            .map(|&idx| model.students[idx].id.clone())
            .collect()
    }

    fn press(model: &mut Model, code: KeyCode) {
        model
            .update(Message::RawKey(KeyEvent::from(code)))
            .unwrap();
    }

    #[test]
    fn sort_toggling_cycles_through_directions() {
        let mut model = test_model();
        model.sort_by(Field::Name);
        let ascending = filtered_ids(&model);
        model.sort_by(Field::Name);
        let descending = filtered_ids(&model);
        model.sort_by(Field::Name);
        let ascending_again = filtered_ids(&model);

        let mut reversed = ascending.clone();
        reversed.reverse();
        assert_eq!(descending, reversed);
        assert_eq!(ascending_again, ascending);
        assert_eq!(model.sort.order, SortOrder::ASCENDING);
    }

    #[test]
    fn sorting_a_new_key_resets_to_ascending() {
        let mut model = test_model();
        model.sort_by(Field::Grade);
        model.sort_by(Field::Grade);
        assert_eq!(model.sort.order, SortOrder::DESCENDING);

        model.sort_by(Field::Name);
        assert_eq!(model.sort.key, Some(Field::Name));
        assert_eq!(model.sort.order, SortOrder::ASCENDING);
        let names = filtered_ids(&model)
            .iter()
            .map(|id| {
                model
                    .students
                    .iter()
                    .find(|s| &s.id == id)
                    .unwrap()
                    .name
                    .clone()
            })
            .collect::<Vec<String>>();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[test]
    fn filter_matches_any_field_case_insensitively() {
        let mut model = test_model();
        model.apply_search("CIVICS".to_string());
        assert_eq!(filtered_ids(&model), vec!["002", "006"]);

        // "st123" hits the studentId of every fixture record
        model.apply_search("st123".to_string());
        assert_eq!(filtered_ids(&model).len(), 8);
    }

    #[test]
    fn empty_term_returns_full_collection_in_working_order() {
        let mut model = test_model();
        model.sort_by(Field::Grade);
        let sorted = filtered_ids(&model);
        model.apply_search(String::new());
        assert_eq!(filtered_ids(&model), sorted);
    }

    #[test]
    fn filtering_is_a_pure_view() {
        let mut model = test_model();
        let before = model.students.clone();
        let order_before = model.order.clone();
        model.apply_search("civics".to_string());
        assert_eq!(model.students, before);
        assert_eq!(model.order, order_before);
    }

    #[test]
    fn pagination_partitions_the_filtered_collection() {
        let mut model = test_model();
        let filtered = filtered_ids(&model);
        let total_pages = Model::page_count(filtered.len(), model.page_size);
        assert_eq!(total_pages, 2);

        let mut reconstructed = Vec::new();
        for page in 1..=total_pages {
            model.current_page = page;
            model.update_table_data();
            for row in &model.get_uidata().rows {
                reconstructed.push(row.id.clone());
            }
        }
        assert_eq!(reconstructed, filtered);
    }

    #[test]
    fn page_window_matches_the_contract() {
        assert_eq!(Model::page_window(8, 1, 5), (0, 5));
        assert_eq!(Model::page_window(8, 2, 5), (5, 8));
        // A stale page into a shrunk filtered set shows an empty window
        assert_eq!(Model::page_window(3, 2, 5), (3, 3));
        assert_eq!(Model::page_window(0, 1, 5), (0, 0));
    }

    #[test]
    fn search_change_resets_the_page() {
        let mut model = test_model();
        model.set_page(2);
        assert_eq!(model.current_page, 2);
        model.apply_search("a".to_string());
        assert_eq!(model.current_page, 1);
        // Re-applying the identical term is not a change
        model.set_page(2);
        model.apply_search("a".to_string());
        assert_eq!(model.current_page, 2);
    }

    #[test]
    fn sorting_does_not_reset_the_page() {
        let mut model = test_model();
        model.set_page(2);
        model.sort_by(Field::Name);
        assert_eq!(model.current_page, 2);
    }

    #[test]
    fn goto_page_ignores_pages_without_a_button() {
        let mut model = test_model();
        model.update(Message::GotoPage(9)).unwrap();
        assert_eq!(model.current_page, 1);
        model.update(Message::GotoPage(2)).unwrap();
        assert_eq!(model.current_page, 2);
    }

    #[test]
    fn editing_is_isolated_to_the_addressed_cell() {
        let mut model = test_model();
        model.sort_by(Field::Grade);
        model.apply_search("example.com".to_string());
        let others_before: Vec<Student> = model
            .students
            .iter()
            .filter(|s| s.id != "002")
            .cloned()
            .collect();
        let sort_before = model.sort;

        model.edit = Some(("002".to_string(), Field::Name));
        model.apply_edit("Bob X".to_string());

        let student = model.students.iter().find(|s| s.id == "002").unwrap();
        assert_eq!(student.name, "Bob X");
        let others_after: Vec<Student> = model
            .students
            .iter()
            .filter(|s| s.id != "002")
            .cloned()
            .collect();
        assert_eq!(others_after, others_before);
        assert_eq!(model.sort, sort_before);
        assert_eq!(model.search_term, "example.com");
    }

    #[test]
    fn overlays_survive_sorting() {
        let mut model = test_model();
        model.toggle_expansion("005");
        model.edit = Some(("003".to_string(), Field::Name));
        model.update(Message::ToggleSort).unwrap();
        assert_eq!(model.expanded.as_deref(), Some("005"));
        assert_eq!(model.edit, Some(("003".to_string(), Field::Name)));
    }

    #[test]
    fn expansion_is_a_singleton() {
        let mut model = test_model();
        model.toggle_expansion("001");
        assert_eq!(model.expanded.as_deref(), Some("001"));
        model.toggle_expansion("002");
        assert_eq!(model.expanded.as_deref(), Some("002"));
        model.toggle_expansion("002");
        assert_eq!(model.expanded, None);
    }

    #[test]
    fn expanded_row_carries_the_detail_fields() {
        let mut model = test_model();
        model.toggle_expansion("001");
        let row = model
            .get_uidata()
            .rows
            .iter()
            .find(|r| r.id == "001")
            .unwrap();
        assert_eq!(
            row.detail,
            Some(("alice@example.com".to_string(), "2024-08-01".to_string()))
        );
        assert!(
            model
                .get_uidata()
                .rows
                .iter()
                .filter(|r| r.detail.is_some())
                .count()
                == 1
        );
    }

    #[test]
    fn live_search_applies_per_keystroke() {
        let mut model = test_model();
        model.set_page(2);
        model.update(Message::Search).unwrap();
        assert!(model.raw_keyevents());

        press(&mut model, KeyCode::Char('c'));
        // The very first keystroke already filtered and reset the page
        assert_eq!(model.current_page, 1);
        for c in "ivics".chars() {
            press(&mut model, KeyCode::Char(c));
        }
        assert_eq!(filtered_ids(&model), vec!["002", "006"]);

        press(&mut model, KeyCode::Enter);
        assert!(!model.raw_keyevents());
        assert_eq!(model.search_term, "civics");
    }

    #[test]
    fn canceled_search_restores_the_previous_term() {
        let mut model = test_model();
        model.apply_search("civics".to_string());
        model.update(Message::Search).unwrap();
        press(&mut model, KeyCode::Backspace);
        press(&mut model, KeyCode::Char('x'));
        press(&mut model, KeyCode::Esc);
        assert_eq!(model.search_term, "civics");
        assert_eq!(filtered_ids(&model), vec!["002", "006"]);
    }

    #[test]
    fn inline_edit_writes_through_on_every_keystroke() {
        let mut model = test_model();
        // Curser on row 1 ("002"), Name column
        model.update(Message::MoveDown).unwrap();
        model.curser_column = 1;
        model.update(Message::EditCell).unwrap();
        assert_eq!(model.edit, Some(("002".to_string(), Field::Name)));

        for _ in 0..5 {
            press(&mut model, KeyCode::Backspace);
        }
        press(&mut model, KeyCode::Char('X'));
        // Intermediate value is already committed to the record
        assert_eq!(
            model.students.iter().find(|s| s.id == "002").unwrap().name,
            "Bob X"
        );

        // Escape drops the focus but never reverts applied values
        press(&mut model, KeyCode::Esc);
        assert_eq!(model.edit, None);
        assert_eq!(
            model.students.iter().find(|s| s.id == "002").unwrap().name,
            "Bob X"
        );
    }

    #[test]
    fn export_reflects_filter_and_sort_but_not_pagination() {
        let mut model = test_model();
        model.sort_by(Field::Name);
        model.sort_by(Field::Name); // descending
        model.apply_search("civics".to_string());
        model.set_page(1);

        let csv = model.export_csv();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Id,\"Student ID\",Name"));
        assert!(lines[1].contains("Fiona Gallagher"));
        assert!(lines[2].contains("Bob Smith"));
    }

    #[test]
    fn csv_cells_are_quoted_and_escaped() {
        assert_eq!(Model::wrap_cell_content("plain"), "plain");
        assert_eq!(Model::wrap_cell_content("US History"), "\"US History\"");
        assert_eq!(Model::wrap_cell_content("a,b"), "\"a,b\"");
        assert_eq!(Model::wrap_cell_content("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn row_curser_never_leaves_the_page_window() {
        let mut model = test_model();
        for _ in 0..10 {
            model.update(Message::MoveDown).unwrap();
        }
        // Page 1 holds 5 rows
        assert_eq!(model.curser_row, 4);
        assert_eq!(model.get_uidata().selected_row, 4);

        // The final page is short, 3 of 8 records
        model.update(Message::NextPage).unwrap();
        for _ in 0..10 {
            model.update(Message::MoveDown).unwrap();
        }
        assert_eq!(model.current_page, 2);
        assert_eq!(model.curser_row, 2);
    }

    #[test]
    fn any_key_closes_the_help_popup() {
        let mut model = test_model();
        model.update(Message::Help).unwrap();
        assert!(model.get_uidata().show_popup);
        // While the popup is open, keys reach the model unmapped
        assert!(model.raw_keyevents());

        press(&mut model, KeyCode::Char('z'));
        assert!(!model.get_uidata().show_popup);
        assert!(!model.raw_keyevents());
        assert_eq!(model.current_page, 1);
    }

    #[test]
    fn help_popup_swallows_table_keys() {
        let mut model = test_model();
        model.update(Message::Help).unwrap();
        assert!(model.get_uidata().show_popup);
        let page_before = model.current_page;
        model.update(Message::NextPage).unwrap();
        assert_eq!(model.current_page, page_before);
        assert!(!model.get_uidata().show_popup);
    }

    // The end-to-end walk from the dashboard reference data.
    #[test]
    fn dashboard_scenario() {
        let mut model = test_model();

        model.sort_by(Field::Grade);
        assert_eq!(visible_cells(&model, 3)[0], "A");

        model.apply_search("civics".to_string());
        assert_eq!(model.current_page, 1);
        let classes = visible_cells(&model, 2);
        assert_eq!(classes, vec!["Civics", "Civics"]);

        model.edit = Some(("002".to_string(), Field::Name));
        model.apply_edit("Bob X".to_string());
        model.edit = None;

        model.apply_search("Bob X".to_string());
        assert_eq!(filtered_ids(&model), vec!["002"]);
    }
}
