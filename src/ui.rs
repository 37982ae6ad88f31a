use std::time::Duration;

use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    symbols::border,
    text::{Line, Span},
    widgets::{Block, Cell, Clear, Paragraph, Row, Table},
};

use crate::domain::InputMode;
use crate::model::{Model, RowView, UIData};

const STATUS_MESSAGE_TIMEOUT: Duration = Duration::from_secs(5);
const GRADE_COLUMN: usize = 3;

pub struct DashboardUI;

impl DashboardUI {
    pub fn new() -> Self {
        Self
    }

    pub fn draw(&self, model: &Model, frame: &mut Frame) {
        let uidata = model.get_uidata();

        let [search_area, table_area, pager_area, status_area] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .areas(frame.area());

        self.draw_search(uidata, frame, search_area);
        self.draw_table(uidata, frame, table_area);
        self.draw_pager(uidata, frame, pager_area);
        self.draw_status(uidata, frame, status_area);

        if uidata.show_popup {
            self.draw_popup(uidata, frame);
        }
    }

    fn draw_search(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let searching = uidata.active_input && uidata.input_mode == Some(InputMode::SearchRoster);
        let term = if searching {
            &uidata.cmdinput.input
        } else {
            &uidata.search_term
        };
        let mut spans = vec![Span::from(" Search: ")];
        if searching {
            spans.extend(input_spans(term, uidata.cmdinput.curser_pos));
        } else {
            spans.push(Span::from(term.clone()).yellow());
        }
        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }

    fn draw_table(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let header = Row::new(
            uidata
                .headers
                .iter()
                .enumerate()
                .map(|(cidx, h)| {
                    let mut style = Style::new().bold();
                    if cidx == uidata.selected_column {
                        style = style.fg(Color::Magenta);
                    }
                    Cell::from(h.clone()).style(style)
                })
                .collect::<Vec<Cell>>(),
        );

        let mut rows = Vec::with_capacity(uidata.rows.len() * 2);
        for (ridx, row) in uidata.rows.iter().enumerate() {
            rows.push(self.summary_row(uidata, ridx, row));
            if let Some((email, last_login)) = &row.detail {
                rows.push(
                    Row::new(vec![
                        Cell::from(""),
                        Cell::from(format!("Email: {email}")),
                        Cell::from(format!("Last Login: {last_login}")),
                        Cell::from(""),
                    ])
                    .style(Style::new().fg(Color::Gray).italic()),
                );
            }
        }

        let table = Table::new(
            rows,
            [
                Constraint::Length(12),
                Constraint::Fill(2),
                Constraint::Fill(2),
                Constraint::Length(8),
            ],
        )
        .header(header)
        .block(
            Block::bordered()
                .title(Line::from(format!(" {} ", uidata.title).bold()).centered())
                .border_set(border::THICK),
        );
        frame.render_widget(table, area);
    }

    fn summary_row<'a>(&self, uidata: &'a UIData, ridx: usize, row: &'a RowView) -> Row<'a> {
        let selected = ridx == uidata.selected_row;
        let cells = row
            .cells
            .iter()
            .enumerate()
            .map(|(cidx, value)| {
                let mut style = if cidx == GRADE_COLUMN {
                    grade_style(value)
                } else {
                    Style::new()
                };
                if row.editing_column == Some(cidx) {
                    style = style.add_modifier(Modifier::UNDERLINED);
                }
                if selected && cidx == uidata.selected_column {
                    style = style.add_modifier(Modifier::REVERSED);
                }
                Cell::from(value.clone()).style(style)
            })
            .collect::<Vec<Cell>>();
        let mut table_row = Row::new(cells);
        if selected {
            table_row = table_row.style(Style::new().bg(Color::DarkGray));
        }
        table_row
    }

    fn draw_pager(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        // One button per valid page, the current one highlighted
        let mut spans = vec![Span::from(format!(" {} ", uidata.showing))];
        for page in 1..=uidata.total_pages {
            let label = format!(" {page} ");
            if page == uidata.current_page {
                spans.push(Span::from(label).bold().fg(Color::Magenta));
            } else {
                spans.push(Span::from(label));
            }
        }
        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }

    fn draw_status(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let line = if uidata.active_input && uidata.input_mode == Some(InputMode::EditCell) {
            let mut spans = vec![Span::from(" Editing: ").bold()];
            spans.extend(input_spans(
                &uidata.cmdinput.input,
                uidata.cmdinput.curser_pos,
            ));
            Line::from(spans)
        } else if uidata.last_status_message_update.elapsed() < STATUS_MESSAGE_TIMEOUT {
            Line::from(format!(" {}", uidata.status_message))
        } else {
            Line::from(" Press ? for help")
        };
        frame.render_widget(Paragraph::new(line), area);
    }

    fn draw_popup(&self, uidata: &UIData, frame: &mut Frame) {
        let area = centered_rect(frame.area(), 50, 22);
        frame.render_widget(Clear, area);
        frame.render_widget(
            Paragraph::new(uidata.popup_message.clone())
                .block(Block::bordered().title(" Help ".bold()).border_set(border::THICK)),
            area,
        );
    }
}

// Renders the input buffer with the curser glyph at the curser
// position, not tacked onto the end.
fn input_spans(input: &str, curser_pos: usize) -> Vec<Span<'static>> {
    let byte_pos = input
        .char_indices()
        .nth(curser_pos)
        .map(|(byte_idx, _)| byte_idx)
        .unwrap_or(input.len());
    let (before, after) = input.split_at(byte_pos);
    vec![
        Span::from(before.to_string()).yellow(),
        Span::from("█"),
        Span::from(after.to_string()).yellow(),
    ]
}

fn grade_style(grade: &str) -> Style {
    let color = match grade.chars().next() {
        Some('A') => Color::Green,
        Some('B') => Color::Blue,
        Some('C') => Color::Yellow,
        _ => Color::Red,
    };
    Style::new().fg(color)
}

fn centered_rect(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}
