use focusboard_core::task::Task;
use focusboard_core::views::{focus_pick, group_by_category};
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::symbols::Marker;
use ratatui::text::{Line, Span};
use ratatui::widgets::canvas::{Canvas, Points};
use ratatui::widgets::{Block, Borders, Clear, Gauge, Paragraph, Wrap};
use ratatui::Frame;

use super::confetti::{Burst, PALETTE};
use super::core::{help_items, ConnectionState, Mode, Model, RewardsState};
use super::editor::tail_fitting;

pub fn draw(frame: &mut Frame<'_>, model: &Model) {
    let area = frame.size();
    frame.render_widget(Clear, area);

    let show_form = matches!(model.mode, Mode::Compose) || model.adding;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(if show_form { 3 } else { 0 }),
            Constraint::Length(1),
        ])
        .split(area);

    draw_header(frame, model, chunks[0]);
    draw_progress(frame, model, chunks[1]);
    draw_focus(frame, model, chunks[2]);
    draw_main(frame, model, chunks[3]);
    if show_form {
        draw_add_form(frame, model, chunks[4]);
    }
    draw_footer(frame, model, chunks[5]);

    if let Some(burst) = model.burst.as_ref() {
        draw_confetti(frame, burst, area);
    }
    if let Some(summary) = model.summary.as_ref() {
        let lines = vec![
            Line::from(Span::styled(
                format!("You completed {} tasks today.", summary.completed),
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(format!(
                "That is about {} minutes of focused work.",
                summary.minutes
            )),
            Line::from(""),
            Line::from(Span::styled(
                "press any key to close",
                Style::default().fg(Color::Gray),
            )),
        ];
        draw_overlay(frame, "Daily summary", Color::Green, lines);
    }
    if let Some(editor) = model.settings.as_ref() {
        let masked: String = "•".repeat(editor.buffer.chars().count());
        let stored = if model.credential_set { "set" } else { "not set" };
        let lines = vec![
            Line::from(vec![
                Span::styled("stored key: ", Style::default().fg(Color::Gray)),
                Span::raw(stored),
            ]),
            Line::from(vec![Span::raw("> "), Span::raw(masked), Span::raw("▏")]),
            Line::from(Span::styled(
                "Enter saves, empty clears, Esc cancels",
                Style::default().fg(Color::Gray),
            )),
        ];
        draw_overlay(frame, "API key", Color::Cyan, lines);
    }
    if let Some(alert) = model.alert.as_ref() {
        let lines = vec![
            Line::from(Span::raw(alert.as_str())),
            Line::from(""),
            Line::from(vec![
                Span::styled("Enter", Style::default().add_modifier(Modifier::BOLD)),
                Span::raw(" dismiss"),
            ]),
        ];
        draw_overlay(frame, "Error", Color::Red, lines);
    }
}

fn draw_header(frame: &mut Frame<'_>, model: &Model, area: Rect) {
    let conn = match model.connection {
        ConnectionState::Static => Span::styled("● ready", Style::default().fg(Color::Green)),
        ConnectionState::Live => Span::styled("● live", Style::default().fg(Color::Green)),
        ConnectionState::Connecting => {
            Span::styled("◌ connecting", Style::default().fg(Color::Yellow))
        }
        ConnectionState::Disconnected => {
            Span::styled("● disconnected", Style::default().fg(Color::Red))
        }
    };

    let mut spans = vec![
        Span::styled("focusboard", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw("  "),
        Span::styled(model.backend.as_str(), Style::default().fg(Color::Gray)),
        Span::raw("  "),
        conn,
        Span::raw("  "),
        Span::styled(
            format!("{} total", model.tasks.len()),
            Style::default().fg(Color::Gray),
        ),
    ];
    if model.loading {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            format!("{} loading", spinner_frame(model.now_ms)),
            Style::default().fg(Color::Yellow),
        ));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn spinner_frame(now_ms: u64) -> &'static str {
    const SPINNER: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
    let idx = ((now_ms / 120) as usize) % SPINNER.len();
    SPINNER[idx]
}

fn draw_progress(frame: &mut Frame<'_>, model: &Model, area: Rect) {
    let progress = model.progress();
    let gauge = Gauge::default()
        .gauge_style(Style::default().fg(Color::Green).bg(Color::DarkGray))
        .percent(u16::from(progress.percent.min(100)))
        .label(format!(
            "{}/{} done · {}%",
            progress.completed, progress.total, progress.percent
        ));
    frame.render_widget(gauge, area);
}

fn draw_focus(frame: &mut Frame<'_>, model: &Model, area: Rect) {
    let block = Block::default()
        .title("Focus")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Magenta));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let line = match focus_pick(model.tasks.as_slice()) {
        Some(task) => Line::from(vec![
            Span::styled("★ ", Style::default().fg(Color::Yellow)),
            Span::styled(task.text(), title_style(task)),
            Span::raw("  "),
            Span::styled(task.category.as_str(), Style::default().fg(Color::Gray)),
        ]),
        None => Line::from(Span::styled(
            "Nothing to focus on yet. Press a to add a task.",
            Style::default().fg(Color::Gray),
        )),
    };
    frame.render_widget(Paragraph::new(line), inner);
}

fn draw_main(frame: &mut Frame<'_>, model: &Model, area: Rect) {
    if matches!(model.rewards, RewardsState::Disabled) {
        draw_tasks(frame, model, area);
        return;
    }

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
        .split(area);
    draw_tasks(frame, model, columns[0]);
    draw_rewards(frame, model, columns[1]);
}

fn draw_tasks(frame: &mut Frame<'_>, model: &Model, area: Rect) {
    let mut block = Block::default().title("Tasks").borders(Borders::ALL);
    if matches!(model.mode, Mode::Normal | Mode::Edit) {
        block = block.border_style(Style::default().fg(Color::Cyan));
    }
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if model.tasks.is_empty() {
        let text = if model.loading {
            "Loading tasks…"
        } else {
            "No tasks yet"
        };
        frame.render_widget(
            Paragraph::new(Line::from(Span::styled(
                text,
                Style::default().fg(Color::Gray),
            ))),
            inner,
        );
        return;
    }

    let mut lines = Vec::new();
    let mut selected_line = 0usize;
    let mut idx = 0usize;
    for group in group_by_category(model.tasks.as_slice()) {
        if !lines.is_empty() {
            lines.push(Line::from(""));
        }
        let noun = if group.tasks.len() == 1 { "item" } else { "items" };
        lines.push(Line::from(vec![
            Span::styled(
                group.category,
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw("  "),
            Span::styled(
                format!("{} {noun}", group.tasks.len()),
                Style::default().fg(Color::Gray),
            ),
        ]));

        for task in group.tasks {
            let selected = idx == model.selected && !matches!(model.mode, Mode::Compose);
            if idx == model.selected {
                selected_line = lines.len();
            }
            let line = if model.is_editing(&task.id) {
                edit_line(model, inner.width as usize)
            } else {
                task_line(model, task, selected)
            };
            lines.push(line);
            idx += 1;
        }
    }

    let height = inner.height as usize;
    let scroll = if height == 0 || selected_line < height {
        0
    } else {
        selected_line + 1 - height
    };
    frame.render_widget(
        Paragraph::new(lines).scroll((scroll.min(u16::MAX as usize) as u16, 0)),
        inner,
    );
}

fn task_line<'a>(model: &Model, task: &'a Task, selected: bool) -> Line<'a> {
    let prefix = if selected { "▶ " } else { "  " };
    let check = if task.done {
        Span::styled("[x]", Style::default().fg(Color::Green))
    } else {
        Span::raw("[ ]")
    };

    let mut spans = vec![Span::raw(prefix), check, Span::raw(" ")];
    spans.push(Span::styled(task.text(), title_style(task)));
    if task.is_focus {
        spans.push(Span::styled(" ★", Style::default().fg(Color::Yellow)));
    }

    if model.completing.contains(&task.id) || model.busy.contains(&task.id) {
        spans.push(Span::raw(" "));
        spans.push(Span::styled(
            spinner_frame(model.now_ms),
            Style::default().fg(Color::Yellow),
        ));
    } else if selected {
        let hint = Style::default().fg(Color::DarkGray);
        spans.push(Span::raw("   "));
        if !task.done {
            spans.push(Span::styled("c complete  ", hint));
        }
        spans.push(Span::styled("e edit  d delete", hint));
    }

    let style = if selected {
        Style::default().bg(Color::DarkGray)
    } else {
        Style::default()
    };
    Line::from(spans).style(style)
}

fn edit_line(model: &Model, width: usize) -> Line<'static> {
    let buffer = model
        .edit
        .as_ref()
        .map(|e| e.editor.buffer.as_str())
        .unwrap_or_default();
    const HINT: &str = "  Enter save · Esc cancel";
    let room = width.saturating_sub(4 + HINT.chars().count()).max(1);
    Line::from(vec![
        Span::styled("✎ ", Style::default().fg(Color::Yellow)),
        Span::styled(
            tail_fitting(buffer, room).to_owned(),
            Style::default().add_modifier(Modifier::UNDERLINED),
        ),
        Span::raw("▏"),
        Span::styled(HINT, Style::default().fg(Color::Gray)),
    ])
}

fn title_style(task: &Task) -> Style {
    if task.done {
        Style::default()
            .fg(Color::Gray)
            .add_modifier(Modifier::CROSSED_OUT)
    } else {
        Style::default()
    }
}

fn draw_rewards(frame: &mut Frame<'_>, model: &Model, area: Rect) {
    let block = Block::default().title("Rewards").borders(Borders::ALL);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let gray = Style::default().fg(Color::Gray);
    let lines: Vec<Line<'_>> = match &model.rewards {
        RewardsState::Disabled => Vec::new(),
        RewardsState::Loading => vec![Line::from(Span::styled("Loading…", gray))],
        RewardsState::Failed(err) => vec![Line::from(Span::styled(
            format!("Unavailable: {err}"),
            Style::default().fg(Color::Red),
        ))],
        RewardsState::Loaded(movies) if movies.is_empty() => {
            vec![Line::from(Span::styled("Nothing playing", gray))]
        }
        RewardsState::Loaded(movies) => movies
            .iter()
            .map(|m| Line::from(Span::raw(m.label())))
            .collect(),
    };
    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }), inner);
}

fn draw_add_form(frame: &mut Frame<'_>, model: &Model, area: Rect) {
    let mut block = Block::default().title("Add task").borders(Borders::ALL);
    if matches!(model.mode, Mode::Compose) {
        block = block.border_style(Style::default().fg(Color::Cyan));
    }
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let category = format!("[{}]", model.form_category());
    let focus = if model.form.is_focus {
        Span::styled("★ focus", Style::default().fg(Color::Yellow))
    } else {
        Span::styled("☆ focus", Style::default().fg(Color::Gray))
    };
    let status = if model.adding {
        Span::styled(
            "  Adding...",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
    } else {
        Span::raw("")
    };

    let fixed = 2 + category.chars().count() + 2 + 8 + 12;
    let room = (inner.width as usize).saturating_sub(fixed).max(1);
    let line = Line::from(vec![
        Span::styled("> ", Style::default().fg(Color::Cyan)),
        Span::raw(model.form.editor.visible_tail(room).to_owned()),
        Span::raw("▏ "),
        Span::styled(category, Style::default().fg(Color::Cyan)),
        Span::raw(" "),
        focus,
        status,
    ]);
    frame.render_widget(Paragraph::new(line), inner);
}

fn draw_footer(frame: &mut Frame<'_>, model: &Model, area: Rect) {
    if let Some(status) = model.status.as_ref() {
        let line = Line::from(Span::styled(
            status.as_str(),
            Style::default().fg(Color::Yellow),
        ));
        frame.render_widget(Paragraph::new(line), area);
        return;
    }

    let items = help_items(model);
    let mut spans = Vec::new();
    for (idx, item) in items.iter().enumerate() {
        if idx > 0 {
            spans.push(Span::raw("  "));
        }
        spans.push(Span::styled(
            item.key,
            Style::default().add_modifier(Modifier::BOLD),
        ));
        spans.push(Span::raw(": "));
        spans.push(Span::styled(item.desc, Style::default().fg(Color::Gray)));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_confetti(frame: &mut Frame<'_>, burst: &Burst, area: Rect) {
    let points = burst.visible_points();
    if points.is_empty() {
        return;
    }

    let canvas = Canvas::default()
        .marker(Marker::Braille)
        .x_bounds([0.0, burst.width])
        .y_bounds([0.0, burst.height])
        .paint(move |ctx| {
            for color in PALETTE {
                let coords: Vec<(f64, f64)> = points
                    .iter()
                    .filter(|(_, _, c)| *c == color)
                    .map(|(x, y, _)| (*x, *y))
                    .collect();
                ctx.draw(&Points {
                    coords: &coords,
                    color,
                });
            }
        });
    frame.render_widget(canvas, area);
}

fn draw_overlay(frame: &mut Frame<'_>, title: &str, accent: Color, lines: Vec<Line<'_>>) {
    let area = frame.size();
    let overlay_width = area.width.min(56).max(area.width.min(30));
    let overlay_height = (lines.len() as u16 + 2).min(area.height);
    let overlay = Rect {
        x: area.x + area.width.saturating_sub(overlay_width) / 2,
        y: area.y + area.height.saturating_sub(overlay_height) / 2,
        width: overlay_width,
        height: overlay_height,
    };

    frame.render_widget(Clear, overlay);

    let block = Block::default()
        .title(title.to_owned())
        .borders(Borders::ALL)
        .border_style(Style::default().fg(accent));
    let inner = block.inner(overlay);
    frame.render_widget(block, overlay);
    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }), inner);
}
