// Terminal rendering of the task list view

use crate::filter::{FilterMode, active_count, filtered_view};
use crate::models::Task;
use colored::{Color, Colorize};
use std::fmt::Write;

/// Colours for one theme
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub text: Color,
    pub muted: Color,
    pub done: Color,
    pub accent: Color,
}

impl Palette {
    pub fn for_theme(dark: bool) -> Self {
        if dark {
            Self {
                text: Color::BrightWhite,
                muted: Color::BrightBlack,
                done: Color::BrightGreen,
                accent: Color::BrightBlue,
            }
        } else {
            Self {
                text: Color::Black,
                muted: Color::BrightBlack,
                done: Color::Green,
                accent: Color::Blue,
            }
        }
    }
}

/// "1 item left", "0 items left", "2 items left"
pub fn items_left_label(count: usize) -> String {
    format!("{} item{} left", count, if count == 1 { "" } else { "s" })
}

/// Render the list under `mode`, followed by the footer
pub fn render(tasks: &[Task], mode: FilterMode, dark: bool) -> String {
    let palette = Palette::for_theme(dark);
    let mut out = String::new();

    if tasks.is_empty() {
        let _ = writeln!(out, "{}", "No todos yet. Add one with `todo add`.".color(palette.muted));
        return out;
    }

    let view = filtered_view(tasks, mode);
    let id_width = view.iter().map(|t| t.id.to_string().len()).max().unwrap_or(0);

    for task in view {
        let line = if task.completed {
            format!(
                "{} {:>width$}  {}",
                "[x]".color(palette.done),
                task.id.to_string().color(palette.muted),
                task.text.color(palette.muted).dimmed().strikethrough(),
                width = id_width
            )
        } else {
            format!(
                "{} {:>width$}  {}",
                "[ ]".color(palette.muted),
                task.id.to_string().color(palette.muted),
                task.text.color(palette.text),
                width = id_width
            )
        };
        let _ = writeln!(out, "{}", line);
    }

    let filters: Vec<String> = FilterMode::ALL_MODES
        .iter()
        .map(|m| {
            if *m == mode {
                format!("[{}]", m.label()).color(palette.accent).bold().to_string()
            } else {
                m.label().color(palette.muted).to_string()
            }
        })
        .collect();

    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{}   {}   {}",
        items_left_label(active_count(tasks)).color(palette.muted),
        filters.join(" "),
        "Clear completed".color(palette.muted)
    );

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: i64, text: &str, completed: bool) -> Task {
        Task {
            id,
            text: text.to_string(),
            completed,
        }
    }

    #[test]
    fn test_items_left_label() {
        assert_eq!(items_left_label(0), "0 items left");
        assert_eq!(items_left_label(1), "1 item left");
        assert_eq!(items_left_label(2), "2 items left");
    }

    #[test]
    fn test_render_empty_list() {
        let out = render(&[], FilterMode::Active, false);
        assert!(out.contains("No todos yet"));
        assert!(!out.contains("left"));
    }

    #[test]
    fn test_render_filtered_view() {
        let tasks = vec![task(1, "Buy milk", false), task(2, "Walk dog", true)];

        let out = render(&tasks, FilterMode::Active, false);
        assert!(out.contains("Buy milk"));
        assert!(!out.contains("Walk dog"));
        assert!(out.contains("1 item left"));
        assert!(out.contains("[Active]"));
        assert!(out.contains("Clear completed"));

        let out = render(&tasks, FilterMode::Completed, true);
        assert!(out.contains("Walk dog"));
        assert!(!out.contains("Buy milk"));
        assert!(out.contains("[Completed]"));
    }

    #[test]
    fn test_render_empty_view_keeps_footer() {
        let tasks = vec![task(1, "Buy milk", false)];
        let out = render(&tasks, FilterMode::Completed, false);
        assert!(!out.contains("Buy milk"));
        assert!(!out.contains("No todos yet"));
        assert!(out.contains("1 item left"));
    }

    #[test]
    fn test_palettes_differ() {
        assert_ne!(Palette::for_theme(true), Palette::for_theme(false));
    }
}
