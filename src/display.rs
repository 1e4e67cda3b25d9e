use crossterm::execute;
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen};
use std::io;
use tui::backend::CrosstermBackend;
use tui::layout::{Constraint, Direction, Layout};
use tui::style::{Color, Modifier, Style};
use tui::text::{Span, Spans};
use tui::widgets::{Block, Borders, Paragraph};
use tui::Terminal;

const TAB_STOP: usize = 8;

/// Everything one frame shows.
pub struct View<'a> {
    /// raw serial terminal output
    pub terminal: &'a [u8],
    /// lines scrolled back from the bottom
    pub scroll: usize,
    pub state: &'a str,
    pub status: String,
}

/// Display draws frames on the screen. It should abstract the implementation
/// details, so a variety of kinds of screen would work.
pub trait Display {
    fn draw(&mut self, view: &View) -> Result<(), io::Error>;

    /// rows available for terminal text
    fn text_rows(&self) -> usize;
}

/// Split terminal output into display lines, expanding tabs. Bytes above
/// 0x7f are shown as Latin-1.
pub fn split_lines(text: &[u8]) -> Vec<String> {
    text.split(|b| *b == b'\n')
        .map(|line| {
            let mut out = String::with_capacity(line.len());
            for &b in line {
                if b == b'\t' {
                    let pad = TAB_STOP - out.chars().count() % TAB_STOP;
                    out.extend(std::iter::repeat(' ').take(pad));
                } else {
                    out.push(char::from(b));
                }
            }
            out
        })
        .collect()
}

/// The window of `rows` lines ending `scroll` lines above the bottom. Scroll
/// is clamped so the window never runs off the top.
pub fn visible_lines(lines: &[String], rows: usize, scroll: usize) -> &[String] {
    let max_scroll = lines.len().saturating_sub(rows);
    let end = lines.len() - scroll.min(max_scroll);
    &lines[end.saturating_sub(rows)..end]
}

/// serial terminal plus status bar in a terminal, rendered using TUI and
/// Crossterm
pub struct TermDisplay {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
}

impl TermDisplay {
    pub fn new() -> Result<TermDisplay, io::Error> {
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.hide_cursor()?;
        terminal.clear()?;
        Ok(TermDisplay { terminal })
    }
}

impl Drop for TermDisplay {
    fn drop(&mut self) {
        let _ = self.terminal.show_cursor();
        let _ = execute!(self.terminal.backend_mut(), LeaveAlternateScreen);
    }
}

impl Display for TermDisplay {
    fn draw(&mut self, view: &View) -> Result<(), io::Error> {
        let lines = split_lines(view.terminal);
        self.terminal.draw(|f| {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Min(3), Constraint::Length(1)].as_ref())
                .split(f.size());

            // 2 rows of border
            let rows = usize::from(chunks[0].height.saturating_sub(2));
            let text: Vec<Spans> = visible_lines(&lines, rows, view.scroll)
                .iter()
                .map(|l| Spans::from(l.as_str()))
                .collect();
            let title = if view.scroll > 0 {
                format!("Serial Terminal [-{}]", view.scroll)
            } else {
                "Serial Terminal".to_string()
            };
            let terminal = Paragraph::new(text)
                .block(Block::default().title(title).borders(Borders::ALL))
                .style(Style::default().fg(Color::Green).bg(Color::Black));
            f.render_widget(terminal, chunks[0]);

            let status = Paragraph::new(Spans::from(vec![
                Span::styled(
                    format!(" {} ", view.state),
                    Style::default()
                        .fg(Color::Black)
                        .bg(Color::Yellow)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::raw(" "),
                Span::raw(view.status.as_str()),
            ]))
            .style(Style::default().fg(Color::White).bg(Color::DarkGray));
            f.render_widget(status, chunks[1]);
        })?;
        Ok(())
    }

    fn text_rows(&self) -> usize {
        self.terminal
            .size()
            .map_or(0, |r| usize::from(r.height.saturating_sub(3)))
    }
}

/// useful for testing non-display routines
pub struct DummyDisplay {
    pub frames: usize,
    pub last_status: String,
}

impl DummyDisplay {
    pub fn new() -> DummyDisplay {
        DummyDisplay {
            frames: 0,
            last_status: String::new(),
        }
    }
}

impl Default for DummyDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for DummyDisplay {
    fn draw(&mut self, view: &View) -> Result<(), io::Error> {
        self.frames += 1;
        self.last_status = view.status.clone();
        Ok(())
    }

    fn text_rows(&self) -> usize {
        24
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(n: usize) -> Vec<String> {
        (0..n).map(|i| i.to_string()).collect()
    }

    #[test]
    fn test_split_lines() {
        assert_eq!(split_lines(b"OK\nREADY"), vec!["OK", "READY"]);
        assert_eq!(split_lines(b"A\n"), vec!["A", ""]);
    }

    #[test]
    fn test_tabs_expand_to_stops() {
        assert_eq!(split_lines(b"ab\tc"), vec!["ab      c"]);
    }

    #[test]
    fn test_high_bytes_latin1() {
        assert_eq!(split_lines(&[0xe9]), vec!["\u{e9}"]);
    }

    #[test]
    fn test_visible_bottom() {
        let l = lines(10);
        assert_eq!(visible_lines(&l, 3, 0), &l[7..10]);
    }

    #[test]
    fn test_visible_scrolled() {
        let l = lines(10);
        assert_eq!(visible_lines(&l, 3, 2), &l[5..8]);
        // can't scroll past the top
        assert_eq!(visible_lines(&l, 3, 100), &l[0..3]);
    }

    #[test]
    fn test_visible_short_text() {
        let l = lines(2);
        assert_eq!(visible_lines(&l, 5, 1), &l[..]);
    }

    #[test]
    fn test_dummy_counts_frames() -> Result<(), io::Error> {
        let mut d = DummyDisplay::new();
        d.draw(&View {
            terminal: b"",
            scroll: 0,
            state: "RUN",
            status: "ok".into(),
        })?;
        assert_eq!(d.frames, 1);
        assert_eq!(d.last_status, "ok");
        Ok(())
    }
}
