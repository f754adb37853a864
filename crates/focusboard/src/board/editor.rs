use unicode_width::UnicodeWidthStr;

/// Single-line text input with submit history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Editor {
    pub buffer: String,
    pub history: Vec<String>,
    pub history_cursor: Option<usize>,
}

impl Editor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seeded(text: &str) -> Self {
        Self {
            buffer: text.to_owned(),
            ..Self::default()
        }
    }

    pub fn insert_char(&mut self, ch: char) {
        if ch == '\n' || ch == '\r' {
            return;
        }
        self.buffer.push(ch);
        self.history_cursor = None;
    }

    pub fn insert_str(&mut self, text: &str) {
        for ch in text.chars() {
            self.insert_char(ch);
        }
    }

    pub fn backspace(&mut self) {
        self.buffer.pop();
        self.history_cursor = None;
    }

    pub fn history_prev(&mut self) {
        if self.history.is_empty() {
            return;
        }

        let next = match self.history_cursor {
            None => self.history.len().saturating_sub(1),
            Some(idx) => idx.saturating_sub(1),
        };
        self.history_cursor = Some(next);
        self.buffer = self.history[next].clone();
    }

    pub fn history_next(&mut self) {
        let Some(idx) = self.history_cursor else {
            return;
        };

        if idx + 1 >= self.history.len() {
            self.history_cursor = None;
            self.buffer.clear();
            return;
        }

        let next = idx + 1;
        self.history_cursor = Some(next);
        self.buffer = self.history[next].clone();
    }

    /// Records `text` in history and empties the buffer.
    pub fn commit(&mut self, text: &str) {
        self.history_cursor = None;
        self.buffer.clear();
        if self.history.last().map(|h| h.as_str()) != Some(text) {
            self.history.push(text.to_owned());
        }
    }

    /// The visible tail of the buffer when it does not fit in `width` cells.
    pub fn visible_tail(&self, width: usize) -> &str {
        tail_fitting(&self.buffer, width)
    }
}

pub fn tail_fitting(text: &str, width: usize) -> &str {
    if width == 0 {
        return "";
    }
    // One cell is kept for the cursor.
    let budget = width.saturating_sub(1);
    if text.width() <= budget {
        return text;
    }

    let mut used = 0usize;
    let mut start = text.len();
    for (idx, ch) in text.char_indices().rev() {
        let w = unicode_width::UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + w > budget {
            break;
        }
        used += w;
        start = idx;
    }
    &text[start..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn editor_inserts_and_deletes() {
        let mut e = Editor::new();
        e.insert_char('h');
        e.insert_char('i');
        assert_eq!(e.buffer, "hi");
        e.backspace();
        assert_eq!(e.buffer, "h");
    }

    #[test]
    fn newlines_are_dropped() {
        let mut e = Editor::new();
        e.insert_str("a\nb\r");
        assert_eq!(e.buffer, "ab");
    }

    #[test]
    fn history_navigation_cycles_expected() {
        let mut e = Editor::new();
        e.commit("one");
        e.commit("two");
        e.commit("two");
        assert_eq!(e.history.len(), 2);

        e.history_prev();
        assert_eq!(e.buffer, "two");
        e.history_prev();
        assert_eq!(e.buffer, "one");

        e.history_next();
        assert_eq!(e.buffer, "two");
        e.history_next();
        assert_eq!(e.buffer, "");
        assert_eq!(e.history_cursor, None);
    }

    #[test]
    fn tail_fitting_keeps_the_end() {
        assert_eq!(tail_fitting("abcdef", 4), "def");
        assert_eq!(tail_fitting("abc", 10), "abc");
        assert_eq!(tail_fitting("abc", 0), "");
        assert_eq!(tail_fitting("日本語", 5), "本語");
    }
}
