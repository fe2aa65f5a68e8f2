//! The scrollable window of entries shown under the search field.
//!
//! The view-model owns a contiguous run of materialized entries starting at
//! `top_offset` in the dictionary's active order. The first entry's top edge
//! sits `top_pixel_offset` units above the viewport's top edge. Units are
//! whatever the [`EntryLayout`] measures in: rows for a terminal, pixels for
//! a graphical front-end.

use std::collections::VecDeque;
use std::sync::Arc;

use log::trace;

use crate::dictionary::Dictionary;
use crate::format::entry::{DecodedEntry, EntryField, FieldType};

#[cfg(test)]
mod tests;

/// Shown in place of an entry that has nothing renderable.
pub const NO_USABLE_FIELD: &str = "<no usable field found>";

/// Viewport dimensions in layout units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: i32,
    pub height: i32,
}

impl Viewport {
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
        }
    }
}

/// Turns an entry's definitions into display lines for a given width.
pub trait EntryLayout: Send {
    fn layout(&self, definitions: &[String], width: i32) -> Vec<String>;

    /// Height of one line, in the units of [`Viewport`].
    fn line_height(&self) -> i32 {
        1
    }
}

/// Character-cell layout: each definition line is hard-wrapped to the width.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalLayout;

impl EntryLayout for TerminalLayout {
    fn layout(&self, definitions: &[String], width: i32) -> Vec<String> {
        let width = width.max(1) as usize;
        let mut lines = Vec::new();
        for line in definitions.iter().flat_map(|d| d.split('\n')) {
            let chars: Vec<char> = line.chars().collect();
            if chars.is_empty() {
                lines.push(String::new());
                continue;
            }
            for piece in chars.chunks(width) {
                lines.push(piece.iter().collect());
            }
        }
        lines
    }
}

/// One dictionary entry laid out for the current viewport.
#[derive(Debug, Clone)]
pub struct ViewEntry {
    /// Position in the dictionary's active order.
    pub offset: u32,
    /// Headword, followed by ` /phonetic/` when the entry has one.
    pub word: String,
    /// Bytes of `word` matching the search input.
    pub matched_prefix: usize,
    pub definitions: Vec<String>,
    pub lines: Vec<String>,
    /// Decoded fields; empty when the entry could not be decoded.
    pub fields: DecodedEntry,
    height: i32,
}

impl ViewEntry {
    pub fn height(&self) -> i32 {
        self.height
    }
}

/// A single visible line.
#[derive(Debug, Clone, Copy)]
pub struct ViewRow<'a> {
    pub entry: &'a ViewEntry,
    /// Line within `entry.lines`.
    pub line: usize,
}

impl<'a> ViewRow<'a> {
    /// The headword on an entry's first line, nothing on the others.
    pub fn word(&self) -> Option<&'a str> {
        (self.line == 0).then_some(self.entry.word.as_str())
    }

    pub fn text(&self) -> &'a str {
        self.entry.lines.get(self.line).map_or("", String::as_str)
    }
}

fn decode_entities(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let entity = [
            ("&lt;", '<'),
            ("&gt;", '>'),
            ("&amp;", '&'),
            ("&quot;", '"'),
            ("&apos;", '\''),
        ]
        .into_iter()
        .find(|(name, _)| rest.starts_with(name));
        match entity {
            Some((name, c)) => {
                out.push(c);
                rest = &rest[name.len()..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Remove markup tags, turning `<br>` into a line break, then decode the
/// predefined XML entities.
fn strip_markup(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(open) = rest.find('<') {
        out.push_str(&rest[..open]);
        match rest[open..].find('>') {
            Some(close) => {
                let tag = rest[open + 1..open + close].trim().to_ascii_lowercase();
                if tag == "br" || tag == "br/" || tag == "br /" {
                    out.push('\n');
                }
                rest = &rest[open + close + 1..];
            }
            None => {
                rest = &rest[open..];
                break;
            }
        }
    }
    out.push_str(rest);
    decode_entities(&out)
}

/// Plain-text rendering of one field, or `None` for fields that are not
/// shown as definition text (phonetics, binary and unknown types).
pub fn render_field_text(kind: u8, data: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(data);
    let rendered = match FieldType::from_byte(kind) {
        FieldType::Meaning
        | FieldType::LocaleMeaning
        | FieldType::YinBiaoOrKana
        | FieldType::PowerWord
        | FieldType::MediaWiki
        | FieldType::ResourceList => text.into_owned(),
        FieldType::PangoMarkup | FieldType::Html | FieldType::Xdxf => strip_markup(&text),
        _ => return None,
    };
    let trimmed = rendered.trim_end();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Display word and definition texts for an entry. `None` fields (an entry
/// that failed to decode) and entries with nothing textual both get the
/// placeholder.
pub fn render_entry(name: &str, fields: Option<&[EntryField]>) -> (String, Vec<String>) {
    let mut word = name.to_string();
    let mut definitions = Vec::new();
    for field in fields.unwrap_or_default() {
        if field.field_type() == FieldType::Phonetic {
            let phonetic = String::from_utf8_lossy(&field.data);
            let phonetic = phonetic.trim();
            if !phonetic.is_empty() {
                word.push_str(" /");
                word.push_str(phonetic);
                word.push('/');
            }
            continue;
        }
        if let Some(text) = render_field_text(field.kind, &field.data) {
            definitions.push(text);
        }
    }
    if definitions.is_empty() {
        definitions.push(NO_USABLE_FIELD.to_string());
    }
    (word, definitions)
}

/// The visible slice of one dictionary plus the search field above it.
pub struct ViewModel {
    dict: Arc<Dictionary>,
    layout: Box<dyn EntryLayout>,
    viewport: Viewport,
    center_search: bool,
    input: String,
    /// Cursor in characters.
    input_cursor: usize,
    match_offset: u32,
    match_found: bool,
    top_offset: u32,
    top_pixel_offset: i32,
    /// Selected row, counted from the top of the viewport.
    selection: u32,
    entries: VecDeque<ViewEntry>,
}

impl ViewModel {
    /// A view on `dict` with an empty search, laid out for a terminal.
    pub fn new(dict: Arc<Dictionary>, viewport: Viewport) -> Self {
        let mut view = Self {
            dict,
            layout: Box::new(TerminalLayout),
            viewport,
            center_search: false,
            input: String::new(),
            input_cursor: 0,
            match_offset: 0,
            match_found: false,
            top_offset: 0,
            top_pixel_offset: 0,
            selection: 0,
            entries: VecDeque::new(),
        };
        view.search_changed();
        view
    }

    pub fn with_layout(mut self, layout: Box<dyn EntryLayout>) -> Self {
        self.layout = layout;
        self.search_changed();
        self
    }

    /// Scroll a third of the viewport up after each search so the match has
    /// context above it. Only dictionaries with a collator are centered.
    pub fn with_center_search(mut self, center: bool) -> Self {
        self.center_search = center;
        self.search_changed();
        self
    }

    pub fn dictionary(&self) -> &Arc<Dictionary> {
        &self.dict
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn input_cursor(&self) -> usize {
        self.input_cursor
    }

    pub fn top_offset(&self) -> u32 {
        self.top_offset
    }

    pub fn top_pixel_offset(&self) -> i32 {
        self.top_pixel_offset
    }

    pub fn selection(&self) -> u32 {
        self.selection
    }

    /// Where the last search landed, and whether it was an exact hit.
    pub fn search_result(&self) -> (u32, bool) {
        (self.match_offset, self.match_found)
    }

    pub fn entries(&self) -> &VecDeque<ViewEntry> {
        &self.entries
    }

    fn line_height(&self) -> i32 {
        self.layout.line_height().max(1)
    }

    fn materialize(&self, offset: u32) -> ViewEntry {
        let name = self.dict.name_at(offset).unwrap_or_default();
        let fields = self.dict.entry_at(offset);
        let (word, definitions) = render_entry(name, fields.as_deref());
        let mut lines = self.layout.layout(&definitions, self.viewport.width);
        if lines.is_empty() {
            lines.push(String::new());
        }
        let height = lines.len() as i32 * self.line_height();
        ViewEntry {
            offset,
            matched_prefix: self.dict.longest_common_prefix(name, &self.input),
            word,
            definitions,
            lines,
            fields: fields.unwrap_or_default(),
            height,
        }
    }

    fn materialized_height(&self) -> i32 {
        self.entries.iter().map(|e| e.height).sum()
    }

    /// Extend the run until it covers the viewport, then drop trailing
    /// entries that start below it.
    fn fill(&mut self) {
        if self.entries.is_empty() && self.top_offset < self.dict.len() {
            let first = self.materialize(self.top_offset);
            self.entries.push_back(first);
        }

        let mut covered = self.materialized_height() - self.top_pixel_offset;
        while covered < self.viewport.height {
            let next = self.top_offset + self.entries.len() as u32;
            if next >= self.dict.len() {
                break;
            }
            let entry = self.materialize(next);
            covered += entry.height;
            self.entries.push_back(entry);
        }

        while self.entries.len() > 1 {
            let last = self.entries.back().map_or(0, |e| e.height);
            let start = self.materialized_height() - last - self.top_pixel_offset;
            if start < self.viewport.height {
                break;
            }
            self.entries.pop_back();
        }
    }

    /// Move the content by `delta` units; positive scrolls towards the end.
    pub fn scroll(&mut self, delta: i32) {
        self.top_pixel_offset = self.top_pixel_offset.saturating_add(delta);

        while self.top_pixel_offset < 0 {
            if self.top_offset == 0 {
                self.top_pixel_offset = 0;
                break;
            }
            self.top_offset -= 1;
            let entry = self.materialize(self.top_offset);
            self.top_pixel_offset += entry.height;
            self.entries.push_front(entry);
        }

        loop {
            if self.entries.is_empty() {
                if self.top_offset >= self.dict.len() {
                    break;
                }
                let entry = self.materialize(self.top_offset);
                self.entries.push_back(entry);
            }
            let first_height = self.entries.front().map_or(0, |e| e.height);
            if self.top_pixel_offset < first_height {
                break;
            }
            if self.top_offset + 1 >= self.dict.len() {
                // the last entry's last line stays at the top
                self.top_pixel_offset = first_height - self.line_height();
                break;
            }
            self.top_pixel_offset -= first_height;
            self.top_offset += 1;
            self.entries.pop_front();
        }
        if self.entries.is_empty() {
            self.top_pixel_offset = 0;
        }

        self.fill();
        self.clamp_selection();
        trace!(
            "scrolled {}: top {} +{}, {} entries",
            delta,
            self.top_offset,
            self.top_pixel_offset,
            self.entries.len()
        );
    }

    /// Move the content by whole lines of the current layout.
    pub fn scroll_lines(&mut self, lines: i32) {
        self.scroll(lines.saturating_mul(self.line_height()));
    }

    /// Re-run the search for the current input.
    fn search_changed(&mut self) {
        let (offset, found) = self.dict.search_offset(&self.input);
        self.match_offset = offset;
        self.match_found = found;
        self.top_offset = offset;
        self.top_pixel_offset = 0;
        self.selection = 0;
        self.entries.clear();
        self.fill();

        let lift = self.viewport.height / 3;
        if self.center_search && lift > 0 && self.dict.has_collation() {
            self.scroll(-lift);
            // keep the match selected where it now sits
            let above: i32 = self
                .entries
                .iter()
                .take(self.match_offset.saturating_sub(self.top_offset) as usize)
                .map(|e| e.height)
                .sum();
            let y = above - self.top_pixel_offset;
            self.selection = (y / self.line_height()).max(0) as u32;
            self.clamp_selection();
        }
    }

    /// Rows currently on screen, top to bottom.
    pub fn rows(&self) -> Vec<ViewRow<'_>> {
        let visible = self.visible_rows() as usize;
        let skip = (self.top_pixel_offset / self.line_height()).max(0) as usize;
        self.entries
            .iter()
            .flat_map(|entry| (0..entry.lines.len()).map(move |line| ViewRow { entry, line }))
            .skip(skip)
            .take(visible)
            .collect()
    }

    pub fn selected_row(&self) -> Option<ViewRow<'_>> {
        self.rows().into_iter().nth(self.selection as usize)
    }

    fn clamp_selection(&mut self) {
        let rows = self.rows().len() as u32;
        self.selection = self.selection.min(rows.saturating_sub(1));
    }

    fn visible_rows(&self) -> u32 {
        (self.viewport.height / self.line_height()).max(1) as u32
    }

    pub fn select_next(&mut self) {
        let rows = self.rows().len() as u32;
        if self.selection + 1 < rows {
            self.selection += 1;
        } else if rows == self.visible_rows() {
            self.scroll(self.line_height());
        }
    }

    pub fn select_prev(&mut self) {
        if self.selection > 0 {
            self.selection -= 1;
        } else {
            self.scroll(-self.line_height());
        }
    }

    /// Lay every materialized entry out again for `viewport`.
    pub fn resize(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        let offsets: Vec<u32> = self.entries.iter().map(|e| e.offset).collect();
        self.entries = offsets.into_iter().map(|o| self.materialize(o)).collect();
        self.scroll(0);
    }

    /// Show `dict` instead, searching it for the current input.
    pub fn switch_dictionary(&mut self, dict: Arc<Dictionary>) {
        self.dict = dict;
        self.search_changed();
    }

    fn byte_index(&self, chars: usize) -> usize {
        self.input
            .char_indices()
            .nth(chars)
            .map_or(self.input.len(), |(i, _)| i)
    }

    pub fn set_input(&mut self, input: &str) {
        self.input = input.to_string();
        self.input_cursor = self.input.chars().count();
        self.search_changed();
    }

    pub fn insert_char(&mut self, c: char) {
        let at = self.byte_index(self.input_cursor);
        self.input.insert(at, c);
        self.input_cursor += 1;
        self.search_changed();
    }

    pub fn insert_str(&mut self, s: &str) {
        let at = self.byte_index(self.input_cursor);
        self.input.insert_str(at, s);
        self.input_cursor += s.chars().count();
        self.search_changed();
    }

    pub fn backspace(&mut self) {
        if self.input_cursor == 0 {
            return;
        }
        let at = self.byte_index(self.input_cursor - 1);
        self.input.remove(at);
        self.input_cursor -= 1;
        self.search_changed();
    }

    pub fn delete(&mut self) {
        if self.input_cursor >= self.input.chars().count() {
            return;
        }
        let at = self.byte_index(self.input_cursor);
        self.input.remove(at);
        self.search_changed();
    }

    /// Remove the word before the cursor, with any whitespace after it.
    pub fn delete_word(&mut self) {
        let chars: Vec<char> = self.input.chars().collect();
        let mut start = self.input_cursor;
        while start > 0 && chars[start - 1].is_whitespace() {
            start -= 1;
        }
        while start > 0 && !chars[start - 1].is_whitespace() {
            start -= 1;
        }
        if start == self.input_cursor {
            return;
        }
        let (from, to) = (self.byte_index(start), self.byte_index(self.input_cursor));
        self.input.replace_range(from..to, "");
        self.input_cursor = start;
        self.search_changed();
    }

    pub fn clear_input(&mut self) {
        if self.input.is_empty() {
            return;
        }
        self.input.clear();
        self.input_cursor = 0;
        self.search_changed();
    }

    pub fn cursor_left(&mut self) {
        self.input_cursor = self.input_cursor.saturating_sub(1);
    }

    pub fn cursor_right(&mut self) {
        self.input_cursor = (self.input_cursor + 1).min(self.input.chars().count());
    }

    pub fn cursor_home(&mut self) {
        self.input_cursor = 0;
    }

    pub fn cursor_end(&mut self) {
        self.input_cursor = self.input.chars().count();
    }
}
