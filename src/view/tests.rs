use std::cmp::Ordering;
use std::path::Path;
use std::sync::Arc;

use super::*;
use crate::format::index::raw_order_cmp;
use crate::format::{DictionaryInfo, EntryField};
use crate::generator::DictionaryWriter;

const FRUITS: &[&str] = &[
    "apple",
    "apricot",
    "banana",
    "blueberry",
    "cherry",
    "date",
    "elderberry",
    "fig",
    "grape",
    "guava",
    "kiwi",
    "lemon",
    "lime",
    "mango",
    "melon",
    "nectarine",
    "olive",
    "orange",
    "papaya",
    "peach",
    "pear",
    "plum",
    "quince",
    "raspberry",
    "red",
    "redcurrant",
    "rhubarb",
    "strawberry",
    "tangerine",
    "watermelon",
];

fn build(dir: &Path, name: &str, words: &[&str]) -> Arc<Dictionary> {
    build_collated(dir, name, words, None)
}

/// Every third entry gets a two-line definition.
fn build_collated(
    dir: &Path,
    name: &str,
    words: &[&str],
    collation: Option<&str>,
) -> Arc<Dictionary> {
    let mut sorted = words.to_vec();
    sorted.sort_by(|a, b| raw_order_cmp(a, b));
    let ifo = dir.join(format!("{}.ifo", name));
    let info = DictionaryInfo {
        book_name: name.to_string(),
        same_type_sequence: Some("m".to_string()),
        collation_locale: collation.map(str::to_string),
        ..Default::default()
    };
    let mut w = DictionaryWriter::new(&ifo, info).unwrap();
    for (i, word) in sorted.iter().enumerate() {
        let def = if i % 3 == 0 {
            format!("{} first\n{} second", word, word)
        } else {
            format!("about {}", word)
        };
        w.push_entry(word, &[EntryField::new(b'm', def)]).unwrap();
    }
    w.finish().unwrap();
    Arc::new(Dictionary::open(&ifo).unwrap())
}

fn fruits() -> (tempfile::TempDir, Arc<Dictionary>) {
    let dir = tempfile::tempdir().unwrap();
    let dict = build(dir.path(), "fruits", FRUITS);
    (dir, dict)
}

/// The same words under English collation; lowercase ASCII keeps the raw
/// offsets.
fn fruits_collated() -> (tempfile::TempDir, Arc<Dictionary>) {
    let dir = tempfile::tempdir().unwrap();
    let dict = build_collated(dir.path(), "fruits-en", FRUITS, Some("en"));
    assert!(dict.has_collation());
    (dir, dict)
}

/// Contiguity, coverage and trailing eviction.
fn assert_window(view: &ViewModel) {
    let entries = view.entries();
    for (i, e) in entries.iter().enumerate() {
        assert_eq!(e.offset, view.top_offset() + i as u32);
    }

    let total: i32 = entries.iter().map(|e| e.height()).sum();
    let covered = total - view.top_pixel_offset();
    let len = view.dictionary().len();
    let reaches_end = entries.back().map_or(true, |e| e.offset + 1 == len);
    assert!(
        covered >= view.viewport().height || reaches_end,
        "covered {} of {}",
        covered,
        view.viewport().height
    );

    if let Some(last) = entries.back() {
        let start = total - last.height() - view.top_pixel_offset();
        assert!(entries.len() == 1 || start < view.viewport().height);
    }
    assert!(view.top_pixel_offset() >= 0);
}

#[test]
fn initial_view_starts_at_the_top_and_fills() {
    let (_dir, dict) = fruits();
    let view = ViewModel::new(dict, Viewport::new(40, 10));
    assert_eq!(view.top_offset(), 0);
    assert_eq!(view.selection(), 0);
    assert_eq!(view.rows().len(), 10);
    assert_eq!(view.rows()[0].word(), Some("apple"));
    assert_eq!(view.rows()[1].word(), None);
    assert_eq!(view.rows()[1].text(), "apple second");
    assert_window(&view);
}

#[test]
fn typing_reissues_the_search() {
    let (_dir, dict) = fruits();
    let mut view = ViewModel::new(Arc::clone(&dict), Viewport::new(40, 8));

    for c in ['r', 'e', 'd'] {
        view.insert_char(c);
        assert_eq!(view.top_offset(), dict.search_offset(view.input()).0);
        assert_window(&view);
    }
    assert_eq!(view.search_result(), (24, true));

    view.backspace();
    assert_eq!(view.input(), "re");
    assert_eq!(view.top_offset(), dict.search_offset("re").0);
    view.backspace();
    assert_eq!(view.input(), "r");
    assert_eq!(view.top_offset(), dict.search_offset("r").0);
    assert_eq!(dict.name_at(view.top_offset()), Some("raspberry"));
    assert_window(&view);
}

#[test]
fn centering_keeps_the_match_selected() {
    let (_dir, dict) = fruits_collated();
    let mut view = ViewModel::new(dict, Viewport::new(40, 9)).with_center_search(true);
    view.set_input("mango");

    assert_eq!(view.search_result(), (13, true));
    assert!(view.top_offset() < 13);
    let row = view.selected_row().unwrap();
    assert_eq!(row.entry.offset, 13);
    assert_eq!(row.line, 0);
    assert_eq!(view.selection(), 3);
    assert_window(&view);
}

#[test]
fn centering_near_the_start_clamps() {
    let (_dir, dict) = fruits_collated();
    let mut view = ViewModel::new(dict, Viewport::new(40, 9)).with_center_search(true);
    view.set_input("apricot");
    assert_eq!(view.top_offset(), 0);
    assert_eq!(view.top_pixel_offset(), 0);
    assert_eq!(view.selected_row().unwrap().entry.offset, 1);
}

#[test]
fn raw_order_dictionaries_are_not_centered() {
    let (_dir, dict) = fruits();
    let mut view = ViewModel::new(dict, Viewport::new(40, 9)).with_center_search(true);
    view.set_input("mango");
    assert_eq!(view.search_result(), (13, true));
    assert_eq!((view.top_offset(), view.top_pixel_offset()), (13, 0));
    assert_eq!(view.selection(), 0);
    assert_eq!(view.selected_row().unwrap().entry.word, "mango");
    assert_window(&view);
}

#[test]
fn centering_can_be_turned_off() {
    let (_dir, dict) = fruits_collated();
    let mut view = ViewModel::new(dict, Viewport::new(40, 9)).with_center_search(false);
    view.set_input("mango");
    assert_eq!((view.top_offset(), view.top_pixel_offset()), (13, 0));
    assert_eq!(view.selection(), 0);
}

/// Twelve units per line, as a pixel renderer would measure.
struct PixelLayout;

impl EntryLayout for PixelLayout {
    fn layout(&self, definitions: &[String], width: i32) -> Vec<String> {
        TerminalLayout.layout(definitions, width)
    }

    fn line_height(&self) -> i32 {
        12
    }
}

#[test]
fn line_scrolls_follow_the_layout() {
    let (_dir, dict) = fruits();
    let mut view =
        ViewModel::new(dict, Viewport::new(40, 60)).with_layout(Box::new(PixelLayout));
    assert_eq!(view.entries()[0].height(), 24);
    assert_eq!(view.rows().len(), 5);

    view.scroll_lines(2);
    assert_eq!((view.top_offset(), view.top_pixel_offset()), (1, 0));
    assert_eq!(view.rows()[0].word(), Some("apricot"));

    view.scroll_lines(-1);
    assert_eq!((view.top_offset(), view.top_pixel_offset()), (0, 12));
    assert_eq!(view.rows()[0].text(), "apple second");
    assert_window(&view);
}

#[test]
fn scrolling_down_then_up_returns() {
    let (_dir, dict) = fruits();
    let mut view = ViewModel::new(dict, Viewport::new(40, 6));
    view.set_input("date");
    let start = (view.top_offset(), view.top_pixel_offset());

    for _ in 0..7 {
        view.scroll(1);
        assert_window(&view);
    }
    assert_ne!((view.top_offset(), view.top_pixel_offset()), start);
    for _ in 0..7 {
        view.scroll(-1);
        assert_window(&view);
    }
    assert_eq!((view.top_offset(), view.top_pixel_offset()), start);

    view.scroll(5);
    view.scroll(-5);
    assert_eq!((view.top_offset(), view.top_pixel_offset()), start);
}

#[test]
fn scrolling_clamps_at_both_ends() {
    let (_dir, dict) = fruits();
    let len = dict.len();
    let mut view = ViewModel::new(dict, Viewport::new(40, 6));

    view.scroll(-100);
    assert_eq!((view.top_offset(), view.top_pixel_offset()), (0, 0));
    assert_window(&view);

    view.scroll(10_000);
    assert_eq!(view.top_offset(), len - 1);
    assert_eq!(view.top_pixel_offset(), 0);
    assert_eq!(view.rows().len(), 1);
    assert_eq!(view.rows()[0].word(), Some("watermelon"));
    assert_window(&view);

    // a two-line entry at the end keeps its last line visible
    let dir = tempfile::tempdir().unwrap();
    let short = build(dir.path(), "short", &["a", "b", "c", "d"]);
    let mut view = ViewModel::new(short, Viewport::new(40, 3));
    view.scroll(50);
    assert_eq!((view.top_offset(), view.top_pixel_offset()), (3, 1));
    assert_eq!(view.rows()[0].text(), "d second");
    view.scroll(i32::MAX);
    assert_eq!((view.top_offset(), view.top_pixel_offset()), (3, 1));
}

#[test]
fn resize_lays_entries_out_again() {
    let (_dir, dict) = fruits();
    let mut view = ViewModel::new(dict, Viewport::new(40, 10));
    let wide: i32 = view.entries().iter().take(3).map(|e| e.height()).sum();

    view.resize(Viewport::new(5, 10));
    let narrow: i32 = view.entries().iter().take(3).map(|e| e.height()).sum();
    assert!(narrow > wide);
    for entry in view.entries() {
        assert!(entry.lines.iter().all(|l| l.chars().count() <= 5));
    }
    assert_window(&view);

    view.resize(Viewport::new(40, 3));
    assert_eq!(view.rows().len(), 3);
    assert_window(&view);
}

#[test]
fn selection_scrolls_one_line_at_the_edges() {
    let (_dir, dict) = fruits();
    let mut view = ViewModel::new(dict, Viewport::new(40, 4));
    for expected in 1..=3 {
        view.select_next();
        assert_eq!(view.selection(), expected);
    }
    assert_eq!(view.top_pixel_offset(), 0);

    view.select_next();
    assert_eq!(view.selection(), 3);
    assert_eq!((view.top_offset(), view.top_pixel_offset()), (0, 1));
    assert_eq!(view.selected_row().unwrap().entry.word, "blueberry");

    for _ in 0..3 {
        view.select_prev();
    }
    assert_eq!(view.selection(), 0);
    view.select_prev();
    assert_eq!((view.top_offset(), view.top_pixel_offset()), (0, 0));
    assert_eq!(view.selected_row().unwrap().text(), "apple first");
}

#[test]
fn selection_does_not_scroll_a_short_list() {
    let dir = tempfile::tempdir().unwrap();
    let dict = build(dir.path(), "tiny", &["b", "c"]);
    let mut view = ViewModel::new(dict, Viewport::new(40, 10));
    assert_eq!(view.rows().len(), 3);
    for _ in 0..5 {
        view.select_next();
    }
    assert_eq!(view.selection(), 2);
    assert_eq!(view.top_offset(), 0);
}

#[test]
fn switching_dictionaries_searches_the_new_one() {
    let dir = tempfile::tempdir().unwrap();
    let first = build(dir.path(), "fruits", FRUITS);
    let second = build(
        dir.path(),
        "vegetables",
        &["artichoke", "bean", "beet", "broccoli", "cabbage", "carrot"],
    );
    let mut view = ViewModel::new(first, Viewport::new(40, 5));
    view.set_input("be");

    view.switch_dictionary(Arc::clone(&second));
    assert!(Arc::ptr_eq(view.dictionary(), &second));
    assert_eq!(view.input(), "be");
    let top = &view.entries()[0];
    assert_eq!(top.word, "bean");
    assert_ne!(second.compare(&top.word, "be"), Ordering::Less);
    assert_window(&view);
}

#[test]
fn matched_prefix_follows_the_input() {
    let (_dir, dict) = fruits();
    let mut view = ViewModel::new(dict, Viewport::new(40, 5));
    view.set_input("app");
    assert_eq!(view.entries()[0].word, "apple");
    assert_eq!(view.entries()[0].matched_prefix, 3);
    assert_eq!(view.entries()[1].matched_prefix, 2);
    assert_eq!(view.entries()[2].matched_prefix, 0);
}

#[test]
fn undecodable_entries_show_a_placeholder() {
    let dir = tempfile::tempdir().unwrap();
    let dict = build(dir.path(), "broken", &["one", "two"]);
    let mut info = dict.info().clone();
    drop(dict);
    // the payload has no NUL for a leading text field
    info.same_type_sequence = Some("mW".to_string());
    std::fs::write(&info.path, info.to_bytes().unwrap()).unwrap();

    let dict = Arc::new(Dictionary::open(&info.path).unwrap());
    assert!(dict.entry_at(0).is_none());
    let view = ViewModel::new(dict, Viewport::new(40, 5));
    assert_eq!(view.entries()[0].definitions, vec![NO_USABLE_FIELD.to_string()]);
    assert!(view.entries()[0].fields.is_empty());
}

#[test]
fn input_editing_works_in_characters() {
    let (_dir, dict) = fruits();
    let mut view = ViewModel::new(dict, Viewport::new(40, 5));

    view.set_input("hello world");
    assert_eq!(view.input_cursor(), 11);
    view.delete_word();
    assert_eq!(view.input(), "hello ");
    assert_eq!(view.input_cursor(), 6);

    view.set_input("\u{17e}lu\u{165}");
    assert_eq!(view.input_cursor(), 4);
    view.cursor_left();
    view.backspace();
    assert_eq!(view.input(), "\u{17e}l\u{165}");
    assert_eq!(view.input_cursor(), 2);
    view.delete();
    assert_eq!(view.input(), "\u{17e}l");
    view.delete();
    assert_eq!(view.input(), "\u{17e}l");

    view.cursor_home();
    view.insert_char('a');
    assert_eq!(view.input(), "a\u{17e}l");
    view.cursor_end();
    view.insert_str("ps");
    assert_eq!(view.input(), "a\u{17e}lps");
    view.cursor_right();
    assert_eq!(view.input_cursor(), 5);

    view.clear_input();
    assert_eq!((view.input(), view.input_cursor()), ("", 0));
    assert_eq!(view.top_offset(), 0);
}

#[test]
fn fields_render_to_plain_text() {
    assert_eq!(
        render_field_text(b'h', b"<b>bold</b> &amp; <i>it</i><br>next"),
        Some("bold & it\nnext".to_string())
    );
    assert_eq!(
        render_field_text(b'g', b"<span foreground=\"red\">x &lt; y</span>"),
        Some("x < y".to_string())
    );
    assert_eq!(render_field_text(b'm', b"plain  \n"), Some("plain".to_string()));
    assert_eq!(render_field_text(b'm', b"   "), None);
    assert_eq!(render_field_text(b'W', b"RIFF"), None);
    assert_eq!(render_field_text(b't', b"t\xc9\x99st"), None);
    assert_eq!(render_field_text(b'#', b"unknown"), None);
}

#[test]
fn phonetics_join_the_headword() {
    let fields = vec![
        EntryField::new(b't', "h\u{259}\u{2c8}lo\u{28a}"),
        EntryField::new(b'm', "a greeting"),
        EntryField::new(b'P', vec![0u8, 1]),
    ];
    let (word, defs) = render_entry("hello", Some(fields.as_slice()));
    assert_eq!(word, "hello /h\u{259}\u{2c8}lo\u{28a}/");
    assert_eq!(defs, vec!["a greeting".to_string()]);

    let (word, defs) = render_entry("bare", None);
    assert_eq!(word, "bare");
    assert_eq!(defs, vec![NO_USABLE_FIELD.to_string()]);
}

#[test]
fn terminal_layout_wraps_by_characters() {
    let lines = TerminalLayout.layout(&["abcdefg".to_string(), "x\n\ny".to_string()], 3);
    assert_eq!(lines, vec!["abc", "def", "g", "x", "", "y"]);
}
