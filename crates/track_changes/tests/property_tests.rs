//! Property tests over random editing sequences

mod common;

use common::EditorHarness;
use dom_model::{compare_points, DomPoint, DomRange};
use proptest::prelude::*;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use track_changes::{clean_markup, Classifier, TrackingConfig};

const BASE: &str = "abcdef";

#[derive(Debug, Clone)]
enum Op {
    Type(char),
    Left,
    Right,
    /// Collapse the selection into the nth text node at an offset
    Caret(usize, usize),
    /// Select between two text positions, in either order
    Select(usize, usize, usize, usize),
    /// Switch between authors A and B
    Switch(bool),
}

fn edit_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        prop::char::range('u', 'z').prop_map(Op::Type),
        Just(Op::Left),
        Just(Op::Right),
    ]
}

fn multi_author_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => edit_strategy(),
        1 => (any::<usize>(), any::<usize>()).prop_map(|(n, o)| Op::Caret(n, o)),
        1 => (any::<usize>(), any::<usize>(), any::<usize>(), any::<usize>())
            .prop_map(|(a, x, b, y)| Op::Select(a, x, b, y)),
        1 => any::<bool>().prop_map(Op::Switch),
    ]
}

// =========================================================================
// Markup Builders
// =========================================================================

/// Clean-projection segments: 0 plain, 1 ins, 2 del, 3 image
fn segment_strategy() -> impl Strategy<Value = (u8, String)> {
    (0u8..4, "[a-z]{1,4}")
}

fn build_markup(segments: &[(u8, String)]) -> String {
    let mut body = String::new();
    for (index, (kind, text)) in segments.iter().enumerate() {
        match kind {
            1 => body.push_str(&format!(
                r#"<ins class="ice-ins" data-cid="{}" data-userid="A">{}</ins>"#,
                index + 1,
                text
            )),
            2 => body.push_str(&format!(
                r#"<del class="ice-del" data-cid="{}" data-userid="B">{}</del>"#,
                index + 1,
                text
            )),
            3 => body.push_str(r#"<img src="x"/>"#),
            _ => body.push_str(text),
        }
    }
    format!("<p>{}</p>", body)
}

/// A block: whether it is a two-item list, then its leading text and
/// annotated segments (0 plain, 1/2 ins by A/B, 3/4 del by A/B, 5 image)
type Block = (bool, String, Vec<(u8, String)>);

fn block_strategy() -> impl Strategy<Value = Block> {
    (
        any::<bool>(),
        "[a-e]{1,3}",
        prop::collection::vec((0u8..6, "[f-k]{1,3}"), 0..4),
    )
}

fn build_document(blocks: &[Block]) -> String {
    let mut next_id = 0;
    let mut out = String::new();
    for (is_list, lead, segments) in blocks {
        let mut body = lead.clone();
        for (kind, text) in segments {
            next_id += 1;
            let (tag, class, user) = match kind {
                1 => ("ins", "ice-ins", "A"),
                2 => ("ins", "ice-ins", "B"),
                3 => ("del", "ice-del", "A"),
                4 => ("del", "ice-del", "B"),
                5 => {
                    body.push_str(r#"<img src="x"/>"#);
                    continue;
                }
                _ => {
                    body.push_str(text);
                    continue;
                }
            };
            body.push_str(&format!(
                r#"<{tag} class="{class}" data-cid="{next_id}" data-userid="{user}">{text}</{tag}>"#
            ));
        }
        if *is_list {
            out.push_str(&format!("<ul><li>{}</li><li>yz</li></ul>", body));
        } else {
            out.push_str(&format!("<p>{}</p>", body));
        }
    }
    out
}

// =========================================================================
// Helpers
// =========================================================================

fn apply_ops(harness: &mut EditorHarness, ops: &[Op]) {
    for op in ops {
        match op {
            Op::Type(c) => {
                harness.session.insert_text(&c.to_string()).unwrap();
            }
            Op::Left => {
                harness.session.delete_left().unwrap();
            }
            Op::Right => {
                harness.session.delete_right().unwrap();
            }
            _ => {}
        }
    }
}

/// Point in the nth text node (wrapping), at an offset within its bounds
fn text_point(harness: &EditorHarness, index: usize, offset: usize) -> DomPoint {
    let tree = harness.session.document();
    let texts: Vec<_> = tree
        .descendants(tree.root())
        .into_iter()
        .filter(|n| tree.is_text(*n))
        .collect();
    let node = texts[index % texts.len()];
    DomPoint::new(node, offset % (tree.length(node) + 1))
}

/// Every annotation belongs to a registered group of the same kind, and
/// every registered group still has an annotation
fn assert_groups_consistent(harness: &EditorHarness) -> Result<(), TestCaseError> {
    let session = &harness.session;
    let tree = session.document();
    let classifier = Classifier::new(session.config(), "");
    let mut seen = BTreeSet::new();
    for node in classifier.annotation_nodes(tree) {
        let id = classifier.change_id(tree, node);
        prop_assert!(id.is_some(), "annotation without id in {}", session.content_html());
        let id = id.unwrap();
        let change = session.get_change(id);
        prop_assert!(change.is_ok(), "unregistered group {} in {}", id, session.content_html());
        prop_assert_eq!(Some(change.unwrap().kind), classifier.change_kind(tree, node));
        seen.insert(id);
    }
    let registered: BTreeSet<_> = session.get_changes().keys().copied().collect();
    prop_assert_eq!(registered, seen);
    Ok(())
}

/// Apply one op and check where the visible caret ends up
fn step_and_check(harness: &mut EditorHarness, op: &Op) -> Result<(), TestCaseError> {
    match op {
        Op::Caret(n, o) => {
            let point = text_point(harness, *n, *o);
            harness.session.set_caret(point).unwrap();
            return Ok(());
        }
        Op::Select(a, x, b, y) => {
            let first = text_point(harness, *a, *x);
            let second = text_point(harness, *b, *y);
            let order = compare_points(harness.session.document(), &first, &second);
            let range = match order {
                Some(Ordering::Greater) => DomRange::new(second, first),
                _ => DomRange::new(first, second),
            };
            harness.session.set_selection(range).unwrap();
            return Ok(());
        }
        Op::Switch(to_b) => {
            harness.switch_user(if *to_b { "B" } else { "A" });
            return Ok(());
        }
        _ => {}
    }

    let Some(range) = harness.session.current_range() else {
        return Ok(());
    };
    let collapsed = range.is_collapsed();
    let before = harness.session.visible_text_offset(&range.start());
    apply_ops(harness, std::slice::from_ref(op));
    let Some(after_range) = harness.session.current_range() else {
        return Ok(());
    };
    let after = harness.session.visible_text_offset(&after_range.start());

    match (op, collapsed) {
        (Op::Type(_), _) => prop_assert_eq!(after, before + 1, "typing in {}", harness.session.content_html()),
        (Op::Right, _) | (Op::Left, false) => {
            prop_assert_eq!(after, before, "deleting in {}", harness.session.content_html())
        }
        (Op::Left, true) => prop_assert!(
            after == before || after + 1 == before,
            "backspace moved caret from {} to {} in {}",
            before,
            after,
            harness.session.content_html()
        ),
        _ => {}
    }
    Ok(())
}

/// Visible text once every pending change is rejected
fn rejected_text(markup: &str) -> String {
    let mut harness = EditorHarness::new(markup, "A");
    harness.session.reject_all(None).unwrap();
    harness.visible_text()
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]

    #[test]
    fn test_clean_markup_keeps_all_but_deletions(
        segments in prop::collection::vec(segment_strategy(), 0..6),
    ) {
        let config = TrackingConfig::default();
        let markup = build_markup(&segments);
        let kept: String = segments
            .iter()
            .filter(|(kind, _)| *kind != 2)
            .map(|(kind, text)| if *kind == 3 { r#"<img src="x">"# } else { text.as_str() })
            .collect();

        let once = clean_markup(&markup, &config).unwrap();
        prop_assert_eq!(&once, &format!("<p>{}</p>", kept));
        prop_assert_eq!(clean_markup(&once, &config).unwrap(), once);
    }

    #[test]
    fn test_typing_advances_visible_offset(
        start in 0usize..=BASE.len(),
        typed in "[u-z]{1,6}",
    ) {
        let mut harness = EditorHarness::new("<p>abcdef</p>", "A");
        harness.caret(BASE, start);
        for (count, c) in typed.chars().enumerate() {
            harness.session.insert_text(&c.to_string()).unwrap();
            prop_assert_eq!(harness.caret_offset(), start + count + 1);
        }
        let expected = format!("{}{}{}", &BASE[..start], typed, &BASE[start..]);
        prop_assert_eq!(harness.visible_text(), expected);
        prop_assert_eq!(harness.session.count_changes(None), 1);
    }

    #[test]
    fn test_own_typing_then_backspace_cancels(
        start in 0usize..=BASE.len(),
        typed in "[u-z]{1,6}",
    ) {
        let mut harness = EditorHarness::new("<p>abcdef</p>", "A");
        harness.caret(BASE, start);
        harness.session.insert_text(&typed).unwrap();
        for _ in 0..typed.len() {
            harness.session.delete_left().unwrap();
        }
        prop_assert_eq!(harness.session.content_html(), "<p>abcdef</p>");
        prop_assert!(!harness.session.has_changes());
        prop_assert_eq!(harness.caret_offset(), start);
    }

    #[test]
    fn test_deleting_never_moves_visible_caret_forward(
        start in 0usize..=BASE.len(),
        forward in prop::collection::vec(any::<bool>(), 1..8),
    ) {
        let mut harness = EditorHarness::new("<p>abcdef</p>", "A");
        harness.caret(BASE, start);
        for forward in forward {
            let before = harness.caret_offset();
            if forward {
                harness.session.delete_right().unwrap();
                prop_assert_eq!(harness.caret_offset(), before);
            } else {
                harness.session.delete_left().unwrap();
                prop_assert_eq!(harness.caret_offset(), before.saturating_sub(1));
            }
        }
        assert_groups_consistent(&harness)?;
    }

    #[test]
    fn test_random_edits_keep_groups_consistent_and_reject_restores(
        start in 0usize..=BASE.len(),
        ops in prop::collection::vec(edit_strategy(), 1..16),
    ) {
        let mut harness = EditorHarness::new("<p>abcdef</p>", "A");
        harness.caret(BASE, start);
        apply_ops(&mut harness, &ops);
        assert_groups_consistent(&harness)?;

        harness.session.reject_all(None).unwrap();
        prop_assert_eq!(harness.visible_text(), BASE);
        prop_assert!(!harness.session.has_changes());
    }

    #[test]
    fn test_multi_author_edits_over_annotated_blocks(
        blocks in prop::collection::vec(block_strategy(), 1..4),
        first in any::<usize>(),
        ops in prop::collection::vec(multi_author_strategy(), 1..24),
    ) {
        let markup = build_document(&blocks);
        let baseline = rejected_text(&markup);

        let mut harness = EditorHarness::new(&markup, "A");
        assert_groups_consistent(&harness)?;
        let point = text_point(&harness, first, 0);
        harness.session.set_caret(point).unwrap();

        for op in &ops {
            step_and_check(&mut harness, op)?;
            assert_groups_consistent(&harness)?;
        }

        // Saved markup reads back into the same annotated document
        let saved = harness.session.content_html();
        let reloaded = EditorHarness::new(&saved, "A");
        prop_assert_eq!(reloaded.html(), harness.html());
        prop_assert_eq!(reloaded.session.count_changes(None), harness.session.count_changes(None));

        harness.session.reject_all(None).unwrap();
        prop_assert_eq!(harness.visible_text(), baseline);
        prop_assert!(!harness.session.has_changes());
    }
}
