//! Single selection: change protocol, refusals, nesting and path lookup.

mod common;

use rstest::rstest;

use common::{entries, lazy_tree, new_log, record_events, scenario, scenario_blueprint};
use treeview::domain::{Action, Denial, TreeEvent, TreeOptions};

fn changed(events: &[TreeEvent]) -> Vec<TreeEvent> {
    events
        .iter()
        .filter(|e| matches!(e, TreeEvent::SelectionChanged { .. }))
        .cloned()
        .collect()
}

// ============================================================
// Change protocol
// ============================================================

#[test]
fn given_selected_sibling_when_selecting_other_then_one_change_each() {
    let mut s = scenario();
    let events = record_events(&mut s.tree);

    assert!(s.tree.select(s.a1).unwrap());
    assert!(s.tree.select(s.a2).unwrap());

    assert!(!s.tree.is_selected(s.a1));
    assert!(s.tree.is_selected(s.a2));
    assert_eq!(
        changed(&events.borrow()),
        vec![
            TreeEvent::SelectionChanged {
                prior: None,
                current: Some(s.a1)
            },
            TreeEvent::SelectionChanged {
                prior: Some(s.a1),
                current: Some(s.a2)
            },
        ]
    );
    assert_eq!(
        *s.log.borrow(),
        vec!["on_selected:A1", "before_unselect:A1", "on_selected:A2"]
    );
}

#[test]
fn given_already_selected_when_selecting_again_then_nothing_happens() {
    let mut s = scenario();
    s.tree.select(s.a1).unwrap();
    let events = record_events(&mut s.tree);

    assert!(!s.tree.select(s.a1).unwrap());
    assert!(events.borrow().is_empty());
}

#[test]
fn given_listener_cancels_when_selecting_then_canceled_and_unchanged() {
    let mut s = scenario();
    s.tree.select(s.a1).unwrap();
    s.log.borrow_mut().clear();
    s.tree.subscribe(|e| {
        if let TreeEvent::SelectionChanging(change) = e {
            change.cancel();
        }
    });

    assert_eq!(s.tree.select(s.a2).unwrap_err(), Denial::Canceled);

    assert!(s.tree.is_selected(s.a1));
    assert!(s.log.borrow().is_empty());
}

#[test]
fn given_disabled_node_when_selecting_then_disabled() {
    let mut s = scenario();
    s.tree.set_disabled(s.a2, true).unwrap();

    assert_eq!(
        s.tree.select(s.a2).unwrap_err(),
        Denial::Disabled {
            caption: "A2".to_string()
        }
    );
    assert_eq!(s.tree.selected(), None);
}

#[test]
fn given_node_refusing_select_when_selecting_then_refused() {
    let mut s = scenario();
    s.tree.behavior_mut(s.a2).unwrap().refuse_select = true;

    assert_eq!(
        s.tree.select(s.a2).unwrap_err(),
        Denial::Refused {
            caption: "A2".to_string(),
            action: Action::Select
        }
    );
}

#[test]
fn given_selection_refusing_unselect_when_changing_then_kept() {
    let mut s = scenario();
    s.tree.select(s.a1).unwrap();
    s.tree.behavior_mut(s.a1).unwrap().refuse_unselect = true;
    let events = record_events(&mut s.tree);

    let expected = Denial::Unselect {
        caption: "A1".to_string(),
    };
    assert_eq!(s.tree.select(s.a2).unwrap_err(), expected);
    assert_eq!(s.tree.clear_selection().unwrap_err(), expected);

    assert!(s.tree.is_selected(s.a1));
    assert!(events.borrow().is_empty());
}

#[test]
fn given_selection_when_cleared_then_change_to_none() {
    let mut s = scenario();
    s.tree.select(s.a1).unwrap();
    let events = record_events(&mut s.tree);

    assert!(s.tree.clear_selection().unwrap());
    assert!(!s.tree.clear_selection().unwrap());

    assert_eq!(
        changed(&events.borrow()),
        vec![TreeEvent::SelectionChanged {
            prior: Some(s.a1),
            current: None
        }]
    );
}

#[test]
fn given_on_selected_selects_other_when_selecting_then_one_change() {
    let mut s = scenario();
    s.tree.behavior_mut(s.a1).unwrap().select_on_selected = Some("A2".to_string());
    let events = record_events(&mut s.tree);

    s.tree.select(s.a1).unwrap();

    assert!(s.tree.is_selected(s.a2));
    assert!(!s.tree.is_selecting());
    assert_eq!(
        changed(&events.borrow()),
        vec![TreeEvent::SelectionChanged {
            prior: None,
            current: Some(s.a2)
        }]
    );
    let changing = events
        .borrow()
        .iter()
        .filter(|e| matches!(e, TreeEvent::SelectionChanging(_)))
        .count();
    assert_eq!(changing, 2);
}

#[test]
fn given_stale_key_when_selecting_then_not_in_tree() {
    let mut s = scenario();
    s.tree.delete_child(s.a, s.a1).unwrap();
    assert_eq!(s.tree.select(s.a1).unwrap_err(), Denial::NotInTree);
}

// ============================================================
// Expansion and selected path
// ============================================================

#[test]
fn given_expand_on_select_when_selecting_then_ancestors_expand() {
    let mut s = scenario();
    assert!(!s.tree.node(s.a).unwrap().is_expanded());

    s.tree.select(s.a1).unwrap();

    assert!(s.tree.node(s.a).unwrap().is_expanded());
    assert!(s.tree.in_selected_path(s.a));
    assert!(s.tree.in_selected_path(s.root));
    assert!(!s.tree.in_selected_path(s.a2));
}

#[test]
fn given_expand_on_select_disabled_when_selecting_then_container_stays_collapsed() {
    let log = new_log();
    let mut tree = lazy_tree(&log, scenario_blueprint()).with_options(TreeOptions {
        expand_on_select: false,
        ..TreeOptions::default()
    });

    let a1 = tree.select_by_path("/A/A1").unwrap().unwrap();
    let a = tree.node(a1).unwrap().parent().unwrap();

    assert!(!tree.node(a).unwrap().is_expanded());
}

// ============================================================
// Lookup
// ============================================================

#[rstest]
#[case("/A/A1")]
#[case("A/A1")]
#[case("/root/A/A1")]
#[case("/a/a1")]
#[case("//A//A1/")]
fn given_path_variant_when_selecting_by_path_then_finds_node(#[case] path: &str) {
    let mut s = scenario();
    assert_eq!(s.tree.select_by_path(path).unwrap(), Some(s.a1));
    assert!(s.tree.is_selected(s.a1));
}

#[test]
fn given_empty_path_when_resolving_then_root() {
    let mut s = scenario();
    assert_eq!(s.tree.resolve_path(""), Some(s.root));
    assert_eq!(s.tree.resolve_path("/"), Some(s.root));
}

#[test]
fn given_unmatched_path_when_selecting_then_none_and_unchanged() {
    let mut s = scenario();
    s.tree.select(s.a2).unwrap();

    assert_eq!(s.tree.select_by_path("/A/missing").unwrap(), None);
    assert!(s.tree.is_selected(s.a2));
}

#[test]
fn given_case_sensitive_paths_when_case_differs_then_none() {
    let log = new_log();
    let mut tree = lazy_tree(&log, scenario_blueprint()).with_options(TreeOptions {
        case_insensitive_paths: false,
        ..TreeOptions::default()
    });

    assert_eq!(tree.select_by_path("/a/a1").unwrap(), None);
    assert!(tree.select_by_path("/A/A1").unwrap().is_some());
}

#[test]
fn given_unloaded_tree_when_selecting_by_path_then_loads_along_path() {
    let log = new_log();
    let mut tree = lazy_tree(&log, scenario_blueprint());

    let a2 = tree.select_by_path("/A/A2").unwrap().unwrap();

    assert_eq!(tree.node(a2).unwrap().caption(), "A2");
    assert_eq!(entries(&log, "populate"), vec!["populate:Root", "populate:A"]);
}

#[test]
fn given_node_path_when_selecting_it_then_round_trips() {
    let mut s = scenario();
    let path = s.tree.path_of(s.a2).unwrap();
    assert_eq!(s.tree.select_by_path(&path).unwrap(), Some(s.a2));
}

#[test]
fn given_id_and_tag_when_selecting_then_finds_loaded_nodes() {
    let mut s = scenario();
    s.tree.set_tag(s.a, "folder").unwrap();

    assert_eq!(s.tree.select_by_id("A2").unwrap(), Some(s.a2));
    assert_eq!(s.tree.select_by_tag("FOLDER").unwrap(), Some(s.a));
    assert_eq!(s.tree.select_by_id("nope").unwrap(), None);
    assert!(s.tree.is_selected(s.a));
}
