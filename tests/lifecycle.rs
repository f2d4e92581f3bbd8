use layerstack::construct::Value;
use layerstack::datatype::Datum;
use layerstack::error::LayersError;
use layerstack::rules::sum;
use layerstack::stack::{LayerStack, ReseedPolicy};

#[test]
fn commit_opens_an_empty_layer_above() {
    let mut stack = LayerStack::new([("hp", sum(10))]);
    assert_eq!(stack.current().slot(), 0);
    let top = stack.commit();
    assert_eq!(top.slot(), 1);
    assert!(top.is_empty());
    assert_eq!(stack.len(), 2);
}

#[test]
fn rollback_undoes_commit() {
    let mut stack = LayerStack::new([("hp", sum(10))]);
    stack.commit();
    stack.current_mut().set("hp", 3);
    let before = stack.current().clone();
    stack.commit();
    let top = stack.rollback();
    assert_eq!(*top, before);
    assert_eq!(stack.len(), 2);
}

#[test]
fn rollback_of_the_last_layer_reseeds() {
    let mut stack = LayerStack::new([("hp", sum(10))]);
    stack.current_mut().set("mana", 4);
    let top = stack.rollback();
    assert_eq!(top.slot(), 0);
    assert!(top.get("mana").is_none());
    let resolved = stack.resolve_all().expect("resolve all");
    assert_eq!(resolved.get("hp"), Some(&Datum::Int(10)));
}

#[test]
fn rollback_with_empty_policy_leaves_an_empty_layer() {
    let mut stack = LayerStack::with_policy([("hp", sum(10))], ReseedPolicy::Empty);
    assert_eq!(stack.policy(), ReseedPolicy::Empty);
    let top = stack.rollback();
    assert!(top.is_empty());
    assert!(stack.resolve_all().expect("resolve all").is_empty());
}

#[test]
fn reseeding_keeps_the_slot_of_the_discarded_layer() {
    let mut stack = LayerStack::new([("hp", sum(10))]);
    stack.commit();
    stack.commit();
    stack.rollback();
    stack.rollback();
    assert_eq!(stack.current().slot(), 0);
    assert_eq!(stack.rollback().slot(), 0);
    assert_eq!(stack.len(), 1);
    assert!(!stack.is_empty());
}

#[test]
fn only_the_top_layer_can_be_edited() {
    let mut stack = LayerStack::new([("hp", sum(10))]);
    stack.commit();
    stack.commit();
    match stack.editor(1) {
        Err(LayersError::IllegalEdit { slot, top }) => {
            assert_eq!(slot, 1);
            assert_eq!(top, 2);
        }
        other => panic!("expected IllegalEdit, got {:?}", other.map(|editor| editor.slot())),
    }
    stack.editor(2).expect("editor").set("hp", 1);
    assert_eq!(stack.resolve::<i64>("hp").expect("hp"), 11);
}

#[test]
fn set_overwrites_within_the_same_layer_only() {
    let mut stack = LayerStack::new([("hp", sum(10))]);
    stack.commit();
    stack.current_mut().set("hp", 1).set("hp", 4);
    assert_eq!(stack.current().len(), 1);
    assert_eq!(stack.resolve::<i64>("hp").expect("hp"), 14);
    assert_eq!(stack.layer(0).and_then(|layer| layer.get("hp")).map(Value::is_rule), Some(true));
}

#[test]
fn as_list_dumps_raw_layers_bottom_up() {
    let mut stack = LayerStack::new([("hp", sum(10))]);
    stack.commit();
    stack.current_mut().set("hp", 5).set("name", "Brak");
    let list = stack.as_list();
    assert_eq!(list.len(), 2);
    assert!(list[0]["hp"].is_rule());
    assert_eq!(list[1]["hp"], Value::from(5));
    assert_eq!(list[1]["name"], Value::from("Brak"));
}

#[test]
fn diff_shows_the_pending_layer() {
    let mut stack = LayerStack::new([("hp", sum(10))]);
    assert_eq!(stack.diff(), "hp: <rule: sum[=10]>");
    stack.commit();
    assert_eq!(stack.diff(), "");
    stack.current_mut().set("name", "Brak").set("hp", 5);
    assert_eq!(stack.diff(), "hp: 5\nname: Brak");
}

#[test]
fn entries_only_cover_one_layer() {
    let mut stack = LayerStack::new([("hp", sum(10))]);
    stack.commit();
    stack.current_mut().set("mana", 2);
    let keys: Vec<&str> = stack.current().keys().collect();
    assert_eq!(keys, vec!["mana"]);
    // restartable
    assert_eq!(stack.current().entries().count(), 1);
    assert_eq!(stack.current().entries().count(), 1);
}
