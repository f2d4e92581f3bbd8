use layerstack::construct::Value;
use layerstack::datatype::{Datum, Decimal};
use layerstack::error::LayersError;
use layerstack::rules::{bonus, last, sum};
use layerstack::stack::LayerStack;

#[test]
fn topmost_rule_governs_even_below_newer_literals() {
    let mut stack = LayerStack::new([("a", Value::from(last(0)))]);
    stack.commit();
    stack.current_mut().set("a", sum(0));
    stack.commit();
    stack.current_mut().set("a", 7);
    // sum sits in the middle but is still the topmost rule
    assert_eq!(stack.resolve::<i64>("a").expect("resolve"), 7);
}

#[test]
fn rule_sees_every_occurrence_newest_first() {
    let mut stack = LayerStack::new([("k", Value::rule("collect", "seed", |context| {
        let values: Vec<String> = context.values()?;
        Ok(Datum::from(values.join(",")))
    }))]);
    stack.commit();
    stack.current_mut().set("k", "one");
    stack.commit();
    stack.current_mut().set("k", "two");
    stack.commit();
    stack.commit();
    stack.current_mut().set("k", "three");
    assert_eq!(
        stack.resolve::<String>("k").expect("resolve"),
        "three,two,one,seed"
    );
}

#[test]
fn unknown_and_unruled_keys_are_reported() {
    let mut stack = LayerStack::new([("hp", sum(10))]);
    stack.current_mut().set("name", "Brak");
    match stack.resolve::<i64>("mana") {
        Err(LayersError::UnknownKey(key)) => assert_eq!(key, "mana"),
        other => panic!("expected UnknownKey, got {:?}", other),
    }
    match stack.resolve::<String>("name") {
        Err(LayersError::NoRuleDefined(key)) => assert_eq!(key, "name"),
        other => panic!("expected NoRuleDefined, got {:?}", other),
    }
}

#[test]
fn resolve_all_only_covers_keys_with_a_rule() {
    let mut stack = LayerStack::new([("hp", sum(10))]);
    stack.commit();
    stack.current_mut().set("hp", 2).set("name", "Brak");
    let resolved = stack.resolve_all().expect("resolve all");
    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved.get("hp"), Some(&Datum::Int(12)));
    assert!(!resolved.contains_key("name"));
    assert_eq!(stack.current().get("name"), Some(&Value::from("Brak")));
}

#[test]
fn hit_points_follow_commits_and_rollbacks() {
    let mut stack = LayerStack::new([("hp", sum(10))]);
    stack.commit();
    stack.current_mut().set("hp", 5);
    assert_eq!(stack.resolve::<i64>("hp").expect("hp"), 15);
    stack.commit();
    assert_eq!(stack.resolve::<i64>("hp").expect("hp"), 15);
    stack.rollback();
    assert_eq!(stack.resolve::<i64>("hp").expect("hp"), 15);
    stack.rollback();
    assert_eq!(stack.resolve::<i64>("hp").expect("hp"), 10);
}

#[test]
fn bonus_reads_another_key() {
    let mut stack = LayerStack::new([("str", Value::from(last(10))), ("str_bonus", bonus("str", 0).into())]);
    stack.commit();
    stack.current_mut().set("str", 16);
    assert_eq!(stack.resolve::<i64>("str_bonus").expect("bonus"), 3);
    stack.commit();
    stack.current_mut().set("str_bonus", 2);
    assert_eq!(stack.resolve::<i64>("str_bonus").expect("bonus"), 5);
}

#[test]
fn bonus_rounds_odd_and_low_scores_down() {
    let mut stack = LayerStack::new([("dex", Value::from(last(7))), ("dex_bonus", bonus("dex", 0).into())]);
    assert_eq!(stack.resolve::<i64>("dex_bonus").expect("bonus"), -2);
    stack.commit();
    stack.current_mut().set("dex", 15);
    assert_eq!(stack.resolve::<i64>("dex_bonus").expect("bonus"), 2);
}

#[test]
fn self_reference_is_a_cycle() {
    let stack = LayerStack::new([
        ("a", bonus("b", 0)),
        ("b", bonus("a", 0)),
    ]);
    match stack.resolve::<i64>("a") {
        Err(LayersError::CyclicRuleReference { chain }) => {
            assert_eq!(chain, vec!["a".to_string(), "b".to_string(), "a".to_string()]);
        }
        other => panic!("expected CyclicRuleReference, got {:?}", other),
    }
    // a failed resolution leaves nothing behind
    assert!(matches!(
        stack.resolve::<i64>("b"),
        Err(LayersError::CyclicRuleReference { .. })
    ));
}

#[test]
fn asking_for_the_wrong_type_is_a_mismatch() {
    let stack = LayerStack::new([("hp", sum(10))]);
    match stack.resolve::<String>("hp") {
        Err(LayersError::TypeMismatch { key, expected, found }) => {
            assert_eq!(key, "hp");
            assert_eq!(expected, "Text");
            assert_eq!(found, "Int");
        }
        other => panic!("expected TypeMismatch, got {:?}", other),
    }
    // integers widen to decimals
    let hp: Decimal = stack.resolve("hp").expect("decimal");
    assert_eq!(hp, Decimal::from_str("10").expect("decimal"));
}

#[test]
fn resolution_leaves_the_stack_untouched() {
    let mut stack = LayerStack::new([("hp", sum(10))]);
    stack.commit();
    stack.current_mut().set("hp", 5);
    let before = stack.as_list();
    stack.resolve_all().expect("resolve all");
    stack.resolve::<i64>("hp").expect("hp");
    assert_eq!(stack.as_list(), before);
}
