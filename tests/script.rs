use layerstack::construct::Value;
use layerstack::datatype::{Datum, Decimal};
use layerstack::error::LayersError;
use layerstack::rules::sum;
use layerstack::script::{self, Command, Engine};
use layerstack::stack::LayerStack;

#[test]
fn parses_every_statement_kind() {
    let commands = script::parse(
        r#"
        # a character sheet
        rule hp = sum default 10;
        set hp = 5;
        set name = "Brak ""the Bold""";
        set speed = 1.50;
        set alive = true;
        rule str_bonus = bonus(str) default 0;
        commit "Level up" notes "gained a feat";
        rollback
        "#,
    )
    .expect("parse");
    assert_eq!(
        commands,
        vec![
            Command::Rule {
                key: "hp".into(),
                name: "sum".into(),
                arguments: vec![],
                default: Datum::Int(10)
            },
            Command::Set { key: "hp".into(), value: Datum::Int(5) },
            Command::Set { key: "name".into(), value: Datum::from("Brak \"the Bold\"") },
            Command::Set {
                key: "speed".into(),
                value: Datum::Decimal(Decimal::from_str("1.50").expect("decimal"))
            },
            Command::Set { key: "alive".into(), value: Datum::Bool(true) },
            Command::Rule {
                key: "str_bonus".into(),
                name: "bonus".into(),
                arguments: vec!["str".into()],
                default: Datum::Int(0)
            },
            Command::Commit {
                description: "Level up".into(),
                notes: Some("gained a feat".into())
            },
            Command::Rollback,
        ]
    );
}

#[test]
fn parse_errors_carry_a_position() {
    match script::parse("set hp = 5;\nset = 3;") {
        Err(LayersError::Parse { line, col, .. }) => {
            assert_eq!(line, Some(2));
            assert!(col.is_some());
        }
        other => panic!("expected a parse error, got {:?}", other),
    }
}

#[test]
fn empty_script_has_no_commands() {
    assert!(script::parse("  # nothing here\n").expect("parse").is_empty());
}

#[test]
fn layer_scripts_reject_lifecycle_statements() {
    let engine = Engine::default();
    let mut stack = LayerStack::new([("hp", sum(10))]);
    let result = engine.apply_script(&mut stack.current_mut(), "set hp = 1; commit \"no\"");
    assert!(matches!(result, Err(LayersError::Execution(_))));
    // nothing was applied
    assert!(stack.current().get("hp").map(Value::is_rule).unwrap_or(false));
}

#[test]
fn unknown_rule_fails_the_whole_layer_script() {
    let engine = Engine::default();
    let mut stack = LayerStack::default();
    let result = engine.apply_script(&mut stack.current_mut(), "set a = 1; rule a = median default 0");
    assert!(matches!(result, Err(LayersError::UnknownRule(_))));
    assert!(stack.current().is_empty());
}

#[test]
fn execute_runs_a_session() {
    let engine = Engine::default();
    let mut stack = LayerStack::default();
    let executed = engine
        .execute(
            &mut stack,
            r#"
            rule hp = sum default 10;
            commit "base";
            set hp = 5;
            commit "potion" notes "drank it";
            set hp = 100;
            rollback;
            "#,
        )
        .expect("execute");
    assert_eq!(executed, 6);
    assert_eq!(stack.resolve::<i64>("hp").expect("hp"), 15);
    let potion = stack.layer(1).expect("layer 1");
    assert_eq!(potion.meta().get("description").map(String::as_str), Some("potion"));
    assert_eq!(potion.meta().get("notes").map(String::as_str), Some("drank it"));
}

#[test]
fn recorded_script_replays_into_the_same_layer() {
    let mut stack = LayerStack::default();
    stack
        .current_mut()
        .set("hp", sum(10))
        .set("name", "Brak \"the Bold\"")
        .set("speed", Decimal::from_str("1.5").expect("decimal"))
        .set("alive", false);
    let recorded = stack.current().script();
    assert!(recorded.contains("rule hp = sum default 10;"));

    let mut replayed = LayerStack::default();
    Engine::default()
        .apply_script(&mut replayed.current_mut(), &recorded)
        .expect("replay");
    // rules are rebuilt, so compare what they render to
    assert_eq!(replayed.current().to_diff(), stack.current().to_diff());
    assert_eq!(replayed.current().script(), recorded);
    assert_eq!(replayed.resolve::<i64>("hp").expect("hp"), 10);
}

#[test]
fn commands_render_back_to_source() {
    let text = "commit \"say \"\"hi\"\"\" notes \"n\"";
    let commands = script::parse(text).expect("parse");
    assert_eq!(commands[0].to_source(), text);
    assert!(!commands[0].is_edit());
}

#[test]
fn keywords_need_a_word_boundary() {
    assert!(matches!(script::parse("sethp = 5"), Err(LayersError::Parse { .. })));
    assert!(matches!(
        script::parse("rulestr = last default 1"),
        Err(LayersError::Parse { .. })
    ));
    assert!(matches!(
        script::parse("rule str = last default1"),
        Err(LayersError::Parse { .. })
    ));
    // keywords are fine as keys
    let commands = script::parse("SET set = 1; rollback").expect("parse");
    assert_eq!(
        commands,
        vec![Command::Set { key: "set".into(), value: Datum::Int(1) }, Command::Rollback]
    );
}

#[test]
fn rule_arguments_are_keys() {
    assert!(matches!(
        script::parse("rule b = bonus(\"str\") default 0"),
        Err(LayersError::Parse { .. })
    ));
    assert!(matches!(
        script::parse("rule b = bonus(16) default 0"),
        Err(LayersError::Parse { .. })
    ));
    match script::parse("rule b = bonus( str ) default 0").expect("parse").as_slice() {
        [Command::Rule { arguments, .. }] => assert_eq!(arguments, &vec!["str".to_string()]),
        other => panic!("expected one rule, got {:?}", other),
    }
}

#[test]
fn decimals_render_without_exponents() {
    let big = Datum::Decimal(Decimal::from_str("1e20").expect("decimal"));
    assert_eq!(big.to_source(), "100000000000000000000.0");
    let small = Datum::Decimal(Decimal::from_str("1e-3").expect("decimal"));
    assert_eq!(small.to_source(), "0.001");
    let commands = script::parse(&format!("set big = {}", big.to_source())).expect("parse");
    assert_eq!(commands, vec![Command::Set { key: "big".into(), value: big }]);
}
