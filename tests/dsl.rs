//! DSL tests: syntax (parse success/failure) and the model built from it.

use bitstructc::ast::{Action, Declaration, Expr, FieldType, Lvalue, VarType};
use bitstructc::{parse, CompileError};

// ==================== Syntax: valid programs ====================

#[test]
fn parse_empty_specification() {
    let spec = parse("").expect("empty specification can parse");
    assert!(spec.declarations.is_empty());
}

#[test]
fn parse_comments_only() {
    let spec = parse("# nothing here\n   # still nothing\n").expect("parse");
    assert!(spec.declarations.is_empty());
}

#[test]
fn parse_import() {
    let spec = parse("import rt_plus RtPlusApp").expect("parse");
    match &spec.declarations[0] {
        Declaration::Import(i) => {
            assert_eq!(i.module, "rt_plus");
            assert_eq!(i.symbol, "RtPlusApp");
        }
        other => panic!("expected import, got {:?}", other),
    }
}

#[test]
fn parse_struct_fields_and_methods() {
    let src = r#"
struct Station {
	pi: uint<16>
	tp: bool
	ps: str<8>
	odas: map<uint<16>, tag>
	app: RtPlusApp
	addAfPair(af1: uint<8>, af2: uint<8>)
	reset()
}
"#;
    let spec = parse(src).expect("parse");
    let s = spec.structs().next().expect("struct");
    assert_eq!(s.name, "Station");
    assert_eq!(s.fields.len(), 5);
    assert_eq!(
        s.field("pi").map(|f| &f.var_type),
        Some(&VarType::Simple { name: "uint".into(), width: Some(16) })
    );
    assert_eq!(
        s.field("odas").map(|f| f.var_type.to_string()),
        Some("map<uint<16>, tag>".to_string())
    );
    assert_eq!(s.methods.len(), 2);
    assert_eq!(s.method("addAfPair").map(|m| m.params.len()), Some(2));
    assert_eq!(s.method("reset").map(|m| m.params.len()), Some(0));
}

#[test]
fn parse_bitstruct_decls_in_order() {
    let src = r#"
bitstruct group(station: Station) {
	pi: uint<16>
	type: uint<5>
	tp: bool
	seg: byte<2>
	_: unparsed<26>
	odd: thing<3>
}
"#;
    let spec = parse(src).expect("parse");
    let b = spec.get_bitstruct("group").expect("bitstruct");
    assert_eq!(b.arguments.len(), 1);
    assert_eq!(b.arguments[0].name, "station");
    let types: Vec<&FieldType> = b.decls.iter().map(|d| &d.field_type).collect();
    assert_eq!(
        types,
        vec![
            &FieldType::Uint(16),
            &FieldType::Uint(5),
            &FieldType::Bool,
            &FieldType::Byte(2),
            &FieldType::Unparsed(26),
            &FieldType::Unknown("thing<3>".into()),
        ]
    );
    assert!(b.actions.is_empty());
    assert!(b.logs.is_empty());
}

#[test]
fn parse_bitstruct_without_arguments() {
    let spec = parse("bitstruct raw { w: uint<64> }").expect("parse");
    assert!(spec.get_bitstruct("raw").expect("bitstruct").arguments.is_empty());
}

#[test]
fn parse_every_action_kind() {
    let src = r#"
bitstruct g(station: Station) {
	x: uint<64>
} action {
	station.pi = x
	copy station.ps, addr, 2, seg
	put station.odas aid "group_x"
	parse sub lookup(station.app_mapping, type, "group_unknown")
	station.addAfPair(af1, af2)
	station.reset()
	switch variant {
		case 0, 1 { station.tp = tp }
		case 4 { ; }
	}
	;
}
"#;
    let spec = parse(src).expect("parse");
    let actions = &spec.get_bitstruct("g").expect("bitstruct").actions;
    assert_eq!(actions.len(), 8);
    assert!(matches!(actions[0], Action::Assign { .. }));
    match &actions[1] {
        Action::Copy { segment, .. } => assert_eq!(segment, &Expr::Int(2)),
        other => panic!("expected copy, got {:?}", other),
    }
    match &actions[2] {
        Action::Put { value, .. } => assert_eq!(value, &Expr::Str("group_x".into())),
        other => panic!("expected put, got {:?}", other),
    }
    match &actions[3] {
        Action::Parse { label, rule: Expr::Call { function, args } } => {
            assert_eq!(label, "sub");
            assert_eq!(function, "lookup");
            assert_eq!(args.len(), 3);
        }
        other => panic!("expected parse, got {:?}", other),
    }
    match &actions[4] {
        Action::Invoke { object, method, args } => {
            assert_eq!(object, &Lvalue::ident("station"));
            assert_eq!(method, "addAfPair");
            assert_eq!(args.len(), 2);
        }
        other => panic!("expected invocation, got {:?}", other),
    }
    assert!(matches!(&actions[5], Action::Invoke { args, .. } if args.is_empty()));
    match &actions[6] {
        Action::Switch { cases, .. } => {
            assert_eq!(cases.len(), 2);
            assert_eq!(cases[0].labels, vec![0, 1]);
            assert!(matches!(cases[1].actions.as_slice(), [Action::Noop]));
        }
        other => panic!("expected switch, got {:?}", other),
    }
    assert!(matches!(actions[7], Action::Noop));
}

#[test]
fn parse_indexed_lvalue() {
    let src = "bitstruct g(s: Station) { x: uint<64> } action { s.others[pi_on].tp = tp_on }";
    let spec = parse(src).expect("parse");
    match &spec.get_bitstruct("g").expect("bitstruct").actions[0] {
        Action::Assign { target: Lvalue::Field(object, field), .. } => {
            assert_eq!(field, "tp");
            assert!(matches!(**object, Lvalue::Index(..)));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn keyword_prefixed_identifiers_are_plain_names() {
    let src = "bitstruct g(s: Station) { x: uint<64> } action { parsed = copyright putative.x = switched }";
    let spec = parse(src).expect("parse");
    let actions = &spec.get_bitstruct("g").expect("bitstruct").actions;
    assert_eq!(actions.len(), 2);
    assert!(actions.iter().all(|a| matches!(a, Action::Assign { .. })));
}

#[test]
fn parse_log_strings_unescaped() {
    let src = r#"bitstruct g { x: uint<64> } log { "PS \"{x:u}\"" "plain" }"#;
    let spec = parse(src).expect("parse");
    let logs = &spec.get_bitstruct("g").expect("bitstruct").logs;
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0].template, "PS \"{x:u}\"");
}

#[test]
fn parse_log_without_actions() {
    let spec = parse(r#"bitstruct g { x: uint<64> } log { "x" }"#).expect("parse");
    let b = spec.get_bitstruct("g").expect("bitstruct");
    assert!(b.actions.is_empty());
    assert_eq!(b.logs.len(), 1);
}

// ==================== Syntax: invalid programs ====================

fn assert_syntax_error(src: &str) {
    match parse(src) {
        Err(CompileError::Syntax(_)) => {}
        other => panic!("expected a syntax error for {:?}, got {:?}", src, other),
    }
}

#[test]
fn unclosed_bitstruct() {
    assert_syntax_error("bitstruct g { x: uint<64>");
}

#[test]
fn missing_field_type() {
    assert_syntax_error("bitstruct g { x: }");
}

#[test]
fn log_before_action() {
    assert_syntax_error(r#"bitstruct g { x: uint<64> } log { "a" } action { ; }"#);
}

#[test]
fn plain_function_call_is_not_an_action() {
    assert_syntax_error("bitstruct g { x: uint<64> } action { reset(x) }");
}

#[test]
fn switch_needs_cases() {
    assert_syntax_error("bitstruct g { x: uint<64> } action { switch x { } }");
}

#[test]
fn unterminated_string() {
    assert_syntax_error(r#"bitstruct g { x: uint<64> } log { "abc }"#);
}

#[test]
fn integer_overflow_is_rejected() {
    assert_syntax_error("bitstruct g { x: uint<99999999999> }");
}

#[test]
fn methods_before_fields_rejected() {
    assert_syntax_error("struct S { reset() pi: uint<16> }");
}
