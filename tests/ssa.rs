//! SSA construction integration tests.
//!
//! These tests drive the complete pipeline through the public API:
//! 1. Assemble a syntax tree with the `ast` constructors
//! 2. Build it as a `Package` (or several packages as a `Program`)
//! 3. Inspect the resulting graph: phis, block structure, captures and types
//! 4. Check the diagnostics produced under both error policies

use std::sync::Arc;

use yakssa::{
    ast::{
        BinaryOp, Expr, ForStmt, FunctionLit, IfStmt, RangeStmt, SourceFile, Stmt, StmtKind,
        SwitchCase, SwitchStmt, TryStmt,
    },
    ssa::{BuildState, Const, Function, Graph, ObjectKind, Op, Opcode, ValueId},
    BuildConfig, Error, EventKind, Package, Program, Result,
};

/// Build a package from statements with the default configuration.
fn build(name: &str, body: Vec<Stmt>) -> Package {
    build_with(name, body, BuildConfig::default())
}

/// Build a package from statements, ignoring the build result.
fn build_with(name: &str, body: Vec<Stmt>, config: BuildConfig) -> Package {
    let package = Package::with_config(name, Arc::new(SourceFile::new(name, body)), config);
    let _ = package.build();
    package
}

fn main_of(graph: &Graph) -> Result<&Function> {
    graph
        .main()
        .ok_or_else(|| Error::SsaError("main function missing".to_string()))
}

/// The integer constant behind `value`, if it is one.
fn int_constant(graph: &Graph, value: ValueId) -> Option<i64> {
    match graph.defining_instruction(value)?.op() {
        Op::Const(Const::Int(value)) => Some(*value),
        _ => None,
    }
}

/// The first value of `function` bound to `name`.
fn named(function: &Function, name: &str) -> Option<ValueId> {
    function
        .values()
        .iter()
        .find(|value| value.variable() == Some(name))
        .map(|value| value.id())
}

fn count_opcode(function: &Function, opcode: Opcode) -> usize {
    function
        .instructions()
        .iter()
        .filter(|instr| instr.block().is_some() && instr.opcode() == opcode)
        .count()
}

#[test]
fn test_ssa_straight_line() -> Result<()> {
    // x = 1; y = x + 2
    let package = build(
        "straight",
        vec![
            Stmt::assign("x", Expr::int(1)),
            Stmt::assign("y", Expr::binary(BinaryOp::Add, Expr::ident("x"), Expr::int(2))),
        ],
    );
    let graph = package.build()?;
    let main = main_of(graph)?;

    assert_eq!(main.blocks().len(), 1, "Expected a single block");
    assert_eq!(main.phis().count(), 0, "No phi nodes expected");
    assert_eq!(count_opcode(main, Opcode::BinOp), 1);
    assert!(package.diagnostics().is_empty());

    Ok(())
}

#[test]
fn test_ssa_diamond_merges_in_predecessor_order() -> Result<()> {
    // c = true; x = 1; if c { x = 2 } else { x = 3 }; y = x
    let package = build(
        "diamond",
        vec![
            Stmt::assign("c", Expr::bool(true)),
            Stmt::assign("x", Expr::int(1)),
            IfStmt::new(Expr::ident("c"), vec![Stmt::assign("x", Expr::int(2))])
                .otherwise(vec![Stmt::assign("x", Expr::int(3))])
                .into(),
            Stmt::assign("y", Expr::ident("x")),
        ],
    );
    let graph = package.build()?;
    let main = main_of(graph)?;

    assert_eq!(main.phis().count(), 1, "Expected one phi at the merge point");
    let phi = main
        .phis()
        .next()
        .and_then(|instr| instr.result())
        .expect("phi has a result");

    let operands: Vec<Option<i64>> = graph
        .phi_operands(phi)
        .iter()
        .map(|edge| int_constant(graph, edge.value))
        .collect();
    assert_eq!(operands, vec![Some(2), Some(3)]);

    // the operands follow the predecessor list of the merge block
    let block = graph
        .defining_instruction(phi)
        .and_then(|instr| instr.block())
        .and_then(|block| main.block(block))
        .expect("phi lives in a block");
    let preds: Vec<_> = graph.phi_operands(phi).iter().map(|edge| edge.predecessor).collect();
    assert_eq!(preds.as_slice(), block.preds());

    Ok(())
}

#[test]
fn test_ssa_untouched_variable_needs_no_phi() -> Result<()> {
    // x = 1; if c { y = 2 }; z = x
    let package = build(
        "untouched",
        vec![
            Stmt::assign("c", Expr::bool(false)),
            Stmt::assign("x", Expr::int(1)),
            IfStmt::new(Expr::ident("c"), vec![Stmt::assign("y", Expr::int(2))]).into(),
            Stmt::assign("z", Expr::ident("x")),
        ],
    );
    let graph = package.build()?;
    let main = main_of(graph)?;

    assert_eq!(main.phis().count(), 0);
    let x = named(main, "x").expect("x is bound");
    assert_eq!(int_constant(graph, x), Some(1));

    Ok(())
}

#[test]
fn test_ssa_counting_loop() -> Result<()> {
    // for i = 0; i < 10; i++ { }
    let package = build(
        "loop",
        vec![ForStmt::new(vec![])
            .init(Stmt::assign("i", Expr::int(0)))
            .cond(Expr::binary(BinaryOp::Lt, Expr::ident("i"), Expr::int(10)))
            .step(Stmt::inc("i"))
            .into()],
    );
    let graph = package.build()?;
    let main = main_of(graph)?;

    assert_eq!(main.phis().count(), 1, "Expected one phi for the induction variable");
    let phi = main.phis().next().expect("loop phi");
    let header = phi.block().and_then(|block| main.block(block)).expect("phi block");
    assert_eq!(header.name(), "loop.header1");
    assert_eq!(header.preds().len(), 2);
    assert!(header.is_sealed());

    let info = main
        .instructions()
        .iter()
        .find_map(|instr| match instr.op() {
            Op::Loop(info) => Some(*info),
            _ => None,
        })
        .expect("loop terminator");
    assert_eq!(info.key, phi.result());
    assert_eq!(info.init.and_then(|init| int_constant(graph, init)), Some(0));
    assert!(info.step.is_some());
    assert!(package.events().has(EventKind::LoopFinalized));

    Ok(())
}

#[test]
fn test_ssa_loop_carried_value_seals_header_last() -> Result<()> {
    // for i = 0; i < 3; i++ { if i > 0 { y = t }; t = i }
    let body = vec![
        IfStmt::new(
            Expr::binary(BinaryOp::Gt, Expr::ident("i"), Expr::int(0)),
            vec![Stmt::assign("y", Expr::ident("t"))],
        )
        .into(),
        Stmt::assign("t", Expr::ident("i")),
    ];
    let package = build_with(
        "carried",
        vec![ForStmt::new(body)
            .init(Stmt::assign("i", Expr::int(0)))
            .cond(Expr::binary(BinaryOp::Lt, Expr::ident("i"), Expr::int(3)))
            .step(Stmt::inc("i"))
            .into()],
        BuildConfig::traced(),
    );
    let graph = package.build()?;
    let main = main_of(graph)?;
    assert!(package.diagnostics().is_empty(), "t arrives over the back edge");

    let header = main
        .blocks()
        .iter()
        .find(|block| block.name().starts_with("loop.header"))
        .expect("loop header");
    let latch = main
        .blocks()
        .iter()
        .find(|block| block.name().starts_with("loop.latch"))
        .expect("loop latch");
    assert_eq!(main.phis().filter(|phi| phi.block() == Some(header.id())).count(), 2);

    let sealed: Vec<usize> = package
        .events()
        .filter_kind(EventKind::BlockSealed)
        .filter_map(|event| event.block)
        .collect();
    let position = |index: usize| sealed.iter().position(|block| *block == index);
    let (latch, header) = (position(latch.id().index()), position(header.id().index()));
    assert!(latch.is_some() && header.is_some());
    assert!(latch < header, "header sealed before its back edge: {sealed:?}");

    Ok(())
}

#[test]
fn test_ssa_loop_without_assignment_has_no_phi() -> Result<()> {
    // x = 1; for x < 10 { y = x }
    let package = build(
        "readonly",
        vec![
            Stmt::assign("x", Expr::int(1)),
            ForStmt::new(vec![Stmt::assign("y", Expr::ident("x"))])
                .cond(Expr::binary(BinaryOp::Lt, Expr::ident("x"), Expr::int(10)))
                .into(),
        ],
    );
    let graph = package.build()?;
    let main = main_of(graph)?;

    assert_eq!(main.phis().count(), 0, "The header phi of x is trivial");
    assert!(main.blocks().iter().all(|block| block.is_sealed()));

    Ok(())
}

#[test]
fn test_ssa_closures_share_captured_variable() -> Result<()> {
    // x = 1; f = func() { return x }; g = func() { x = 2 }
    let package = build(
        "closures",
        vec![
            Stmt::assign("x", Expr::int(1)),
            Stmt::assign(
                "f",
                Expr::function(FunctionLit::new(&[], vec![Stmt::ret(vec![Expr::ident("x")])])),
            ),
            Stmt::assign(
                "g",
                Expr::function(FunctionLit::new(&[], vec![Stmt::assign("x", Expr::int(2))])),
            ),
        ],
    );
    let graph = package.build()?;
    assert!(package.diagnostics().is_empty());

    let f = graph.function_by_name("main$0").expect("first closure");
    let g = graph.function_by_name("main$1").expect("second closure");
    let cell = f.free_value("x").expect("x is captured by f");
    assert_eq!(g.free_value("x"), Some(cell), "Both closures share the cell");

    let captured = graph.operands(cell);
    assert_eq!(captured.len(), 1);
    assert_eq!(int_constant(graph, captured[0]), Some(1));

    // assigning a captured variable writes through the cell
    assert_eq!(count_opcode(g, Opcode::Update), 1);
    assert_eq!(f.parent(), graph.main().map(Function::id));

    let ty = f.ty().and_then(|ty| ty.as_function()).expect("function type");
    assert!(ty.free_values().contains("x"));

    Ok(())
}

#[test]
fn test_ssa_function_parameters() -> Result<()> {
    // add = func(a, b) { return a + b }
    let add = FunctionLit::new(
        &["a", "b"],
        vec![Stmt::ret(vec![Expr::binary(
            BinaryOp::Add,
            Expr::ident("a"),
            Expr::ident("b"),
        )])],
    );
    let package = build("params", vec![Stmt::assign("add", Expr::function(add))]);
    let graph = package.build()?;

    let add = graph.function_by_name("main$0").expect("function literal");
    assert_eq!(add.params().len(), 2);
    assert!(add.free_values().is_empty());
    assert_eq!(count_opcode(add, Opcode::Return), 1);
    assert!(add.is_finished());

    let ty = add.ty().and_then(|ty| ty.as_function()).expect("function type");
    assert_eq!(ty.params().len(), 2);

    Ok(())
}

#[test]
fn test_ssa_composite_classification() -> Result<()> {
    // a = [1, 2, 3]; m = {"a": 1, "b": 2}; r = {"a": 1, "b": "x"}
    let package = build(
        "composites",
        vec![
            Stmt::assign("a", Expr::slice(vec![Expr::int(1), Expr::int(2), Expr::int(3)])),
            Stmt::assign(
                "m",
                Expr::map(vec![
                    (Expr::string("a"), Expr::int(1)),
                    (Expr::string("b"), Expr::int(2)),
                ]),
            ),
            Stmt::assign(
                "r",
                Expr::map(vec![
                    (Expr::string("a"), Expr::int(1)),
                    (Expr::string("b"), Expr::string("x")),
                ]),
            ),
        ],
    );
    let graph = package.build()?;
    let main = main_of(graph)?;

    let object = |name: &str| {
        named(main, name)
            .and_then(|value| graph.value(value))
            .and_then(|value| value.ty().as_object().cloned())
            .expect("composite value")
    };

    let array = object("a");
    assert_eq!(array.kind(), ObjectKind::Array);
    assert_eq!(array.len(), Some(3));

    assert_eq!(object("m").kind(), ObjectKind::Map);
    assert_eq!(object("r").kind(), ObjectKind::Record);

    // one update per element or entry
    assert_eq!(count_opcode(main, Opcode::Update), 7);

    Ok(())
}

#[test]
fn test_ssa_switch_with_default() -> Result<()> {
    // switch x { case 1: y = 1; case 2: y = 2; default: y = 3 }; z = y
    let switch = SwitchStmt {
        cond: Some(Expr::ident("x")),
        cases: vec![
            SwitchCase {
                values: vec![Expr::int(1)],
                body: vec![Stmt::assign("y", Expr::int(1))],
            },
            SwitchCase {
                values: vec![Expr::int(2)],
                body: vec![Stmt::assign("y", Expr::int(2))],
            },
        ],
        default: Some(vec![Stmt::assign("y", Expr::int(3))]),
    };
    let package = build(
        "switch",
        vec![
            Stmt::assign("x", Expr::int(1)),
            switch.into(),
            Stmt::assign("z", Expr::ident("y")),
        ],
    );
    let graph = package.build()?;
    let main = main_of(graph)?;
    assert!(package.diagnostics().is_empty());

    assert_eq!(count_opcode(main, Opcode::Switch), 1);
    assert_eq!(main.phis().count(), 1);
    let phi = main.phis().next().and_then(|instr| instr.result()).expect("phi");
    let mut operands: Vec<Option<i64>> = graph
        .phi_operands(phi)
        .iter()
        .map(|edge| int_constant(graph, edge.value))
        .collect();
    operands.sort();
    assert_eq!(operands, vec![Some(1), Some(2), Some(3)]);

    Ok(())
}

#[test]
fn test_ssa_range_loop() -> Result<()> {
    // for k, v = range [1, 2] { last = v }
    let range = RangeStmt {
        key: Some("k".to_string()),
        value: Some("v".to_string()),
        iterable: Expr::slice(vec![Expr::int(1), Expr::int(2)]),
        is_in: false,
        body: vec![Stmt::assign("last", Expr::ident("v"))],
    };
    let package = build("range", vec![range.into()]);
    let graph = package.build()?;
    let main = main_of(graph)?;

    assert!(package.diagnostics().is_empty());
    assert_eq!(count_opcode(main, Opcode::Next), 1);
    assert_eq!(count_opcode(main, Opcode::Loop), 1);
    assert!(named(main, "k").is_some());
    assert!(named(main, "v").is_some());

    Ok(())
}

#[test]
fn test_ssa_try_catch_finally() -> Result<()> {
    // try { x = 1 } catch e { x = 2 } finally { y = 3 }
    let stmt = TryStmt {
        body: vec![Stmt::assign("x", Expr::int(1))],
        catch_name: Some("e".to_string()),
        catch_body: vec![Stmt::assign("x", Expr::int(2))],
        finally: Some(vec![Stmt::assign("y", Expr::int(3))]),
    };
    let package = build("try", vec![stmt.into()]);
    let graph = package.build()?;
    let main = main_of(graph)?;

    assert!(package.diagnostics().is_empty());
    assert_eq!(count_opcode(main, Opcode::ErrorHandler), 1);
    assert_eq!(count_opcode(main, Opcode::Recover), 1);
    assert!(main.blocks().iter().any(|block| block.name().starts_with("error.final")));

    Ok(())
}

#[test]
fn test_build_is_idempotent() -> Result<()> {
    let package = build("once", vec![Stmt::assign("x", Expr::int(1))]);
    assert_eq!(package.state(), BuildState::Built);

    let first = package.build()? as *const Graph;
    let second = package.build()? as *const Graph;
    assert_eq!(first, second, "Every build returns the same graph");
    assert_eq!(package.events().count_kind(EventKind::PackageBuilt), 1);

    Ok(())
}

#[test]
fn test_best_effort_records_and_continues() -> Result<()> {
    // break; x = 1; y = q
    let package = build(
        "lenient",
        vec![
            Stmt::brk().at(1, 1),
            Stmt::assign("x", Expr::int(1)).at(2, 1),
            Stmt::assign("y", Expr::ident("q").at(3, 5)).at(3, 1),
        ],
    );
    let graph = package.build()?;
    let main = main_of(graph)?;

    let diagnostics = package.diagnostics();
    assert_eq!(diagnostics.len(), 2);
    assert!(matches!(
        diagnostics[0],
        Error::MisplacedControlTransfer { keyword: "break", .. }
    ));
    assert!(matches!(diagnostics[1], Error::UndefinedReference { name, .. } if name == "q"));
    assert!(main.defines("x"), "Building continued past the diagnostic");
    assert!(package.events().errors().count() >= 2);

    Ok(())
}

#[test]
fn test_strict_stops_at_first_diagnostic() -> Result<()> {
    let package = build_with(
        "strict",
        vec![
            Stmt::brk().at(1, 1),
            Stmt::assign("x", Expr::int(1)).at(2, 1),
        ],
        BuildConfig::strict(),
    );

    match package.build() {
        Err(Error::BuildFailed { package: name, source }) => {
            assert_eq!(name, "strict");
            assert!(matches!(*source, Error::MisplacedControlTransfer { .. }));
        }
        other => panic!("unexpected result {other:?}"),
    }

    let graph = package.graph().expect("partial graph is kept");
    let main = main_of(graph)?;
    assert!(!main.defines("x"));
    assert_eq!(package.diagnostics().len(), 1);

    Ok(())
}

#[test]
fn test_unsupported_statements() -> Result<()> {
    let package = build(
        "unsupported",
        vec![
            Stmt::new(StmtKind::Defer(Expr::call(Expr::ident("f"), vec![]))),
            Stmt::new(StmtKind::Go(Expr::call(Expr::ident("f"), vec![]))),
        ],
    );
    package.build()?;

    let constructs: Vec<&str> = package
        .diagnostics()
        .into_iter()
        .filter_map(|err| match err {
            Error::UnsupportedConstruct { construct, .. } => Some(*construct),
            _ => None,
        })
        .collect();
    assert_eq!(constructs, vec!["defer", "go"]);

    Ok(())
}

#[test]
fn test_program_builds_every_package() -> Result<()> {
    let program = Program::new("app");
    program.add_package(
        "lib",
        SourceFile::new("lib", vec![Stmt::assign("x", Expr::int(1))]),
    )?;
    program.add_package(
        "bin",
        SourceFile::new(
            "bin",
            vec![ForStmt::new(vec![])
                .init(Stmt::assign("i", Expr::int(0)))
                .cond(Expr::binary(BinaryOp::Lt, Expr::ident("i"), Expr::int(3)))
                .step(Stmt::inc("i"))
                .into()],
        ),
    )?;

    assert!(matches!(
        program.add_package("lib", SourceFile::new("lib", vec![])),
        Err(Error::DuplicatePackage(_))
    ));

    program.build()?;
    assert!(program.is_built());

    let names: Vec<String> = program
        .packages()
        .iter()
        .map(|package| package.name().to_string())
        .collect();
    assert_eq!(names, vec!["lib", "bin"]);

    let bin = program.package("bin")?;
    assert_eq!(bin.state(), BuildState::Built);
    assert_eq!(bin.graph().map(Graph::phi_count), Some(1));
    assert!(matches!(
        program.package("missing"),
        Err(Error::PackageNotFound(_))
    ));

    Ok(())
}

#[test]
fn test_dot_export() -> Result<()> {
    let package = build(
        "dot",
        vec![ForStmt::new(vec![])
            .init(Stmt::assign("i", Expr::int(0)))
            .cond(Expr::binary(BinaryOp::Lt, Expr::ident("i"), Expr::int(3)))
            .step(Stmt::inc("i"))
            .into()],
    );
    let graph = package.build()?;
    let main = main_of(graph)?;

    let cfg = main.to_dot();
    assert!(cfg.starts_with("digraph CFG {"));
    assert!(cfg.contains("loop.header1"));
    assert!(cfg.contains("label=\"body\""));

    let values = graph.value_graph_dot(main.id()).expect("value graph");
    assert!(values.starts_with("digraph Values {"));
    assert!(values.contains("[i]"));

    Ok(())
}
