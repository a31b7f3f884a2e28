//! Syntax tree fixtures shared by the unit tests.

use std::sync::Arc;

use crate::{
    ast::{BinaryOp, Expr, ForStmt, FunctionLit, IfStmt, SourceFile, Stmt},
    config::BuildConfig,
    ssa::{Function, Graph, Package},
};

/// Wraps statements into a compilation unit named `test`.
pub fn source(body: Vec<Stmt>) -> SourceFile {
    SourceFile::new("test", body)
}

/// Builds statements with the default configuration.
pub fn build(body: Vec<Stmt>) -> Package {
    build_with(BuildConfig::default(), body)
}

/// Builds statements with `config`. The package is built before it is returned.
pub fn build_with(config: BuildConfig, body: Vec<Stmt>) -> Package {
    let package = Package::with_config("test", Arc::new(source(body)), config);
    let _ = package.build();
    package
}

/// The graph of a built package.
pub fn graph(package: &Package) -> &Graph {
    package.graph().expect("package was built")
}

/// The main function of a built package.
pub fn main(package: &Package) -> &Function {
    graph(package).main().expect("main function exists")
}

/// `for i = 0; i < 10; i++ { }`
pub fn counting_loop() -> Vec<Stmt> {
    vec![ForStmt::new(vec![])
        .init(Stmt::assign("i", Expr::int(0)))
        .cond(Expr::binary(BinaryOp::Lt, Expr::ident("i"), Expr::int(10)))
        .step(Stmt::inc("i"))
        .into()]
}

/// `c = true; x = 1; if c { x = 2 } else { x = 3 }; y = x`
pub fn diamond() -> Vec<Stmt> {
    vec![
        Stmt::assign("c", Expr::bool(true)),
        Stmt::assign("x", Expr::int(1)),
        IfStmt::new(Expr::ident("c"), vec![Stmt::assign("x", Expr::int(2))])
            .otherwise(vec![Stmt::assign("x", Expr::int(3))])
            .into(),
        Stmt::assign("y", Expr::ident("x")),
    ]
}

/// `x = 1; if true { } else { }; y = x`
pub fn untouched_branches() -> Vec<Stmt> {
    vec![
        Stmt::assign("x", Expr::int(1)),
        IfStmt::new(Expr::bool(true), vec![])
            .otherwise(vec![])
            .into(),
        Stmt::assign("y", Expr::ident("x")),
    ]
}

/// `x = 1; f = func() { return x }; g = func() { x = 2 }`
pub fn closures() -> Vec<Stmt> {
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
    ]
}
