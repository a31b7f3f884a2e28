//! Graphviz export of functions.
//!
//! [`Function::to_dot`] renders the control flow graph with the instructions of
//! every block, [`Graph::value_graph_dot`] renders the def-use edges between the
//! values of one function.

use std::{collections::BTreeSet, fmt::Write};

use crate::{
    ssa::{BlockId, FuncId, Function, Graph, Op, ValueId, ValueKind},
    utils::escape_dot,
};

impl Function {
    /// Generates a DOT representation of the control flow graph.
    ///
    /// Entry and exit blocks are highlighted, edges leaving a conditional, loop,
    /// switch or error handler are labelled with the branch they represent.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use yakssa::{ast::{Expr, IfStmt, SourceFile, Stmt}, Package};
    ///
    /// let file = SourceFile::new("demo", vec![
    ///     IfStmt::new(Expr::ident("c"), vec![Stmt::assign("x", Expr::int(1))]).into(),
    /// ]);
    /// let package = Package::new("demo", file);
    /// let graph = package.build()?;
    /// let dot = graph.main().map(|main| main.to_dot()).unwrap_or_default();
    /// assert!(dot.starts_with("digraph CFG {"));
    /// # Ok::<(), yakssa::Error>(())
    /// ```
    #[must_use]
    pub fn to_dot(&self) -> String {
        let mut dot = String::new();

        dot.push_str("digraph CFG {\n");
        let _ = writeln!(dot, "    label=\"CFG: {}\";", escape_dot(self.name()));
        dot.push_str("    labelloc=t;\n");
        dot.push_str("    node [shape=box, fontname=\"Courier\", fontsize=10];\n");
        dot.push_str("    edge [fontname=\"Courier\", fontsize=9];\n\n");

        for block in self.blocks() {
            let id = block.id();
            let is_entry = self.entry() == Some(id);
            let is_exit = self.exit() == Some(id);

            let mut label = escape_dot(block.name());
            if is_entry {
                label.push_str(" (entry)");
            }
            if is_exit {
                label.push_str(" (exit)");
            }
            label.push_str("\\l");
            for instr in self.block_instructions(id) {
                let _ = write!(label, "{}\\l", escape_dot(&instr.to_string()));
            }

            let style = if is_entry {
                ", style=filled, fillcolor=lightgreen"
            } else if is_exit {
                ", style=filled, fillcolor=lightcoral"
            } else {
                ""
            };
            let _ = writeln!(dot, "    {id} [label=\"{label}\"{style}];");
        }

        dot.push('\n');

        for block in self.blocks() {
            let terminator = block
                .terminator()
                .and_then(|instr| self.instruction(instr))
                .map(|instr| instr.op());
            for succ in block.succs() {
                let (label, color) = edge_style(terminator, *succ);
                let _ = writeln!(
                    dot,
                    "    {} -> {succ} [label=\"{}\", color={color}];",
                    block.id(),
                    escape_dot(&label)
                );
            }
        }

        dot.push_str("}\n");
        dot
    }
}

fn edge_style(terminator: Option<&Op>, succ: BlockId) -> (String, &'static str) {
    match terminator {
        Some(Op::If {
            then_block,
            else_block,
            ..
        }) => {
            if succ == *then_block {
                ("true".to_string(), "green")
            } else if succ == *else_block {
                ("false".to_string(), "red")
            } else {
                (String::new(), "black")
            }
        }
        Some(Op::Loop(info)) => {
            if succ == info.body {
                ("body".to_string(), "green")
            } else {
                ("exit".to_string(), "red")
            }
        }
        Some(Op::Switch {
            default, labels, ..
        }) => {
            let cases: Vec<String> = labels
                .iter()
                .filter(|label| label.dest == succ)
                .map(|label| format!("case {}", label.value))
                .collect();
            if cases.is_empty() && succ == *default {
                ("default".to_string(), "blue")
            } else {
                (cases.join(", "), "blue")
            }
        }
        Some(Op::ErrorHandler {
            try_block,
            catch_block,
            ..
        }) => {
            if succ == *try_block {
                ("try".to_string(), "purple")
            } else if succ == *catch_block {
                ("catch".to_string(), "purple")
            } else {
                (String::new(), "purple")
            }
        }
        _ => (String::new(), "black"),
    }
}

impl Graph {
    /// Generates a DOT representation of the def-use edges of a function.
    ///
    /// Every value of the function becomes a node; an edge leads from each operand
    /// to the value computed from it. Operands owned by other functions, such as the
    /// values captured by free values, are drawn dashed.
    ///
    /// Returns `None` if `func` does not exist.
    #[must_use]
    pub fn value_graph_dot(&self, func: FuncId) -> Option<String> {
        let function = self.function(func)?;
        let mut dot = String::new();
        let mut foreign = BTreeSet::new();

        dot.push_str("digraph Values {\n");
        let _ = writeln!(dot, "    label=\"Values: {}\";", escape_dot(function.name()));
        dot.push_str("    labelloc=t;\n");
        dot.push_str("    node [shape=ellipse, fontname=\"Courier\", fontsize=10];\n\n");

        let mut edges = Vec::new();
        for value in function.values() {
            let id = value.id();
            let label = match value.kind() {
                ValueKind::Instruction(instr) => match self.instruction(instr) {
                    Some(instr) if instr.block().is_some() => instr.to_string(),
                    _ => continue,
                },
                ValueKind::Parameter { index } => format!("{id} = param {index}"),
                ValueKind::FreeValue { .. } => format!("{id} = free"),
                ValueKind::Function(child) => format!("{id} = function {child}"),
            };
            let label = match value.variable() {
                Some(variable) => format!("{label} [{variable}]"),
                None => label,
            };
            let _ = writeln!(dot, "    {} [label=\"{}\"];", node(id), escape_dot(&label));

            for operand in self.operands(id) {
                if operand.func() != func {
                    foreign.insert(operand);
                }
                edges.push((operand, id));
            }
        }

        for value in foreign {
            let owner = self
                .function(value.func())
                .map(|f| f.name().to_string())
                .unwrap_or_default();
            let _ = writeln!(
                dot,
                "    {} [label=\"{}\", style=dashed];",
                node(value),
                escape_dot(&format!("{owner}.{value}"))
            );
        }

        dot.push('\n');
        for (from, to) in edges {
            let _ = writeln!(dot, "    {} -> {};", node(from), node(to));
        }

        dot.push_str("}\n");
        Some(dot)
    }
}

fn node(value: ValueId) -> String {
    format!("{}_{}", value.func(), value)
}

#[cfg(test)]
mod tests {
    use crate::{
        ast::{BinaryOp, Expr, ForStmt, FunctionLit, IfStmt, SourceFile, Stmt},
        ssa::Package,
    };

    #[test]
    fn test_cfg_dot_labels_branches() {
        let file = SourceFile::new(
            "dot",
            vec![IfStmt::new(Expr::ident("c").at(1, 4), vec![Stmt::assign("x", Expr::int(1))])
                .otherwise(vec![Stmt::assign("x", Expr::int(2))])
                .into()],
        );
        let package = Package::new("dot", file);
        let graph = package.build().unwrap();
        let dot = graph.main().unwrap().to_dot();

        assert!(dot.starts_with("digraph CFG {"));
        assert!(dot.contains("label=\"CFG: main\""));
        assert!(dot.contains("label=\"true\", color=green"));
        assert!(dot.contains("label=\"false\", color=red"));
        assert!(dot.contains("fillcolor=lightgreen"));
        assert!(dot.ends_with("}\n"));
    }

    #[test]
    fn test_cfg_dot_labels_loops() {
        let file = SourceFile::new(
            "dot",
            vec![ForStmt::new(vec![])
                .init(Stmt::assign("i", Expr::int(0)))
                .cond(Expr::binary(BinaryOp::Lt, Expr::ident("i"), Expr::int(3)))
                .step(Stmt::inc("i"))
                .into()],
        );
        let package = Package::new("dot", file);
        let dot = package.build().unwrap().main().unwrap().to_dot();
        assert!(dot.contains("label=\"body\""));
        assert!(dot.contains("label=\"exit\""));
        assert!(dot.contains("phi("));
    }

    #[test]
    fn test_value_graph_marks_captures() {
        let closure = FunctionLit::new(&[], vec![Stmt::ret(vec![Expr::ident("x")])]);
        let file = SourceFile::new(
            "dot",
            vec![
                Stmt::assign("x", Expr::int(1)),
                Stmt::assign("f", Expr::function(closure)),
            ],
        );
        let package = Package::new("dot", file);
        let graph = package.build().unwrap();
        let child = graph.function_by_name("main$0").unwrap().id();

        let dot = graph.value_graph_dot(child).unwrap();
        assert!(dot.starts_with("digraph Values {"));
        assert!(dot.contains("style=dashed"));
        assert!(dot.contains("main.v"));
        assert!(dot.contains("= free [x]"));
    }
}
