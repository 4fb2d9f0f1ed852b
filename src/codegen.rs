//! Generation of the firmware statements that construct and wire up each number.

use crate::number::{NumberKind, NumberSpec};
use crate::registers::RegisterWidth;
use std::collections::{BTreeMap, BTreeSet};
use tracing::trace;

pub const NAMESPACE: &str = "century_vs_pump";

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("id `{0}` is declared more than once")]
    DuplicateId(String),
    #[error("`{0}` is not a valid identifier")]
    InvalidId(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::IntoStaticStr)]
pub enum NumberClass {
    CenturyVSPumpDemandNumber,
    CenturyVSPumpConfigNumber,
    CenturyVSPumpConfigNumber16,
}

impl NumberClass {
    pub fn of(kind: &NumberKind) -> Self {
        match kind {
            NumberKind::Demand(_) => Self::CenturyVSPumpDemandNumber,
            NumberKind::Config(_) => Self::CenturyVSPumpConfigNumber,
            NumberKind::Config16(_) => Self::CenturyVSPumpConfigNumber16,
            NumberKind::Preset { number, .. } => match number.width {
                RegisterWidth::Byte => Self::CenturyVSPumpConfigNumber,
                RegisterWidth::Word => Self::CenturyVSPumpConfigNumber16,
            },
        }
    }

    pub fn name(self) -> &'static str {
        self.into()
    }

    fn auto_id_base(self) -> String {
        format!("{NAMESPACE}_{}", self.name().to_lowercase())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Var(String),
}

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Int(n) => f.write_fmt(format_args!("{n}")),
            Expr::Float(n) => f.write_fmt(format_args!("{n:?}f")),
            Expr::Bool(b) => f.write_fmt(format_args!("{b}")),
            Expr::Str(s) => match serde_json::to_string(s) {
                Ok(escaped) => f.write_str(&escaped),
                Err(_) => Err(std::fmt::Error),
            },
            Expr::Var(v) => f.write_str(v),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Statement {
    /// `Class *id = new Class(args);`
    New {
        id: String,
        class: NumberClass,
        args: Vec<Expr>,
    },
    /// `App.method(args);`
    App { method: &'static str, args: Vec<Expr> },
    /// `receiver->method(args);`
    Call {
        receiver: String,
        method: &'static str,
        args: Vec<Expr>,
    },
}

struct Args<'a>(&'a [Expr]);

impl std::fmt::Display for Args<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (index, arg) in self.0.iter().enumerate() {
            if index != 0 {
                f.write_str(", ")?;
            }
            f.write_fmt(format_args!("{arg}"))?;
        }
        Ok(())
    }
}

impl std::fmt::Display for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Statement::New { id, class, args } => {
                let class = class.name();
                f.write_fmt(format_args!(
                    "{NAMESPACE}::{class} *{id} = new {NAMESPACE}::{class}({});",
                    Args(args)
                ))
            }
            Statement::App { method, args } => {
                f.write_fmt(format_args!("App.{method}({});", Args(args)))
            }
            Statement::Call {
                receiver,
                method,
                args,
            } => f.write_fmt(format_args!("{receiver}->{method}({});", Args(args))),
        }
    }
}

/// Hands out variable names, keeping user supplied ids and numbering generated ones.
#[derive(Default)]
pub struct IdAllocator {
    taken: BTreeSet<String>,
    counters: BTreeMap<String, usize>,
}

/// C++ keywords plus the globals the generated code refers to.
const RESERVED: &[&str] = &[
    "App", "alignas", "alignof", "and", "asm", "auto", "bool", "break", "case", "catch", "char",
    "class", "const", "constexpr", "continue", "decltype", "default", "delete", "do", "double",
    "else", "enum", "explicit", "extern", "false", "float", "for", "friend", "goto", "if",
    "inline", "int", "long", "mutable", "namespace", "new", "noexcept", "not", "nullptr",
    "operator", "or", "private", "protected", "public", "register", "return", "short", "signed",
    "sizeof", "static", "struct", "switch", "template", "this", "throw", "true", "try", "typedef",
    "typename", "union", "unsigned", "using", "virtual", "void", "volatile", "while", NAMESPACE,
];

fn is_identifier(id: &str) -> bool {
    if RESERVED.contains(&id) {
        return false;
    }
    let mut chars = id.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl IdAllocator {
    /// Reserve ids the user wrote down before any are generated, so generated ones avoid them.
    pub fn reserve(&mut self, id: &str) -> Result<(), Error> {
        if !is_identifier(id) {
            return Err(Error::InvalidId(id.to_string()));
        }
        if !self.taken.insert(id.to_string()) {
            return Err(Error::DuplicateId(id.to_string()));
        }
        Ok(())
    }

    pub fn generate(&mut self, base: &str) -> String {
        let counter = self.counters.entry(base.to_string()).or_insert(0);
        loop {
            *counter += 1;
            let candidate = match *counter {
                1 => format!("{base}_id"),
                n => format!("{base}_id_{n}"),
            };
            if self.taken.insert(candidate.clone()) {
                return candidate;
            }
        }
    }
}

/// Statements for a single number, in the order the firmware expects them.
pub fn number_statements(id: &str, spec: &NumberSpec) -> Vec<Statement> {
    let class = NumberClass::of(&spec.kind);
    let call = |method: &'static str, args: Vec<Expr>| Statement::Call {
        receiver: id.to_string(),
        method,
        args,
    };
    let var = || vec![Expr::Var(id.to_string())];

    let args = match spec.kind.register_number() {
        None => Vec::new(),
        Some(number) => vec![
            Expr::Int(number.register.page.into()),
            Expr::Int(number.register.address.into()),
        ],
    };
    let mut statements = vec![
        Statement::New {
            id: id.to_string(),
            class,
            args,
        },
        Statement::App {
            method: "register_component",
            args: var(),
        },
        Statement::App {
            method: "register_number",
            args: var(),
        },
    ];
    if let Some(name) = &spec.name {
        statements.push(call("set_name", vec![Expr::Str(name.clone())]));
    }
    let bounds = spec.kind.bounds();
    statements.push(call("traits.set_min_value", vec![Expr::Float(bounds.min)]));
    statements.push(call("traits.set_max_value", vec![Expr::Float(bounds.max)]));
    statements.push(call("traits.set_step", vec![Expr::Float(bounds.step)]));
    if let Some(number) = spec.kind.register_number() {
        statements.push(call(
            "set_store_to_flash",
            vec![Expr::Bool(number.store_to_flash)],
        ));
        if number.width == RegisterWidth::Byte {
            statements.push(call("set_offset", vec![Expr::Int(number.offset.into())]));
        }
    }
    statements.push(call("set_pump", vec![Expr::Var(spec.pump_id.clone())]));
    statements.push(Statement::Call {
        receiver: spec.pump_id.clone(),
        method: "add_item",
        args: var(),
    });
    for statement in &statements {
        trace!(%statement, "generated statement");
    }
    statements
}

/// Statements for all numbers, declared in configuration order.
pub fn generate(specs: &[NumberSpec]) -> Result<Vec<Statement>, Error> {
    let mut ids = IdAllocator::default();
    let pump_ids = specs.iter().map(|s| s.pump_id.as_str()).collect::<BTreeSet<_>>();
    for pump_id in pump_ids {
        ids.reserve(pump_id)?;
    }
    for id in specs.iter().filter_map(|s| s.id.as_deref()) {
        ids.reserve(id)?;
    }
    let mut statements = Vec::new();
    for spec in specs {
        let id = match &spec.id {
            Some(id) => id.clone(),
            None => ids.generate(&NumberClass::of(&spec.kind).auto_id_base()),
        };
        statements.extend(number_statements(&id, spec));
    }
    Ok(statements)
}

pub fn render(statements: &[Statement]) -> String {
    let mut output = String::new();
    for statement in statements {
        output.push_str(&statement.to_string());
        output.push('\n');
    }
    output
}
