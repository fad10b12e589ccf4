// BSD 2-Clause License
//
// Copyright (c) 2019, 2020 Alasdair Armstrong
//
// All rights reserved.
//
// Redistribution and use in source and binary forms, with or without
// modification, are permitted provided that the following conditions are
// met:
//
// 1. Redistributions of source code must retain the above copyright
// notice, this list of conditions and the following disclaimer.
//
// 2. Redistributions in binary form must reproduce the above copyright
// notice, this list of conditions and the following disclaimer in the
// documentation and/or other materials provided with the distribution.
//
// THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS
// "AS IS" AND ANY EXPRESS OR IMPLIED WARRANTIES, INCLUDING, BUT NOT
// LIMITED TO, THE IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR
// A PARTICULAR PURPOSE ARE DISCLAIMED. IN NO EVENT SHALL THE COPYRIGHT
// HOLDER OR CONTRIBUTORS BE LIABLE FOR ANY DIRECT, INDIRECT, INCIDENTAL,
// SPECIAL, EXEMPLARY, OR CONSEQUENTIAL DAMAGES (INCLUDING, BUT NOT
// LIMITED TO, PROCUREMENT OF SUBSTITUTE GOODS OR SERVICES; LOSS OF USE,
// DATA, OR PROFITS; OR BUSINESS INTERRUPTION) HOWEVER CAUSED AND ON ANY
// THEORY OF LIABILITY, WHETHER IN CONTRACT, STRICT LIABILITY, OR TORT
// (INCLUDING NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY OUT OF THE USE
// OF THIS SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE.

//! Lemmas are the engine's persistent summaries: a path together with
//! the ordered constraints that hold along it. They live in a
//! `.ksummary` file as s-expressions, appended as they are discovered
//! and re-read at startup. Printing then parsing a lemma yields an
//! equal lemma.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use crate::error::ExecError;
use crate::expr::{ArrayRef, Binop, Context, ExprKind, ExprRef, SymbolicSource};
use crate::ir::{InstId, Module, TransitionKind};
use crate::lexer::{SexpLexer, Tok};
use crate::log;
use crate::path::{Path, PathEntry};

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Lemma {
    pub path: Path,
    pub constraints: Vec<ExprRef>,
}

impl Lemma {
    pub fn new(path: Path, constraints: Vec<ExprRef>) -> Self {
        Lemma { path, constraints }
    }
}

/// The lemma store: deduplicates, appends new lemmas to the summary
/// file as they arrive, and flushes stragglers on shutdown.
pub struct Summary {
    lemmas: BTreeSet<Lemma>,
    dumped: BTreeSet<Lemma>,
    file: PathBuf,
}

impl Summary {
    pub fn new(file: PathBuf) -> Self {
        Summary { lemmas: BTreeSet::new(), dumped: BTreeSet::new(), file }
    }

    pub fn lemmas(&self) -> &BTreeSet<Lemma> {
        &self.lemmas
    }

    pub fn add_lemma(&mut self, module: &Module, lemma: Lemma) -> Result<(), ExecError> {
        if self.lemmas.contains(&lemma) {
            return Ok(());
        }
        log!(log::LEMMA, format!("new lemma: {}", lemma.path.to_string(module)));

        let mut os = OpenOptions::new().create(true).append(true).open(&self.file)?;
        let text = lemma_to_string(module, &lemma);
        writeln!(os, "{}", text)?;
        self.lemmas.insert(lemma.clone());
        self.dumped.insert(lemma);
        Ok(())
    }

    /// Write any lemma that was added without reaching the file yet.
    pub fn flush(&mut self, module: &Module) -> Result<(), ExecError> {
        let pending: Vec<Lemma> = self.lemmas.difference(&self.dumped).cloned().collect();
        if pending.is_empty() {
            return Ok(());
        }
        let mut os = OpenOptions::new().create(true).append(true).open(&self.file)?;
        for lemma in pending {
            writeln!(os, "{}", lemma_to_string(module, &lemma))?;
            self.dumped.insert(lemma);
        }
        Ok(())
    }

    pub fn read_from_file(&mut self, ctx: &Context, module: &Module) -> Result<(), ExecError> {
        let contents = match std::fs::read_to_string(&self.file) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(err.into()),
        };
        for lemma in parse_lemmas(ctx, module, &contents)? {
            if self.lemmas.insert(lemma.clone()) {
                self.dumped.insert(lemma);
            }
        }
        Ok(())
    }
}

fn write_transition(out: &mut String, kind: TransitionKind) {
    match kind {
        TransitionKind::In => out.push_str("in"),
        TransitionKind::Out => out.push_str("out"),
        TransitionKind::None => out.push_str("none"),
    }
}

fn write_path(out: &mut String, module: &Module, path: &Path) {
    out.push_str(&format!("(path {} (entries", path.first_index()));
    for entry in path.entries() {
        let block = module.block(entry.block);
        let function = module.function(block.function);
        out.push_str(&format!(" (|{}| {} ", function.name, block.label));
        write_transition(out, entry.kind);
        out.push(')');
    }
    out.push_str(&format!(") {} ", path.last_index()));
    match path.next() {
        Some(next) => {
            let block = module.block(next.block);
            let function = module.function(block.function);
            out.push_str(&format!("(next |{}| {} {})", function.name, block.label, next.index));
        }
        None => out.push_str("(next none)"),
    }
    out.push(')');
}

fn write_source(out: &mut String, module: &Module, source: &SymbolicSource) {
    match source {
        SymbolicSource::Constant { values } => {
            out.push_str("(constant");
            for value in values {
                out.push_str(&format!(" {}", value))
            }
            out.push(')')
        }
        SymbolicSource::SymbolicSizeConstant { default_value, version } => {
            out.push_str(&format!("(sym-size-const {} {})", default_value, version))
        }
        SymbolicSource::SymbolicSizeConstantAddress { version } => {
            out.push_str(&format!("(sym-size-addr {})", version))
        }
        SymbolicSource::MakeSymbolic { name, version } => {
            out.push_str(&format!("(make-symbolic |{}| {})", name, version))
        }
        SymbolicSource::LazyInitAddress { pointer } => out.push_str(&format!("(lazy-addr {})", pointer)),
        SymbolicSource::LazyInitSize { pointer } => out.push_str(&format!("(lazy-size {})", pointer)),
        SymbolicSource::LazyInitContent { pointer } => out.push_str(&format!("(lazy-content {})", pointer)),
        SymbolicSource::Argument { function, index } => {
            let function = module.function(*function);
            out.push_str(&format!("(arg |{}| {})", function.name, index))
        }
        SymbolicSource::Instruction { inst, index } => {
            let block = module.block(inst.block);
            let function = module.function(block.function);
            out.push_str(&format!("(instr |{}| {} {} {})", function.name, block.label, inst.index, index))
        }
        SymbolicSource::Global { global } => {
            out.push_str(&format!("(global |{}|)", module.global(*global).name))
        }
        SymbolicSource::Irreproducible { name, version } => {
            out.push_str(&format!("(irreproducible |{}| {})", name, version))
        }
    }
}

fn write_array(out: &mut String, module: &Module, array: &ArrayRef) {
    out.push_str(&format!(
        "(array |{}| {} {} (size {}) ",
        array.name(),
        array.domain_width(),
        array.range_width(),
        array.size()
    ));
    write_source(out, module, array.source());
    out.push(')')
}

pub fn lemma_to_string(module: &Module, lemma: &Lemma) -> String {
    let mut arrays: Vec<ArrayRef> = Vec::new();
    for constraint in &lemma.constraints {
        constraint.collect_arrays(&mut arrays)
    }

    let mut out = String::from("(lemma ");
    write_path(&mut out, module, &lemma.path);
    out.push_str(" (arrays");
    for array in &arrays {
        out.push(' ');
        write_array(&mut out, module, array)
    }
    out.push_str(") (constraints");
    for constraint in &lemma.constraints {
        out.push_str(&format!(" {}", constraint))
    }
    out.push_str("))");
    out
}

#[derive(Clone, Debug)]
enum Sexp<'a> {
    Atom(&'a str),
    Nat(u64),
    List(Vec<Sexp<'a>>),
}

impl<'a> Sexp<'a> {
    fn atom(&self) -> Result<&'a str, ExecError> {
        match self {
            Sexp::Atom(a) => Ok(a),
            _ => Err(parse_err("expected an atom")),
        }
    }

    fn nat(&self) -> Result<u64, ExecError> {
        match self {
            Sexp::Nat(n) => Ok(*n),
            _ => Err(parse_err("expected a number")),
        }
    }

    fn list(&self) -> Result<&[Sexp<'a>], ExecError> {
        match self {
            Sexp::List(items) => Ok(items),
            _ => Err(parse_err("expected a list")),
        }
    }
}

fn parse_err(msg: &str) -> ExecError {
    ExecError::ParseError { pos: 0, msg: msg.to_string() }
}

fn parse_sexps(input: &str) -> Result<Vec<Sexp>, ExecError> {
    let mut tokens = Vec::new();
    for span in SexpLexer::new(input) {
        let (_, tok, _) = span.map_err(|e| ExecError::ParseError { pos: e.pos, msg: "bad token".to_string() })?;
        tokens.push(tok)
    }

    let mut stack: Vec<Vec<Sexp>> = vec![Vec::new()];
    for tok in tokens {
        match tok {
            Tok::Lparen => stack.push(Vec::new()),
            Tok::Rparen => {
                let list = stack.pop().ok_or_else(|| parse_err("unbalanced parenthesis"))?;
                let top = stack.last_mut().ok_or_else(|| parse_err("unbalanced parenthesis"))?;
                top.push(Sexp::List(list))
            }
            Tok::Atom(a) => stack
                .last_mut()
                .ok_or_else(|| parse_err("unbalanced parenthesis"))?
                .push(Sexp::Atom(a)),
            Tok::Nat(n) => stack.last_mut().ok_or_else(|| parse_err("unbalanced parenthesis"))?.push(Sexp::Nat(
                n.parse::<u64>().map_err(|_| parse_err("number out of range"))?,
            )),
        }
    }
    if stack.len() != 1 {
        return Err(parse_err("unbalanced parenthesis"));
    }
    Ok(stack.pop().unwrap())
}

type ArrayEnv = BTreeMap<String, ArrayRef>;

fn parse_expr(ctx: &Context, arrays: &ArrayEnv, sexp: &Sexp) -> Result<ExprRef, ExecError> {
    let items = sexp.list()?;
    let head = items.first().ok_or_else(|| parse_err("empty expression"))?.atom()?;
    match head {
        "_" => {
            let bv = items.get(1).ok_or_else(|| parse_err("malformed constant"))?.atom()?;
            let value = bv
                .strip_prefix("bv")
                .and_then(|v| v.parse::<u64>().ok())
                .ok_or_else(|| parse_err("malformed constant"))?;
            let width = items.get(2).ok_or_else(|| parse_err("malformed constant"))?.nat()? as u32;
            Ok(ctx.constant(value, width))
        }
        "read" => {
            let name = items.get(1).ok_or_else(|| parse_err("malformed read"))?.atom()?;
            let array = arrays.get(name).ok_or_else(|| ExecError::UnboundName(name.to_string()))?.clone();
            let index = parse_expr(ctx, arrays, items.get(2).ok_or_else(|| parse_err("malformed read"))?)?;
            Ok(ctx.read(&array, index))
        }
        "concat" => {
            let lhs = parse_expr(ctx, arrays, &items[1])?;
            let rhs = parse_expr(ctx, arrays, &items[2])?;
            Ok(ctx.concat(lhs, rhs))
        }
        "extract" => {
            let offset = items.get(1).ok_or_else(|| parse_err("malformed extract"))?.nat()? as u32;
            let width = items.get(2).ok_or_else(|| parse_err("malformed extract"))?.nat()? as u32;
            let inner = parse_expr(ctx, arrays, items.get(3).ok_or_else(|| parse_err("malformed extract"))?)?;
            Ok(ctx.extract(inner, offset, width))
        }
        "ite" => {
            let cond = parse_expr(ctx, arrays, &items[1])?;
            let true_expr = parse_expr(ctx, arrays, &items[2])?;
            let false_expr = parse_expr(ctx, arrays, &items[3])?;
            Ok(ctx.select(cond, true_expr, false_expr))
        }
        "not" => {
            let inner = parse_expr(ctx, arrays, &items[1])?;
            Ok(ctx.not(inner))
        }
        op => match Binop::from_name(op) {
            Some(op) => {
                if items.len() != 3 {
                    return Err(parse_err("binary operator expects two operands"));
                }
                let lhs = parse_expr(ctx, arrays, &items[1])?;
                let rhs = parse_expr(ctx, arrays, &items[2])?;
                Ok(ctx.binop(op, lhs, rhs))
            }
            None => Err(ExecError::UnboundName(op.to_string())),
        },
    }
}

fn parse_source(
    ctx: &Context,
    module: &Module,
    arrays: &ArrayEnv,
    sexp: &Sexp,
) -> Result<SymbolicSource, ExecError> {
    let items = sexp.list()?;
    let head = items.first().ok_or_else(|| parse_err("empty source"))?.atom()?;
    Ok(match head {
        "constant" => {
            let mut values = Vec::new();
            for item in &items[1..] {
                values.push(item.nat()?)
            }
            SymbolicSource::Constant { values }
        }
        "sym-size-const" => SymbolicSource::SymbolicSizeConstant {
            default_value: items[1].nat()?,
            version: items[2].nat()?,
        },
        "sym-size-addr" => SymbolicSource::SymbolicSizeConstantAddress { version: items[1].nat()? },
        "make-symbolic" => SymbolicSource::MakeSymbolic {
            name: items[1].atom()?.to_string(),
            version: items[2].nat()?,
        },
        "lazy-addr" => SymbolicSource::LazyInitAddress { pointer: parse_expr(ctx, arrays, &items[1])? },
        "lazy-size" => SymbolicSource::LazyInitSize { pointer: parse_expr(ctx, arrays, &items[1])? },
        "lazy-content" => SymbolicSource::LazyInitContent { pointer: parse_expr(ctx, arrays, &items[1])? },
        "arg" => {
            let name = items[1].atom()?;
            let function =
                module.function_named(name).ok_or_else(|| ExecError::UnboundName(name.to_string()))?;
            SymbolicSource::Argument { function, index: items[2].nat()? as u32 }
        }
        "instr" => {
            let name = items[1].atom()?;
            let function =
                module.function_named(name).ok_or_else(|| ExecError::UnboundName(name.to_string()))?;
            let label = items[2].atom()?;
            let block = module
                .block_labelled(function, label)
                .ok_or_else(|| ExecError::UnboundName(label.to_string()))?;
            SymbolicSource::Instruction {
                inst: InstId::new(block, items[3].nat()? as u32),
                index: items[4].nat()? as u32,
            }
        }
        "global" => {
            let name = items[1].atom()?;
            let global =
                module.global_named(name).ok_or_else(|| ExecError::UnboundName(name.to_string()))?;
            SymbolicSource::Global { global }
        }
        "irreproducible" => SymbolicSource::Irreproducible {
            name: items[1].atom()?.to_string(),
            version: items[2].nat()?,
        },
        other => return Err(ExecError::UnboundName(other.to_string())),
    })
}

fn parse_path(module: &Module, sexp: &Sexp) -> Result<Path, ExecError> {
    let items = sexp.list()?;
    if items.first().and_then(|i| i.atom().ok()) != Some("path") {
        return Err(parse_err("expected a path"));
    }
    let first = items[1].nat()? as u32;

    let entries_sexp = items[2].list()?;
    if entries_sexp.first().and_then(|i| i.atom().ok()) != Some("entries") {
        return Err(parse_err("expected path entries"));
    }
    let mut entries = Vec::new();
    for entry in &entries_sexp[1..] {
        let parts = entry.list()?;
        let function_name = parts[0].atom()?;
        let function = module
            .function_named(function_name)
            .ok_or_else(|| ExecError::UnboundName(function_name.to_string()))?;
        let label = parts[1].atom()?;
        let block = module
            .block_labelled(function, label)
            .ok_or_else(|| ExecError::UnboundName(label.to_string()))?;
        let kind = match parts[2].atom()? {
            "in" => TransitionKind::In,
            "out" => TransitionKind::Out,
            "none" => TransitionKind::None,
            other => return Err(ExecError::UnboundName(other.to_string())),
        };
        entries.push(PathEntry { block, kind })
    }

    let last = items[3].nat()? as u32;

    let next_sexp = items[4].list()?;
    if next_sexp.first().and_then(|i| i.atom().ok()) != Some("next") {
        return Err(parse_err("expected a next instruction"));
    }
    let next = if next_sexp.len() == 2 && next_sexp[1].atom()? == "none" {
        None
    } else {
        let function_name = next_sexp[1].atom()?;
        let function = module
            .function_named(function_name)
            .ok_or_else(|| ExecError::UnboundName(function_name.to_string()))?;
        let label = next_sexp[2].atom()?;
        let block = module
            .block_labelled(function, label)
            .ok_or_else(|| ExecError::UnboundName(label.to_string()))?;
        Some(InstId::new(block, next_sexp[3].nat()? as u32))
    };

    Ok(Path::from_parts(first, entries, last, next))
}

fn parse_arrays(ctx: &Context, module: &Module, sexp: &Sexp) -> Result<ArrayEnv, ExecError> {
    let items = sexp.list()?;
    if items.first().and_then(|i| i.atom().ok()) != Some("arrays") {
        return Err(parse_err("expected array declarations"));
    }

    // Declarations can reference each other through size and pointer
    // expressions, so build whatever becomes buildable until nothing
    // is left
    let mut decls: Vec<(&str, &[Sexp])> = Vec::new();
    for decl in &items[1..] {
        let parts = decl.list()?;
        if parts.first().and_then(|i| i.atom().ok()) != Some("array") {
            return Err(parse_err("expected an array declaration"));
        }
        decls.push((parts[1].atom()?, parts));
    }

    let mut built: ArrayEnv = BTreeMap::new();
    loop {
        let mut progress = false;
        let mut missing = 0;
        for (name, parts) in &decls {
            if built.contains_key(*name) {
                continue;
            }
            let domain = parts[2].nat()? as u32;
            let range = parts[3].nat()? as u32;
            let size_sexp = parts[4].list()?;
            if size_sexp.first().and_then(|i| i.atom().ok()) != Some("size") {
                return Err(parse_err("expected an array size"));
            }
            let size = match parse_expr(ctx, &built, &size_sexp[1]) {
                Ok(size) => size,
                Err(ExecError::UnboundName(_)) => {
                    missing += 1;
                    continue;
                }
                Err(err) => return Err(err),
            };
            let source = match parse_source(ctx, module, &built, &parts[5]) {
                Ok(source) => source,
                Err(ExecError::UnboundName(other)) => {
                    // Could be a forward reference to an array, or a
                    // genuinely unknown name; retry once more arrays
                    // exist
                    if decls.iter().any(|(name, _)| *name == other) {
                        missing += 1;
                        continue;
                    }
                    return Err(ExecError::UnboundName(other));
                }
                Err(err) => return Err(err),
            };
            let array = ctx.array(source, domain, range, size);
            built.insert(name.to_string(), array);
            progress = true;
        }
        if missing == 0 {
            break;
        }
        if !progress {
            return Err(parse_err("cyclic array declarations"));
        }
    }
    Ok(built)
}

pub fn parse_lemmas(ctx: &Context, module: &Module, input: &str) -> Result<Vec<Lemma>, ExecError> {
    let sexps = parse_sexps(input)?;
    let mut lemmas = Vec::new();
    for sexp in &sexps {
        let items = sexp.list()?;
        if items.first().and_then(|i| i.atom().ok()) != Some("lemma") {
            return Err(parse_err("expected a lemma"));
        }
        let path = parse_path(module, &items[1])?;
        let arrays = parse_arrays(ctx, module, &items[2])?;

        let constraints_sexp = items[3].list()?;
        if constraints_sexp.first().and_then(|i| i.atom().ok()) != Some("constraints") {
            return Err(parse_err("expected constraints"));
        }
        let mut constraints = Vec::new();
        for constraint in &constraints_sexp[1..] {
            constraints.push(parse_expr(ctx, &arrays, constraint)?)
        }
        lemmas.push(Lemma::new(path, constraints))
    }
    Ok(lemmas)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Binop;
    use crate::ir::{BlockKind, ModuleBuilder};

    fn setup() -> (Context, Module, Vec<crate::ir::BlockId>) {
        let mut b = ModuleBuilder::new();
        let g = b.add_function("g", 0, true);
        let g0 = b.add_block(g, BlockKind::Base, 3);
        let g1 = b.add_block(g, BlockKind::Return, 1);
        b.add_edge(g0, g1);
        let f = b.add_function("f", 1, true);
        let f0 = b.add_call_block(f, &[g]);
        let f1 = b.add_block(f, BlockKind::Return, 2);
        b.add_edge(f0, f1);
        b.add_global("counter", 8);
        (Context::new(), b.finish(), vec![g0, g1, f0, f1])
    }

    fn symbolic(ctx: &Context, name: &str, width: u32) -> ExprRef {
        let size = ctx.constant(1, 32);
        let array =
            ctx.array(SymbolicSource::MakeSymbolic { name: name.to_string(), version: 0 }, 32, width, size);
        ctx.read(&array, ctx.constant(0, 32))
    }

    #[test]
    fn test_lemma_round_trip() {
        let (ctx, module, blocks) = setup();

        let path = Path::from_parts(
            1,
            vec![
                PathEntry { block: blocks[2], kind: TransitionKind::In },
                PathEntry { block: blocks[0], kind: TransitionKind::None },
            ],
            2,
            Some(InstId::new(blocks[0], 2)),
        );

        let x = symbolic(&ctx, "x", 32);
        let y = symbolic(&ctx, "y", 32);
        let c1 = ctx.eq(x.clone(), ctx.constant(5, 32));
        let c2 = ctx.binop(Binop::Ult, y.clone(), ctx.add(x.clone(), ctx.constant(1, 32)));
        let c3 = ctx.not(ctx.eq(ctx.extract(y.clone(), 0, 8), ctx.constant(1, 8)));
        let c4 = ctx.select(
            ctx.binop(Binop::Ule, x.clone(), y.clone()),
            ctx.constant(1, 1),
            ctx.eq(ctx.concat(ctx.constant(0, 24), ctx.extract(x, 0, 8)), y.clone()),
        );

        let lemma = Lemma::new(path, vec![c1, c2, c3, c4]);
        let printed = lemma_to_string(&module, &lemma);
        let parsed = parse_lemmas(&ctx, &module, &printed).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0], lemma)
    }

    #[test]
    fn test_round_trip_exotic_sources() {
        let (ctx, module, _) = setup();
        let f = module.function_named("f").unwrap();
        let counter = module.global_named("counter").unwrap();

        let arg_array =
            ctx.array(SymbolicSource::Argument { function: f, index: 0 }, 32, 64, ctx.constant(1, 32));
        let pointer = ctx.read(&arg_array, ctx.constant(0, 32));
        let content = ctx.array(
            SymbolicSource::LazyInitContent { pointer: pointer.clone() },
            32,
            8,
            ctx.constant(8, 32),
        );
        let global_array =
            ctx.array(SymbolicSource::Global { global: counter }, 32, 8, ctx.constant(8, 32));

        let c1 = ctx.eq(ctx.read(&content, ctx.constant(3, 32)), ctx.constant(0, 8));
        let c2 = ctx.binop(
            Binop::Ult,
            ctx.read(&global_array, ctx.constant(0, 32)),
            ctx.constant(100, 8),
        );

        let lemma = Lemma::new(Path::new(None), vec![c1, c2]);
        let printed = lemma_to_string(&module, &lemma);
        let parsed = parse_lemmas(&ctx, &module, &printed).unwrap();
        assert_eq!(parsed[0], lemma)
    }

    #[test]
    fn test_summary_dedup_and_flush() {
        let (ctx, module, blocks) = setup();
        let dir = std::env::temp_dir().join(format!("janus-summary-{}", std::process::id()));
        let _ = std::fs::create_dir_all(&dir);
        let file = dir.join("test.ksummary");
        let _ = std::fs::remove_file(&file);

        let x = symbolic(&ctx, "x", 8);
        let lemma = Lemma::new(
            Path::from_parts(
                0,
                vec![PathEntry { block: blocks[0], kind: TransitionKind::None }],
                1,
                Some(InstId::new(blocks[0], 2)),
            ),
            vec![ctx.eq(x, ctx.constant(3, 8))],
        );

        let mut summary = Summary::new(file.clone());
        summary.add_lemma(&module, lemma.clone()).unwrap();
        summary.add_lemma(&module, lemma.clone()).unwrap();
        summary.flush(&module).unwrap();
        assert_eq!(summary.lemmas().len(), 1);

        let mut reread = Summary::new(file.clone());
        reread.read_from_file(&ctx, &module).unwrap();
        assert_eq!(reread.lemmas().len(), 1);
        assert!(reread.lemmas().contains(&lemma));
        let _ = std::fs::remove_file(&file);
    }
}
