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

use regex::Regex;
use std::fmt;

#[derive(Clone, Debug)]
pub struct LexError {
    pub pos: usize,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Lex error at position: {}", self.pos)
    }
}

pub struct Lexer<'input> {
    pub buf: &'input str,
    pub pos: usize,
}

impl<'input> Lexer<'input> {
    pub fn new(input: &'input str) -> Self {
        Lexer { buf: input, pos: 0 }
    }

    pub fn consume_whitespace(&mut self) -> Option<()> {
        loop {
            if self.buf.chars().next()?.is_whitespace() {
                self.pos += 1;
                self.buf = &self.buf[1..]
            } else {
                break Some(());
            }
        }
    }

    pub fn consume_regex(&mut self, r: &Regex) -> Option<(usize, &'input str, usize)> {
        match r.find(self.buf) {
            None => None,
            Some(mat) => {
                let start_pos = self.pos;
                self.pos += mat.end();
                self.buf = &self.buf[mat.end()..];
                Some((start_pos, mat.as_str(), self.pos))
            }
        }
    }
}

lazy_static! {
    pub static ref ATOM_REGEX: Regex = Regex::new(r"^[a-zA-Z_=><.!%:-][0-9a-zA-Z_=><.!%:-]*").unwrap();
    pub static ref BAR_ATOM_REGEX: Regex = Regex::new(r"^\|[^|]+\|").unwrap();
    pub static ref NAT_REGEX: Regex = Regex::new(r"^[0-9]+").unwrap();
}

#[derive(Clone, Debug)]
pub enum Tok<'input> {
    Nat(&'input str),
    Atom(&'input str),
    Lparen,
    Rparen,
}

impl<'input> fmt::Display for Tok<'input> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

pub struct SexpLexer<'input> {
    lexer: Lexer<'input>,
}

impl<'input> SexpLexer<'input> {
    pub fn new(input: &'input str) -> Self {
        SexpLexer { lexer: Lexer::new(input) }
    }
}

pub type Span<'input> = Result<(usize, Tok<'input>, usize), LexError>;

impl<'input> Iterator for SexpLexer<'input> {
    type Item = Span<'input>;

    fn next(&mut self) -> Option<Self::Item> {
        use Tok::*;
        self.lexer.consume_whitespace()?;
        let start_pos = self.lexer.pos;

        if self.lexer.buf.starts_with('(') {
            self.lexer.pos += 1;
            self.lexer.buf = &self.lexer.buf[1..];
            return Some(Ok((start_pos, Lparen, self.lexer.pos)));
        }
        if self.lexer.buf.starts_with(')') {
            self.lexer.pos += 1;
            self.lexer.buf = &self.lexer.buf[1..];
            return Some(Ok((start_pos, Rparen, self.lexer.pos)));
        }

        if let Some((from, id, to)) = self.lexer.consume_regex(&ATOM_REGEX) {
            return Some(Ok((from, Atom(id), to)));
        }

        if let Some((from, id, to)) = self.lexer.consume_regex(&BAR_ATOM_REGEX) {
            return Some(Ok((from, Atom(&id[1..(id.len() - 1)]), to)));
        }

        if let Some((from, n, to)) = self.lexer.consume_regex(&NAT_REGEX) {
            return Some(Ok((from, Nat(n), to)));
        }

        Some(Err(LexError { pos: self.lexer.pos }))
    }
}
