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

//! Janus explores a program's compiled IR in both directions at once:
//! forward from the entry point towards error and coverage targets,
//! and backward from those targets as proof obligations, composing
//! reached isolated segments with concrete calling contexts to prove
//! or refute reachability of marked program points.

#[macro_use]
extern crate lazy_static;

pub mod backward;
pub mod compose;
pub mod config;
pub mod constraints;
pub mod distance;
pub mod engine;
pub mod error;
pub mod expr;
pub mod forest;
pub mod graph;
pub mod hub;
pub mod initializer;
pub mod ir;
pub mod lemma;
pub mod lexer;
pub mod log;
pub mod memory;
pub mod path;
pub mod pob;
pub mod process;
pub mod scheduler;
pub mod searcher;
pub mod solver;
pub mod state;
pub mod target;
pub mod targeting;
pub mod ticker;
pub mod weights;
