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

//! Read a `.ksummary` lemma file against a serialized module, check
//! that pretty-printing and re-parsing is the identity, and
//! optionally dump the lemmas human-readably.

use getopts::Options;
use std::process::exit;

use janus_lib::expr::Context;
use janus_lib::ir::Module;
use janus_lib::lemma::{lemma_to_string, parse_lemmas};

fn print_usage(opts: &Options, code: i32) -> ! {
    let brief = "Usage: janus-lemmas -m <module.toml> [options] <file.ksummary>";
    eprint!("{}", opts.usage(brief));
    exit(code)
}

fn main() {
    let args: Vec<String> = std::env::args().collect();

    let mut opts = Options::new();
    opts.reqopt("m", "module", "serialized module the lemmas refer to", "<file>");
    opts.optflag("d", "dump", "print each lemma");
    opts.optflag("h", "help", "print this help message");

    let matches = match opts.parse(&args[1..]) {
        Ok(matches) => matches,
        Err(e) => {
            eprintln!("Error when parsing command-line arguments: {}", e);
            print_usage(&opts, 1)
        }
    };

    if matches.opt_present("help") {
        print_usage(&opts, 0)
    }

    let module_file = matches.opt_str("module").unwrap();
    let summary_file = match matches.free.first() {
        Some(file) => file.clone(),
        None => print_usage(&opts, 1),
    };

    let module_contents = match std::fs::read_to_string(&module_file) {
        Ok(contents) => contents,
        Err(e) => {
            eprintln!("Could not read {}: {}", module_file, e);
            exit(1)
        }
    };
    let module: Module = match toml::from_str(&module_contents) {
        Ok(module) => module,
        Err(e) => {
            eprintln!("Could not parse module {}: {}", module_file, e);
            exit(1)
        }
    };

    let contents = match std::fs::read_to_string(&summary_file) {
        Ok(contents) => contents,
        Err(e) => {
            eprintln!("Could not read {}: {}", summary_file, e);
            exit(1)
        }
    };

    let ctx = Context::new();
    let lemmas = match parse_lemmas(&ctx, &module, &contents) {
        Ok(lemmas) => lemmas,
        Err(e) => {
            eprintln!("Could not parse {}: {}", summary_file, e);
            exit(1)
        }
    };

    let mut broken = 0;
    for lemma in &lemmas {
        let printed = lemma_to_string(&module, lemma);
        match parse_lemmas(&ctx, &module, &printed) {
            Ok(reparsed) if reparsed.len() == 1 && &reparsed[0] == lemma => (),
            _ => {
                eprintln!("Lemma does not round-trip: {}", lemma.path.to_string(&module));
                broken += 1
            }
        }
        if matches.opt_present("dump") {
            println!("{}", lemma.path.to_string(&module));
            for constraint in &lemma.constraints {
                println!("  {}", constraint)
            }
        }
    }

    println!("{} lemmas, {} round-trip failures", lemmas.len(), broken);
    if broken > 0 {
        exit(1)
    }
}
