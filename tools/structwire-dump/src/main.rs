// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! structwire-dump - Inspect declarations and serialized packages
//!
//! `types` lists the layout computed for a set of C declaration files.
//! `dump` decodes a self-describing package and prints its instance tree.

use clap::{Parser, Subcommand};
use colored::*;
use structwire::types::{DeclarationParser, TypeTable};
use structwire::{Decoded, Diagnostic, MarshalConfig, Session, TypeRegistry};
use std::path::{Path, PathBuf};

/// Inspect structwire declarations and packages
#[derive(Parser, Debug)]
#[command(name = "structwire-dump")]
#[command(version = "0.1.0")]
#[command(about = "Inspect structure declarations and decode serialized packages")]
struct Args {
    /// Marshalling configuration file (.yaml or .json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse declaration files and print the computed layouts
    Types {
        /// Declaration files, parsed in order
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Predefine a constant (NAME=VALUE)
        #[arg(short = 'D', long = "define", value_parser = parse_define)]
        defines: Vec<(String, usize)>,

        /// Also print each declaration image
        #[arg(long)]
        images: bool,
    },

    /// Decode a package file and print its instance tree
    Dump {
        /// Package file written by `Session::write_package_file`
        package: PathBuf,

        /// Truncate arrays after N elements
        #[arg(short = 'n', long, default_value = "8")]
        max_elements: usize,

        /// Grow ragged instances to a common length before printing
        #[arg(short, long)]
        regularize: bool,

        /// Hide heap addresses
        #[arg(long)]
        no_addresses: bool,

        /// Print the received type table as well
        #[arg(short, long)]
        types: bool,
    },
}

fn parse_define(s: &str) -> Result<(String, usize), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got `{}`", s))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty constant name in `{}`", s));
    }
    let value = value
        .trim()
        .parse::<usize>()
        .map_err(|e| format!("{}: {}", name, e))?;
    Ok((name.to_string(), value))
}

fn main() {
    let args = Args::parse();
    let level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if let Err(e) = run(&args) {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &args.config {
        Some(path) => MarshalConfig::load(path)?,
        None => MarshalConfig::from_env()?,
    };
    log::debug!("configuration: {:?}", config);

    match &args.command {
        Command::Types {
            files,
            defines,
            images,
        } => {
            let registry = load_declarations(files, defines)?;
            print!("{}", TypeTable::new(&registry).with_images(*images));
            eprintln!(
                "{} {} types from {} files",
                ">>>".green().bold(),
                registry.len(),
                files.len()
            );
        }
        Command::Dump {
            package,
            max_elements,
            regularize,
            no_addresses,
            types,
        } => {
            let mut session = Session::with_config(config);
            let mut decoded = read_package(&mut session, package)?;
            if *regularize {
                let grown = session.regularize_all(&mut decoded.tree)?;
                log::debug!("regularized {} instances", grown);
            }
            if *types {
                print!("{}", TypeTable::new(session.registry()));
                println!();
            }
            print_diagnostics(&decoded.diagnostics);
            print!(
                "{}",
                session
                    .printer(&decoded.tree)
                    .max_elements(*max_elements)
                    .addresses(!*no_addresses)
            );
        }
    }
    Ok(())
}

fn load_declarations(
    files: &[PathBuf],
    defines: &[(String, usize)],
) -> Result<TypeRegistry, Box<dyn std::error::Error>> {
    let mut registry = TypeRegistry::new();
    let mut parser = defines
        .iter()
        .fold(DeclarationParser::new(), |p, (name, value)| {
            p.define(name.clone(), *value)
        });
    for file in files {
        let text = std::fs::read_to_string(file)
            .map_err(|e| format!("{}: {}", file.display(), e))?;
        parser = parser.source(file.display().to_string());
        let ids = parser.parse(&text, &mut registry)?;
        log::debug!("{}: {} types", file.display(), ids.len());
    }
    Ok(registry)
}

fn read_package(session: &mut Session, path: &Path) -> Result<Decoded, Box<dyn std::error::Error>> {
    match session.read_package_file(path) {
        Ok(decoded) => {
            eprintln!(
                "{} {} (protocol v{}, {} bytes, {} nodes)",
                ">>>".green().bold(),
                decoded.type_name,
                decoded.protocol_version,
                decoded.bytes,
                decoded.tree.len()
            );
            Ok(decoded)
        }
        Err(failure) => {
            print_diagnostics(&failure.diagnostics);
            Err(Box::new(failure))
        }
    }
}

fn print_diagnostics(diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        eprintln!(
            "{} {}: {}",
            "warning".yellow().bold(),
            diagnostic.location.dimmed(),
            diagnostic.error
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use structwire::TypeDescriptorBuilder;

    #[test]
    fn test_parse_define() {
        assert_eq!(parse_define("N=4").unwrap(), ("N".to_string(), 4));
        assert_eq!(parse_define(" LEN = 16 ").unwrap(), ("LEN".to_string(), 16));
        assert!(parse_define("N").is_err());
        assert!(parse_define("=3").is_err());
        assert!(parse_define("N=-1").is_err());
    }

    #[test]
    fn test_load_declarations_with_defines() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("point.h");
        std::fs::write(
            &file,
            "typedef struct { double x; double y; int tags[N]; } Point;\n",
        )
        .unwrap();
        let registry = load_declarations(&[file], &[("N".to_string(), 3)]).unwrap();
        let point = registry.find("Point").unwrap();
        assert_eq!(point.fields.len(), 3);
        assert_eq!(point.fields[2].count, 3);
    }

    #[test]
    fn test_read_package_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("pair.swp");
        let mut sender = Session::new();
        TypeDescriptorBuilder::new("Pair")
            .atomic("a", "short")
            .pointer("b", "int")
            .register(sender.registry_mut())
            .unwrap();
        let pair = sender.alloc_struct("Pair", 1).unwrap();
        let values = sender.alloc_slice(&[5i32, 6]).unwrap();
        sender.set_pointer(pair, "Pair", "b", values).unwrap();
        sender.write_package_file(&file, "Pair", pair).unwrap();

        let mut session = Session::new();
        let decoded = read_package(&mut session, &file).unwrap();
        assert_eq!(decoded.type_name, "Pair");
        let printed = session
            .printer(&decoded.tree)
            .addresses(false)
            .to_string();
        assert!(printed.contains("Pair"));
    }
}
