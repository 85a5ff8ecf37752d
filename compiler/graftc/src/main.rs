//! Graft CLI
//!
//! Compose augmentation chains ahead of time, inspect units, explain errors.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use graft_index::MemoryUnitIndex;
use graft_ir::{from_bytes, CompiledUnit, Instruction};
use graftc::{ChainRegistry, MemoryUnitSource};

fn main() {
    init_tracing();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        return;
    }

    match args[1].as_str() {
        "compose" => {
            if args.len() < 4 {
                eprintln!("Usage: graft compose <base-unit-name> <unit-file-or-dir>... [-o <dir>]");
                eprintln!();
                eprintln!("Options:");
                eprintln!("  -o <dir>   Output directory (default: current directory)");
                std::process::exit(1);
            }
            let base = &args[2];
            let mut files = Vec::new();
            let mut out_dir = PathBuf::from(".");
            let mut i = 3;
            while i < args.len() {
                if args[i] == "-o" && i + 1 < args.len() {
                    out_dir = PathBuf::from(&args[i + 1]);
                    i += 2;
                } else {
                    files.push(PathBuf::from(&args[i]));
                    i += 1;
                }
            }
            compose(base, &files, &out_dir);
        }
        "inspect" => {
            if args.len() < 3 {
                eprintln!("Usage: graft inspect <unit-file>");
                std::process::exit(1);
            }
            inspect(Path::new(&args[2]));
        }
        "explain" => {
            if args.len() < 3 {
                eprintln!("Usage: graft explain <error-kind>");
                eprintln!("Kinds: structural, invariant, lookup, registration, failed-chain");
                std::process::exit(1);
            }
            explain(&args[2]);
        }
        "version" | "--version" | "-V" => {
            println!("graft {}", env!("CARGO_PKG_VERSION"));
        }
        "help" | "--help" | "-h" => print_usage(),
        unknown => {
            eprintln!("Unknown command: {unknown}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_usage() {
    println!("Graft - augmentation chain compiler");
    println!();
    println!("Usage: graft <command> [arguments]");
    println!();
    println!("Commands:");
    println!("  compose <base> <unit-file-or-dir>... [-o <dir>]");
    println!("                       Compose a chain and write the merged units");
    println!("  inspect <unit-file>  Decode and print a unit's structure");
    println!("  explain <kind>       Describe an error kind");
    println!("  version              Show version");
    println!("  help                 Show this help");
}

/// Load every unit file (directories expand to their `.guf` entries), build
/// the index and byte source, register chains from the units' own
/// `augments` metadata, then compile `base`.
fn compose(base: &str, files: &[PathBuf], out_dir: &Path) {
    let mut index = MemoryUnitIndex::new();
    let mut source = MemoryUnitSource::new();
    let mut augmentations: Vec<(String, String)> = Vec::new();

    let mut expanded = Vec::new();
    for path in files {
        if path.is_dir() {
            match unit_files_in(path) {
                Ok(entries) => expanded.extend(entries),
                Err(err) => {
                    eprintln!("error: cannot read {}: {err}", path.display());
                    std::process::exit(1);
                }
            }
        } else {
            expanded.push(path.clone());
        }
    }

    for path in &expanded {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) => {
                eprintln!("error: cannot read {}: {err}", path.display());
                std::process::exit(1);
            }
        };
        let unit = match from_bytes(&bytes) {
            Ok(unit) => unit,
            Err(err) => {
                eprintln!("error: {}: {err}", path.display());
                std::process::exit(1);
            }
        };
        if let Err(err) = index.add_unit(&unit) {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
        if let Some(target) = &unit.augments {
            augmentations.push((target.clone(), unit.name.clone()));
        }
        source.insert(unit.name.clone(), bytes);
    }

    let registry = ChainRegistry::new(Arc::new(index), Arc::new(source));
    for (target, unit) in &augmentations {
        if let Err(err) = registry.augment(target, unit) {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    }

    match registry.compile(base) {
        Ok(output) => {
            if let Err(err) = std::fs::create_dir_all(out_dir) {
                eprintln!("error: cannot create {}: {err}", out_dir.display());
                std::process::exit(1);
            }
            let mut names: Vec<&String> = output.units().keys().collect();
            names.sort();
            for name in names {
                let bytes = output.get(name).unwrap_or_default();
                let file = out_dir.join(format!("{}.guf", name.replace('#', "__")));
                if let Err(err) = std::fs::write(&file, bytes) {
                    eprintln!("error: cannot write {}: {err}", file.display());
                    std::process::exit(1);
                }
                println!("wrote {} ({} bytes)", file.display(), bytes.len());
            }
        }
        Err(err) => {
            eprintln!("error[{}]: {err}", err.kind());
            std::process::exit(1);
        }
    }
}

/// `.guf` files directly inside `dir`, sorted for deterministic load order.
fn unit_files_in(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut entries = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|e| e == "guf") {
            entries.push(path);
        }
    }
    entries.sort();
    Ok(entries)
}

fn inspect(path: &Path) {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => {
            eprintln!("error: cannot read {}: {err}", path.display());
            std::process::exit(1);
        }
    };
    match from_bytes(&bytes) {
        Ok(unit) => print!("{}", dump_unit(&unit)),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    }
}

fn dump_unit(unit: &CompiledUnit) -> String {
    use std::fmt::Write;

    let mut out = String::new();
    let _ = writeln!(out, "unit {} [{:?}]", unit.name, unit.flags);
    if let Some(superty) = &unit.supertype {
        let _ = writeln!(out, "  extends {superty}");
    }
    for iface in &unit.interfaces {
        let _ = writeln!(out, "  implements {iface}");
    }
    if let Some(target) = &unit.augments {
        let _ = writeln!(out, "  augments {target}");
    }
    for tag in &unit.tags {
        let _ = writeln!(out, "  tag {tag}");
    }
    for field in &unit.fields {
        let _ = writeln!(
            out,
            "  field {} {}: {} [{:?}]",
            field.visibility, field.name, field.ty, field.flags
        );
    }
    for method in &unit.methods {
        let _ = writeln!(
            out,
            "  method {} {}{} -> {} [{:?}]",
            method.visibility,
            method.name,
            graft_ir::shape_descriptor(&method.shape),
            method.ret,
            method.flags
        );
        for hook in &method.hooks {
            match &hook.owner {
                Some(owner) => {
                    let _ = writeln!(out, "    pre-init {owner}::{}", hook.name);
                }
                None => {
                    let _ = writeln!(out, "    pre-init {}", hook.name);
                }
            }
        }
        if let Some(body) = &method.body {
            let _ = writeln!(
                out,
                "    code (stack {}, locals {}):",
                body.max_stack, body.max_locals
            );
            for (i, inst) in body.code.iter().enumerate() {
                let _ = writeln!(out, "      {i:4}: {}", render_inst(inst));
            }
        }
    }
    for nested in &unit.nested {
        let _ = writeln!(
            out,
            "  nested {} in {} as {}",
            nested.inner, nested.outer, nested.simple_name
        );
    }
    out
}

fn render_inst(inst: &Instruction) -> String {
    match inst {
        Instruction::Call { kind, target } => format!(
            "call.{kind} {}::{}{} -> {}",
            target.owner,
            target.name,
            graft_ir::shape_descriptor(&target.shape),
            target.ret
        ),
        Instruction::GetField(r) => format!("getfield {}::{}", r.owner, r.name),
        Instruction::PutField(r) => format!("putfield {}::{}", r.owner, r.name),
        Instruction::GetStatic(r) => format!("getstatic {}::{}", r.owner, r.name),
        Instruction::PutStatic(r) => format!("putstatic {}::{}", r.owner, r.name),
        other => format!("{other:?}"),
    }
}

fn explain(kind: &str) {
    let text = match kind {
        "structural" => {
            "A unit byte stream is malformed: bad magic, unsupported format\n\
             version, truncated data, or an identifier using the reserved `#`\n\
             separator. The offending chain compile aborts and is not retried;\n\
             the input unit must be rebuilt."
        }
        "invariant" => {
            "An augmentation violated the chain contract: narrowed the\n\
             visibility of an inherited member, redeclared a field with a\n\
             different type, declared the same member twice in one unit, or\n\
             collided with a synthesized constructor discriminator. The chain\n\
             is marked permanently failed; fix the offending augmentation."
        }
        "lookup" => {
            "The unit index or the byte source has no data for a unit the\n\
             chain references. Fatal for that chain only. Make sure every\n\
             chain member and nested unit is supplied before compiling."
        }
        "registration" => {
            "The chain could not accept a registration: it was already frozen\n\
             by its first compile, or the augmentation would make the chain\n\
             circular. Register all augmentations before the first compile."
        }
        "failed-chain" => {
            "A previous compile of this chain failed past the point of no\n\
             return. The chain is terminally unusable in this process; treat\n\
             the base unit as a hard capability loss rather than retrying."
        }
        other => {
            eprintln!("Unknown error kind: {other}");
            eprintln!();
            eprintln!("Kinds: structural, invariant, lookup, registration, failed-chain");
            std::process::exit(1);
        }
    };
    println!("{text}");
}
