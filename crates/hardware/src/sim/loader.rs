//! Disassembly dump loader.
//!
//! Parses a textual ppc64le objdump-style disassembly into tasks. Two
//! passes: the first builds an ordered address map of the relevant
//! instructions and a function-name map; the second materializes instruction
//! records, resolving every branch target through the address map into a
//! relative instruction-index delta.
//!
//! Dump shape, per line:
//! - `10000380 <main>:` — function header (address, then name in angle brackets),
//! - `10000384:\t<bytes>\t<mnemonic> <args>[\t<metadata>]` — instruction,
//! - anything without a tab is prose and is skipped.
//!
//! The optional metadata column annotates a branch's loop behavior: `u:N`
//! makes it taken on the first N encounters, `f:N` from the N-th encounter
//! onward. Unannotated direct branches are always taken; `blr` is a function
//! return; `cmp*` marks a compare.

use std::path::Path;

use thiserror::Error;
use tracing::debug;

use crate::isa::{Branch, Inst};
use crate::task::{Task, TaskCategory};

/// Fatal loader failures.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The dump file could not be read.
    #[error("reading dump: {0}")]
    Io(#[from] std::io::Error),

    /// A line looked like an instruction but could not be parsed.
    #[error("malformed dump line {line}: {text:?}")]
    Malformed {
        /// 1-based line number.
        line: usize,
        /// The offending line.
        text: String,
    },

    /// An instruction mnemonic outside the known classification.
    #[error("unknown mnemonic {0:?}")]
    UnknownMnemonic(String),

    /// A branch whose target address is not in the instruction map.
    #[error("branch at {addr:#x} targets {target:#x}, which maps to no instruction")]
    MissingTarget {
        /// Address of the branch instruction.
        addr: u64,
        /// Unresolvable target address.
        target: u64,
    },

    /// A branch with no target argument.
    #[error("branch at {addr:#x} has no target argument")]
    MissingTargetArg {
        /// Address of the branch instruction.
        addr: u64,
    },

    /// A requested function entry that the dump does not define.
    #[error("function entry {0:?} not found in dump")]
    MissingEntry(String),
}

/// Classification outcome for one mnemonic.
enum MnemonicClass {
    Inst(Inst),
    BranchLike,
    Skip,
}

/// One relevant line of the dump after the first pass.
struct RawInst {
    addr: u64,
    mnemonic: String,
    args: Vec<String>,
    metadata: String,
}

/// Loads a dump file and mints `count` tasks per `(function, count)` entry.
///
/// # Errors
///
/// Any [`LoadError`]; the loader never hands partially resolved instruction
/// streams to the core.
pub fn load_dump(path: &Path, entries: &[(String, usize)]) -> Result<Vec<Task>, LoadError> {
    let text = std::fs::read_to_string(path)?;
    parse_dump(&text, entries)
}

/// Parses dump text and mints `count` tasks per `(function, count)` entry.
///
/// All tasks share the dump's full instruction stream; each starts with its
/// cursor at its entry function's first instruction.
///
/// # Errors
///
/// Any [`LoadError`] except `Io`.
pub fn parse_dump(text: &str, entries: &[(String, usize)]) -> Result<Vec<Task>, LoadError> {
    let (insts, functions) = scan(text)?;

    let mut stream: Vec<Inst> = Vec::with_capacity(insts.len());
    for (position, raw) in insts.iter().enumerate() {
        let inst = match classify(&raw.mnemonic)? {
            MnemonicClass::Inst(inst) => inst,
            MnemonicClass::BranchLike => parse_branch(raw, position, &insts)?,
            MnemonicClass::Skip => unreachable!("skipped during scan"),
        };
        stream.push(inst);
    }
    debug!(instructions = stream.len(), functions = functions.len(), "dump parsed");

    let mut tasks = Vec::new();
    let mut next_id = 1;
    for (name, count) in entries {
        let entry_addr = functions
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, addr)| *addr)
            .ok_or_else(|| LoadError::MissingEntry(name.clone()))?;
        let entry_index = insts
            .iter()
            .position(|raw| raw.addr >= entry_addr)
            .ok_or_else(|| LoadError::MissingEntry(name.clone()))?;

        for _ in 0..*count {
            tasks.push(
                Task::new(next_id, TaskCategory::Fx, stream.clone())
                    .at_entry(entry_index, name.clone()),
            );
            next_id += 1;
        }
    }
    Ok(tasks)
}

/// First pass: collect relevant instructions and function entry points.
fn scan(text: &str) -> Result<(Vec<RawInst>, Vec<(String, u64)>), LoadError> {
    let mut insts = Vec::new();
    let mut functions = Vec::new();

    for (line_no, line) in text.lines().enumerate() {
        let line_no = line_no + 1;
        if line.trim().is_empty() {
            continue;
        }

        if line.starts_with(|c: char| c.is_ascii_hexdigit())
            && line.contains('<')
            && !line.contains('\t')
        {
            // Function header: "10000380 <main>:".
            let addr = parse_hex(line.split_whitespace().next().unwrap_or_default())
                .ok_or_else(|| malformed(line_no, line))?;
            if let Some(name) = between(line, '<', '>') {
                functions.push((name.to_string(), addr));
            }
            continue;
        }

        let mut parts = line.split('\t');
        let Some(addr_field) = parts.next() else {
            continue;
        };
        let Some(addr) = parse_hex(addr_field.trim().trim_end_matches(':')) else {
            // Prose (section banners and the like), not an instruction line.
            continue;
        };
        let _bytes = parts.next().ok_or_else(|| malformed(line_no, line))?;
        let text_field = parts.next().ok_or_else(|| malformed(line_no, line))?;
        let metadata = parts.next().unwrap_or("").trim().to_string();

        let mut words = text_field.split_whitespace();
        let Some(mnemonic) = words.next() else {
            return Err(malformed(line_no, line));
        };
        let args: Vec<String> = words.map(str::to_string).collect();

        match classify(mnemonic)? {
            MnemonicClass::Skip => {}
            _ => insts.push(RawInst {
                addr,
                mnemonic: mnemonic.to_string(),
                args,
                metadata,
            }),
        }
    }
    Ok((insts, functions))
}

/// Builds the branch record for a branch-classified mnemonic.
fn parse_branch(raw: &RawInst, position: usize, insts: &[RawInst]) -> Result<Inst, LoadError> {
    if matches!(raw.mnemonic.as_str(), "b" | "bl" | "blt" | "beq" | "bne" | "bgt") {
        let target_text = raw
            .args
            .first()
            .ok_or(LoadError::MissingTargetArg { addr: raw.addr })?;
        let target = parse_hex(target_text).ok_or(LoadError::MissingTargetArg { addr: raw.addr })?;
        let target_index = insts
            .iter()
            .position(|other| other.addr == target)
            .ok_or(LoadError::MissingTarget {
                addr: raw.addr,
                target,
            })?;
        let delta = target_index as i64 - position as i64;

        if let Some((kind, n)) = raw.metadata.split_once(':') {
            let n: u32 = n
                .trim()
                .parse()
                .map_err(|_| LoadError::MissingTargetArg { addr: raw.addr })?;
            match kind.trim() {
                "u" => return Ok(Inst::Branch(Branch::until(n, delta))),
                "f" => return Ok(Inst::Branch(Branch::after(n, delta))),
                _ => {}
            }
        }
        return Ok(Inst::Branch(Branch::prob(1.0, delta)));
    }

    if raw.mnemonic == "blr" {
        return Ok(Inst::Branch(Branch::ret()));
    }

    if matches!(
        raw.mnemonic.as_str(),
        "cmp" | "cmpi" | "cmpd" | "cmpdi" | "cmpw" | "cmpwi" | "cmpld"
    ) {
        return Ok(Inst::Branch(Branch::cmp()));
    }

    // Conditional forms without a resolvable target fall back to a
    // never-taken branch, matching how unhandled branch encodings behave.
    Ok(Inst::Branch(Branch::prob(0.0, 0)))
}

/// Classifies a mnemonic into an instruction kind, a branch, or a skip.
///
/// Prefix order matters: arithmetic prefixes are checked before the branch
/// prefixes so `and`/`add` never read as branches, and branch prefixes
/// before load/store so `bl` never reads as a load.
fn classify(mnemonic: &str) -> Result<MnemonicClass, LoadError> {
    const FX_PREFIXES: [&str; 15] = [
        "add", "sub", "mul", "div", "rl", "or", "xor", "nand", "and", "clrrdi", "clrldi", "sld",
        "slw", "sr", "ext",
    ];
    const FX_EXACT: [&str; 5] = ["mflr", "mtxer", "mtctr", "mr", "mtlr"];
    const IGNORED: [&str; 10] = [
        "sc", "tw", "twi", "td", "tdi", "sync", "isync", "tlbsync", "tlbie", "rfi",
    ];

    if FX_PREFIXES.iter().any(|p| mnemonic.starts_with(p)) {
        return Ok(MnemonicClass::Inst(Inst::Fx));
    }
    if mnemonic.starts_with('b') || mnemonic.starts_with("cmp") {
        return Ok(MnemonicClass::BranchLike);
    }
    if mnemonic.starts_with('l') || mnemonic.starts_with("st") {
        return Ok(MnemonicClass::Inst(Inst::Lsu));
    }
    if IGNORED.contains(&mnemonic) {
        // Syscalls and synchronization are outside the model.
        return Ok(MnemonicClass::Skip);
    }
    if FX_EXACT.contains(&mnemonic) {
        return Ok(MnemonicClass::Inst(Inst::Fx));
    }
    if mnemonic.starts_with("mtf") || mnemonic.starts_with("mff") {
        // FP register moves execute on the vector/scalar unit.
        return Ok(MnemonicClass::Inst(Inst::Vsu));
    }
    if mnemonic == "nop" {
        return Ok(MnemonicClass::Inst(Inst::Nop));
    }
    if mnemonic == ".long" {
        // Inline data.
        return Ok(MnemonicClass::Skip);
    }
    if mnemonic.starts_with('f') {
        return Ok(MnemonicClass::Inst(Inst::Vsu));
    }
    Err(LoadError::UnknownMnemonic(mnemonic.to_string()))
}

fn malformed(line: usize, text: &str) -> LoadError {
    LoadError::Malformed {
        line,
        text: text.to_string(),
    }
}

fn parse_hex(text: &str) -> Option<u64> {
    let text = text.trim().trim_start_matches("0x");
    (!text.is_empty() && text.chars().all(|c| c.is_ascii_hexdigit()))
        .then(|| u64::from_str_radix(text, 16).ok())
        .flatten()
}

fn between(line: &str, open: char, close: char) -> Option<&str> {
    let start = line.find(open)? + open.len_utf8();
    let end = line[start..].find(close)? + start;
    Some(&line[start..end])
}
