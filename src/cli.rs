//! Ambient CLI surface (spec §6's input record; argument *semantics*
//! beyond that field list are explicitly out of scope for the spec, so
//! this is ordinary `clap` derive usage, modernized from the teacher's
//! `structopt` idiom).

use std::path::PathBuf;

use clap::Parser;

use crate::engine::Mode;

#[derive(Parser, Debug)]
#[command(
    name = "perfregion",
    about = "Region-bounded hardware performance-counter sampler",
    trailing_var_arg = true
)]
pub struct Cli {
    /// Start address of the measured region, hex (e.g. 0x401020).
    #[arg(long, value_parser = parse_hex_addr)]
    pub begin: Option<u64>,

    /// End address of the measured region, hex.
    #[arg(long, value_parser = parse_hex_addr)]
    pub end: Option<u64>,

    /// Inclusive cap on the number of per-invocation samples.
    #[arg(long = "max-samples")]
    pub max_samples: Option<u32>,

    /// Wall-clock seconds before global mode is cut short. 0 (default)
    /// means no alarm.
    #[arg(long)]
    pub timeout: Option<u32>,

    /// Output path for the report; standard error if omitted.
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// The traced program and its own arguments.
    #[arg(required = true, allow_hyphen_values = true)]
    pub program_argv: Vec<String>,
}

fn parse_hex_addr(s: &str) -> Result<u64, String> {
    let trimmed = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
    u64::from_str_radix(trimmed, 16).map_err(|e| format!("invalid hex address {s:?}: {e}"))
}

impl Cli {
    /// Resolves the engine mode from `--begin`/`--end` (spec §6: both
    /// present and nonzero selects per-invocation mode; otherwise
    /// global).
    pub fn mode(&self) -> Mode {
        match (self.begin, self.end) {
            (Some(start), Some(end)) if start != 0 && end != 0 => Mode::PerInvocation {
                addr_start: start,
                addr_end: end,
                max_samples: self.max_samples.unwrap_or(u32::MAX),
            },
            _ => Mode::Global {
                timeout_seconds: self.timeout.filter(|&t| t != 0),
            },
        }
    }
}
