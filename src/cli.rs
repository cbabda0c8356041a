// Command-line front end for chunkdelta.
//
//   chunkdelta encode --old OLD NEW DELTA
//   chunkdelta decode --old OLD DELTA OUT
//   chunkdelta ops DELTA
//   chunkdelta config

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};

use crate::delta::encoder::DeltaEncoder;
use crate::delta::sink::Op;
use crate::format::{RecordReader, RecordWriter};
use crate::hash::config::{
    self, ConfigError, DEFAULT_LEVEL, DEFAULT_MAX_CHAIN, DEFAULT_MIN_MATCH, DEFAULT_WINDOW_SIZE,
    DeltaOptions,
};
use crate::hash::rolling::{MODULUS, MULTIPLIER};
use crate::store::{BlockStore, DEFAULT_BLOCK_SIZE};

const BUF_SIZE: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// Byte size parsing (supports K, M, G suffixes)
// ---------------------------------------------------------------------------

fn parse_byte_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty size string".into());
    }
    let (num_part, multiplier) = match s.as_bytes().last() {
        Some(b'k' | b'K') => (&s[..s.len() - 1], 1024u64),
        Some(b'm' | b'M') => (&s[..s.len() - 1], 1024 * 1024),
        Some(b'g' | b'G') => (&s[..s.len() - 1], 1024 * 1024 * 1024),
        _ => (s, 1u64),
    };
    let num: u64 = num_part
        .trim()
        .parse()
        .map_err(|e| format!("invalid size '{s}': {e}"))?;
    num.checked_mul(multiplier)
        .ok_or_else(|| format!("size overflow: '{s}'"))
}

// ---------------------------------------------------------------------------
// Clap CLI definition
// ---------------------------------------------------------------------------

/// Chunk-indexed binary delta encoder/decoder.
#[derive(Parser, Debug)]
#[command(
    name = "chunkdelta",
    version,
    about = "Chunk-indexed binary delta encoder/decoder",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Force overwrite existing output files.
    #[arg(short = 'f', long, global = true)]
    force: bool,

    /// Quiet mode (suppress non-error output).
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose mode (use twice for debug logging).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Output stats as JSON to stderr.
    #[arg(long = "json", global = true)]
    json_output: bool,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Compute the delta from an old file to a new one.
    Encode(EncodeArgs),
    /// Rebuild the new file from the old file and a delta.
    Decode(DecodeArgs),
    /// List the ADD / COPY records of a delta.
    Ops(OpsArgs),
    /// Print build/configuration details.
    Config,
}

#[derive(Args, Debug)]
struct EncodeTuningArgs {
    /// Compression level (0 = store only, 9 = slowest).
    #[arg(long, short = 'l', value_parser = clap::value_parser!(u32).range(0..=9), default_value_t = DEFAULT_LEVEL)]
    level: u32,

    /// Chunk and window width in bytes (overrides the level preset).
    #[arg(long = "window-size", short = 'w')]
    window_size: Option<usize>,

    /// Shortest match emitted as a COPY (overrides the level preset).
    #[arg(long = "min-match", short = 'm')]
    min_match: Option<usize>,

    /// Block size for buffering inputs (supports K/M/G suffix).
    #[arg(long = "block-size", value_parser = parse_byte_size, default_value_t = DEFAULT_BLOCK_SIZE as u64)]
    block_size: u64,

    /// Collision-chain entries probed per lookup (overrides the level preset).
    #[arg(long = "max-chain")]
    max_chain: Option<usize>,
}

#[derive(Args, Debug)]
struct EncodeArgs {
    /// Old file to copy from (default: empty).
    #[arg(long, short = 's', value_hint = ValueHint::FilePath)]
    old: Option<PathBuf>,

    /// New file (default: stdin).
    #[arg(long, value_hint = ValueHint::FilePath, conflicts_with = "input_pos")]
    input: Option<PathBuf>,

    /// Delta output file (default: stdout).
    #[arg(long, value_hint = ValueHint::FilePath, conflicts_with = "output_pos")]
    output: Option<PathBuf>,

    /// Write output to stdout.
    #[arg(short = 'c', long)]
    stdout: bool,

    #[command(flatten)]
    tuning: EncodeTuningArgs,

    /// New file (positional form).
    #[arg(value_hint = ValueHint::FilePath)]
    input_pos: Option<PathBuf>,

    /// Delta output file (positional form).
    #[arg(value_hint = ValueHint::FilePath)]
    output_pos: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct DecodeArgs {
    /// Old file the delta refers to (default: empty).
    #[arg(long, short = 's', value_hint = ValueHint::FilePath)]
    old: Option<PathBuf>,

    /// Delta file (default: stdin).
    #[arg(long, value_hint = ValueHint::FilePath, conflicts_with = "input_pos")]
    input: Option<PathBuf>,

    /// Output file (default: stdout).
    #[arg(long, value_hint = ValueHint::FilePath, conflicts_with = "output_pos")]
    output: Option<PathBuf>,

    /// Write output to stdout.
    #[arg(short = 'c', long)]
    stdout: bool,

    /// Validate the delta against the old file without writing output.
    #[arg(long = "check-only")]
    no_output: bool,

    /// Delta file (positional form).
    #[arg(value_hint = ValueHint::FilePath)]
    input_pos: Option<PathBuf>,

    /// Output file (positional form).
    #[arg(value_hint = ValueHint::FilePath)]
    output_pos: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct OpsArgs {
    /// Delta file.
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,
}

// ---------------------------------------------------------------------------
// Resolved command + options (flattened from Cli)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Encode,
    Decode,
    Ops,
    Config,
}

#[derive(Debug)]
struct Options {
    command: Command,
    use_stdout: bool,
    force: bool,
    quiet: bool,
    verbose: u8,
    json_output: bool,
    no_output: bool,
    level: u32,
    window_size: Option<usize>,
    min_match: Option<usize>,
    block_size: u64,
    max_chain: Option<usize>,
    old_file: Option<PathBuf>,
    input_file: Option<PathBuf>,
    output_file: Option<PathBuf>,
}

fn resolve_options(cli: Cli) -> Options {
    let Cli {
        command,
        force,
        quiet,
        verbose,
        json_output,
    } = cli;
    let base = |command| Options {
        command,
        use_stdout: false,
        force,
        quiet,
        verbose: verbose.min(2),
        json_output,
        no_output: false,
        level: DEFAULT_LEVEL,
        window_size: None,
        min_match: None,
        block_size: DEFAULT_BLOCK_SIZE as u64,
        max_chain: None,
        old_file: None,
        input_file: None,
        output_file: None,
    };

    match command {
        Cmd::Encode(args) => Options {
            use_stdout: args.stdout,
            level: args.tuning.level,
            window_size: args.tuning.window_size,
            min_match: args.tuning.min_match,
            block_size: args.tuning.block_size,
            max_chain: args.tuning.max_chain,
            old_file: args.old,
            input_file: args.input.or(args.input_pos),
            output_file: args.output.or(args.output_pos),
            ..base(Command::Encode)
        },
        Cmd::Decode(args) => Options {
            use_stdout: args.stdout,
            no_output: args.no_output,
            old_file: args.old,
            input_file: args.input.or(args.input_pos),
            output_file: args.output.or(args.output_pos),
            ..base(Command::Decode)
        },
        Cmd::Ops(args) => Options {
            input_file: Some(args.input),
            ..base(Command::Ops)
        },
        Cmd::Config => base(Command::Config),
    }
}

#[cfg(any(test, feature = "fuzzing"))]
pub fn fuzz_try_parse_args(args: &[String]) {
    let argv: Vec<String> = std::iter::once("chunkdelta".to_string())
        .chain(args.iter().cloned())
        .collect();
    if let Ok(cli) = Cli::try_parse_from(argv) {
        let opts = resolve_options(cli);
        let _ = build_delta_options(&opts);
    }
}

/// Level preset with explicit overrides applied, validated.
fn build_delta_options(opts: &Options) -> Result<DeltaOptions, ConfigError> {
    let mut delta = DeltaOptions::for_level(opts.level);
    if let Some(w) = opts.window_size {
        delta.window_size = w;
    }
    if let Some(m) = opts.min_match {
        delta.min_match = m;
    }
    if let Some(c) = opts.max_chain {
        delta.max_chain = c;
    }
    delta.block_size = usize::try_from(opts.block_size)
        .map_err(|_| ConfigError::BlockSizeTooLarge(opts.block_size))?;
    delta.validate()?;
    Ok(delta)
}

// ---------------------------------------------------------------------------
// Stream helpers
// ---------------------------------------------------------------------------

fn open_input(path: Option<&Path>, what: &str) -> Result<Box<dyn Read>, String> {
    match path {
        Some(path) => File::open(path)
            .map(|f| Box::new(BufReader::with_capacity(BUF_SIZE, f)) as Box<dyn Read>)
            .map_err(|e| format!("{what} file: {}: {e}", path.display())),
        None => Ok(Box::new(BufReader::new(io::stdin()))),
    }
}

fn open_old(path: Option<&Path>) -> Result<Box<dyn Read>, String> {
    match path {
        Some(_) => open_input(path, "old"),
        None => Ok(Box::new(io::empty())),
    }
}

fn open_output(opts: &Options) -> Result<Box<dyn Write>, String> {
    match (opts.use_stdout, &opts.output_file) {
        (true, _) | (_, None) => Ok(Box::new(BufWriter::with_capacity(
            BUF_SIZE,
            io::stdout().lock(),
        ))),
        (false, Some(path)) => {
            if path.exists() && !opts.force {
                return Err(format!(
                    "output file exists, use -f to overwrite: {}",
                    path.display()
                ));
            }
            File::create(path)
                .map(|f| Box::new(BufWriter::with_capacity(BUF_SIZE, f)) as Box<dyn Write>)
                .map_err(|e| format!("output file: {}: {e}", path.display()))
        }
    }
}

fn report_error(msg: impl std::fmt::Display) -> i32 {
    eprintln!("chunkdelta: {msg}");
    1
}

// ---------------------------------------------------------------------------
// Config command
// ---------------------------------------------------------------------------

fn cmd_config() -> i32 {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!("chunkdelta version {version}");

    let file_io = cfg!(feature = "file-io") as u8;
    let ptr_size = std::mem::size_of::<*const ()>();

    eprintln!("FILE_IO={file_io}");
    eprintln!("HASH_MODULUS={MODULUS}");
    eprintln!("HASH_MULTIPLIER={MULTIPLIER}");
    eprintln!("DEFAULT_LEVEL={DEFAULT_LEVEL}");
    eprintln!("DEFAULT_WINDOW_SIZE={DEFAULT_WINDOW_SIZE}");
    eprintln!("DEFAULT_MIN_MATCH={DEFAULT_MIN_MATCH}");
    eprintln!("DEFAULT_BLOCK_SIZE={DEFAULT_BLOCK_SIZE}");
    eprintln!("DEFAULT_MAX_CHAIN={DEFAULT_MAX_CHAIN}");
    for level in 1..=9 {
        let p = config::config_for_level(level);
        eprintln!(
            "LEVEL_{level}={} window={} min_match={} max_chain={}",
            p.name, p.window_size, p.min_match, p.max_chain
        );
    }
    eprintln!("sizeof(usize)={ptr_size}");

    0
}

// ---------------------------------------------------------------------------
// Encode command
// ---------------------------------------------------------------------------

fn cmd_encode(opts: &Options) -> i32 {
    let delta_opts = match build_delta_options(opts) {
        Ok(d) => d,
        Err(e) => return report_error(format!("invalid options: {e}")),
    };
    let old = match open_old(opts.old_file.as_deref()) {
        Ok(r) => r,
        Err(e) => return report_error(e),
    };
    let new = match open_input(opts.input_file.as_deref(), "input") {
        Ok(r) => r,
        Err(e) => return report_error(e),
    };
    let output = match open_output(opts) {
        Ok(w) => w,
        Err(e) => return report_error(e),
    };

    let encoder = match DeltaEncoder::new(delta_opts.clone()) {
        Ok(enc) => enc,
        Err(e) => return report_error(format!("invalid options: {e}")),
    };
    let mut writer = match RecordWriter::new(output, delta_opts.window_size) {
        Ok(w) => w,
        Err(e) => return report_error(format!("write error: {e}")),
    };
    let stats = match encoder.encode(old, new, &mut writer) {
        Ok(s) => s,
        Err(e) => return report_error(format!("encode error: {e}")),
    };
    let records = writer.records();
    let delta_size = writer.bytes_written();
    if let Err(e) = writer.finish() {
        return report_error(format!("write flush error: {e}"));
    }

    if opts.verbose > 0 && !opts.quiet {
        eprintln!(
            "chunkdelta: encoder: old size: {}, new size: {}, delta size: {delta_size}, \
             copies: {} ({} bytes), adds: {} ({} bytes)",
            stats.old_len,
            stats.new_len,
            stats.copies,
            stats.copied_bytes,
            stats.adds,
            stats.literal_bytes
        );
    }

    if opts.json_output {
        let json = serde_json::json!({
            "command": "encode",
            "old_size": stats.old_len,
            "new_size": stats.new_len,
            "delta_size": delta_size,
            "records": records,
            "copies": stats.copies,
            "adds": stats.adds,
            "copied_bytes": stats.copied_bytes,
            "literal_bytes": stats.literal_bytes,
            "collisions": stats.collisions,
            "short_matches": stats.short_matches,
            "level": opts.level,
            "window_size": delta_opts.window_size,
            "min_match": delta_opts.min_match,
        });
        eprintln!("{json:#}");
    }

    0
}

// ---------------------------------------------------------------------------
// Decode command
// ---------------------------------------------------------------------------

fn cmd_decode(opts: &Options) -> i32 {
    let old_reader = match open_old(opts.old_file.as_deref()) {
        Ok(r) => r,
        Err(e) => return report_error(e),
    };
    let old = match BlockStore::read(old_reader, DEFAULT_BLOCK_SIZE) {
        Ok(store) => store,
        Err(e) => return report_error(format!("old file: {e}")),
    };
    let delta = match open_input(opts.input_file.as_deref(), "input") {
        Ok(r) => r,
        Err(e) => return report_error(e),
    };
    let mut output: Box<dyn Write> = if opts.no_output {
        Box::new(io::sink())
    } else {
        match open_output(opts) {
            Ok(w) => w,
            Err(e) => return report_error(e),
        }
    };

    let applied = match RecordReader::new(delta).and_then(|r| r.apply_to(&old, &mut output)) {
        Ok(stats) => stats,
        Err(e) => return report_error(format!("decode error: {e}")),
    };
    if let Err(e) = output.flush() {
        return report_error(format!("write flush error: {e}"));
    }

    if opts.verbose > 0 && !opts.quiet {
        eprintln!(
            "chunkdelta: decoder: output size: {}, records: {}",
            applied.output_len, applied.records
        );
    }
    if opts.json_output {
        let json = serde_json::json!({
            "command": "decode",
            "old_size": old.len(),
            "output_size": applied.output_len,
            "records": applied.records,
            "adds": applied.adds,
            "copies": applied.copies,
        });
        eprintln!("{json:#}");
    }

    0
}

// ---------------------------------------------------------------------------
// Ops command
// ---------------------------------------------------------------------------

fn cmd_ops(opts: &Options) -> i32 {
    let Some(path) = opts.input_file.as_deref() else {
        return report_error("ops requires an input file");
    };
    let reader = match open_input(Some(path), "input") {
        Ok(r) => r,
        Err(e) => return report_error(e),
    };
    let reader = match RecordReader::new(reader) {
        Ok(r) => r,
        Err(e) => return report_error(format!("invalid delta header: {e}")),
    };

    let header = *reader.header();
    println!("container version:  {}", header.version);
    println!("window size:        {}", header.window_size);

    let mut out = BufWriter::new(io::stdout().lock());
    let mut position: u64 = 0;
    let (mut adds, mut copies) = (0u64, 0u64);
    for (i, op) in reader.enumerate() {
        let op = match op {
            Ok(op) => op,
            Err(e) => {
                let _ = out.flush();
                return report_error(format!("record {i}: {e}"));
            }
        };
        match op {
            Op::Add(_) => adds += 1,
            Op::Copy { .. } => copies += 1,
        }
        if let Err(e) = writeln!(out, "{i:6}  new={position:<10}  {op}") {
            return report_error(format!("write error: {e}"));
        }
        position += op.output_len();
    }
    if let Err(e) = out.flush() {
        return report_error(format!("write error: {e}"));
    }
    drop(out);

    if opts.json_output {
        let json = serde_json::json!({
            "command": "ops",
            "window_size": header.window_size,
            "records": adds + copies,
            "adds": adds,
            "copies": copies,
            "output_size": position,
        });
        eprintln!("{json:#}");
    }

    0
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn log_filter(opts: &Options) -> &'static str {
    match (opts.quiet, opts.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        _ => "debug",
    }
}

/// Main CLI entry point. Parses arguments via clap, dispatches commands.
pub fn run() -> ! {
    let cli = Cli::parse();
    let mut opts = resolve_options(cli);

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_filter(&opts)))
        .format_timestamp(None)
        .format_target(false)
        .init();

    if opts.use_stdout
        && !opts.quiet
        && let Some(path) = opts.output_file.take()
    {
        eprintln!(
            "chunkdelta: warning: -c option overrides output filename: {}",
            path.display()
        );
    }

    let exit_code = match opts.command {
        Command::Encode => cmd_encode(&opts),
        Command::Decode => cmd_decode(&opts),
        Command::Ops => cmd_ops(&opts),
        Command::Config => cmd_config(),
    };

    process::exit(exit_code);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
