//! aesgcm CLI - password-based streaming AES-256-GCM encryption.
//!
//! Reads standard input (or `--input`) and writes standard output (or
//! `--output`). Encrypted streams are `salt || ciphertext || tag`.
//!
//! Exit status: 0 on success, 1 on any I/O, crypto or setup failure,
//! 2 when decryption detects a tag mismatch.

mod prompt;

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, error, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use aesgcm_common::{Error, Password, EXIT_FAILURE, EXIT_SUCCESS};
use aesgcm_crypto::{KdfParams, Mode, DEFAULT_ITERATIONS};

use prompt::{ask_for_password, PasswordSource, TerminalPrompt};

#[derive(Parser)]
#[command(name = "aesgcm")]
#[command(about = "Password-based streaming AES-256-GCM encryption")]
#[command(version, args_override_self = true)]
struct Cli {
    /// Encrypt (default).
    #[arg(short, long, overrides_with = "decrypt")]
    encrypt: bool,

    /// Decrypt.
    #[arg(short, long, overrides_with = "encrypt")]
    decrypt: bool,

    /// Use this password instead of prompting for one.
    /// Insecure: the command line is visible to other processes.
    #[arg(short = 'k', long = "key", value_name = "PASSWORD")]
    password: Option<String>,

    /// Read from this file instead of standard input.
    #[arg(short, long, value_name = "PATH")]
    input: Option<PathBuf>,

    /// Write to this file instead of standard output.
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// PBKDF2 iteration count. Decryption must use the value used to encrypt.
    #[arg(
        long,
        value_name = "N",
        default_value_t = DEFAULT_ITERATIONS,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    iterations: u32,

    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,
}

impl fmt::Debug for Cli {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cli")
            .field("mode", &self.mode())
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("input", &self.input)
            .field("output", &self.output)
            .field("iterations", &self.iterations)
            .field("verbose", &self.verbose)
            .finish()
    }
}

impl Cli {
    fn mode(&self) -> Mode {
        if self.decrypt && !self.encrypt {
            Mode::Decrypt
        } else {
            Mode::Encrypt
        }
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return ExitCode::from(usage_exit_code(&err));
        }
    };

    // Logs go to stderr; stdout carries the data stream.
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(log_filter(cli.verbose))
        .with_writer(io::stderr)
        .with_target(false)
        .without_time()
        .compact()
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::from(EXIT_FAILURE);
    }

    match run(cli, &mut TerminalPrompt) {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(err) => {
            error!("{:#}", err);
            ExitCode::from(exit_code(&err))
        }
    }
}

/// `-v` forces debug output; otherwise `RUST_LOG` applies, defaulting to warnings.
fn log_filter(verbose: bool) -> EnvFilter {
    if verbose {
        return EnvFilter::new("debug");
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Help and version requests succeed; every other parse failure is a
/// generic failure, keeping status 2 for authentication errors.
fn usage_exit_code(err: &clap::Error) -> u8 {
    if err.use_stderr() {
        EXIT_FAILURE
    } else {
        EXIT_SUCCESS
    }
}

/// Map a failure to the process exit status.
fn exit_code(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<Error>()
        .map(Error::exit_code)
        .unwrap_or(EXIT_FAILURE)
}

fn run(mut cli: Cli, prompt: &mut dyn PasswordSource) -> Result<()> {
    let mode = cli.mode();
    let params = KdfParams::with_iterations(cli.iterations);

    // An empty inline password falls back to the prompt.
    let password = match cli.password.take().filter(|p| !p.is_empty()) {
        Some(inline) => Password::from(inline),
        None => ask_for_password(prompt)?,
    };

    let reader = open_input(cli.input.as_deref())?;
    let writer = open_output(cli.output.as_deref())?;

    debug!(?mode, iterations = params.iterations, "starting");

    let summary = match mode {
        Mode::Encrypt => {
            aesgcm_crypto::encrypt(password, &params, reader, writer).context("Encryption failed")?
        }
        Mode::Decrypt => match aesgcm_crypto::decrypt(password, &params, reader, writer) {
            Ok(summary) => summary,
            Err(err) => {
                if err.is_authentication() {
                    warn!("Signature comparison failed; any output written must be discarded");
                }
                return Err(err).context("Decryption failed");
            }
        },
    };

    debug!(bytes = summary.bytes_processed, tag = ?summary.tag, "finished");
    Ok(())
}

fn open_input(path: Option<&Path>) -> Result<Box<dyn Read>> {
    match path {
        Some(path) => {
            let file = File::open(path)
                .map_err(Error::from)
                .with_context(|| format!("Failed to open input {}", path.display()))?;
            Ok(Box::new(BufReader::new(file)))
        }
        None => Ok(Box::new(BufReader::new(io::stdin().lock()))),
    }
}

fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    match path {
        Some(path) => {
            let file = File::create(path)
                .map_err(Error::from)
                .with_context(|| format!("Failed to create output {}", path.display()))?;
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(BufWriter::new(io::stdout().lock()))),
    }
}
