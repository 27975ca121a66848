//! Netwatch CLI
//!
//! Command-line caller of `netwatch-core`: generate and manage keys, encrypt
//! and sign text, and encrypt or decrypt files without loading them whole.
//!
//! Keys persist in `--store` (default: the platform data directory under
//! `netwatch/keys`). Text results are URL-safe base64 on stdout; logs go to
//! stderr.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{bail, eyre, WrapErr};
use color_eyre::Result;
use tempfile::NamedTempFile;

use netwatch_core::crypto::{HEADER_SIZE, RSA_KEY_BITS, RSA_MAX_PLAINTEXT};
use netwatch_core::{Algorithm, CoreConfig, CryptoService, Error, KeyHandle};

/// Largest RSA envelope: header plus one RSA block
const RSA_MAX_ENVELOPE: usize = HEADER_SIZE + RSA_KEY_BITS / 8;

// ── CLI Arguments ─────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "netwatch", version, about = "Netwatch key management and encryption")]
struct Cli {
    /// Directory holding persisted keys
    #[arg(long, global = true, env = "NETWATCH_STORE")]
    store: Option<PathBuf>,

    /// JSON config file (CoreConfig)
    #[arg(long, global = true, env = "NETWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

/// Which key an operation uses
#[derive(Args, Debug)]
struct KeySelect {
    /// Use the key stored under this alias
    #[arg(short, long, conflicts_with = "algorithm")]
    alias: Option<String>,

    /// Use the active key of this algorithm (AES, RSA, EC)
    #[arg(short = 'g', long)]
    algorithm: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List supported algorithms
    Caps {
        /// Show parameters and operations
        #[arg(short, long)]
        detail: bool,
    },

    /// Generate a key (replaces an existing key under the alias unless the
    /// config sets the reject policy)
    Keygen {
        /// Key alias
        alias: String,
        /// Algorithm (AES, RSA, EC)
        algorithm: String,
    },

    /// List stored keys
    Keys,

    /// Delete a key
    Delete {
        /// Key alias
        alias: String,
    },

    /// Encrypt text
    Encrypt {
        /// Text to encrypt
        text: String,
        #[command(flatten)]
        key: KeySelect,
    },

    /// Decrypt base64 ciphertext
    Decrypt {
        /// Ciphertext from `encrypt`
        ciphertext: String,
        #[command(flatten)]
        key: KeySelect,
    },

    /// Sign text
    Sign {
        /// Text to sign
        text: String,
        #[command(flatten)]
        key: KeySelect,
    },

    /// Verify a signature (exit status 1 if invalid)
    Verify {
        /// Signed text
        text: String,
        /// Signature from `sign`
        signature: String,
        #[command(flatten)]
        key: KeySelect,
    },

    /// Encrypt a file (RSA keys take files of at most 190 bytes)
    EncryptFile {
        /// Plaintext input
        input: PathBuf,
        /// Ciphertext output
        output: PathBuf,
        #[command(flatten)]
        key: KeySelect,
    },

    /// Decrypt a file
    DecryptFile {
        /// Ciphertext input
        input: PathBuf,
        /// Plaintext output (only written once fully authenticated)
        output: PathBuf,
        #[command(flatten)]
        key: KeySelect,
    },
}

// ── Entry Point ───────────────────────────────────────────────────────────────

/// How a command finished
#[derive(Debug, PartialEq, Eq)]
enum Outcome {
    Done,
    /// `verify` rejected the signature
    Invalid,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let config = load_config(&cli)?;
    init_tracing(cli.verbose || config.verbose_logging);

    let outcome = if let Command::Caps { detail } = cli.command {
        cmd_caps(detail)?
    } else {
        let service = Arc::new(CryptoService::open(config).wrap_err("Failed to open key store")?);
        let result = run(&service, cli.command).await;
        service.close();
        result?
    };

    Ok(match outcome {
        Outcome::Done => ExitCode::SUCCESS,
        Outcome::Invalid => ExitCode::FAILURE,
    })
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "netwatch=debug,netwatch_core=debug"
    } else {
        "netwatch=warn,netwatch_core=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn load_config(cli: &Cli) -> Result<CoreConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .wrap_err_with(|| format!("Failed to read config {}", path.display()))?;
            CoreConfig::from_json(&json)?
        }
        None => CoreConfig::default(),
    };

    if let Some(store) = &cli.store {
        config.storage_path = Some(store.to_string_lossy().into_owned());
    } else if config.storage_path.is_none() {
        let dir = dirs::data_dir()
            .ok_or_else(|| eyre!("No data directory on this platform; pass --store"))?
            .join("netwatch")
            .join("keys");
        config.storage_path = Some(dir.to_string_lossy().into_owned());
    }
    Ok(config)
}

async fn run(service: &Arc<CryptoService>, command: Command) -> Result<Outcome> {
    match command {
        Command::Caps { detail } => cmd_caps(detail),
        Command::Keygen { alias, algorithm } => {
            let handle = service.generate_key_async(alias, algorithm).await?;
            print_handle(&handle);
            Ok(Outcome::Done)
        }
        Command::Keys => {
            for handle in service.list_keys()? {
                print_handle(&handle);
            }
            Ok(Outcome::Done)
        }
        Command::Delete { alias } => {
            if service.delete_key(&alias)? {
                println!("deleted {}", alias);
            } else {
                println!("no key under {}", alias);
            }
            Ok(Outcome::Done)
        }
        Command::Encrypt { text, key } => {
            let out = match &key.alias {
                Some(alias) => service.encrypt_text_with_key(&text, alias)?,
                None => service.encrypt_text(&text, key.algorithm.as_deref())?,
            };
            println!("{}", out);
            Ok(Outcome::Done)
        }
        Command::Decrypt { ciphertext, key } => {
            let out = match &key.alias {
                Some(alias) => service.decrypt_text_with_key(&ciphertext, alias)?,
                None => service.decrypt_text(&ciphertext, key.algorithm.as_deref())?,
            };
            println!("{}", out);
            Ok(Outcome::Done)
        }
        Command::Sign { text, key } => {
            let out = match &key.alias {
                Some(alias) => service.sign_text_with_key(&text, alias)?,
                None => service.sign_text(&text, key.algorithm.as_deref())?,
            };
            println!("{}", out);
            Ok(Outcome::Done)
        }
        Command::Verify { text, signature, key } => {
            let valid = match &key.alias {
                Some(alias) => service.verify_text_with_key(&text, &signature, alias)?,
                None => service.verify_text(&text, &signature, key.algorithm.as_deref())?,
            };
            if !valid {
                println!("invalid");
                return Ok(Outcome::Invalid);
            }
            println!("valid");
            Ok(Outcome::Done)
        }
        Command::EncryptFile { input, output, key } => {
            let consumed = encrypt_file(service, &input, &output, &key)?;
            println!("encrypted {} bytes into {}", consumed, output.display());
            Ok(Outcome::Done)
        }
        Command::DecryptFile { input, output, key } => {
            let consumed = decrypt_file(service, &input, &output, &key)?;
            println!("decrypted {} bytes into {}", consumed, output.display());
            Ok(Outcome::Done)
        }
    }
}

fn cmd_caps(detail: bool) -> Result<Outcome> {
    if detail {
        println!("{}", serde_json::to_string_pretty(netwatch_core::list_capabilities())?);
    } else {
        for capability in netwatch_core::list_capabilities() {
            println!("{}", capability.name);
        }
    }
    Ok(Outcome::Done)
}

fn print_handle(handle: &KeyHandle) {
    let created = netwatch_core::time::format_millis(handle.created_at).unwrap_or_default();
    println!(
        "{:<24} {:<4} {:<28} {} {}",
        handle.alias, handle.algorithm, handle.purposes, handle.key_id, created
    );
}

/// Algorithm of the key `key` selects for a cipher operation
fn cipher_algorithm(service: &CryptoService, key: &KeySelect) -> Result<Algorithm> {
    Ok(match (&key.alias, key.algorithm.as_deref().map(str::trim)) {
        (Some(alias), _) => service.get_key(alias)?.algorithm,
        (None, None | Some("")) => service.config().default_cipher_algorithm,
        (None, Some(name)) => name.parse()?,
    })
}

/// Encrypt `input` into `output`, returning the plaintext size
///
/// AES and EC stream in chunks. RSA envelopes hold a single block, so RSA
/// reads the whole (small) file and seals it in one go.
fn encrypt_file(service: &CryptoService, input: &Path, output: &Path, key: &KeySelect) -> Result<u64> {
    let rsa = cipher_algorithm(service, key)? == Algorithm::Rsa;
    transform_file(input, output, |reader, writer| {
        if !rsa {
            return match &key.alias {
                Some(alias) => service.encrypt_stream_with_key(reader, writer, alias),
                None => service.encrypt_stream(reader, writer, key.algorithm.as_deref()),
            };
        }

        let data = read_bounded(reader, RSA_MAX_PLAINTEXT, |size| Error::PayloadTooLarge {
            algorithm: "RSA",
            size,
            limit: RSA_MAX_PLAINTEXT,
        })?;
        let sealed = match &key.alias {
            Some(alias) => service.encrypt_file_with_key(&data, alias)?,
            None => service.encrypt_file(&data, key.algorithm.as_deref())?,
        };
        writer.write_all(&sealed)?;
        Ok(data.len() as u64)
    })
}

/// Decrypt `input` into `output`, returning the plaintext size
fn decrypt_file(service: &CryptoService, input: &Path, output: &Path, key: &KeySelect) -> Result<u64> {
    let rsa = cipher_algorithm(service, key)? == Algorithm::Rsa;
    transform_file(input, output, |reader, writer| {
        if !rsa {
            return match &key.alias {
                Some(alias) => service.decrypt_stream_with_key(reader, writer, alias),
                None => service.decrypt_stream(reader, writer, key.algorithm.as_deref()),
            };
        }

        let data = read_bounded(reader, RSA_MAX_ENVELOPE, |size| {
            Error::DecryptionFailed(format!("{} bytes is too large for an RSA envelope", size))
        })?;
        let plain = match &key.alias {
            Some(alias) => service.decrypt_file_with_key(&data, alias)?,
            None => service.decrypt_file(&data, key.algorithm.as_deref())?,
        };
        writer.write_all(&plain)?;
        Ok(plain.len() as u64)
    })
}

/// Read all of `reader`, failing with `too_large(size)` past `limit` bytes
fn read_bounded<F>(reader: BufReader<File>, limit: usize, too_large: F) -> netwatch_core::Result<Vec<u8>>
where
    F: FnOnce(usize) -> Error,
{
    let size = reader.get_ref().metadata()?.len();
    if size > limit as u64 {
        return Err(too_large(usize::try_from(size).unwrap_or(usize::MAX)));
    }

    let mut data = Vec::with_capacity(limit);
    reader.take(limit as u64 + 1).read_to_end(&mut data)?;
    if data.len() > limit {
        return Err(too_large(data.len()));
    }
    Ok(data)
}

/// Stream `input` through `op` into a temp file beside `output`, then move it
/// into place. A failed run leaves `output` untouched.
fn transform_file<F>(input: &Path, output: &Path, op: F) -> Result<u64>
where
    F: FnOnce(BufReader<File>, &mut BufWriter<&mut File>) -> netwatch_core::Result<u64>,
{
    if input == output {
        bail!("Input and output must be different files");
    }
    let reader = BufReader::new(
        File::open(input).wrap_err_with(|| format!("Failed to open {}", input.display()))?,
    );

    let dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let mut tmp = NamedTempFile::new_in(&dir)
        .wrap_err_with(|| format!("Failed to create temp file in {}", dir.display()))?;

    let written = {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        let written = op(reader, &mut writer)?;
        writer.flush()?;
        written
    };
    tmp.as_file().sync_all()?;
    tmp.persist(output)
        .wrap_err_with(|| format!("Failed to write {}", output.display()))?;
    tracing::debug!(bytes = written, output = %output.display(), "File written");
    Ok(written)
}
