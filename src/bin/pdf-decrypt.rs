//! pdf-decrypt - Remove password protection from PDF files
//!
//! Authenticates with a user or owner password and writes the document
//! back without encryption.

use clap::{ArgAction, Parser};
use pdf_decrypter::{PDFDecryptError, PDFDecrypter, PDFPermissions};
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

/// Remove password protection from a PDF file
#[derive(Parser, Debug)]
#[command(name = "pdf-decrypt")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the encrypted PDF file
    input: PathBuf,

    /// User or owner password
    #[arg(short = 'p', long)]
    password: Option<String>,

    /// Output path (stdout when omitted)
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Only check the password; exit status 0 when it is accepted
    #[arg(long, action = ArgAction::SetTrue)]
    verify: bool,

    /// Print the encryption parameters
    #[arg(long, action = ArgAction::SetTrue)]
    info: bool,

    /// Use debug logging level
    #[arg(short = 'd', long, action = ArgAction::SetTrue)]
    debug: bool,
}

fn print_info(decrypter: &mut PDFDecrypter) -> Result<(), PDFDecryptError> {
    let info = decrypter.encryption_info()?;
    println!("File:             {}", decrypter.filename());
    println!("Algorithm:        {}", info.algorithm);
    println!("Version:          {}", info.version);
    println!("Revision:         {}", info.revision);
    println!("Encrypt metadata: {}", info.encrypt_metadata);
    println!("Permissions:      {:#010x}", info.permissions.bits());
    for (name, flag) in [
        ("print", PDFPermissions::PRINT),
        ("modify", PDFPermissions::MODIFY),
        ("copy", PDFPermissions::COPY),
        ("annotate", PDFPermissions::ANNOTATE),
        ("fill forms", PDFPermissions::FILL_FORMS),
        ("extract", PDFPermissions::EXTRACT),
        ("assemble", PDFPermissions::ASSEMBLE),
        ("print high", PDFPermissions::PRINT_HIGH),
    ] {
        println!("  {:<12} {}", name, if info.permissions.has_permission(flag) { "yes" } else { "no" });
    }
    Ok(())
}

fn run(args: Args) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let mut decrypter = PDFDecrypter::new();
    decrypter.open_file(&args.input)?;

    if args.info {
        print_info(&mut decrypter)?;
        if args.password.is_none() {
            return Ok(ExitCode::SUCCESS);
        }
    }

    let password = args.password.ok_or(PDFDecryptError::PasswordNotSet)?;
    decrypter.set_password(password);

    if args.verify {
        let verified = decrypter.verify_password()?;
        eprintln!("{}: password {}", decrypter.filename(), if verified { "accepted" } else { "rejected" });
        return Ok(if verified { ExitCode::SUCCESS } else { ExitCode::FAILURE });
    }

    let decrypted = decrypter.decrypt()?;
    match &args.output {
        Some(path) => {
            fs::write(path, &decrypted)?;
            eprintln!(
                "{}: decrypted to {}",
                decrypter.filename(),
                pdf_decrypter::file::display_name(path)
            );
        }
        None => {
            io::stdout().lock().write_all(&decrypted)?;
            eprintln!("{}: decrypted to stdout", decrypter.filename());
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = if args.debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match run(args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("pdf-decrypt: {}", e);
            ExitCode::FAILURE
        }
    }
}
