//! Reusable CLI runner: wires the parsed command into the library entry
//! points, resolves password material and renders progress on stderr.
//!
//! Progress rendering demonstrates the rendezvous form of the progress
//! handoff: the session callback sends each snapshot through a zero-capacity
//! channel, so the archive operation blocks until the printer thread has
//! taken the update and ordering can never invert.

use std::io::{self, IsTerminal, Write};
use std::thread::JoinHandle;

use crossbeam_channel::bounded;

use crate::cli::{self, Commands};
use crate::common::{
    ArchiveMeta, ArchivePack, ArchiveRead, ArchiveUnpack, DEFAULT_PROGRESS_DEBOUNCE,
};
use crate::progress::{Progress, ProgressStatus, Session};
use crate::{get_archive_file_list, is_archive_encrypted, start_packing, start_unpacking};

/// Public entry for running CLI logic.
pub fn run_cli_app() -> Result<(), Box<dyn std::error::Error>> {
    let command = cli::run()?;

    match command {
        Commands::List {
            archive,
            path,
            recursive,
            order_by,
            order_dir,
            password,
            ignore_patterns,
            json,
        } => {
            let mut meta = ArchiveMeta::new(archive);
            meta.gitignore_patterns = ignore_patterns;
            meta.passwords = prompt_if_encrypted(&meta, cli::passwords_from_opt_or_env(password))?;
            let read = ArchiveRead {
                list_directory_path: path,
                recursive,
                order_by: order_by.into(),
                order_dir: order_dir.into(),
                passwords: Vec::new(),
            };
            let entries = get_archive_file_list(&meta, &read)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                for entry in &entries {
                    println!(
                        "{:>12}  {}  {}",
                        entry.size,
                        entry.mod_time.format("%Y-%m-%d %H:%M"),
                        entry.full_path
                    );
                }
                eprintln!("{} entries", entries.len());
            }
        }

        Commands::Pack {
            inputs,
            output,
            password,
            zip_encryption,
            ignore_patterns,
            progress,
        } => {
            let mut meta = ArchiveMeta::new(output);
            meta.gitignore_patterns = ignore_patterns;
            let passwords =
                cli::passwords_from_opt_or_env(password.into_iter().collect::<Vec<_>>());
            let pack = ArchivePack {
                file_list: inputs,
                password: passwords.into_iter().next(),
                zip_encryption_method: zip_encryption.into(),
                progress_debounce: DEFAULT_PROGRESS_DEBOUNCE,
            };
            run_with_progress("pack", progress, |session| {
                start_packing(&meta, &pack, session)
            })?;
        }

        Commands::Unpack {
            archive,
            entries,
            output,
            password,
            ignore_patterns,
            progress,
        } => {
            let mut meta = ArchiveMeta::new(archive);
            meta.gitignore_patterns = ignore_patterns;
            let passwords = prompt_if_encrypted(&meta, cli::passwords_from_opt_or_env(password))?;
            let unpack = ArchiveUnpack {
                file_list: entries,
                destination: output,
                passwords,
                progress_debounce: DEFAULT_PROGRESS_DEBOUNCE,
            };
            run_with_progress("unpack", progress, |session| {
                start_unpacking(&meta, &unpack, session)
            })?;
        }

        Commands::Probe { archive, password } => {
            let mut meta = ArchiveMeta::new(archive);
            meta.passwords = cli::passwords_from_opt_or_env(password.into_iter().collect());
            let info = is_archive_encrypted(&meta)?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
    }

    Ok(())
}

/// Prompt once for a password when the archive is encrypted, nothing was
/// supplied and a terminal is attached.
fn prompt_if_encrypted(
    meta: &ArchiveMeta,
    passwords: Vec<String>,
) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    if !passwords.is_empty() || !io::stderr().is_terminal() {
        return Ok(passwords);
    }
    match is_archive_encrypted(meta) {
        Ok(info) if info.is_encrypted => {
            let password = rpassword::prompt_password("Archive password: ")?;
            Ok(vec![password])
        }
        _ => Ok(passwords),
    }
}

fn run_with_progress<F>(
    operation: &'static str,
    render: bool,
    run: F,
) -> Result<(), crate::ArchiverError>
where
    F: FnOnce(&mut Session) -> Result<(), crate::ArchiverError>,
{
    if !render {
        let mut session = Session::new(DEFAULT_PROGRESS_DEBOUNCE);
        return run(&mut session);
    }
    let (mut session, printer) = progress_session(operation);
    let result = run(&mut session);
    drop(session);
    let _ = printer.join();
    result
}

/// Build a session whose emissions feed a printer thread through a
/// zero-capacity rendezvous channel.
fn progress_session(operation: &'static str) -> (Session, JoinHandle<()>) {
    let (tx, rx) = bounded::<Progress>(0);
    let printer = std::thread::spawn(move || {
        for state in rx {
            render_progress_line(operation, &state);
        }
    });
    let tx_end = tx.clone();
    let session = Session::with_callbacks(
        DEFAULT_PROGRESS_DEBOUNCE,
        Box::new(move |p| {
            let _ = tx.send(p.clone());
        }),
        Box::new(move |p| {
            let _ = tx_end.send(p.clone());
        }),
    );
    (session, printer)
}

fn render_progress_line(operation: &str, state: &Progress) {
    const BAR_WIDTH: usize = 30;
    let percent = state.sent_size_progress_percentage;
    let filled = ((percent / 100.0) * BAR_WIDTH as f64) as usize;
    let bar = format!(
        "[{}{}]",
        "█".repeat(filled.min(BAR_WIDTH)),
        "░".repeat(BAR_WIDTH - filled.min(BAR_WIDTH))
    );
    eprint!(
        "\r\x1B[2K[{}] {} {:.1}% | {}/{} files | {:.1} MB/s",
        operation.to_uppercase(),
        bar,
        percent,
        state.sent_files_count,
        state.total_files,
        state.speed_mbps,
    );
    let _ = io::stderr().flush();
    if state.status != ProgressStatus::Running {
        eprintln!();
    }
}
