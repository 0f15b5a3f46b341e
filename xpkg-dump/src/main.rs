use std::error;
use std::fs::File;
use std::io::{self, BufReader, Write as _};
use std::path::PathBuf;
use std::process::exit;

use argp::FromArgs;
use serde::Serialize;

use xpkg::config::Config;
use xpkg::pkgdb::{PackageRecord, Pkgdb, TransactionEntry};
use xpkg::transaction::{self, PreparedTransaction};
use xpkg::unpack::{self, codec};

const PROG_NAME: &str = env!("CARGO_PKG_NAME");
const PROG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Dump metadata from xpkg package archives, pkgdbs and transaction plans.
#[derive(Debug, FromArgs)]
#[argp(footer = "This tool only reads; it never resolves, fetches or commits anything.")]
struct AppOpts {
    /// Format the output to be human-readable.
    #[argp(switch, short = 'p', global)]
    pretty_print: bool,

    /// Show program name and version.
    #[argp(switch, short = 'V')]
    version: bool,

    #[argp(subcommand)]
    action: Option<Action>,
}

/// Read a package archive's header (props.plist, files.plist and the
/// optional INSTALL/REMOVE scripts), without extracting the payload.
#[derive(Debug, FromArgs)]
#[argp(subcommand, name = "archive")]
struct ArchiveOpts {
    /// Path to a package archive.
    #[argp(positional, arg_name = "file")]
    file: PathBuf,
}

/// Read records out of a locked pkgdb.
#[derive(Debug, FromArgs)]
#[argp(subcommand, name = "pkgdb")]
struct PkgdbOpts {
    /// Path to the pkgdb directory (the parent of `pkgdb.plist`).
    #[argp(positional, arg_name = "metadir")]
    metadir: PathBuf,

    /// Dump only this package's record instead of every installed package.
    #[argp(positional, arg_name = "pkgname")]
    pkgname: Option<String>,
}

/// Run the checks pipeline over an already-resolved list of transaction
/// entries and dump the resulting plan.
///
/// Takes a resolved entry list as input rather than resolving one itself:
/// this tool never walks dependencies or talks to a repository, it only
/// replays the checks a real commit would run against the local pkgdb
/// and root.
#[derive(Debug, FromArgs)]
#[argp(subcommand, name = "plan")]
struct PlanOpts {
    /// Root directory the checks run against (its `var/db/xbps` is
    /// locked as the pkgdb).
    #[argp(positional, arg_name = "rootdir")]
    rootdir: PathBuf,

    /// Path to a JSON file holding an array of transaction entries.
    #[argp(positional, arg_name = "entries")]
    entries: PathBuf,

    /// Disable the file-collision check, allowing two packages to claim
    /// the same path.
    #[argp(switch)]
    force_overwrite: bool,

    /// Force pruning of modified obsolete files and conffiles.
    #[argp(switch)]
    force_remove_files: bool,
}

#[derive(Debug, FromArgs)]
#[argp(subcommand)]
enum Action {
    Archive(ArchiveOpts),
    Pkgdb(PkgdbOpts),
    Plan(PlanOpts),
}

fn main() {
    let args: AppOpts = argp::from_env();

    if args.version {
        println!("{} {}", PROG_NAME, PROG_VERSION);
        exit(0);
    }

    if let Err(e) = run(args) {
        eprintln!("{}", format_error_message(e));
        exit(1);
    }
}

fn run(args: AppOpts) -> Result<(), Box<dyn error::Error>> {
    let action = args.action.ok_or("no subcommand specified")?;

    match action {
        Action::Archive(opts) => {
            if !opts.file.is_file() {
                return Err(format!("'{}' is not a regular file", opts.file.to_string_lossy()).into());
            }
            let file = File::open(&opts.file)
            .map_err(|e| format!("cannot open file '{}': {}", opts.file.to_string_lossy(), e))?;
            let reader = codec::wrap(BufReader::new(file))?;
            let header = unpack::read_header(&mut tar::Archive::new(reader))?;

            dump_json(
                &ArchiveDump {
                    has_install_script: header.install_script.is_some(),
                    has_remove_script: header.remove_script.is_some(),
                    props: header.props,
                    manifest: header.manifest,
                },
                args.pretty_print,
            )?;
        }
        Action::Pkgdb(opts) => {
            let pkgdb = Pkgdb::lock(&opts.metadir)?;

            if let Some(pkgname) = opts.pkgname {
                let record = pkgdb
                .get_pkg(&pkgname)?
                .ok_or_else(|| format!("no such package '{}' in pkgdb", pkgname))?;
                dump_json(record, args.pretty_print)?;
            } else {
                let mut records: Vec<&PackageRecord> = Vec::new();
                pkgdb.foreach_cb(|pkg| records.push(pkg));
                dump_json(&records, args.pretty_print)?;
            }
        }
        Action::Plan(opts) => {
            let file = File::open(&opts.entries)
            .map_err(|e| format!("cannot open file '{}': {}", opts.entries.to_string_lossy(), e))?;
            let entries: Vec<TransactionEntry> = serde_json::from_reader(BufReader::new(file))?;

            let mut pkgdb = Pkgdb::lock(opts.rootdir.join("var/db/xbps"))?;
            let config = Config::load(&opts.rootdir)?;

            let prepared: PreparedTransaction = transaction::prepare(
                entries,
                Vec::new(),
                &mut pkgdb,
                &opts.rootdir,
                &config.preserve,
                opts.force_overwrite,
                opts.force_remove_files,
            )?;

            dump_json(&prepared, args.pretty_print)?;
        }
    };

    Ok(())
}

/// The JSON shape `archive` dumps: the two script members are reduced to
/// presence flags since their contents are shell source, not data worth
/// echoing back.
#[derive(Debug, Serialize)]
struct ArchiveDump {
    has_install_script: bool,
    has_remove_script: bool,
    props: PackageRecord,
    manifest: unpack::FilesManifest,
}

fn dump_json<T: ?Sized + serde::Serialize>(value: &T, pretty: bool) -> Result<(), serde_json::Error> {
    if pretty {
        serde_json::to_writer_pretty(io::stdout(), value)?;
    } else {
        serde_json::to_writer(io::stdout(), value)?;
    }
    let _ = io::stdout().write(b"\n");
    Ok(())
}

fn format_error_message(error: Box<dyn error::Error>) -> String {
    let mut msg = String::from(PROG_NAME);

    let mut source = Some(error.as_ref());
    while let Some(e) = source {
        msg.push_str(": ");
        msg.push_str(&e.to_string());

        source = e.source();
    }
    msg
}
