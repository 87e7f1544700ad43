//! Runs the plugin around a transaction plan read from a JSON file, the way the package manager
//! would.
//!
//! The plan is a list of package actions:
//!
//! ```json
//! [
//!   { "name": "kernel", "evr": "6.8.5-301.fc40", "arch": "x86_64", "action": "installed" },
//!   { "name": "vim", "evr": "2:9.1.264-1.fc40", "arch": "x86_64", "action": "upgraded" }
//! ]
//! ```
//!
//! With `--dry-run` no snapshot is taken, the descriptors are only printed. Run with `-v` to see
//! which packages made the snapshots important.

extern crate dnf_snapper;
#[macro_use]
extern crate clap;
extern crate env_logger;
extern crate log;
extern crate serde_json;

use clap::{App, Arg, ArgMatches};
use dnf_snapper::{
    new_instance, ConfigParser, Connect, Error, ErrorContext, ErrorKind, HostConfig,
    MemorySnapper, Plugin, PluginConfig, SnapperCli, TransactionPlan,
    REQUIRED_PLUGIN_API_VERSION,
};
use log::LevelFilter;

use std::error::Error as StdError;
use std::fs;
use std::path::PathBuf;

const DEFAULT_CONFIG: &str = "/etc/dnf/libdnf5-plugins/snapper.conf";
const DEFAULT_HOST_CONFIG: &str = "/etc/dnf/dnf.conf";

/// Command line arguments parsed into program config.
#[derive(Debug)]
pub struct Opts {
    /// How verbose should we be?
    pub verbosity: LevelFilter,
    /// The plugin's config file.
    pub config: PathBuf,
    /// The package manager's config file.
    pub host_config: PathBuf,
    /// The transaction to take snapshots around.
    pub plan: PathBuf,
    /// Record the snapshots in memory instead of calling snapper.
    pub dry_run: bool,
}

impl Opts {
    fn from_args<'a>(matches: ArgMatches<'a>) -> Opts {
        Opts {
            verbosity: match matches.occurrences_of("verbosity") {
                0 => LevelFilter::Warn,
                1 => LevelFilter::Info,
                _ => LevelFilter::Debug,
            },
            config: PathBuf::from(matches.value_of("config").unwrap_or(DEFAULT_CONFIG)),
            host_config: PathBuf::from(
                matches
                    .value_of("host-config")
                    .unwrap_or(DEFAULT_HOST_CONFIG),
            ),
            // `plan` is required
            plan: PathBuf::from(matches.value_of("plan").unwrap()),
            dry_run: matches.is_present("dry-run"),
        }
    }
}

fn run(opts: Opts) -> Result<(), Error> {
    // Missing config files mean defaults, like on a fresh install.
    let config = if opts.config.is_file() {
        ConfigParser::read(&opts.config)?
    } else {
        ConfigParser::new()
    };
    let host = if opts.host_config.is_file() {
        HostConfig::read(&opts.host_config)?
    } else {
        HostConfig::default()
    };

    let plan_file = fs::File::open(&opts.plan)?;
    let plan: TransactionPlan = serde_json::from_reader(plan_file)
        .context(ErrorKind::InvalidTransactionPlan(opts.plan.clone()))?;

    let recorder = MemorySnapper::new().with_config(config_name(&config), "/");
    let connector: Box<dyn Connect> = if opts.dry_run {
        Box::new(recorder.clone())
    } else {
        Box::new(SnapperCli::new())
    };

    let mut plugin = new_instance(REQUIRED_PLUGIN_API_VERSION, host, &config, connector)?;
    println!("{} plugin {}", plugin.name(), plugin.version());
    plugin.init()?;

    plugin.pre_transaction(&plan)?;
    plugin.post_transaction(&plan)?;

    if opts.dry_run {
        println!("-- Recorded snapshots --");
        for snapshot in recorder.snapshots() {
            match snapshot.pre_number {
                Some(pre) => println!("{} #{} (pre #{})", snapshot.kind, snapshot.number, pre),
                None => println!("{} #{}", snapshot.kind, snapshot.number),
            }
            println!(
                "{}",
                serde_json::to_string_pretty(&snapshot.scd).unwrap_or_default()
            );
        }
    } else if let Some((pre, post)) = plugin.last_pair() {
        println!("created snapshots {} and {}", pre, post);
    } else {
        println!("no snapshots were created");
    }
    Ok(())
}

/// The snapper config the plugin will use, for the dry-run backend.
fn config_name(config: &ConfigParser) -> String {
    PluginConfig::from_parser(config).snapper_config
}

fn main() {
    // Do argument parsing
    let args = App::new("snapper_hook")
        .author(crate_authors!())
        .version(crate_version!())
        .about("Takes snapper snapshots around a transaction plan.")
        .arg(
            Arg::with_name("verbosity")
                .long("verbose")
                .short("v")
                .multiple(true)
                .help("how verbose to be when logging"),
        )
        .arg(
            Arg::with_name("config")
                .long("config")
                .short("c")
                .takes_value(true)
                .help("the plugin configuration file"),
        )
        .arg(
            Arg::with_name("host-config")
                .long("host-config")
                .takes_value(true)
                .help("the package manager configuration file"),
        )
        .arg(
            Arg::with_name("plan")
                .long("plan")
                .short("p")
                .takes_value(true)
                .required(true)
                .help("a JSON file listing the package actions of the transaction"),
        )
        .arg(
            Arg::with_name("dry-run")
                .long("dry-run")
                .short("n")
                .help("print the snapshots instead of creating them"),
        )
        .get_matches();
    let opts = Opts::from_args(args);

    // Make logging nice
    let mut builder = env_logger::Builder::from_default_env();
    builder
        .filter_level(LevelFilter::Warn)
        .filter_module("dnf_snapper", opts.verbosity)
        .filter_module("snapper_hook", opts.verbosity)
        .init();

    if let Err(e) = run(opts) {
        println!("-- Error --");
        println!("{}", e);
        let mut cause = e.source();
        while let Some(c) = cause {
            println!("  caused by: {}", c);
            cause = c.source();
        }
        std::process::exit(1);
    }
}
