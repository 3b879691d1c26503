//! Parsing Options.
//! `--config {file}` or `-c`, plus per-demo overrides of the config file.

use clap::{Arg, ArgAction, Command, value_parser};
use std::error::Error;

use crate::config::{DEFAULT_CONFIG_PATH, PnConfig};

fn make_options_parser() -> Command {
    Command::new("PN")
        .no_binary_name(true)
        .version("v0.1.0")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("TOML file with demo settings")
                .default_value(DEFAULT_CONFIG_PATH),
        )
        .arg(
            Arg::new("rounds")
                .short('r')
                .long("rounds")
                .value_name("N")
                .help("Critical sections to run in the alternator")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("workers")
                .short('w')
                .long("workers")
                .value_name("N")
                .help("Worker threads in the multiplicator")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("fair")
                .long("fair")
                .help("Wake blocked callers in arrival order")
                .action(ArgAction::SetTrue)
                .conflicts_with("unfair"),
        )
        .arg(
            Arg::new("unfair")
                .long("unfair")
                .help("Wake blocked callers in no particular order")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("operands")
                .value_name("A B")
                .help("Multiplication operands; read from stdin when omitted")
                .num_args(2)
                .value_parser(value_parser!(u64)),
        )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub config: String,
    pub rounds: Option<usize>,
    pub workers: Option<usize>,
    pub fair: Option<bool>,
    pub operands: Option<(u64, u64)>,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            config: DEFAULT_CONFIG_PATH.to_string(),
            rounds: None,
            workers: None,
            fair: None,
            operands: None,
        }
    }
}

impl Options {
    pub fn parse_from_args(flags: &[String]) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let app = make_options_parser();
        let matches = app.try_get_matches_from(flags.iter())?;

        let config = matches
            .get_one::<String>("config")
            .cloned()
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
        let fair = if matches.get_flag("fair") {
            Some(true)
        } else if matches.get_flag("unfair") {
            Some(false)
        } else {
            None
        };
        let operands = match matches.get_many::<u64>("operands") {
            Some(values) => match values.copied().collect::<Vec<_>>()[..] {
                [a, b] => Some((a, b)),
                _ => return Err("expected exactly two operands".into()),
            },
            None => None,
        };

        Ok(Options {
            config,
            rounds: matches.get_one::<usize>("rounds").copied(),
            workers: matches.get_one::<usize>("workers").copied(),
            fair,
            operands,
        })
    }

    /// Overrides the loaded config with whatever was given on the command line.
    pub fn apply(&self, config: &mut PnConfig) {
        if let Some(rounds) = self.rounds {
            config.alternator.rounds = rounds;
        }
        if let Some(workers) = self.workers {
            config.multiplicator.workers = workers;
        }
        if let Some(fair) = self.fair {
            config.alternator.fair = fair;
            config.multiplicator.fair = fair;
        }
    }
}
