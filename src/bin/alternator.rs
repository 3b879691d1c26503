use std::process;

use anyhow::Result;

use petri_sync::config::PnConfig;
use petri_sync::demo::alternator;
use petri_sync::options::Options;
use petri_sync::util::init_logger;

fn main() -> Result<()> {
    init_logger();

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let options = match Options::parse_from_args(&args) {
        Ok(options) => options,
        Err(err) => {
            eprintln!("{err}");
            process::exit(2);
        }
    };
    log::debug!("PN options: {:?}", options);

    let mut config = PnConfig::load_from_file(&options.config)?;
    options.apply(&mut config);

    let report = alternator::run(&config.alternator)?;
    println!("{}", report.reachable_states);
    for (actor, sections) in ["p1", "p2", "p3"].iter().zip(&report.sections) {
        println!("{actor} entered {sections} times");
    }
    if report.exclusion_violated {
        eprintln!("mutual exclusion violated");
        process::exit(1);
    }
    Ok(())
}
