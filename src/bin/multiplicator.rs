use std::io::{self, Read};
use std::process;

use anyhow::{Context, Result, bail};

use petri_sync::config::PnConfig;
use petri_sync::demo::multiplicator;
use petri_sync::options::Options;
use petri_sync::util::init_logger;

fn read_operands(input: &str) -> Result<(u64, u64)> {
    let mut numbers = input.split_whitespace().map(|word| {
        word.parse::<u64>()
            .with_context(|| format!("not a nonnegative integer: {word:?}"))
    });
    match (numbers.next(), numbers.next()) {
        (Some(a), Some(b)) => Ok((a?, b?)),
        _ => bail!("expected two integers on stdin"),
    }
}

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

    let (a, b) = match options.operands {
        Some(operands) => operands,
        None => {
            let mut input = String::new();
            io::stdin()
                .read_to_string(&mut input)
                .context("failed to read operands from stdin")?;
            read_operands(&input)?
        }
    };

    let product = multiplicator::multiply(a, b, &config.multiplicator)?;
    for (worker, fired) in product.fired.iter().enumerate() {
        println!("worker-{worker} fired: {fired}");
    }
    println!("Result: {}", product.value);
    Ok(())
}
