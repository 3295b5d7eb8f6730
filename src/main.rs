use std::process;

use bytesize::ByteSize;
use clap::ArgEnum;
use env_logger;
use log;

use line_ext_sort::{Collation, ExternalSorter, Order, SortConfigBuilder};

fn main() {
    let arg_parser = build_arg_parser();

    let log_level: LogLevel = arg_parser.value_of_t_or_exit("log_level");
    init_logger(log_level);

    let order: SortOrder = arg_parser.value_of_t_or_exit("sort");
    let input = arg_parser.value_of("input").expect("value is required");
    let output = arg_parser.value_of("output").expect("value is required");
    let workspace = arg_parser.value_of("workspace").expect("value is required");
    let memory = arg_parser.value_of("memory").expect("value is required");

    let mut config_builder = SortConfigBuilder::new(input, output, workspace)
        .with_memory_budget(memory.parse::<ByteSize>().expect("value is pre-validated").as_u64())
        .with_order(match order {
            SortOrder::Asc => Order::Asc,
            SortOrder::Desc => Order::Desc,
        })
        .with_collation(if arg_parser.is_present("ordinal") {
            Collation::Ordinal
        } else {
            Collation::Locale
        })
        .with_remove_workspace(arg_parser.is_present("remove_workspace"))
        .with_filter_empty_lines(!arg_parser.is_present("keep_empty"));

    if arg_parser.is_present("cursors") {
        config_builder = config_builder.with_max_cursors(arg_parser.value_of_t_or_exit("cursors"));
    }
    if let Some(prefix) = arg_parser.value_of("prefix") {
        config_builder = config_builder.with_chunk_prefix(prefix);
    }
    if arg_parser.is_present("threads") {
        config_builder = config_builder.with_threads_number(arg_parser.value_of_t_or_exit("threads"));
    }

    let sorter = match ExternalSorter::new(config_builder.build()) {
        Ok(sorter) => sorter,
        Err(err) => {
            log::error!("sorter initialization error: {}", err);
            process::exit(1);
        }
    };

    if let Err(err) = sorter.sort() {
        log::error!("data sorting error: {}", err);
        process::exit(1);
    }
}

#[derive(Copy, Clone, clap::ArgEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn possible_values() -> impl Iterator<Item = clap::PossibleValue<'static>> {
        Self::value_variants().iter().filter_map(|v| v.to_possible_value())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <LogLevel as clap::ArgEnum>::from_str(s, false)
    }
}

#[derive(Copy, Clone, clap::ArgEnum)]
enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn possible_values() -> impl Iterator<Item = clap::PossibleValue<'static>> {
        SortOrder::value_variants().iter().filter_map(|v| v.to_possible_value())
    }
}

impl std::str::FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <SortOrder as clap::ArgEnum>::from_str(s, false)
    }
}

fn build_arg_parser() -> clap::ArgMatches {
    clap::App::new("line-ext-sort")
        .about("external merge sort of newline-delimited text files")
        .arg(
            clap::Arg::new("input")
                .short('i')
                .long("input")
                .help("file to be sorted")
                .required(true)
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("output")
                .short('o')
                .long("output")
                .help("result file")
                .required(true)
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("workspace")
                .short('w')
                .long("workspace")
                .help("directory to store chunk files in (cleared before sorting)")
                .required(true)
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("memory")
                .short('m')
                .long("memory")
                .help("memory budget")
                .required(true)
                .takes_value(true)
                .validator(|v| match v.parse::<ByteSize>() {
                    Ok(_) => Ok(()),
                    Err(err) => Err(format!("Memory budget format incorrect: {}", err)),
                }),
        )
        .arg(
            clap::Arg::new("sort")
                .short('s')
                .long("sort")
                .help("sorting order")
                .takes_value(true)
                .default_value("asc")
                .possible_values(SortOrder::possible_values()),
        )
        .arg(
            clap::Arg::new("ordinal")
                .long("ordinal")
                .help("compare raw code points instead of locale-aware collation"),
        )
        .arg(
            clap::Arg::new("cursors")
                .short('c')
                .long("cursors")
                .help("maximum number of chunk files open at once during a merge")
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("prefix")
                .short('p')
                .long("prefix")
                .help("chunk file name prefix")
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("remove_workspace")
                .short('r')
                .long("remove-workspace")
                .help("remove the workspace directory after a successful sort"),
        )
        .arg(
            clap::Arg::new("keep_empty")
                .long("keep-empty")
                .help("keep empty lines in the result"),
        )
        .arg(
            clap::Arg::new("log_level")
                .short('l')
                .long("loglevel")
                .help("logging level")
                .takes_value(true)
                .default_value("info")
                .possible_values(LogLevel::possible_values()),
        )
        .arg(
            clap::Arg::new("threads")
                .short('t')
                .long("threads")
                .help("number of threads to use for parallel chunk sorting")
                .takes_value(true),
        )
        .get_matches()
}

fn init_logger(log_level: LogLevel) {
    env_logger::Builder::new()
        .filter_level(match log_level {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        })
        .format_timestamp_millis()
        .init();
}
