use std::fs;
use std::io;
use std::path;
use std::process;

use bytesize::ByteSize;
use env_logger;
use log;

use ext_uniq::ExternalSorterBuilder;

fn main() {
    let arg_parser = build_arg_parser();

    init_logger(arg_parser.value_of("log_level").expect("value has a default"));

    let input = arg_parser.value_of("input").expect("value is required");
    let input_stream = match fs::File::open(input) {
        Ok(file) => io::BufReader::new(file),
        Err(err) => {
            log::error!("input file opening error: {}", err);
            process::exit(1);
        }
    };

    let output = arg_parser.value_of("output").expect("value is required");
    let output_stream = match fs::File::create(output) {
        Ok(file) => io::BufWriter::new(file),
        Err(err) => {
            log::error!("output file creation error: {}", err);
            process::exit(1);
        }
    };

    let chunk_size = arg_parser.value_of("chunk_size").expect("value has a default");
    let chunk_size = chunk_size.parse::<ByteSize>().expect("value is pre-validated").as_u64();

    let threads: Option<usize> = arg_parser
        .is_present("threads")
        .then(|| arg_parser.value_of_t_or_exit("threads"));

    let mut sorter_builder = ExternalSorterBuilder::new().with_chunk_size(chunk_size);
    if let Some(threads) = threads {
        sorter_builder = sorter_builder.with_threads_number(threads);
    }
    if let Some(tmp_dir) = arg_parser.value_of("tmp_dir") {
        sorter_builder = sorter_builder.with_tmp_dir(path::Path::new(tmp_dir));
    }

    let sorter = match sorter_builder.build() {
        Ok(sorter) => sorter,
        Err(err) => {
            log::error!("sorter initialization error: {}", err);
            process::exit(1);
        }
    };

    let summary = match sorter.sort(input_stream, output_stream) {
        Ok(summary) => summary,
        Err(err) => {
            log::error!("sorting error: {}", err);
            process::exit(1);
        }
    };

    log::info!(
        "done: {} lines in, {} distinct lines out ({} chunks)",
        summary.lines_read,
        summary.lines_written,
        summary.chunks
    );
}

fn build_arg_parser() -> clap::ArgMatches {
    clap::App::new("ext-uniq")
        .author("Dmitry P. <dapper1291@gmail.com>")
        .about("sorts a newline-delimited text file and removes duplicate lines")
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
            clap::Arg::new("log_level")
                .short('l')
                .long("loglevel")
                .help("logging level")
                .takes_value(true)
                .default_value("info")
                .possible_values(["off", "error", "warn", "info", "debug", "trace"]),
        )
        .arg(
            clap::Arg::new("threads")
                .short('t')
                .long("threads")
                .help("number of threads to use for parallel chunk sorting")
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("tmp_dir")
                .short('d')
                .long("tmp-dir")
                .help("directory to be used to store temporary data")
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("chunk_size")
                .short('c')
                .long("chunk-size")
                .help("chunk size")
                .takes_value(true)
                .default_value("10MiB")
                .validator(|v| match v.parse::<ByteSize>() {
                    Ok(_) => Ok(()),
                    Err(err) => Err(format!("Chunk size format incorrect: {}", err)),
                }),
        )
        .get_matches()
}

fn init_logger(log_level: &str) {
    env_logger::Builder::new()
        .filter_level(match log_level {
            "off" => log::LevelFilter::Off,
            "error" => log::LevelFilter::Error,
            "warn" => log::LevelFilter::Warn,
            "info" => log::LevelFilter::Info,
            "debug" => log::LevelFilter::Debug,
            "trace" => log::LevelFilter::Trace,
            _ => unreachable!("value is pre-validated"),
        })
        .format_timestamp_millis()
        .init();
}
