//! logpager - print and follow pages of large log files
//!
//! A thin command-line front end over the paging engine.

use anyhow::Result;
use clap::{Arg, ArgAction, Command};
use log::LevelFilter;
use logpager::{
    Charset, ContentReader, LogHandle, LogSettings, LogTarget, PagerConfig, PagerError,
    PagingEngine, WatchMode,
};
use std::path::PathBuf;
use std::time::Duration;

fn print_page(lines: &[String]) {
    for line in lines {
        println!("{}", line);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let matches = Command::new("logpager")
        .version(logpager::VERSION)
        .about("Print the top or tail of a large log file, optionally following it")
        .long_about(
            "logpager reads large, growing log files a window of lines at a time \
             without loading them into memory, and can follow the tail as the file \
             is appended to, truncated or rotated.",
        )
        .arg(
            Arg::new("file")
                .help("Path to the log file to page")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::new("lines")
                .short('n')
                .long("lines")
                .help("Number of lines per page")
                .value_parser(clap::value_parser!(usize))
                .default_value("20"),
        )
        .arg(
            Arg::new("follow")
                .short('f')
                .long("follow")
                .help("Keep running and print the tail again whenever the file changes")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("from-top")
                .long("from-top")
                .help("Print the first page instead of the last")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("charset")
                .long("charset")
                .help("Charset used to decode lines (utf-8, latin1, ascii)"),
        )
        .arg(
            Arg::new("poll-ms")
                .long("poll-ms")
                .help("Change polling interval in milliseconds")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("notify")
                .long("notify")
                .help("Use OS change notifications in addition to polling")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("log-file")
                .long("log-file")
                .help("Append diagnostics to this file instead of stderr"),
        )
        .get_matches();

    let target = match matches.get_one::<String>("log-file") {
        Some(path) => LogTarget::File(PathBuf::from(path)),
        None => LogTarget::Stderr,
    };
    let logging = LogHandle::init(LogSettings {
        level: LevelFilter::Warn,
        target,
    })?;

    let Some(file) = matches.get_one::<String>("file") else {
        anyhow::bail!("a file to page is required");
    };
    let file_path = PathBuf::from(file);
    let page_lines = matches.get_one::<usize>("lines").copied().unwrap_or(20);
    if page_lines == 0 {
        anyhow::bail!("--lines must be at least 1");
    }

    let mut config = load_config()?;
    if let Some(charset) = matches.get_one::<String>("charset") {
        config = config.with_charset(charset.parse::<Charset>()?);
    }
    if let Some(ms) = matches.get_one::<u64>("poll-ms") {
        if *ms == 0 {
            return Err(PagerError::invalid_argument("--poll-ms must be at least 1").into());
        }
        config = config.with_poll_interval(Duration::from_millis(*ms));
    }
    if matches.get_flag("notify") {
        config = config.with_watch_mode(WatchMode::Notify);
    }

    let mut engine = PagingEngine::open(&file_path, config)?;
    let first_page = if matches.get_flag("from-top") {
        engine.to_top(page_lines)
    } else {
        engine.to_tail(page_lines)
    };
    let Some(first_page) = first_page else {
        anyhow::bail!("Cannot read file: {}", file_path.display());
    };
    print_page(&first_page);

    if matches.get_flag("follow") {
        let mut events = engine.subscribe();
        loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else { break };
                    log::debug!("{:?}", event);
                    println!("==> {} changed <==", file_path.display());
                    match engine.refresh(page_lines) {
                        Some(page) => print_page(&page),
                        None => println!("==> {} is not readable <==", file_path.display()),
                    }
                }
                _ = tokio::signal::ctrl_c() => break,
            }
        }
    }

    engine.close();
    logging.shutdown();
    Ok(())
}

#[cfg(feature = "config")]
fn load_config() -> Result<PagerConfig> {
    Ok(PagerConfig::load_default()?)
}

#[cfg(not(feature = "config"))]
fn load_config() -> Result<PagerConfig> {
    Ok(PagerConfig::default())
}
