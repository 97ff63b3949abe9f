use std::{
    fs::{self, File, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
};

use chrono::{Days, Local, NaiveDate};
use env_logger::{fmt::Formatter, Target};
use log::{Level, LevelFilter, Record};

use crate::{
    error::{Error, Result},
    format::{format_date, format_timestamp},
};

const LOG_FILE_PREFIX: &str = "runlift.log.";
const LOG_RETENTION_DAYS: u64 = 5;

/// Console logging only.
pub fn init(level: LevelFilter) -> Result<()> {
    env_logger::Builder::new()
        .format(format)
        .filter_level(level)
        .try_init()
        .map_err(Error::other)
}

/// Console logging plus a timestamped copy of every line in
/// `<log_dir>/runlift.log.<date>`. Dated logs past retention are removed.
pub fn init_with_file(level: LevelFilter, log_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(log_dir)?;
    remove_old_logs(log_dir, Local::now().date_naive())?;

    let path = log_dir.join(format!("{LOG_FILE_PREFIX}{}", format_date(&Local::now())));
    let file = OpenOptions::new().create(true).append(true).open(&path)?;

    env_logger::Builder::new()
        .format(format_timestamped)
        .filter_level(level)
        .target(Target::Pipe(Box::new(Tee { file })))
        .try_init()
        .map_err(Error::other)?;

    Ok(path)
}

pub fn log_level_from_args(verbose: u8, quiet: u8) -> LevelFilter {
    match i16::from(verbose) - i16::from(quiet) {
        ..=-2 => LevelFilter::Error,
        -1 => LevelFilter::Warn,
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn format(f: &mut Formatter, record: &Record) -> io::Result<()> {
    let level = record.level();
    let style = f.default_level_style(level);
    let prefix = level_prefix(level);
    writeln!(f, "{style}{prefix}{style:#}{}", record.args())
}

fn format_timestamped(f: &mut Formatter, record: &Record) -> io::Result<()> {
    let prefix = level_prefix(record.level());
    let time = format_timestamp(&Local::now());
    writeln!(f, "{time} {prefix}{}", record.args())
}

fn level_prefix(level: Level) -> &'static str {
    match level {
        Level::Debug | Level::Trace | Level::Info => "",
        Level::Warn => "warning: ",
        Level::Error => "error: ",
    }
}

struct Tee {
    file: File,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        self.file.flush()
    }
}

fn remove_old_logs(log_dir: &Path, today: NaiveDate) -> Result<()> {
    let Some(cutoff) = today.checked_sub_days(Days::new(LOG_RETENTION_DAYS)) else {
        return Ok(());
    };

    for entry in fs::read_dir(log_dir)? {
        let path = entry?.path();
        let Some(date) = log_file_date(&path) else {
            continue;
        };

        if date < cutoff {
            fs::remove_file(&path)?;
        }
    }

    Ok(())
}

fn log_file_date(path: &Path) -> Option<NaiveDate> {
    let name = path.file_name()?.to_str()?;
    let date = name.strip_prefix(LOG_FILE_PREFIX)?;
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}
