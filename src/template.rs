//! Materialise config files that contain dynamic placeholders.
//!
//! A placeholder starts with a token marker and runs up to the next `>>`.
//! The only marker understood today is `<< now N >>`, which is replaced
//! with the local wall-clock time shifted by `N` seconds, formatted as
//! `HH:MM:SS`:
//! ```text
//! "start": "<< now -5 >>"   =>   "start": "09:59:55"
//! ```
//! The generated file belongs to the caller, which must delete it once the
//! daemon is done with it.
use chrono::{Duration, Local, NaiveDateTime};
use std::{
    fs::File,
    io::{self, BufRead, BufReader, BufWriter, Write},
    path::Path,
};

pub const NOW_TOKEN: &str = "<< now";
const TOKEN_END: &str = ">>";

/// Parses the text between a marker and `>>` into its replacement.
type TokenParser = fn(&str, NaiveDateTime) -> Result<String, String>;

const TOKENS: &[(&str, TokenParser)] = &[(NOW_TOKEN, parse_now_token)];

fn parse_now_token(body: &str, now: NaiveDateTime) -> Result<String, String> {
    let compact: String = body.chars().filter(|c| *c != ' ').collect();
    let offset: i64 = compact
        .parse()
        .map_err(|_| format!("'{}' is not a number of seconds", body.trim()))?;
    let shifted = Duration::try_seconds(offset)
        .and_then(|delta| now.checked_add_signed(delta))
        .ok_or_else(|| format!("{} seconds is out of range", offset))?;
    Ok(shifted.format("%H:%M:%S").to_string())
}

fn invalid(msg: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}

/// Replace every placeholder in `line`.
pub fn expand_line(line: &str, now: NaiveDateTime) -> io::Result<String> {
    let mut line = line.to_string();
    for (marker, parser) in TOKENS {
        let mut out = String::with_capacity(line.len());
        let mut rest = line.as_str();
        while let Some(start) = rest.find(marker) {
            let body_start = start + marker.len();
            let body_len = rest[body_start..].find(TOKEN_END).ok_or_else(|| {
                invalid(format!("unterminated '{}' in: {}", marker, line.trim_end()))
            })?;
            let body = &rest[body_start..body_start + body_len];
            out.push_str(&rest[..start]);
            out.push_str(&parser(body, now).map_err(invalid)?);
            rest = &rest[body_start + body_len + TOKEN_END.len()..];
        }
        out.push_str(rest);
        line = out;
    }
    Ok(line)
}

/// Expand `input` into `output` using the current local time.
pub fn expand(input: &Path, output: &Path) -> io::Result<()> {
    expand_at(input, output, Local::now().naive_local())
}

/// Expand `input` into `output` as if the wall clock read `now`. Line
/// endings are kept as they are, so lines without placeholders are copied
/// byte for byte.
pub fn expand_at(input: &Path, output: &Path, now: NaiveDateTime) -> io::Result<()> {
    let mut reader = BufReader::new(File::open(input)?);
    let mut writer = BufWriter::new(File::create(output)?);
    let mut buf = String::new();
    loop {
        buf.clear();
        if reader.read_line(&mut buf)? == 0 {
            break;
        }
        let body = buf.trim_end_matches(|c: char| c == '\n' || c == '\r');
        let ending = &buf[body.len()..];
        write!(writer, "{}{}", expand_line(body, now)?, ending)?;
    }
    writer.flush()
}
