use anyhow::{Context, Result};
use flate2::read::MultiGzDecoder;
use regex::Regex;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;
use std::sync::OnceLock;

/// Matches `"kind": 123`, `"kind":456`, etc.
static KIND_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_kind_regex() -> &'static Regex {
    KIND_REGEX.get_or_init(|| {
        Regex::new(r#""kind"\s*:\s*(\d+)"#).expect("Failed to compile kind regex")
    })
}

const READ_BUFFER: usize = 1024 * 1024;

/// Line reader over JSONL input: a file, a `.gz` file, or `-` for stdin
pub struct InputReader {
    reader: Lines<Box<dyn BufRead>>,
    filter_invalid_kinds: bool,
    filtered_count: usize,
}

impl InputReader {
    #[cfg(test)]
    pub fn new(input: &str) -> Result<Self> {
        Self::with_options(input, false)
    }

    /// Open `input`
    ///
    /// With `filter_invalid_kinds`, lines whose kind does not fit a u16 are
    /// dropped before parsing and counted in [`filtered_count`](Self::filtered_count).
    pub fn with_options(input: &str, filter_invalid_kinds: bool) -> Result<Self> {
        let reader: Box<dyn BufRead> = if input == "-" {
            Box::new(BufReader::with_capacity(READ_BUFFER, std::io::stdin().lock()))
        } else {
            let path = Path::new(input);
            if !path.exists() {
                anyhow::bail!("Input file does not exist: {}", input);
            }

            let file = File::open(path).with_context(|| format!("Failed to open input file: {}", input))?;
            if path.extension().is_some_and(|ext| ext == "gz") {
                Box::new(BufReader::with_capacity(READ_BUFFER, MultiGzDecoder::new(file)))
            } else {
                Box::new(BufReader::with_capacity(READ_BUFFER, file))
            }
        };

        Ok(Self {
            reader: reader.lines(),
            filter_invalid_kinds,
            filtered_count: 0,
        })
    }

    pub fn filtered_count(&self) -> usize {
        self.filtered_count
    }

    /// True unless the line carries a kind above 65535
    ///
    /// Lines without a readable kind pass; parsing reports them later.
    pub fn has_valid_kind(line: &str) -> bool {
        get_kind_regex()
            .captures(line)
            .and_then(|captures| captures.get(1))
            .and_then(|kind_match| kind_match.as_str().parse::<u64>().ok())
            .is_none_or(|kind| kind <= u16::MAX as u64)
    }
}

impl Iterator for InputReader {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.reader.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e).context("Failed to read input line")),
            };

            if self.filter_invalid_kinds && !Self::has_valid_kind(&line) {
                self.filtered_count += 1;
                continue;
            }

            return Some(Ok(line));
        }
    }
}
