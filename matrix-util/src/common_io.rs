#![allow(dead_code)]

use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};

/// A matrix bundled with its row and column names
pub struct MatWithNames<M> {
    pub rows: Vec<Box<str>>,
    pub cols: Vec<Box<str>>,
    pub mat: M,
}

/// Take the file extension, treating `.gz` as a decoration
/// (e.g., `x.tsv.gz -> tsv`)
pub fn file_ext(file: &str) -> anyhow::Result<Box<str>> {
    let trimmed = file.strip_suffix(".gz").unwrap_or(file);
    trimmed
        .rsplit_once('.')
        .map(|(_, ext)| Box::from(ext))
        .ok_or(anyhow::anyhow!("no file extension in {}", file))
}

fn is_gzipped(file: &str) -> bool {
    file.ends_with(".gz")
}

/// Open a buffered reader, transparently decompressing `.gz` files
pub fn open_buf_reader(file: &str) -> anyhow::Result<Box<dyn BufRead>> {
    let handle = File::open(file)?;
    if is_gzipped(file) {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(handle))))
    } else {
        Ok(Box::new(BufReader::new(handle)))
    }
}

/// Open a buffered writer, transparently compressing `.gz` files
pub fn open_buf_writer(file: &str) -> anyhow::Result<Box<dyn Write>> {
    let handle = File::create(file)?;
    if is_gzipped(file) {
        Ok(Box::new(BufWriter::new(GzEncoder::new(
            handle,
            Compression::default(),
        ))))
    } else {
        Ok(Box::new(BufWriter::new(handle)))
    }
}

/// Read all lines of a (possibly gzipped) text file
pub fn read_lines(file: &str) -> anyhow::Result<Vec<Box<str>>> {
    let reader = open_buf_reader(file)?;
    let mut lines = vec![];
    for line in reader.lines() {
        lines.push(line?.into_boxed_str());
    }
    Ok(lines)
}

/// Write lines of text to a (possibly gzipped) file
pub fn write_lines(lines: &[Box<str>], file: &str) -> anyhow::Result<()> {
    let mut writer = open_buf_writer(file)?;
    for line in lines {
        writeln!(writer, "{}", line)?;
    }
    writer.flush()?;
    Ok(())
}

/// Split a line into words by any of the delimiters, skipping empty words
pub fn split_words(line: &str, delim: &[char]) -> Vec<Box<str>> {
    line.split(|c| delim.contains(&c))
        .filter(|w| !w.is_empty())
        .map(Box::from)
        .collect()
}
