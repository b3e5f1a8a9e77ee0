// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Sample sources: ordered, finite supplies of kinematic samples.
//!
//! The reference source replays a recorded trace file, one numeric value
//! per line, eight lines per beacon. [`VecSource`] serves synthetic
//! trajectories and tests.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Trace values consumed per sample.
pub const VALUES_PER_SAMPLE: usize = 8;

/// One trace cycle: the eight values consumed per beacon, in wire order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CamSample {
    pub distance: f64,
    pub relative_speed: f64,
    pub node_id: u32,
    pub acceleration: f64,
    pub controller_acceleration: f64,
    pub speed: f64,
    pub posx: f64,
    pub posy: f64,
}

impl CamSample {
    /// Build a sample from eight raw trace values in the fixed order
    /// `(distance, relativeSpeed, nodeId, acceleration,
    /// controllerAcceleration, speed, posx, posy)`.
    ///
    /// `nodeId` is truncated toward zero; negative values clamp to 0.
    pub fn from_values(values: [f64; VALUES_PER_SAMPLE]) -> Self {
        Self {
            distance: values[0],
            relative_speed: values[1],
            node_id: values[2] as u32,
            acceleration: values[3],
            controller_acceleration: values[4],
            speed: values[5],
            posx: values[6],
            posy: values[7],
        }
    }
}

/// Ordered, finite supply of samples driving one sender.
///
/// Exhaustion and malformed input are both signalled by `None`; the sender
/// treats either as the normal end of the trajectory.
pub trait SampleSource {
    /// Next sample, or `None` once the source has nothing more to give.
    fn next_sample(&mut self) -> Option<CamSample>;
}

/// Trace-file source: one numeric value per line, eight lines per sample.
///
/// A short read (fewer than eight remaining lines) or a non-numeric token
/// ends the stream; no partial sample is ever produced.
pub struct TraceFileSource {
    reader: BufReader<File>,
    path: PathBuf,
    line: u64,
}

impl TraceFileSource {
    /// Open a trace file for replay.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        log::debug!("[trace] opened {}", path.display());
        Ok(Self {
            reader: BufReader::new(file),
            path,
            line: 0,
        })
    }

    fn next_value(&mut self) -> Option<f64> {
        let mut buf = String::new();
        match self.reader.read_line(&mut buf) {
            Ok(0) => {
                log::info!(
                    "[trace] {}: end of trace after {} lines",
                    self.path.display(),
                    self.line
                );
                None
            }
            Ok(_) => {
                self.line += 1;
                match buf.trim().parse::<f64>() {
                    Ok(value) => Some(value),
                    Err(_) => {
                        log::info!(
                            "[trace] {}: non-numeric value {:?} at line {}, ending stream",
                            self.path.display(),
                            buf.trim(),
                            self.line
                        );
                        None
                    }
                }
            }
            Err(e) => {
                log::warn!(
                    "[trace] {}: read error at line {}: {}",
                    self.path.display(),
                    self.line,
                    e
                );
                None
            }
        }
    }
}

impl SampleSource for TraceFileSource {
    fn next_sample(&mut self) -> Option<CamSample> {
        let mut values = [0.0_f64; VALUES_PER_SAMPLE];
        for slot in &mut values {
            *slot = self.next_value()?;
        }
        Some(CamSample::from_values(values))
    }
}

/// In-memory source, served in insertion order.
pub struct VecSource {
    samples: std::vec::IntoIter<CamSample>,
}

impl VecSource {
    pub fn new(samples: Vec<CamSample>) -> Self {
        Self {
            samples: samples.into_iter(),
        }
    }
}

impl SampleSource for VecSource {
    fn next_sample(&mut self) -> Option<CamSample> {
        self.samples.next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn trace_file(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        for line in lines {
            writeln!(file, "{}", line).expect("write line");
        }
        file.flush().expect("flush");
        file
    }

    #[test]
    fn test_from_values_maps_wire_order() {
        let sample = CamSample::from_values([10.5, 1.2, 1.0, 2.0, 1.5, 60.0, 100.0, 200.0]);
        assert_eq!(sample.distance, 10.5);
        assert_eq!(sample.relative_speed, 1.2);
        assert_eq!(sample.node_id, 1);
        assert_eq!(sample.acceleration, 2.0);
        assert_eq!(sample.controller_acceleration, 1.5);
        assert_eq!(sample.speed, 60.0);
        assert_eq!(sample.posx, 100.0);
        assert_eq!(sample.posy, 200.0);
    }

    #[test]
    fn test_node_id_truncates_toward_zero() {
        let sample = CamSample::from_values([0.0, 0.0, 2.9, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(sample.node_id, 2);
        let sample = CamSample::from_values([0.0, 0.0, -3.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(sample.node_id, 0);
    }

    #[test]
    fn test_sixteen_lines_yield_two_samples_then_none() {
        let file = trace_file(&[
            "10.5", "1.2", "1", "2.0", "1.5", "60.0", "100.0", "200.0", //
            "11.0", "1.3", "1", "2.1", "1.6", "61.0", "101.0", "201.0",
        ]);
        let mut source = TraceFileSource::open(file.path()).expect("open trace");

        let first = source.next_sample().expect("first sample");
        assert_eq!(first.distance, 10.5);
        assert_eq!(first.posy, 200.0);

        let second = source.next_sample().expect("second sample");
        assert_eq!(second.distance, 11.0);
        assert_eq!(second.posx, 101.0);

        assert!(source.next_sample().is_none());
        assert!(source.next_sample().is_none());
    }

    #[test]
    fn test_short_trace_ends_after_complete_samples() {
        // 12 lines: one full sample, then a truncated one that never
        // surfaces.
        let file = trace_file(&[
            "10.5", "1.2", "1", "2.0", "1.5", "60.0", "100.0", "200.0", //
            "11.0", "1.3", "1", "2.1",
        ]);
        let mut source = TraceFileSource::open(file.path()).expect("open trace");

        assert!(source.next_sample().is_some());
        assert!(source.next_sample().is_none());
    }

    #[test]
    fn test_non_numeric_token_ends_stream() {
        let file = trace_file(&[
            "10.5", "1.2", "1", "2.0", "1.5", "60.0", "100.0", "200.0", //
            "11.0", "not-a-number", "1", "2.1", "1.6", "61.0", "101.0", "201.0",
        ]);
        let mut source = TraceFileSource::open(file.path()).expect("open trace");

        assert!(source.next_sample().is_some());
        assert!(source.next_sample().is_none());
    }

    #[test]
    fn test_empty_file_yields_none() {
        let file = trace_file(&[]);
        let mut source = TraceFileSource::open(file.path()).expect("open trace");
        assert!(source.next_sample().is_none());
    }

    #[test]
    fn test_surrounding_whitespace_is_tolerated() {
        let file = trace_file(&[
            "  10.5  ", "\t1.2", "1", "2.0", "1.5", "60.0", "100.0", "200.0",
        ]);
        let mut source = TraceFileSource::open(file.path()).expect("open trace");

        let sample = source.next_sample().expect("sample");
        assert_eq!(sample.distance, 10.5);
        assert_eq!(sample.relative_speed, 1.2);
    }

    #[test]
    fn test_missing_file_reports_io_error() {
        assert!(TraceFileSource::open("/nonexistent/trace.txt").is_err());
    }

    #[test]
    fn test_vec_source_yields_in_order_then_none() {
        let a = CamSample::from_values([1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        let b = CamSample::from_values([2.0, 0.0, 2.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        let mut source = VecSource::new(vec![a, b]);

        assert_eq!(source.next_sample(), Some(a));
        assert_eq!(source.next_sample(), Some(b));
        assert_eq!(source.next_sample(), None);
    }
}
