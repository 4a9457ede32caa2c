//! Grid-to-record streaming.
//!
//! [`GridRecordStream`] walks the normalized grid and yields one encoded
//! JSON record per cell, each followed by [`RECORD_DELIMITER`]:
//!
//! ```text
//! {"x":0,"y":0,"vars":{"HGT":12.5},"timeVars":{"0":{"T2":281.2},"1":{"T2":null}}}||*split*||
//! ```
//!
//! Records come out with `x` as the outer loop and `y` as the inner loop,
//! so a client can rebuild the grid from record order alone.

use std::io::Write;
use std::iter::FusedIterator;

use netcdf_parser::NcValue;

use crate::encoder::Encoder;
use crate::error::{ConversionError, ConversionResult};
use crate::selection::{ProcessedVariable, SelectedVariables};

/// Separator written after every record.
pub const RECORD_DELIMITER: &str = "||*split*||";

/// Split a streamed body back into its records.
pub fn split_records(body: &str) -> impl Iterator<Item = &str> {
    body.split(RECORD_DELIMITER).filter(|record| !record.is_empty())
}

/// Pull-based iterator over the encoded records of a grid.
///
/// Yields exactly `width * height` items. After an error the stream
/// yields that error once and then ends.
#[derive(Debug)]
pub struct GridRecordStream {
    variables: SelectedVariables,
    encoder: Encoder,
    width: usize,
    height: usize,
    max_time: usize,
    next_cell: usize,
    failed: bool,
}

impl GridRecordStream {
    /// Build a stream over normalized variables.
    ///
    /// Every variable must share the grid extent of the first one; an
    /// empty selection gives an empty stream.
    pub fn new(variables: SelectedVariables) -> ConversionResult<Self> {
        let (width, height) = variables.grid_shape().unwrap_or((0, 0));

        for variable in variables.iter() {
            let actual = variable.grid_shape();
            if actual != (width, height) {
                return Err(ConversionError::GridShapeMismatch {
                    variable: variable.name.clone(),
                    expected: (width, height),
                    actual,
                });
            }
        }

        let max_time = variables.max_time_len();
        Ok(Self {
            variables,
            encoder: Encoder::permissive(),
            width,
            height,
            max_time,
            next_cell: 0,
            failed: false,
        })
    }

    /// `(width, height)` of the grid being streamed.
    pub fn grid_shape(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Total number of records the stream produces.
    pub fn record_count(&self) -> usize {
        self.width * self.height
    }

    fn remaining(&self) -> usize {
        if self.failed {
            0
        } else {
            self.record_count() - self.next_cell
        }
    }

    fn encode_record(&self, x: usize, y: usize) -> ConversionResult<String> {
        let mut out = Vec::with_capacity(128);
        write!(out, "{{\"x\":{},\"y\":{}", x, y)?;

        if !self.variables.spatial.is_empty() {
            out.write_all(b",\"vars\":{")?;
            for (i, variable) in self.variables.spatial.iter().enumerate() {
                if i > 0 {
                    out.write_all(b",")?;
                }
                self.write_entry(&mut out, variable, variable.value_at(x, y))?;
            }
            out.write_all(b"}")?;
        }

        if !self.variables.temporal.is_empty() {
            out.write_all(b",\"timeVars\":{")?;
            for t in 0..self.max_time {
                if t > 0 {
                    out.write_all(b",")?;
                }
                write!(out, "\"{}\":{{", t)?;
                for (i, variable) in self.variables.temporal.iter().enumerate() {
                    if i > 0 {
                        out.write_all(b",")?;
                    }
                    self.write_entry(&mut out, variable, variable.value_at_time(x, y, t))?;
                }
                out.write_all(b"}")?;
            }
            out.write_all(b"}")?;
        }

        out.write_all(b"}")?;
        out.write_all(RECORD_DELIMITER.as_bytes())?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    fn write_entry(
        &self,
        out: &mut Vec<u8>,
        variable: &ProcessedVariable,
        value: Option<NcValue>,
    ) -> ConversionResult<()> {
        self.encoder.write_str(out, &variable.name)?;
        out.write_all(b":")?;
        match value {
            Some(value) => self.encoder.write_value(out, &value),
            None => self.encoder.write_null(out),
        }
    }
}

impl Iterator for GridRecordStream {
    type Item = ConversionResult<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.next_cell >= self.record_count() {
            return None;
        }

        let x = self.next_cell / self.height;
        let y = self.next_cell % self.height;
        self.next_cell += 1;

        match self.encode_record(x, y) {
            Ok(record) => Some(Ok(record)),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining();
        (remaining, Some(remaining))
    }
}

impl FusedIterator for GridRecordStream {}
