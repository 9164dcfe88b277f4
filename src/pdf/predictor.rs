//! Row predictors used by cross-reference streams

use crate::error::{PDFDecryptError, PDFDecryptResult};

/// PNG "Up" row tag
const PNG_UP: u8 = 2;

/// Supported `/Predictor` values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predictor {
    /// Predictor 1: no prediction
    None,
    /// Predictor 12: PNG Up on every row
    PngUp,
}

impl Predictor {
    pub fn from_code(code: i64) -> PDFDecryptResult<Self> {
        match code {
            1 => Ok(Predictor::None),
            12 => Ok(Predictor::PngUp),
            other => Err(PDFDecryptError::UnsupportedPredictor(other)),
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            Predictor::None => 1,
            Predictor::PngUp => 12,
        }
    }

    /// Undo prediction. For PNG Up the input rows are `columns + 1` bytes
    /// wide and the output has the tag bytes stripped.
    pub fn decode(&self, columns: usize, data: &[u8]) -> PDFDecryptResult<Vec<u8>> {
        check_columns(columns)?;
        match self {
            Predictor::None => Ok(data.to_vec()),
            Predictor::PngUp => {
                let mut output = Vec::with_capacity(data.len());
                let mut previous = vec![0u8; columns];
                for row in data.chunks(columns + 1) {
                    // The tag byte is ignored: every row is an Up row.
                    for (above, &byte) in previous.iter_mut().zip(&row[1..]) {
                        *above = byte.wrapping_add(*above);
                        output.push(*above);
                    }
                }
                Ok(output)
            }
        }
    }

    /// Apply prediction to rows of `columns` bytes
    pub fn encode(&self, columns: usize, rows: &[u8]) -> PDFDecryptResult<Vec<u8>> {
        check_columns(columns)?;
        match self {
            Predictor::None => Ok(rows.to_vec()),
            Predictor::PngUp => {
                let mut output = Vec::with_capacity(rows.len() + rows.len() / columns + 1);
                let mut previous = vec![0u8; columns];
                for row in rows.chunks(columns) {
                    output.push(PNG_UP);
                    for (above, &byte) in previous.iter_mut().zip(row) {
                        output.push(byte.wrapping_sub(*above));
                        *above = byte;
                    }
                }
                Ok(output)
            }
        }
    }
}

fn check_columns(columns: usize) -> PDFDecryptResult<()> {
    if columns == 0 {
        return Err(PDFDecryptError::malformed("Predictor column count must be positive"));
    }
    Ok(())
}
