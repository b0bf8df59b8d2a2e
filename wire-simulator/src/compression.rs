//! Lossless waveform compression.
//!
//! The Huffman-style mode stores small tick-to-tick differences as prefix
//! codes packed into 16-bit words. A word is one of:
//!
//! * a literal sample, bit 15 clear;
//! * a code word, bit 15 set, whose 15 payload bits hold prefix codes
//!   MSB first. Code `k` is `k` zero bits then a one, and stands for the
//!   difference `DIFFERENCES[k]`. Trailing zero bits are padding;
//! * the escape word `0x8000`, followed by one raw sample that does not fit
//!   a literal.

use crate::error::{CompressionError, ConfigError};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::Display;
use wiresim_common::AdcCount;

/// Differences with a prefix code, most frequent first.
const DIFFERENCES: [i32; 7] = [0, -1, 1, -2, 2, -3, 3];
const CODE_FLAG: u16 = 0x8000;
const ESCAPE: u16 = CODE_FLAG;
const PAYLOAD_BITS: u32 = 15;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub(crate) enum Compression {
    #[default]
    None,
    Huffman,
}

impl FromStr for Compression {
    type Err = ConfigError;

    /// Matches the mode name anywhere in `s`, ignoring case. An empty
    /// selector means no compression.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let selector = s.to_lowercase();
        if selector.trim().is_empty() || selector.contains("none") {
            Ok(Self::None)
        } else if selector.contains("huffman") {
            Ok(Self::Huffman)
        } else {
            Err(ConfigError::UnsupportedCompression(s.to_owned()))
        }
    }
}

pub(crate) fn encode(samples: &[AdcCount], mode: Compression) -> Vec<u16> {
    match mode {
        Compression::None => samples.to_vec(),
        Compression::Huffman => HuffmanEncoder::default().encode(samples),
    }
}

/// Inverse of [encode], checking that `expected` samples come out.
pub(crate) fn decode(
    words: &[u16],
    mode: Compression,
    expected: usize,
) -> Result<Vec<AdcCount>, CompressionError> {
    let samples = match mode {
        Compression::None => words.to_vec(),
        Compression::Huffman => huffman_decode(words)?,
    };
    if samples.len() == expected {
        Ok(samples)
    } else {
        Err(CompressionError::SampleCount {
            decoded: samples.len(),
            expected,
        })
    }
}

#[derive(Default)]
struct HuffmanEncoder {
    words: Vec<u16>,
    /// Payload of the code word being filled and the bits it uses.
    payload: u16,
    used: u32,
}

impl HuffmanEncoder {
    fn encode(mut self, samples: &[AdcCount]) -> Vec<u16> {
        let mut previous: Option<AdcCount> = None;
        for &sample in samples {
            let code = previous.and_then(|previous| {
                let difference = i32::from(sample) - i32::from(previous);
                DIFFERENCES.iter().position(|&d| d == difference)
            });
            match code {
                Some(code) => self.push_code(code as u32),
                None => self.push_literal(sample),
            }
            previous = Some(sample);
        }
        self.flush();
        self.words
    }

    fn push_code(&mut self, code: u32) {
        let len = code + 1;
        if self.used + len > PAYLOAD_BITS {
            self.flush();
        }
        self.used += len;
        self.payload |= 1 << (PAYLOAD_BITS - self.used);
    }

    fn push_literal(&mut self, sample: AdcCount) {
        self.flush();
        if sample & CODE_FLAG != 0 {
            self.words.push(ESCAPE);
        }
        self.words.push(sample);
    }

    fn flush(&mut self) {
        if self.used > 0 {
            self.words.push(CODE_FLAG | self.payload);
            self.payload = 0;
            self.used = 0;
        }
    }
}

fn huffman_decode(words: &[u16]) -> Result<Vec<AdcCount>, CompressionError> {
    let mut samples: Vec<AdcCount> = Vec::with_capacity(words.len());
    let mut iter = words.iter().copied().enumerate();
    while let Some((position, word)) = iter.next() {
        if word & CODE_FLAG == 0 {
            samples.push(word);
        } else if word == ESCAPE {
            let (_, literal) = iter.next().ok_or(CompressionError::TruncatedEscape(position))?;
            samples.push(literal);
        } else {
            decode_code_word(word, position, &mut samples)?;
        }
    }
    Ok(samples)
}

fn decode_code_word(
    word: u16,
    position: usize,
    samples: &mut Vec<AdcCount>,
) -> Result<(), CompressionError> {
    let mut previous = *samples
        .last()
        .ok_or(CompressionError::NoReferenceSample(position))?;
    let mut zeros = 0;
    for bit in (0..PAYLOAD_BITS).rev() {
        if word & (1 << bit) == 0 {
            zeros += 1;
            continue;
        }
        let difference = DIFFERENCES
            .get(zeros)
            .ok_or(CompressionError::UnknownCode(position))?;
        let sample = AdcCount::try_from(i32::from(previous) + difference)
            .map_err(|_| CompressionError::SampleOverflow(position))?;
        samples.push(sample);
        previous = sample;
        zeros = 0;
    }
    Ok(())
}
