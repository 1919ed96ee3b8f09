// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! C3D header block (block 1).
//!
//! | Word | Content |
//! |---|---|
//! | 1 | parameter block number (low byte), `0x50` (high byte) |
//! | 2 | points per frame |
//! | 3 | analog samples per frame, all channels |
//! | 4, 5 | first and last frame |
//! | 6 | maximum interpolation gap |
//! | 7-8 | point scale (real; negative for real storage) |
//! | 9 | first data block |
//! | 10 | analog samples per point frame |
//! | 11-12 | point rate (real) |
//! | 150 | `0x3039` when four-character event labels follow |
//! | 151 | event count (at most 18) |
//! | 153-188 | event times (reals, seconds) |
//! | 189-197 | event display flags (bytes) |
//! | 199-234 | event labels (four characters each) |

use crate::device::Endian;

use super::constants::{
    BLOCK_SIZE, EVENT_LABEL_KEY, HDR_EVENT_COUNT, HDR_EVENT_FLAGS, HDR_EVENT_KEY,
    HDR_EVENT_LABELS, HDR_EVENT_TIMES, HDR_POINT_COUNT, MAX_HEADER_EVENTS, PARAMETER_KEY,
};

/// Event stored in the header block.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderEvent {
    /// Label, at most four characters
    pub label: String,
    /// Time in seconds
    pub time: f32,
    /// Display flag
    pub displayed: bool,
}

/// Decoded header block.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Header {
    /// Block number of the parameter section
    pub parameter_block: u8,
    /// Points per frame
    pub point_count: u16,
    /// Analog samples per frame, all channels together
    pub analog_total: u16,
    /// First frame
    pub first_frame: u16,
    /// Last frame
    pub last_frame: u16,
    /// Maximum interpolation gap
    pub max_gap: u16,
    /// Point scale; negative for real storage
    pub scale: f32,
    /// First data block
    pub data_start: u16,
    /// Analog samples per point frame
    pub analog_ratio: u16,
    /// Point rate in Hz
    pub rate: f32,
    /// Header events
    pub events: Vec<HeaderEvent>,
}

fn u16_at(block: &[u8], offset: u64, endian: Endian) -> u16 {
    let at = offset as usize;
    endian.decode_u16(&block[at..at + 2])
}

fn f32_at(block: &[u8], offset: u64, endian: Endian) -> f32 {
    let at = offset as usize;
    endian.decode_f32(&block[at..at + 4])
}

fn put(block: &mut [u8], offset: u64, bytes: &[u8]) {
    let at = offset as usize;
    block[at..at + bytes.len()].copy_from_slice(bytes);
}

fn trim_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches([' ', '\0'])
        .to_string()
}

impl Header {
    /// Decode a full header block.
    ///
    /// `block` must hold [`BLOCK_SIZE`] bytes.
    pub fn parse(block: &[u8], endian: Endian) -> Self {
        let word = |n: u64| u16_at(block, (n - 1) * 2, endian);
        let real = |n: u64| f32_at(block, (n - 1) * 2, endian);

        let mut events = Vec::new();
        if u16_at(block, HDR_EVENT_KEY, endian) == EVENT_LABEL_KEY {
            let count = (u16_at(block, HDR_EVENT_COUNT, endian) as usize).min(MAX_HEADER_EVENTS);
            for i in 0..count {
                let label_at = HDR_EVENT_LABELS as usize + i * 4;
                events.push(HeaderEvent {
                    label: trim_text(&block[label_at..label_at + 4]),
                    time: f32_at(block, HDR_EVENT_TIMES + i as u64 * 4, endian),
                    displayed: block[HDR_EVENT_FLAGS as usize + i] != 0,
                });
            }
        }

        Self {
            parameter_block: block[0],
            point_count: u16_at(block, HDR_POINT_COUNT, endian),
            analog_total: word(3),
            first_frame: word(4),
            last_frame: word(5),
            max_gap: word(6),
            scale: real(7),
            data_start: word(9),
            analog_ratio: word(10),
            rate: real(11),
            events,
        }
    }

    /// Encode the header block; `None` if a real does not fit `endian`.
    pub fn encode(&self, endian: Endian) -> Option<Vec<u8>> {
        let mut block = vec![0u8; BLOCK_SIZE as usize];
        block[0] = self.parameter_block;
        block[1] = PARAMETER_KEY;
        let words = [
            (2, self.point_count),
            (3, self.analog_total),
            (4, self.first_frame),
            (5, self.last_frame),
            (6, self.max_gap),
            (9, self.data_start),
            (10, self.analog_ratio),
        ];
        for (n, value) in words {
            put(&mut block, (n - 1) * 2, &endian.encode_u16(value));
        }
        put(&mut block, 12, &endian.encode_f32(self.scale)?);
        put(&mut block, 20, &endian.encode_f32(self.rate)?);

        let events = &self.events[..self.events.len().min(MAX_HEADER_EVENTS)];
        put(&mut block, HDR_EVENT_KEY, &endian.encode_u16(EVENT_LABEL_KEY));
        put(
            &mut block,
            HDR_EVENT_COUNT,
            &endian.encode_u16(events.len() as u16),
        );
        for (i, event) in events.iter().enumerate() {
            put(
                &mut block,
                HDR_EVENT_TIMES + i as u64 * 4,
                &endian.encode_f32(event.time)?,
            );
            block[HDR_EVENT_FLAGS as usize + i] = u8::from(event.displayed);
            let mut label = [b' '; 4];
            let bytes = event.label.as_bytes();
            let len = bytes.len().min(4);
            label[..len].copy_from_slice(&bytes[..len]);
            put(&mut block, HDR_EVENT_LABELS + i as u64 * 4, &label);
        }
        Some(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Header {
        Header {
            parameter_block: 2,
            point_count: 12,
            analog_total: 40,
            first_frame: 5,
            last_frame: 254,
            max_gap: 10,
            scale: -0.1,
            data_start: 11,
            analog_ratio: 4,
            rate: 120.0,
            events: vec![HeaderEvent {
                label: "RHS".to_string(),
                time: 1.25,
                displayed: true,
            }],
        }
    }

    #[test]
    fn test_word_layout() {
        let block = sample().encode(Endian::Little).unwrap();
        assert_eq!(block.len(), 512);
        assert_eq!(&block[..4], &[2, 0x50, 12, 0]);
        assert_eq!(&block[298..302], &[0x39, 0x30, 1, 0]);
        assert_eq!(&block[396..400], b"RHS ");
        assert_eq!(block[376], 1);
    }

    #[test]
    fn test_parse_each_processor_layout() {
        for endian in [Endian::Little, Endian::Big, Endian::Vax] {
            let header = sample();
            assert_eq!(Header::parse(&header.encode(endian).unwrap(), endian), header);
        }
    }

    #[test]
    fn test_events_need_label_key() {
        let mut block = sample().encode(Endian::Little).unwrap();
        block[298] = 0;
        assert!(Header::parse(&block, Endian::Little).events.is_empty());
    }
}
