//! Unit classification
//!
//! The pipeline only needs to know whether a frame carries parameter sets, starts a
//! keyframe, or is anything else. [`UnitClassifier`] is the seam for that decision;
//! [`StartCodeClassifier`] is the classifier the existing sender and recordings were built
//! against.

use crate::types::UnitType;

/// Decides the unit type of a reassembled frame.
pub trait UnitClassifier: Send + Sync + 'static {
    fn classify(&self, frame: &[u8]) -> UnitType;
}

/// Reads the unit type from the byte that follows a leading start code.
///
/// Accepts a 4-byte (`00 00 00 01`) or 3-byte (`00 00 01`) start code, then takes
/// `(byte >> 1) & 0x3F` from the first header byte. Only that first byte is inspected,
/// which is not a full two-byte unit header parse; layer id and temporal id are ignored.
/// Recordings produced by earlier receivers depend on this exact rule.
#[derive(Debug, Clone, Copy, Default)]
pub struct StartCodeClassifier;

impl StartCodeClassifier {
    /// Length of the leading start code, if any.
    pub fn start_code_len(frame: &[u8]) -> Option<usize> {
        if frame.starts_with(&[0x00, 0x00, 0x00, 0x01]) {
            Some(4)
        } else if frame.starts_with(&[0x00, 0x00, 0x01]) {
            Some(3)
        } else {
            None
        }
    }
}

impl UnitClassifier for StartCodeClassifier {
    fn classify(&self, frame: &[u8]) -> UnitType {
        match Self::start_code_len(frame).and_then(|offset| frame.get(offset)) {
            Some(&header) => UnitType::Known((header >> 1) & 0x3F),
            None => UnitType::Unknown,
        }
    }
}
