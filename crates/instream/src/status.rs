/// Reference point for a stream reposition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeekBasis {
    /// Offset is measured from the beginning of the stream.
    Start,
    /// Offset is measured from the current position.
    Current,
}

/// Point-in-time snapshot of a stream handle's state.
///
/// Produced fresh on every `status` call; it is never updated in place.
/// `is_end_of_stream` reflects the handle's internally tracked flag (derived
/// from observed read behavior), not anything the status handler reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamStatus {
    pub is_valid: bool,
    pub is_end_of_stream: bool,
}
