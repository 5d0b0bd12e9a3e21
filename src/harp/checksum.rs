//! # Harp Checksum
//!
//! Single-byte checksum: the sum of every preceding frame byte, modulo 256.
//! The length byte is included.

/// Calculate the checksum of a byte slice
///
/// # Arguments
///
/// * `data` - Frame bytes from the length byte up to (excluding) the checksum
///
/// # Returns
///
/// * `u8` - Sum of all bytes modulo 256
///
/// # Examples
///
/// ```
/// use harp_audioswitch::harp::checksum::checksum;
///
/// let data = [0x06, 0x02, 0x20, 0xFF, 0x01, 0x01];
/// assert_eq!(checksum(&data), 0x29);
/// ```
pub fn checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |sum, &byte| sum.wrapping_add(byte))
}

/// Check the trailing checksum byte of a complete frame
///
/// Returns the computed and received checksums on mismatch.
pub fn verify(frame: &[u8]) -> std::result::Result<(), (u8, u8)> {
    match frame.split_last() {
        Some((&received, body)) => {
            let computed = checksum(body);
            if computed == received {
                Ok(())
            } else {
                Err((computed, received))
            }
        }
        None => Err((0, 0)),
    }
}
