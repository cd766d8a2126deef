//! Minimal RIFF/WAVE PCM writer with a patchable header.
//!
//! Grounded on `original_source/src/util/WavWriter.h`.

use std::io::{self, Seek, SeekFrom, Write};

/// Writes a 44-byte PCM WAVE header with zeroed size fields; call
/// [`patch_sizes`] once the file is complete to fill them in.
pub fn write_header<W: Write>(
    w: &mut W,
    sample_rate: u32,
    channels: u16,
    bits_per_sample: u16,
) -> io::Result<()> {
    w.write_all(b"RIFF")?;
    w.write_all(&0u32.to_le_bytes())?; // file size, patched later
    w.write_all(b"WAVE")?;
    w.write_all(b"fmt ")?;
    w.write_all(&16u32.to_le_bytes())?;
    w.write_all(&1u16.to_le_bytes())?; // PCM
    w.write_all(&channels.to_le_bytes())?;
    w.write_all(&sample_rate.to_le_bytes())?;
    let byte_rate = sample_rate * channels as u32 * bits_per_sample as u32 / 8;
    w.write_all(&byte_rate.to_le_bytes())?;
    let block_align = channels * (bits_per_sample / 8);
    w.write_all(&block_align.to_le_bytes())?;
    w.write_all(&bits_per_sample.to_le_bytes())?;
    w.write_all(b"data")?;
    w.write_all(&0u32.to_le_bytes())?; // data size, patched later
    Ok(())
}

/// Backfills the RIFF chunk size and `data` chunk size from the file's
/// current length. `w` must be positioned at end-of-file when called.
pub fn patch_sizes<W: Write + Seek>(w: &mut W) -> io::Result<()> {
    let end = w.stream_position()?;
    let file_size = (end as u32).saturating_sub(8);
    let data_size = (end as u32).saturating_sub(44);

    w.seek(SeekFrom::Start(4))?;
    w.write_all(&file_size.to_le_bytes())?;
    w.seek(SeekFrom::Start(40))?;
    w.write_all(&data_size.to_le_bytes())?;
    w.seek(SeekFrom::Start(end))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn header_is_44_bytes_and_well_formed() {
        let mut buf = Vec::new();
        write_header(&mut buf, 8000, 1, 16).unwrap();
        assert_eq!(buf.len(), 44);
        assert_eq!(&buf[0..4], b"RIFF");
        assert_eq!(&buf[8..12], b"WAVE");
        assert_eq!(&buf[36..40], b"data");
    }

    #[test]
    fn patch_sizes_fills_in_riff_and_data_lengths() {
        let mut cursor = Cursor::new(Vec::new());
        write_header(&mut cursor, 8000, 1, 16).unwrap();
        cursor.write_all(&[0u8; 320]).unwrap();
        patch_sizes(&mut cursor).unwrap();

        let buf = cursor.into_inner();
        let file_size = u32::from_le_bytes(buf[4..8].try_into().unwrap());
        let data_size = u32::from_le_bytes(buf[40..44].try_into().unwrap());
        assert_eq!(file_size, 44 + 320 - 8);
        assert_eq!(data_size, 320);
    }
}
