//! Struct tag lists, packed four bits at a time.
//!
//! Each number is a bijective base-8 varint spread over nibbles, high nibble
//! of a byte first, with bit 3 as the continuation flag. The first tag is
//! written as is, every later tag as its distance from the previous one. A
//! zero distance is followed by a repeat count for the previous tag. An odd
//! nibble count is padded with a zero nibble.

use plankton_buffers::{Reader, Writer};

use crate::error::{Error, Result};

struct NibbleWriter<'a> {
    w: &'a mut Writer,
    high: Option<u8>,
}

impl NibbleWriter<'_> {
    fn push(&mut self, nibble: u8) {
        match self.high.take() {
            Some(high) => self.w.u8(high << 4 | nibble),
            None => self.high = Some(nibble),
        }
    }

    fn number(&mut self, mut n: u64) {
        while n >= 8 {
            self.push((n & 0x7) as u8 | 0x8);
            n = (n >> 3) - 1;
        }
        self.push(n as u8);
    }

    fn finish(mut self) {
        if self.high.is_some() {
            self.push(0);
        }
    }
}

/// Writes a non-decreasing tag list.
pub(crate) fn write_tags(w: &mut Writer, tags: &[u64]) {
    let Some((&first, _)) = tags.split_first() else {
        return;
    };
    let mut out = NibbleWriter { w, high: None };
    out.number(first);
    let mut last = first;
    let mut i = 1;
    while i < tags.len() {
        if tags[i] == last {
            let run = tags[i..].iter().take_while(|&&t| t == last).count();
            out.number(0);
            out.number(run as u64);
            i += run;
        } else {
            out.number(tags[i] - last);
            last = tags[i];
            i += 1;
        }
    }
    out.finish();
}

struct NibbleReader<'r, 'a> {
    r: &'r mut Reader<'a>,
    low: Option<u8>,
}

impl NibbleReader<'_, '_> {
    fn next(&mut self) -> Result<u8> {
        if let Some(low) = self.low.take() {
            return Ok(low);
        }
        let byte = self.r.try_u8()?;
        self.low = Some(byte & 0xf);
        Ok(byte >> 4)
    }

    fn number(&mut self) -> Result<u64> {
        let start = self.r.position();
        let mut nibble = self.next()?;
        let mut value = (nibble & 0x7) as u128;
        let mut shift = 3u32;
        while nibble >= 0x8 {
            if shift > 66 {
                return Err(Error::MalformedVarint { offset: start });
            }
            nibble = self.next()?;
            value += ((nibble & 0x7) as u128 + 1) << shift;
            shift += 3;
        }
        u64::try_from(value).map_err(|_| Error::MalformedVarint { offset: start })
    }
}

/// Reads `len` tags written by [`write_tags`]. A trailing pad nibble is
/// dropped.
pub(crate) fn read_tags(r: &mut Reader<'_>, len: usize) -> Result<Vec<u64>> {
    let offset = r.position();
    let mut tags = Vec::with_capacity(len.min(r.size().saturating_mul(2)));
    if len == 0 {
        return Ok(tags);
    }
    let mut nibbles = NibbleReader { r, low: None };
    let mut last = nibbles.number()?;
    tags.push(last);
    while tags.len() < len {
        match nibbles.number()? {
            0 => {
                let run = nibbles.number()?;
                if run > (len - tags.len()) as u64 {
                    return Err(Error::InvalidValue(format!(
                        "struct tag run at offset {offset} overruns its {len} tags"
                    )));
                }
                tags.extend(std::iter::repeat(last).take(run as usize));
            }
            delta => {
                last = last.checked_add(delta).ok_or_else(|| {
                    Error::InvalidValue(format!("struct tag overflows at offset {offset}"))
                })?;
                tags.push(last);
            }
        }
    }
    Ok(tags)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packed(tags: &[u64]) -> Vec<u8> {
        let mut w = Writer::new();
        write_tags(&mut w, tags);
        w.flush()
    }

    #[test]
    fn small_deltas_share_bytes() {
        // 1, then +2, then +1: nibbles 1 2 1 and a pad.
        assert_eq!(packed(&[1, 3, 4]), [0x12, 0x10]);
        assert_eq!(packed(&[0, 1]), [0x01]);
        assert!(packed(&[]).is_empty());
    }

    #[test]
    fn large_values_continue_over_nibbles() {
        // 8 = 0 | cont, then 0: nibbles 8 0.
        assert_eq!(packed(&[8]), [0x80]);
        let tags = [100, 1000, 1_000_000, u64::MAX];
        let bytes = packed(&tags);
        assert_eq!(read_tags(&mut Reader::new(&bytes), 4).unwrap(), tags);
    }

    #[test]
    fn repeated_tags_are_run_length_coded() {
        // 5, zero, run of 3: nibbles 5 0 3 and a pad.
        assert_eq!(packed(&[5, 5, 5, 5]), [0x50, 0x30]);
        let tags = [2, 2, 4, 4, 4, 9];
        let bytes = packed(&tags);
        let mut r = Reader::new(&bytes);
        assert_eq!(read_tags(&mut r, tags.len()).unwrap(), tags);
        assert!(r.is_empty());
    }

    #[test]
    fn bad_tag_lists() {
        // A run longer than the declared count.
        assert!(matches!(
            read_tags(&mut Reader::new(&[0x10, 0x90]), 3),
            Err(Error::InvalidValue(_))
        ));
        assert!(matches!(
            read_tags(&mut Reader::new(&[0x12]), 3),
            Err(Error::TruncatedInput { .. })
        ));
        assert!(matches!(
            read_tags(&mut Reader::new(&[0xff; 20]), 1),
            Err(Error::MalformedVarint { .. })
        ));
    }
}
