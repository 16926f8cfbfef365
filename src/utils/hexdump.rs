//! Frame hexdump formatting for trace logging.
//!
//! Classic 16-bytes-per-row layout with an ASCII gutter; used when
//! `logging.trace_frames` is on to capture exact wire bytes.

use std::fmt::Write;

/// Bytes per dump row.
const ROW_WIDTH: usize = 16;

/// Render `data` as a multi-line hexdump.
pub fn hexdump(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 4);
    for (row, chunk) in data.chunks(ROW_WIDTH).enumerate() {
        let _ = write!(out, "{:04X}  ", row * ROW_WIDTH);
        for i in 0..ROW_WIDTH {
            match chunk.get(i) {
                Some(b) => {
                    let _ = write!(out, "{b:02X} ");
                }
                None => out.push_str("   "),
            }
            if i == ROW_WIDTH / 2 - 1 {
                out.push(' ');
            }
        }
        out.push(' ');
        for &b in chunk {
            out.push(if (0x20..0x7F).contains(&b) {
                b as char
            } else {
                '.'
            });
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_layout() {
        let data: Vec<u8> = (0..20).collect();
        let dump = hexdump(&data);
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("0000  00 01 02"));
        assert!(lines[1].starts_with("0010  10 11 12 13"));
    }

    #[test]
    fn test_ascii_gutter() {
        let dump = hexdump(b"Hi\x00!");
        assert!(dump.contains("Hi.!"));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(hexdump(&[]), "");
    }
}
