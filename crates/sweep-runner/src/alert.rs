use std::io::{self, Write};
use std::thread;
use std::time::Duration;

pub const COMPLETION_CHIME: [Duration; 4] = [
    Duration::from_millis(500),
    Duration::from_millis(500),
    Duration::from_millis(500),
    Duration::from_millis(700),
];

pub const TONE_GAP: Duration = Duration::from_millis(200);

const BELL: &[u8] = b"\x07";

/// Terminals cannot be told a pitch, so each tone is one bell held for its
/// duration, separated by `TONE_GAP`.
pub fn ring<W, F>(out: &mut W, tones: &[Duration], mut pause: F) -> io::Result<()>
where
    W: Write,
    F: FnMut(Duration),
{
    for (i, tone) in tones.iter().enumerate() {
        out.write_all(BELL)?;
        out.flush()?;
        pause(*tone);
        if i + 1 < tones.len() {
            pause(TONE_GAP);
        }
    }
    Ok(())
}

pub fn ring_completion() -> io::Result<()> {
    let mut stderr = io::stderr();
    ring(&mut stderr, &COMPLETION_CHIME, thread::sleep)
}
