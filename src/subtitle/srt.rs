// SRT subtitle format
use super::Cue;
use crate::error::{Result, SubtranslateError};
use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;

pub const EXTENSION: &str = "srt";

/// Serialize cues as SRT blocks separated by blank lines.
pub fn format(cues: &[Cue]) -> String {
    cues.iter()
        .map(|cue| {
            format!(
                "{}\n{} --> {}\n{}\n",
                cue.index,
                format_timestamp(cue.start),
                format_timestamp(cue.end),
                cue.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_timestamp(d: Duration) -> String {
    let total_secs = d.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    let millis = d.subsec_millis();
    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, seconds, millis)
}

fn timing_regex() -> &'static Regex {
    static TIMING: OnceLock<Regex> = OnceLock::new();
    TIMING.get_or_init(|| {
        Regex::new(
            r"^(\d+):(\d{2}):(\d{2})[,.](\d{3})\s*-->\s*(\d+):(\d{2}):(\d{2})[,.](\d{3})",
        )
        .expect("valid SRT timing regex")
    })
}

fn parse_timestamp(caps: &regex::Captures<'_>, offset: usize) -> Result<Duration> {
    let field = |i: usize| -> Result<u64> {
        caps[offset + i]
            .parse::<u64>()
            .map_err(|e| SubtranslateError::InvalidSubtitle(format!("bad timestamp: {e}")))
    };
    let (h, m, s, ms) = (field(0)?, field(1)?, field(2)?, field(3)?);
    if m >= 60 || s >= 60 {
        return Err(SubtranslateError::InvalidSubtitle(format!(
            "timestamp out of range: {}:{}:{}",
            h, m, s
        )));
    }
    Ok(Duration::from_millis(((h * 60 + m) * 60 + s) * 1000 + ms))
}

/// Parse an SRT document.
///
/// Accepts a UTF-8 BOM, CRLF line endings, multi-line and empty cue text.
pub fn parse(input: &str) -> Result<Vec<Cue>> {
    let input = input.strip_prefix('\u{feff}').unwrap_or(input);
    let mut cues = Vec::new();
    let mut lines = input.lines().map(|l| l.trim_end_matches('\r')).peekable();

    loop {
        // Skip blank lines between blocks.
        while lines.peek().is_some_and(|l| l.trim().is_empty()) {
            lines.next();
        }
        let Some(index_line) = lines.next() else {
            break;
        };

        let index: usize = index_line.trim().parse().map_err(|_| {
            SubtranslateError::InvalidSubtitle(format!("expected cue index, got '{}'", index_line))
        })?;

        let timing_line = lines.next().ok_or_else(|| {
            SubtranslateError::InvalidSubtitle(format!("cue {} has no timing line", index))
        })?;
        let caps = timing_regex().captures(timing_line.trim()).ok_or_else(|| {
            SubtranslateError::InvalidSubtitle(format!(
                "cue {}: malformed timing '{}'",
                index, timing_line
            ))
        })?;
        let start = parse_timestamp(&caps, 1)?;
        let end = parse_timestamp(&caps, 5)?;

        let mut text_lines = Vec::new();
        while let Some(line) = lines.next_if(|l| !l.trim().is_empty()) {
            text_lines.push(line);
        }

        cues.push(Cue {
            index,
            start,
            end,
            text: text_lines.join("\n"),
        });
    }

    Ok(cues)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cue(index: usize, start_ms: u64, end_ms: u64, text: &str) -> Cue {
        Cue {
            index,
            start: Duration::from_millis(start_ms),
            end: Duration::from_millis(end_ms),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(Duration::from_millis(1500)), "00:00:01,500");
        assert_eq!(
            format_timestamp(Duration::from_secs(3661) + Duration::from_millis(123)),
            "01:01:01,123"
        );
    }

    #[test]
    fn test_srt_format() {
        let output = format(&[
            cue(1, 1500, 4000, "Hello, world!"),
            cue(2, 4500, 7000, "This is a test."),
        ]);

        assert_eq!(
            output,
            "1\n00:00:01,500 --> 00:00:04,000\nHello, world!\n\n\
             2\n00:00:04,500 --> 00:00:07,000\nThis is a test.\n"
        );
    }

    #[test]
    fn test_parse_crlf_and_bom() {
        let input = "\u{feff}1\r\n00:00:00,000 --> 00:00:02,000\r\nSalut\r\n\r\n2\r\n00:00:02,000 --> 00:00:05,000\r\nLume\r\nsecond line\r\n";
        let cues = parse(input).unwrap();
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0], cue(1, 0, 2000, "Salut"));
        assert_eq!(cues[1].text, "Lume\nsecond line");
    }

    #[test]
    fn test_round_trip_with_empty_text() {
        let original = vec![
            cue(1, 0, 1000, "first"),
            cue(2, 1000, 2000, ""),
            cue(3, 2000, 3_723_456, "multi\nline"),
        ];
        let parsed = parse(&format(&original)).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_parse_empty_document() {
        assert!(parse("").unwrap().is_empty());
        assert!(parse("\n\n").unwrap().is_empty());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse("not a subtitle").is_err());
        assert!(parse("1\n00:00:00 -> 00:00:01\nx\n").is_err());
        assert!(parse("1\n00:61:00,000 --> 00:00:01,000\nx\n").is_err());
    }
}
