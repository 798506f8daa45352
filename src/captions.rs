//! Timestamped caption segments.
//!
//! Segments come from one of two sources: the transcription service's
//! `verbose_json` response (monologue mode), or the character-level alignment
//! returned by timestamped speech synthesis (dialogue mode), which is split
//! into per-word segments here.

use serde::Deserialize;

use crate::error::{ReelError, Result};

/// A span of on-screen text aligned to the narration audio.
///
/// Ordering and non-overlap of segments are upheld by the producing service
/// and are not re-validated at runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionSegment {
    pub text: String,
    /// Start time in seconds from the beginning of the narration.
    pub start: f64,
    /// End time in seconds.
    pub end: f64,
    /// Speaker id for dialogue captions, `None` for monologue.
    pub speaker: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VerboseTranscription {
    segments: Vec<VerboseSegment>,
}

#[derive(Debug, Deserialize)]
struct VerboseSegment {
    text: String,
    start: f64,
    end: f64,
}

/// Map a Whisper `verbose_json` response body to caption segments.
pub fn segments_from_verbose_json(body: &str) -> Result<Vec<CaptionSegment>> {
    let transcription: VerboseTranscription = serde_json::from_str(body).map_err(|e| {
        ReelError::ExternalService {
            status: 200,
            message: format!("unexpected transcription response: {}", e),
        }
    })?;

    Ok(transcription
        .segments
        .into_iter()
        .map(|segment| CaptionSegment {
            text: segment.text.trim().to_string(),
            start: segment.start,
            end: segment.end,
            speaker: None,
        })
        .collect())
}

/// Character-level timing alignment returned by timestamped speech synthesis.
#[derive(Debug, Clone, Deserialize)]
pub struct CharacterAlignment {
    pub characters: Vec<String>,
    pub character_start_times_seconds: Vec<f64>,
    pub character_end_times_seconds: Vec<f64>,
}

fn is_word_break(c: char) -> bool {
    matches!(c, ' ' | '\n' | '\t' | '.' | '!' | '?' | ',' | ';' | ':')
}

/// Split a character alignment into word-level caption segments, shifted by
/// `offset` seconds (the accumulated duration of earlier dialogue lines).
/// Fails when the service returns timing arrays shorter than the character
/// array.
pub fn words_from_alignment(
    alignment: &CharacterAlignment,
    offset: f64,
    speaker: Option<&str>,
) -> Result<Vec<CaptionSegment>> {
    let n = alignment.characters.len();
    if alignment.character_start_times_seconds.len() < n
        || alignment.character_end_times_seconds.len() < n
    {
        return Err(ReelError::ExternalService {
            status: 200,
            message: format!(
                "alignment has {} characters but {} start and {} end times",
                n,
                alignment.character_start_times_seconds.len(),
                alignment.character_end_times_seconds.len()
            ),
        });
    }

    let mut words = Vec::new();
    let mut current = String::new();
    let mut word_start: Option<f64> = None;

    for (i, entry) in alignment.characters.iter().enumerate() {
        let Some(c) = entry.chars().next() else {
            continue;
        };

        if is_word_break(c) {
            if let Some(start) = word_start.take() {
                let end = if i > 0 {
                    alignment.character_end_times_seconds[i - 1]
                } else {
                    alignment.character_start_times_seconds[i]
                };
                words.push(CaptionSegment {
                    text: std::mem::take(&mut current),
                    start: start + offset,
                    end: end + offset,
                    speaker: speaker.map(str::to_string),
                });
            }
        } else {
            if word_start.is_none() {
                word_start = Some(alignment.character_start_times_seconds[i]);
            }
            current.push_str(entry);
        }
    }

    if let (Some(start), false) = (word_start, current.is_empty()) {
        let end = alignment
            .character_end_times_seconds
            .last()
            .copied()
            .unwrap_or(start);
        words.push(CaptionSegment {
            text: current,
            start: start + offset,
            end: end + offset,
            speaker: speaker.map(str::to_string),
        });
    }

    Ok(words)
}

/// Contiguous per-speaker spans, in order of appearance. Each span runs from
/// the speaker's first segment to the start of the next speaker's first
/// segment, so overlay handoffs are seamless; the final span ends with the
/// last segment.
pub fn speaker_spans(segments: &[CaptionSegment]) -> Vec<(String, f64, f64)> {
    let mut spans: Vec<(String, f64, f64)> = Vec::new();

    for segment in segments {
        let Some(speaker) = &segment.speaker else {
            continue;
        };

        let continues_run = spans
            .last()
            .map_or(false, |(current, _, _)| current == speaker);
        if continues_run {
            if let Some(last) = spans.last_mut() {
                last.2 = segment.end;
            }
        } else {
            // Hand the previous speaker off exactly where this one starts.
            if let Some(last) = spans.last_mut() {
                last.2 = segment.start;
            }
            spans.push((speaker.clone(), segment.start, segment.end));
        }
    }

    spans
}

/// Format seconds as `HH:MM:SS.mmm` for logging.
pub fn format_timestamp(seconds: f64) -> String {
    let hours = (seconds / 3600.0).floor() as u32;
    let minutes = ((seconds % 3600.0) / 60.0).floor() as u32;
    let remainder = seconds % 60.0;

    format!("{:02}:{:02}:{:06.3}", hours, minutes, remainder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_json_segments_are_ordered_and_non_overlapping() {
        let body = r#"{
            "text": "Hello world. Goodbye.",
            "segments": [
                {"id": 0, "text": " Hello world.", "start": 0.0, "end": 1.2},
                {"id": 1, "text": " Goodbye.", "start": 1.2, "end": 2.0}
            ]
        }"#;

        let segments = segments_from_verbose_json(body).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "Hello world.");
        for pair in segments.windows(2) {
            assert!(pair[0].start <= pair[1].start);
            assert!(pair[0].end <= pair[1].start);
        }
    }

    #[test]
    fn garbage_transcription_body_is_external_service_error() {
        let err = segments_from_verbose_json("<html>oops</html>").unwrap_err();
        assert!(matches!(err, ReelError::ExternalService { .. }));
    }

    fn alignment_for(text: &str, step: f64) -> CharacterAlignment {
        let characters: Vec<String> = text.chars().map(|c| c.to_string()).collect();
        let starts: Vec<f64> = (0..characters.len()).map(|i| i as f64 * step).collect();
        let ends: Vec<f64> = starts.iter().map(|s| s + step).collect();
        CharacterAlignment {
            characters,
            character_start_times_seconds: starts,
            character_end_times_seconds: ends,
        }
    }

    #[test]
    fn alignment_splits_into_words_at_punctuation() {
        let alignment = alignment_for("Hi, you!", 0.1);
        let words = words_from_alignment(&alignment, 0.0, None).unwrap();

        let texts: Vec<&str> = words.iter().map(|w| w.text.as_str()).collect();
        assert_eq!(texts, vec!["Hi", "you"]);
        assert!((words[0].start - 0.0).abs() < 1e-9);
        assert!((words[0].end - 0.2).abs() < 1e-9);
        assert!((words[1].start - 0.4).abs() < 1e-9);
    }

    #[test]
    fn alignment_offset_shifts_every_word() {
        let alignment = alignment_for("go now", 0.1);
        let words = words_from_alignment(&alignment, 5.0, Some("character1")).unwrap();

        assert_eq!(words.len(), 2);
        assert!(words.iter().all(|w| w.start >= 5.0));
        assert_eq!(words[0].speaker.as_deref(), Some("character1"));
    }

    #[test]
    fn trailing_word_without_punctuation_is_kept() {
        let alignment = alignment_for("end", 0.1);
        let words = words_from_alignment(&alignment, 0.0, None).unwrap();
        assert_eq!(words.len(), 1);
        assert_eq!(words[0].text, "end");
        assert!((words[0].end - 0.3).abs() < 1e-9);
    }

    #[test]
    fn truncated_timing_arrays_are_external_service_error() {
        let alignment = CharacterAlignment {
            characters: vec!["a".to_string(), " ".to_string(), "b".to_string()],
            character_start_times_seconds: vec![0.0],
            character_end_times_seconds: vec![0.1],
        };

        let err = words_from_alignment(&alignment, 0.0, None).unwrap_err();
        assert!(matches!(err, ReelError::ExternalService { .. }));
    }

    fn seg(speaker: &str, start: f64, end: f64) -> CaptionSegment {
        CaptionSegment {
            text: "w".to_string(),
            start,
            end,
            speaker: Some(speaker.to_string()),
        }
    }

    #[test]
    fn speaker_spans_group_contiguous_runs() {
        let segments = vec![
            seg("a", 0.0, 0.5),
            seg("a", 0.5, 1.0),
            seg("b", 1.4, 2.0),
            seg("a", 2.2, 3.0),
        ];

        let spans = speaker_spans(&segments);
        assert_eq!(
            spans,
            vec![
                ("a".to_string(), 0.0, 1.4),
                ("b".to_string(), 1.4, 2.2),
                ("a".to_string(), 2.2, 3.0),
            ]
        );
    }

    #[test]
    fn timestamp_formatting() {
        assert_eq!(format_timestamp(0.0), "00:00:00.000");
        assert_eq!(format_timestamp(61.25), "00:01:01.250");
        assert_eq!(format_timestamp(3661.5), "01:01:01.500");
    }
}
