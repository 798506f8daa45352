//! Final video composition.
//!
//! Builds a single ffmpeg invocation that loops/trims the background to the
//! narration length, center-crops and scales it to the target vertical
//! resolution, burns in each caption segment with drawtext, overlays speaker
//! images with alpha fades at span boundaries, and muxes the narration audio.
//! The plan (input list + filtergraph + encoder args) is constructed as pure
//! data so the timing and geometry are testable without running ffmpeg.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use lazy_static::lazy_static;
use regex::Regex;

use crate::captions::CaptionSegment;
use crate::config::PipelineConfig;
use crate::error::{ReelError, Result};
use crate::media::{ffmpeg, probe};

/// Duration of the overlay alpha fade at each span boundary, seconds.
pub const OVERLAY_FADE: f64 = 0.2;
/// Rendered size of a speaker overlay image, pixels (square).
pub const OVERLAY_SIZE: u32 = 300;

const FPS: u32 = 24;

/// Vertical placement of burned-in captions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptionPlacement {
    /// Lower portion of the frame (monologue captions).
    LowerThird,
    /// Centered (dialogue word captions).
    Center,
}

/// Per-speaker rendering info: caption colors, overlay image and position,
/// and the time spans during which the speaker is active.
#[derive(Debug, Clone)]
pub struct SpeakerVisual {
    pub id: String,
    pub caption_color: String,
    pub caption_stroke_color: String,
    pub image: Option<PathBuf>,
    pub position: (i64, i64),
    pub spans: Vec<(f64, f64)>,
}

pub struct ComposeRequest<'a> {
    pub background: &'a Path,
    pub narration: &'a Path,
    pub segments: &'a [CaptionSegment],
    pub speakers: &'a [SpeakerVisual],
    pub placement: CaptionPlacement,
    pub config: &'a PipelineConfig,
    pub output: &'a Path,
}

/// A fully resolved ffmpeg invocation.
#[derive(Debug, Clone)]
pub struct ComposePlan {
    pub args: Vec<String>,
}

/// Compose the final video and return its path. Probes the inputs, builds the
/// plan, runs ffmpeg, and verifies a non-empty output was written.
pub fn compose(request: &ComposeRequest<'_>) -> Result<PathBuf> {
    let narration_duration = probe::media_duration(request.narration)?;
    let background_duration = probe::media_duration(request.background)?;
    let (bg_width, bg_height) = probe::video_resolution(request.background)?;

    log::info!(
        "composing {:.1}s narration over {} ({}x{}, {:.1}s)",
        narration_duration,
        request.background.display(),
        bg_width,
        bg_height,
        background_duration
    );

    let plan = build_plan(
        request,
        bg_width,
        bg_height,
        background_duration,
        narration_duration,
    );
    ffmpeg::run_ffmpeg(&plan.args)?;

    let metadata = std::fs::metadata(request.output).map_err(|_| {
        ReelError::Composition(format!(
            "output file was not written: {}",
            request.output.display()
        ))
    })?;
    if metadata.len() == 0 {
        return Err(ReelError::Composition(format!(
            "output file is empty: {}",
            request.output.display()
        )));
    }

    log::info!("final video created: {}", request.output.display());
    Ok(request.output.to_path_buf())
}

/// Build the ffmpeg argument list for a composition.
pub fn build_plan(
    request: &ComposeRequest<'_>,
    bg_width: u32,
    bg_height: u32,
    background_duration: f64,
    narration_duration: f64,
) -> ComposePlan {
    let config = request.config;
    let mut args: Vec<String> = vec!["-y".to_string()];

    let loops = extra_loops(background_duration, narration_duration);
    if loops > 0 {
        args.push("-stream_loop".to_string());
        args.push(loops.to_string());
    }
    args.push("-i".to_string());
    args.push(request.background.to_string_lossy().into_owned());
    args.push("-i".to_string());
    args.push(request.narration.to_string_lossy().into_owned());

    // One looped image input per overlay span.
    let overlay_spans: Vec<(&SpeakerVisual, (f64, f64))> = request
        .speakers
        .iter()
        .filter(|speaker| speaker.image.is_some())
        .flat_map(|speaker| speaker.spans.iter().map(move |span| (speaker, *span)))
        .collect();
    for (speaker, (start, end)) in &overlay_spans {
        let image = speaker.image.as_ref().unwrap();
        args.push("-loop".to_string());
        args.push("1".to_string());
        args.push("-t".to_string());
        args.push(format!("{:.3}", end - start));
        args.push("-i".to_string());
        args.push(image.to_string_lossy().into_owned());
    }

    let mut filters: Vec<String> = Vec::new();
    filters.push(format!(
        "[0:v]{},fps={}[bg]",
        crop_scale_filter(bg_width, bg_height, config.video_width, config.video_height),
        FPS
    ));
    let mut current = "bg".to_string();

    for (k, (speaker, (start, end))) in overlay_spans.iter().enumerate() {
        let input_index = 2 + k;
        let duration = end - start;
        let fade_out_start = (duration - OVERLAY_FADE).max(0.0);

        filters.push(format!(
            "[{idx}:v]scale={size}:{size},format=rgba,\
             fade=t=in:st=0:d={fade:.3}:alpha=1,\
             fade=t=out:st={fos:.3}:d={fade:.3}:alpha=1,\
             setpts=PTS-STARTPTS+{start:.3}/TB[ov{k}]",
            idx = input_index,
            size = OVERLAY_SIZE,
            fade = OVERLAY_FADE,
            fos = fade_out_start,
            start = start,
            k = k,
        ));

        let next = format!("v{}", k);
        filters.push(format!(
            "[{current}][ov{k}]overlay=x={x}:y={y}:enable='between(t,{start:.3},{end:.3})'[{next}]",
            current = current,
            k = k,
            x = speaker.position.0,
            y = speaker.position.1,
            start = start,
            end = end,
            next = next,
        ));
        current = next;
    }

    let caption_filters: Vec<String> = request
        .segments
        .iter()
        .filter(|segment| !segment.text.is_empty() && segment.end > segment.start)
        .map(|segment| caption_filter(segment, request))
        .collect();
    if caption_filters.is_empty() {
        filters.push(format!("[{}]copy[vout]", current));
    } else {
        filters.push(format!("[{}]{}[vout]", current, caption_filters.join(",")));
    }

    args.push("-filter_complex".to_string());
    args.push(filters.join(";"));

    args.extend(
        ["-map", "[vout]", "-map", "1:a"].map(str::to_string),
    );
    args.push("-t".to_string());
    args.push(format!("{:.3}", narration_duration));
    args.extend(
        [
            "-c:v",
            "libx264",
            "-preset",
            "medium",
            "-crf",
            "23",
            "-pix_fmt",
            "yuv420p",
            "-c:a",
            "aac",
            "-b:a",
            "192k",
        ]
        .map(str::to_string),
    );
    args.push(request.output.to_string_lossy().into_owned());

    ComposePlan { args }
}

fn caption_filter(segment: &CaptionSegment, request: &ComposeRequest<'_>) -> String {
    let config = request.config;
    let style = segment
        .speaker
        .as_ref()
        .and_then(|id| request.speakers.iter().find(|s| &s.id == id));
    let color = style
        .map(|s| s.caption_color.as_str())
        .unwrap_or(config.caption_color.as_str());
    let stroke = style
        .map(|s| s.caption_stroke_color.as_str())
        .unwrap_or(config.caption_stroke_color.as_str());

    let y = match request.placement {
        CaptionPlacement::LowerThird => "h*0.75",
        CaptionPlacement::Center => "(h-text_h)/2",
    };

    format!(
        "drawtext=text='{text}':expansion=none:font='{font}':fontsize={size}:\
         fontcolor={color}:bordercolor={stroke}:borderw={borderw}:\
         x=(w-text_w)/2:y={y}:enable='between(t,{start:.3},{end:.3})'",
        text = escape_drawtext_text(&segment.text),
        font = escape_drawtext_text(&config.caption_font),
        size = config.caption_fontsize,
        color = color,
        stroke = stroke,
        borderw = config.caption_stroke_width,
        y = y,
        start = segment.start,
        end = segment.end,
    )
}

/// Additional `-stream_loop` iterations needed so the looped background
/// covers the narration (0 when the background is already long enough).
pub fn extra_loops(background_duration: f64, narration_duration: f64) -> u32 {
    if background_duration <= 0.0 || background_duration >= narration_duration {
        return 0;
    }
    (narration_duration / background_duration).ceil() as u32 - 1
}

/// Center-crop to the target aspect ratio, then scale to the target size.
pub fn crop_scale_filter(
    bg_width: u32,
    bg_height: u32,
    target_width: u32,
    target_height: u32,
) -> String {
    let bg_aspect = bg_width as f64 / bg_height as f64;
    let target_aspect = target_width as f64 / target_height as f64;

    if bg_aspect > target_aspect {
        // Background is wider: crop horizontally.
        let crop_width = (bg_height as f64 * target_aspect).round() as u32;
        format!(
            "crop={cw}:{bh}:(iw-{cw})/2:0,scale={tw}:{th}",
            cw = crop_width,
            bh = bg_height,
            tw = target_width,
            th = target_height,
        )
    } else {
        // Background is taller: crop vertically.
        let crop_height = (bg_width as f64 / target_aspect).round() as u32;
        format!(
            "crop={bw}:{ch}:0:(ih-{ch})/2,scale={tw}:{th}",
            bw = bg_width,
            ch = crop_height,
            tw = target_width,
            th = target_height,
        )
    }
}

/// Escape a value for use inside a single-quoted drawtext option.
pub fn escape_drawtext_text(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('\'', "'\\''")
        .replace(':', "\\:")
}

/// Timestamped output file name, unique per generation second.
pub fn output_filename(now: DateTime<Local>) -> String {
    format!("final_{}.mp4", now.format("%Y%m%d_%H%M%S"))
}

lazy_static! {
    static ref NON_WORD: Regex = Regex::new(r"[^\w\s-]").unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
    static ref HYPHEN_RUN: Regex = Regex::new(r"-+").unwrap();
}

/// Output file name derived from a dialogue's title and description, used by
/// batch generation: special characters dropped, whitespace hyphenated,
/// lowercased, capped at 100 characters.
pub fn titled_filename(title: &str, description: &str) -> String {
    let combined = format!("{}_{}", title, description);
    let cleaned = NON_WORD.replace_all(&combined, "");
    let hyphenated = WHITESPACE.replace_all(&cleaned, "-");
    let collapsed = HYPHEN_RUN.replace_all(&hyphenated, "-");
    let slug: String = collapsed
        .trim_matches('-')
        .chars()
        .take(100)
        .collect::<String>()
        .to_lowercase();

    if slug.chars().all(|c| c == '_' || c == '-') {
        return "video.mp4".to_string();
    }
    format!("{}.mp4", slug)
}

/// Overlay anchor positions for a two-speaker dialogue: lower-left and
/// lower-right, with the margins of the original layout.
pub fn overlay_positions(width: u32, height: u32) -> [(i64, i64); 2] {
    let y = height as i64 - 670;
    [(50, y), (width as i64 - (OVERLAY_SIZE as i64 + 50), y)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn request<'a>(
        background: &'a Path,
        narration: &'a Path,
        segments: &'a [CaptionSegment],
        speakers: &'a [SpeakerVisual],
        config: &'a PipelineConfig,
        output: &'a Path,
    ) -> ComposeRequest<'a> {
        ComposeRequest {
            background,
            narration,
            segments,
            speakers,
            placement: CaptionPlacement::LowerThird,
            config,
            output,
        }
    }

    #[test]
    fn extra_loops_covers_narration() {
        // 5s background, 5s narration: no looping needed.
        assert_eq!(extra_loops(5.0, 5.0), 0);
        // 5s background, 12s narration: 3 plays total, 2 extra.
        assert_eq!(extra_loops(5.0, 12.0), 2);
        assert_eq!(extra_loops(5.0, 10.1), 2);
        assert_eq!(extra_loops(10.0, 5.0), 0);
        assert_eq!(extra_loops(0.0, 5.0), 0);
    }

    #[test]
    fn wide_background_is_cropped_horizontally() {
        let filter = crop_scale_filter(1920, 1080, 1080, 1920);
        // 9:16 slice of a 1080-tall frame is 608 wide (rounded).
        assert_eq!(filter, "crop=608:1080:(iw-608)/2:0,scale=1080:1920");
    }

    #[test]
    fn tall_background_is_cropped_vertically() {
        let filter = crop_scale_filter(1080, 2400, 1080, 1920);
        assert_eq!(filter, "crop=1080:1920:0:(ih-1920)/2,scale=1080:1920");
    }

    #[test]
    fn drawtext_escaping_handles_quotes_and_colons() {
        assert_eq!(escape_drawtext_text("it's 5:00"), "it'\\''s 5\\:00");
        assert_eq!(escape_drawtext_text(r"a\b"), r"a\\b");
    }

    #[test]
    fn output_filename_embeds_timestamp() {
        let now = Local.with_ymd_and_hms(2024, 3, 5, 7, 9, 11).unwrap();
        assert_eq!(output_filename(now), "final_20240305_070911.mp4");
    }

    #[test]
    fn titled_filename_slugs_title_and_description() {
        assert_eq!(
            titled_filename("Cats vs. Dogs", "round #2"),
            "cats-vs-dogs_round-2.mp4"
        );
        assert_eq!(
            titled_filename("Epic   Fail!", "Generated video"),
            "epic-fail_generated-video.mp4"
        );
    }

    #[test]
    fn titled_filename_is_capped_at_100_characters() {
        let long = "a".repeat(150);
        let name = titled_filename(&long, "x");
        assert_eq!(name.len(), 100 + ".mp4".len());
    }

    #[test]
    fn titled_filename_never_yields_an_empty_stem() {
        assert_eq!(titled_filename("---", "!!!"), "video.mp4");
        assert_eq!(titled_filename("", ""), "video.mp4");
    }

    #[test]
    fn plan_loops_short_background_and_trims_to_narration() {
        let config = PipelineConfig::default();
        let segments = vec![CaptionSegment {
            text: "Hello world.".to_string(),
            start: 0.0,
            end: 1.2,
            speaker: None,
        }];
        let plan = build_plan(
            &request(
                Path::new("bg.mp4"),
                Path::new("voice.mp3"),
                &segments,
                &[],
                &config,
                Path::new("out.mp4"),
            ),
            1920,
            1080,
            5.0,
            12.0,
        );

        let args = plan.args.join(" ");
        assert!(args.contains("-stream_loop 2"));
        assert!(args.contains("-t 12.000"));
        assert_eq!(plan.args.last().unwrap(), "out.mp4");

        let filter_idx = plan
            .args
            .iter()
            .position(|a| a == "-filter_complex")
            .unwrap();
        let filter = &plan.args[filter_idx + 1];
        assert!(filter.contains("crop=608:1080"));
        assert!(filter.contains("fps=24"));
        assert!(filter.contains("drawtext=text='Hello world.'"));
        assert!(filter.contains("enable='between(t,0.000,1.200)'"));
        assert!(filter.contains("y=h*0.75"));
        assert!(filter.ends_with("[vout]"));
    }

    #[test]
    fn plan_without_captions_passes_video_through() {
        let config = PipelineConfig::default();
        let plan = build_plan(
            &request(
                Path::new("bg.mp4"),
                Path::new("voice.mp3"),
                &[],
                &[],
                &config,
                Path::new("out.mp4"),
            ),
            1080,
            1920,
            30.0,
            5.0,
        );

        let args = plan.args.join(" ");
        assert!(!args.contains("-stream_loop"));
        assert!(!args.contains("drawtext"));
        assert!(args.contains("[bg]copy[vout]"));
    }

    #[test]
    fn plan_adds_faded_overlays_per_speaker_span() {
        let config = PipelineConfig::default();
        let segments = vec![CaptionSegment {
            text: "Hi".to_string(),
            start: 0.0,
            end: 0.5,
            speaker: Some("character1".to_string()),
        }];
        let speakers = vec![SpeakerVisual {
            id: "character1".to_string(),
            caption_color: "#5B8DEF".to_string(),
            caption_stroke_color: "black".to_string(),
            image: Some(PathBuf::from("ava.png")),
            position: (50, 1250),
            spans: vec![(0.0, 2.0), (4.0, 6.5)],
        }];
        let mut req = request(
            Path::new("bg.mp4"),
            Path::new("voice.mp3"),
            &segments,
            &speakers,
            &config,
            Path::new("out.mp4"),
        );
        req.placement = CaptionPlacement::Center;

        let plan = build_plan(&req, 1080, 1920, 30.0, 7.0);
        let args = plan.args.join(" ");

        // Two overlay image inputs, one per span.
        assert_eq!(plan.args.iter().filter(|a| *a == "ava.png").count(), 2);
        assert!(args.contains("-loop 1 -t 2.000 -i ava.png"));
        assert!(args.contains("-loop 1 -t 2.500 -i ava.png"));

        let filter_idx = plan
            .args
            .iter()
            .position(|a| a == "-filter_complex")
            .unwrap();
        let filter = &plan.args[filter_idx + 1];
        assert!(filter.contains("fade=t=in:st=0:d=0.200:alpha=1"));
        assert!(filter.contains("fade=t=out:st=1.800:d=0.200:alpha=1"));
        assert!(filter.contains("overlay=x=50:y=1250:enable='between(t,0.000,2.000)'"));
        assert!(filter.contains("overlay=x=50:y=1250:enable='between(t,4.000,6.500)'"));
        // Dialogue captions use the speaker's colors and centered placement.
        assert!(filter.contains("fontcolor=#5B8DEF"));
        assert!(filter.contains("y=(h-text_h)/2"));
    }

    #[test]
    fn overlay_positions_sit_in_the_lower_corners() {
        let [left, right] = overlay_positions(1080, 1920);
        assert_eq!(left, (50, 1250));
        assert_eq!(right, (730, 1250));
    }
}
