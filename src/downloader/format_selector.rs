// FormatSelector - format policy resolution
//
// Maps (media kind, quality tier, capabilities) to a yt-dlp format expression
// and an optional post-processing step. Handles:
// - Audio: prefer m4a so the file plays without conversion
// - Video: height caps per quality tier
// - No transcoder: single progressive mp4, never separate tracks that need a merge
//
// Pure: the same inputs always give the same policy.

use super::models::{
    Capabilities, FormatPolicy, MediaKind, PostProcessDirective, QualityTier, StreamSelector,
};

/// Container every player handles
const PLAYABLE_CONTAINER: &str = "mp4";

/// Codec and bitrate for extracted audio
const AUDIO_CODEC: &str = "mp3";
const AUDIO_KBPS: u32 = 192;

/// Height cap used when separate tracks cannot be merged
const NO_TRANSCODER_MAX_HEIGHT: u32 = 1080;

pub struct FormatSelector;

impl FormatSelector {
    /// Resolve the format policy for a request
    pub fn resolve(kind: MediaKind, quality: QualityTier, caps: Capabilities) -> FormatPolicy {
        match kind {
            MediaKind::Audio => Self::audio_policy(caps),
            MediaKind::Video => Self::video_policy(quality, caps),
            // Unspecified kind is the best-quality video branch
            MediaKind::Best => Self::video_policy(QualityTier::Best, caps),
        }
    }

    fn audio_policy(caps: Capabilities) -> FormatPolicy {
        let selector = StreamSelector::new(["bestaudio[ext=m4a]", "bestaudio", "best"]);

        // Without ffmpeg the m4a stream is already the usable result
        let post_process = caps
            .has_transcoder
            .then(|| PostProcessDirective::extract_audio(AUDIO_CODEC, AUDIO_KBPS));

        FormatPolicy {
            selector,
            post_process,
        }
    }

    fn video_policy(quality: QualityTier, caps: Capabilities) -> FormatPolicy {
        if !caps.has_transcoder {
            return FormatPolicy {
                selector: Self::progressive_selector(),
                post_process: None,
            };
        }

        let video = match quality.max_height() {
            Some(height) => format!("bestvideo[height<={}]", height),
            None => "bestvideo".to_string(),
        };

        FormatPolicy {
            selector: StreamSelector::new([format!("{}+bestaudio", video), "best".to_string()]),
            post_process: Some(PostProcessDirective::convert_container(PLAYABLE_CONTAINER)),
        }
    }

    /// Combined mp4 stream capped at 1080p, skipping DASH-only sources
    fn progressive_selector() -> StreamSelector {
        StreamSelector::new([
            format!(
                "best[ext={}][height<={}][protocol!=dash]",
                PLAYABLE_CONTAINER, NO_TRANSCODER_MAX_HEIGHT
            ),
            format!("best[ext={}]", PLAYABLE_CONTAINER),
            "best".to_string(),
        ])
    }
}
