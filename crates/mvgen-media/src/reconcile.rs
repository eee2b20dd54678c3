//! Lyrics/audio count reconciliation, applied before assembly.

use tracing::warn;

/// Lyrics texts aligned to the audio list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    /// One text per audio track when `subtitles` is set
    pub texts: Vec<String>,
    /// Whether captions are still rendered
    pub subtitles: bool,
    /// `(lyrics, audio)` counts when they differed
    pub mismatch: Option<(usize, usize)>,
}

/// Align lyrics texts with the audio tracks.
///
/// With subtitles on and mismatched counts, texts are expanded cyclically so
/// `texts[i] == lyrics[i % lyrics.len()]`. With no texts at all, subtitles
/// are switched off. Audio is never dropped.
pub fn reconcile_lyrics(lyrics: &[String], audio_count: usize, subtitles: bool) -> Reconciled {
    if !subtitles || lyrics.len() == audio_count {
        return Reconciled {
            texts: lyrics.to_vec(),
            subtitles,
            mismatch: None,
        };
    }

    let mismatch = Some((lyrics.len(), audio_count));

    if lyrics.is_empty() {
        warn!(
            audio_count,
            "No lyrics available for {} audio tracks, disabling subtitles", audio_count
        );
        return Reconciled {
            texts: Vec::new(),
            subtitles: false,
            mismatch,
        };
    }

    warn!(
        lyrics_count = lyrics.len(),
        audio_count,
        "Lyrics/audio count mismatch, cycling lyrics to cover every track"
    );

    let texts = (0..audio_count)
        .map(|i| lyrics[i % lyrics.len()].clone())
        .collect();

    Reconciled {
        texts,
        subtitles: true,
        mismatch,
    }
}
