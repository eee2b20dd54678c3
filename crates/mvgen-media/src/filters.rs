//! FFmpeg filter graphs for the music video.
//!
//! Input 0 of the final composite is always the looped base video; caption
//! images follow at the indices the caller assigns.

use std::collections::HashMap;
use std::fmt::Write;

/// Joined clip graph.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipChain {
    /// `-filter_complex` graph ending in `[base]`
    pub graph: String,
    /// Expected output duration in seconds
    pub duration: f64,
    /// Edges joined with a crossfade
    pub crossfades: usize,
}

/// Output label of [`clip_chain`].
pub const BASE_LABEL: &str = "[base]";
/// Output label of [`composite_graph`].
pub const VIDEO_OUT_LABEL: &str = "[vout]";

/// Normalize every clip with `normalize` and join them in order.
///
/// Adjacent clips are crossfaded for `transition` seconds unless either
/// of them is shorter than twice the transition, in which case that edge
/// is a hard cut.
pub fn clip_chain(durations: &[f64], transition: f64, normalize: &str) -> ClipChain {
    let mut graph = String::new();
    let last = durations.len().saturating_sub(1);

    for i in 0..durations.len() {
        let label = if durations.len() == 1 {
            BASE_LABEL.to_string()
        } else {
            format!("[n{}]", i)
        };
        let _ = write!(
            graph,
            "[{}:v]{},settb=AVTB,setpts=PTS-STARTPTS{};",
            i, normalize, label
        );
    }

    let Some(&first) = durations.first() else {
        return ClipChain {
            graph,
            duration: 0.0,
            crossfades: 0,
        };
    };

    let mut acc_label = "[n0]".to_string();
    let mut acc_duration = first;
    let mut crossfades = 0;

    for i in 1..durations.len() {
        let label = if i == last {
            BASE_LABEL.to_string()
        } else {
            format!("[x{}]", i)
        };

        let fade = transition > 0.0
            && durations[i - 1] >= 2.0 * transition
            && durations[i] >= 2.0 * transition;

        if fade {
            let offset = acc_duration - transition;
            let _ = write!(
                graph,
                "{}[n{}]xfade=transition=fade:duration={:.3}:offset={:.3}{};",
                acc_label, i, transition, offset, label
            );
            acc_duration += durations[i] - transition;
            crossfades += 1;
        } else {
            let _ = write!(graph, "{}[n{}]concat=n=2:v=1:a=0{};", acc_label, i, label);
            acc_duration += durations[i];
        }
        acc_label = label;
    }

    ClipChain {
        graph: graph.trim_end_matches(';').to_string(),
        duration: acc_duration,
        crossfades,
    }
}

/// One timed caption overlay in the composite.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayCue {
    /// FFmpeg input index of the caption image
    pub input: usize,
    pub start: f64,
    pub end: f64,
}

/// Final composite: trim the looped base to `total` seconds and overlay
/// every caption during its window with alpha fades of up to `fade` seconds.
///
/// Caption inputs are single still frames. Each cue repeats its frame only
/// for its own window and is shifted to its start, so the caption work is
/// bounded by the timeline length regardless of how many lines there are.
pub fn composite_graph(
    total: f64,
    overlays: &[OverlayCue],
    fade: f64,
    fps: u32,
    pixel_format: &str,
) -> String {
    let mut graph = String::new();
    let _ = write!(graph, "[0:v]trim=duration={:.3},setpts=PTS-STARTPTS[bg];", total);

    // An input used more than once has to be split
    let mut uses: HashMap<usize, usize> = HashMap::new();
    for cue in overlays {
        *uses.entry(cue.input).or_default() += 1;
    }
    let mut split_inputs: Vec<_> = uses.iter().filter(|(_, n)| **n > 1).collect();
    split_inputs.sort();
    for (input, count) in split_inputs {
        let _ = write!(graph, "[{}:v]split={}", input, count);
        for j in 0..*count {
            let _ = write!(graph, "[c{}_{}]", input, j);
        }
        graph.push(';');
    }

    let mut taken: HashMap<usize, usize> = HashMap::new();
    let mut prev = "[bg]".to_string();

    for (m, cue) in overlays.iter().enumerate() {
        let source = if uses.get(&cue.input).copied().unwrap_or(0) > 1 {
            let j = taken.entry(cue.input).or_default();
            let label = format!("[c{}_{}]", cue.input, j);
            *j += 1;
            label
        } else {
            format!("[{}:v]", cue.input)
        };

        let window = (cue.end - cue.start).max(0.0);
        let frames = cue_frames(window, fps);
        let f = fade.min(window / 2.0);
        let _ = write!(
            graph,
            "{}loop=loop={}:size=1:start=0,setpts=N/({}*TB)+{:.3}/TB,format=rgba,\
             fade=t=in:st={:.3}:d={:.3}:alpha=1,fade=t=out:st={:.3}:d={:.3}:alpha=1[f{}];",
            source,
            frames - 1,
            fps,
            cue.start,
            cue.start,
            f,
            cue.end - f,
            f,
            m
        );
        let _ = write!(
            graph,
            "{}[f{}]overlay=0:0:eof_action=pass:enable='between(t,{:.3},{:.3})'[o{}];",
            prev, m, cue.start, cue.end, m
        );
        prev = format!("[o{}]", m);
    }

    let _ = write!(graph, "{}format={}{}", prev, pixel_format, VIDEO_OUT_LABEL);
    graph
}

/// Frames a caption shows for during a `window`-second cue; at least one.
pub fn cue_frames(window: f64, fps: u32) -> u64 {
    ((window * fps as f64).ceil() as u64).max(1)
}

/// Escape a value for use as a filter option inside a filter graph.
pub fn escape_filter_value(value: &str) -> String {
    let mut option_level = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '\'' | ':') {
            option_level.push('\\');
        }
        option_level.push(c);
    }

    let mut graph_level = String::with_capacity(option_level.len());
    for c in option_level.chars() {
        if matches!(c, '\\' | '\'' | '[' | ']' | ',' | ';') {
            graph_level.push('\\');
        }
        graph_level.push(c);
    }
    graph_level
}
