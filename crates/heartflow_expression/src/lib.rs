//! Outbound side of the engagement core: per-stream message containers,
//! the thinking-placeholder lifecycle, and reply segmentation.

mod container;
mod thinking;

pub use container::MessageManager;
pub use thinking::{Fulfillment, ThinkingLifecycle};

/// Punctuation after which a segment may be cut.
const SENTENCE_ENDERS: [char; 8] = ['.', '!', '?', '。', '！', '？', '~', '～'];

/// Default segment length, matching the outbound config default.
const DEFAULT_MAX_SEGMENT_CHARS: usize = 60;

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Cuts a generated reply into the segments of one outbound message set.
///
/// Lines are packed together while they fit; an overlong line is cut after
/// sentence punctuation, and a sentence that still does not fit is wrapped
/// hard. No segment is longer than `max_segment_chars` characters.
pub struct Humanizer {
    max_segment_chars: usize,
}

impl Humanizer {
    pub fn new() -> Self {
        Self::with_max_chunk_chars(DEFAULT_MAX_SEGMENT_CHARS)
    }

    pub fn with_max_chunk_chars(max_segment_chars: usize) -> Self {
        Self {
            max_segment_chars: max_segment_chars.max(1),
        }
    }

    pub fn split_response(&self, text: &str) -> Vec<String> {
        let mut segments = Vec::new();
        let mut pending = String::new();

        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if !pending.is_empty() && char_len(&pending) + 1 + char_len(line) <= self.max_segment_chars {
                pending.push('\n');
                pending.push_str(line);
                continue;
            }
            self.emit(&mut segments, std::mem::take(&mut pending));
            pending = line.to_string();
        }
        self.emit(&mut segments, pending);

        segments
    }

    fn emit(&self, segments: &mut Vec<String>, chunk: String) {
        if char_len(&chunk) <= self.max_segment_chars {
            push_trimmed(segments, &chunk);
            return;
        }

        let mut current = String::new();
        for sentence in chunk.split_inclusive(|c: char| SENTENCE_ENDERS.contains(&c)) {
            if !current.is_empty() && char_len(&current) + char_len(sentence) > self.max_segment_chars {
                push_trimmed(segments, &std::mem::take(&mut current));
            }
            if char_len(sentence) > self.max_segment_chars {
                self.wrap(segments, sentence);
            } else {
                current.push_str(sentence);
            }
        }
        push_trimmed(segments, &current);
    }

    /// Cut an unpunctuated run into fixed-width pieces.
    fn wrap(&self, segments: &mut Vec<String>, run: &str) {
        let chars: Vec<char> = run.chars().collect();
        for piece in chars.chunks(self.max_segment_chars) {
            push_trimmed(segments, &piece.iter().collect::<String>());
        }
    }
}

fn push_trimmed(segments: &mut Vec<String>, segment: &str) {
    let segment = segment.trim();
    if !segment.is_empty() {
        segments.push(segment.to_string());
    }
}

impl Default for Humanizer {
    fn default() -> Self {
        Self::new()
    }
}
