//! Dialogue parser module
//!
//! Turns a raw transcript into ordered, speaker-tagged lines.
//!
//! Transcripts arrive in three shapes: one transmission per line, quoted
//! fragments embedded in prose (any Unicode double quote), or one continuous
//! run of text where only the callsigns separate the transmissions. Four
//! extraction strategies are tried in order and the first one that yields at
//! least two usable segments wins.
//!
//! Speakers are never labelled reliably, so every segment goes through a
//! fixed cascade of lexical heuristics. Alternating by position is the last
//! resort and is exposed as its own strategy.

use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{
    callsign::CallsignMatcher, config::EngineConfig, errors::Error, extraction::TextNormalizer,
    rules::compile,
};

const DOUBLE_QUOTES: &str = r#"\x{22}\x{AB}\x{BB}\x{201C}-\x{201F}\x{2033}\x{301D}-\x{301F}\x{FF02}"#;

const SPEAKER_LABELS: &str =
    r"atc|tower|twr|ground|gnd|approach|app|departure|dep|control|ctl|center|ctr|pilot|pil|plt";

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Speaker {
    Atc,
    Pilot,
    Unknown,
}

impl Speaker {
    pub fn opposite(self) -> Self {
        match self {
            Speaker::Atc => Speaker::Pilot,
            Speaker::Pilot => Speaker::Atc,
            Speaker::Unknown => Speaker::Unknown,
        }
    }
}

/// Which rule decided a line's speaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeakerHeuristic {
    ExplicitLabel,
    TrailingCallsign,
    LeadingCallsign,
    AtcMarker,
    PilotMarker,
    AtcCommand,
    /// Opposite of the previous line's speaker.
    Alternation,
    /// Last resort: even positions are ATC, odd positions are the pilot.
    AlternatePosition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStrategy {
    QuotedFragments,
    LineBreaks,
    CallsignDelimited,
    SentenceBoundaries,
    WholeText,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ParsedLine {
    /// 1-based, contiguous.
    pub line_number: usize,
    pub text: String,
    pub raw_text: String,
    pub speaker: Speaker,
    pub heuristic: Option<SpeakerHeuristic>,
}

impl ParsedLine {
    pub fn new(line_number: usize, text: String, raw_text: String, speaker: Speaker) -> Self {
        Self {
            line_number,
            text,
            raw_text,
            speaker,
            heuristic: None,
        }
    }

    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

#[derive(Debug, Clone)]
pub struct DialogueParser {
    callsigns: CallsignMatcher,
    normalizer: TextNormalizer,
    quoted: Regex,
    label: Regex,
    bare_label: Regex,
    sentence_end: Regex,
    atc_markers: Regex,
    pilot_markers: Regex,
    atc_commands: Regex,
    min_segment_len: usize,
}

impl DialogueParser {
    pub fn new(callsigns: CallsignMatcher, config: &EngineConfig) -> Result<Self, Error> {
        Ok(Self {
            callsigns,
            normalizer: TextNormalizer::new()?,
            quoted: Regex::new(&format!(
                "[{DOUBLE_QUOTES}]([^{DOUBLE_QUOTES}]+)[{DOUBLE_QUOTES}]"
            ))?,
            label: compile(&format!(r"^\s*({SPEAKER_LABELS})\s*:\s*"))?,
            bare_label: compile(&format!(r"^\s*({SPEAKER_LABELS})\s*:?\s*$"))?,
            sentence_end: Regex::new(r"[.!?;]+(?:\s+|$)")?,
            atc_markers: compile(
                r"\b(?:confirm|say again|verify|correction|disregard|stand ?by|radar contact|contact\s+\w+(?:\s+\w+)?\s+on)\b",
            )?,
            pilot_markers: compile(
                r"\b(?:roger|wilco|unable|requesting|climbing|descending|turning|maintaining|holding|lining|taxiing|leaving|passing|reducing|increasing|crossing|entering|vacating|proceeding)\b",
            )?,
            atc_commands: compile(
                r"\b(?:climb|descend)\b|\bmaintain\b|\bturn\s+(?:left|right)\b|\bcleared\s+(?:for|to)\b|\bsquawk\b|\btaxi\s+to\b|\bhold\s+short\b",
            )?,
            min_segment_len: config.min_segment_len,
        })
    }

    /// Parse a complete transcript into speaker-tagged lines.
    pub fn parse(&self, text: &str) -> Vec<ParsedLine> {
        let (strategy, segments) = self.extract_segments(text);
        debug!("Extracted {} segments using {:?}", segments.len(), strategy);

        let mut lines: Vec<ParsedLine> = segments
            .into_iter()
            .enumerate()
            .map(|(i, raw)| {
                let text = self.normalize(&raw);
                ParsedLine::new(i + 1, text, raw, Speaker::Unknown)
            })
            .collect();

        // First pass: lexical heuristics, otherwise alternate from the previous speaker.
        let mut previous: Option<Speaker> = None;
        for line in &mut lines {
            let decided = self.classify_lexically(&line.raw_text, &line.text).or_else(|| {
                previous.map(|speaker| (speaker.opposite(), SpeakerHeuristic::Alternation))
            });
            if let Some((speaker, heuristic)) = decided {
                line.speaker = speaker;
                line.heuristic = Some(heuristic);
                previous = Some(speaker);
            }
        }

        // Second pass when the first could not anchor most of the dialogue.
        let unknown = lines
            .iter()
            .filter(|l| l.speaker == Speaker::Unknown)
            .count();
        if unknown * 2 > lines.len() {
            debug!("{unknown} of {} lines unresolved, re-running context free", lines.len());
            for (position, line) in lines.iter_mut().enumerate() {
                if line.speaker == Speaker::Unknown {
                    let (speaker, heuristic) =
                        self.infer_speaker(&line.raw_text, &line.text, position);
                    line.speaker = speaker;
                    line.heuristic = Some(heuristic);
                }
            }
        }

        for line in &lines {
            debug!(
                "Line {} {:?} via {:?}: {}",
                line.line_number, line.speaker, line.heuristic, line.text
            );
        }
        lines
    }

    /// Runs the extraction cascade and reports which strategy won.
    pub fn extract_segments(&self, text: &str) -> (ExtractionStrategy, Vec<String>) {
        let candidates = [
            (ExtractionStrategy::QuotedFragments, self.quoted_fragments(text)),
            (ExtractionStrategy::LineBreaks, line_breaks(text)),
            (ExtractionStrategy::CallsignDelimited, self.callsign_delimited(text)),
            (ExtractionStrategy::SentenceBoundaries, self.sentence_boundaries(text)),
        ];
        for (strategy, segments) in candidates {
            let segments: Vec<String> = segments
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| self.is_meaningful(s))
                .collect();
            if segments.len() >= 2 {
                return (strategy, segments);
            }
        }
        let whole = text.trim().to_string();
        if self.is_meaningful(&whole) {
            (ExtractionStrategy::WholeText, vec![whole])
        } else {
            (ExtractionStrategy::WholeText, Vec::new())
        }
    }

    fn quoted_fragments(&self, text: &str) -> Vec<String> {
        self.quoted
            .captures_iter(text)
            .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
            .collect()
    }

    /// Splits continuous text at callsigns. A callsign right after a comma
    /// closes a pilot readback; any other callsign opens a new transmission.
    fn callsign_delimited(&self, text: &str) -> Vec<String> {
        let mut cuts: Vec<usize> = self
            .callsigns
            .find_all(text)
            .into_iter()
            .map(|m| {
                if text[..m.start].trim_end().ends_with(',') {
                    m.end
                } else {
                    m.start
                }
            })
            .filter(|&cut| cut > 0 && cut < text.len())
            .collect();
        cuts.sort_unstable();
        cuts.dedup();

        let mut segments = Vec::with_capacity(cuts.len() + 1);
        let mut start = 0;
        for cut in cuts {
            segments.push(text[start..cut].to_string());
            start = cut;
        }
        segments.push(text[start..].to_string());
        segments
    }

    fn sentence_boundaries(&self, text: &str) -> Vec<String> {
        self.sentence_end.split(text).map(String::from).collect()
    }

    /// Long enough, at least three letters and not just a speaker label.
    pub fn is_meaningful(&self, segment: &str) -> bool {
        let segment = segment.trim();
        segment.chars().count() > self.min_segment_len
            && segment.chars().filter(|c| c.is_alphabetic()).count() >= 3
            && !self.bare_label.is_match(segment)
    }

    pub fn normalize(&self, segment: &str) -> String {
        self.normalizer.normalize(segment)
    }

    fn explicit_label(&self, raw: &str) -> Option<Speaker> {
        let caps = self.label.captures(raw)?;
        let label = caps.get(1)?.as_str().to_lowercase();
        Some(match label.as_str() {
            "pilot" | "pil" | "plt" => Speaker::Pilot,
            _ => Speaker::Atc,
        })
    }

    /// Heuristics 1-5 (after an explicit label), in their fixed priority order.
    pub fn classify_lexically(&self, raw: &str, text: &str) -> Option<(Speaker, SpeakerHeuristic)> {
        if let Some(speaker) = self.explicit_label(raw) {
            return Some((speaker, SpeakerHeuristic::ExplicitLabel));
        }
        if self.callsigns.trailing(text).is_some() {
            return Some((Speaker::Pilot, SpeakerHeuristic::TrailingCallsign));
        }
        if self.callsigns.leading(text).is_some() {
            return Some((Speaker::Atc, SpeakerHeuristic::LeadingCallsign));
        }
        if self.atc_markers.is_match(text) {
            return Some((Speaker::Atc, SpeakerHeuristic::AtcMarker));
        }
        if self.pilot_markers.is_match(text) {
            return Some((Speaker::Pilot, SpeakerHeuristic::PilotMarker));
        }
        if self.atc_commands.is_match(text) {
            return Some((Speaker::Atc, SpeakerHeuristic::AtcCommand));
        }
        None
    }

    /// Context-free speaker inference: heuristics 1-5, then position.
    pub fn infer_speaker(
        &self,
        raw: &str,
        text: &str,
        position: usize,
    ) -> (Speaker, SpeakerHeuristic) {
        self.classify_lexically(raw, text).unwrap_or((
            alternate_by_position(position),
            SpeakerHeuristic::AlternatePosition,
        ))
    }
}

/// Last-resort speaker strategy: ATC opens the exchange, so even positions
/// (0-based) are ATC.
pub fn alternate_by_position(position: usize) -> Speaker {
    if position % 2 == 0 {
        Speaker::Atc
    } else {
        Speaker::Pilot
    }
}

fn line_breaks(text: &str) -> Vec<String> {
    text.lines().map(String::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use aviation_helper_rs::clearance::callsigns::CallsignTable;

    fn parser() -> DialogueParser {
        let callsigns = CallsignMatcher::new(&CallsignTable::builtin()).unwrap();
        DialogueParser::new(callsigns, &EngineConfig::default()).unwrap()
    }

    #[test]
    fn test_plain_lines() {
        let lines = parser().parse(
            "PAL456, descend and maintain flight level 250\nDescend and maintain flight level 250, PAL456\n",
        );
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].speaker, Speaker::Atc);
        assert_eq!(lines[0].heuristic, Some(SpeakerHeuristic::LeadingCallsign));
        assert_eq!(lines[1].speaker, Speaker::Pilot);
        assert_eq!(lines[1].heuristic, Some(SpeakerHeuristic::TrailingCallsign));
        assert_eq!(lines[1].line_number, 2);
    }

    #[test]
    fn test_unicode_quotes_win_over_lines() {
        let (strategy, segments) = parser().extract_segments(
            "The controller said “CEB789, climb and maintain FL350” and the student replied «Roger, CEB789».",
        );
        assert_eq!(strategy, ExtractionStrategy::QuotedFragments);
        assert_eq!(
            segments,
            vec!["CEB789, climb and maintain FL350", "Roger, CEB789"]
        );
    }

    #[test]
    fn test_callsign_delimited_continuous_text() {
        let text = "PAL456, climb and maintain flight level 350 PAL456 climbing flight level 350 PAL456, squawk 4721 squawk 4721, PAL456";
        let (strategy, segments) = parser().extract_segments(text);
        assert_eq!(strategy, ExtractionStrategy::CallsignDelimited);
        assert_eq!(
            segments,
            vec![
                "PAL456, climb and maintain flight level 350",
                "PAL456 climbing flight level 350",
                "PAL456, squawk 4721 squawk 4721, PAL456",
            ]
        );
    }

    #[test]
    fn test_sentence_fallback_and_noise_filter() {
        let (strategy, segments) =
            parser().extract_segments("Climb and maintain 5000 feet. Climbing 5000 feet. ok.");
        assert_eq!(strategy, ExtractionStrategy::SentenceBoundaries);
        assert_eq!(segments.len(), 2);

        let (strategy, segments) = parser().extract_segments("ATC:");
        assert_eq!(strategy, ExtractionStrategy::WholeText);
        assert!(segments.is_empty());
    }

    #[test]
    fn test_normalization() {
        let p = parser();
        assert_eq!(
            p.normalize("TOWER: “Squawk two four six one”"),
            "Squawk 2461"
        );
        assert_eq!(p.normalize("climb FL350"), "climb flight level 350");
    }

    #[test]
    fn test_heuristic_priority() {
        let p = parser();
        let classify = |text: &str| p.classify_lexically(text, &p.normalize(text));
        assert_eq!(
            classify("Pilot: climb and maintain 5000"),
            Some((Speaker::Pilot, SpeakerHeuristic::ExplicitLabel))
        );
        assert_eq!(
            classify("Say again your altitude"),
            Some((Speaker::Atc, SpeakerHeuristic::AtcMarker))
        );
        assert_eq!(
            classify("Wilco, turning left"),
            Some((Speaker::Pilot, SpeakerHeuristic::PilotMarker))
        );
        assert_eq!(
            classify("Squawk 4721"),
            Some((Speaker::Atc, SpeakerHeuristic::AtcCommand))
        );
        assert_eq!(classify("Good morning Manila"), None);
    }

    #[test]
    fn test_alternation_and_position_fallback() {
        assert_eq!(alternate_by_position(0), Speaker::Atc);
        assert_eq!(alternate_by_position(3), Speaker::Pilot);

        // Second line is anchored lexically, third alternates from it.
        let lines = parser().parse("Good morning Manila\nWilco, PAL456\nGood day sir");
        assert_eq!(lines[1].speaker, Speaker::Pilot);
        assert_eq!(lines[2].speaker, Speaker::Atc);
        assert_eq!(lines[2].heuristic, Some(SpeakerHeuristic::Alternation));
        assert_eq!(lines[0].speaker, Speaker::Unknown);

        // Nothing anchors: second pass falls back to position.
        let lines = parser().parse("Good morning Manila\nGood morning sir\nHave a nice day");
        let speakers: Vec<_> = lines.iter().map(|l| l.speaker).collect();
        assert_eq!(speakers, vec![Speaker::Atc, Speaker::Pilot, Speaker::Atc]);
        assert!(lines
            .iter()
            .all(|l| l.heuristic == Some(SpeakerHeuristic::AlternatePosition)));
    }
}
