// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rule-based classification fallback.
//!
//! Used when no classifier capability is injected. Routes on grammatical
//! person and temporal markers: first-person statements land in persona or
//! skill, temporally anchored text is episodic, procedural wording is
//! process, everything else is knowledge.

use regex::Regex;

use strata_core::types::{Classification, MemoryLayer};

const TEMPORAL_PATTERN: &str = r"(?i)\b(today|yesterday|tomorrow|tonight|last (night|week|month|year)|this (morning|afternoon|evening|week)|monday|tuesday|wednesday|thursday|friday|saturday|sunday|\d{4}-\d{2}-\d{2})\b";

const SKILL_PATTERN: &str = r"(?i)\b(i can|i know how to|i'm able to|i am able to|i'm good at|i am good at)\b";

const PERSONA_PATTERN: &str =
    r"(?i)\b(i am|i'm|my name is|i like|i love|i prefer|i hate|i have|i work|i live)\b";

const PROCESS_PATTERN: &str =
    r"(?i)\b(step \d|first.{1,60}\bthen\b|procedure|workflow|how to|checklist)\b";

/// Confidence assigned by the rule router; well below what a real
/// classifier reports.
const RULE_CONFIDENCE: f64 = 0.6;

/// Classify `text` by surface rules.
pub fn classify(text: &str) -> Classification {
    let temporal = Regex::new(TEMPORAL_PATTERN).expect("static pattern compiles");
    let skill = Regex::new(SKILL_PATTERN).expect("static pattern compiles");
    let persona = Regex::new(PERSONA_PATTERN).expect("static pattern compiles");
    let process = Regex::new(PROCESS_PATTERN).expect("static pattern compiles");

    let layer = if temporal.is_match(text) {
        MemoryLayer::Episodic
    } else if skill.is_match(text) {
        MemoryLayer::Skill
    } else if persona.is_match(text) {
        MemoryLayer::Persona
    } else if process.is_match(text) {
        MemoryLayer::Process
    } else {
        MemoryLayer::Knowledge
    };

    Classification {
        layer,
        category: layer.to_string(),
        confidence: RULE_CONFIDENCE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer(text: &str) -> MemoryLayer {
        classify(text).layer
    }

    #[test]
    fn first_person_statements_route_to_persona() {
        assert_eq!(layer("I am a backend engineer"), MemoryLayer::Persona);
        assert_eq!(layer("I'm fond of espresso"), MemoryLayer::Persona);
        assert_eq!(layer("My name is Priya"), MemoryLayer::Persona);
        assert_eq!(layer("I like hiking in the alps"), MemoryLayer::Persona);
    }

    #[test]
    fn ability_statements_route_to_skill() {
        assert_eq!(layer("I can tune PostgreSQL queries"), MemoryLayer::Skill);
        assert_eq!(layer("I know how to deploy with Kubernetes"), MemoryLayer::Skill);
    }

    #[test]
    fn temporal_markers_route_to_episodic() {
        assert_eq!(layer("I went to the gym yesterday"), MemoryLayer::Episodic);
        assert_eq!(layer("Today the deploy finally shipped"), MemoryLayer::Episodic);
        assert_eq!(layer("Met the team on 2026-07-14"), MemoryLayer::Episodic);
        assert_eq!(layer("The standup is on monday"), MemoryLayer::Episodic);
    }

    #[test]
    fn temporal_beats_persona() {
        // "I am" plus a date: the event reading wins.
        assert_eq!(
            layer("I am meeting the auditors tomorrow"),
            MemoryLayer::Episodic
        );
    }

    #[test]
    fn procedural_wording_routes_to_process() {
        assert_eq!(
            layer("Step 1: drain the pool before restarting"),
            MemoryLayer::Process
        );
        assert_eq!(
            layer("How to rotate the signing keys safely"),
            MemoryLayer::Process
        );
    }

    #[test]
    fn plain_facts_default_to_knowledge() {
        let c = classify("PostgreSQL uses MVCC for concurrency control");
        assert_eq!(c.layer, MemoryLayer::Knowledge);
        assert!(c.confidence < 0.9, "rule confidence stays modest");
    }
}
