// src/services/scrubber.rs

//! Pseudonymisation of personal names in Dutch legal text.
//!
//! Each rule keeps the leading keyword (title, party, courtesy form) and
//! replaces the name that follows it with `NAAM`.

use regex::Regex;

use crate::error::{AppError, Result};

const NAME: &str = r"[A-ZÀ-ÖØ-öø-ÿ][A-Za-zÀ-ÖØ-öø-ÿ.'`-]+";

/// Compiled scrubbing rules, applied in a fixed order.
#[derive(Debug, Clone)]
pub struct NameScrubber {
    title: Regex,
    party: Regex,
    courtesy: Regex,
    gemachtigde: Regex,
}

impl NameScrubber {
    pub fn new() -> Result<Self> {
        let compile = |pattern: String| {
            Regex::new(&pattern).map_err(|e| AppError::config(format!("invalid scrub rule: {e}")))
        };

        Ok(Self {
            // "mr. Jansen", "prof. dr. A.B. de Vries"
            title: compile(format!(
                r"(?i)\b(mr\.?|prof\.?|dr\.?|ir\.?)\s+((?:[A-Z]\.)+\s*)?{NAME}(?:\s+{NAME}){{0,2}}"
            ))?,
            party: compile(format!(
                r"(?i)\b(klager|verweerder)\s+((?:[A-Z]\.)?\s*{NAME})"
            ))?,
            courtesy: compile(format!(
                r"(?i)\b(de\s+heer|mevrouw|mevr\.?)\s+((?:[A-Z]\.)+\s*)?{NAME}(?:\s+{NAME}){{0,2}}"
            ))?,
            gemachtigde: compile(
                r"(?i)(gemachtigde[^\n]{0,10}(?:mr\.\s*)?)((?:[A-Za-zÀ-ÖØ-öø-ÿ.'`-]+\s*){1,5})"
                    .to_string(),
            )?,
        })
    }

    /// Apply every rule to `text`.
    pub fn scrub(&self, text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }
        let text = self.title.replace_all(text, "$1 NAAM");
        let text = self.party.replace_all(&text, "$1 NAAM");
        let text = self.courtesy.replace_all(&text, "$1 NAAM");
        self.gemachtigde.replace_all(&text, "${1}NAAM").into_owned()
    }
}
