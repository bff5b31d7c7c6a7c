//! Farewell detection over transcribed speech.

/// Phrases that end a call when they appear in caller speech.
pub const DEFAULT_GOODBYE_PHRASES: &[&str] =
    &["bye", "goodbye", "have a nice day", "see you", "take care"];

/// Case-insensitive substring matcher over a fixed phrase list.
#[derive(Debug, Clone)]
pub struct GoodbyeDetector {
    phrases: Vec<String>,
}

impl GoodbyeDetector {
    pub fn new<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let phrases = phrases
            .into_iter()
            .map(|p| p.as_ref().trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        Self { phrases }
    }

    /// Returns true if `text` contains any goodbye phrase.
    ///
    /// Matching is a plain substring test, so "standby" matches "bye".
    pub fn is_goodbye(&self, text: &str) -> bool {
        let lowered = text.to_lowercase();
        self.phrases.iter().any(|p| lowered.contains(p.as_str()))
    }

    pub fn phrases(&self) -> &[String] {
        &self.phrases
    }
}

impl Default for GoodbyeDetector {
    fn default() -> Self {
        Self::new(DEFAULT_GOODBYE_PHRASES)
    }
}
