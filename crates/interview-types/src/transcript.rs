#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Ai,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TranscriptEntry {
    role: Role,
    text: String,
}

impl TranscriptEntry {
    pub fn new(role: Role, text: &str) -> Self {
        Self {
            role,
            text: text.to_string(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Append-only record of the conversation, in the order entries resolved.
///
/// Entries are never reordered or dropped. Display code reads a trailing
/// window through [`Transcript::recent`].
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, role: Role, text: &str) {
        self.entries.push(TranscriptEntry::new(role, text));
    }

    pub fn push_ai(&mut self, text: &str) {
        self.push(Role::Ai, text);
    }

    pub fn push_user(&mut self, text: &str) {
        self.push(Role::User, text);
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    /// The last `window` entries, oldest first.
    pub fn recent(&self, window: usize) -> &[TranscriptEntry] {
        let start = self.entries.len().saturating_sub(window);
        &self.entries[start..]
    }

    pub fn count(&self, role: Role) -> usize {
        self.entries.iter().filter(|e| e.role == role).count()
    }

    pub fn last(&self) -> Option<&TranscriptEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
