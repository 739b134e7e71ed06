/// Classification returned by the remote proctor for one frame.
///
/// The wire form is the upper snake case string sent in the `alert` field of
/// every proctoring channel message, e.g. `"NO_FACE"`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Alert {
    #[default]
    Ok,
    NoFace,
    MultiplePeople,
    LookingLeft,
    LookingRight,
    Invalid,
    Error,
}

impl Alert {
    /// Whether this classification counts as a proctoring violation.
    ///
    /// `Invalid` and `Error` describe a bad frame or a failing classifier, not
    /// the candidate, so they never count.
    pub fn is_violation(&self) -> bool {
        match self {
            Alert::NoFace | Alert::MultiplePeople | Alert::LookingLeft | Alert::LookingRight => {
                true
            }
            Alert::Ok | Alert::Invalid | Alert::Error => false,
        }
    }

    /// Status text shown next to the live feed.
    pub fn label(&self) -> &'static str {
        match self {
            Alert::Ok => "Proctoring: Clear",
            Alert::NoFace => "No face detected!",
            Alert::MultiplePeople => "Multiple faces!",
            Alert::LookingLeft | Alert::LookingRight => "Looking away!",
            Alert::Invalid => "Invalid frame",
            Alert::Error => "Proctoring error",
        }
    }
}

impl std::fmt::Display for Alert {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
