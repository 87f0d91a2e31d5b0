//! Classification of the booking site's raw search answer.

/// Phrase the booking site embeds in its answer when nothing is bookable.
/// Case-sensitive; its absence means at least one slot is open.
pub const NO_APPOINTMENTS_PHRASE: &str = "no locations with available appointments";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub has_availability: bool,
    /// The raw answer with its outer quote characters stripped; the
    /// upstream API wraps the payload in literal quotes.
    pub display_fragment: String,
}

/// Decide availability from the raw answer text. Pure.
pub fn classify(raw: &str) -> Classification {
    let has_availability = !raw.contains(NO_APPOINTMENTS_PHRASE);

    let display_fragment = if raw.is_empty() {
        String::new()
    } else {
        let mut chars = raw.chars();
        chars.next();
        chars.next_back();
        chars.as_str().to_owned()
    };

    Classification {
        has_availability,
        display_fragment,
    }
}
