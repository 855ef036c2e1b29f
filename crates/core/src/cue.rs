//! Spoken cues the host listens for in the player's recognized speech.

use serde::{Deserialize, Serialize};

/// A cue detected in a player's utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cue {
    /// The player has finished acting out the current scene.
    EndScene,
    /// The player wants to stop the show.
    Quit,
}

const END_SCENE_PHRASES: [&str; 5] = ["end scene", "and scene", "end of scene", "scene over", "cut"];
const QUIT_PHRASES: [&str; 5] = ["stop game", "stop the game", "end the game", "quit", "i quit"];

/// Lowercases, strips punctuation and collapses whitespace so transcripts
/// like "End... SCENE!" compare equal to "end scene".
pub fn normalize(utterance: &str) -> String {
    utterance
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '\'' {
                c.to_ascii_lowercase()
            } else {
                ' '
            }
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Detects a cue that closes the utterance, matching whole words only.
///
/// A cue phrase in the middle of a sentence is scene dialogue, not a cue:
/// "I quit this restaurant, sir!" is a line, "Okay, I quit." is a cue.
/// Quitting wins when both cues end the utterance.
pub fn detect(utterance: &str) -> Option<Cue> {
    let padded = format!(" {}", normalize(utterance));
    let ends_with = |phrase: &&str| padded.ends_with(&format!(" {}", phrase));

    if QUIT_PHRASES.iter().any(ends_with) {
        Some(Cue::Quit)
    } else if END_SCENE_PHRASES.iter().any(ends_with) {
        Some(Cue::EndScene)
    } else {
        None
    }
}

impl Cue {
    /// A line of guidance for the host when the cue has just been heard.
    pub fn host_hint(&self) -> &'static str {
        match self {
            Cue::EndScene => {
                "The player just ended the scene. Deliver your reaction, then call `record_round_reaction` with it."
            }
            Cue::Quit => {
                "The player wants to stop the game. Wrap up politely and call `end_show`."
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  End...   SCENE! "), "end scene");
        assert_eq!(normalize("I'm done"), "i'm done");
    }

    #[test]
    fn test_detect_end_scene() {
        assert_eq!(detect("End scene!"), Some(Cue::EndScene));
        assert_eq!(detect("...and that's it. And scene."), Some(Cue::EndScene));
        assert_eq!(detect("Cut!"), Some(Cue::EndScene));
    }

    #[test]
    fn test_detect_quit() {
        assert_eq!(detect("Okay, I quit."), Some(Cue::Quit));
        assert_eq!(detect("please STOP the game"), Some(Cue::Quit));
        assert_eq!(detect("end scene, actually stop game"), Some(Cue::Quit));
    }

    #[test]
    fn test_detect_ignores_partial_words() {
        assert_eq!(detect("Let me cuter this up"), None);
        assert_eq!(detect("The quiet scene begins"), None);
        assert_eq!(detect("My name is Alex"), None);
    }

    #[test]
    fn test_detect_ignores_cue_words_in_dialogue() {
        assert_eq!(detect("Fine, I quit this restaurant, sir!"), None);
        assert_eq!(detect("Don't cut the cake yet, Captain"), None);
        assert_eq!(detect("We can end the game of chess later"), None);
        assert_eq!(detect("The end scene of the movie was better"), None);
    }

    #[test]
    fn test_detect_whole_utterance() {
        assert_eq!(detect("Quit"), Some(Cue::Quit));
        assert_eq!(detect("  cut  "), Some(Cue::EndScene));
        assert_eq!(detect(""), None);
    }
}
