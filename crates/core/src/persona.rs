use crate::session::GameState;

/// The host's persona prompt, kept as an opaque template.
///
/// Only three placeholders are substituted: `{player_name}`,
/// `{current_round}` and `{max_rounds}`. Nothing else in the text is read.
#[derive(Debug, Clone)]
pub struct PersonaPrompt {
    template: String,
}

impl PersonaPrompt {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Fills in the placeholders for the current turn.
    pub fn render(&self, state: &GameState) -> String {
        self.template
            .replace(
                "{player_name}",
                state.player_name.as_deref().unwrap_or("Unknown"),
            )
            .replace("{current_round}", &state.current_round.to_string())
            .replace("{max_rounds}", &state.max_rounds.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::round::Phase;

    fn state(player_name: Option<&str>, current_round: usize) -> GameState {
        GameState {
            phase: Phase::Playing,
            current_round,
            max_rounds: 3,
            player_name: player_name.map(str::to_string),
            scenario: None,
        }
    }

    #[test]
    fn test_render_substitutes_placeholders() {
        let persona = PersonaPrompt::new("Player: {player_name}\nRound: {current_round}/{max_rounds}");
        assert_eq!(
            persona.render(&state(Some("Alex"), 2)),
            "Player: Alex\nRound: 2/3"
        );
    }

    #[test]
    fn test_render_before_intro_uses_unknown() {
        let persona = PersonaPrompt::new("Hello {player_name}, {unrelated} stays.");
        assert_eq!(
            persona.render(&state(None, 0)),
            "Hello Unknown, {unrelated} stays."
        );
    }
}
