//! Scenario Supply
//!
//! This module owns the fixed pool of improv scenarios a game draws from and
//! the policy for dealing them out without repetition. It also provides the
//! sources a server can build a pool from: a static list (built-in or loaded
//! from a file) or a list generated by the language model.

use crate::{error::ImprovError, llm_client::LLMClient};
use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, collections::HashSet, path::Path, str::FromStr, sync::Arc};
use tracing::info;

/// The scenarios that ship with the show.
pub const DEFAULT_SCENARIOS: [&str; 6] = [
    "You are a time-travelling tour guide explaining modern smartphones to someone from the 1800s.",
    "You are a restaurant waiter who must calmly tell a customer that their order has escaped the kitchen.",
    "You are a customer trying to return an obviously cursed object to a very skeptical shop owner.",
    "You are a cat trying to convince a dog to let you share the bed.",
    "You are a superhero whose only power is making toast slightly faster, interviewing for the Avengers.",
    "You are an alien trying to explain to your leader why you failed to conquer Earth (it was the pizza).",
];

/// A validated pool of distinct scenarios, large enough for a full game.
///
/// Deserialized pools go through the same validation as [`ScenarioPool::new`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawScenarioPool")]
pub struct ScenarioPool {
    scenarios: Vec<String>,
    max_rounds: usize,
}

#[derive(Deserialize)]
struct RawScenarioPool {
    scenarios: Vec<String>,
    max_rounds: usize,
}

impl TryFrom<RawScenarioPool> for ScenarioPool {
    type Error = ImprovError;

    fn try_from(raw: RawScenarioPool) -> Result<Self, Self::Error> {
        Self::new(raw.scenarios, raw.max_rounds)
    }
}

impl ScenarioPool {
    /// Builds a pool for games of `max_rounds` rounds.
    ///
    /// Entries are trimmed; blank entries and repeated texts are dropped so
    /// that dealing by index can never hand out the same text twice. Fails
    /// with [`ImprovError::Configuration`] when what remains cannot cover
    /// every round, or when `max_rounds` is zero.
    pub fn new<I, S>(scenarios: I, max_rounds: usize) -> Result<Self, ImprovError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let scenarios: Vec<String> = scenarios
            .into_iter()
            .map(|s| s.into().trim().to_string())
            .filter(|s| !s.is_empty() && seen.insert(s.clone()))
            .collect();

        if max_rounds == 0 || scenarios.len() < max_rounds {
            return Err(ImprovError::Configuration {
                pool_size: scenarios.len(),
                max_rounds,
            });
        }

        Ok(Self {
            scenarios,
            max_rounds,
        })
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }

    pub fn max_rounds(&self) -> usize {
        self.max_rounds
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.scenarios.get(index).map(String::as_str)
    }

    pub fn scenarios(&self) -> &[String] {
        &self.scenarios
    }
}

/// How scenarios are ordered within one game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioOrder {
    /// A fresh random order for every game.
    #[default]
    Shuffled,
    /// A reproducible random order.
    Seeded(u64),
    /// The pool's own order.
    Sequential,
}

impl ScenarioOrder {
    /// Deals the queue of pool indices a game will use: `rounds` distinct
    /// indices drawn from `0..pool_len`.
    pub fn deal(&self, pool_len: usize, rounds: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..pool_len).collect();
        match self {
            ScenarioOrder::Shuffled => indices.shuffle(&mut rand::rng()),
            ScenarioOrder::Seeded(seed) => indices.shuffle(&mut StdRng::seed_from_u64(*seed)),
            ScenarioOrder::Sequential => {}
        }
        indices.truncate(rounds);
        indices
    }
}

impl FromStr for ScenarioOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        match s.as_str() {
            "shuffled" | "random" => Ok(ScenarioOrder::Shuffled),
            "sequential" => Ok(ScenarioOrder::Sequential),
            _ => s
                .strip_prefix("seeded:")
                .and_then(|seed| seed.trim().parse::<u64>().ok())
                .map(ScenarioOrder::Seeded)
                .ok_or_else(|| format!("'{}' is not a valid scenario order", s)),
        }
    }
}

/// Defines the contract for anything that can supply the scenario texts
/// a server builds its pools from.
///
/// The output is unvalidated; callers pass it through [`ScenarioPool::new`].
#[async_trait]
pub trait ScenarioSource: Send + Sync {
    /// Produces at least `count` candidate scenarios when it can.
    async fn load_scenarios(&self, count: usize) -> Result<Vec<String>>;
}

/// Serves a fixed list of scenarios.
pub struct StaticScenarioSource {
    scenarios: Vec<String>,
}

impl StaticScenarioSource {
    pub fn new(scenarios: Vec<String>) -> Self {
        Self { scenarios }
    }

    /// The scenarios that ship with the show.
    pub fn builtin() -> Self {
        Self::new(DEFAULT_SCENARIOS.iter().map(|s| s.to_string()).collect())
    }

    /// Reads one scenario per line. Blank lines and lines starting with
    /// `#` are ignored.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenarios from {}", path.display()))?;
        let scenarios = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .collect();
        Ok(Self::new(scenarios))
    }
}

#[async_trait]
impl ScenarioSource for StaticScenarioSource {
    async fn load_scenarios(&self, _count: usize) -> Result<Vec<String>> {
        Ok(self.scenarios.clone())
    }
}

/// Asks the language model to invent a fresh batch of scenarios.
///
/// The prompt map must contain a `"generate_scenarios"` template; `{count}`
/// in it is replaced with the number of scenarios requested.
pub struct LLMScenarioSource {
    llm_client: Arc<dyn LLMClient>,
    prompts: HashMap<String, String>,
}

impl LLMScenarioSource {
    pub fn new(llm_client: Arc<dyn LLMClient>, prompts: HashMap<String, String>) -> Self {
        Self {
            llm_client,
            prompts,
        }
    }
}

#[async_trait]
impl ScenarioSource for LLMScenarioSource {
    async fn load_scenarios(&self, count: usize) -> Result<Vec<String>> {
        let prompt_template = self
            .prompts
            .get("generate_scenarios")
            .context("Missing prompt template: 'generate_scenarios'")?;
        let prompt = prompt_template.replace("{count}", &count.to_string());

        let answer = self
            .llm_client
            .complete(
                "You write short, punchy improv scenarios for a game show.".to_string(),
                prompt,
            )
            .await?;

        let scenarios = parse_numbered_list(&answer);
        info!(requested = count, received = scenarios.len(), "Generated scenarios");
        Ok(scenarios)
    }
}

/// Extracts the items of a numbered list ("1. foo", "2) bar").
/// Lines that are not list items are skipped.
pub fn parse_numbered_list(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| {
            let line = line.trim();
            let digits = line.chars().take_while(char::is_ascii_digit).count();
            if digits == 0 {
                return None;
            }
            let rest = line[digits..].strip_prefix(['.', ')'])?;
            let item = rest.trim();
            (!item.is_empty()).then(|| item.to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::MockLLMClient;
    use std::io::Write;

    #[test]
    fn test_pool_rejects_too_few_scenarios() {
        let err = ScenarioPool::new(["S1", "S2"], 3).unwrap_err();
        assert_eq!(
            err,
            ImprovError::Configuration {
                pool_size: 2,
                max_rounds: 3
            }
        );
    }

    #[test]
    fn test_pool_drops_blank_and_duplicate_entries() {
        let err = ScenarioPool::new(["S1", " S1 ", "", "S2", "   "], 3).unwrap_err();
        assert_eq!(
            err,
            ImprovError::Configuration {
                pool_size: 2,
                max_rounds: 3
            }
        );

        let pool = ScenarioPool::new(["S1", "S1", "S2", "S3"], 3).unwrap();
        assert_eq!(pool.scenarios(), &["S1", "S2", "S3"]);
        assert_eq!(pool.max_rounds(), 3);
    }

    #[test]
    fn test_pool_rejects_zero_rounds() {
        assert!(matches!(
            ScenarioPool::new(["S1"], 0),
            Err(ImprovError::Configuration { max_rounds: 0, .. })
        ));
    }

    #[test]
    fn test_builtin_scenarios_cover_a_standard_game() {
        let pool =
            ScenarioPool::new(DEFAULT_SCENARIOS, crate::session::DEFAULT_MAX_ROUNDS).unwrap();
        assert_eq!(pool.len(), 6);
    }

    #[test]
    fn test_deserialized_pool_is_validated() {
        let pool: ScenarioPool =
            serde_json::from_str(r#"{"scenarios": ["S1", "S2", "S3"], "max_rounds": 3}"#).unwrap();
        assert_eq!(pool, ScenarioPool::new(["S1", "S2", "S3"], 3).unwrap());

        let err = serde_json::from_str::<ScenarioPool>(r#"{"scenarios": ["S1"], "max_rounds": 3}"#)
            .unwrap_err();
        assert!(err.to_string().contains("scenario pool of 1 cannot cover 3 rounds"));
    }

    #[test]
    fn test_deal_returns_distinct_indices() {
        for order in [
            ScenarioOrder::Shuffled,
            ScenarioOrder::Seeded(7),
            ScenarioOrder::Sequential,
        ] {
            let dealt = order.deal(6, 3);
            assert_eq!(dealt.len(), 3);
            let unique: HashSet<_> = dealt.iter().collect();
            assert_eq!(unique.len(), 3);
            assert!(dealt.iter().all(|&i| i < 6));
        }
    }

    #[test]
    fn test_sequential_and_seeded_orders_are_reproducible() {
        assert_eq!(ScenarioOrder::Sequential.deal(5, 3), vec![0, 1, 2]);
        assert_eq!(
            ScenarioOrder::Seeded(42).deal(10, 3),
            ScenarioOrder::Seeded(42).deal(10, 3)
        );
    }

    #[test]
    fn test_scenario_order_from_str() {
        assert_eq!(
            "shuffled".parse::<ScenarioOrder>(),
            Ok(ScenarioOrder::Shuffled)
        );
        assert_eq!(
            "Sequential".parse::<ScenarioOrder>(),
            Ok(ScenarioOrder::Sequential)
        );
        assert_eq!(
            "seeded:99".parse::<ScenarioOrder>(),
            Ok(ScenarioOrder::Seeded(99))
        );
        assert!("seeded:abc".parse::<ScenarioOrder>().is_err());
        assert!("backwards".parse::<ScenarioOrder>().is_err());
    }

    #[test]
    fn test_parse_numbered_list() {
        let text = "Here you go:\n1. A pirate at a job fair\n2) A ghost learning to whistle\n\n3.   \n- not numbered\n10. A chef who fears eggs";
        assert_eq!(
            parse_numbered_list(text),
            vec![
                "A pirate at a job fair",
                "A ghost learning to whistle",
                "A chef who fears eggs",
            ]
        );
    }

    #[tokio::test]
    async fn test_static_source_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# house scenarios").unwrap();
        writeln!(file, "A mime stuck in a real box").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "  A lighthouse keeper afraid of the dark  ").unwrap();

        let source = StaticScenarioSource::from_file(file.path()).unwrap();
        let scenarios = source.load_scenarios(3).await.unwrap();
        assert_eq!(
            scenarios,
            vec!["A mime stuck in a real box", "A lighthouse keeper afraid of the dark"]
        );
    }

    #[test]
    fn test_static_source_missing_file() {
        let result = StaticScenarioSource::from_file(Path::new("/no/such/scenarios.txt"));
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_llm_source_parses_model_output() {
        let mut mock = MockLLMClient::new();
        mock.expect_complete()
            .withf(|_, prompt| prompt.contains("Write 4 scenarios"))
            .times(1)
            .returning(|_, _| Ok("1. One\n2. Two\n3. Three\n4. Four".to_string()));

        let prompts = HashMap::from([(
            "generate_scenarios".to_string(),
            "Write {count} scenarios.".to_string(),
        )]);
        let source = LLMScenarioSource::new(Arc::new(mock), prompts);

        let scenarios = source.load_scenarios(4).await.unwrap();
        assert_eq!(scenarios, vec!["One", "Two", "Three", "Four"]);
    }

    #[tokio::test]
    async fn test_llm_source_requires_prompt_template() {
        let source = LLMScenarioSource::new(Arc::new(MockLLMClient::new()), HashMap::new());
        let err = source.load_scenarios(3).await.unwrap_err();
        assert!(err.to_string().contains("generate_scenarios"));
    }
}
