use rand::seq::SliceRandom;
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::Path;

use crate::config::{DISEASES_FILE, FITNESS_FILE, INTENTS_FILE, MENTAL_HEALTH_FILE, NUTRITION_FILE};
use crate::matching::sequence_ratio;

/// Score given to a pattern that appears verbatim in the input
const PATTERN_SUBSTRING_SCORE: f64 = 0.8;
/// Score given to a Q&A entry whose category appears in the input
const CATEGORY_SUBSTRING_SCORE: f64 = 0.7;
const MENTAL_HEALTH_THRESHOLD: f64 = 0.5;
const QA_THRESHOLD: f64 = 0.5;
const MAX_LISTED_ITEMS: usize = 5;

const CRISIS_PHRASES: &[&str] = &["suicide", "kill myself", "end my life", "want to die"];

const CRISIS_RESOURCES: &str = "\n\n⚠️ **Mental Health Resources:**\n\
    • National Suicide Prevention Lifeline: 988 (US)\n\
    • Crisis Text Line: Text HOME to 741741\n\
    • If this is an emergency, please call emergency services immediately.";

const MEDICAL_DISCLAIMER: &str = "\n⚠️ **Important:** This information is for educational purposes only. \
    Please consult a healthcare professional for proper diagnosis and treatment.";

const EMPTY_INPUT_REPLY: &str = "I didn't catch that. Could you please say something? 😊";

const FALLBACK_RESPONSES: &[&str] = &[
    "I'm not sure I understood that. Could you rephrase your question? 🤔",
    "Hmm, I didn't quite catch that. Try asking about:\n• Disease information (e.g., 'tell me about diabetes')\n• Nutrition (e.g., 'calories in apple')\n• Fitness advice\n• Mental health support\n• Health tools (BMI, water intake, calories)",
    "I'm still learning! Could you try asking in a different way? I'm great at answering questions about health, fitness, nutrition, and wellness! 💪",
    "Oops! 😅 I didn't quite understand. I can help with:\n✅ Disease info\n✅ Nutrition facts\n✅ Fitness tips\n✅ Mental health support\n✅ Health calculators\n\nWhat would you like to know?",
];

#[derive(Debug, Default, Deserialize)]
pub struct IntentCorpus {
    #[serde(default)]
    pub intents: Vec<Intent>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct Intent {
    pub tag: String,
    pub patterns: Vec<String>,
    pub responses: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DiseaseCorpus {
    #[serde(default)]
    pub diseases: Vec<Disease>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct Disease {
    pub name: String,
    pub description: Option<String>,
    pub symptoms: Vec<String>,
    pub treatments: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FitnessCorpus {
    #[serde(default)]
    pub fitness_qa: Vec<FitnessQa>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct FitnessQa {
    pub question: String,
    pub answer: String,
    pub category: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct NutritionCorpus {
    #[serde(default)]
    pub nutrition_tips: Vec<NutritionTip>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct NutritionTip {
    pub topic: String,
    pub guidance: String,
    pub category: String,
}

/// Canned-response engine over the static knowledge bases.
///
/// Knowledge bases are consulted in a fixed order and the first one that
/// produces a reply wins: diseases (name substring), general intents,
/// mental health, fitness Q&A, nutrition tips, then a generic fallback.
#[derive(Debug, Default)]
pub struct ChatbotEngine {
    intents: IntentCorpus,
    diseases: DiseaseCorpus,
    mental_health: IntentCorpus,
    fitness: FitnessCorpus,
    nutrition: NutritionCorpus,
    intent_threshold: f64,
}

impl ChatbotEngine {
    /// Load every corpus from `data_dir`. Missing or malformed files leave
    /// that knowledge base empty.
    pub fn load(data_dir: &Path, intent_threshold: f64) -> Self {
        let engine = Self {
            intents: load_json(&data_dir.join(INTENTS_FILE)),
            diseases: load_json(&data_dir.join(DISEASES_FILE)),
            mental_health: load_json(&data_dir.join(MENTAL_HEALTH_FILE)),
            fitness: load_json(&data_dir.join(FITNESS_FILE)),
            nutrition: load_json(&data_dir.join(NUTRITION_FILE)),
            intent_threshold,
        };

        log::info!(
            "📚 Knowledge loaded: {} intents, {} diseases, {} mental health topics, {} fitness Q&A, {} nutrition tips",
            engine.intents.intents.len(),
            engine.diseases.diseases.len(),
            engine.mental_health.intents.len(),
            engine.fitness.fitness_qa.len(),
            engine.nutrition.nutrition_tips.len()
        );

        engine
    }

    pub fn get_response(&self, user_input: &str) -> String {
        self.respond(user_input, &mut rand::thread_rng())
    }

    fn respond<R: Rng + ?Sized>(&self, user_input: &str, rng: &mut R) -> String {
        let input = user_input.trim().to_lowercase();
        if input.is_empty() {
            return EMPTY_INPUT_REPLY.to_string();
        }

        if let Some(reply) = self.disease_info(&input) {
            return reply;
        }
        if let Some(reply) = self.general_intent(&input, rng) {
            return reply;
        }
        if let Some(reply) = self.mental_health_support(&input, rng) {
            return reply;
        }
        if let Some(reply) = self.fitness_answer(&input) {
            return reply;
        }
        if let Some(reply) = self.nutrition_tip(&input) {
            return reply;
        }

        log::debug!("🤷 No knowledge base matched: '{}'", input);
        FALLBACK_RESPONSES
            .choose(rng)
            .map(|s| s.to_string())
            .unwrap_or_default()
    }

    fn disease_info(&self, input: &str) -> Option<String> {
        let disease = self.diseases.diseases.iter().find(|d| {
            let name = d.name.trim().to_lowercase();
            !name.is_empty() && input.contains(&name)
        })?;

        let description = disease
            .description
            .as_deref()
            .unwrap_or("No description available.");
        let mut reply = format!(
            "🩺 **{}**\n\n**Description:** {}\n\n",
            disease.name, description
        );

        if !disease.symptoms.is_empty() {
            reply.push_str("**Common Symptoms:**\n");
            for symptom in disease.symptoms.iter().take(MAX_LISTED_ITEMS) {
                reply.push_str(&format!("• {}\n", symptom));
            }
            reply.push('\n');
        }

        if !disease.treatments.is_empty() {
            reply.push_str("**Treatments:**\n");
            for treatment in disease.treatments.iter().take(MAX_LISTED_ITEMS) {
                reply.push_str(&format!("• {}\n", treatment));
            }
        }

        reply.push_str(MEDICAL_DISCLAIMER);
        Some(reply)
    }

    fn general_intent<R: Rng + ?Sized>(&self, input: &str, rng: &mut R) -> Option<String> {
        let intent = best_intent(&self.intents.intents, input, self.intent_threshold)?;
        log::debug!("🎯 Matched intent '{}'", intent.tag);
        intent.responses.choose(rng).cloned()
    }

    fn mental_health_support<R: Rng + ?Sized>(&self, input: &str, rng: &mut R) -> Option<String> {
        let intent = best_intent(&self.mental_health.intents, input, MENTAL_HEALTH_THRESHOLD)?;
        log::debug!("💚 Matched mental health topic '{}'", intent.tag);

        let mut reply = intent.responses.choose(rng)?.clone();
        if CRISIS_PHRASES.iter().any(|phrase| input.contains(phrase)) {
            log::warn!("🚨 Crisis language detected, appending resources");
            reply.push_str(CRISIS_RESOURCES);
        }
        Some(reply)
    }

    fn fitness_answer(&self, input: &str) -> Option<String> {
        let scored = self
            .fitness
            .fitness_qa
            .iter()
            .map(|qa| (qa, qa_score(&qa.question, &qa.category, input)));
        let (qa, _) = best_above(scored, QA_THRESHOLD)?;
        Some(format!("💪 {}", qa.answer))
    }

    fn nutrition_tip(&self, input: &str) -> Option<String> {
        let scored = self
            .nutrition
            .nutrition_tips
            .iter()
            .map(|tip| (tip, qa_score(&tip.topic, &tip.category, input)));
        let (tip, _) = best_above(scored, QA_THRESHOLD)?;
        Some(format!("🥗 {}", tip.guidance))
    }
}

/// Best-scoring intent across all of its patterns, if it clears `threshold`
/// and has something to say
fn best_intent<'a>(intents: &'a [Intent], input: &str, threshold: f64) -> Option<&'a Intent> {
    let scored = intents.iter().flat_map(|intent| {
        intent
            .patterns
            .iter()
            .map(move |pattern| (intent, pattern_score(pattern, input)))
    });
    let (intent, _) = best_above(scored, threshold)?;
    (!intent.responses.is_empty()).then_some(intent)
}

fn pattern_score(pattern: &str, input: &str) -> f64 {
    let pattern = pattern.to_lowercase();
    let score = sequence_ratio(&pattern, input);
    if !pattern.is_empty() && input.contains(&pattern) {
        score.max(PATTERN_SUBSTRING_SCORE)
    } else {
        score
    }
}

fn qa_score(text: &str, category: &str, input: &str) -> f64 {
    let score = sequence_ratio(&text.to_lowercase(), input);
    let category = category.to_lowercase().replace('_', " ");
    let category = category.trim();
    if !category.is_empty() && input.contains(category) {
        score.max(CATEGORY_SUBSTRING_SCORE)
    } else {
        score
    }
}

/// Highest score wins; on ties the earliest candidate is kept
fn best_above<T>(candidates: impl Iterator<Item = (T, f64)>, threshold: f64) -> Option<(T, f64)> {
    let mut best: Option<(T, f64)> = None;
    for (item, score) in candidates {
        let better = match &best {
            Some((_, best_score)) => score > *best_score,
            None => score > 0.0,
        };
        if better {
            best = Some((item, score));
        }
    }
    best.filter(|(_, score)| *score >= threshold)
}

fn load_json<T: DeserializeOwned + Default>(path: &Path) -> T {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            log::warn!("⚠️ Knowledge file {} not loaded: {}", path.display(), e);
            return T::default();
        }
    };

    serde_json::from_str(&raw).unwrap_or_else(|e| {
        log::warn!("⚠️ Invalid JSON in {}: {}", path.display(), e);
        T::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn test_engine() -> ChatbotEngine {
        ChatbotEngine {
            intents: IntentCorpus {
                intents: vec![
                    Intent {
                        tag: "greeting".to_string(),
                        patterns: strings(&["hello", "hi there", "good morning"]),
                        responses: strings(&["Hello! How can I help with your health today?"]),
                    },
                    Intent {
                        tag: "goodbye".to_string(),
                        patterns: strings(&["bye", "see you later"]),
                        responses: strings(&["Goodbye! Stay healthy!"]),
                    },
                    Intent {
                        tag: "silent".to_string(),
                        patterns: strings(&["say nothing"]),
                        responses: vec![],
                    },
                ],
            },
            diseases: DiseaseCorpus {
                diseases: vec![
                    Disease {
                        name: "".to_string(),
                        ..Default::default()
                    },
                    Disease {
                        name: "Diabetes".to_string(),
                        description: Some("A condition of high blood sugar.".to_string()),
                        symptoms: strings(&["thirst", "fatigue", "blurred vision", "a", "b", "c"]),
                        treatments: strings(&["insulin"]),
                    },
                ],
            },
            mental_health: IntentCorpus {
                intents: vec![Intent {
                    tag: "sad".to_string(),
                    patterns: strings(&["i feel sad", "i feel depressed", "i want to die"]),
                    responses: strings(&["I'm sorry you're feeling this way."]),
                }],
            },
            fitness: FitnessCorpus {
                fitness_qa: vec![
                    FitnessQa {
                        question: "How do I start working out?".to_string(),
                        answer: "Start with three short sessions a week.".to_string(),
                        category: "beginner".to_string(),
                    },
                    FitnessQa {
                        question: "How long should I rest between sets?".to_string(),
                        answer: "Rest 60-90 seconds for most sets.".to_string(),
                        category: "strength_training".to_string(),
                    },
                    FitnessQa {
                        question: "uncategorized question".to_string(),
                        answer: "never".to_string(),
                        category: "".to_string(),
                    },
                ],
            },
            nutrition: NutritionCorpus {
                nutrition_tips: vec![NutritionTip {
                    topic: "Healthy breakfast ideas".to_string(),
                    guidance: "Combine protein, fiber and healthy fats.".to_string(),
                    category: "meal_planning".to_string(),
                }],
            },
            intent_threshold: 0.6,
        }
    }

    fn reply(engine: &ChatbotEngine, input: &str) -> String {
        engine.respond(input, &mut StdRng::seed_from_u64(7))
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(reply(&test_engine(), "   "), EMPTY_INPUT_REPLY);
    }

    #[test]
    fn test_disease_lookup_wins_first() {
        let answer = reply(&test_engine(), "Hello, tell me about DIABETES");
        assert!(answer.starts_with("🩺 **Diabetes**"));
        assert!(answer.contains("**Description:** A condition of high blood sugar."));
        assert!(answer.contains("• blurred vision"));
        // Only the first five symptoms are listed
        assert!(!answer.contains("• c\n"));
        assert!(answer.contains("**Treatments:**\n• insulin"));
        assert!(answer.ends_with("proper diagnosis and treatment."));
    }

    #[test]
    fn test_intent_fuzzy_and_substring_match() {
        let engine = test_engine();
        assert_eq!(reply(&engine, "helo"), "Hello! How can I help with your health today?");
        assert_eq!(
            reply(&engine, "ok I have to go now, see you later then"),
            "Goodbye! Stay healthy!"
        );
    }

    #[test]
    fn test_intent_without_responses_falls_through() {
        let answer = reply(&test_engine(), "say nothing");
        assert!(FALLBACK_RESPONSES.contains(&answer.as_str()));
    }

    #[test]
    fn test_mental_health_reply_and_crisis_resources() {
        let engine = test_engine();

        let sad = reply(&engine, "i feel so sad");
        assert_eq!(sad, "I'm sorry you're feeling this way.");

        let crisis = reply(&engine, "sometimes i want to die");
        assert!(crisis.starts_with("I'm sorry you're feeling this way."));
        assert!(crisis.contains("988"));
    }

    #[test]
    fn test_fitness_by_question_and_category() {
        let engine = test_engine();
        assert_eq!(
            reply(&engine, "how do i start working out"),
            "💪 Start with three short sessions a week."
        );
        assert_eq!(
            reply(&engine, "any advice on strength training"),
            "💪 Rest 60-90 seconds for most sets."
        );
    }

    #[test]
    fn test_nutrition_tip() {
        assert_eq!(
            reply(&test_engine(), "healthy breakfast idea"),
            "🥗 Combine protein, fiber and healthy fats."
        );
    }

    #[test]
    fn test_unmatched_input_gets_fallback() {
        let answer = reply(&test_engine(), "qwertyuiop zxcv");
        assert!(FALLBACK_RESPONSES.contains(&answer.as_str()));
    }

    #[test]
    fn test_best_above_keeps_first_on_tie() {
        let candidates = vec![("a", 0.7), ("b", 0.7), ("c", 0.2)];
        assert_eq!(best_above(candidates.into_iter(), 0.5), Some(("a", 0.7)));

        let weak = vec![("a", 0.4)];
        assert_eq!(best_above(weak.into_iter(), 0.5), None);
    }

    #[test]
    fn test_load_tolerates_missing_and_invalid_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(INTENTS_FILE),
            r#"{"intents": [{"tag": "thanks", "patterns": ["thank you"], "responses": ["You're welcome!"]}]}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join(DISEASES_FILE), "{ not json").unwrap();

        let engine = ChatbotEngine::load(dir.path(), 0.6);
        assert_eq!(engine.intents.intents.len(), 1);
        assert!(engine.diseases.diseases.is_empty());
        assert!(engine.fitness.fitness_qa.is_empty());
        assert_eq!(engine.get_response("thank you"), "You're welcome!");
    }

    #[test]
    fn test_bundled_knowledge_files_parse() {
        let data_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("data");
        let engine = ChatbotEngine::load(&data_dir, 0.6);
        assert!(!engine.intents.intents.is_empty());
        assert!(!engine.diseases.diseases.is_empty());
        assert!(!engine.mental_health.intents.is_empty());
        assert!(!engine.fitness.fitness_qa.is_empty());
        assert!(!engine.nutrition.nutrition_tips.is_empty());
    }
}
