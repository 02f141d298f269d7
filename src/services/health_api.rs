use anyhow::Result;
use rand::seq::SliceRandom;
use serde::Deserialize;
use std::time::Duration;

use crate::config::Config;

const NUTRITION_TIMEOUT: Duration = Duration::from_secs(10);
const EXERCISE_TIMEOUT: Duration = Duration::from_secs(10);
const QUOTES_TIMEOUT: Duration = Duration::from_secs(5);

const EXERCISE_API_HOST: &str = "exercisedb.p.rapidapi.com";

/// USDA nutrient name fragment → display name. First fragment contained in
/// the (lower-cased) nutrient name wins.
const NUTRIENT_MAPPING: &[(&str, &str)] = &[
    ("energy", "Calories"),
    ("carbohydrate, by difference", "Carbohydrates"),
    ("protein", "Protein"),
    ("total lipid (fat)", "Fat"),
    ("fiber, total dietary", "Fiber"),
    ("sugars, total including nlea", "Sugars"),
    ("vitamin c, total ascorbic acid", "Vitamin C"),
    ("vitamin a, iu", "Vitamin A"),
    ("calcium, ca", "Calcium"),
    ("iron, fe", "Iron"),
    ("sodium, na", "Sodium"),
    ("alcohol, ethyl", "Alcohol"),
];

const NUTRIENT_ORDER: &[&str] = &[
    "Calories",
    "Carbohydrates",
    "Protein",
    "Fat",
    "Fiber",
    "Sugars",
    "Sodium",
    "Vitamin C",
    "Vitamin A",
    "Calcium",
    "Iron",
    "Alcohol",
];

/// Approximate values used when the USDA API cannot answer
const FALLBACK_FOODS: &[(&str, &str)] = &[
    ("apple", "📋 **Apple** (per 100g)\n\n• Calories: 52kcal\n• Carbs: 14g\n• Fiber: 2.4g\n• Sugar: 10g\n• Protein: 0.3g\n• Fat: 0.2g"),
    ("banana", "📋 **Banana** (per 100g)\n\n• Calories: 89kcal\n• Carbs: 23g\n• Fiber: 2.6g\n• Sugar: 12g\n• Protein: 1.1g\n• Fat: 0.3g"),
    ("chicken", "📋 **Chicken Breast** (per 100g)\n\n• Calories: 165kcal\n• Protein: 31g\n• Fat: 3.6g\n• Carbs: 0g"),
    ("rice", "📋 **White Rice** (per 100g, cooked)\n\n• Calories: 130kcal\n• Carbs: 28g\n• Protein: 2.7g\n• Fat: 0.3g"),
    ("egg", "📋 **Egg** (per 100g)\n\n• Calories: 155kcal\n• Protein: 13g\n• Fat: 11g\n• Carbs: 1.1g"),
];

pub const FALLBACK_QUOTES: &[&str] = &[
    "💪 'The only bad workout is the one that didn't happen.'",
    "🌟 'Take care of your body. It's the only place you have to live.' - Jim Rohn",
    "🔥 'Your health is an investment, not an expense.'",
    "⚡ 'Progress over perfection. Every small step counts!'",
    "🧠 'Physical fitness is the first requisite of happiness.' - Joseph Pilates",
    "💚 'Health is wealth.'",
    "🎯 'The groundwork for all happiness is good health.' - Leigh Hunt",
    "🌱 'A healthy outside starts from the inside.'",
    "💫 'You don't have to be extreme, just consistent.'",
    "🏃 'The body achieves what the mind believes.'",
];

pub const WELLNESS_TIPS: &[&str] = &[
    "💧 Stay hydrated! Aim for 8 glasses of water daily.",
    "😴 Get 7-9 hours of sleep for optimal health and recovery.",
    "🥗 Fill half your plate with vegetables at each meal.",
    "🏃 Take a 10-minute walk after meals to aid digestion.",
    "🧘 Practice deep breathing for 5 minutes to reduce stress.",
    "📱 Take regular breaks from screens to rest your eyes.",
    "🌞 Get 15-30 minutes of sunlight daily for vitamin D.",
    "🥜 Include protein in every meal to stay satiated.",
    "🎵 Listen to music you enjoy - it's good for mental health!",
    "👥 Connect with friends and family regularly for emotional wellbeing.",
    "📚 Learn something new every day to keep your mind sharp.",
    "🧴 Wash your hands regularly to prevent illness.",
    "🚶 Stand up and stretch every hour if you sit a lot.",
    "🥤 Limit sugary drinks - choose water or unsweetened tea.",
    "🌿 Add herbs and spices to meals for extra nutrients and flavor.",
];

/// External lookups used by the chat dispatcher. Every method answers with
/// a user-facing string, falling back to canned text when the upstream fails.
#[async_trait::async_trait]
pub trait HealthDataService: Send + Sync {
    async fn get_nutrition_info(&self, food_name: &str) -> String;

    async fn get_exercises(&self, body_part: &str, limit: usize) -> String;

    async fn get_motivational_quote(&self) -> String;

    fn get_wellness_tip(&self) -> String {
        pick(WELLNESS_TIPS)
    }
}

#[derive(Debug, Deserialize)]
struct FoodSearchResponse {
    #[serde(default)]
    foods: Vec<Food>,
}

#[derive(Debug, Deserialize)]
struct Food {
    description: Option<String>,
    #[serde(rename = "foodNutrients", default)]
    food_nutrients: Vec<FoodNutrient>,
}

#[derive(Debug, Deserialize)]
struct FoodNutrient {
    #[serde(rename = "nutrientName", default)]
    nutrient_name: String,
    value: Option<f64>,
    #[serde(rename = "unitName", default)]
    unit_name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct Exercise {
    name: Option<String>,
    equipment: Option<String>,
    target: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Quote {
    #[serde(default)]
    text: String,
    author: Option<String>,
}

/// USDA FoodData Central, ExerciseDB (RapidAPI) and a quotes feed
pub struct ApiService {
    usda_api_key: Option<String>,
    rapid_api_key: Option<String>,
    usda_api_url: String,
    exercise_api_url: String,
    quotes_api_url: String,
    nutrition_timeout: Duration,
    exercise_timeout: Duration,
    quotes_timeout: Duration,
    client: reqwest::Client,
}

impl ApiService {
    pub fn new(config: &Config) -> Self {
        Self {
            usda_api_key: config.usda_api_key.clone(),
            rapid_api_key: config.rapid_api_key.clone(),
            usda_api_url: config.usda_api_url.clone(),
            exercise_api_url: config.exercise_api_url.trim_end_matches('/').to_string(),
            quotes_api_url: config.quotes_api_url.clone(),
            nutrition_timeout: NUTRITION_TIMEOUT,
            exercise_timeout: EXERCISE_TIMEOUT,
            quotes_timeout: QUOTES_TIMEOUT,
            client: reqwest::Client::new(),
        }
    }

    async fn fetch_nutrition(&self, api_key: &str, food_name: &str) -> Result<String> {
        let response = self
            .client
            .get(&self.usda_api_url)
            .query(&[("api_key", api_key), ("query", food_name)])
            .timeout(self.nutrition_timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            log::warn!("⚠️ USDA API returned {}", response.status());
            return Ok(nutrition_fallback(food_name));
        }

        let data: FoodSearchResponse = response.json().await?;
        let Some(food) = data.foods.first() else {
            return Ok(format!(
                "🔍 Sorry, I couldn't find nutrition details for '{}'. Try: apple, banana, chicken, rice, etc.",
                food_name
            ));
        };

        Ok(format_nutrients(food, food_name).unwrap_or_else(|| nutrition_fallback(food_name)))
    }

    async fn fetch_exercises(&self, api_key: &str, body_part: &str, limit: usize) -> Result<String, reqwest::Error> {
        let target = normalize_body_part(body_part);
        let url = format!("{}/bodyPart/{}", self.exercise_api_url, target);
        log::debug!("🏋️ Fetching exercises from {}", url);

        let response = self
            .client
            .get(&url)
            .header("X-RapidAPI-Key", api_key)
            .header("X-RapidAPI-Host", EXERCISE_API_HOST)
            .query(&[("limit", limit * 2)])
            .timeout(self.exercise_timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            log::warn!("⚠️ ExerciseDB returned {}", status);
            return Ok(format!(
                "⚠️ Unable to fetch exercises right now. Status code: {}",
                status.as_u16()
            ));
        }

        let exercises: Vec<Exercise> = response.json().await?;
        if exercises.is_empty() {
            return Ok(format!(
                "🔍 No exercises found for '{}'. Try: chest, back, legs, shoulders, arms, or abs.",
                body_part
            ));
        }

        Ok(format_exercises(&sample(exercises, limit), body_part))
    }

    async fn fetch_quote(&self) -> Result<Option<String>> {
        let response = self
            .client
            .get(&self.quotes_api_url)
            .timeout(self.quotes_timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Ok(None);
        }

        let quotes: Vec<Quote> = response.json().await?;
        Ok(pick_quote(&quotes))
    }
}

#[async_trait::async_trait]
impl HealthDataService for ApiService {
    async fn get_nutrition_info(&self, food_name: &str) -> String {
        let Some(api_key) = self.usda_api_key.as_deref() else {
            return "⚠️ Nutrition service is currently unavailable. Please configure USDA_API_KEY in your .env file.".to_string();
        };

        log::info!("🥗 Nutrition lookup: {}", food_name);
        match self.fetch_nutrition(api_key, food_name).await {
            Ok(reply) => reply,
            Err(e) => {
                log::error!("❌ USDA API error: {}", e);
                nutrition_fallback(food_name)
            }
        }
    }

    async fn get_exercises(&self, body_part: &str, limit: usize) -> String {
        let Some(api_key) = self.rapid_api_key.as_deref() else {
            return "⚠️ Exercise service is currently unavailable. Please configure RAPID_API_KEY in your .env file.".to_string();
        };

        log::info!("💪 Exercise lookup: {} (limit {})", body_part, limit);
        match self.fetch_exercises(api_key, body_part, limit).await {
            Ok(reply) => reply,
            Err(e) if e.is_timeout() => {
                log::warn!("⏱️ ExerciseDB timed out: {}", e);
                "⏱️ Request timed out. Please try again.".to_string()
            }
            Err(e) if e.is_connect() || e.is_request() => {
                log::error!("❌ ExerciseDB network error: {}", e);
                "⚠️ Network error: Unable to connect to exercise service. Please check your internet connection.".to_string()
            }
            Err(e) => {
                log::error!("❌ ExerciseDB error: {}", e);
                format!("⚠️ An unexpected error occurred: {}", e)
            }
        }
    }

    async fn get_motivational_quote(&self) -> String {
        match self.fetch_quote().await {
            Ok(Some(quote)) => quote,
            Ok(None) => pick(FALLBACK_QUOTES),
            Err(e) => {
                log::debug!("Quotes API unavailable, using fallback: {}", e);
                pick(FALLBACK_QUOTES)
            }
        }
    }
}

fn nutrition_fallback(food_name: &str) -> String {
    let food = food_name.to_lowercase();
    FALLBACK_FOODS
        .iter()
        .find(|(key, _)| food.contains(key))
        .map(|(_, info)| format!("{}\n\n💡 USDA API unavailable - showing approximate values", info))
        .unwrap_or_else(|| {
            format!(
                "⚠️ Unable to fetch nutrition data for '{}'. Try: apple, banana, chicken, rice, egg",
                food_name
            )
        })
}

/// Nutrient summary for the first search hit, `None` when nothing maps
fn format_nutrients(food: &Food, food_name: &str) -> Option<String> {
    let mut found: Vec<(&str, f64, &str)> = Vec::new();

    for nutrient in &food.food_nutrients {
        let name = nutrient.nutrient_name.to_lowercase();
        let Some(&(_, display)) = NUTRIENT_MAPPING.iter().find(|(key, _)| name.contains(key)) else {
            continue;
        };
        let value = (nutrient.value.unwrap_or(0.0) * 10.0).round() / 10.0;
        // Later entries overwrite earlier ones of the same kind
        found.retain(|(existing, _, _)| *existing != display);
        found.push((display, value, nutrient.unit_name.as_str()));
    }

    if found.is_empty() {
        return None;
    }

    let description = food.description.as_deref().unwrap_or(food_name);
    let mut result = format!(
        "📋 Nutritional Information for {} (per 100g):\n\n",
        title_case(description)
    );

    for name in NUTRIENT_ORDER {
        if let Some((_, value, unit)) = found.iter().find(|(display, _, _)| display == name) {
            let mut line = format!("{:.1} {}", value, unit);
            if *name == "Alcohol" && *value == 0.0 {
                line.push_str(" (none)");
            }
            result.push_str(&format!("• {}: {}\n", name, line));
        }
    }

    result.push_str("\n💡 Values may vary by brand and preparation method");
    Some(result)
}

fn normalize_body_part(body_part: &str) -> String {
    let lower = body_part.to_lowercase();
    let target = match lower.as_str() {
        "legs" | "leg" => "upper legs",
        "shoulders" | "shoulder" => "shoulders",
        "arms" | "arm" | "biceps" | "triceps" => "upper arms",
        "abs" | "core" => "waist",
        other => other,
    };
    target.to_string()
}

fn format_exercises(exercises: &[Exercise], body_part: &str) -> String {
    let mut result = format!(
        "💪 Top {} Exercises for {}:\n\n",
        exercises.len(),
        title_case(body_part)
    );

    for (i, exercise) in exercises.iter().enumerate() {
        result.push_str(&format!(
            "{}. **{}**\n   Equipment: {}\n   Target: {}\n\n",
            i + 1,
            title_case(exercise.name.as_deref().unwrap_or("Unknown")),
            title_case(exercise.equipment.as_deref().unwrap_or("bodyweight")),
            title_case(exercise.target.as_deref().unwrap_or("")),
        ));
    }

    result.push_str(
        "💡 Tips:\n\
         • Warm up before exercising\n\
         • Focus on proper form over speed\n\
         • Start with lighter weights and progress gradually\n\
         • Rest 48 hours between training the same muscle group",
    );
    result
}

fn sample(mut exercises: Vec<Exercise>, limit: usize) -> Vec<Exercise> {
    if exercises.len() > limit {
        let mut rng = rand::thread_rng();
        exercises.shuffle(&mut rng);
        exercises.truncate(limit);
    }
    exercises
}

fn pick_quote(quotes: &[Quote]) -> Option<String> {
    let quote = quotes.choose(&mut rand::thread_rng())?;
    // The feed appends its own name to every author
    let author = quote
        .author
        .as_deref()
        .map(|a| a.trim_end_matches(", type.fit").trim())
        .filter(|a| !a.is_empty() && *a != "type.fit");

    Some(match author {
        Some(author) => format!("💭 \"{}\" - {}", quote.text, author),
        None => format!("💭 \"{}\"", quote.text),
    })
}

pub(crate) fn pick(options: &[&str]) -> String {
    options
        .choose(&mut rand::thread_rng())
        .map(|s| s.to_string())
        .unwrap_or_default()
}

/// Upper-case the first letter of every alphabetic run, lower-case the rest
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut previous_is_letter = false;
    for c in s.chars() {
        if previous_is_letter {
            out.extend(c.to_lowercase());
        } else {
            out.extend(c.to_uppercase());
        }
        previous_is_letter = c.is_alphabetic();
    }
    out
}
