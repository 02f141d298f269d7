use anyhow::{bail, Result};
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::LazyLock;

use crate::models::{BmiResult, CalorieResult, HealthToolRequest, WaterIntakeResult};

static WEIGHT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*kg").expect("valid weight regex"));
static HEIGHT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*cm").expect("valid height regex"));

/// Body Mass Index from kilograms and centimetres
pub fn calculate_bmi(weight_kg: f64, height_cm: f64) -> Result<BmiResult> {
    let height_m = height_cm / 100.0;

    if weight_kg <= 0.0 || height_m <= 0.0 {
        bail!("Weight and height must be positive numbers.");
    }
    if !(0.5..=2.5).contains(&height_m) {
        bail!("Height seems incorrect. Please enter height in centimeters (e.g., 170 cm).");
    }
    if !(20.0..=300.0).contains(&weight_kg) {
        bail!("Weight seems incorrect. Please enter weight in kilograms (e.g., 70 kg).");
    }

    let bmi = round1(weight_kg / (height_m * height_m));

    let (category, advice) = if bmi < 18.5 {
        (
            "Underweight",
            "You may need to gain weight. Consult a healthcare provider for guidance.",
        )
    } else if bmi < 25.0 {
        (
            "Normal weight",
            "Great! You're in the healthy weight range. Keep up the good habits! 💪",
        )
    } else if bmi < 30.0 {
        (
            "Overweight",
            "Consider a balanced diet and regular exercise. Consult a healthcare provider.",
        )
    } else {
        (
            "Obese",
            "It's recommended to speak with a healthcare provider about weight management strategies.",
        )
    };

    let message = format!(
        "📊 Your BMI is {:.1} ({})\n\n{}\n\n\
         ⚠️ Note: BMI doesn't account for muscle mass, bone density, or body composition. \
         It's just one health indicator among many.",
        bmi, category, advice
    );

    Ok(BmiResult {
        bmi,
        category: category.to_string(),
        advice: advice.to_string(),
        message,
    })
}

/// Daily water recommendation: 33 ml per kg, scaled by activity
pub fn calculate_water_intake(weight_kg: f64, activity_level: &str) -> Result<WaterIntakeResult> {
    if weight_kg <= 0.0 {
        bail!("Weight must be a positive number.");
    }
    if !(20.0..=300.0).contains(&weight_kg) {
        bail!("Weight seems incorrect. Please enter weight in kilograms (e.g., 70 kg).");
    }

    let multiplier = match activity_level.to_lowercase().as_str() {
        "sedentary" => 1.0,
        "light" => 1.1,
        "moderate" => 1.2,
        "active" => 1.3,
        "very_active" => 1.4,
        _ => 1.2,
    };
    let total_ml = weight_kg * 33.0 * multiplier;

    let liters = round1(total_ml / 1000.0);
    let glasses = (total_ml / 250.0).round_ties_even() as i64;

    let message = format!(
        "💧 Daily Water Recommendation\n\n\
         For a {} kg person with {} activity level:\n\n\
         • {:.1} liters ({} glasses of 250ml)\n\n\
         💡 Tips:\n\
         • Drink more in hot weather or during intense exercise\n\
         • Pale yellow urine indicates good hydration\n\
         • Spread intake throughout the day\n\
         • Eat water-rich foods (fruits, vegetables)",
        decimal(weight_kg),
        activity_level,
        liters,
        glasses
    );

    Ok(WaterIntakeResult {
        water_liters: liters,
        water_glasses: glasses,
        message,
    })
}

/// Daily calorie needs (Mifflin-St Jeor BMR times an activity factor)
pub fn calculate_daily_calories(
    age: i64,
    weight_kg: f64,
    height_cm: f64,
    gender: &str,
    activity_level: &str,
) -> Result<CalorieResult> {
    if !(15..=100).contains(&age) {
        bail!("Please provide a valid age between 15 and 100.");
    }
    if weight_kg <= 0.0 || height_cm <= 0.0 {
        bail!("Weight and height must be positive numbers.");
    }

    let base = 10.0 * weight_kg + 6.25 * height_cm - 5.0 * age as f64;
    let bmr = match gender.to_lowercase().as_str() {
        "male" => base + 5.0,
        "female" => base - 161.0,
        _ => bail!("Please specify gender as 'male' or 'female'."),
    };

    let multiplier = match activity_level.to_lowercase().as_str() {
        "sedentary" => 1.2,
        "light" => 1.375,
        "moderate" => 1.55,
        "active" => 1.725,
        "very_active" => 1.9,
        _ => 1.55,
    };

    let tdee = (bmr * multiplier).round_ties_even() as i64;
    let weight_loss = tdee - 500;
    let weight_gain = tdee + 300;
    let bmr_rounded = bmr.round_ties_even() as i64;

    let message = format!(
        "🔥 Daily Calorie Needs ({}, {} years, {} activity)\n\n\
         • Maintain weight: {} kcal/day\n\
         • Lose weight (safe): {} kcal/day\n\
         • Gain weight (muscle): {} kcal/day\n\
         • BMR (at rest): {} kcal/day\n\n\
         💡 Tips:\n\
         • These are estimates; adjust based on results\n\
         • Focus on nutrient-dense whole foods\n\
         • Combine with strength training for best results\n\
         • Don't go below 1200 (women) or 1500 (men) kcal/day",
        capitalize(gender),
        age,
        activity_level,
        tdee,
        weight_loss,
        weight_gain,
        bmr_rounded
    );

    Ok(CalorieResult {
        maintenance_calories: tdee,
        weight_loss_calories: weight_loss,
        weight_gain_calories: weight_gain,
        bmr: bmr_rounded,
        message,
    })
}

/// Weight and height from text like "My weight is 70 kg and height is 175 cm"
pub fn parse_bmi_input(text: &str) -> Option<(f64, f64)> {
    let weight = first_quantity(&WEIGHT_RE, text)?;
    let height = first_quantity(&HEIGHT_RE, text)?;
    Some((weight, height))
}

/// Weight from text like "I weigh 70 kg"
pub fn parse_water_input(text: &str) -> Option<f64> {
    first_quantity(&WEIGHT_RE, text)
}

fn first_quantity(re: &Regex, text: &str) -> Option<f64> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Dispatch a `/api/health-tool` request to the matching calculator.
/// Validation problems come back as `{"error": "..."}`.
pub fn run_tool(request: &HealthToolRequest) -> Value {
    match request.tool.as_deref() {
        Some("bmi") => {
            let (Some(weight), Some(height)) = (number(&request.weight), number(&request.height))
            else {
                return error_json("Please provide valid numbers for weight and height.");
            };
            to_json(calculate_bmi(weight, height))
        }
        Some("water") => {
            let Some(weight) = number(&request.weight) else {
                return error_json("Please provide a valid number for weight.");
            };
            let activity = request.activity.as_deref().unwrap_or("moderate");
            to_json(calculate_water_intake(weight, activity))
        }
        Some("calories") => {
            let (Some(age), Some(weight), Some(height)) = (
                integer(&request.age),
                number(&request.weight),
                number(&request.height),
            ) else {
                return error_json("Please provide valid numbers for age, weight, and height.");
            };
            let gender = request.gender.as_deref().unwrap_or("");
            let activity = request.activity.as_deref().unwrap_or("moderate");
            to_json(calculate_daily_calories(age, weight, height, gender, activity))
        }
        _ => error_json("Invalid tool type"),
    }
}

fn to_json<T: Serialize>(result: Result<T>) -> Value {
    match result {
        Ok(value) => serde_json::to_value(value).unwrap_or_else(|e| error_json(&e.to_string())),
        Err(e) => error_json(&e.to_string()),
    }
}

fn error_json(message: &str) -> Value {
    json!({ "error": message })
}

/// JSON number or numeric string
fn number(value: &Option<Value>) -> Option<f64> {
    let parsed: Option<f64> = match value.as_ref()? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.filter(|n| n.is_finite())
}

/// Whole number; fractional JSON numbers are truncated, strings must be integral
fn integer(value: &Option<Value>) -> Option<i64> {
    match value.as_ref()? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round_ties_even() / 10.0
}

/// Whole numbers keep one decimal place: `70.0`, `72.5`
fn decimal(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}

fn capitalize(s: &str) -> String {
    let lower = s.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
