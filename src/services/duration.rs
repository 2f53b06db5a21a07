use crate::errors::ScheduleError;
use crate::models::ServiceDuration;

/// Normalizes a service duration to whole minutes.
///
/// Text forms: "45", "30 min", "30 minutes", "30m", "1 hour", "1.5 hours",
/// "2h", "1h 30m", "1 hour 15 minutes".
pub fn parse_service_duration(duration: &ServiceDuration) -> Result<u32, ScheduleError> {
    match duration {
        ServiceDuration::Minutes(n) => u32::try_from(*n)
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| ScheduleError::UnparseableDuration(n.to_string())),
        ServiceDuration::Text(text) => parse_duration_text(text)
            .filter(|n| *n > 0)
            .ok_or_else(|| ScheduleError::UnparseableDuration(text.clone())),
    }
}

fn parse_duration_text(text: &str) -> Option<u32> {
    let text = text.trim().to_lowercase();
    if text.is_empty() {
        return None;
    }
    if let Ok(minutes) = text.parse::<u32>() {
        return Some(minutes);
    }

    let mut total = 0.0_f64;
    let mut pending: Option<f64> = None;
    for token in tokenize(&text) {
        match token {
            Token::Number(n) => {
                if pending.replace(n).is_some() {
                    return None;
                }
            }
            Token::Word(word) => {
                let factor = unit_factor(&word)?;
                total += pending.take()? * factor;
            }
        }
    }
    if pending.is_some() {
        return None;
    }

    let rounded = total.round();
    if (total - rounded).abs() > f64::EPSILON || rounded > f64::from(u32::MAX) {
        return None;
    }
    Some(rounded as u32)
}

fn unit_factor(word: &str) -> Option<f64> {
    match word {
        "m" | "min" | "mins" | "minute" | "minutes" => Some(1.0),
        "h" | "hr" | "hrs" | "hour" | "hours" => Some(60.0),
        _ => None,
    }
}

enum Token {
    Number(f64),
    Word(String),
}

fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_ascii_digit() || c == '.' {
            let mut number = String::new();
            while let Some(&d) = chars.peek().filter(|d| d.is_ascii_digit() || **d == '.') {
                number.push(d);
                chars.next();
            }
            match number.parse() {
                Ok(n) => tokens.push(Token::Number(n)),
                Err(_) => tokens.push(Token::Word(number)),
            }
        } else if c.is_alphabetic() {
            let mut word = String::new();
            while let Some(&w) = chars.peek().filter(|w| w.is_alphabetic()) {
                word.push(w);
                chars.next();
            }
            tokens.push(Token::Word(word));
        } else {
            chars.next();
        }
    }
    tokens
}
