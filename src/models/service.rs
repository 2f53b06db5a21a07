use serde::{Deserialize, Serialize};

/// Durations arrive either as a number of minutes or as free text ("30 min").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ServiceDuration {
    Minutes(i64),
    Text(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    pub name: String,
    pub duration: ServiceDuration,
    #[serde(default)]
    pub price_cents: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_accepts_number_or_text() {
        let numeric: Service =
            serde_json::from_str(r#"{"id":"cut","name":"Cut","duration":30,"price_cents":2500}"#)
                .unwrap();
        assert_eq!(numeric.duration, ServiceDuration::Minutes(30));

        let text: Service =
            serde_json::from_str(r#"{"id":"color","name":"Color","duration":"1h 30m"}"#).unwrap();
        assert_eq!(text.duration, ServiceDuration::Text("1h 30m".to_string()));
        assert_eq!(text.price_cents, 0);
    }
}
