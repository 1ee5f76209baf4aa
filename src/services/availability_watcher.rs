use regex::Regex;
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

use crate::config::WatcherConfig;
use crate::errors::AppError;
use crate::external::ObjectSource;

/// Shell-style key pattern: `*` matches any run of characters (slashes
/// included), `?` matches exactly one and `[...]` / `[!...]` match one
/// character from (or outside) a set. An unclosed `[` is literal, as is
/// everything else.
#[derive(Debug, Clone)]
pub struct KeyPattern {
    raw: String,
    regex: Regex,
}

impl KeyPattern {
    pub fn new(pattern: &str) -> Result<Self, AppError> {
        let chars: Vec<char> = pattern.chars().collect();
        let mut expr = String::with_capacity(pattern.len() + 8);
        expr.push('^');
        let mut i = 0;
        while i < chars.len() {
            match chars[i] {
                '*' => expr.push_str(".*"),
                '?' => expr.push('.'),
                '[' => match class_end(&chars, i) {
                    Some(end) => {
                        push_class(&mut expr, &chars[i + 1..end]);
                        i = end;
                    }
                    None => expr.push_str(r"\["),
                },
                other => expr.push_str(&regex::escape(&other.to_string())),
            }
            i += 1;
        }
        expr.push('$');

        let regex = Regex::new(&expr)
            .map_err(|e| AppError::Config(format!("invalid key pattern '{}': {}", pattern, e)))?;

        Ok(Self {
            raw: pattern.to_string(),
            regex,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn matches(&self, key: &str) -> bool {
        self.regex.is_match(key)
    }
}

/// Index of the `]` closing the class opened at `open`. A `]` right after
/// `[` or `[!` belongs to the set.
fn class_end(chars: &[char], open: usize) -> Option<usize> {
    let mut j = open + 1;
    if chars.get(j) == Some(&'!') {
        j += 1;
    }
    if chars.get(j) == Some(&']') {
        j += 1;
    }
    (j..chars.len()).find(|&k| chars[k] == ']')
}

fn push_class(expr: &mut String, body: &[char]) {
    let (negated, body) = match body.split_first() {
        Some(('!', rest)) => (true, rest),
        _ => (false, body),
    };
    expr.push('[');
    if negated {
        expr.push('^');
    }
    for &c in body {
        if matches!(c, '\\' | '[' | ']' | '^' | '&' | '~') {
            expr.push('\\');
        }
        expr.push(c);
    }
    expr.push(']');
}

/// One listing call: the first key matching `pattern`, if any.
pub async fn poke(source: &dyn ObjectSource, pattern: &KeyPattern) -> Result<Option<String>, AppError> {
    let keys = source.list_keys().await?;
    Ok(keys.into_iter().find(|key| pattern.matches(key)))
}

/// Poll the bucket until a key matches, or fail with `AppError::Timeout`.
///
/// The first poke is immediate. After each miss the watcher sleeps for the
/// poke interval, clamped so that the last poke lands on the deadline.
pub async fn wait_for_object(source: &dyn ObjectSource, config: &WatcherConfig) -> Result<String, AppError> {
    let pattern = KeyPattern::new(&config.key_pattern)?;
    let started = Instant::now();
    let mut pokes: u64 = 0;

    info!(
        "👀 Waiting for {} in bucket {} (every {}s, timeout {}s)",
        pattern.as_str(),
        source.bucket(),
        config.poke_interval.as_secs(),
        config.timeout.as_secs()
    );

    loop {
        pokes += 1;
        if let Some(key) = poke(source, &pattern).await? {
            info!("✅ Found {} after {} poke(s)", key, pokes);
            return Ok(key);
        }

        let elapsed = started.elapsed();
        if elapsed >= config.timeout {
            return Err(AppError::Timeout {
                bucket: source.bucket().to_string(),
                pattern: pattern.as_str().to_string(),
                waited_secs: elapsed.as_secs(),
            });
        }

        let remaining = config.timeout - elapsed;
        debug!("No match for {} yet (poke {}), sleeping", pattern.as_str(), pokes);
        sleep(config.poke_interval.min(remaining)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_star_matches_any_json() {
        let pattern = KeyPattern::new("*.json").unwrap();
        assert!(pattern.matches("quote.json"));
        assert!(pattern.matches("2024/01/01/quote.json"));
        assert!(!pattern.matches("quote.json.tmp"));
        assert!(!pattern.matches("quote.csv"));
    }

    #[test]
    fn test_question_mark_and_literals() {
        let pattern = KeyPattern::new("usd-brl-?.json").unwrap();
        assert!(pattern.matches("usd-brl-1.json"));
        assert!(!pattern.matches("usd-brl-12.json"));
        // dots are literal
        assert!(!pattern.matches("usd-brl-1xjson"));
    }

    #[test]
    fn test_regex_metacharacters_are_escaped() {
        let pattern = KeyPattern::new("data(1)+.json").unwrap();
        assert!(pattern.matches("data(1)+.json"));
        assert!(!pattern.matches("data11.json"));
    }

    #[test]
    fn test_character_classes() {
        let pattern = KeyPattern::new("usd-[0-9][!x].json").unwrap();
        assert!(pattern.matches("usd-1a.json"));
        assert!(!pattern.matches("usd-1x.json"));
        assert!(!pattern.matches("usd-ab.json"));

        let pattern = KeyPattern::new("[]a]^.json").unwrap();
        assert!(!pattern.matches("].json"));
        assert!(pattern.matches("]^.json"));
        assert!(pattern.matches("a^.json"));
    }

    #[test]
    fn test_unclosed_bracket_is_literal() {
        let pattern = KeyPattern::new("raw[1.json").unwrap();
        assert!(pattern.matches("raw[1.json"));
        assert!(!pattern.matches("raw1.json"));
    }
}
