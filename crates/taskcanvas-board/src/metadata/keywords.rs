//! Keyword tables for group names.
//!
//! Parsing natural-language group names is out of scope; this module only
//! recognises a fixed set of phrases. Date resolution sits behind
//! [`DateKeywordResolver`] so a richer parser can be plugged in.

use chrono::{Datelike, Duration, NaiveDate};

use crate::model::{Priority, TaskStatus};

/// Maps text containing a date keyword to a concrete date.
pub trait DateKeywordResolver: Send + Sync {
    /// Date named by `text`, if it contains a known keyword.
    fn resolve(&self, text: &str) -> Option<NaiveDate>;
}

/// Table-driven resolver relative to a fixed reference date.
///
/// | keyword     | date                                 |
/// |-------------|--------------------------------------|
/// | `today`     | the reference date                   |
/// | `tomorrow`  | reference + 1 day                    |
/// | `this week` | Sunday ending the reference ISO week |
/// | `next week` | Monday starting the next ISO week    |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeywordDates {
    today: NaiveDate,
}

impl KeywordDates {
    pub fn new(today: NaiveDate) -> Self {
        Self { today }
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    fn end_of_week(&self) -> NaiveDate {
        let days_left = 6 - self.today.weekday().num_days_from_monday() as i64;
        self.today + Duration::days(days_left)
    }
}

impl DateKeywordResolver for KeywordDates {
    fn resolve(&self, text: &str) -> Option<NaiveDate> {
        let text = text.to_lowercase();
        // Multi-word phrases first so "this week" is not shadowed.
        if text.contains("next week") {
            Some(self.end_of_week() + Duration::days(1))
        } else if text.contains("this week") {
            Some(self.end_of_week())
        } else if text.contains("tomorrow") {
            Some(self.today + Duration::days(1))
        } else if text.contains("today") {
            Some(self.today)
        } else {
            None
        }
    }
}

/// Words that cancel a keyword directly after them.
const NEGATIONS: &[&str] = &["not", "no", "non"];

/// Lowercase words of `name`, split on anything that is not alphanumeric.
fn words(name: &str) -> Vec<String> {
    name.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// True if `phrase` occurs as whole words and is not preceded by a negation.
fn has_phrase(words: &[String], phrase: &[&str]) -> bool {
    words
        .windows(phrase.len())
        .enumerate()
        .any(|(start, window)| {
            window.iter().zip(phrase).all(|(word, expected)| word == expected)
                && !(start > 0 && NEGATIONS.contains(&words[start - 1].as_str()))
        })
}

/// Priority implied by a group name.
pub fn keyword_priority(name: &str) -> Option<Priority> {
    let words = words(name);
    if has_phrase(&words, &["low", "priority"]) {
        Some(Priority::Low)
    } else if has_phrase(&words, &["urgent"]) || has_phrase(&words, &["high", "priority"]) {
        Some(Priority::High)
    } else {
        None
    }
}

/// Status implied by a group name.
pub fn keyword_status(name: &str) -> Option<TaskStatus> {
    let words = words(name);
    if has_phrase(&words, &["in", "progress"]) {
        Some(TaskStatus::InProgress)
    } else if has_phrase(&words, &["done"]) {
        Some(TaskStatus::Done)
    } else if has_phrase(&words, &["todo"]) || has_phrase(&words, &["to", "do"]) {
        Some(TaskStatus::Todo)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wednesday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 15).unwrap()
    }

    #[test]
    fn test_date_keywords() {
        let dates = KeywordDates::new(wednesday());
        assert_eq!(dates.resolve("Due Today"), Some(wednesday()));
        assert_eq!(
            dates.resolve("tomorrow"),
            NaiveDate::from_ymd_opt(2024, 5, 16)
        );
        assert_eq!(
            dates.resolve("This Week"),
            NaiveDate::from_ymd_opt(2024, 5, 19)
        );
        assert_eq!(
            dates.resolve("next week sprint"),
            NaiveDate::from_ymd_opt(2024, 5, 20)
        );
        assert_eq!(dates.resolve("Backlog"), None);
    }

    #[test]
    fn test_name_keywords() {
        assert_eq!(keyword_priority("URGENT fixes"), Some(Priority::High));
        assert_eq!(keyword_priority("Low priority"), Some(Priority::Low));
        assert_eq!(keyword_priority("Ideas"), None);
        assert_eq!(keyword_status("In Progress"), Some(TaskStatus::InProgress));
        assert_eq!(keyword_status("Done"), Some(TaskStatus::Done));
        assert_eq!(keyword_status("To Do"), Some(TaskStatus::Todo));
    }

    #[test]
    fn test_keywords_match_whole_words() {
        assert_eq!(keyword_status("Undone"), None);
        assert_eq!(keyword_status("Abandoned"), None);
        assert_eq!(keyword_status("Toronto doors"), None);
        assert_eq!(keyword_status("Done/archived"), Some(TaskStatus::Done));
        assert_eq!(keyword_priority("Non-urgent"), None);
        assert_eq!(keyword_priority("not urgent"), None);
        assert_eq!(keyword_priority("Insurgents"), None);
        assert_eq!(keyword_priority("Urgent tomorrow"), Some(Priority::High));
        assert_eq!(keyword_status("Urgent tomorrow"), None);
    }
}
