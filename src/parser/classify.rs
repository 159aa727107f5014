//! Status classification — a priority-ordered pattern cascade.

use std::sync::OnceLock;

use regex::Regex;

use crate::model::ApplicationStatus;

/// A single classification rule: pattern → status.
struct StatusRule {
    regex: Regex,
    status: ApplicationStatus,
}

/// Rules in evaluation order. The order is the tie-break: OFFER and REJECTED
/// are lifecycle-terminal and must win over INTERVIEW/APPLIED language that
/// co-occurs in the same message (a rejection that mentions "interview" is
/// still a rejection).
fn rules() -> &'static [StatusRule] {
    static RULES: OnceLock<Vec<StatusRule>> = OnceLock::new();
    RULES.get_or_init(|| {
        let rule = |pattern: &str, status| StatusRule {
            regex: Regex::new(pattern).unwrap(),
            status,
        };
        vec![
            rule(
                r"(?i)(offer letter|congratulations|pleased to offer|welcome to the team)",
                ApplicationStatus::Offer,
            ),
            rule(
                r"(?i)(thank you for your interest|unfortunately|not moving forward|pursue other candidates)",
                ApplicationStatus::Rejected,
            ),
            rule(
                r"(?i)(interview|schedule a time|availability|coding challenge|technical screen)",
                ApplicationStatus::Interview,
            ),
            rule(
                r"(?i)(application received|successfully submitted|application confirmation|thank you for applying)",
                ApplicationStatus::Applied,
            ),
        ]
    })
}

/// Classify a message into a lifecycle signal, or `None` when nothing matches.
pub fn classify(subject: &str, body: &str) -> Option<ApplicationStatus> {
    let content = format!("{subject} {body}").to_lowercase();
    rules()
        .iter()
        .find(|rule| rule.regex.is_match(&content))
        .map(|rule| rule.status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_each_status() {
        assert_eq!(
            classify("Application Received", "Thanks!"),
            Some(ApplicationStatus::Applied)
        );
        assert_eq!(
            classify("Next steps", "We'd like to schedule a time to talk"),
            Some(ApplicationStatus::Interview)
        );
        assert_eq!(
            classify("Your offer letter", "Attached"),
            Some(ApplicationStatus::Offer)
        );
        assert_eq!(
            classify("Update", "Unfortunately we are not moving forward"),
            Some(ApplicationStatus::Rejected)
        );
    }

    #[test]
    fn no_signal_returns_none() {
        assert_eq!(classify("Lunch on Friday?", "Want to grab tacos?"), None);
        assert_eq!(classify("", ""), None);
    }

    #[test]
    fn offer_beats_interview() {
        // "interview" appears, but the terminal OFFER signal wins.
        assert_eq!(
            classify(
                "Congratulations!",
                "After your final interview we are pleased to offer you the role."
            ),
            Some(ApplicationStatus::Offer)
        );
    }

    #[test]
    fn rejection_beats_interview() {
        assert_eq!(
            classify(
                "Your interview result",
                "Unfortunately we have decided to pursue other candidates."
            ),
            Some(ApplicationStatus::Rejected)
        );
    }

    #[test]
    fn rejection_beats_applied_boilerplate() {
        assert_eq!(
            classify(
                "Thank you for applying",
                "Thank you for your interest. Unfortunately we will not proceed."
            ),
            Some(ApplicationStatus::Rejected)
        );
    }

    #[test]
    fn matches_against_body_when_subject_is_bare() {
        assert_eq!(
            classify("Hello", "Your application has been successfully submitted."),
            Some(ApplicationStatus::Applied)
        );
    }

    #[test]
    fn matching_is_case_insensitive() {
        assert_eq!(
            classify("APPLICATION RECEIVED", ""),
            Some(ApplicationStatus::Applied)
        );
    }
}
