//! Classification of user turns at human checkpoints.
//!
//! A checkpoint awaits explicit approval text; anything that is neither an
//! approval nor a rejection is treated as feedback for the next revision.

/// The user's decision at a pending checkpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmDecision {
    Approve,
    Reject,
    Feedback(String),
}

const APPROVE_PHRASES: &[&str] = &[
    "yes",
    "y",
    "yes please",
    "approve",
    "approved",
    "looks good",
    "looks good to me",
    "lgtm",
    "proceed",
    "go ahead",
    "ok",
    "okay",
    "sounds good",
    "correct",
    "confirm",
    "confirmed",
    "ship it",
];

const REJECT_PHRASES: &[&str] = &["no", "n", "stop", "abort", "cancel", "reject", "abandon"];

fn normalize(text: &str) -> String {
    text.trim()
        .trim_end_matches(['.', '!'])
        .trim()
        .to_lowercase()
}

/// Classify a turn at a checkpoint. Only a whole-message approval or
/// rejection counts as one; "yes, but rename the column" is feedback.
pub fn classify(text: &str) -> ConfirmDecision {
    let normalized = normalize(text);

    if APPROVE_PHRASES.contains(&normalized.as_str()) {
        ConfirmDecision::Approve
    } else if REJECT_PHRASES.contains(&normalized.as_str()) {
        ConfirmDecision::Reject
    } else {
        ConfirmDecision::Feedback(text.trim().to_string())
    }
}

/// Whether a turn is asking about job status.
pub fn is_status_request(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.contains("status") || lower.contains("progress") || lower.contains("how is the job")
}

/// Whether a turn is asking to submit the job again.
pub fn is_resubmit_request(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.contains("resubmit") || lower.contains("rerun") || lower.contains("run again")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_approvals() {
        for text in ["yes", "Yes.", "  LGTM  ", "go ahead", "Looks good!", "ok"] {
            assert_eq!(classify(text), ConfirmDecision::Approve, "text: {text:?}");
        }
    }

    #[test]
    fn test_classify_rejections() {
        for text in ["no", "No.", "stop", "ABORT", "cancel"] {
            assert_eq!(classify(text), ConfirmDecision::Reject, "text: {text:?}");
        }
    }

    #[test]
    fn test_classify_everything_else_is_feedback() {
        match classify("yes, but dedupe on order_id first") {
            ConfirmDecision::Feedback(f) => {
                assert_eq!(f, "yes, but dedupe on order_id first");
            }
            other => panic!("Expected Feedback, got {:?}", other),
        }
        assert!(matches!(
            classify("please use the customers table too"),
            ConfirmDecision::Feedback(_)
        ));
    }

    #[test]
    fn test_is_status_request() {
        assert!(is_status_request("what's the status?"));
        assert!(is_status_request("Any PROGRESS on the load?"));
        assert!(!is_status_request("yes"));
        assert!(!is_status_request("use the orders table"));
    }

    #[test]
    fn test_is_resubmit_request() {
        assert!(is_resubmit_request("please resubmit the job"));
        assert!(is_resubmit_request("run again"));
        assert!(!is_resubmit_request("what's the status?"));
    }
}
