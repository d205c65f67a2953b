use serde::Deserialize;
use validator::Validate;

/// Body of a job submission
#[derive(Deserialize, Debug, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitJobRequest {
    #[validate(length(min = 1, message = "Prompt is required"))]
    pub prompt: String,
    /// The user's answer to the clarification question
    #[serde(default)]
    pub clarification: String,
    #[serde(default)]
    pub clarification_question: Option<String>,
}

impl SubmitJobRequest {
    /// Clarification text stored with the job; folds the question in when one was asked.
    pub fn combined_clarification(&self) -> String {
        match self.clarification_question.as_deref().map(str::trim) {
            Some(question) if !question.is_empty() => format!(
                "Clarifications Questions: {} \n Answers: {}",
                question, self.clarification
            ),
            _ => self.clarification.clone(),
        }
    }
}

/// Query string of the status endpoint
#[derive(Deserialize, Debug)]
pub struct StatusQuery {
    #[serde(rename = "jobId")]
    pub job_id: Option<String>,
}

/// Body of a clarification request
#[derive(Deserialize, Debug, Validate)]
pub struct ClarifyRequest {
    #[validate(length(min = 1, message = "Prompt is required"))]
    pub prompt: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(question: Option<&str>) -> SubmitJobRequest {
        SubmitJobRequest {
            prompt: "weather api".to_string(),
            clarification: "metric units".to_string(),
            clarification_question: question.map(str::to_string),
        }
    }

    #[test]
    fn question_is_folded_into_stored_clarification() {
        assert_eq!(
            request(Some("Which units?")).combined_clarification(),
            "Clarifications Questions: Which units? \n Answers: metric units"
        );
    }

    #[test]
    fn answer_alone_is_stored_without_question() {
        assert_eq!(request(None).combined_clarification(), "metric units");
        assert_eq!(request(Some("  ")).combined_clarification(), "metric units");
    }

    #[test]
    fn empty_prompt_fails_validation() {
        let mut req = request(None);
        req.prompt = String::new();
        assert!(req.validate().is_err());
    }
}
