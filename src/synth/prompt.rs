/// System prompt for the clarification round-trip
pub const CLARIFIER_SYSTEM: &str = "You are an expert code reviewer helping to clarify requirements before code generation. \
Analyze the prompt and return 1-3 key clarifying questions that would help generate better code. \
Focus on edge cases, feature polish and implementation details. \
Return an empty string if the prompt is already clear. \
Make reasonable assumptions about the user's intent without asking clarifications, if possible.";

pub fn clarification(prompt: &str) -> String {
    format!("Please analyze this code generation prompt and suggest clarifying questions: {prompt}")
}

/// Instructions for a `functions-framework` module with a `handler` entry point,
/// answered in the `REQUIREMENTS:` / `CODE:` layout.
pub fn code_generation(prompt: &str, clarification: &str) -> String {
    format!(
        r#"Generate production-ready Python serverless function code using Google Cloud Functions Framework with a function named "handler" and a requirements.txt file. Do not include triple quotes or language tags. Format the response as:

REQUIREMENTS:
functions-framework==3.*
<requirements file contents>

CODE:
import functions_framework
import logging

logging.basicConfig(level=logging.INFO)
logger = logging.getLogger(__name__)

@functions_framework.http
def handler(request):
    <function code>

Requirements:
Prompt: {prompt}
Clarifications: {clarification}
Include robust error handling and logging. The function should accept a functions-framework HTTP request and return a functions-framework compatible response."#
    )
}
