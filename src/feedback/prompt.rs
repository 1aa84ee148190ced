/// Build the instruction sent to the model for one review
pub fn build_prompt(rating: u8, review_text: &str) -> String {
    format!(
        r#"You are an AI assistant helping a product team understand customer feedback.

User rating: {rating} (1-5)
User review: {review_text}

Return a JSON object with these keys:
- "user_response": a short friendly message addressed to the user (max 2 sentences).
- "summary": a concise, neutral 1-2 sentence summary of the feedback.
- "actions": 2-3 bullet points (string with each bullet on a new line) suggesting actions the team can take.

Important:
- Respond with ONLY valid JSON.
- Do not include any markdown, code fences (```), or extra text.
"#
    )
}
