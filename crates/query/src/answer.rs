//! Grounded answer generation with a deterministic fallback
//!
//! Two-layer guarantee against non-answers: with no usable context the
//! model is never called and the fallback is returned directly; with
//! context, a hedging reply is detected after the fact and replaced by the
//! same fallback.

use crate::intent::QueryIntent;
use regex_lite::Regex;
use std::sync::OnceLock;
use tracing::debug;
use verdant_common::config::ContactConfig;
use verdant_common::errors::Result;
use verdant_common::llm::CompletionClient;

/// The structured "here's how we typically help" answer used whenever a
/// grounded answer is unavailable.
pub fn build_fallback(question: &str, contact: &ContactConfig) -> String {
    [
        format!(
            "I couldn't find a definitive answer to \"{}\" in our internal docs yet, but here's how we typically help:",
            question
        ),
        String::new(),
        "• Quick take: share your goal, scope, timeline, and any data you already track (spend, emissions boundaries, frameworks in scope like GHG Protocol/ISO/ESG).".to_string(),
        "• Next steps we'd propose: (1) clarify your objectives and reporting boundary, (2) map available data sources, (3) pick the right methodology, (4) outline a phased plan with quick wins.".to_string(),
        format!(
            "• If you'd like a precise recommendation, reply with a bit more context, or email us at {} or book a quick call: {}.",
            contact.support_email, contact.scheduling_url
        ),
    ]
    .join("\n")
}

fn hedge_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)\b(i (do not|don't|cannot|can't) (know|tell)|not sure|insufficient|no (context|information))\b",
        )
        .expect("static pattern")
    })
}

/// True when a reply evades the question instead of answering it
pub fn is_hedging(answer: &str) -> bool {
    answer.trim().is_empty() || hedge_pattern().is_match(answer)
}

/// System instruction for the completion call
pub fn system_prompt(intent: QueryIntent, contact: &ContactConfig) -> String {
    let mut prompt = [
        "You are precise and grounded. Use ONLY the provided context for factual claims and cite as [#index].".to_string(),
        "If the context isn't sufficient to answer confidently, do NOT say \"I don't know\".".to_string(),
        "Instead: (1) briefly acknowledge the gap, (2) list a few concrete next steps or clarifying questions,".to_string(),
        "(3) optionally share a short, high-level best-practice outline that is safe and non-specific,".to_string(),
        format!(
            "(4) end with this call to action: \"If you'd like, email {} or book a quick call: {}.\"",
            contact.support_email, contact.scheduling_url
        ),
        "Never invent credentials or facts not in context.".to_string(),
    ]
    .join(" ");

    if intent.is_general() {
        prompt.push_str(
            " When asked for generalized advice or about us, summarize capabilities strictly from the context. \
             If first-person details are present, you may use them; otherwise use 'we'/'this practice'.",
        );
    }

    prompt
}

/// User prompt wrapping the question and assembled context
pub fn user_prompt(question: &str, context: &str) -> String {
    format!("Question: {}\n\nContext:\n{}", question, context)
}

/// Generate a grounded answer; substitute the fallback if the model hedges.
/// Returns the answer and whether the fallback replaced it.
pub async fn generate(
    client: &dyn CompletionClient,
    question: &str,
    context: &str,
    intent: QueryIntent,
    contact: &ContactConfig,
) -> Result<(String, bool)> {
    let system = system_prompt(intent, contact);
    let user = user_prompt(question, context);

    let answer = client.complete(&system, &user).await?;

    if is_hedging(&answer) {
        debug!("hedge detected, substituting fallback");
        return Ok((build_fallback(question, contact), true));
    }

    Ok((answer, false))
}
