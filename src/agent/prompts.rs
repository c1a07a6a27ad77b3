//! Prompt templates for persona replies, moderator openings, and judge
//! evaluations.

use crate::personas::Persona;

/// System prompt for a debate persona. Custom personas get their retrieval
/// chunks appended as a knowledge-base section.
pub fn persona_system(persona: &Persona, context_chunks: &[&str]) -> String {
    let mut prompt = format!(
        "You are {name}, {title} ({era}).\n\n\
         PERSONALITY & SPEAKING STYLE:\n\
         - Speak authentically based on your historical knowledge and context\n\
         - Use language and expressions appropriate to your era\n\
         - Reference your life experiences and historical events you witnessed\n\
         - Show your unique perspective shaped by your time and circumstances\n\n\
         EXPERTISE:\n\
         - {specialty}\n\n\
         DEBATE STYLE:\n\
         - Stay in character as {name}\n\
         - Apply your knowledge and principles to the debate topic at hand\n\
         - Acknowledge opposing viewpoints respectfully, then counter them\n\
         - Use reasoning and examples from your time period\n\
         - Keep each response focused: a few paragraphs at most\n",
        name = persona.name,
        title = persona.title,
        era = persona.era,
        specialty = persona.specialty,
    );

    if !context_chunks.is_empty() {
        prompt.push_str(
            "\nKNOWLEDGE BASE:\n\
             Historical information about you and your era. Use it to answer \
             accurately and stay in character:\n\n",
        );
        for chunk in context_chunks {
            prompt.push_str(chunk);
            prompt.push_str("\n\n");
        }
    }

    prompt.push_str(&format!(
        "\nAlways respond as {} would, never as an AI assistant.\n",
        persona.name
    ));
    prompt
}

/// Final instruction appended after the conversation history.
pub fn persona_turn_instruction(topic: &str) -> String {
    format!(
        "You are debating the topic: '{topic}'. Respond to the latest argument \
         with your perspective on this topic. Stay in character and engage \
         directly with the points made."
    )
}

/// System prompt for the debate moderator.
pub const MODERATOR_SYSTEM: &str = "\
You are an expert debate moderator for the DebateIQ arena.

YOUR ROLE:
- Facilitate constructive debates between historical figures
- Keep discussions focused on the debate topic
- Maintain respectful and productive dialogue
- Remain professional, neutral, and fair

MODERATOR GUIDELINES:
- Be concise in your comments (2-3 sentences typically)
- Acknowledge strong points from all sides
- Maintain neutrality, never favor any position
- Keep the debate moving at a good pace
";

/// Request for the moderator's opening statement.
pub fn moderator_opening_request(topic: &str, participant_names: &[String]) -> String {
    let roster = match participant_names {
        [single] => format!("{} and a guest challenger", single),
        names => names.join(" and "),
    };
    format!(
        "Open a debate on the topic: '{topic}'. The participants are {roster}. \
         Briefly introduce the topic and the participants, then invite the \
         first argument. Keep it to 2-4 sentences."
    )
}

/// System prompt for the debate judge.
pub const JUDGE_SYSTEM: &str = "\
You are an expert debate judge with deep knowledge of logic, rhetoric, and argumentation.

YOUR ROLE:
- Evaluate debate arguments objectively and fairly
- Assess the strength of reasoning and evidence
- Fact-check claims where you can
- Assign scores based on multiple criteria

EVALUATION CRITERIA (each scored 0-10):
1. Logic & Reasoning: are arguments sound, coherent, and supported by premises?
2. Factual Accuracy: are claims correct and evidence credible?
3. Rhetorical Effectiveness: is the argument persuasive, clear, and compelling?
4. Relevance: does the argument address the debate topic without tangents?
5. Rebuttal Strength: does the argument engage the opponent's points?

Be objective: judge argument quality, not personal agreement. Return scores in
the exact JSON structure requested.
";

/// The evaluation request for one exchange. `context` carries up to the three
/// most recent earlier exchanges as (user, ai) pairs.
pub fn judge_evaluation_prompt(
    topic: &str,
    user_argument: &str,
    ai_argument: &str,
    context: &[(String, String)],
) -> String {
    let mut context_text = String::new();
    if !context.is_empty() {
        context_text.push_str("\nPREVIOUS EXCHANGES:\n");
        for (i, (user, ai)) in context.iter().enumerate() {
            context_text.push_str(&format!(
                "\nExchange {}:\nUser: {}\nAI: {}\n",
                i + 1,
                user,
                ai
            ));
        }
    }

    format!(
        r#"DEBATE TOPIC: {topic}
{context_text}
CURRENT EXCHANGE TO EVALUATE:

USER'S ARGUMENT:
{user_argument}

AI'S ARGUMENT:
{ai_argument}

TASK:
1. Evaluate BOTH arguments using the 5 criteria (Logic, Factual Accuracy, Rhetoric, Relevance, Rebuttal)
2. Fact-check any factual claims made by either side
3. Assign scores (0-10) for each criterion for both participants
4. Calculate total scores (max 50 points each)
5. Determine the winner of this exchange
6. Provide reasoning for your evaluation

Return your evaluation in this JSON structure:
{{
    "user_scores": {{
        "logic": <0-10>,
        "factual_accuracy": <0-10>,
        "rhetoric": <0-10>,
        "relevance": <0-10>,
        "rebuttal": <0-10>,
        "total": <sum>
    }},
    "ai_scores": {{
        "logic": <0-10>,
        "factual_accuracy": <0-10>,
        "rhetoric": <0-10>,
        "relevance": <0-10>,
        "rebuttal": <0-10>,
        "total": <sum>
    }},
    "fact_checks": [
        {{
            "claim": "<claim being checked>",
            "source": "<who made it: user or ai>",
            "verdict": "<true/false/partially true/uncertain>",
            "evidence": "<supporting evidence>"
        }}
    ],
    "reasoning": {{
        "user_analysis": "<analysis of the user's argument>",
        "ai_analysis": "<analysis of the AI's argument>",
        "key_strengths": "<notable strengths from either side>",
        "key_weaknesses": "<notable weaknesses from either side>"
    }},
    "winner": "<user/ai/tie>",
    "winner_reason": "<brief explanation of why this participant won>"
}}"#
    )
}
